//! The runtime every unit carries: a flat memory list, a first-fit heap
//! allocator over it, and per-thread stack regions.
//!
//! Heap cell at address `a` (all addresses are 1-based `memory` indices):
//!
//! ```text
//! memory[a]     next cell, 0 when last
//! memory[a + 1] previous cell, 0 when first
//! memory[a + 2] payload size
//! memory[a + 3] payload ...
//! ```
//!
//! A thread owns slot `s`: `stack_base[s]` is the payload address of its
//! stack region and `stack_top[s]` the address of the topmost used cell.
//! The first cell of the region holds the current frame base. A free slot
//! holds the empty string in both lists.

use nano_target::{BinOp, Expr, Hat, Proc, Script, Stmt, Unit, Value};

pub const MEMORY: &str = "memory";
pub const STACK_BASE: &str = "stack_base";
pub const STACK_TOP: &str = "stack_top";

pub const HEAP_HEAD: &str = "heap_head";
pub const ALLOC_RET: &str = "alloc_ret";
pub const ALLOC_CELL: &str = "alloc_cell";
pub const ALLOC_NEXT: &str = "alloc_next";
pub const ALLOC_PREV: &str = "alloc_prev";
pub const ALLOC_CUR: &str = "alloc_cur";
pub const ALLOC_GAP: &str = "alloc_gap";
pub const SLOT_RET: &str = "slot_ret";
/// Scratch register. Only valid between the statement that sets it and the
/// next statement that can yield.
pub const TMP: &str = "tmp";

pub const ALLOC: &str = "internal_alloc";
pub const FREE: &str = "internal_free";
pub const ACQUIRE_THREAD: &str = "internal_acquire_thread";
pub const RELEASE_THREAD: &str = "internal_release_thread";
pub const INIT_STATICS: &str = "internal_init_statics";
pub const START_MESSAGE: &str = "internal_start";

/// Parameter name of the thread slot every generated procedure receives.
pub const SLOT: &str = "slot";

pub const HEADER_SIZE: usize = 3;

const CELLS: [&str; 9] = [
    HEAP_HEAD, ALLOC_RET, ALLOC_CELL, ALLOC_NEXT, ALLOC_PREV, ALLOC_CUR, ALLOC_GAP, SLOT_RET, TMP,
];

pub fn mem(addr: Expr) -> Expr {
    Expr::item(MEMORY, addr)
}

pub fn var(name: &str) -> Expr {
    Expr::var(name)
}

fn arg(name: &str) -> Expr {
    Expr::arg(name)
}

fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(op, lhs, rhs)
}

fn set_mem(addr: Expr, value: Expr) -> Stmt {
    Stmt::replace(MEMORY, addr, value)
}

/// `stack_top[$slot]`
pub fn stack_top() -> Expr {
    Expr::item(STACK_TOP, arg(SLOT))
}

/// The current frame base, `memory[stack_base[$slot]]`.
pub fn frame_base() -> Expr {
    mem(Expr::item(STACK_BASE, arg(SLOT)))
}

/// Pushes `value` onto the calling thread's stack. `value` is read
/// against the stack top before the push.
pub fn push(value: Expr) -> Vec<Stmt> {
    vec![
        set_mem(stack_top().offset(1), value),
        Stmt::replace(STACK_TOP, arg(SLOT), stack_top().offset(1)),
    ]
}

/// Drops `n` cells from the top of the calling thread's stack.
pub fn pop(n: usize) -> Stmt {
    Stmt::replace(STACK_TOP, arg(SLOT), stack_top().offset(-(n as i64)))
}

/// True once the current thread's slot has been released, by `drop` or a
/// stack overflow somewhere down the call chain.
pub fn halted() -> Expr {
    Expr::binary(BinOp::Eq, Expr::item(STACK_BASE, arg(SLOT)), Expr::str(""))
}

/// A storage location: a named cell or a memory address.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Cell(String),
    Mem(Expr),
}

impl Place {
    pub fn read(&self) -> Expr {
        match self {
            Place::Cell(name) => Expr::var(name.as_str()),
            Place::Mem(addr) => mem(addr.clone()),
        }
    }

    pub fn write(&self, value: Expr) -> Stmt {
        match self {
            Place::Cell(name) => Stmt::set(name.as_str(), value),
            Place::Mem(addr) => set_mem(addr.clone(), value),
        }
    }

    pub fn increment(&self, by: Expr) -> Stmt {
        match self {
            Place::Cell(name) => Stmt::change(name.as_str(), by),
            Place::Mem(addr) => set_mem(addr.clone(), bin(BinOp::Add, mem(addr.clone()), by)),
        }
    }

    pub fn map(self, f: impl Fn(Expr) -> Expr) -> Place {
        match self {
            Place::Mem(addr) => Place::Mem(f(addr)),
            cell => cell,
        }
    }
}

/// Declares the shared lists and runtime cells on the stage.
pub fn declare_shared(unit: &mut Unit) {
    for list in [MEMORY, STACK_BASE, STACK_TOP] {
        unit.declare_list(list);
    }
    for cell in CELLS {
        unit.declare_variable(cell, Value::zero());
    }
}

/// The bootstrap procedures present in every unit.
pub fn bootstrap(stack_size: usize) -> Vec<Proc> {
    vec![alloc_proc(), free_proc(), acquire_proc(stack_size), release_proc()]
}

/// First fit: the new cell goes before the first cell, into the first gap
/// between neighbours that is large enough, or after the last cell.
fn alloc_proc() -> Proc {
    let size = || arg("size");
    let cur = || var(ALLOC_CUR);
    let cell = || var(ALLOC_CELL);
    let body = vec![
        Stmt::set(ALLOC_GAP, size().offset(HEADER_SIZE as i64)),
        Stmt::set(ALLOC_PREV, Expr::num(0.0)),
        Stmt::set(ALLOC_CUR, var(HEAP_HEAD)),
        Stmt::set(ALLOC_CELL, Expr::num(1.0)),
        Stmt::Until {
            cond: bin(
                BinOp::Or,
                bin(BinOp::Eq, cur(), Expr::num(0.0)),
                bin(BinOp::Ge, bin(BinOp::Sub, cur(), cell()), var(ALLOC_GAP)),
            ),
            body: vec![
                Stmt::set(ALLOC_PREV, cur()),
                Stmt::set(ALLOC_CELL, bin(BinOp::Add, cur().offset(HEADER_SIZE as i64), mem(cur().offset(2)))),
                Stmt::set(ALLOC_CUR, mem(cur())),
            ],
        },
        Stmt::set(ALLOC_NEXT, cur()),
        Stmt::Until {
            cond: bin(
                BinOp::Ge,
                Expr::Length(MEMORY.to_string()),
                bin(BinOp::Add, cell(), var(ALLOC_GAP)).offset(-1),
            ),
            body: vec![Stmt::append(MEMORY, Expr::num(0.0))],
        },
        set_mem(cell(), var(ALLOC_NEXT)),
        set_mem(cell().offset(1), var(ALLOC_PREV)),
        set_mem(cell().offset(2), size()),
        Stmt::If {
            cond: bin(BinOp::Eq, var(ALLOC_PREV), Expr::num(0.0)),
            then: vec![Stmt::set(HEAP_HEAD, cell())],
            otherwise: vec![set_mem(var(ALLOC_PREV), cell())],
        },
        Stmt::If {
            cond: bin(BinOp::Gt, var(ALLOC_NEXT), Expr::num(0.0)),
            then: vec![set_mem(var(ALLOC_NEXT).offset(1), cell())],
            otherwise: Vec::new(),
        },
        Stmt::set(ALLOC_RET, cell().offset(HEADER_SIZE as i64)),
        // reused memory may hold stale values
        Stmt::set(ALLOC_CUR, var(ALLOC_RET)),
        Stmt::Repeat {
            count: size(),
            body: vec![set_mem(cur(), Expr::num(0.0)), Stmt::change(ALLOC_CUR, Expr::num(1.0))],
        },
    ];
    Proc {
        name: ALLOC.to_string(),
        params: vec!["size".to_string()],
        warp: true,
        body,
    }
}

fn free_proc() -> Proc {
    let cell = || var(ALLOC_CELL);
    let body = vec![
        Stmt::set(ALLOC_CELL, arg("ptr").offset(-(HEADER_SIZE as i64))),
        Stmt::set(ALLOC_NEXT, mem(cell())),
        Stmt::set(ALLOC_PREV, mem(cell().offset(1))),
        Stmt::If {
            cond: bin(BinOp::Eq, var(ALLOC_PREV), Expr::num(0.0)),
            then: vec![Stmt::set(HEAP_HEAD, var(ALLOC_NEXT))],
            otherwise: vec![set_mem(var(ALLOC_PREV), var(ALLOC_NEXT))],
        },
        Stmt::If {
            cond: bin(BinOp::Gt, var(ALLOC_NEXT), Expr::num(0.0)),
            then: vec![set_mem(var(ALLOC_NEXT).offset(1), var(ALLOC_PREV))],
            otherwise: Vec::new(),
        },
        set_mem(cell(), Expr::num(0.0)),
        set_mem(cell().offset(1), Expr::num(0.0)),
        set_mem(cell().offset(2), Expr::num(0.0)),
    ];
    Proc {
        name: FREE.to_string(),
        params: vec!["ptr".to_string()],
        warp: true,
        body,
    }
}

/// Finds the first free slot (or one past the end), gives it a fresh stack
/// region and leaves the slot in `slot_ret`.
fn acquire_proc(stack_size: usize) -> Proc {
    let slot = || var(SLOT_RET);
    let body = vec![
        Stmt::set(SLOT_RET, Expr::num(1.0)),
        Stmt::Until {
            cond: bin(BinOp::Eq, Expr::item(STACK_BASE, slot()), Expr::str("")),
            body: vec![Stmt::change(SLOT_RET, Expr::num(1.0))],
        },
        Stmt::call(ALLOC, vec![Expr::num(stack_size as f64)]),
        Stmt::If {
            cond: bin(BinOp::Gt, slot(), Expr::Length(STACK_BASE.to_string())),
            then: vec![
                Stmt::append(STACK_BASE, var(ALLOC_RET)),
                Stmt::append(STACK_TOP, var(ALLOC_RET)),
            ],
            otherwise: vec![
                Stmt::replace(STACK_BASE, slot(), var(ALLOC_RET)),
                Stmt::replace(STACK_TOP, slot(), var(ALLOC_RET)),
            ],
        },
        set_mem(var(ALLOC_RET), var(ALLOC_RET)),
    ];
    Proc {
        name: ACQUIRE_THREAD.to_string(),
        params: Vec::new(),
        warp: true,
        body,
    }
}

fn release_proc() -> Proc {
    let body = vec![
        Stmt::call(FREE, vec![Expr::item(STACK_BASE, arg(SLOT))]),
        Stmt::replace(STACK_BASE, arg(SLOT), Expr::str("")),
        Stmt::replace(STACK_TOP, arg(SLOT), Expr::str("")),
    ];
    Proc {
        name: RELEASE_THREAD.to_string(),
        params: vec![SLOT.to_string()],
        warp: true,
        body,
    }
}

/// The stage's program-start script: reset the runtime, initialize statics,
/// then start every unit's flag events.
pub fn start_script() -> Script {
    Script {
        hat: Hat::Flag,
        body: vec![
            Stmt::DeleteAll(MEMORY.to_string()),
            Stmt::DeleteAll(STACK_BASE.to_string()),
            Stmt::DeleteAll(STACK_TOP.to_string()),
            Stmt::set(HEAP_HEAD, Expr::num(0.0)),
            Stmt::call(INIT_STATICS, Vec::new()),
            Stmt::Broadcast(Expr::str(START_MESSAGE)),
        ],
    }
}

/// A hat script that runs event procedure `proc` on a fresh thread.
pub fn event_script(hat: Hat, proc: &str) -> Script {
    Script {
        hat,
        body: vec![
            Stmt::call(ACQUIRE_THREAD, Vec::new()),
            Stmt::call(proc, vec![var(SLOT_RET)]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_reads_before_increment() {
        let stmts = push(Expr::num(5.0));
        assert_eq!(stmts.len(), 2);
        let Stmt::Replace { list, index, .. } = &stmts[0] else {
            panic!("expected a memory write");
        };
        assert_eq!(list, MEMORY);
        assert_eq!(index.to_string(), "stack_top[$slot] + 1");
        assert_eq!(render_stmt(pop(2)), "stack_top[$slot] = stack_top[$slot] - 2;");
    }

    #[test]
    fn test_bootstrap_procs_are_atomic() {
        let procs = bootstrap(64);
        let names: Vec<&str> = procs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec![ALLOC, FREE, ACQUIRE_THREAD, RELEASE_THREAD]);
        assert!(procs.iter().all(|p| p.warp));
        assert!(procs[2].to_string().contains("internal_alloc 64;"));
    }

    #[test]
    fn test_start_script_order() {
        let script = start_script();
        assert_eq!(script.hat, Hat::Flag);
        assert_eq!(script.body.last(), Some(&Stmt::Broadcast(Expr::str(START_MESSAGE))));
        assert!(script.body.contains(&Stmt::call(INIT_STATICS, Vec::new())));
    }

    fn render_stmt(stmt: Stmt) -> String {
        let proc = Proc {
            name: "p".into(),
            params: Vec::new(),
            warp: true,
            body: vec![stmt],
        };
        proc.to_string().lines().nth(1).unwrap_or_default().trim().to_string()
    }
}
