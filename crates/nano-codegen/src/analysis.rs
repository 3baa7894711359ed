//! Call-graph analysis and local storage placement.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nano_syntax::ast::*;

/// Where a local variable lives at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A named global cell, `local_<fn>_<id>_<name>`.
    Global(String),
    /// A cell in the thread's current frame.
    Stack,
}

/// User functions called directly by `body`, built-ins excluded.
pub fn callees(body: &Block) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for stmt in &body.stmts {
        stmt_calls(stmt, &mut out);
    }
    out
}

fn branch_calls(branch: &Branch, out: &mut BTreeSet<String>) {
    match branch {
        Branch::Single(stmt) => stmt_calls(stmt, out),
        Branch::Block(block) => {
            for stmt in &block.stmts {
                stmt_calls(stmt, out);
            }
        }
    }
}

fn stmt_calls(stmt: &Stmt, out: &mut BTreeSet<String>) {
    match stmt {
        Stmt::VarDeclare { init, .. } => {
            if let Some(e) = init {
                expr_calls(e, out);
            }
        }
        Stmt::VarAssign { target, value, .. } => {
            let mut target = target;
            while let AssignTarget::Index { index, then } = target {
                expr_calls(index, out);
                target = &**then;
            }
            expr_calls(value, out);
        }
        Stmt::Call(e) => expr_calls(e, out),
        Stmt::Return(value) => {
            if let Some(e) = value {
                expr_calls(e, out);
            }
        }
        Stmt::If { cond, then, otherwise } => {
            expr_calls(cond, out);
            branch_calls(then, out);
            if let Some(b) = otherwise {
                branch_calls(b, out);
            }
        }
        Stmt::While { cond, body } => {
            expr_calls(cond, out);
            branch_calls(body, out);
        }
        Stmt::Repeat { count, body } => {
            expr_calls(count, out);
            branch_calls(body, out);
        }
        Stmt::Forever { body } => branch_calls(body, out),
        Stmt::DeleteInstance => {}
    }
}

fn expr_calls(expr: &Expr, out: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Constant(_) | ExprKind::Variable { .. } => {}
        ExprKind::Binary { lhs, rhs, .. } => {
            expr_calls(lhs, out);
            expr_calls(rhs, out);
        }
        ExprKind::Index { base, index } => {
            expr_calls(base, out);
            expr_calls(index, out);
        }
        ExprKind::Unary { operand: e, .. }
        | ExprKind::AddressOf(e)
        | ExprKind::Indirect(e)
        | ExprKind::Cast(e) => expr_calls(e, out),
        ExprKind::Call { name, callee, args } => {
            if *callee == Callee::User {
                out.insert(name.clone());
            }
            for a in args {
                expr_calls(a, out);
            }
        }
    }
}

/// Tarjan's strongly connected components over the user call graph.
struct Tarjan<'a> {
    graph: &'a BTreeMap<String, BTreeSet<String>>,
    index: usize,
    indices: HashMap<&'a str, usize>,
    lowlink: HashMap<&'a str, usize>,
    stack: Vec<&'a str>,
    on_stack: BTreeSet<&'a str>,
    components: Vec<Vec<&'a str>>,
}

impl<'a> Tarjan<'a> {
    fn visit(&mut self, v: &'a str) {
        self.indices.insert(v, self.index);
        self.lowlink.insert(v, self.index);
        self.index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);

        let graph = self.graph;
        if let Some(edges) = graph.get(v) {
            for w in edges {
                let w = w.as_str();
                if !graph.contains_key(w) {
                    continue;
                }
                if !self.indices.contains_key(w) {
                    self.visit(w);
                    let low = self.lowlink[v].min(self.lowlink[w]);
                    self.lowlink.insert(v, low);
                } else if self.on_stack.contains(w) {
                    let low = self.lowlink[v].min(self.indices[w]);
                    self.lowlink.insert(v, low);
                }
            }
        }

        if self.lowlink[v] == self.indices[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack.remove(w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Names of the functions that can re-enter themselves: members of a
/// strongly connected component larger than one, or with a self edge.
pub fn recursive_functions(graph: &BTreeMap<String, BTreeSet<String>>) -> BTreeSet<String> {
    let mut tarjan = Tarjan {
        graph,
        index: 0,
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        components: Vec::new(),
    };
    for name in graph.keys() {
        if !tarjan.indices.contains_key(name.as_str()) {
            tarjan.visit(name);
        }
    }
    let mut recursive = BTreeSet::new();
    for component in tarjan.components {
        let self_edge = component.len() == 1
            && graph
                .get(component[0])
                .map_or(false, |edges| edges.contains(component[0]));
        if component.len() > 1 || self_edge {
            recursive.extend(component.into_iter().map(str::to_string));
        }
    }
    recursive
}

/// Call graph and recursion classification of one unit.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub calls: BTreeMap<String, BTreeSet<String>>,
    pub recursive: BTreeSet<String>,
}

impl Analysis {
    pub fn of(program: &Program) -> Self {
        let calls: BTreeMap<String, BTreeSet<String>> = program
            .functions
            .iter()
            .map(|(name, f)| (name.clone(), callees(&f.body)))
            .collect();
        let recursive = recursive_functions(&calls);
        Self { calls, recursive }
    }

    pub fn is_recursive(&self, name: &str) -> bool {
        self.recursive.contains(name)
    }

    /// Placement of every local of `function`, indexed by local id.
    pub fn function_placement(&self, function: &Function) -> Vec<Placement> {
        let recursive = self.is_recursive(&function.name);
        function
            .locals
            .iter()
            .enumerate()
            .map(|(id, local)| {
                if recursive || local.address_taken {
                    Placement::Stack
                } else {
                    Placement::Global(format!("local_{}_{}_{}", function.name, id, local.name))
                }
            })
            .collect()
    }
}
