use nano_codegen::{Compiler, Options};
use nano_lexer::Lexer;
use nano_parser::Parser;
use nano_syntax::ast::Program;
use nano_target::{render, Hat, Unit, Value};
use nano_vm::Vm;

const STACK_SIZE: usize = 64;

fn parse_stage(src: &str) -> Program {
    let tokens = Lexer::new(src).tokenize().unwrap();
    Parser::new(tokens).as_stage().parse_program().unwrap()
}

fn parse_sprite(src: &str, stage: &Program) -> Program {
    let tokens = Lexer::new(src).tokenize().unwrap();
    Parser::new(tokens).with_statics(&stage.statics).parse_program().unwrap()
}

fn build(stage_src: &str, sprites: &[(&str, &str)]) -> Vec<Unit> {
    let stage = parse_stage(stage_src);
    let sprites: Vec<(String, Program)> = sprites
        .iter()
        .map(|(name, src)| (name.to_string(), parse_sprite(src, &stage)))
        .collect();
    let mut compiler = Compiler::new(Options::default().with_stack_size(STACK_SIZE));
    let units = compiler.compile_project("stage", &stage, &sprites).unwrap();
    for unit in &units {
        assert!(!render(unit).contains("unresolved"), "{}", render(unit));
    }
    units
}

fn start(units: &[Unit]) -> Vm {
    let mut vm = Vm::new(units);
    vm.green_flag();
    vm
}

fn run(stage_src: &str) -> Vm {
    let mut vm = start(&build(stage_src, &[]));
    vm.run(500).unwrap();
    vm
}

fn num(vm: &Vm, var: &str) -> f64 {
    vm.var(var).unwrap_or_else(|| panic!("no variable '{}'", var)).to_num()
}

fn memory(vm: &Vm) -> &[Value] {
    vm.list("memory").unwrap()
}

#[test]
fn test_precedence_evaluates_on_the_target() {
    let vm = run("var result = 0\non flag\n    var x: number = 1 + 2 * 3\n    result = x\nend\n");
    assert_eq!(num(&vm, "static_result"), 7.0);
}

#[test]
fn test_recursive_factorial() {
    let vm = run(
        "var result = 0\n\
         func fact(n: number): number\n    if n <= 1: return 1\n    return n * fact(n - 1)\nend\n\
         on flag\n    result = fact(6)\nend\n",
    );
    assert_eq!(num(&vm, "static_result"), 720.0);
}

#[test]
fn test_mutual_recursion() {
    let vm = run(
        "var result = 0\n\
         func is_even(n: number): bool\n    if n == 0: return true\n    return is_odd(n - 1)\nend\n\
         func is_odd(n: number): bool\n    if n == 0: return false\n    return is_even(n - 1)\nend\n\
         on flag\n    if is_even(10): result += 1\n    if is_odd(7): result += 10\n    if is_even(3): result += 100\nend\n",
    );
    assert_eq!(num(&vm, "static_result"), 11.0);
}

#[test]
fn test_nested_calls_and_global_locals() {
    let vm = run(
        "var a = 0\nvar b = 0\n\
         func add(x: number, y: number): number\n    return x + y\nend\n\
         func sq(n: number): number\n    var r = n * n\n    return r\nend\n\
         on flag\n    a = add(add(1, 2), add(3, 4))\n    b = sq(sq(3))\nend\n",
    );
    assert_eq!(num(&vm, "static_a"), 10.0);
    assert_eq!(num(&vm, "static_b"), 81.0);
}

#[test]
fn test_pointers_to_stack_locals() {
    let vm = run(
        "var result = 0\n\
         func bump(p: number*)\n    p[0] += 5\nend\n\
         on flag\n    var x = 4\n    var p = &x\n    p[0] = 9\n    bump(p)\n    result = x + *p\nend\n",
    );
    assert_eq!(num(&vm, "static_result"), 28.0);
}

#[test]
fn test_allocator_reuses_freed_cells() {
    let vm = run(
        "var first = 0\nvar second = 0\nvar third = 0\n\
         on flag\n    var p = alloc(4)\n    free(p)\n    var q = alloc(4)\n    var r = alloc(2)\n    \
         first = p\n    second = q\n    third = r\nend\n",
    );
    let (p, q, r) = (num(&vm, "static_first"), num(&vm, "static_second"), num(&vm, "static_third"));
    assert_eq!(p, q);
    assert_eq!(r, q + 4.0 + 3.0);
    assert!(memory(&vm).len() as f64 >= r + 2.0 - 1.0);
}

#[test]
fn test_allocator_invariants_after_threads_end() {
    let mut vm = start(&build("on flag\n    var p = alloc(10)\nend\non click\n    wait(0)\nend\n", &[]));
    vm.fire(&Hat::Click);
    vm.run(50).unwrap();
    // both thread regions are released; the leaked cell is the only one left
    let head = num(&vm, "heap_head") as usize;
    assert!(head > 0);
    let mem = memory(&vm);
    let mut cell = head;
    let mut cells = 0;
    let mut used = 0;
    while cell != 0 {
        let size = mem[cell + 1].to_num() as usize;
        used += size + 3;
        assert!(cell + 2 + size <= mem.len());
        cell = mem[cell - 1].to_num() as usize;
        cells += 1;
    }
    assert_eq!(cells, 1);
    assert!(used <= mem.len());
    assert!(vm.list("stack_base").unwrap().iter().all(|v| v.to_string().is_empty()));
}

#[test]
fn test_clones_get_distinct_slots_and_regions() {
    let units = build(
        "",
        &[(
            "cat",
            "on flag\n    clone()\n    clone()\nend\non clone\n    var id = 1\n    wait(1)\n    drop\nend\n",
        )],
    );
    let mut vm = start(&units);
    vm.tick().unwrap();
    assert_eq!(vm.clone_count(), 2);
    let bases: Vec<f64> = vm
        .list("stack_base")
        .unwrap()
        .iter()
        .filter(|v| !v.to_string().is_empty())
        .map(Value::to_num)
        .collect();
    assert_eq!(bases.len(), 2);
    assert!((bases[0] - bases[1]).abs() >= (STACK_SIZE + 3) as f64);

    vm.run(100).unwrap();
    assert_eq!(vm.clone_count(), 0);
    assert!(vm.list("stack_base").unwrap().iter().all(|v| v.to_string().is_empty()));
}

#[test]
fn test_ask_and_say() {
    let mut vm = start(&build("on flag\n    var name = ask(\"who?\")\n    say(\"hi \" & name)\nend\n", &[]));
    vm.push_answer("Ada");
    vm.run(20).unwrap();
    assert_eq!(vm.said(), &["hi Ada".to_string()]);
}

#[test]
fn test_statics_shared_across_units() {
    let units = build(
        "var counter = 10\nvar plain = 1\n",
        &[("cat", "on flag\n    var p = &counter\n    p[0] += 5\n    plain += 1\nend\n")],
    );
    let mut vm = start(&units);
    vm.run(20).unwrap();
    let ptr = num(&vm, "static_ptr_counter") as usize;
    assert!(ptr > 0);
    assert_eq!(memory(&vm)[ptr - 1].to_num(), 15.0);
    assert_eq!(num(&vm, "static_plain"), 2.0);
    assert!(vm.var("static_counter").is_none());
}

#[test]
fn test_while_condition_with_calls() {
    let vm = run(
        "var count = 0\nvar total = 0\n\
         func next(): number\n    count += 1\n    return count\nend\n\
         on flag\n    while next() < 5:\n        var step = 1\n        total += step\n    end\n    total += 100\nend\n",
    );
    assert_eq!(num(&vm, "static_count"), 5.0);
    assert_eq!(num(&vm, "static_total"), 104.0);
}

#[test]
fn test_repeat_with_block_locals() {
    let vm = run(
        "var total = 0\n\
         func sum(n: number): number\n    var acc = 0\n    repeat n:\n        var k = 2\n        acc += k\n    end\n    var after = 1\n    return acc + after\nend\n\
         func deep(n: number): number\n    if n == 0: return sum(3)\n    var local = n\n    return deep(n - 1) + local - local\nend\n\
         on flag\n    total = deep(4)\nend\n",
    );
    assert_eq!(num(&vm, "static_total"), 7.0);
}

#[test]
fn test_drop_in_a_nested_function_halts_the_thread() {
    let vm = run(
        "var after = 0\n\
         func quit()\n    drop\nend\n\
         func outer()\n    quit()\n    after += 1\nend\n\
         on flag\n    outer()\n    var x = 5\n    after += 10\n    say(\"after\")\nend\n",
    );
    assert!(vm.said().is_empty());
    assert_eq!(num(&vm, "static_after"), 0.0);
    assert!(vm.list("stack_base").unwrap().iter().all(|v| v.to_string().is_empty()));
    // the region was released once and nothing else was allocated
    assert_eq!(num(&vm, "heap_head"), 0.0);
}

#[test]
fn test_operands_are_read_before_later_calls_run() {
    let vm = run(
        "var count = 0\nvar got = 0\nvar sum = 0\n\
         func next(): number\n    count += 1\n    return count\nend\n\
         func pair(a: number, b: number): number\n    return a * 10 + b\nend\n\
         on flag\n    got = pair(count, next())\n    sum = count + next()\n    say(count & \",\" & next())\nend\n",
    );
    assert_eq!(num(&vm, "static_got"), 1.0);
    assert_eq!(num(&vm, "static_sum"), 3.0);
    assert_eq!(vm.said(), &["2,3".to_string()]);
}

#[test]
fn test_stack_overflow_stops_the_thread_before_the_heap() {
    let vm = run(
        "var keep = 0\nvar depth = 0\n\
         func down(n: number): number\n    depth += 1\n    if n == 0: return 0\n    return down(n - 1) + 1\nend\n\
         on flag\n    var p = alloc(1)\n    var q = number*(p)\n    q[0] = 42\n    keep = p\n    var r = down(40)\n    depth = -1\nend\n",
    );
    assert_eq!(vm.said(), &["stack overflow".to_string()]);
    let keep = num(&vm, "static_keep") as usize;
    assert!(keep > 0);
    assert_eq!(memory(&vm)[keep - 1].to_num(), 42.0);
    let depth = num(&vm, "static_depth");
    assert!(depth > 1.0 && depth < 40.0, "depth {}", depth);
    assert!(vm.list("stack_base").unwrap().iter().all(|v| v.to_string().is_empty()));
    // only the allocated cell is left on the heap
    let head = num(&vm, "heap_head") as usize;
    assert_eq!(head + 3, keep);
    assert_eq!(memory(&vm)[head - 1].to_num(), 0.0);
}

/// xorshift64; a fixed seed replays the same sequence.
fn next_random(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

/// Walks the cell list and checks it against the live allocations.
fn check_heap(vm: &Vm, live: &[(usize, usize)]) {
    let mem = memory(vm);
    let mut cells = Vec::new();
    let mut cell = num(vm, "heap_head") as usize;
    while cell != 0 {
        assert!(cells.len() <= live.len(), "cell list does not end");
        let size = mem[cell + 1].to_num() as usize;
        cells.push((cell + 3, size));
        cell = mem[cell - 1].to_num() as usize;
    }
    cells.sort_unstable();
    let mut expected = live.to_vec();
    expected.sort_unstable();
    assert_eq!(cells, expected);
    for pair in cells.windows(2) {
        let ((p, size), (next, _)) = (pair[0], pair[1]);
        assert!(p + size + 3 <= next, "cell at {} overlaps cell at {}", p, next);
    }
    if let Some(&(p, size)) = cells.last() {
        assert!(p + size - 1 <= mem.len());
    }
}

#[test]
fn test_random_alloc_free_sequences_keep_cells_disjoint() {
    let units = build("", &[]);
    for seed in [0x9e37_79b9_7f4a_7c15u64, 0x1234_5678, 7] {
        let mut vm = Vm::new(&units);
        let mut state = seed;
        let mut live: Vec<(usize, usize)> = Vec::new();
        for _ in 0..300 {
            let r = next_random(&mut state);
            if live.is_empty() || r % 3 != 0 {
                let size = (r >> 8) % 8 + 1;
                vm.call("stage", "internal_alloc", vec![Value::Num(size as f64)]).unwrap();
                let ptr = num(&vm, "alloc_ret") as usize;
                live.push((ptr, size as usize));
            } else {
                let (ptr, _) = live.swap_remove((r >> 8) as usize % live.len());
                vm.call("stage", "internal_free", vec![Value::Num(ptr as f64)]).unwrap();
            }
            check_heap(&vm, &live);
        }
    }
}
