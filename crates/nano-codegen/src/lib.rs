//! nano code generator: typed AST -> target units.
//!
//! The target has no call stack, heap or pointers, only flat lists and
//! named cells. [`runtime`] builds those on top of a single `memory` list;
//! the [`Compiler`] lowers functions and events onto it.

pub mod analysis;
mod builder;
mod builtins;
pub mod compiler;
pub mod report;
pub mod runtime;
pub mod statics;

pub use analysis::{Analysis, Placement};
pub use compiler::Compiler;
pub use report::{FunctionReport, LocalReport, StaticReport, UnitReport};
pub use statics::{StaticLocation, StaticTable};

use nano_syntax::error::{error, Result};

pub const DEFAULT_STACK_SIZE: usize = 1024;
/// Environment variable overriding [`DEFAULT_STACK_SIZE`].
pub const STACK_SIZE_ENV: &str = "NANO_STACK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Cells in each thread's stack region.
    pub stack_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { stack_size: DEFAULT_STACK_SIZE }
    }
}

impl Options {
    /// Defaults, with `NANO_STACK_SIZE` applied when set.
    pub fn from_env() -> Result<Self> {
        match std::env::var(STACK_SIZE_ENV) {
            Ok(value) => Ok(Self { stack_size: parse_stack_size(&value)? }),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

pub fn parse_stack_size(text: &str) -> Result<usize> {
    match text.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => error(format!("stack size must be a positive integer, found '{}'", text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nano_lexer::Lexer;
    use nano_parser::Parser;
    use nano_syntax::ast::Program;
    use nano_target::{render, Hat, Stmt, Unit};

    fn parse_stage(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).as_stage().parse_program().unwrap()
    }

    fn parse_sprite(src: &str, stage: &Program) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).with_statics(&stage.statics).parse_program().unwrap()
    }

    fn compile(src: &str) -> Unit {
        let program = parse_stage(src);
        let mut compiler = Compiler::default();
        let mut units = compiler.compile_project("stage", &program, &[]).unwrap();
        units.remove(0)
    }

    fn body<'a>(unit: &'a Unit, proc: &str) -> &'a [Stmt] {
        &unit.proc(proc).unwrap().body
    }

    fn contains(stmts: &[Stmt], pred: &impl Fn(&Stmt) -> bool) -> bool {
        stmts.iter().any(|s| {
            pred(s)
                || match s {
                    Stmt::If { then, otherwise, .. } => contains(then, pred) || contains(otherwise, pred),
                    Stmt::Repeat { body, .. } | Stmt::Until { body, .. } | Stmt::Forever(body) => contains(body, pred),
                    _ => false,
                }
        })
    }

    #[test]
    fn test_stack_size_parsing() {
        assert_eq!(parse_stack_size("256").unwrap(), 256);
        assert_eq!(parse_stack_size(" 64 ").unwrap(), 64);
        assert!(parse_stack_size("0").is_err());
        assert!(parse_stack_size("lots").is_err());
        assert_eq!(Options::default().with_stack_size(8).stack_size, 8);
    }

    #[test]
    fn test_stage_carries_runtime() {
        let unit = compile("on flag\n    say(\"hi\")\nend\n");
        for proc in ["internal_alloc", "internal_free", "internal_acquire_thread", "internal_release_thread", "internal_init_statics", "event_0"] {
            assert!(unit.proc(proc).is_some(), "missing {}", proc);
        }
        assert!(unit.lists.iter().any(|l| l == "memory"));
        assert!(unit.variables.iter().any(|(v, _)| v == "tmp"));
        assert_eq!(unit.scripts[0].hat, Hat::Flag);
        assert_eq!(unit.scripts[1].hat, Hat::Broadcast("internal_start".into()));
        let text = render(&unit);
        assert!(text.contains("internal_acquire_thread;\n    event_0 slot_ret;"));
        assert!(text.contains("say \"hi\";"));
    }

    #[test]
    fn test_sprites_get_bootstrap_but_not_shared_state() {
        let stage = parse_stage("var score = 0\n");
        let sprite = parse_sprite("on click\n    score += 1\nend\n", &stage);
        let mut compiler = Compiler::default();
        let units = compiler
            .compile_project("stage", &stage, &[("cat".to_string(), sprite)])
            .unwrap();
        let cat = &units[1];
        assert!(cat.proc("internal_alloc").is_some());
        assert!(cat.proc("internal_init_statics").is_none());
        assert!(cat.lists.is_empty());
        assert!(render(cat).contains("static_score += 1;"));
        assert!(units[0].variables.iter().any(|(v, _)| v == "static_score"));
    }

    #[test]
    fn test_while_true_is_forever() {
        let unit = compile("on flag\n    while true:\n        wait(1)\n    end\nend\n");
        assert!(contains(body(&unit, "event_0"), &|s| matches!(s, Stmt::Forever(_))));
        assert!(!contains(body(&unit, "event_0"), &|s| matches!(s, Stmt::Until { .. })));
    }

    #[test]
    fn test_recursive_locals_use_the_stack() {
        let src = "func fact(n: number): number\n    var r = 1\n    if n > 1:\n        r = n * fact(n - 1)\n    end\n    return r\nend\n\
                   func twice(n: number): number\n    var r = n * 2\n    return r\nend\n";
        let unit = compile(src);
        assert!(!unit.variables.iter().any(|(v, _)| v.starts_with("local_fact_")));
        assert!(unit.variables.iter().any(|(v, _)| v == "local_twice_0_r"));
        let text = unit.proc("fn_twice").unwrap().to_string();
        assert!(text.contains("local_twice_0_r = memory["), "{}", text);
        assert!(!text.contains("local_fact"));
    }

    #[test]
    fn test_address_taken_local_uses_the_stack() {
        let unit = compile("func f(): number\n    var x = 4\n    var p = &x\n    return *p\nend\n");
        assert!(!unit.variables.iter().any(|(v, _)| v == "local_f_0_x"));
        assert!(unit.variables.iter().any(|(v, _)| v == "local_f_1_p"));
    }

    #[test]
    fn test_no_unresolved_values_in_output() {
        let src = "func add(a: number, b: number): number\n    return a + b\nend\n\
                   on flag\n    var name = ask(\"who?\")\n    say(name & \"!\")\n    var total = add(add(1, 2), add(3, 4))\n    say(total)\nend\n";
        let text = render(&compile(src));
        assert!(!text.contains("unresolved"), "{}", text);
        assert!(text.contains("ask \"who?\";"));
        assert!(text.contains("fn_add $slot;"));
    }

    #[test]
    fn test_impure_while_condition_is_kept_on_the_stack() {
        let src = "on flag\n    while ask(\"again?\") == \"yes\":\n        say(\"ok\")\n    end\nend\n";
        let unit = compile(src);
        let events = body(&unit, "event_0");
        assert!(contains(events, &|s| matches!(s, Stmt::Until { .. })));
        // the condition is asked once before the loop and once per iteration
        let asks = render(&unit).matches("ask \"again?\";").count();
        assert_eq!(asks, 2);
    }

    #[test]
    fn test_drop_releases_the_thread() {
        let unit = compile("on clone\n    drop\nend\n");
        let text = unit.proc("event_0").unwrap().to_string();
        assert!(text.contains("internal_release_thread $slot;\n    delete_this_clone;\n    stop_this_script;"), "{}", text);
        // nothing follows an unescapable body
        assert_eq!(text.matches("internal_release_thread").count(), 1);
    }

    #[test]
    fn test_calls_stop_when_the_callee_released_the_slot() {
        let unit = compile("func quit()\n    drop\nend\non flag\n    quit()\n    say(\"after\")\nend\n");
        let text = unit.proc("event_0").unwrap().to_string();
        assert!(text.contains("fn_quit $slot;\n    if stack_base[$slot] == \"\" {\n        stop_this_script;"), "{}", text);
        let quit = unit.proc("fn_quit").unwrap().to_string();
        assert!(quit.contains("say \"stack overflow\";"), "{}", quit);
        // the event pushes nothing, so it needs no guard of its own
        assert!(!text.contains("stack overflow"));
    }

    #[test]
    fn test_reports() {
        let mut compiler = Compiler::default();
        let program = parse_stage("func f(n: number): number\n    var k = n\n    return f(k)\nend\n");
        compiler.compile_project("stage", &program, &[]).unwrap();
        let report = &compiler.reports()[0];
        assert!(report.stage);
        assert!(report.functions[0].recursive);
        assert_eq!(report.functions[0].locals[0].placement, "stack");
    }
}
