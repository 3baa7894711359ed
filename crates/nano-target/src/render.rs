//! goboscript rendering of target units.

use std::fmt;

use nano_syntax::ast::format_number;

use crate::ir::{Expr, Stmt};
use crate::program::{Hat, Proc, Script, Unit};
use crate::value::Value;

const INDENT: &str = "    ";

/// Renders a unit as goboscript source text.
pub fn render(unit: &Unit) -> String {
    unit.to_string()
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn value(v: &Value) -> String {
    match v {
        Value::Num(n) => format_number(*n),
        Value::Str(s) => quote(s),
        Value::Bool(b) => b.to_string(),
    }
}

/// Parenthesizes operands that are themselves operator expressions.
fn operand(e: &Expr) -> String {
    match e {
        Expr::Binary { .. } | Expr::Not(_) => format!("({})", e),
        _ => e.to_string(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(v) => write!(f, "{}", value(v)),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Arg(name) => write!(f, "${}", name),
            Expr::Item { list, index } => write!(f, "{}[{}]", list, index),
            Expr::Length(list) => write!(f, "length {}", list),
            Expr::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", operand(lhs), op.symbol(), operand(rhs))
            }
            Expr::Not(e) => write!(f, "not {}", operand(e)),
            Expr::Math { op, arg } => write!(f, "{}({})", op.name(), arg),
            Expr::Random { low, high } => write!(f, "random({}, {})", low, high),
            Expr::Answer => write!(f, "answer()"),
            Expr::Timer => write!(f, "timer()"),
            Expr::Pending(n) => write!(f, "/* unresolved stack value {} */", n),
        }
    }
}

struct Writer {
    out: String,
    depth: usize,
}

impl Writer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, head: &str, body: &[Stmt]) {
        self.line(&format!("{} {{", head));
        self.depth += 1;
        self.stmts(body);
        self.depth -= 1;
        self.line("}");
    }

    fn stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Set { var, value } => self.line(&format!("{} = {};", var, value)),
            Stmt::Change { var, by } => self.line(&format!("{} += {};", var, by)),
            Stmt::Append { list, value } => self.line(&format!("add {} to {};", value, list)),
            Stmt::Replace { list, index, value } => {
                self.line(&format!("{}[{}] = {};", list, index, value))
            }
            Stmt::DeleteAll(list) => self.line(&format!("delete {};", list)),
            Stmt::If { cond, then, otherwise } => {
                self.line(&format!("if {} {{", cond));
                self.depth += 1;
                self.stmts(then);
                self.depth -= 1;
                if otherwise.is_empty() {
                    self.line("}");
                } else {
                    self.line("} else {");
                    self.depth += 1;
                    self.stmts(otherwise);
                    self.depth -= 1;
                    self.line("}");
                }
            }
            Stmt::Repeat { count, body } => self.block(&format!("repeat {}", count), body),
            Stmt::Until { cond, body } => self.block(&format!("until {}", cond), body),
            Stmt::Forever(body) => self.block("forever", body),
            Stmt::Call { proc, args } => {
                if args.is_empty() {
                    self.line(&format!("{};", proc));
                } else {
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    self.line(&format!("{} {};", proc, args.join(", ")));
                }
            }
            Stmt::Say(e) => self.line(&format!("say {};", e)),
            Stmt::SayFor(e, secs) => self.line(&format!("say {}, {};", e, secs)),
            Stmt::Think(e) => self.line(&format!("think {};", e)),
            Stmt::Ask(e) => self.line(&format!("ask {};", e)),
            Stmt::Wait(e) => self.line(&format!("wait {};", e)),
            Stmt::Broadcast(e) => self.line(&format!("broadcast {};", e)),
            Stmt::BroadcastAndWait(e) => self.line(&format!("broadcast_and_wait {};", e)),
            Stmt::CreateClone => self.line("clone;"),
            Stmt::DeleteThisClone => self.line("delete_this_clone;"),
            Stmt::ResetTimer => self.line("reset_timer;"),
            Stmt::SwitchCostume(e) => self.line(&format!("switch_costume {};", e)),
            Stmt::StopThisScript => self.line("stop_this_script;"),
        }
    }

    fn proc(&mut self, proc: &Proc) {
        let mut head = String::new();
        if !proc.warp {
            head.push_str("nowarp ");
        }
        head.push_str("proc ");
        head.push_str(&proc.name);
        if !proc.params.is_empty() {
            head.push(' ');
            head.push_str(&proc.params.join(", "));
        }
        self.block(&head, &proc.body);
    }

    fn script(&mut self, script: &Script) {
        let head = match &script.hat {
            Hat::Flag => "onflag".to_string(),
            Hat::Key(key) => format!("onkey {}", quote(key)),
            Hat::Click => "onclick".to_string(),
            Hat::Backdrop(name) => format!("onbackdrop {}", quote(name)),
            Hat::Loudness(n) => format!("onloudness > {}", format_number(*n)),
            Hat::Timer(n) => format!("ontimer > {}", format_number(*n)),
            Hat::Broadcast(msg) => format!("on {}", quote(msg)),
            Hat::Clone => "onclone".to_string(),
        };
        self.block(&head, &script.body);
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = Writer {
            out: String::new(),
            depth: 0,
        };
        w.line(&format!("# {}", self.name));
        if !self.costumes.is_empty() {
            let names: Vec<String> = self.costumes.iter().map(|c| quote(c)).collect();
            w.line(&format!("costumes {};", names.join(", ")));
        }
        if !self.sounds.is_empty() {
            let names: Vec<String> = self.sounds.iter().map(|s| quote(s)).collect();
            w.line(&format!("sounds {};", names.join(", ")));
        }
        if !self.lists.is_empty() || !self.variables.is_empty() {
            w.line("");
        }
        for list in &self.lists {
            w.line(&format!("list {};", list));
        }
        for (name, init) in &self.variables {
            w.line(&format!("var {} = {};", name, value(init)));
        }
        for proc in &self.procs {
            w.line("");
            w.proc(proc);
        }
        for script in &self.scripts {
            w.line("");
            w.script(script);
        }
        f.write_str(&w.out)
    }
}

impl fmt::Display for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut w = Writer {
            out: String::new(),
            depth: 0,
        };
        w.proc(self);
        f.write_str(&w.out)
    }
}
