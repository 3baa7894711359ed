//! nano VM core: instances, cooperative threads and the statement engine.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use nano_syntax::error::{error, internal, Result};
use nano_target::{BinOp, Expr, Hat, MathOp, Stmt, Unit, Value};

use crate::code::{Code, Op};

/// Seconds the host timer advances per tick.
pub const TICK_SECONDS: f64 = 1.0 / 30.0;

pub type ThreadId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Statements a VM may execute over its whole life.
    pub max_steps: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_steps: 5_000_000 }
    }
}

struct Frame {
    code: Rc<Code>,
    ip: usize,
    args: Vec<Value>,
    counters: Vec<f64>,
    /// Set for atomic procedures and everything they call.
    warp: bool,
}

enum Wait {
    Timer(f64),
    Answer,
    Threads(Vec<ThreadId>),
}

struct Thread {
    id: ThreadId,
    instance: usize,
    frames: Vec<Frame>,
    wait: Option<Wait>,
    done: bool,
}

struct Instance {
    unit: usize,
    clone: bool,
    alive: bool,
    costume: String,
}

struct LoadedUnit {
    name: String,
    stage: bool,
    procs: HashMap<String, Rc<Code>>,
    scripts: Vec<(Hat, Rc<Code>)>,
}

enum Flow {
    Next,
    Yield,
    End,
}

pub struct Vm {
    units: Vec<LoadedUnit>,
    instances: Vec<Instance>,
    threads: Vec<Thread>,
    next_thread: ThreadId,
    vars: HashMap<String, Value>,
    lists: HashMap<String, Vec<Value>>,
    said: Vec<String>,
    answers: VecDeque<String>,
    answer: Value,
    timer: f64,
    steps: u64,
    limits: Limits,
    rng: u64,
}

/// 1-based list position of `index`, if it is inside a list of `len` items.
fn list_index(index: &Value, len: usize) -> Option<usize> {
    let n = index.to_num().floor();
    if n >= 1.0 && n <= len as f64 {
        Some(n as usize - 1)
    } else {
        None
    }
}

fn floored_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn looks_integral(v: &Value) -> bool {
    match v {
        Value::Num(n) => n.fract() == 0.0,
        Value::Str(s) => !s.contains('.'),
        Value::Bool(_) => true,
    }
}

fn hat_matches(script: &Hat, fired: &Hat) -> bool {
    match (script, fired) {
        (Hat::Broadcast(a), Hat::Broadcast(b)) => a.eq_ignore_ascii_case(b),
        (Hat::Key(a), Hat::Key(b)) => a.eq_ignore_ascii_case(b),
        (a, b) => a == b,
    }
}

impl Vm {
    pub fn new(units: &[Unit]) -> Self {
        let mut vars = HashMap::new();
        let mut lists = HashMap::new();
        let mut loaded = Vec::with_capacity(units.len());
        let mut instances = Vec::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            for (name, init) in &unit.variables {
                vars.entry(name.clone()).or_insert_with(|| init.clone());
            }
            for name in &unit.lists {
                lists.entry(name.clone()).or_insert_with(Vec::new);
            }
            loaded.push(LoadedUnit {
                name: unit.name.clone(),
                stage: unit.stage,
                procs: unit.procs.iter().map(|p| (p.name.clone(), Code::proc(p))).collect(),
                scripts: unit
                    .scripts
                    .iter()
                    .enumerate()
                    .map(|(n, s)| (s.hat.clone(), Code::script(&unit.name, n, s)))
                    .collect(),
            });
            instances.push(Instance {
                unit: i,
                clone: false,
                alive: true,
                costume: unit.costumes.first().cloned().unwrap_or_default(),
            });
        }
        Self {
            units: loaded,
            instances,
            threads: Vec::new(),
            next_thread: 0,
            vars,
            lists,
            said: Vec::new(),
            answers: VecDeque::new(),
            answer: Value::Str(String::new()),
            timer: 0.0,
            steps: 0,
            limits: Limits::default(),
            rng: 0x9E37_79B9_7F4A_7C15,
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Seeds `random`. The same seed replays the same run.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seed.max(1);
        self
    }

    // ---- inspection ----

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    /// Everything said so far, in order.
    pub fn said(&self) -> &[String] {
        &self.said
    }

    /// Queues the reply to the next `ask`. An `ask` with nothing queued
    /// reads the empty string.
    pub fn push_answer(&mut self, answer: impl Into<String>) {
        self.answers.push_back(answer.into());
    }

    pub fn timer(&self) -> f64 {
        self.timer
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Live instances, clones included.
    pub fn instance_count(&self) -> usize {
        self.instances.iter().filter(|i| i.alive).count()
    }

    pub fn clone_count(&self) -> usize {
        self.instances.iter().filter(|i| i.alive && i.clone).count()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.iter().filter(|t| !t.done).count()
    }

    pub fn is_idle(&self) -> bool {
        self.thread_count() == 0
    }

    /// Current costume of the original instance of `unit`.
    pub fn costume(&self, unit: &str) -> Option<&str> {
        let index = self.units.iter().position(|u| u.name == unit)?;
        self.instances
            .iter()
            .find(|i| i.unit == index && !i.clone)
            .map(|i| i.costume.as_str())
    }

    // ---- starting threads ----

    pub fn green_flag(&mut self) -> Vec<ThreadId> {
        self.fire(&Hat::Flag)
    }

    /// Starts every script whose hat matches `hat`, on every live instance.
    pub fn fire(&mut self, hat: &Hat) -> Vec<ThreadId> {
        self.start_hats(hat, None)
    }

    fn start_hats(&mut self, hat: &Hat, only: Option<usize>) -> Vec<ThreadId> {
        let mut started = Vec::new();
        for index in 0..self.instances.len() {
            let instance = &self.instances[index];
            if !instance.alive || only.map_or(false, |o| o != index) {
                continue;
            }
            let codes: Vec<Rc<Code>> = self.units[instance.unit]
                .scripts
                .iter()
                .filter(|(h, _)| hat_matches(h, hat))
                .map(|(_, code)| Rc::clone(code))
                .collect();
            for code in codes {
                started.push(self.spawn(index, code, Vec::new()));
            }
        }
        started
    }

    fn spawn(&mut self, instance: usize, code: Rc<Code>, args: Vec<Value>) -> ThreadId {
        let id = self.next_thread;
        self.next_thread += 1;
        let warp = code.warp;
        self.threads.push(Thread {
            id,
            instance,
            frames: vec![Frame {
                code,
                ip: 0,
                args,
                counters: Vec::new(),
                warp,
            }],
            wait: None,
            done: false,
        });
        id
    }

    // ---- scheduling ----

    /// Gives every runnable thread one turn, in start order. Threads started
    /// during the tick get their turn in the same tick.
    pub fn tick(&mut self) -> Result<bool> {
        let mut i = 0;
        while i < self.threads.len() {
            if self.ready(i) {
                self.step_thread(i)?;
            }
            i += 1;
        }
        self.threads.retain(|t| !t.done);

        let before = self.timer;
        self.timer += TICK_SECONDS;
        let mut crossed: Vec<Hat> = Vec::new();
        for (hat, _) in self.units.iter().flat_map(|u| u.scripts.iter()) {
            if let Hat::Timer(n) = hat {
                if before <= *n && self.timer > *n && !crossed.contains(hat) {
                    crossed.push(hat.clone());
                }
            }
        }
        for hat in crossed {
            self.fire(&hat);
        }
        Ok(!self.is_idle())
    }

    /// Ticks until no thread is left or `max_ticks` ticks have run.
    /// Returns the ticks used.
    pub fn run(&mut self, max_ticks: usize) -> Result<usize> {
        for n in 0..max_ticks {
            if !self.tick()? {
                return Ok(n + 1);
            }
        }
        Ok(max_ticks)
    }

    /// Runs procedure `proc` of `unit` on that unit's original instance
    /// until it returns. Other threads keep running meanwhile.
    pub fn call(&mut self, unit: &str, proc: &str, args: Vec<Value>) -> Result<()> {
        let Some(index) = self.units.iter().position(|u| u.name == unit) else {
            return error(format!("unknown unit '{}'", unit));
        };
        let Some(code) = self.units[index].procs.get(proc).cloned() else {
            return error(format!("unknown procedure '{}' in '{}'", proc, unit));
        };
        let Some(instance) = self.instances.iter().position(|i| i.unit == index && !i.clone) else {
            return internal(format!("unit '{}' has no original instance", unit));
        };
        let id = self.spawn(instance, code, args);
        while self.threads.iter().any(|t| t.id == id && !t.done) {
            self.tick()?;
        }
        Ok(())
    }

    fn ready(&mut self, i: usize) -> bool {
        let timer = self.timer;
        let thread = &self.threads[i];
        if thread.done {
            return false;
        }
        let ready = match &thread.wait {
            None => true,
            Some(Wait::Timer(until)) => timer >= *until,
            Some(Wait::Answer) => true,
            Some(Wait::Threads(ids)) => !self.threads.iter().any(|t| ids.contains(&t.id) && !t.done),
        };
        if ready {
            if let Some(Wait::Answer) = self.threads[i].wait {
                self.answer = Value::Str(self.answers.pop_front().unwrap_or_default());
            }
            self.threads[i].wait = None;
        }
        ready
    }

    fn count_step(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return error(format!("step limit of {} exceeded", self.limits.max_steps));
        }
        Ok(())
    }

    fn frame_mut(&mut self, t: usize) -> Result<&mut Frame> {
        match self.threads[t].frames.last_mut() {
            Some(frame) => Ok(frame),
            None => internal("thread has no frame"),
        }
    }

    fn step_thread(&mut self, t: usize) -> Result<()> {
        loop {
            if self.threads[t].done {
                return Ok(());
            }
            let Some(frame) = self.threads[t].frames.last() else {
                self.threads[t].done = true;
                return Ok(());
            };
            let code = Rc::clone(&frame.code);
            let ip = frame.ip;
            let warp = frame.warp;
            let Some(op) = code.ops.get(ip) else {
                self.threads[t].frames.pop();
                continue;
            };
            self.count_step()?;
            self.frame_mut(t)?.ip = ip + 1;
            match op {
                Op::Do(stmt) => match self.exec(t, stmt)? {
                    Flow::Next => {}
                    Flow::Yield => return Ok(()),
                    Flow::End => {
                        self.threads[t].done = true;
                        return Ok(());
                    }
                },
                Op::JumpUnless(cond, target) => {
                    if !self.eval(t, cond)?.to_bool() {
                        self.frame_mut(t)?.ip = *target;
                    }
                }
                Op::JumpIf(cond, target) => {
                    if self.eval(t, cond)?.to_bool() {
                        self.frame_mut(t)?.ip = *target;
                    }
                }
                Op::Jump(target) => self.frame_mut(t)?.ip = *target,
                Op::RepeatStart(count) => {
                    let n = self.eval(t, count)?.to_num().round();
                    self.frame_mut(t)?.counters.push(n);
                }
                Op::RepeatNext(target) => {
                    let frame = self.frame_mut(t)?;
                    let left = frame.counters.pop().unwrap_or(0.0);
                    if left >= 1.0 {
                        frame.counters.push(left - 1.0);
                    } else {
                        frame.ip = *target;
                    }
                }
                Op::LoopEnd(head) => {
                    self.frame_mut(t)?.ip = *head;
                    if !warp {
                        return Ok(());
                    }
                }
                Op::Stop => {
                    self.threads[t].frames.pop();
                }
            }
        }
    }

    // ---- statements ----

    fn exec(&mut self, t: usize, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Set { var, value } => {
                let v = self.eval(t, value)?;
                self.vars.insert(var.clone(), v);
            }
            Stmt::Change { var, by } => {
                let by = self.eval(t, by)?.to_num();
                let current = self.read_var(var)?.to_num();
                self.vars.insert(var.clone(), Value::Num(current + by));
            }
            Stmt::Append { list, value } => {
                let v = self.eval(t, value)?;
                self.list_mut(list)?.push(v);
            }
            Stmt::Replace { list, index, value } => {
                let index = self.eval(t, index)?;
                let v = self.eval(t, value)?;
                let items = self.list_mut(list)?;
                if let Some(i) = list_index(&index, items.len()) {
                    items[i] = v;
                }
            }
            Stmt::DeleteAll(list) => self.list_mut(list)?.clear(),
            Stmt::Call { proc, args } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(t, a)?);
                }
                let unit = self.instances[self.threads[t].instance].unit;
                let Some(code) = self.units[unit].procs.get(proc).cloned() else {
                    return error(format!("unknown procedure '{}' in '{}'", proc, self.units[unit].name));
                };
                let warp = code.warp || self.frame_mut(t)?.warp;
                self.threads[t].frames.push(Frame {
                    code,
                    ip: 0,
                    args: values,
                    counters: Vec::new(),
                    warp,
                });
            }
            Stmt::Say(e) => {
                let text = self.eval(t, e)?.to_string();
                self.said.push(text);
            }
            Stmt::SayFor(e, secs) => {
                let text = self.eval(t, e)?.to_string();
                let secs = self.eval(t, secs)?.to_num();
                self.said.push(text);
                self.threads[t].wait = Some(Wait::Timer(self.timer + secs));
                return Ok(Flow::Yield);
            }
            Stmt::Think(e) => {
                self.eval(t, e)?;
            }
            Stmt::Ask(e) => {
                self.eval(t, e)?;
                self.threads[t].wait = Some(Wait::Answer);
                return Ok(Flow::Yield);
            }
            Stmt::Wait(e) => {
                let secs = self.eval(t, e)?.to_num();
                self.threads[t].wait = Some(Wait::Timer(self.timer + secs));
                return Ok(Flow::Yield);
            }
            Stmt::Broadcast(e) => {
                let msg = self.eval(t, e)?.to_string();
                self.fire(&Hat::Broadcast(msg));
            }
            Stmt::BroadcastAndWait(e) => {
                let msg = self.eval(t, e)?.to_string();
                let ids = self.fire(&Hat::Broadcast(msg));
                self.threads[t].wait = Some(Wait::Threads(ids));
                return Ok(Flow::Yield);
            }
            Stmt::CreateClone => {
                let parent = self.threads[t].instance;
                let unit = self.instances[parent].unit;
                if !self.units[unit].stage {
                    let costume = self.instances[parent].costume.clone();
                    self.instances.push(Instance {
                        unit,
                        clone: true,
                        alive: true,
                        costume,
                    });
                    let index = self.instances.len() - 1;
                    self.start_hats(&Hat::Clone, Some(index));
                }
            }
            Stmt::DeleteThisClone => {
                let index = self.threads[t].instance;
                if self.instances[index].clone {
                    self.instances[index].alive = false;
                    for thread in self.threads.iter_mut().filter(|th| th.instance == index) {
                        thread.done = true;
                    }
                    return Ok(Flow::End);
                }
            }
            Stmt::ResetTimer => self.timer = 0.0,
            Stmt::SwitchCostume(e) => {
                let costume = self.eval(t, e)?.to_string();
                let index = self.threads[t].instance;
                self.instances[index].costume = costume;
            }
            Stmt::If { .. } | Stmt::Repeat { .. } | Stmt::Until { .. } | Stmt::Forever(_) | Stmt::StopThisScript => {
                return internal("control statement reached the statement engine");
            }
        }
        Ok(Flow::Next)
    }

    fn read_var(&self, name: &str) -> Result<&Value> {
        match self.vars.get(name) {
            Some(v) => Ok(v),
            None => error(format!("unknown variable '{}'", name)),
        }
    }

    fn read_list(&self, name: &str) -> Result<&Vec<Value>> {
        match self.lists.get(name) {
            Some(items) => Ok(items),
            None => error(format!("unknown list '{}'", name)),
        }
    }

    fn list_mut(&mut self, name: &str) -> Result<&mut Vec<Value>> {
        match self.lists.get_mut(name) {
            Some(items) => Ok(items),
            None => error(format!("unknown list '{}'", name)),
        }
    }

    // ---- expressions ----

    fn eval(&mut self, t: usize, e: &Expr) -> Result<Value> {
        Ok(match e {
            Expr::Lit(v) => v.clone(),
            Expr::Var(name) => self.read_var(name)?.clone(),
            Expr::Arg(name) => {
                let frame = self.frame_mut(t)?;
                match frame.code.params.iter().position(|p| p == name) {
                    Some(i) => frame.args.get(i).cloned().unwrap_or_else(|| Value::Str(String::new())),
                    None => return error(format!("procedure '{}' has no parameter '{}'", frame.code.name, name)),
                }
            }
            Expr::Item { list, index } => {
                let index = self.eval(t, index)?;
                let items = self.read_list(list)?;
                match list_index(&index, items.len()) {
                    Some(i) => items[i].clone(),
                    None => Value::Str(String::new()),
                }
            }
            Expr::Length(list) => Value::Num(self.read_list(list)?.len() as f64),
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(t, lhs)?;
                let b = self.eval(t, rhs)?;
                binary(*op, &a, &b)
            }
            Expr::Not(inner) => Value::Bool(!self.eval(t, inner)?.to_bool()),
            Expr::Math { op, arg } => {
                let x = self.eval(t, arg)?.to_num();
                Value::Num(match op {
                    MathOp::Abs => x.abs(),
                    MathOp::Floor => x.floor(),
                    MathOp::Sqrt => x.sqrt(),
                })
            }
            Expr::Random { low, high } => {
                let low = self.eval(t, low)?;
                let high = self.eval(t, high)?;
                self.random(&low, &high)
            }
            Expr::Answer => self.answer.clone(),
            Expr::Timer => Value::Num(self.timer),
            Expr::Pending(n) => return internal(format!("unresolved stack value {} reached the runtime", n)),
        })
    }

    fn next_random(&mut self) -> f64 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        (self.rng >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Whole numbers give a whole result in `[low, high]`, anything else a
    /// fraction in the same range.
    fn random(&mut self, low: &Value, high: &Value) -> Value {
        let (a, b) = (low.to_num(), high.to_num());
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let r = self.next_random();
        if looks_integral(low) && looks_integral(high) {
            Value::Num((lo + (r * (hi - lo + 1.0)).floor()).min(hi))
        } else {
            Value::Num(lo + r * (hi - lo))
        }
    }
}

fn binary(op: BinOp, a: &Value, b: &Value) -> Value {
    use std::cmp::Ordering;
    match op {
        BinOp::Add => Value::Num(a.to_num() + b.to_num()),
        BinOp::Sub => Value::Num(a.to_num() - b.to_num()),
        BinOp::Mul => Value::Num(a.to_num() * b.to_num()),
        BinOp::Div => Value::Num(a.to_num() / b.to_num()),
        BinOp::Mod => Value::Num(floored_mod(a.to_num(), b.to_num())),
        BinOp::Eq => Value::Bool(a.loose_eq(b)),
        BinOp::Ne => Value::Bool(!a.loose_eq(b)),
        BinOp::Lt => Value::Bool(a.compare(b) == Ordering::Less),
        BinOp::Gt => Value::Bool(a.compare(b) == Ordering::Greater),
        BinOp::Le => Value::Bool(a.compare(b) != Ordering::Greater),
        BinOp::Ge => Value::Bool(a.compare(b) != Ordering::Less),
        BinOp::And => Value::Bool(a.to_bool() && b.to_bool()),
        BinOp::Or => Value::Bool(a.to_bool() || b.to_bool()),
        BinOp::Join => Value::Str(format!("{}{}", a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nano_target::{Proc, Script};

    fn unit(procs: Vec<Proc>, scripts: Vec<Script>) -> Unit {
        let mut u = Unit::new("stage", true);
        u.declare_variable("x", Value::zero());
        u.declare_list("items");
        u.procs = procs;
        u.scripts = scripts;
        u
    }

    fn flag(body: Vec<Stmt>) -> Script {
        Script { hat: Hat::Flag, body }
    }

    #[test]
    fn test_loose_arithmetic_and_comparison() {
        let n = |x: f64| Value::Num(x);
        let s = |x: &str| Value::Str(x.to_string());
        assert_eq!(binary(BinOp::Add, &s("2"), &n(3.0)), n(5.0));
        assert_eq!(binary(BinOp::Mod, &n(-1.0), &n(3.0)), n(2.0));
        assert_eq!(binary(BinOp::Eq, &s("ABC"), &s("abc")), Value::Bool(true));
        assert_eq!(binary(BinOp::Lt, &s("10"), &s("9")), Value::Bool(false));
        assert_eq!(binary(BinOp::Join, &n(1.0), &Value::Bool(true)), s("1true"));
    }

    #[test]
    fn test_out_of_range_list_access() {
        let body = vec![
            Stmt::append("items", Expr::num(1.0)),
            Stmt::replace("items", Expr::num(5.0), Expr::num(9.0)),
            Stmt::set("x", Expr::item("items", Expr::num(7.0))),
        ];
        let mut vm = Vm::new(&[unit(Vec::new(), vec![flag(body)])]);
        vm.green_flag();
        vm.run(10).unwrap();
        assert_eq!(vm.list("items").unwrap(), &[Value::Num(1.0)]);
        assert_eq!(vm.var("x"), Some(&Value::Str(String::new())));
    }

    #[test]
    fn test_non_warp_loops_yield_each_iteration() {
        let body = vec![Stmt::Repeat {
            count: Expr::num(3.0),
            body: vec![Stmt::change("x", Expr::num(1.0))],
        }];
        let mut vm = Vm::new(&[unit(Vec::new(), vec![flag(body)])]);
        vm.green_flag();
        vm.tick().unwrap();
        assert_eq!(vm.var("x"), Some(&Value::Num(1.0)));
        vm.run(10).unwrap();
        assert_eq!(vm.var("x"), Some(&Value::Num(3.0)));
        assert!(vm.is_idle());
    }

    #[test]
    fn test_warp_procedures_run_to_completion() {
        let count = Proc {
            name: "count".into(),
            params: vec!["n".into()],
            warp: true,
            body: vec![Stmt::Repeat {
                count: Expr::arg("n"),
                body: vec![Stmt::change("x", Expr::num(1.0))],
            }],
        };
        let body = vec![Stmt::call("count", vec![Expr::num(50.0)])];
        let mut vm = Vm::new(&[unit(vec![count], vec![flag(body)])]);
        vm.green_flag();
        vm.tick().unwrap();
        assert_eq!(vm.var("x"), Some(&Value::Num(50.0)));
    }

    #[test]
    fn test_stop_returns_from_the_procedure_only() {
        let early = Proc {
            name: "early".into(),
            params: Vec::new(),
            warp: true,
            body: vec![Stmt::StopThisScript, Stmt::set("x", Expr::num(1.0))],
        };
        let body = vec![Stmt::call("early", Vec::new()), Stmt::Say(Expr::str("after"))];
        let mut vm = Vm::new(&[unit(vec![early], vec![flag(body)])]);
        vm.green_flag();
        vm.run(5).unwrap();
        assert_eq!(vm.var("x"), Some(&Value::zero()));
        assert_eq!(vm.said(), &["after".to_string()]);
    }

    #[test]
    fn test_step_limit() {
        let body = vec![Stmt::Forever(vec![Stmt::change("x", Expr::num(1.0))])];
        let spin = Proc {
            name: "spin".into(),
            params: Vec::new(),
            warp: true,
            body,
        };
        let mut vm = Vm::new(&[unit(vec![spin], Vec::new())]).with_limits(Limits { max_steps: 1000 });
        let err = vm.call("stage", "spin", Vec::new()).unwrap_err();
        assert!(err.msg.contains("step limit"));
    }

    #[test]
    fn test_pending_values_are_rejected() {
        let body = vec![Stmt::set("x", Expr::Pending(0))];
        let mut vm = Vm::new(&[unit(Vec::new(), vec![flag(body)])]);
        vm.green_flag();
        assert!(vm.tick().unwrap_err().is_internal());
    }

    #[test]
    fn test_ask_reads_queued_answers() {
        let body = vec![Stmt::Ask(Expr::str("name?")), Stmt::set("x", Expr::Answer)];
        let mut vm = Vm::new(&[unit(Vec::new(), vec![flag(body)])]);
        vm.push_answer("Ada");
        vm.green_flag();
        vm.run(5).unwrap();
        assert_eq!(vm.var("x"), Some(&Value::Str("Ada".into())));
    }

    #[test]
    fn test_wait_uses_the_tick_clock() {
        let body = vec![Stmt::Wait(Expr::num(1.0)), Stmt::set("x", Expr::num(1.0))];
        let mut vm = Vm::new(&[unit(Vec::new(), vec![flag(body)])]);
        vm.green_flag();
        let ticks = vm.run(100).unwrap();
        assert!((30..=32).contains(&ticks), "{}", ticks);
        assert_eq!(vm.var("x"), Some(&Value::Num(1.0)));
    }

    #[test]
    fn test_random_is_seeded_and_in_range() {
        let mut a = Vm::new(&[]).with_seed(7);
        let mut b = Vm::new(&[]).with_seed(7);
        for _ in 0..100 {
            let x = a.random(&Value::Num(1.0), &Value::Num(6.0));
            assert_eq!(x, b.random(&Value::Num(1.0), &Value::Num(6.0)));
            let n = x.to_num();
            assert!((1.0..=6.0).contains(&n) && n.fract() == 0.0);
        }
    }
}
