//! Unit compiler from typed AST to target IR.

use nano_syntax::ast::*;
use nano_syntax::error::{internal, Result};
use nano_target::{Hat, Proc, Unit, Value};

use crate::analysis::{Analysis, Placement};
use crate::builder::{FuncBuilder, Kind};
use crate::report::{FunctionReport, LocalReport, UnitReport};
use crate::runtime;
use crate::statics::StaticTable;
use crate::Options;

pub struct Compiler {
    options: Options,
    statics: StaticTable,
    reports: Vec<UnitReport>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Compiler {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            statics: StaticTable::default(),
            reports: Vec::new(),
        }
    }

    pub fn with_statics(mut self, statics: StaticTable) -> Self {
        self.statics = statics;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn statics(&self) -> &StaticTable {
        &self.statics
    }

    /// Placement reports of every unit compiled so far.
    pub fn reports(&self) -> &[UnitReport] {
        &self.reports
    }

    /// Compiles the stage and its sprites. Statics are placed first, since
    /// a sprite taking a static's address moves it to the heap for all.
    pub fn compile_project(&mut self, stage_name: &str, stage: &Program, sprites: &[(String, Program)]) -> Result<Vec<Unit>> {
        self.statics = StaticTable::compose(stage, sprites.iter().map(|(_, p)| p))?;
        let mut units = Vec::with_capacity(sprites.len() + 1);
        units.push(self.compile_unit(stage_name, stage, true)?);
        for (name, program) in sprites {
            units.push(self.compile_unit(name, program, false)?);
        }
        Ok(units)
    }

    pub fn compile_unit(&mut self, name: &str, program: &Program, stage: bool) -> Result<Unit> {
        let analysis = Analysis::of(program);
        let mut unit = Unit::new(name, stage);
        unit.costumes = program.costumes.clone();
        unit.sounds = program.sounds.clone();
        if stage {
            runtime::declare_shared(&mut unit);
            self.statics.declare(&mut unit);
        }
        unit.procs.extend(runtime::bootstrap(self.options.stack_size));
        if stage {
            unit.procs.push(self.statics.init_proc());
            unit.scripts.push(runtime::start_script());
        }

        let mut report = UnitReport { name: name.to_string(), stage, functions: Vec::new(), events: program.events.len() };
        for f in program.functions.values() {
            let placement = analysis.function_placement(f);
            for p in &placement {
                if let Placement::Global(cell) = p {
                    unit.declare_variable(cell.as_str(), Value::zero());
                }
            }
            report.functions.push(function_report(f, &placement, analysis.is_recursive(&f.name)));
            unit.procs.push(self.compile_function(f, placement)?);
        }
        for (i, event) in program.events.iter().enumerate() {
            let proc_name = format!("event_{}", i);
            unit.procs.push(self.compile_event(&proc_name, event)?);
            unit.scripts.push(runtime::event_script(hat_of(event)?, &proc_name));
        }
        self.reports.push(report);
        Ok(unit)
    }

    fn compile_function(&self, f: &Function, placement: Vec<Placement>) -> Result<Proc> {
        let mut b = FuncBuilder::new(Kind::Function { params: f.params.len() }, placement);
        b.prologue();
        b.emit_stmts(self, &f.body.stmts)?;
        if !f.body.unescapable {
            b.epilogue();
        }
        let guard = b.stack_guard(self.options.stack_size);
        let mut body = b.finish();
        body.insert(0, guard);
        Ok(Proc {
            name: format!("fn_{}", f.name),
            params: vec![runtime::SLOT.to_string()],
            warp: f.attributes.warp,
            body,
        })
    }

    /// Events own their thread: no prologue, and the slot is released when
    /// the body ends. The stack guard goes first in both kinds of procedure.
    fn compile_event(&self, name: &str, event: &Event) -> Result<Proc> {
        let placement = vec![Placement::Stack; event.locals.len()];
        let mut b = FuncBuilder::new(Kind::Event, placement);
        b.emit_stmts(self, &event.body.stmts)?;
        if !event.body.unescapable {
            b.release_thread();
        }
        let guard = b.uses_stack().then(|| b.stack_guard(self.options.stack_size));
        let mut body = b.finish();
        if let Some(guard) = guard {
            body.insert(0, guard);
        }
        Ok(Proc {
            name: name.to_string(),
            params: vec![runtime::SLOT.to_string()],
            warp: event.attributes.warp,
            body,
        })
    }
}

fn function_report(f: &Function, placement: &[Placement], recursive: bool) -> FunctionReport {
    let locals = f
        .locals
        .iter()
        .zip(placement)
        .map(|(local, p)| LocalReport {
            name: local.name.clone(),
            ty: local.ty.to_string(),
            placement: match p {
                Placement::Global(cell) => cell.clone(),
                Placement::Stack => "stack".to_string(),
            },
        })
        .collect();
    FunctionReport { name: f.name.clone(), recursive, warp: f.attributes.warp, locals }
}

/// The hat starting an event. Flag events wait for the start broadcast so
/// the runtime is initialized before they run.
pub(crate) fn hat_of(event: &Event) -> Result<Hat> {
    let text = || match &event.param {
        Some(Literal::String(s)) => Ok(s.clone()),
        _ => internal(format!("{:?} event without a string parameter", event.kind)),
    };
    let number = || match &event.param {
        Some(Literal::Number(n)) => Ok(*n),
        _ => internal(format!("{:?} event without a number parameter", event.kind)),
    };
    Ok(match event.kind {
        EventKind::Flag => Hat::Broadcast(runtime::START_MESSAGE.to_string()),
        EventKind::KeyPressed => Hat::Key(text()?),
        EventKind::Clicked => Hat::Click,
        EventKind::BackdropSwitched => Hat::Backdrop(text()?),
        EventKind::Loudness => Hat::Loudness(number()?),
        EventKind::Timer => Hat::Timer(number()?),
        EventKind::BroadcastReceived => Hat::Broadcast(text()?),
        EventKind::CloneStart => Hat::Clone,
    })
}
