//! Static variable placement shared by every unit of a project.

use serde::Serialize;

use nano_syntax::ast::{Literal, Program, StaticVar};
use nano_syntax::error::{error, internal, Result};
use nano_target::{Expr, Proc, Stmt, Unit, Value};

use crate::runtime::{self, Place};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "storage", content = "cell", rename_all = "lowercase")]
pub enum StaticLocation {
    /// Lives directly in the named cell.
    Flat(String),
    /// Lives in a heap cell whose address is kept in the named cell.
    Heap(String),
}

#[derive(Debug, Clone)]
pub struct StaticEntry {
    pub var: StaticVar,
    pub location: StaticLocation,
}

/// Where each static lives. Built once all units are parsed, since a static
/// is heap-placed as soon as any unit takes its address.
#[derive(Debug, Clone, Default)]
pub struct StaticTable {
    entries: Vec<StaticEntry>,
}

pub fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => Value::Num(*n),
        Literal::String(s) => Value::Str(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
    }
}

impl StaticTable {
    pub fn compose<'a>(stage: &Program, units: impl IntoIterator<Item = &'a Program>) -> Result<Self> {
        let mut addressed = stage.addressed_statics.clone();
        for unit in units {
            if !unit.statics.is_empty() {
                return error("static variables may only be declared in the stage");
            }
            addressed.extend(unit.addressed_statics.iter().cloned());
        }
        let entries = stage
            .statics
            .iter()
            .map(|var| {
                let location = if addressed.contains(&var.name) {
                    StaticLocation::Heap(format!("static_ptr_{}", var.name))
                } else {
                    StaticLocation::Flat(format!("static_{}", var.name))
                };
                StaticEntry {
                    var: var.clone(),
                    location,
                }
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[StaticEntry] {
        &self.entries
    }

    pub fn location(&self, name: &str) -> Option<&StaticLocation> {
        self.entries
            .iter()
            .find(|e| e.var.name == name)
            .map(|e| &e.location)
    }

    pub fn place(&self, name: &str) -> Result<Place> {
        match self.location(name) {
            Some(StaticLocation::Flat(cell)) => Ok(Place::Cell(cell.clone())),
            Some(StaticLocation::Heap(cell)) => Ok(Place::Mem(Expr::var(cell.as_str()))),
            None => internal(format!("static '{}' has no location", name)),
        }
    }

    pub fn address(&self, name: &str) -> Result<Expr> {
        match self.location(name) {
            Some(StaticLocation::Heap(cell)) => Ok(Expr::var(cell.as_str())),
            Some(StaticLocation::Flat(_)) => internal(format!("static '{}' is address-taken but not heap-placed", name)),
            None => internal(format!("static '{}' has no location", name)),
        }
    }

    /// Declares the static cells on the stage.
    pub fn declare(&self, unit: &mut Unit) {
        for entry in &self.entries {
            match &entry.location {
                StaticLocation::Flat(cell) => unit.declare_variable(cell.as_str(), literal_value(&entry.var.init)),
                StaticLocation::Heap(cell) => unit.declare_variable(cell.as_str(), Value::zero()),
            }
        }
    }

    /// `internal_init_statics`: heap-allocates address-taken statics and
    /// writes every initializer.
    pub fn init_proc(&self) -> Proc {
        let mut body = Vec::new();
        for entry in &self.entries {
            let init = Expr::Lit(literal_value(&entry.var.init));
            match &entry.location {
                StaticLocation::Flat(cell) => body.push(Stmt::set(cell.as_str(), init)),
                StaticLocation::Heap(cell) => {
                    body.push(Stmt::call(runtime::ALLOC, vec![Expr::num(1.0)]));
                    body.push(Stmt::set(cell.as_str(), runtime::var(runtime::ALLOC_RET)));
                    body.push(Place::Mem(Expr::var(cell.as_str())).write(init));
                }
            }
        }
        Proc {
            name: runtime::INIT_STATICS.to_string(),
            params: Vec::new(),
            warp: true,
            body,
        }
    }
}
