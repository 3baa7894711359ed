//! Program components: procedures, hat scripts and units.

use crate::ir::Stmt;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Proc {
    pub name: String,
    pub params: Vec<String>,
    /// Runs to completion without yielding.
    pub warp: bool,
    pub body: Vec<Stmt>,
}

/// The event that starts a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Hat {
    Flag,
    Key(String),
    Click,
    Backdrop(String),
    Loudness(f64),
    Timer(f64),
    Broadcast(String),
    Clone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub hat: Hat,
    pub body: Vec<Stmt>,
}

/// One sprite, or the stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    pub name: String,
    pub stage: bool,
    pub costumes: Vec<String>,
    pub sounds: Vec<String>,
    /// Lists declared by this unit. The stage declares the shared ones.
    pub lists: Vec<String>,
    /// Cells declared by this unit, with their initial values.
    pub variables: Vec<(String, Value)>,
    pub procs: Vec<Proc>,
    pub scripts: Vec<Script>,
}

impl Unit {
    pub fn new(name: impl Into<String>, stage: bool) -> Self {
        Self {
            name: name.into(),
            stage,
            ..Self::default()
        }
    }

    pub fn proc(&self, name: &str) -> Option<&Proc> {
        self.procs.iter().find(|p| p.name == name)
    }

    pub fn declare_variable(&mut self, name: impl Into<String>, init: Value) {
        let name = name.into();
        if !self.variables.iter().any(|(n, _)| *n == name) {
            self.variables.push((name, init));
        }
    }

    pub fn declare_list(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.lists.contains(&name) {
            self.lists.push(name);
        }
    }
}
