//! Build report: where every local and static ended up.

use serde::Serialize;

use crate::statics::{StaticLocation, StaticTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalReport {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// `"stack"`, or the name of the global cell holding the local.
    pub placement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub recursive: bool,
    pub warp: bool,
    pub locals: Vec<LocalReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub name: String,
    pub stage: bool,
    pub functions: Vec<FunctionReport>,
    pub events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticReport {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(flatten)]
    pub location: StaticLocation,
}

impl StaticReport {
    pub fn from_table(table: &StaticTable) -> Vec<StaticReport> {
        table
            .entries()
            .iter()
            .map(|e| StaticReport {
                name: e.var.name.clone(),
                ty: e.var.ty.to_string(),
                location: e.location.clone(),
            })
            .collect()
    }
}
