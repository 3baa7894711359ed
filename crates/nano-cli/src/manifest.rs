use std::fs;
use std::path::Path;

use serde::Serialize;

use nano_codegen::{Compiler, StaticReport, UnitReport};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Serialize)]
pub struct UnitEntry {
    pub source: String,
    pub output: String,
    #[serde(flatten)]
    pub report: UnitReport,
}

/// Summary of one build, written next to the generated units.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub generated_at: String,
    pub compiler_version: String,
    pub stage: String,
    pub stack_size: usize,
    pub units: Vec<UnitEntry>,
    pub statics: Vec<StaticReport>,
}

impl Manifest {
    /// `files` pairs each unit's source file with its output file, in
    /// compilation order.
    pub fn new(compiler: &Compiler, stage: &str, files: &[(String, String)]) -> Self {
        let units = compiler
            .reports()
            .iter()
            .zip(files)
            .map(|(report, (source, output))| UnitEntry {
                source: source.clone(),
                output: output.clone(),
                report: report.clone(),
            })
            .collect();
        Manifest {
            generated_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            compiler_version: env!("CARGO_PKG_VERSION").to_string(),
            stage: stage.to_string(),
            stack_size: compiler.options().stack_size,
            units,
            statics: StaticReport::from_table(compiler.statics()),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self).map_err(|e| format!("Failed to serialize manifest: {}", e))?;
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nano_codegen::Options;
    use nano_lexer::Lexer;
    use nano_parser::Parser;

    #[test]
    fn test_manifest_lists_units_and_statics() {
        let tokens = Lexer::new("var hits = 0\nfunc twice(n: number): number\n    return n * 2\nend\n")
            .tokenize()
            .unwrap();
        let stage = Parser::new(tokens).as_stage().parse_program().unwrap();
        let mut compiler = Compiler::new(Options::default().with_stack_size(32));
        compiler.compile_project("stage", &stage, &[]).unwrap();
        let manifest = Manifest::new(&compiler, "stage", &[("stage.nano".into(), "stage.gs".into())]);

        let json: serde_json::Value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["stack_size"], 32);
        assert_eq!(json["units"][0]["source"], "stage.nano");
        assert_eq!(json["units"][0]["name"], "stage");
        assert_eq!(json["units"][0]["functions"][0]["name"], "twice");
        assert_eq!(json["statics"][0]["name"], "hits");
        assert_eq!(json["statics"][0]["storage"], "flat");
        assert_eq!(json["statics"][0]["cell"], "static_hits");
        assert!(json["generated_at"].as_str().unwrap().ends_with('Z'));
    }
}
