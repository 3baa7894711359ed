//! Project discovery and the parse -> compose -> compile pipeline.
//!
//! A project is a directory holding `stage.nano` and any number of other
//! `.nano` files, one sprite each. The stage is parsed first so sprites can
//! see its statics; statics are placed once every unit is parsed.

use std::fs;
use std::path::{Component, Path, PathBuf};

use nano_codegen::{Compiler, Options, StaticTable};
use nano_lexer::Lexer;
use nano_parser::Parser;
use nano_syntax::ast::{Program, StaticVar};
use nano_syntax::error::Error;
use nano_target::Unit;

use crate::diagnostics::{provide_error_suggestions, render_error, render_failure};

pub const STAGE_FILE: &str = "stage.nano";
pub const EXTENSION: &str = "nano";

pub struct SourceUnit {
    /// File stem, used as the unit and output name.
    pub name: String,
    pub file: String,
    pub source: String,
}

pub struct Project {
    pub root: PathBuf,
    pub stage: SourceUnit,
    pub sprites: Vec<SourceUnit>,
}

/// Why a command stopped.
pub enum Failure {
    Message(String),
    Runtime(Error),
    Unit {
        kind: &'static str,
        file: String,
        source: String,
        error: Error,
    },
}

impl Failure {
    pub fn report(&self) {
        match self {
            Failure::Message(msg) => render_failure(msg),
            Failure::Runtime(error) => {
                render_failure(&format!("Runtime error: {}", error.msg));
                provide_error_suggestions(&error.msg);
            }
            Failure::Unit {
                kind,
                file,
                source,
                error,
            } => render_error(kind, file, source, error),
        }
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Failure::Message(error.to_string())
    }
}

fn read_unit(path: &Path) -> Result<SourceUnit, Failure> {
    let source = fs::read_to_string(path)
        .map_err(|e| Failure::Message(format!("Failed to read {}: {}", path.display(), e)))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let file = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(SourceUnit { name, file, source })
}

impl Project {
    pub fn discover(root: &Path) -> Result<Project, Failure> {
        if !root.is_dir() {
            return Err(Failure::Message(format!("Project directory not found: {}", root.display())));
        }
        let stage_path = root.join(STAGE_FILE);
        if !stage_path.is_file() {
            return Err(Failure::Message(format!(
                "{} has no {}; every project needs a stage",
                root.display(),
                STAGE_FILE
            )));
        }
        let stage = read_unit(&stage_path)?;

        let entries = fs::read_dir(root)
            .map_err(|e| Failure::Message(format!("Failed to list {}: {}", root.display(), e)))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some(EXTENSION) && *p != stage_path)
            .collect();
        paths.sort();
        let sprites = paths.iter().map(|p| read_unit(p)).collect::<Result<Vec<_>, _>>()?;

        Ok(Project {
            root: root.to_path_buf(),
            stage,
            sprites,
        })
    }

    pub fn unit_count(&self) -> usize {
        self.sprites.len() + 1
    }

    pub fn units(&self) -> impl Iterator<Item = &SourceUnit> {
        std::iter::once(&self.stage).chain(self.sprites.iter())
    }
}

/// Every unit of a project, parsed.
pub struct Parsed {
    pub stage: Program,
    pub sprites: Vec<Program>,
}

fn parse_unit(unit: &SourceUnit, statics: Option<&[StaticVar]>, asset_root: &Path) -> Result<Program, Failure> {
    let located = |kind: &'static str, error: Error| Failure::Unit {
        kind,
        file: unit.file.clone(),
        source: unit.source.clone(),
        error,
    };
    let tokens = Lexer::new(&unit.source).tokenize().map_err(|e| located("Lex", e))?;
    let parser = Parser::new(tokens).with_asset_root(asset_root);
    let mut parser = match statics {
        Some(statics) => parser.with_statics(statics),
        None => parser.as_stage(),
    };
    parser.parse_program().map_err(|e| located("Parse", e))
}

pub fn parse(project: &Project, asset_root: &Path, mut progress: impl FnMut(&SourceUnit)) -> Result<Parsed, Failure> {
    progress(&project.stage);
    let stage = parse_unit(&project.stage, None, asset_root)?;
    let mut sprites = Vec::with_capacity(project.sprites.len());
    for unit in &project.sprites {
        progress(unit);
        sprites.push(parse_unit(unit, Some(&stage.statics), asset_root)?);
    }
    Ok(Parsed { stage, sprites })
}

/// Compiles every unit, stage first.
pub fn compile(project: &Project, parsed: &Parsed, options: Options) -> Result<(Vec<Unit>, Compiler), Failure> {
    let statics = StaticTable::compose(&parsed.stage, &parsed.sprites)?;
    let mut compiler = Compiler::new(options).with_statics(statics);
    let programs = std::iter::once(&parsed.stage).chain(parsed.sprites.iter());
    let mut units = Vec::with_capacity(project.unit_count());
    for (i, (source, program)) in project.units().zip(programs).enumerate() {
        let unit = compiler
            .compile_unit(&source.name, program, i == 0)
            .map_err(|error| Failure::Unit {
                kind: "Compile",
                file: source.file.clone(),
                source: source.source.clone(),
                error,
            })?;
        units.push(unit);
    }
    Ok((units, compiler))
}

/// Lexical path from directory `from` to `to`. Both must exist.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let (Ok(from), Ok(to)) = (from.canonicalize(), to.canonicalize()) else {
        return to.to_path_buf();
    };
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for c in &to[common..] {
        out.push(c.as_os_str());
    }
    out
}
