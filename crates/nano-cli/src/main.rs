mod diagnostics;
mod manifest;
mod project;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use owo_colors::OwoColorize;

use nano_codegen::{parse_stack_size, Options, STACK_SIZE_ENV};
use nano_target::{render, Unit};
use nano_vm::Vm;

use manifest::Manifest;
use project::{Failure, Project, SourceUnit};

#[derive(Parser, Debug)]
#[command(name = "nanoc", version, about = "Compile nano projects to block-runtime units")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile every unit of a project into the output directory
    Build(BuildArgs),
    /// Parse and compile a project without writing anything
    Check(CommonArgs),
    /// Compile a project and run it on the built-in block VM
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Project directory containing stage.nano
    project: PathBuf,

    /// Cells per thread stack; overrides NANO_STACK_SIZE
    #[arg(long = "stack-size")]
    stack_size: Option<String>,

    /// Print each unit as it is processed
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output directory; default: <project>/build
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Also write manifest.json describing locals and statics
    #[arg(long = "manifest", default_value_t = false)]
    manifest: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Ticks to run before stopping
    #[arg(long = "ticks", default_value_t = 3000)]
    ticks: usize,

    /// Queued replies for ask(), in order
    #[arg(long = "answer", action = ArgAction::Append)]
    answers: Vec<String>,
}

fn options(common: &CommonArgs) -> Result<Options, Failure> {
    match &common.stack_size {
        Some(text) => Ok(Options::default().with_stack_size(parse_stack_size(text)?)),
        None => Options::from_env().map_err(|e| Failure::Message(format!("{}: {}", STACK_SIZE_ENV, e.msg))),
    }
}

fn progress(verbose: bool) -> impl FnMut(&SourceUnit) {
    move |unit: &SourceUnit| {
        if verbose {
            eprintln!("{} {}", "Compiling".green().bold(), unit.file);
        }
    }
}

/// Discovers, parses and compiles a project.
fn compile(common: &CommonArgs, asset_root: &Path) -> Result<(Project, Vec<Unit>, nano_codegen::Compiler), Failure> {
    let options = options(common)?;
    let project = Project::discover(&common.project)?;
    let parsed = project::parse(&project, asset_root, progress(common.verbose))?;
    let (units, compiler) = project::compile(&project, &parsed, options)?;
    Ok((project, units, compiler))
}

fn build(args: &BuildArgs) -> Result<(), Failure> {
    let out_dir = args
        .output
        .clone()
        .unwrap_or_else(|| args.common.project.join("build"));
    fs::create_dir_all(&out_dir)
        .map_err(|e| Failure::Message(format!("Failed to create {}: {}", out_dir.display(), e)))?;
    let asset_root = project::relative_path(&out_dir, &args.common.project);

    let (project, units, compiler) = compile(&args.common, &asset_root)?;
    let mut files = Vec::with_capacity(units.len());
    for (source, unit) in project.units().zip(&units) {
        let output = format!("{}.gs", source.name);
        let path = out_dir.join(&output);
        fs::write(&path, render(unit))
            .map_err(|e| Failure::Message(format!("Failed to write {}: {}", path.display(), e)))?;
        if args.common.verbose {
            eprintln!("{} {}", "Wrote".green().bold(), path.display());
        }
        files.push((source.file.clone(), output));
    }

    if args.manifest {
        Manifest::new(&compiler, &project.stage.name, &files)
            .write(&out_dir)
            .map_err(Failure::Message)?;
    }
    println!(
        "{} {} unit(s) into {}",
        "Built".green().bold(),
        units.len(),
        out_dir.display()
    );
    Ok(())
}

fn check(args: &CommonArgs) -> Result<(), Failure> {
    let (project, units, _) = compile(args, Path::new(""))?;
    println!("{} {} ({} unit(s))", "Checked".green().bold(), project.root.display(), units.len());
    Ok(())
}

fn run(args: &RunArgs) -> Result<(), Failure> {
    let (_, units, _) = compile(&args.common, &args.common.project)?;
    let mut vm = Vm::new(&units);
    for answer in &args.answers {
        vm.push_answer(answer);
    }
    vm.green_flag();
    vm.run(args.ticks).map_err(Failure::Runtime)?;
    for line in vm.said() {
        println!("{}", line);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Build(args) => build(args),
        Command::Check(args) => check(args),
        Command::Run(args) => run(args),
    };
    if let Err(failure) = result {
        failure.report();
        std::process::exit(1);
    }
}
