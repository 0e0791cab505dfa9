//! brookc: compiles brook libraries from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use brook_lang::{Builder, CompileOptions, CompileState, ReferenceLibrary, SourceFile};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brookc")]
#[command(author, version, about = "Brook library compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile source files into a library
    Compile {
        #[command(flatten)]
        input: Input,

        /// Write the reference surface (for dependents) as JSON
        #[arg(long, value_name = "FILE")]
        emit_reference: Option<PathBuf>,

        /// Write the runtime library as JSON
        #[arg(long, value_name = "FILE")]
        emit_library: Option<PathBuf>,

        /// Include the symbol table in the library
        #[arg(long)]
        symbols: bool,

        /// Include the debug line table in the library
        #[arg(long)]
        debug_table: bool,

        /// Do not give functions an implicit exit
        #[arg(long)]
        ignore_implicit_exit: bool,
    },

    /// Check source files for errors without writing anything
    Check {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args)]
struct Input {
    /// Source file(s), in compile order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Library name
    #[arg(short, long)]
    name: String,

    /// Reference surface of a dependency (JSON, from --emit-reference)
    #[arg(short, long = "rely", value_name = "FILE")]
    relies: Vec<PathBuf>,
}

fn main() -> ExitCode {
    if let Ok(filter) = EnvFilter::try_from_env("BROOK_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Compile { input, emit_reference, emit_library, symbols, debug_table, ignore_implicit_exit } => {
            let options = CompileOptions::default()
                .with_symbol_table(symbols)
                .with_debug_table(debug_table)
                .with_ignore_implicit_exit(ignore_implicit_exit);
            compile(&input, options, emit_reference.as_deref(), emit_library.as_deref())
        }
        Commands::Check { input } => compile(&input, CompileOptions::default(), None, None),
    };

    match result {
        Ok(CompileState::Completed) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn read_sources(files: &[PathBuf]) -> Result<Vec<SourceFile>> {
    files
        .iter()
        .map(|file| {
            let text = fs::read_to_string(file)
                .with_context(|| format!("failed to read source file: {}", file.display()))?;
            Ok(SourceFile::new(file.display().to_string(), text))
        })
        .collect()
}

fn read_relies(files: &[PathBuf]) -> Result<Vec<ReferenceLibrary>> {
    files
        .iter()
        .map(|file| {
            let json = fs::read_to_string(file)
                .with_context(|| format!("failed to read rely library: {}", file.display()))?;
            serde_json::from_str(&json).with_context(|| format!("malformed rely library: {}", file.display()))
        })
        .collect()
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn compile(
    input: &Input,
    options: CompileOptions,
    emit_reference: Option<&Path>,
    emit_library: Option<&Path>,
) -> Result<CompileState> {
    let sources = read_sources(&input.files)?;
    let relies = read_relies(&input.relies)?;
    tracing::debug!(files = sources.len(), relies = relies.len(), "inputs read");

    let mut builder = Builder::new(&input.name, sources, relies).with_options(options);
    let state = builder.compile();
    for diagnostic in builder.diagnostics() {
        eprintln!("{diagnostic}");
    }

    match state {
        CompileState::Completed => {
            if let (Some(path), Some(reference)) = (emit_reference, builder.reference()) {
                write_json(path, reference)?;
            }
            if let (Some(path), Some(library)) = (emit_library, builder.library()) {
                write_json(path, library)?;
            }
            eprintln!("{}: ok", input.name);
        }
        CompileState::Failed => {
            eprintln!("{}: {} error(s)", input.name, builder.diagnostics().len());
        }
        CompileState::Accident => eprintln!("{}: internal compiler error", input.name),
        CompileState::Unstart | CompileState::Compiling => {}
    }
    Ok(state)
}
