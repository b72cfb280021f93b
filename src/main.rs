//! `stackc` CLI: reads an already-parsed [`stackc::Program`] as JSON,
//! runs semantic analysis and code generation, and writes the emitted
//! listing. Parsing the source language itself is out of scope — some
//! other tool produces the JSON this reads.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;

use stackc::config::CompilerConfig;
use stackc::{compile, CompileResult, Program};

#[derive(ClapParser)]
#[command(name = "stackc")]
#[command(about = "Semantic analysis and code generation for a small imperative language", long_about = None)]
struct Cli {
    /// Input AST, JSON-serialized `Program`. Reads stdin if omitted.
    input: Option<PathBuf>,

    /// Output path for the emitted listing. Writes stdout if omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Class name used in the emitted listing (overrides --config).
    #[arg(long)]
    class_name: Option<String>,

    /// TOML config file providing `class_name` and other options.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (`-v` debug, `-vv` trace). Also honors
    /// `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "stackc=debug",
        _ => "stackc=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Returns the process exit code: nonzero on any analysis error, zero
/// otherwise.
fn run(cli: &Cli) -> Result<i32, String> {
    let config = load_config(cli)?;

    let input_text = match &cli.input {
        Some(path) => fs::read_to_string(path).map_err(|e| format!("failed to read '{}': {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(|e| format!("failed to read stdin: {e}"))?;
            buf
        }
    };

    let program: Program = serde_json::from_str(&input_text).map_err(|e| format!("failed to parse AST JSON: {e}"))?;

    match compile(program, &config) {
        CompileResult::Ok { listing, diagnostics } => {
            for line in diagnostics.render_all() {
                eprintln!("{line}");
            }
            write_output(cli, &listing)?;
            Ok(0)
        }
        CompileResult::AnalysisFailed(diagnostics) => {
            for line in diagnostics.render_all() {
                eprintln!("{line}");
            }
            Ok(diagnostics.exit_code())
        }
    }
}

fn load_config(cli: &Cli) -> Result<CompilerConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("failed to read config '{}': {e}", path.display()))?;
            CompilerConfig::from_toml_str(&text)?
        }
        None => CompilerConfig::default(),
    };
    if let Some(name) = &cli.class_name {
        config = config.with_class_name(name.clone());
    }
    Ok(config)
}

fn write_output(cli: &Cli, listing: &str) -> Result<(), String> {
    match &cli.output {
        Some(path) => fs::write(path, listing).map_err(|e| format!("failed to write '{}': {e}", path.display())),
        None => io::stdout().write_all(listing.as_bytes()).map_err(|e| format!("failed to write stdout: {e}")),
    }
}
