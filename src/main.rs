use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trellis_spec::{CompatibilityMode, parse_workflow};
use trellis_validator::{SchemaIssue, Validator};

/// Trellis - a declarative workflow compiler
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log at debug level (overridden by RUST_LOG)
  #[arg(long, short, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Parse and validate a workflow document
  Check {
    /// Path to the workflow file (YAML or JSON)
    workflow_file: PathBuf,

    /// Compatibility mode, overriding the document's options (strict or warn)
    #[arg(long)]
    mode: Option<CompatibilityMode>,

    /// Print issues as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cli.command {
    Some(Commands::Check {
      workflow_file,
      mode,
      json,
    }) => check(workflow_file, mode, json),
    None => {
      println!("trellis - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

fn check(workflow_file: PathBuf, mode: Option<CompatibilityMode>, json: bool) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  let content = rt.block_on(async {
    tokio::fs::read_to_string(&workflow_file)
      .await
      .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))
  })?;

  let spec = parse_workflow(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  let mode = mode.unwrap_or(spec.mode());
  let report = Validator::new(mode).validate(&spec);

  if json {
    println!("{}", serde_json::to_string_pretty(&report.issues)?);
  } else {
    eprintln!(
      "Checked workflow: {} ({} steps, {} mode)",
      spec.id,
      spec.steps.len(),
      mode.as_str()
    );
    for issue in &report.issues {
      print_issue(issue);
    }
  }

  let errors = report.errors().count();
  info!(workflow_id = %spec.id, errors, issues = report.issues.len(), "check_completed");
  if errors > 0 {
    bail!("{} error(s) in {}", errors, workflow_file.display());
  }
  Ok(())
}

fn print_issue(issue: &SchemaIssue) {
  println!("{} {}: {}", issue.severity, issue.path, issue.message);
}
