//! gleaner CLI - inspect and validate YAML parser manifests
//!
//! Manifests only declare steps; their callables live in Rust code. This tool
//! checks a manifest and prints the order in which an engine would run it.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use gleaner::{ParserManifest, StepPlan};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gleaner")]
#[command(version, about = "Inspect declarative document parser manifests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a parser manifest (kinds, step names, duplicates)
    Validate {
        /// Path to the manifest YAML file
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Print the execution plan of a parser manifest
    Plan {
        /// Path to the manifest YAML file
        #[arg(short, long)]
        manifest: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { manifest } => validate_manifest(manifest),
        Commands::Plan { manifest, json } => print_plan(manifest, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Validate a manifest without printing its plan
fn validate_manifest(path: PathBuf) -> Result<(), String> {
    let manifest = ParserManifest::load_from_file(&path).map_err(|e| e.to_string())?;

    let attributes = manifest.attributes().map_err(|e| e.to_string())?;

    println!(
        "✓ {}: {} steps, {} attributes",
        manifest.name,
        manifest.steps.len(),
        attributes.len()
    );
    if let Some(description) = &manifest.description {
        println!("  {}", description);
    }

    Ok(())
}

/// Print steps in execution order
fn print_plan(path: PathBuf, json: bool) -> Result<(), String> {
    let manifest = ParserManifest::load_from_file(&path).map_err(|e| e.to_string())?;
    let plan = manifest.plan().map_err(|e| e.to_string())?;

    if json {
        let out = serde_json::to_string_pretty(&plan)
            .map_err(|e| format!("Failed to serialize plan: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", manifest.name);
    if let Some(description) = &manifest.description {
        println!("{}", description);
    }
    for step in &plan {
        let doc = manifest
            .get_step(&step.name)
            .and_then(|decl| decl.doc.as_deref());
        println!("{}", format_step(step, doc));
    }

    Ok(())
}

fn format_step(step: &StepPlan, doc: Option<&str>) -> String {
    let priority = step
        .priority
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());

    let line = format!(
        "  {:>3}  {:<9}  {:>8}  {}",
        step.position, step.kind, priority, step.name
    );

    match doc {
        Some(doc) => format!("{}  # {}", line, doc),
        None => line,
    }
}
