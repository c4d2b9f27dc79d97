//! Dialect Lint CLI
//!
//! Loads dialect documents (or scans directories for `.xml`) and reports
//! structural smells. Warnings never affect the exit status; parse failures
//! do.
//!
//! Usage:
//!   dialect-lint dialects/common.xml
//!   dialect-lint dialects/ --format json

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use bridgegen::lint;

#[derive(Parser)]
#[command(name = "dialect-lint")]
#[command(about = "Report structural smells in dialect documents")]
#[command(version)]
struct Cli {
    /// Dialect documents, or directories to scan for .xml
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let results = lint::lint_paths(&cli.paths);
    let parse_failures = results.iter().filter(|r| !r.is_clean()).count();

    match cli.format {
        Format::Json => {
            let report = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "files": results,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Format::Text => {
            for result in &results {
                if !result.has_findings() {
                    continue;
                }
                println!("📂 {}", result.file);
                for finding in &result.errors {
                    println!("  ❌ [{}] {}", finding.code, finding.message);
                }
                for finding in &result.warnings {
                    println!("  ⚠️  [{}] {}: {}", finding.code, finding.item, finding.message);
                }
            }
            let warning_count: usize = results.iter().map(|r| r.warnings.len()).sum();
            println!(
                "📊 {} files checked, {} warnings, {} parse failures",
                results.len(),
                warning_count,
                parse_failures
            );
        }
    }

    if parse_failures > 0 {
        eprintln!("\n❌ {} dialect document(s) failed to parse", parse_failures);
        std::process::exit(1);
    }
    Ok(())
}
