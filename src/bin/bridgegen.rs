//! Bridgegen CLI
//!
//! Compiles a source dialect, a target dialect and a field mapping document
//! into a generated Rust conversion module.
//!
//! Usage:
//!   bridgegen common.xml hellenic.xml mapping.xml src/generated
//!   bridgegen common.xml hellenic.xml mapping.xml src/generated --check

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bridgegen::codegen;
use bridgegen::config::GeneratorConfig;
use bridgegen::dialect::loader;
use bridgegen::error::Error;
use bridgegen::{mapping, plan};

#[derive(Parser)]
#[command(name = "bridgegen")]
#[command(about = "Compile cross-dialect message conversion code")]
#[command(version)]
struct Cli {
    /// Source dialect document
    source_schema: PathBuf,

    /// Target dialect document
    target_schema: PathBuf,

    /// Field mapping document
    mapping_schema: PathBuf,

    /// Directory the generated module is written to
    output_dir: PathBuf,

    /// Compare would-be artifacts against the output directory without writing
    #[arg(long)]
    check: bool,

    /// Config file to use instead of the default search locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
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
    let config = GeneratorConfig::load_from(cli.config.as_deref())?;

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    println!("🔍 Loading dialects...");
    let source = loader::load(&cli.source_schema)?;
    println!(
        "  📂 {}: {} messages, {} enums",
        source.name(),
        source.messages().len(),
        source.enums().len()
    );
    let target = loader::load(&cli.target_schema)?;
    println!(
        "  📂 {}: {} messages, {} enums",
        target.name(),
        target.messages().len(),
        target.enums().len()
    );

    println!("🔍 Resolving mappings...");
    let mut mappings = match mapping::resolve(&cli.mapping_schema, &source, &target) {
        Ok(set) => set,
        Err(Error::Semantic(diagnostics)) => {
            eprintln!("{}", diagnostics.format_all());
            eprintln!("\n❌ Mapping resolution failed");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    let warnings = mappings.take_warnings();
    if !warnings.is_empty() {
        eprintln!("{}", warnings.format_all());
    }

    let plan = plan::plan(&mappings, &source, &target, config.plan_options());
    if !plan.diagnostics.is_empty() {
        eprintln!("{}", plan.diagnostics.format_all());
    }
    let failed = plan.has_errors();
    println!("  📊 {} conversion units planned", plan.units.len());

    let bundle = codegen::generate(&source, &target, &plan.units, &config.emit_options());

    if cli.check {
        let report = bundle.check_drift(&cli.output_dir);
        for path in &report.missing {
            println!("❌ missing: {}", path);
        }
        for stale in &report.stale {
            println!("❌ stale: {}", stale.path);
            println!("{}", stale.diff);
        }
        if !report.is_clean() || failed {
            eprintln!("\n❌ Generated code is out of date - rerun bridgegen");
            std::process::exit(1);
        }
        eprintln!("\n✅ {} files up to date", report.clean);
        return Ok(());
    }

    bundle.write_to(&cli.output_dir)?;
    println!(
        "  📊 {} files written to {}",
        bundle.files.len(),
        cli.output_dir.display()
    );

    if failed {
        eprintln!("\n❌ Completed with errors - failed units were skipped");
        std::process::exit(1);
    }
    eprintln!("\n✅ Generated {} converters for {} target messages",
        bundle.unit_count, bundle.message_count);
    Ok(())
}
