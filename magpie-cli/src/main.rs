//! Magpie command-line interface
//!
//! Drives a collection run end to end: build the adapter registry from
//! configuration, fan the target out across its modules, correlate the
//! raw results, and write the graph payload to disk.

mod config;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use magpie_core::{SourceStatus, Target, TargetKind};
use magpie_correlate::{document_entities, project};
use magpie_runtime::Orchestrator;

use config::MagpieConfig;

#[derive(Parser)]
#[command(name = "magpie")]
#[command(author, version, about = "Magpie: OSINT collection orchestration and entity correlation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, global = true, default_value = "1")]
    verbose: u8,

    /// Configuration file (or set MAGPIE_CONFIG env var)
    #[arg(short, long, global = true, env = "MAGPIE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a collection against one target and write the result graph
    Collect {
        /// The target value: a domain, IP address, email address, or person name
        #[arg(short, long)]
        target: String,

        /// What kind of target the value is
        #[arg(short, long, value_enum, default_value = "domain")]
        kind: KindArg,

        /// Module to collect from (repeatable); defaults to every configured module
        #[arg(short, long = "module")]
        modules: Vec<String>,

        /// Output file for the graph payload (default: graph_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write flattened entity documents next to the graph
        #[arg(long)]
        documents: bool,
    },

    /// List the modules the current configuration provides
    Modules,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Domain,
    Ip,
    Email,
    Person,
}

impl From<KindArg> for TargetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Domain => TargetKind::Domain,
            KindArg::Ip => TargetKind::Ip,
            KindArg::Email => TargetKind::Email,
            KindArg::Person => TargetKind::Person,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = MagpieConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Collect {
            target,
            kind,
            modules,
            output,
            documents,
        } => {
            run_collect(config, &target, kind.into(), modules, output, documents).await?;
        }
        Commands::Modules => {
            list_modules(config)?;
        }
    }

    Ok(())
}

async fn run_collect(
    config: MagpieConfig,
    raw_target: &str,
    kind: TargetKind,
    modules: Vec<String>,
    output: Option<PathBuf>,
    documents: bool,
) -> Result<()> {
    println!("🔎 Magpie - OSINT Collection & Correlation\n");

    let registry = config
        .sources
        .build_registry()
        .context("building source registry")?;

    let requested = if modules.is_empty() {
        registry.modules()
    } else {
        modules
    };

    let target = Target::new(kind, raw_target)
        .context("invalid target")?
        .with_modules(requested);

    println!("🎯 Target:  {} ({})", target.value, target.kind);
    println!(
        "📦 Modules: {}",
        target
            .modules
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "⏱️  Budget:  {}s global, {}s per module\n",
        config.orchestrator.global_deadline_secs, config.orchestrator.per_module_timeout_secs
    );

    println!("🚀 Starting collection...");
    let orchestrator = Orchestrator::new(registry, config.orchestrator);
    let run = orchestrator.collect_intelligence(target).await?;

    println!("\n📋 Module results:");
    for result in &run.raw_results {
        match result.status {
            SourceStatus::Ok => println!(
                "   ✅ {:<12} {} entities in {}ms",
                result.module,
                result.entities.len(),
                result.duration.as_millis()
            ),
            SourceStatus::Timeout => println!(
                "   ⏰ {:<12} timed out after {}ms",
                result.module,
                result.duration.as_millis()
            ),
            SourceStatus::Error => println!(
                "   ❌ {:<12} {}",
                result.module,
                result.error_detail.as_deref().unwrap_or("failed")
            ),
            SourceStatus::Skipped => println!(
                "   ⚠️  {:<12} skipped (no adapter configured)",
                result.module
            ),
        }
    }

    println!("\n✅ Collection complete!");
    println!(
        "🧩 {} entities, {} relationships{}",
        run.entities.len(),
        run.relationships.len(),
        if run.partial_failure {
            " (partial results)"
        } else {
            ""
        }
    );

    let payload = project(&run);
    let output_path = output.unwrap_or_else(|| {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(format!("graph_{}.json", timestamp))
    });
    fs::write(&output_path, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("writing graph payload to {}", output_path.display()))?;
    println!("📄 Graph payload saved to: {}", output_path.display());

    if documents {
        let docs = document_entities(&run);
        let docs_path = output_path.with_extension("entities.json");
        fs::write(&docs_path, serde_json::to_string_pretty(&docs)?)
            .with_context(|| format!("writing entity documents to {}", docs_path.display()))?;
        println!("🗂️  Entity documents saved to: {}", docs_path.display());
    }

    Ok(())
}

fn list_modules(config: MagpieConfig) -> Result<()> {
    let registry = config
        .sources
        .build_registry()
        .context("building source registry")?;

    if registry.is_empty() {
        println!("No modules configured.");
        println!("Enable adapters with [sources.*] sections in the config file:");
        println!("   [sources.spiderfoot]");
        println!("   base_url = \"http://127.0.0.1:5001\"");
        return Ok(());
    }

    println!("Configured modules:");
    for module in registry.modules() {
        println!("   - {}", module);
    }

    Ok(())
}
