//! Paper Pigeon CLI: offline rebuilds and snapshot inspection
//!
//! Works directly against the configured record store and snapshot files; no
//! running server is needed.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use paper_pigeon::cache::read_snapshot;
use paper_pigeon::{GraphAssembler, LabRegistry, LabResolver, PipelineConfig, SnapshotWriter};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "paper-pigeon", version, about = "Paper Pigeon graph pipeline CLI")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "PIGEON_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every record, assemble the graph and write the snapshot
    Build {
        /// Snapshot destination; defaults to the configured write path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a snapshot file and print its counts
    Inspect {
        /// Snapshot file
        path: PathBuf,
    },
    /// Show how a free-text lab name resolves
    Resolve {
        /// Lab name as a researcher would type it
        name: String,

        /// Minimum score to accept a match
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build { out } => run_build(cli.config, out, &cli.format).await,
        Commands::Inspect { path } => run_inspect(path, &cli.format).await,
        Commands::Resolve { name, threshold } => run_resolve(&name, threshold, &cli.format),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_build(
    config_file: Option<PathBuf>,
    out: Option<PathBuf>,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let config = PipelineConfig::load(config_file.as_deref()).context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    let started = Instant::now();
    let fetcher = config.build_fetcher().context("connecting to the record store")?;
    let inputs = fetcher.fetch_inputs().await.context("fetching records")?;
    let (snapshot, report) = GraphAssembler::default().assemble_with_report(&inputs);

    let out = out.unwrap_or_else(|| config.cache.write_path.clone());
    SnapshotWriter::new(&out)
        .write(&snapshot)
        .await
        .with_context(|| format!("writing {}", out.display()))?;

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "path": out.display().to_string(),
                "nodes": snapshot.node_count(),
                "links": snapshot.edge_count(),
                "duration_ms": started.elapsed().as_millis() as u64,
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Check", "Count"]);
            let rows = [
                ("researchers", report.researchers),
                ("labs", report.labs),
                ("duplicate researchers", report.duplicate_researchers),
                ("lab id collisions", report.lab_id_collisions),
                ("missing publications", report.missing_publications),
                ("invalid influence", report.invalid_influence),
                ("dropped edges", report.dropped_edges),
                ("duplicate edges", report.duplicate_edges),
                ("affiliations", report.affiliations),
                ("unresolved lab names", report.unresolved_lab_names),
            ];
            for (check, count) in rows {
                table.add_row(vec![check.to_string(), count.to_string()]);
            }
            println!("{}", table);
            println!(
                "Wrote {} ({} nodes, {} links) in {} ms",
                out.display(),
                snapshot.node_count(),
                snapshot.edge_count(),
                started.elapsed().as_millis()
            );
        }
    }

    Ok(())
}

async fn run_inspect(path: PathBuf, format: &OutputFormat) -> anyhow::Result<()> {
    let snapshot = read_snapshot(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let stats = snapshot.stats();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Element", "Type", "Count"]);
            for (kind, count) in &stats.nodes_by_kind {
                table.add_row(vec!["node".to_string(), kind.as_str().to_string(), count.to_string()]);
            }
            for (kind, count) in &stats.edges_by_kind {
                table.add_row(vec!["link".to_string(), kind.as_str().to_string(), count.to_string()]);
            }
            println!("{}", table);
            println!("{} node(s), {} link(s)", stats.node_count, stats.edge_count);
        }
    }

    Ok(())
}

fn run_resolve(name: &str, threshold: Option<f64>, format: &OutputFormat) -> anyhow::Result<()> {
    let resolver = match threshold {
        Some(t) => LabResolver::with_threshold(t),
        None => LabResolver::new(),
    };
    let registry = LabRegistry::canonical();
    let candidates = resolver.candidates(name, registry.labs());

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        OutputFormat::Table => {
            if candidates.is_empty() {
                println!("(no lab scores above {:.2})", resolver.threshold());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Lab", "Name", "Score", "Match"]);
            for candidate in &candidates {
                table.add_row(vec![
                    candidate.lab.id.clone(),
                    candidate.lab.name.clone(),
                    format!("{:.3}", candidate.score),
                    candidate.kind.as_str().to_string(),
                ]);
            }
            println!("{}", table);
            println!("Resolved to {}", candidates[0].lab.id);
        }
    }

    Ok(())
}
