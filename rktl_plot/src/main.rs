//! RKTL plotting node CLI
//!
//! Reads newline-delimited JSON diagnostic messages from a file or stdin
//! and saves training charts.

use clap::Parser;
use rktl_env::DiagnosticStatus;
use rktl_plot::{parse_line, PlotConfig, PlotNode, PlotSchema};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// RKTL training-metrics plotting node
#[derive(Parser, Debug)]
#[command(name = "rktl-plot")]
#[command(about = "Aggregate training diagnostics and save chart documents", long_about = None)]
struct Args {
    /// Plot configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// NDJSON metrics input; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory (overrides the config file)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// List the plottable variables and exit
    #[arg(long)]
    list: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<PlotConfig, String> {
    let mut config = match &args.config {
        Some(path) => PlotConfig::load(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => PlotConfig::default(),
    };
    if let Some(dir) = &args.log_dir {
        config.log_dir = dir.clone();
    }
    Ok(config)
}

/// Forwards decodable lines to the node. Returns (lines read, lines dropped).
async fn pump<R>(reader: R, tx: mpsc::Sender<DiagnosticStatus>) -> std::io::Result<(u64, u64)>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut read = 0;
    let mut dropped = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        read += 1;
        match parse_line(&line) {
            Ok(status) => {
                if tx.send(status).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Dropping input line {}: {}", read, e);
                dropped += 1;
            }
        }
    }
    Ok((read, dropped))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }

    if args.list {
        for spec in PlotSchema.variables() {
            println!("{:<20} {:<9} {}", spec.name, spec.role.to_string(), spec.label);
        }
        return;
    }

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    });
    let node = PlotNode::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    });

    info!("RKTL plotting node v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let (tx, rx) = mpsc::channel(256);
    let node_task = tokio::spawn(node.run(rx));

    let pumped = match &args.input {
        Some(path) => match tokio::fs::File::open(path).await {
            Ok(file) => pump(BufReader::new(file), tx).await,
            Err(e) => {
                error!("Cannot open {}: {}", path.display(), e);
                drop(tx);
                Err(e)
            }
        },
        None => pump(BufReader::new(tokio::io::stdin()), tx).await,
    };

    let stats = match node_task.await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Plotting task failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match pumped {
        Ok((read, dropped)) => info!(
            "✓ {} lines read, {} undecodable, {} episodes plotted, {} messages dropped, {} saves",
            read, dropped, stats.accepted, stats.dropped, stats.saves
        ),
        Err(e) => {
            error!("✗ Input error: {}", e);
            std::process::exit(1);
        }
    }

    if stats.failed_saves > 0 {
        error!("✗ {} chart saves failed", stats.failed_saves);
        std::process::exit(1);
    }
}
