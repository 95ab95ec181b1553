//! RKTL co-simulation harness CLI
//!
//! Runs fixture scripts against the reference environment.

use clap::Parser;
use rktl_sim::{
    CommandRecorder, CoSimWorld, FixtureScript, HarnessConfig, ProtocolExport, ProtocolReport,
    ScriptId,
};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// RKTL co-simulation protocol harness
#[derive(Parser, Debug)]
#[command(name = "rktl-sim")]
#[command(about = "Drive an RL environment through scripted co-simulation fixtures", long_about = None)]
struct Args {
    /// Seed for action sampling (overrides the config file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Script to run (standard, determinism, ongoing, all, or a YAML file)
    #[arg(short = 'S', long, default_value = "all")]
    script: String,

    /// Harness configuration (YAML)
    #[arg(short, long)]
    config: Option<String>,

    /// Clock tick rate in Hz (overrides the config file)
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Real-time factor (overrides the config file)
    #[arg(long)]
    rtf: Option<f64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export reports and recorded commands to a JSON file
    #[arg(long)]
    export: Option<String>,
}

const RECORDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

enum Selected {
    Builtin(ScriptId),
    File(FixtureScript),
}

fn select_scripts(arg: &str) -> Result<Vec<Selected>, String> {
    if arg == "all" {
        return Ok(ScriptId::all().into_iter().map(Selected::Builtin).collect());
    }
    if let Ok(id) = arg.parse::<ScriptId>() {
        return Ok(vec![Selected::Builtin(id)]);
    }
    if Path::new(arg).exists() {
        return FixtureScript::load(arg)
            .map(|script| vec![Selected::File(script)])
            .map_err(|e| format!("{}: {}", arg, e));
    }
    Err(format!(
        "Unknown script: {} (available: standard, determinism, ongoing, all, or a YAML file)",
        arg
    ))
}

fn load_config(args: &Args) -> Result<HarnessConfig, String> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path).map_err(|e| format!("{}: {}", path, e))?,
        None => HarnessConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(hz) = args.tick_rate {
        config.tick_rate_hz = hz;
    }
    if let Some(rtf) = args.rtf {
        config.real_time_factor = rtf;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Runs one script against a fresh world and reference environment.
async fn run_selected(
    config: &HarnessConfig,
    selected: &Selected,
    export: &mut ProtocolExport,
) -> ProtocolReport {
    let world = CoSimWorld::start(config.clone());
    let (recorder, recording) = CommandRecorder::spawn(&world.bus);
    let mut driver = world.into_reference_driver();

    let report = match selected {
        Selected::Builtin(id) => driver.run(*id).await,
        Selected::File(script) => driver.run_script(script).await,
    };

    // Dropping the driver releases the clock and the reset endpoint; the
    // publisher then stops and the bus closes behind the last command
    drop(driver);
    match tokio::time::timeout(RECORDER_DRAIN_TIMEOUT, recording).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Command recorder failed: {}", e),
        Err(_) => warn!("Command recorder still running; export may miss commands"),
    }

    let mut commands = std::mem::take(&mut export.commands);
    commands.extend(recorder.samples());
    export.set_commands(commands);
    report
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to set tracing subscriber");
    }

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    });
    let scripts = select_scripts(&args.script).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    });

    if !args.json {
        info!("RKTL co-simulation harness v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "seed={} tick_rate={}Hz rtf={}",
            config.seed, config.tick_rate_hz, config.real_time_factor
        );
    }

    let mut export = ProtocolExport::new(config.clone());
    for selected in &scripts {
        let report = run_selected(&config, selected, &mut export).await;

        if !args.json {
            if report.passed {
                info!("✓ {} (run={} seed={}) PASSED", report.script, report.run_id, report.seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    report.script,
                    report.seed,
                    report.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        export.add_report(report);
    }

    let total = export.reports.len();
    let failed = export.reports.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": export.reports.iter().map(|r| {
                serde_json::json!({
                    "script": r.script,
                    "seed": r.seed,
                    "run_id": r.run_id.as_uuid().to_string(),
                    "passed": r.passed,
                    "fixtures_run": r.fixtures_run,
                    "time_secs": r.final_time_secs,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("✅ All {} script runs passed!", total);
        } else {
            error!("❌ {}/{} script runs failed!", failed, total);
        }
    }

    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} reports to {}", total, path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }

    // Exit with proper code for CI
    if failed > 0 {
        std::process::exit(1);
    }
}
