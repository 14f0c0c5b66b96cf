//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{CueEvent, Scenario};
use tracing::{info, warn};

use super::load_scenario;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::simulation::Simulation;

/// Execute the `run` command
pub async fn run_scenario(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading scenario");

    let mut scenario = load_scenario(&args.config)?;
    if let Some(duration) = args.duration {
        info!(duration, "Overriding scenario duration from CLI");
        scenario.duration_s = duration;
        config_loader::ConfigLoader::validate(&scenario).map_err(CliError::from)?;
    }

    info!(
        name = %scenario.name,
        cues = scenario.cue_count(),
        steps = scenario.timeline.len(),
        duration_s = scenario.duration_s,
        realtime = args.realtime,
        "Scenario loaded"
    );

    if args.dry_run {
        info!("Dry run mode - scenario is valid, exiting");
        print_scenario_summary(&scenario);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let json = args.json;
    let silent = args.summary_only;
    let print = move |batch: &[CueEvent]| {
        if silent {
            return;
        }
        for event in batch {
            if !json {
                println!("{event}");
                continue;
            }
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, key = %event.key(), "Failed to serialize event"),
            }
        }
    };

    let simulation = Simulation::new(scenario);
    let stats = if args.realtime {
        simulation
            .run_realtime(args.buffer_size, print, shutdown_signal())
            .await?
    } else {
        simulation.run(print)?
    };

    if json {
        let report =
            serde_json::to_string(&stats.report()).context("Failed to serialize run summary")?;
        println!("{report}");
    } else {
        stats.print_summary();
    }

    info!("Cue sequencer finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print scenario summary for dry-run mode
fn print_scenario_summary(scenario: &Scenario) {
    println!("\n=== Scenario Summary ===\n");
    if !scenario.name.is_empty() {
        println!("Name: {}", scenario.name);
    }
    println!("Duration: {}s", scenario.duration_s);
    println!("Lookahead: {}s", scenario.sequencer.lookahead_s);

    let m = &scenario.motion;
    println!(
        "\nMotion: p={} v={} a={} range=[{}, {}]",
        m.position, m.velocity, m.acceleration, m.range.low, m.range.high
    );

    println!("\nCues ({}):", scenario.cue_count());
    for cue in &scenario.cues {
        match &cue.interval {
            Some(interval) => println!("  - {} {}", cue.key, interval),
            None => println!("  - {} (no interval)", cue.key),
        }
    }

    if !scenario.timeline.is_empty() {
        println!(
            "\nTimeline: {} steps ({} motion, {} cue)",
            scenario.timeline.len(),
            scenario.motion_steps(),
            scenario.cue_steps()
        );
    }

    println!();
}
