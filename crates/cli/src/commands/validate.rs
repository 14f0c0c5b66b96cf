//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::Scenario;
use serde::Serialize;
use tracing::info;

use super::load_scenario;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ScenarioSummary>,
}

#[derive(Serialize)]
struct ScenarioSummary {
    version: String,
    name: String,
    duration_s: f64,
    cue_count: usize,
    timeline_steps: usize,
    lookahead_s: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating scenario");

    let result = validate_scenario(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Scenario validation failed")
    }
}

fn validate_scenario(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_scenario(&args.config) {
        Ok(scenario) => {
            let warnings = collect_warnings(&scenario);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ScenarioSummary {
                    version: format!("{:?}", scenario.version),
                    name: scenario.name.clone(),
                    duration_s: scenario.duration_s,
                    cue_count: scenario.cue_count(),
                    timeline_steps: scenario.timeline.len(),
                    lookahead_s: scenario.sequencer.lookahead_s,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect non-fatal issues
fn collect_warnings(scenario: &Scenario) -> Vec<String> {
    let mut warnings = Vec::new();

    if scenario.cues.is_empty() && scenario.cue_steps() == 0 {
        warnings.push("No cues defined - the run will produce no events".to_string());
    }

    let m = &scenario.motion;
    if m.velocity == 0.0 && m.acceleration == 0.0 && scenario.motion_steps() == 0 {
        warnings.push("Motion never moves - only INIT events will be produced".to_string());
    }

    let late = scenario
        .timeline
        .iter()
        .filter(|s| s.at > scenario.duration_s)
        .count();
    if late > 0 {
        warnings.push(format!(
            "{late} timeline step(s) after duration_s ({}) will not run",
            scenario.duration_s
        ));
    }

    for cue in &scenario.cues {
        let Some(interval) = &cue.interval else {
            warnings.push(format!("Cue '{}' has no interval and is ignored", cue.key));
            continue;
        };
        if interval.high() < m.range.low || interval.low() > m.range.high {
            warnings.push(format!(
                "Cue '{}' {} lies outside the motion range",
                cue.key, interval
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Scenario is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            if !summary.name.is_empty() {
                println!("  Name: {}", summary.name);
            }
            println!("  Duration: {}s", summary.duration_s);
            println!("  Cues: {}", summary.cue_count);
            println!("  Timeline steps: {}", summary.timeline_steps);
            println!("  Lookahead: {}s", summary.lookahead_s);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Scenario is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
