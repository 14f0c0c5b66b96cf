//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::Scenario;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::load_scenario;
use crate::cli::InfoArgs;

/// Scenario info for JSON output
#[derive(Serialize)]
struct ScenarioInfo {
    version: String,
    name: String,
    duration_s: f64,
    lookahead_s: f64,
    /// Bucket bounds as text; `inf` has no JSON number form
    size_classes: Vec<String>,
    motion: MotionInfo,
    cue_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cues: Vec<CueInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    timeline: Vec<StepInfo>,
}

#[derive(Serialize)]
struct MotionInfo {
    position: f64,
    velocity: f64,
    acceleration: f64,
    range: String,
}

#[derive(Serialize)]
struct CueInfo {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Serialize)]
struct StepInfo {
    at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    motion: Option<String>,
    cues: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading scenario info");

    let scenario = load_scenario(&args.config)
        .with_context(|| format!("Failed to load scenario from {}", args.config.display()))?;

    if args.json {
        let info = build_scenario_info(&scenario, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize scenario info")?;
        println!("{}", json);
    } else {
        print_scenario_info(&scenario, args);
    }

    Ok(())
}

fn describe_motion(update: &contracts::MotionUpdate) -> String {
    let mut parts = Vec::new();
    if let Some(p) = update.position {
        parts.push(format!("p={p}"));
    }
    if let Some(v) = update.velocity {
        parts.push(format!("v={v}"));
    }
    if let Some(a) = update.acceleration {
        parts.push(format!("a={a}"));
    }
    parts.join(" ")
}

fn build_scenario_info(scenario: &Scenario, args: &InfoArgs) -> ScenarioInfo {
    let cues = if args.cues {
        scenario
            .cues
            .iter()
            .map(|c| CueInfo {
                key: c.key.to_string(),
                interval: c.interval.map(|i| i.to_string()),
                data: c.data.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let timeline = if args.timeline {
        scenario
            .timeline
            .iter()
            .map(|s| StepInfo {
                at: s.at,
                motion: s.motion.as_ref().map(describe_motion),
                cues: s.cues.len(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let m = &scenario.motion;
    ScenarioInfo {
        version: format!("{:?}", scenario.version),
        name: scenario.name.clone(),
        duration_s: scenario.duration_s,
        lookahead_s: scenario.sequencer.lookahead_s,
        size_classes: scenario
            .axis
            .size_classes
            .iter()
            .map(|c| c.to_string())
            .collect(),
        motion: MotionInfo {
            position: m.position,
            velocity: m.velocity,
            acceleration: m.acceleration,
            range: format!("[{}, {}]", m.range.low, m.range.high),
        },
        cue_count: scenario.cue_count(),
        cues,
        timeline,
    }
}

fn print_scenario_info(scenario: &Scenario, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Cue Sequencer Scenario                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Scenario");
    println!("   ├─ Version: {:?}", scenario.version);
    if !scenario.name.is_empty() {
        println!("   ├─ Name: {}", scenario.name);
    }
    println!("   ├─ Duration: {}s", scenario.duration_s);
    println!("   └─ Lookahead: {}s", scenario.sequencer.lookahead_s);

    let m = &scenario.motion;
    println!("\n🏃 Motion");
    println!("   ├─ Position: {}", m.position);
    println!("   ├─ Velocity: {}", m.velocity);
    println!("   ├─ Acceleration: {}", m.acceleration);
    println!("   └─ Range: [{}, {}]", m.range.low, m.range.high);

    println!("\n🎯 Cues ({})", scenario.cue_count());
    if args.cues {
        for (i, cue) in scenario.cues.iter().enumerate() {
            let prefix = if i == scenario.cues.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            let interval = cue
                .interval
                .map(|iv| iv.to_string())
                .unwrap_or_else(|| "-".to_string());
            match &cue.data {
                Some(data) => println!("   {} {} {} {}", prefix, cue.key, interval, data),
                None => println!("   {} {} {}", prefix, cue.key, interval),
            }
        }
    }

    let classes: Vec<String> = scenario
        .axis
        .size_classes
        .iter()
        .map(|c| c.to_string())
        .collect();
    println!("\n⚙️  Axis");
    println!("   └─ Size classes: {}", classes.join(", "));

    if !scenario.timeline.is_empty() {
        println!(
            "\n⏱  Timeline ({} motion, {} cue)",
            scenario.motion_steps(),
            scenario.cue_steps()
        );
        if args.timeline {
            for (i, step) in scenario.timeline.iter().enumerate() {
                let prefix = if i == scenario.timeline.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                let motion = step
                    .motion
                    .as_ref()
                    .map(describe_motion)
                    .unwrap_or_default();
                println!(
                    "   {} t={} {} cues={}",
                    prefix,
                    step.at,
                    motion,
                    step.cues.len()
                );
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_info_json_is_finite() {
        let scenario = ConfigLoader::load_from_str(
            r#"
[[cues]]
key = "a"
interval = { low = 1.0, high = 2.0 }
data = { x = 1 }
[[timeline]]
at = 1.0
motion = { velocity = 2.0 }
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        let args = InfoArgs {
            config: "unused.toml".into(),
            json: true,
            cues: true,
            timeline: true,
        };
        let info = build_scenario_info(&scenario, &args);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["size_classes"][6], "inf");
        assert_eq!(json["motion"]["range"], "[-inf, inf]");
        assert_eq!(json["cues"][0]["interval"], "[1,2)");
        assert_eq!(json["timeline"][0]["motion"], "v=2");
    }
}
