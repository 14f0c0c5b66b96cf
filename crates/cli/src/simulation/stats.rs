//! Run statistics.

use std::time::Duration;

use observability::SequencerMetricsAggregator;
use serde::Serialize;

/// Statistics from a scenario run
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    /// Time covered on the motion clock, in seconds
    pub simulated_s: f64,

    /// Wall time spent
    pub wall: Duration,

    /// Timeline steps applied
    pub steps_applied: usize,

    /// Times the motion was stopped at a range bound
    pub range_stops: usize,

    pub final_position: f64,

    /// Cues on the axis at the end of the run
    pub final_cues: usize,

    /// Keys active at the end of the run, in activation order
    pub final_active: Vec<String>,

    /// Points indexed by the axis buckets at the end of the run
    pub indexed_points: usize,

    pub metrics: SequencerMetricsAggregator,
}

/// JSON form of [`SimulationStats`]
#[derive(Debug, Serialize)]
pub struct StatsReport {
    simulated_s: f64,
    wall_ms: f64,
    steps_applied: usize,
    range_stops: usize,
    final_position: f64,
    final_cues: usize,
    final_active: Vec<String>,
    indexed_points: usize,
    batches: u64,
    events: u64,
    enters: u64,
    exits: u64,
    changes: u64,
    mean_lateness_ms: f64,
}

impl SimulationStats {
    pub fn report(&self) -> StatsReport {
        let summary = self.metrics.summary();
        StatsReport {
            simulated_s: self.simulated_s,
            wall_ms: self.wall.as_secs_f64() * 1000.0,
            steps_applied: self.steps_applied,
            range_stops: self.range_stops,
            final_position: self.final_position,
            final_cues: self.final_cues,
            final_active: self.final_active.clone(),
            indexed_points: self.indexed_points,
            batches: summary.total_batches,
            events: summary.total_events,
            enters: summary.enters,
            exits: summary.exits,
            changes: summary.changes,
            mean_lateness_ms: summary.lateness_ms.mean,
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Run Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Simulated: {:.3}s", self.simulated_s);
        println!("   ├─ Wall time: {:.2}ms", self.wall.as_secs_f64() * 1000.0);
        println!("   ├─ Timeline steps: {}", self.steps_applied);
        println!("   ├─ Range stops: {}", self.range_stops);
        println!("   └─ Final position: {:.3}", self.final_position);

        println!("\n🎯 Axis");
        println!("   ├─ Cues: {}", self.final_cues);
        println!("   ├─ Indexed points: {}", self.indexed_points);
        if self.final_active.is_empty() {
            println!("   └─ Active: (none)");
        } else {
            println!("   └─ Active: {}", self.final_active.join(", "));
        }

        let summary = self.metrics.summary();
        println!("\n📈 Events");
        println!("   ├─ Batches: {}", summary.total_batches);
        println!(
            "   ├─ Events: {} (enter={}, exit={}, change={})",
            summary.total_events, summary.enters, summary.exits, summary.changes
        );
        for (cause, n) in &summary.per_cause {
            println!("   ├─ {}: {}", cause, n);
        }
        println!("   ├─ Batch size: {}", summary.batch_size);
        println!("   └─ Lateness (ms): {}", summary.lateness_ms);

        println!();
    }
}
