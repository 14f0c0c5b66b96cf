//! 序列器指标收集模块
//!
//! Axis 批量更新、Schedule 加载与事件批次的运行指标。

use std::collections::HashMap;

use contracts::{Cause, CueEvent};
use metrics::{counter, gauge, histogram};

/// 记录一次 Axis 批量更新
pub fn record_axis_batch(entries: usize, changed: usize, elapsed_ms: f64) {
    counter!("cue_sequencer_axis_batches_total").increment(1);
    counter!("cue_sequencer_axis_entries_total").increment(entries as u64);
    counter!("cue_sequencer_axis_changes_total").increment(changed as u64);
    histogram!("cue_sequencer_axis_batch_ms").record(elapsed_ms);
}

/// 记录 Bucket 索引重建
pub fn record_bucket_flush(max_length: f64, inserted: usize, removed: usize) {
    let bucket = max_length.to_string();
    counter!("cue_sequencer_points_inserted_total", "bucket" => bucket.clone())
        .increment(inserted as u64);
    counter!("cue_sequencer_points_removed_total", "bucket" => bucket).increment(removed as u64);
}

/// 记录 Axis 当前规模
pub fn record_axis_size(cues: usize) {
    gauge!("cue_sequencer_axis_cues").set(cues as f64);
}

/// 记录结构完整性错误
pub fn record_integrity_violation() {
    counter!("cue_sequencer_integrity_violations_total").increment(1);
}

/// 记录 Schedule 窗口加载
pub fn record_schedule_load(tasks: usize, dropped: usize) {
    counter!("cue_sequencer_schedule_loads_total").increment(1);
    histogram!("cue_sequencer_schedule_tasks").record(tasks as f64);
    if dropped > 0 {
        counter!("cue_sequencer_crossings_dropped_total").increment(dropped as u64);
    }
}

/// 记录一个事件批次
///
/// 每个批次按 cause / verb 计数，并记录投递延迟 (毫秒)。
pub fn record_event_batch(events: &[CueEvent]) {
    if events.is_empty() {
        return;
    }
    counter!("cue_sequencer_event_batches_total").increment(1);
    for ev in events {
        counter!(
            "cue_sequencer_events_total",
            "cause" => ev.cause.as_str(),
            "verb" => ev.verb()
        )
        .increment(1);
        if ev.cause == Cause::Playback {
            histogram!("cue_sequencer_delivery_lateness_ms").record(ev.lateness() * 1000.0);
        }
    }
}

/// 记录当前活动 cue 数
pub fn record_active_cues(active: usize) {
    gauge!("cue_sequencer_active_cues").set(active as f64);
}

/// 序列器指标聚合器
///
/// 在内存中聚合事件批次，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SequencerMetricsAggregator {
    pub total_batches: u64,
    pub total_events: u64,
    pub enters: u64,
    pub exits: u64,
    pub changes: u64,
    pub per_cause: HashMap<Cause, u64>,
    /// 投递延迟 (毫秒)，仅 PLAYBACK
    pub lateness_ms: RunningStats,
    pub batch_size: RunningStats,
}

impl SequencerMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, events: &[CueEvent]) {
        if events.is_empty() {
            return;
        }
        self.total_batches += 1;
        self.batch_size.push(events.len() as f64);
        for ev in events {
            self.total_events += 1;
            match (ev.enter, ev.exit) {
                (true, _) => self.enters += 1,
                (_, true) => self.exits += 1,
                _ => self.changes += 1,
            }
            *self.per_cause.entry(ev.cause).or_insert(0) += 1;
            if ev.cause == Cause::Playback {
                self.lateness_ms.push(ev.lateness() * 1000.0);
            }
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let mut per_cause: Vec<(String, u64)> = self
            .per_cause
            .iter()
            .map(|(c, n)| (c.as_str().to_string(), *n))
            .collect();
        per_cause.sort();
        MetricsSummary {
            total_batches: self.total_batches,
            total_events: self.total_events,
            enters: self.enters,
            exits: self.exits,
            changes: self.changes,
            per_cause,
            lateness_ms: StatsSummary::from(&self.lateness_ms),
            batch_size: StatsSummary::from(&self.batch_size),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub total_events: u64,
    pub enters: u64,
    pub exits: u64,
    pub changes: u64,
    pub per_cause: Vec<(String, u64)>,
    pub lateness_ms: StatsSummary,
    pub batch_size: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sequencer Metrics Summary ===")?;
        writeln!(f, "Batches: {}", self.total_batches)?;
        writeln!(
            f,
            "Events: {} (enter={}, exit={}, change={})",
            self.total_events, self.enters, self.exits, self.changes
        )?;
        for (cause, n) in &self.per_cause {
            writeln!(f, "  {}: {}", cause, n)?;
        }
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Delivery lateness (ms): {}", self.lateness_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
