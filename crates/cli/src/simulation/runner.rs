//! Scenario runner.
//!
//! Two modes share the same scenario semantics:
//! - simulated: a [`ManualClock`] jumps straight to the next interesting
//!   instant (schedule deadline, range deadline, timeline step, end of run)
//! - realtime: a [`SystemClock`] with the sequencer on a [`DriverHandle`]
//!   and the range guard on its own task

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axis::Axis;
use contracts::{CueEvent, Scenario, TimelineStep};
use motion::{Clock, ManualClock, MotionSource, SystemClock, TimingObject};
use observability::SequencerMetricsAggregator;
use sequencer::{DriverHandle, Sequencer, UpdateReply};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::SimulationStats;
use crate::error::{CliError, Result};

/// Consecutive loop turns allowed without the clock moving.
const MAX_STALLED_TURNS: u32 = 1_000;

struct Recorder<F> {
    on_batch: F,
    metrics: SequencerMetricsAggregator,
}

impl<F: FnMut(&[CueEvent])> Recorder<F> {
    fn new(on_batch: F) -> Self {
        Self {
            on_batch,
            metrics: SequencerMetricsAggregator::new(),
        }
    }

    fn record(&mut self, events: Vec<CueEvent>) {
        if events.is_empty() {
            return;
        }
        self.metrics.update(&events);
        (self.on_batch)(&events);
    }
}

pub struct Simulation {
    scenario: Scenario,
}

impl Simulation {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }

    fn build<S: MotionSource>(&self, source: S) -> Result<Sequencer<S>> {
        let axis = Axis::new(&self.scenario.axis)?;
        let mut seq = Sequencer::new(source, axis, &self.scenario.sequencer)?;
        // Not ready yet: the cues only land on the axis, INIT reports them.
        seq.update(self.scenario.cues.clone())?;
        Ok(seq)
    }

    /// Run on simulated time. Returns once `duration_s` is reached.
    pub fn run(&self, on_batch: impl FnMut(&[CueEvent])) -> Result<SimulationStats> {
        let started = Instant::now();
        let duration = self.scenario.duration_s;
        let clock = Arc::new(ManualClock::new(0.0));
        let timing = TimingObject::new(clock.clone(), self.scenario.motion)?;
        let mut seq = self.build(timing.clone())?;
        let mut recorder = Recorder::new(on_batch);
        let mut stats = SimulationStats::default();

        info!(
            name = %self.scenario.name,
            cues = seq.axis().len(),
            duration,
            "Simulation started"
        );
        recorder.record(seq.on_timing_change());

        let mut steps = self.scenario.timeline.iter().peekable();
        let mut stalled = 0;
        loop {
            let now = clock.now();
            let next = [
                seq.next_deadline(),
                timing.range_deadline(),
                steps.peek().map(|s| s.at),
                Some(duration),
            ]
            .into_iter()
            .flatten()
            .fold(f64::INFINITY, f64::min)
            .max(now);

            if next > now {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled > MAX_STALLED_TURNS {
                    return Err(CliError::simulation(format!("no progress at t={now}")));
                }
            }
            clock.set(next);

            recorder.record(seq.on_timeout());
            if let Some(stop) = timing.enforce_range() {
                debug!(position = stop.position, at = next, "Range stop");
                stats.range_stops += 1;
                recorder.record(seq.on_timing_change());
            }
            while let Some(step) = steps.next_if(|s| s.at <= next) {
                apply_step(step, &timing, &mut seq, &mut recorder)?;
                stats.steps_applied += 1;
            }

            if next >= duration {
                break;
            }
        }

        stats.simulated_s = clock.now();
        finish(&mut stats, &mut seq, recorder.metrics);
        stats.wall = started.elapsed();
        info!(events = stats.metrics.total_events, "Simulation finished");
        Ok(stats)
    }

    /// Run against the wall clock until `duration_s` elapses or `shutdown`
    /// resolves.
    pub async fn run_realtime(
        &self,
        buffer_size: usize,
        on_batch: impl FnMut(&[CueEvent]),
        shutdown: impl Future<Output = ()>,
    ) -> Result<SimulationStats> {
        let started = Instant::now();
        let timing = TimingObject::new(Arc::new(SystemClock::new()), self.scenario.motion)?;
        let seq = self.build(timing.clone())?;
        let mut recorder = Recorder::new(on_batch);
        let mut stats = SimulationStats::default();

        let guard = tokio::spawn(timing.clone().run_range_guard());
        let (handle, mut events) = DriverHandle::spawn(seq, buffer_size);
        info!(name = %self.scenario.name, "Realtime run started");

        let deadline = tokio::time::sleep(Duration::from_secs_f64(self.scenario.duration_s));
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        let mut steps = self.scenario.timeline.iter().peekable();
        let mut failure = None;
        loop {
            let step_wait = steps.peek().map(|s| (s.at - timing.now()).max(0.0));
            tokio::select! {
                batch = events.recv() => match batch {
                    Some(batch) => recorder.record(batch),
                    None => break,
                },
                _ = tokio::time::sleep(Duration::from_secs_f64(step_wait.unwrap_or(0.0))), if step_wait.is_some() => {
                    let Some(step) = steps.next() else { continue };
                    if let Some(update) = step.motion {
                        if let Err(e) = timing.update(update) {
                            failure = Some(CliError::from(e));
                            break;
                        }
                    }
                    if !step.cues.is_empty() {
                        let applied = match handle.submit(step.cues.clone()).await {
                            Ok(reply) => await_reply(reply, &mut events, &mut recorder).await,
                            Err(e) => Err(CliError::simulation(e.to_string())),
                        };
                        if let Err(e) = applied {
                            failure = Some(e);
                            break;
                        }
                    }
                    stats.steps_applied += 1;
                }
                _ = &mut deadline => break,
                _ = &mut shutdown => {
                    warn!("Shutdown requested, stopping run");
                    break;
                }
            }
        }

        guard.abort();
        let mut seq = handle
            .shutdown()
            .await
            .map_err(|e| CliError::shutdown(e.to_string()))?;
        while let Ok(batch) = events.try_recv() {
            recorder.record(batch);
        }
        if let Some(e) = failure {
            return Err(e);
        }

        stats.simulated_s = timing.now();
        finish(&mut stats, &mut seq, recorder.metrics);
        stats.wall = started.elapsed();
        info!(events = stats.metrics.total_events, "Realtime run finished");
        Ok(stats)
    }
}

/// Wait for the driver's answer to one cue batch. Events keep draining
/// meanwhile so the driver never stalls on a full event channel.
async fn await_reply<F: FnMut(&[CueEvent])>(
    reply: UpdateReply,
    events: &mut mpsc::Receiver<Vec<CueEvent>>,
    recorder: &mut Recorder<F>,
) -> Result<()> {
    tokio::pin!(reply);
    loop {
        tokio::select! {
            answer = &mut reply => {
                return match answer {
                    Ok(result) => result.map_err(CliError::from),
                    Err(_) => Err(CliError::simulation("driver stopped")),
                };
            }
            Some(batch) = events.recv() => recorder.record(batch),
        }
    }
}

fn apply_step<F: FnMut(&[CueEvent])>(
    step: &TimelineStep,
    timing: &TimingObject,
    seq: &mut Sequencer<TimingObject>,
    recorder: &mut Recorder<F>,
) -> Result<()> {
    debug!(at = step.at, cues = step.cues.len(), "Timeline step");
    if let Some(update) = step.motion {
        timing.update(update)?;
        recorder.record(seq.on_timing_change());
    }
    if !step.cues.is_empty() {
        recorder.record(seq.update(step.cues.clone())?);
    }
    Ok(())
}

fn finish<S: MotionSource>(
    stats: &mut SimulationStats,
    seq: &mut Sequencer<S>,
    metrics: SequencerMetricsAggregator,
) {
    stats.final_position = seq.source().query().position;
    stats.final_cues = seq.axis().len();
    stats.final_active = seq.active_keys().iter().map(|k| k.to_string()).collect();
    if let Ok(report) = seq.axis().integrity() {
        stats.indexed_points = report.points();
    }
    stats.metrics = metrics;
    seq.close();
}
