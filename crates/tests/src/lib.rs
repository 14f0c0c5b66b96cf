//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 跨 crate 的序列器场景测试（模拟时钟）
//! - 轴与桶索引的一致性属性测试
//! - 双端窗口序列器的 e2e 测试
//! - 驱动任务的 e2e 测试（暂停的 tokio 时间）

#[cfg(test)]
mod support {
    use std::sync::Arc;

    use axis::Axis;
    use contracts::{AxisConfig, CueArg, CueEvent, Interval, MotionConfig, SequencerConfig};
    use motion::{Clock, ManualClock, MotionSource, TimingObject};
    use sequencer::Sequencer;

    pub struct Rig {
        pub clock: ManualClock,
        pub timing: TimingObject,
        pub seq: Sequencer<TimingObject>,
    }

    impl Rig {
        pub fn new(position: f64, velocity: f64) -> Self {
            let clock = ManualClock::new(0.0);
            let timing = TimingObject::new(
                Arc::new(clock.clone()),
                MotionConfig {
                    position,
                    velocity,
                    ..Default::default()
                },
            )
            .unwrap();
            let axis = Axis::new(&AxisConfig::default()).unwrap();
            let seq = Sequencer::new(timing.clone(), axis, &SequencerConfig::default()).unwrap();
            Self { clock, timing, seq }
        }

        /// Load cues, then start the sequencer; returns the INIT batch.
        pub fn start(&mut self, cues: Vec<CueArg>) -> Vec<CueEvent> {
            self.seq.update(cues).unwrap();
            self.seq.on_timing_change()
        }

        /// Fire every deadline up to `until`, then park the clock there.
        pub fn play_until(&mut self, until: f64) -> Vec<Vec<CueEvent>> {
            let mut batches = Vec::new();
            while let Some(t) = self.seq.next_deadline().filter(|t| *t <= until) {
                self.clock.set(t.max(self.clock.now()));
                let batch = self.seq.on_timeout();
                if !batch.is_empty() {
                    batches.push(batch);
                }
            }
            self.clock.set(until);
            batches
        }

        pub fn now(&self) -> f64 {
            self.timing.now()
        }
    }

    pub fn iv(low: f64, high: f64) -> Interval {
        Interval::new(low, high).unwrap()
    }

    pub fn trace(events: &[CueEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| format!("{}:{}@{}", e.key(), e.verb(), e.due_timestamp))
            .collect()
    }
}

#[cfg(test)]
mod sequencer_tests {
    use super::support::{iv, trace, Rig};
    use contracts::{Cause, CueArg, Interval, MotionUpdate};
    use serde_json::json;

    /// Scenario A: one cue, constant forward motion.
    #[test]
    fn test_single_cue_enter_and_exit() {
        let mut rig = Rig::new(0.0, 1.0);
        assert!(rig.start(vec![CueArg::interval(1u64, iv(10.0, 20.0))]).is_empty());

        let events: Vec<_> = rig.play_until(30.0).into_iter().flatten().collect();
        assert_eq!(trace(&events), vec!["1:ENTER@10", "1:EXIT@20"]);
        assert!(events.iter().all(|e| e.cause == Cause::Playback));
        assert!(events.iter().all(|e| e.lateness() == 0.0));
        assert!(rig.seq.active_keys().is_empty());
    }

    /// Scenario B: adjacent cues hand over at a shared endpoint.
    #[test]
    fn test_adjacent_cues_exit_before_enter() {
        let mut rig = Rig::new(5.0, 1.0);
        let init = rig.start(vec![
            CueArg::interval("cue1", iv(0.0, 10.0)),
            CueArg::interval("cue2", Interval::closed(10.0, 20.0).unwrap()),
        ]);
        assert_eq!(init.len(), 1);
        assert_eq!(init[0].cause, Cause::Init);

        let batches = rig.play_until(15.0);
        assert_eq!(batches.len(), 1, "one batch at the crossing instant");
        assert_eq!(trace(&batches[0]), vec!["cue1:EXIT@5", "cue2:ENTER@5"]);
        assert!(batches[0].iter().all(|e| e.point == 10.0));
    }

    /// Scenario C, seen through the sequencer: an active cue that is deleted
    /// and re-added in one batch only changes.
    #[test]
    fn test_delete_and_readd_reports_change() {
        let mut rig = Rig::new(5.0, 0.0);
        rig.start(vec![CueArg::upsert("a", iv(0.0, 10.0), json!("v1"))]);
        assert!(rig.seq.is_active("a"));

        let events = rig
            .seq
            .update(vec![
                CueArg::remove("a"),
                CueArg::upsert("a", iv(0.0, 20.0), json!("v2")),
            ])
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].verb(), "CHANGE");
        assert_eq!(events[0].cause, Cause::CueChange);
        assert_eq!(events[0].data(), &json!("v2"));
        assert_eq!(events[0].interval().high(), 20.0);
    }

    /// Scenario D: a jump skips everything in between.
    #[test]
    fn test_jump_recomputes_active_set() {
        let mut rig = Rig::new(5.0, 0.0);
        let init = rig.start(vec![
            CueArg::interval("start", iv(0.0, 10.0)),
            CueArg::interval("mid", iv(20.0, 30.0)),
            CueArg::interval("both", iv(0.0, 100.0)),
            CueArg::interval("end", iv(40.0, 60.0)),
        ]);
        assert_eq!(init.len(), 2);

        rig.clock.set(1.0);
        rig.timing.update(MotionUpdate::jump(50.0)).unwrap();
        let events = rig.seq.on_timing_change();

        assert_eq!(
            trace(&events),
            vec!["start:EXIT@1", "end:ENTER@1"],
            "mid and both must not fire"
        );
        assert!(events.iter().all(|e| e.cause == Cause::TimingChange));
        let mut active: Vec<String> = rig.seq.active_keys().iter().map(|k| k.to_string()).collect();
        active.sort();
        assert_eq!(active, vec!["both", "end"]);
    }

    #[test]
    fn test_reversal_exits_through_entry_point() {
        let mut rig = Rig::new(0.0, 1.0);
        rig.start(vec![CueArg::interval("a", iv(2.0, 4.0))]);
        rig.play_until(3.0);
        assert!(rig.seq.is_active("a"));

        rig.timing.update(MotionUpdate::velocity(-1.0)).unwrap();
        assert!(rig.seq.on_timing_change().is_empty());
        let events: Vec<_> = rig.play_until(10.0).into_iter().flatten().collect();
        assert_eq!(trace(&events), vec!["a:EXIT@4"]);
        assert_eq!(events[0].point, 2.0);
    }

    #[test]
    fn test_accelerating_motion_crosses_at_solved_time() {
        let mut rig = Rig::new(0.0, 0.0);
        rig.timing
            .update(MotionUpdate {
                acceleration: Some(2.0),
                ..Default::default()
            })
            .unwrap();
        // x = t^2: reaches 4 at t=2 and 9 at t=3.
        rig.start(vec![CueArg::interval("a", iv(4.0, 9.0))]);
        let events: Vec<_> = rig.play_until(5.0).into_iter().flatten().collect();
        assert_eq!(events.len(), 2);
        assert!((events[0].due_timestamp - 2.0).abs() < 1e-9);
        assert!((events[1].due_timestamp - 3.0).abs() < 1e-9);
        assert_eq!(rig.now(), 5.0);
    }

    #[test]
    fn test_clear_exits_active_cues() {
        let mut rig = Rig::new(5.0, 0.0);
        rig.start(vec![
            CueArg::interval("a", iv(0.0, 10.0)),
            CueArg::interval("b", iv(20.0, 30.0)),
        ]);
        let events = rig.seq.clear();
        assert_eq!(trace(&events), vec!["a:EXIT@0"]);
        assert_eq!(events[0].cause, Cause::CueChange);
        assert!(rig.seq.axis().is_empty());
    }
}

#[cfg(test)]
mod axis_tests {
    use std::collections::{HashMap, HashSet};

    use super::support::iv;
    use axis::Axis;
    use contracts::{AxisConfig, CueArg, Delta, Semantic};
    use proptest::prelude::*;
    use serde_json::json;

    fn axis() -> Axis {
        Axis::new(&AxisConfig::default()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let mut axis = axis();
        axis.update(vec![CueArg::upsert("a", iv(1.0, 2.0), json!({"x": 1}))])
            .unwrap();
        let cue = axis.get("a").unwrap();
        assert_eq!(cue.key.as_str(), "a");
        assert_eq!(cue.interval, iv(1.0, 2.0));
        assert_eq!(cue.data, json!({"x": 1}));
    }

    #[test]
    fn test_identical_update_is_noop() {
        let mut axis = axis();
        let arg = CueArg::upsert("a", iv(1.0, 2.0), json!(7));
        assert_eq!(axis.update(vec![arg.clone()]).unwrap().len(), 1);
        assert!(axis.update(vec![arg]).unwrap().is_empty());
    }

    /// Scenario C: the batch reports the net effect only.
    #[test]
    fn test_delete_and_readd_in_one_batch() {
        let mut axis = axis();
        axis.update(vec![CueArg::upsert("a", iv(1.0, 2.0), json!("old"))])
            .unwrap();
        let original = axis.get("a").cloned().unwrap();

        let batch = axis
            .update(vec![
                CueArg::remove("a"),
                CueArg::upsert("a", iv(5.0, 8.0), json!("old")),
            ])
            .unwrap();
        let change = &batch["a"];
        assert_eq!(change.old.as_deref(), Some(original.as_ref()));
        assert_eq!(change.new.as_ref().unwrap().interval, iv(5.0, 8.0));
        assert_eq!(change.delta.interval, Delta::Replace);
        assert_eq!(change.delta.data, Delta::Noop);
    }

    #[test]
    fn test_lookup_modes_across_buckets() {
        let mut axis = axis();
        axis.update(vec![
            CueArg::interval("short", iv(5.0, 6.0)),
            CueArg::interval("long", iv(-1000.0, 1000.0)),
            CueArg::interval("edge", iv(9.0, 11.0)),
            CueArg::interval("point", contracts::Interval::singular(7.0)),
        ])
        .unwrap();

        let keys = |cues: Vec<std::sync::Arc<contracts::Cue>>| {
            let mut k: Vec<String> = cues.iter().map(|c| c.key.to_string()).collect();
            k.sort();
            k
        };
        let query = iv(0.0, 10.0);
        assert_eq!(
            keys(axis.get_cues_by_interval(&query, Semantic::Inside)),
            vec!["point", "short"]
        );
        assert_eq!(
            keys(axis.get_cues_by_interval(&query, Semantic::Partial)),
            vec!["edge", "point", "short"]
        );
        assert_eq!(
            keys(axis.get_cues_by_interval(&query, Semantic::Overlap)),
            vec!["edge", "long", "point", "short"]
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, f64, f64),
        Del(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, -50.0f64..50.0, 0.0f64..200.0).prop_map(|(k, low, len)| Op::Put(k, low, len)),
            (0u8..16).prop_map(Op::Del),
        ]
    }

    proptest! {
        #[test]
        fn prop_bucket_index_matches_cue_map(batches in prop::collection::vec(prop::collection::vec(op(), 1..8), 1..12)) {
            let mut axis = axis();
            for batch in batches {
                let args = batch
                    .into_iter()
                    .map(|op| match op {
                        Op::Put(k, low, len) => CueArg::interval(k as u64, iv(low, low + len)),
                        Op::Del(k) => CueArg::remove(k as u64),
                    })
                    .collect();
                axis.update(args).unwrap();

                let report = axis.integrity().unwrap();
                prop_assert_eq!(report.cues, axis.len());

                // Points are shared within a bucket, never across buckets.
                let classes = AxisConfig::default().size_classes;
                let mut per_bucket: HashMap<usize, HashSet<u64>> = HashMap::new();
                let mut references = 0;
                for cue in axis.cues() {
                    let i = classes.partition_point(|c| *c < cue.interval.length());
                    let set = per_bucket.entry(i).or_default();
                    set.insert((cue.interval.low() + 0.0).to_bits());
                    set.insert((cue.interval.high() + 0.0).to_bits());
                    references += if cue.interval.is_singular() { 1 } else { 2 };
                }
                let distinct: usize = per_bucket.values().map(|s| s.len()).sum();
                prop_assert_eq!(report.points(), distinct);
                let indexed: usize = report.buckets.iter().map(|b| b.references).sum();
                prop_assert_eq!(indexed, references);
            }
        }
    }
}

#[cfg(test)]
mod listener_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::support::{iv, Rig};
    use contracts::{CueArg, CueEvent};

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let mut rig = Rig::new(5.0, 0.0);
        let seen = Arc::new(AtomicUsize::new(0));

        rig.seq
            .subscribe(
                "change",
                Arc::new(|_: &[CueEvent]| -> anyhow::Result<()> { anyhow::bail!("listener broke") }),
            )
            .unwrap();
        let counter = seen.clone();
        rig.seq
            .subscribe(
                "change",
                Arc::new(move |events: &[CueEvent]| -> anyhow::Result<()> {
                    counter.fetch_add(events.len(), Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        rig.start(vec![CueArg::interval("a", iv(0.0, 10.0))]);
        rig.seq
            .update(vec![CueArg::interval("b", iv(4.0, 6.0))])
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(rig.seq.is_active("a") && rig.seq.is_active("b"));
    }

    #[test]
    fn test_unsupported_event_rejected() {
        let mut rig = Rig::new(0.0, 0.0);
        let err = rig
            .seq
            .subscribe("remove", Arc::new(|_: &[CueEvent]| -> anyhow::Result<()> { Ok(()) }))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported event"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;

    use axis::Axis;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CueArg, CueEvent, MotionUpdate};
    use motion::{ManualClock, MotionSourceExt, SystemClock, TimingObject};
    use sequencer::{DriverHandle, Sequencer, WindowSequencer};

    use super::support::{iv, trace};

    const SCENARIO: &str = r#"
name = "handover"

[sequencer]
lookahead_s = 2.0

[motion]
velocity = 1.0

[[cues]]
key = "cue1"
interval = { low = 0.0, high = 10.0 }

[[cues]]
key = "cue2"
interval = { low = 10.0, high = 20.0, high_include = true }
"#;

    #[test]
    fn test_scenario_file_drives_sequencer() {
        let scenario = ConfigLoader::load_from_str(SCENARIO, ConfigFormat::Toml).unwrap();
        let clock = ManualClock::new(0.0);
        let timing = TimingObject::new(Arc::new(clock.clone()), scenario.motion).unwrap();
        let axis = Axis::new(&scenario.axis).unwrap();
        let mut seq = Sequencer::new(timing, axis, &scenario.sequencer).unwrap();
        seq.update(scenario.cues.clone()).unwrap();

        let mut events = seq.on_timing_change();
        while let Some(t) = seq.next_deadline().filter(|t| *t <= 25.0) {
            clock.set(t);
            events.extend(seq.on_timeout());
        }
        assert_eq!(
            trace(&events),
            vec!["cue1:ENTER@0", "cue1:EXIT@10", "cue2:ENTER@10", "cue2:EXIT@20"]
        );
        // cue2 is left through its closed high bound.
        assert_eq!(events[3].point, 20.0);
    }

    #[test]
    fn test_sequencer_over_skewed_source() {
        let clock = ManualClock::new(0.0);
        let timing = TimingObject::new(
            Arc::new(clock.clone()),
            contracts::MotionConfig {
                velocity: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
        let axis = Axis::new(&Default::default()).unwrap();
        let mut seq = Sequencer::new(timing.skew(100.0), axis, &Default::default()).unwrap();
        seq.update(vec![CueArg::interval("a", iv(110.0, 120.0))])
            .unwrap();
        assert!(seq.on_timing_change().is_empty());

        let mut events = Vec::new();
        while let Some(t) = seq.next_deadline().filter(|t| *t <= 30.0) {
            clock.set(t);
            events.extend(seq.on_timeout());
        }
        assert_eq!(trace(&events), vec!["a:ENTER@10", "a:EXIT@20"]);
    }

    #[test]
    fn test_window_over_time_shifted_source() {
        // The far end reads the same motion two seconds ahead: [t, t + 2].
        let clock = ManualClock::new(0.0);
        let timing = TimingObject::new(
            Arc::new(clock.clone()),
            contracts::MotionConfig {
                velocity: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
        let axis = Axis::new(&Default::default()).unwrap();
        let mut seq = WindowSequencer::new(
            timing.clone(),
            timing.clone().time_shift(2.0),
            axis,
            &Default::default(),
        )
        .unwrap();
        seq.update(vec![
            CueArg::interval("a", iv(5.0, 6.0)),
            CueArg::interval("b", iv(7.5, 20.0)),
        ])
        .unwrap();
        assert!(seq.on_timing_change().is_empty());

        let mut events = Vec::new();
        while let Some(t) = seq.next_deadline().filter(|t| *t <= 8.0) {
            clock.set(t);
            events.extend(seq.on_timeout());
        }
        assert_eq!(
            trace(&events),
            vec!["a:ENTER@3", "b:ENTER@5.5", "a:EXIT@6"]
        );

        // A stopped motion reads the same ahead: the window collapses to 8.
        clock.set(8.0);
        timing.update(MotionUpdate::velocity(0.0)).unwrap();
        assert!(seq.on_timing_change().is_empty());
        assert!(seq.next_deadline().is_none());
        assert_eq!(seq.active_keys(), vec![contracts::CueKey::from("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_delivers_on_time() {
        let timing = TimingObject::new(
            Arc::new(SystemClock::new()),
            contracts::MotionConfig {
                velocity: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
        let axis = Axis::new(&Default::default()).unwrap();
        let seq = Sequencer::new(timing.clone(), axis, &Default::default()).unwrap();
        let (handle, mut rx) = DriverHandle::spawn(seq, 8);
        handle
            .update(vec![CueArg::interval(1u64, iv(10.0, 20.0))])
            .await
            .unwrap();

        let mut events: Vec<CueEvent> = Vec::new();
        while events.len() < 2 {
            events.extend(rx.recv().await.unwrap());
        }
        assert_eq!(events[0].verb(), "ENTER");
        assert_eq!(events[1].verb(), "EXIT");
        for e in &events {
            assert!(e.lateness() >= 0.0, "delivered early: {e}");
            assert!(e.lateness() < 0.005, "delivered late: {e}");
        }

        // A stop while idle cancels further playback.
        timing.update(MotionUpdate::velocity(0.0)).unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());

        let seq = handle.shutdown().await.unwrap();
        assert!(!seq.is_ready());
    }
}
