//! Axis - keyed cue store over length-partitioned buckets
//!
//! # Batch flow
//!
//! 1. Validate every entry (rejects the whole batch before mutating)
//! 2. Stage entries per key; repeated keys collapse to the final value
//! 3. Diff staged values against the pre-batch cues, drop no-ops
//! 4. Move endpoints between buckets, then flush every touched bucket
//! 5. Emit one "change" notification carrying the whole batch

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    AxisConfig, BatchMap, ContractError, Cue, CueArg, CueChange, CueDelta, CueKey, Endpoint,
    Handler, Interval, Observers, RelationMask, Semantic, SubscriptionId,
};
use indexmap::IndexMap;
use observability::{
    record_axis_batch, record_axis_size, record_bucket_flush, record_integrity_violation,
};
use slab::Slab;
use tracing::{debug, error, instrument};

use crate::bucket::Bucket;
use crate::integrity::{IntegrityError, IntegrityReport};

/// Events an axis emits.
pub const AXIS_EVENTS: &[&str] = &["change"];

/// A cue endpoint located on the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CuePoint {
    pub point: f64,
    pub endpoint: Endpoint,
    pub cue: Arc<Cue>,
}

pub struct Axis {
    storage: Slab<Arc<Cue>>,
    keys: HashMap<CueKey, usize>,
    buckets: Vec<Bucket>,
    observers: Observers<BatchMap>,
}

impl Axis {
    pub fn new(config: &AxisConfig) -> Result<Self, ContractError> {
        let classes = &config.size_classes;
        if classes.is_empty() {
            return Err(ContractError::config_validation(
                "axis.size_classes",
                "at least one size class is required",
            ));
        }
        if classes.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(ContractError::config_validation(
                "axis.size_classes",
                "size classes must be strictly ascending",
            ));
        }
        if classes.last() != Some(&f64::INFINITY) {
            return Err(ContractError::config_validation(
                "axis.size_classes",
                "last size class must be infinite",
            ));
        }
        Ok(Self {
            storage: Slab::new(),
            keys: HashMap::new(),
            buckets: classes.iter().map(|c| Bucket::new(*c)).collect(),
            observers: Observers::new(AXIS_EVENTS),
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Cue>> {
        self.keys.get(key).and_then(|slot| self.storage.get(*slot))
    }

    pub fn keys(&self) -> impl Iterator<Item = &CueKey> {
        self.keys.keys()
    }

    pub fn cues(&self) -> impl Iterator<Item = &Arc<Cue>> {
        self.storage.iter().map(|(_, cue)| cue)
    }

    /// Check a batch without applying it. [`Self::update`] accepts exactly
    /// the batches this accepts.
    pub fn validate(args: &[CueArg]) -> Result<(), ContractError> {
        match args.iter().position(|a| !a.key.is_valid()) {
            Some(index) => Err(ContractError::invalid_cue(index, "missing key")),
            None => Ok(()),
        }
    }

    /// Apply one batch atomically and return the per-key changes.
    #[instrument(name = "axis_update", skip(self, args), fields(entries = args.len()))]
    pub fn update(&mut self, args: Vec<CueArg>) -> Result<BatchMap, ContractError> {
        let started = Instant::now();
        let entries = args.len();

        Self::validate(&args)?;

        let mut staged: IndexMap<CueKey, Option<Arc<Cue>>> = IndexMap::new();
        for arg in args {
            let key = arg.key.clone();
            let next = match staged.get(&key) {
                Some(current) => arg.apply(current.as_ref()),
                None => arg.apply(self.get(&key)),
            };
            staged.insert(key, next);
        }

        let mut batch = BatchMap::new();
        for (key, new) in staged {
            let old = self.get(&key).cloned();
            let delta = CueDelta::between(old.as_deref(), new.as_deref());
            if delta.is_noop() {
                continue;
            }
            batch.insert(key, CueChange { old, new, delta });
        }

        for (key, change) in &batch {
            self.apply_change(key, change);
        }
        self.flush();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        record_axis_batch(entries, batch.len(), elapsed_ms);
        record_axis_size(self.len());
        debug!(changed = batch.len(), elapsed_ms, "Axis batch applied");

        if !batch.is_empty() {
            self.observers.emit("change", &batch);
        }
        Ok(batch)
    }

    fn apply_change(&mut self, key: &CueKey, change: &CueChange) {
        match (&change.old, &change.new) {
            (Some(old), Some(new)) => {
                let Some(slot) = self.keys.get(key).copied() else {
                    error!(key = %key, "Replaced cue missing from key map");
                    return;
                };
                if old.interval != new.interval {
                    self.bucket_mut(old.interval.length())
                        .del_cue(slot, &old.interval);
                    self.bucket_mut(new.interval.length())
                        .add_cue(slot, &new.interval);
                }
                if let Some(entry) = self.storage.get_mut(slot) {
                    *entry = new.clone();
                }
            }
            (None, Some(new)) => {
                let slot = self.storage.insert(new.clone());
                self.keys.insert(key.clone(), slot);
                self.bucket_mut(new.interval.length())
                    .add_cue(slot, &new.interval);
            }
            (Some(old), None) => {
                let Some(slot) = self.keys.remove(key) else {
                    error!(key = %key, "Deleted cue missing from key map");
                    return;
                };
                self.bucket_mut(old.interval.length())
                    .del_cue(slot, &old.interval);
                self.storage.remove(slot);
            }
            (None, None) => {}
        }
    }

    fn flush(&mut self) {
        for bucket in self.buckets.iter_mut().filter(|b| b.is_pending()) {
            let (inserted, removed) = bucket.flush();
            record_bucket_flush(bucket.max_length(), inserted, removed);
        }
    }

    fn bucket_index(&self, length: f64) -> usize {
        self.buckets
            .partition_point(|b| b.max_length() < length)
            .min(self.buckets.len() - 1)
    }

    fn bucket_mut(&mut self, length: f64) -> &mut Bucket {
        let i = self.bucket_index(length);
        &mut self.buckets[i]
    }

    /// Cues whose relation to `interval` is in `mask`.
    pub fn lookup(&self, interval: &Interval, mask: RelationMask) -> Vec<Arc<Cue>> {
        self.buckets
            .iter()
            .flat_map(|b| b.lookup(interval, mask, &self.storage))
            .filter_map(|slot| self.storage.get(slot).cloned())
            .collect()
    }

    pub fn get_cues_by_interval(&self, interval: &Interval, semantic: Semantic) -> Vec<Arc<Cue>> {
        self.lookup(interval, semantic.mask())
    }

    /// Cue endpoints covered by `interval`, ordered by point.
    pub fn get_cue_points_by_interval(&self, interval: &Interval) -> Vec<CuePoint> {
        let mut points: Vec<CuePoint> = self
            .buckets
            .iter()
            .flat_map(|b| b.lookup_endpoints(interval, &self.storage))
            .filter_map(|(endpoint, slot)| {
                self.storage.get(slot).map(|cue| CuePoint {
                    point: endpoint.value,
                    endpoint,
                    cue: cue.clone(),
                })
            })
            .collect();
        points.sort_by(|a, b| a.point.total_cmp(&b.point));
        points
    }

    /// Cue endpoints located exactly at `x`.
    pub fn cues_at(&self, x: f64) -> Vec<CuePoint> {
        self.buckets
            .iter()
            .flat_map(|b| b.endpoints_at(x, &self.storage))
            .filter_map(|(endpoint, slot)| {
                self.storage.get(slot).map(|cue| CuePoint {
                    point: x,
                    endpoint,
                    cue: cue.clone(),
                })
            })
            .collect()
    }

    /// Delete every cue matching `interval` under `semantic`.
    pub fn remove_cues_by_interval(
        &mut self,
        interval: &Interval,
        semantic: Semantic,
    ) -> Result<BatchMap, ContractError> {
        let args = self
            .get_cues_by_interval(interval, semantic)
            .into_iter()
            .map(|cue| CueArg::remove(cue.key.clone()))
            .collect();
        self.update(args)
    }

    /// Delete every cue in one batch.
    pub fn clear(&mut self) -> BatchMap {
        let mut batch = BatchMap::new();
        for cue in self.storage.drain() {
            let delta = CueDelta::between(Some(cue.as_ref()), None);
            batch.insert(
                cue.key.clone(),
                CueChange {
                    old: Some(cue),
                    new: None,
                    delta,
                },
            );
        }
        self.keys.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        record_axis_size(0);
        if !batch.is_empty() {
            self.observers.emit("change", &batch);
        }
        batch
    }

    pub fn subscribe(
        &mut self,
        event: &str,
        handler: Handler<BatchMap>,
    ) -> Result<SubscriptionId, ContractError> {
        self.observers.subscribe(event, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Cross-check buckets against the key map.
    pub fn integrity(&self) -> Result<IntegrityReport, IntegrityError> {
        let result = self.check();
        if let Err(e) = &result {
            error!(error = %e, "Axis integrity violation");
            record_integrity_violation();
        }
        result
    }

    fn check(&self) -> Result<IntegrityReport, IntegrityError> {
        if self.keys.len() != self.storage.len() {
            return Err(IntegrityError::CueCount {
                keys: self.keys.len(),
                stored: self.storage.len(),
            });
        }
        for (key, slot) in &self.keys {
            let found = self.storage.get(*slot).map(|c| c.key.to_string());
            if found.as_deref() != Some(key.as_str()) {
                return Err(IntegrityError::KeyMismatch {
                    key: key.to_string(),
                    slot: *slot,
                    found: found.unwrap_or_default(),
                });
            }
        }

        let classify = |length: f64| self.buckets[self.bucket_index(length)].max_length();
        let mut refs = HashMap::new();
        let mut buckets = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            buckets.push(bucket.check(&self.storage, classify, &mut refs)?);
        }

        for (slot, cue) in self.storage.iter() {
            let expected = if cue.interval.is_singular() { 1 } else { 2 };
            let found = refs.get(&slot).copied().unwrap_or(0);
            if found != expected {
                return Err(IntegrityError::ReferenceCount {
                    key: cue.key.to_string(),
                    expected,
                    found,
                });
            }
        }

        Ok(IntegrityReport {
            cues: self.storage.len(),
            buckets,
        })
    }
}

impl std::fmt::Debug for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Axis")
            .field("cues", &self.len())
            .field("buckets", &self.buckets.len())
            .field("observers", &self.observers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Delta;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn axis() -> Axis {
        Axis::new(&AxisConfig::default()).unwrap()
    }

    fn iv(low: f64, high: f64) -> Interval {
        Interval::new(low, high).unwrap()
    }

    fn sorted_keys(cues: &[Arc<Cue>]) -> Vec<String> {
        let mut k: Vec<String> = cues.iter().map(|c| c.key.to_string()).collect();
        k.sort();
        k
    }

    #[test]
    fn test_rejects_bad_size_classes() {
        for classes in [vec![], vec![10.0, 5.0, f64::INFINITY], vec![0.0, 10.0]] {
            let config = AxisConfig {
                size_classes: classes,
            };
            assert!(matches!(
                Axis::new(&config),
                Err(ContractError::ConfigValidation { .. })
            ));
        }
    }

    #[test]
    fn test_update_and_get() {
        let mut axis = axis();
        let batch = axis
            .update(vec![
                CueArg::upsert("a", iv(10.0, 20.0), json!({"text": "hello"})),
                CueArg::interval("b", Interval::singular(15.0)),
            ])
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(axis.len(), 2);
        assert_eq!(axis.get("a").unwrap().data, json!({"text": "hello"}));
        assert_eq!(axis.get("b").unwrap().data, Value::Null);
        assert!(axis.integrity().is_ok());
    }

    #[test]
    fn test_invalid_entry_rejects_whole_batch() {
        let mut axis = axis();
        let err = axis
            .update(vec![
                CueArg::interval("a", iv(0.0, 1.0)),
                CueArg::interval("", iv(0.0, 1.0)),
            ])
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidCue { index: 1, .. }));
        assert!(axis.is_empty());
        assert!(Axis::validate(&[CueArg::interval("a", iv(0.0, 1.0))]).is_ok());
        assert!(Axis::validate(&[CueArg::interval(" ", iv(0.0, 1.0))]).is_err());
    }

    #[test]
    fn test_reapply_is_noop() {
        let mut axis = axis();
        let args = vec![CueArg::upsert("a", iv(0.0, 5.0), json!(1))];
        axis.update(args.clone()).unwrap();
        assert!(axis.update(args).unwrap().is_empty());
        assert!(axis.update(vec![CueArg::remove("ghost")]).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_key_collapses() {
        let mut axis = axis();
        axis.update(vec![CueArg::upsert("a", iv(0.0, 5.0), json!("v1"))])
            .unwrap();
        let batch = axis
            .update(vec![
                CueArg::remove("a"),
                CueArg::upsert("a", iv(100.0, 200.0), json!("v2")),
            ])
            .unwrap();
        let change = &batch["a"];
        assert_eq!(change.old.as_ref().unwrap().data, json!("v1"));
        assert_eq!(change.new.as_ref().unwrap().data, json!("v2"));
        assert_eq!(change.delta.interval, Delta::Replace);
        assert!(axis.integrity().is_ok());
    }

    #[test]
    fn test_migrates_between_buckets() {
        let mut axis = axis();
        axis.update(vec![CueArg::interval("a", iv(0.0, 5.0))]).unwrap();
        axis.update(vec![CueArg::interval("a", iv(0.0, 5000.0))])
            .unwrap();
        let report = axis.integrity().unwrap();
        assert_eq!(report.cues, 1);
        assert_eq!(report.points(), 2);
        assert_eq!(report.buckets[1].points, 0);
        assert_eq!(report.buckets[4].points, 2);
    }

    #[test]
    fn test_lookup_modes() {
        let mut axis = axis();
        axis.update(vec![
            CueArg::interval("inside", iv(12.0, 14.0)),
            CueArg::interval("left", iv(5.0, 12.0)),
            CueArg::interval("cover", iv(0.0, 1000.0)),
            CueArg::interval("far", iv(500.0, 600.0)),
        ])
        .unwrap();
        let q = iv(10.0, 20.0);
        assert_eq!(
            sorted_keys(&axis.get_cues_by_interval(&q, Semantic::Inside)),
            vec!["inside"]
        );
        assert_eq!(
            sorted_keys(&axis.get_cues_by_interval(&q, Semantic::Partial)),
            vec!["inside", "left"]
        );
        assert_eq!(
            sorted_keys(&axis.get_cues_by_interval(&q, Semantic::Overlap)),
            vec!["cover", "inside", "left"]
        );
    }

    #[test]
    fn test_cue_points_sorted() {
        let mut axis = axis();
        axis.update(vec![
            CueArg::interval("long", iv(0.0, 500.0)),
            CueArg::interval("short", iv(3.0, 4.0)),
        ])
        .unwrap();
        let points: Vec<f64> = axis
            .get_cue_points_by_interval(&Interval::closed(0.0, 10.0).unwrap())
            .iter()
            .map(|p| p.point)
            .collect();
        assert_eq!(points, vec![0.0, 3.0, 4.0]);
        assert_eq!(axis.cues_at(4.0).len(), 1);
        assert!(axis.cues_at(4.5).is_empty());
    }

    #[test]
    fn test_remove_by_interval_and_clear() {
        let mut axis = axis();
        axis.update(vec![
            CueArg::interval("a", iv(0.0, 1.0)),
            CueArg::interval("b", iv(2.0, 3.0)),
            CueArg::interval("c", iv(20.0, 30.0)),
        ])
        .unwrap();
        let removed = axis
            .remove_cues_by_interval(&iv(0.0, 10.0), Semantic::Inside)
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(axis.keys().count(), 1);

        let cleared = axis.clear();
        assert_eq!(cleared["c"].delta.interval, Delta::Delete);
        assert!(axis.is_empty());
        assert_eq!(axis.integrity().unwrap().points(), 0);
    }

    #[test]
    fn test_one_notification_per_batch() {
        let mut axis = axis();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        axis.subscribe(
            "change",
            Arc::new(move |batch: &BatchMap| {
                sink.lock().unwrap().push(batch.len());
                Ok(())
            }),
        )
        .unwrap();

        axis.update(vec![
            CueArg::interval("a", iv(0.0, 1.0)),
            CueArg::interval("b", iv(2.0, 3.0)),
        ])
        .unwrap();
        axis.update(vec![CueArg::interval("a", iv(0.0, 1.0))])
            .unwrap();
        axis.update(vec![CueArg::remove("b")]).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![2, 1]);
    }
}
