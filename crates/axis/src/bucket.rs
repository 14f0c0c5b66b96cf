//! Point index for one interval-length size class.
//!
//! Uses index separation like the rest of the axis:
//! - `points` maps a point to the storage slots of cues with an endpoint there
//! - `index` keeps the same points sorted for range search
//!
//! Mutations only touch `points` and record which points were created or
//! emptied; `flush` brings `index` back in line with a single update.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use contracts::{Cue, Endpoint, Interval, Relation, RelationMask};
use slab::Slab;
use tracing::error;

use crate::integrity::{BucketStats, IntegrityError};
use crate::point_index::{normalize, PointIndex};

type PointKey = u64;

#[inline]
fn point_key(x: f64) -> PointKey {
    normalize(x).to_bits()
}

/// Cue slot touching a point, with the cue's endpoint at that point.
pub(crate) type EndpointRef = (Endpoint, usize);

#[derive(Debug)]
pub(crate) struct Bucket {
    max_length: f64,
    points: HashMap<PointKey, Vec<usize>>,
    index: PointIndex,
    created: HashSet<PointKey>,
    dirty: HashSet<PointKey>,
}

impl Bucket {
    pub fn new(max_length: f64) -> Self {
        Self {
            max_length,
            points: HashMap::new(),
            index: PointIndex::new(),
            created: HashSet::new(),
            dirty: HashSet::new(),
        }
    }

    #[inline]
    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    pub fn point_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_pending(&self) -> bool {
        !self.created.is_empty() || !self.dirty.is_empty()
    }

    pub fn add_cue(&mut self, slot: usize, interval: &Interval) {
        self.add_endpoint(interval.low(), slot);
        if !interval.is_singular() {
            self.add_endpoint(interval.high(), slot);
        }
    }

    pub fn del_cue(&mut self, slot: usize, interval: &Interval) {
        self.del_endpoint(interval.low(), slot);
        if !interval.is_singular() {
            self.del_endpoint(interval.high(), slot);
        }
    }

    fn add_endpoint(&mut self, x: f64, slot: usize) {
        let key = point_key(x);
        match self.points.get_mut(&key) {
            Some(slots) => slots.push(slot),
            None => {
                self.points.insert(key, vec![slot]);
                self.created.insert(key);
            }
        }
    }

    fn del_endpoint(&mut self, x: f64, slot: usize) {
        let key = point_key(x);
        if let Some(slots) = self.points.get_mut(&key) {
            if let Some(pos) = slots.iter().position(|s| *s == slot) {
                slots.remove(pos);
            }
            if slots.is_empty() {
                self.dirty.insert(key);
            }
        }
    }

    /// Commit buffered mutations. Returns `(inserted, removed)` point counts.
    pub fn flush(&mut self) -> (usize, usize) {
        let mut to_insert = Vec::new();
        let mut to_remove = Vec::new();

        for key in self.created.drain() {
            match self.points.get(&key) {
                Some(slots) if !slots.is_empty() => to_insert.push(f64::from_bits(key)),
                // Created and emptied within the same batch: never indexed.
                Some(_) => {
                    self.points.remove(&key);
                }
                None => {}
            }
        }
        for key in self.dirty.drain() {
            if self.points.get(&key).is_some_and(|slots| slots.is_empty()) {
                self.points.remove(&key);
                to_remove.push(f64::from_bits(key));
            }
        }

        self.index.update(&to_remove, &to_insert);
        (to_insert.len(), to_remove.len())
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.index.clear();
        self.created.clear();
        self.dirty.clear();
    }

    /// Slots with an endpoint in the closed range `[low, high]`, first-seen order.
    fn slots_in(&self, low: f64, high: f64) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for x in self.index.range(low, high) {
            if let Some(slots) = self.points.get(&point_key(*x)) {
                for slot in slots {
                    if seen.insert(*slot) {
                        out.push(*slot);
                    }
                }
            }
        }
        out
    }

    /// Cue endpoints covered by `interval`, in point order.
    pub fn lookup_endpoints(
        &self,
        interval: &Interval,
        storage: &Slab<Arc<Cue>>,
    ) -> Vec<EndpointRef> {
        let mut out = Vec::new();
        for x in self.index.range(interval.low(), interval.high()) {
            for r in self.endpoints_at(*x, storage) {
                if interval.covers_endpoint(&r.0) {
                    out.push(r);
                }
            }
        }
        out
    }

    /// Cue endpoints located exactly at `x`.
    pub fn endpoints_at(&self, x: f64, storage: &Slab<Arc<Cue>>) -> Vec<EndpointRef> {
        let Some(slots) = self.points.get(&point_key(x)) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            let Some(cue) = storage.get(*slot) else {
                error!(bucket = self.max_length, point = x, slot, "Point references an empty slot");
                continue;
            };
            match cue.interval.endpoint_at(x) {
                Some(endpoint) => out.push((endpoint, *slot)),
                None => error!(
                    bucket = self.max_length,
                    point = x,
                    key = %cue.key,
                    "Cue has no endpoint at indexed point"
                ),
            }
        }
        out
    }

    /// Slots of cues whose relation to `interval` is in `mask`.
    ///
    /// Cues covering `interval` have both endpoints outside it, so they are
    /// found by a second search extending `max_length` to the left of the
    /// query. The search never extends to the right.
    pub fn lookup(
        &self,
        interval: &Interval,
        mask: RelationMask,
        storage: &Slab<Arc<Cue>>,
    ) -> Vec<usize> {
        let mut out = Vec::new();
        let mask = mask & RelationMask::OVERLAP;
        if mask.is_empty() || self.index.is_empty() {
            return out;
        }

        let direct = mask & RelationMask::PARTIAL;
        if !direct.is_empty() {
            for slot in self.slots_in(interval.low(), interval.high()) {
                if let Some(cue) = storage.get(slot) {
                    if interval.matches(&cue.interval, direct) {
                        out.push(slot);
                    }
                }
            }
        }

        if !mask.contains(Relation::Covers) || interval.length() > self.max_length {
            return out;
        }
        // inf - inf is NaN: an unbounded bucket reaches all the way left.
        let reach = interval.high() - self.max_length;
        let left = if reach.is_nan() {
            f64::NEG_INFINITY
        } else {
            reach.min(interval.low())
        };
        for slot in self.slots_in(left, interval.low()) {
            if let Some(cue) = storage.get(slot) {
                if interval.compare(&cue.interval) == Relation::Covers {
                    out.push(slot);
                }
            }
        }
        out
    }

    /// Verify this bucket against the cue storage.
    ///
    /// Adds one count per point reference to `refs`, keyed by slot.
    pub fn check(
        &self,
        storage: &Slab<Arc<Cue>>,
        classify: impl Fn(f64) -> f64,
        refs: &mut HashMap<usize, usize>,
    ) -> Result<BucketStats, IntegrityError> {
        let bucket = self.max_length;
        if self.is_pending() {
            return Err(IntegrityError::Unflushed { bucket });
        }
        if self.points.len() != self.index.len() {
            return Err(IntegrityError::PointCount {
                bucket,
                mapped: self.points.len(),
                indexed: self.index.len(),
            });
        }
        let mut references = 0;
        for point in self.index.as_slice() {
            let Some(slots) = self.points.get(&point_key(*point)) else {
                return Err(IntegrityError::UnmappedPoint {
                    bucket,
                    point: *point,
                });
            };
            if slots.is_empty() {
                return Err(IntegrityError::EmptyPoint {
                    bucket,
                    point: *point,
                });
            }
            for slot in slots {
                let Some(cue) = storage.get(*slot) else {
                    return Err(IntegrityError::UnknownCue {
                        bucket,
                        point: *point,
                        slot: *slot,
                    });
                };
                if cue.interval.endpoint_at(*point).is_none() {
                    return Err(IntegrityError::EndpointMismatch {
                        key: cue.key.to_string(),
                        point: *point,
                    });
                }
                let length = cue.interval.length();
                if classify(length) != bucket {
                    return Err(IntegrityError::WrongBucket {
                        key: cue.key.to_string(),
                        length,
                        bucket,
                    });
                }
                *refs.entry(*slot).or_insert(0) += 1;
                references += 1;
            }
        }
        Ok(BucketStats {
            max_length: bucket,
            points: self.index.len(),
            references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn store(cues: &[(&str, Interval)]) -> Slab<Arc<Cue>> {
        let mut slab = Slab::new();
        for (key, interval) in cues {
            slab.insert(Arc::new(Cue::new(*key, *interval, Value::Null)));
        }
        slab
    }

    fn filled(storage: &Slab<Arc<Cue>>, max_length: f64) -> Bucket {
        let mut b = Bucket::new(max_length);
        for (slot, cue) in storage.iter() {
            b.add_cue(slot, &cue.interval);
        }
        b.flush();
        b
    }

    fn keys(storage: &Slab<Arc<Cue>>, slots: &[usize]) -> Vec<String> {
        let mut k: Vec<String> = slots.iter().map(|s| storage[*s].key.to_string()).collect();
        k.sort();
        k
    }

    #[test]
    fn test_flush_creates_and_removes_points() {
        let storage = store(&[
            ("a", Interval::new(0.0, 10.0).unwrap()),
            ("b", Interval::new(10.0, 20.0).unwrap()),
        ]);
        let mut b = filled(&storage, 10.0);
        assert_eq!(b.point_count(), 3);

        b.del_cue(0, &storage[0].interval);
        assert!(b.is_pending());
        // Point 10 still has "b".
        assert_eq!(b.flush(), (0, 1));
        assert_eq!(b.point_count(), 2);
    }

    #[test]
    fn test_created_then_emptied_never_indexed() {
        let iv = Interval::new(50.0, 55.0).unwrap();
        let mut b = Bucket::new(10.0);
        b.add_cue(0, &iv);
        b.del_cue(0, &iv);
        assert_eq!(b.flush(), (0, 0));
        assert_eq!(b.point_count(), 0);
        assert!(b.points.is_empty());
    }

    #[test]
    fn test_move_within_bucket_keeps_shared_point() {
        let old = Interval::closed(10.0, 20.0).unwrap();
        let new = Interval::closed(20.0, 30.0).unwrap();
        let mut b = Bucket::new(10.0);
        b.add_cue(0, &old);
        b.flush();
        b.del_cue(0, &old);
        b.add_cue(0, &new);
        b.flush();
        assert_eq!(b.index.as_slice(), &[20.0, 30.0]);
        assert_eq!(b.points[&point_key(20.0)], vec![0]);
    }

    #[test]
    fn test_lookup_endpoints_honors_edges() {
        let storage = store(&[
            ("a", Interval::new(0.0, 10.0).unwrap()),
            ("b", Interval::closed(10.0, 20.0).unwrap()),
            ("s", Interval::singular(15.0)),
        ]);
        let b = filled(&storage, f64::INFINITY);

        let q = Interval::new(10.0, 15.0).unwrap();
        let found: Vec<(f64, usize)> = b
            .lookup_endpoints(&q, &storage)
            .iter()
            .map(|(e, s)| (e.value, *s))
            .collect();
        // "a" ends open at 10 and is excluded; "s" sits on the open high edge.
        assert_eq!(found, vec![(10.0, 1)]);

        let q = Interval::closed(10.0, 15.0).unwrap();
        assert_eq!(b.lookup_endpoints(&q, &storage).len(), 2);
    }

    #[test]
    fn test_lookup_relations() {
        let storage = store(&[
            ("inside", Interval::new(12.0, 14.0).unwrap()),
            ("left", Interval::new(5.0, 12.0).unwrap()),
            ("right", Interval::new(18.0, 25.0).unwrap()),
            ("cover", Interval::new(5.0, 30.0).unwrap()),
            ("away", Interval::new(40.0, 50.0).unwrap()),
        ]);
        let b = filled(&storage, 100.0);
        let q = Interval::new(10.0, 20.0).unwrap();

        let all = b.lookup(&q, RelationMask::OVERLAP, &storage);
        assert_eq!(keys(&storage, &all), vec!["cover", "inside", "left", "right"]);

        let inside = b.lookup(&q, RelationMask::INSIDE, &storage);
        assert_eq!(keys(&storage, &inside), vec!["inside"]);

        let covers = b.lookup(&q, RelationMask::COVERS, &storage);
        assert_eq!(keys(&storage, &covers), vec!["cover"]);

        assert!(b.lookup(&q, RelationMask::OUTSIDE_RIGHT, &storage).is_empty());
    }

    #[test]
    fn test_covers_skipped_for_long_queries() {
        let storage = store(&[("cover", Interval::new(0.0, 10.0).unwrap())]);
        let b = filled(&storage, 10.0);
        let q = Interval::new(1.0, 9.0).unwrap();
        assert_eq!(b.lookup(&q, RelationMask::COVERS, &storage).len(), 1);
        let long = Interval::new(-100.0, 100.0).unwrap();
        assert!(b.lookup(&long, RelationMask::COVERS, &storage).is_empty());
    }

    #[test]
    fn test_covers_in_unbounded_bucket() {
        let storage = store(&[("all", Interval::unbounded())]);
        let b = filled(&storage, f64::INFINITY);
        let q = Interval::closed(5.0, f64::INFINITY).unwrap();
        assert_eq!(b.lookup(&q, RelationMask::OVERLAP, &storage), vec![0]);
        assert_eq!(b.lookup(&Interval::singular(3.0), RelationMask::OVERLAP, &storage), vec![0]);
    }

    #[test]
    fn test_check_counts_references() {
        let storage = store(&[
            ("a", Interval::new(0.0, 10.0).unwrap()),
            ("s", Interval::singular(3.0)),
        ]);
        let mut b = Bucket::new(f64::INFINITY);
        for (slot, cue) in storage.iter() {
            b.add_cue(slot, &cue.interval);
        }
        assert!(matches!(
            b.check(&storage, |_| f64::INFINITY, &mut HashMap::new()),
            Err(IntegrityError::Unflushed { .. })
        ));
        b.flush();
        let mut refs = HashMap::new();
        let stats = b.check(&storage, |_| f64::INFINITY, &mut refs).unwrap();
        assert_eq!(stats.points, 3);
        assert_eq!(stats.references, 3);
        assert_eq!(refs[&0], 2);
        assert_eq!(refs[&1], 1);
    }
}
