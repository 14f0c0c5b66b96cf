//! Sorted point array with binary search.

/// Map `-0.0` to `0.0` so equal points share one index slot and one map key.
#[inline]
pub(crate) fn normalize(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x
    }
}

/// Sorted, duplicate-free set of axis points.
#[derive(Debug, Clone, Default)]
pub struct PointIndex {
    points: Vec<f64>,
}

/// Batches at most this size are spliced in place.
const SPLICE_LIMIT: usize = 8;

impl PointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    pub fn contains(&self, x: f64) -> bool {
        self.search(x).is_ok()
    }

    /// Points within the closed range `[low, high]`.
    pub fn range(&self, low: f64, high: f64) -> &[f64] {
        let start = self.points.partition_point(|p| *p < low);
        let end = self.points.partition_point(|p| *p <= high);
        if start >= end {
            &[]
        } else {
            &self.points[start..end]
        }
    }

    /// Apply one batch of removals and insertions.
    ///
    /// Small batches are spliced in place; larger ones rebuild the array once.
    pub fn update(&mut self, to_remove: &[f64], to_insert: &[f64]) {
        let batch = to_remove.len() + to_insert.len();
        if batch == 0 {
            return;
        }
        if batch <= SPLICE_LIMIT || batch * 64 < self.points.len() {
            for x in to_remove {
                if let Ok(i) = self.search(*x) {
                    self.points.remove(i);
                }
            }
            for x in to_insert {
                let x = normalize(*x);
                if let Err(i) = self.search(x) {
                    self.points.insert(i, x);
                }
            }
        } else {
            let mut removed: Vec<f64> = to_remove.iter().copied().map(normalize).collect();
            removed.sort_by(f64::total_cmp);
            self.points
                .retain(|p| removed.binary_search_by(|r| r.total_cmp(p)).is_err());
            self.points
                .extend(to_insert.iter().copied().map(normalize));
            self.points.sort_by(f64::total_cmp);
            self.points.dedup();
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    fn search(&self, x: f64) -> Result<usize, usize> {
        let x = normalize(x);
        self.points.binary_search_by(|p| p.total_cmp(&x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_closed() {
        let mut idx = PointIndex::new();
        idx.update(&[], &[5.0, 1.0, 3.0, 3.0, 9.0]);
        assert_eq!(idx.as_slice(), &[1.0, 3.0, 5.0, 9.0]);
        assert_eq!(idx.range(3.0, 5.0), &[3.0, 5.0]);
        assert_eq!(idx.range(3.5, 4.5), &[] as &[f64]);
        assert_eq!(idx.range(f64::NEG_INFINITY, 2.0), &[1.0]);
    }

    #[test]
    fn test_splice_and_rebuild_agree() {
        let inserts: Vec<f64> = (0..100).map(|i| (i * 7 % 100) as f64).collect();
        let removes: Vec<f64> = (0..100).filter(|i| i % 3 == 0).map(|i| i as f64).collect();

        let mut bulk = PointIndex::new();
        bulk.update(&[], &inserts);
        bulk.update(&removes, &[]);

        let mut spliced = PointIndex::new();
        for x in &inserts {
            spliced.update(&[], &[*x]);
        }
        for x in &removes {
            spliced.update(&[*x], &[]);
        }
        assert_eq!(bulk.as_slice(), spliced.as_slice());
        assert_eq!(bulk.len(), 66);
    }

    #[test]
    fn test_negative_zero_shares_slot() {
        let mut idx = PointIndex::new();
        idx.update(&[], &[-0.0, 0.0]);
        assert_eq!(idx.len(), 1);
        assert!(idx.contains(-0.0));
        idx.update(&[-0.0], &[]);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_infinite_points() {
        let mut idx = PointIndex::new();
        idx.update(&[], &[f64::INFINITY, 0.0, f64::NEG_INFINITY]);
        assert_eq!(idx.range(f64::NEG_INFINITY, f64::INFINITY).len(), 3);
        assert_eq!(idx.range(1.0, f64::INFINITY), &[f64::INFINITY]);
    }
}
