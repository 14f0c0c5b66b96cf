//! Interval relations and relation masks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// Position of one interval relative to another.
///
/// Read `a.compare(&b) == OverlapLeft` as "b overlaps a from the left".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    OutsideLeft,
    OverlapLeft,
    Covered,
    Equals,
    Covers,
    OverlapRight,
    OutsideRight,
}

impl Relation {
    pub const ALL: [Relation; 7] = [
        Relation::OutsideLeft,
        Relation::OverlapLeft,
        Relation::Covered,
        Relation::Equals,
        Relation::Covers,
        Relation::OverlapRight,
        Relation::OutsideRight,
    ];

    /// The relation seen from the other interval.
    pub fn mirror(self) -> Relation {
        match self {
            Relation::OutsideLeft => Relation::OutsideRight,
            Relation::OverlapLeft => Relation::OverlapRight,
            Relation::Covered => Relation::Covers,
            Relation::Equals => Relation::Equals,
            Relation::Covers => Relation::Covered,
            Relation::OverlapRight => Relation::OverlapLeft,
            Relation::OutsideRight => Relation::OutsideLeft,
        }
    }

    #[inline]
    pub fn mask(self) -> RelationMask {
        let bit = match self {
            Relation::OutsideLeft => 1,
            Relation::OverlapLeft => 2,
            Relation::Covered => 4,
            Relation::Equals => 8,
            Relation::Covers => 16,
            Relation::OverlapRight => 32,
            Relation::OutsideRight => 64,
        };
        RelationMask(bit)
    }
}

/// Set of relations used to filter lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RelationMask(u8);

impl RelationMask {
    pub const NONE: RelationMask = RelationMask(0);
    pub const OUTSIDE_LEFT: RelationMask = RelationMask(1);
    pub const OVERLAP_LEFT: RelationMask = RelationMask(2);
    pub const COVERED: RelationMask = RelationMask(4);
    pub const EQUALS: RelationMask = RelationMask(8);
    pub const COVERS: RelationMask = RelationMask(16);
    pub const OVERLAP_RIGHT: RelationMask = RelationMask(32);
    pub const OUTSIDE_RIGHT: RelationMask = RelationMask(64);

    /// Both endpoints inside the query.
    pub const INSIDE: RelationMask = RelationMask(4 | 8);
    /// INSIDE plus one endpoint inside.
    pub const PARTIAL: RelationMask = RelationMask(2 | 4 | 8 | 32);
    /// PARTIAL plus intervals covering the query.
    pub const OVERLAP: RelationMask = RelationMask(2 | 4 | 8 | 16 | 32);
    pub const ALL: RelationMask = RelationMask(127);

    #[inline]
    pub fn contains(self, relation: Relation) -> bool {
        self.0 & relation.mask().0 != 0
    }

    #[inline]
    pub fn intersects(self, other: RelationMask) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for RelationMask {
    type Output = RelationMask;
    fn bitor(self, rhs: Self) -> Self {
        RelationMask(self.0 | rhs.0)
    }
}

impl BitAnd for RelationMask {
    type Output = RelationMask;
    fn bitand(self, rhs: Self) -> Self {
        RelationMask(self.0 & rhs.0)
    }
}

impl From<Relation> for RelationMask {
    fn from(r: Relation) -> Self {
        r.mask()
    }
}

/// Named query semantics for axis lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semantic {
    /// Cue lies within the query
    Inside,
    /// Cue has at least one endpoint within the query
    Partial,
    /// Cue shares any position with the query
    #[default]
    Overlap,
}

impl Semantic {
    pub fn mask(self) -> RelationMask {
        match self {
            Semantic::Inside => RelationMask::INSIDE,
            Semantic::Partial => RelationMask::PARTIAL,
            Semantic::Overlap => RelationMask::OVERLAP,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::OutsideLeft => "OUTSIDE_LEFT",
            Relation::OverlapLeft => "OVERLAP_LEFT",
            Relation::Covered => "COVERED",
            Relation::Equals => "EQUALS",
            Relation::Covers => "COVERS",
            Relation::OverlapRight => "OVERLAP_RIGHT",
            Relation::OutsideRight => "OUTSIDE_RIGHT",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_nest() {
        for r in Relation::ALL {
            if RelationMask::INSIDE.contains(r) {
                assert!(RelationMask::PARTIAL.contains(r));
            }
            if RelationMask::PARTIAL.contains(r) {
                assert!(RelationMask::OVERLAP.contains(r));
            }
            assert!(RelationMask::ALL.contains(r));
        }
        assert!(!RelationMask::OVERLAP.contains(Relation::OutsideLeft));
        assert!(!RelationMask::PARTIAL.contains(Relation::Covers));
    }

    #[test]
    fn test_mirror_is_involution() {
        for r in Relation::ALL {
            assert_eq!(r.mirror().mirror(), r);
        }
    }

    #[test]
    fn test_bit_ops() {
        let m = RelationMask::COVERED | RelationMask::EQUALS;
        assert_eq!(m, RelationMask::INSIDE);
        assert!((m & RelationMask::COVERS).is_empty());
        assert!(m.intersects(RelationMask::OVERLAP));
    }
}
