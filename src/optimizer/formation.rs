// Formation catalog: the allowed (DEF, MID, FWD) starting splits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pool::Position;

/// Number of starters in the XI, goalkeeper included.
pub const STARTERS: usize = 11;

/// A starting formation. The goalkeeper count is always 1, so the three
/// outfield counts sum to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Formation {
    pub def: usize,
    pub mid: usize,
    pub fwd: usize,
}

impl Formation {
    /// Build a formation, validating the outfield split: counts must sum to
    /// 10 and stay within the squad's per-position ceilings (5/5/3), with at
    /// least one forward.
    pub fn new(def: usize, mid: usize, fwd: usize) -> Option<Self> {
        if def + mid + fwd != STARTERS - 1 {
            return None;
        }
        if def == 0 || mid == 0 || fwd == 0 {
            return None;
        }
        if def > 5 || mid > 5 || fwd > 3 {
            return None;
        }
        Some(Formation { def, mid, fwd })
    }

    /// Parse the "D-M-F" notation, e.g. `"4-4-2"`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().splitn(3, '-');
        let def = parts.next()?.trim().parse().ok()?;
        let mid = parts.next()?.trim().parse().ok()?;
        let fwd = parts.next()?.trim().parse().ok()?;
        Formation::new(def, mid, fwd)
    }

    /// The default allowed set, in catalog order. Cross-formation ties are
    /// broken by this order, so it is part of the observable contract.
    pub fn catalog() -> Vec<Formation> {
        [
            (3, 4, 3),
            (3, 5, 2),
            (4, 4, 2),
            (4, 5, 1),
            (5, 3, 2),
            (5, 4, 1),
            (4, 3, 3),
        ]
        .iter()
        .map(|&(d, m, f)| Formation { def: d, mid: m, fwd: f })
        .collect()
    }

    /// Number of starters required at a position.
    pub fn starters(&self, pos: Position) -> usize {
        match pos {
            Position::Goalkeeper => 1,
            Position::Defender => self.def,
            Position::Midfielder => self.mid,
            Position::Forward => self.fwd,
        }
    }
}

impl fmt::Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.def, self.mid, self.fwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_formations_all_sum_to_eleven_starters() {
        for f in Formation::catalog() {
            assert_eq!(1 + f.def + f.mid + f.fwd, STARTERS, "{f}");
        }
    }

    #[test]
    fn new_rejects_bad_splits() {
        assert!(Formation::new(4, 4, 2).is_some());
        assert!(Formation::new(4, 4, 3).is_none()); // sums to 11 outfielders
        assert!(Formation::new(6, 3, 1).is_none()); // too many defenders
        assert!(Formation::new(5, 5, 0).is_none()); // no forward
    }

    #[test]
    fn parse_round_trips_display() {
        let f = Formation::parse("3-5-2").unwrap();
        assert_eq!(f, Formation { def: 3, mid: 5, fwd: 2 });
        assert_eq!(f.to_string(), "3-5-2");
        assert!(Formation::parse("9-0-1").is_none());
        assert!(Formation::parse("442").is_none());
    }

    #[test]
    fn starters_per_position() {
        let f = Formation::parse("4-3-3").unwrap();
        assert_eq!(f.starters(Position::Goalkeeper), 1);
        assert_eq!(f.starters(Position::Defender), 4);
        assert_eq!(f.starters(Position::Midfielder), 3);
        assert_eq!(f.starters(Position::Forward), 3);
    }
}
