// XI arrangement for a fixed squad.
//
// Given 15 already-chosen players, pick the starting eleven for a formation
// (or the best formation of several) by taking the top scorers at each
// position. This runs after squad construction to finalize the split, and
// standalone to re-evaluate an existing squad under a different score basis
// (e.g. single-gameweek points instead of the multi-week projections the
// squad was built with).

use std::collections::HashMap;

use crate::optimizer::formation::Formation;
use crate::optimizer::lexico::stage_cmp;
use crate::pool::{PlayerId, PlayerPool, Position};

/// Score basis for arrangement. `Pool` uses each player's projected score;
/// `Override` substitutes per-player values, falling back to the pool score
/// for players without an entry.
#[derive(Debug, Clone, Copy)]
pub enum ScoreBasis<'a> {
    Pool,
    Override(&'a HashMap<PlayerId, f64>),
}

impl ScoreBasis<'_> {
    pub fn score(&self, pool: &PlayerPool, id: PlayerId) -> f64 {
        match self {
            ScoreBasis::Pool => pool.player(id).score,
            ScoreBasis::Override(map) => {
                map.get(&id).copied().unwrap_or_else(|| pool.player(id).score)
            }
        }
    }
}

/// A starting/bench split of a fixed squad.
#[derive(Debug, Clone)]
pub struct Arrangement {
    pub formation: Formation,
    pub starting: Vec<PlayerId>,
    pub bench: Vec<PlayerId>,
    pub starting_score: f64,
}

/// Split `squad` into XI + bench for one formation, maximizing the starting
/// score. Returns `None` when the squad cannot field the formation (fewer
/// players at some position than the formation requires).
///
/// Starters within a position are the top scorers; exact ties go to the
/// lower arena id, so the result is deterministic.
pub fn arrange(
    pool: &PlayerPool,
    squad: &[PlayerId],
    formation: Formation,
    basis: ScoreBasis,
) -> Option<Arrangement> {
    let mut by_position: [Vec<PlayerId>; 4] = Default::default();
    for &id in squad {
        by_position[pool.player(id).position.index()].push(id);
    }

    let mut starting = Vec::with_capacity(11);
    let mut bench = Vec::with_capacity(squad.len().saturating_sub(11));
    let mut starting_score = 0.0;

    for pos in Position::ALL {
        let group = &mut by_position[pos.index()];
        let need = formation.starters(pos);
        if group.len() < need {
            return None;
        }
        group.sort_by(|&a, &b| {
            basis
                .score(pool, b)
                .partial_cmp(&basis.score(pool, a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        for (i, &id) in group.iter().enumerate() {
            if i < need {
                starting.push(id);
                starting_score += basis.score(pool, id);
            } else {
                bench.push(id);
            }
        }
    }

    Some(Arrangement {
        formation,
        starting,
        bench,
        starting_score,
    })
}

/// Best arrangement over several formations by starting score. Formations
/// the squad cannot field are skipped; ties go to the earlier formation in
/// the given order. Returns `None` when no formation fits.
pub fn arrange_best(
    pool: &PlayerPool,
    squad: &[PlayerId],
    formations: &[Formation],
    basis: ScoreBasis,
) -> Option<Arrangement> {
    let mut best: Option<Arrangement> = None;
    for &formation in formations {
        let Some(candidate) = arrange(pool, squad, formation, basis) else {
            continue;
        };
        let improves = match &best {
            None => true,
            Some(current) => {
                stage_cmp(candidate.starting_score, current.starting_score)
                    == std::cmp::Ordering::Greater
            }
        };
        if improves {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Money;

    /// 2 GK, 5 DEF, 5 MID, 3 FWD with descending scores inside each group.
    fn full_squad(pool: &mut PlayerPool) -> Vec<PlayerId> {
        let mut ids = Vec::new();
        let spec = [
            (Position::Goalkeeper, 2),
            (Position::Defender, 5),
            (Position::Midfielder, 5),
            (Position::Forward, 3),
        ];
        for (pos, count) in spec {
            for i in 0..count {
                let name = format!("{}{}", pos.display_str(), i);
                let score = 10.0 - i as f64;
                ids.push(pool.insert(&name, "Club", pos, Money(50), score));
            }
        }
        ids
    }

    #[test]
    fn arrange_picks_top_scorers_per_position() {
        let mut pool = PlayerPool::new();
        let squad = full_squad(&mut pool);
        let formation = Formation::parse("4-4-2").unwrap();
        let arr = arrange(&pool, &squad, formation, ScoreBasis::Pool).unwrap();

        assert_eq!(arr.starting.len(), 11);
        assert_eq!(arr.bench.len(), 4);
        // 1 GK(10) + DEF 10+9+8+7 + MID 10+9+8+7 + FWD 10+9
        assert!((arr.starting_score - (10.0 + 34.0 + 34.0 + 19.0)).abs() < 1e-9);

        let bench_positions: Vec<Position> = arr
            .bench
            .iter()
            .map(|&id| pool.player(id).position)
            .collect();
        assert_eq!(
            bench_positions
                .iter()
                .filter(|p| **p == Position::Goalkeeper)
                .count(),
            1
        );
    }

    #[test]
    fn arrange_rejects_unfieldable_formation() {
        let mut pool = PlayerPool::new();
        // Only 2 defenders: 3-4-3 cannot be fielded, let alone 4-4-2.
        let mut squad = Vec::new();
        squad.push(pool.insert("G", "C", Position::Goalkeeper, Money(40), 4.0));
        for i in 0..2 {
            squad.push(pool.insert(&format!("D{i}"), "C", Position::Defender, Money(40), 4.0));
        }
        for i in 0..8 {
            squad.push(pool.insert(&format!("M{i}"), "C", Position::Midfielder, Money(40), 4.0));
        }
        assert!(arrange(
            &pool,
            &squad,
            Formation::parse("3-4-3").unwrap(),
            ScoreBasis::Pool
        )
        .is_none());
    }

    #[test]
    fn arrange_best_prefers_higher_starting_score() {
        let mut pool = PlayerPool::new();
        let squad = full_squad(&mut pool);
        let formations = vec![
            Formation::parse("5-4-1").unwrap(),
            Formation::parse("3-4-3").unwrap(),
        ];
        let best = arrange_best(&pool, &squad, &formations, ScoreBasis::Pool).unwrap();
        // Scores fall off equally in every group, so the richer forward line
        // wins: 3-4-3 keeps 10+9+8 up front against 5-4-1's extra 6-point
        // fifth defender.
        assert_eq!(best.formation, Formation::parse("3-4-3").unwrap());
    }

    #[test]
    fn arrange_best_ties_go_to_catalog_order() {
        let mut pool = PlayerPool::new();
        // All scores equal: every fieldable formation scores the same.
        let mut squad = Vec::new();
        let spec = [
            (Position::Goalkeeper, 2),
            (Position::Defender, 5),
            (Position::Midfielder, 5),
            (Position::Forward, 3),
        ];
        for (pos, count) in spec {
            for i in 0..count {
                squad.push(pool.insert(
                    &format!("{}{}", pos.display_str(), i),
                    "Club",
                    pos,
                    Money(50),
                    5.0,
                ));
            }
        }
        let formations = Formation::catalog();
        let best = arrange_best(&pool, &squad, &formations, ScoreBasis::Pool).unwrap();
        assert_eq!(best.formation, formations[0]);
    }

    #[test]
    fn override_basis_rearranges_without_touching_pool() {
        let mut pool = PlayerPool::new();
        let squad = full_squad(&mut pool);
        let formation = Formation::parse("4-4-2").unwrap();

        // Flip the worst forward to be the best under the override basis.
        let worst_fwd = *squad
            .iter()
            .filter(|&&id| pool.player(id).position == Position::Forward)
            .min_by(|&&a, &&b| {
                pool.player(a)
                    .score
                    .partial_cmp(&pool.player(b).score)
                    .unwrap()
            })
            .unwrap();
        let mut overrides = HashMap::new();
        overrides.insert(worst_fwd, 99.0);

        let arr = arrange(&pool, &squad, formation, ScoreBasis::Override(&overrides)).unwrap();
        assert!(arr.starting.contains(&worst_fwd));
        // The pool itself is unchanged.
        assert!((pool.player(worst_fwd).score - 8.0).abs() < 1e-9);
    }
}
