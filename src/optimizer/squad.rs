// Squad construction: exact optimization of the full squad.
//
// For each candidate formation the three-role binary model (in squad /
// starts / benched) is solved exactly by a dynamic program over the four
// position groups, with money tracked on an integer-tenths axis. The DP
// value is the (starting score, bench score) pair compared stage by stage,
// and cost is minimized over the surviving final states, which together
// realize the three lexicographic stages: maximize starting score, then
// bench score, then minimize total cost.
//
// The per-club cap is the one constraint that does not decompose by
// position, so it lives in a branch-and-bound layer: solve the relaxation,
// and while some club is over the cap, branch by forbidding one of its
// selected members. The relaxation value bounds every completion, so nodes
// that cannot beat the incumbent are pruned.

use tracing::{debug, warn};

use crate::optimizer::arrange::{arrange, Arrangement, ScoreBasis};
use crate::optimizer::formation::Formation;
use crate::optimizer::lexico::{stage_cmp, LexKey};
use crate::pool::{ClubId, Money, PlayerId, PlayerPool, Position, PositionCounts};

/// Branch-and-bound node budget per formation. A search that exhausts this
/// cannot confirm optimality, so the formation is reported infeasible
/// rather than returning a possibly suboptimal squad.
const NODE_LIMIT: usize = 100_000;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Squad-wide capacity rules: per-position totals and the per-club cap.
#[derive(Debug, Clone)]
pub struct CapacityRules {
    /// Exact per-position squad totals. The squad size is their sum.
    pub squad_caps: PositionCounts,
    /// Maximum players from any one club.
    pub club_cap: usize,
}

impl Default for CapacityRules {
    fn default() -> Self {
        CapacityRules {
            squad_caps: PositionCounts([2, 5, 5, 3]),
            club_cap: 3,
        }
    }
}

/// Everything the optimizer needs besides the pool itself.
///
/// The inclusion/exclusion sets are fixed variable assignments in the
/// model, not preferences: a conflicting assignment (e.g. a forced player
/// who is also excluded) makes the whole problem infeasible.
#[derive(Debug, Clone)]
pub struct SquadRules {
    pub budget: Money,
    pub formations: Vec<Formation>,
    pub capacity: CapacityRules,
    /// Optional cap on the combined price of the bench.
    pub bench_budget: Option<Money>,
    /// Players that must be in the squad.
    pub force_in: Vec<PlayerId>,
    /// Players that must be in the squad and in the starting XI.
    pub force_start: Vec<PlayerId>,
    /// Players that must not be selected.
    pub exclude: Vec<PlayerId>,
    /// When set, only players from these clubs may be selected.
    pub allow_clubs: Option<Vec<ClubId>>,
    /// Clubs whose players must not be selected.
    pub exclude_clubs: Vec<ClubId>,
}

impl SquadRules {
    pub fn new(budget: Money, formations: Vec<Formation>) -> Self {
        SquadRules {
            budget,
            formations,
            capacity: CapacityRules::default(),
            bench_budget: None,
            force_in: Vec::new(),
            force_start: Vec::new(),
            exclude: Vec::new(),
            allow_clubs: None,
            exclude_clubs: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The optimal rule-valid squad, already split into XI + bench.
#[derive(Debug, Clone)]
pub struct BestSquad {
    pub squad: Vec<PlayerId>,
    pub formation: Formation,
    pub starting: Vec<PlayerId>,
    pub bench: Vec<PlayerId>,
    pub starting_score: f64,
    pub bench_score: f64,
    pub total_cost: Money,
    pub starting_cost: Money,
    pub bench_cost: Money,
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: PlayerId,
    club: ClubId,
    price: i64,
    score: f64,
    mandatory: bool,
    must_start: bool,
}

/// Apply the fixed assignments and club filters, grouping the survivors by
/// position in (score desc, id asc) order. Returns `None` on a conflicting
/// assignment (a forced player filtered out), which is global infeasibility.
fn build_groups(pool: &PlayerPool, rules: &SquadRules) -> Option<[Vec<Candidate>; 4]> {
    let mut groups: [Vec<Candidate>; 4] = Default::default();

    for (id, player) in pool.iter() {
        let forced = rules.force_in.contains(&id) || rules.force_start.contains(&id);
        let club_allowed = match &rules.allow_clubs {
            Some(allowed) => allowed.contains(&player.club),
            None => true,
        };
        let kept = club_allowed
            && !rules.exclude.contains(&id)
            && !rules.exclude_clubs.contains(&player.club);
        if !kept {
            if forced {
                return None;
            }
            continue;
        }
        groups[player.position.index()].push(Candidate {
            id,
            club: player.club,
            price: player.price.tenths(),
            score: player.score,
            mandatory: forced,
            must_start: rules.force_start.contains(&id),
        });
    }

    for group in groups.iter_mut() {
        group.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
    }

    Some(groups)
}

// ---------------------------------------------------------------------------
// Relaxed solve (club cap ignored): DP over position groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Val {
    start: f64,
    bench: f64,
}

const DEAD: Val = Val {
    start: f64::NEG_INFINITY,
    bench: f64::NEG_INFINITY,
};

impl Val {
    fn alive(&self) -> bool {
        self.start > f64::NEG_INFINITY / 2.0
    }

    fn better_than(&self, other: &Val) -> bool {
        match stage_cmp(self.start, other.start) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
                stage_cmp(self.bench, other.bench) == std::cmp::Ordering::Greater
            }
        }
    }
}

const DEC_SKIP: u8 = 0;
const DEC_BENCH: u8 = 1;
const DEC_START: u8 = 2;

/// Per-group DP bookkeeping kept for path reconstruction.
struct GroupTrace {
    members: Vec<Candidate>,
    decisions: Vec<u8>,
    s_need: usize,
    b_need: usize,
}

struct RelaxedSolution {
    squad: Vec<PlayerId>,
    starting_score: f64,
    bench_score: f64,
    cost: Money,
}

impl RelaxedSolution {
    /// Within-formation objective: starting score, bench score, then lower
    /// cost.
    fn key(&self) -> LexKey {
        LexKey([
            self.starting_score,
            self.bench_score,
            -(self.cost.tenths() as f64),
        ])
    }
}

struct DpDims {
    m_axis: i64,
    bb_axis: i64,
    bench_capped: bool,
}

impl DpDims {
    fn boundary_len(&self) -> usize {
        ((self.bb_axis + 1) * (self.m_axis + 1)) as usize
    }

    fn state_len(&self, s_need: usize, b_need: usize) -> usize {
        (s_need + 1) * (b_need + 1) * self.boundary_len()
    }

    fn idx(&self, cs: usize, cb: usize, bm: i64, m: i64, b_need: usize) -> usize {
        ((cs * (b_need + 1) + cb) as i64 * (self.bb_axis + 1) * (self.m_axis + 1)
            + bm * (self.m_axis + 1)
            + m) as usize
    }
}

/// Solve the model without the per-club cap, honoring `forbidden`.
fn solve_relaxed(
    groups: &[Vec<Candidate>; 4],
    caps: &PositionCounts,
    formation: Formation,
    budget: Money,
    bench_budget: Option<Money>,
    forbidden: &[bool],
) -> Option<RelaxedSolution> {
    if budget.is_negative() {
        return None;
    }

    // A forced player that a branch has forbidden cannot be completed into
    // any feasible assignment.
    for group in groups {
        if group
            .iter()
            .any(|c| c.mandatory && forbidden[c.id.index()])
        {
            return None;
        }
    }

    // Bound the money axis by the most that could ever be spent: the
    // cap_p priciest players of each group.
    let mut max_spend: i64 = 0;
    for pos in Position::ALL {
        let cap = caps.get(pos);
        let mut prices: Vec<i64> = groups[pos.index()].iter().map(|c| c.price).collect();
        prices.sort_unstable_by(|a, b| b.cmp(a));
        max_spend += prices.iter().take(cap).sum::<i64>();
    }
    let dims = DpDims {
        m_axis: budget.tenths().min(max_spend),
        bb_axis: bench_budget
            .map(|b| b.tenths().max(0).min(budget.tenths().min(max_spend)))
            .unwrap_or(0),
        bench_capped: bench_budget.is_some(),
    };

    let mut boundary = vec![DEAD; dims.boundary_len()];
    boundary[0] = Val {
        start: 0.0,
        bench: 0.0,
    };

    let mut traces: Vec<GroupTrace> = Vec::with_capacity(4);

    for pos in Position::ALL {
        let cap = caps.get(pos);
        let s_need = formation.starters(pos);
        if s_need > cap {
            return None;
        }
        let b_need = cap - s_need;

        let members: Vec<Candidate> = groups[pos.index()]
            .iter()
            .filter(|c| !forbidden[c.id.index()])
            .copied()
            .collect();
        if members.len() < cap {
            return None;
        }
        if members.iter().filter(|c| c.must_start).count() > s_need {
            return None;
        }
        if members.iter().filter(|c| c.mandatory).count() > cap {
            return None;
        }

        let state_len = dims.state_len(s_need, b_need);
        let mut grid = vec![DEAD; state_len];
        // Entry: nothing chosen in this group yet.
        for bm in 0..=dims.bb_axis {
            for m in 0..=dims.m_axis {
                grid[dims.idx(0, 0, bm, m, b_need)] =
                    boundary[(bm * (dims.m_axis + 1) + m) as usize];
            }
        }

        let mut decisions = vec![DEC_SKIP; members.len() * state_len];

        for (j, cand) in members.iter().enumerate() {
            let mut next = if cand.mandatory {
                vec![DEAD; state_len]
            } else {
                grid.clone()
            };
            let dec = &mut decisions[j * state_len..(j + 1) * state_len];

            for cs in 0..=s_need {
                for cb in 0..=b_need {
                    for bm in 0..=dims.bb_axis {
                        for m in 0..=dims.m_axis {
                            let v = grid[dims.idx(cs, cb, bm, m, b_need)];
                            if !v.alive() {
                                continue;
                            }
                            // Take as a bench pick.
                            if !cand.must_start
                                && cb < b_need
                                && m + cand.price <= dims.m_axis
                                && (!dims.bench_capped || bm + cand.price <= dims.bb_axis)
                            {
                                let nbm = if dims.bench_capped { bm + cand.price } else { 0 };
                                let tgt = dims.idx(cs, cb + 1, nbm, m + cand.price, b_need);
                                let nv = Val {
                                    start: v.start,
                                    bench: v.bench + cand.score,
                                };
                                if nv.better_than(&next[tgt]) {
                                    next[tgt] = nv;
                                    dec[tgt] = DEC_BENCH;
                                }
                            }
                            // Take as a starter.
                            if cs < s_need && m + cand.price <= dims.m_axis {
                                let tgt = dims.idx(cs + 1, cb, bm, m + cand.price, b_need);
                                let nv = Val {
                                    start: v.start + cand.score,
                                    bench: v.bench,
                                };
                                if nv.better_than(&next[tgt]) {
                                    next[tgt] = nv;
                                    dec[tgt] = DEC_START;
                                }
                            }
                        }
                    }
                }
            }
            grid = next;
        }

        // Only states that filled the group exactly survive.
        let mut exit = vec![DEAD; dims.boundary_len()];
        for bm in 0..=dims.bb_axis {
            for m in 0..=dims.m_axis {
                exit[(bm * (dims.m_axis + 1) + m) as usize] =
                    grid[dims.idx(s_need, b_need, bm, m, b_need)];
            }
        }
        boundary = exit;

        traces.push(GroupTrace {
            members,
            decisions,
            s_need,
            b_need,
        });
    }

    // Final stage: among complete assignments, prefer higher starting then
    // bench score, then the lowest total cost.
    let mut best: Option<(LexKey, i64, i64)> = None;
    for bm in 0..=dims.bb_axis {
        for m in 0..=dims.m_axis {
            let v = boundary[(bm * (dims.m_axis + 1) + m) as usize];
            if !v.alive() {
                continue;
            }
            let key = LexKey([v.start, v.bench, -(m as f64)]);
            let improves = match &best {
                None => true,
                Some((current, _, _)) => key.better_than(current),
            };
            if improves {
                best = Some((key, m, bm));
            }
        }
    }
    let (key, mut m, mut bm) = best?;

    // Walk the groups backwards to recover the selection.
    let mut squad = Vec::with_capacity(caps.total());
    for trace in traces.iter().rev() {
        let mut cs = trace.s_need;
        let mut cb = trace.b_need;
        for (j, cand) in trace.members.iter().enumerate().rev() {
            let state = dims.idx(cs, cb, bm, m, trace.b_need);
            let d = trace.decisions[j * dims.state_len(trace.s_need, trace.b_need) + state];
            match d {
                DEC_START => {
                    squad.push(cand.id);
                    cs -= 1;
                    m -= cand.price;
                }
                DEC_BENCH => {
                    squad.push(cand.id);
                    cb -= 1;
                    m -= cand.price;
                    if dims.bench_capped {
                        bm -= cand.price;
                    }
                }
                _ => {}
            }
        }
    }
    squad.sort();

    Some(RelaxedSolution {
        squad,
        starting_score: key.0[0],
        bench_score: key.0[1],
        cost: Money::from_tenths(-key.0[2] as i64),
    })
}

// ---------------------------------------------------------------------------
// Club-cap branch and bound
// ---------------------------------------------------------------------------

/// Solve one formation to confirmed optimality, or `None` when infeasible
/// (including the node-limit case, which cannot confirm optimality).
fn solve_formation(
    pool: &PlayerPool,
    groups: &[Vec<Candidate>; 4],
    rules: &SquadRules,
    formation: Formation,
) -> Option<RelaxedSolution> {
    let club_cap = rules.capacity.club_cap;
    let mut incumbent: Option<RelaxedSolution> = None;
    let mut stack: Vec<Vec<bool>> = vec![vec![false; pool.len()]];
    let mut nodes = 0usize;

    while let Some(forbidden) = stack.pop() {
        nodes += 1;
        if nodes > NODE_LIMIT {
            warn!(
                %formation,
                "club-cap search exceeded {NODE_LIMIT} nodes; treating formation as infeasible"
            );
            return None;
        }

        let Some(solution) = solve_relaxed(
            groups,
            &rules.capacity.squad_caps,
            formation,
            rules.budget,
            rules.bench_budget,
            &forbidden,
        ) else {
            continue;
        };

        if let Some(inc) = &incumbent {
            if !solution.key().better_than(&inc.key()) {
                continue;
            }
        }

        let counts = pool.club_counts(&solution.squad);
        let violated = counts
            .iter()
            .enumerate()
            .find(|(_, &count)| count > club_cap)
            .map(|(club, _)| ClubId(club as u32));

        match violated {
            None => incumbent = Some(solution),
            Some(club) => {
                // Any feasible completion drops at least one of this club's
                // selected members; push in reverse so the lowest id is
                // explored first.
                for &member in solution
                    .squad
                    .iter()
                    .filter(|&&id| pool.player(id).club == club)
                    .collect::<Vec<_>>()
                    .iter()
                    .rev()
                {
                    let mut child = forbidden.clone();
                    child[member.index()] = true;
                    stack.push(child);
                }
            }
        }
    }

    incumbent
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Find the best rule-valid squad, or `None` when every formation is
/// infeasible. Deterministic: identical inputs produce identical squads,
/// with cross-formation ties resolved in favor of the earlier formation.
pub fn optimize(pool: &PlayerPool, rules: &SquadRules) -> Option<BestSquad> {
    if rules.formations.is_empty() || rules.budget.is_negative() {
        return None;
    }
    let groups = build_groups(pool, rules)?;

    let mut best: Option<(LexKey, BestSquad)> = None;

    for &formation in &rules.formations {
        let Some(solution) = solve_formation(pool, &groups, rules, formation) else {
            debug!(%formation, "formation infeasible, skipped");
            continue;
        };

        let Some(arrangement) = finalize(pool, &solution.squad, formation, &rules.force_start)
        else {
            continue;
        };
        let candidate = to_best_squad(pool, solution.squad, arrangement);
        // Cross-formation ordered key: starting score, lower cost, bench
        // score.
        let key = LexKey([
            candidate.starting_score,
            -(candidate.total_cost.tenths() as f64),
            candidate.bench_score,
        ]);
        debug!(
            %formation,
            starting = candidate.starting_score,
            cost = %candidate.total_cost,
            "formation solved"
        );

        let improves = match &best {
            None => true,
            Some((current, _)) => key.better_than(current),
        };
        if improves {
            best = Some((key, candidate));
        }
    }

    best.map(|(_, squad)| squad)
}

/// Re-split the chosen squad with the arranger so the published XI is the
/// true score-maximal one (a bench sub-budget can skew the roles the model
/// used internally). Forced starters keep their slots; the rest of the XI
/// is the score-maximal completion.
fn finalize(
    pool: &PlayerPool,
    squad: &[PlayerId],
    formation: Formation,
    force_start: &[PlayerId],
) -> Option<Arrangement> {
    if force_start.is_empty() {
        return arrange(pool, squad, formation, ScoreBasis::Pool);
    }

    let mut starting: Vec<PlayerId> = Vec::with_capacity(11);
    let mut bench: Vec<PlayerId> = Vec::new();
    let mut starting_score = 0.0;

    for pos in Position::ALL {
        let mut group: Vec<PlayerId> = squad
            .iter()
            .copied()
            .filter(|&id| pool.player(id).position == pos)
            .collect();
        group.sort_by(|&a, &b| {
            pool.player(b)
                .score
                .partial_cmp(&pool.player(a).score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let forced: Vec<PlayerId> = group
            .iter()
            .copied()
            .filter(|id| force_start.contains(id))
            .collect();
        let need = formation.starters(pos);
        if forced.len() > need || group.len() < need {
            return None;
        }
        let mut taken = forced.len();
        for &id in &forced {
            starting.push(id);
            starting_score += pool.player(id).score;
        }
        for &id in group.iter().filter(|id| !force_start.contains(id)) {
            if taken < need {
                starting.push(id);
                starting_score += pool.player(id).score;
                taken += 1;
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

fn to_best_squad(pool: &PlayerPool, squad: Vec<PlayerId>, arrangement: Arrangement) -> BestSquad {
    let starting_cost = pool.total_price(&arrangement.starting);
    let bench_cost = pool.total_price(&arrangement.bench);
    let bench_score = pool.total_score(&arrangement.bench);
    BestSquad {
        total_cost: starting_cost + bench_cost,
        starting_score: arrangement.starting_score,
        bench_score,
        starting_cost,
        bench_cost,
        formation: arrangement.formation,
        starting: arrangement.starting,
        bench: arrangement.bench,
        squad,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formation(s: &str) -> Formation {
        Formation::parse(s).unwrap()
    }

    /// 2 GK, 6 DEF, 7 MID, 5 FWD across distinct clubs, scores descending
    /// within each group so the best 15 are unambiguous.
    fn scenario_pool() -> (PlayerPool, Vec<PlayerId>) {
        let mut pool = PlayerPool::new();
        let mut ids = Vec::new();
        let spec = [
            (Position::Goalkeeper, 2),
            (Position::Defender, 6),
            (Position::Midfielder, 7),
            (Position::Forward, 5),
        ];
        let mut club = 0;
        for (pos, count) in spec {
            for i in 0..count {
                let name = format!("{}{}", pos.display_str(), i);
                let id = pool.insert(
                    &name,
                    &format!("Club{club}"),
                    pos,
                    Money(40 + i as i64),
                    20.0 - i as f64,
                );
                ids.push(id);
                club += 1;
            }
        }
        (pool, ids)
    }

    fn expected_best_15(pool: &PlayerPool, ids: &[PlayerId]) -> Vec<PlayerId> {
        // Top scorers per position up to the caps: 2 GK, 5 DEF, 5 MID, 3 FWD.
        let mut expected = Vec::new();
        for (pos, take) in [
            (Position::Goalkeeper, 2usize),
            (Position::Defender, 5),
            (Position::Midfielder, 5),
            (Position::Forward, 3),
        ] {
            let mut group: Vec<PlayerId> = ids
                .iter()
                .copied()
                .filter(|&id| pool.player(id).position == pos)
                .collect();
            group.sort_by(|&a, &b| {
                pool.player(b)
                    .score
                    .partial_cmp(&pool.player(a).score)
                    .unwrap()
            });
            expected.extend(group.into_iter().take(take));
        }
        expected.sort();
        expected
    }

    #[test]
    fn picks_the_best_fifteen_when_budget_allows() {
        let (pool, ids) = scenario_pool();
        let mut expected = expected_best_15(&pool, &ids);
        expected.sort();
        let budget = pool.total_price(&expected);

        let rules = SquadRules::new(budget, vec![formation("4-4-2")]);
        let best = optimize(&pool, &rules).expect("feasible");

        let mut squad = best.squad.clone();
        squad.sort();
        assert_eq!(squad, expected);
        assert_eq!(best.formation, formation("4-4-2"));
        assert_eq!(best.starting.len(), 11);
        assert_eq!(best.bench.len(), 4);

        let starting_counts = PositionCounts::of(&pool, &best.starting);
        assert_eq!(starting_counts.0, [1, 4, 4, 2]);
        let squad_counts = PositionCounts::of(&pool, &best.squad);
        assert_eq!(squad_counts.0, [2, 5, 5, 3]);
        assert!(best.total_cost <= budget);
    }

    #[test]
    fn budget_squeezes_out_expensive_players() {
        let mut pool = PlayerPool::new();
        // Minimal groups: exactly cap-many cheap players everywhere, plus a
        // star defender who only fits under the larger budget.
        let mut club = 0;
        let mut push = |pool: &mut PlayerPool, pos, price, score| {
            club += 1;
            pool.insert(
                &format!("P{club}"),
                &format!("C{club}"),
                pos,
                Money(price),
                score,
            )
        };
        for _ in 0..2 {
            push(&mut pool, Position::Goalkeeper, 40, 2.0);
        }
        for _ in 0..5 {
            push(&mut pool, Position::Defender, 40, 2.0);
        }
        let star = push(&mut pool, Position::Defender, 120, 9.0);
        for _ in 0..5 {
            push(&mut pool, Position::Midfielder, 40, 2.0);
        }
        for _ in 0..3 {
            push(&mut pool, Position::Forward, 40, 2.0);
        }

        let formations = vec![formation("4-4-2")];

        // 15 cheap players cost 600; the star swap costs 80 more.
        let tight = SquadRules::new(Money(600), formations.clone());
        let best_tight = optimize(&pool, &tight).expect("feasible");
        assert!(!best_tight.squad.contains(&star));

        let loose = SquadRules::new(Money(680), formations);
        let best_loose = optimize(&pool, &loose).expect("feasible");
        assert!(best_loose.squad.contains(&star));
        assert!(best_loose.starting.contains(&star));
        // Monotonicity: more budget never lowers the starting score.
        assert!(best_loose.starting_score >= best_tight.starting_score - 1e-9);
    }

    #[test]
    fn club_cap_drops_the_weakest_of_a_stacked_club() {
        let mut pool = PlayerPool::new();
        let mut filler = 0;
        let mut push = |pool: &mut PlayerPool, pos, club: &str, score| {
            filler += 1;
            pool.insert(&format!("P{filler}"), club, pos, Money(40), score)
        };
        // Four defenders from one club outscore everyone else.
        let stacked: Vec<PlayerId> = (0..4)
            .map(|i| push(&mut pool, Position::Defender, "Stacked", 9.0 - i as f64))
            .collect();
        for _ in 0..2 {
            push(&mut pool, Position::Goalkeeper, "Other1", 2.0);
        }
        for i in 0..3 {
            push(&mut pool, Position::Defender, &format!("D{i}"), 1.0);
        }
        for i in 0..5 {
            push(&mut pool, Position::Midfielder, &format!("M{i}"), 2.0);
        }
        for i in 0..3 {
            push(&mut pool, Position::Forward, &format!("F{i}"), 2.0);
        }

        let rules = SquadRules::new(Money(1000), vec![formation("4-4-2")]);
        let best = optimize(&pool, &rules).expect("feasible");

        let from_stacked = best
            .squad
            .iter()
            .filter(|&&id| pool.player(id).club == pool.player(stacked[0]).club)
            .count();
        assert_eq!(from_stacked, 3);
        // The weakest of the four is the one dropped.
        assert!(!best.squad.contains(&stacked[3]));
        for &keep in &stacked[..3] {
            assert!(best.squad.contains(&keep));
        }
    }

    #[test]
    fn forced_and_excluded_players_are_fixed_assignments() {
        let (pool, ids) = scenario_pool();
        let expected = expected_best_15(&pool, &ids);
        let budget = Money(2000);

        // Exclude the best midfielder; force in the worst forward.
        let best_mid = *ids
            .iter()
            .find(|&&id| {
                pool.player(id).position == Position::Midfielder && pool.player(id).score == 20.0
            })
            .unwrap();
        let worst_fwd = *ids
            .iter()
            .filter(|&&id| pool.player(id).position == Position::Forward)
            .min_by(|&&a, &&b| {
                pool.player(a)
                    .score
                    .partial_cmp(&pool.player(b).score)
                    .unwrap()
            })
            .unwrap();
        assert!(!expected.contains(&worst_fwd));

        let mut rules = SquadRules::new(budget, vec![formation("4-4-2")]);
        rules.exclude.push(best_mid);
        rules.force_in.push(worst_fwd);
        let best = optimize(&pool, &rules).expect("feasible");

        assert!(!best.squad.contains(&best_mid));
        assert!(best.squad.contains(&worst_fwd));
    }

    #[test]
    fn conflicting_assignments_are_infeasible() {
        let (pool, ids) = scenario_pool();
        let mut rules = SquadRules::new(Money(2000), vec![formation("4-4-2")]);
        rules.force_in.push(ids[0]);
        rules.exclude.push(ids[0]);
        assert!(optimize(&pool, &rules).is_none());
    }

    #[test]
    fn forced_starter_starts_even_when_outscored() {
        let (pool, ids) = scenario_pool();
        let worst_fwd = *ids
            .iter()
            .filter(|&&id| pool.player(id).position == Position::Forward)
            .min_by(|&&a, &&b| {
                pool.player(a)
                    .score
                    .partial_cmp(&pool.player(b).score)
                    .unwrap()
            })
            .unwrap();

        let mut rules = SquadRules::new(Money(2000), vec![formation("4-4-2")]);
        rules.force_start.push(worst_fwd);
        let best = optimize(&pool, &rules).expect("feasible");
        assert!(best.squad.contains(&worst_fwd));
        assert!(best.starting.contains(&worst_fwd));
        assert_eq!(best.starting.len(), 11);
    }

    #[test]
    fn impossible_budget_is_globally_infeasible() {
        let (pool, _) = scenario_pool();
        let rules = SquadRules::new(Money(10), vec![formation("4-4-2"), formation("3-5-2")]);
        assert!(optimize(&pool, &rules).is_none());
    }

    #[test]
    fn identical_inputs_give_identical_squads() {
        let (pool, _) = scenario_pool();
        let rules = SquadRules::new(Money(700), Formation::catalog());
        let a = optimize(&pool, &rules).expect("feasible");
        let b = optimize(&pool, &rules).expect("feasible");
        assert_eq!(a.squad, b.squad);
        assert_eq!(a.formation, b.formation);
        assert_eq!(a.starting, b.starting);
    }

    #[test]
    fn bench_budget_forces_a_cheap_bench() {
        let mut pool = PlayerPool::new();
        let mut club = 0;
        let mut push = |pool: &mut PlayerPool, pos, price, score| {
            club += 1;
            pool.insert(
                &format!("P{club}"),
                &format!("C{club}"),
                pos,
                Money(price),
                score,
            )
        };
        // Clear starters, then per position one good-but-dear bench option
        // and one cheap one.
        push(&mut pool, Position::Goalkeeper, 50, 10.0);
        for _ in 0..4 {
            push(&mut pool, Position::Defender, 50, 10.0);
        }
        for _ in 0..4 {
            push(&mut pool, Position::Midfielder, 50, 10.0);
        }
        for _ in 0..2 {
            push(&mut pool, Position::Forward, 50, 10.0);
        }
        let dear: Vec<PlayerId> = [
            Position::Goalkeeper,
            Position::Defender,
            Position::Midfielder,
            Position::Forward,
        ]
        .iter()
        .map(|&pos| push(&mut pool, pos, 50, 3.0))
        .collect();
        let cheap: Vec<PlayerId> = [
            Position::Goalkeeper,
            Position::Defender,
            Position::Midfielder,
            Position::Forward,
        ]
        .iter()
        .map(|&pos| push(&mut pool, pos, 40, 1.0))
        .collect();

        let mut rules = SquadRules::new(Money(2000), vec![formation("4-4-2")]);
        let unconstrained = optimize(&pool, &rules).expect("feasible");
        for &id in &dear {
            assert!(unconstrained.squad.contains(&id));
        }

        // 4 x 4.0 fits, any dear pick pushes one slot to 5.0.
        rules.bench_budget = Some(Money(160));
        let capped = optimize(&pool, &rules).expect("feasible");
        assert!(capped.bench_cost <= Money(160));
        for &id in &cheap {
            assert!(capped.squad.contains(&id));
        }
        // The XI is unaffected.
        assert!((capped.starting_score - unconstrained.starting_score).abs() < 1e-9);
    }
}
