// Transfer search: the best position-balanced swap of squad members for
// pool members, evaluated independently for each transfer count k.
//
// Canonical path: the swap itself is optimized directly. Out and In are
// binary decisions constrained to equal per-position counts, the net spend
// must fit the spare funds, and the resulting squad must respect the club
// cap. The position-balance and money constraints decompose over players,
// so the model is solved exactly by a two-phase dynamic program (outs, then
// ins) over a mixed-radix "how many swaps per position" code and an
// integer-tenths money axis. The club cap does not decompose and is
// restored by the same branch-and-bound pattern as squad construction:
// branch by forbidding an added member of an over-cap club or by forcing
// out a kept one.
//
// The enumerative design (every out-subset against every position-filtered
// in-subset) survives as `find_transfers_exhaustive` for validating the
// canonical path on small fixtures; its cost is combinatorial, so keep k
// small there.

use itertools::Itertools;
use tracing::{debug, warn};

use crate::optimizer::lexico::stage_cmp;
use crate::pool::{ClubId, Money, PlayerId, PlayerPool};

/// Branch-and-bound node budget per transfer count; exceeding it means
/// optimality cannot be confirmed, so that k is reported infeasible.
const NODE_LIMIT: usize = 100_000;

// ---------------------------------------------------------------------------
// Rules and result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransferRules {
    /// Highest swap count to evaluate (each k from 0 up is solved).
    pub max_transfers: usize,
    /// Money available on top of what the outgoing players free up.
    pub spare_funds: Money,
    /// Maximum players from any one club after the swap.
    pub club_cap: usize,
    /// Squad members that must not be transferred out.
    pub keep: Vec<PlayerId>,
    /// Pool players that must not be transferred in.
    pub block_add: Vec<PlayerId>,
}

impl TransferRules {
    pub fn new(max_transfers: usize, spare_funds: Money, club_cap: usize) -> Self {
        TransferRules {
            max_transfers,
            spare_funds,
            club_cap,
            keep: Vec::new(),
            block_add: Vec::new(),
        }
    }
}

/// The best swap found for one transfer count.
///
/// Sign convention, fixed and tested: `spend = in cost − out cost`; the
/// swap is affordable iff `spend <= spare_funds`, and `budget_left =
/// spare_funds − spend` is never negative on a returned plan.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub transfers: usize,
    pub out: Vec<PlayerId>,
    pub incoming: Vec<PlayerId>,
    pub points_out: f64,
    pub points_in: f64,
    pub score_delta: f64,
    pub spend: Money,
    pub budget_left: Money,
    /// Per-club counts of the resulting squad, name-sorted.
    pub club_counts: Vec<(String, usize)>,
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Swappable {
    id: PlayerId,
    club: ClubId,
    pos: usize,
    price: i64,
    score: f64,
}

fn swappable(pool: &PlayerPool, id: PlayerId) -> Swappable {
    let p = pool.player(id);
    Swappable {
        id,
        club: p.club,
        pos: p.position.index(),
        price: p.price.tenths(),
        score: p.score,
    }
}

/// Replacement candidates: deduplicated, not already in the squad (by
/// handle or by name+club identity), and not blocked.
fn eligible_candidates(
    pool: &PlayerPool,
    current: &[PlayerId],
    candidates: &[PlayerId],
    rules: &TransferRules,
) -> Vec<Swappable> {
    let mut seen = vec![false; pool.len()];
    let mut out = Vec::new();
    for &id in candidates {
        if seen[id.index()] || current.contains(&id) || rules.block_add.contains(&id) {
            continue;
        }
        seen[id.index()] = true;
        let player = pool.player(id);
        let duplicate_of_owned = current.iter().any(|&c| {
            let owned = pool.player(c);
            owned.club == player.club && owned.name == player.name
        });
        if duplicate_of_owned {
            continue;
        }
        out.push(swappable(pool, id));
    }
    // Position-major, then score-descending: fixes the deterministic
    // tie-break order of the search.
    out.sort_by(|a, b| {
        a.pos
            .cmp(&b.pos)
            .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.id.cmp(&b.id))
    });
    out
}

fn plan_from_sets(
    pool: &PlayerPool,
    current: &[PlayerId],
    out: Vec<PlayerId>,
    incoming: Vec<PlayerId>,
    rules: &TransferRules,
) -> TransferPlan {
    let points_out = pool.total_score(&out);
    let points_in = pool.total_score(&incoming);
    let spend = pool.total_price(&incoming) - pool.total_price(&out);

    let resulting: Vec<PlayerId> = current
        .iter()
        .copied()
        .filter(|id| !out.contains(id))
        .chain(incoming.iter().copied())
        .collect();
    let counts = pool.club_counts(&resulting);
    let mut club_counts: Vec<(String, usize)> = counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(club, &count)| (pool.club_name(ClubId(club as u32)).to_string(), count))
        .collect();
    club_counts.sort();

    TransferPlan {
        transfers: out.len(),
        points_out,
        points_in,
        score_delta: points_in - points_out,
        spend,
        budget_left: rules.spare_funds - spend,
        club_counts,
        out,
        incoming,
    }
}

// ---------------------------------------------------------------------------
// Mixed-radix swap-count codes
// ---------------------------------------------------------------------------

/// Encodes "how many swaps are open per position" as one integer. Radix per
/// position is the most that position could ever swap, so the code space
/// stays tiny (at most (k+1)^4, further clamped by squad composition).
struct CodeSpace {
    steps: [usize; 4],
    radii: [usize; 4],
    len: usize,
    sums: Vec<usize>,
}

impl CodeSpace {
    fn new(k: usize, squad_per_pos: &[usize; 4]) -> Self {
        let mut radii = [0usize; 4];
        for p in 0..4 {
            radii[p] = k.min(squad_per_pos[p]) + 1;
        }
        let steps = [
            1,
            radii[0],
            radii[0] * radii[1],
            radii[0] * radii[1] * radii[2],
        ];
        let len = steps[3] * radii[3];
        let mut sums = vec![0usize; len];
        for code in 0..len {
            let mut sum = 0;
            for p in 0..4 {
                sum += (code / steps[p]) % radii[p];
            }
            sums[code] = sum;
        }
        CodeSpace { steps, radii, len, sums }
    }

    fn digit(&self, code: usize, pos: usize) -> usize {
        (code / self.steps[pos]) % self.radii[pos]
    }
}

// ---------------------------------------------------------------------------
// Exact solve for one k (club cap relaxed)
// ---------------------------------------------------------------------------

struct SwapSolution {
    out: Vec<PlayerId>,
    incoming: Vec<PlayerId>,
    delta: f64,
}

const DEAD: f64 = f64::NEG_INFINITY;

fn alive(v: f64) -> bool {
    v > DEAD / 2.0
}

/// Solve the k-swap model exactly, ignoring the club cap but honoring the
/// keep list and the branch constraints (`forbidden_in`, `forced_out`).
#[allow(clippy::too_many_arguments)]
fn solve_swap_relaxed(
    members: &[Swappable],
    candidates: &[Swappable],
    k: usize,
    spare: i64,
    keep: &[bool],
    forbidden_in: &[bool],
    forced_out: &[bool],
) -> Option<SwapSolution> {
    let mut squad_per_pos = [0usize; 4];
    for m in members {
        squad_per_pos[m.pos] += 1;
    }
    let codes = CodeSpace::new(k, &squad_per_pos);

    // Money axis for the out phase: the k priciest members bound what the
    // outgoing side can free up.
    let mut prices: Vec<i64> = members.iter().map(|m| m.price).collect();
    prices.sort_unstable_by(|a, b| b.cmp(a));
    let out_axis: i64 = prices.iter().take(k).sum();

    // ---- Phase 1: choose the outgoing set ----

    let p1_states = codes.len * (out_axis + 1) as usize;
    let mut grid = vec![DEAD; p1_states];
    grid[0] = 0.0;
    let mut p1_bits = vec![vec![0u8; p1_states.div_ceil(8)]; members.len()];

    for (j, member) in members.iter().enumerate() {
        let is_forced = forced_out[member.id.index()];
        let is_kept = keep[member.id.index()];
        if is_forced && is_kept {
            return None;
        }
        let mut next = if is_forced {
            vec![DEAD; p1_states]
        } else {
            grid.clone()
        };
        if !is_kept {
            for code in 0..codes.len {
                if codes.sums[code] >= k || codes.digit(code, member.pos) + 1 >= codes.radii[member.pos]
                {
                    continue;
                }
                let ncode = code + codes.steps[member.pos];
                for om in 0..=out_axis {
                    let v = grid[code * (out_axis + 1) as usize + om as usize];
                    if !alive(v) || om + member.price > out_axis {
                        continue;
                    }
                    let tgt = ncode * (out_axis + 1) as usize + (om + member.price) as usize;
                    let nv = v - member.score;
                    if stage_cmp(nv, next[tgt]) == std::cmp::Ordering::Greater {
                        next[tgt] = nv;
                        set_bit(&mut p1_bits[j], tgt);
                    }
                }
            }
        }
        grid = next;
    }

    // ---- Seam: exactly k outs, remaining = out money + spare funds ----

    let rem_axis: i64 = (out_axis + spare).max(0);
    let p2_states = codes.len * (rem_axis + 1) as usize;
    let mut grid2 = vec![DEAD; p2_states];
    let mut any_seed = false;
    for code in 0..codes.len {
        if codes.sums[code] != k {
            continue;
        }
        for om in 0..=out_axis {
            let v = grid[code * (out_axis + 1) as usize + om as usize];
            let rem = om + spare;
            if !alive(v) || rem < 0 {
                continue;
            }
            grid2[code * (rem_axis + 1) as usize + rem as usize] = v;
            any_seed = true;
        }
    }
    if !any_seed {
        return None;
    }

    // ---- Phase 2: choose the incoming set ----

    let mut p2_bits = vec![vec![0u8; p2_states.div_ceil(8)]; candidates.len()];
    for (j, cand) in candidates.iter().enumerate() {
        if forbidden_in[cand.id.index()] {
            continue;
        }
        let mut next = grid2.clone();
        for code in 0..codes.len {
            if codes.digit(code, cand.pos) == 0 {
                continue;
            }
            let ncode = code - codes.steps[cand.pos];
            for rem in 0..=rem_axis {
                let v = grid2[code * (rem_axis + 1) as usize + rem as usize];
                if !alive(v) || rem < cand.price {
                    continue;
                }
                let tgt = ncode * (rem_axis + 1) as usize + (rem - cand.price) as usize;
                let nv = v + cand.score;
                if stage_cmp(nv, next[tgt]) == std::cmp::Ordering::Greater {
                    next[tgt] = nv;
                    set_bit(&mut p2_bits[j], tgt);
                }
            }
        }
        grid2 = next;
    }

    // Best complete state; among ties the highest remaining budget (i.e.
    // the cheapest swap) is found first and wins.
    let mut best: Option<(f64, i64)> = None;
    for rem in (0..=rem_axis).rev() {
        let v = grid2[rem as usize];
        if !alive(v) {
            continue;
        }
        let improves = match best {
            None => true,
            Some((bv, _)) => stage_cmp(v, bv) == std::cmp::Ordering::Greater,
        };
        if improves {
            best = Some((v, rem));
        }
    }
    let (delta, mut rem) = best?;

    // ---- Reconstruction: phase 2 backwards, then phase 1 backwards ----

    let mut incoming = Vec::with_capacity(k);
    let mut code = 0usize;
    for (j, cand) in candidates.iter().enumerate().rev() {
        let state = code * (rem_axis + 1) as usize + rem as usize;
        if get_bit(&p2_bits[j], state) {
            incoming.push(cand.id);
            code += codes.steps[cand.pos];
            rem += cand.price;
        }
    }

    let mut out = Vec::with_capacity(k);
    let mut om = rem - spare;
    for (j, member) in members.iter().enumerate().rev() {
        let state = code * (out_axis + 1) as usize + om as usize;
        if get_bit(&p1_bits[j], state) {
            out.push(member.id);
            code -= codes.steps[member.pos];
            om -= member.price;
        }
    }

    out.sort();
    incoming.sort();
    Some(SwapSolution { out, incoming, delta })
}

fn set_bit(bits: &mut [u8], idx: usize) {
    bits[idx / 8] |= 1u8 << (idx % 8);
}

fn get_bit(bits: &[u8], idx: usize) -> bool {
    bits[idx / 8] & (1u8 << (idx % 8)) != 0
}

// ---------------------------------------------------------------------------
// Club-cap branch and bound per k
// ---------------------------------------------------------------------------

fn solve_k(
    pool: &PlayerPool,
    current: &[PlayerId],
    members: &[Swappable],
    candidates: &[Swappable],
    k: usize,
    rules: &TransferRules,
) -> Option<SwapSolution> {
    let mut keep = vec![false; pool.len()];
    for &id in &rules.keep {
        keep[id.index()] = true;
    }

    let mut incumbent: Option<SwapSolution> = None;
    let mut stack: Vec<(Vec<bool>, Vec<bool>)> =
        vec![(vec![false; pool.len()], vec![false; pool.len()])];
    let mut nodes = 0usize;

    while let Some((forbidden_in, forced_out)) = stack.pop() {
        nodes += 1;
        if nodes > NODE_LIMIT {
            warn!(k, "club-cap search exceeded {NODE_LIMIT} nodes; reporting k as infeasible");
            return None;
        }

        let Some(solution) = solve_swap_relaxed(
            members,
            candidates,
            k,
            rules.spare_funds.tenths(),
            &keep,
            &forbidden_in,
            &forced_out,
        ) else {
            continue;
        };

        if let Some(inc) = &incumbent {
            if stage_cmp(solution.delta, inc.delta) != std::cmp::Ordering::Greater {
                continue;
            }
        }

        let resulting: Vec<PlayerId> = current
            .iter()
            .copied()
            .filter(|id| !solution.out.contains(id))
            .chain(solution.incoming.iter().copied())
            .collect();
        let counts = pool.club_counts(&resulting);
        let violated = counts
            .iter()
            .enumerate()
            .find(|(_, &count)| count > rules.club_cap)
            .map(|(club, _)| ClubId(club as u32));

        match violated {
            None => incumbent = Some(solution),
            Some(club) => {
                // Any feasible swap either leaves out one of the additions
                // from this club, or removes one more of its kept members.
                let mut children: Vec<(Vec<bool>, Vec<bool>)> = Vec::new();
                for &added in solution
                    .incoming
                    .iter()
                    .filter(|&&id| pool.player(id).club == club)
                {
                    let mut f = forbidden_in.clone();
                    f[added.index()] = true;
                    children.push((f, forced_out.clone()));
                }
                for &kept in current.iter().filter(|&&id| {
                    pool.player(id).club == club
                        && !solution.out.contains(&id)
                        && !keep[id.index()]
                }) {
                    let mut f = forced_out.clone();
                    f[kept.index()] = true;
                    children.push((forbidden_in.clone(), f));
                }
                for child in children.into_iter().rev() {
                    stack.push(child);
                }
            }
        }
    }

    incumbent
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Best swap for every transfer count 0..=max_transfers. Index k of the
/// returned vector holds the best k-swap, or `None` when no rule-valid
/// k-swap exists. k = 0 is always the no-change plan.
pub fn find_transfers(
    pool: &PlayerPool,
    current: &[PlayerId],
    candidates: &[PlayerId],
    rules: &TransferRules,
) -> Vec<Option<TransferPlan>> {
    let members: Vec<Swappable> = {
        let mut m: Vec<Swappable> = current.iter().map(|&id| swappable(pool, id)).collect();
        m.sort_by(|a, b| {
            a.pos
                .cmp(&b.pos)
                .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.id.cmp(&b.id))
        });
        m
    };
    let eligible = eligible_candidates(pool, current, candidates, rules);

    let mut results = Vec::with_capacity(rules.max_transfers + 1);
    results.push(Some(plan_from_sets(
        pool,
        current,
        Vec::new(),
        Vec::new(),
        rules,
    )));

    for k in 1..=rules.max_transfers {
        let plan = solve_k(pool, current, &members, &eligible, k, rules)
            .map(|sol| plan_from_sets(pool, current, sol.out, sol.incoming, rules));
        match &plan {
            Some(p) => debug!(k, delta = p.score_delta, spend = %p.spend, "transfer solved"),
            None => debug!(k, "no rule-valid swap"),
        }
        results.push(plan);
    }
    results
}

/// Enumerative reference search: every size-k out-subset against every
/// size-k subset of the position-filtered candidates. Exponential in k;
/// meant for validating `find_transfers` on small fixtures.
pub fn find_transfers_exhaustive(
    pool: &PlayerPool,
    current: &[PlayerId],
    candidates: &[PlayerId],
    rules: &TransferRules,
) -> Vec<Option<TransferPlan>> {
    let eligible = eligible_candidates(pool, current, candidates, rules);
    let removable: Vec<PlayerId> = current
        .iter()
        .copied()
        .filter(|id| !rules.keep.contains(id))
        .collect();

    let mut results = Vec::with_capacity(rules.max_transfers + 1);
    results.push(Some(plan_from_sets(
        pool,
        current,
        Vec::new(),
        Vec::new(),
        rules,
    )));

    for k in 1..=rules.max_transfers {
        let mut best: Option<(f64, Vec<PlayerId>, Vec<PlayerId>)> = None;

        for out_combo in removable.iter().copied().combinations(k) {
            let mut out_positions = [0usize; 4];
            for &id in &out_combo {
                out_positions[pool.player(id).position.index()] += 1;
            }
            let out_price = pool.total_price(&out_combo);

            // Position pre-filter: only candidates whose position appears
            // in the outgoing set can balance it.
            let filtered: Vec<&Swappable> = eligible
                .iter()
                .filter(|c| out_positions[c.pos] > 0)
                .collect();

            for in_combo in filtered.iter().combinations(k) {
                let mut in_positions = [0usize; 4];
                for c in &in_combo {
                    in_positions[c.pos] += 1;
                }
                if in_positions != out_positions {
                    continue;
                }
                let in_price: i64 = in_combo.iter().map(|c| c.price).sum();
                if in_price - out_price.tenths() > rules.spare_funds.tenths() {
                    continue;
                }

                let in_ids: Vec<PlayerId> = in_combo.iter().map(|c| c.id).collect();
                let resulting: Vec<PlayerId> = current
                    .iter()
                    .copied()
                    .filter(|id| !out_combo.contains(id))
                    .chain(in_ids.iter().copied())
                    .collect();
                if pool
                    .club_counts(&resulting)
                    .iter()
                    .any(|&count| count > rules.club_cap)
                {
                    continue;
                }

                let delta = pool.total_score(&in_ids) - pool.total_score(&out_combo);
                let improves = match &best {
                    None => true,
                    Some((bd, _, _)) => stage_cmp(delta, *bd) == std::cmp::Ordering::Greater,
                };
                if improves {
                    best = Some((delta, out_combo.clone(), in_ids));
                }
            }
        }

        results.push(
            best.map(|(_, out, incoming)| plan_from_sets(pool, current, out, incoming, rules)),
        );
    }
    results
}
