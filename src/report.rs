// Text report rendering.
//
// The engine returns structured results; this module turns them into the
// plain-text report the planner writes to disk. Formatting only, no
// decisions.

use chrono::Utc;

use crate::optimizer::arrange::{arrange_best, Arrangement, ScoreBasis};
use crate::optimizer::formation::Formation;
use crate::optimizer::squad::BestSquad;
use crate::optimizer::transfer::TransferPlan;
use crate::pool::{Money, PlayerId, PlayerPool, Position};

const RULE: &str = "------------------------------------------------------------------------";

fn player_row(pool: &PlayerPool, id: PlayerId, basis: ScoreBasis) -> String {
    let player = pool.player(id);
    format!(
        "  {:<22} {:<15} {:<12} {:>5}  {:>6.2}",
        player.name,
        pool.club_name(player.club),
        player.position.display_str(),
        player.price.to_string(),
        basis.score(pool, id),
    )
}

fn push_arrangement(lines: &mut Vec<String>, pool: &PlayerPool, arr: &Arrangement, basis: ScoreBasis) {
    lines.push("STARTING XI:".to_string());
    for pos in Position::ALL {
        for &id in arr
            .starting
            .iter()
            .filter(|&&id| pool.player(id).position == pos)
        {
            lines.push(player_row(pool, id, basis));
        }
    }
    lines.push("BENCH:".to_string());
    for &id in &arr.bench {
        lines.push(player_row(pool, id, basis));
    }

    // Captain suggestion: the two best starters under the report basis.
    let mut ranked: Vec<PlayerId> = arr.starting.clone();
    ranked.sort_by(|&a, &b| {
        basis
            .score(pool, b)
            .partial_cmp(&basis.score(pool, a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(&captain) = ranked.first() {
        let vice = ranked
            .get(1)
            .map(|&id| pool.player(id).name.as_str())
            .unwrap_or("-");
        lines.push(format!(
            "Suggested (C): {} | (VC): {}",
            pool.player(captain).name,
            vice
        ));
    }
}

/// Render a freshly optimized squad.
pub fn squad_report(pool: &PlayerPool, best: &BestSquad, budget: Money) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Squad optimization (generated {})",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    lines.push(RULE.to_string());
    lines.push(format!("Formation: {}", best.formation));
    lines.push(format!(
        "Projected XI points: {:.2} | Bench points: {:.2}",
        best.starting_score, best.bench_score
    ));
    lines.push(format!(
        "Cost used: {}  (XI {} / Bench {})",
        best.total_cost, best.starting_cost, best.bench_cost
    ));
    lines.push(format!("Budget left: {}", budget - best.total_cost));
    lines.push(String::new());

    let arr = Arrangement {
        formation: best.formation,
        starting: best.starting.clone(),
        bench: best.bench.clone(),
        starting_score: best.starting_score,
    };
    push_arrangement(&mut lines, pool, &arr, ScoreBasis::Pool);
    lines.push(RULE.to_string());
    lines.join("\n")
}

/// Render the per-k transfer plans, re-arranging each resulting squad under
/// the report's score basis (which may differ from the one the transfers
/// were optimized with).
pub fn transfer_report(
    pool: &PlayerPool,
    current: &[PlayerId],
    results: &[Option<TransferPlan>],
    formations: &[Formation],
    spare_funds: Money,
    basis: ScoreBasis,
) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Transfer suggestions (generated {})",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));
    lines.push(format!(
        "Spare funds: {} | Current squad value: {}",
        spare_funds,
        pool.total_price(current)
    ));
    lines.push(RULE.to_string());

    for (k, result) in results.iter().enumerate() {
        let Some(plan) = result else {
            lines.push(format!("Transfers: {k}"));
            lines.push("NO FEASIBLE SOLUTION".to_string());
            lines.push(RULE.to_string());
            continue;
        };

        lines.push(format!("Transfers: {k}"));
        lines.push(format!("Points out: {:.2}", plan.points_out));
        lines.push(format!("Points in: {:.2}", plan.points_in));
        lines.push(format!("Points difference: {:.2}", plan.score_delta));
        if plan.points_out.abs() > f64::EPSILON {
            lines.push(format!(
                "Points diff %: {:.2}%",
                plan.score_delta / plan.points_out * 100.0
            ));
        }
        lines.push(format!("Net spend: {}", plan.spend));
        lines.push(format!("Budget left: {}", plan.budget_left));

        if !plan.out.is_empty() {
            lines.push("OUT:".to_string());
            for &id in &plan.out {
                lines.push(player_row(pool, id, ScoreBasis::Pool));
            }
            lines.push("IN:".to_string());
            for &id in &plan.incoming {
                lines.push(player_row(pool, id, ScoreBasis::Pool));
            }
        }

        let resulting: Vec<PlayerId> = current
            .iter()
            .copied()
            .filter(|id| !plan.out.contains(id))
            .chain(plan.incoming.iter().copied())
            .collect();
        if let Some(arr) = arrange_best(pool, &resulting, formations, basis) {
            lines.push(format!(
                "Best XI after transfers ({}): {:.2} pts",
                arr.formation, arr.starting_score
            ));
            push_arrangement(&mut lines, pool, &arr, basis);
        }
        lines.push(RULE.to_string());
    }
    lines.join("\n")
}
