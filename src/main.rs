// Squad planner entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Load the predictions pool (and the optional arrangement basis)
// 4. Resolve the current squad (remote API or CSV), if any
// 5. Transfer mode when a current squad exists, squad-build mode otherwise
// 6. Print the report and write it next to the inputs

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use squad_planner::config::{self, Config};
use squad_planner::fpl::{self, RosterSource};
use squad_planner::loader;
use squad_planner::mentions;
use squad_planner::optimizer::arrange::ScoreBasis;
use squad_planner::optimizer::squad::{optimize, CapacityRules, SquadRules};
use squad_planner::optimizer::transfer::{find_transfers, TransferRules};
use squad_planner::pool::{ClubId, Money, PlayerId, PlayerPool, PositionCounts};
use squad_planner::report;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("squad planner starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "config loaded: {} formations, club cap {}, max transfers {}",
        config.formations.len(),
        config.club_cap,
        config.max_transfers
    );

    let mut pool =
        loader::load_pool(Path::new(&config.data.pool)).context("failed to load player pool")?;
    info!("pool loaded: {} players, {} clubs", pool.len(), pool.club_count());

    let overrides = arrangement_overrides(&config, &pool)?;

    let current = resolve_current_squad(&config, &mut pool).await?;

    match current {
        Some((current_ids, spare_funds)) => {
            run_transfers(&config, &pool, &current_ids, spare_funds, overrides.as_ref())
        }
        None => run_squad_build(&config, &pool, overrides.as_ref()),
    }
}

/// Build the optional alternative score basis for arranging the XI: the
/// dedicated arrangement CSV if configured, otherwise community mention
/// counts.
fn arrangement_overrides(
    config: &Config,
    pool: &PlayerPool,
) -> anyhow::Result<Option<HashMap<PlayerId, f64>>> {
    if let Some(path) = &config.data.arrange {
        let alt = loader::load_pool(Path::new(path)).context("failed to load arrangement CSV")?;
        let mut map = HashMap::new();
        for (_, player) in alt.iter() {
            if let Some(id) = pool.find_by_name(&player.name, alt.club_name(player.club)) {
                map.insert(id, player.score);
            }
        }
        info!("arrangement basis loaded: {} players matched", map.len());
        return Ok(Some(map));
    }

    if let Some(section) = &config.mentions {
        let text = std::fs::read_to_string(&section.comments)
            .with_context(|| format!("failed to read comments file {}", section.comments))?;
        let mut variants = mentions::VariantTable {
            variants: section.variants.clone(),
        };
        let names: Vec<String> = pool.iter().map(|(_, p)| p.name.clone()).collect();
        variants.ensure_players(names.iter().map(String::as_str));
        let scores = mentions::count_mentions(&text, &variants, &section.availability);
        let map = mentions::score_overrides(pool, &scores);
        info!("mention counts computed for {} players", map.len());
        return Ok(Some(map));
    }

    Ok(None)
}

/// The current squad and spare funds, from the remote API or the squad CSV.
async fn resolve_current_squad(
    config: &Config,
    pool: &mut PlayerPool,
) -> anyhow::Result<Option<(Vec<PlayerId>, Money)>> {
    if let Some(api) = &config.api {
        let source = fpl::FplApi::new();
        let squad = source
            .current_squad(api.entry)
            .await
            .context("remote squad lookup failed")?;
        if squad.picks.len() != 15 {
            warn!("expected 15 current picks, got {}", squad.picks.len());
        }
        let ids = fpl::resolve_roster(pool, &squad);
        let bank = api.bank.map(Money::from_units).unwrap_or(squad.bank);
        info!("current squad from API entry {}, bank {}", api.entry, bank);
        return Ok(Some((ids, bank)));
    }

    if let Some(path) = &config.data.squad {
        let ids = loader::load_existing_squad(Path::new(path), pool)
            .context("failed to load existing squad")?;
        // In file mode the configured budget is the money left over on top
        // of the current squad's value.
        let spare = Money::from_units(config.budget.unwrap_or(0.0));
        info!("current squad from {}, spare funds {}", path, spare);
        return Ok(Some((ids, spare)));
    }

    Ok(None)
}

fn run_transfers(
    config: &Config,
    pool: &PlayerPool,
    current: &[PlayerId],
    spare_funds: Money,
    overrides: Option<&HashMap<PlayerId, f64>>,
) -> anyhow::Result<()> {
    let mut rules = TransferRules::new(config.max_transfers, spare_funds, config.club_cap);
    rules.keep = ids_for_names(pool, &config.selection.keep);
    rules.block_add = ids_for_names(pool, &config.selection.block_add);

    let candidates: Vec<PlayerId> = pool.ids().filter(|id| !current.contains(id)).collect();
    let results = find_transfers(pool, current, &candidates, &rules);

    let basis = match overrides {
        Some(map) => ScoreBasis::Override(map),
        None => ScoreBasis::Pool,
    };
    let text = report::transfer_report(
        pool,
        current,
        &results,
        &config.formations,
        spare_funds,
        basis,
    );
    println!("{text}");
    std::fs::write("transfer_suggestions.txt", &text)
        .context("failed to write transfer_suggestions.txt")?;
    info!("saved transfer_suggestions.txt");
    Ok(())
}

fn run_squad_build(
    config: &Config,
    pool: &PlayerPool,
    overrides: Option<&HashMap<PlayerId, f64>>,
) -> anyhow::Result<()> {
    let budget = Money::from_units(
        config
            .budget
            .context("league.budget is required to build a squad from scratch")?,
    );

    let mut rules = SquadRules::new(budget, config.formations.clone());
    rules.capacity = CapacityRules {
        squad_caps: PositionCounts(config.squad_caps),
        club_cap: config.club_cap,
    };
    rules.bench_budget = config.bench_budget.map(Money::from_units);
    rules.force_in = ids_for_names(pool, &config.selection.include);
    rules.force_start = ids_for_names(pool, &config.selection.include_start);
    rules.exclude = ids_for_names(pool, &config.selection.exclude);
    rules.exclude_clubs = club_ids_for_names(pool, &config.selection.exclude_teams);
    if !config.selection.include_teams.is_empty() {
        rules.allow_clubs = Some(club_ids_for_names(pool, &config.selection.include_teams));
    }

    let text = match optimize(pool, &rules) {
        Some(best) => {
            let mut text = report::squad_report(pool, &best, budget);
            if let Some(map) = overrides {
                // Re-evaluate the chosen 15 under the alternative basis.
                if let Some(arr) = squad_planner::optimizer::arrange::arrange_best(
                    pool,
                    &best.squad,
                    &config.formations,
                    ScoreBasis::Override(map),
                ) {
                    text.push_str(&format!(
                        "\nAlternative-basis XI ({}): {:.2} pts\n",
                        arr.formation, arr.starting_score
                    ));
                }
            }
            text
        }
        None => "NO FEASIBLE SOLUTION".to_string(),
    };

    println!("{text}");
    std::fs::write("optimized_squad.txt", &text).context("failed to write optimized_squad.txt")?;
    info!("saved optimized_squad.txt");
    Ok(())
}

/// All pool handles whose display name appears in `names`. Unknown names
/// are logged and skipped.
fn ids_for_names(pool: &PlayerPool, names: &[String]) -> Vec<PlayerId> {
    let mut ids = Vec::new();
    for name in names {
        let mut found = false;
        for (id, player) in pool.iter() {
            if &player.name == name {
                ids.push(id);
                found = true;
            }
        }
        if !found {
            warn!("selection name '{}' not found in the pool", name);
        }
    }
    ids
}

fn club_ids_for_names(pool: &PlayerPool, names: &[String]) -> Vec<ClubId> {
    let mut ids = Vec::new();
    for name in names {
        match pool.club_id(name) {
            Some(id) => ids.push(id),
            None => warn!("club '{}' not found in the pool", name),
        }
    }
    ids
}

/// Initialize tracing to stderr so reports on stdout stay clean.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("squad_planner=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
