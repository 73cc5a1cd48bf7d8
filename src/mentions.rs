// Community mention counting.
//
// Turns a block of free-text comments (e.g. a rate-my-team thread dump)
// into per-player mention scores: tokenize, count hits against each
// player's known alias spellings, then weight by availability. The tables
// are explicit configuration passed by the caller, never ambient state.
// The resulting name -> score map can serve as an alternative score basis
// for arranging or rebuilding a squad.

use std::collections::HashMap;

use serde::Deserialize;

use crate::pool::{PlayerId, PlayerPool};

// ---------------------------------------------------------------------------
// Configuration tables
// ---------------------------------------------------------------------------

/// Canonical player name -> alias spellings seen in comments. Aliases are
/// matched against lowercased tokens, so store them lowercased.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantTable {
    pub variants: HashMap<String, Vec<String>>,
}

impl VariantTable {
    pub fn new() -> Self {
        VariantTable::default()
    }

    pub fn insert(&mut self, canonical: &str, aliases: &[&str]) {
        self.variants.insert(
            canonical.to_string(),
            aliases.iter().map(|a| a.to_lowercase()).collect(),
        );
    }

    /// Make sure every named player has an entry, adding empty alias lists
    /// for newcomers so the table can be reviewed and filled in later.
    pub fn ensure_players<'a>(&mut self, names: impl Iterator<Item = &'a str>) {
        for name in names {
            self.variants.entry(name.to_string()).or_default();
        }
    }
}

/// Availability weighting: unavailable players score zero, doubtful ones
/// are scaled by their chance of featuring.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityWeights {
    #[serde(default)]
    pub unavailable: Vec<String>,
    #[serde(default)]
    pub doubt_25: Vec<String>,
    #[serde(default)]
    pub doubt_50: Vec<String>,
    #[serde(default)]
    pub doubt_75: Vec<String>,
}

impl AvailabilityWeights {
    pub fn multiplier(&self, name: &str) -> f64 {
        if self.unavailable.iter().any(|n| n == name) {
            0.0
        } else if self.doubt_25.iter().any(|n| n == name) {
            0.25
        } else if self.doubt_50.iter().any(|n| n == name) {
            0.5
        } else if self.doubt_75.iter().any(|n| n == name) {
            0.75
        } else {
            1.0
        }
    }
}

// ---------------------------------------------------------------------------
// Counting
// ---------------------------------------------------------------------------

/// Split text on every non-alphanumeric character and lowercase the pieces.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Count weighted mentions for every player in the variant table.
pub fn count_mentions(
    comments: &str,
    variants: &VariantTable,
    weights: &AvailabilityWeights,
) -> HashMap<String, f64> {
    let mut word_counts: HashMap<String, usize> = HashMap::new();
    for token in tokenize(comments) {
        *word_counts.entry(token).or_insert(0) += 1;
    }

    let mut scores = HashMap::new();
    for (canonical, aliases) in &variants.variants {
        let hits: usize = aliases
            .iter()
            .map(|alias| {
                word_counts
                    .get(&alias.to_lowercase())
                    .copied()
                    .unwrap_or(0)
            })
            .sum();
        let score = hits as f64 * weights.multiplier(canonical);
        scores.insert(canonical.clone(), score);
    }
    scores
}

/// Map mention scores onto pool handles by display name, for use as an
/// arrangement score override. Players sharing a display name all receive
/// the same mention score.
pub fn score_overrides(
    pool: &PlayerPool,
    mentions: &HashMap<String, f64>,
) -> HashMap<PlayerId, f64> {
    let mut overrides = HashMap::new();
    for (id, player) in pool.iter() {
        if let Some(&score) = mentions.get(&player.name) {
            overrides.insert(id, score);
        }
    }
    overrides
}
