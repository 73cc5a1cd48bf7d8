// Configuration loading and parsing (config/rules.toml).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::mentions::AvailabilityWeights;
use crate::optimizer::formation::Formation;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// rules.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire rules.toml file.
#[derive(Debug, Clone, Deserialize)]
struct RulesFile {
    league: LeagueSection,
    #[serde(default)]
    transfers: TransfersSection,
    #[serde(default)]
    selection: SelectionRules,
    data: DataPaths,
    #[serde(default)]
    api: Option<ApiSettings>,
    #[serde(default)]
    mentions: Option<MentionsSection>,
}

#[derive(Debug, Clone, Deserialize)]
struct LeagueSection {
    /// Total budget in currency units. Optional when the remote source
    /// supplies squad value + bank instead.
    budget: Option<f64>,
    /// Formations in "D-M-F" notation; empty means the default catalog.
    #[serde(default)]
    formations: Vec<String>,
    #[serde(default = "default_club_cap")]
    club_cap: usize,
    #[serde(default)]
    squad_caps: Option<SquadCapsSection>,
    /// Optional cap on combined bench price, in currency units.
    #[serde(default)]
    bench_budget: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SquadCapsSection {
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct TransfersSection {
    #[serde(default = "default_max_transfers")]
    max_transfers: usize,
}

impl Default for TransfersSection {
    fn default() -> Self {
        TransfersSection {
            max_transfers: default_max_transfers(),
        }
    }
}

/// Fixed inclusion/exclusion assignments, all by display name or club name.
/// Resolved against the loaded pool at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionRules {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub include_start: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include_teams: Vec<String>,
    #[serde(default)]
    pub exclude_teams: Vec<String>,
    #[serde(default)]
    pub keep: Vec<String>,
    #[serde(default)]
    pub block_add: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    /// Predictions CSV: Name, Price, Position, Team, Points.
    pub pool: String,
    /// Existing 15-man squad CSV (optional; the remote source can supply
    /// the squad instead).
    #[serde(default)]
    pub squad: Option<String>,
    /// Optional second score basis used only to arrange the XI.
    #[serde(default)]
    pub arrange: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// League entry (manager) id for the remote squad lookup.
    pub entry: u64,
    /// Bank override in currency units; takes precedence over the remote
    /// value.
    #[serde(default)]
    pub bank: Option<f64>,
}

/// Community mention counting: a comments text file plus the alias and
/// availability tables it is scored with.
#[derive(Debug, Clone, Deserialize)]
pub struct MentionsSection {
    pub comments: String,
    #[serde(default)]
    pub variants: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub availability: AvailabilityWeights,
}

fn default_club_cap() -> usize {
    3
}

fn default_max_transfers() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub budget: Option<f64>,
    pub formations: Vec<Formation>,
    pub club_cap: usize,
    pub squad_caps: [usize; 4],
    pub bench_budget: Option<f64>,
    pub max_transfers: usize,
    pub selection: SelectionRules,
    pub data: DataPaths,
    pub api: Option<ApiSettings>,
    pub mentions: Option<MentionsSection>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/rules.toml` relative to `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("rules.toml");
    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::FileNotFound { path: path.clone() })?;
    parse_config(&text, &path)
}

/// Load config from the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("config/rules.toml"),
    })?;
    load_config_from(&cwd)
}

fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: RulesFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let formations = if file.league.formations.is_empty() {
        Formation::catalog()
    } else {
        let mut parsed = Vec::with_capacity(file.league.formations.len());
        for spec in &file.league.formations {
            let formation =
                Formation::parse(spec).ok_or_else(|| ConfigError::ValidationError {
                    field: "league.formations".to_string(),
                    message: format!("invalid formation '{spec}'"),
                })?;
            parsed.push(formation);
        }
        parsed
    };

    let squad_caps = match file.league.squad_caps {
        Some(caps) => [
            caps.goalkeepers,
            caps.defenders,
            caps.midfielders,
            caps.forwards,
        ],
        None => [2, 5, 5, 3],
    };

    let config = Config {
        budget: file.league.budget,
        formations,
        club_cap: file.league.club_cap,
        squad_caps,
        bench_budget: file.league.bench_budget,
        max_transfers: file.transfers.max_transfers,
        selection: file.selection,
        data: file.data,
        api: file.api,
        mentions: file.mentions,
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if let Some(budget) = config.budget {
        if budget < 0.0 {
            return Err(ConfigError::ValidationError {
                field: "league.budget".to_string(),
                message: "must be non-negative".to_string(),
            });
        }
    }
    if config.club_cap == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.club_cap".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    let squad_size: usize = config.squad_caps.iter().sum();
    if squad_size < 11 {
        return Err(ConfigError::ValidationError {
            field: "league.squad_caps".to_string(),
            message: format!("squad size {squad_size} cannot field eleven starters"),
        });
    }
    if config.max_transfers > squad_size {
        return Err(ConfigError::ValidationError {
            field: "transfers.max_transfers".to_string(),
            message: format!("cannot exceed the squad size {squad_size}"),
        });
    }
    if config.budget.is_none() && config.api.is_none() && config.data.squad.is_none() {
        return Err(ConfigError::ValidationError {
            field: "league.budget".to_string(),
            message: "set a budget, a squad file, or an api entry to derive one".to_string(),
        });
    }
    Ok(())
}
