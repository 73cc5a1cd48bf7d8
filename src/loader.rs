// Player-pool CSV loading and normalization.
//
// The pool schema is Name, Price, Position, Team, Points in any column
// order. Missing columns and unknown position values are hard input errors
// surfaced before any optimization; rows with non-numeric Price or Points
// are best-effort cleanup and are dropped with a warning.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::pool::{Money, PlayerId, PlayerPool, Position};

/// Projected score assigned to must-keep roster entries that have no row in
/// the pool CSV. Low enough that the optimizer never starts them by choice
/// while keeping the model feasible.
pub const UNSCORED_FALLBACK: f64 = -9999.0;

const REQUIRED_COLUMNS: [&str; 5] = ["Name", "Price", "Position", "Team", "Points"];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("CSV missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("CSV has invalid Position values: {}", .values.join(", "))]
    InvalidPositions { values: Vec<String> },
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private)
// ---------------------------------------------------------------------------

/// One pool row as it appears on disk. Price and Points stay strings so a
/// non-numeric value drops the row instead of failing the file; extra
/// columns are ignored.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawRow {
    Name: String,
    Price: String,
    Position: String,
    Team: String,
    Points: String,
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn check_columns(headers: &csv::StringRecord) -> Result<(), LoadError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|&&col| !headers.iter().any(|h| h == col))
        .map(|&col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LoadError::MissingColumns { columns: missing })
    }
}

/// Parse rows into (name, club, position string, price, points), dropping
/// malformed rows. Position strings are collected verbatim and validated by
/// the caller so the error can list the whole offending set.
fn read_rows<R: Read>(rdr: R, path: &str) -> Result<Vec<RawRow>, LoadError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader
        .headers()
        .map_err(|e| LoadError::Csv {
            path: path.to_string(),
            source: e,
        })?
        .clone();
    check_columns(&headers)?;

    let mut rows = Vec::new();
    for result in reader.deserialize::<RawRow>() {
        match result {
            Ok(raw) => rows.push(raw),
            Err(e) => warn!("skipping malformed row: {}", e),
        }
    }
    Ok(rows)
}

fn load_pool_from_reader<R: Read>(rdr: R, path: &str) -> Result<PlayerPool, LoadError> {
    let rows = read_rows(rdr, path)?;

    // Drop rows whose numerics do not parse; this is loader cleanup, not an
    // input error.
    let mut parsed: Vec<(RawRow, f64, f64)> = Vec::new();
    for raw in rows {
        let price: Option<f64> = raw.Price.trim().parse().ok();
        let points: Option<f64> = raw.Points.trim().parse().ok();
        match (price, points) {
            (Some(price), Some(points)) if price.is_finite() && points.is_finite() => {
                if price < 0.0 {
                    warn!("skipping row for '{}': negative price", raw.Name.trim());
                    continue;
                }
                parsed.push((raw, price, points));
            }
            _ => {
                warn!(
                    "skipping row for '{}': non-numeric Price/Points",
                    raw.Name.trim()
                );
            }
        }
    }

    // Position values are validated as a set so the error names every
    // offender at once.
    let mut invalid: BTreeSet<String> = BTreeSet::new();
    let mut entries: Vec<(RawRow, Position, f64, f64)> = Vec::new();
    for (raw, price, points) in parsed {
        match Position::from_input(raw.Position.trim()) {
            Some(position) => entries.push((raw, position, price, points)),
            None => {
                invalid.insert(raw.Position.trim().to_string());
            }
        }
    }
    if !invalid.is_empty() {
        return Err(LoadError::InvalidPositions {
            values: invalid.into_iter().collect(),
        });
    }

    let mut pool = PlayerPool::new();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    for (raw, position, price, points) in entries {
        let name = raw.Name.trim();
        let club = raw.Team.trim();
        if !seen.insert((name.to_string(), club.to_string())) {
            warn!("duplicate Name+Team row for '{}' ({})", name, club);
        }
        pool.insert(name, club, position, Money::from_units(price), points);
    }
    Ok(pool)
}

fn load_squad_from_reader<R: Read>(
    rdr: R,
    path: &str,
    pool: &mut PlayerPool,
) -> Result<Vec<PlayerId>, LoadError> {
    let squad_pool = load_pool_from_reader(rdr, path)?;
    let mut ids = Vec::new();
    for (_, player) in squad_pool.iter() {
        let club = squad_pool.club_name(player.club);
        ids.push(pool.insert(
            &player.name,
            club,
            player.position,
            player.price,
            player.score,
        ));
    }
    if ids.len() != 15 {
        warn!("expected 15 squad rows, got {}", ids.len());
    }
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Public file-based API
// ---------------------------------------------------------------------------

/// Load the candidate pool from a CSV file.
pub fn load_pool(path: &Path) -> Result<PlayerPool, LoadError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|e| LoadError::Io {
        path: display.clone(),
        source: e,
    })?;
    load_pool_from_reader(file, &display)
}

/// Load an existing squad (same schema, 15 rows expected) and intern its
/// players into `pool`, returning their handles. A row-count mismatch is a
/// warning, not a failure.
pub fn load_existing_squad(path: &Path, pool: &mut PlayerPool) -> Result<Vec<PlayerId>, LoadError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|e| LoadError::Io {
        path: display.clone(),
        source: e,
    })?;
    load_squad_from_reader(file, &display, pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_CSV: &str = "\
Name,Price,Position,Team,Points
Saka,9.0,Midfielder,Arsenal,6.1
Haaland,15.0,Forward,Man City,8.2
Raya,5.5,Goalkeeper,Arsenal,4.0
";

    #[test]
    fn loads_valid_rows() {
        let pool = load_pool_from_reader(GOOD_CSV.as_bytes(), "test.csv").unwrap();
        assert_eq!(pool.len(), 3);
        let saka = pool.find("Saka", "Arsenal", Money(90)).unwrap();
        let player = pool.player(saka);
        assert_eq!(player.position, Position::Midfielder);
        assert!((player.score - 6.1).abs() < 1e-9);
    }

    #[test]
    fn missing_columns_fail_fast_listing_names() {
        let csv = "Name,Price,Team\nSaka,9.0,Arsenal\n";
        let err = load_pool_from_reader(csv.as_bytes(), "test.csv").unwrap_err();
        match err {
            LoadError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["Position".to_string(), "Points".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_positions_are_rejected_with_the_offending_set() {
        let csv = "\
Name,Price,Position,Team,Points
Saka,9.0,MID,Arsenal,6.1
Haaland,15.0,FWD,Man City,8.2
Raya,5.5,Goalkeeper,Arsenal,4.0
";
        let err = load_pool_from_reader(csv.as_bytes(), "test.csv").unwrap_err();
        match err {
            LoadError::InvalidPositions { values } => {
                assert_eq!(values, vec!["FWD".to_string(), "MID".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn position_matching_is_case_sensitive() {
        let csv = "\
Name,Price,Position,Team,Points
Saka,9.0,midfielder,Arsenal,6.1
";
        let err = load_pool_from_reader(csv.as_bytes(), "test.csv").unwrap_err();
        assert!(matches!(err, LoadError::InvalidPositions { .. }));
    }

    #[test]
    fn non_numeric_rows_are_dropped_silently() {
        let csv = "\
Name,Price,Position,Team,Points
Saka,9.0,Midfielder,Arsenal,6.1
Ghost,n/a,Midfielder,Arsenal,6.1
Spook,9.0,Midfielder,Arsenal,unknown
";
        let pool = load_pool_from_reader(csv.as_bytes(), "test.csv").unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn name_collisions_across_clubs_both_load() {
        let csv = "\
Name,Price,Position,Team,Points
Ward,4.0,Goalkeeper,Leicester,2.0
Ward,4.3,Defender,Crystal Palace,3.1
";
        let pool = load_pool_from_reader(csv.as_bytes(), "test.csv").unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn existing_squad_interns_into_the_pool() {
        let mut pool = load_pool_from_reader(GOOD_CSV.as_bytes(), "pool.csv").unwrap();
        let squad_csv = "\
Name,Price,Position,Team,Points
Saka,9.0,Midfielder,Arsenal,6.1
Trippier,5.5,Defender,Newcastle,4.2
";
        let ids = load_squad_from_reader(squad_csv.as_bytes(), "squad.csv", &mut pool).unwrap();
        // Saka resolves to the pool's existing handle; Trippier is new.
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], pool.find("Saka", "Arsenal", Money(90)).unwrap());
        assert_eq!(pool.len(), 4);
    }
}
