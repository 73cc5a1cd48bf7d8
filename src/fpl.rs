// Remote current-squad lookup.
//
// The league API supplies the one thing the planner cannot learn from a
// predictions CSV: which 15 players an entry currently owns and how much
// money is left in the bank. The engine never talks to the network; it
// consumes a `CurrentSquad` produced by a `RosterSource`, and the HTTP
// implementation below is just one source.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::loader::UNSCORED_FALLBACK;
use crate::pool::{Money, PlayerId, PlayerPool, Position};

const API_BASE: &str = "https://fantasy.premierleague.com/api";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected payload: {0}")]
    Decode(String),

    #[error("bank balance not available for entry {entry}")]
    MissingBank { entry: u64 },
}

// ---------------------------------------------------------------------------
// Resolved roster data
// ---------------------------------------------------------------------------

/// One owned player, resolved from the remote id to displayable fields.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub name: String,
    pub club: String,
    pub position: Position,
    pub price: Money,
}

/// An entry's current roster plus spare funds in tenths.
#[derive(Debug, Clone)]
pub struct CurrentSquad {
    pub picks: Vec<RosterEntry>,
    pub bank: Money,
}

/// Anything that can produce the current squad for an entry.
#[async_trait]
pub trait RosterSource {
    async fn current_squad(&self, entry_id: u64) -> Result<CurrentSquad, SourceError>;
}

/// Match roster entries to pool handles by name and club. Owned players
/// missing from the pool are added with their remote price and a sentinel
/// score, so the transfer model stays feasible but never keeps them on
/// merit.
pub fn resolve_roster(pool: &mut PlayerPool, squad: &CurrentSquad) -> Vec<PlayerId> {
    let mut ids = Vec::with_capacity(squad.picks.len());
    for pick in &squad.picks {
        let id = match pool.find_by_name(&pick.name, &pick.club) {
            Some(id) => id,
            None => {
                warn!(
                    "'{}' ({}) not in the pool; added with sentinel score and remote price",
                    pick.name, pick.club
                );
                pool.insert(
                    &pick.name,
                    &pick.club,
                    pick.position,
                    pick.price,
                    UNSCORED_FALLBACK,
                )
            }
        };
        ids.push(id);
    }
    ids
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Bootstrap {
    elements: Vec<Element>,
    teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
struct Element {
    id: u64,
    web_name: String,
    team: u64,
    element_type: u8,
    now_cost: i64,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Entry {
    current_event: Option<u32>,
    bank: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Picks {
    picks: Vec<Pick>,
}

#[derive(Debug, Deserialize)]
struct Pick {
    element: u64,
}

fn position_from_element_type(element_type: u8) -> Option<Position> {
    match element_type {
        1 => Some(Position::Goalkeeper),
        2 => Some(Position::Defender),
        3 => Some(Position::Midfielder),
        4 => Some(Position::Forward),
        _ => None,
    }
}

/// `RosterSource` backed by the public league API.
pub struct FplApi {
    http: reqwest::Client,
}

impl FplApi {
    pub fn new() -> Self {
        FplApi {
            http: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

impl Default for FplApi {
    fn default() -> Self {
        FplApi::new()
    }
}

#[async_trait]
impl RosterSource for FplApi {
    async fn current_squad(&self, entry_id: u64) -> Result<CurrentSquad, SourceError> {
        let bootstrap: Bootstrap = self
            .get_json(&format!("{API_BASE}/bootstrap-static/"))
            .await?;
        let entry: Entry = self
            .get_json(&format!("{API_BASE}/entry/{entry_id}/"))
            .await?;

        let event = entry.current_event.ok_or_else(|| {
            SourceError::Decode(format!("no current gameweek for entry {entry_id}"))
        })?;
        let bank = entry
            .bank
            .map(Money::from_tenths)
            .ok_or(SourceError::MissingBank { entry: entry_id })?;

        let picks: Picks = self
            .get_json(&format!("{API_BASE}/entry/{entry_id}/event/{event}/picks/"))
            .await?;

        let teams: HashMap<u64, &str> = bootstrap
            .teams
            .iter()
            .map(|t| (t.id, t.name.as_str()))
            .collect();
        let elements: HashMap<u64, &Element> =
            bootstrap.elements.iter().map(|e| (e.id, e)).collect();

        let mut roster = Vec::with_capacity(picks.picks.len());
        for pick in &picks.picks {
            let element = elements.get(&pick.element).ok_or_else(|| {
                SourceError::Decode(format!("pick references unknown element {}", pick.element))
            })?;
            let position = position_from_element_type(element.element_type).ok_or_else(|| {
                SourceError::Decode(format!(
                    "element {} has unknown type {}",
                    element.id, element.element_type
                ))
            })?;
            let club = teams.get(&element.team).copied().ok_or_else(|| {
                SourceError::Decode(format!("element {} references unknown team", element.id))
            })?;
            roster.push(RosterEntry {
                name: element.web_name.clone(),
                club: club.to_string(),
                position,
                price: Money::from_tenths(element.now_cost),
            });
        }

        Ok(CurrentSquad {
            picks: roster,
            bank,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_types_map_to_positions() {
        assert_eq!(position_from_element_type(1), Some(Position::Goalkeeper));
        assert_eq!(position_from_element_type(4), Some(Position::Forward));
        assert_eq!(position_from_element_type(9), None);
    }

    #[test]
    fn bootstrap_payload_decodes() {
        let json = r#"{
            "elements": [
                {"id": 1, "web_name": "Raya", "team": 1, "element_type": 1, "now_cost": 55, "extra": true}
            ],
            "teams": [{"id": 1, "name": "Arsenal", "short_name": "ARS"}]
        }"#;
        let bootstrap: Bootstrap = serde_json::from_str(json).unwrap();
        assert_eq!(bootstrap.elements[0].web_name, "Raya");
        assert_eq!(bootstrap.teams[0].name, "Arsenal");
    }

    #[test]
    fn resolve_roster_matches_known_and_falls_back_for_unknown() {
        let mut pool = PlayerPool::new();
        let known = pool.insert("Raya", "Arsenal", Position::Goalkeeper, Money(55), 4.5);
        let squad = CurrentSquad {
            picks: vec![
                RosterEntry {
                    name: "Raya".into(),
                    club: "Arsenal".into(),
                    position: Position::Goalkeeper,
                    price: Money(55),
                },
                RosterEntry {
                    name: "Obscure".into(),
                    club: "Brentford".into(),
                    position: Position::Defender,
                    price: Money(40),
                },
            ],
            bank: Money(23),
        };

        let ids = resolve_roster(&mut pool, &squad);
        assert_eq!(ids[0], known);
        let fallback = pool.player(ids[1]);
        assert_eq!(fallback.name, "Obscure");
        assert_eq!(fallback.price, Money(40));
        assert_eq!(fallback.score, UNSCORED_FALLBACK);
    }

    /// Engine-facing stub proving the trait seam works without HTTP.
    struct StubSource(CurrentSquad);

    #[async_trait]
    impl RosterSource for StubSource {
        async fn current_squad(&self, _entry_id: u64) -> Result<CurrentSquad, SourceError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn stub_source_round_trips() {
        let stub = StubSource(CurrentSquad {
            picks: vec![],
            bank: Money(10),
        });
        let squad = stub.current_squad(42).await.unwrap();
        assert_eq!(squad.bank, Money(10));
        assert!(squad.picks.is_empty());
    }
}
