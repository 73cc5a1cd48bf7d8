// Player pool: an arena of immutable player records with dense integer
// handles. All engine code refers to players by `PlayerId`, never by name,
// so duplicate display names (same name, different club or price) are
// never ambiguous.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// A price or budget amount in tenths of the league currency unit.
///
/// Prices have a fixed 0.1 granularity, so one integer tenth is exact and
/// arithmetic never drifts. Negative values are allowed for deltas.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Build from a whole-unit float (e.g. `4.5` -> 45 tenths), rounding to
    /// the nearest tenth.
    pub fn from_units(units: f64) -> Self {
        Money((units * 10.0).round() as i64)
    }

    pub fn from_tenths(tenths: i64) -> Self {
        Money(tenths)
    }

    pub fn tenths(self) -> i64 {
        self.0
    }

    /// Value in whole currency units.
    pub fn as_units(self) -> f64 {
        self.0 as f64 / 10.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_units())
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// The four squad positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    /// All positions in their canonical display order.
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Parse an input position value. Matching is case-sensitive: the pool
    /// schema enumerates exactly these four spellings.
    pub fn from_input(s: &str) -> Option<Self> {
        match s {
            "Goalkeeper" => Some(Position::Goalkeeper),
            "Defender" => Some(Position::Defender),
            "Midfielder" => Some(Position::Midfielder),
            "Forward" => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "Goalkeeper",
            Position::Defender => "Defender",
            Position::Midfielder => "Midfielder",
            Position::Forward => "Forward",
        }
    }

    /// Dense index used by per-position tables.
    pub fn index(&self) -> usize {
        match self {
            Position::Goalkeeper => 0,
            Position::Defender => 1,
            Position::Midfielder => 2,
            Position::Forward => 3,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A count for each of the four positions, indexed by `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionCounts(pub [usize; 4]);

impl PositionCounts {
    pub fn get(&self, pos: Position) -> usize {
        self.0[pos.index()]
    }

    pub fn set(&mut self, pos: Position, count: usize) {
        self.0[pos.index()] = count;
    }

    pub fn add(&mut self, pos: Position, count: usize) {
        self.0[pos.index()] += count;
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// Count the positions of the given players.
    pub fn of(pool: &PlayerPool, ids: &[PlayerId]) -> Self {
        let mut counts = PositionCounts::default();
        for &id in ids {
            counts.add(pool.player(id).position, 1);
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Players and clubs
// ---------------------------------------------------------------------------

/// Dense handle into a `PlayerPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense handle for a club within a `PlayerPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClubId(pub u32);

impl ClubId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One candidate player. Immutable once inserted into a pool.
///
/// Negative `score` values are permitted: the loader uses a large negative
/// sentinel for must-keep players that have no projection of their own.
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub club: ClubId,
    pub position: Position,
    pub price: Money,
    pub score: f64,
}

/// Arena of candidate players.
///
/// Players are identified by the (name, club, price) triple on insert:
/// re-inserting an identical triple returns the existing handle, while a
/// colliding display name with a different club or price gets its own
/// handle. Clubs are interned to dense ids for cheap per-club counting.
#[derive(Debug, Clone, Default)]
pub struct PlayerPool {
    players: Vec<Player>,
    clubs: Vec<String>,
}

impl PlayerPool {
    pub fn new() -> Self {
        PlayerPool::default()
    }

    /// Insert a player, interning the club name. Returns the existing handle
    /// if an identical (name, club, price) entry is already present.
    pub fn insert(
        &mut self,
        name: &str,
        club: &str,
        position: Position,
        price: Money,
        score: f64,
    ) -> PlayerId {
        let club_id = self.intern_club(club);
        if let Some(existing) = self.find(name, club, price) {
            return existing;
        }
        let id = PlayerId(self.players.len() as u32);
        self.players.push(Player {
            name: name.to_string(),
            club: club_id,
            position,
            price,
            score,
        });
        id
    }

    /// Look up a player by the identity triple.
    pub fn find(&self, name: &str, club: &str, price: Money) -> Option<PlayerId> {
        let club_id = self.club_id(club)?;
        self.players
            .iter()
            .position(|p| p.club == club_id && p.price == price && p.name == name)
            .map(|i| PlayerId(i as u32))
    }

    /// Look up a player by name and club, ignoring price. Used when matching
    /// an externally sourced roster whose prices may be stale.
    pub fn find_by_name(&self, name: &str, club: &str) -> Option<PlayerId> {
        let club_id = self.club_id(club)?;
        self.players
            .iter()
            .position(|p| p.club == club_id && p.name == name)
            .map(|i| PlayerId(i as u32))
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id.index()]
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        (0..self.players.len() as u32).map(PlayerId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &Player)> {
        self.players
            .iter()
            .enumerate()
            .map(|(i, p)| (PlayerId(i as u32), p))
    }

    pub fn club_count(&self) -> usize {
        self.clubs.len()
    }

    pub fn club_name(&self, id: ClubId) -> &str {
        &self.clubs[id.index()]
    }

    pub fn club_id(&self, name: &str) -> Option<ClubId> {
        self.clubs
            .iter()
            .position(|c| c == name)
            .map(|i| ClubId(i as u32))
    }

    fn intern_club(&mut self, name: &str) -> ClubId {
        if let Some(id) = self.club_id(name) {
            return id;
        }
        let id = ClubId(self.clubs.len() as u32);
        self.clubs.push(name.to_string());
        id
    }

    /// Total price of the given players.
    pub fn total_price(&self, ids: &[PlayerId]) -> Money {
        ids.iter().map(|&id| self.player(id).price).sum()
    }

    /// Total projected score of the given players.
    pub fn total_score(&self, ids: &[PlayerId]) -> f64 {
        ids.iter().map(|&id| self.player(id).score).sum()
    }

    /// Per-club counts over the given players, indexed by `ClubId`.
    pub fn club_counts(&self, ids: &[PlayerId]) -> Vec<usize> {
        let mut counts = vec![0usize; self.clubs.len()];
        for &id in ids {
            counts[self.player(id).club.index()] += 1;
        }
        counts
    }
}
