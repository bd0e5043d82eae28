//! Domain types threaded through the pipeline
//!
//! These are normalized snapshots of the remote data, re-fetched every run.
//! Wire DTOs live next to the client that owns them; everything here is
//! already converted.

use serde::{Deserialize, Serialize};

/// On-pitch position of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Keeper,
    Defender,
    Midfielder,
    Forward,
    /// Element types the API may add that are not pickable outfield roles.
    Other,
}

impl Position {
    /// Map the API's numeric element type (1=GK, 2=DEF, 3=MID, 4=FWD).
    pub fn from_element_type(code: u8) -> Self {
        match code {
            1 => Position::Keeper,
            2 => Position::Defender,
            3 => Position::Midfielder,
            4 => Position::Forward,
            _ => Position::Other,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Position::Keeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
            Position::Other => "?",
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Availability parsed from the API's one-letter status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Fit,
    Doubtful,
    Injured,
    Suspended,
    Unavailable,
}

impl Availability {
    /// `a`=fit, `d`=doubtful, `i`=injured, `s`=suspended, `u`/`n`=unavailable.
    /// Unknown codes read as fit so a player we know nothing about still
    /// flows through scoring.
    pub fn from_status_code(code: &str) -> Self {
        match code {
            "d" => Availability::Doubtful,
            "i" => Availability::Injured,
            "s" => Availability::Suspended,
            "u" | "n" => Availability::Unavailable,
            _ => Availability::Fit,
        }
    }

    /// Players the league will not field this round.
    pub fn is_ruled_out(&self) -> bool {
        matches!(
            self,
            Availability::Injured | Availability::Suspended | Availability::Unavailable
        )
    }
}

/// Immutable per-gameweek snapshot of one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub web_name: String,
    /// Club id the player belongs to.
    pub team: u32,
    pub position: Position,
    /// Current price in tenths of a million.
    pub price: u32,
    pub availability: Availability,
    pub total_points: i32,
    /// Rolling form figure, 0.0 when the API omits it.
    pub form: f64,
    /// 0-100 when the API reports one, `None` otherwise.
    pub chance_of_playing: Option<u8>,
    pub news: String,
}

/// A player plus the score computed for the target gameweek. Derived,
/// recomputed every run, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPlayer {
    pub player: Player,
    pub score: f64,
    /// Opposition strength for the target gameweek, `None` when the player's
    /// club has no fixture that week.
    pub fixture_difficulty: Option<f64>,
}

/// Club metadata used for fixture difficulty and report labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub short_name: String,
    pub strength_home: f64,
    pub strength_away: f64,
}

impl Team {
    /// Combined strength used as opposition difficulty.
    pub fn overall_strength(&self) -> f64 {
        self.strength_home + self.strength_away
    }
}

/// One scheduled round of fixtures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameweekEvent {
    pub id: u32,
    pub deadline_epoch: Option<i64>,
}

/// A single fixture within a gameweek.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub event: Option<u32>,
    pub home_team: u32,
    pub away_team: u32,
}

/// Normalized bootstrap payload: everything the public data endpoint knows.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    pub events: Vec<GameweekEvent>,
    pub teams: Vec<Team>,
    pub players: Vec<Player>,
}

/// Context for the run's target gameweek.
#[derive(Debug, Clone)]
pub struct GameweekContext {
    pub gameweek: u32,
    pub deadline_epoch: Option<i64>,
}
