//! Player score model
//!
//! Pure functions from raw player and fixture data to a per-player score for
//! the target gameweek. No I/O. Missing statistics fall back to neutral
//! defaults; unavailable players are penalized, not excluded, so the
//! validator stays the sole owner of hard eligibility.

use std::collections::HashMap;

use crate::types::{Availability, Fixture, Player, ScoredPlayer, Team};

/// Weight on the rolling form figure.
const FORM_WEIGHT: f64 = 2.0;

/// Weight on points-per-million.
const VALUE_WEIGHT: f64 = 1.0;

/// Combined opposition strength assumed when a club has no fixture data.
const NEUTRAL_DIFFICULTY: f64 = 2400.0;

/// Divisor turning strength deltas into score units.
const DIFFICULTY_SCALE: f64 = 400.0;

/// Flat penalty for players ruled out this round.
const RULED_OUT_PENALTY: f64 = -25.0;

/// Flat penalty for doubtful players or chance-of-playing at 50% or below.
const DOUBTFUL_PENALTY: f64 = -5.0;

/// Points per million, 0.0 when the price is unusable.
pub fn value_index(player: &Player) -> f64 {
    let cost_millions = f64::from(player.price) / 10.0;
    if cost_millions <= 0.0 {
        return 0.0;
    }
    f64::from(player.total_points) / cost_millions
}

/// Opposition strength per club for the target gameweek. Clubs without a
/// fixture that week are absent from the map.
pub fn fixture_difficulty_by_team(
    teams: &[Team],
    fixtures: &[Fixture],
    gameweek: u32,
) -> HashMap<u32, f64> {
    let strength: HashMap<u32, f64> = teams
        .iter()
        .map(|t| (t.id, t.overall_strength()))
        .collect();

    let mut difficulty = HashMap::new();
    for fixture in fixtures {
        if fixture.event != Some(gameweek) {
            continue;
        }
        let home_strength = strength
            .get(&fixture.home_team)
            .copied()
            .unwrap_or(NEUTRAL_DIFFICULTY);
        let away_strength = strength
            .get(&fixture.away_team)
            .copied()
            .unwrap_or(NEUTRAL_DIFFICULTY);
        // Difficulty for each side is the opposition's strength.
        difficulty.insert(fixture.home_team, away_strength);
        difficulty.insert(fixture.away_team, home_strength);
    }
    difficulty
}

fn availability_penalty(player: &Player) -> f64 {
    if player.availability.is_ruled_out() {
        return RULED_OUT_PENALTY;
    }
    match player.chance_of_playing {
        Some(chance) if chance <= 25 => RULED_OUT_PENALTY,
        Some(chance) if chance <= 50 => DOUBTFUL_PENALTY,
        _ if player.availability == Availability::Doubtful => DOUBTFUL_PENALTY,
        _ => 0.0,
    }
}

/// Score one player for the target gameweek. Deterministic and total: every
/// player gets a number, never an error.
pub fn score(player: &Player, fixture_difficulty: Option<f64>) -> f64 {
    let difficulty = fixture_difficulty.unwrap_or(NEUTRAL_DIFFICULTY);
    player.form * FORM_WEIGHT
        + value_index(player) * VALUE_WEIGHT
        + (NEUTRAL_DIFFICULTY - difficulty) / DIFFICULTY_SCALE
        + availability_penalty(player)
}

/// Score the whole pool and rank it: descending score, ascending id on ties
/// so test runs are reproducible.
pub fn score_players(
    players: &[Player],
    teams: &[Team],
    fixtures: &[Fixture],
    gameweek: u32,
) -> Vec<ScoredPlayer> {
    let difficulty = fixture_difficulty_by_team(teams, fixtures, gameweek);

    let mut scored: Vec<ScoredPlayer> = players
        .iter()
        .map(|player| {
            let fixture_difficulty = difficulty.get(&player.team).copied();
            ScoredPlayer {
                score: score(player, fixture_difficulty),
                fixture_difficulty,
                player: player.clone(),
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.player.id.cmp(&b.player.id))
    });
    scored
}
