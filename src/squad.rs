//! Squad state and league legality rules
//!
//! Owns the in-memory squad for a run: 15 players split into a starting XI
//! and a 4-player bench, bank, free transfers, chips. Exposes the pure
//! legality predicate and its diagnostic counterpart, plus the placeholder
//! squad used when real team data cannot be fetched.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::client::MyTeam;
use crate::decision::ChipType;
use crate::types::{Player, Position};

pub const SQUAD_SIZE: usize = 15;
pub const STARTER_COUNT: usize = 11;
pub const MAX_PER_CLUB: usize = 3;

/// Required count of each position across the full 15.
fn squad_quota(position: Position) -> usize {
    match position {
        Position::Keeper => 2,
        Position::Defender => 5,
        Position::Midfielder => 5,
        Position::Forward => 3,
        Position::Other => 0,
    }
}

/// Allowed count of each position in the starting XI.
fn formation_bounds(position: Position) -> (usize, usize) {
    match position {
        Position::Keeper => (1, 1),
        Position::Defender => (3, 5),
        Position::Midfielder => (2, 5),
        Position::Forward => (1, 3),
        Position::Other => (0, 0),
    }
}

/// One broken legality rule, with enough detail to repair or reject.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("squad has {count} players, expected 15")]
    SquadSize { count: usize },
    #[error("squad has {count} {position}, expected {required}")]
    PositionQuota {
        position: Position,
        count: usize,
        required: usize,
    },
    #[error("starting XI has {count} {position}, allowed {min}-{max}")]
    Formation {
        position: Position,
        count: usize,
        min: usize,
        max: usize,
    },
    #[error("{count} players from club {team}, at most 3 allowed")]
    ClubQuota { team: u32, count: usize },
    #[error("spend exceeds available budget by {shortfall} (tenths of a million)")]
    BudgetExceeded { shortfall: i64 },
    #[error("captain {id} is not a starter")]
    CaptainNotStarter { id: u32 },
    #[error("vice-captain {id} is not a starter")]
    ViceCaptainNotStarter { id: u32 },
    #[error("captain and vice-captain are both {id}")]
    CaptainViceSame { id: u32 },
}

impl Violation {
    /// Structural violations force plan rejection; captaincy ones are
    /// repaired locally by the validator.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Violation::CaptainNotStarter { .. }
                | Violation::ViceCaptainNotStarter { .. }
                | Violation::CaptainViceSame { .. }
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum PairApplyError {
    #[error("outgoing player {0} is not in the squad")]
    OutgoingNotInSquad(u32),
    #[error("incoming player {0} is already in the squad")]
    IncomingAlreadyInSquad(u32),
}

#[derive(Debug, Clone, Error)]
pub enum SquadBuildError {
    #[error("team pick references unknown player id {0}")]
    UnknownPlayer(u32),
}

#[derive(Debug, Clone, Error)]
#[error("lineup order is not a permutation of the squad")]
pub struct ReorderError;

/// One of the 15 squad slots.
#[derive(Debug, Clone, Serialize)]
pub struct SquadMember {
    pub player: Player,
    /// Sale value realized if this player is transferred out, in tenths.
    pub selling_price: u32,
}

/// The manager's squad for one run. Slot order is meaningful: 1-11 start,
/// 12-15 are the bench.
#[derive(Debug, Clone, Serialize)]
pub struct Squad {
    pub members: Vec<SquadMember>,
    pub captain: u32,
    pub vice_captain: u32,
    /// Bank balance in tenths. May go negative on a scratch copy while the
    /// validator probes a plan; a legal squad has it non-negative.
    pub bank: i64,
    pub free_transfers: u32,
    pub chips_available: Vec<ChipType>,
    /// Set when this squad was built from the fallback list rather than
    /// fetched team data.
    pub placeholder: bool,
}

impl Squad {
    /// Build a squad from the authenticated my-team payload.
    pub fn from_my_team(
        team: &MyTeam,
        players_by_id: &HashMap<u32, &Player>,
    ) -> Result<Squad, SquadBuildError> {
        let mut picks = team.picks.clone();
        picks.sort_by_key(|p| p.position);

        let mut members = Vec::with_capacity(picks.len());
        let mut captain = None;
        let mut vice_captain = None;
        for pick in &picks {
            let player = players_by_id
                .get(&pick.element)
                .ok_or(SquadBuildError::UnknownPlayer(pick.element))?;
            if pick.is_captain {
                captain = Some(pick.element);
            }
            if pick.is_vice_captain {
                vice_captain = Some(pick.element);
            }
            members.push(SquadMember {
                selling_price: pick.selling_price.unwrap_or(player.price),
                player: (*player).clone(),
            });
        }

        let first = members.first().map(|m| m.player.id).unwrap_or(0);
        let second = members.get(1).map(|m| m.player.id).unwrap_or(first);
        Ok(Squad {
            captain: captain.unwrap_or(first),
            vice_captain: vice_captain.unwrap_or(second),
            members,
            bank: team.bank,
            free_transfers: team.free_transfers,
            chips_available: team.chips_available.clone(),
            placeholder: false,
        })
    }

    pub fn starters(&self) -> &[SquadMember] {
        let end = STARTER_COUNT.min(self.members.len());
        &self.members[..end]
    }

    pub fn bench(&self) -> &[SquadMember] {
        let start = STARTER_COUNT.min(self.members.len());
        &self.members[start..]
    }

    pub fn contains(&self, id: u32) -> bool {
        self.members.iter().any(|m| m.player.id == id)
    }

    pub fn member(&self, id: u32) -> Option<&SquadMember> {
        self.members.iter().find(|m| m.player.id == id)
    }

    pub fn is_starter(&self, id: u32) -> bool {
        self.starters().iter().any(|m| m.player.id == id)
    }

    /// Swap one player out for another in the same slot, adjusting the bank
    /// by sale value minus purchase price. Slot reuse keeps the lineup
    /// layout stable across transfers.
    pub fn apply_pair(&mut self, out_id: u32, incoming: Player) -> Result<(), PairApplyError> {
        if self.contains(incoming.id) {
            return Err(PairApplyError::IncomingAlreadyInSquad(incoming.id));
        }
        let slot = self
            .members
            .iter()
            .position(|m| m.player.id == out_id)
            .ok_or(PairApplyError::OutgoingNotInSquad(out_id))?;

        let outgoing = &self.members[slot];
        self.bank += i64::from(outgoing.selling_price) - i64::from(incoming.price);
        self.members[slot] = SquadMember {
            selling_price: incoming.price,
            player: incoming,
        };
        Ok(())
    }

    /// Rearrange the 15 slots to the given id order. Fails unless the order
    /// is a permutation of the current squad; legality of the resulting
    /// formation is the caller's check.
    pub fn reorder(&mut self, order: &[u32]) -> Result<(), ReorderError> {
        if order.len() != self.members.len() {
            return Err(ReorderError);
        }
        let unique: HashSet<u32> = order.iter().copied().collect();
        if unique.len() != order.len() {
            return Err(ReorderError);
        }
        if !order.iter().all(|id| self.contains(*id)) {
            return Err(ReorderError);
        }
        let mut by_id: HashMap<u32, SquadMember> = self
            .members
            .drain(..)
            .map(|m| (m.player.id, m))
            .collect();
        self.members = order.iter().filter_map(|id| by_id.remove(id)).collect();
        Ok(())
    }

    /// Diagnostic form of the legality predicate: every broken rule with the
    /// players it concerns.
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        if self.members.len() != SQUAD_SIZE {
            violations.push(Violation::SquadSize {
                count: self.members.len(),
            });
        }

        for position in [
            Position::Keeper,
            Position::Defender,
            Position::Midfielder,
            Position::Forward,
        ] {
            let count = self
                .members
                .iter()
                .filter(|m| m.player.position == position)
                .count();
            let required = squad_quota(position);
            if count != required {
                violations.push(Violation::PositionQuota {
                    position,
                    count,
                    required,
                });
            }

            let (min, max) = formation_bounds(position);
            let starting = self
                .starters()
                .iter()
                .filter(|m| m.player.position == position)
                .count();
            if starting < min || starting > max {
                violations.push(Violation::Formation {
                    position,
                    count: starting,
                    min,
                    max,
                });
            }
        }

        let mut club_counts: HashMap<u32, usize> = HashMap::new();
        for member in &self.members {
            *club_counts.entry(member.player.team).or_default() += 1;
        }
        let mut over_quota: Vec<(u32, usize)> = club_counts
            .into_iter()
            .filter(|(_, count)| *count > MAX_PER_CLUB)
            .collect();
        over_quota.sort_by_key(|(team, _)| *team);
        for (team, count) in over_quota {
            violations.push(Violation::ClubQuota { team, count });
        }

        if self.bank < 0 {
            violations.push(Violation::BudgetExceeded {
                shortfall: -self.bank,
            });
        }

        if !self.is_starter(self.captain) {
            violations.push(Violation::CaptainNotStarter { id: self.captain });
        }
        if !self.is_starter(self.vice_captain) {
            violations.push(Violation::ViceCaptainNotStarter {
                id: self.vice_captain,
            });
        }
        if self.captain == self.vice_captain {
            violations.push(Violation::CaptainViceSame { id: self.captain });
        }

        violations
    }

    pub fn is_legal(&self) -> bool {
        self.violations().is_empty()
    }
}

/// Fallback squad used when my-team cannot be fetched: position template of
/// an XI (1 GK, 4 DEF, 4 MID, 2 FWD) plus a bench (GK, DEF, MID, FWD),
/// matched against bootstrap names.
const PLACEHOLDER_SQUAD: &[(Position, &str)] = &[
    (Position::Keeper, "Henderson"),
    (Position::Defender, "Gabriel"),
    (Position::Defender, "Dorgu"),
    (Position::Defender, "Romero"),
    (Position::Defender, "Rúben"),
    (Position::Midfielder, "B.Fernandes"),
    (Position::Midfielder, "Schade"),
    (Position::Midfielder, "Rice"),
    (Position::Midfielder, "Wirtz"),
    (Position::Forward, "Haaland"),
    (Position::Forward, "Marc Guiu"),
    (Position::Keeper, "Dúbravka"),
    (Position::Defender, "Muñoz"),
    (Position::Midfielder, "L.Miley"),
    (Position::Forward, "Thiago"),
];

/// Lowercase and strip the accents that appear in squad lists, so `Muñoz`
/// matches `Munoz` and vice versa.
fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace('ú', "u")
        .replace('á', "a")
        .replace('é', "e")
        .replace('í', "i")
        .replace('ó', "o")
        .replace('ñ', "n")
}

/// Resolve the placeholder squad against the fetched player pool. Slots
/// whose name does not match fall back to the highest-scoring unused player
/// of the required position that keeps the club quota intact.
pub fn placeholder_squad(players: &[Player]) -> Squad {
    let mut used: HashSet<u32> = HashSet::new();
    let mut club_counts: HashMap<u32, usize> = HashMap::new();
    let mut members: Vec<SquadMember> = Vec::with_capacity(SQUAD_SIZE);

    for (position, name) in PLACEHOLDER_SQUAD {
        let key = normalize_name(name);
        let matched = players.iter().find(|p| {
            p.position == *position
                && !used.contains(&p.id)
                && normalize_name(&p.web_name).contains(&key)
        });
        let pick = matched.or_else(|| {
            players
                .iter()
                .filter(|p| {
                    p.position == *position
                        && !used.contains(&p.id)
                        && club_counts.get(&p.team).copied().unwrap_or(0) < MAX_PER_CLUB
                })
                .max_by(|a, b| {
                    a.total_points
                        .cmp(&b.total_points)
                        .then_with(|| b.id.cmp(&a.id))
                })
        });
        match pick {
            Some(player) => {
                used.insert(player.id);
                *club_counts.entry(player.team).or_default() += 1;
                members.push(SquadMember {
                    selling_price: player.price,
                    player: player.clone(),
                });
            }
            None => warn!("no player available for placeholder slot {position} \"{name}\""),
        }
    }

    if members.len() < SQUAD_SIZE {
        warn!(
            "placeholder squad resolved only {}/{} slots",
            members.len(),
            SQUAD_SIZE
        );
    }

    // Deterministic captaincy: best starter by season points, runner-up as
    // vice.
    let mut starters: Vec<&SquadMember> = members.iter().take(STARTER_COUNT).collect();
    starters.sort_by(|a, b| {
        b.player
            .total_points
            .cmp(&a.player.total_points)
            .then_with(|| a.player.id.cmp(&b.player.id))
    });
    let captain = starters.first().map(|m| m.player.id).unwrap_or(0);
    let vice_captain = starters.get(1).map(|m| m.player.id).unwrap_or(captain);

    Squad {
        members,
        captain,
        vice_captain,
        bank: 0,
        free_transfers: 1,
        chips_available: vec![
            ChipType::Wildcard,
            ChipType::FreeHit,
            ChipType::BenchBoost,
            ChipType::TripleCaptain,
        ],
        placeholder: true,
    }
}
