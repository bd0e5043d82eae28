//! Decision validator
//!
//! Deterministically turns a raw proposal into a decision the executor can
//! trust, or an explicit rejection. Pairs are applied in order to a scratch
//! squad; structurally inapplicable pairs are dropped individually, while
//! structural violations on the final squad reject the whole plan. Captaincy
//! problems are repaired locally instead of rejecting, since a legal captain
//! always exists among the starters.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decision::{
    ChipType, DroppedPair, PricedTransfer, RawProposal, Rejection, ValidatedDecision,
};
use crate::squad::{Squad, Violation};
use crate::types::ScoredPlayer;

/// Point cost of each transfer beyond the free allowance.
pub const TRANSFER_POINT_COST: u32 = 4;

/// Validate a proposal against the actual squad and resources.
///
/// Guarantees on success: the decision's pairs are a subsequence of the
/// proposal's transfers, and the squad they produce satisfies `is_legal()`.
pub fn validate(
    proposal: &RawProposal,
    squad: &Squad,
    pool: &[ScoredPlayer],
) -> Result<ValidatedDecision, Rejection> {
    let by_id: HashMap<u32, &ScoredPlayer> = pool.iter().map(|sp| (sp.player.id, sp)).collect();

    let mut scratch = squad.clone();
    let mut applied: Vec<PricedTransfer> = Vec::new();
    let mut dropped: Vec<DroppedPair> = Vec::new();

    for (index, pair) in proposal.transfers.iter().enumerate() {
        let drop_pair = |reason: String, dropped: &mut Vec<DroppedPair>| {
            warn!(
                "dropping pair out={} in={}: {reason}",
                pair.out_id, pair.in_id
            );
            dropped.push(DroppedPair {
                pair: *pair,
                reason,
            });
        };

        if !scratch.contains(pair.out_id) {
            drop_pair(
                format!("outgoing player {} is not in the squad", pair.out_id),
                &mut dropped,
            );
            continue;
        }
        if scratch.contains(pair.in_id) {
            drop_pair(
                format!("incoming player {} is already in the squad", pair.in_id),
                &mut dropped,
            );
            continue;
        }
        if proposal.transfers[index + 1..]
            .iter()
            .any(|later| later.out_id == pair.in_id)
        {
            drop_pair(
                format!(
                    "incoming player {} is transferred out again later in the plan",
                    pair.in_id
                ),
                &mut dropped,
            );
            continue;
        }
        let Some(incoming) = by_id.get(&pair.in_id) else {
            drop_pair(
                format!("incoming player {} is unknown", pair.in_id),
                &mut dropped,
            );
            continue;
        };

        let selling_price = scratch
            .member(pair.out_id)
            .map(|m| m.selling_price)
            .unwrap_or(0);
        match scratch.apply_pair(pair.out_id, incoming.player.clone()) {
            Ok(()) => applied.push(PricedTransfer {
                out_id: pair.out_id,
                in_id: pair.in_id,
                selling_price,
                purchase_price: incoming.player.price,
            }),
            Err(err) => drop_pair(err.to_string(), &mut dropped),
        }
    }

    // Structural legality on the final scratch squad decides the whole plan.
    // No heuristic repair here: a wrong but legal-looking squad is worse
    // than refusing to act.
    let structural: Vec<Violation> = scratch
        .violations()
        .into_iter()
        .filter(Violation::is_structural)
        .collect();
    if !structural.is_empty() {
        info!(
            "rejecting plan: {} structural violation(s) after {} applied pair(s)",
            structural.len(),
            applied.len()
        );
        return Err(Rejection {
            violations: structural,
            dropped,
        });
    }

    // Lineup order is advisory: adopt it only when it is a permutation of
    // the post-transfer squad that keeps the formation legal.
    if let Some(order) = &proposal.lineup_order {
        let mut trial = scratch.clone();
        let adopted = trial.reorder(order).is_ok()
            && trial
                .violations()
                .iter()
                .all(|v| !v.is_structural());
        if adopted {
            scratch = trial;
        } else {
            warn!("proposed lineup order is not legal for the squad; keeping current order");
        }
    }

    let starter_ids: Vec<u32> = scratch.starters().iter().map(|m| m.player.id).collect();
    let score_of = |id: u32| by_id.get(&id).map(|sp| sp.score).unwrap_or(f64::MIN);
    let best_starter = |exclude: Option<u32>| {
        starter_ids
            .iter()
            .copied()
            .filter(|id| Some(*id) != exclude)
            .max_by(|a, b| score_of(*a).total_cmp(&score_of(*b)).then_with(|| b.cmp(a)))
    };

    let captain = match proposal.captain_id {
        Some(id) if starter_ids.contains(&id) => id,
        suggested => {
            let Some(fallback) = best_starter(None) else {
                return Err(Rejection {
                    violations: scratch.violations(),
                    dropped,
                });
            };
            if let Some(id) = suggested {
                warn!("proposed captain {id} is not a starter; repaired to {fallback}");
            } else {
                debug!("no captain proposed; selected {fallback}");
            }
            fallback
        }
    };
    let vice_captain = match proposal.vice_captain_id {
        Some(id) if id != captain && starter_ids.contains(&id) => id,
        suggested => {
            let Some(fallback) = best_starter(Some(captain)) else {
                return Err(Rejection {
                    violations: scratch.violations(),
                    dropped,
                });
            };
            if let Some(id) = suggested {
                warn!("proposed vice-captain {id} is not usable; repaired to {fallback}");
            } else {
                debug!("no vice-captain proposed; selected {fallback}");
            }
            fallback
        }
    };
    scratch.captain = captain;
    scratch.vice_captain = vice_captain;

    // Chips the manager no longer holds are cleared, not fatal.
    let chip = if proposal.chip != ChipType::None
        && !squad.chips_available.contains(&proposal.chip)
    {
        warn!(
            "proposed chip {} is not available; continuing without a chip",
            proposal.chip
        );
        ChipType::None
    } else {
        proposal.chip
    };

    let remaining = scratch.violations();
    if !remaining.is_empty() {
        return Err(Rejection {
            violations: remaining,
            dropped,
        });
    }

    let pair_count = applied.len() as u32;
    let free_transfers_used = pair_count.min(squad.free_transfers);
    let point_cost = pair_count.saturating_sub(squad.free_transfers) * TRANSFER_POINT_COST;

    Ok(ValidatedDecision {
        plan_id: Uuid::new_v4(),
        pairs: applied,
        dropped,
        captain,
        vice_captain,
        starters: starter_ids,
        bench: scratch.bench().iter().map(|m| m.player.id).collect(),
        chip,
        free_transfers_used,
        point_cost,
        bank_after: scratch.bank,
        reasoning: proposal.reasoning.clone(),
    })
}
