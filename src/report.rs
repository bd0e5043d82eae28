//! Gameweek summary report
//!
//! Plain-text rendering of what the run decided and what happened to it,
//! suitable for the log or any downstream notification channel.

use std::collections::HashMap;

use crate::decision::ValidatedDecision;
use crate::executor::{ExecutionOutcome, ExecutionState};
use crate::money::format_price;

fn name_of(names: &HashMap<u32, String>, id: u32) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| id.to_string())
}

fn mode_label(outcome: &ExecutionOutcome) -> &'static str {
    match outcome.state {
        _ if outcome.dry_run => "Dry-Run (No Changes Made)",
        ExecutionState::AlreadyApplied => "Already Applied (No Changes Made)",
        ExecutionState::Applied => "Applied",
        ExecutionState::Failed => "Failed (Partial Apply - Manual Follow-Up Required)",
        _ => "Not Applied",
    }
}

/// Render the gameweek summary.
pub fn build_summary(
    decision: &ValidatedDecision,
    outcome: &ExecutionOutcome,
    names: &HashMap<u32, String>,
) -> String {
    let mut lines: Vec<String> = vec![
        format!("Squad Runner Summary - Gameweek {}", outcome.gameweek),
        format!("Mode: {}", mode_label(outcome)),
        format!("Status: {}", outcome.message),
        String::new(),
        "--- Chip ---".to_string(),
        format!("Chip used: {}", decision.chip),
        String::new(),
        "--- Transfers ---".to_string(),
    ];

    if decision.pairs.is_empty() {
        lines.push("No transfers.".to_string());
    } else {
        for pair in &decision.pairs {
            let status = outcome
                .pairs
                .iter()
                .find(|p| p.pair.out_id == pair.out_id && p.pair.in_id == pair.in_id)
                .map(|p| match &p.error {
                    None => "  [applied]".to_string(),
                    Some(err) => format!("  [FAILED: {err}]"),
                })
                .unwrap_or_default();
            lines.push(format!(
                "  Out: {} ({})  ->  In: {} ({}){status}",
                name_of(names, pair.out_id),
                pair.out_id,
                name_of(names, pair.in_id),
                pair.in_id,
            ));
        }
    }
    if !decision.dropped.is_empty() {
        lines.push(String::new());
        lines.push("--- Dropped by validation ---".to_string());
        for dropped in &decision.dropped {
            lines.push(format!(
                "  Out: {} -> In: {} ({})",
                name_of(names, dropped.pair.out_id),
                name_of(names, dropped.pair.in_id),
                dropped.reason,
            ));
        }
    }
    if decision.point_cost > 0 {
        lines.push(format!(
            "Transfer cost: {} point(s) ({} free used)",
            decision.point_cost, decision.free_transfers_used
        ));
    }

    lines.push(String::new());
    lines.push("--- Starting XI ---".to_string());
    for (slot, id) in decision.starters.iter().enumerate() {
        lines.push(format!("  {}. {}", slot + 1, name_of(names, *id)));
    }
    lines.push(String::new());
    lines.push("--- Bench ---".to_string());
    for (slot, id) in decision.bench.iter().enumerate() {
        lines.push(format!("  {}. {}", slot + 1, name_of(names, *id)));
    }

    lines.push(String::new());
    lines.push("--- Captain & Vice ---".to_string());
    lines.push(format!("Captain: {}", name_of(names, decision.captain)));
    lines.push(format!(
        "Vice-captain: {}",
        name_of(names, decision.vice_captain)
    ));
    if let Some(err) = &outcome.lineup_error {
        lines.push(format!("Lineup submission failed: {err}"));
    }

    lines.push(String::new());
    lines.push("--- Rationale ---".to_string());
    lines.push(if decision.reasoning.is_empty() {
        "(none)".to_string()
    } else {
        decision.reasoning.clone()
    });

    lines.push(String::new());
    lines.push(format!("Bank after transfers: {}", format_price(decision.bank_after)));

    lines.join("\n")
}
