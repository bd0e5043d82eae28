//! Idempotent executor
//!
//! Applies a validated decision to the remote team-management endpoints at
//! most once per gameweek. The remote transfer history is the single source
//! of truth for "already applied": re-running the pipeline in the same
//! gameweek never double-submits, and an unreadable history aborts the run
//! rather than guessing.

use tracing::{info, warn};

use crate::client::{GameService, LineupPick};
use crate::decision::{PricedTransfer, ValidatedDecision};

/// Per-gameweek execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    NotStarted,
    /// Consulting the remote transfer history. Dry runs stop here.
    Checking,
    /// The history already shows transfers for this gameweek; nothing was
    /// submitted.
    AlreadyApplied,
    Applying,
    Applied,
    Failed,
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExecutionState::NotStarted => "not_started",
            ExecutionState::Checking => "checking",
            ExecutionState::AlreadyApplied => "already_applied",
            ExecutionState::Applying => "applying",
            ExecutionState::Applied => "applied",
            ExecutionState::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Result of submitting one transfer pair.
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub pair: PricedTransfer,
    pub error: Option<String>,
}

impl PairOutcome {
    pub fn applied(&self) -> bool {
        self.error.is_none()
    }
}

/// Full outcome of one execution attempt.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub state: ExecutionState,
    pub gameweek: u32,
    pub dry_run: bool,
    /// One entry per submitted pair, in submission order. Empty when nothing
    /// was submitted.
    pub pairs: Vec<PairOutcome>,
    pub lineup_submitted: bool,
    pub lineup_error: Option<String>,
    pub message: String,
}

impl ExecutionOutcome {
    pub fn applied_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.applied()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.pairs.len() - self.applied_count()
    }
}

pub struct Executor<'a> {
    service: &'a dyn GameService,
    manager_id: u64,
}

impl<'a> Executor<'a> {
    pub fn new(service: &'a dyn GameService, manager_id: u64) -> Self {
        Self {
            service,
            manager_id,
        }
    }

    /// Run the state machine for one gameweek:
    /// `NotStarted -> Checking -> {AlreadyApplied | Applying -> Applied | Failed}`.
    pub async fn execute(
        &self,
        decision: &ValidatedDecision,
        gameweek: u32,
        apply: bool,
    ) -> ExecutionOutcome {
        let outcome = |state, pairs, lineup_submitted, lineup_error, message: String| {
            ExecutionOutcome {
                state,
                gameweek,
                dry_run: !apply,
                pairs,
                lineup_submitted,
                lineup_error,
                message,
            }
        };

        // Checking: the remote history is the idempotency witness. If it
        // cannot be read we cannot confirm, so we do not apply.
        let history = match self.service.transfer_history(self.manager_id).await {
            Ok(history) => history,
            Err(err) => {
                warn!("transfer history unavailable: {err}");
                return outcome(
                    ExecutionState::Failed,
                    Vec::new(),
                    false,
                    None,
                    format!("could not confirm transfer history; nothing submitted: {err}"),
                );
            }
        };
        if history.iter().any(|record| record.event == Some(gameweek)) {
            info!("transfers already recorded for gameweek {gameweek}; skipping");
            return outcome(
                ExecutionState::AlreadyApplied,
                Vec::new(),
                false,
                None,
                format!("transfers already made for gameweek {gameweek}; nothing submitted"),
            );
        }

        if !apply {
            return outcome(
                ExecutionState::Checking,
                Vec::new(),
                false,
                None,
                format!(
                    "dry-run: would submit {} transfer pair(s) and the lineup for gameweek {gameweek}",
                    decision.pairs.len()
                ),
            );
        }

        // Applying: one pair at a time. The remote service has no multi-pair
        // transaction, so earlier pairs stay applied when a later one fails.
        info!(
            "applying {} transfer pair(s) for gameweek {gameweek}",
            decision.pairs.len()
        );
        let transfer_chip = decision.chip.transfer_chip();
        let mut pairs = Vec::with_capacity(decision.pairs.len());
        for (index, pair) in decision.pairs.iter().enumerate() {
            let chip = if index == 0 { transfer_chip } else { None };
            match self
                .service
                .submit_transfer_pair(self.manager_id, gameweek, pair, chip)
                .await
            {
                Ok(()) => {
                    info!("pair applied: out {} in {}", pair.out_id, pair.in_id);
                    pairs.push(PairOutcome {
                        pair: *pair,
                        error: None,
                    });
                }
                Err(err) => {
                    warn!("pair failed: out {} in {}: {err}", pair.out_id, pair.in_id);
                    pairs.push(PairOutcome {
                        pair: *pair,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let failed = pairs.iter().filter(|p| !p.applied()).count();
        if failed > 0 {
            let applied = pairs.len() - failed;
            return outcome(
                ExecutionState::Failed,
                pairs,
                false,
                None,
                format!(
                    "applied {applied} of {} transfer pair(s); {failed} failed, no rollback; manual follow-up required",
                    decision.pairs.len()
                ),
            );
        }

        // Lineup is a separate mutation; its failure does not invalidate the
        // transfers that already went through.
        let picks = lineup_picks(decision);
        let lineup_error = self
            .service
            .submit_lineup(self.manager_id, &picks, decision.chip.lineup_chip())
            .await
            .err()
            .map(|err| err.to_string());
        if let Some(err) = &lineup_error {
            warn!("lineup submission failed (transfers stand): {err}");
        } else {
            info!(
                "lineup applied (captain {}, vice {})",
                decision.captain, decision.vice_captain
            );
        }

        let message = format!(
            "applied {} transfer pair(s) and {} for gameweek {gameweek}",
            decision.pairs.len(),
            if lineup_error.is_none() {
                "the lineup"
            } else {
                "no lineup (lineup submission failed)"
            }
        );
        outcome(
            ExecutionState::Applied,
            pairs,
            lineup_error.is_none(),
            lineup_error,
            message,
        )
    }
}

/// Build the 15-slot lineup payload from the decision's final order.
fn lineup_picks(decision: &ValidatedDecision) -> Vec<LineupPick> {
    decision
        .starters
        .iter()
        .chain(decision.bench.iter())
        .enumerate()
        .map(|(index, &element)| LineupPick {
            element,
            position: index as u32 + 1,
            is_captain: element == decision.captain,
            is_vice_captain: element == decision.vice_captain,
        })
        .collect()
}
