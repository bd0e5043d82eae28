//! Squad Runner Library
//!
//! Core decision pipeline for weekly fantasy squad automation:
//! scoring -> constraint-validated decision generation -> idempotent
//! execution, with thin clients around the remote fantasy API and the
//! reasoning service.

pub mod advisor;
pub mod client;
pub mod config;
pub mod decision;
pub mod executor;
pub mod money;
pub mod report;
pub mod runner;
pub mod scoring;
pub mod squad;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use advisor::{Advisor, AdvisorError};
pub use client::{FetchError, FplClient, GameService, LineupPick, MyTeam, TransferRecord};
pub use config::Settings;
pub use decision::{
    ChipType, PricedTransfer, ProposalParseError, RawProposal, Rejection, TransferPair,
    ValidatedDecision,
};
pub use executor::{ExecutionOutcome, ExecutionState, Executor, PairOutcome};
pub use runner::{PipelineRunner, RunOptions, RunReport};
pub use squad::{placeholder_squad, Squad, SquadMember, Violation};
pub use types::{Availability, Bootstrap, Player, Position, ScoredPlayer};
