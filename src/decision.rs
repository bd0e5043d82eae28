//! Decision contract types
//!
//! The shapes exchanged between the proposer, the validator, and the
//! executor: the raw proposal parsed from the reasoning service, the
//! validated decision, and the rejection carrying the violation set. Parsing
//! here is strictly structural; legality lives in the validator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::squad::Violation;

/// One-time squad-rule override. Pass-through for this pipeline: routed to
/// the right endpoint, never interpreted by the legality rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipType {
    #[default]
    None,
    Wildcard,
    FreeHit,
    BenchBoost,
    TripleCaptain,
}

impl ChipType {
    /// Chip value accompanying the transfer payload, if this chip belongs
    /// there.
    pub fn transfer_chip(&self) -> Option<&'static str> {
        match self {
            ChipType::Wildcard => Some("wildcard"),
            ChipType::FreeHit => Some("freehit"),
            _ => None,
        }
    }

    /// Chip value accompanying the lineup payload, if this chip belongs
    /// there.
    pub fn lineup_chip(&self) -> Option<&'static str> {
        match self {
            ChipType::BenchBoost => Some("bboost"),
            ChipType::TripleCaptain => Some("3xc"),
            _ => None,
        }
    }

    /// Parse the chip names the my-team payload uses, including the short
    /// forms the transfer endpoints expect.
    pub fn from_api_name(name: &str) -> Option<ChipType> {
        match name {
            "wildcard" => Some(ChipType::Wildcard),
            "freehit" | "free_hit" => Some(ChipType::FreeHit),
            "bboost" | "bench_boost" => Some(ChipType::BenchBoost),
            "3xc" | "triple_captain" => Some(ChipType::TripleCaptain),
            "none" => Some(ChipType::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChipType::None => "none",
            ChipType::Wildcard => "wildcard",
            ChipType::FreeHit => "free_hit",
            ChipType::BenchBoost => "bench_boost",
            ChipType::TripleCaptain => "triple_captain",
        }
    }
}

impl std::fmt::Display for ChipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One proposed transfer: sell `out_id`, buy `in_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPair {
    #[serde(rename = "element_out")]
    pub out_id: u32,
    #[serde(rename = "element_in")]
    pub in_id: u32,
}

/// The proposer's output, parsed but not yet trusted. May reference players
/// not in the squad, blow the budget, or name a bench captain; the validator
/// sorts that out.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProposal {
    #[serde(default)]
    pub transfers: Vec<TransferPair>,
    #[serde(default)]
    pub captain_id: Option<u32>,
    #[serde(default)]
    pub vice_captain_id: Option<u32>,
    #[serde(default)]
    pub chip: ChipType,
    /// Exactly 15 ids when present: XI in slots 1-11, bench in 12-15.
    #[serde(default)]
    pub lineup_order: Option<Vec<u32>>,
    #[serde(default)]
    pub reasoning: String,
}

/// The reasoning-service output could not be parsed into a proposal.
#[derive(Debug, Error)]
pub enum ProposalParseError {
    #[error("no JSON object found in model response")]
    MissingJson,
    #[error("invalid JSON in model response: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("model response is not a JSON object")]
    NotAnObject,
    #[error("proposal does not match the decision schema: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Pull the JSON object out of a model response, tolerating markdown fences
/// and prose around it.
fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse reasoning-service text into a `RawProposal`. Chip strings are
/// normalized (`"Free Hit"` -> `free_hit`) before deserialization; any
/// structural mismatch is a parse error, never a guess.
pub fn parse_proposal(text: &str) -> Result<RawProposal, ProposalParseError> {
    let block = extract_json_block(text).ok_or(ProposalParseError::MissingJson)?;
    let mut value: serde_json::Value =
        serde_json::from_str(block).map_err(ProposalParseError::InvalidJson)?;
    let object = value
        .as_object_mut()
        .ok_or(ProposalParseError::NotAnObject)?;

    if let Some(chip) = object.get_mut("chip") {
        if let Some(name) = chip.as_str() {
            let normalized = name.to_lowercase().replace([' ', '-'], "_");
            *chip = serde_json::Value::String(normalized);
        }
    }

    serde_json::from_value(value).map_err(ProposalParseError::Schema)
}

/// A pair accepted by the validator, carrying the prices the mutation
/// endpoint requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricedTransfer {
    pub out_id: u32,
    pub in_id: u32,
    /// Sale value realized for the outgoing player, in tenths.
    pub selling_price: u32,
    /// Current price of the incoming player, in tenths.
    pub purchase_price: u32,
}

/// A proposed pair the validator dropped, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedPair {
    pub pair: TransferPair,
    pub reason: String,
}

/// A plan that passed validation end-to-end: applying it yields a squad for
/// which `is_legal()` holds, and `pairs` is a subsequence of the proposal's
/// transfers.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedDecision {
    pub plan_id: Uuid,
    pub pairs: Vec<PricedTransfer>,
    pub dropped: Vec<DroppedPair>,
    pub captain: u32,
    pub vice_captain: u32,
    /// Final XI ids in slot order.
    pub starters: Vec<u32>,
    /// Final bench ids in slot order.
    pub bench: Vec<u32>,
    pub chip: ChipType,
    pub free_transfers_used: u32,
    /// Point cost incurred by pairs beyond the free allowance. Recorded for
    /// visibility, never a blocker.
    pub point_cost: u32,
    /// Bank after all accepted pairs, in tenths.
    pub bank_after: i64,
    pub reasoning: String,
}

/// Structural legality failure: the plan as a whole was refused and the
/// squad left untouched.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub violations: Vec<Violation>,
    pub dropped: Vec<DroppedPair>,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proposal rejected ({} violation(s):", self.violations.len())?;
        for violation in &self.violations {
            write!(f, " [{violation}]")?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for Rejection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let text = r#"{"transfers": [{"element_out": 3, "element_in": 99}], "captain_id": 10, "vice_captain_id": 6, "chip": "none", "reasoning": "swap"}"#;
        let proposal = parse_proposal(text).unwrap();
        assert_eq!(proposal.transfers.len(), 1);
        assert_eq!(proposal.transfers[0].out_id, 3);
        assert_eq!(proposal.transfers[0].in_id, 99);
        assert_eq!(proposal.captain_id, Some(10));
        assert_eq!(proposal.chip, ChipType::None);
    }

    #[test]
    fn test_parse_markdown_fenced_json() {
        let text = "Here is my decision:\n```json\n{\"transfers\": [], \"captain_id\": 5, \"chip\": \"Bench Boost\"}\n```\nGood luck!";
        let proposal = parse_proposal(text).unwrap();
        assert_eq!(proposal.captain_id, Some(5));
        assert_eq!(proposal.chip, ChipType::BenchBoost);
    }

    #[test]
    fn test_chip_normalization_handles_hyphens() {
        let proposal = parse_proposal(r#"{"chip": "free-hit"}"#).unwrap();
        assert_eq!(proposal.chip, ChipType::FreeHit);
    }

    #[test]
    fn test_missing_fields_default() {
        let proposal = parse_proposal("{}").unwrap();
        assert!(proposal.transfers.is_empty());
        assert_eq!(proposal.captain_id, None);
        assert_eq!(proposal.chip, ChipType::None);
        assert_eq!(proposal.lineup_order, None);
    }

    #[test]
    fn test_no_json_is_parse_error() {
        let err = parse_proposal("I cannot decide this week.").unwrap_err();
        assert!(matches!(err, ProposalParseError::MissingJson));
    }

    #[test]
    fn test_wrong_shape_is_parse_error() {
        let err = parse_proposal("{\"chip\": 42}").unwrap_err();
        assert!(matches!(err, ProposalParseError::Schema(_)));

        let err = parse_proposal("{\"transfers\": \"lots\"}").unwrap_err();
        assert!(matches!(err, ProposalParseError::Schema(_)));
    }

    #[test]
    fn test_chip_endpoint_routing() {
        assert_eq!(ChipType::Wildcard.transfer_chip(), Some("wildcard"));
        assert_eq!(ChipType::Wildcard.lineup_chip(), None);
        assert_eq!(ChipType::TripleCaptain.lineup_chip(), Some("3xc"));
        assert_eq!(ChipType::TripleCaptain.transfer_chip(), None);
        assert_eq!(ChipType::None.transfer_chip(), None);
        assert_eq!(ChipType::None.lineup_chip(), None);
    }

    #[test]
    fn test_chip_from_api_name() {
        assert_eq!(ChipType::from_api_name("freehit"), Some(ChipType::FreeHit));
        assert_eq!(
            ChipType::from_api_name("bench_boost"),
            Some(ChipType::BenchBoost)
        );
        assert_eq!(ChipType::from_api_name("mystery"), None);
    }
}
