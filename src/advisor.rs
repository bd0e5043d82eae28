//! Reasoning-service client
//!
//! Wraps the generative-model REST endpoint that proposes squad changes. The
//! service is an untyped, unreliable oracle: this module builds the context
//! prompt, makes the call with a bounded retry on quota/timeout responses,
//! and parses the text reply into a `RawProposal`. No legality checking
//! happens here.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decision::{parse_proposal, ProposalParseError, RawProposal};
use crate::money::format_price;
use crate::squad::Squad;
use crate::types::{GameweekContext, ScoredPlayer};

pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Large prompts need a generous ceiling.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_SECS: u64 = 10;

/// Cap on pool entries serialized into the prompt.
const PROMPT_POOL_CAP: usize = 400;

const NEWS_SNIPPET_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("reasoning service request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("reasoning service returned status {status}: {body}")]
    Service { status: u16, body: String },
    #[error("reasoning service returned an empty response")]
    EmptyResponse,
    #[error(transparent)]
    Parse(#[from] ProposalParseError),
}

pub struct Advisor {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Advisor {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, AdvisorError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AdvisorError::ClientBuild)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Ask the model for a gameweek plan and parse its reply.
    pub async fn propose(
        &self,
        pool: &[ScoredPlayer],
        squad: &Squad,
        ctx: &GameweekContext,
        fixtures_summary: &str,
    ) -> Result<RawProposal, AdvisorError> {
        let prompt = build_prompt(pool, squad, ctx, fixtures_summary);
        debug!("prompt built: {} chars", prompt.len());

        let text = self.generate(&prompt).await?;
        let proposal = parse_proposal(&text)?;
        info!(
            "proposal received: {} transfer(s), captain {:?}, chip {}",
            proposal.transfers.len(),
            proposal.captain_id,
            proposal.chip
        );
        Ok(proposal)
    }

    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![ContentDto {
                parts: vec![TextPart { text: prompt }],
            }],
        };

        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.http.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(source) if source.is_timeout() && attempt < MAX_ATTEMPTS => {
                    warn!("model request timed out (attempt {attempt}), retrying");
                    tokio::time::sleep(Duration::from_secs(RETRY_BASE_SECS * u64::from(attempt)))
                        .await;
                    continue;
                }
                Err(source) => return Err(AdvisorError::Transport(source)),
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body_text = response.text().await.unwrap_or_default();
                if attempt < MAX_ATTEMPTS {
                    warn!("model returned {status} (attempt {attempt}), retrying");
                    tokio::time::sleep(Duration::from_secs(RETRY_BASE_SECS * u64::from(attempt)))
                        .await;
                    continue;
                }
                return Err(AdvisorError::Service {
                    status: status.as_u16(),
                    body: body_text,
                });
            }
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                return Err(AdvisorError::Service {
                    status: status.as_u16(),
                    body: body_text,
                });
            }

            let reply: GenerateResponse =
                response.json().await.map_err(AdvisorError::Transport)?;
            let text = reply.text();
            if text.trim().is_empty() {
                return Err(AdvisorError::EmptyResponse);
            }
            return Ok(text);
        }
        Err(AdvisorError::EmptyResponse)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn news_snippet(news: &str) -> String {
    news.chars().take(NEWS_SNIPPET_LEN).collect()
}

/// Build the decision prompt: league rules, current squad with computed
/// scores, the gameweek's fixtures, and the capped scored pool as JSON.
fn build_prompt(
    pool: &[ScoredPlayer],
    squad: &Squad,
    ctx: &GameweekContext,
    fixtures_summary: &str,
) -> String {
    let by_id: HashMap<u32, &ScoredPlayer> =
        pool.iter().map(|sp| (sp.player.id, sp)).collect();

    let mut squad_lines = String::new();
    for member in &squad.members {
        let p = &member.player;
        let (score, difficulty) = by_id
            .get(&p.id)
            .map(|sp| (sp.score, sp.fixture_difficulty))
            .unwrap_or((0.0, None));
        let mut line = format!(
            "  id={} {} {} cost={} pts={} score={} form={} fixture_diff={:?}",
            p.id,
            p.web_name,
            p.position,
            p.price,
            p.total_points,
            round2(score),
            p.form,
            difficulty,
        );
        if p.availability != crate::types::Availability::Fit
            || p.chance_of_playing.is_some()
            || !p.news.is_empty()
        {
            line.push_str(&format!(
                " availability={:?} chance={:?} news={}",
                p.availability,
                p.chance_of_playing,
                news_snippet(&p.news)
            ));
        }
        squad_lines.push_str(&line);
        squad_lines.push('\n');
    }
    if squad_lines.is_empty() {
        squad_lines.push_str("  (none)\n");
    }

    let prompt_pool: Vec<PromptPlayer> = pool
        .iter()
        .take(PROMPT_POOL_CAP)
        .map(|sp| PromptPlayer {
            id: sp.player.id,
            name: sp.player.web_name.clone(),
            position: sp.player.position.short_name(),
            team: sp.player.team,
            price: sp.player.price,
            total_points: sp.player.total_points,
            form: sp.player.form,
            score: round2(sp.score),
            fixture_difficulty: sp.fixture_difficulty,
            chance_of_playing: sp.player.chance_of_playing,
            availability: format!("{:?}", sp.player.availability),
            news: news_snippet(&sp.player.news),
        })
        .collect();
    let pool_json = serde_json::to_string(&prompt_pool).unwrap_or_else(|_| "[]".to_string());

    let chips: Vec<&str> = squad.chips_available.iter().map(|c| c.as_str()).collect();
    let chips_text = if chips.is_empty() {
        "none".to_string()
    } else {
        chips.join(", ")
    };

    format!(
        "You are an expert fantasy football manager. Decide the best moves for gameweek {gw}.\n\
         \n\
         Rules:\n\
         - Budget: bank = {bank}. Prices are in tenths of a million. Max 3 players per club.\n\
         - You have {free} free transfer(s). Each extra transfer costs 4 points.\n\
         - Chips available: {chips}. Use a chip only if it is clearly optimal.\n\
         - Captain and vice_captain must be starters from your 15-man squad. Prefer high form and easy fixtures.\n\
         - Availability (CRITICAL): prioritise transferring out any squad member who is injured, suspended, or unlikely to play (check availability, news, chance_of_playing). Never start ruled-out players.\n\
         \n\
         Reason step by step, then output exactly one JSON object with no extra text, using this schema:\n\
         \n\
         {{\n\
         \x20 \"transfers\": [{{\"element_out\": <id>, \"element_in\": <id>}}, ...],\n\
         \x20 \"captain_id\": <id or null>,\n\
         \x20 \"vice_captain_id\": <id or null>,\n\
         \x20 \"chip\": \"none\" | \"wildcard\" | \"free_hit\" | \"bench_boost\" | \"triple_captain\",\n\
         \x20 \"lineup_order\": [<15 ids: slots 1-11 start, 12-15 bench>] or null,\n\
         \x20 \"reasoning\": \"<short summary>\"\n\
         }}\n\
         \n\
         Your current squad:\n\
         {squad_lines}\n\
         Upcoming fixtures (gameweek {gw}):\n\
         {fixtures}\n\
         All players with precomputed stats:\n\
         {pool_json}\n\
         \n\
         Output only the single JSON object, no markdown code block.",
        gw = ctx.gameweek,
        bank = format_price(squad.bank),
        free = squad.free_transfers,
        chips = chips_text,
        squad_lines = squad_lines,
        fixtures = fixtures_summary,
        pool_json = pool_json,
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<ContentDto<'a>>,
}

#[derive(Debug, Serialize)]
struct ContentDto<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .map(|part| part.text.as_str())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartDto>,
}

#[derive(Debug, Deserialize)]
struct PartDto {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct PromptPlayer {
    id: u32,
    name: String,
    position: &'static str,
    team: u32,
    price: u32,
    total_points: i32,
    form: f64,
    score: f64,
    fixture_difficulty: Option<f64>,
    chance_of_playing: Option<u8>,
    availability: String,
    news: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squad::{Squad, SquadMember};
    use crate::types::{Availability, Player, Position};

    fn scored(id: u32, score: f64) -> ScoredPlayer {
        ScoredPlayer {
            player: Player {
                id,
                web_name: format!("P{id}"),
                team: 1,
                position: Position::Midfielder,
                price: 50,
                availability: Availability::Fit,
                total_points: 10,
                form: 2.0,
                chance_of_playing: None,
                news: String::new(),
            },
            score,
            fixture_difficulty: Some(2200.0),
        }
    }

    #[test]
    fn test_prompt_includes_squad_and_schema() {
        let pool: Vec<ScoredPlayer> = (1..=20).map(|id| scored(id, 20.0 - id as f64)).collect();
        let squad = Squad {
            members: pool
                .iter()
                .take(15)
                .map(|sp| SquadMember {
                    player: sp.player.clone(),
                    selling_price: sp.player.price,
                })
                .collect(),
            captain: 1,
            vice_captain: 2,
            bank: 15,
            free_transfers: 2,
            chips_available: vec![crate::decision::ChipType::Wildcard],
            placeholder: false,
        };
        let ctx = GameweekContext {
            gameweek: 9,
            deadline_epoch: None,
        };
        let prompt = build_prompt(&pool, &squad, &ctx, "  T1 vs T2\n");
        assert!(prompt.contains("gameweek 9"));
        assert!(prompt.contains("bank = £1.5m"));
        assert!(prompt.contains("2 free transfer(s)"));
        assert!(prompt.contains("wildcard"));
        assert!(prompt.contains("\"element_out\""));
        assert!(prompt.contains("id=1 P1"));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let reply: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "{\"chip\":"}, {"text": " \"none\"}"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(reply.text(), "{\"chip\": \"none\"}");
    }
}
