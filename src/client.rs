//! Fantasy-league API client
//!
//! Thin wrapper over the remote service: public data (bootstrap, fixtures),
//! the authenticated my-team endpoints, and the mutation endpoints the
//! executor drives. Wire DTOs live here and are normalized into domain types
//! before anything downstream sees them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::decision::{ChipType, PricedTransfer};
use crate::types::{Availability, Bootstrap, Fixture, GameweekEvent, Player, Position, Team};

pub const DEFAULT_API_BASE: &str = "https://fantasy.premierleague.com/api";
pub const DEFAULT_LOGIN_URL: &str = "https://users.premierleague.com/accounts/login/";

/// The login endpoint rejects obviously scripted clients.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream data or mutation failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} rejected the session (status {status}); check credentials or cookie")]
    Auth { endpoint: String, status: u16 },
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("login failed: {0}")]
    Login(String),
}

/// Authenticated team state as consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct MyTeam {
    pub picks: Vec<TeamPick>,
    /// Bank in tenths of a million.
    pub bank: i64,
    pub free_transfers: u32,
    pub chips_available: Vec<ChipType>,
}

#[derive(Debug, Clone)]
pub struct TeamPick {
    pub element: u32,
    /// Slot 1-15; 1-11 start.
    pub position: u32,
    pub is_captain: bool,
    pub is_vice_captain: bool,
    pub selling_price: Option<u32>,
}

/// Transfer-history entry: the idempotency witness, keyed by gameweek.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    #[serde(default)]
    pub event: Option<u32>,
    #[serde(default)]
    pub element_in: u32,
    #[serde(default)]
    pub element_out: u32,
}

/// One slot of the lineup mutation payload.
#[derive(Debug, Clone, Serialize)]
pub struct LineupPick {
    pub element: u32,
    pub position: u32,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

/// The mutation surface the executor needs, kept separate from the fetch
/// surface so tests can script remote behavior without HTTP.
#[async_trait]
pub trait GameService: Send + Sync {
    async fn transfer_history(&self, manager_id: u64) -> Result<Vec<TransferRecord>, FetchError>;

    /// Submit one transfer pair for the gameweek. The wire protocol is a
    /// two-phase POST (validate, then confirm); both phases happen inside
    /// this call.
    async fn submit_transfer_pair(
        &self,
        manager_id: u64,
        gameweek: u32,
        pair: &PricedTransfer,
        chip: Option<&str>,
    ) -> Result<(), FetchError>;

    async fn submit_lineup(
        &self,
        manager_id: u64,
        picks: &[LineupPick],
        chip: Option<&str>,
    ) -> Result<(), FetchError>;
}

pub struct FplClient {
    http: Client,
    base_url: String,
    login_url: String,
    /// Browser-cookie fallback, sent verbatim when programmatic login is not
    /// an option.
    cookie_header: Option<String>,
}

impl FplClient {
    pub fn new(base_url: &str, login_url: &str) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            login_url: login_url.to_string(),
            cookie_header: None,
        })
    }

    pub fn with_cookie_header(mut self, cookie: &str) -> Self {
        self.cookie_header = Some(cookie.trim().to_string());
        self
    }

    /// Site root for Origin/Referer headers and post-login redirects.
    fn site_url(&self) -> &str {
        self.base_url.trim_end_matches("/api")
    }

    /// Log in with account credentials; session cookies land in the client's
    /// jar. Whether the session actually works is only observable on the
    /// first authenticated request.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), FetchError> {
        // Prime cookies the way a browser would before posting credentials.
        self.http
            .get(&self.login_url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                endpoint: "login".into(),
                source,
            })?;

        let redirect = format!("{}/a/login", self.site_url());
        let params = [
            ("login", email),
            ("password", password),
            ("app", "plfpl-web"),
            ("redirect_uri", redirect.as_str()),
        ];
        let response = self
            .http
            .post(&self.login_url)
            .form(&params)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                endpoint: "login".into(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() && !status.is_redirection() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Login(format!("status {status}: {body}")));
        }

        // Follow to the fantasy site so its own cookies are set as well.
        self.http.get(self.site_url()).send().await.ok();
        debug!("login flow completed");
        Ok(())
    }

    fn apply_cookie(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.cookie_header {
            Some(cookie) => request.header(reqwest::header::COOKIE, cookie.as_str()),
            None => request,
        }
    }

    async fn ensure_success(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, FetchError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let request = self
            .apply_cookie(self.http.get(&url))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::REFERER, format!("{}/my-team", self.site_url()));
        let response = request.send().await.map_err(|source| FetchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Self::ensure_success(endpoint, response)
            .await?
            .json()
            .await
            .map_err(|source| FetchError::Decode {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    async fn post_json<B: Serialize>(
        &self,
        endpoint: &str,
        referer_page: &str,
        body: &B,
    ) -> Result<(), FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let request = self
            .apply_cookie(self.http.post(&url))
            .header(reqwest::header::ORIGIN, self.site_url().to_string())
            .header(
                reqwest::header::REFERER,
                format!("{}/{}", self.site_url(), referer_page),
            )
            .json(body);
        let response = request.send().await.map_err(|source| FetchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Self::ensure_success(endpoint, response).await?;
        Ok(())
    }

    /// Fetch bootstrap data: gameweeks, clubs, and the full player pool.
    pub async fn bootstrap(&self) -> Result<Bootstrap, FetchError> {
        let dto: BootstrapDto = self.get_json("bootstrap-static/").await?;
        let bootstrap = dto.into_domain();
        info!(
            "bootstrap loaded: {} players, {} teams, {} gameweeks",
            bootstrap.players.len(),
            bootstrap.teams.len(),
            bootstrap.events.len()
        );
        Ok(bootstrap)
    }

    /// Fetch fixtures for one gameweek.
    pub async fn fixtures(&self, gameweek: u32) -> Result<Vec<Fixture>, FetchError> {
        let dtos: Vec<FixtureDto> = self
            .get_json(&format!("fixtures/?event={gameweek}"))
            .await?;
        Ok(dtos
            .into_iter()
            .filter_map(|dto| {
                Some(Fixture {
                    event: dto.event,
                    home_team: dto.team_h?,
                    away_team: dto.team_a?,
                })
            })
            .collect())
    }

    /// Fetch the manager's current squad, bank, transfer allowance, and
    /// chips. Requires an authenticated session.
    pub async fn my_team(&self, manager_id: u64) -> Result<MyTeam, FetchError> {
        let dto: MyTeamDto = self.get_json(&format!("my-team/{manager_id}/")).await?;
        Ok(dto.into_domain())
    }
}

#[async_trait]
impl GameService for FplClient {
    async fn transfer_history(&self, manager_id: u64) -> Result<Vec<TransferRecord>, FetchError> {
        self.get_json(&format!("entry/{manager_id}/transfers/"))
            .await
    }

    async fn submit_transfer_pair(
        &self,
        manager_id: u64,
        gameweek: u32,
        pair: &PricedTransfer,
        chip: Option<&str>,
    ) -> Result<(), FetchError> {
        let entry = TransferEntryDto {
            element_in: pair.in_id,
            element_out: pair.out_id,
            purchase_price: pair.purchase_price,
            selling_price: pair.selling_price,
        };
        // Validate first, then confirm, as the web client does.
        for confirmed in [false, true] {
            let payload = TransferPayloadDto {
                entry: manager_id,
                event: gameweek,
                transfers: vec![entry],
                chip,
                confirmed,
            };
            self.post_json("transfers/", "transfers", &payload).await?;
        }
        Ok(())
    }

    async fn submit_lineup(
        &self,
        manager_id: u64,
        picks: &[LineupPick],
        chip: Option<&str>,
    ) -> Result<(), FetchError> {
        let payload = LineupPayloadDto { picks, chip };
        self.post_json(&format!("my-team/{manager_id}/"), "my-team", &payload)
            .await
    }
}

/// First gameweek whose deadline is still in the future, with its deadline
/// epoch. `None` once the season has ended.
pub fn next_gameweek(events: &[GameweekEvent], now_epoch: i64) -> Option<(u32, i64)> {
    events
        .iter()
        .filter_map(|event| {
            let deadline = event.deadline_epoch?;
            (deadline > now_epoch).then_some((event.id, deadline))
        })
        .next()
}

// --- Wire DTOs ---

#[derive(Debug, Deserialize)]
struct BootstrapDto {
    #[serde(default)]
    events: Vec<EventDto>,
    #[serde(default)]
    teams: Vec<TeamDto>,
    #[serde(default)]
    elements: Vec<ElementDto>,
}

impl BootstrapDto {
    fn into_domain(self) -> Bootstrap {
        Bootstrap {
            events: self
                .events
                .into_iter()
                .map(|e| GameweekEvent {
                    id: e.id,
                    deadline_epoch: e.deadline_time_epoch,
                })
                .collect(),
            teams: self
                .teams
                .into_iter()
                .map(|t| Team {
                    id: t.id,
                    short_name: t.short_name,
                    strength_home: t.strength_overall_home.unwrap_or(1000.0),
                    strength_away: t.strength_overall_away.unwrap_or(1000.0),
                })
                .collect(),
            players: self.elements.into_iter().map(ElementDto::into_player).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventDto {
    id: u32,
    #[serde(default)]
    deadline_time_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TeamDto {
    id: u32,
    #[serde(default)]
    short_name: String,
    #[serde(default)]
    strength_overall_home: Option<f64>,
    #[serde(default)]
    strength_overall_away: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ElementDto {
    id: u32,
    #[serde(default)]
    web_name: String,
    #[serde(default)]
    element_type: u8,
    #[serde(default)]
    team: u32,
    #[serde(default)]
    now_cost: u32,
    #[serde(default)]
    total_points: i32,
    #[serde(default)]
    form: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    news: Option<String>,
    #[serde(default)]
    chance_of_playing_this_round: Option<u8>,
}

impl ElementDto {
    fn into_player(self) -> Player {
        Player {
            id: self.id,
            web_name: self.web_name,
            team: self.team,
            position: Position::from_element_type(self.element_type),
            price: self.now_cost,
            availability: Availability::from_status_code(self.status.as_deref().unwrap_or("a")),
            total_points: self.total_points,
            form: self
                .form
                .as_deref()
                .and_then(|f| f.parse().ok())
                .unwrap_or(0.0),
            chance_of_playing: self.chance_of_playing_this_round,
            news: self.news.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FixtureDto {
    #[serde(default)]
    event: Option<u32>,
    #[serde(default)]
    team_h: Option<u32>,
    #[serde(default)]
    team_a: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MyTeamDto {
    #[serde(default)]
    picks: Vec<PickDto>,
    #[serde(default)]
    transfers: TransfersDto,
    #[serde(default)]
    chips: Vec<ChipDto>,
}

impl MyTeamDto {
    fn into_domain(self) -> MyTeam {
        let chips_available = self
            .chips
            .iter()
            .filter(|chip| chip.status == "available")
            .filter_map(|chip| {
                let normalized = chip.name.to_lowercase().replace(' ', "_");
                ChipType::from_api_name(&normalized)
            })
            .collect();
        MyTeam {
            picks: self
                .picks
                .into_iter()
                .map(|p| TeamPick {
                    element: p.element,
                    position: p.position,
                    is_captain: p.is_captain,
                    is_vice_captain: p.is_vice_captain,
                    selling_price: p.selling_price,
                })
                .collect(),
            bank: self.transfers.bank.unwrap_or(0),
            free_transfers: self
                .transfers
                .free
                .or(self.transfers.limit)
                .unwrap_or(1),
            chips_available,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PickDto {
    element: u32,
    #[serde(default)]
    position: u32,
    #[serde(default)]
    is_captain: bool,
    #[serde(default)]
    is_vice_captain: bool,
    #[serde(default)]
    selling_price: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TransfersDto {
    #[serde(default)]
    bank: Option<i64>,
    /// Older payloads call the allowance `free`, newer ones `limit`.
    #[serde(default)]
    free: Option<u32>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChipDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Serialize)]
struct TransferPayloadDto<'a> {
    entry: u64,
    event: u32,
    transfers: Vec<TransferEntryDto>,
    chip: Option<&'a str>,
    confirmed: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct TransferEntryDto {
    element_in: u32,
    element_out: u32,
    purchase_price: u32,
    selling_price: u32,
}

#[derive(Debug, Serialize)]
struct LineupPayloadDto<'a> {
    picks: &'a [LineupPick],
    chip: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_gameweek_skips_past_deadlines() {
        let events = vec![
            GameweekEvent {
                id: 1,
                deadline_epoch: Some(100),
            },
            GameweekEvent {
                id: 2,
                deadline_epoch: None,
            },
            GameweekEvent {
                id: 3,
                deadline_epoch: Some(300),
            },
        ];
        assert_eq!(next_gameweek(&events, 150), Some((3, 300)));
        assert_eq!(next_gameweek(&events, 50), Some((1, 100)));
        assert_eq!(next_gameweek(&events, 500), None);
    }

    #[test]
    fn test_element_conversion_defaults() {
        let dto: ElementDto = serde_json::from_value(serde_json::json!({
            "id": 7,
            "web_name": "Salah",
            "element_type": 3,
            "team": 12,
            "now_cost": 130,
            "total_points": 200,
            "form": "7.5",
            "status": "a"
        }))
        .unwrap();
        let player = dto.into_player();
        assert_eq!(player.position, Position::Midfielder);
        assert_eq!(player.price, 130);
        assert!((player.form - 7.5).abs() < 1e-9);
        assert_eq!(player.availability, Availability::Fit);

        // Sparse element still converts with neutral defaults
        let sparse: ElementDto = serde_json::from_value(serde_json::json!({"id": 8})).unwrap();
        let player = sparse.into_player();
        assert_eq!(player.form, 0.0);
        assert_eq!(player.availability, Availability::Fit);
        assert_eq!(player.position, Position::Other);
    }

    #[test]
    fn test_my_team_conversion() {
        let dto: MyTeamDto = serde_json::from_value(serde_json::json!({
            "picks": [
                {"element": 1, "position": 1, "is_captain": true, "is_vice_captain": false, "selling_price": 45},
                {"element": 2, "position": 2, "is_captain": false, "is_vice_captain": true}
            ],
            "transfers": {"bank": 25, "limit": 2},
            "chips": [
                {"name": "wildcard", "status": "available"},
                {"name": "bboost", "status": "played"}
            ]
        }))
        .unwrap();
        let team = dto.into_domain();
        assert_eq!(team.bank, 25);
        assert_eq!(team.free_transfers, 2);
        assert_eq!(team.chips_available, vec![ChipType::Wildcard]);
        assert_eq!(team.picks[0].selling_price, Some(45));
        assert_eq!(team.picks[1].selling_price, None);
    }
}
