//! Pipeline runner
//!
//! One sequential pass per invocation: fetch -> score -> propose ->
//! validate -> execute -> report. Each stage receives the previous stage's
//! value; nothing is shared or mutated across stages, so repeated runs in
//! the same gameweek can only interact through the remote service itself.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use tracing::{info, warn};

use crate::advisor::Advisor;
use crate::client::{next_gameweek, FplClient, MyTeam};
use crate::config::Settings;
use crate::decision::ValidatedDecision;
use crate::executor::{ExecutionOutcome, Executor};
use crate::report;
use crate::scoring;
use crate::squad::{placeholder_squad, Squad};
use crate::types::{Bootstrap, Fixture, GameweekContext, Player, Team};
use crate::validator;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Target gameweek; next upcoming when unset.
    pub gameweek: Option<u32>,
    /// Submit to the remote service instead of stopping after the
    /// idempotency check.
    pub apply: bool,
    /// Treat a squad-fetch failure as fatal instead of falling back to the
    /// placeholder squad.
    pub require_team: bool,
}

/// Everything a caller needs to render or exit on.
#[derive(Debug)]
pub struct RunReport {
    pub gameweek: u32,
    pub decision: ValidatedDecision,
    pub outcome: ExecutionOutcome,
    pub summary: String,
}

pub struct PipelineRunner {
    settings: Settings,
    client: FplClient,
    advisor: Advisor,
}

impl PipelineRunner {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let api_key = settings
            .gemini_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GOOGLE_AI_API_KEY not set; set it in .env or the environment"))?;
        let advisor = Advisor::new(&settings.gemini_base_url, api_key, &settings.gemini_model)?;

        let mut client = FplClient::new(&settings.api_base_url, &settings.login_url)?;
        if let Some(cookie) = &settings.cookie {
            client = client.with_cookie_header(cookie);
        }

        Ok(Self {
            settings,
            client,
            advisor,
        })
    }

    /// Run the full pipeline once.
    pub async fn run(&self, options: &RunOptions) -> anyhow::Result<RunReport> {
        let bootstrap = self.client.bootstrap().await?;

        let (gameweek, deadline_epoch) = match options.gameweek {
            Some(gw) => (gw, None),
            None => {
                let (gw, deadline) = next_gameweek(&bootstrap.events, Utc::now().timestamp())
                    .ok_or_else(|| anyhow!("no upcoming gameweek (season may have ended)"))?;
                (gw, Some(deadline))
            }
        };
        info!("using gameweek {gameweek}");

        let fixtures = self.client.fixtures(gameweek).await?;
        let scored = scoring::score_players(&bootstrap.players, &bootstrap.teams, &fixtures, gameweek);

        let squad = self.load_squad(&bootstrap, options).await?;
        if squad.placeholder && options.apply {
            warn!("placeholder squad in use; transfers will not be submitted");
        }

        let ctx = GameweekContext {
            gameweek,
            deadline_epoch,
        };
        let fixtures_summary = fixture_summary(&bootstrap.teams, &fixtures);
        let proposal = self
            .advisor
            .propose(&scored, &squad, &ctx, &fixtures_summary)
            .await
            .context("could not obtain a usable proposal")?;

        let decision = validator::validate(&proposal, &squad, &scored)
            .map_err(|rejection| anyhow!("{rejection}"))?;
        info!(
            "plan {} validated: {} pair(s), {} dropped, captain {}",
            decision.plan_id,
            decision.pairs.len(),
            decision.dropped.len(),
            decision.captain
        );

        // A placeholder squad is demo data; never mutate the real team from it.
        let apply = options.apply && !squad.placeholder;
        let executor = Executor::new(&self.client, self.settings.manager_id);
        let outcome = executor.execute(&decision, gameweek, apply).await;

        let names: HashMap<u32, String> = bootstrap
            .players
            .iter()
            .map(|p| (p.id, p.web_name.clone()))
            .collect();
        let summary = report::build_summary(&decision, &outcome, &names);
        info!("\n{summary}");

        Ok(RunReport {
            gameweek,
            decision,
            outcome,
            summary,
        })
    }

    /// Fetch the real squad when possible; otherwise the placeholder, unless
    /// strict mode makes that fatal.
    async fn load_squad(
        &self,
        bootstrap: &Bootstrap,
        options: &RunOptions,
    ) -> anyhow::Result<Squad> {
        let players_by_id: HashMap<u32, &Player> =
            bootstrap.players.iter().map(|p| (p.id, p)).collect();

        let fetched: Result<MyTeam, _> = async {
            if let (Some(email), Some(password)) = (&self.settings.email, &self.settings.password)
            {
                self.client.login(email, password).await?;
            } else {
                warn!("FPL_EMAIL/FPL_PASSWORD not set; trying my-team without login");
            }
            self.client.my_team(self.settings.manager_id).await
        }
        .await;

        match fetched {
            Ok(team) => {
                let squad = Squad::from_my_team(&team, &players_by_id)?;
                info!(
                    "squad loaded: {} players, bank {}, {} free transfer(s)",
                    squad.members.len(),
                    squad.bank,
                    squad.free_transfers
                );
                Ok(squad)
            }
            Err(err) if options.require_team => {
                bail!("real team data could not be fetched and --require-team is set: {err}")
            }
            Err(err) => {
                warn!("could not fetch my-team ({err}); using placeholder squad for dry-run");
                Ok(placeholder_squad(&bootstrap.players))
            }
        }
    }
}

/// Human-readable fixture list for the prompt and the report.
pub fn fixture_summary(teams: &[Team], fixtures: &[Fixture]) -> String {
    let short_name = |id: u32| {
        teams
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.short_name.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let mut summary = String::new();
    for fixture in fixtures {
        summary.push_str(&format!(
            "  {} vs {}\n",
            short_name(fixture.home_team),
            short_name(fixture.away_team)
        ));
    }
    summary
}
