//! Squad Runner - weekly fantasy squad automation
//!
//! One invocation runs the pipeline once for the target gameweek:
//! 1. Fetches league data and the manager's squad
//! 2. Scores the player pool
//! 3. Asks the reasoning model for a transfer/lineup plan
//! 4. Validates the plan against league rules and the actual budget
//! 5. Applies it idempotently (or reports what would happen in dry-run)

use anyhow::Result;
use clap::Parser;

use squad_runner::client::{FplClient, DEFAULT_API_BASE, DEFAULT_LOGIN_URL};
use squad_runner::config::Settings;
use squad_runner::executor::ExecutionState;
use squad_runner::runner::{PipelineRunner, RunOptions};
use squad_runner::squad::placeholder_squad;

#[derive(Parser)]
#[command(name = "squad-runner")]
#[command(
    about = "Fetch fantasy data, ask the model for decisions, optionally apply them",
    long_about = None
)]
struct Cli {
    /// Target gameweek (default: next upcoming from the API)
    #[arg(long)]
    gw: Option<u32>,

    /// Apply decisions to the remote team (default: dry-run)
    #[arg(long)]
    apply: bool,

    /// Exit with an error if real team data cannot be fetched
    #[arg(long)]
    require_team: bool,

    /// Resolve and print the placeholder squad, then exit (no model key needed)
    #[arg(long)]
    print_placeholder: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    if cli.print_placeholder {
        return print_placeholder().await;
    }

    let settings = Settings::from_env()?;
    if cli.apply && !settings.has_credentials() {
        anyhow::bail!("FPL_EMAIL and FPL_PASSWORD are required with --apply");
    }

    let runner = PipelineRunner::new(settings)?;
    let report = runner
        .run(&RunOptions {
            gameweek: cli.gw,
            apply: cli.apply,
            require_team: cli.require_team,
        })
        .await?;

    if report.outcome.state == ExecutionState::Failed {
        anyhow::bail!("execution failed: {}", report.outcome.message);
    }
    Ok(())
}

async fn print_placeholder() -> Result<()> {
    let api_base =
        std::env::var("FPL_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    let login_url =
        std::env::var("FPL_LOGIN_URL").unwrap_or_else(|_| DEFAULT_LOGIN_URL.to_string());
    let client = FplClient::new(&api_base, &login_url)?;
    let bootstrap = client.bootstrap().await?;
    let squad = placeholder_squad(&bootstrap.players);

    println!("Placeholder squad:");
    println!("  Starting XI:");
    for (slot, member) in squad.starters().iter().enumerate() {
        println!(
            "    {}. {} (id={}, {})",
            slot + 1,
            member.player.web_name,
            member.player.id,
            member.player.position
        );
    }
    println!("  Bench:");
    for (slot, member) in squad.bench().iter().enumerate() {
        println!(
            "    {}. {} (id={}, {})",
            slot + 1,
            member.player.web_name,
            member.player.id,
            member.player.position
        );
    }
    Ok(())
}
