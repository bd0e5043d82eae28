//! Full-pipeline test: mocked fantasy API + mocked reasoning service
//!
//! Exercises fetch -> score -> propose -> validate -> execute in dry-run,
//! including the placeholder-squad fallback when my-team cannot be fetched.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use squad_runner::{ExecutionState, PipelineRunner, RunOptions, Settings};

const GAMEWEEK: u32 = 5;

/// 15 elements forming a legal squad shape (2 GK, 5 DEF, 5 MID, 3 FWD),
/// one club each.
fn bootstrap_body() -> serde_json::Value {
    let mut elements = Vec::new();
    let mut teams = Vec::new();
    for id in 1u32..=15 {
        let element_type = match id {
            1..=2 => 1,
            3..=7 => 2,
            8..=12 => 3,
            _ => 4,
        };
        elements.push(json!({
            "id": id,
            "web_name": format!("Player{id}"),
            "element_type": element_type,
            "team": id,
            "now_cost": 50,
            "total_points": id * 10,
            "form": "3.0",
            "status": "a"
        }));
        teams.push(json!({
            "id": id,
            "short_name": format!("T{id}"),
            "strength_overall_home": 1200,
            "strength_overall_away": 1200
        }));
    }
    json!({
        "events": [{"id": GAMEWEEK, "deadline_time_epoch": 4102444800i64}],
        "teams": teams,
        "elements": elements
    })
}

fn settings(server: &MockServer) -> Settings {
    Settings {
        manager_id: 4242,
        email: None,
        password: None,
        cookie: None,
        gemini_api_key: Some("test-key".to_string()),
        gemini_model: "test-model".to_string(),
        api_base_url: server.uri(),
        login_url: format!("{}/login/", server.uri()),
        gemini_base_url: server.uri(),
    }
}

async fn mount_game_endpoints(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/bootstrap-static/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bootstrap_body()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fixtures/"))
        .and(query_param("event", GAMEWEEK.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"event": GAMEWEEK, "team_h": 1, "team_a": 2}
        ])))
        .mount(server)
        .await;
    // Authenticated squad fetch is rejected: the pipeline falls back to the
    // placeholder squad.
    Mock::given(method("GET"))
        .and(path("/my-team/4242/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entry/4242/transfers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn mount_reasoning_endpoint(server: &MockServer, reply_text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"parts": [{"text": reply_text}]}}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_dry_run_with_placeholder_squad() {
    let server = MockServer::start().await;
    mount_game_endpoints(&server).await;
    // Markdown-fenced reply exercises the tolerant JSON extraction.
    mount_reasoning_endpoint(
        &server,
        "Thinking it over.\n```json\n{\"transfers\": [], \"captain_id\": null, \"vice_captain_id\": null, \"chip\": \"none\", \"reasoning\": \"hold steady\"}\n```",
    )
    .await;

    let runner = PipelineRunner::new(settings(&server)).unwrap();
    let report = runner
        .run(&RunOptions {
            gameweek: Some(GAMEWEEK),
            apply: false,
            require_team: false,
        })
        .await
        .unwrap();

    assert_eq!(report.gameweek, GAMEWEEK);
    assert_eq!(report.outcome.state, ExecutionState::Checking);
    assert!(report.outcome.dry_run);
    assert!(report.decision.pairs.is_empty());
    // Captain was repaired onto a real starter even though none was proposed.
    assert!(report.decision.starters.contains(&report.decision.captain));
    assert!(report.summary.contains("Dry-Run (No Changes Made)"));
    assert!(report.summary.contains("hold steady"));
}

#[tokio::test]
async fn test_require_team_turns_fetch_failure_into_error() {
    let server = MockServer::start().await;
    mount_game_endpoints(&server).await;
    mount_reasoning_endpoint(&server, "{}").await;

    let runner = PipelineRunner::new(settings(&server)).unwrap();
    let err = runner
        .run(&RunOptions {
            gameweek: Some(GAMEWEEK),
            apply: false,
            require_team: true,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("--require-team"));
}

#[tokio::test]
async fn test_unparseable_reasoning_reply_is_fatal() {
    let server = MockServer::start().await;
    mount_game_endpoints(&server).await;
    mount_reasoning_endpoint(&server, "Sorry, I cannot help with squads.").await;

    let runner = PipelineRunner::new(settings(&server)).unwrap();
    let err = runner
        .run(&RunOptions {
            gameweek: Some(GAMEWEEK),
            apply: false,
            require_team: false,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("proposal"));
}
