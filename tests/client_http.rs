//! HTTP-level client tests against a mock server

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use squad_runner::decision::PricedTransfer;
use squad_runner::{Availability, FetchError, FplClient, GameService, Position};

fn client_for(server: &MockServer) -> FplClient {
    FplClient::new(&server.uri(), &format!("{}/login/", server.uri())).unwrap()
}

#[tokio::test]
async fn test_bootstrap_parses_players_teams_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bootstrap-static/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                {"id": 1, "deadline_time_epoch": 1700000000},
                {"id": 2, "deadline_time_epoch": 1700600000}
            ],
            "teams": [
                {"id": 1, "short_name": "ARS", "strength_overall_home": 1300, "strength_overall_away": 1320}
            ],
            "elements": [
                {"id": 7, "web_name": "Saka", "element_type": 3, "team": 1, "now_cost": 90,
                 "total_points": 120, "form": "6.1", "status": "a"},
                {"id": 8, "web_name": "Partey", "element_type": 3, "team": 1, "now_cost": 50,
                 "total_points": 40, "status": "i", "news": "Knee injury",
                 "chance_of_playing_this_round": 25}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let bootstrap = client.bootstrap().await.unwrap();

    assert_eq!(bootstrap.events.len(), 2);
    assert_eq!(bootstrap.teams[0].overall_strength(), 2620.0);
    assert_eq!(bootstrap.players.len(), 2);

    let saka = &bootstrap.players[0];
    assert_eq!(saka.position, Position::Midfielder);
    assert!((saka.form - 6.1).abs() < 1e-9);
    assert_eq!(saka.availability, Availability::Fit);

    let partey = &bootstrap.players[1];
    assert_eq!(partey.availability, Availability::Injured);
    assert_eq!(partey.chance_of_playing, Some(25));
    assert_eq!(partey.news, "Knee injury");
}

#[tokio::test]
async fn test_fixtures_filters_by_event_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fixtures/"))
        .and(query_param("event", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"event": 5, "team_h": 1, "team_a": 2},
            {"event": 5, "team_h": 3}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fixtures = client.fixtures(5).await.unwrap();
    // The fixture missing a side is dropped during normalization.
    assert_eq!(fixtures.len(), 1);
    assert_eq!(fixtures[0].home_team, 1);
    assert_eq!(fixtures[0].away_team, 2);
}

#[tokio::test]
async fn test_my_team_auth_rejection_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/my-team/4242/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.my_team(4242).await.unwrap_err();
    assert!(matches!(err, FetchError::Auth { status: 403, .. }));
}

#[tokio::test]
async fn test_my_team_parses_bank_and_chips() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/my-team/4242/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "picks": [
                {"element": 7, "position": 1, "is_captain": false, "is_vice_captain": false,
                 "selling_price": 45, "purchase_price": 44}
            ],
            "transfers": {"bank": 23, "limit": 1},
            "chips": [
                {"name": "wildcard", "status": "available"},
                {"name": "3xc", "status": "unavailable"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let team = client.my_team(4242).await.unwrap();
    assert_eq!(team.bank, 23);
    assert_eq!(team.free_transfers, 1);
    assert_eq!(team.picks[0].selling_price, Some(45));
    assert_eq!(team.chips_available.len(), 1);
}

#[tokio::test]
async fn test_transfer_history_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entry/4242/transfers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"event": 3, "element_in": 10, "element_out": 11},
            {"event": 4, "element_in": 12, "element_out": 13}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let history = client.transfer_history(4242).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].event, Some(3));
}

#[tokio::test]
async fn test_submit_transfer_pair_posts_validate_then_confirm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transfers/"))
        .and(body_partial_json(json!({
            "entry": 4242,
            "event": 8,
            "transfers": [
                {"element_in": 101, "element_out": 2, "purchase_price": 55, "selling_price": 50}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2) // validate pass, then confirmed pass
        .mount(&server)
        .await;

    let client = client_for(&server);
    let pair = PricedTransfer {
        out_id: 2,
        in_id: 101,
        selling_price: 50,
        purchase_price: 55,
    };
    client
        .submit_transfer_pair(4242, 8, &pair, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_submit_transfer_pair_surfaces_rejection_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transfers/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"details": "insufficient funds"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let pair = PricedTransfer {
        out_id: 2,
        in_id: 101,
        selling_price: 50,
        purchase_price: 55,
    };
    let err = client
        .submit_transfer_pair(4242, 8, &pair, None)
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, body, .. } => {
            assert_eq!(status, 400);
            assert!(body.contains("insufficient funds"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_lineup_posts_picks_and_chip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/my-team/4242/"))
        .and(body_partial_json(json!({
            "chip": "bboost",
            "picks": [
                {"element": 1, "position": 1, "is_captain": true, "is_vice_captain": false}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let picks = vec![squad_runner::LineupPick {
        element: 1,
        position: 1,
        is_captain: true,
        is_vice_captain: false,
    }];
    client
        .submit_lineup(4242, &picks, Some("bboost"))
        .await
        .unwrap();
}
