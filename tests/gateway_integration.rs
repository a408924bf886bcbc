use std::time::Duration;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

use nyamix_tickets::AppState;
use nyamix_tickets::api::auth::LoginRequest;
use nyamix_tickets::api::client::{ApiError, AuthScheme, Parsed};
use nyamix_tickets::session::Session;

mod support;

#[tokio::test]
async fn requests_carry_raw_token_when_logged_in() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/events/categories/")
            .header("Authorization", support::TOKEN);
        then.status(200)
            .json_body(json!([{ "id": 1, "name": "Music" }, { "id": 2, "name": "Sports" }]));
    });

    let state = support::authed_state(&server);
    let categories = state.events.categories().await.expect("categories");

    mock.assert();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[1].name, "Sports");
}

#[tokio::test]
async fn token_scheme_prefixes_header() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/events/categories/")
            .header("Authorization", format!("Token {}", support::TOKEN));
        then.status(200).json_body(json!([]));
    });

    let mut config = support::test_config(&server);
    config.auth_scheme = AuthScheme::Token;
    let state = AppState::new(config, Session::in_memory()).expect("state");
    state.session.login(support::TOKEN, None).expect("login");

    state.events.categories().await.expect("categories");
    mock.assert();
}

#[tokio::test]
async fn anonymous_requests_send_no_authorization() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/events/home-events/")
            .header_missing("Authorization");
        then.status(200).json_body(json!([support::event_json(
            7,
            1,
            vec![support::ticket_type_json(11, "VIP", json!("150.00"), 30)]
        )]));
    });

    let state = support::build_state(&server);
    let events = state.events.home_events().await.expect("events");

    mock.assert();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].ticket_types[0].price.to_string(), "150.00");
}

#[tokio::test]
async fn error_body_message_wins() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/events/tickets/");
        then.status(400)
            .json_body(json!({ "message": "Ticket sold out", "detail": "ignored" }));
    });

    let state = support::authed_state(&server);
    let err = state.events.user_tickets().await.unwrap_err();

    assert_eq!(err.message(), "Ticket sold out");
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn error_detail_is_used_without_message() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/events/tickets/");
        then.status(401)
            .json_body(json!({ "detail": "Invalid token." }));
    });

    let state = support::authed_state(&server);
    let err = state.events.user_tickets().await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Server {
            status: 401,
            message: "Invalid token.".to_string()
        }
    );
}

#[tokio::test]
async fn field_errors_are_joined() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/events/tickets/");
        then.status(400)
            .json_body(json!({ "quantity": ["Not enough tickets."] }));
    });

    let state = support::authed_state(&server);
    let err = state.events.purchase_ticket(11, 3).await.unwrap_err();

    assert_eq!(err.message(), "Not enough tickets.");
}

#[tokio::test]
async fn json_error_without_known_fields_is_generic() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/events/categories/");
        then.status(500).json_body(json!({ "code": 17 }));
    });

    let state = support::build_state(&server);
    let err = state.events.categories().await.unwrap_err();

    assert_eq!(err.message(), "An error occurred");
}

#[tokio::test]
async fn text_error_body_is_passed_through() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/events/categories/");
        then.status(502)
            .header("content-type", "text/plain")
            .body("Bad gateway");
    });

    let state = support::build_state(&server);
    let err = state.events.categories().await.unwrap_err();

    assert_eq!(err.message(), "Bad gateway");
}

#[tokio::test]
async fn empty_error_body_reports_status() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/events/categories/");
        then.status(500);
    });

    let state = support::build_state(&server);
    let err = state.events.categories().await.unwrap_err();

    assert_eq!(err.message(), "HTTP 500");
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/events/home-events/");
        then.status(200)
            .json_body(json!([]))
            .delay(Duration::from_millis(1500));
    });

    let state = support::build_state(&server);
    let err = state.events.home_events().await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.message(), "Request timeout - please try again");
}

#[tokio::test]
async fn text_and_empty_success_bodies_are_decoded() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/ping");
        then.status(200)
            .header("content-type", "text/plain; charset=utf-8")
            .body("pong");
    });
    server.mock(|when, then| {
        when.method(GET).path("/nothing");
        then.status(204);
    });

    let state = support::build_state(&server);
    let client = state.events.client();

    assert_eq!(client.get("/ping").await.unwrap(), Parsed::Text("pong".to_string()));
    assert_eq!(client.get("/nothing").await.unwrap(), Parsed::Empty);
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/events/categories/");
        then.status(200)
            .header("content-type", "application/json")
            .body("{not json");
    });

    let state = support::build_state(&server);
    let err = state.events.categories().await.unwrap_err();

    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn login_uses_version_param_and_stores_token() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/auth/token/login/")
            .query_param("version", "v1")
            .json_body(json!({ "username": "mwila", "password": "secret1" }));
        then.status(200).json_body(json!({
            "auth_token": "fresh-token",
            "user": { "id": 5, "email": "mwila@example.com", "username": "mwila" }
        }));
    });
    let me = server.mock(|when, then| {
        when.method(GET)
            .path("/auth/users/me/")
            .query_param("version", "v1")
            .header("Authorization", "fresh-token");
        then.status(200).json_body(json!({
            "id": "5", "email": "mwila@example.com", "username": "mwila"
        }));
    });

    let state = support::build_state(&server);
    let resp = state
        .auth
        .login(&LoginRequest {
            username: "mwila".to_string(),
            password: "secret1".to_string(),
        })
        .await
        .expect("login");

    mock.assert();
    assert_eq!(resp.auth_token, "fresh-token");
    assert!(state.session.is_authenticated());
    assert_eq!(state.session.current_user().map(|u| u.id), Some("5".to_string()));

    let user = state.auth.me().await.expect("me");
    me.assert();
    assert_eq!(user.username, "mwila");
}

#[tokio::test]
async fn logout_drops_authorization_header() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/events/categories/")
            .header_missing("Authorization");
        then.status(200).json_body(json!([]));
    });

    let state = support::authed_state(&server);
    state.auth.logout();
    state.events.categories().await.expect("categories");

    mock.assert();
    assert!(!state.session.is_authenticated());
}
