//! HTTP surface tests: the router driven with `oneshot`, Google mocked with wiremock.

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use calhook_providers::google::{GoogleConfig, GoogleEndpoints, OAuthCredentials};
use calhook_server::{
    AppState, CHANNEL_ID_HEADER, CHANNEL_TOKEN_HEADER, RESOURCE_STATE_HEADER, RetryPolicy,
    ServerConfig, app,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBHOOK_TOKEN: &str = "test-webhook-token";
const EVENTS_PATH: &str = "/calendar/v3/calendars/primary/events";

fn state_for(server: &MockServer) -> AppState {
    let google = GoogleConfig::new(
        OAuthCredentials::new("client.apps.googleusercontent.com", "secret"),
        "http://localhost:3000/callback",
    )
    .with_endpoints(GoogleEndpoints::with_base(&server.uri()))
    .with_timeout(Duration::from_secs(2));

    let config = ServerConfig::default()
        .with_public_url("https://hooks.example")
        .with_webhook_token(WEBHOOK_TOKEN)
        .with_request_timeout(Duration::from_secs(2))
        .with_retry(RetryPolicy::default().with_backoff(
            Duration::from_millis(1),
            Duration::from_millis(2),
            2.0,
        ));

    AppState::new(config, google).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn notification(token: &str, resource_state: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(CHANNEL_TOKEN_HEADER, token)
        .header(RESOURCE_STATE_HEADER, resource_state)
        .header(CHANNEL_ID_HEADER, "chan-1")
        .body(Body::empty())
        .unwrap()
}

fn state_param(location: &str) -> String {
    url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

async fn mount_google(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.a",
            "refresh_token": "1//r",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/watch", EVENTS_PATH)))
        .and(body_string_contains("https://hooks.example/webhook"))
        .and(body_string_contains(WEBHOOK_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "api#channel",
            "id": "chan-1",
            "resourceId": "res-1",
            "resourceUri": "https://www.googleapis.com/calendar/v3/calendars/primary/events",
            "expiration": "4102444800000"
        })))
        .mount(server)
        .await;
}

/// Walks `/redirect` and `/callback` so the state holds tokens and a channel.
async fn authorize(app: &Router, server: &MockServer) {
    mount_google(server).await;

    let response = app.clone().oneshot(get("/redirect")).await.unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let nonce = state_param(&location);

    let (status, body) = send(app, get(&format!("/callback?code=auth-code&state={}", nonce))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body.contains("chan-1"));
}

#[tokio::test]
async fn index_links_to_redirect() {
    let server = MockServer::start().await;
    let app = app(state_for(&server));

    let (status, body) = send(&app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("href=\"/redirect\""));
    assert!(body.contains("unauthenticated"));
}

#[tokio::test]
async fn redirect_points_at_consent_screen() {
    let server = MockServer::start().await;
    let app = app(state_for(&server));

    let response = app.clone().oneshot(get("/redirect")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/auth?", server.uri())));
    assert!(location.contains("access_type=offline"));
    assert_eq!(state_param(location).len(), 43);
}

#[tokio::test]
async fn callback_with_wrong_state_is_forbidden() {
    let server = MockServer::start().await;
    let app = app(state_for(&server));
    app.clone().oneshot(get("/redirect")).await.unwrap();

    let (status, body) = send(&app, get("/callback?code=c&state=forged")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Invalid state");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn callback_without_started_flow_is_forbidden() {
    let server = MockServer::start().await;
    let app = app(state_for(&server));

    let (status, _) = send(&app, get("/callback?code=c&state=anything")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn consent_denied_is_bad_request() {
    let server = MockServer::start().await;
    let app = app(state_for(&server));
    let response = app.clone().oneshot(get("/redirect")).await.unwrap();
    let nonce = state_param(response.headers()[header::LOCATION].to_str().unwrap());

    let (status, _) = send(
        &app,
        get(&format!("/callback?error=access_denied&state={}", nonce)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn callback_registers_channel() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());

    authorize(&app, &server).await;

    assert!(state.auth.is_authorized());
    let (status, body) = send(&app, get("/channels")).await;
    assert_eq!(status, StatusCode::OK);
    let channels: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(channels.as_array().unwrap().len(), 1);
    assert_eq!(channels[0]["channelId"], "chan-1");
    assert_eq!(channels[0]["resourceId"], "res-1");
    assert_eq!(channels[0]["address"], "https://hooks.example/webhook");
    assert!(channels[0].get("token").is_none());
}

#[tokio::test]
async fn invalid_webhook_token_never_reaches_reconciler() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());
    authorize(&app, &server).await;
    let before = server.received_requests().await.unwrap().len();

    let (status, body) = send(&app, notification("wrong-token", "exists")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Invalid webhook token");

    let missing = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(RESOURCE_STATE_HEADER, "exists")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, missing).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(server.received_requests().await.unwrap().len(), before);
    assert!(state.log.is_empty());
}

#[tokio::test]
async fn sync_handshake_appends_nothing() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());
    authorize(&app, &server).await;
    let before = server.received_requests().await.unwrap().len();

    let (status, _) = send(&app, notification(WEBHOOK_TOKEN, "sync")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.received_requests().await.unwrap().len(), before);
    assert!(state.log.is_empty());
}

#[tokio::test]
async fn notification_appends_enriched_batch() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());
    authorize(&app, &server).await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "evt-1"}, {"id": "evt-2", "status": "cancelled"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/evt-1", EVENTS_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt-1",
            "status": "confirmed",
            "summary": "Consultation",
            "description": "Booked by: Ada Lovelace ada@example.com",
            "start": {"dateTime": "2026-10-20T10:00:00+02:00"},
            "end": {"dateTime": "2026-10-20T10:30:00+02:00"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/evt-2", EVENTS_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt-2",
            "status": "cancelled"
        })))
        .mount(&server)
        .await;

    let (status, _) = send(&app, notification(WEBHOOK_TOKEN, "exists")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/events")).await;
    assert_eq!(status, StatusCode::OK);
    let batches: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(batches.as_array().unwrap().len(), 1);
    let events = batches[0]["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["sourceId"], "evt-1");
    assert_eq!(events[0]["bookedBy"]["name"], "Ada Lovelace");
    assert_eq!(events[0]["bookedBy"]["email"], "ada@example.com");
    assert_eq!(events[1]["status"], "cancelled");
    assert!(batches[0]["timestamp"].as_str().unwrap().contains(" | "));
}

#[tokio::test]
async fn provider_failure_still_acknowledges_notification() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());
    authorize(&app, &server).await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let (status, _) = send(&app, notification(WEBHOOK_TOKEN, "exists")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(state.log.is_empty());
}

#[tokio::test]
async fn valid_token_before_authorization_is_acknowledged() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());

    let (status, _) = send(&app, notification(WEBHOOK_TOKEN, "exists")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_events_clears_log() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());
    state
        .log
        .append(calhook_core::EventBatch::now(vec![calhook_core::EnrichedEvent::new("a")]))
        .unwrap();
    state
        .log
        .append(calhook_core::EventBatch::now(vec![calhook_core::EnrichedEvent::new("b")]))
        .unwrap();

    let request = Request::builder()
        .method("DELETE")
        .uri("/events")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, get("/events")).await;
    assert_eq!(body, "[]");
}

#[tokio::test]
async fn delete_channels_stops_each_channel() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());
    authorize(&app, &server).await;

    Mock::given(method("POST"))
        .and(path("/calendar/v3/channels/stop"))
        .and(body_string_contains("\"resourceId\":\"res-1\""))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/channels")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["stopped"], json!(["chan-1"]));
    assert_eq!(report["failed"], json!([]));
    assert!(state.channels.active_channels().is_empty());
}

#[tokio::test]
async fn post_channels_before_authorization_is_unauthorized() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/channels")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state.channels.active_channels().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn post_channels_recovers_from_failed_callback_registration() {
    let server = MockServer::start().await;
    let state = state_for(&server);
    let app = app(state.clone());

    Mock::given(method("POST"))
        .and(path(format!("{}/watch", EVENTS_PATH)))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_google(&server).await;

    let response = app.clone().oneshot(get("/redirect")).await.unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let nonce = state_param(&location);
    let (status, _) = send(&app, get(&format!("/callback?code=auth-code&state={}", nonce))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(state.auth.is_authorized());
    assert!(state.channels.active_channels().is_empty());

    let request = Request::builder()
        .method("POST")
        .uri("/channels")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let channel: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(channel["channelId"], "chan-1");
    assert_eq!(channel["address"], "https://hooks.example/webhook");
    assert_eq!(state.channels.active_channels().len(), 1);
}
