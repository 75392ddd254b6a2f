//! Client behaviour against a mock server.

use serde_json::json;
use tempfile::TempDir;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tlx_client::{
    AdsApi, ApiClient, ClientError, DashboardPoller, PollerSettings, ReminderPoller, TokenStore, WorkshopApi,
    DEFAULT_TIMEOUT,
};
use tokio::sync::watch;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, dir: &TempDir, base_path: &str) -> ApiClient {
    let store = TokenStore::new(dir.path().join("session.json"));
    ApiClient::new(&format!("{}{base_path}", server.uri()), store, DEFAULT_TIMEOUT).unwrap()
}

fn appointment(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "customer_id": 1,
        "vehicle_id": null,
        "service_order_id": null,
        "title": "Oil change",
        "notes": null,
        "status": "scheduled",
        "scheduled_at": "2026-03-02T10:00:00Z",
        "duration_minutes": 30,
        "reminded_at": null
    })
}

#[tokio::test]
async fn login_stores_token_and_sends_bearer() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "owner@example.com", "password": "secret123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1", "tenant_id": 4, "role": "admin"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "email": "owner@example.com", "tenant_id": 4, "role": "admin"
        })))
        .mount(&server)
        .await;

    let api = AdsApi::new(client(&server, &dir, ""));
    let session = api.login("owner@example.com", "secret123", None).await.unwrap();
    assert_eq!(session.tenant_id, Some(4));
    assert_eq!(api.client().tokens().token().as_deref(), Some("tok-1"));

    let me = api.me().await.unwrap();
    assert_eq!(me.email, "owner@example.com");
}

#[tokio::test]
async fn unauthorized_clears_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "unauthorized", "message": "Invalid token"
        })))
        .mount(&server)
        .await;

    let api = AdsApi::new(client(&server, &dir, ""));
    api.client().tokens().save("stale").unwrap();

    let err = api.me().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(ref m) if m == "Invalid token"));
    assert!(api.client().tokens().load().is_none());
}

#[tokio::test]
async fn api_errors_carry_server_message() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/saas/plan"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "forbidden", "message": "Insufficient role"
        })))
        .mount(&server)
        .await;

    let api = AdsApi::new(client(&server, &dir, ""));
    api.client().tokens().save("tok").unwrap();
    let err = api.plan().await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.to_string(), "Insufficient role (HTTP 403)");
    // Only a 401 logs out.
    assert!(api.client().tokens().load().is_some());
}

#[tokio::test]
async fn fetch_all_walks_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let full: Vec<_> = (1..=200).map(|id| json!({ "id": id })).collect();
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .and(query_param("offset", "200"))
        .and(query_param("q", "ana"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 201 }])))
        .mount(&server)
        .await;

    let api = AdsApi::new(client(&server, &dir, ""));
    let rows = api.contacts(Some("ana")).await.unwrap();
    assert_eq!(rows.len(), 201);
    assert_eq!(rows[200]["id"], 201);
}

#[tokio::test]
async fn poller_marks_and_dedups() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/appointments/reminders"))
        .and(query_param("within_minutes", "15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment(7)])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/appointments/7/mark-reminded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let api = WorkshopApi::new(client(&server, &dir, "/api"));
    let mut poller = ReminderPoller::new(PollerSettings {
        mark_reminded: true,
        ..PollerSettings::default()
    });

    let first = poller.poll_once(&api).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].title, "Oil change");
    let second = poller.poll_once(&api).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn dashboard_watch_reports_changes_until_shutdown() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clicks": 5, "conversions": 1, "impressions_proxy": 5, "ctr_proxy": 0.2,
            "ts": "2026-03-02T10:00:00+00:00"
        })))
        .mount(&server)
        .await;

    let api = AdsApi::new(client(&server, &dir, ""));
    api.client().tokens().save("tok").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = watch::channel(false);
    let sink = seen.clone();
    let watcher = tokio::spawn(async move {
        DashboardPoller::new(Duration::from_millis(20))
            .run(&api, rx, |snapshot| sink.lock().unwrap().push(snapshot["clicks"].clone()))
            .await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), watcher)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(server.received_requests().await.unwrap().len() >= 2);
    assert_eq!(*seen.lock().unwrap(), vec![json!(5)]);
}

#[tokio::test]
async fn dashboard_watch_stops_when_session_expires() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "unauthorized", "message": "Token expired"
        })))
        .mount(&server)
        .await;

    let api = AdsApi::new(client(&server, &dir, ""));
    let (_tx, rx) = watch::channel(false);
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        DashboardPoller::new(Duration::from_millis(20)).run(&api, rx, |_| {}),
    )
    .await
    .unwrap();
    assert!(matches!(result, Err(ClientError::Unauthorized(_))));
}
