//! Service-shop API flows through the full router.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tlx_core::time::{self, to_iso};
use tlx_core::AppConfig;
use tlx_workshop::{workshop_router, WorkshopState};
use tower::ServiceExt;

fn state() -> WorkshopState {
    let mut config = AppConfig::default();
    config.auth.pwd_iterations = 1_000;
    WorkshopState::new(&config)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = login(app, "admin@tlxauto.local", "admin123").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["role"], "admin");
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_on_both_prefixes() {
    let app = workshop_router(state());
    for uri in ["/api/health", "/health"] {
        let (status, body) = call(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["server_time"].is_string());
    }
}

#[tokio::test]
async fn login_rules_and_user_admin() {
    let state = state();
    let app = workshop_router(state.clone());

    let (status, _) = login(&app, "admin@tlxauto.local", "wrong-pass").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = admin_token(&app).await;
    let (status, op) = call(
        &app,
        Method::POST,
        "/api/auth/users",
        Some(&admin),
        Some(json!({ "email": "Op@TlxAuto.local", "password": "secret1", "role": "operator" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{op}");
    assert_eq!(op["email"], "op@tlxauto.local");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/users",
        Some(&admin),
        Some(json!({ "email": "op@tlxauto.local", "password": "secret1", "role": "operator" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = login(&app, "op@tlxauto.local", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    let operator = body["access_token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::GET, "/api/auth/users", Some(&operator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, users) = call(&app, Method::GET, "/api/auth/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);
    assert_eq!(users[0]["email"], "op@tlxauto.local");

    // Deactivation locks out both login and existing tokens.
    let op_id = op["id"].as_i64().unwrap();
    state.store.set_user_active(op_id, false);
    let (status, _) = login(&app, "op@tlxauto.local", "secret1").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&operator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customer_vehicle_order_flow() {
    let app = workshop_router(state());
    let token = admin_token(&app).await;
    let t = Some(token.as_str());

    let (status, customer) = call(&app, Method::POST, "/customers", t, Some(json!({ "name": "Ana" }))).await;
    assert_eq!(status, StatusCode::OK);
    let cid = customer["id"].as_i64().unwrap();

    let (status, _) = call(&app, Method::PATCH, &format!("/api/customers/{cid}"), t, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, updated) = call(
        &app,
        Method::PATCH,
        &format!("/api/customers/{cid}"),
        t,
        Some(json!({ "phone": "+55 11 99999-0000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Ana");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/vehicles",
        t,
        Some(json!({ "customer_id": 999, "plate": "ABC1D23", "model": "Gol" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, vehicle) = call(
        &app,
        Method::POST,
        "/api/vehicles",
        t,
        Some(json!({ "customer_id": cid, "plate": "ABC1D23", "model": "Gol", "year": 2014 })),
    )
    .await;
    let vid = vehicle["id"].as_i64().unwrap();

    let (_, other) = call(&app, Method::POST, "/api/customers", t, Some(json!({ "name": "Bruno" }))).await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/service-orders",
        t,
        Some(json!({ "customer_id": other["id"], "vehicle_id": vid, "description": "Brakes" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = call(
        &app,
        Method::POST,
        "/api/service-orders",
        t,
        Some(json!({ "customer_id": cid, "vehicle_id": vid, "description": "Brakes", "total_cents": 42000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "open");
    let oid = order["id"].as_i64().unwrap();

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/api/service-orders/{oid}"),
        t,
        Some(json!({ "status": "done" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stats) = call(&app, Method::GET, "/api/stats", t, None).await;
    assert_eq!(stats["customers"], 2);
    assert_eq!(stats["service_orders_done"], 1);
    assert_eq!(stats["revenue_done_cents"], 42000);

    let (_, listed) = call(&app, Method::GET, &format!("/api/service-orders?vehicle_id={vid}"), t, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::DELETE, &format!("/api/customers/{cid}"), t, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let (_, vehicles) = call(&app, Method::GET, "/api/vehicles", t, None).await;
    assert!(vehicles.as_array().unwrap().is_empty());
    let (_, stats) = call(&app, Method::GET, "/api/stats", t, None).await;
    assert_eq!(stats["service_orders_total"], 0);
}

#[tokio::test]
async fn appointments_conflicts_and_reminders() {
    let app = workshop_router(state());
    let token = admin_token(&app).await;
    let t = Some(token.as_str());

    let (_, customer) = call(&app, Method::POST, "/api/customers", t, Some(json!({ "name": "Ana" }))).await;
    let cid = customer["id"].as_i64().unwrap();

    let soon = to_iso(time::now() + Duration::minutes(10));
    let (status, first) = call(
        &app,
        Method::POST,
        "/api/appointments",
        t,
        Some(json!({ "customer_id": cid, "title": "Oil change", "scheduled_at": soon, "duration_minutes": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["status"], "scheduled");
    let first_id = first["id"].as_i64().unwrap();

    let clash = to_iso(time::now() + Duration::minutes(40));
    let (status, err) = call(
        &app,
        Method::POST,
        "/api/appointments",
        t,
        Some(json!({ "customer_id": cid, "title": "Tires", "scheduled_at": clash })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(err["message"].as_str().unwrap().contains(&format!("#{first_id}")));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/appointments",
        t,
        Some(json!({ "customer_id": cid, "title": "Tires", "scheduled_at": clash, "duration_minutes": 45 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let later = to_iso(time::now() + Duration::hours(5));
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/appointments",
        t,
        Some(json!({ "customer_id": cid, "title": "Alignment", "scheduled_at": later })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = call(&app, Method::GET, "/api/appointments?only_unreminded=true", t, None).await;
    let titles: Vec<&str> = listed.as_array().unwrap().iter().map(|a| a["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Oil change", "Alignment"]);

    let (_, due) = call(&app, Method::GET, "/api/appointments/reminders", t, None).await;
    assert_eq!(due.as_array().unwrap().len(), 1);
    assert_eq!(due[0]["id"], first_id);
    let (status, _) = call(&app, Method::GET, "/api/appointments/reminders?within_minutes=0", t, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&app, Method::POST, &format!("/api/appointments/{first_id}/mark-reminded"), t, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, due) = call(&app, Method::GET, "/api/appointments/reminders", t, None).await;
    assert!(due.as_array().unwrap().is_empty());

    let (status, _) = call(&app, Method::POST, "/api/appointments/999/mark-reminded", t, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, moved) = call(
        &app,
        Method::PATCH,
        &format!("/api/appointments/{first_id}"),
        t,
        Some(json!({ "status": "done" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["status"], "done");
}
