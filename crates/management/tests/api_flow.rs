//! End-to-end flows through the ads/CRM router.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tlx_core::AppConfig;
use tlx_management::{management_router, AppState};
use tower::ServiceExt;

fn app() -> Router {
    let mut config = AppConfig::default();
    config.auth.pwd_iterations = 1_000;
    config.web.dev_return_token_links = true;
    let state = AppState::in_memory(config).unwrap();
    management_router(state)
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

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_and_me() {
    let app = app();
    let token = register(&app, "Owner@Example.com").await;

    let (status, me) = call(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "owner@example.com");
    assert_eq!(me["tenant_id"], 1);
    assert_eq!(me["role"], "admin");

    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "owner@example.com", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "owner@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");

    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "owner@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/ads", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Missing bearer token");

    let (status, _) = call(&app, Method::GET, "/ads", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ad_lifecycle_renders_and_schedules() {
    let app = app();
    let token = register(&app, "ads@example.com").await;

    let (status, template) = call(
        &app,
        Method::POST,
        "/templates",
        Some(&token),
        Some(json!({ "name": "promo", "body": "Hi {{name}}, {{offer}}!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let template_id = template["id"].as_i64().unwrap();

    let (status, ad) = call(
        &app,
        Method::POST,
        "/ads",
        Some(&token),
        Some(json!({
            "title": "Spring sale",
            "body": "unused",
            "channel": "whatsapp",
            "template_id": template_id,
            "variables": { "name": "Ana", "offer": 20 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{ad}");
    assert_eq!(ad["rendered_body"], "Hi Ana, 20!");
    assert_eq!(ad["status"], "draft");
    let ad_id = ad["id"].as_i64().unwrap();

    let (status, patched) = call(
        &app,
        Method::PATCH,
        &format!("/ads/{ad_id}"),
        Some(&token),
        Some(json!({ "variables": { "name": "Bia", "offer": "free shipping" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["rendered_body"], "Hi Bia, free shipping!");

    let (status, body) = call(
        &app,
        Method::PATCH,
        &format!("/ads/{ad_id}"),
        Some(&token),
        Some(json!({ "status": "scheduled" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "scheduled_at is required when status=scheduled");

    let (status, _) = call(&app, Method::PATCH, &format!("/ads/{ad_id}"), Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, scheduled) = call(
        &app,
        Method::POST,
        &format!("/ads/{ad_id}/schedule?scheduled_at=2030-01-01T10:00:00Z"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduled["status"], "scheduled");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/ads/{ad_id}/schedule?scheduled_at=tomorrow"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, list) = call(&app, Method::GET, "/ads?status=scheduled&q=SPRING", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::DELETE, &format!("/ads/{ad_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::DELETE, &format!("/ads/{ad_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invited_viewer_cannot_write() {
    let app = app();
    let admin = register(&app, "admin@example.com").await;

    let (status, invite) = call(
        &app,
        Method::POST,
        "/tenants/1/members/invite-token",
        Some(&admin),
        Some(json!({ "email": "viewer@example.com", "role": "viewer" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{invite}");
    let invite_token = invite["token"].as_str().unwrap().to_string();
    assert!(invite["invite_link"].as_str().unwrap().ends_with(&invite_token));

    let (status, accepted) = call(
        &app,
        Method::POST,
        "/auth/accept-invite",
        None,
        Some(json!({ "token": invite_token, "password": "viewer123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{accepted}");
    assert_eq!(accepted["role"], "viewer");
    let viewer = accepted["access_token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/accept-invite",
        None,
        Some(json!({ "token": invite_token, "password": "viewer123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, Method::GET, "/ads", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(
        &app,
        Method::POST,
        "/campaigns",
        Some(&viewer),
        Some(json!({ "name": "Nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Insufficient permissions");

    let (status, members) = call(&app, Method::GET, "/tenants/1/members", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);

    let (status, _) = call(&app, Method::GET, "/tenants/2/members", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delivery_enqueue_is_idempotent() {
    let app = app();
    let token = register(&app, "queue@example.com").await;
    let request = json!({
        "channel": " Email ",
        "to_addr": " someone@example.com ",
        "payload": { "body": "hello" },
        "idempotency_key": "order-42"
    });

    let (status, first) = call(&app, Method::POST, "/deliveries", Some(&token), Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["channel"], "email");
    assert_eq!(first["to_addr"], "someone@example.com");
    assert_eq!(first["status"], "queued");

    let (status, second) = call(&app, Method::POST, "/deliveries", Some(&token), Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);

    let (_, rows) = call(&app, Method::GET, "/deliveries?status=queued", Some(&token), None).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);

    let (_, plan) = call(&app, Method::GET, "/saas/plan", Some(&token), None).await;
    assert_eq!(plan["plan"], "free");
    assert_eq!(plan["usage"]["sends_total"], 1);
    assert_eq!(plan["usage"]["sends_email"], 1);

    let (status, _) = call(
        &app,
        Method::POST,
        "/deliveries",
        Some(&token),
        Some(json!({ "channel": "sms", "to_addr": "+1555", "campaign_id": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn segment_send_queues_reachable_contacts() {
    let app = app();
    let token = register(&app, "crm@example.com").await;

    let (status, with_email) = call(
        &app,
        Method::POST,
        "/contacts",
        Some(&token),
        Some(json!({ "name": "Ana", "email": "ANA@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{with_email}");
    assert_eq!(with_email["email"], "ana@example.com");
    let (_, phone_only) = call(
        &app,
        Method::POST,
        "/contacts",
        Some(&token),
        Some(json!({ "name": "Bruno", "phone": "+55 11 99999-0000" })),
    )
    .await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/contacts",
        Some(&token),
        Some(json!({ "name": "Dup", "email": "ana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, segment) = call(&app, Method::POST, "/segments", Some(&token), Some(json!({ "name": "VIP" }))).await;
    let segment_id = segment["id"].as_i64().unwrap();
    for contact in [&with_email, &phone_only] {
        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/segments/{segment_id}/members"),
            Some(&token),
            Some(json!({ "contact_id": contact["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, members) = call(&app, Method::GET, &format!("/segments/{segment_id}/members"), Some(&token), None).await;
    assert_eq!(members.as_array().unwrap().len(), 2);

    let (status, out) = call(
        &app,
        Method::POST,
        "/automation/segment-send",
        Some(&token),
        Some(json!({
            "segment_id": segment_id,
            "channel": "EMAIL",
            "body": "Hello {{name}}",
            "variables": { "name": "friend" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{out}");
    assert_eq!(out, json!({ "queued": 1, "failed": 0, "skipped": 1 }));

    let (status, _) = call(
        &app,
        Method::POST,
        "/automation/segment-send",
        Some(&token),
        Some(json!({ "segment_id": segment_id, "channel": "sms", "body": "x", "scheduled_at": "soon" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/automation/segment-send",
        Some(&token),
        Some(json!({ "segment_id": 999, "channel": "sms", "body": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn template_quota_returns_payment_required() {
    let app = app();
    let token = register(&app, "quota@example.com").await;
    for i in 0..20 {
        let (status, _) = call(
            &app,
            Method::POST,
            "/templates",
            Some(&token),
            Some(json!({ "name": format!("t{i}"), "body": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(
        &app,
        Method::POST,
        "/templates",
        Some(&token),
        Some(json!({ "name": "one too many", "body": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_required");
}

#[tokio::test]
async fn billing_without_stripe_is_bad_request() {
    let app = app();
    let token = register(&app, "billing@example.com").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/billing/checkout-session",
        Some(&token),
        Some(json!({ "plan": "pro" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Stripe not configured");

    let (status, body) = call(&app, Method::POST, "/stripe/webhook", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Stripe webhook not configured");
}

#[tokio::test]
async fn short_links_carry_utm_parameters() {
    let app = app();
    let token = register(&app, "links@example.com").await;
    let (status, link) = call(
        &app,
        Method::POST,
        "/links",
        Some(&token),
        Some(json!({
            "destination_url": "https://shop.example.com/p?id=7",
            "utm_source": "whatsapp",
            "utm_medium": "social",
            "utm_campaign": "spring"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{link}");
    assert_eq!(link["slug"].as_str().unwrap().len(), 7);
    let destination = link["destination_url"].as_str().unwrap();
    assert!(destination.contains("id=7"));
    assert!(destination.contains("utm_source=whatsapp"));
    assert!(destination.contains("utm_campaign=spring"));
}

#[tokio::test]
async fn short_links_reject_unsafe_destinations() {
    let app = app();
    let token = register(&app, "badlinks@example.com").await;
    for destination in ["https://loja.example/a\nb", "javascript:alert(1)"] {
        let (status, body) = call(
            &app,
            Method::POST,
            "/links",
            Some(&token),
            Some(json!({ "destination_url": destination })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{destination:?}: {body}");
    }
}
