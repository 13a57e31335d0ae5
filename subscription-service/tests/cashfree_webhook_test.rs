//! Cashfree webhook integration tests.

mod common;

use common::{cashfree_body_signature, cashfree_payment_body, TestApp};
use reqwest::Client;
use subscription_service::models::{Plan, Provider, SubscriptionStatus};
use uuid::Uuid;

async fn post_cashfree(app: &TestApp, body: &str, signature: Option<&str>) -> reqwest::Response {
    let client = Client::new();
    let mut request = client
        .post(&format!("{}/webhooks/cashfree", app.address))
        .header("content-type", "application/json")
        .body(body.to_string());

    if let Some(sig) = signature {
        request = request.header("x-webhook-signature", sig);
    }

    request.send().await.expect("Failed to execute request")
}

#[tokio::test]
async fn missing_signature_header_returns_401_before_parsing() {
    let app = TestApp::spawn().await;

    // Even a malformed body answers 401 when the header is absent
    let response = post_cashfree(&app, "{not json", None).await;
    assert_eq!(response.status().as_u16(), 401);

    app.cleanup().await;
}

#[tokio::test]
async fn malformed_json_with_header_returns_400() {
    let app = TestApp::spawn().await;

    let response = post_cashfree(&app, "{not json", Some("anything")).await;
    assert_eq!(response.status().as_u16(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn signature_mismatch_returns_401() {
    let app = TestApp::spawn().await;

    let body = cashfree_payment_body("PAYMENT_SUCCESS_WEBHOOK", "order_cf_1", "SUCCESS");
    let response = post_cashfree(&app, &body, Some("bm90IGEgcmVhbCBkaWdlc3Q=")).await;
    assert_eq!(response.status().as_u16(), 401);

    app.cleanup().await;
}

#[tokio::test]
async fn payment_success_activates_subscription() {
    let app = TestApp::spawn().await;
    let user_id = Uuid::new_v4();

    app.seed_subscription(user_id, Plan::Pro, Provider::Cashfree, "order_cf_act")
        .await;

    let body = cashfree_payment_body("PAYMENT_SUCCESS_WEBHOOK", "order_cf_act", "SUCCESS");
    let digest = cashfree_body_signature("order_cf_act", "SUCCESS");
    let response = post_cashfree(&app, &body, Some(&digest)).await;
    assert_eq!(response.status().as_u16(), 200);

    let row = app
        .db
        .find_by_order_id("order_cf_act")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), SubscriptionStatus::Active);
    assert_eq!(row.provider_payment_id.as_deref(), Some("885473"));

    app.cleanup().await;
}

#[tokio::test]
async fn payment_failed_cancels_subscription() {
    let app = TestApp::spawn().await;
    let user_id = Uuid::new_v4();

    app.seed_subscription(user_id, Plan::Pro, Provider::Cashfree, "order_cf_fail")
        .await;

    let body = cashfree_payment_body("PAYMENT_FAILED_WEBHOOK", "order_cf_fail", "FAILED");
    let digest = cashfree_body_signature("order_cf_fail", "FAILED");
    let response = post_cashfree(&app, &body, Some(&digest)).await;
    assert_eq!(response.status().as_u16(), 200);

    let row = app
        .db
        .find_by_order_id("order_cf_fail")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), SubscriptionStatus::Canceled);

    app.cleanup().await;
}

#[tokio::test]
async fn user_dropped_cancels_pending_checkout() {
    let app = TestApp::spawn().await;
    let user_id = Uuid::new_v4();

    app.seed_subscription(user_id, Plan::Pro, Provider::Cashfree, "order_cf_drop")
        .await;

    let body = cashfree_payment_body("PAYMENT_USER_DROPPED_WEBHOOK", "order_cf_drop", "USER_DROPPED");
    let digest = cashfree_body_signature("order_cf_drop", "USER_DROPPED");
    let response = post_cashfree(&app, &body, Some(&digest)).await;
    assert_eq!(response.status().as_u16(), 200);

    let row = app
        .db
        .find_by_order_id("order_cf_drop")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), SubscriptionStatus::Canceled);
    assert_eq!(row.failure_reason.as_deref(), Some("checkout abandoned"));

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_order_id_is_acknowledged() {
    let app = TestApp::spawn().await;

    let body = cashfree_payment_body("PAYMENT_SUCCESS_WEBHOOK", "order_cf_ghost", "SUCCESS");
    let digest = cashfree_body_signature("order_cf_ghost", "SUCCESS");
    let response = post_cashfree(&app, &body, Some(&digest)).await;

    assert_eq!(response.status().as_u16(), 200);
    assert!(app
        .db
        .find_by_order_id("order_cf_ghost")
        .await
        .unwrap()
        .is_none());

    app.cleanup().await;
}

#[tokio::test]
async fn get_verification_ping_answers_ok() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/webhooks/cashfree", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");

    app.cleanup().await;
}
