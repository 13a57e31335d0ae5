//! Subscription API integration tests: checkout, status, cancel.

mod common;

use common::TestApp;
use reqwest::Client;
use subscription_service::models::{Plan, Provider, SubscriptionStatus};
use uuid::Uuid;

#[tokio::test]
async fn status_without_session_header_returns_401() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/api/subscription", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);

    app.cleanup().await;
}

#[tokio::test]
async fn user_without_rows_gets_free_plan() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let response = client
        .get(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["subscription"]["plan"], "free");
    assert_eq!(body["subscription"]["is_active"], true);
    assert_eq!(body["subscription"]["can_upgrade"], true);
    assert_eq!(body["subscription"]["can_downgrade"], false);
    assert_eq!(body["subscription"]["limits"]["workspaces"], 1);

    app.cleanup().await;
}

#[tokio::test]
async fn active_pro_subscription_reports_renewal_countdown() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let seeded = app
        .seed_subscription(user_id, Plan::Pro, Provider::Stripe, "order_status_pro")
        .await;
    app.set_subscription_state(
        seeded.subscription_id,
        "active",
        chrono::Utc::now() + chrono::Duration::days(5),
    )
    .await;

    let response = client
        .get(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["subscription"]["plan"], "pro");
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["subscription"]["days_until_renewal"], 5);
    assert_eq!(body["subscription"]["can_upgrade"], true);
    assert_eq!(body["subscription"]["can_downgrade"], true);
    assert_eq!(body["subscription"]["limits"]["summaries_per_month"], 100);

    app.cleanup().await;
}

#[tokio::test]
async fn expired_subscription_lazily_reverts_to_free() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let seeded = app
        .seed_subscription(user_id, Plan::Pro, Provider::Stripe, "order_expired")
        .await;
    app.set_subscription_state(
        seeded.subscription_id,
        "active",
        chrono::Utc::now() - chrono::Duration::days(1),
    )
    .await;

    let response = client
        .get(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["subscription"]["plan"], "free");

    // The expiry was written back, not just reported
    let row = app
        .db
        .find_by_order_id("order_expired")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), SubscriptionStatus::Canceled);

    app.cleanup().await;
}

#[tokio::test]
async fn checkout_creates_pending_subscription() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let response = client
        .post(&format!("{}/api/checkout", app.address))
        .header("X-User-ID", user_id.to_string())
        .json(&serde_json::json!({ "plan": "pro" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["provider"], "stripe");

    let order_id = body["order_id"].as_str().unwrap();
    assert!(order_id.starts_with("order_"));

    let row = app.db.find_by_order_id(order_id).await.unwrap().unwrap();
    assert_eq!(row.status(), SubscriptionStatus::Trialing);
    assert_eq!(row.user_id, user_id);

    app.cleanup().await;
}

#[tokio::test]
async fn pending_checkout_grants_no_entitlements() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let response = client
        .post(&format!("{}/api/checkout", app.address))
        .header("X-User-ID", user_id.to_string())
        .json(&serde_json::json!({ "plan": "enterprise" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    // No payment webhook has arrived, so the caller is still on FREE
    let response = client
        .get(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["subscription"]["plan"], "free");
    assert_eq!(body["subscription"]["limits"]["workspaces"], 1);

    app.cleanup().await;
}

#[tokio::test]
async fn checkout_while_active_keeps_current_plan() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let seeded = app
        .seed_subscription(user_id, Plan::Pro, Provider::Stripe, "order_keep_pro")
        .await;
    app.set_subscription_state(
        seeded.subscription_id,
        "active",
        chrono::Utc::now() + chrono::Duration::days(5),
    )
    .await;

    let response = client
        .post(&format!("{}/api/checkout", app.address))
        .header("X-User-ID", user_id.to_string())
        .json(&serde_json::json!({ "plan": "enterprise" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    // The unpaid pending row must not shadow the paid PRO subscription
    let response = client
        .get(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["subscription"]["plan"], "pro");
    assert_eq!(body["subscription"]["status"], "active");

    let paid = app
        .db
        .find_by_order_id("order_keep_pro")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paid.status(), SubscriptionStatus::Active);

    app.cleanup().await;
}

#[tokio::test]
async fn reinitiated_checkout_supersedes_previous_pending() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let mut order_ids = Vec::new();
    for _ in 0..2 {
        let response = client
            .post(&format!("{}/api/checkout", app.address))
            .header("X-User-ID", user_id.to_string())
            .json(&serde_json::json!({ "plan": "pro" }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        order_ids.push(body["order_id"].as_str().unwrap().to_string());
    }

    let first = app
        .db
        .find_by_order_id(&order_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status(), SubscriptionStatus::Canceled);

    let second = app
        .db
        .find_by_order_id(&order_ids[1])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.status(), SubscriptionStatus::Trialing);

    // Only the latest attempt can still be activated by its webhook
    assert_eq!(app.db.count_live_for_user(user_id).await.unwrap(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn checkout_rejects_unknown_plan_and_free_plan() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    for plan in ["platinum", "free"] {
        let response = client
            .post(&format!("{}/api/checkout", app.address))
            .header("X-User-ID", user_id.to_string())
            .json(&serde_json::json!({ "plan": plan }))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(response.status().as_u16(), 400, "plan: {}", plan);
    }

    app.cleanup().await;
}

#[tokio::test]
async fn cancel_action_cancels_active_subscription() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let seeded = app
        .seed_subscription(user_id, Plan::Pro, Provider::Stripe, "order_cancel")
        .await;
    app.set_subscription_state(
        seeded.subscription_id,
        "active",
        chrono::Utc::now() + chrono::Duration::days(20),
    )
    .await;

    let response = client
        .post(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .json(&serde_json::json!({ "action": "cancel" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let row = app
        .db
        .find_by_order_id("order_cancel")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), SubscriptionStatus::Canceled);

    app.cleanup().await;
}

#[tokio::test]
async fn cancel_without_active_subscription_returns_404() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let response = client
        .post(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .json(&serde_json::json!({ "action": "cancel" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn unsupported_action_returns_400() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    let user_id = Uuid::new_v4();

    let response = client
        .post(&format!("{}/api/subscription", app.address))
        .header("X-User-ID", user_id.to_string())
        .json(&serde_json::json!({ "action": "pause" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);

    app.cleanup().await;
}
