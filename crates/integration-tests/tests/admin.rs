//! Integration tests for the admin back-office.
//!
//! Requires a running storefront server and an admin account named by
//! `ANIMART_TEST_ADMIN_EMAIL` / `ANIMART_TEST_ADMIN_PASSWORD`
//! (create one with `animart-cli user promote`).

use animart_integration_tests::{base_url, expect_json, get, post, signed_in_admin};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_stats_summarize_store() {
    let client = signed_in_admin().await.expect("admin credentials not set");

    let body = expect_json(get(&client, "/admin/stats").await, StatusCode::OK).await;
    let data = &body["data"];
    assert!(data["total_orders"].is_i64());
    assert!(data["active_products"].as_i64().unwrap() >= 2);
    assert!(data["unread_messages"].is_i64());
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_invalid_coupon_definition_rejected() {
    let client = signed_in_admin().await.expect("admin credentials not set");

    let response = post(
        &client,
        "/admin/coupons",
        &json!({ "code": "TOO-MUCH", "discount_type": "PERCENTAGE", "discount_value": "120" }),
    )
    .await;
    expect_json(response, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server and admin credentials"]
async fn test_contact_message_reaches_inbox() {
    let sent = post(
        &animart_integration_tests::client(),
        "/contact",
        &json!({
            "name": "Usopp",
            "email": "usopp@animart.test",
            "message": "Do you ship to Syrup Village?"
        }),
    )
    .await;
    let id = expect_json(sent, StatusCode::CREATED).await["data"]["id"].clone();

    let client = signed_in_admin().await.expect("admin credentials not set");
    let inbox = expect_json(get(&client, "/admin/messages?unread=true").await, StatusCode::OK).await;
    assert!(inbox["data"].as_array().unwrap().iter().any(|m| m["id"] == id));

    let read = client
        .put(format!("{}/api/admin/messages/{id}", base_url()))
        .json(&json!({ "is_read": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(read.status(), StatusCode::NO_CONTENT);
}
