//! Integration tests for server-side checkout validation.
//!
//! Requires a running storefront server seeded with `fixtures/catalog.yaml`
//! and default shipping settings.

use animart_integration_tests::{expect_json, get, post, signed_in_customer};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn hoodie_id(client: &Client) -> Value {
    let body = expect_json(
        get(client, "/products/straw-hat-crew-hoodie").await,
        StatusCode::OK,
    )
    .await;
    body["data"]["id"].clone()
}

fn address() -> Value {
    json!({
        "full_name": "Monkey D. Luffy",
        "line1": "1 Foosha Village",
        "city": "Dawn Island",
        "postal_code": "10001",
        "country": "JP"
    })
}

fn order(product_id: &Value, price: &str, shipping: &str, coupon: Option<&str>) -> Value {
    json!({
        "items": [{
            "product_id": product_id,
            "color": "Black",
            "size": "M",
            "quantity": 1,
            "price": price
        }],
        "shipping_address": address(),
        "shipping_cost": shipping,
        "coupon_code": coupon
    })
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_checkout_requires_auth() {
    let response = post(&animart_integration_tests::client(), "/orders", &json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_order_over_threshold_ships_free() {
    let (client, email) = signed_in_customer().await;
    let id = hoodie_id(&client).await;

    let response = post(&client, "/orders", &order(&id, "59.99", "0", None)).await;
    let body = expect_json(response, StatusCode::CREATED).await;
    let data = &body["data"];
    assert_eq!(data["status"], "PENDING");
    assert_eq!(data["email"], email);
    assert_eq!(data["total"], "59.99");
    assert_eq!(data["items"][0]["unit_price"], "59.99");

    let mine = expect_json(get(&client, "/orders").await, StatusCode::OK).await;
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_tampered_price_rejected() {
    let (client, _email) = signed_in_customer().await;
    let id = hoodie_id(&client).await;

    let response = post(&client, "/orders", &order(&id, "1.00", "0", None)).await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(
        body["error"],
        "Price validation failed. Please refresh your cart."
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_wrong_shipping_rejected() {
    let (client, _email) = signed_in_customer().await;
    let id = hoodie_id(&client).await;

    let response = post(&client, "/orders", &order(&id, "59.99", "5.99", None)).await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "Invalid shipping cost");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_coupon_discount_is_recomputed() {
    let (client, _email) = signed_in_customer().await;

    let preview = post(
        &client,
        "/coupons/validate",
        &json!({ "code": "welcome10", "subtotal": "59.99" }),
    )
    .await;
    let body = expect_json(preview, StatusCode::OK).await;
    assert_eq!(body["data"]["code"], "WELCOME10");
    assert_eq!(body["data"]["discount"], "6.00");

    let id = hoodie_id(&client).await;
    let response = post(&client, "/orders", &order(&id, "59.99", "0", Some("WELCOME10"))).await;
    let body = expect_json(response, StatusCode::CREATED).await;
    assert_eq!(body["data"]["discount"], "6.00");
    assert_eq!(body["data"]["total"], "53.99");
    assert_eq!(body["data"]["coupon_code"], "WELCOME10");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_coupon_minimum_enforced() {
    let (client, _email) = signed_in_customer().await;

    let preview = post(
        &client,
        "/coupons/validate",
        &json!({ "code": "FIVEOFF", "subtotal": "20.00" }),
    )
    .await;
    let body = expect_json(preview, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_customer_can_cancel_pending_order_once() {
    let (client, _email) = signed_in_customer().await;
    let id = hoodie_id(&client).await;

    let placed = post(&client, "/orders", &order(&id, "59.99", "0", None)).await;
    let order_id = expect_json(placed, StatusCode::CREATED).await["data"]["id"].clone();

    let path = format!("/dashboard/orders/{order_id}/cancel");
    let cancelled = expect_json(post(&client, &path, &json!({})).await, StatusCode::OK).await;
    assert_eq!(cancelled["data"]["status"], "CANCELLED");

    let again = post(&client, &path, &json!({})).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}
