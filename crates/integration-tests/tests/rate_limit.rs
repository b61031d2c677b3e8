//! Integration test for the auth rate limiter.
//!
//! Requires a freshly started storefront server; the auth limit is shared by
//! every client from the same address, so run this test on its own.

use animart_integration_tests::{client, post, unique_email};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running storefront server; exhausts the auth limit"]
async fn test_auth_limit_returns_429() {
    let client = client();
    let body = json!({ "email": unique_email(), "password": "wrong-password" });

    let mut statuses = Vec::new();
    for _ in 0..8 {
        let response = post(&client, "/auth/login", &body).await;
        statuses.push(response.status());
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            assert!(response.headers().contains_key("retry-after"));
            assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        }
    }

    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
    assert!(statuses.iter().take(5).all(|s| *s == StatusCode::UNAUTHORIZED));
}
