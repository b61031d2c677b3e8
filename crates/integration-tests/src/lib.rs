//! Integration tests for the Animart storefront API.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and seed a scratch database, then start the server
//! cargo run -p animart-cli -- migrate
//! cargo run -p animart-cli -- seed crates/integration-tests/fixtures/catalog.yaml
//! cargo run -p animart-storefront
//!
//! # Run the ignored tests against it
//! cargo test -p animart-integration-tests -- --ignored
//! ```
//!
//! `ANIMART_TEST_BASE_URL` points the tests at a server other than
//! `http://localhost:3000`. Tests that need an admin account read
//! `ANIMART_TEST_ADMIN_EMAIL` / `ANIMART_TEST_ADMIN_PASSWORD`.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password used for throwaway accounts.
pub const TEST_PASSWORD: &str = "Kx9#mQ2!vLp7";

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("ANIMART_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client with its own cookie jar.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique address for a throwaway account.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@animart.test", Uuid::new_v4().simple())
}

/// `GET {base}/api{path}`.
pub async fn get(client: &Client, path: &str) -> Response {
    client
        .get(format!("{}/api{path}", base_url()))
        .send()
        .await
        .expect("request failed")
}

/// `POST {base}/api{path}` with a JSON body.
pub async fn post(client: &Client, path: &str, body: &Value) -> Response {
    client
        .post(format!("{}/api{path}", base_url()))
        .json(body)
        .send()
        .await
        .expect("request failed")
}

/// Read the `{ success, data | error }` envelope, asserting the status.
pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status, "unexpected status");
    response.json().await.expect("body is not JSON")
}

/// Register a fresh customer and return the signed-in client.
pub async fn signed_in_customer() -> (Client, String) {
    let client = client();
    let email = unique_email();
    let response = post(
        &client,
        "/auth/register",
        &json!({ "email": email, "name": "Integration Test", "password": TEST_PASSWORD }),
    )
    .await;
    expect_json(response, StatusCode::CREATED).await;
    (client, email)
}

/// Sign in as the admin named by the environment, if configured.
pub async fn signed_in_admin() -> Option<Client> {
    let email = std::env::var("ANIMART_TEST_ADMIN_EMAIL").ok()?;
    let password = std::env::var("ANIMART_TEST_ADMIN_PASSWORD").ok()?;
    let client = client();
    let response = post(
        &client,
        "/auth/login",
        &json!({ "email": email, "password": password }),
    )
    .await;
    expect_json(response, StatusCode::OK).await;
    Some(client)
}
