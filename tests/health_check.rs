//! Integration tests for the public health endpoint and the request logger

use std::net::TcpListener;
use std::sync::Arc;

use kokomemo::auth::AuthService;
use kokomemo::configuration::{ApplicationSettings, GoogleSettings, JwtSettings};
use kokomemo::identity::GoogleIdentityProvider;
use kokomemo::logger::REQUEST_ID_HEADER;
use kokomemo::startup::run;
use kokomemo::store::InMemoryUserDirectory;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt = JwtSettings {
        secret: "health-check-secret-health-check-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 1209600,
    };
    let auth = AuthService::new(Arc::new(InMemoryUserDirectory::new()), &jwt);
    let identity = Arc::new(GoogleIdentityProvider::new(
        &GoogleSettings {
            client_id: "unused".to_string(),
            tokeninfo_url: "http://127.0.0.1:9/tokeninfo".to_string(),
        },
        reqwest::Client::new(),
    ));
    let application = ApplicationSettings {
        host: "127.0.0.1".to_string(),
        port,
        test_login: false,
    };

    let server = run(listener, auth, identity, application).expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().get(REQUEST_ID_HEADER).is_some());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn test_login_is_not_routed_when_disabled() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .post(&format!("{}/api/v1/user/login/test", addr))
        .json(&serde_json::json!({"email": "a@example.com", "name": "A"}))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
