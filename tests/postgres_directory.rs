//! PgUserDirectory against a live database.
//!
//! Needs Postgres reachable with the credentials in `configuration.yaml`
//! (or `APP__DATABASE__*`). Run with `cargo test -- --ignored`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::{Connection, Executor, PgConnection, PgPool};

use kokomemo::auth::{hash_refresh_id, AuthService};
use kokomemo::configuration::{get_configuration, DatabaseSettings, JwtSettings};
use kokomemo::identity::IdentityClaims;
use kokomemo::store::{Integration, PgUserDirectory, Session, User, UserDirectory};

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect_with(&config.without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn spawn_directory() -> PgUserDirectory {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    PgUserDirectory::new(configure_database(&configuration.database).await)
}

fn user(id: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        name: "Postgres User".to_string(),
        email: email.to_string(),
        created_at: Utc::now(),
        integrations: vec![Integration::new("test", email)],
        sessions: Vec::new(),
    }
}

fn session(id: &str, refresh_hash: &str, ttl: Duration) -> Session {
    let now = Utc::now();
    Session {
        id: id.to_string(),
        refresh_hash: refresh_hash.to_string(),
        created_at: now,
        expires_at: now + ttl,
    }
}

#[tokio::test]
#[ignore]
async fn insert_and_find_user() {
    let dir = spawn_directory().await;
    dir.insert_user(&user("u1", "u1@example.com")).await.unwrap();

    let found = dir.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(found.email, "u1@example.com");
    assert_eq!(found.integrations, vec![Integration::new("test", "u1@example.com")]);

    let by_integration = dir
        .find_by_integration(&Integration::new("test", "u1@example.com"))
        .await
        .unwrap();
    assert_eq!(by_integration.map(|u| u.id), Some("u1".to_string()));
}

#[tokio::test]
#[ignore]
async fn duplicate_integration_is_a_unique_violation() {
    let dir = spawn_directory().await;
    dir.insert_user(&user("u1", "same@example.com")).await.unwrap();

    let err = dir
        .insert_user(&user("u2", "same@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        kokomemo::error::AppError::Database(
            kokomemo::error::DatabaseError::UniqueConstraintViolation(_)
        )
    ));
    // The failed insert rolled back its user row
    assert!(dir.find_by_id("u2").await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn swap_refresh_hash_is_conditional() {
    let dir = spawn_directory().await;
    dir.insert_user(&user("u1", "u1@example.com")).await.unwrap();
    dir.push_session("u1", &session("s1", "h1", Duration::days(1)))
        .await
        .unwrap();

    let expires_at = Utc::now() + Duration::days(2);
    assert!(dir.swap_refresh_hash("u1", "s1", "h1", "h2", expires_at).await.unwrap());
    assert!(!dir.swap_refresh_hash("u1", "s1", "h1", "h3", expires_at).await.unwrap());

    let user = dir.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(user.session("s1").unwrap().refresh_hash, "h2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_swaps_have_one_winner() {
    let dir = Arc::new(spawn_directory().await);
    dir.insert_user(&user("u1", "u1@example.com")).await.unwrap();
    dir.push_session("u1", &session("s1", "h0", Duration::days(1)))
        .await
        .unwrap();

    let expires_at = Utc::now() + Duration::days(2);
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dir = dir.clone();
            tokio::spawn(async move {
                let new_hash = format!("h{}", i + 1);
                let won = dir
                    .swap_refresh_hash("u1", "s1", "h0", &new_hash, expires_at)
                    .await
                    .unwrap();
                (won, new_hash)
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        let (won, new_hash) = handle.await.unwrap();
        if won {
            winners.push(new_hash);
        }
    }

    assert_eq!(winners.len(), 1);
    let user = dir.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(user.session("s1").unwrap().refresh_hash, winners[0]);
}

#[tokio::test]
#[ignore]
async fn expired_sessions_are_pulled() {
    let dir = spawn_directory().await;
    dir.insert_user(&user("u1", "u1@example.com")).await.unwrap();
    dir.push_session("u1", &session("old", "h", Duration::seconds(-1)))
        .await
        .unwrap();
    dir.push_session("u1", &session("new", "h", Duration::days(1)))
        .await
        .unwrap();

    assert_eq!(dir.pull_expired_sessions("u1", Utc::now()).await.unwrap(), 1);
    let user = dir.find_by_id("u1").await.unwrap().unwrap();
    assert_eq!(user.session_ids().len(), 1);
    assert!(user.session("new").is_some());

    assert!(dir.pull_session("u1", "new").await.unwrap());
    assert!(!dir.pull_session("u1", "new").await.unwrap());
}

#[tokio::test]
#[ignore]
async fn refresh_replay_revokes_session_in_postgres() {
    let directory: Arc<dyn UserDirectory> = Arc::new(spawn_directory().await);
    let auth = AuthService::new(
        directory.clone(),
        &JwtSettings {
            secret: "postgres-test-secret-postgres-test-secret".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 1209600,
        },
    );

    let outcome = auth
        .login(IdentityClaims {
            service: "test".to_string(),
            provider_id: "pg@example.com".to_string(),
            email: "pg@example.com".to_string(),
            name: "Pg".to_string(),
        })
        .await
        .unwrap();

    let stored = directory.find_by_id(&outcome.user.id).await.unwrap().unwrap();
    let refresh_claims = auth
        .codec()
        .decode(&outcome.tokens.refresh_token)
        .unwrap();
    assert_eq!(
        stored.session(&outcome.session_id).unwrap().refresh_hash,
        hash_refresh_id(refresh_claims.rid.as_deref().unwrap())
    );

    let second = auth.refresh(&outcome.tokens.refresh_token).await.unwrap();
    assert!(auth
        .refresh(&outcome.tokens.refresh_token)
        .await
        .unwrap_err()
        .is_invalid_token());
    assert!(auth.refresh(&second.refresh_token).await.unwrap_err().is_invalid_token());

    let user = directory.find_by_id(&outcome.user.id).await.unwrap().unwrap();
    assert!(user.sessions.is_empty());
}
