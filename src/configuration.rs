use sqlx::postgres::PgConnectOptions;

use crate::error::{AppError, ConfigError};

/// HS256 secrets shorter than the hash output are rejected at startup
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub google: GoogleSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Enables `POST /api/v1/user/login/test`. Never turn on in production.
    #[serde(default)]
    pub test_login: bool,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    /// Bounds both the wait for a pooled connection and each statement
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    5
}

impl DatabaseSettings {
    /// Server connection without a database selected
    pub fn without_db(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
    }

    /// Connection to `database_name`. Postgres cancels any statement
    /// running longer than `timeout_seconds` (SQLSTATE 57014).
    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db()
            .database(&self.database_name)
            .options([("statement_timeout", self.statement_timeout_ms())])
    }

    pub fn statement_timeout_ms(&self) -> String {
        (self.timeout_seconds * 1000).to_string()
    }
}

/// Token signing settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 1209600 for 14 days)
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token expiries must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Google identity federation settings
#[derive(serde::Deserialize, Clone)]
pub struct GoogleSettings {
    pub client_id: String,
    #[serde(default = "default_tokeninfo_url")]
    pub tokeninfo_url: String,
}

fn default_tokeninfo_url() -> String {
    "https://oauth2.googleapis.com/tokeninfo".to_string()
}

/// Reads `configuration.{yaml,toml,json}` from the working directory (if
/// present), then applies `APP__SECTION__KEY` environment overrides.
///
/// # Errors
/// `AppError::Config` for unreadable or incomplete settings and for a
/// JWT section that fails `JwtSettings::validate`
pub fn get_configuration() -> Result<Settings, AppError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .and_then(|c| c.try_deserialize::<Settings>())
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    settings.jwt.validate()?;
    Ok(settings)
}
