use std::net::TcpListener;
use std::sync::Arc;

use kokomemo::auth::AuthService;
use kokomemo::configuration::get_configuration;
use kokomemo::identity::{GoogleIdentityProvider, IdentityProvider};
use kokomemo::startup::{get_connection_pool, run};
use kokomemo::store::{PgUserDirectory, UserDirectory};
use kokomemo::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let pool = get_connection_pool(&configuration.database);

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Database migration error",
        )
    })?;
    tracing::info!("Database migrations applied");

    let directory: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool));
    let auth = AuthService::new(directory, &configuration.jwt);

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| {
            tracing::error!("Failed to build HTTP client: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "HTTP client error")
        })?;
    let identity: Arc<dyn IdentityProvider> = Arc::new(GoogleIdentityProvider::new(
        &configuration.google,
        http_client,
    ));

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, auth, identity, configuration.application)?.await
}
