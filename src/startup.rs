use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthService;
use crate::configuration::{ApplicationSettings, DatabaseSettings};
use crate::identity::IdentityProvider;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    get_user_info, google_login, health_check, logout, put_user_info, refresh, test_login,
};

/// Lazily connecting pool; the first query pays for the connection.
///
/// `timeout_seconds` bounds the wait for a connection here and every
/// statement through the server-side `statement_timeout`.
pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(configuration.timeout_seconds))
        .connect_lazy_with(configuration.with_db())
}

pub fn run(
    listener: TcpListener,
    auth: AuthService,
    identity: Arc<dyn IdentityProvider>,
    application: ApplicationSettings,
) -> Result<Server, std::io::Error> {
    let auth = web::Data::new(auth);
    let identity: web::Data<dyn IdentityProvider> = web::Data::from(identity);
    let test_login_enabled = application.test_login;

    if test_login_enabled {
        tracing::warn!("Test login is enabled; do not run this configuration in production");
    }

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(auth.clone())
            .app_data(identity.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/user")
                    .route("/login/google", web::post().to(google_login))
                    .route("/login/token/refresh", web::post().to(refresh))
                    .configure(|cfg| {
                        if test_login_enabled {
                            cfg.route("/login/test", web::post().to(test_login));
                        }
                    })
                    // Protected routes (require a valid access token)
                    .service(
                        web::resource("/login/logout")
                            .wrap(JwtMiddleware)
                            .route(web::get().to(logout)),
                    )
                    .service(
                        web::resource("/info")
                            .wrap(JwtMiddleware)
                            .route(web::get().to(get_user_info))
                            .route(web::put().to(put_user_info)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
