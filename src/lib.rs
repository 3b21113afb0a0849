mod authentication;
pub mod config;
mod data_formats;
mod db_helpers;
mod errors;
mod handlers;
mod models;
mod pagination;
mod sessions;
pub mod telemetry;

use std::{net::TcpListener, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
pub use config::AppConfig;
pub use data_formats::*;
use handlers::*;
use sessions::SessionStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub type JsonResponse<T> = (StatusCode, Json<T>);

pub async fn run_app(config: AppConfig) -> Result<()> {
    let pool = init_db(&config).await?;
    let address = config.socket_addr()?;
    let listener =
        TcpListener::bind(address).with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(%address, "Server started");
    serve(listener, make_router(pool, config)).await
}

/// Serves `app` on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn init_db(config: &AppConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("Invalid DATABASE_URL {}", config.database_url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.db_max_connections);
    if config.database_url.contains(":memory:") {
        // An in-memory database lives only as long as its connection.
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
    }
    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to connect to the database")?;

    tracing::info!("Running Migrations");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed");
    Ok(pool)
}

pub fn make_router(pool: SqlitePool, config: AppConfig) -> Router {
    let sessions = SessionStore::new(config.session_secret.clone(), config.session_ttl_hours);
    Router::new()
        .route("/check_health", get(alive))
        .route("/register/", post(register_user))
        .route("/login/", post(login_user))
        .route("/logout/", post(logout_user))
        .route("/posts/", get(list_posts).post(create_post))
        .route("/posts/search/", get(search_posts))
        .route("/posts/delete/:id/", delete(acknowledge_delete))
        .route(
            "/posts/:id/",
            get(get_post)
                .put(replace_post)
                .patch(patch_post)
                .delete(delete_post),
        )
        .route("/tags/", get(list_tags).post(create_tag))
        .route("/tags/:id/", get(get_tag))
        .route("/categories/", get(list_categories).post(create_category))
        .route("/categories/:id/", get(get_category))
        .fallback(not_found)
        .layer(Extension(Arc::new(pool)))
        .layer(Extension(Arc::new(sessions)))
        .layer(Extension(Arc::new(config)))
        .layer(TraceLayer::new_for_http())
}
