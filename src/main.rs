pub mod analytics;
pub mod auth;
pub mod err;
pub mod models;
pub mod store;
pub mod students;
pub mod validate;

use std::env;
use std::net::SocketAddr;

use anyhow::Context;
use axum::handler::Handler;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::store::StudentStore;

const SERVICE_NAME: &str = "Academy Student API";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost:5432/academy".to_string());
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("could not connect to the database")?;

    store::ensure_schema(&pool)
        .await
        .context("could not prepare the database schema")?;
    if let Err(err) = auth::seed_default_admin(&pool).await {
        log::warn!("Could not seed the admin account: {}", err);
    }

    let app = Router::new()
        .route("/", get(home))
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login_admin))
        .route(
            "/api/students",
            get(students::list_students).post(students::create_student),
        )
        .route("/api/students/register", post(students::register_student))
        .route(
            "/api/students/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route("/api/students/:id/verify", put(students::verify_student))
        .route("/api/analytics/overview", get(analytics::overview))
        .route("/api/analytics/finance", get(analytics::finance))
        .fallback(err::handler404.into_service())
        .layer(Extension(pool));

    let port = env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(5000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Starting {} on http://{}", SERVICE_NAME, addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn health(Extension(pg): Extension<PgPool>) -> Json<HealthStatus> {
    let database = match pg.ping().await {
        Ok(()) => "connected",
        Err(_) => "disconnected",
    };
    Json(HealthStatus {
        status: "healthy",
        service: SERVICE_NAME,
        database,
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({
        "message": format!("Welcome to the {}", SERVICE_NAME),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "login": "POST /api/auth/login",
            "students": "/api/students",
            "analytics": "/api/analytics/overview",
            "finance": "/api/analytics/finance"
        }
    }))
}

#[derive(Debug, Clone, Serialize)]
struct HealthStatus {
    status: &'static str,
    service: &'static str,
    database: &'static str,
    timestamp: String,
}
