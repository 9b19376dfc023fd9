// rest/mod.rs — Public REST API server.
//
// Axum HTTP server bridging the reward and performance engines to the
// outside world.
//
// Endpoints:
//   GET    /health
//   POST   /auth/signup | /auth/signin | /auth/signout | /auth/refresh
//   GET    /api/{user_id}/tasks
//   POST   /api/{user_id}/tasks
//   GET    /api/{user_id}/tasks/{task_id}
//   PUT    /api/{user_id}/tasks/{task_id}
//   DELETE /api/{user_id}/tasks/{task_id}
//   PATCH  /api/{user_id}/tasks/{task_id}/complete
//   GET    /api/{user_id}/gamification/profile
//   GET    /api/{user_id}/gamification/achievements
//   GET    /api/{user_id}/gamification/achievements/available
//   GET    /api/{user_id}/gamification/history
//   GET    /api/{user_id}/performance/profile
//   GET    /api/{user_id}/performance/analytics
//   GET    /api/{user_id}/performance/recommendations

pub mod error;
pub mod extract;
pub mod routes;

use anyhow::Result;
use axum::{
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!(
        "{}:{}",
        ctx.config.server.bind_address, ctx.config.server.port
    );
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = cors_layer(&ctx.config.cors.allowed_origins);
    Router::new()
        // Health (no auth)
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/signin", post(routes::auth::signin))
        .route("/auth/signout", post(routes::auth::signout))
        .route("/auth/refresh", post(routes::auth::refresh))
        // Tasks
        .route(
            "/api/{user_id}/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/{user_id}/tasks/{task_id}",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/api/{user_id}/tasks/{task_id}/complete",
            patch(routes::tasks::complete_task),
        )
        // Gamification
        .route(
            "/api/{user_id}/gamification/profile",
            get(routes::gamification::reward_profile),
        )
        .route(
            "/api/{user_id}/gamification/achievements",
            get(routes::gamification::achievements),
        )
        .route(
            "/api/{user_id}/gamification/achievements/available",
            get(routes::gamification::available_achievements),
        )
        .route(
            "/api/{user_id}/gamification/history",
            get(routes::gamification::history),
        )
        // Performance
        .route(
            "/api/{user_id}/performance/profile",
            get(routes::performance::profile),
        )
        .route(
            "/api/{user_id}/performance/analytics",
            get(routes::performance::analytics),
        )
        .route(
            "/api/{user_id}/performance/recommendations",
            get(routes::performance::recommendations),
        )
        .layer(cors)
        .with_state(ctx)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
