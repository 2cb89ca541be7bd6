use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use config::AppConfig;
use routes::{discovery, health, likes, messages, users};
use store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    pub metrics_handle: Option<PrometheusHandle>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Users
        .route("/api/users", post(users::create_user))
        .route("/api/users/:id", get(users::get_user).patch(users::update_user))
        .route("/api/users/:id/location", post(users::update_location))
        .route("/api/users/:id/premium", post(users::set_premium))
        .route("/api/users/:id/super-likes", post(users::credit_super_likes))
        .route("/api/users/:id/usage", post(users::record_usage))
        .route("/api/users/:id/likes-received", get(users::likes_received))
        .route("/api/users/:id/matches", get(users::list_matches))
        // Discovery
        .route("/api/users/:id/nearby", get(discovery::nearby))
        // Likes
        .route("/api/likes", post(likes::send_like))
        // Messages
        .route("/api/messages", post(messages::send_message))
        .route("/api/matches/:match_id/messages", get(messages::list_messages))
        .route("/api/matches/:match_id/read", post(messages::mark_read))
        .route("/api/users/:id/unread-count", get(messages::unread_count))
        .layer(axum::middleware::from_fn(meetwalk_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
