use std::sync::Arc;

use axum::{Router, middleware::from_fn};
use dotenv::dotenv;
use tower_http::cors::CorsLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::FmtSubscriber;

use crate::{
    common::app_state::AppState, config::config::CONFIG, health::handlers::health_routes,
    lobby::handlers::lobby_routes, mw::request_mw::request_mw, question::loader::load_questions,
};

mod common;
mod config;
mod health;
mod lobby;
mod mw;
mod question;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() {
    // Initialize .env
    dotenv().ok();

    // Initialize logging
    let level = CONFIG
        .log
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::DEBUG);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing");

    // Initialize state
    let pool = load_questions(&CONFIG.game.questions_path).unwrap_or_else(|e| panic!("{}", e));
    let state = AppState::new(Arc::new(pool), CONFIG.expiry_interval());
    let _cleanup = state
        .get_registry()
        .start_cleanup_routine(CONFIG.cleanup_interval());

    // Initialize webserver
    let app = app_routes(state);
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", CONFIG.server.address, CONFIG.server.port))
            .await
            .unwrap_or_else(|e| panic!("Failed to bind listener: {}", e));

    info!(
        "Server listening on address: {}",
        listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default()
    );
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

pub fn app_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/health", health_routes(state.clone()))
        .nest("/game", lobby_routes(state))
        .layer(from_fn(request_mw))
        // Any origin may drive a lobby, same as the web client expects
        .layer(CorsLayer::permissive())
}
