use crate::handlers::{control, ws};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(control::root))
        .route("/health", get(control::health))
        .route("/status", get(control::status))
        .route("/scenarios", get(control::list_scenarios))
        .route("/scenarios/:name", post(control::switch_scenario))
        .route("/simulation/start", post(control::start_simulation))
        .route("/simulation/stop", post(control::stop_simulation))
        .route("/simulation/status", get(control::simulation_status))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
