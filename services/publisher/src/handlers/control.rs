//! HTTP control surface: service info, health, scenario switching and
//! simulation lifecycle.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;
use crate::SERVICE_VERSION;

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "market-data-publisher",
        "version": SERVICE_VERSION,
        "status": "running",
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Latest health sample, or a starting stub before the first tick.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let sample = match state.last_sample.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    match sample {
        Some(sample) => Json(json!(sample)),
        None => Json(json!({
            "server_status": "starting",
            "uptime_seconds": state.uptime_seconds(),
        })),
    }
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let sample = match state.last_sample.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    Json(json!({
        "service": "market-data-publisher",
        "version": SERVICE_VERSION,
        "uptime_seconds": state.uptime_seconds(),
        "current_scenario": state.scenario.active(),
        "queue_size": state.queue.depth(),
        "active_clients": state.registry.client_count(),
        "health": sample,
        "simulation": {
            "running": state.simulation.is_running(),
            "progress": state.simulation.progress(),
        },
        "config": {
            "queue_cap": state.config.queue_cap,
            "processing_delay_ms": state.config.processing_delay_ms,
            "heartbeat_interval_ms": state.config.heartbeat_interval.as_millis() as u64,
            "memory_threshold_mb": state.config.memory_threshold_mb,
            "top_levels": state.config.top_levels,
            "feed_seed": state.config.feed_seed,
        },
    }))
}

pub async fn list_scenarios(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "scenarios": state.scenario.available(),
        "current": state.scenario.active(),
    }))
}

/// Switch the active scenario. Unknown names are rejected without
/// touching the current scenario.
pub async fn switch_scenario(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let switched = state.scenario.switch(&name)?;
    Ok(Json(json!({
        "status": "switched",
        "scenario": switched,
    })))
}

pub async fn start_simulation(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    if !state.start_simulation() {
        return Err(AppError::BadRequest("simulation already running".to_string()));
    }
    Ok(Json(json!({
        "status": "started",
        "scenario": state.scenario.active(),
    })))
}

pub async fn stop_simulation(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    if !state.stop_simulation() {
        return Err(AppError::BadRequest("simulation not running".to_string()));
    }
    Ok(Json(json!({
        "status": "stopped",
        "queue_size": state.queue.depth(),
    })))
}

pub async fn simulation_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "running": state.simulation.is_running(),
        "scenario": state.scenario.active(),
        "progress": state.simulation.progress(),
    }))
}
