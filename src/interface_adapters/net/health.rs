use crate::domain::Phase;
use crate::interface_adapters::http::HealthResponse;
use crate::interface_adapters::state::AppState;

use axum::extract::{Json, State};
use std::sync::Arc;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    // Copy out so the watch borrow ends before building the response.
    let server_state = *state.game.server_state_tx.borrow();
    Json(HealthResponse {
        status: "ok",
        player_count: server_state.player_count,
        game_running: server_state.phase == Phase::Running,
    })
}
