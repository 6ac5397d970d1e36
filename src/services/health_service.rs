//! Liveness reporting.

use crate::{dto::health::HealthResponse, state::SharedState};

/// Current health snapshot of the server.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse {
        status: "ok",
        active_rooms: state.rooms().active_rooms(),
    }
}
