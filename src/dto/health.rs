use serde::Serialize;
use utoipa::ToSchema;

/// Health status returned by the healthcheck endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Number of game rooms with at least one live connection.
    pub active_rooms: usize,
}
