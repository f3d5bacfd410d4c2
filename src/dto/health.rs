use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::board::BoardPhase;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the board has finished its first load.
    pub phase: BoardPhase,
}

impl HealthResponse {
    /// The store answered its health check.
    pub fn ok(phase: BoardPhase) -> Self {
        Self {
            status: "ok".to_string(),
            phase,
        }
    }

    /// The store could not be reached.
    pub fn degraded(phase: BoardPhase) -> Self {
        Self {
            status: "degraded".to_string(),
            phase,
        }
    }
}
