use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the store and report the board load phase alongside it.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let phase = state.board().snapshot().await.phase.into();

    match state.board().store().health_check().await {
        Ok(()) => HealthResponse::ok(phase),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(phase)
        }
    }
}
