use axum::Router;

use crate::state::SharedState;

/// Board, countdown and join/leave routes.
pub mod board;
/// Swagger UI routes.
pub mod docs;
/// Health check routes.
pub mod health;
/// Notification routes.
pub mod notifications;
/// Server-sent events routes.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(board::router())
        .merge(notifications::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{sync::Arc, time::Duration};

    use axum::{Router, body::Body, response::Response};
    use chrono::NaiveDate;
    use serde_json::Value;
    use tokio::time::{Instant, sleep};

    use crate::{
        config::AppConfig,
        dao::tree_store::memory::MemoryTreeStore,
        state::{AppState, SharedState, clock::FixedClock, session::LoadPhase},
    };

    /// Application running on a memory store with the clock fixed at 2024-01-02 12:00.
    pub struct TestApp {
        pub state: SharedState,
        pub store: MemoryTreeStore,
    }

    impl TestApp {
        /// Start the app on `document` and wait for the first matches delivery.
        pub async fn ready(document: Value) -> Self {
            let store = MemoryTreeStore::with_document(document);
            let now = NaiveDate::from_ymd_opt(2024, 1, 2)
                .and_then(|date| date.and_hms_opt(12, 0, 0))
                .unwrap();
            let state = AppState::new(
                Arc::new(store.clone()),
                Arc::new(FixedClock::new(now)),
                AppConfig::default().session_settings(),
            );

            let deadline = Instant::now() + Duration::from_secs(2);
            while state.board().snapshot().await.phase != LoadPhase::Ready {
                assert!(Instant::now() < deadline, "board never became ready");
                sleep(Duration::from_millis(10)).await;
            }

            Self { state, store }
        }

        pub fn router(&self) -> Router {
            super::router(self.state.clone())
        }
    }

    pub async fn read_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
