/// Domain types for matches and players.
pub mod board;
/// Wall-clock abstraction.
pub mod clock;
/// Time left until midnight.
pub mod countdown;
/// Dismissible user notifications.
pub mod notifications;
/// Daily reset rules.
pub mod reset;
/// Board session controller.
pub mod session;
mod sse;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    dao::tree_store::TreeStore,
    services::sse_events::relay_session_events,
    state::{
        clock::Clock,
        session::{BoardSession, SessionHandle, SessionSettings},
    },
};

pub use self::sse::SseHub;

/// Cheaply clonable handle to [`AppState`] used as the router state.
pub type SharedState = Arc<AppState>;

const PUBLIC_SSE_CAPACITY: usize = 64;

/// Central application state: the running board session and the SSE fan-out fed by it.
pub struct AppState {
    board: SessionHandle,
    public_sse: SseHub,
    relay: JoinHandle<()>,
}

impl AppState {
    /// Start the board session on `store` and wire its events into the public SSE hub.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        store: Arc<dyn TreeStore>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> SharedState {
        let board = BoardSession::start(store, clock, settings);
        let public_sse = SseHub::new(PUBLIC_SSE_CAPACITY);
        let relay = tokio::spawn(relay_session_events(board.subscribe(), public_sse.clone()));

        Arc::new(Self {
            board,
            public_sse,
            relay,
        })
    }

    /// The running board session.
    pub fn board(&self) -> &BoardSession {
        &self.board
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.relay.abort();
    }
}
