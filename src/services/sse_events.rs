use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::{
    dto::{
        board::{BoardResponse, CountdownResponse, NotificationResponse},
        sse::ServerEvent,
    },
    state::{
        SseHub,
        session::{BoardSnapshot, SessionEvent},
    },
};

const EVENT_BOARD: &str = "board";
const EVENT_NOTIFICATION: &str = "notification";
const EVENT_COUNTDOWN: &str = "countdown";

/// Encode a board snapshot as a `board` SSE event.
pub fn board_event(snapshot: &BoardSnapshot) -> Option<ServerEvent> {
    encode(EVENT_BOARD, &BoardResponse::from(snapshot))
}

/// Encode any session event into its SSE counterpart.
pub fn session_event(event: &SessionEvent) -> Option<ServerEvent> {
    match event {
        SessionEvent::Board(snapshot) => board_event(snapshot),
        SessionEvent::Notification(notification) => encode(
            EVENT_NOTIFICATION,
            &NotificationResponse::from(notification),
        ),
        SessionEvent::Countdown(countdown) => {
            encode(EVENT_COUNTDOWN, &CountdownResponse::from(*countdown))
        }
    }
}

/// Forward every session event to the public SSE hub until the session goes away.
pub async fn relay_session_events(mut receiver: broadcast::Receiver<SessionEvent>, hub: SseHub) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if let Some(payload) = session_event(&event) {
                    hub.broadcast(payload);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "SSE relay lagged behind the board session");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("board session closed; SSE relay stopped");
}

fn encode<T: Serialize>(event: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}
