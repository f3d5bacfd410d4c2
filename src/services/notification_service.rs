use uuid::Uuid;

use crate::{dto::board::NotificationResponse, error::ServiceError, state::SharedState};

/// Pending notifications, oldest first.
pub async fn list(state: &SharedState) -> Vec<NotificationResponse> {
    state
        .board()
        .notifications()
        .await
        .iter()
        .map(NotificationResponse::from)
        .collect()
}

/// Dismiss a pending notification.
pub async fn dismiss(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    if state.board().dismiss_notification(id).await {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!("notification `{id}`")))
    }
}
