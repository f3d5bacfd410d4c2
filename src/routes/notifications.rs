use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::board::NotificationResponse, error::AppError, services::notification_service,
    state::SharedState,
};

/// Routes listing and dismissing user notifications.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}", delete(dismiss_notification))
}

/// Pending notifications, oldest first.
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    responses((status = 200, description = "Pending notifications", body = [NotificationResponse]))
)]
pub async fn list_notifications(
    State(state): State<SharedState>,
) -> Json<Vec<NotificationResponse>> {
    Json(notification_service::list(&state).await)
}

/// Dismiss a notification.
#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    params(("id" = Uuid, Path, description = "Identifier of the notification")),
    responses(
        (status = 204, description = "Notification dismissed"),
        (status = 404, description = "No pending notification with this id")
    )
)]
pub async fn dismiss_notification(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    notification_service::dismiss(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
