use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the matchday board.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::board::get_board,
        crate::routes::board::get_countdown,
        crate::routes::board::join_match,
        crate::routes::board::leave_match,
        crate::routes::notifications::list_notifications,
        crate::routes::notifications::dismiss_notification,
        crate::routes::sse::board_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::board::JoinRequest,
            crate::dto::board::PlayerSummary,
            crate::dto::board::JoinResponse,
            crate::dto::board::MatchSummary,
            crate::dto::board::BoardPhase,
            crate::dto::board::BoardResponse,
            crate::dto::board::CountdownResponse,
            crate::dto::board::NotificationLevel,
            crate::dto::board::NotificationResponse,
            crate::state::board::TeamKey,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "board", description = "Match board and sign-ups"),
        (name = "notifications", description = "Outcome messages of store operations"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
