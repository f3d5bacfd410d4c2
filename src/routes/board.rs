use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::{
    dto::board::{BoardResponse, CountdownResponse, JoinRequest, JoinResponse},
    error::AppError,
    services::board_service,
    state::{SharedState, board::TeamKey},
};

/// Routes exposing the board and the join/leave operations.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/board", get(get_board))
        .route("/countdown", get(get_countdown))
        .route("/matches/{match_id}/players", post(join_match))
        .route(
            "/matches/{match_id}/{team}/players/{player_id}",
            delete(leave_match),
        )
}

/// Current board with both rosters of every match.
#[utoipa::path(
    get,
    path = "/board",
    tag = "board",
    responses((status = 200, description = "Board snapshot", body = BoardResponse))
)]
pub async fn get_board(State(state): State<SharedState>) -> Json<BoardResponse> {
    Json(board_service::board(&state).await)
}

/// Hours and minutes left until the board resets at midnight.
#[utoipa::path(
    get,
    path = "/countdown",
    tag = "board",
    responses((status = 200, description = "Time until the daily reset", body = CountdownResponse))
)]
pub async fn get_countdown(State(state): State<SharedState>) -> Json<CountdownResponse> {
    Json(board_service::countdown(&state).await)
}

/// Sign up for one team of a match.
#[utoipa::path(
    post,
    path = "/matches/{match_id}/players",
    tag = "board",
    params(("match_id" = String, Path, description = "Key of the match to join")),
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Player signed up", body = JoinResponse),
        (status = 400, description = "Name, phone or team missing"),
        (status = 404, description = "Unknown match"),
        (status = 503, description = "The store rejected the write")
    )
)]
pub async fn join_match(
    State(state): State<SharedState>,
    Path(match_id): Path<String>,
    Json(payload): Json<JoinRequest>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    let joined = board_service::join(&state, &match_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(joined)))
}

/// Remove a player from a team.
#[utoipa::path(
    delete,
    path = "/matches/{match_id}/{team}/players/{player_id}",
    tag = "board",
    params(
        ("match_id" = String, Path, description = "Key of the match"),
        ("team" = TeamKey, Path, description = "Team the player signed up for"),
        ("player_id" = String, Path, description = "Identifier of the player")
    ),
    responses(
        (status = 204, description = "Player removed"),
        (status = 503, description = "The store rejected the write")
    )
)]
pub async fn leave_match(
    State(state): State<SharedState>,
    Path((match_id, team, player_id)): Path<(String, TeamKey, String)>,
) -> Result<StatusCode, AppError> {
    board_service::leave(&state, &match_id, team, &player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
