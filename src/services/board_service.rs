use crate::{
    dto::board::{BoardResponse, CountdownResponse, JoinRequest, JoinResponse, PlayerSummary},
    error::ServiceError,
    state::{SharedState, board::TeamKey},
};

/// Current board snapshot.
pub async fn board(state: &SharedState) -> BoardResponse {
    BoardResponse::from(&state.board().snapshot().await)
}

/// Time left until the next daily reset.
pub async fn countdown(state: &SharedState) -> CountdownResponse {
    state.board().countdown().await.into()
}

/// Sign a player up for a team of `match_id`.
///
/// The expanded match is returned to the caller so each client can track its own.
pub async fn join(
    state: &SharedState,
    match_id: &str,
    request: &JoinRequest,
) -> Result<JoinResponse, ServiceError> {
    let player = state.board().add_player(match_id, request).await?;
    Ok(JoinResponse {
        player: PlayerSummary::from(&player),
        expanded_match: match_id.to_string(),
    })
}

/// Remove `player_id` from one team of `match_id`.
pub async fn leave(
    state: &SharedState,
    match_id: &str,
    team: TeamKey,
    player_id: &str,
) -> Result<(), ServiceError> {
    state
        .board()
        .remove_player(match_id, team, player_id)
        .await?;
    Ok(())
}
