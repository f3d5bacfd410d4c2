use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/board",
    tag = "sse",
    responses((status = 200, description = "Board SSE stream: `board`, `notification` and `countdown` events", content_type = "text/event-stream", body = String))
)]
/// Stream the board, notifications and countdown to connected frontends.
pub async fn board_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (initial, receiver) = sse_service::subscribe_board(&state).await;
    info!("New board SSE connection");
    sse_service::to_sse_stream(initial, receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/board", get(board_stream))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use futures::StreamExt;
    use serde_json::json;
    use tokio::time::timeout;
    use tower::ServiceExt;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn board_is_sent_on_connect() {
        let app = TestApp::ready(json!({
            "matches": {"match1": {"time": "NTPA-13:00"}},
            "lastResetDate": "2024-01-02"
        }))
        .await;

        let response = app
            .router()
            .oneshot(Request::get("/sse/board").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body().into_data_stream();
        let chunk = timeout(Duration::from_secs(1), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.contains(&"event: board"), "{text}");
        let data = lines
            .iter()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap_or_else(|| panic!("no data line in {text}"));
        let board: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(board["matches"][0]["id"], "match1");
        assert_eq!(board["phase"], "ready");
    }
}
