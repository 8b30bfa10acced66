use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};

use super::common::{json_body, validate_input};
use crate::{dto::QuestionRequest, errors::ServiceError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub status: String,
}

pub fn query_routes() -> Router<AppState> {
    Router::new().route("/query", post(answer_question))
}

/// Answers a natural-language business question.
pub async fn answer_question(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ServiceError> {
    let request = json_body(payload)?;
    validate_input(&request)?;

    let answer = state.assistant.answer(request.question.trim()).await?;
    Ok(Json(AnswerResponse {
        answer,
        status: "success".to_string(),
    }))
}
