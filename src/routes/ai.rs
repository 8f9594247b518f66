//! AI endpoints — thin HTTP glue over the AI service.
//!
//! Every handler answers 200: the service layer substitutes fallbacks for
//! any upstream failure, so a degraded model never surfaces as an error to
//! the workspace.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::services::ai::{self, ChatTurn, Topic};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BreakdownRequest {
    pub goals: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub topics: Vec<Topic>,
}

pub async fn breakdown(State(state): State<AppState>, Json(req): Json<BreakdownRequest>) -> Json<BreakdownResponse> {
    let topics = ai::goal_breakdown(state.llm.as_ref(), &req.goals).await;
    Json(BreakdownResponse { topics })
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub review: String,
}

pub async fn review(State(state): State<AppState>, Json(req): Json<ReviewRequest>) -> Json<ReviewResponse> {
    let review = ai::code_review(state.llm.as_ref(), &req.code).await;
    Json(ReviewResponse { review })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ChatResponse> {
    let reply = ai::assistant_chat(state.llm.as_ref(), &req.message, &req.history, req.context.as_deref()).await;
    Json(ChatResponse { reply })
}

#[cfg(test)]
#[path = "ai_test.rs"]
mod tests;
