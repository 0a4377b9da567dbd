// 聊天 API：接收用户消息，串行调用两个智能体并整轮落库。
use crate::agents::dual_agent_responses;
use crate::api::errors::error_response_with_code;
use crate::schemas::{SendChatRequest, SendChatResponse};
use crate::state::AppState;
use crate::storage::StorageBackend;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/medichat/chat/send", post(send_chat))
}

#[derive(Debug)]
pub struct ChatError {
    code: &'static str,
    message: String,
}

impl ChatError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: "INVALID_REQUEST",
            message: message.into(),
        }
    }

    fn patient_not_found() -> Self {
        Self {
            code: "PATIENT_NOT_FOUND",
            message: "Patient not found".to_string(),
        }
    }

    fn upstream(err: anyhow::Error) -> Self {
        Self {
            code: "UPSTREAM_ERROR",
            message: err.to_string(),
        }
    }

    fn storage(err: anyhow::Error) -> Self {
        Self {
            code: "STORAGE_ERROR",
            message: err.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            "INVALID_REQUEST" => StatusCode::BAD_REQUEST,
            "PATIENT_NOT_FOUND" => StatusCode::NOT_FOUND,
            "UPSTREAM_ERROR" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ChatError {}

async fn send_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendChatRequest>,
) -> Result<Json<Value>, Response> {
    let response = handle_send_chat(&state, payload)
        .await
        .map_err(|err| error_response_with_code(err.status(), Some(err.code()), err.to_string()))?;
    Ok(Json(json!({ "data": response })))
}

/// 聊天轮次主流程：先校验入参和患者存在性，再串行取得两个智能体回复，
/// 最后整轮事务落库。上游失败时三条消息一条也不会写入。
pub async fn handle_send_chat(
    state: &AppState,
    request: SendChatRequest,
) -> Result<SendChatResponse, ChatError> {
    // 入参校验先于任何存储访问。
    if request.message.trim().is_empty() {
        return Err(ChatError::invalid_request("message must not be empty"));
    }

    let patient = state
        .storage
        .get_patient(request.patient_id)
        .map_err(ChatError::storage)?
        .ok_or_else(ChatError::patient_not_found)?;

    let client = state.llm_client();
    let (agent1_text, agent2_text) = dual_agent_responses(&client, &request.message)
        .await
        .map_err(ChatError::upstream)?;

    let turn = state
        .storage
        .append_chat_turn(patient.id, &request.message, &agent1_text, &agent2_text)
        .map_err(ChatError::storage)?;

    Ok(SendChatResponse::from(&turn))
}
