//! Route handlers

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;

use super::api::{
    ChatRequest, HealthResponse, MessageView, SessionDetail, SessionListItem, SessionView,
    UpsertSessionRequest,
};
use super::AppState;
use crate::core::{AgentError, AgentResult};
use crate::service::TurnReply;
use crate::session::validate_session_id;
use crate::sql::DATABASE_ENGINE;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AgentResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AgentError::InvalidRequest(rejection.body_text()))
}

/// `POST /api/chat/`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AgentResult<Json<TurnReply>> {
    let request = body(payload)?;
    let reply = state
        .service
        .handle_turn(&request.session_id, &request.message)
        .await?;
    Ok(Json(reply))
}

/// `GET /api/sessions/`
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> AgentResult<Json<Vec<SessionListItem>>> {
    let sessions = state.service.store().list_sessions().await?;
    Ok(Json(sessions.into_iter().map(SessionListItem::from).collect()))
}

/// `POST /api/sessions/`
pub async fn upsert_session(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpsertSessionRequest>, JsonRejection>,
) -> AgentResult<impl IntoResponse> {
    let request = body(payload)?;
    validate_session_id(&request.session_id)?;

    let (record, created) = state
        .service
        .store()
        .upsert_session(&request.session_id, request.user_label.as_deref())
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(SessionView::from(record))))
}

/// `GET /api/sessions/{id}/`
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AgentResult<Json<SessionDetail>> {
    let store = state.service.store();
    let record = store
        .find_session(&session_id)
        .await?
        .ok_or_else(|| AgentError::SessionNotFound(session_id.clone()))?;
    let messages = store.messages(&session_id).await?;

    Ok(Json(SessionDetail {
        session: record.into(),
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}

/// `DELETE /api/sessions/{id}/`
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AgentResult<StatusCode> {
    state.service.store().delete_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/health/`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, last_message_at) = match state.service.store().last_message_at().await {
        Ok(last) => ("ok", last),
        Err(e) => {
            tracing::warn!("[Api] Health check could not read the history: {}", e);
            ("degraded", None)
        }
    };

    Json(HealthResponse {
        status,
        model_provider: state.model_provider.clone(),
        model: state.model.clone(),
        database_engine: DATABASE_ENGINE,
        last_message_at,
        server_time: Utc::now(),
    })
}
