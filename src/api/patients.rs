// 患者管理 API：列表、创建/更新与历史查询。
use crate::api::errors::{error_response, error_response_with_code};
use crate::schemas::{ChatThreadPayload, PatientPayload, PatientUpsertRequest};
use crate::state::AppState;
use crate::storage::{PatientUpsert, StorageBackend};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/medichat/patients",
            get(list_patients).post(upsert_patient),
        )
        .route(
            "/medichat/patients/{patient_id}/history",
            get(patient_history),
        )
}

async fn list_patients(State(state): State<Arc<AppState>>) -> Result<Json<Value>, Response> {
    let patients = state.storage.list_patients().map_err(storage_error)?;
    let items = patients
        .iter()
        .map(PatientPayload::from)
        .collect::<Vec<_>>();
    Ok(Json(json!({ "data": items })))
}

async fn upsert_patient(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PatientUpsertRequest>,
) -> Result<Json<Value>, Response> {
    if payload.name.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "patient name must not be empty",
        ));
    }
    let input = PatientUpsert {
        id: payload.id,
        name: payload.name.trim().to_string(),
        age: payload.age,
        notes: payload.notes,
    };
    let patient = state
        .storage
        .upsert_patient(&input)
        .map_err(storage_error)?
        .ok_or_else(patient_not_found)?;
    Ok(Json(json!({ "data": PatientPayload::from(&patient) })))
}

async fn patient_history(
    State(state): State<Arc<AppState>>,
    AxumPath(patient_id): AxumPath<i64>,
) -> Result<Json<Value>, Response> {
    let patient = state
        .storage
        .get_patient(patient_id)
        .map_err(storage_error)?
        .ok_or_else(patient_not_found)?;
    let threads = state
        .storage
        .list_patient_history(patient.id)
        .map_err(storage_error)?;
    let items = threads
        .iter()
        .map(ChatThreadPayload::from)
        .collect::<Vec<_>>();
    Ok(Json(json!({ "data": items })))
}

fn patient_not_found() -> Response {
    error_response_with_code(
        StatusCode::NOT_FOUND,
        Some("PATIENT_NOT_FOUND"),
        "Patient not found",
    )
}

fn storage_error(err: anyhow::Error) -> Response {
    error_response_with_code(
        StatusCode::INTERNAL_SERVER_ERROR,
        Some("STORAGE_ERROR"),
        err.to_string(),
    )
}
