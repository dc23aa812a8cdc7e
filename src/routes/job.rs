use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::job_dto::{
        ApprovalHistoryResponse, ApprovePayload, CreateJobPayload, PublishPayload, RejectPayload,
        SetStatusPayload, SubmitForApprovalPayload, UpdateJobPayload,
    },
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn create_job(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<CreateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let job = state.code_allocator.allocate(tenant_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[axum::debug_handler]
pub async fn get_job(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let job = state.lifecycle.get(tenant_id, job_id).await?;
    Ok(Json(job))
}

#[axum::debug_handler]
pub async fn get_job_by_code(
    State(state): State<AppState>,
    Path((tenant_id, code)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse> {
    let job = state.lifecycle.get_by_code(tenant_id, &code).await?;
    Ok(Json(job))
}

#[axum::debug_handler]
pub async fn update_job(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let job = state
        .lifecycle
        .update_details(tenant_id, job_id, payload.into())
        .await?;
    Ok(Json(job))
}

#[axum::debug_handler]
pub async fn list_approvals(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let approvals = state.lifecycle.approvals(tenant_id, job_id).await?;
    Ok(Json(ApprovalHistoryResponse { job_id, approvals }))
}

#[axum::debug_handler]
pub async fn submit_for_approval(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SubmitForApprovalPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state
        .approval_chain
        .submit(
            tenant_id,
            job_id,
            payload.approver_ids,
            payload.requested_by,
            payload.comment,
        )
        .await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn approve_job(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ApprovePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let job = state
        .approval_chain
        .approve(tenant_id, job_id, payload.approver_id, payload.comment)
        .await?;
    Ok(Json(job))
}

#[axum::debug_handler]
pub async fn reject_job(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RejectPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let job = state
        .approval_chain
        .reject(
            tenant_id,
            job_id,
            payload.approver_id,
            payload.reason,
            payload.comment,
        )
        .await?;
    Ok(Json(job))
}

#[axum::debug_handler]
pub async fn publish_job(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<PublishPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let outcome = state
        .publish_dispatcher
        .publish(tenant_id, job_id, &payload.channels)
        .await?;
    Ok(Json(outcome))
}

#[axum::debug_handler]
pub async fn set_job_status(
    State(state): State<AppState>,
    Path((tenant_id, job_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetStatusPayload>,
) -> Result<impl IntoResponse> {
    let job = state
        .lifecycle
        .set_status(tenant_id, job_id, payload.status)
        .await?;
    Ok(Json(job))
}
