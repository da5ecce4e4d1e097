use axum::body::Bytes;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use fieldops_dispatch::{NewExpense, NewMaterialUsage, NewTimeEntry, NewUpload};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::actor::Actor;
use crate::error::{ApiError, ApiResult};
use crate::response::{created, success};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AddTimeEntryRequest {
    pub technician_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default)]
    pub hourly_rate: f64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddExpenseRequest {
    pub technician_id: Uuid,
    #[validate(length(min = 1, message = "费用类别不能为空"))]
    pub category: String,
    #[validate(range(min = 0.0, message = "费用金额不能为负数"))]
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub description: Option<String>,
}

fn default_currency() -> String {
    "CNY".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AddMaterialRequest {
    pub material_code: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddNoteRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
    pub content_type: Option<String>,
}

/// 新增工时记录
pub async fn add_time_entry(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<AddTimeEntryRequest>,
) -> ApiResult<impl IntoResponse> {
    let entry = state
        .items
        .add_time_entry(
            dispatch_id,
            &NewTimeEntry {
                technician_id: request.technician_id,
                started_at: request.started_at,
                ended_at: request.ended_at,
                hourly_rate: request.hourly_rate,
                description: request.description,
            },
            &actor,
        )
        .await?;
    Ok(created(entry))
}

pub async fn list_time_entries(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let entries = state.items.list_time_entries(dispatch_id).await?;
    Ok(success(entries))
}

pub async fn approve_time_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> ApiResult<impl IntoResponse> {
    let entry = state.items.approve_time_entry(id, &actor).await?;
    Ok(success(entry))
}

pub async fn reject_time_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> ApiResult<impl IntoResponse> {
    let entry = state.items.reject_time_entry(id, &actor).await?;
    Ok(success(entry))
}

/// 新增费用记录
pub async fn add_expense(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<AddExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    request.validate()?;
    let expense = state
        .items
        .add_expense(
            dispatch_id,
            &NewExpense {
                technician_id: request.technician_id,
                category: request.category,
                amount: request.amount,
                currency: request.currency,
                description: request.description,
            },
            &actor,
        )
        .await?;
    Ok(created(expense))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let expenses = state.items.list_expenses(dispatch_id).await?;
    Ok(success(expenses))
}

pub async fn approve_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> ApiResult<impl IntoResponse> {
    let expense = state.items.approve_expense(id, &actor).await?;
    Ok(success(expense))
}

pub async fn reject_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> ApiResult<impl IntoResponse> {
    let expense = state.items.reject_expense(id, &actor).await?;
    Ok(success(expense))
}

/// 新增材料记录
pub async fn add_material(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<AddMaterialRequest>,
) -> ApiResult<impl IntoResponse> {
    let usage = state
        .items
        .add_material_usage(
            dispatch_id,
            &NewMaterialUsage {
                material_code: request.material_code,
                quantity: request.quantity,
                unit: request.unit,
                unit_cost: request.unit_cost,
                description: request.description,
            },
            &actor,
        )
        .await?;
    Ok(created(usage))
}

pub async fn list_materials(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let usages = state.items.list_material_usages(dispatch_id).await?;
    Ok(success(usages))
}

pub async fn approve_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> ApiResult<impl IntoResponse> {
    let usage = state.items.approve_material_usage(id, &actor).await?;
    Ok(success(usage))
}

pub async fn reject_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> ApiResult<impl IntoResponse> {
    let usage = state.items.reject_material_usage(id, &actor).await?;
    Ok(success(usage))
}

/// 新增备注
pub async fn add_note(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<AddNoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let note = state.items.add_note(dispatch_id, request.body, &actor).await?;
    Ok(created(note))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let notes = state.items.list_notes(dispatch_id).await?;
    Ok(success(notes))
}

/// 上传附件：请求体为文件原始字节，元数据走查询参数
pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
    Query(params): Query<UploadQuery>,
    Actor(actor): Actor,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("附件内容不能为空".to_string()));
    }
    let attachment = state
        .items
        .upload_attachment(
            dispatch_id,
            NewUpload {
                file_name: params.file_name,
                content_type: params
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                content: body.to_vec(),
            },
            &actor,
        )
        .await?;
    Ok(created(attachment))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Path(dispatch_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let attachments = state.items.list_attachments(dispatch_id).await?;
    Ok(success(attachments))
}

/// 下载附件内容
pub async fn download_attachment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (attachment, content) = state.items.get_attachment(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, attachment.content_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment.file_name),
            ),
        ],
        content,
    ))
}
