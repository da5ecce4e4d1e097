use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fieldops_dispatch::UpdateDispatchSchedule;
use fieldops_domain::entities::{DispatchFilter, DispatchStatus, Priority};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::actor::Actor;
use crate::error::ApiResult;
use crate::handlers::page_to_limit_offset;
use crate::response::{created, no_content, success, PaginatedResponse};
use crate::routes::AppState;

/// 派工单查询参数
#[derive(Debug, Deserialize)]
pub struct DispatchQuery {
    pub status: Option<DispatchStatus>,
    pub technician_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// 从已排班工单补建派工单
#[derive(Debug, Deserialize)]
pub struct CreateDispatchRequest {
    pub job_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub scheduled_date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub technician_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct StartDispatchRequest {
    pub actual_start: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteDispatchRequest {
    pub actual_end: Option<DateTime<Utc>>,
    #[validate(range(min = 0, max = 100, message = "完成百分比必须在0-100之间"))]
    pub completion_percentage: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelDispatchRequest {
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DispatchStatus,
    pub notes: Option<String>,
}

/// 派工单列表
pub async fn list_dispatches(
    State(state): State<AppState>,
    Query(params): Query<DispatchQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let (page, page_size, offset) = page_to_limit_offset(params.page, params.page_size);
    let filter = DispatchFilter {
        status: params.status,
        technician_id: params.technician_id,
        priority: params.priority,
        from_date: params.from,
        to_date: params.to,
        limit: Some(page_size),
        offset: Some(offset),
    };
    let (dispatches, total) = state.dispatches.list(&filter).await?;
    Ok(success(PaginatedResponse::new(
        dispatches, total, page, page_size,
    )))
}

/// 获取单个派工单
pub async fn get_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let dispatch = state.dispatches.get(id).await?;
    Ok(success(dispatch))
}

/// 创建派工单
pub async fn create_dispatch(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<CreateDispatchRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let dispatch = state
        .assignment
        .create_dispatch_for_job(request.job_id, request.notes, &actor)
        .await?;
    Ok(created(dispatch))
}

/// 调整派工单排班
pub async fn update_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<UpdateScheduleRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let update = UpdateDispatchSchedule {
        scheduled_date: request.scheduled_date,
        start: request.start,
        end: request.end,
        technician_ids: request.technician_ids,
    };
    let dispatch = state.dispatches.update_schedule(id, &update, &actor).await?;
    Ok(success(dispatch))
}

/// 删除派工单（软删除）
pub async fn delete_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
) -> ApiResult<impl axum::response::IntoResponse> {
    state.dispatches.delete(id, &actor).await?;
    Ok(no_content())
}

/// 开始执行
pub async fn start_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<StartDispatchRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let dispatch = state
        .dispatches
        .start(id, request.actual_start, request.notes, &actor)
        .await?;
    Ok(success(dispatch))
}

/// 完成派工单
pub async fn complete_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<CompleteDispatchRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    request.validate()?;
    let dispatch = state
        .dispatches
        .complete(
            id,
            request.actual_end,
            request.completion_percentage,
            request.notes,
            &actor,
        )
        .await?;
    Ok(success(dispatch))
}

/// 取消派工单
pub async fn cancel_dispatch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<CancelDispatchRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let dispatch = state
        .dispatches
        .cancel(id, request.reason, request.notes, &actor)
        .await?;
    Ok(success(dispatch))
}

/// 通用状态更新
pub async fn update_dispatch_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let dispatch = state
        .dispatches
        .update_status(id, request.status, request.notes, &actor)
        .await?;
    Ok(success(dispatch))
}
