use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use fieldops_domain::entities::{JobFilter, Priority};
use fieldops_planning::{AssignJobCommand, ValidateAssignmentRequest};
use serde::Deserialize;
use uuid::Uuid;

use crate::actor::Actor;
use crate::error::{ApiError, ApiResult};
use crate::handlers::page_to_limit_offset;
use crate::response::{success, PaginatedResponse};
use crate::routes::AppState;

/// 未排班工单查询参数
#[derive(Debug, Deserialize)]
pub struct UnassignedJobsQuery {
    pub priority: Option<Priority>,
    pub skill: Option<String>,
    pub service_order_id: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// 工单分配请求
#[derive(Debug, Deserialize)]
pub struct AssignJobRequest {
    pub technician_ids: Vec<Uuid>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    #[serde(default = "default_auto_create")]
    pub auto_create_dispatch: bool,
}

fn default_auto_create() -> bool {
    true
}

/// 批量分配请求
#[derive(Debug, Deserialize)]
pub struct BatchAssignRequest {
    pub assignments: Vec<AssignJobCommand>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// 逗号分隔的技能列表
    pub skills: Option<String>,
}

/// 查询未排班工单
pub async fn list_unassigned_jobs(
    State(state): State<AppState>,
    Query(params): Query<UnassignedJobsQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let (page, page_size, offset) = page_to_limit_offset(params.page, params.page_size);
    let filter = JobFilter {
        service_order_id: params.service_order_id,
        priority: params.priority,
        skill: params.skill,
        limit: Some(page_size),
        offset: Some(offset),
    };
    let (jobs, total) = state.assignment.list_unassigned(&filter).await?;
    Ok(success(PaginatedResponse::new(jobs, total, page, page_size)))
}

/// 分配工单
pub async fn assign_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    Json(request): Json<AssignJobRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let command = AssignJobCommand {
        job_id: id,
        technician_ids: request.technician_ids,
        date: request.date,
        start: request.start,
        end: request.end,
        priority: request.priority,
        notes: request.notes,
        auto_create_dispatch: request.auto_create_dispatch,
    };
    let result = state.assignment.assign_job(&command, &actor).await?;
    Ok(success(result))
}

/// 批量分配工单，逐项隔离失败
pub async fn batch_assign(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(request): Json<BatchAssignRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if request.assignments.is_empty() {
        return Err(ApiError::BadRequest("分配列表不能为空".to_string()));
    }
    let result = state.assignment.batch_assign(&request.assignments, &actor).await;
    Ok(success(result))
}

/// 排班预检（只读，不落库）
pub async fn validate_assignment(
    State(state): State<AppState>,
    Json(request): Json<ValidateAssignmentRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let check = state.assignment.validator().validate(&request).await?;
    Ok(success(check))
}

/// 技术员日程查询
pub async fn technician_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ScheduleQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let schedule = state
        .assignment
        .resolver()
        .resolve(id, params.from, params.to)
        .await?;
    Ok(success(schedule))
}

/// 可用技术员搜索
pub async fn available_technicians(
    State(state): State<AppState>,
    Query(params): Query<AvailableQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let skills: Vec<String> = params
        .skills
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    let available = state
        .assignment
        .find_available(params.date, params.start, params.end, &skills)
        .await?;
    Ok(success(available))
}
