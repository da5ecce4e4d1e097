use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use fieldops_dispatch::{DispatchItemService, DispatchService, StatisticsService};
use fieldops_planning::AssignmentService;

use crate::handlers::{
    dispatches::{
        cancel_dispatch, complete_dispatch, create_dispatch, delete_dispatch, get_dispatch,
        list_dispatches, start_dispatch, update_dispatch, update_dispatch_status,
    },
    health::health_check,
    items::{
        add_expense, add_material, add_note, add_time_entry, approve_expense, approve_material,
        approve_time_entry, download_attachment, list_attachments, list_expenses, list_materials,
        list_notes, list_time_entries, reject_expense, reject_material, reject_time_entry,
        upload_attachment,
    },
    planning::{
        assign_job, available_technicians, batch_assign, list_unassigned_jobs,
        technician_schedule, validate_assignment,
    },
    statistics::dispatch_statistics,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub assignment: Arc<AssignmentService>,
    pub dispatches: Arc<DispatchService>,
    pub items: Arc<DispatchItemService>,
    pub statistics: Arc<StatisticsService>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 排班规划API
        .route("/api/jobs/unassigned", get(list_unassigned_jobs))
        .route("/api/jobs/{id}/assign", post(assign_job))
        .route("/api/jobs/assign-batch", post(batch_assign))
        .route("/api/assignments/validate", post(validate_assignment))
        .route("/api/technicians/{id}/schedule", get(technician_schedule))
        .route("/api/technicians/available", get(available_technicians))
        // 派工单API
        .route("/api/dispatches", get(list_dispatches).post(create_dispatch))
        .route("/api/dispatches/{id}", get(get_dispatch))
        .route("/api/dispatches/{id}/update", post(update_dispatch))
        .route("/api/dispatches/{id}/delete", post(delete_dispatch))
        .route("/api/dispatches/{id}/start", post(start_dispatch))
        .route("/api/dispatches/{id}/complete", post(complete_dispatch))
        .route("/api/dispatches/{id}/cancel", post(cancel_dispatch))
        .route("/api/dispatches/{id}/status", post(update_dispatch_status))
        // 派工子记录API
        .route(
            "/api/dispatches/{id}/time-entries",
            get(list_time_entries).post(add_time_entry),
        )
        .route("/api/time-entries/{id}/approve", post(approve_time_entry))
        .route("/api/time-entries/{id}/reject", post(reject_time_entry))
        .route(
            "/api/dispatches/{id}/expenses",
            get(list_expenses).post(add_expense),
        )
        .route("/api/expenses/{id}/approve", post(approve_expense))
        .route("/api/expenses/{id}/reject", post(reject_expense))
        .route(
            "/api/dispatches/{id}/materials",
            get(list_materials).post(add_material),
        )
        .route("/api/materials/{id}/approve", post(approve_material))
        .route("/api/materials/{id}/reject", post(reject_material))
        .route("/api/dispatches/{id}/notes", get(list_notes).post(add_note))
        .route(
            "/api/dispatches/{id}/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route("/api/attachments/{id}", get(download_attachment))
        // 统计API
        .route("/api/statistics/dispatches", get(dispatch_statistics))
        .with_state(state)
}
