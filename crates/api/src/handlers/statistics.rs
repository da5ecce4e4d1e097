use axum::extract::{Query, State};
use chrono::NaiveDate;
use fieldops_dispatch::StatisticsFilter;
use fieldops_domain::entities::DispatchStatus;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::response::success;
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub technician_id: Option<Uuid>,
    pub status: Option<DispatchStatus>,
}

/// 派工统计汇总
pub async fn dispatch_statistics(
    State(state): State<AppState>,
    Query(params): Query<StatisticsQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let stats = state
        .statistics
        .statistics(&StatisticsFilter {
            from_date: params.from,
            to_date: params.to,
            technician_id: params.technician_id,
            status: params.status,
        })
        .await?;
    Ok(success(stats))
}
