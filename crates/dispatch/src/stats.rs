use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use fieldops_core::FieldOpsResult;
use fieldops_domain::entities::{ApprovalStatus, DispatchFilter, DispatchStatus};
use fieldops_domain::repositories::{DispatchItemRepository, DispatchRepository};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// 统计查询条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsFilter {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub technician_id: Option<Uuid>,
    pub status: Option<DispatchStatus>,
}

/// 派工统计汇总，金额只计入已批准的子记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchStatistics {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub by_priority: HashMap<String, i64>,
    /// 已完成派工单从实际开始到实际结束的平均时长
    pub average_completion_hours: Option<f64>,
    pub total_time_minutes: i64,
    pub total_labor_cost: f64,
    pub total_expense_amount: f64,
    pub total_material_cost: f64,
}

/// 只读统计服务：按需从当前数据计算，不缓存、不落盘
pub struct StatisticsService {
    dispatch_repo: Arc<dyn DispatchRepository>,
    item_repo: Arc<dyn DispatchItemRepository>,
}

impl StatisticsService {
    pub fn new(
        dispatch_repo: Arc<dyn DispatchRepository>,
        item_repo: Arc<dyn DispatchItemRepository>,
    ) -> Self {
        Self {
            dispatch_repo,
            item_repo,
        }
    }

    pub async fn statistics(
        &self,
        filter: &StatisticsFilter,
    ) -> FieldOpsResult<DispatchStatistics> {
        let dispatch_filter = DispatchFilter {
            status: filter.status,
            technician_id: filter.technician_id,
            from_date: filter.from_date,
            to_date: filter.to_date,
            // 统计是全量汇总，不分页
            limit: Some(i64::MAX),
            ..Default::default()
        };
        let dispatches = self.dispatch_repo.list(&dispatch_filter).await?;

        let mut by_status: HashMap<String, i64> = HashMap::new();
        let mut by_priority: HashMap<String, i64> = HashMap::new();
        let mut completion_minutes: Vec<i64> = Vec::new();
        let mut total_time_minutes = 0i64;
        let mut total_labor_cost = 0.0f64;
        let mut total_expense_amount = 0.0f64;
        let mut total_material_cost = 0.0f64;

        for dispatch in &dispatches {
            *by_status
                .entry(dispatch.status.as_str().to_string())
                .or_insert(0) += 1;
            *by_priority
                .entry(dispatch.priority.as_str().to_string())
                .or_insert(0) += 1;

            if dispatch.status == DispatchStatus::Completed {
                if let Some(minutes) = dispatch.execution_duration_minutes() {
                    completion_minutes.push(minutes);
                }
            }

            for entry in self.item_repo.list_time_entries(dispatch.id).await? {
                if entry.status == ApprovalStatus::Approved {
                    total_time_minutes += entry.worked_minutes;
                    total_labor_cost += entry.labor_cost();
                }
            }
            for expense in self.item_repo.list_expenses(dispatch.id).await? {
                if expense.status == ApprovalStatus::Approved {
                    total_expense_amount += expense.amount;
                }
            }
            for usage in self.item_repo.list_material_usages(dispatch.id).await? {
                if usage.status == ApprovalStatus::Approved {
                    total_material_cost += usage.total_cost();
                }
            }
        }

        let average_completion_hours = if completion_minutes.is_empty() {
            None
        } else {
            let total: i64 = completion_minutes.iter().sum();
            Some(total as f64 / completion_minutes.len() as f64 / 60.0)
        };

        debug!(
            "统计完成: {} 个派工单, {} 个状态分组",
            dispatches.len(),
            by_status.len()
        );

        Ok(DispatchStatistics {
            total: dispatches.len() as i64,
            by_status,
            by_priority,
            average_completion_hours,
            total_time_minutes,
            total_labor_cost,
            total_expense_amount,
            total_material_cost,
        })
    }
}
