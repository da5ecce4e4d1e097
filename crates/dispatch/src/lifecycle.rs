use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::entities::{Dispatch, DispatchFilter, DispatchStatus};
use fieldops_domain::repositories::DispatchRepository;
use fieldops_domain::value_objects::{ActorContext, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// 派工单排班调整请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDispatchSchedule {
    pub scheduled_date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub technician_ids: Option<Vec<Uuid>>,
}

/// 派工单生命周期管理
///
/// 状态机：PENDING → IN_PROGRESS → COMPLETED，
/// CANCELLED 可从 PENDING / IN_PROGRESS 到达；其余流转一律拒绝。
pub struct DispatchService {
    dispatch_repo: Arc<dyn DispatchRepository>,
}

impl DispatchService {
    pub fn new(dispatch_repo: Arc<dyn DispatchRepository>) -> Self {
        Self { dispatch_repo }
    }

    pub async fn get(&self, id: Uuid) -> FieldOpsResult<Dispatch> {
        self.dispatch_repo
            .get_by_id(id)
            .await?
            .ok_or(FieldOpsError::DispatchNotFound { id })
    }

    pub async fn list(&self, filter: &DispatchFilter) -> FieldOpsResult<(Vec<Dispatch>, i64)> {
        let dispatches = self.dispatch_repo.list(filter).await?;
        let total = self.dispatch_repo.count(filter).await?;
        Ok((dispatches, total))
    }

    pub async fn start(
        &self,
        id: Uuid,
        actual_start: Option<DateTime<Utc>>,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Dispatch> {
        let mut dispatch = self.get(id).await?;
        dispatch.try_start(actual_start.unwrap_or_else(Utc::now), notes, actor)?;
        let dispatch = self.dispatch_repo.update(&dispatch).await?;
        metrics::counter!("fieldops_dispatches_started_total").increment(1);
        info!("派工单 {} 开始执行", dispatch.dispatch_number);
        Ok(dispatch)
    }

    pub async fn complete(
        &self,
        id: Uuid,
        actual_end: Option<DateTime<Utc>>,
        completion_percentage: i32,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Dispatch> {
        let mut dispatch = self.get(id).await?;
        dispatch.try_complete(
            actual_end.unwrap_or_else(Utc::now),
            completion_percentage,
            notes,
            actor,
        )?;
        let dispatch = self.dispatch_repo.update(&dispatch).await?;
        metrics::counter!("fieldops_dispatches_completed_total").increment(1);
        info!(
            "派工单 {} 完成，完成度 {}%",
            dispatch.dispatch_number, dispatch.completion_percentage
        );
        Ok(dispatch)
    }

    pub async fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Dispatch> {
        let mut dispatch = self.get(id).await?;
        dispatch.try_cancel(reason, notes, actor)?;
        let dispatch = self.dispatch_repo.update(&dispatch).await?;
        info!("派工单 {} 已取消", dispatch.dispatch_number);
        Ok(dispatch)
    }

    /// 通用状态更新入口，内部仍走状态机守卫
    pub async fn update_status(
        &self,
        id: Uuid,
        status: DispatchStatus,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Dispatch> {
        let mut dispatch = self.get(id).await?;
        dispatch.try_transition(status, notes, actor)?;
        let dispatch = self.dispatch_repo.update(&dispatch).await?;
        info!(
            "派工单 {} 状态更新为 {}",
            dispatch.dispatch_number,
            dispatch.status.as_str()
        );
        Ok(dispatch)
    }

    /// 调整排班，仅允许未开始执行的派工单；仓储会重检时间窗重叠
    pub async fn update_schedule(
        &self,
        id: Uuid,
        update: &UpdateDispatchSchedule,
        actor: &ActorContext,
    ) -> FieldOpsResult<Dispatch> {
        let window = TimeWindow::new(update.start, update.end)?;
        let mut dispatch = self.get(id).await?;
        if dispatch.status != DispatchStatus::Pending {
            return Err(FieldOpsError::validation_error(format!(
                "派工单处于 {} 状态，不能调整排班",
                dispatch.status.as_str()
            )));
        }
        dispatch.scheduled_date = update.scheduled_date;
        dispatch.scheduled_start = window.start;
        dispatch.scheduled_end = window.end;
        if let Some(technicians) = &update.technician_ids {
            if technicians.is_empty() {
                return Err(FieldOpsError::validation_error(
                    "派工单必须保留至少一名技术员",
                ));
            }
            dispatch.technician_ids = technicians.clone();
        }
        dispatch.audit.touch(actor);
        let dispatch = self.dispatch_repo.update_schedule(&dispatch).await?;
        info!("派工单 {} 排班已调整", dispatch.dispatch_number);
        Ok(dispatch)
    }

    /// 软删除：子记录保留但随父级一同视为无效
    pub async fn delete(&self, id: Uuid, actor: &ActorContext) -> FieldOpsResult<()> {
        let deleted = self.dispatch_repo.soft_delete(id, actor).await?;
        if !deleted {
            return Err(FieldOpsError::DispatchNotFound { id });
        }
        info!("派工单 {} 已删除", id);
        Ok(())
    }
}
