use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{ActorContext, AuditInfo, TimeWindow};

use super::{Job, Priority};

/// 派工单：工单完成排班后生成的现场执行单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: Uuid,
    pub dispatch_number: String,
    pub job_id: Uuid,
    pub status: DispatchStatus,
    pub priority: Priority,
    pub scheduled_date: NaiveDate,
    pub scheduled_start: NaiveTime,
    pub scheduled_end: NaiveTime,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    /// 完成百分比，0-100
    pub completion_percentage: i32,
    pub technician_ids: Vec<Uuid>,
    pub notes: Option<String>,
    /// 软删除标记，置位后对查询、排班与统计不可见
    pub deleted: bool,
    pub audit: AuditInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DispatchStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Pending => "PENDING",
            DispatchStatus::InProgress => "IN_PROGRESS",
            DispatchStatus::Completed => "COMPLETED",
            DispatchStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchStatus::Completed | DispatchStatus::Cancelled)
    }

    /// 合法流转：PENDING→IN_PROGRESS→COMPLETED，非终态→CANCELLED
    pub fn can_transition_to(&self, next: DispatchStatus) -> bool {
        matches!(
            (self, next),
            (DispatchStatus::Pending, DispatchStatus::InProgress)
                | (DispatchStatus::InProgress, DispatchStatus::Completed)
                | (DispatchStatus::Pending, DispatchStatus::Cancelled)
                | (DispatchStatus::InProgress, DispatchStatus::Cancelled)
        )
    }
}

impl sqlx::Type<sqlx::Postgres> for DispatchStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DispatchStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "PENDING" => Ok(DispatchStatus::Pending),
            "IN_PROGRESS" => Ok(DispatchStatus::InProgress),
            "COMPLETED" => Ok(DispatchStatus::Completed),
            "CANCELLED" => Ok(DispatchStatus::Cancelled),
            _ => Err(format!("Invalid dispatch status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for DispatchStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl Dispatch {
    /// 从已排班的工单创建派工单，复制排班字段与技术员列表
    pub fn from_job(job: &Job, actor: &ActorContext) -> FieldOpsResult<Self> {
        let (date, window) = match (job.scheduled_date, job.scheduled_window()) {
            (Some(date), Some(window)) => (date, window),
            _ => {
                return Err(FieldOpsError::validation_error(
                    "工单缺少完整排班信息，无法生成派工单",
                ))
            }
        };
        if job.assigned_technicians.is_empty() {
            return Err(FieldOpsError::validation_error(
                "工单未指定技术员，无法生成派工单",
            ));
        }
        let id = Uuid::new_v4();
        Ok(Self {
            id,
            dispatch_number: Self::generate_number(date, id),
            job_id: job.id,
            status: DispatchStatus::Pending,
            priority: job.priority,
            scheduled_date: date,
            scheduled_start: window.start,
            scheduled_end: window.end,
            actual_start: None,
            actual_end: None,
            completion_percentage: 0,
            technician_ids: job.assigned_technicians.clone(),
            notes: None,
            deleted: false,
            audit: AuditInfo::new(actor),
        })
    }

    /// 派工单号: DSP-YYYYMMDD-XXXXXX
    fn generate_number(date: NaiveDate, id: Uuid) -> String {
        let suffix: String = id.simple().to_string()[..6].to_uppercase();
        format!("DSP-{}-{}", date.format("%Y%m%d"), suffix)
    }

    pub fn scheduled_window(&self) -> TimeWindow {
        TimeWindow {
            start: self.scheduled_start,
            end: self.scheduled_end,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.deleted && !self.status.is_terminal()
    }

    /// 该派工单是否占用技术员在某日的某时间窗（取消/删除不占用）
    pub fn occupies(&self, technician_id: Uuid, date: NaiveDate, window: &TimeWindow) -> bool {
        !self.deleted
            && self.status != DispatchStatus::Cancelled
            && self.scheduled_date == date
            && self.technician_ids.contains(&technician_id)
            && self.scheduled_window().overlaps(window)
    }

    pub fn try_start(
        &mut self,
        actual_start: DateTime<Utc>,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<()> {
        self.guard_transition(DispatchStatus::InProgress)?;
        self.status = DispatchStatus::InProgress;
        self.actual_start = Some(actual_start);
        self.append_notes(notes);
        self.audit.touch(actor);
        Ok(())
    }

    pub fn try_complete(
        &mut self,
        actual_end: DateTime<Utc>,
        completion_percentage: i32,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<()> {
        if !(0..=100).contains(&completion_percentage) {
            return Err(FieldOpsError::validation_error(format!(
                "完成百分比必须在0-100之间: {completion_percentage}"
            )));
        }
        self.guard_transition(DispatchStatus::Completed)?;
        self.status = DispatchStatus::Completed;
        self.actual_end = Some(actual_end);
        self.completion_percentage = completion_percentage;
        self.append_notes(notes);
        self.audit.touch(actor);
        Ok(())
    }

    pub fn try_cancel(
        &mut self,
        reason: Option<String>,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<()> {
        self.guard_transition(DispatchStatus::Cancelled)?;
        self.status = DispatchStatus::Cancelled;
        if let Some(reason) = reason {
            self.append_notes(Some(format!("取消原因: {reason}")));
        }
        self.append_notes(notes);
        self.audit.touch(actor);
        Ok(())
    }

    /// 通用状态流转入口，非法流转返回ValidationError语义的错误
    pub fn try_transition(
        &mut self,
        next: DispatchStatus,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<()> {
        match next {
            DispatchStatus::InProgress => self.try_start(Utc::now(), notes, actor),
            // 通用入口未携带百分比，按完整完成处理
            DispatchStatus::Completed => self.try_complete(Utc::now(), 100, notes, actor),
            DispatchStatus::Cancelled => self.try_cancel(None, notes, actor),
            DispatchStatus::Pending => Err(FieldOpsError::invalid_transition(
                self.status.as_str(),
                next.as_str(),
            )),
        }
    }

    pub fn execution_duration_minutes(&self) -> Option<i64> {
        match (self.actual_start, self.actual_end) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }

    fn guard_transition(&self, next: DispatchStatus) -> FieldOpsResult<()> {
        if self.deleted {
            return Err(FieldOpsError::dispatch_not_found(self.id));
        }
        if !self.status.can_transition_to(next) {
            return Err(FieldOpsError::invalid_transition(
                self.status.as_str(),
                next.as_str(),
            ));
        }
        Ok(())
    }

    fn append_notes(&mut self, notes: Option<String>) {
        if let Some(extra) = notes {
            if extra.is_empty() {
                return;
            }
            match &mut self.notes {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&extra);
                }
                None => self.notes = Some(extra),
            }
        }
    }
}

/// 派工单查询条件
#[derive(Debug, Clone, Default)]
pub struct DispatchFilter {
    pub status: Option<DispatchStatus>,
    pub technician_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
