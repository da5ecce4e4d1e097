use chrono::{NaiveDate, NaiveTime};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{ActorContext, AuditInfo, TimeWindow};

use super::Priority;

/// 服务工单中的一项待派工作业，由销售单转换生成，经排班后进入SCHEDULED状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub service_order_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub required_skills: Vec<String>,
    pub priority: Priority,
    pub status: JobStatus,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_start: Option<NaiveTime>,
    pub scheduled_end: Option<NaiveTime>,
    pub assigned_technicians: Vec<Uuid>,
    pub audit: AuditInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "UNSCHEDULED")]
    Unscheduled,
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unscheduled => "UNSCHEDULED",
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "UNSCHEDULED" => Ok(JobStatus::Unscheduled),
            "SCHEDULED" => Ok(JobStatus::Scheduled),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "COMPLETED" => Ok(JobStatus::Completed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Invalid job status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl Job {
    pub fn new(
        service_order_id: Uuid,
        title: String,
        required_skills: Vec<String>,
        priority: Priority,
        actor: &ActorContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_order_id,
            title,
            description: None,
            required_skills,
            priority,
            status: JobStatus::Unscheduled,
            scheduled_date: None,
            scheduled_start: None,
            scheduled_end: None,
            assigned_technicians: Vec::new(),
            audit: AuditInfo::new(actor),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self.status, JobStatus::Unscheduled)
    }

    /// 是否仍可（重新）排班
    pub fn is_assignable(&self) -> bool {
        matches!(self.status, JobStatus::Unscheduled | JobStatus::Scheduled)
    }

    pub fn scheduled_window(&self) -> Option<TimeWindow> {
        match (self.scheduled_start, self.scheduled_end) {
            (Some(start), Some(end)) if start < end => Some(TimeWindow { start, end }),
            _ => None,
        }
    }

    /// 写入排班结果并进入SCHEDULED状态。
    /// 不变式：至少一名技术员且时间窗完整，否则不允许流转。
    pub fn schedule(
        &mut self,
        date: NaiveDate,
        window: TimeWindow,
        technicians: Vec<Uuid>,
        actor: &ActorContext,
    ) -> FieldOpsResult<()> {
        if !self.is_assignable() {
            return Err(FieldOpsError::invalid_transition(
                self.status.as_str(),
                JobStatus::Scheduled.as_str(),
            ));
        }
        if technicians.is_empty() {
            return Err(FieldOpsError::validation_error(
                "排班必须至少指定一名技术员",
            ));
        }
        self.scheduled_date = Some(date);
        self.scheduled_start = Some(window.start);
        self.scheduled_end = Some(window.end);
        self.assigned_technicians = technicians;
        self.status = JobStatus::Scheduled;
        self.audit.touch(actor);
        Ok(())
    }
}

/// 未排班工单查询条件
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub service_order_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub skill: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorContext {
        ActorContext::new(Uuid::new_v4())
    }

    fn window(sh: u32, eh: u32) -> TimeWindow {
        TimeWindow::new(
            NaiveTime::from_hms_opt(sh, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(eh, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_job_is_unassigned() {
        let job = Job::new(
            Uuid::new_v4(),
            "空调维修".to_string(),
            vec!["hvac".to_string()],
            Priority::Normal,
            &actor(),
        );
        assert!(job.is_unassigned());
        assert!(job.is_assignable());
        assert!(job.scheduled_window().is_none());
    }

    #[test]
    fn test_schedule_requires_technicians() {
        let actor = actor();
        let mut job = Job::new(
            Uuid::new_v4(),
            "空调维修".to_string(),
            vec![],
            Priority::Normal,
            &actor,
        );
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        let result = job.schedule(date, window(10, 12), vec![], &actor);
        assert!(result.is_err());
        assert_eq!(job.status, JobStatus::Unscheduled);

        job.schedule(date, window(10, 12), vec![Uuid::new_v4()], &actor)
            .unwrap();
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.scheduled_window().unwrap().duration_minutes(), 120);
    }

    #[test]
    fn test_schedule_rejected_in_terminal_state() {
        let actor = actor();
        let mut job = Job::new(
            Uuid::new_v4(),
            "巡检".to_string(),
            vec![],
            Priority::Low,
            &actor,
        );
        job.status = JobStatus::Completed;

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let result = job.schedule(date, window(10, 12), vec![Uuid::new_v4()], &actor);
        assert!(matches!(
            result,
            Err(fieldops_core::FieldOpsError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_reschedule_allowed_when_scheduled() {
        let actor = actor();
        let mut job = Job::new(
            Uuid::new_v4(),
            "巡检".to_string(),
            vec![],
            Priority::Low,
            &actor,
        );
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        job.schedule(date, window(10, 12), vec![Uuid::new_v4()], &actor)
            .unwrap();

        // 已排班的工单允许调整时间窗
        job.schedule(date, window(14, 16), vec![Uuid::new_v4()], &actor)
            .unwrap();
        assert_eq!(
            job.scheduled_start,
            Some(NaiveTime::from_hms_opt(14, 0, 0).unwrap())
        );
    }
}
