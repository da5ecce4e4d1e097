//! Test data builders for creating domain entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{NaiveDate, NaiveTime};
use fieldops_domain::entities::{
    ApprovalStatus, Dispatch, DispatchStatus, Job, JobStatus, Priority, Technician,
    TechnicianLeave, TechnicianStatus, TechnicianWorkingHours,
};
use fieldops_domain::value_objects::{ActorContext, AuditInfo};
use uuid::Uuid;

fn test_actor() -> ActorContext {
    ActorContext::with_name(Uuid::new_v4(), "test-operator")
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

/// Builder for creating test Technician entities
pub struct TechnicianBuilder {
    technician: Technician,
}

impl TechnicianBuilder {
    pub fn new() -> Self {
        Self {
            technician: Technician::new(
                "测试技术员".to_string(),
                "tech@example.com".to_string(),
                vec!["hvac".to_string()],
                &test_actor(),
            ),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.technician.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.technician.name = name.to_string();
        self
    }

    pub fn with_skills(mut self, skills: Vec<&str>) -> Self {
        self.technician.skills = skills.into_iter().map(String::from).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.technician.status = TechnicianStatus::Inactive;
        self
    }

    pub fn build(self) -> Technician {
        self.technician
    }
}

impl Default for TechnicianBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for weekly working hour rows
pub struct WorkingHoursBuilder {
    hours: TechnicianWorkingHours,
}

impl WorkingHoursBuilder {
    pub fn new(technician_id: Uuid) -> Self {
        Self {
            hours: TechnicianWorkingHours {
                id: Uuid::new_v4(),
                technician_id,
                weekday: 0,
                start_time: t(9, 0),
                end_time: t(17, 0),
                effective_from: None,
                effective_to: None,
            },
        }
    }

    pub fn weekday(mut self, weekday: i16) -> Self {
        self.hours.weekday = weekday;
        self
    }

    pub fn window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.hours.start_time = start;
        self.hours.end_time = end;
        self
    }

    pub fn effective(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.hours.effective_from = from;
        self.hours.effective_to = to;
        self
    }

    pub fn build(self) -> TechnicianWorkingHours {
        self.hours
    }
}

/// Builder for leave records (approved by default)
pub struct LeaveBuilder {
    leave: TechnicianLeave,
}

impl LeaveBuilder {
    pub fn new(technician_id: Uuid, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            leave: TechnicianLeave {
                id: Uuid::new_v4(),
                technician_id,
                start_date,
                end_date,
                start_time: None,
                end_time: None,
                status: ApprovalStatus::Approved,
                reason: None,
                audit: AuditInfo::new(&test_actor()),
            },
        }
    }

    pub fn time_bounded(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.leave.start_time = Some(start);
        self.leave.end_time = Some(end);
        self
    }

    pub fn pending(mut self) -> Self {
        self.leave.status = ApprovalStatus::Pending;
        self
    }

    pub fn build(self) -> TechnicianLeave {
        self.leave
    }
}

/// Builder for creating test Job entities
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self {
            job: Job::new(
                Uuid::new_v4(),
                "测试工单".to_string(),
                vec![],
                Priority::Normal,
                &test_actor(),
            ),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.job.id = id;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.job.title = title.to_string();
        self
    }

    pub fn with_required_skills(mut self, skills: Vec<&str>) -> Self {
        self.job.required_skills = skills.into_iter().map(String::from).collect();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn with_service_order(mut self, service_order_id: Uuid) -> Self {
        self.job.service_order_id = service_order_id;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Dispatch entities without going through a Job
pub struct DispatchBuilder {
    dispatch: Dispatch,
}

impl DispatchBuilder {
    pub fn new(technician_id: Uuid, date: NaiveDate) -> Self {
        let id = Uuid::new_v4();
        Self {
            dispatch: Dispatch {
                id,
                dispatch_number: format!("DSP-{}-TEST{}", date.format("%Y%m%d"), &id.simple().to_string()[..4]),
                job_id: Uuid::new_v4(),
                status: DispatchStatus::Pending,
                priority: Priority::Normal,
                scheduled_date: date,
                scheduled_start: t(10, 0),
                scheduled_end: t(12, 0),
                actual_start: None,
                actual_end: None,
                completion_percentage: 0,
                technician_ids: vec![technician_id],
                notes: None,
                deleted: false,
                audit: AuditInfo::new(&test_actor()),
            },
        }
    }

    pub fn with_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.dispatch.scheduled_start = start;
        self.dispatch.scheduled_end = end;
        self
    }

    pub fn with_status(mut self, status: DispatchStatus) -> Self {
        self.dispatch.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.dispatch.priority = priority;
        self
    }

    pub fn with_job(mut self, job_id: Uuid) -> Self {
        self.dispatch.job_id = job_id;
        self
    }

    pub fn build(self) -> Dispatch {
        self.dispatch
    }
}
