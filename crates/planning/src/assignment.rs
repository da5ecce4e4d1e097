use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::entities::{Dispatch, Job, JobFilter, Priority};
use fieldops_domain::repositories::{DispatchRepository, JobRepository, TechnicianRepository};
use fieldops_domain::value_objects::{ActorContext, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::AvailabilityResolver;
use crate::validator::{AssignmentValidator, ValidateAssignmentRequest};

/// 工单分配命令
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignJobCommand {
    pub job_id: Uuid,
    pub technician_ids: Vec<Uuid>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub auto_create_dispatch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub job_id: Uuid,
    pub dispatch_id: Option<Uuid>,
    pub dispatch_number: Option<String>,
}

/// 批量分配中单项的结果，失败不影响其它项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAssignItem {
    pub job_id: Uuid,
    pub success: bool,
    pub dispatch_id: Option<Uuid>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAssignResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchAssignItem>,
}

/// 可用技术员搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableTechnician {
    pub technician_id: Uuid,
    pub name: String,
    pub skills: Vec<String>,
    pub available_minutes: i64,
}

/// 工单分配编排器
///
/// 预检通过后写入工单排班字段，并按需生成派工单。
/// 仓储在提交时仍会重校验时间窗重叠，预检通过不代表独占。
pub struct AssignmentService {
    job_repo: Arc<dyn JobRepository>,
    technician_repo: Arc<dyn TechnicianRepository>,
    dispatch_repo: Arc<dyn DispatchRepository>,
    validator: AssignmentValidator,
    resolver: AvailabilityResolver,
}

impl AssignmentService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        technician_repo: Arc<dyn TechnicianRepository>,
        dispatch_repo: Arc<dyn DispatchRepository>,
    ) -> Self {
        let validator = AssignmentValidator::new(
            job_repo.clone(),
            technician_repo.clone(),
            dispatch_repo.clone(),
        );
        let resolver =
            AvailabilityResolver::new(technician_repo.clone(), dispatch_repo.clone());
        Self {
            job_repo,
            technician_repo,
            dispatch_repo,
            validator,
            resolver,
        }
    }

    pub fn validator(&self) -> &AssignmentValidator {
        &self.validator
    }

    pub fn resolver(&self) -> &AvailabilityResolver {
        &self.resolver
    }

    pub async fn assign_job(
        &self,
        command: &AssignJobCommand,
        actor: &ActorContext,
    ) -> FieldOpsResult<AssignmentResult> {
        let window = TimeWindow::new(command.start, command.end)?;

        let check = self
            .validator
            .validate(&ValidateAssignmentRequest {
                job_id: command.job_id,
                technician_ids: command.technician_ids.clone(),
                date: command.date,
                start: command.start,
                end: command.end,
            })
            .await?;
        if !check.is_valid {
            warn!(
                "工单 {} 分配被拒绝: {} 个冲突",
                command.job_id,
                check.conflicts.len()
            );
            return Err(FieldOpsError::AssignmentRejected {
                conflicts: check.conflicts,
            });
        }

        let mut job = self
            .job_repo
            .get_by_id(command.job_id)
            .await?
            .ok_or(FieldOpsError::JobNotFound { id: command.job_id })?;

        job.schedule(command.date, window, command.technician_ids.clone(), actor)?;
        if let Some(priority) = command.priority {
            job.priority = priority;
        }
        let job = self.job_repo.update(&job).await?;

        let mut result = AssignmentResult {
            job_id: job.id,
            dispatch_id: None,
            dispatch_number: None,
        };

        if command.auto_create_dispatch {
            let mut dispatch = Dispatch::from_job(&job, actor)?;
            dispatch.notes = command.notes.clone();
            // 仓储在同一事务内重检重叠，并发竞争在此串行化
            let dispatch = self.dispatch_repo.create(&dispatch).await?;
            info!(
                "工单 {} 已生成派工单 {} ({})",
                job.id, dispatch.dispatch_number, dispatch.id
            );
            result.dispatch_id = Some(dispatch.id);
            result.dispatch_number = Some(dispatch.dispatch_number);
        }

        metrics::counter!("fieldops_jobs_assigned_total").increment(1);
        info!(
            "工单 {} 分配完成: {} 名技术员, {} {}-{}",
            job.id,
            command.technician_ids.len(),
            command.date,
            command.start,
            command.end
        );
        Ok(result)
    }

    /// 批量分配：逐项执行并收集结果，单项失败不中断整批
    pub async fn batch_assign(
        &self,
        commands: &[AssignJobCommand],
        actor: &ActorContext,
    ) -> BatchAssignResult {
        let mut items = Vec::with_capacity(commands.len());
        for command in commands {
            match self.assign_job(command, actor).await {
                Ok(result) => items.push(BatchAssignItem {
                    job_id: command.job_id,
                    success: true,
                    dispatch_id: result.dispatch_id,
                    error: None,
                }),
                Err(e) => {
                    warn!("批量分配中工单 {} 失败: {}", command.job_id, e);
                    items.push(BatchAssignItem {
                        job_id: command.job_id,
                        success: false,
                        dispatch_id: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        let succeeded = items.iter().filter(|i| i.success).count();
        let result = BatchAssignResult {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        };
        info!(
            "批量分配完成: 共 {} 项, 成功 {}, 失败 {}",
            result.total, result.succeeded, result.failed
        );
        result
    }

    /// 为已完成排班的工单直接补建派工单（未经assign_job自动创建的场景）
    pub async fn create_dispatch_for_job(
        &self,
        job_id: Uuid,
        notes: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Dispatch> {
        let job = self
            .job_repo
            .get_by_id(job_id)
            .await?
            .ok_or(FieldOpsError::JobNotFound { id: job_id })?;
        let mut dispatch = Dispatch::from_job(&job, actor)?;
        dispatch.notes = notes;
        let dispatch = self.dispatch_repo.create(&dispatch).await?;
        info!(
            "工单 {} 手动生成派工单 {}",
            job.id, dispatch.dispatch_number
        );
        Ok(dispatch)
    }

    pub async fn list_unassigned(&self, filter: &JobFilter) -> FieldOpsResult<(Vec<Job>, i64)> {
        let jobs = self.job_repo.list_unassigned(filter).await?;
        let total = self.job_repo.count_unassigned(filter).await?;
        Ok((jobs, total))
    }

    /// 搜索指定日期/时间窗内空闲、且具备全部所需技能的技术员
    pub async fn find_available(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        required_skills: &[String],
    ) -> FieldOpsResult<Vec<AvailableTechnician>> {
        let window = TimeWindow::new(start, end)?;
        let technicians = self.technician_repo.list_active().await?;
        let mut available = Vec::new();

        for technician in technicians {
            if !technician.missing_skills(required_skills).is_empty() {
                continue;
            }
            let schedule = self.resolver.resolve(technician.id, date, date).await?;
            let day = &schedule.days[0];
            if AvailabilityResolver::day_is_free(day, &window) {
                available.push(AvailableTechnician {
                    technician_id: technician.id,
                    name: technician.name.clone(),
                    skills: technician.skills.clone(),
                    available_minutes: day.available_minutes,
                });
            }
        }

        // 空闲时间多的排前面，便于调度员做负载均衡
        available.sort_by(|a, b| b.available_minutes.cmp(&a.available_minutes));
        Ok(available)
    }
}
