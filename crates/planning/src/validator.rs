use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use fieldops_core::errors::{ConflictDetail, ConflictKind};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::repositories::{DispatchRepository, JobRepository, TechnicianRepository};
use fieldops_domain::value_objects::TimeWindow;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::availability::AvailabilityResolver;

/// 排班预检请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateAssignmentRequest {
    pub job_id: Uuid,
    pub technician_ids: Vec<Uuid>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// 排班预检结果
///
/// conflicts 为硬冲突（阻止分配），warnings 为提示性问题（技能缺失），
/// recommendations 为面向调度员的处理建议。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentCheck {
    pub is_valid: bool,
    pub conflicts: Vec<ConflictDetail>,
    pub warnings: Vec<ConflictDetail>,
    pub recommendations: Vec<String>,
}

/// 排班冲突校验器
///
/// 纯读操作，可重复、并发调用；结果仅为建议，
/// 落库时仓储会再次校验重叠（见DispatchRepository约定）。
pub struct AssignmentValidator {
    job_repo: Arc<dyn JobRepository>,
    technician_repo: Arc<dyn TechnicianRepository>,
    resolver: AvailabilityResolver,
}

impl AssignmentValidator {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        technician_repo: Arc<dyn TechnicianRepository>,
        dispatch_repo: Arc<dyn DispatchRepository>,
    ) -> Self {
        let resolver = AvailabilityResolver::new(technician_repo.clone(), dispatch_repo);
        Self {
            job_repo,
            technician_repo,
            resolver,
        }
    }

    pub async fn validate(
        &self,
        request: &ValidateAssignmentRequest,
    ) -> FieldOpsResult<AssignmentCheck> {
        let window = TimeWindow::new(request.start, request.end)?;
        if request.technician_ids.is_empty() {
            return Err(FieldOpsError::validation_error(
                "排班校验至少需要一名候选技术员",
            ));
        }

        let job = self
            .job_repo
            .get_by_id(request.job_id)
            .await?
            .ok_or(FieldOpsError::JobNotFound { id: request.job_id })?;

        let mut conflicts = Vec::new();
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        for &technician_id in &request.technician_ids {
            let technician = match self.technician_repo.get_by_id(technician_id).await? {
                Some(t) => t,
                None => {
                    conflicts.push(ConflictDetail {
                        kind: ConflictKind::TechnicianUnavailable,
                        technician_id: Some(technician_id),
                        source_id: None,
                        message: format!("技术员 {technician_id} 不存在"),
                    });
                    continue;
                }
            };
            if !technician.is_active() {
                conflicts.push(ConflictDetail {
                    kind: ConflictKind::TechnicianUnavailable,
                    technician_id: Some(technician_id),
                    source_id: None,
                    message: format!("技术员 {} 已停用", technician.name),
                });
                continue;
            }

            let schedule = self
                .resolver
                .resolve(technician_id, request.date, request.date)
                .await?;
            let day = &schedule.days[0];

            match &day.working_window {
                None => {
                    conflicts.push(ConflictDetail {
                        kind: ConflictKind::TechnicianUnavailable,
                        technician_id: Some(technician_id),
                        source_id: None,
                        message: format!(
                            "技术员 {} 在 {} 没有工作时段",
                            technician.name, request.date
                        ),
                    });
                }
                Some(working) if !working.contains(&window) => {
                    conflicts.push(ConflictDetail {
                        kind: ConflictKind::TechnicianUnavailable,
                        technician_id: Some(technician_id),
                        source_id: None,
                        message: format!(
                            "时间窗 {}-{} 超出技术员 {} 的工作时段 {}-{}",
                            window.start, window.end, technician.name, working.start, working.end
                        ),
                    });
                }
                Some(_) => {}
            }

            for leave in &day.leaves {
                let overlapping = match &leave.window {
                    None => true,
                    Some(w) => w.overlaps(&window),
                };
                if overlapping {
                    conflicts.push(ConflictDetail {
                        kind: ConflictKind::LeaveConflict,
                        technician_id: Some(technician_id),
                        source_id: Some(leave.source_id),
                        message: format!(
                            "技术员 {} 在 {} 有已批准的请假",
                            technician.name, request.date
                        ),
                    });
                }
            }

            for busy in &day.dispatches {
                if let Some(w) = &busy.window {
                    if w.overlaps(&window) {
                        conflicts.push(ConflictDetail {
                            kind: ConflictKind::DoubleBooking,
                            technician_id: Some(technician_id),
                            source_id: Some(busy.source_id),
                            message: format!(
                                "技术员 {} 在 {} {}-{} 已有派工安排",
                                technician.name, request.date, w.start, w.end
                            ),
                        });
                    }
                }
            }

            let missing = technician.missing_skills(&job.required_skills);
            if !missing.is_empty() {
                warnings.push(ConflictDetail {
                    kind: ConflictKind::SkillMismatch,
                    technician_id: Some(technician_id),
                    source_id: None,
                    message: format!(
                        "技术员 {} 缺少技能: {}",
                        technician.name,
                        missing.join(", ")
                    ),
                });
                recommendations.push(format!(
                    "建议为工单「{}」指派具备 {} 技能的技术员",
                    job.title,
                    missing.join("/")
                ));
            }
        }

        if conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::DoubleBooking)
        {
            recommendations.push("建议调整时间窗或更换技术员以避开已有派工".to_string());
        }
        if conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::LeaveConflict)
        {
            recommendations.push("建议避开请假日期重新排班".to_string());
        }

        let is_valid = conflicts.is_empty();
        debug!(
            "排班预检 工单={} 技术员数={} 结果: {} ({} 冲突, {} 提示)",
            request.job_id,
            request.technician_ids.len(),
            if is_valid { "通过" } else { "存在冲突" },
            conflicts.len(),
            warnings.len()
        );

        Ok(AssignmentCheck {
            is_valid,
            conflicts,
            warnings,
            recommendations,
        })
    }
}
