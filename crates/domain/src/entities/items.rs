use chrono::{DateTime, Utc};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{ActorContext, AuditInfo};

use super::ApprovalStatus;

/// 审批动作的结果：是否真正发生了状态变化（重复审批为幂等空操作）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Applied,
    AlreadyInState,
}

fn apply_approval(
    kind: &str,
    id: Uuid,
    status: &mut ApprovalStatus,
    approved_by: &mut Option<Uuid>,
    approved_at: &mut Option<DateTime<Utc>>,
    next: ApprovalStatus,
    actor: &ActorContext,
) -> FieldOpsResult<ApprovalOutcome> {
    debug_assert!(next != ApprovalStatus::Pending);
    if *status == next {
        // 幂等：重复审批保持原审批人与时间戳不变
        return Ok(ApprovalOutcome::AlreadyInState);
    }
    if *status != ApprovalStatus::Pending {
        return Err(FieldOpsError::validation_error(format!(
            "{kind} {id} 已处于 {} 状态，不能再变更为 {}",
            status.as_str(),
            next.as_str()
        )));
    }
    *status = next;
    *approved_by = Some(actor.actor_id);
    *approved_at = Some(Utc::now());
    Ok(ApprovalOutcome::Applied)
}

/// 工时记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: Uuid,
    pub dispatch_id: Uuid,
    pub technician_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub worked_minutes: i64,
    pub description: Option<String>,
    pub hourly_rate: f64,
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    /// 乐观并发版本号，每次写入自增
    pub version: i32,
    pub audit: AuditInfo,
}

impl TimeEntry {
    pub fn new(
        dispatch_id: Uuid,
        technician_id: Uuid,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        hourly_rate: f64,
        description: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Self> {
        if ended_at <= started_at {
            return Err(FieldOpsError::validation_error(
                "工时记录的结束时间必须晚于开始时间",
            ));
        }
        if hourly_rate < 0.0 {
            return Err(FieldOpsError::validation_error("小时费率不能为负数"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            dispatch_id,
            technician_id,
            started_at,
            ended_at,
            worked_minutes: (ended_at - started_at).num_minutes(),
            description,
            hourly_rate,
            status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            version: 1,
            audit: AuditInfo::new(actor),
        })
    }

    pub fn labor_cost(&self) -> f64 {
        self.worked_minutes as f64 / 60.0 * self.hourly_rate
    }

    pub fn approve(&mut self, actor: &ActorContext) -> FieldOpsResult<ApprovalOutcome> {
        apply_approval(
            "工时记录",
            self.id,
            &mut self.status,
            &mut self.approved_by,
            &mut self.approved_at,
            ApprovalStatus::Approved,
            actor,
        )
    }

    pub fn reject(&mut self, actor: &ActorContext) -> FieldOpsResult<ApprovalOutcome> {
        apply_approval(
            "工时记录",
            self.id,
            &mut self.status,
            &mut self.approved_by,
            &mut self.approved_at,
            ApprovalStatus::Rejected,
            actor,
        )
    }
}

/// 费用记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub dispatch_id: Uuid,
    pub technician_id: Uuid,
    pub category: String,
    pub description: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub receipt_attachment_id: Option<Uuid>,
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub audit: AuditInfo,
}

impl Expense {
    pub fn new(
        dispatch_id: Uuid,
        technician_id: Uuid,
        category: String,
        amount: f64,
        currency: String,
        description: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Self> {
        if amount < 0.0 {
            return Err(FieldOpsError::validation_error("费用金额不能为负数"));
        }
        if category.trim().is_empty() {
            return Err(FieldOpsError::validation_error("费用类别不能为空"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            dispatch_id,
            technician_id,
            category,
            description,
            amount,
            currency,
            receipt_attachment_id: None,
            status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            version: 1,
            audit: AuditInfo::new(actor),
        })
    }

    pub fn approve(&mut self, actor: &ActorContext) -> FieldOpsResult<ApprovalOutcome> {
        apply_approval(
            "费用记录",
            self.id,
            &mut self.status,
            &mut self.approved_by,
            &mut self.approved_at,
            ApprovalStatus::Approved,
            actor,
        )
    }

    pub fn reject(&mut self, actor: &ActorContext) -> FieldOpsResult<ApprovalOutcome> {
        apply_approval(
            "费用记录",
            self.id,
            &mut self.status,
            &mut self.approved_by,
            &mut self.approved_at,
            ApprovalStatus::Rejected,
            actor,
        )
    }
}

/// 材料消耗记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialUsage {
    pub id: Uuid,
    pub dispatch_id: Uuid,
    pub material_code: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub audit: AuditInfo,
}

impl MaterialUsage {
    pub fn new(
        dispatch_id: Uuid,
        material_code: String,
        quantity: f64,
        unit: String,
        unit_cost: f64,
        description: Option<String>,
        actor: &ActorContext,
    ) -> FieldOpsResult<Self> {
        if material_code.trim().is_empty() {
            return Err(FieldOpsError::validation_error("材料编码不能为空"));
        }
        if quantity <= 0.0 {
            return Err(FieldOpsError::validation_error("材料数量必须大于0"));
        }
        if unit_cost < 0.0 {
            return Err(FieldOpsError::validation_error("材料单价不能为负数"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            dispatch_id,
            material_code,
            description,
            quantity,
            unit,
            unit_cost,
            status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            version: 1,
            audit: AuditInfo::new(actor),
        })
    }

    pub fn total_cost(&self) -> f64 {
        self.quantity * self.unit_cost
    }

    pub fn approve(&mut self, actor: &ActorContext) -> FieldOpsResult<ApprovalOutcome> {
        apply_approval(
            "材料记录",
            self.id,
            &mut self.status,
            &mut self.approved_by,
            &mut self.approved_at,
            ApprovalStatus::Approved,
            actor,
        )
    }

    pub fn reject(&mut self, actor: &ActorContext) -> FieldOpsResult<ApprovalOutcome> {
        apply_approval(
            "材料记录",
            self.id,
            &mut self.status,
            &mut self.approved_by,
            &mut self.approved_at,
            ApprovalStatus::Rejected,
            actor,
        )
    }
}

/// 派工备注，追加后不可修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchNote {
    pub id: Uuid,
    pub dispatch_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl DispatchNote {
    pub fn new(dispatch_id: Uuid, body: String, actor: &ActorContext) -> FieldOpsResult<Self> {
        if body.trim().is_empty() {
            return Err(FieldOpsError::validation_error("备注内容不能为空"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            dispatch_id,
            author_id: actor.actor_id,
            body,
            created_at: Utc::now(),
        })
    }
}

/// 附件元数据，文件内容经FileStorage端口落盘
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub dispatch_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn actor() -> ActorContext {
        ActorContext::new(Uuid::new_v4())
    }

    fn time_entry(actor: &ActorContext) -> TimeEntry {
        let start = Utc::now();
        TimeEntry::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            start,
            start + Duration::minutes(90),
            200.0,
            None,
            actor,
        )
        .unwrap()
    }

    #[test]
    fn test_time_entry_cost() {
        let entry = time_entry(&actor());
        assert_eq!(entry.worked_minutes, 90);
        assert!((entry.labor_cost() - 300.0).abs() < f64::EPSILON);
        assert_eq!(entry.status, ApprovalStatus::Pending);
    }

    #[test]
    fn test_time_entry_rejects_inverted_range() {
        let start = Utc::now();
        let result = TimeEntry::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            start,
            start - Duration::minutes(10),
            200.0,
            None,
            &actor(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_approve_is_idempotent() {
        let approver = actor();
        let mut entry = time_entry(&actor());

        let first = entry.approve(&approver).unwrap();
        assert_eq!(first, ApprovalOutcome::Applied);
        assert_eq!(entry.status, ApprovalStatus::Approved);
        assert_eq!(entry.approved_by, Some(approver.actor_id));
        let stamped_at = entry.approved_at.unwrap();

        // 重复审批：结果不变，审批人与时间戳保持首次的值
        let second_approver = actor();
        let second = entry.approve(&second_approver).unwrap();
        assert_eq!(second, ApprovalOutcome::AlreadyInState);
        assert_eq!(entry.approved_by, Some(approver.actor_id));
        assert_eq!(entry.approved_at, Some(stamped_at));
    }

    #[test]
    fn test_approve_after_reject_fails() {
        let mut entry = time_entry(&actor());
        entry.reject(&actor()).unwrap();
        assert_eq!(entry.status, ApprovalStatus::Rejected);

        let result = entry.approve(&actor());
        assert!(matches!(result, Err(FieldOpsError::ValidationError(_))));
    }

    #[test]
    fn test_material_usage_validation_and_cost() {
        let actor = actor();
        let usage = MaterialUsage::new(
            Uuid::new_v4(),
            "PIPE-20".to_string(),
            3.0,
            "米".to_string(),
            45.5,
            None,
            &actor,
        )
        .unwrap();
        assert!((usage.total_cost() - 136.5).abs() < 1e-9);

        assert!(MaterialUsage::new(
            Uuid::new_v4(),
            "".to_string(),
            1.0,
            "个".to_string(),
            1.0,
            None,
            &actor
        )
        .is_err());
        assert!(MaterialUsage::new(
            Uuid::new_v4(),
            "PIPE-20".to_string(),
            0.0,
            "个".to_string(),
            1.0,
            None,
            &actor
        )
        .is_err());
    }

    #[test]
    fn test_expense_validation() {
        let actor = actor();
        assert!(Expense::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "交通".to_string(),
            -5.0,
            "CNY".to_string(),
            None,
            &actor
        )
        .is_err());
        let expense = Expense::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "交通".to_string(),
            88.0,
            "CNY".to_string(),
            Some("高速过路费".to_string()),
            &actor,
        )
        .unwrap();
        assert_eq!(expense.version, 1);
    }

    #[test]
    fn test_note_requires_body() {
        assert!(DispatchNote::new(Uuid::new_v4(), "  ".to_string(), &actor()).is_err());
    }
}
