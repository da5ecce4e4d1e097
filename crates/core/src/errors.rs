use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 排班冲突类别标签
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DoubleBooking,
    LeaveConflict,
    TechnicianUnavailable,
    SkillMismatch,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::DoubleBooking => "double_booking",
            ConflictKind::LeaveConflict => "leave_conflict",
            ConflictKind::TechnicianUnavailable => "technician_unavailable",
            ConflictKind::SkillMismatch => "skill_mismatch",
        }
    }
}

/// 单条排班冲突明细，随校验失败错误一起返回给调用方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictDetail {
    pub kind: ConflictKind,
    pub technician_id: Option<Uuid>,
    /// 产生冲突的记录（派工单或请假记录）ID
    pub source_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum FieldOpsError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("工单未找到: {id}")]
    JobNotFound { id: Uuid },
    #[error("派工单未找到: {id}")]
    DispatchNotFound { id: Uuid },
    #[error("技术员未找到: {id}")]
    TechnicianNotFound { id: Uuid },
    #[error("派工子项未找到: {kind} {id}")]
    DispatchItemNotFound { kind: String, id: Uuid },
    #[error("附件未找到: {id}")]
    AttachmentNotFound { id: Uuid },
    #[error("无效的状态流转: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("排班校验未通过: 共 {} 个冲突", .conflicts.len())]
    AssignmentRejected { conflicts: Vec<ConflictDetail> },
    #[error("资源冲突: {0}")]
    Conflict(String),
    #[error("缺少操作人身份")]
    AuthRequired,
    #[error("文件存储错误: {0}")]
    Storage(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type FieldOpsResult<T> = Result<T, FieldOpsError>;

impl FieldOpsError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn job_not_found(id: Uuid) -> Self {
        Self::JobNotFound { id }
    }
    pub fn dispatch_not_found(id: Uuid) -> Self {
        Self::DispatchNotFound { id }
    }
    pub fn technician_not_found(id: Uuid) -> Self {
        Self::TechnicianNotFound { id }
    }
    pub fn item_not_found<S: Into<String>>(kind: S, id: Uuid) -> Self {
        Self::DispatchItemNotFound {
            kind: kind.into(),
            id,
        }
    }
    pub fn invalid_transition<S: Into<String>>(from: S, to: S) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn storage_error<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FieldOpsError::Internal(_) | FieldOpsError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FieldOpsError::Database(_)
                | FieldOpsError::DatabaseOperation(_)
                | FieldOpsError::Conflict(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            FieldOpsError::JobNotFound { .. } => "请求的工单不存在",
            FieldOpsError::DispatchNotFound { .. } => "请求的派工单不存在",
            FieldOpsError::TechnicianNotFound { .. } => "请求的技术员不存在",
            FieldOpsError::DispatchItemNotFound { .. } => "请求的派工子项不存在",
            FieldOpsError::AttachmentNotFound { .. } => "请求的附件不存在",
            FieldOpsError::InvalidTransition { .. } => "当前状态不允许该操作",
            FieldOpsError::ValidationError(_) => "输入数据验证失败",
            FieldOpsError::AssignmentRejected { .. } => "排班存在冲突，未能分配",
            FieldOpsError::Conflict(_) => "资源状态已变化，请刷新后重试",
            FieldOpsError::AuthRequired => "请提供操作人身份",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for FieldOpsError {
    fn from(err: serde_json::Error) -> Self {
        FieldOpsError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FieldOpsError {
    fn from(err: anyhow::Error) -> Self {
        FieldOpsError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_kind_tags() {
        assert_eq!(ConflictKind::DoubleBooking.as_str(), "double_booking");
        assert_eq!(ConflictKind::LeaveConflict.as_str(), "leave_conflict");
        assert_eq!(ConflictKind::SkillMismatch.as_str(), "skill_mismatch");
        let json = serde_json::to_string(&ConflictKind::DoubleBooking).unwrap();
        assert_eq!(json, "\"double_booking\"");
    }

    #[test]
    fn test_error_classification() {
        assert!(FieldOpsError::internal("boom").is_fatal());
        assert!(FieldOpsError::config_error("bad").is_fatal());
        assert!(FieldOpsError::database_error("timeout").is_retryable());
        assert!(!FieldOpsError::validation_error("bad input").is_retryable());
        assert!(!FieldOpsError::AuthRequired.is_fatal());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = FieldOpsError::invalid_transition("PENDING", "COMPLETED");
        assert_eq!(format!("{err}"), "无效的状态流转: PENDING -> COMPLETED");
    }

    #[test]
    fn test_assignment_rejected_carries_conflicts() {
        let err = FieldOpsError::AssignmentRejected {
            conflicts: vec![ConflictDetail {
                kind: ConflictKind::DoubleBooking,
                technician_id: Some(Uuid::new_v4()),
                source_id: None,
                message: "时间窗重叠".to_string(),
            }],
        };
        match &err {
            FieldOpsError::AssignmentRejected { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].kind, ConflictKind::DoubleBooking);
            }
            _ => panic!("expected AssignmentRejected"),
        }
    }
}
