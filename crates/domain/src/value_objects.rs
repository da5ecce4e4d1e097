use chrono::{DateTime, NaiveTime, Utc};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 一天内的时间窗，start 严格小于 end
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> FieldOpsResult<Self> {
        if start >= end {
            return Err(FieldOpsError::validation_error(format!(
                "无效的时间窗: {start} 必须早于 {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// 与另一时间窗的重叠分钟数，不相交时为 0
    pub fn overlap_minutes(&self, other: &TimeWindow) -> i64 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            (end - start).num_minutes()
        } else {
            0
        }
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// 操作人上下文，所有写操作必须显式携带，缺失视为认证错误而非默认身份
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub display_name: Option<String>,
}

impl ActorContext {
    pub fn new(actor_id: Uuid) -> Self {
        Self {
            actor_id,
            display_name: None,
        }
    }

    pub fn with_name(actor_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            actor_id,
            display_name: Some(display_name.into()),
        }
    }
}

/// 审计信息，附加在所有可变实体上
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_by: Uuid,
    pub modified_at: DateTime<Utc>,
}

impl AuditInfo {
    pub fn new(actor: &ActorContext) -> Self {
        let now = Utc::now();
        Self {
            created_by: actor.actor_id,
            created_at: now,
            modified_by: actor.actor_id,
            modified_at: now,
        }
    }

    pub fn touch(&mut self, actor: &ActorContext) {
        self.modified_by = actor.actor_id;
        self.modified_at = Utc::now();
    }
}
