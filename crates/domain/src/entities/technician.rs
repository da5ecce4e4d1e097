use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{ActorContext, AuditInfo, TimeWindow};

use super::ApprovalStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// 技能标签，与工单的required_skills按字符串匹配
    pub skills: Vec<String>,
    pub status: TechnicianStatus,
    pub audit: AuditInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TechnicianStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "INACTIVE")]
    Inactive,
}

impl TechnicianStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TechnicianStatus::Active => "ACTIVE",
            TechnicianStatus::Inactive => "INACTIVE",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for TechnicianStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TechnicianStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "ACTIVE" => Ok(TechnicianStatus::Active),
            "INACTIVE" => Ok(TechnicianStatus::Inactive),
            _ => Err(format!("Invalid technician status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TechnicianStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl Technician {
    pub fn new(name: String, email: String, skills: Vec<String>, actor: &ActorContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            skills,
            status: TechnicianStatus::Active,
            audit: AuditInfo::new(actor),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TechnicianStatus::Active)
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s.eq_ignore_ascii_case(skill))
    }

    /// 所需技能中本人不具备的部分
    pub fn missing_skills(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|skill| !self.has_skill(skill))
            .cloned()
            .collect()
    }
}

/// 技术员每周固定工作时段，每个启用的星期一行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianWorkingHours {
    pub id: Uuid,
    pub technician_id: Uuid,
    /// 0=周一 .. 6=周日
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

impl TechnicianWorkingHours {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// 该行是否适用于指定日期（星期匹配且处于生效区间内）
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if i16::try_from(date.weekday().num_days_from_monday()).unwrap_or(-1) != self.weekday {
            return false;
        }
        if let Some(from) = self.effective_from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.effective_to {
            if date > to {
                return false;
            }
        }
        true
    }
}

/// 请假记录，仅APPROVED状态的请假阻断排班
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianLeave {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 时间界限缺失表示整天请假
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: ApprovalStatus,
    pub reason: Option<String>,
    pub audit: AuditInfo,
}

impl TechnicianLeave {
    pub fn is_approved(&self) -> bool {
        matches!(self.status, ApprovalStatus::Approved)
    }

    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn is_full_day(&self) -> bool {
        self.start_time.is_none() || self.end_time.is_none()
    }

    /// 指定日期上的请假时间窗；整天请假返回 None
    pub fn window_on(&self, date: NaiveDate) -> Option<TimeWindow> {
        if !self.covers_date(date) {
            return None;
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if start < end => Some(TimeWindow { start, end }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorContext {
        ActorContext::new(Uuid::new_v4())
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_technician_skill_matching() {
        let tech = Technician::new(
            "张伟".to_string(),
            "zhangwei@example.com".to_string(),
            vec!["hvac".to_string(), "Electrical".to_string()],
            &actor(),
        );

        assert!(tech.has_skill("HVAC"));
        assert!(tech.has_skill("electrical"));
        assert!(!tech.has_skill("plumbing"));

        let missing = tech.missing_skills(&["hvac".to_string(), "plumbing".to_string()]);
        assert_eq!(missing, vec!["plumbing".to_string()]);
    }

    #[test]
    fn test_working_hours_applies_on() {
        // 2025-06-02 是周一
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();

        let hours = TechnicianWorkingHours {
            id: Uuid::new_v4(),
            technician_id: Uuid::new_v4(),
            weekday: 0,
            start_time: t(9, 0),
            end_time: t(17, 0),
            effective_from: None,
            effective_to: None,
        };

        assert!(hours.applies_on(monday));
        assert!(!hours.applies_on(tuesday));
    }

    #[test]
    fn test_working_hours_effective_range() {
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let later_monday = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();

        let hours = TechnicianWorkingHours {
            id: Uuid::new_v4(),
            technician_id: Uuid::new_v4(),
            weekday: 0,
            start_time: t(9, 0),
            end_time: t(17, 0),
            effective_from: Some(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()),
            effective_to: None,
        };

        assert!(!hours.applies_on(monday));
        assert!(hours.applies_on(later_monday));
    }

    #[test]
    fn test_leave_window_on() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let leave = TechnicianLeave {
            id: Uuid::new_v4(),
            technician_id: Uuid::new_v4(),
            start_date: date,
            end_date: date,
            start_time: Some(t(13, 0)),
            end_time: Some(t(15, 0)),
            status: ApprovalStatus::Approved,
            reason: None,
            audit: AuditInfo::new(&actor()),
        };

        assert!(!leave.is_full_day());
        let window = leave.window_on(date).unwrap();
        assert_eq!(window.duration_minutes(), 120);
        assert!(leave
            .window_on(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap())
            .is_none());
    }

    #[test]
    fn test_full_day_leave_has_no_window() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let leave = TechnicianLeave {
            id: Uuid::new_v4(),
            technician_id: Uuid::new_v4(),
            start_date: date,
            end_date: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            start_time: None,
            end_time: None,
            status: ApprovalStatus::Approved,
            reason: Some("年假".to_string()),
            audit: AuditInfo::new(&actor()),
        };

        assert!(leave.is_full_day());
        assert!(leave.covers_date(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()));
        assert!(leave.window_on(date).is_none());
    }
}
