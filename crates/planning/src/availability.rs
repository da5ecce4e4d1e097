use std::sync::Arc;

use chrono::NaiveDate;
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::repositories::{DispatchRepository, TechnicianRepository};
use fieldops_domain::value_objects::TimeWindow;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// 解析范围上限，防止一次请求展开过大的日期区间
const MAX_RANGE_DAYS: i64 = 366;

/// 技术员在单日内的一段占用（请假或已排派工单）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusyInterval {
    /// 占用来源记录ID（派工单或请假记录）
    pub source_id: Uuid,
    /// None 表示整天占用（无时间界限的请假）
    pub window: Option<TimeWindow>,
}

/// 技术员单日日程
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    /// 当日工作时段；None 表示该星期几不上班
    pub working_window: Option<TimeWindow>,
    pub leaves: Vec<BusyInterval>,
    pub dispatches: Vec<BusyInterval>,
    /// 已排派工时长合计
    pub scheduled_minutes: i64,
    /// 可用时长 = 工作时段 − 请假重叠 − 派工重叠，不为负
    pub available_minutes: i64,
}

/// 技术员日期区间内的日程汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianSchedule {
    pub technician_id: Uuid,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub days: Vec<DaySchedule>,
    pub total_scheduled_minutes: i64,
    pub total_available_minutes: i64,
}

/// 技术员可用性解析器
///
/// 从每周工作时段模板、已批准请假与既有派工单推导出
/// 技术员的忙/闲时段，只读不写。
pub struct AvailabilityResolver {
    technician_repo: Arc<dyn TechnicianRepository>,
    dispatch_repo: Arc<dyn DispatchRepository>,
}

impl AvailabilityResolver {
    pub fn new(
        technician_repo: Arc<dyn TechnicianRepository>,
        dispatch_repo: Arc<dyn DispatchRepository>,
    ) -> Self {
        Self {
            technician_repo,
            dispatch_repo,
        }
    }

    pub async fn resolve(
        &self,
        technician_id: Uuid,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> FieldOpsResult<TechnicianSchedule> {
        if from_date > to_date {
            return Err(FieldOpsError::validation_error(format!(
                "无效的日期区间: {from_date} 晚于 {to_date}"
            )));
        }
        let span_days = (to_date - from_date).num_days() + 1;
        if span_days > MAX_RANGE_DAYS {
            return Err(FieldOpsError::validation_error(format!(
                "日期区间过大: {span_days} 天，上限 {MAX_RANGE_DAYS} 天"
            )));
        }

        self.technician_repo
            .get_by_id(technician_id)
            .await?
            .ok_or(FieldOpsError::TechnicianNotFound { id: technician_id })?;

        let working_hours = self.technician_repo.get_working_hours(technician_id).await?;
        let leaves = self
            .technician_repo
            .get_leaves_between(technician_id, from_date, to_date)
            .await?;

        let mut days = Vec::with_capacity(span_days as usize);
        let mut date = from_date;
        while date <= to_date {
            let working_window = working_hours
                .iter()
                .find(|row| row.applies_on(date))
                .map(|row| row.window());

            let day_leaves: Vec<BusyInterval> = leaves
                .iter()
                .filter(|leave| leave.is_approved() && leave.covers_date(date))
                .map(|leave| BusyInterval {
                    source_id: leave.id,
                    window: leave.window_on(date),
                })
                .collect();

            let dispatches = self
                .dispatch_repo
                .find_by_technician_and_date(technician_id, date)
                .await?;
            let day_dispatches: Vec<BusyInterval> = dispatches
                .iter()
                .map(|d| BusyInterval {
                    source_id: d.id,
                    window: Some(d.scheduled_window()),
                })
                .collect();

            let scheduled_minutes: i64 = day_dispatches
                .iter()
                .filter_map(|b| b.window.as_ref())
                .map(|w| w.duration_minutes())
                .sum();

            let available_minutes = match working_window {
                None => 0,
                Some(working) => {
                    // 整天请假直接清零，不需要再做区间运算
                    if day_leaves.iter().any(|b| b.window.is_none()) {
                        0
                    } else {
                        let leave_overlap: i64 = day_leaves
                            .iter()
                            .filter_map(|b| b.window.as_ref())
                            .map(|w| working.overlap_minutes(w))
                            .sum();
                        let dispatch_overlap: i64 = day_dispatches
                            .iter()
                            .filter_map(|b| b.window.as_ref())
                            .map(|w| working.overlap_minutes(w))
                            .sum();
                        (working.duration_minutes() - leave_overlap - dispatch_overlap).max(0)
                    }
                }
            };

            days.push(DaySchedule {
                date,
                working_window,
                leaves: day_leaves,
                dispatches: day_dispatches,
                scheduled_minutes,
                available_minutes,
            });

            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        let total_scheduled_minutes = days.iter().map(|d| d.scheduled_minutes).sum();
        let total_available_minutes = days.iter().map(|d| d.available_minutes).sum();
        debug!(
            "解析技术员 {} 日程: {} 至 {}，可用 {} 分钟，已排 {} 分钟",
            technician_id, from_date, to_date, total_available_minutes, total_scheduled_minutes
        );

        Ok(TechnicianSchedule {
            technician_id,
            from_date,
            to_date,
            days,
            total_scheduled_minutes,
            total_available_minutes,
        })
    }

    /// 技术员在指定日期的时间窗内是否完全空闲：
    /// 工作时段覆盖整个时间窗，且与请假、既有派工均无重叠
    pub async fn is_free(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> FieldOpsResult<bool> {
        let schedule = self.resolve(technician_id, date, date).await?;
        let day = match schedule.days.first() {
            Some(day) => day,
            None => return Ok(false),
        };
        Ok(Self::day_is_free(day, window))
    }

    pub(crate) fn day_is_free(day: &DaySchedule, window: &TimeWindow) -> bool {
        let working = match &day.working_window {
            Some(working) => working,
            None => return false,
        };
        if !working.contains(window) {
            return false;
        }
        let blocked = |intervals: &[BusyInterval]| {
            intervals.iter().any(|b| match &b.window {
                None => true,
                Some(w) => w.overlaps(window),
            })
        };
        !blocked(&day.leaves) && !blocked(&day.dispatches)
    }
}
