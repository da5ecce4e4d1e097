//! 排班规划层
//!
//! 负责技术员可用性解析、排班冲突校验与工单分配编排。
//! 本层只做预检与编排，不持有排他锁；无重复预约不变式
//! 最终由派工单仓储在提交时强制。

pub mod availability;
pub mod assignment;
pub mod validator;

pub use assignment::{
    AssignJobCommand, AssignmentResult, AssignmentService, AvailableTechnician, BatchAssignItem,
    BatchAssignResult,
};
pub use availability::{AvailabilityResolver, DaySchedule, TechnicianSchedule};
pub use validator::{AssignmentCheck, AssignmentValidator, ValidateAssignmentRequest};
