//! 派工执行层
//!
//! 管理派工单的状态机、子记录集合（工时/费用/材料/备注/附件）
//! 及其审批流，并提供只读的统计汇总。

pub mod items;
pub mod lifecycle;
pub mod stats;

pub use items::{DispatchItemService, NewExpense, NewMaterialUsage, NewTimeEntry, NewUpload};
pub use lifecycle::{DispatchService, UpdateDispatchSchedule};
pub use stats::{DispatchStatistics, StatisticsFilter, StatisticsService};
