//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则。实体之间只通过ID引用，
//! 关联数据由调用方按需经仓储加载，避免双向对象图。

use async_trait::async_trait;
use chrono::NaiveDate;
use fieldops_core::FieldOpsResult;
use uuid::Uuid;

use crate::entities::{
    Attachment, Dispatch, DispatchFilter, DispatchNote, Expense, Job, JobFilter, MaterialUsage,
    Technician, TechnicianLeave, TechnicianWorkingHours, TimeEntry,
};
use crate::value_objects::ActorContext;

/// 工单仓储抽象
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> FieldOpsResult<Job>;
    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Job>>;
    async fn update(&self, job: &Job) -> FieldOpsResult<Job>;
    /// 未排班工单查询，按优先级降序、创建时间升序
    async fn list_unassigned(&self, filter: &JobFilter) -> FieldOpsResult<Vec<Job>>;
    async fn count_unassigned(&self, filter: &JobFilter) -> FieldOpsResult<i64>;
}

/// 技术员仓储抽象（技能、工作时段、请假），对排班核心只读
#[async_trait]
pub trait TechnicianRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Technician>>;
    async fn list_active(&self) -> FieldOpsResult<Vec<Technician>>;
    async fn get_working_hours(
        &self,
        technician_id: Uuid,
    ) -> FieldOpsResult<Vec<TechnicianWorkingHours>>;
    /// 与[from, to]日期区间相交的请假记录（含待审批）
    async fn get_leaves_between(
        &self,
        technician_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> FieldOpsResult<Vec<TechnicianLeave>>;
}

/// 派工单仓储抽象
///
/// create/update_schedule 必须在提交时重新校验技术员时间窗重叠，
/// 不能只依赖上层校验器的预检（check-then-act竞态在此关闭）。
#[async_trait]
pub trait DispatchRepository: Send + Sync {
    async fn create(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch>;
    /// 软删除的记录视为不存在
    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Dispatch>>;
    async fn update(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch>;
    /// 调整排班字段，带重叠重校验
    async fn update_schedule(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch>;
    async fn soft_delete(&self, id: Uuid, actor: &ActorContext) -> FieldOpsResult<bool>;
    async fn list(&self, filter: &DispatchFilter) -> FieldOpsResult<Vec<Dispatch>>;
    async fn count(&self, filter: &DispatchFilter) -> FieldOpsResult<i64>;
    /// 技术员某日的全部未取消派工单，用于可用性解析与冲突检测
    async fn find_by_technician_and_date(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
    ) -> FieldOpsResult<Vec<Dispatch>>;
}

/// 派工子项仓储抽象（工时/费用/材料/备注/附件）
///
/// update_* 携带期望版本号做乐观并发控制，版本不匹配返回Conflict。
#[async_trait]
pub trait DispatchItemRepository: Send + Sync {
    async fn add_time_entry(&self, entry: &TimeEntry) -> FieldOpsResult<TimeEntry>;
    async fn get_time_entry(&self, id: Uuid) -> FieldOpsResult<Option<TimeEntry>>;
    async fn update_time_entry(
        &self,
        entry: &TimeEntry,
        expected_version: i32,
    ) -> FieldOpsResult<TimeEntry>;
    async fn list_time_entries(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<TimeEntry>>;

    async fn add_expense(&self, expense: &Expense) -> FieldOpsResult<Expense>;
    async fn get_expense(&self, id: Uuid) -> FieldOpsResult<Option<Expense>>;
    async fn update_expense(
        &self,
        expense: &Expense,
        expected_version: i32,
    ) -> FieldOpsResult<Expense>;
    async fn list_expenses(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Expense>>;

    async fn add_material_usage(&self, usage: &MaterialUsage) -> FieldOpsResult<MaterialUsage>;
    async fn get_material_usage(&self, id: Uuid) -> FieldOpsResult<Option<MaterialUsage>>;
    async fn update_material_usage(
        &self,
        usage: &MaterialUsage,
        expected_version: i32,
    ) -> FieldOpsResult<MaterialUsage>;
    async fn list_material_usages(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<MaterialUsage>>;

    async fn add_note(&self, note: &DispatchNote) -> FieldOpsResult<DispatchNote>;
    async fn list_notes(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<DispatchNote>>;

    async fn add_attachment(&self, attachment: &Attachment) -> FieldOpsResult<Attachment>;
    async fn get_attachment(&self, id: Uuid) -> FieldOpsResult<Option<Attachment>>;
    async fn list_attachments(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Attachment>>;
}
