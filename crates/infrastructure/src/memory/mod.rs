//! 内存仓储实现
//!
//! 与Postgres实现遵守同一套契约，用于单元/集成测试与嵌入式部署场景。
//! 重叠校验与插入在同一把锁内完成，与数据库实现一样在提交点关闭
//! check-then-act 竞态。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::entities::{
    Attachment, Dispatch, DispatchFilter, DispatchNote, DispatchStatus, Expense, Job, JobFilter,
    JobStatus, MaterialUsage, Priority, Technician, TechnicianLeave, TechnicianWorkingHours,
    TimeEntry,
};
use fieldops_domain::ports::FileStorage;
use fieldops_domain::repositories::{
    DispatchItemRepository, DispatchRepository, JobRepository, TechnicianRepository,
};
use fieldops_domain::value_objects::ActorContext;
use uuid::Uuid;

fn priority_rank(priority: Priority) -> u8 {
    match priority {
        Priority::Urgent => 0,
        Priority::High => 1,
        Priority::Normal => 2,
        Priority::Low => 3,
    }
}

/// 工单内存仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobRepository {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        let map = jobs.into_iter().map(|j| (j.id, j)).collect();
        Self {
            jobs: Arc::new(Mutex::new(map)),
        }
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    fn matches(job: &Job, filter: &JobFilter) -> bool {
        if job.status != JobStatus::Unscheduled {
            return false;
        }
        if let Some(service_order_id) = filter.service_order_id {
            if job.service_order_id != service_order_id {
                return false;
            }
        }
        if let Some(priority) = filter.priority {
            if job.priority != priority {
                return false;
            }
        }
        if let Some(skill) = &filter.skill {
            if !job
                .required_skills
                .iter()
                .any(|s| s.eq_ignore_ascii_case(skill))
            {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> FieldOpsResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, job: &Job) -> FieldOpsResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(FieldOpsError::JobNotFound { id: job.id });
        }
        jobs.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn list_unassigned(&self, filter: &JobFilter) -> FieldOpsResult<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<Job> = jobs
            .values()
            .filter(|j| Self::matches(j, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            priority_rank(a.priority)
                .cmp(&priority_rank(b.priority))
                .then(a.audit.created_at.cmp(&b.audit.created_at))
        });
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(50).max(0) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_unassigned(&self, filter: &JobFilter) -> FieldOpsResult<i64> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.values().filter(|j| Self::matches(j, filter)).count() as i64)
    }
}

/// 技术员内存仓储，带测试数据装配方法
#[derive(Debug, Clone, Default)]
pub struct InMemoryTechnicianRepository {
    technicians: Arc<Mutex<HashMap<Uuid, Technician>>>,
    working_hours: Arc<Mutex<Vec<TechnicianWorkingHours>>>,
    leaves: Arc<Mutex<Vec<TechnicianLeave>>>,
}

impl InMemoryTechnicianRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_technician(&self, technician: Technician) {
        self.technicians
            .lock()
            .unwrap()
            .insert(technician.id, technician);
    }

    pub fn insert_working_hours(&self, hours: TechnicianWorkingHours) {
        self.working_hours.lock().unwrap().push(hours);
    }

    pub fn insert_leave(&self, leave: TechnicianLeave) {
        self.leaves.lock().unwrap().push(leave);
    }
}

#[async_trait]
impl TechnicianRepository for InMemoryTechnicianRepository {
    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Technician>> {
        Ok(self.technicians.lock().unwrap().get(&id).cloned())
    }

    async fn list_active(&self) -> FieldOpsResult<Vec<Technician>> {
        let mut active: Vec<Technician> = self
            .technicians
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }

    async fn get_working_hours(
        &self,
        technician_id: Uuid,
    ) -> FieldOpsResult<Vec<TechnicianWorkingHours>> {
        Ok(self
            .working_hours
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.technician_id == technician_id)
            .cloned()
            .collect())
    }

    async fn get_leaves_between(
        &self,
        technician_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> FieldOpsResult<Vec<TechnicianLeave>> {
        Ok(self
            .leaves
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.technician_id == technician_id && l.start_date <= to && l.end_date >= from)
            .cloned()
            .collect())
    }
}

/// 派工单内存仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryDispatchRepository {
    dispatches: Arc<Mutex<HashMap<Uuid, Dispatch>>>,
}

impl InMemoryDispatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 含已软删除记录的总数，仅测试断言用
    pub fn stored_count(&self) -> usize {
        self.dispatches.lock().unwrap().len()
    }

    /// 锁内重叠检查，调用方必须已持有 dispatches 锁
    fn find_overlap(
        dispatches: &HashMap<Uuid, Dispatch>,
        candidate: &Dispatch,
    ) -> Option<Uuid> {
        let window = candidate.scheduled_window();
        dispatches.values().find_map(|existing| {
            if existing.id == candidate.id {
                return None;
            }
            let occupied = candidate.technician_ids.iter().any(|tech| {
                existing.occupies(*tech, candidate.scheduled_date, &window)
            });
            occupied.then_some(existing.id)
        })
    }

    fn matches(dispatch: &Dispatch, filter: &DispatchFilter) -> bool {
        if dispatch.deleted {
            return false;
        }
        if let Some(status) = filter.status {
            if dispatch.status != status {
                return false;
            }
        }
        if let Some(technician_id) = filter.technician_id {
            if !dispatch.technician_ids.contains(&technician_id) {
                return false;
            }
        }
        if let Some(priority) = filter.priority {
            if dispatch.priority != priority {
                return false;
            }
        }
        if let Some(from) = filter.from_date {
            if dispatch.scheduled_date < from {
                return false;
            }
        }
        if let Some(to) = filter.to_date {
            if dispatch.scheduled_date > to {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl DispatchRepository for InMemoryDispatchRepository {
    async fn create(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch> {
        let mut dispatches = self.dispatches.lock().unwrap();
        if let Some(existing) = Self::find_overlap(&dispatches, dispatch) {
            return Err(FieldOpsError::conflict(format!(
                "技术员在 {} {}-{} 已有派工单 {}",
                dispatch.scheduled_date, dispatch.scheduled_start, dispatch.scheduled_end, existing
            )));
        }
        dispatches.insert(dispatch.id, dispatch.clone());
        Ok(dispatch.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Dispatch>> {
        Ok(self
            .dispatches
            .lock()
            .unwrap()
            .get(&id)
            .filter(|d| !d.deleted)
            .cloned())
    }

    async fn update(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch> {
        let mut dispatches = self.dispatches.lock().unwrap();
        match dispatches.get(&dispatch.id) {
            Some(existing) if !existing.deleted => {
                dispatches.insert(dispatch.id, dispatch.clone());
                Ok(dispatch.clone())
            }
            _ => Err(FieldOpsError::DispatchNotFound { id: dispatch.id }),
        }
    }

    async fn update_schedule(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch> {
        let mut dispatches = self.dispatches.lock().unwrap();
        match dispatches.get(&dispatch.id) {
            Some(existing) if !existing.deleted => {}
            _ => return Err(FieldOpsError::DispatchNotFound { id: dispatch.id }),
        }
        if let Some(existing) = Self::find_overlap(&dispatches, dispatch) {
            return Err(FieldOpsError::conflict(format!(
                "技术员在 {} {}-{} 已有派工单 {}",
                dispatch.scheduled_date, dispatch.scheduled_start, dispatch.scheduled_end, existing
            )));
        }
        dispatches.insert(dispatch.id, dispatch.clone());
        Ok(dispatch.clone())
    }

    async fn soft_delete(&self, id: Uuid, actor: &ActorContext) -> FieldOpsResult<bool> {
        let mut dispatches = self.dispatches.lock().unwrap();
        match dispatches.get_mut(&id) {
            Some(dispatch) if !dispatch.deleted => {
                dispatch.deleted = true;
                dispatch.audit.touch(actor);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filter: &DispatchFilter) -> FieldOpsResult<Vec<Dispatch>> {
        let dispatches = self.dispatches.lock().unwrap();
        let mut matched: Vec<Dispatch> = dispatches
            .values()
            .filter(|d| Self::matches(d, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.scheduled_date
                .cmp(&b.scheduled_date)
                .then(a.scheduled_start.cmp(&b.scheduled_start))
        });
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(50).max(0) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &DispatchFilter) -> FieldOpsResult<i64> {
        let dispatches = self.dispatches.lock().unwrap();
        Ok(dispatches
            .values()
            .filter(|d| Self::matches(d, filter))
            .count() as i64)
    }

    async fn find_by_technician_and_date(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
    ) -> FieldOpsResult<Vec<Dispatch>> {
        let dispatches = self.dispatches.lock().unwrap();
        let mut matched: Vec<Dispatch> = dispatches
            .values()
            .filter(|d| {
                !d.deleted
                    && d.status != DispatchStatus::Cancelled
                    && d.scheduled_date == date
                    && d.technician_ids.contains(&technician_id)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.scheduled_start.cmp(&b.scheduled_start));
        Ok(matched)
    }
}

/// 派工子记录内存仓储
#[derive(Debug, Clone, Default)]
pub struct InMemoryDispatchItemRepository {
    time_entries: Arc<Mutex<HashMap<Uuid, TimeEntry>>>,
    expenses: Arc<Mutex<HashMap<Uuid, Expense>>>,
    materials: Arc<Mutex<HashMap<Uuid, MaterialUsage>>>,
    notes: Arc<Mutex<Vec<DispatchNote>>>,
    attachments: Arc<Mutex<HashMap<Uuid, Attachment>>>,
}

impl InMemoryDispatchItemRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchItemRepository for InMemoryDispatchItemRepository {
    async fn add_time_entry(&self, entry: &TimeEntry) -> FieldOpsResult<TimeEntry> {
        self.time_entries
            .lock()
            .unwrap()
            .insert(entry.id, entry.clone());
        Ok(entry.clone())
    }

    async fn get_time_entry(&self, id: Uuid) -> FieldOpsResult<Option<TimeEntry>> {
        Ok(self.time_entries.lock().unwrap().get(&id).cloned())
    }

    async fn update_time_entry(
        &self,
        entry: &TimeEntry,
        expected_version: i32,
    ) -> FieldOpsResult<TimeEntry> {
        let mut entries = self.time_entries.lock().unwrap();
        match entries.get(&entry.id) {
            Some(existing) if existing.version == expected_version => {
                entries.insert(entry.id, entry.clone());
                Ok(entry.clone())
            }
            Some(_) => Err(FieldOpsError::conflict(format!(
                "工时记录 {} 已被并发修改，请重试",
                entry.id
            ))),
            None => Err(FieldOpsError::item_not_found("time_entry", entry.id)),
        }
    }

    async fn list_time_entries(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<TimeEntry>> {
        let mut entries: Vec<TimeEntry> = self
            .time_entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.dispatch_id == dispatch_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(entries)
    }

    async fn add_expense(&self, expense: &Expense) -> FieldOpsResult<Expense> {
        self.expenses
            .lock()
            .unwrap()
            .insert(expense.id, expense.clone());
        Ok(expense.clone())
    }

    async fn get_expense(&self, id: Uuid) -> FieldOpsResult<Option<Expense>> {
        Ok(self.expenses.lock().unwrap().get(&id).cloned())
    }

    async fn update_expense(
        &self,
        expense: &Expense,
        expected_version: i32,
    ) -> FieldOpsResult<Expense> {
        let mut expenses = self.expenses.lock().unwrap();
        match expenses.get(&expense.id) {
            Some(existing) if existing.version == expected_version => {
                expenses.insert(expense.id, expense.clone());
                Ok(expense.clone())
            }
            Some(_) => Err(FieldOpsError::conflict(format!(
                "费用记录 {} 已被并发修改，请重试",
                expense.id
            ))),
            None => Err(FieldOpsError::item_not_found("expense", expense.id)),
        }
    }

    async fn list_expenses(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Expense>> {
        let mut expenses: Vec<Expense> = self
            .expenses
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.dispatch_id == dispatch_id)
            .cloned()
            .collect();
        expenses.sort_by(|a, b| a.audit.created_at.cmp(&b.audit.created_at));
        Ok(expenses)
    }

    async fn add_material_usage(&self, usage: &MaterialUsage) -> FieldOpsResult<MaterialUsage> {
        self.materials
            .lock()
            .unwrap()
            .insert(usage.id, usage.clone());
        Ok(usage.clone())
    }

    async fn get_material_usage(&self, id: Uuid) -> FieldOpsResult<Option<MaterialUsage>> {
        Ok(self.materials.lock().unwrap().get(&id).cloned())
    }

    async fn update_material_usage(
        &self,
        usage: &MaterialUsage,
        expected_version: i32,
    ) -> FieldOpsResult<MaterialUsage> {
        let mut materials = self.materials.lock().unwrap();
        match materials.get(&usage.id) {
            Some(existing) if existing.version == expected_version => {
                materials.insert(usage.id, usage.clone());
                Ok(usage.clone())
            }
            Some(_) => Err(FieldOpsError::conflict(format!(
                "材料记录 {} 已被并发修改，请重试",
                usage.id
            ))),
            None => Err(FieldOpsError::item_not_found("material_usage", usage.id)),
        }
    }

    async fn list_material_usages(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<MaterialUsage>> {
        let mut materials: Vec<MaterialUsage> = self
            .materials
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.dispatch_id == dispatch_id)
            .cloned()
            .collect();
        materials.sort_by(|a, b| a.audit.created_at.cmp(&b.audit.created_at));
        Ok(materials)
    }

    async fn add_note(&self, note: &DispatchNote) -> FieldOpsResult<DispatchNote> {
        self.notes.lock().unwrap().push(note.clone());
        Ok(note.clone())
    }

    async fn list_notes(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<DispatchNote>> {
        Ok(self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.dispatch_id == dispatch_id)
            .cloned()
            .collect())
    }

    async fn add_attachment(&self, attachment: &Attachment) -> FieldOpsResult<Attachment> {
        self.attachments
            .lock()
            .unwrap()
            .insert(attachment.id, attachment.clone());
        Ok(attachment.clone())
    }

    async fn get_attachment(&self, id: Uuid) -> FieldOpsResult<Option<Attachment>> {
        Ok(self.attachments.lock().unwrap().get(&id).cloned())
    }

    async fn list_attachments(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Attachment>> {
        let mut attachments: Vec<Attachment> = self
            .attachments
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.dispatch_id == dispatch_id)
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(attachments)
    }
}

/// 内存文件存储，仅用于测试
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn store(
        &self,
        dispatch_id: Uuid,
        file_name: &str,
        content: Vec<u8>,
    ) -> FieldOpsResult<String> {
        let path = format!("{dispatch_id}/{}/{file_name}", Uuid::new_v4());
        self.files.lock().unwrap().insert(path.clone(), content);
        Ok(path)
    }

    async fn load(&self, storage_path: &str) -> FieldOpsResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(storage_path)
            .cloned()
            .ok_or_else(|| FieldOpsError::storage_error(format!("文件不存在: {storage_path}")))
    }

    async fn remove(&self, storage_path: &str) -> FieldOpsResult<()> {
        self.files.lock().unwrap().remove(storage_path);
        Ok(())
    }
}
