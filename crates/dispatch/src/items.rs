use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::entities::{
    ApprovalOutcome, Attachment, DispatchNote, Expense, MaterialUsage, TimeEntry,
};
use fieldops_domain::ports::FileStorage;
use fieldops_domain::repositories::{DispatchItemRepository, DispatchRepository};
use fieldops_domain::value_objects::ActorContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTimeEntry {
    pub technician_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub hourly_rate: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub technician_id: Uuid,
    pub category: String,
    pub amount: f64,
    pub currency: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMaterialUsage {
    pub material_code: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_cost: f64,
    pub description: Option<String>,
}

/// 附件上传请求：字节流由调用方读出后整体传入
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// 派工子记录服务：新增、查询与审批
///
/// 所有新增的审批项初始为 PENDING；审批幂等，重复批准返回首次结果。
/// 写入经乐观版本校验，并发审批收敛为单一终态。
pub struct DispatchItemService {
    dispatch_repo: Arc<dyn DispatchRepository>,
    item_repo: Arc<dyn DispatchItemRepository>,
    file_storage: Arc<dyn FileStorage>,
}

impl DispatchItemService {
    pub fn new(
        dispatch_repo: Arc<dyn DispatchRepository>,
        item_repo: Arc<dyn DispatchItemRepository>,
        file_storage: Arc<dyn FileStorage>,
    ) -> Self {
        Self {
            dispatch_repo,
            item_repo,
            file_storage,
        }
    }

    /// 父级派工单必须存在且未被软删除
    async fn ensure_dispatch(&self, dispatch_id: Uuid) -> FieldOpsResult<()> {
        self.dispatch_repo
            .get_by_id(dispatch_id)
            .await?
            .ok_or(FieldOpsError::DispatchNotFound { id: dispatch_id })?;
        Ok(())
    }

    pub async fn add_time_entry(
        &self,
        dispatch_id: Uuid,
        request: &NewTimeEntry,
        actor: &ActorContext,
    ) -> FieldOpsResult<TimeEntry> {
        self.ensure_dispatch(dispatch_id).await?;
        let entry = TimeEntry::new(
            dispatch_id,
            request.technician_id,
            request.started_at,
            request.ended_at,
            request.hourly_rate,
            request.description.clone(),
            actor,
        )?;
        let entry = self.item_repo.add_time_entry(&entry).await?;
        debug!("派工单 {} 新增工时记录 {}", dispatch_id, entry.id);
        Ok(entry)
    }

    pub async fn list_time_entries(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<TimeEntry>> {
        self.ensure_dispatch(dispatch_id).await?;
        self.item_repo.list_time_entries(dispatch_id).await
    }

    pub async fn approve_time_entry(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> FieldOpsResult<TimeEntry> {
        let mut entry = self
            .item_repo
            .get_time_entry(id)
            .await?
            .ok_or_else(|| FieldOpsError::item_not_found("time_entry", id))?;
        self.ensure_dispatch(entry.dispatch_id).await?;
        match entry.approve(actor)? {
            ApprovalOutcome::AlreadyInState => Ok(entry),
            ApprovalOutcome::Applied => {
                let expected = entry.version;
                entry.version += 1;
                entry.audit.touch(actor);
                let entry = self.item_repo.update_time_entry(&entry, expected).await?;
                info!("工时记录 {} 已批准", entry.id);
                Ok(entry)
            }
        }
    }

    pub async fn reject_time_entry(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> FieldOpsResult<TimeEntry> {
        let mut entry = self
            .item_repo
            .get_time_entry(id)
            .await?
            .ok_or_else(|| FieldOpsError::item_not_found("time_entry", id))?;
        self.ensure_dispatch(entry.dispatch_id).await?;
        match entry.reject(actor)? {
            ApprovalOutcome::AlreadyInState => Ok(entry),
            ApprovalOutcome::Applied => {
                let expected = entry.version;
                entry.version += 1;
                entry.audit.touch(actor);
                let entry = self.item_repo.update_time_entry(&entry, expected).await?;
                info!("工时记录 {} 已驳回", entry.id);
                Ok(entry)
            }
        }
    }

    pub async fn add_expense(
        &self,
        dispatch_id: Uuid,
        request: &NewExpense,
        actor: &ActorContext,
    ) -> FieldOpsResult<Expense> {
        self.ensure_dispatch(dispatch_id).await?;
        let expense = Expense::new(
            dispatch_id,
            request.technician_id,
            request.category.clone(),
            request.amount,
            request.currency.clone(),
            request.description.clone(),
            actor,
        )?;
        let expense = self.item_repo.add_expense(&expense).await?;
        debug!("派工单 {} 新增费用记录 {}", dispatch_id, expense.id);
        Ok(expense)
    }

    pub async fn list_expenses(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Expense>> {
        self.ensure_dispatch(dispatch_id).await?;
        self.item_repo.list_expenses(dispatch_id).await
    }

    pub async fn approve_expense(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> FieldOpsResult<Expense> {
        let mut expense = self
            .item_repo
            .get_expense(id)
            .await?
            .ok_or_else(|| FieldOpsError::item_not_found("expense", id))?;
        self.ensure_dispatch(expense.dispatch_id).await?;
        match expense.approve(actor)? {
            ApprovalOutcome::AlreadyInState => Ok(expense),
            ApprovalOutcome::Applied => {
                let expected = expense.version;
                expense.version += 1;
                expense.audit.touch(actor);
                let expense = self.item_repo.update_expense(&expense, expected).await?;
                info!("费用记录 {} 已批准", expense.id);
                Ok(expense)
            }
        }
    }

    pub async fn reject_expense(&self, id: Uuid, actor: &ActorContext) -> FieldOpsResult<Expense> {
        let mut expense = self
            .item_repo
            .get_expense(id)
            .await?
            .ok_or_else(|| FieldOpsError::item_not_found("expense", id))?;
        self.ensure_dispatch(expense.dispatch_id).await?;
        match expense.reject(actor)? {
            ApprovalOutcome::AlreadyInState => Ok(expense),
            ApprovalOutcome::Applied => {
                let expected = expense.version;
                expense.version += 1;
                expense.audit.touch(actor);
                let expense = self.item_repo.update_expense(&expense, expected).await?;
                info!("费用记录 {} 已驳回", expense.id);
                Ok(expense)
            }
        }
    }

    pub async fn add_material_usage(
        &self,
        dispatch_id: Uuid,
        request: &NewMaterialUsage,
        actor: &ActorContext,
    ) -> FieldOpsResult<MaterialUsage> {
        self.ensure_dispatch(dispatch_id).await?;
        let usage = MaterialUsage::new(
            dispatch_id,
            request.material_code.clone(),
            request.quantity,
            request.unit.clone(),
            request.unit_cost,
            request.description.clone(),
            actor,
        )?;
        let usage = self.item_repo.add_material_usage(&usage).await?;
        debug!("派工单 {} 新增材料记录 {}", dispatch_id, usage.id);
        Ok(usage)
    }

    pub async fn list_material_usages(
        &self,
        dispatch_id: Uuid,
    ) -> FieldOpsResult<Vec<MaterialUsage>> {
        self.ensure_dispatch(dispatch_id).await?;
        self.item_repo.list_material_usages(dispatch_id).await
    }

    pub async fn approve_material_usage(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> FieldOpsResult<MaterialUsage> {
        let mut usage = self
            .item_repo
            .get_material_usage(id)
            .await?
            .ok_or_else(|| FieldOpsError::item_not_found("material_usage", id))?;
        self.ensure_dispatch(usage.dispatch_id).await?;
        match usage.approve(actor)? {
            ApprovalOutcome::AlreadyInState => Ok(usage),
            ApprovalOutcome::Applied => {
                let expected = usage.version;
                usage.version += 1;
                usage.audit.touch(actor);
                let usage = self.item_repo.update_material_usage(&usage, expected).await?;
                info!("材料记录 {} 已批准", usage.id);
                Ok(usage)
            }
        }
    }

    pub async fn reject_material_usage(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> FieldOpsResult<MaterialUsage> {
        let mut usage = self
            .item_repo
            .get_material_usage(id)
            .await?
            .ok_or_else(|| FieldOpsError::item_not_found("material_usage", id))?;
        self.ensure_dispatch(usage.dispatch_id).await?;
        match usage.reject(actor)? {
            ApprovalOutcome::AlreadyInState => Ok(usage),
            ApprovalOutcome::Applied => {
                let expected = usage.version;
                usage.version += 1;
                usage.audit.touch(actor);
                let usage = self.item_repo.update_material_usage(&usage, expected).await?;
                info!("材料记录 {} 已驳回", usage.id);
                Ok(usage)
            }
        }
    }

    pub async fn add_note(
        &self,
        dispatch_id: Uuid,
        body: String,
        actor: &ActorContext,
    ) -> FieldOpsResult<DispatchNote> {
        self.ensure_dispatch(dispatch_id).await?;
        let note = DispatchNote::new(dispatch_id, body, actor)?;
        self.item_repo.add_note(&note).await
    }

    pub async fn list_notes(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<DispatchNote>> {
        self.ensure_dispatch(dispatch_id).await?;
        self.item_repo.list_notes(dispatch_id).await
    }

    /// 上传附件：内容先经存储端口落盘，再登记元数据
    pub async fn upload_attachment(
        &self,
        dispatch_id: Uuid,
        upload: NewUpload,
        actor: &ActorContext,
    ) -> FieldOpsResult<Attachment> {
        self.ensure_dispatch(dispatch_id).await?;
        if upload.file_name.trim().is_empty() {
            return Err(FieldOpsError::validation_error("附件文件名不能为空"));
        }
        if upload.content.is_empty() {
            return Err(FieldOpsError::validation_error("附件内容不能为空"));
        }
        let size_bytes = upload.content.len() as i64;
        let storage_path = self
            .file_storage
            .store(dispatch_id, &upload.file_name, upload.content)
            .await?;
        let attachment = Attachment {
            id: Uuid::new_v4(),
            dispatch_id,
            file_name: upload.file_name,
            content_type: upload.content_type,
            size_bytes,
            storage_path,
            uploaded_by: actor.actor_id,
            uploaded_at: Utc::now(),
        };
        let attachment = self.item_repo.add_attachment(&attachment).await?;
        info!(
            "派工单 {} 上传附件 {} ({} 字节)",
            dispatch_id, attachment.file_name, attachment.size_bytes
        );
        Ok(attachment)
    }

    pub async fn list_attachments(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Attachment>> {
        self.ensure_dispatch(dispatch_id).await?;
        self.item_repo.list_attachments(dispatch_id).await
    }

    /// 下载附件内容及元数据
    pub async fn get_attachment(&self, id: Uuid) -> FieldOpsResult<(Attachment, Vec<u8>)> {
        let attachment = self
            .item_repo
            .get_attachment(id)
            .await?
            .ok_or(FieldOpsError::AttachmentNotFound { id })?;
        self.ensure_dispatch(attachment.dispatch_id).await?;
        let content = self.file_storage.load(&attachment.storage_path).await?;
        Ok((attachment, content))
    }
}
