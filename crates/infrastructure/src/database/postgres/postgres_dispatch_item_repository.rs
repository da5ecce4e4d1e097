use async_trait::async_trait;
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::entities::{Attachment, DispatchNote, Expense, MaterialUsage, TimeEntry};
use fieldops_domain::repositories::DispatchItemRepository;
use fieldops_domain::value_objects::AuditInfo;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

pub struct PostgresDispatchItemRepository {
    pool: PgPool,
}

const TIME_ENTRY_COLUMNS: &str = "id, dispatch_id, technician_id, started_at, ended_at, \
     worked_minutes, description, hourly_rate, status, approved_by, approved_at, version, \
     created_by, created_at, modified_by, modified_at";

const EXPENSE_COLUMNS: &str = "id, dispatch_id, technician_id, category, description, amount, \
     currency, receipt_attachment_id, status, approved_by, approved_at, version, \
     created_by, created_at, modified_by, modified_at";

const MATERIAL_COLUMNS: &str = "id, dispatch_id, material_code, description, quantity, unit, \
     unit_cost, status, approved_by, approved_at, version, \
     created_by, created_at, modified_by, modified_at";

impl PostgresDispatchItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn audit(row: &sqlx::postgres::PgRow) -> FieldOpsResult<AuditInfo> {
        Ok(AuditInfo {
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            modified_by: row.try_get("modified_by")?,
            modified_at: row.try_get("modified_at")?,
        })
    }

    fn row_to_time_entry(row: &sqlx::postgres::PgRow) -> FieldOpsResult<TimeEntry> {
        Ok(TimeEntry {
            id: row.try_get("id")?,
            dispatch_id: row.try_get("dispatch_id")?,
            technician_id: row.try_get("technician_id")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            worked_minutes: row.try_get("worked_minutes")?,
            description: row.try_get("description")?,
            hourly_rate: row.try_get("hourly_rate")?,
            status: row.try_get("status")?,
            approved_by: row.try_get("approved_by")?,
            approved_at: row.try_get("approved_at")?,
            version: row.try_get("version")?,
            audit: Self::audit(row)?,
        })
    }

    fn row_to_expense(row: &sqlx::postgres::PgRow) -> FieldOpsResult<Expense> {
        Ok(Expense {
            id: row.try_get("id")?,
            dispatch_id: row.try_get("dispatch_id")?,
            technician_id: row.try_get("technician_id")?,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            receipt_attachment_id: row.try_get("receipt_attachment_id")?,
            status: row.try_get("status")?,
            approved_by: row.try_get("approved_by")?,
            approved_at: row.try_get("approved_at")?,
            version: row.try_get("version")?,
            audit: Self::audit(row)?,
        })
    }

    fn row_to_material(row: &sqlx::postgres::PgRow) -> FieldOpsResult<MaterialUsage> {
        Ok(MaterialUsage {
            id: row.try_get("id")?,
            dispatch_id: row.try_get("dispatch_id")?,
            material_code: row.try_get("material_code")?,
            description: row.try_get("description")?,
            quantity: row.try_get("quantity")?,
            unit: row.try_get("unit")?,
            unit_cost: row.try_get("unit_cost")?,
            status: row.try_get("status")?,
            approved_by: row.try_get("approved_by")?,
            approved_at: row.try_get("approved_at")?,
            version: row.try_get("version")?,
            audit: Self::audit(row)?,
        })
    }

    fn row_to_note(row: &sqlx::postgres::PgRow) -> FieldOpsResult<DispatchNote> {
        Ok(DispatchNote {
            id: row.try_get("id")?,
            dispatch_id: row.try_get("dispatch_id")?,
            author_id: row.try_get("author_id")?,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_attachment(row: &sqlx::postgres::PgRow) -> FieldOpsResult<Attachment> {
        Ok(Attachment {
            id: row.try_get("id")?,
            dispatch_id: row.try_get("dispatch_id")?,
            file_name: row.try_get("file_name")?,
            content_type: row.try_get("content_type")?,
            size_bytes: row.try_get("size_bytes")?,
            storage_path: row.try_get("storage_path")?,
            uploaded_by: row.try_get("uploaded_by")?,
            uploaded_at: row.try_get("uploaded_at")?,
        })
    }
}

#[async_trait]
impl DispatchItemRepository for PostgresDispatchItemRepository {
    #[instrument(skip(self, entry), fields(dispatch_id = %entry.dispatch_id))]
    async fn add_time_entry(&self, entry: &TimeEntry) -> FieldOpsResult<TimeEntry> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO time_entries (id, dispatch_id, technician_id, started_at, ended_at,
                                      worked_minutes, description, hourly_rate, status,
                                      approved_by, approved_at, version,
                                      created_by, created_at, modified_by, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {TIME_ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(entry.dispatch_id)
        .bind(entry.technician_id)
        .bind(entry.started_at)
        .bind(entry.ended_at)
        .bind(entry.worked_minutes)
        .bind(&entry.description)
        .bind(entry.hourly_rate)
        .bind(entry.status)
        .bind(entry.approved_by)
        .bind(entry.approved_at)
        .bind(entry.version)
        .bind(entry.audit.created_by)
        .bind(entry.audit.created_at)
        .bind(entry.audit.modified_by)
        .bind(entry.audit.modified_at)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_time_entry(&row)
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    async fn get_time_entry(&self, id: Uuid) -> FieldOpsResult<Option<TimeEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_time_entry).transpose()
    }

    /// 乐观并发更新：WHERE 带期望版本，没有命中行即为版本竞争
    #[instrument(skip(self, entry), fields(entry_id = %entry.id))]
    async fn update_time_entry(
        &self,
        entry: &TimeEntry,
        expected_version: i32,
    ) -> FieldOpsResult<TimeEntry> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE time_entries
            SET status = $3, approved_by = $4, approved_at = $5, version = $6,
                modified_by = $7, modified_at = $8
            WHERE id = $1 AND version = $2
            RETURNING {TIME_ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(expected_version)
        .bind(entry.status)
        .bind(entry.approved_by)
        .bind(entry.approved_at)
        .bind(entry.version)
        .bind(entry.audit.modified_by)
        .bind(entry.audit.modified_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            FieldOpsError::conflict(format!("工时记录 {} 已被并发修改，请重试", entry.id))
        })?;
        Self::row_to_time_entry(&row)
    }

    #[instrument(skip(self), fields(dispatch_id = %dispatch_id))]
    async fn list_time_entries(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<TimeEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries WHERE dispatch_id = $1 ORDER BY started_at"
        ))
        .bind(dispatch_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_time_entry).collect()
    }

    #[instrument(skip(self, expense), fields(dispatch_id = %expense.dispatch_id))]
    async fn add_expense(&self, expense: &Expense) -> FieldOpsResult<Expense> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO expenses (id, dispatch_id, technician_id, category, description, amount,
                                  currency, receipt_attachment_id, status, approved_by, approved_at,
                                  version, created_by, created_at, modified_by, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(expense.id)
        .bind(expense.dispatch_id)
        .bind(expense.technician_id)
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.currency)
        .bind(expense.receipt_attachment_id)
        .bind(expense.status)
        .bind(expense.approved_by)
        .bind(expense.approved_at)
        .bind(expense.version)
        .bind(expense.audit.created_by)
        .bind(expense.audit.created_at)
        .bind(expense.audit.modified_by)
        .bind(expense.audit.modified_at)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_expense(&row)
    }

    #[instrument(skip(self), fields(expense_id = %id))]
    async fn get_expense(&self, id: Uuid) -> FieldOpsResult<Option<Expense>> {
        let row = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_expense).transpose()
    }

    #[instrument(skip(self, expense), fields(expense_id = %expense.id))]
    async fn update_expense(
        &self,
        expense: &Expense,
        expected_version: i32,
    ) -> FieldOpsResult<Expense> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE expenses
            SET status = $3, approved_by = $4, approved_at = $5, version = $6,
                modified_by = $7, modified_at = $8
            WHERE id = $1 AND version = $2
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(expense.id)
        .bind(expected_version)
        .bind(expense.status)
        .bind(expense.approved_by)
        .bind(expense.approved_at)
        .bind(expense.version)
        .bind(expense.audit.modified_by)
        .bind(expense.audit.modified_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            FieldOpsError::conflict(format!("费用记录 {} 已被并发修改，请重试", expense.id))
        })?;
        Self::row_to_expense(&row)
    }

    #[instrument(skip(self), fields(dispatch_id = %dispatch_id))]
    async fn list_expenses(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Expense>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE dispatch_id = $1 ORDER BY created_at"
        ))
        .bind(dispatch_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_expense).collect()
    }

    #[instrument(skip(self, usage), fields(dispatch_id = %usage.dispatch_id))]
    async fn add_material_usage(&self, usage: &MaterialUsage) -> FieldOpsResult<MaterialUsage> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO material_usages (id, dispatch_id, material_code, description, quantity,
                                         unit, unit_cost, status, approved_by, approved_at,
                                         version, created_by, created_at, modified_by, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(usage.id)
        .bind(usage.dispatch_id)
        .bind(&usage.material_code)
        .bind(&usage.description)
        .bind(usage.quantity)
        .bind(&usage.unit)
        .bind(usage.unit_cost)
        .bind(usage.status)
        .bind(usage.approved_by)
        .bind(usage.approved_at)
        .bind(usage.version)
        .bind(usage.audit.created_by)
        .bind(usage.audit.created_at)
        .bind(usage.audit.modified_by)
        .bind(usage.audit.modified_at)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_material(&row)
    }

    #[instrument(skip(self), fields(usage_id = %id))]
    async fn get_material_usage(&self, id: Uuid) -> FieldOpsResult<Option<MaterialUsage>> {
        let row = sqlx::query(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM material_usages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_material).transpose()
    }

    #[instrument(skip(self, usage), fields(usage_id = %usage.id))]
    async fn update_material_usage(
        &self,
        usage: &MaterialUsage,
        expected_version: i32,
    ) -> FieldOpsResult<MaterialUsage> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE material_usages
            SET status = $3, approved_by = $4, approved_at = $5, version = $6,
                modified_by = $7, modified_at = $8
            WHERE id = $1 AND version = $2
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(usage.id)
        .bind(expected_version)
        .bind(usage.status)
        .bind(usage.approved_by)
        .bind(usage.approved_at)
        .bind(usage.version)
        .bind(usage.audit.modified_by)
        .bind(usage.audit.modified_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            FieldOpsError::conflict(format!("材料记录 {} 已被并发修改，请重试", usage.id))
        })?;
        Self::row_to_material(&row)
    }

    #[instrument(skip(self), fields(dispatch_id = %dispatch_id))]
    async fn list_material_usages(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<MaterialUsage>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM material_usages WHERE dispatch_id = $1 ORDER BY created_at"
        ))
        .bind(dispatch_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_material).collect()
    }

    #[instrument(skip(self, note), fields(dispatch_id = %note.dispatch_id))]
    async fn add_note(&self, note: &DispatchNote) -> FieldOpsResult<DispatchNote> {
        let row = sqlx::query(
            r#"
            INSERT INTO dispatch_notes (id, dispatch_id, author_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, dispatch_id, author_id, body, created_at
            "#,
        )
        .bind(note.id)
        .bind(note.dispatch_id)
        .bind(note.author_id)
        .bind(&note.body)
        .bind(note.created_at)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_note(&row)
    }

    #[instrument(skip(self), fields(dispatch_id = %dispatch_id))]
    async fn list_notes(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<DispatchNote>> {
        let rows = sqlx::query(
            "SELECT id, dispatch_id, author_id, body, created_at \
             FROM dispatch_notes WHERE dispatch_id = $1 ORDER BY created_at",
        )
        .bind(dispatch_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_note).collect()
    }

    #[instrument(skip(self, attachment), fields(dispatch_id = %attachment.dispatch_id))]
    async fn add_attachment(&self, attachment: &Attachment) -> FieldOpsResult<Attachment> {
        let row = sqlx::query(
            r#"
            INSERT INTO attachments (id, dispatch_id, file_name, content_type, size_bytes,
                                     storage_path, uploaded_by, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, dispatch_id, file_name, content_type, size_bytes, storage_path,
                      uploaded_by, uploaded_at
            "#,
        )
        .bind(attachment.id)
        .bind(attachment.dispatch_id)
        .bind(&attachment.file_name)
        .bind(&attachment.content_type)
        .bind(attachment.size_bytes)
        .bind(&attachment.storage_path)
        .bind(attachment.uploaded_by)
        .bind(attachment.uploaded_at)
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_attachment(&row)
    }

    #[instrument(skip(self), fields(attachment_id = %id))]
    async fn get_attachment(&self, id: Uuid) -> FieldOpsResult<Option<Attachment>> {
        let row = sqlx::query(
            "SELECT id, dispatch_id, file_name, content_type, size_bytes, storage_path, \
                    uploaded_by, uploaded_at \
             FROM attachments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_attachment).transpose()
    }

    #[instrument(skip(self), fields(dispatch_id = %dispatch_id))]
    async fn list_attachments(&self, dispatch_id: Uuid) -> FieldOpsResult<Vec<Attachment>> {
        let rows = sqlx::query(
            "SELECT id, dispatch_id, file_name, content_type, size_bytes, storage_path, \
                    uploaded_by, uploaded_at \
             FROM attachments WHERE dispatch_id = $1 ORDER BY uploaded_at",
        )
        .bind(dispatch_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_attachment).collect()
    }
}
