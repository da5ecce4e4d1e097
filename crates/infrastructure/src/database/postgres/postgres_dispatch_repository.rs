use async_trait::async_trait;
use chrono::NaiveDate;
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::entities::{Dispatch, DispatchFilter};
use fieldops_domain::repositories::DispatchRepository;
use fieldops_domain::value_objects::{ActorContext, AuditInfo};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub struct PostgresDispatchRepository {
    pool: PgPool,
}

const DISPATCH_COLUMNS: &str = "id, dispatch_number, job_id, status, priority, scheduled_date, \
     scheduled_start, scheduled_end, actual_start, actual_end, completion_percentage, \
     technician_ids, notes, deleted, created_by, created_at, modified_by, modified_at";

impl PostgresDispatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_dispatch(row: &sqlx::postgres::PgRow) -> FieldOpsResult<Dispatch> {
        Ok(Dispatch {
            id: row.try_get("id")?,
            dispatch_number: row.try_get("dispatch_number")?,
            job_id: row.try_get("job_id")?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            scheduled_date: row.try_get("scheduled_date")?,
            scheduled_start: row.try_get("scheduled_start")?,
            scheduled_end: row.try_get("scheduled_end")?,
            actual_start: row.try_get("actual_start")?,
            actual_end: row.try_get("actual_end")?,
            completion_percentage: row.try_get("completion_percentage")?,
            technician_ids: row.try_get("technician_ids")?,
            notes: row.try_get("notes")?,
            deleted: row.try_get("deleted")?,
            audit: AuditInfo {
                created_by: row.try_get("created_by")?,
                created_at: row.try_get("created_at")?,
                modified_by: row.try_get("modified_by")?,
                modified_at: row.try_get("modified_at")?,
            },
        })
    }

    /// 同一事务内对 (技术员, 日期) 取咨询锁并重检时间窗重叠。
    /// 预检校验器只是建议性的，两个并发分配都可能通过预检，
    /// 竞争最终在这里串行化，落败方得到 Conflict。
    async fn guard_overlap(
        tx: &mut Transaction<'_, Postgres>,
        dispatch: &Dispatch,
    ) -> FieldOpsResult<()> {
        for technician_id in &dispatch.technician_ids {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(format!("{}:{}", technician_id, dispatch.scheduled_date))
                .execute(&mut **tx)
                .await?;
        }

        let conflicting: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM dispatches
            WHERE deleted = FALSE
              AND status <> 'CANCELLED'
              AND scheduled_date = $1
              AND technician_ids && $2
              AND scheduled_start < $3
              AND $4 < scheduled_end
              AND id <> $5
            LIMIT 1
            "#,
        )
        .bind(dispatch.scheduled_date)
        .bind(&dispatch.technician_ids)
        .bind(dispatch.scheduled_end)
        .bind(dispatch.scheduled_start)
        .bind(dispatch.id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(existing) = conflicting {
            metrics::counter!("fieldops_dispatch_overlap_rejections_total").increment(1);
            warn!(
                "派工单 {} 提交时检测到时间窗重叠，与 {} 冲突",
                dispatch.id, existing
            );
            return Err(FieldOpsError::conflict(format!(
                "技术员在 {} {}-{} 已有派工单 {}",
                dispatch.scheduled_date, dispatch.scheduled_start, dispatch.scheduled_end, existing
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DispatchRepository for PostgresDispatchRepository {
    #[instrument(skip(self, dispatch), fields(dispatch_id = %dispatch.id, number = %dispatch.dispatch_number))]
    async fn create(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch> {
        let mut tx = self.pool.begin().await?;
        Self::guard_overlap(&mut tx, dispatch).await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO dispatches (id, dispatch_number, job_id, status, priority,
                                    scheduled_date, scheduled_start, scheduled_end,
                                    actual_start, actual_end, completion_percentage,
                                    technician_ids, notes, deleted,
                                    created_by, created_at, modified_by, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {DISPATCH_COLUMNS}
            "#
        ))
        .bind(dispatch.id)
        .bind(&dispatch.dispatch_number)
        .bind(dispatch.job_id)
        .bind(dispatch.status)
        .bind(dispatch.priority)
        .bind(dispatch.scheduled_date)
        .bind(dispatch.scheduled_start)
        .bind(dispatch.scheduled_end)
        .bind(dispatch.actual_start)
        .bind(dispatch.actual_end)
        .bind(dispatch.completion_percentage)
        .bind(&dispatch.technician_ids)
        .bind(&dispatch.notes)
        .bind(dispatch.deleted)
        .bind(dispatch.audit.created_by)
        .bind(dispatch.audit.created_at)
        .bind(dispatch.audit.modified_by)
        .bind(dispatch.audit.modified_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        let created = Self::row_to_dispatch(&row)?;
        debug!("创建派工单成功: {}", created.dispatch_number);
        Ok(created)
    }

    #[instrument(skip(self), fields(dispatch_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Dispatch>> {
        let row = sqlx::query(&format!(
            "SELECT {DISPATCH_COLUMNS} FROM dispatches WHERE id = $1 AND deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_dispatch).transpose()
    }

    #[instrument(skip(self, dispatch), fields(dispatch_id = %dispatch.id))]
    async fn update(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE dispatches
            SET status = $2, priority = $3, actual_start = $4, actual_end = $5,
                completion_percentage = $6, notes = $7,
                modified_by = $8, modified_at = $9
            WHERE id = $1 AND deleted = FALSE
            RETURNING {DISPATCH_COLUMNS}
            "#
        ))
        .bind(dispatch.id)
        .bind(dispatch.status)
        .bind(dispatch.priority)
        .bind(dispatch.actual_start)
        .bind(dispatch.actual_end)
        .bind(dispatch.completion_percentage)
        .bind(&dispatch.notes)
        .bind(dispatch.audit.modified_by)
        .bind(dispatch.audit.modified_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(FieldOpsError::DispatchNotFound { id: dispatch.id })?;

        Self::row_to_dispatch(&row)
    }

    #[instrument(skip(self, dispatch), fields(dispatch_id = %dispatch.id))]
    async fn update_schedule(&self, dispatch: &Dispatch) -> FieldOpsResult<Dispatch> {
        let mut tx = self.pool.begin().await?;
        Self::guard_overlap(&mut tx, dispatch).await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE dispatches
            SET scheduled_date = $2, scheduled_start = $3, scheduled_end = $4,
                technician_ids = $5, modified_by = $6, modified_at = $7
            WHERE id = $1 AND deleted = FALSE
            RETURNING {DISPATCH_COLUMNS}
            "#
        ))
        .bind(dispatch.id)
        .bind(dispatch.scheduled_date)
        .bind(dispatch.scheduled_start)
        .bind(dispatch.scheduled_end)
        .bind(&dispatch.technician_ids)
        .bind(dispatch.audit.modified_by)
        .bind(dispatch.audit.modified_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(FieldOpsError::DispatchNotFound { id: dispatch.id })?;

        tx.commit().await?;
        Self::row_to_dispatch(&row)
    }

    #[instrument(skip(self, actor), fields(dispatch_id = %id))]
    async fn soft_delete(&self, id: Uuid, actor: &ActorContext) -> FieldOpsResult<bool> {
        let result = sqlx::query(
            "UPDATE dispatches SET deleted = TRUE, modified_by = $2, modified_at = NOW() \
             WHERE id = $1 AND deleted = FALSE",
        )
        .bind(id)
        .bind(actor.actor_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter))]
    async fn list(&self, filter: &DispatchFilter) -> FieldOpsResult<Vec<Dispatch>> {
        let limit = filter.limit.unwrap_or(50);
        let offset = filter.offset.unwrap_or(0);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DISPATCH_COLUMNS} FROM dispatches
            WHERE deleted = FALSE
              AND ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR $2 = ANY(technician_ids))
              AND ($3::varchar IS NULL OR priority = $3)
              AND ($4::date IS NULL OR scheduled_date >= $4)
              AND ($5::date IS NULL OR scheduled_date <= $5)
            ORDER BY scheduled_date, scheduled_start
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.technician_id)
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(filter.from_date)
        .bind(filter.to_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_dispatch).collect()
    }

    #[instrument(skip(self, filter))]
    async fn count(&self, filter: &DispatchFilter) -> FieldOpsResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM dispatches
            WHERE deleted = FALSE
              AND ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR $2 = ANY(technician_ids))
              AND ($3::varchar IS NULL OR priority = $3)
              AND ($4::date IS NULL OR scheduled_date >= $4)
              AND ($5::date IS NULL OR scheduled_date <= $5)
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.technician_id)
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(filter.from_date)
        .bind(filter.to_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(technician_id = %technician_id, date = %date))]
    async fn find_by_technician_and_date(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
    ) -> FieldOpsResult<Vec<Dispatch>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DISPATCH_COLUMNS} FROM dispatches
            WHERE deleted = FALSE
              AND status <> 'CANCELLED'
              AND scheduled_date = $1
              AND $2 = ANY(technician_ids)
            ORDER BY scheduled_start
            "#
        ))
        .bind(date)
        .bind(technician_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_dispatch).collect()
    }
}
