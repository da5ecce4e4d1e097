use async_trait::async_trait;
use chrono::NaiveDate;
use fieldops_core::FieldOpsResult;
use fieldops_domain::entities::{Technician, TechnicianLeave, TechnicianWorkingHours};
use fieldops_domain::repositories::TechnicianRepository;
use fieldops_domain::value_objects::AuditInfo;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

pub struct PostgresTechnicianRepository {
    pool: PgPool,
}

impl PostgresTechnicianRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_technician(row: &sqlx::postgres::PgRow) -> FieldOpsResult<Technician> {
        Ok(Technician {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            skills: row.try_get("skills")?,
            status: row.try_get("status")?,
            audit: AuditInfo {
                created_by: row.try_get("created_by")?,
                created_at: row.try_get("created_at")?,
                modified_by: row.try_get("modified_by")?,
                modified_at: row.try_get("modified_at")?,
            },
        })
    }

    fn row_to_working_hours(row: &sqlx::postgres::PgRow) -> FieldOpsResult<TechnicianWorkingHours> {
        Ok(TechnicianWorkingHours {
            id: row.try_get("id")?,
            technician_id: row.try_get("technician_id")?,
            weekday: row.try_get("weekday")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            effective_from: row.try_get("effective_from")?,
            effective_to: row.try_get("effective_to")?,
        })
    }

    fn row_to_leave(row: &sqlx::postgres::PgRow) -> FieldOpsResult<TechnicianLeave> {
        Ok(TechnicianLeave {
            id: row.try_get("id")?,
            technician_id: row.try_get("technician_id")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            status: row.try_get("status")?,
            reason: row.try_get("reason")?,
            audit: AuditInfo {
                created_by: row.try_get("created_by")?,
                created_at: row.try_get("created_at")?,
                modified_by: row.try_get("modified_by")?,
                modified_at: row.try_get("modified_at")?,
            },
        })
    }
}

#[async_trait]
impl TechnicianRepository for PostgresTechnicianRepository {
    #[instrument(skip(self), fields(technician_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Technician>> {
        let row = sqlx::query(
            "SELECT id, name, email, skills, status, created_by, created_at, modified_by, modified_at \
             FROM technicians WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_technician).transpose()
    }

    #[instrument(skip(self))]
    async fn list_active(&self) -> FieldOpsResult<Vec<Technician>> {
        let rows = sqlx::query(
            "SELECT id, name, email, skills, status, created_by, created_at, modified_by, modified_at \
             FROM technicians WHERE status = 'ACTIVE' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_technician).collect()
    }

    #[instrument(skip(self), fields(technician_id = %technician_id))]
    async fn get_working_hours(
        &self,
        technician_id: Uuid,
    ) -> FieldOpsResult<Vec<TechnicianWorkingHours>> {
        let rows = sqlx::query(
            "SELECT id, technician_id, weekday, start_time, end_time, effective_from, effective_to \
             FROM technician_working_hours WHERE technician_id = $1 ORDER BY weekday",
        )
        .bind(technician_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_working_hours).collect()
    }

    #[instrument(skip(self), fields(technician_id = %technician_id))]
    async fn get_leaves_between(
        &self,
        technician_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> FieldOpsResult<Vec<TechnicianLeave>> {
        let rows = sqlx::query(
            "SELECT id, technician_id, start_date, end_date, start_time, end_time, status, reason, \
                    created_by, created_at, modified_by, modified_at \
             FROM technician_leaves \
             WHERE technician_id = $1 AND start_date <= $3 AND end_date >= $2 \
             ORDER BY start_date",
        )
        .bind(technician_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_leave).collect()
    }
}
