use async_trait::async_trait;
use fieldops_core::FieldOpsResult;
use fieldops_domain::entities::{Job, JobFilter};
use fieldops_domain::repositories::JobRepository;
use fieldops_domain::value_objects::AuditInfo;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> FieldOpsResult<Job> {
        Ok(Job {
            id: row.try_get("id")?,
            service_order_id: row.try_get("service_order_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            required_skills: row.try_get("required_skills")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            scheduled_date: row.try_get("scheduled_date")?,
            scheduled_start: row.try_get("scheduled_start")?,
            scheduled_end: row.try_get("scheduled_end")?,
            assigned_technicians: row.try_get("assigned_technicians")?,
            audit: AuditInfo {
                created_by: row.try_get("created_by")?,
                created_at: row.try_get("created_at")?,
                modified_by: row.try_get("modified_by")?,
                modified_at: row.try_get("modified_at")?,
            },
        })
    }
}

const JOB_COLUMNS: &str = "id, service_order_id, title, description, required_skills, priority, \
     status, scheduled_date, scheduled_start, scheduled_end, assigned_technicians, \
     created_by, created_at, modified_by, modified_at";

#[async_trait]
impl JobRepository for PostgresJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id, title = %job.title))]
    async fn create(&self, job: &Job) -> FieldOpsResult<Job> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (id, service_order_id, title, description, required_skills,
                              priority, status, scheduled_date, scheduled_start, scheduled_end,
                              assigned_technicians, created_by, created_at, modified_by, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.id)
        .bind(job.service_order_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.required_skills)
        .bind(job.priority)
        .bind(job.status)
        .bind(job.scheduled_date)
        .bind(job.scheduled_start)
        .bind(job.scheduled_end)
        .bind(&job.assigned_technicians)
        .bind(job.audit.created_by)
        .bind(job.audit.created_at)
        .bind(job.audit.modified_by)
        .bind(job.audit.modified_at)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_job(&row)?;
        debug!("创建工单成功: {} ({})", created.title, created.id);
        Ok(created)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> FieldOpsResult<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_job).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn update(&self, job: &Job) -> FieldOpsResult<Job> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET title = $2, description = $3, required_skills = $4, priority = $5,
                status = $6, scheduled_date = $7, scheduled_start = $8, scheduled_end = $9,
                assigned_technicians = $10, modified_by = $11, modified_at = $12
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.required_skills)
        .bind(job.priority)
        .bind(job.status)
        .bind(job.scheduled_date)
        .bind(job.scheduled_start)
        .bind(job.scheduled_end)
        .bind(&job.assigned_technicians)
        .bind(job.audit.modified_by)
        .bind(job.audit.modified_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(fieldops_core::FieldOpsError::JobNotFound { id: job.id })?;

        Self::row_to_job(&row)
    }

    #[instrument(skip(self, filter))]
    async fn list_unassigned(&self, filter: &JobFilter) -> FieldOpsResult<Vec<Job>> {
        let limit = filter.limit.unwrap_or(50);
        let offset = filter.offset.unwrap_or(0);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE status = 'UNSCHEDULED'
              AND ($1::uuid IS NULL OR service_order_id = $1)
              AND ($2::varchar IS NULL OR priority = $2)
              AND ($3::text IS NULL OR EXISTS (
                  SELECT 1 FROM unnest(required_skills) skill WHERE LOWER(skill) = LOWER($3)
              ))
            ORDER BY
              CASE priority
                WHEN 'URGENT' THEN 0 WHEN 'HIGH' THEN 1 WHEN 'NORMAL' THEN 2 ELSE 3
              END,
              created_at
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.service_order_id)
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(&filter.skill)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }

    #[instrument(skip(self, filter))]
    async fn count_unassigned(&self, filter: &JobFilter) -> FieldOpsResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE status = 'UNSCHEDULED'
              AND ($1::uuid IS NULL OR service_order_id = $1)
              AND ($2::varchar IS NULL OR priority = $2)
              AND ($3::text IS NULL OR EXISTS (
                  SELECT 1 FROM unnest(required_skills) skill WHERE LOWER(skill) = LOWER($3)
              ))
            "#,
        )
        .bind(filter.service_order_id)
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(&filter.skill)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
