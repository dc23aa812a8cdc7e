use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::models::approval::{ApprovalDecision, ApprovalRequest, ApprovalStatus};
use crate::models::job::{Job, JobStatus};
use crate::services::job_store::{DecisionRecorded, JobStore, StoreError, TransitionRule};

const JOB_COLUMNS: &str = "id, tenant_id, code, title, description, location, employment_type, \
     status, hiring_manager_id, recruiter_id, published_at, created_at, updated_at";

const APPROVAL_COLUMNS: &str = "id, job_id, approver_id, approval_order, status, \
     resubmission_comment, comment, rejection_reason, decided_at, created_at";

/// Postgres-backed store. Status-dependent writes lock the job row with
/// `SELECT ... FOR UPDATE`, which serializes submit/approve/reject/publish on
/// the same job.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_job(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        job_id: Uuid,
    ) -> Result<Job, StoreError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 AND tenant_id = $2 FOR UPDATE");
        let row = sqlx::query(&query)
            .bind(job_id)
            .bind(tenant_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StoreError::NotFound)?;
        job_from_row(&row)
    }

    async fn pending_count(
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
    ) -> Result<usize, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM job_approvals WHERE job_id = $1 AND status = 'PENDING'",
        )
        .bind(job_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn write_status(
        tx: &mut Transaction<'_, Postgres>,
        job: &Job,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE jobs SET status = $2, published_at = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.published_at)
        .bind(job.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[instrument(skip(self, job), fields(code = %job.code))]
    async fn insert_job(&self, job: Job) -> Result<Job, StoreError> {
        let query = format!(
            r#"
            INSERT INTO jobs (
                id, tenant_id, code, title, description, location, employment_type,
                status, hiring_manager_id, recruiter_id, published_at, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query(&query)
            .bind(job.id)
            .bind(job.tenant_id)
            .bind(&job.code)
            .bind(&job.title)
            .bind(&job.description)
            .bind(&job.location)
            .bind(&job.employment_type)
            .bind(job.status.as_str())
            .bind(job.hiring_manager_id)
            .bind(job.recruiter_id)
            .bind(job.published_at)
            .bind(job.created_at)
            .bind(job.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                let err = StoreError::from(err);
                if matches!(err, StoreError::Conflict) {
                    debug!("job code collision");
                }
                err
            })?;
        job_from_row(&row)
    }

    async fn get_job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Job, StoreError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query(&query)
            .bind(job_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        job_from_row(&row)
    }

    async fn find_job_by_code(&self, code: &str) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE code = $1");
        let row = sqlx::query(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn save_job(&self, job: &Job) -> Result<Job, StoreError> {
        let query = format!(
            r#"
            UPDATE jobs
            SET
                title = $3,
                description = $4,
                location = $5,
                employment_type = $6,
                hiring_manager_id = $7,
                recruiter_id = $8,
                updated_at = $9
            WHERE id = $1 AND tenant_id = $2
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query(&query)
            .bind(job.id)
            .bind(job.tenant_id)
            .bind(&job.title)
            .bind(&job.description)
            .bind(&job.location)
            .bind(&job.employment_type)
            .bind(job.hiring_manager_id)
            .bind(job.recruiter_id)
            .bind(job.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        job_from_row(&row)
    }

    async fn list_approvals(&self, job_id: Uuid) -> Result<Vec<ApprovalRequest>, StoreError> {
        let query = format!(
            "SELECT {APPROVAL_COLUMNS} FROM job_approvals WHERE job_id = $1 \
             ORDER BY created_at ASC, approval_order ASC"
        );
        let rows = sqlx::query(&query)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(approval_from_row).collect()
    }

    async fn list_pending_approvals(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let query = format!(
            "SELECT {APPROVAL_COLUMNS} FROM job_approvals WHERE job_id = $1 AND status = 'PENDING' \
             ORDER BY approval_order ASC"
        );
        let rows = sqlx::query(&query)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(approval_from_row).collect()
    }

    async fn find_pending_approval(
        &self,
        job_id: Uuid,
        approver_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let query = format!(
            "SELECT {APPROVAL_COLUMNS} FROM job_approvals \
             WHERE job_id = $1 AND approver_id = $2 AND status = 'PENDING' LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(job_id)
            .bind(approver_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(approval_from_row).transpose()
    }

    #[instrument(skip(self, approvals, rule), fields(approvers = approvals.len()))]
    async fn replace_pending_approvals(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approvals: Vec<ApprovalRequest>,
        rule: TransitionRule<'_>,
    ) -> Result<Job, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::lock_job(&mut tx, tenant_id, job_id).await?;
        let pending = Self::pending_count(&mut tx, job_id).await?;
        let next = rule(&job, pending)?;

        let deleted = sqlx::query("DELETE FROM job_approvals WHERE job_id = $1 AND status = 'PENDING'")
            .bind(job_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!(deleted, "cleared pending approvals");

        for approval in &approvals {
            sqlx::query(
                r#"
                INSERT INTO job_approvals
                    (id, job_id, approver_id, approval_order, status, resubmission_comment, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(approval.id)
            .bind(approval.job_id)
            .bind(approval.approver_id)
            .bind(approval.order)
            .bind(approval.status.as_str())
            .bind(&approval.resubmission_comment)
            .bind(approval.created_at)
            .execute(&mut *tx)
            .await?;
        }

        job.enter_status(next, Utc::now());
        Self::write_status(&mut tx, &job).await?;
        tx.commit().await?;
        Ok(job)
    }

    #[instrument(skip(self, decision, rule), fields(rejection = decision.is_rejection()))]
    async fn decide_approval(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        decision: &ApprovalDecision,
        rule: TransitionRule<'_>,
    ) -> Result<DecisionRecorded, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::lock_job(&mut tx, tenant_id, job_id).await?;

        let query = format!(
            "SELECT {APPROVAL_COLUMNS} FROM job_approvals \
             WHERE job_id = $1 AND approver_id = $2 AND status = 'PENDING' \
             AND NOT EXISTS (SELECT 1 FROM job_approvals r WHERE r.job_id = $1 \
                 AND r.status = 'REJECTED' AND r.decided_at >= job_approvals.created_at) \
             ORDER BY approval_order ASC LIMIT 1 FOR UPDATE"
        );
        let row = sqlx::query(&query)
            .bind(job_id)
            .bind(approver_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NoPendingApproval)?;
        let mut approval = approval_from_row(&row)?;

        let remaining_pending = Self::pending_count(&mut tx, job_id).await?.saturating_sub(1);
        let next = rule(&job, remaining_pending)?;

        let now = Utc::now();
        approval.decide(decision, now);
        sqlx::query(
            r#"
            UPDATE job_approvals
            SET status = $2, comment = $3, rejection_reason = $4, decided_at = $5
            WHERE id = $1
            "#,
        )
        .bind(approval.id)
        .bind(approval.status.as_str())
        .bind(&approval.comment)
        .bind(&approval.rejection_reason)
        .bind(approval.decided_at)
        .execute(&mut *tx)
        .await?;

        job.enter_status(next, now);
        Self::write_status(&mut tx, &job).await?;
        tx.commit().await?;

        Ok(DecisionRecorded {
            job,
            approval,
            remaining_pending,
        })
    }

    async fn transition_job(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        rule: TransitionRule<'_>,
    ) -> Result<Job, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::lock_job(&mut tx, tenant_id, job_id).await?;
        let pending = Self::pending_count(&mut tx, job_id).await?;
        let next = rule(&job, pending)?;
        job.enter_status(next, Utc::now());
        Self::write_status(&mut tx, &job).await?;
        tx.commit().await?;
        Ok(job)
    }
}

fn job_from_row(row: &PgRow) -> Result<Job, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<JobStatus>()
        .map_err(|err| StoreError::Corrupt(err.to_string()))?;

    Ok(Job {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        code: row.try_get("code")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        employment_type: row.try_get("employment_type")?,
        status,
        hiring_manager_id: row.try_get("hiring_manager_id")?,
        recruiter_id: row.try_get("recruiter_id")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn approval_from_row(row: &PgRow) -> Result<ApprovalRequest, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<ApprovalStatus>()
        .map_err(|err| StoreError::Corrupt(err.to_string()))?;

    Ok(ApprovalRequest {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        approver_id: row.try_get("approver_id")?,
        order: row.try_get("approval_order")?,
        status,
        resubmission_comment: row.try_get("resubmission_comment")?,
        comment: row.try_get("comment")?,
        rejection_reason: row.try_get("rejection_reason")?,
        decided_at: row.try_get("decided_at")?,
        created_at: row.try_get("created_at")?,
    })
}
