use async_trait::async_trait;
use sqlx::error::{DatabaseError, ErrorKind};
use uuid::Uuid;

use crate::models::approval::{ApprovalDecision, ApprovalRequest};
use crate::models::job::{Job, JobStatus};
use crate::services::lifecycle::TransitionRejected;

/// Computes the next status from the locked job and its pending approval
/// count. For decisions the count excludes the record being decided.
pub type TransitionRule<'a> =
    &'a (dyn Fn(&Job, usize) -> Result<JobStatus, TransitionRejected> + Send + Sync);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("job code already in use")]
    Conflict,

    #[error("no pending approval for this approver")]
    NoPendingApproval,

    #[error(transparent)]
    Transition(#[from] TransitionRejected),

    #[error("storage error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::Conflict,
            _ => Self::Database(error),
        }
    }
}

/// Result of atomically deciding one approval record.
#[derive(Debug, Clone)]
pub struct DecisionRecorded {
    pub job: Job,
    pub approval: ApprovalRequest,
    pub remaining_pending: usize,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job. Fails with [`StoreError::Conflict`] when the code is
    /// already taken by any tenant.
    async fn insert_job(&self, job: Job) -> Result<Job, StoreError>;

    async fn get_job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Job, StoreError>;

    async fn find_job_by_code(&self, code: &str) -> Result<Option<Job>, StoreError>;

    /// Persists editable content. Never touches `code`, `tenant_id` or `status`.
    async fn save_job(&self, job: &Job) -> Result<Job, StoreError>;

    /// Every approval record for the job, all rounds, ordered by creation then order.
    async fn list_approvals(&self, job_id: Uuid) -> Result<Vec<ApprovalRequest>, StoreError>;

    async fn list_pending_approvals(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;

    async fn find_pending_approval(
        &self,
        job_id: Uuid,
        approver_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Deletes every pending record for the job, inserts `approvals` and moves
    /// the job to the status produced by `rule`, all in one atomic unit.
    async fn replace_pending_approvals(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approvals: Vec<ApprovalRequest>,
        rule: TransitionRule<'_>,
    ) -> Result<Job, StoreError>;

    /// Marks the approver's pending record decided, re-counts the remaining
    /// pending records and applies `rule`, all in one atomic unit. Nothing is
    /// written when the rule rejects.
    ///
    /// A pending record older than a rejection on the same job belongs to a
    /// dead round and is reported as `NoPendingApproval`.
    async fn decide_approval(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        decision: &ApprovalDecision,
        rule: TransitionRule<'_>,
    ) -> Result<DecisionRecorded, StoreError>;

    /// Applies `rule` to the locked job and persists the resulting status.
    async fn transition_job(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        rule: TransitionRule<'_>,
    ) -> Result<Job, StoreError>;
}
