use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::approval::{ApprovalDecision, ApprovalRequest, ApprovalStatus};
use crate::models::job::Job;
use crate::services::job_store::{DecisionRecorded, JobStore, StoreError, TransitionRule};

/// Process-local store. A single mutex guards jobs and approvals together, so
/// every trait method is one atomic unit.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    jobs: HashMap<Uuid, Job>,
    approvals: Vec<ApprovalRequest>,
}

impl MemoryState {
    fn job_mut(&mut self, tenant_id: Uuid, job_id: Uuid) -> Result<&mut Job, StoreError> {
        self.jobs
            .get_mut(&job_id)
            .filter(|job| job.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)
    }

    fn pending_count(&self, job_id: Uuid) -> usize {
        self.approvals
            .iter()
            .filter(|approval| approval.job_id == job_id && approval.is_pending())
            .count()
    }

    fn approvals_for(&self, job_id: Uuid) -> impl Iterator<Item = &ApprovalRequest> {
        self.approvals
            .iter()
            .filter(move |approval| approval.job_id == job_id)
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_job(&self, job: Job) -> Result<Job, StoreError> {
        let mut state = self.state.lock().await;
        if state
            .jobs
            .values()
            .any(|existing| existing.code == job.code || existing.id == job.id)
        {
            return Err(StoreError::Conflict);
        }
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Job, StoreError> {
        let mut state = self.state.lock().await;
        state.job_mut(tenant_id, job_id).map(|job| job.clone())
    }

    async fn find_job_by_code(&self, code: &str) -> Result<Option<Job>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.jobs.values().find(|job| job.code == code).cloned())
    }

    async fn save_job(&self, job: &Job) -> Result<Job, StoreError> {
        let mut state = self.state.lock().await;
        let stored = state.job_mut(job.tenant_id, job.id)?;
        stored.title = job.title.clone();
        stored.description = job.description.clone();
        stored.location = job.location.clone();
        stored.employment_type = job.employment_type.clone();
        stored.hiring_manager_id = job.hiring_manager_id;
        stored.recruiter_id = job.recruiter_id;
        stored.updated_at = job.updated_at;
        Ok(stored.clone())
    }

    async fn list_approvals(&self, job_id: Uuid) -> Result<Vec<ApprovalRequest>, StoreError> {
        let state = self.state.lock().await;
        let mut approvals: Vec<ApprovalRequest> = state.approvals_for(job_id).cloned().collect();
        approvals.sort_by_key(|approval| (approval.created_at, approval.order));
        Ok(approvals)
    }

    async fn list_pending_approvals(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let state = self.state.lock().await;
        let mut pending: Vec<ApprovalRequest> = state
            .approvals_for(job_id)
            .filter(|approval| approval.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|approval| approval.order);
        Ok(pending)
    }

    async fn find_pending_approval(
        &self,
        job_id: Uuid,
        approver_id: Uuid,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let state = self.state.lock().await;
        let found = state
            .approvals_for(job_id)
            .find(|approval| approval.approver_id == approver_id && approval.is_pending())
            .cloned();
        Ok(found)
    }

    async fn replace_pending_approvals(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approvals: Vec<ApprovalRequest>,
        rule: TransitionRule<'_>,
    ) -> Result<Job, StoreError> {
        let mut state = self.state.lock().await;
        let pending = state.pending_count(job_id);
        let next = {
            let job = state.job_mut(tenant_id, job_id)?;
            rule(job, pending)?
        };

        state
            .approvals
            .retain(|approval| !(approval.job_id == job_id && approval.is_pending()));
        state.approvals.extend(approvals);

        let job = state.job_mut(tenant_id, job_id)?;
        job.enter_status(next, Utc::now());
        Ok(job.clone())
    }

    async fn decide_approval(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        decision: &ApprovalDecision,
        rule: TransitionRule<'_>,
    ) -> Result<DecisionRecorded, StoreError> {
        let mut state = self.state.lock().await;
        state.job_mut(tenant_id, job_id)?;

        let position = state
            .approvals
            .iter()
            .position(|approval| {
                approval.job_id == job_id
                    && approval.approver_id == approver_id
                    && approval.is_pending()
            })
            .ok_or(StoreError::NoPendingApproval)?;
        let created_at = state.approvals[position].created_at;
        if state.approvals_for(job_id).any(|approval| {
            approval.status == ApprovalStatus::Rejected
                && approval.decided_at.is_some_and(|decided| decided >= created_at)
        }) {
            return Err(StoreError::NoPendingApproval);
        }
        let remaining_pending = state.pending_count(job_id).saturating_sub(1);

        let next = {
            let job = state.job_mut(tenant_id, job_id)?;
            rule(job, remaining_pending)?
        };

        let now = Utc::now();
        let approval = match state.approvals.get_mut(position) {
            Some(approval) => {
                approval.decide(decision, now);
                approval.clone()
            }
            None => return Err(StoreError::NoPendingApproval),
        };

        let job = state.job_mut(tenant_id, job_id)?;
        job.enter_status(next, now);

        Ok(DecisionRecorded {
            job: job.clone(),
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
        let mut state = self.state.lock().await;
        let pending = state.pending_count(job_id);
        let job = state.job_mut(tenant_id, job_id)?;
        let next = rule(job, pending)?;
        job.enter_status(next, Utc::now());
        Ok(job.clone())
    }
}
