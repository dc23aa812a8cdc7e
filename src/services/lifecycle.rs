use chrono::Utc;
use std::fmt;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::approval::ApprovalRequest;
use crate::models::job::{Job, JobDetailsUpdate, JobStatus};
use crate::services::events::{LifecycleEvent, LifecycleEventSink};
use crate::services::job_store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Submit,
    /// An approval was recorded but others in the round are still pending.
    ApprovalRecorded,
    LastApprovalApproved,
    AnyApprovalRejected,
    Publish,
    Override(JobStatus),
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobEvent::Submit => f.write_str("submit for approval"),
            JobEvent::ApprovalRecorded | JobEvent::LastApprovalApproved => f.write_str("approve"),
            JobEvent::AnyApprovalRejected => f.write_str("reject"),
            JobEvent::Publish => f.write_str("publish"),
            JobEvent::Override(status) => write!(f, "set status {status} on"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {event} a job in status {from}")]
pub struct TransitionRejected {
    pub from: JobStatus,
    pub event: JobEvent,
}

pub fn transition(from: JobStatus, event: JobEvent) -> std::result::Result<JobStatus, TransitionRejected> {
    use JobStatus::*;

    match (from, event) {
        (Draft | PendingApproval, JobEvent::Submit) => Ok(PendingApproval),
        (PendingApproval, JobEvent::ApprovalRecorded) => Ok(PendingApproval),
        (PendingApproval, JobEvent::LastApprovalApproved) => Ok(Approved),
        (PendingApproval, JobEvent::AnyApprovalRejected) => Ok(Draft),
        (Approved | Open, JobEvent::Publish) => Ok(Open),
        (_, JobEvent::Override(target)) => Ok(target),
        (from, event) => Err(TransitionRejected { from, event }),
    }
}

/// Store-backed status operations that sit outside the approval and publish
/// flows: reads, content edits and the administrative status override.
#[derive(Clone)]
pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
    events: Arc<dyn LifecycleEventSink>,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn JobStore>, events: Arc<dyn LifecycleEventSink>) -> Self {
        Self { store, events }
    }

    pub async fn get(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Job> {
        Ok(self.store.get_job(tenant_id, job_id).await?)
    }

    pub async fn get_by_code(&self, tenant_id: Uuid, code: &str) -> Result<Job> {
        match self.store.find_job_by_code(code).await? {
            Some(job) if job.tenant_id == tenant_id => Ok(job),
            _ => Err(Error::NotFound(format!("Job with code {code} not found"))),
        }
    }

    /// Full approval history for the job across every submission round.
    pub async fn approvals(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<ApprovalRequest>> {
        self.store.get_job(tenant_id, job_id).await?;
        Ok(self.store.list_approvals(job_id).await?)
    }

    pub async fn update_details(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        update: JobDetailsUpdate,
    ) -> Result<Job> {
        if matches!(&update.title, Some(title) if title.trim().is_empty()) {
            return Err(Error::BadRequest("title must not be empty".to_string()));
        }

        let mut job = self.store.get_job(tenant_id, job_id).await?;
        update.apply_to(&mut job, Utc::now());
        Ok(self.store.save_job(&job).await?)
    }

    /// Administrative override. No guard beyond the job existing; `OPEN`
    /// stamps `published_at` only if it was never set.
    pub async fn set_status(&self, tenant_id: Uuid, job_id: Uuid, status: JobStatus) -> Result<Job> {
        let previous = OnceLock::new();
        let rule = |job: &Job, _pending: usize| {
            let _ = previous.set(job.status);
            transition(job.status, JobEvent::Override(status))
        };
        let job = self.store.transition_job(tenant_id, job_id, &rule).await?;

        self.events.record(&LifecycleEvent::StatusOverridden {
            tenant_id,
            job_id,
            from: previous.get().copied().unwrap_or(job.status),
            to: job.status,
        });

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::NewJob;
    use crate::services::events::MemoryEventSink;
    use crate::services::memory_store::InMemoryJobStore;

    #[test]
    fn submit_allowed_from_draft_and_pending_only() {
        assert_eq!(transition(JobStatus::Draft, JobEvent::Submit), Ok(JobStatus::PendingApproval));
        assert_eq!(
            transition(JobStatus::PendingApproval, JobEvent::Submit),
            Ok(JobStatus::PendingApproval)
        );
        for from in [JobStatus::Approved, JobStatus::Open, JobStatus::Closed, JobStatus::Cancelled] {
            assert_eq!(
                transition(from, JobEvent::Submit),
                Err(TransitionRejected { from, event: JobEvent::Submit })
            );
        }
    }

    #[test]
    fn approval_events_require_pending_approval() {
        assert_eq!(
            transition(JobStatus::PendingApproval, JobEvent::LastApprovalApproved),
            Ok(JobStatus::Approved)
        );
        assert_eq!(
            transition(JobStatus::PendingApproval, JobEvent::AnyApprovalRejected),
            Ok(JobStatus::Draft)
        );
        assert!(transition(JobStatus::Draft, JobEvent::LastApprovalApproved).is_err());
        assert!(transition(JobStatus::Approved, JobEvent::AnyApprovalRejected).is_err());
    }

    #[test]
    fn publish_requires_approved_or_open() {
        assert_eq!(transition(JobStatus::Approved, JobEvent::Publish), Ok(JobStatus::Open));
        assert_eq!(transition(JobStatus::Open, JobEvent::Publish), Ok(JobStatus::Open));
        assert!(transition(JobStatus::Draft, JobEvent::Publish).is_err());
        assert!(transition(JobStatus::PendingApproval, JobEvent::Publish).is_err());
    }

    #[test]
    fn override_reaches_any_status() {
        assert_eq!(
            transition(JobStatus::Cancelled, JobEvent::Override(JobStatus::Open)),
            Ok(JobStatus::Open)
        );
        assert_eq!(
            transition(JobStatus::PendingApproval, JobEvent::Override(JobStatus::Closed)),
            Ok(JobStatus::Closed)
        );
    }

    async fn seeded() -> (JobLifecycle, Arc<MemoryEventSink>, Job) {
        let store = Arc::new(InMemoryJobStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let job = NewJob {
            title: "Data Analyst".into(),
            ..NewJob::default()
        }
        .into_job(Uuid::new_v4(), "JOB-314159".into(), Utc::now());
        let job = store.insert_job(job).await.unwrap();
        (JobLifecycle::new(store, events.clone()), events, job)
    }

    #[tokio::test]
    async fn set_status_open_stamps_published_at_once() {
        let (lifecycle, events, job) = seeded().await;

        let opened = lifecycle.set_status(job.tenant_id, job.id, JobStatus::Open).await.unwrap();
        let first_published = opened.published_at;
        assert!(first_published.is_some());

        lifecycle.set_status(job.tenant_id, job.id, JobStatus::Closed).await.unwrap();
        let reopened = lifecycle.set_status(job.tenant_id, job.id, JobStatus::Open).await.unwrap();
        assert_eq!(reopened.published_at, first_published);

        let recorded = events.events();
        assert_eq!(recorded.len(), 3);
        assert_eq!(
            recorded[0],
            LifecycleEvent::StatusOverridden {
                tenant_id: job.tenant_id,
                job_id: job.id,
                from: JobStatus::Draft,
                to: JobStatus::Open,
            }
        );
    }

    #[tokio::test]
    async fn set_status_on_foreign_tenant_is_not_found() {
        let (lifecycle, _, job) = seeded().await;
        let err = lifecycle
            .set_status(Uuid::new_v4(), job.id, JobStatus::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn update_details_keeps_code_and_status() {
        let (lifecycle, _, job) = seeded().await;
        let updated = lifecycle
            .update_details(
                job.tenant_id,
                job.id,
                JobDetailsUpdate {
                    title: Some("Senior Data Analyst".into()),
                    location: Some("Berlin".into()),
                    ..JobDetailsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Senior Data Analyst");
        assert_eq!(updated.location.as_deref(), Some("Berlin"));
        assert_eq!(updated.code, job.code);
        assert_eq!(updated.status, JobStatus::Draft);

        let found = lifecycle.get_by_code(job.tenant_id, &job.code).await.unwrap();
        assert_eq!(found.title, "Senior Data Analyst");
    }
}
