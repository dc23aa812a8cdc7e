use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::approval::{ApprovalDecision, ApprovalRequest};
use crate::models::job::Job;
use crate::services::events::{LifecycleEvent, LifecycleEventSink};
use crate::services::job_store::{DecisionRecorded, JobStore, StoreError, TransitionRule};
use crate::services::lifecycle::{transition, JobEvent};

#[derive(Debug, Clone, Serialize)]
pub struct JobWithApprovals {
    #[serde(flatten)]
    pub job: Job,
    pub approvals: Vec<ApprovalRequest>,
}

/// Multi-approver sign-off for a job.
///
/// Any pending approver may decide at any time; `order` is informational.
/// The round is satisfied the moment the last pending record is approved and
/// dies on the first rejection.
#[derive(Clone)]
pub struct ApprovalChain {
    store: Arc<dyn JobStore>,
    events: Arc<dyn LifecycleEventSink>,
}

impl ApprovalChain {
    pub fn new(store: Arc<dyn JobStore>, events: Arc<dyn LifecycleEventSink>) -> Self {
        Self { store, events }
    }

    /// Starts a fresh approval round. Pending records of the previous round
    /// are replaced; decided ones are kept. `comment` is stamped on every new
    /// record so approvers see what changed since the last round.
    pub async fn submit(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        requested_approvers: Vec<Uuid>,
        requested_by: Uuid,
        comment: Option<String>,
    ) -> Result<JobWithApprovals> {
        let job = self.store.get_job(tenant_id, job_id).await?;
        transition(job.status, JobEvent::Submit).map_err(StoreError::from)?;

        let approvers = resolve_approvers(&job, requested_approvers)?;
        let comment = comment
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty());
        let now = Utc::now();
        let records = approvers
            .iter()
            .zip(1..)
            .map(|(approver_id, order)| {
                ApprovalRequest::pending(job_id, *approver_id, order, now)
                    .with_resubmission_comment(comment.clone())
            })
            .collect();

        let submit = |job: &Job, _pending: usize| transition(job.status, JobEvent::Submit);
        let job = self
            .store
            .replace_pending_approvals(tenant_id, job_id, records, &submit)
            .await?;

        self.events.record(&LifecycleEvent::SubmittedForApproval {
            tenant_id,
            job_id,
            requested_by,
            approvers,
        });

        let approvals = self.store.list_pending_approvals(job_id).await?;
        Ok(JobWithApprovals { job, approvals })
    }

    pub async fn approve(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        comment: Option<String>,
    ) -> Result<Job> {
        let rule = |job: &Job, remaining: usize| {
            let event = if remaining == 0 {
                JobEvent::LastApprovalApproved
            } else {
                JobEvent::ApprovalRecorded
            };
            transition(job.status, event)
        };
        let recorded = self
            .decide(
                tenant_id,
                job_id,
                approver_id,
                ApprovalDecision::Approve { comment },
                &rule,
            )
            .await?;

        self.events.record(&LifecycleEvent::Approved {
            tenant_id,
            job_id,
            approver_id,
            remaining_pending: recorded.remaining_pending,
            status: recorded.job.status,
        });

        Ok(recorded.job)
    }

    /// A single rejection sends the job back to `DRAFT`. Other approvers'
    /// pending records stay until the next submission clears them.
    pub async fn reject(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        reason: String,
        comment: Option<String>,
    ) -> Result<Job> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(Error::BadRequest("rejection reason is required".to_string()));
        }

        let rule = |job: &Job, _remaining: usize| transition(job.status, JobEvent::AnyApprovalRejected);
        let recorded = self
            .decide(
                tenant_id,
                job_id,
                approver_id,
                ApprovalDecision::Reject {
                    comment,
                    reason: reason.clone(),
                },
                &rule,
            )
            .await?;

        self.events.record(&LifecycleEvent::Rejected {
            tenant_id,
            job_id,
            approver_id,
            reason,
        });

        Ok(recorded.job)
    }

    /// Pending records of the current round, in chain order.
    pub async fn pending(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<ApprovalRequest>> {
        self.store.get_job(tenant_id, job_id).await?;
        Ok(self.store.list_pending_approvals(job_id).await?)
    }

    async fn decide(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        decision: ApprovalDecision,
        rule: TransitionRule<'_>,
    ) -> Result<DecisionRecorded> {
        self.store.get_job(tenant_id, job_id).await?;
        if self
            .store
            .find_pending_approval(job_id, approver_id)
            .await?
            .is_none()
        {
            return Err(Error::NoPendingApprovalForUser);
        }

        // A pending record left over from a rejected round is refused by the
        // store even if an override put the job back into PENDING_APPROVAL.
        match self
            .store
            .decide_approval(tenant_id, job_id, approver_id, &decision, rule)
            .await
        {
            Ok(recorded) => Ok(recorded),
            Err(StoreError::NoPendingApproval | StoreError::Transition(_)) => {
                Err(Error::NoPendingApprovalForUser)
            }
            Err(other) => Err(other.into()),
        }
    }
}

/// Explicit approvers first, then the hiring manager, then the recruiter.
/// Duplicates collapse to their first position.
fn resolve_approvers(job: &Job, requested: Vec<Uuid>) -> Result<Vec<Uuid>> {
    let candidates = if requested.is_empty() {
        job.fallback_approver().into_iter().collect()
    } else {
        requested
    };

    let mut approvers: Vec<Uuid> = Vec::with_capacity(candidates.len());
    for approver in candidates {
        if !approvers.contains(&approver) {
            approvers.push(approver);
        }
    }

    if approvers.is_empty() {
        return Err(Error::NoApproversAvailable);
    }
    Ok(approvers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::ApprovalStatus;
    use crate::models::job::{JobStatus, NewJob};
    use crate::services::events::MemoryEventSink;
    use crate::services::lifecycle::JobLifecycle;
    use crate::services::memory_store::InMemoryJobStore;

    struct Harness {
        chain: ApprovalChain,
        store: Arc<InMemoryJobStore>,
        events: Arc<MemoryEventSink>,
        job: Job,
    }

    async fn harness(hiring_manager_id: Option<Uuid>, recruiter_id: Option<Uuid>) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let job = NewJob {
            title: "Platform Engineer".into(),
            hiring_manager_id,
            recruiter_id,
            ..NewJob::default()
        }
        .into_job(Uuid::new_v4(), "JOB-424242".into(), Utc::now());
        let job = store.insert_job(job).await.unwrap();
        Harness {
            chain: ApprovalChain::new(store.clone(), events.clone()),
            store,
            events,
            job,
        }
    }

    fn permutations() -> Vec<[usize; 3]> {
        vec![[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]]
    }

    #[tokio::test]
    async fn last_approval_promotes_in_any_order() {
        for order in permutations() {
            let h = harness(None, None).await;
            let approvers = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
            let submitted = h
                .chain
                .submit(h.job.tenant_id, h.job.id, approvers.to_vec(), Uuid::new_v4(), None)
                .await
                .unwrap();
            assert_eq!(submitted.job.status, JobStatus::PendingApproval);
            assert_eq!(submitted.approvals.len(), 3);

            for (step, index) in order.iter().enumerate() {
                let job = h
                    .chain
                    .approve(h.job.tenant_id, h.job.id, approvers[*index], None)
                    .await
                    .unwrap();
                let expected = if step == 2 {
                    JobStatus::Approved
                } else {
                    JobStatus::PendingApproval
                };
                assert_eq!(job.status, expected, "order {order:?} step {step}");
            }
        }
    }

    #[tokio::test]
    async fn single_rejection_kills_the_round() {
        let h = harness(None, None).await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        h.chain
            .submit(h.job.tenant_id, h.job.id, vec![a, b], Uuid::new_v4(), None)
            .await
            .unwrap();

        let job = h
            .chain
            .reject(h.job.tenant_id, h.job.id, a, "budget frozen".into(), None)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Draft);

        let err = h
            .chain
            .approve(h.job.tenant_id, h.job.id, b, Some("late".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingApprovalForUser));

        let stale = h.store.find_pending_approval(h.job.id, b).await.unwrap().unwrap();
        assert_eq!(stale.status, ApprovalStatus::Pending);
        assert!(stale.decided_at.is_none());
        assert_eq!(
            h.store.get_job(h.job.tenant_id, h.job.id).await.unwrap().status,
            JobStatus::Draft
        );

        // The next submission clears B's stale record.
        let c = Uuid::new_v4();
        let resubmitted = h
            .chain
            .submit(h.job.tenant_id, h.job.id, vec![c], Uuid::new_v4(), None)
            .await
            .unwrap();
        assert_eq!(resubmitted.approvals.len(), 1);
        assert!(h.store.find_pending_approval(h.job.id, b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resubmission_replaces_pending_and_keeps_history() {
        let h = harness(None, None).await;
        let first = [Uuid::new_v4(), Uuid::new_v4()];
        let second = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

        h.chain
            .submit(h.job.tenant_id, h.job.id, first.to_vec(), Uuid::new_v4(), None)
            .await
            .unwrap();
        h.chain
            .approve(h.job.tenant_id, h.job.id, first[0], Some("ok".into()))
            .await
            .unwrap();
        let result = h
            .chain
            .submit(h.job.tenant_id, h.job.id, second.to_vec(), Uuid::new_v4(), None)
            .await
            .unwrap();

        let pending: Vec<Uuid> = result.approvals.iter().map(|a| a.approver_id).collect();
        assert_eq!(pending, second.to_vec());
        assert_eq!(
            result.approvals.iter().map(|a| a.order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let history = h.store.list_approvals(h.job.id).await.unwrap();
        assert_eq!(history.len(), 4);
        assert!(history
            .iter()
            .any(|a| a.approver_id == first[0] && a.status == ApprovalStatus::Approved));
        assert!(!history.iter().any(|a| a.approver_id == first[1]));
    }

    #[tokio::test]
    async fn override_does_not_revive_a_rejected_round() {
        let h = harness(None, None).await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let lifecycle = JobLifecycle::new(h.store.clone(), h.events.clone());

        h.chain
            .submit(h.job.tenant_id, h.job.id, vec![a, b], Uuid::new_v4(), None)
            .await
            .unwrap();
        h.chain
            .reject(h.job.tenant_id, h.job.id, a, "Budget frozen".into(), None)
            .await
            .unwrap();
        lifecycle
            .set_status(h.job.tenant_id, h.job.id, JobStatus::PendingApproval)
            .await
            .unwrap();

        let err = h
            .chain
            .approve(h.job.tenant_id, h.job.id, b, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingApprovalForUser));
        let job = h.store.get_job(h.job.tenant_id, h.job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::PendingApproval);

        h.chain
            .submit(h.job.tenant_id, h.job.id, vec![b], Uuid::new_v4(), None)
            .await
            .unwrap();
        let job = h
            .chain
            .approve(h.job.tenant_id, h.job.id, b, None)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Approved);
    }

    #[tokio::test]
    async fn resubmission_comment_is_stamped_on_the_new_round() {
        let h = harness(None, None).await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        h.chain
            .submit(h.job.tenant_id, h.job.id, vec![a], Uuid::new_v4(), Some("   ".into()))
            .await
            .unwrap();
        h.chain
            .reject(h.job.tenant_id, h.job.id, a, "Wrong location".into(), None)
            .await
            .unwrap();
        let result = h
            .chain
            .submit(
                h.job.tenant_id,
                h.job.id,
                vec![a, b],
                Uuid::new_v4(),
                Some(" Location fixed to Remote ".into()),
            )
            .await
            .unwrap();

        assert!(result
            .approvals
            .iter()
            .all(|approval| approval.resubmission_comment.as_deref() == Some("Location fixed to Remote")));

        let history = h.store.list_approvals(h.job.id).await.unwrap();
        let rejected = history
            .iter()
            .find(|approval| approval.status == ApprovalStatus::Rejected)
            .unwrap();
        assert_eq!(rejected.resubmission_comment, None);
    }

    #[tokio::test]
    async fn duplicate_approvers_collapse() {
        let h = harness(None, None).await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let result = h
            .chain
            .submit(h.job.tenant_id, h.job.id, vec![a, b, a], Uuid::new_v4(), None)
            .await
            .unwrap();
        let approvers: Vec<(Uuid, i32)> = result
            .approvals
            .iter()
            .map(|r| (r.approver_id, r.order))
            .collect();
        assert_eq!(approvers, vec![(a, 1), (b, 2)]);
    }

    #[tokio::test]
    async fn fallback_chain_and_missing_approvers() {
        let recruiter = Uuid::new_v4();
        let h = harness(None, Some(recruiter)).await;
        let result = h
            .chain
            .submit(h.job.tenant_id, h.job.id, vec![], Uuid::new_v4(), None)
            .await
            .unwrap();
        assert_eq!(result.approvals[0].approver_id, recruiter);

        let h = harness(None, None).await;
        let err = h
            .chain
            .submit(h.job.tenant_id, h.job.id, vec![], Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoApproversAvailable));
        assert!(h.store.list_approvals(h.job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_refused_outside_draft_or_pending() {
        let h = harness(Some(Uuid::new_v4()), None).await;
        let approver = h.job.hiring_manager_id.unwrap();
        h.chain
            .submit(h.job.tenant_id, h.job.id, vec![], Uuid::new_v4(), None)
            .await
            .unwrap();
        h.chain
            .approve(h.job.tenant_id, h.job.id, approver, None)
            .await
            .unwrap();

        let err = h
            .chain
            .submit(h.job.tenant_id, h.job.id, vec![Uuid::new_v4()], Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                from: JobStatus::Approved,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn decisions_require_a_pending_record() {
        let h = harness(Some(Uuid::new_v4()), None).await;
        let manager = h.job.hiring_manager_id.unwrap();

        let err = h
            .chain
            .approve(h.job.tenant_id, h.job.id, manager, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingApprovalForUser));

        h.chain
            .submit(h.job.tenant_id, h.job.id, vec![], Uuid::new_v4(), None)
            .await
            .unwrap();
        let err = h
            .chain
            .approve(h.job.tenant_id, h.job.id, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingApprovalForUser));

        let err = h
            .chain
            .reject(h.job.tenant_id, h.job.id, manager, "   ".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        h.chain
            .approve(h.job.tenant_id, h.job.id, manager, None)
            .await
            .unwrap();
        let err = h
            .chain
            .approve(h.job.tenant_id, h.job.id, manager, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingApprovalForUser));
    }

    #[tokio::test]
    async fn hiring_manager_walkthrough() {
        let manager = Uuid::new_v4();
        let h = harness(Some(manager), Some(Uuid::new_v4())).await;

        let submitted = h
            .chain
            .submit(h.job.tenant_id, h.job.id, vec![], Uuid::new_v4(), None)
            .await
            .unwrap();
        assert_eq!(submitted.job.status, JobStatus::PendingApproval);
        assert_eq!(submitted.approvals.len(), 1);
        assert_eq!(submitted.approvals[0].approver_id, manager);
        assert_eq!(submitted.approvals[0].status, ApprovalStatus::Pending);

        let job = h
            .chain
            .approve(h.job.tenant_id, h.job.id, manager, Some("lgtm".into()))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Approved);

        let history = h.store.list_approvals(h.job.id).await.unwrap();
        assert_eq!(history[0].comment.as_deref(), Some("lgtm"));
        assert!(history[0].decided_at.is_some());

        let kinds: Vec<&str> = h.events.events().iter().map(LifecycleEvent::kind).collect();
        assert_eq!(kinds, vec!["submitted_for_approval", "approved"]);
    }

    #[tokio::test]
    async fn concurrent_last_approvals_promote_once() {
        for _ in 0..20 {
            let h = harness(None, None).await;
            let approvers: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
            h.chain
                .submit(h.job.tenant_id, h.job.id, approvers.clone(), Uuid::new_v4(), None)
                .await
                .unwrap();

            let mut handles = Vec::new();
            for approver in approvers {
                let chain = h.chain.clone();
                let (tenant, job) = (h.job.tenant_id, h.job.id);
                handles.push(tokio::spawn(async move {
                    chain.approve(tenant, job, approver, None).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let promotions = h
                .events
                .events()
                .into_iter()
                .filter(|event| {
                    matches!(
                        event,
                        LifecycleEvent::Approved {
                            remaining_pending: 0,
                            status: JobStatus::Approved,
                            ..
                        }
                    )
                })
                .count();
            assert_eq!(promotions, 1);
            assert_eq!(
                h.store.get_job(h.job.tenant_id, h.job.id).await.unwrap().status,
                JobStatus::Approved
            );
        }
    }
}
