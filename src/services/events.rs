use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::channel::ChannelName;
use crate::models::job::JobStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    JobCreated {
        tenant_id: Uuid,
        job_id: Uuid,
        code: String,
        collisions: u32,
    },
    SubmittedForApproval {
        tenant_id: Uuid,
        job_id: Uuid,
        requested_by: Uuid,
        approvers: Vec<Uuid>,
    },
    Approved {
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        remaining_pending: usize,
        status: JobStatus,
    },
    Rejected {
        tenant_id: Uuid,
        job_id: Uuid,
        approver_id: Uuid,
        reason: String,
    },
    /// `status` is the job's status after the call. It stays put when the
    /// job was moved elsewhere while channels were posting.
    Published {
        tenant_id: Uuid,
        job_id: Uuid,
        succeeded: Vec<ChannelName>,
        failed: Vec<ChannelName>,
        status: JobStatus,
    },
    StatusOverridden {
        tenant_id: Uuid,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

impl LifecycleEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::JobCreated { .. } => "job_created",
            LifecycleEvent::SubmittedForApproval { .. } => "submitted_for_approval",
            LifecycleEvent::Approved { .. } => "approved",
            LifecycleEvent::Rejected { .. } => "rejected",
            LifecycleEvent::Published { .. } => "published",
            LifecycleEvent::StatusOverridden { .. } => "status_overridden",
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            LifecycleEvent::JobCreated { job_id, .. }
            | LifecycleEvent::SubmittedForApproval { job_id, .. }
            | LifecycleEvent::Approved { job_id, .. }
            | LifecycleEvent::Rejected { job_id, .. }
            | LifecycleEvent::Published { job_id, .. }
            | LifecycleEvent::StatusOverridden { job_id, .. } => *job_id,
        }
    }
}

pub trait LifecycleEventSink: Send + Sync {
    fn record(&self, event: &LifecycleEvent);
}

/// Writes each event as one structured `tracing` record on the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl LifecycleEventSink for TracingEventSink {
    fn record(&self, event: &LifecycleEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        match event {
            LifecycleEvent::Published { failed, .. } if !failed.is_empty() => {
                tracing::warn!(
                    target: "audit",
                    event = event.kind(),
                    job_id = %event.job_id(),
                    %payload,
                    "job published with channel failures"
                );
            }
            _ => {
                tracing::info!(
                    target: "audit",
                    event = event.kind(),
                    job_id = %event.job_id(),
                    %payload,
                    "job lifecycle event"
                );
            }
        }
    }
}

/// Keeps events in memory; handy for tests and for callers that forward
/// events in batches.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LifecycleEventSink for MemoryEventSink {
    fn record(&self, event: &LifecycleEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
