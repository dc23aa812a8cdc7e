use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::channel::ChannelName;
use crate::models::job::Job;
use crate::services::channels::{ChannelAdapter, ChannelError};
use crate::services::events::{LifecycleEvent, LifecycleEventSink};
use crate::services::job_store::{JobStore, StoreError};
use crate::services::lifecycle::{transition, JobEvent};

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Outcome of one channel within a publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChannelResult {
    Posted { reference: String },
    Failed { error: String },
}

impl ChannelResult {
    pub fn is_posted(&self) -> bool {
        matches!(self, ChannelResult::Posted { .. })
    }
}

/// `opened` is false when the job left APPROVED/OPEN while channels were
/// posting; `job` is then the job as it stands, untouched by this call.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub job: Job,
    pub opened: bool,
    pub results: BTreeMap<ChannelName, ChannelResult>,
}

/// Pushes an approved job to external channels and opens it.
///
/// Channels run concurrently and independently. A failed channel is reported
/// in the result map; it never stops the others nor the move to `OPEN`.
#[derive(Clone)]
pub struct PublishDispatcher {
    store: Arc<dyn JobStore>,
    events: Arc<dyn LifecycleEventSink>,
    adapters: Arc<HashMap<ChannelName, Arc<dyn ChannelAdapter>>>,
    deadline: Duration,
    max_attempts: u32,
}

impl PublishDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        events: Arc<dyn LifecycleEventSink>,
        adapters: Vec<Arc<dyn ChannelAdapter>>,
        deadline: Duration,
        max_attempts: u32,
    ) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.channel(), adapter))
            .collect();
        Self {
            store,
            events,
            adapters: Arc::new(adapters),
            deadline,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn publish(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        channels: &[ChannelName],
    ) -> Result<PublishOutcome> {
        let job = self.store.get_job(tenant_id, job_id).await?;
        if transition(job.status, JobEvent::Publish).is_err() {
            return Err(Error::JobNotApproved { status: job.status });
        }

        let requested: BTreeSet<ChannelName> = channels.iter().copied().collect();
        let results = self.fan_out(&job, requested).await;

        let publish = |job: &Job, _pending: usize| transition(job.status, JobEvent::Publish);
        let (job, opened) = match self.store.transition_job(tenant_id, job_id, &publish).await {
            Ok(job) => (job, true),
            // Channels may already carry the posting, so the results still go out.
            Err(StoreError::Transition(rejected)) => {
                warn!(
                    job_id = %job_id,
                    status = %rejected.from,
                    "job status changed during publish; leaving it as is"
                );
                (self.store.get_job(tenant_id, job_id).await?, false)
            }
            Err(other) => return Err(other.into()),
        };

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (channel, result) in &results {
            if result.is_posted() {
                succeeded.push(*channel);
            } else {
                failed.push(*channel);
            }
        }
        self.events.record(&LifecycleEvent::Published {
            tenant_id,
            job_id,
            succeeded,
            failed,
            status: job.status,
        });

        Ok(PublishOutcome {
            job,
            opened,
            results,
        })
    }

    async fn fan_out(
        &self,
        job: &Job,
        channels: BTreeSet<ChannelName>,
    ) -> BTreeMap<ChannelName, ChannelResult> {
        let mut handles = Vec::with_capacity(channels.len());
        for channel in channels {
            let adapter = self.adapters.get(&channel).cloned();
            let job = job.clone();
            let (deadline, max_attempts) = (self.deadline, self.max_attempts);
            handles.push((
                channel,
                tokio::spawn(async move {
                    match adapter {
                        Some(adapter) => post_with_retry(adapter, &job, deadline, max_attempts).await,
                        None => Err(ChannelError::NotConfigured(channel)),
                    }
                }),
            ));
        }

        let mut results = BTreeMap::new();
        for (channel, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(ChannelError::Aborted(join_error.to_string())),
            };
            let result = match outcome {
                Ok(reference) => ChannelResult::Posted { reference },
                Err(error) => ChannelResult::Failed {
                    error: error.to_string(),
                },
            };
            results.insert(channel, result);
        }
        results
    }
}

async fn post_with_retry(
    adapter: Arc<dyn ChannelAdapter>,
    job: &Job,
    deadline: Duration,
    max_attempts: u32,
) -> std::result::Result<String, ChannelError> {
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(deadline, adapter.post(job)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ChannelError::Timeout(deadline)),
        };

        match outcome {
            Err(error) if error.is_transient() && attempt < max_attempts => {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
