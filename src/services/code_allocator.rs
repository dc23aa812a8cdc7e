use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::job::{Job, NewJob};
use crate::services::events::{LifecycleEvent, LifecycleEventSink};
use crate::services::job_store::{JobStore, StoreError};

type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Assigns globally unique job codes such as `JOB-123456`.
///
/// Uniqueness is enforced by the store: a candidate is inserted directly and
/// a code conflict triggers a fresh candidate, up to `max_attempts` tries.
#[derive(Clone)]
pub struct CodeAllocator {
    store: Arc<dyn JobStore>,
    events: Arc<dyn LifecycleEventSink>,
    generator: CodeGenerator,
    max_attempts: u32,
}

impl CodeAllocator {
    pub fn new(
        store: Arc<dyn JobStore>,
        events: Arc<dyn LifecycleEventSink>,
        prefix: impl Into<String>,
        digits: u32,
        max_attempts: u32,
    ) -> Self {
        let prefix = prefix.into();
        Self {
            store,
            events,
            generator: Arc::new(move || random_code(&prefix, digits)),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Replaces the random candidate source, e.g. with a deterministic one.
    pub fn with_generator(mut self, generator: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn candidate(&self) -> String {
        (self.generator)()
    }

    /// Creates the job under a freshly allocated code.
    pub async fn allocate(&self, tenant_id: Uuid, new_job: NewJob) -> Result<Job> {
        if new_job.title.trim().is_empty() {
            return Err(Error::BadRequest("title must not be empty".to_string()));
        }

        let mut collisions = 0;
        for _ in 0..self.max_attempts {
            let job = new_job
                .clone()
                .into_job(tenant_id, self.candidate(), Utc::now());

            match self.store.insert_job(job).await {
                Ok(job) => {
                    self.events.record(&LifecycleEvent::JobCreated {
                        tenant_id,
                        job_id: job.id,
                        code: job.code.clone(),
                        collisions,
                    });
                    return Ok(job);
                }
                Err(StoreError::Conflict) => collisions += 1,
                Err(other) => return Err(other.into()),
            }
        }

        Err(Error::CodeAllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// `prefix-NNNNNN` with exactly `digits` digits and no leading zero.
pub fn random_code(prefix: &str, digits: u32) -> String {
    let digits = digits.clamp(1, 9);
    let low = if digits == 1 { 0 } else { 10u32.pow(digits - 1) };
    let high = 10u32.pow(digits) - 1;
    let number = rand::thread_rng().gen_range(low..=high);
    format!("{prefix}-{number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::events::MemoryEventSink;
    use crate::services::memory_store::InMemoryJobStore;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn new_job() -> NewJob {
        NewJob {
            title: "Site Reliability Engineer".into(),
            ..NewJob::default()
        }
    }

    #[test]
    fn random_code_has_requested_width() {
        for _ in 0..200 {
            let code = random_code("JOB", 6);
            let number = code.strip_prefix("JOB-").unwrap();
            assert_eq!(number.len(), 6);
            let value: u32 = number.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
        assert!(random_code("REQ", 3).starts_with("REQ-"));
    }

    #[tokio::test]
    async fn concurrent_allocations_never_share_a_code() {
        let store = Arc::new(InMemoryJobStore::new());
        let events = Arc::new(MemoryEventSink::new());
        // 2-digit space (10..=99) makes collisions frequent.
        let allocator = CodeAllocator::new(store, events.clone(), "JOB", 2, 200);
        let tenant = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.allocate(tenant, new_job()).await
            }));
        }

        let mut codes = HashSet::new();
        for handle in handles {
            let job = handle.await.unwrap().unwrap();
            assert!(codes.insert(job.code), "duplicate code allocated");
        }
        assert_eq!(codes.len(), 40);
        assert_eq!(events.events().len(), 40);
    }

    #[tokio::test]
    async fn collisions_are_retried_and_counted() {
        let store = Arc::new(InMemoryJobStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let counter = Arc::new(AtomicU32::new(0));
        let sequence = counter.clone();
        let allocator = CodeAllocator::new(store, events.clone(), "JOB", 6, 5).with_generator(
            move || match sequence.fetch_add(1, Ordering::SeqCst) {
                0 | 1 | 2 => "JOB-500000".to_string(),
                n => format!("JOB-5000{n:02}"),
            },
        );
        let tenant = Uuid::new_v4();

        let first = allocator.allocate(tenant, new_job()).await.unwrap();
        assert_eq!(first.code, "JOB-500000");
        let second = allocator.allocate(tenant, new_job()).await.unwrap();
        assert_eq!(second.code, "JOB-500003");

        let recorded = events.events();
        assert!(matches!(
            recorded.last(),
            Some(LifecycleEvent::JobCreated { collisions: 2, .. })
        ));
    }

    #[tokio::test]
    async fn exhaustion_is_reported_after_bounded_attempts() {
        let store = Arc::new(InMemoryJobStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let allocator = CodeAllocator::new(store, events, "JOB", 6, 3)
            .with_generator(|| "JOB-777777".to_string());
        let tenant = Uuid::new_v4();

        allocator.allocate(tenant, new_job()).await.unwrap();
        let err = allocator.allocate(Uuid::new_v4(), new_job()).await.unwrap_err();
        assert!(matches!(err, Error::CodeAllocationExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn blank_title_is_rejected_before_allocation() {
        let store = Arc::new(InMemoryJobStore::new());
        let allocator = CodeAllocator::new(store, Arc::new(MemoryEventSink::new()), "JOB", 6, 3);
        let err = allocator
            .allocate(Uuid::new_v4(), NewJob::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
