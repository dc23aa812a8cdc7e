pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::error::{Error, Result};
use crate::services::{
    approval_chain::ApprovalChain,
    channels::{http_client, ChannelAdapter, IndeedChannel, InternalChannel, LinkedInChannel},
    code_allocator::CodeAllocator,
    events::{LifecycleEventSink, TracingEventSink},
    job_store::JobStore,
    lifecycle::JobLifecycle,
    publish_dispatcher::PublishDispatcher,
};

#[derive(Clone)]
pub struct AppState {
    pub store_backend: StoreBackend,
    pub lifecycle: JobLifecycle,
    pub approval_chain: ApprovalChain,
    pub code_allocator: CodeAllocator,
    pub publish_dispatcher: PublishDispatcher,
}

impl AppState {
    /// Production wiring: tracing audit sink plus the LinkedIn, Indeed and
    /// internal channels.
    pub fn new(store: Arc<dyn JobStore>, config: &Config) -> Result<Self> {
        let http_client = http_client(config.channel_timeout)
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let adapters: Vec<Arc<dyn ChannelAdapter>> = vec![
            Arc::new(LinkedInChannel::new(
                http_client.clone(),
                config.linkedin_api_key.clone(),
                config.linkedin_company_id.clone(),
            )),
            Arc::new(IndeedChannel::new(
                http_client,
                config.indeed_api_key.clone(),
                config.company_name.clone(),
            )),
            Arc::new(InternalChannel::new(config.public_base_url.clone())),
        ];

        Ok(Self::from_parts(
            store,
            Arc::new(TracingEventSink),
            adapters,
            config,
        ))
    }

    pub fn from_parts(
        store: Arc<dyn JobStore>,
        events: Arc<dyn LifecycleEventSink>,
        adapters: Vec<Arc<dyn ChannelAdapter>>,
        config: &Config,
    ) -> Self {
        let lifecycle = JobLifecycle::new(store.clone(), events.clone());
        let approval_chain = ApprovalChain::new(store.clone(), events.clone());
        let code_allocator = CodeAllocator::new(
            store.clone(),
            events.clone(),
            config.job_code_prefix.clone(),
            config.job_code_digits,
            config.code_allocation_attempts,
        );
        let publish_dispatcher = PublishDispatcher::new(
            store,
            events,
            adapters,
            config.channel_timeout,
            config.channel_max_attempts,
        );

        Self {
            store_backend: config.store_backend,
            lifecycle,
            approval_chain,
            code_allocator,
            publish_dispatcher,
        }
    }
}
