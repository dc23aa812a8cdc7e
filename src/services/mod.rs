pub mod approval_chain;
pub mod channels;
pub mod code_allocator;
pub mod events;
pub mod job_store;
pub mod lifecycle;
pub mod memory_store;
pub mod pg_store;
pub mod publish_dispatcher;
