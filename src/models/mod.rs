pub mod approval;
pub mod channel;
pub mod job;
