use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::approval::ApprovalRequest;
use crate::models::channel::ChannelName;
use crate::models::job::{JobDetailsUpdate, JobStatus, NewJob};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateJobPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub location: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub employment_type: Option<String>,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
    pub status: Option<JobStatus>,
}

impl From<CreateJobPayload> for NewJob {
    fn from(payload: CreateJobPayload) -> Self {
        NewJob {
            title: payload.title.trim().to_string(),
            description: payload.description,
            location: payload.location,
            employment_type: payload.employment_type,
            hiring_manager_id: payload.hiring_manager_id,
            recruiter_id: payload.recruiter_id,
            status: payload.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateJobPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub location: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub employment_type: Option<String>,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
}

impl From<UpdateJobPayload> for JobDetailsUpdate {
    fn from(payload: UpdateJobPayload) -> Self {
        JobDetailsUpdate {
            title: payload.title,
            description: payload.description,
            location: payload.location,
            employment_type: payload.employment_type,
            hiring_manager_id: payload.hiring_manager_id,
            recruiter_id: payload.recruiter_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitForApprovalPayload {
    /// Empty falls back to the hiring manager, then the recruiter.
    #[serde(default)]
    #[validate(length(max = 50))]
    pub approver_ids: Vec<Uuid>,
    pub requested_by: Uuid,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApprovePayload {
    pub approver_id: Uuid,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RejectPayload {
    pub approver_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublishPayload {
    #[serde(default)]
    pub channels: Vec<ChannelName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusPayload {
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalHistoryResponse {
    pub job_id: Uuid,
    pub approvals: Vec<ApprovalRequest>,
}
