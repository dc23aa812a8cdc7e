use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Draft,
    PendingApproval,
    Approved,
    Open,
    Closed,
    Cancelled,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Draft => "DRAFT",
            JobStatus::PendingApproval => "PENDING_APPROVAL",
            JobStatus::Approved => "APPROVED",
            JobStatus::Open => "OPEN",
            JobStatus::Closed => "CLOSED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownJobStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DRAFT" => Ok(JobStatus::Draft),
            "PENDING_APPROVAL" => Ok(JobStatus::PendingApproval),
            "APPROVED" => Ok(JobStatus::Approved),
            "OPEN" => Ok(JobStatus::Open),
            "CLOSED" => Ok(JobStatus::Closed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(UnknownJobStatus(other.to_string())),
        }
    }
}

/// A job posting owned by exactly one tenant.
///
/// `code` is unique across every tenant and is never reassigned once the job
/// has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub status: JobStatus,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Moves the job into `status`. Entering `OPEN` stamps `published_at` the
    /// first time only.
    pub fn enter_status(&mut self, status: JobStatus, now: DateTime<Utc>) {
        self.status = status;
        if status == JobStatus::Open && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Fallback approver chain used when a submission names nobody.
    pub fn fallback_approver(&self) -> Option<Uuid> {
        self.hiring_manager_id.or(self.recruiter_id)
    }
}

/// Caller-supplied content for a job that does not have a code yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
    pub status: Option<JobStatus>,
}

impl NewJob {
    pub fn into_job(self, tenant_id: Uuid, code: String, now: DateTime<Utc>) -> Job {
        let mut job = Job {
            id: Uuid::new_v4(),
            tenant_id,
            code,
            title: self.title,
            description: self.description,
            location: self.location,
            employment_type: self.employment_type,
            status: JobStatus::Draft,
            hiring_manager_id: self.hiring_manager_id,
            recruiter_id: self.recruiter_id,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        job.enter_status(self.status.unwrap_or(JobStatus::Draft), now);
        job
    }
}

/// Editable job content. Code, tenant and status are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetailsUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub hiring_manager_id: Option<Uuid>,
    pub recruiter_id: Option<Uuid>,
}

impl JobDetailsUpdate {
    pub fn apply_to(self, job: &mut Job, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            job.title = title;
        }
        if self.description.is_some() {
            job.description = self.description;
        }
        if self.location.is_some() {
            job.location = self.location;
        }
        if self.employment_type.is_some() {
            job.employment_type = self.employment_type;
        }
        if self.hiring_manager_id.is_some() {
            job.hiring_manager_id = self.hiring_manager_id;
        }
        if self.recruiter_id.is_some() {
            job.recruiter_id = self.recruiter_id;
        }
        job.updated_at = now;
    }
}
