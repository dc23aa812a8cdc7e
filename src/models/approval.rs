use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown approval status '{0}'")]
pub struct UnknownApprovalStatus(pub String);

impl FromStr for ApprovalStatus {
    type Err = UnknownApprovalStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            other => Err(UnknownApprovalStatus(other.to_string())),
        }
    }
}

/// One approver's slot in a submission round. Decided records are kept
/// forever as the audit trail; only pending ones are ever replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub job_id: Uuid,
    pub approver_id: Uuid,
    pub order: i32,
    pub status: ApprovalStatus,
    pub resubmission_comment: Option<String>,
    pub comment: Option<String>,
    pub rejection_reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn pending(job_id: Uuid, approver_id: Uuid, order: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            approver_id,
            order,
            status: ApprovalStatus::Pending,
            resubmission_comment: None,
            comment: None,
            rejection_reason: None,
            decided_at: None,
            created_at: now,
        }
    }

    pub fn with_resubmission_comment(mut self, comment: Option<String>) -> Self {
        self.resubmission_comment = comment;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub fn decide(&mut self, decision: &ApprovalDecision, now: DateTime<Utc>) {
        match decision {
            ApprovalDecision::Approve { comment } => {
                self.status = ApprovalStatus::Approved;
                self.comment = comment.clone();
            }
            ApprovalDecision::Reject { comment, reason } => {
                self.status = ApprovalStatus::Rejected;
                self.comment = comment.clone();
                self.rejection_reason = Some(reason.clone());
            }
        }
        self.decided_at = Some(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve {
        comment: Option<String>,
    },
    Reject {
        comment: Option<String>,
        reason: String,
    },
}

impl ApprovalDecision {
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApprovalDecision::Reject { .. })
    }
}
