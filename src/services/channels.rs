use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::models::channel::ChannelName;
use crate::models::job::Job;

pub const LINKEDIN_ENDPOINT: &str = "https://api.linkedin.com/v2/simpleJobPostings";
pub const INDEED_ENDPOINT: &str = "https://apis.indeed.com/v2/jobs";

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {0} is not configured")]
    NotConfigured(ChannelName),

    #[error("missing credentials: {0} is not set")]
    MissingCredentials(&'static str),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited")]
    RateLimited,

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("channel task aborted: {0}")]
    Aborted(String),
}

impl ChannelError {
    /// Failures worth another attempt: timeouts, throttling and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ChannelError::Timeout(_) | ChannelError::RateLimited => true,
            ChannelError::Rejected { status, .. } => *status >= 500,
            ChannelError::Transport(err) => err.is_timeout() || err.is_connect(),
            ChannelError::NotConfigured(_)
            | ChannelError::MissingCredentials(_)
            | ChannelError::Aborted(_) => false,
        }
    }
}

/// One external job board. `post` returns a channel-specific reference,
/// usually the public URL of the posting.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> ChannelName;

    async fn post(&self, job: &Job) -> Result<String, ChannelError>;
}

pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// The company's own listing page. Pure; never fails.
#[derive(Debug, Clone)]
pub struct InternalChannel {
    base_url: String,
}

impl InternalChannel {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn job_url(&self, job: &Job) -> String {
        format!("{}/jobs/{}", self.base_url, job.id)
    }
}

#[async_trait]
impl ChannelAdapter for InternalChannel {
    fn channel(&self) -> ChannelName {
        ChannelName::Internal
    }

    async fn post(&self, job: &Job) -> Result<String, ChannelError> {
        Ok(self.job_url(job))
    }
}

#[derive(Debug, Deserialize)]
struct PostingResponse {
    id: Option<serde_json::Value>,
    #[serde(rename = "jobKey")]
    job_key: Option<String>,
}

impl PostingResponse {
    fn reference(self) -> Option<String> {
        self.job_key.or_else(|| {
            self.id.map(|id| match id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        })
    }
}

#[derive(Clone)]
pub struct LinkedInChannel {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    company_id: Option<String>,
}

impl LinkedInChannel {
    pub fn new(client: Client, api_key: Option<String>, company_id: Option<String>) -> Self {
        Self {
            client,
            endpoint: LINKEDIN_ENDPOINT.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            company_id: company_id.filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ChannelAdapter for LinkedInChannel {
    fn channel(&self) -> ChannelName {
        ChannelName::LinkedIn
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, code = %job.code))]
    async fn post(&self, job: &Job) -> Result<String, ChannelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ChannelError::MissingCredentials("LINKEDIN_API_KEY"))?;
        let company_id = self
            .company_id
            .as_deref()
            .ok_or(ChannelError::MissingCredentials("LINKEDIN_COMPANY_ID"))?;

        let body = json!({
            "companyId": company_id,
            "title": job.title,
            "description": job.description.as_deref().unwrap_or_default(),
            "location": job.location.as_deref().unwrap_or("Remote"),
            "employmentType": linkedin_employment_type(job.employment_type.as_deref()),
            "listedAt": chrono::Utc::now().timestamp_millis(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;

        let posting: PostingResponse = accept(response).await?;
        let reference = posting.reference().unwrap_or_else(|| job.id.to_string());
        info!(reference = %reference, "posted job to LinkedIn");
        Ok(format!("https://www.linkedin.com/jobs/view/{reference}"))
    }
}

#[derive(Clone)]
pub struct IndeedChannel {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    company_name: String,
}

impl IndeedChannel {
    pub fn new(client: Client, api_key: Option<String>, company_name: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: INDEED_ENDPOINT.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            company_name: company_name.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ChannelAdapter for IndeedChannel {
    fn channel(&self) -> ChannelName {
        ChannelName::Indeed
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, code = %job.code))]
    async fn post(&self, job: &Job) -> Result<String, ChannelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ChannelError::MissingCredentials("INDEED_API_KEY"))?;

        let body = json!({
            "jobTitle": job.title,
            "jobDescription": job.description.as_deref().unwrap_or_default(),
            "company": self.company_name,
            "location": job.location.as_deref().unwrap_or("Remote"),
            "jobType": indeed_job_type(job.employment_type.as_deref()),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let posting: PostingResponse = accept(response).await?;
        let reference = posting.reference().unwrap_or_else(|| job.id.to_string());
        info!(reference = %reference, "posted job to Indeed");
        Ok(format!("https://www.indeed.com/viewjob?jk={reference}"))
    }
}

async fn accept(response: reqwest::Response) -> Result<PostingResponse, ChannelError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("channel rate limited the request");
        return Err(ChannelError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "channel rejected job posting");
        return Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    // Some boards answer 201 with an empty body.
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(PostingResponse {
            id: None,
            job_key: None,
        });
    }
    Ok(serde_json::from_slice(&bytes).unwrap_or(PostingResponse {
        id: None,
        job_key: None,
    }))
}

fn normalized_employment_type(raw: Option<&str>) -> &'static str {
    let normalized = raw
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
        .replace(['-', ' '], "_");
    match normalized.as_str() {
        "PART_TIME" | "PARTTIME" => "PART_TIME",
        "CONTRACT" | "CONTRACTOR" => "CONTRACT",
        "INTERNSHIP" | "INTERN" => "INTERNSHIP",
        _ => "FULL_TIME",
    }
}

pub fn linkedin_employment_type(raw: Option<&str>) -> &'static str {
    normalized_employment_type(raw)
}

pub fn indeed_job_type(raw: Option<&str>) -> &'static str {
    match normalized_employment_type(raw) {
        "PART_TIME" => "parttime",
        "CONTRACT" => "contract",
        "INTERNSHIP" => "internship",
        _ => "fulltime",
    }
}
