pub mod health;
pub mod job;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let jobs_api = Router::new()
        .route("/api/tenants/:tenant_id/jobs", post(job::create_job))
        .route(
            "/api/tenants/:tenant_id/job-codes/:code",
            get(job::get_job_by_code),
        )
        .route(
            "/api/tenants/:tenant_id/jobs/:job_id",
            get(job::get_job).patch(job::update_job),
        )
        .route(
            "/api/tenants/:tenant_id/jobs/:job_id/approvals",
            get(job::list_approvals),
        )
        .route(
            "/api/tenants/:tenant_id/jobs/:job_id/submit",
            post(job::submit_for_approval),
        )
        .route(
            "/api/tenants/:tenant_id/jobs/:job_id/approve",
            post(job::approve_job),
        )
        .route(
            "/api/tenants/:tenant_id/jobs/:job_id/reject",
            post(job::reject_job),
        )
        .route(
            "/api/tenants/:tenant_id/jobs/:job_id/publish",
            post(job::publish_job),
        )
        .route(
            "/api/tenants/:tenant_id/jobs/:job_id/status",
            post(job::set_job_status),
        );

    Router::new()
        .route("/health", get(health::health))
        .merge(jobs_api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
