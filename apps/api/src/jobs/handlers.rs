//! Axum route handlers for the Jobs API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analytics::{self, AnalyticsEvent};
use crate::errors::AppError;
use crate::jobs::insights::{JobSummary, SalaryInsights, Trends};
use crate::jobs::listing::{JobDetail, JobListing, Pagination};
use crate::jobs::text::public_link;
use crate::search::SearchQuery;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Query string of `GET /api/jobs`. Numbers arrive as text so a malformed
/// value falls back to its default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsParams {
    pub title: Option<String>,
    pub country: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// Query string of the summary and salary insight endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct InsightParams {
    pub title: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AutocompleteResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct JobLinkResponse {
    pub id: i64,
    pub link: String,
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse().ok())
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::NotFound(format!("Job {raw} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/jobs?title=&country=&page=&per_page=
///
/// Paginated job cards with salary estimates. Datastore failures degrade to
/// an empty listing. Each search is recorded as an analytics event.
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> Json<JobListing> {
    let query = SearchQuery::parse(
        params.title.as_deref().unwrap_or_default(),
        params.country.as_deref().unwrap_or_default(),
    );
    let pagination = Pagination::resolve(
        parse_number(params.page.as_deref()),
        parse_number(params.per_page.as_deref()),
    );
    let now = Utc::now();

    let listing = state.listings.list(&query, pagination, now).await;

    analytics::emit(
        state.events.clone(),
        AnalyticsEvent::search(
            &query,
            listing.meta.total,
            pagination.page,
            pagination.per_page,
            now,
        ),
    );

    Json(listing)
}

/// GET /api/jobs/:id
///
/// One job card plus up to three related jobs.
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobDetail>, AppError> {
    let job_id = parse_id(&id)?;
    let detail = state
        .listings
        .detail(job_id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
    Ok(Json(detail))
}

/// GET /api/jobs/:id/link
///
/// Outbound application link. Blacklisted or empty links read as not found.
pub async fn handle_get_job_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobLinkResponse>, AppError> {
    let job_id = parse_id(&id)?;
    let link = state.jobs.get_link(&id).await?;
    let link = public_link(link.as_deref())
        .ok_or_else(|| AppError::NotFound(format!("No link for job {job_id}")))?;
    Ok(Json(JobLinkResponse { id: job_id, link }))
}

/// GET /api/jobs/summary?title=&country=
///
/// Match count, median salary and remote share for a search.
pub async fn handle_jobs_summary(
    State(state): State<AppState>,
    Query(params): Query<InsightParams>,
) -> Json<JobSummary> {
    let query = SearchQuery::parse(
        params.title.as_deref().unwrap_or_default(),
        params.country.as_deref().unwrap_or_default(),
    );
    Json(state.insights.summary(&query).await)
}

/// GET /api/salary-insights?title=&country=
pub async fn handle_salary_insights(
    State(state): State<AppState>,
    Query(params): Query<InsightParams>,
) -> Json<SalaryInsights> {
    let insights = state
        .insights
        .salary_insights(
            params.title.as_deref().unwrap_or_default(),
            params.country.as_deref().unwrap_or_default(),
            Utc::now(),
        )
        .await;
    Json(insights)
}

/// GET /api/autocomplete?q=
///
/// Up to eight distinct titles containing `q`. Lookup failures return an
/// empty list.
pub async fn handle_autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> Json<AutocompleteResponse> {
    let fragment = params.q.as_deref().unwrap_or_default();
    let suggestions = state.jobs.suggest_titles(fragment).await.unwrap_or_else(|err| {
        warn!(error = %err, "autocomplete lookup failed");
        Vec::new()
    });
    Json(AutocompleteResponse { suggestions })
}

/// GET /api/trends
pub async fn handle_trends(State(state): State<AppState>) -> Json<Trends> {
    Json(state.insights.trends(Utc::now()).await)
}
