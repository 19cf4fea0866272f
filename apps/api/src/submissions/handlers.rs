//! Axum handlers for browser-posted forms and analytics beacons.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::analytics::{self, hash_identifier, value_text, AnalyticsEvent, ApplyPayload};
use crate::errors::AppError;
use crate::jobs::text::public_link;
use crate::state::AppState;
use crate::submissions::{ContactRequest, JobPostingRequest, SubscribeRequest};

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl SubmissionResponse {
    fn ok() -> Self {
        Self {
            status: "ok",
            redirect: None,
        }
    }
}

/// Reads a JSON body, treating a missing or malformed body as empty so the
/// field checks report what is wrong.
fn json_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        debug!(error = %err, "unreadable request body");
        T::default()
    })
}

/// POST /events/apply
///
/// Records an apply click or filter selection. Always answers `ok`.
pub async fn handle_apply_event(State(state): State<AppState>, body: Bytes) -> Json<SubmissionResponse> {
    let payload: ApplyPayload = json_or_default(&body);
    analytics::emit(state.events.clone(), AnalyticsEvent::from_apply(payload, Utc::now()));
    Json(SubmissionResponse::ok())
}

/// POST /subscribe (and /subscribe.json)
///
/// Adds an address to the newsletter. The redirect is the linked job's
/// outbound URL, else the caller's `next`.
pub async fn handle_subscribe(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmissionResponse>, AppError> {
    let request = json_or_default::<SubscribeRequest>(&body).checked()?;

    let job_link = match request.job_id.as_ref().and_then(value_text) {
        Some(id) => state.jobs.get_link(&id).await.unwrap_or_else(|err| {
            debug!(error = %err, "subscribe job link lookup failed");
            None
        }),
        None => None,
    };
    let redirect = public_link(job_link.as_deref())
        .or_else(|| request.next.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string));

    let now = Utc::now();
    let status = state.submissions.add_subscriber(&request.email, now).await?;
    info!(status = status.as_str(), "newsletter subscription");

    analytics::emit(
        state.events.clone(),
        AnalyticsEvent::subscribe(
            hash_identifier(&state.analytics_salt, &request.email),
            status.as_str(),
            redirect.as_deref(),
            now,
        ),
    );

    Ok(Json(SubmissionResponse {
        status: status.as_str(),
        redirect,
    }))
}

/// POST /contact (and /contact.json)
pub async fn handle_contact(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmissionResponse>, AppError> {
    let contact = json_or_default::<ContactRequest>(&body).checked()?;
    state.submissions.add_contact(&contact, Utc::now()).await?;
    info!("contact message received");
    Ok(Json(SubmissionResponse::ok()))
}

/// POST /job-posting (and /job-posting.json)
pub async fn handle_job_posting(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmissionResponse>, AppError> {
    let posting = json_or_default::<JobPostingRequest>(&body).checked()?;
    state.submissions.add_job_posting(&posting, Utc::now()).await?;
    info!(company = %posting.company, "job posting request received");
    Ok(Json(SubmissionResponse::ok()))
}
