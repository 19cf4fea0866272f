pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::jobs::handlers;
use crate::state::AppState;
use crate::submissions::handlers as forms;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs API
        .route("/api/jobs", get(handlers::handle_list_jobs))
        .route("/api/jobs/summary", get(handlers::handle_jobs_summary))
        .route("/api/jobs/:id", get(handlers::handle_get_job))
        .route("/api/jobs/:id/link", get(handlers::handle_get_job_link))
        .route("/api/salary-insights", get(handlers::handle_salary_insights))
        .route("/api/autocomplete", get(handlers::handle_autocomplete))
        .route("/api/trends", get(handlers::handle_trends))
        // Forms and analytics beacons
        .route("/events/apply", post(forms::handle_apply_event))
        .route("/subscribe", post(forms::handle_subscribe))
        .route("/subscribe.json", post(forms::handle_subscribe))
        .route("/contact", post(forms::handle_contact))
        .route("/contact.json", post(forms::handle_contact))
        .route("/job-posting", post(forms::handle_job_posting))
        .route("/job-posting.json", post(forms::handle_job_posting))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::analytics::tests::RecordingSink;
    use crate::analytics::LogEventSink;
    use crate::jobs::listing::MAX_PAGE;
    use crate::jobs::repository::tests::CountingStore;
    use crate::jobs::MemoryJobStore;
    use crate::salary::StaticSalaryTable;
    use crate::search::CacheSettings;
    use crate::submissions::MemorySubmissionStore;

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
        send(state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(state: AppState, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(state, request).await
    }

    /// Demo catalogue with observable analytics and submissions.
    fn recording_state() -> (AppState, Arc<RecordingSink>, Arc<MemorySubmissionStore>) {
        let events = Arc::new(RecordingSink::default());
        let submissions = Arc::new(MemorySubmissionStore::new());
        let state = AppState::new(
            Arc::new(MemoryJobStore::demo()),
            Arc::new(StaticSalaryTable::demo()),
            events.clone(),
            submissions.clone(),
            CacheSettings::default(),
        )
        .with_analytics_salt("pepper");
        (state, events, submissions)
    }

    fn demo_state() -> AppState {
        AppState::in_memory(CacheSettings::default())
    }

    fn failing_state() -> AppState {
        AppState::new(
            Arc::new(CountingStore::failing()),
            Arc::new(StaticSalaryTable::demo()),
            Arc::new(LogEventSink),
            Arc::new(MemorySubmissionStore::new()),
            CacheSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_health_reports_connected() {
        let (status, body) = get_json(demo_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db"], "connected");
    }

    #[tokio::test]
    async fn test_health_reports_failed_datastore() {
        let (status, body) = get_json(failing_state(), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["db"], "failed");
    }

    #[tokio::test]
    async fn test_list_jobs_by_country() {
        let (status, body) = get_json(demo_state(), "/api/jobs?country=Deutschland").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["country"], "DE");
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["items"][0]["title"], "Staff Backend Engineer");
        assert_eq!(body["items"][0]["salary_uplift_factor"], 1.1);
    }

    #[tokio::test]
    async fn test_list_jobs_ignores_malformed_paging() {
        let (status, body) = get_json(demo_state(), "/api/jobs?page=abc&per_page=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["page"], 1);
        assert_eq!(body["meta"]["per_page"], 2);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_list_jobs_degrades_to_empty_on_store_failure() {
        let (status, body) = get_json(failing_state(), "/api/jobs?title=rust").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 0);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_get_job_and_not_found() {
        let (status, body) = get_json(demo_state(), "/api/jobs/2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Data Engineer");
        assert!(body["related"].is_array());

        let (status, body) = get_json(demo_state(), "/api/jobs/abc").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (status, _) = get_json(demo_state(), "/api/jobs/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_job_maps_store_failure_to_503() {
        let (status, body) = get_json(failing_state(), "/api/jobs/1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "DATASTORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_get_job_link() {
        let (status, body) = get_json(demo_state(), "/api/jobs/2/link").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["link"], "https://jobs.example.org/data-engineer");
    }

    #[tokio::test]
    async fn test_list_jobs_huge_page_is_clamped() {
        let (status, body) =
            get_json(demo_state(), "/api/jobs?page=9223372036854775807&per_page=100").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["page"], MAX_PAGE);
        assert_eq!(body["meta"]["has_next"], false);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(0));

        let (status, body) = get_json(demo_state(), "/api/jobs?page=-9223372036854775808").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["page"], 1);
    }

    #[tokio::test]
    async fn test_jobs_summary_is_not_a_job_id() {
        let (status, body) = get_json(demo_state(), "/api/jobs/summary?country=UK").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["salary"]["median"], 85_000);
        assert_eq!(body["salary"]["currency"], "GBP");
        assert_eq!(body["remote_share"], 0.0);
    }

    #[tokio::test]
    async fn test_salary_insights_shape() {
        let (status, body) = get_json(demo_state(), "/api/salary-insights?country=CH").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["items"][0]["title"], "product manager");
        assert_eq!(body["meta"]["country"], "CH");
        assert_eq!(body["meta"]["title"], "");
    }

    #[tokio::test]
    async fn test_autocomplete_suggestions() {
        let (status, body) = get_json(demo_state(), "/api/autocomplete?q=Engineer").await;
        assert_eq!(status, StatusCode::OK);
        let suggestions = body["suggestions"].as_array().expect("array");
        assert!(suggestions.len() <= 8);
        assert!(suggestions.contains(&Value::from("Data Engineer")));

        let (_, body) = get_json(demo_state(), "/api/autocomplete?q=e").await;
        assert_eq!(body["suggestions"], serde_json::json!([]));

        let (status, body) = get_json(failing_state(), "/api/autocomplete?q=rust").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_trends_returns_weeks() {
        let (status, body) = get_json(demo_state(), "/api/trends").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["weeks"].is_array());

        let (status, body) = get_json(failing_state(), "/api/trends").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["weeks"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_apply_event_is_recorded() {
        let (state, events, _) = recording_state();
        let (status, body) = post_json(
            state,
            "/events/apply",
            r#"{"jobId": 2, "jobTitle": "Data Engineer", "job_location": "London, UK"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let recorded = events.wait_for(1).await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].event_type, "apply");
        assert_eq!(recorded[0].job.job_id, "2");
        assert_eq!(recorded[0].raw_country, "London, UK");
    }

    #[tokio::test]
    async fn test_apply_event_accepts_garbage_body() {
        let (state, events, _) = recording_state();
        let (status, body) = post_json(state, "/events/apply", "not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(events.wait_for(1).await[0].event_status, "unknown");
    }

    #[tokio::test]
    async fn test_subscribe_then_duplicate() {
        let (state, events, submissions) = recording_state();
        let (status, body) = post_json(
            state.clone(),
            "/subscribe",
            r#"{"email": "Ada@Example.com", "job_id": "2"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["redirect"], "https://jobs.example.org/data-engineer");

        let (status, body) = post_json(
            state,
            "/subscribe.json",
            r#"{"email": "Ada@example.COM", "next": "/jobs"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "duplicate");
        assert_eq!(body["redirect"], "/jobs");
        assert_eq!(submissions.subscriber_count(), 1);

        let recorded = events.wait_for(2).await;
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|e| e.event_type == "subscribe"));
        assert_eq!(recorded[0].email_hash, recorded[1].email_hash);
        assert!(!recorded[0].email_hash.contains('@'));
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_email() {
        let (state, _, submissions) = recording_state();
        let (status, body) = post_json(state, "/subscribe", r#"{"email": "nope"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_EMAIL");
        assert_eq!(submissions.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_contact_form() {
        let (state, _, submissions) = recording_state();
        let (status, body) = post_json(
            state.clone(),
            "/contact.json",
            r#"{"email": "ops@example.com", "company": "Acme", "message": "Please call"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(submissions.contacts()[0].name, "Acme");

        let (status, body) = post_json(
            state,
            "/contact",
            r#"{"email": "ops@example.com", "name": "Acme", "message": "hi"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_MESSAGE");
    }

    #[tokio::test]
    async fn test_job_posting_form() {
        let (state, _, submissions) = recording_state();
        let (status, body) = post_json(
            state.clone(),
            "/job-posting",
            r#"{"email": "hr@example.com", "job_title": "Rust Engineer", "company": "Acme",
                "description": "Own the ingestion service.", "salary_range": "90k-110k"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(submissions.postings()[0].salary_range, "90k-110k");

        let (status, body) = post_json(
            state,
            "/job-posting.json",
            r#"{"email": "hr@example.com", "job_title": "R", "company": "Acme"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_TITLE");
    }
}
