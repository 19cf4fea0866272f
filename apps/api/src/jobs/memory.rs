use std::collections::BTreeSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::jobs::store::{stored_title_norm, title_fragment, JobStore};
use crate::models::{JobRow, NewJob};
use crate::search::JobFilter;

/// In-process job store. Evaluates the same predicate tree and ordering the
/// SQL store renders, so both return the same rows for a filter.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    rows: RwLock<Vec<JobRow>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: &[NewJob]) -> Self {
        let store = Self::new();
        store.insert_rows(jobs);
        store
    }

    /// Catalogue served when no database is configured.
    pub fn demo() -> Self {
        Self::with_jobs(&demo_jobs())
    }

    fn insert_rows(&self, jobs: &[NewJob]) -> u64 {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let mut inserted = 0;
        for job in jobs {
            let link = job.link.trim();
            if rows.iter().any(|r| r.link.as_deref() == Some(link)) {
                continue;
            }
            let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            rows.push(JobRow {
                id,
                job_title: Some(job.job_title.trim().to_string()),
                job_title_norm: Some(stored_title_norm(job)),
                company_name: Some(job.company_name.trim().to_string()),
                job_description: Some(job.job_description.clone()),
                location: Some(job.location.trim().to_string()),
                city: Some(job.city.trim().to_string()),
                region: Some(job.region.trim().to_string()),
                country: Some(job.country.trim().to_string()),
                link: Some(link.to_string()),
                salary: Some(job.salary.trim().to_string()),
                date: Some(job.date.trim().to_string()),
            });
            inserted += 1;
        }
        inserted
    }

    fn matching(&self, filter: &JobFilter) -> Vec<JobRow> {
        let predicate = filter.predicate();
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        rows.iter().filter(|r| predicate.matches(*r)).cloned().collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn count(&self, filter: &JobFilter) -> Result<i64, StoreError> {
        Ok(self.matching(filter).len() as i64)
    }

    async fn search(
        &self,
        filter: &JobFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRow>, StoreError> {
        let order = filter.order();
        let mut rows = self.matching(filter);
        rows.sort_by(|a, b| order.compare(a, b));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn insert_many(&self, jobs: &[NewJob]) -> Result<u64, StoreError> {
        Ok(self.insert_rows(jobs))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<JobRow>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(rows.iter().find(|r| r.id == id).cloned())
    }

    async fn get_link(&self, id: i64) -> Result<Option<String>, StoreError> {
        Ok(self.get_by_id(id).await?.and_then(|r| r.link))
    }

    async fn title_suggestions(
        &self,
        fragment: &str,
        limit: i64,
    ) -> Result<Vec<String>, StoreError> {
        let predicate = title_fragment(fragment);
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let titles: BTreeSet<String> = rows
            .iter()
            .filter(|r| predicate.matches(*r))
            .filter_map(|r| r.job_title.clone())
            .collect();
        Ok(titles.into_iter().take(limit.max(0) as usize).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn demo_job(title: &str, company: &str, location: &str, city: &str, country: &str, date: &str, description: &str) -> NewJob {
    NewJob {
        job_title: title.to_string(),
        company_name: company.to_string(),
        job_description: description.to_string(),
        location: location.to_string(),
        city: city.to_string(),
        country: country.to_string(),
        link: format!("https://jobs.example.org/{}", title.to_lowercase().replace(' ', "-")),
        date: date.to_string(),
        ..Default::default()
    }
}

pub fn demo_jobs() -> Vec<NewJob> {
    vec![
        demo_job(
            "Senior Software Engineer (AI)",
            "Catalitium",
            "Remote / EU",
            "",
            "",
            "2025-10-01",
            "Own end-to-end features across ingestion, ranking, and AI-assisted matching.",
        ),
        demo_job(
            "Data Engineer",
            "Catalitium",
            "London, UK",
            "London",
            "UK",
            "2025-09-28",
            "Build reliable pipelines and optimize warehouse performance.",
        ),
        demo_job(
            "Product Manager",
            "Stealth",
            "Zurich, CH",
            "Zurich",
            "CH",
            "2025-09-27",
            "Partner with design and engineering to deliver user value quickly.",
        ),
        demo_job(
            "Frontend Developer",
            "Acme Corp",
            "Barcelona, ES",
            "Barcelona",
            "ES",
            "2025-09-26",
            "Ship delightful UI with strong accessibility.",
        ),
        demo_job(
            "Cloud DevOps Engineer",
            "Nimbus",
            "Remote / Europe",
            "",
            "",
            "2025-09-25",
            "Automate infrastructure, observability, and release workflows.",
        ),
        demo_job(
            "ML Engineer",
            "Quantix",
            "Remote",
            "",
            "",
            "2025-09-24",
            "Deploy ranking and semantic matching at scale.",
        ),
        demo_job(
            "Staff Backend Engineer",
            "Fjord",
            "Berlin, DE",
            "Berlin",
            "DE",
            "2025-09-20",
            "Design the services behind search and salary insights.",
        ),
        demo_job(
            "Platform Engineer",
            "Bayline",
            "San Francisco, US",
            "San Francisco",
            "US",
            "2025-09-18",
            "Run the Kubernetes platform that hosts every product team.",
        ),
        demo_job(
            "Backend Developer",
            "Chai Labs",
            "Bengaluru, IN",
            "Bengaluru",
            "IN",
            "2025-09-15",
            "Build payment APIs used by millions of merchants.",
        ),
    ]
}
