//! Forms posted by the browser: newsletter sign-ups, contact messages and job
//! posting requests.

pub mod handlers;
pub mod store;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::AppError;

pub use store::{MemorySubmissionStore, SqlSubmissionStore, SubmissionStore, SubscribeStatus};

pub const MAX_DESCRIPTION_WORDS: usize = 5000;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SubscribeRequest {
    #[validate(email)]
    pub email: String,
    pub job_id: Option<Value>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
#[serde(default)]
pub struct ContactRequest {
    #[validate(email)]
    pub email: String,
    #[serde(alias = "name_company", alias = "company")]
    #[validate(length(min = 2))]
    pub name: String,
    #[validate(length(min = 5))]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
#[serde(default)]
pub struct JobPostingRequest {
    #[serde(alias = "email")]
    #[validate(email)]
    pub contact_email: String,
    #[validate(length(min = 2))]
    pub job_title: String,
    #[validate(length(min = 2))]
    pub company: String,
    #[validate(length(min = 10), custom(function = "within_word_limit"))]
    pub description: String,
    pub salary_range: String,
}

impl SubscribeRequest {
    pub fn checked(mut self) -> Result<Self, AppError> {
        self.email = normalize_email(&self.email);
        self.validate()
            .map_err(|errors| rejection(&errors, &[("email", "INVALID_EMAIL")]))?;
        Ok(self)
    }
}

impl ContactRequest {
    pub fn checked(mut self) -> Result<Self, AppError> {
        self.email = normalize_email(&self.email);
        self.name = self.name.trim().to_string();
        self.message = self.message.trim().to_string();
        self.validate().map_err(|errors| {
            rejection(
                &errors,
                &[
                    ("email", "INVALID_EMAIL"),
                    ("name", "INVALID_NAME"),
                    ("message", "INVALID_MESSAGE"),
                ],
            )
        })?;
        Ok(self)
    }
}

impl JobPostingRequest {
    pub fn checked(mut self) -> Result<Self, AppError> {
        self.contact_email = normalize_email(&self.contact_email);
        self.job_title = self.job_title.trim().to_string();
        self.company = self.company.trim().to_string();
        self.description = self.description.trim().to_string();
        self.salary_range = self.salary_range.trim().to_string();
        self.validate().map_err(|errors| {
            rejection(
                &errors,
                &[
                    ("contact_email", "INVALID_EMAIL"),
                    ("job_title", "INVALID_TITLE"),
                    ("company", "INVALID_COMPANY"),
                    ("description", "INVALID_DESCRIPTION"),
                ],
            )
        })?;
        Ok(self)
    }
}

/// Trimmed, with the domain lowercased. The local part keeps its case.
pub fn normalize_email(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => trimmed.to_string(),
    }
}

pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

fn within_word_limit(description: &str) -> Result<(), ValidationError> {
    if word_count(description) > MAX_DESCRIPTION_WORDS {
        return Err(ValidationError::new("DESCRIPTION_TOO_LONG"));
    }
    Ok(())
}

/// The first failing field in form order. Field errors map to `fields`' code
/// unless the validator set an explicit uppercase code.
fn rejection(errors: &ValidationErrors, fields: &[(&str, &'static str)]) -> AppError {
    let field_errors = errors.field_errors();
    for (field, code) in fields {
        let Some((_, failures)) = field_errors.iter().find(|(key, _)| **key == *field) else {
            continue;
        };
        let code = match failures.first() {
            Some(failure) if failure.code == "DESCRIPTION_TOO_LONG" => "DESCRIPTION_TOO_LONG",
            _ => code,
        };
        return AppError::Validation {
            code,
            message: rejection_message(code).to_string(),
        };
    }
    AppError::Validation {
        code: "INVALID_REQUEST",
        message: "The request is invalid".to_string(),
    }
}

fn rejection_message(code: &str) -> &'static str {
    match code {
        "INVALID_EMAIL" => "Please enter a valid email.",
        "INVALID_NAME" => "Please add your name or company.",
        "INVALID_MESSAGE" => "Please add a short message.",
        "INVALID_TITLE" => "Please add a job title.",
        "INVALID_COMPANY" => "Please add a company name.",
        "INVALID_DESCRIPTION" => "Please add a short description.",
        "DESCRIPTION_TOO_LONG" => "Description is too long (max ~5000 words).",
        _ => "The request is invalid",
    }
}
