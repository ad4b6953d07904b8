// src/ingest/validate.rs
use chrono::{DateTime, Utc};

use crate::ingest::types::Update;

/// Outcome of [`check_valid_update`]. `reason` is set exactly when `valid` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

pub fn check_valid_update(update: &Update) -> Validation {
    check_valid_update_at(update, Utc::now())
}

/// Checks run in a fixed order and the first failure wins, so the reason is deterministic.
pub fn check_valid_update_at(update: &Update, now: DateTime<Utc>) -> Validation {
    if !update.status.is_recognized() {
        return Validation::rejected(format!("Invalid status {}", update.status.as_str()));
    }
    if update.date > now {
        return Validation::rejected(format!(
            "Future date not supported, {}",
            update.date.to_rfc3339()
        ));
    }
    if is_blank(&update.service_key) {
        return Validation::rejected("Missing service key");
    }
    if is_blank(&update.service_name) {
        return Validation::rejected("Missing service name");
    }
    if is_blank(&update.link) {
        return Validation::rejected("Missing link to incident");
    }
    if is_blank(&update.title) {
        return Validation::rejected("Missing title");
    }
    if is_blank(&update.description) {
        return Validation::rejected("Missing description");
    }
    if update.incident_reference.is_unset() {
        return Validation::rejected("Incident reference is undefined");
    }
    Validation::ok()
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
