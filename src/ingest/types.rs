// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ingest::window::TimeWindow;

/// Lifecycle of an incident as reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UpdateStatus {
    Active,
    Resolved,
    /// Anything an adapter emitted that we do not understand; rejected by validation.
    Unrecognized(String),
}

impl UpdateStatus {
    pub fn as_str(&self) -> &str {
        match self {
            UpdateStatus::Active => "active",
            UpdateStatus::Resolved => "resolved",
            UpdateStatus::Unrecognized(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, UpdateStatus::Unrecognized(_))
    }
}

impl From<String> for UpdateStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => UpdateStatus::Active,
            "resolved" => UpdateStatus::Resolved,
            _ => UpdateStatus::Unrecognized(s),
        }
    }
}

impl From<&str> for UpdateStatus {
    fn from(s: &str) -> Self {
        UpdateStatus::from(s.to_string())
    }
}

impl From<UpdateStatus> for String {
    fn from(s: UpdateStatus) -> Self {
        s.as_str().to_string()
    }
}

/// Upstream incident id.
///
/// `Unset` means the adapter never filled the field (a bug), `Absent` means the
/// source has no such id. Only `Unset` is skipped on serialization; `Absent`
/// serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum IncidentReference {
    #[default]
    Unset,
    Absent,
    Known(String),
}

impl IncidentReference {
    pub fn is_unset(&self) -> bool {
        matches!(self, IncidentReference::Unset)
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            IncidentReference::Known(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Option<String>> for IncidentReference {
    fn from(v: Option<String>) -> Self {
        match v {
            Some(s) => IncidentReference::Known(s),
            None => IncidentReference::Absent,
        }
    }
}

impl Serialize for IncidentReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            IncidentReference::Known(s) => serializer.serialize_some(s),
            IncidentReference::Unset | IncidentReference::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for IncidentReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<String>::deserialize(deserializer).map(IncidentReference::from)
    }
}

/// Normalized incident update, as produced by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub title: String,
    /// Plain text, vendor markup stripped.
    pub description: String,
    pub link: String,
    pub date: DateTime<Utc>,
    pub service_key: String,
    pub service_name: String,
    pub status: UpdateStatus,
    #[serde(default, skip_serializing_if = "IncidentReference::is_unset")]
    pub incident_reference: IncidentReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<String>,
}

/// Named, schedulable unit binding a job identity to a provider and its fetch parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionDescriptor {
    /// Stable across restarts; the scheduler registers recurring jobs under it.
    pub name: String,
    pub provider_name: String,
    pub data: serde_json::Value,
}

/// One monitored service, as configured in the service catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Vendor-side identifier when it differs from `key`.
    #[serde(default)]
    pub service_key: Option<String>,
    /// Tenant domain for providers that scope their feed per customer.
    #[serde(default)]
    pub domain: Option<String>,
}

#[async_trait::async_trait]
pub trait StatusProvider: Send + Sync {
    /// Group configured services into independently schedulable descriptors.
    /// Must yield stable names and nothing at all for an empty service list.
    fn build_ingestions(&self, services: &[ServiceConfig]) -> Vec<IngestionDescriptor>;

    /// Fetch updates dated inside `window` (inclusive on both ends).
    ///
    /// Upstream unavailability yields `Ok(vec![])`; `Err` is reserved for
    /// unexpected failures such as undecodable descriptor data.
    async fn fetch_recent_updates(
        &self,
        data: &serde_json::Value,
        window: &TimeWindow,
    ) -> Result<Vec<Update>>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Update {
        Update {
            title: "Degraded API".into(),
            description: "Investigating".into(),
            link: "https://status.example.test/incidents/1".into(),
            date: Utc.with_ymd_and_hms(2020, 10, 10, 10, 12, 0).unwrap(),
            service_key: "example".into(),
            service_name: "Example".into(),
            status: UpdateStatus::Active,
            incident_reference: IncidentReference::Absent,
            components: None,
        }
    }

    #[test]
    fn status_roundtrips_through_strings() {
        assert_eq!(UpdateStatus::from("resolved"), UpdateStatus::Resolved);
        assert_eq!(
            UpdateStatus::from("NOT_VALID"),
            UpdateStatus::Unrecognized("NOT_VALID".into())
        );
        assert_eq!(String::from(UpdateStatus::Active), "active");
    }

    #[test]
    fn absent_reference_serializes_as_null_and_unset_is_skipped() {
        let v = serde_json::to_value(sample()).unwrap();
        assert!(v["incidentReference"].is_null());
        assert!(v.as_object().unwrap().contains_key("incidentReference"));

        let mut unset = sample();
        unset.incident_reference = IncidentReference::Unset;
        let v = serde_json::to_value(unset).unwrap();
        assert!(!v.as_object().unwrap().contains_key("incidentReference"));
    }

    #[test]
    fn missing_reference_deserializes_as_unset() {
        let mut v = serde_json::to_value(sample()).unwrap();
        v.as_object_mut().unwrap().remove("incidentReference");
        let u: Update = serde_json::from_value(v).unwrap();
        assert!(u.incident_reference.is_unset());

        let v = serde_json::to_value(sample()).unwrap();
        let u: Update = serde_json::from_value(v).unwrap();
        assert_eq!(u.incident_reference, IncidentReference::Absent);
    }
}
