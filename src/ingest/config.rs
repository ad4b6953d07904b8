// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::ServiceConfig;

pub const ENV_PATH: &str = "SERVICES_CONFIG_PATH";

/// Provider name -> services monitored through that provider.
pub type ServiceCatalog = BTreeMap<String, Vec<ServiceConfig>>;

/// Load the service catalogue from an explicit path. Supports TOML or JSON formats.
pub fn load_services_from(path: &Path) -> Result<ServiceCatalog> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading services from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_services(&content, ext.as_str())
}

/// Load the service catalogue using env var + fallbacks:
/// 1) $SERVICES_CONFIG_PATH
/// 2) config/services.toml
/// 3) config/services.json
pub fn load_services_default() -> Result<ServiceCatalog> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_services_from(&pb);
        } else {
            return Err(anyhow!("SERVICES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/services.toml");
    if toml_p.exists() {
        return load_services_from(&toml_p);
    }
    let json_p = PathBuf::from("config/services.json");
    if json_p.exists() {
        return load_services_from(&json_p);
    }
    Ok(ServiceCatalog::new())
}

fn parse_services(s: &str, hint_ext: &str) -> Result<ServiceCatalog> {
    match hint_ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        _ => parse_toml(s)
            .or_else(|_| parse_json(s))
            .map_err(|_| anyhow!("unsupported services format")),
    }
}

fn parse_toml(s: &str) -> Result<ServiceCatalog> {
    let v: ServiceCatalog = toml::from_str(s).context("parsing services toml")?;
    Ok(clean_catalog(v))
}

fn parse_json(s: &str) -> Result<ServiceCatalog> {
    let v: ServiceCatalog = serde_json::from_str(s).context("parsing services json")?;
    Ok(clean_catalog(v))
}

/// Trim keys/names, drop blank entries, keep the first service per key.
fn clean_catalog(catalog: ServiceCatalog) -> ServiceCatalog {
    catalog
        .into_iter()
        .map(|(provider, services)| {
            let mut seen = BTreeSet::new();
            let cleaned = services
                .into_iter()
                .filter_map(|mut s| {
                    s.key = s.key.trim().to_string();
                    s.name = s.name.trim().to_string();
                    if s.key.is_empty() || s.name.is_empty() || !seen.insert(s.key.clone()) {
                        return None;
                    }
                    Some(s)
                })
                .collect();
            (provider.trim().to_string(), cleaned)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn dedup_trim_and_formats_work() {
        let toml = r#"
[[aws]]
key = " ec2-us-east-1 "
name = "Amazon EC2 (N. Virginia)"
feed_url = "https://status.aws.amazon.com/rss/ec2-us-east-1.rss"

[[aws]]
key = "ec2-us-east-1"
name = "duplicate"

[[aws]]
key = ""
name = "blank"
"#;
        let out = parse_toml(toml).unwrap();
        let aws = &out["aws"];
        assert_eq!(aws.len(), 1);
        assert_eq!(aws[0].key, "ec2-us-east-1");
        assert_eq!(aws[0].name, "Amazon EC2 (N. Virginia)");

        let json = r#"{"slack": [{"key": "slack", "name": "Slack"}]}"#;
        let out = parse_json(json).unwrap();
        assert_eq!(out["slack"][0].name, "Slack");
        assert!(out["slack"][0].feed_url.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_PATH);

        // No files in the temp CWD -> empty catalogue
        let v = load_services_default().unwrap();
        assert!(v.is_empty());

        // Env wins
        let p_json = tmp.path().join("services.json");
        fs::write(&p_json, r#"{"slack": [{"key": "slack", "name": "Slack"}]}"#).unwrap();
        env::set_var(ENV_PATH, p_json.display().to_string());
        let v2 = load_services_default().unwrap();
        assert_eq!(v2["slack"].len(), 1);
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
