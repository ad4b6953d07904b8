// tests/ingest_config.rs
use status_feed::ingest::config::load_services_from;
use status_feed::ProviderRegistry;
use std::fs;
use std::path::Path;

#[test]
fn shipped_catalogue_builds_one_job_per_feed() {
    let catalog = load_services_from(Path::new("config/services.toml")).unwrap();
    let registry = ProviderRegistry::with_default_providers(reqwest::Client::new());

    let mut names: Vec<String> = registry
        .build_ingestions(&catalog)
        .into_iter()
        .map(|d| d.name)
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "auth0-eu@auth0",
            "bitbucket@statuspage",
            "docker@statusio",
            "ec2-us-east-1@aws",
            "github@statuspage",
            "gsuite",
            "https://status.cloud.google.com/@google-cloud",
            "paypal-checkout@paypal",
            "slack@slack",
        ]
    );
}

#[test]
fn descriptor_names_are_stable_across_loads() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("services.json");
    fs::write(
        &p,
        r#"{
  "statuspage": [
    {"key": " github ", "name": "GitHub", "feed_url": "https://www.githubstatus.com/history.rss"},
    {"key": "nofeed", "name": "No Feed"}
  ],
  "unknown-provider": [{"key": "x", "name": "X"}]
}"#,
    )
    .unwrap();

    let registry = ProviderRegistry::with_default_providers(reqwest::Client::new());
    let first = registry.build_ingestions(&load_services_from(&p).unwrap());
    let second = registry.build_ingestions(&load_services_from(&p).unwrap());

    assert_eq!(first, second);
    assert_eq!(first.len(), 1, "services without a feed and unknown providers yield nothing");
    assert_eq!(first[0].name, "github@statuspage");
    assert_eq!(first[0].provider_name, "statuspage");
    assert_eq!(
        first[0].data["feedUrl"],
        "https://www.githubstatus.com/history.rss"
    );
}

#[test]
fn empty_catalogue_schedules_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("services.toml");
    fs::write(&p, "").unwrap();

    let registry = ProviderRegistry::with_default_providers(reqwest::Client::new());
    assert!(registry.build_ingestions(&load_services_from(&p).unwrap()).is_empty());
}
