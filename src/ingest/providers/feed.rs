// src/ingest/providers/feed.rs
//! RSS reader shared by the feed-based adapters.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::window::TimeWindow;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// One feed entry, description still in vendor HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_items(xml: &str) -> Result<Vec<FeedItem>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| FeedItem {
            title: it.title.unwrap_or_default(),
            link: it.link.unwrap_or_default(),
            description: it.description.unwrap_or_default(),
            published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
        })
        .collect())
}

/// Keep items published inside `window` (inclusive). Undated items are dropped.
pub fn in_window(items: Vec<FeedItem>, window: &TimeWindow) -> Vec<FeedItem> {
    items
        .into_iter()
        .filter(|it| it.published_at.is_some_and(|d| window.contains(d)))
        .collect()
}

/// Fetch and window a feed. Upstream failures are logged and yield no items.
pub async fn fetch_items(client: &reqwest::Client, url: &str, window: &TimeWindow) -> Vec<FeedItem> {
    let t0 = std::time::Instant::now();
    let items = match fetch_and_parse(client, url).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = ?e, feed = url, "error reading feed");
            counter!("ingest_provider_errors_total").increment(1);
            return Vec::new();
        }
    };
    let total = items.len();
    let recent = in_window(items, window);

    histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    tracing::debug!(feed = url, total, recent = recent.len(), "filtered recent feed items");
    recent
}

async fn fetch_and_parse(client: &reqwest::Client, url: &str) -> Result<Vec<FeedItem>> {
    tracing::debug!(feed = url, "fetching feed items");
    parse_items(&fetch_page(client, url).await?)
}

/// GET a page body, treating non-2xx as an error.
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String> {
    client
        .get(url)
        .send()
        .await
        .context("http get()")?
        .error_for_status()
        .context("non-2xx")?
        .text()
        .await
        .context("http .text()")
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
