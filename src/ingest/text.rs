// src/ingest/text.rs
//! Small HTML-to-text helpers shared by the feed adapters.

use once_cell::sync::OnceCell;
use regex::Regex;

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_first_p() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>").unwrap())
}

/// Strip tags, decode entities, collapse whitespace.
pub fn plain_text(html: &str) -> String {
    let no_tags = re_tags().replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    re_ws().replace_all(&decoded, " ").trim().to_string()
}

/// Text of the first `<p>` element; the whole fragment when there is none.
pub fn first_paragraph(html: &str) -> String {
    match re_first_p().captures(html).and_then(|c| c.get(1)) {
        Some(m) => plain_text(m.as_str()),
        None => plain_text(html),
    }
}

/// Remove every `<tag>...</tag>` element, content included.
pub fn remove_elements(html: &str, tag: &str) -> String {
    let tag = regex::escape(tag);
    match Regex::new(&format!(r"(?is)<{tag}(?:\s[^>]*)?>.*?</{tag}\s*>")) {
        Ok(re) => re.replace_all(html, "").into_owned(),
        Err(_) => html.to_string(),
    }
}
