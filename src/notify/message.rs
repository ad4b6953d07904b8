// src/notify/message.rs
//! Slack Block Kit message assembly.
//!
//! Blocks are emitted in call order; callers use summary, title, color, body,
//! context, actions.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use super::slack::SlackError;

pub const TEXT_MAX_LENGTH: usize = 3000;
pub const TRUNCATED: &str = "...\n\nTHIS MESSAGE HAS BEEN TRUNCATED. VISIT SOURCE FOR FULL DETAILS.";
const UNSUPPORTED_ICON_EXTENSIONS: [&str; 1] = [".svg"];

pub const COLOR_SUCCESS: &str = "#36a64f";
pub const COLOR_WARNING: &str = "#ffa700";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
    #[serde(rename = "plain_text")]
    PlainText { text: String, emoji: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    Image { image_url: String, alt_text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Button {
        action_id: String,
        text: TextObject,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    Context {
        elements: Vec<TextObject>,
    },
    Actions {
        elements: Vec<Element>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
    pub attachments: Vec<Attachment>,
}

/// Button shown in the trailing actions block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub id: String,
    pub label: String,
    pub value: String,
}

/// Consuming builder; every step returns the extended message.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct MessageBuilder {
    text: Option<String>,
    blocks: Vec<Block>,
    attachment: Attachment,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain text shown in push notifications.
    pub fn notification_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn title(mut self, title: &str, link: &str) -> Self {
        self.blocks.push(Block::Section {
            text: TextObject::Mrkdwn {
                text: format!("*<{link}|{title}>*"),
            },
            accessory: None,
        });
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.attachment.color = Some(color.to_string());
        self
    }

    pub fn fallback(mut self, fallback: impl Into<String>) -> Self {
        self.attachment.fallback = Some(fallback.into());
        self
    }

    /// Body section with an image accessory. Fails on icons Slack cannot render.
    pub fn image_section(mut self, text: &str, image_url: &str, alt_text: &str) -> Result<Self, SlackError> {
        let image_url = safe_icon(image_url)?;
        self.attachment.blocks.push(Block::Section {
            text: TextObject::Mrkdwn {
                text: safe_text(text),
            },
            accessory: Some(Accessory::Image {
                image_url: image_url.to_string(),
                alt_text: alt_text.to_string(),
            }),
        });
        Ok(self)
    }

    pub fn text_section(mut self, text: &str) -> Self {
        self.attachment.blocks.push(Block::Section {
            text: TextObject::Mrkdwn {
                text: safe_text(text),
            },
            accessory: None,
        });
        self
    }

    /// Footnote block; skipped entirely when there is no text.
    pub fn context(mut self, text: Option<&str>) -> Self {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return self;
        };
        self.attachment.blocks.push(Block::Context {
            elements: vec![TextObject::PlainText {
                text: safe_text(text),
                emoji: false,
            }],
        });
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.attachment.blocks.push(Block::Actions {
            elements: vec![Element::Button {
                action_id: action.id,
                text: TextObject::PlainText {
                    text: action.label,
                    emoji: false,
                },
                value: action.value,
            }],
        });
        self
    }

    pub fn build(self) -> SlackMessage {
        SlackMessage {
            text: self.text,
            blocks: self.blocks,
            attachments: vec![self.attachment],
        }
    }
}

fn re_breaks() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|<p(?:\s[^>]*)?>|</p\s*>").unwrap())
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)</?[A-Za-z!][^>]*>").unwrap())
}

/// HTML reduced to text: breaks and paragraphs become newlines, other tags go.
pub fn strip_html(text: &str) -> String {
    let with_breaks = re_breaks().replace_all(text, "\n");
    re_tags().replace_all(&with_breaks, "").into_owned()
}

/// Cap at [`TEXT_MAX_LENGTH`] characters, marker included.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= TEXT_MAX_LENGTH {
        return text.to_string();
    }
    let keep = TEXT_MAX_LENGTH - TRUNCATED.chars().count();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATED);
    out
}

pub fn safe_text(text: &str) -> String {
    truncate(&strip_html(text))
}

fn safe_icon(icon: &str) -> Result<&str, SlackError> {
    let lower = icon.to_ascii_lowercase();
    if UNSUPPORTED_ICON_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(SlackError::UnsupportedIcon(icon.to_string()));
    }
    Ok(icon)
}
