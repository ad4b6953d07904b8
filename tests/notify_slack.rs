use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use status_feed::notify::message::{Block, SlackMessage, TextObject, COLOR_SUCCESS, COLOR_WARNING};
use status_feed::notify::slack::{SlackError, SlackNotifier, SlackTransport};
use status_feed::{IncidentReference, Notifier, Update, UpdateStatus};

const URL: &str = "https://hooks.slack.test/services/T000/B000/XXX";

enum Reply {
    Ok,
    Status(u16),
    Opaque,
}

/// Replays scripted replies in order; once the script runs out every post succeeds.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    posts: Mutex<Vec<(String, SlackMessage)>>,
}

impl ScriptedTransport {
    fn with(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            posts: Mutex::default(),
        })
    }

    fn attempts(&self) -> usize {
        self.posts.lock().len()
    }
}

#[async_trait::async_trait]
impl SlackTransport for ScriptedTransport {
    async fn post(&self, url: &str, message: &SlackMessage) -> Result<(), SlackError> {
        self.posts.lock().push((url.to_string(), message.clone()));
        match self.replies.lock().pop_front().unwrap_or(Reply::Ok) {
            Reply::Ok => Ok(()),
            Reply::Status(status) => Err(SlackError::Http { status }),
            Reply::Opaque => Err(SlackError::Other(anyhow!("ERROR"))),
        }
    }
}

fn update() -> Update {
    Update {
        title: "Elevated API errors".into(),
        description: "<p>We are investigating.</p>".into(),
        link: "https://status.example.test/incidents/42".into(),
        date: Utc.with_ymd_and_hms(2020, 10, 10, 10, 12, 0).unwrap(),
        service_key: "example".into(),
        service_name: "Example".into(),
        status: UpdateStatus::Active,
        incident_reference: IncidentReference::Known("42".into()),
        components: Some("API, Dashboard".into()),
    }
}

fn notifier(transport: Arc<ScriptedTransport>) -> SlackNotifier {
    SlackNotifier::new(Some(URL.to_string()))
        .with_transport(transport)
        .with_retries(3, Duration::from_millis(50))
}

#[tokio::test(start_paused = true)]
async fn bad_request_is_retried_until_attempts_run_out() {
    let t = ScriptedTransport::with(vec![Reply::Status(400), Reply::Status(400), Reply::Status(400)]);
    let n = notifier(t.clone());
    let msg = n.build_message(&update()).unwrap();

    let err = n.send_to_webhook(URL, &msg).await.unwrap_err();
    assert!(matches!(err, SlackError::Http { status: 400 }));
    assert_eq!(t.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_retried() {
    let t = ScriptedTransport::with(vec![Reply::Status(500), Reply::Status(503), Reply::Status(502)]);
    let n = notifier(t.clone());
    let msg = n.build_message(&update()).unwrap();

    let err = n.send_to_webhook(URL, &msg).await.unwrap_err();
    assert!(matches!(err, SlackError::Http { status: 502 }));
    assert_eq!(t.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_then_success() {
    let t = ScriptedTransport::with(vec![Reply::Status(500)]);
    let n = notifier(t.clone());
    let msg = n.build_message(&update()).unwrap();

    n.send_to_webhook(URL, &msg).await.unwrap();
    assert_eq!(t.attempts(), 2);
}

#[tokio::test]
async fn revoked_webhook_fails_without_retry() {
    for status in [403, 404, 410] {
        let t = ScriptedTransport::with(vec![Reply::Status(status)]);
        let n = notifier(t.clone());
        let msg = n.build_message(&update()).unwrap();

        let err = n.send_to_webhook(URL, &msg).await.unwrap_err();
        assert!(
            matches!(err, SlackError::InvalidWebhook { status: s } if s == status),
            "status {status}"
        );
        assert_eq!(t.attempts(), 1);
    }
}

#[tokio::test]
async fn other_statuses_fail_at_once() {
    let t = ScriptedTransport::with(vec![Reply::Status(418)]);
    let n = notifier(t.clone());
    let msg = n.build_message(&update()).unwrap();

    let err = n.send_to_webhook(URL, &msg).await.unwrap_err();
    assert!(matches!(err, SlackError::Http { status: 418 }));
    assert_eq!(t.attempts(), 1);
}

#[tokio::test]
async fn errors_without_status_pass_through_unchanged() {
    let t = ScriptedTransport::with(vec![Reply::Opaque]);
    let n = notifier(t.clone());
    let msg = n.build_message(&update()).unwrap();

    let err = n.send_to_webhook(URL, &msg).await.unwrap_err();
    assert!(matches!(err, SlackError::Other(_)));
    assert_eq!(err.to_string(), "ERROR");
    assert_eq!(t.attempts(), 1);
}

#[tokio::test]
async fn send_posts_rendered_update_once() {
    let t = ScriptedTransport::with(Vec::new());
    let n = notifier(t.clone());

    n.send(&update()).await.unwrap();

    let posts = t.posts.lock();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, URL);
    assert_eq!(posts[0].1.text.as_deref(), Some("Example: Elevated API errors"));
}

#[tokio::test]
async fn missing_webhook_url_sends_nothing() {
    let t = ScriptedTransport::with(Vec::new());
    let n = SlackNotifier::new(None).with_transport(t.clone());

    n.send(&update()).await.unwrap();
    assert_eq!(t.attempts(), 0);
}

#[test]
fn active_update_renders_warning_with_components() {
    let n = SlackNotifier::new(None);
    let msg = n.build_message(&update()).unwrap();

    assert_eq!(
        msg.blocks,
        vec![Block::Section {
            text: TextObject::Mrkdwn {
                text: "*<https://status.example.test/incidents/42|Elevated API errors>*".into()
            },
            accessory: None,
        }]
    );
    let attachment = &msg.attachments[0];
    assert_eq!(attachment.color.as_deref(), Some(COLOR_WARNING));
    assert_eq!(attachment.fallback.as_deref(), Some("Example: Elevated API errors"));
    assert_eq!(attachment.blocks.len(), 2);
    assert_eq!(
        attachment.blocks[1],
        Block::Context {
            elements: vec![TextObject::PlainText {
                text: "Components affected: API, Dashboard".into(),
                emoji: false,
            }]
        }
    );
}

#[test]
fn resolved_update_without_components_is_green_and_has_no_context() {
    let mut u = update();
    u.status = UpdateStatus::Resolved;
    u.components = None;
    let msg = SlackNotifier::new(None).build_message(&u).unwrap();

    let attachment = &msg.attachments[0];
    assert_eq!(attachment.color.as_deref(), Some(COLOR_SUCCESS));
    assert_eq!(attachment.blocks.len(), 1);
    assert!(!attachment
        .blocks
        .iter()
        .any(|b| matches!(b, Block::Context { .. })));
}

#[test]
fn icon_is_attached_to_body_section() {
    let msg = SlackNotifier::new(None)
        .with_icon(Some("https://cdn.example.test/icon.png".into()))
        .build_message(&update())
        .unwrap();

    let json = serde_json::to_value(&msg).unwrap();
    let body = &json["attachments"][0]["blocks"][0];
    assert_eq!(body["accessory"]["type"], "image");
    assert_eq!(body["accessory"]["image_url"], "https://cdn.example.test/icon.png");
    assert_eq!(body["accessory"]["alt_text"], "Example");
}

#[test]
fn svg_icon_is_rejected() {
    let err = SlackNotifier::new(None)
        .with_icon(Some("https://cdn.example.test/icon.SVG".into()))
        .build_message(&update())
        .unwrap_err();
    assert!(matches!(err, SlackError::UnsupportedIcon(_)));
}
