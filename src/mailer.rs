//! The send pipeline.
//!
//! select article → resolve `from` / `to` / subject → expand date macros →
//! confirm → render → append footer → embed images → assemble → deliver.
//!
//! Everything before `deliver` is synchronous. Any error before delivery
//! aborts the send with no attachment read and no network I/O.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::article::{ArticleStore, select_article};
use crate::compose::date_macro::{self, Clock};
use crate::compose::fields::{self, Recipients};
use crate::compose::images::{ContentIdSource, ImageEmbedder};
use crate::compose::message::{self, ComposedMessage};
use crate::config::MailConfig;
use crate::confirm::{Confirm, SendSummary};
use crate::error::{RenderError, Result, SendError};
use crate::render::{MAIL_TEMPLATE, Renderer};
use crate::transport::Transport;

/// Collaborators the pipeline is built from.
pub struct MailerDeps {
    pub store: Arc<dyn ArticleStore>,
    pub renderer: Arc<dyn Renderer>,
    pub transport: Arc<dyn Transport>,
    pub confirm: Arc<dyn Confirm>,
    pub clock: Arc<dyn Clock>,
    pub content_ids: Arc<dyn ContentIdSource>,
}

/// One send invocation.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// Recipients given on the command line.
    pub to: Option<Recipients>,
    /// Workbench-relative path of the article; most recent when unset.
    pub md_file: Option<String>,
    pub subject: Option<String>,
    /// Skip the confirmation prompt.
    pub silent: bool,
}

/// Turns an article into an email and delivers it.
pub struct Mailer {
    config: MailConfig,
    workbench: PathBuf,
    deps: MailerDeps,
    embedder: ImageEmbedder,
}

impl Mailer {
    pub fn new(config: MailConfig, workbench: PathBuf, deps: MailerDeps) -> Self {
        Self {
            config,
            workbench,
            deps,
            embedder: ImageEmbedder::new(),
        }
    }

    /// Compose the message for `request` without delivering it.
    ///
    /// Returns the summary alongside the message so callers can report what
    /// was sent.
    pub fn compose(&self, request: SendRequest) -> Result<(SendSummary, ComposedMessage)> {
        let article = select_article(
            self.deps.store.as_ref(),
            &self.workbench,
            request.md_file.as_deref(),
        )?;
        let relative_path = article.relative_path(&self.workbench);
        debug!(article = %relative_path, "Selected article");

        let from = fields::resolve_sender(&self.config)?;
        let to = fields::resolve_recipients(request.to, article, &self.config)?;
        let subject_template =
            fields::resolve_subject(request.subject.as_deref(), article, &self.config);
        let subject = date_macro::expand(
            &subject_template,
            self.config.date_format(),
            self.deps.clock.today(),
        )?;

        let summary = SendSummary {
            subject: subject.clone(),
            article: relative_path,
            recipients: to.clone(),
        };
        if !request.silent && !self.deps.confirm.confirm(&summary) {
            return Err(SendError::UserAborted.into());
        }

        let article_data =
            serde_json::to_value(article).map_err(|e| RenderError::InvalidData(e.to_string()))?;
        let data = serde_json::json!({ "article": article_data });
        let rendered = self.deps.renderer.render(MAIL_TEMPLATE, &data)?;
        let body = message::with_footer(&rendered);

        let embedded = self.embedder.embed(
            &body,
            article.directory(),
            self.deps.content_ids.as_ref(),
        );
        debug!(
            attachments = embedded.attachments.len(),
            body_len = embedded.body.len(),
            "Embedded inline images"
        );

        let composed = message::assemble(from, to, subject, embedded.body, embedded.attachments);
        Ok((summary, composed))
    }

    /// Compose and deliver. Transport failures are returned unchanged.
    pub async fn send(&self, request: SendRequest) -> Result<SendSummary> {
        let (summary, composed) = self.compose(request)?;
        info!(
            subject = %summary.subject,
            article = %summary.article,
            recipients = ?summary.recipients,
            "Sending email"
        );
        self.deps.transport.deliver(composed).await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::Value;

    use super::*;
    use crate::article::tests::MemoryStore;
    use crate::compose::FixedClock;
    use crate::error::{ConfigError, Error, TransportError};

    struct EchoRenderer {
        calls: AtomicUsize,
    }

    impl Renderer for EchoRenderer {
        fn render(&self, _template: &str, data: &Value) -> std::result::Result<String, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = data.pointer("/article/body").and_then(Value::as_str).unwrap_or("");
            Ok(format!("<p>{body}</p><img src=\"./pic.png\">"))
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<ComposedMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn deliver(&self, message: ComposedMessage) -> std::result::Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Smtp("connection refused".into()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct Answer(bool, AtomicBool);

    impl Confirm for Answer {
        fn confirm(&self, _summary: &SendSummary) -> bool {
            self.1.store(true, Ordering::SeqCst);
            self.0
        }
    }

    struct StaticId;

    impl ContentIdSource for StaticId {
        fn next_id(&self, _path: &Path) -> String {
            "pic".into()
        }
    }

    struct Harness {
        mailer: Mailer,
        renderer: Arc<EchoRenderer>,
        transport: Arc<RecordingTransport>,
        confirm: Arc<Answer>,
    }

    fn harness(config_json: &str, articles: &[&str], answer: bool, fail: bool) -> Harness {
        let workbench = PathBuf::from("/w");
        let renderer = Arc::new(EchoRenderer {
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(RecordingTransport {
            fail,
            ..Default::default()
        });
        let confirm = Arc::new(Answer(answer, AtomicBool::new(false)));
        let deps = MailerDeps {
            store: Arc::new(MemoryStore::new(&workbench, articles)),
            renderer: renderer.clone(),
            transport: transport.clone(),
            confirm: confirm.clone(),
            clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())),
            content_ids: Arc::new(StaticId),
        };
        let config: MailConfig = serde_json::from_str(config_json).unwrap();
        Harness {
            mailer: Mailer::new(config, workbench, deps),
            renderer,
            transport,
            confirm,
        }
    }

    const CONFIG: &str = r#"{"account": "me@example.com", "to": "team@example.com",
                             "subject": "Notes $now"}"#;

    #[tokio::test]
    async fn sends_most_recent_article() {
        let h = harness(CONFIG, &["new.md", "old.md"], true, false);
        let summary = h.mailer.send(SendRequest::default()).await.unwrap();

        assert_eq!(summary.article, "new.md");
        assert_eq!(summary.subject, "Notes 2024-03-15");
        assert_eq!(summary.recipients, vec!["team@example.com"]);

        let sent = h.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let msg = &sent[0];
        assert_eq!(msg.from, "me@example.com");
        assert!(msg.html_body.contains("<img src=\"CID:pic\">"));
        assert!(msg.html_body.ends_with(message::FOOTER));
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].canonical_path, PathBuf::from("/w/pic.png"));
        assert!(h.confirm.1.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn explicit_values_win() {
        let h = harness(CONFIG, &["new.md", "notes/old.md"], true, false);
        let summary = h
            .mailer
            .send(SendRequest {
                to: Some(Recipients::One("boss@example.com".into())),
                md_file: Some("notes/old.md".into()),
                subject: Some("Since $last_week".into()),
                silent: true,
            })
            .await
            .unwrap();

        assert_eq!(summary.article, "notes/old.md");
        assert_eq!(summary.subject, "Since 2024-03-08");
        assert_eq!(summary.recipients, vec!["boss@example.com"]);
        assert!(!h.confirm.1.load(Ordering::SeqCst));

        let sent = h.transport.sent.lock().unwrap();
        assert_eq!(sent[0].attachments[0].canonical_path, PathBuf::from("/w/notes/pic.png"));
    }

    #[tokio::test]
    async fn no_recipient_aborts_before_rendering() {
        let h = harness(r#"{"account": "me@example.com"}"#, &["a.md"], true, false);
        let err = h.mailer.send(SendRequest::default()).await.unwrap_err();

        assert!(matches!(err, Error::Send(SendError::NoRecipient)));
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_article() {
        let h = harness(CONFIG, &["a.md"], true, false);
        let err = h
            .mailer
            .send(SendRequest {
                md_file: Some("b.md".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Send(SendError::ArticleNotFound(ref p)) if p == "b.md"));
    }

    #[tokio::test]
    async fn empty_workbench() {
        let h = harness(CONFIG, &[], true, false);
        let err = h.mailer.send(SendRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::Send(SendError::NoArticlesFound)));
    }

    #[tokio::test]
    async fn declined_confirmation_aborts() {
        let h = harness(CONFIG, &["a.md"], false, false);
        let err = h.mailer.send(SendRequest::default()).await.unwrap_err();

        assert!(matches!(err, Error::Send(SendError::UserAborted)));
        assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_propagated() {
        let h = harness(CONFIG, &["a.md"], true, true);
        let err = h.mailer.send(SendRequest::default()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Smtp(ref reason)) if reason == "connection refused"
        ));
    }

    #[tokio::test]
    async fn unrenderable_date_format_is_a_config_error() {
        let config = r#"{"account": "me@example.com", "to": "x@example.com",
                         "subject": "Plain", "format": "%Y-%m-%d %H:%M"}"#;
        let h = harness(config, &["a.md"], true, false);
        let err = h.mailer.send(SendRequest::default()).await.unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
        assert!(!h.confirm.1.load(Ordering::SeqCst));
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn subject_falls_back_to_title() {
        let config = r#"{"account": "me@example.com", "to": "x@example.com"}"#;
        let h = harness(config, &["a.md"], true, false);
        let (summary, _) = h.mailer.compose(SendRequest::default()).unwrap();
        // MemoryStore titles articles with their path.
        assert_eq!(summary.subject, "a.md");
    }
}
