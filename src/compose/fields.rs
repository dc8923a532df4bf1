//! Precedence merge for the message header fields.
//!
//! Each field is resolved from an ordered list of optional sources; the first
//! present, non-empty source wins.
//!
//! | field     | sources, in order                                          |
//! |-----------|------------------------------------------------------------|
//! | `to`      | explicit → article `to` → config `to` (else `NoRecipient`) |
//! | `subject` | explicit → article `subject` → config `subject` → title    |
//! | `from`    | config `from` → config `account`                           |

use serde::Deserialize;
use tracing::debug;

use crate::article::{Article, TITLE_KEY};
use crate::config::MailConfig;
use crate::error::SendError;

/// A candidate value that can be "present but empty".
pub trait FieldValue {
    fn is_empty_value(&self) -> bool;
}

impl FieldValue for String {
    fn is_empty_value(&self) -> bool {
        self.trim().is_empty()
    }
}

impl FieldValue for &str {
    fn is_empty_value(&self) -> bool {
        self.trim().is_empty()
    }
}

impl FieldValue for Recipients {
    fn is_empty_value(&self) -> bool {
        match self {
            Recipients::One(addr) => addr.trim().is_empty(),
            Recipients::Many(list) => list.iter().all(|a| a.trim().is_empty()),
        }
    }
}

/// Return the first source that is present and non-empty.
pub fn first_present<T, I>(sources: I) -> Option<T>
where
    T: FieldValue,
    I: IntoIterator<Item = Option<T>>,
{
    sources
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty_value())
}

/// Recipient value as written in a source: one address or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    /// Build from repeated CLI values; empty input means "not given".
    pub fn from_args(args: Vec<String>) -> Option<Self> {
        match args.len() {
            0 => None,
            1 => args.into_iter().next().map(Recipients::One),
            _ => Some(Recipients::Many(args)),
        }
    }

    /// Normalize to an ordered list. A single string becomes a one-element
    /// list; a list passes through unchanged.
    pub fn into_list(self) -> Vec<String> {
        match self {
            Recipients::One(addr) => vec![addr],
            Recipients::Many(list) => list,
        }
    }
}

/// Resolve the `to` field.
pub fn resolve_recipients(
    explicit: Option<Recipients>,
    article: &Article,
    config: &MailConfig,
) -> Result<Vec<String>, SendError> {
    let from_article = article.meta("to").map(|to| Recipients::One(to.to_string()));
    let recipients = first_present([explicit, from_article, config.to.clone()])
        .ok_or(SendError::NoRecipient)?
        .into_list();
    debug!(?recipients, "Resolved recipients");
    Ok(recipients)
}

/// Resolve the subject template (before date macro expansion).
///
/// The article title is always present, so this never fails.
pub fn resolve_subject(explicit: Option<&str>, article: &Article, config: &MailConfig) -> String {
    first_present([
        explicit,
        article.meta("subject"),
        config.subject.as_deref(),
        article.meta(TITLE_KEY),
    ])
    .unwrap_or_default()
    .to_string()
}

/// Resolve the `from` field from the config alone.
pub fn resolve_sender(config: &MailConfig) -> Result<String, SendError> {
    first_present([config.from.as_deref(), config.account.as_deref()])
        .map(str::to_string)
        .ok_or(SendError::NoSender)
}
