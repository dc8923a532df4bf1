//! md-mailer — send a Markdown article as an HTML email with inline images.

pub mod article;
pub mod compose;
pub mod config;
pub mod confirm;
pub mod error;
pub mod mailer;
pub mod render;
pub mod transport;
