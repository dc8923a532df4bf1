//! Error types for md-mailer.

/// Top-level error type for a send.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Send aborted: {0}")]
    Send(#[from] SendError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while resolving what to send. All of them abort the send
/// before any attachment is created or any network call is made.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("No Markdown articles found in the workbench")]
    NoArticlesFound,

    #[error("Markdown article not found: {0}")]
    ArticleNotFound(String),

    #[error("No recipient found; pass --to, set `to` in the article or in the mail config")]
    NoRecipient,

    #[error("No sender found; set `from` or `account` in the mail config")]
    NoSender,

    #[error("Sending was cancelled by the user")]
    UserAborted,
}

/// Article store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Workbench not found: {0}")]
    WorkbenchNotFound(String),

    #[error("Invalid front matter in {path}: {reason}")]
    FrontMatter { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renderer errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid template data: {0}")]
    InvalidData(String),

    #[error("Template {template} is missing data: {field}")]
    MissingData { template: String, field: String },
}

/// Delivery failures. Propagated to the caller as-is and never retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid {field} address {value:?}: {reason}")]
    InvalidAddress {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read attachment {path}: {reason}")]
    Attachment { path: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Missing SMTP credentials: {0}")]
    Credentials(String),
}

/// Result type alias for md-mailer.
pub type Result<T> = std::result::Result<T, Error>;
