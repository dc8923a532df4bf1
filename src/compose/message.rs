//! The finished message handed to the transport.

use crate::compose::images::AttachmentRecord;

/// Promotional footer appended to every rendered body, before image
/// embedding. Contains no `<img>` tags.
pub const FOOTER: &str = r#"
<div class="product" style="background-color: rgba(204, 204, 204, 0.26);padding: 4px 10px; text-align: right; font-size: 12px;">
	Sent by
	<strong>md-mailer</strong>,
	converted automatically from Markdown
</div>
"#;

/// A fully composed email: one UTF-8 HTML body plus inline attachments.
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<AttachmentRecord>,
}

impl ComposedMessage {
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Append the footer to a rendered body.
pub fn with_footer(rendered: &str) -> String {
    format!("{rendered}{FOOTER}")
}

/// Combine resolved fields and the embedded body.
pub fn assemble(
    from: String,
    to: Vec<String>,
    subject: String,
    html_body: String,
    attachments: Vec<AttachmentRecord>,
) -> ComposedMessage {
    ComposedMessage {
        from,
        to,
        subject,
        html_body,
        attachments,
    }
}
