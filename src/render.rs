//! Article rendering.

use pulldown_cmark::{Options, Parser};
use serde_json::Value;

use crate::error::RenderError;

/// Template used for email bodies.
pub const MAIL_TEMPLATE: &str = "mail";

/// Renders a named template with a data map into HTML.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, data: &Value) -> Result<String, RenderError>;
}

/// Renders `article.body` as CommonMark (tables, strikethrough, task lists,
/// footnotes) into an HTML fragment.
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);
        Self { options }
    }

    fn markdown_to_html(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);
        let mut html = String::with_capacity(markdown.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, parser);
        html
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, template: &str, data: &Value) -> Result<String, RenderError> {
        if template != MAIL_TEMPLATE {
            return Err(RenderError::UnknownTemplate(template.to_string()));
        }
        let body = data
            .pointer("/article/body")
            .and_then(Value::as_str)
            .ok_or_else(|| RenderError::MissingData {
                template: template.to_string(),
                field: "article.body".into(),
            })?;

        Ok(format!(
            "<div class=\"markdown-body\">\n{}</div>\n",
            self.markdown_to_html(body)
        ))
    }
}
