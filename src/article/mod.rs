//! Articles and article selection.

pub mod store;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::SendError;

pub use store::FsArticleStore;

/// Metadata key that every article carries.
pub const TITLE_KEY: &str = "title";

/// A Markdown article as loaded by the store.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub file_path: PathBuf,
    /// Front matter values; always includes `title`.
    pub metadata: HashMap<String, String>,
    /// Markdown source, front matter stripped.
    pub body: String,
}

impl Article {
    /// A non-blank metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Directory image references are resolved against.
    pub fn directory(&self) -> &Path {
        self.file_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Path relative to `workbench`, `/`-separated. Articles outside the
    /// workbench keep their full path.
    pub fn relative_path(&self, workbench: &Path) -> String {
        match self.file_path.strip_prefix(workbench) {
            Ok(rel) => rel
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => self.file_path.to_string_lossy().to_string(),
        }
    }
}

/// Read-only access to the indexed articles.
pub trait ArticleStore: Send + Sync {
    /// Article keys, most recent first.
    fn children(&self) -> &[String];

    fn article(&self, key: &str) -> Option<&Article>;
}

/// Pick the article to send.
///
/// Without a request, the most recent article is returned. With one, the
/// index is walked in recency order and the first article whose
/// workbench-relative path equals `requested` exactly wins.
pub fn select_article<'a>(
    store: &'a dyn ArticleStore,
    workbench: &Path,
    requested: Option<&str>,
) -> Result<&'a Article, SendError> {
    let keys = store.children();
    if keys.is_empty() {
        return Err(SendError::NoArticlesFound);
    }

    let Some(requested) = requested else {
        return store.article(&keys[0]).ok_or(SendError::NoArticlesFound);
    };

    keys.iter()
        .filter_map(|key| store.article(key))
        .find(|article| article.relative_path(workbench) == requested)
        .ok_or_else(|| SendError::ArticleNotFound(requested.to_string()))
}
