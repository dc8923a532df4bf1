//! File-backed article store.
//!
//! Scans a workbench directory recursively for `.md` files and indexes them
//! most recently modified first. An optional YAML front-matter block
//! supplies metadata; list values are joined with `", "`:
//!
//! ```text
//! ---
//! title: Weekly report
//! to:
//!   - team@example.com
//!   - boss@example.com
//! subject: Report $now
//! ---
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_yaml::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::article::{Article, ArticleStore, TITLE_KEY};
use crate::error::StoreError;

const FRONT_MATTER_FENCE: &str = "---";

/// Articles found under a workbench directory.
pub struct FsArticleStore {
    keys: Vec<String>,
    articles: HashMap<String, Article>,
}

impl FsArticleStore {
    /// Scan `base_path` and index every Markdown file below it.
    pub async fn scan(base_path: PathBuf) -> Result<Self, StoreError> {
        if !base_path.is_dir() {
            return Err(StoreError::WorkbenchNotFound(
                base_path.display().to_string(),
            ));
        }

        let mut found = Vec::new();
        scan_dir(&base_path, &base_path, &mut found).await?;

        // Newest first; ties broken by path for a stable order.
        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut keys = Vec::with_capacity(found.len());
        let mut articles = HashMap::with_capacity(found.len());
        for (_, key, article) in found {
            keys.push(key.clone());
            articles.insert(key, article);
        }

        info!(
            workbench = %base_path.display(),
            articles = keys.len(),
            "Scanned workbench"
        );
        Ok(Self { keys, articles })
    }
}

impl ArticleStore for FsArticleStore {
    fn children(&self) -> &[String] {
        &self.keys
    }

    fn article(&self, key: &str) -> Option<&Article> {
        self.articles.get(key)
    }
}

type Found = (SystemTime, String, Article);

/// Recursively collect Markdown files.
fn scan_dir<'a>(
    base: &'a Path,
    dir: &'a Path,
    found: &'a mut Vec<Found>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), StoreError>> + Send + 'a>> {
    Box::pin(async move {
        let mut read_dir = fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;

            if metadata.is_dir() {
                let name = entry.file_name();
                let name_str = name.to_string_lossy();
                // Skip hidden dirs and common noise
                if !name_str.starts_with('.') && name_str != "node_modules" && name_str != "target" {
                    scan_dir(base, &path, found).await?;
                }
            } else if metadata.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("md")
            {
                let content = match fs::read_to_string(&path).await {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(path = %path.display(), "Skipping unreadable article: {e}");
                        continue;
                    }
                };
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                let article = match parse_article(path.clone(), &content) {
                    Ok(article) => article,
                    Err(e) => {
                        warn!("Skipping article: {e}");
                        continue;
                    }
                };
                let key = article.relative_path(base);
                found.push((modified, key, article));
            }
        }
        Ok(())
    })
}

/// Build an article from file content: front matter into metadata, the rest
/// into the body. `title` falls back to the first `# ` heading, then the
/// file stem.
pub fn parse_article(file_path: PathBuf, content: &str) -> Result<Article, StoreError> {
    let (mut metadata, body) = split_front_matter(&file_path, content)?;

    if !metadata.get(TITLE_KEY).is_some_and(|t| !t.trim().is_empty()) {
        let title = first_heading(body)
            .or_else(|| {
                file_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "Untitled".to_string());
        metadata.insert(TITLE_KEY.to_string(), title);
    }

    Ok(Article {
        file_path,
        metadata,
        body: body.to_string(),
    })
}

/// Split a leading `---` block from the body and parse it as YAML.
fn split_front_matter<'a>(
    file_path: &Path,
    content: &'a str,
) -> Result<(HashMap<String, String>, &'a str), StoreError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(rest) = content
        .strip_prefix(FRONT_MATTER_FENCE)
        .and_then(|r| r.strip_prefix("\r\n").or_else(|| r.strip_prefix('\n')))
    else {
        return Ok((HashMap::new(), content));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == FRONT_MATTER_FENCE {
            let metadata =
                parse_front_matter(&rest[..offset]).map_err(|reason| StoreError::FrontMatter {
                    path: file_path.display().to_string(),
                    reason,
                })?;
            return Ok((metadata, &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    // Unterminated block: treat the whole file as body.
    Ok((HashMap::new(), content))
}

/// Flatten a YAML mapping into lower-cased keys and string values.
/// Nested mappings and nulls are dropped.
fn parse_front_matter(yaml: &str) -> Result<HashMap<String, String>, String> {
    let mapping = match serde_yaml::from_str::<Value>(yaml).map_err(|e| e.to_string())? {
        Value::Null => return Ok(HashMap::new()),
        Value::Mapping(mapping) => mapping,
        _ => return Err("expected `key: value` pairs".to_string()),
    };

    let mut metadata = HashMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        let (Some(key), Some(value)) = (scalar_string(&key), metadata_value(value)) else {
            continue;
        };
        metadata.insert(key.to_lowercase(), value);
    }
    Ok(metadata)
}

fn metadata_value(value: Value) -> Option<String> {
    match value {
        Value::Sequence(items) => Some(
            items
                .iter()
                .filter_map(scalar_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Tagged(tagged) => metadata_value(tagged.value),
        other => scalar_string(&other),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.trim().strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}
