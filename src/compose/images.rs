//! Inline image embedding.
//!
//! Local `<img src>` references in the rendered body become inline
//! attachments and the body is rewritten to point at `CID:<content id>`.
//!
//! The scan is a narrow regex over `<img ... src="...">`; it is not an HTML
//! parser, and malformed tags simply pass through unmatched.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use tracing::debug;
use uuid::Uuid;

/// A local image reference found in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// The literal `src` text as it appears in the body.
    pub markup: String,
    pub canonical_path: PathBuf,
}

/// One inline attachment, unique per canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub canonical_path: PathBuf,
    pub content_id: String,
}

/// Rewritten body plus the attachments it references.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedBody {
    pub body: String,
    pub attachments: Vec<AttachmentRecord>,
}

/// Allocates content ids for inline attachments.
pub trait ContentIdSource: Send + Sync {
    fn next_id(&self, path: &Path) -> String;
}

/// Random ids of the form `<uuid>@md-mailer`.
pub struct UuidContentIds;

impl ContentIdSource for UuidContentIds {
    fn next_id(&self, _path: &Path) -> String {
        format!("{}@md-mailer", Uuid::new_v4().simple())
    }
}

/// Extracts, deduplicates and rewrites local image references.
pub struct ImageEmbedder {
    img_src: Regex,
}

/// A canonical path with every markup string that resolved to it.
struct Collapsed {
    canonical_path: PathBuf,
    /// Most recently seen markup.
    markup: String,
    aliases: Vec<String>,
}

impl ImageEmbedder {
    pub fn new() -> Self {
        Self {
            img_src: Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#).unwrap(),
        }
    }

    /// All `src` values of `<img>` tags, in body order, duplicates included.
    pub fn image_sources<'a>(&self, body: &'a str) -> Vec<&'a str> {
        self.img_src
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect()
    }

    /// Local references (`src` starting with `.` or `/`) resolved against
    /// `article_dir`, in body order.
    pub fn local_references(&self, body: &str, article_dir: &Path) -> Vec<ImageReference> {
        self.image_sources(body)
            .into_iter()
            .filter(|src| src.starts_with('.') || src.starts_with('/'))
            .map(|src| ImageReference {
                markup: src.to_string(),
                canonical_path: canonicalize(article_dir, src),
            })
            .collect()
    }

    /// Turn local images into attachment records and rewrite the body.
    ///
    /// The referenced files are not checked here; a missing file fails at
    /// delivery.
    pub fn embed(
        &self,
        body: &str,
        article_dir: &Path,
        ids: &dyn ContentIdSource,
    ) -> EmbeddedBody {
        let collapsed = collapse(self.local_references(body, article_dir));
        if collapsed.is_empty() {
            return EmbeddedBody {
                body: body.to_string(),
                attachments: Vec::new(),
            };
        }

        let mut attachments = Vec::with_capacity(collapsed.len());
        let mut substitutions: Vec<(String, String)> = Vec::new();
        for entry in collapsed {
            let content_id = ids.next_id(&entry.canonical_path);
            let token = format!("CID:{content_id}");
            debug!(
                path = %entry.canonical_path.display(),
                markup = %entry.markup,
                %content_id,
                "Embedding inline image"
            );
            substitutions.extend(entry.aliases.into_iter().map(|alias| (alias, token.clone())));
            attachments.push(AttachmentRecord {
                canonical_path: entry.canonical_path,
                content_id,
            });
        }

        // Longest markup first, so `./a.png` cannot clobber `./a.png.bak`.
        substitutions.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        let mut rewritten = body.to_string();
        for (markup, token) in &substitutions {
            rewritten = rewritten.replace(markup.as_str(), token);
        }

        EmbeddedBody {
            body: rewritten,
            attachments,
        }
    }
}

impl Default for ImageEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// Group references by canonical path, first-seen order. The recorded markup
/// is the last one seen for that path.
fn collapse(references: Vec<ImageReference>) -> Vec<Collapsed> {
    let mut index: HashMap<PathBuf, usize> = HashMap::new();
    // Markup maps to exactly one path, so one set covers every entry.
    let mut seen: HashSet<String> = HashSet::new();
    let mut collapsed: Vec<Collapsed> = Vec::new();

    for reference in references {
        let first_sighting = seen.insert(reference.markup.clone());
        match index.get(&reference.canonical_path) {
            Some(&i) => {
                let entry = &mut collapsed[i];
                if first_sighting {
                    entry.aliases.push(reference.markup.clone());
                }
                entry.markup = reference.markup;
            }
            None => {
                index.insert(reference.canonical_path.clone(), collapsed.len());
                collapsed.push(Collapsed {
                    canonical_path: reference.canonical_path,
                    aliases: vec![reference.markup.clone()],
                    markup: reference.markup,
                });
            }
        }
    }
    collapsed
}

/// Resolve `src` against `base` and normalize `.`/`..` lexically.
fn canonicalize(base: &Path, src: &str) -> PathBuf {
    normalize_lexical(&base.join(src))
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}
