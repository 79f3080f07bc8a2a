use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageType {
    Home,
    PostsIndex,
    TagsIndex,
    NotFound,
    Article,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Home => "home",
            PageType::PostsIndex => "posts-index",
            PageType::TagsIndex => "tags-index",
            PageType::NotFound => "not-found",
            PageType::Article => "article",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered source document. `relative` is relative to the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    pub path: PathBuf,
    pub relative: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub file_path: PathBuf,
    pub relative: PathBuf,
    pub page_type: PageType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(flatten)]
    pub raw: BTreeMap<String, Value>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// A trimmed, non-empty string field. Non-string values are treated as absent.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.raw
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    /// String entries of a sequence field; `None` when nothing usable remains.
    pub fn get_array(&self, key: &str) -> Option<Vec<String>> {
        let items: Vec<String> = self
            .raw
            .get(key)?
            .as_array()?
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect();

        if items.is_empty() { None } else { Some(items) }
    }
}

/// Typed view over front matter. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

pub const TYPED_META_KEYS: [&str; 5] = ["title", "description", "date", "tags", "slug"];

impl From<&Frontmatter> for PageMeta {
    fn from(frontmatter: &Frontmatter) -> Self {
        let extra = frontmatter
            .raw
            .iter()
            .filter(|(key, _)| !TYPED_META_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            title: frontmatter.get_string("title"),
            description: frontmatter.get_string("description"),
            date: frontmatter.get_string("date"),
            tags: frontmatter.get_array("tags"),
            slug: frontmatter.get_string("slug"),
            extra,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub frontmatter: Frontmatter,
    pub meta: PageMeta,
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub success_count: usize,
    pub failure_count: usize,
}
