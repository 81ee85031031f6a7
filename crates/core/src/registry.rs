//! Registry proxy search items and their normalized, ranked form.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Tag used for pulls and container creation until tag selection exists.
pub const DEFAULT_TAG: &str = "latest";

/// Raw item of the registry proxy `results` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryItem {
    pub repo_name: String,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub pull_count: u64,
    #[serde(default)]
    pub star_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Last path segment of the repository name.
    pub name: String,
    pub full_name: String,
    pub is_official: bool,
    pub description: String,
    pub pull_count: u64,
    pub star_count: u64,
    /// Everything before the last `/`, empty for top-level repositories.
    pub namespace: String,
    pub tags: Vec<String>,
}

impl SearchResult {
    /// Reference used for pull and create: the full name, else the short name.
    pub fn image_ref(&self) -> &str {
        if self.full_name.is_empty() { &self.name } else { &self.full_name }
    }
}

impl From<RegistryItem> for SearchResult {
    fn from(it: RegistryItem) -> Self {
        let (namespace, name) = match it.repo_name.rsplit_once('/') {
            Some((ns, n)) => (ns.to_string(), n.to_string()),
            None => (String::new(), it.repo_name.clone()),
        };
        SearchResult {
            name,
            full_name: it.repo_name,
            is_official: it.is_official,
            description: it.short_description,
            pull_count: it.pull_count,
            star_count: it.star_count,
            namespace,
            tags: vec![DEFAULT_TAG.to_string()],
        }
    }
}

/// Official first, then by descending pull count. Stable for equal keys.
pub fn rank(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.is_official
            .cmp(&a.is_official)
            .then_with(|| b.pull_count.cmp(&a.pull_count))
    });
}
