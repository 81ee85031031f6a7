#![forbid(unsafe_code)]

use kanvas_core::SearchResult;
use serde::Serialize;
use uuid::Uuid;

/// Form state for creating a container from a search result. Visibility is
/// owned by the dispatcher; command outcomes are tracked separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateDialog {
    pub image: SearchResult,
    pub name: String,
    pub ports: String,
}

impl CreateDialog {
    pub fn open(image: SearchResult) -> Self {
        let name = suggested_name(&image);
        Self { image, name, ports: String::new() }
    }

    pub fn can_submit(&self) -> bool { !self.name.trim().is_empty() }
}

/// `<short name>-<4 hex chars>`, e.g. `nginx-3fa1`.
pub fn suggested_name(image: &SearchResult) -> String {
    let base = image.image_ref().rsplit('/').next().unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &suffix[..4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanvas_core::RegistryItem;

    fn result(repo: &str) -> SearchResult {
        SearchResult::from(RegistryItem { repo_name: repo.into(), ..Default::default() })
    }

    #[test]
    fn suggested_name_uses_last_segment_and_hex_suffix() {
        let n = suggested_name(&result("bitnami/redis"));
        let (base, suffix) = n.rsplit_once('-').unwrap();
        assert_eq!(base, "redis");
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn blank_name_blocks_submit() {
        let mut d = CreateDialog::open(result("nginx"));
        assert!(d.can_submit());
        assert!(d.ports.is_empty());
        d.name = "   ".into();
        assert!(!d.can_submit());
    }
}
