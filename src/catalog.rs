//! Process-wide catalog of known manuals.
//!
//! The catalog is a read-only snapshot of the manual identifiers present
//! in the vector index, loaded explicitly at startup and injected into the
//! query pipeline. Refreshing is an explicit operation, so catalog
//! staleness is a visible parameter rather than ambient state; a stale
//! snapshot during a run is an accepted, bounded inconsistency.

use anyhow::Result;

use crate::traits::VectorIndex;

/// Read-only snapshot of the manual identifiers known to the index.
#[derive(Debug, Clone, Default)]
pub struct ManualCatalog {
    manuals: Vec<String>,
}

impl ManualCatalog {
    pub fn new(manuals: Vec<String>) -> Self {
        Self { manuals }
    }

    /// Load a fresh snapshot from the index's document listing.
    pub async fn load(index: &dyn VectorIndex) -> Result<Self> {
        Ok(Self {
            manuals: index.list_documents().await?,
        })
    }

    pub fn manuals(&self) -> &[String] {
        &self.manuals
    }

    pub fn is_empty(&self) -> bool {
        self.manuals.is_empty()
    }

    /// Resolve an extracted manual name against the catalog.
    ///
    /// Matching is case-insensitive substring containment: the first
    /// catalog entry containing the extracted string wins. Returns `None`
    /// when nothing matches (the caller derives the invalid-manual
    /// scenario from that).
    pub fn resolve(&self, extracted: &str) -> Option<&str> {
        let needle = extracted.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.manuals
            .iter()
            .find(|entry| entry.to_lowercase().contains(&needle))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ManualCatalog {
        ManualCatalog::new(vec!["Bobcat-T590".to_string(), "D20-25".to_string()])
    }

    #[test]
    fn test_resolve_case_insensitive() {
        assert_eq!(catalog().resolve("bobcat-t590"), Some("Bobcat-T590"));
        assert_eq!(catalog().resolve("BOBCAT"), Some("Bobcat-T590"));
    }

    #[test]
    fn test_resolve_substring_containment() {
        assert_eq!(catalog().resolve("T590"), Some("Bobcat-T590"));
        assert_eq!(catalog().resolve("d20"), Some("D20-25"));
    }

    #[test]
    fn test_resolve_unknown_manual() {
        assert_eq!(catalog().resolve("X9000"), None);
    }

    #[test]
    fn test_resolve_blank_name() {
        assert_eq!(catalog().resolve("   "), None);
        assert_eq!(catalog().resolve(""), None);
    }

    #[test]
    fn test_first_match_wins() {
        let c = ManualCatalog::new(vec!["D20-25".to_string(), "D20-30".to_string()]);
        assert_eq!(c.resolve("d20"), Some("D20-25"));
    }
}
