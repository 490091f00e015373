//! Lookup table of known label names by label hash.
//!
//! Registrar events only carry the label hash. Names learnt out of band
//! (a plain list of labels, one per line) let `NameRegistered` fill in the
//! human-readable name before any controller event arrives.

use std::collections::HashMap;
use std::path::Path;

use super::names::label_hash;

#[derive(Debug, Default)]
pub struct LabelPreimages {
    by_hash: HashMap<[u8; 32], String>,
}

impl LabelPreimages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from candidate labels. Compound names and empty lines are
    /// dropped since they can never be a single registrar label.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut preimages = Self::new();
        for label in labels {
            preimages.insert(label.as_ref());
        }
        preimages
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let preimages = Self::from_labels(content.lines().map(str::trim));
        tracing::info!(
            "Loaded {} label preimages from {}",
            preimages.len(),
            path.display()
        );
        Ok(preimages)
    }

    pub fn insert(&mut self, label: &str) -> bool {
        if label.is_empty() || label.contains('.') {
            return false;
        }
        self.by_hash
            .insert(label_hash(label), label.to_string())
            .is_none()
    }

    pub fn name_by_hash(&self, hash: &[u8; 32]) -> Option<&str> {
        self.by_hash.get(hash).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}
