//! Ordered label <-> 1-based index maps for items and persons.

use std::collections::HashMap;

use ed_core::{Error, Result};
use serde::Serialize;

/// Ordered 1:1 mapping between external labels and contiguous 1-based indices.
///
/// Indices are assigned in insertion order and never change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentifierMap {
    labels: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl IdentifierMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map from labels in order; duplicates are a schema error.
    pub fn from_labels<I, S>(labels: I, what: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = Self::new();
        for label in labels {
            let label = label.into();
            if map.lookup.contains_key(&label) {
                return Err(Error::Schema(format!("duplicate {what} label '{label}'")));
            }
            map.intern(label);
        }
        Ok(map)
    }

    /// Index of `label`, inserting it at the end if unseen.
    pub fn intern(&mut self, label: impl Into<String>) -> usize {
        let label = label.into();
        if let Some(&idx) = self.lookup.get(&label) {
            return idx;
        }
        self.labels.push(label.clone());
        let idx = self.labels.len();
        self.lookup.insert(label, idx);
        idx
    }

    /// 1-based index of `label`.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.lookup.get(label).copied()
    }

    /// Label at 1-based `index`.
    pub fn label(&self, index: usize) -> Option<&str> {
        index.checked_sub(1).and_then(|i| self.labels.get(i)).map(String::as_str)
    }

    /// Labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `(index, label)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().enumerate().map(|(i, l)| (i + 1, l.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_order() {
        let mut map = IdentifierMap::new();
        let ids: Vec<usize> =
            ["dog", "cat", "dog", "pony", "owl"].iter().map(|s| map.intern(*s)).collect();
        assert_eq!(ids, vec![1, 2, 1, 3, 4]);
        assert_eq!(map.labels(), &["dog", "cat", "pony", "owl"]);
        assert_eq!(map.label(3), Some("pony"));
        assert_eq!(map.label(0), None);
        assert_eq!(map.index_of("owl"), Some(4));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let err = IdentifierMap::from_labels(["a", "b", "a"], "column").unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("duplicate column label 'a'")));
    }
}
