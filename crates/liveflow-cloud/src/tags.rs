//! Resource tags
//!
//! Tags are a flat string map updated independently of every other field:
//! the reconciler hands the old and new maps to a single tag-update call,
//! which derives what to add, change and remove with [`TagDiff`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type Tags = BTreeMap<String, String>;

/// Key prefix reserved by the service; never sent, never read back
pub const RESERVED_TAG_PREFIX: &str = "aws:";

/// Changes needed to turn one tag map into another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDiff {
    /// Keys to add or whose value changed
    pub upsert: Tags,

    /// Keys to remove
    pub remove: BTreeSet<String>,
}

impl TagDiff {
    pub fn between(old: &Tags, new: &Tags) -> Self {
        let upsert = new
            .iter()
            .filter(|(k, v)| old.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let remove = old
            .keys()
            .filter(|k| !new.contains_key(*k))
            .cloned()
            .collect();

        Self { upsert, remove }
    }

    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }
}

/// Tags the caller does not manage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreTags {
    #[serde(default)]
    pub keys: BTreeSet<String>,

    #[serde(default)]
    pub key_prefixes: Vec<String>,
}

impl IgnoreTags {
    pub fn is_ignored(&self, key: &str) -> bool {
        key.starts_with(RESERVED_TAG_PREFIX)
            || self.keys.contains(key)
            || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Drop every ignored key
    pub fn filter(&self, tags: &Tags) -> Tags {
        tags.iter()
            .filter(|(k, _)| !self.is_ignored(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_diff_adds_updates_and_removes() {
        let old = tags(&[("a", "1"), ("b", "2")]);
        let new = tags(&[("b", "3"), ("c", "4")]);

        let diff = TagDiff::between(&old, &new);

        assert_eq!(diff.upsert, tags(&[("b", "3"), ("c", "4")]));
        assert_eq!(diff.remove, BTreeSet::from(["a".to_string()]));
    }

    #[test]
    fn test_diff_unchanged_is_empty() {
        let old = tags(&[("env", "prod")]);
        assert!(TagDiff::between(&old, &old.clone()).is_empty());
        assert!(TagDiff::between(&Tags::new(), &Tags::new()).is_empty());
    }

    #[test]
    fn test_ignore_reserved_prefix() {
        let ignore = IgnoreTags::default();
        let filtered = ignore.filter(&tags(&[
            ("aws:cloudformation:stack-name", "x"),
            ("env", "prod"),
        ]));
        assert_eq!(filtered, tags(&[("env", "prod")]));
    }

    #[test]
    fn test_ignore_configured_keys_and_prefixes() {
        let ignore = IgnoreTags {
            keys: BTreeSet::from(["owner".to_string()]),
            key_prefixes: vec!["ci:".to_string()],
        };

        assert!(ignore.is_ignored("owner"));
        assert!(ignore.is_ignored("ci:pipeline"));
        assert!(!ignore.is_ignored("env"));
    }
}
