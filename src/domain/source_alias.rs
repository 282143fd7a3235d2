//! Source Alias Registry
//!
//! Editorial grouping of source names. Every source belongs to at most one
//! alias; a combined graph draws the whole group as a single node named
//! after the alias.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CallweaveError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceAlias {
    aliases: BTreeMap<String, BTreeSet<String>>,
    /// source name -> alias name
    members: HashMap<String, String>,
}

impl SourceAlias {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the members of `alias_name`. Blank names are dropped; an
    /// empty list removes the alias. Fails without touching the registry
    /// if any name already belongs to another alias.
    pub fn set_alias<I, S>(&mut self, alias_name: &str, source_names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alias_name = alias_name.trim();
        let source_names: BTreeSet<String> = source_names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        for source_name in &source_names {
            if let Some(owner) = self.members.get(source_name) {
                if owner != alias_name {
                    return Err(CallweaveError::AliasConflict {
                        source_name: source_name.clone(),
                        alias_name: owner.clone(),
                    });
                }
            }
        }

        self.remove_alias(alias_name);
        if source_names.is_empty() {
            debug!(alias = alias_name, "alias removed");
            return Ok(());
        }

        for source_name in &source_names {
            self.members.insert(source_name.clone(), alias_name.to_string());
        }
        self.aliases.insert(alias_name.to_string(), source_names);
        Ok(())
    }

    /// Remove `old_alias_name` and register `new_alias_name` in one step.
    /// On conflict the registry is left as it was.
    pub fn rename_alias<I, S>(&mut self, old_alias_name: &str, new_alias_name: &str, source_names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        next.remove_alias(old_alias_name.trim());
        next.set_alias(new_alias_name, source_names)?;
        *self = next;
        Ok(())
    }

    pub fn remove_alias(&mut self, alias_name: &str) -> bool {
        let Some(source_names) = self.aliases.remove(alias_name) else {
            return false;
        };
        for source_name in source_names {
            self.members.remove(&source_name);
        }
        true
    }

    /// Alias name for a source, or the source name itself.
    pub fn resolve<'a>(&'a self, source_name: &'a str) -> &'a str {
        self.members
            .get(source_name)
            .map(String::as_str)
            .unwrap_or(source_name)
    }

    pub fn alias_of(&self, source_name: &str) -> Option<&str> {
        self.members.get(source_name).map(String::as_str)
    }

    pub fn members_of(&self, alias_name: &str) -> Option<&BTreeSet<String>> {
        self.aliases.get(alias_name)
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.aliases
            .iter()
            .map(|(alias, names)| (alias.clone(), names.iter().cloned().collect()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn clear(&mut self) {
        self.aliases.clear();
        self.members.clear();
    }
}

/// Thread-safe registry handle. Writes are serialized; readers work on
/// snapshots.
#[derive(Debug, Clone, Default)]
pub struct SharedSourceAlias {
    inner: Arc<RwLock<SourceAlias>>,
}

impl SharedSourceAlias {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alias<I, S>(&self, alias_name: &str, source_names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.write().set_alias(alias_name, source_names)
    }

    pub fn rename_alias<I, S>(&self, old_alias_name: &str, new_alias_name: &str, source_names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.write().rename_alias(old_alias_name, new_alias_name, source_names)
    }

    pub fn resolve(&self, source_name: &str) -> String {
        self.inner.read().resolve(source_name).to_string()
    }

    pub fn members_of(&self, alias_name: &str) -> Option<BTreeSet<String>> {
        self.inner.read().members_of(alias_name).cloned()
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.inner.read().to_map()
    }

    pub fn snapshot(&self) -> SourceAlias {
        self.inner.read().clone()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_through_alias() {
        let mut alias = SourceAlias::new();
        alias.set_alias("A", ["A", "B"]).unwrap();

        assert_eq!(alias.resolve("B"), "A");
        assert_eq!(alias.resolve("A"), "A");
        assert_eq!(alias.resolve("C"), "C");
    }

    #[test]
    fn test_conflict_leaves_registry_unchanged() {
        let mut alias = SourceAlias::new();
        alias.set_alias("X", ["A", "B"]).unwrap();
        let before = alias.to_map();

        let err = alias.set_alias("Y", ["C", "B"]).unwrap_err();
        match err {
            CallweaveError::AliasConflict { source_name, alias_name } => {
                assert_eq!(source_name, "B");
                assert_eq!(alias_name, "X");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(alias.to_map(), before);
        assert_eq!(alias.resolve("C"), "C");
    }

    #[test]
    fn test_blank_names_and_removal() {
        let mut alias = SourceAlias::new();
        alias.set_alias("X", ["  ", "B ", ""]).unwrap();
        assert_eq!(alias.to_map().get("X"), Some(&vec!["B".to_string()]));

        alias.set_alias("X", ["   "]).unwrap();
        assert!(alias.is_empty());
        assert_eq!(alias.resolve("B"), "B");
    }

    #[test]
    fn test_reassigning_same_alias_replaces_members() {
        let mut alias = SourceAlias::new();
        alias.set_alias("X", ["B", "A"]).unwrap();
        alias.set_alias("X", ["C", "A"]).unwrap();

        assert_eq!(alias.to_map().get("X"), Some(&vec!["A".to_string(), "C".to_string()]));
        assert_eq!(alias.resolve("B"), "B");
    }

    #[test]
    fn test_rename_is_atomic() {
        let mut alias = SourceAlias::new();
        alias.set_alias("X", ["A"]).unwrap();
        alias.set_alias("Y", ["B"]).unwrap();

        assert!(alias.rename_alias("X", "Z", ["A", "B"]).is_err());
        assert_eq!(alias.resolve("A"), "X");

        alias.rename_alias("X", "Z", ["A", "C"]).unwrap();
        assert_eq!(alias.resolve("A"), "Z");
        assert!(alias.members_of("X").is_none());
    }

    #[test]
    fn test_shared_registry_across_threads() {
        let shared = SharedSourceAlias::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.set_alias(&format!("G{i}"), [format!("S{i}")]))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(shared.to_map().len(), 4);
        assert_eq!(shared.resolve("S2"), "G2");
    }
}
