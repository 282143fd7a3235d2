use crate::domain::definition::{Definition, DefinitionId};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for definition storage backends.
/// Implementations must be thread-safe (Send + Sync).
pub trait DefinitionStore: Send + Sync {
    /// Insert or replace by `definition.id`.
    fn put(&self, definition: Definition);
    fn get(&self, id: DefinitionId) -> Option<Definition>;
    fn ids(&self) -> Vec<DefinitionId>;
    fn len(&self) -> usize;
    fn clear(&self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One result per id found, in the order asked; missing ids are skipped.
    fn get_all(&self, ids: &[DefinitionId]) -> Vec<Definition> {
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }

    /// Every definition, ascending by id.
    fn definitions(&self) -> Vec<Definition> {
        self.get_all(&self.ids())
    }

    /// Distinct groups, sorted, with the ungrouped `None` last.
    fn definition_groups(&self) -> Vec<Option<String>> {
        let groups: BTreeSet<String> = self
            .definitions()
            .into_iter()
            .filter_map(|definition| definition.definition_group)
            .collect();
        let has_ungrouped = self
            .definitions()
            .iter()
            .any(|definition| definition.definition_group.is_none());

        let mut groups: Vec<Option<String>> = groups.into_iter().map(Some).collect();
        if has_ungrouped {
            groups.push(None);
        }
        groups
    }

    fn filter_by_definition_group(&self, group: Option<&str>) -> Vec<Definition> {
        self.definitions()
            .into_iter()
            .filter(|definition| definition.definition_group.as_deref() == group)
            .collect()
    }
}

// ============================================================================
// MemoryDefinitionStore - In-memory storage using DashMap
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryDefinitionStore {
    definitions: DashMap<DefinitionId, Definition>,
    next_id: AtomicU64,
}

impl MemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store under a fresh id (one past the highest seen) and return it.
    pub fn insert_new(&self, mut definition: Definition) -> DefinitionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        definition.id = id;
        self.definitions.insert(id, definition);
        id
    }
}

impl DefinitionStore for MemoryDefinitionStore {
    fn put(&self, definition: Definition) {
        self.next_id.fetch_max(definition.id, Ordering::SeqCst);
        self.definitions.insert(definition.id, definition);
    }

    fn get(&self, id: DefinitionId) -> Option<Definition> {
        self.definitions.get(&id).map(|r| r.clone())
    }

    fn ids(&self) -> Vec<DefinitionId> {
        let mut ids: Vec<DefinitionId> = self.definitions.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        ids
    }

    fn len(&self) -> usize {
        self.definitions.len()
    }

    fn clear(&self) {
        self.definitions.clear();
        self.next_id.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: DefinitionId, group: Option<&str>) -> Definition {
        Definition::new(id, &format!("def {id}")).with_group(group.map(str::to_string))
    }

    #[test]
    fn test_put_replaces_by_id() {
        let store = MemoryDefinitionStore::new();
        store.put(definition(1, None));
        let mut replacement = definition(1, None);
        replacement.title = "replaced".to_string();
        store.put(replacement);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).map(|d| d.title), Some("replaced".to_string()));
    }

    #[test]
    fn test_get_all_skips_missing() {
        let store = MemoryDefinitionStore::new();
        store.put(definition(1, None));
        store.put(definition(3, None));

        let found: Vec<DefinitionId> = store.get_all(&[3, 2, 1]).iter().map(|d| d.id).collect();
        assert_eq!(found, vec![3, 1]);
    }

    #[test]
    fn test_insert_new_after_put() {
        let store = MemoryDefinitionStore::new();
        store.put(definition(5, None));
        assert_eq!(store.insert_new(definition(0, None)), 6);
        assert_eq!(store.ids(), vec![5, 6]);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.insert_new(definition(0, None)), 1);
    }

    #[test]
    fn test_groups_sorted_with_ungrouped_last() {
        let store = MemoryDefinitionStore::new();
        store.put(definition(1, Some("web")));
        store.put(definition(2, None));
        store.put(definition(3, Some("batch")));
        store.put(definition(4, Some("web")));

        assert_eq!(
            store.definition_groups(),
            vec![Some("batch".to_string()), Some("web".to_string()), None]
        );
        let web: Vec<DefinitionId> = store
            .filter_by_definition_group(Some("web"))
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(web, vec![1, 4]);
        assert_eq!(store.filter_by_definition_group(None).len(), 1);
    }
}
