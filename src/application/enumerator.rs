//! Definition Enumerator
//!
//! Lists stored definitions group by group (sorted, ungrouped last),
//! filtered by substring matches and paged.

use crate::domain::definition::Definition;
use crate::domain::store::DefinitionStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionQuery {
    pub title: String,
    pub source: String,
    pub definition_group: String,
}

impl DefinitionQuery {
    fn matches(&self, definition: &Definition) -> bool {
        if !self.title.is_empty() && !definition.title.contains(&self.title) {
            return false;
        }
        if !self.source.is_empty()
            && !definition
                .sources()
                .any(|source| source.source_name.contains(&self.source))
        {
            return false;
        }
        if !self.definition_group.is_empty()
            && !definition
                .definition_group
                .as_deref()
                .unwrap_or_default()
                .contains(&self.definition_group)
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub definitions: Vec<Definition>,
    pub page: usize,
    pub per: usize,
    /// Matching definitions over all pages
    pub total: usize,
}

pub struct DefinitionEnumerator<'a> {
    store: &'a dyn DefinitionStore,
    query: DefinitionQuery,
}

impl<'a> DefinitionEnumerator<'a> {
    pub fn new(store: &'a dyn DefinitionStore, query: DefinitionQuery) -> Self {
        Self { store, query }
    }

    /// Every matching definition in enumeration order.
    pub fn definitions(&self) -> Vec<Definition> {
        self.store
            .definition_groups()
            .into_iter()
            .flat_map(|group| self.store.filter_by_definition_group(group.as_deref()))
            .filter(|definition| self.query.matches(definition))
            .collect()
    }

    /// 1-based page of `per` definitions. Page 0 is treated as page 1.
    pub fn page(&self, page: usize, per: usize) -> Page {
        let page = page.max(1);
        let per = per.max(1);
        let matched = self.definitions();
        let total = matched.len();

        Page {
            definitions: matched.into_iter().skip((page - 1).saturating_mul(per)).take(per).collect(),
            page,
            per,
            total,
        }
    }

    /// Size of the store, regardless of the query.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
