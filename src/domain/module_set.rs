//! Tracked Module Set
//!
//! Decides whether a call receiver's type is one of the configured targets
//! (directly, or as a subclass of one) and names it for the definition.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::domain::type_registry::{normalize_name, TypeId, TypeInfo, TypeRegistry};

/// How calls landing on anonymous types are attributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnonymousPolicy {
    /// Anonymous receivers are untracked.
    #[default]
    Drop,
    /// Attribute to the nearest named ancestor that is itself tracked.
    NamedAncestor,
}

/// Set of target modules with memoized subtype membership.
#[derive(Debug, Clone, Default)]
pub struct ModuleSet {
    modules: HashSet<String>,
    include_files: HashSet<String>,
    anonymous_policy: AnonymousPolicy,
    cache: HashMap<TypeId, bool>,
}

impl ModuleSet {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            modules: modules
                .into_iter()
                .map(|m| normalize_name(m.as_ref()))
                .filter(|m| !m.is_empty())
                .collect(),
            ..Self::default()
        }
    }

    /// Also track every named type declared in one of these files.
    pub fn with_include_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_anonymous_policy(mut self, policy: AnonymousPolicy) -> Self {
        self.anonymous_policy = policy;
        self
    }

    pub fn anonymous_policy(&self) -> AnonymousPolicy {
        self.anonymous_policy
    }

    /// Is `id` a target, or a class descending from one?
    pub fn include(&mut self, registry: &TypeRegistry, id: TypeId) -> bool {
        if let Some(cached) = self.cache.get(&id) {
            return *cached;
        }

        let Some(info) = registry.get(id) else {
            debug!(type_id = id, "receiver type not registered");
            return false;
        };

        if !info.is_class() {
            let included = self.matches(info);
            self.cache.insert(id, included);
            return included;
        }

        self.dig_superclass(registry, id)
    }

    /// Canonical source name for a receiver type, or `None` when the call
    /// is untracked.
    pub fn resolve(&mut self, registry: &TypeRegistry, id: TypeId) -> Option<String> {
        if !self.include(registry, id) {
            return None;
        }

        let info = registry.get(id)?;
        if let Some(name) = &info.name {
            return Some(name.clone());
        }

        match self.anonymous_policy {
            AnonymousPolicy::Drop => None,
            AnonymousPolicy::NamedAncestor => {
                let ancestors: Vec<TypeId> = registry
                    .ancestors(id)
                    .skip(1)
                    .filter(|(_, ancestor)| !ancestor.is_anonymous())
                    .map(|(ancestor_id, _)| ancestor_id)
                    .collect();

                ancestors
                    .into_iter()
                    .find(|ancestor_id| self.include(registry, *ancestor_id))
                    .and_then(|ancestor_id| registry.name_of(ancestor_id).map(str::to_string))
            }
        }
    }

    fn matches(&self, info: &TypeInfo) -> bool {
        let Some(name) = &info.name else {
            return false;
        };

        self.modules.contains(name)
            || info
                .source_file
                .as_ref()
                .is_some_and(|file| self.include_files.contains(file))
    }

    /// Walk up the superclass chain until a cached or matching type is
    /// found, then cache the answer for every class visited on the way.
    fn dig_superclass(&mut self, registry: &TypeRegistry, id: TypeId) -> bool {
        let mut visited = Vec::new();
        let mut included = false;

        for (current, info) in registry.ancestors(id) {
            if let Some(cached) = self.cache.get(&current) {
                included = *cached;
                break;
            }

            visited.push(current);
            if self.matches(info) {
                included = true;
                break;
            }
        }

        for current in visited {
            self.cache.entry(current).or_insert(included);
        }

        included
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (TypeRegistry, TypeId, TypeId, TypeId, TypeId) {
        let mut registry = TypeRegistry::new();
        let a = registry.register_class("App::A", None);
        let b = registry.register_class("App::B", Some(a));
        let c = registry.register_class("App::C", None);
        let anon = registry.register_anonymous_class(Some(a));
        (registry, a, b, c, anon)
    }

    #[test]
    fn test_direct_and_subclass_membership() {
        let (registry, a, b, c, _) = registry();
        let mut set = ModuleSet::new(["::App::A"]);

        assert!(set.include(&registry, a));
        assert!(set.include(&registry, b));
        assert!(!set.include(&registry, c));
        assert_eq!(set.resolve(&registry, b).as_deref(), Some("App::B"));
    }

    #[test]
    fn test_modules_do_not_inherit() {
        let mut registry = TypeRegistry::new();
        let m = registry.register_module("Helpers");
        let mut set = ModuleSet::new(["Helpers"]);
        assert_eq!(set.resolve(&registry, m).as_deref(), Some("Helpers"));
    }

    #[test]
    fn test_anonymous_dropped_by_default() {
        let (registry, _, _, _, anon) = registry();
        let mut set = ModuleSet::new(["App::A"]);
        assert!(set.include(&registry, anon));
        assert_eq!(set.resolve(&registry, anon), None);
    }

    #[test]
    fn test_anonymous_attributed_to_named_ancestor() {
        let (registry, _, _, _, anon) = registry();
        let mut set = ModuleSet::new(["App::A"]).with_anonymous_policy(AnonymousPolicy::NamedAncestor);
        assert_eq!(set.resolve(&registry, anon).as_deref(), Some("App::A"));
    }

    #[test]
    fn test_include_files() {
        let mut registry = TypeRegistry::new();
        let a = registry.register_class("A", None);
        registry.set_source_file(a, "/app/a.rb");
        let other = registry.register_class("Other", None);
        registry.set_source_file(other, "/app/other.rb");

        let mut set = ModuleSet::new(Vec::<String>::new()).with_include_files(["/app/a.rb"]);
        assert!(set.include(&registry, a));
        assert!(!set.include(&registry, other));
    }

    #[test]
    fn test_unknown_type_is_untracked() {
        let (registry, ..) = registry();
        let mut set = ModuleSet::new(["App::A"]);
        assert_eq!(set.resolve(&registry, 999), None);
    }
}
