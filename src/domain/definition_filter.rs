// Module-based narrowing of a definition before it is combined.
// Expects editorial modules to be merged in already (see Metadata::apply_to).

use std::collections::BTreeSet;

use crate::domain::definition::{Definition, Source};

#[derive(Debug, Clone, Default)]
pub struct DefinitionFilter {
    /// Keep only sources assigned to one of these modules
    modules: BTreeSet<String>,
    /// Keep only edges touching one of these modules
    focus_modules: BTreeSet<String>,
    /// Drop edges inside a module, and sources left without any edge
    /// crossing a module boundary
    remove_internal_sources: bool,
}

impl DefinitionFilter {
    pub fn new<I, S>(modules: I, focus_modules: I, remove_internal_sources: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let focus_modules: BTreeSet<String> = focus_modules.into_iter().map(Into::into).collect();
        let mut modules: BTreeSet<String> = modules.into_iter().map(Into::into).collect();
        modules.extend(focus_modules.iter().cloned());

        Self {
            modules,
            focus_modules,
            remove_internal_sources,
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.remove_internal_sources && self.modules.is_empty()
    }

    pub fn filter(&self, definition: &Definition) -> Definition {
        if self.is_noop() {
            return definition.clone();
        }

        let module_of = |source_name: &str| -> Option<&str> {
            definition.source(source_name).and_then(|s| s.module.as_deref())
        };

        let source_names = self.matching_source_names(definition);
        let mut filtered =
            Definition::new(definition.id, &definition.title).with_group(definition.definition_group.clone());

        for source in definition.sources() {
            if !source_names.contains(source.source_name.as_str()) {
                continue;
            }

            let target = filtered.find_or_build_source(&source.source_name);
            target.memo = source.memo.clone();
            target.module = source.module.clone();

            for dependency in source.dependencies() {
                if !source_names.contains(dependency.source_name.as_str()) {
                    continue;
                }
                if !self.focused(module_of(&source.source_name), module_of(&dependency.source_name)) {
                    continue;
                }
                if self.remove_internal_sources
                    && module_of(&source.source_name) == module_of(&dependency.source_name)
                {
                    continue;
                }

                if let Some(copy) = target.find_or_build_dependency(&dependency.source_name) {
                    copy.merge(dependency);
                }
            }
        }

        filtered
    }

    fn focused(&self, from: Option<&str>, to: Option<&str>) -> bool {
        if self.focus_modules.is_empty() {
            return true;
        }
        [from, to]
            .into_iter()
            .flatten()
            .any(|module| self.focus_modules.contains(module))
    }

    fn matches_module(&self, source: &Source) -> bool {
        self.modules.is_empty()
            || source
                .module
                .as_ref()
                .is_some_and(|module| self.modules.contains(module))
    }

    fn matching_source_names<'d>(&self, definition: &'d Definition) -> BTreeSet<&'d str> {
        let source_names: BTreeSet<&str> = definition
            .sources()
            .filter(|source| self.matches_module(source))
            .map(|source| source.source_name.as_str())
            .collect();

        if !self.remove_internal_sources {
            return source_names;
        }

        let mut crossing = BTreeSet::new();
        for source in definition.sources() {
            if !source_names.contains(source.source_name.as_str()) {
                continue;
            }

            let external = source.dependencies().find(|dependency| {
                let target_module = definition
                    .source(&dependency.source_name)
                    .and_then(|s| s.module.as_deref());
                source_names.contains(dependency.source_name.as_str())
                    && source.module.as_deref() != target_module
            });

            if let Some(dependency) = external {
                crossing.insert(source.source_name.as_str());
                if let Some(target) = source_names.get(dependency.source_name.as_str()) {
                    crossing.insert(*target);
                }
            }
        }
        crossing
    }
}
