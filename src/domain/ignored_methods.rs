//! Ignored Method Rules
//!
//! Calls matching a rule are not traced, and neither is anything they call
//! until they return. Rules are written as:
//!
//! * `Type` ignores every method of the type (and its subclasses)
//! * `Type.method` ignores a class method
//! * `Type#method` ignores an instance method

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::domain::definition::MethodContext;
use crate::domain::type_registry::{normalize_name, TypeId, TypeRegistry};
use crate::error::CallweaveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreRule {
    Type(String),
    ClassMethod(String, String),
    InstanceMethod(String, String),
}

impl FromStr for IgnoreRule {
    type Err = CallweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CallweaveError::InvalidIgnoreRule(s.to_string());

        let split = |separator: char| -> Result<(String, String), CallweaveError> {
            let (type_name, method_name) = s.split_once(separator).ok_or_else(invalid)?;
            let type_name = normalize_name(type_name);
            let method_name = method_name.trim();
            if type_name.is_empty() || method_name.is_empty() {
                return Err(invalid());
            }
            Ok((type_name, method_name.to_string()))
        };

        if s.contains('.') {
            let (type_name, method_name) = split('.')?;
            Ok(IgnoreRule::ClassMethod(type_name, method_name))
        } else if s.contains('#') {
            let (type_name, method_name) = split('#')?;
            Ok(IgnoreRule::InstanceMethod(type_name, method_name))
        } else {
            let type_name = normalize_name(s);
            if type_name.is_empty() {
                return Err(invalid());
            }
            Ok(IgnoreRule::Type(type_name))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IgnoredMethods {
    types: HashSet<String>,
    class_methods: HashMap<String, HashSet<String>>,
    instance_methods: HashMap<String, HashSet<String>>,
    type_cache: HashMap<TypeId, bool>,
}

impl IgnoredMethods {
    pub fn new(rules: impl IntoIterator<Item = IgnoreRule>) -> Self {
        let mut ignored = Self::default();
        for rule in rules {
            match rule {
                IgnoreRule::Type(type_name) => {
                    ignored.types.insert(type_name);
                }
                IgnoreRule::ClassMethod(type_name, method_name) => {
                    ignored.class_methods.entry(type_name).or_default().insert(method_name);
                }
                IgnoreRule::InstanceMethod(type_name, method_name) => {
                    ignored.instance_methods.entry(type_name).or_default().insert(method_name);
                }
            }
        }
        ignored
    }

    /// Parse rules written as strings.
    pub fn parse<I, S>(rules: I) -> Result<Self, CallweaveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|rule| rule.as_ref().parse())
            .collect::<Result<Vec<IgnoreRule>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.class_methods.is_empty() && self.instance_methods.is_empty()
    }

    pub fn ignored(
        &mut self,
        registry: &TypeRegistry,
        id: TypeId,
        context: MethodContext,
        method_name: &str,
    ) -> bool {
        if self.is_empty() {
            return false;
        }
        self.ignored_type(registry, id) || self.ignored_method(registry, id, context, method_name)
    }

    fn ignored_type(&mut self, registry: &TypeRegistry, id: TypeId) -> bool {
        if let Some(cached) = self.type_cache.get(&id) {
            return *cached;
        }

        let ignored = registry
            .ancestors(id)
            .filter_map(|(_, info)| info.name.as_ref())
            .any(|name| self.types.contains(name));
        self.type_cache.insert(id, ignored);
        ignored
    }

    fn ignored_method(
        &self,
        registry: &TypeRegistry,
        id: TypeId,
        context: MethodContext,
        method_name: &str,
    ) -> bool {
        let store = match context {
            MethodContext::Class => &self.class_methods,
            MethodContext::Instance => &self.instance_methods,
        };

        registry
            .ancestors(id)
            .filter_map(|(_, info)| info.name.as_ref())
            .filter_map(|name| store.get(name))
            .any(|methods| methods.contains(method_name))
    }
}
