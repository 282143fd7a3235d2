//! Registered Type Table
//!
//! Runtime ancestry for traced programs. Every type a traced program can
//! call into is registered once with its declared name, kind and
//! superclass, so membership checks walk this table instead of reflecting
//! over a live runtime.

use std::collections::HashMap;

/// Index into the registry.
pub type TypeId = usize;

/// Whether a type can be subclassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Has a superclass chain.
    Class,
    /// Mixin / namespace; never walks ancestors.
    Module,
}

/// A registered type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Canonical name, `None` for anonymous types
    pub name: Option<String>,
    pub kind: TypeKind,
    pub superclass: Option<TypeId>,
    /// File the type is declared in
    pub source_file: Option<String>,
}

impl TypeInfo {
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    pub fn is_class(&self) -> bool {
        self.kind == TypeKind::Class
    }
}

/// Canonicalize a type reference: `::A::B`, `A::B` and ` A :: B ` all
/// become `A::B`.
pub fn normalize_name(name: &str) -> String {
    name.split("::")
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("::")
}

/// Table of every type known to a traced program.
///
/// Superclasses must be registered before their subclasses, so the
/// ancestor chain of any type is finite.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named class. Registering an existing name returns the
    /// id it already has.
    pub fn register_class(&mut self, name: &str, superclass: Option<TypeId>) -> TypeId {
        self.register_named(name, TypeKind::Class, superclass)
    }

    /// Register a named module.
    pub fn register_module(&mut self, name: &str) -> TypeId {
        self.register_named(name, TypeKind::Module, None)
    }

    /// Register a class without a declared name (e.g. built at runtime).
    pub fn register_anonymous_class(&mut self, superclass: Option<TypeId>) -> TypeId {
        self.push(TypeInfo {
            name: None,
            kind: TypeKind::Class,
            superclass: superclass.filter(|id| *id < self.types.len()),
            source_file: None,
        })
    }

    /// Record the file a type is declared in.
    pub fn set_source_file(&mut self, id: TypeId, path: &str) {
        if let Some(info) = self.types.get_mut(id) {
            info.source_file = Some(path.to_string());
        }
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(id)
    }

    /// Look up a type by any spelling of its name.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(&normalize_name(name)).copied()
    }

    pub fn name_of(&self, id: TypeId) -> Option<&str> {
        self.get(id).and_then(|info| info.name.as_deref())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type itself followed by its superclasses, nearest first.
    /// Modules yield only themselves.
    pub fn ancestors(&self, id: TypeId) -> Ancestors<'_> {
        Ancestors {
            registry: self,
            next: self.get(id).map(|_| id),
        }
    }

    fn register_named(&mut self, name: &str, kind: TypeKind, superclass: Option<TypeId>) -> TypeId {
        let name = normalize_name(name);
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }

        let superclass = superclass.filter(|id| *id < self.types.len());
        let id = self.push(TypeInfo {
            name: Some(name.clone()),
            kind,
            superclass,
            source_file: None,
        });
        self.by_name.insert(name, id);
        id
    }

    fn push(&mut self, info: TypeInfo) -> TypeId {
        self.types.push(info);
        self.types.len() - 1
    }
}

/// Iterator over a type and its superclass chain.
pub struct Ancestors<'a> {
    registry: &'a TypeRegistry,
    next: Option<TypeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = (TypeId, &'a TypeInfo);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let info = self.registry.get(id)?;
        self.next = if info.is_class() { info.superclass } else { None };
        Some((id, info))
    }
}
