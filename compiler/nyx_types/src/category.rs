//! Pattern categories for lowering selection.
//!
//! A lowering implementation can be registered against an exact descriptor
//! tuple or against categories ("any integer" matches `i8` through `u64`).
//! Built-in categories are closed variants; user-defined types participate
//! through predicates registered in a [`CategoryTable`] (owned by the
//! operation registry and populated during its registration phase).

use std::fmt;

use crate::TypeDesc;

/// Identity of a registered category predicate.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CategoryId(u32);

impl CategoryId {
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Membership predicate for a registered category.
pub type CategoryPredicate = Box<dyn Fn(&TypeDesc) -> bool + Send + Sync>;

struct CategoryDef {
    name: String,
    predicate: CategoryPredicate,
}

/// Table of user-registered category predicates.
///
/// Append-only; populated single-threaded during registration, read-only
/// afterwards.
#[derive(Default)]
pub struct CategoryTable {
    defs: Vec<CategoryDef>,
}

impl CategoryTable {
    pub fn new() -> Self {
        CategoryTable { defs: Vec::new() }
    }

    /// Define a new category and return its handle.
    pub fn define(&mut self, name: impl Into<String>, predicate: CategoryPredicate) -> CategoryId {
        let id = CategoryId(u32::try_from(self.defs.len()).unwrap_or(u32::MAX));
        self.defs.push(CategoryDef {
            name: name.into(),
            predicate,
        });
        id
    }

    /// Name of a registered category, if the id is valid.
    pub fn name(&self, id: CategoryId) -> Option<&str> {
        self.defs.get(id.0 as usize).map(|d| d.name.as_str())
    }

    /// Does `desc` belong to the registered category `id`?
    ///
    /// Unknown ids match nothing.
    pub fn contains(&self, id: CategoryId, desc: &TypeDesc) -> bool {
        self.defs
            .get(id.0 as usize)
            .is_some_and(|d| (d.predicate)(desc))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl fmt::Debug for CategoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryTable")
            .field("defs", &self.defs.iter().map(|d| &d.name).collect::<Vec<_>>())
            .finish()
    }
}

/// A type-category wildcard in a lowering pattern.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeCategory {
    /// Matches every descriptor.
    Any,
    /// Any fixed-width integer.
    AnyInt,
    /// Any signed integer.
    AnySignedInt,
    /// Any unsigned integer.
    AnyUnsignedInt,
    /// Any floating-point type.
    AnyFloat,
    /// Any integer or float.
    AnyNumber,
    /// A category defined by a registered predicate.
    Registered(CategoryId),
}

impl TypeCategory {
    /// Does `desc` belong to this category?
    pub fn matches(&self, desc: &TypeDesc, table: &CategoryTable) -> bool {
        match self {
            TypeCategory::Any => true,
            TypeCategory::AnyInt => desc.is_integer(),
            TypeCategory::AnySignedInt => desc.is_signed_integer(),
            TypeCategory::AnyUnsignedInt => desc.is_unsigned_integer(),
            TypeCategory::AnyFloat => desc.is_float(),
            TypeCategory::AnyNumber => desc.is_number(),
            TypeCategory::Registered(id) => table.contains(*id, desc),
        }
    }

    /// Human-readable name, for diagnostics.
    pub fn describe(&self, table: &CategoryTable) -> String {
        match self {
            TypeCategory::Any => "any".to_owned(),
            TypeCategory::AnyInt => "any-int".to_owned(),
            TypeCategory::AnySignedInt => "any-signed-int".to_owned(),
            TypeCategory::AnyUnsignedInt => "any-unsigned-int".to_owned(),
            TypeCategory::AnyFloat => "any-float".to_owned(),
            TypeCategory::AnyNumber => "any-number".to_owned(),
            TypeCategory::Registered(id) => table
                .name(*id)
                .map_or_else(|| format!("category#{}", id.index()), str::to_owned),
        }
    }
}

#[cfg(test)]
mod tests;
