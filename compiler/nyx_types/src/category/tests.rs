use super::*;
use crate::{ExtensionId, IntWidth};

#[test]
fn builtin_categories() {
    let table = CategoryTable::new();

    assert!(TypeCategory::Any.matches(&TypeDesc::Bool, &table));
    assert!(TypeCategory::AnyInt.matches(&TypeDesc::U16, &table));
    assert!(!TypeCategory::AnyInt.matches(&TypeDesc::F32, &table));
    assert!(TypeCategory::AnySignedInt.matches(&TypeDesc::I64, &table));
    assert!(!TypeCategory::AnySignedInt.matches(&TypeDesc::U64, &table));
    assert!(TypeCategory::AnyFloat.matches(&TypeDesc::F64, &table));
    assert!(TypeCategory::AnyNumber.matches(&TypeDesc::F32, &table));
    assert!(TypeCategory::AnyNumber.matches(&TypeDesc::I8, &table));
    assert!(!TypeCategory::AnyNumber.matches(&TypeDesc::Range(IntWidth::W32), &table));
}

#[test]
fn registered_predicate_decides_membership() {
    let mut table = CategoryTable::new();
    let ranges = table.define("any-range", Box::new(|d| matches!(d, TypeDesc::Range(_))));

    let cat = TypeCategory::Registered(ranges);
    assert!(cat.matches(&TypeDesc::Range(IntWidth::W64), &table));
    assert!(!cat.matches(&TypeDesc::I64, &table));
    assert_eq!(table.name(ranges), Some("any-range"));
    assert_eq!(cat.describe(&table), "any-range");
}

#[test]
fn extension_types_route_through_predicates() {
    let mut table = CategoryTable::new();
    let even_exts = table.define(
        "even-extensions",
        Box::new(|d| matches!(d, TypeDesc::Extension(id) if id.index() % 2 == 0)),
    );

    let cat = TypeCategory::Registered(even_exts);
    assert!(cat.matches(&TypeDesc::Extension(ExtensionId(4)), &table));
    assert!(!cat.matches(&TypeDesc::Extension(ExtensionId(3)), &table));
}

#[test]
fn unknown_ids_match_nothing() {
    let mut scratch = CategoryTable::new();
    let id = scratch.define("anything", Box::new(|_| true));

    let empty = CategoryTable::new();
    assert!(!TypeCategory::Registered(id).matches(&TypeDesc::I32, &empty));
    assert_eq!(TypeCategory::Registered(id).describe(&empty), "category#0");
}
