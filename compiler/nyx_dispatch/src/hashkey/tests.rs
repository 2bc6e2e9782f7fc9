#![allow(clippy::unwrap_used)]

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use nyx_types::{HashFailure, TypeDesc, TypeLike};

use super::HashKey;

/// An extension value whose hash is counted and can be made to fail, and
/// whose equality only covers values of its own kind.
struct Ext {
    tag: u32,
    fail_hash: bool,
    hashes: AtomicUsize,
}

impl Ext {
    fn new(tag: u32) -> Arc<dyn TypeLike> {
        Arc::new(Ext {
            tag,
            fail_hash: false,
            hashes: AtomicUsize::new(0),
        })
    }

    fn failing(tag: u32) -> Arc<dyn TypeLike> {
        Arc::new(Ext {
            tag,
            fail_hash: true,
            hashes: AtomicUsize::new(0),
        })
    }
}

impl TypeLike for Ext {
    fn type_hash(&self) -> Result<u64, HashFailure> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        if self.fail_hash {
            Err(HashFailure::new(format!("ext#{} is unhashable", self.tag)))
        } else {
            Ok(u64::from(self.tag).wrapping_mul(0x9e37_79b9))
        }
    }

    fn type_eq(&self, other: &dyn TypeLike) -> Option<bool> {
        other
            .as_any()
            .downcast_ref::<Ext>()
            .map(|other| self.tag == other.tag)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> String {
        format!("ext#{}", self.tag)
    }

    fn descriptor(&self) -> Option<TypeDesc> {
        None
    }
}

/// Flips a flag on drop so the wrapper's ownership is observable.
struct DropProbe {
    dropped: Arc<AtomicBool>,
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

impl TypeLike for DropProbe {
    fn type_hash(&self) -> Result<u64, HashFailure> {
        Ok(7)
    }

    fn type_eq(&self, _other: &dyn TypeLike) -> Option<bool> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> String {
        "drop-probe".to_owned()
    }

    fn descriptor(&self) -> Option<TypeDesc> {
        None
    }
}

fn desc(desc: TypeDesc) -> Arc<dyn TypeLike> {
    Arc::new(desc)
}

#[test]
fn equal_values_compare_equal_across_wrappers() {
    let a = desc(TypeDesc::I64);
    let b = desc(TypeDesc::I64);
    let ka = HashKey::wrap(&a);
    let kb = HashKey::wrap(&b);
    assert!(!ka.same_wrapper(&kb));
    assert_eq!(ka, kb);
    assert_eq!(ka.hash_value().unwrap(), kb.hash_value().unwrap());
}

#[test]
fn distinct_values_compare_unequal() {
    let a = desc(TypeDesc::I64);
    let b = desc(TypeDesc::F64);
    assert_ne!(HashKey::wrap(&a), HashKey::wrap(&b));
}

#[test]
fn hash_is_computed_at_most_once() {
    let value = Ext::new(3);
    let key = HashKey::wrap(&value);
    let first = key.hash_value().unwrap();
    assert_eq!(key.hash_value().unwrap(), first);
    assert_eq!(key.clone().hash_value().unwrap(), first);
    let ext = value.as_any().downcast_ref::<Ext>().unwrap();
    assert_eq!(ext.hashes.load(Ordering::SeqCst), 1);
}

#[test]
fn hash_failure_is_cached_and_replayed() {
    let value = Ext::failing(9);
    let key = HashKey::wrap(&value);
    let first = key.hash_value().unwrap_err();
    let second = key.hash_value().unwrap_err();
    assert_eq!(first, second);
    assert!(first.message().contains("ext#9"));
    let ext = value.as_any().downcast_ref::<Ext>().unwrap();
    assert_eq!(ext.hashes.load(Ordering::SeqCst), 1);
}

#[test]
fn wrapping_a_wrapper_is_idempotent() {
    let value = Ext::new(1);
    let key = HashKey::wrap(&value);
    let as_value: Arc<dyn TypeLike> = Arc::new(key.clone());
    let rewrapped = HashKey::wrap(&as_value);
    assert!(key.same_wrapper(&rewrapped));
}

#[test]
fn incomparable_values_fall_back_to_identity() {
    let ext = Ext::new(4);
    let plain = desc(TypeDesc::I64);
    let ka = HashKey::wrap(&ext);
    let kb = HashKey::wrap(&plain);
    // Ext cannot compare to TypeDesc and TypeDesc cannot downcast Ext, so
    // only identity remains.
    assert_ne!(ka, kb);
    let ka2 = HashKey::wrap(&ext);
    assert_eq!(ka, ka2);
}

#[test]
fn wrapper_keeps_the_value_alive() {
    let dropped = Arc::new(AtomicBool::new(false));
    let value: Arc<dyn TypeLike> = Arc::new(DropProbe {
        dropped: Arc::clone(&dropped),
    });
    let key = HashKey::wrap(&value);
    drop(value);
    // The wrapper is the sole owner now; the value must not be reclaimed
    // out from under it.
    assert!(!dropped.load(Ordering::SeqCst));
    assert_eq!(key.hash_value().unwrap(), 7);
    drop(key);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn keys_stay_comparable_after_the_caller_drops_its_handles() {
    // Wrappers built from transient handles must keep working: equality
    // and hashing cannot depend on the call site pinning the values.
    let ka = {
        let a = desc(TypeDesc::I64);
        HashKey::wrap(&a)
    };
    let kb = {
        let b = desc(TypeDesc::I64);
        HashKey::wrap(&b)
    };
    assert_eq!(ka, kb);
    assert_eq!(ka.hash_value().unwrap(), kb.hash_value().unwrap());
    assert_ne!(ka, {
        let c = desc(TypeDesc::I32);
        HashKey::wrap(&c)
    });
}

#[test]
fn wrapper_compares_against_raw_values() {
    let value = Ext::new(8);
    let key = HashKey::wrap(&value);
    let equal = Ext::new(8);
    let other = Ext::new(2);
    assert_eq!(key.type_eq(equal.as_ref()), Some(true));
    assert_eq!(key.type_eq(other.as_ref()), Some(false));
}

#[test]
fn wrapper_reports_the_wrapped_name() {
    let value = Ext::new(11);
    let key = HashKey::wrap(&value);
    drop(value);
    assert_eq!(key.type_name(), "ext#11");
}
