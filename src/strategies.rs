//! Built-in strategies.
//!
//! The drill-down family differs only in which keys it enumerates: plain
//! keys, all own keys, or a fixed list of parent links. [`ClassDrillDown`]
//! recognises node kinds by class name instead of enumerating.

use std::ops::ControlFlow;

use tracing::trace;

use crate::error::RummageError;
use crate::traits::{Params, Strategy};
use crate::value::{Key, Value};

/// Notify every readable property of the target listed in `keys`.
///
/// Primitives, callables and nulls are never opened.
fn drill(params: &mut Params<'_>, keys: Vec<Key>) -> Result<(), RummageError> {
    let target = params.target().clone();
    if target.is_primitive() || target.is_nullish() || target.is_callable() {
        return Ok(());
    }
    for key in keys {
        let value = match target.get(&key) {
            Ok(value) => value,
            Err(err) => {
                trace!(%key, error = %err, "skipping unreadable property");
                continue;
            }
        };
        if params.notify(key, value).is_break() {
            break;
        }
    }
    Ok(())
}

/// Drills into enumerable keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyPropertyDrillDown;

impl Strategy for KeyPropertyDrillDown {
    fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
        let keys = params.target().keys();
        drill(params, keys)
    }
}

/// Drills into all own keys, enumerable or not.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnPropertyDrillDown;

impl Strategy for OwnPropertyDrillDown {
    fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
        let keys = params.target().own_keys();
        drill(params, keys)
    }
}

/// Walks upwards through `parent`, `parentNode` and `parentElement`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyDrillUp;

impl PropertyDrillUp {
    pub const LINKS: [&'static str; 3] = ["parent", "parentNode", "parentElement"];
}

impl Strategy for PropertyDrillUp {
    fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
        let keys = Self::LINKS.iter().map(|&link| Key::from(link)).collect();
        drill(params, keys)
    }
}

/// Opens nodes of one class through one key.
///
/// A node whose class name is `class` reports its `key` property (by
/// default `children`) when that property is present and not a callable.
/// Everything else is ignored.
#[derive(Debug, Clone)]
pub struct ClassDrillDown {
    class: String,
    key: Key,
}

impl ClassDrillDown {
    pub fn new(class: impl Into<String>) -> Self {
        Self::with_key(class, "children")
    }

    pub fn with_key(class: impl Into<String>, key: impl Into<Key>) -> Self {
        Self {
            class: class.into(),
            key: key.into(),
        }
    }
}

impl Strategy for ClassDrillDown {
    fn name(&self) -> &str {
        &self.class
    }

    fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
        let target = params.target();
        if target.class_name().as_deref() != Some(self.class.as_str()) {
            return Ok(());
        }
        let value = match target.get(&self.key) {
            Ok(value) => value,
            Err(err) => {
                trace!(key = %self.key, error = %err, "skipping unreadable property");
                return Ok(());
            }
        };
        if !value.is_truthy() {
            return Ok(());
        }
        let _: ControlFlow<()> = params.notify(self.key.clone(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Function, HostObject, Object};

    fn collect(strategy: &dyn Strategy, target: &Value) -> Vec<(String, Value)> {
        let mut seen = Vec::new();
        let mut sink = |key: Key, value: Value| {
            seen.push((key.to_string(), value));
            ControlFlow::Continue(())
        };
        strategy
            .run(&mut Params::new(target, &mut sink))
            .unwrap();
        seen
    }

    fn keys(seen: &[(String, Value)]) -> Vec<&str> {
        seen.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn key_drill_down_sees_enumerable_only() {
        let target = Value::from(
            Object::new()
                .with("a", 1)
                .with_hidden("hidden", 2)
                .with("f", Function::new("f", |_| Value::Null)),
        );
        let seen = collect(&KeyPropertyDrillDown, &target);
        assert_eq!(keys(&seen), ["a"]);
    }

    #[test]
    fn own_drill_down_sees_hidden_too() {
        let target = Value::from(Object::new().with("a", 1).with_hidden("hidden", 2));
        let seen = collect(&OwnPropertyDrillDown, &target);
        assert_eq!(keys(&seen), ["a", "hidden"]);
    }

    #[test]
    fn primitives_are_not_opened() {
        assert!(collect(&KeyPropertyDrillDown, &Value::from("abc")).is_empty());
        assert!(collect(&OwnPropertyDrillDown, &Value::from(3)).is_empty());
        assert!(collect(&KeyPropertyDrillDown, &Value::Null).is_empty());
    }

    #[test]
    fn drill_up_reports_parent_links_in_order() {
        let parent = Object::new().with("id", "root");
        let target = Value::from(Object::new().with("parentNode", parent.clone()));
        let seen = collect(&PropertyDrillUp, &target);

        assert_eq!(keys(&seen), ["parent", "parentNode", "parentElement"]);
        assert_eq!(seen[1].1, Value::from(parent));
        assert_eq!(seen[0].1, Value::Undefined);
    }

    #[test]
    fn class_drill_down_recognises_its_class() {
        let children: Value = vec![Value::from(1)].into();
        let frame = Value::from(Object::with_class("FrameNode").with("children", children.clone()));
        let page = Value::from(Object::with_class("PageNode").with("children", children.clone()));

        let strategy = ClassDrillDown::new("FrameNode");
        assert_eq!(collect(&strategy, &frame), vec![("children".to_owned(), children)]);
        assert!(collect(&strategy, &page).is_empty());
        assert_eq!(strategy.name(), "FrameNode");
    }

    #[derive(Debug)]
    struct Sealed;

    impl HostObject for Sealed {
        fn class_name(&self) -> &str {
            "FrameNode"
        }

        fn keys(&self) -> Vec<Key> {
            vec![Key::from("children")]
        }

        fn get(&self, key: &Key) -> Result<Value, RummageError> {
            Err(RummageError::PropertyAccess {
                key: key.to_string(),
                reason: "sealed".into(),
            })
        }
    }

    #[test]
    fn unreadable_properties_are_skipped_silently() {
        let sealed = Value::host(Sealed);
        assert!(collect(&ClassDrillDown::new("FrameNode"), &sealed).is_empty());
        assert!(collect(&KeyPropertyDrillDown, &sealed).is_empty());
    }

    #[test]
    fn class_drill_down_skips_falsy_children() {
        let strategy = ClassDrillDown::new("FrameNode");
        for falsy in [Value::from(false), Value::from(0), Value::from(""), Value::Null] {
            let frame = Value::from(Object::with_class("FrameNode").with("children", falsy));
            assert!(collect(&strategy, &frame).is_empty());
        }
        let frame = Value::from(Object::with_class("FrameNode").with("children", "text"));
        assert_eq!(keys(&collect(&strategy, &frame)), ["children"]);
    }

    #[test]
    fn break_stops_enumeration() {
        let target = Value::from(Object::new().with("a", 1).with("b", 2).with("c", 3));
        let mut seen = 0;
        let mut sink = |_: Key, _: Value| {
            seen += 1;
            ControlFlow::Break(())
        };
        KeyPropertyDrillDown
            .run(&mut Params::new(&target, &mut sink))
            .unwrap();
        assert_eq!(seen, 1);
    }
}
