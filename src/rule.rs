//! Match rules: composable boolean predicates over [`Value`]s.
//!
//! A [`MatchRule`] is an immutable expression tree. Combinators never mutate
//! their operands; they return a new rule that closes over both sides, so one
//! rule can be shared by many searches and threads.
//!
//! # Example
//!
//! ```rust
//! use rummage::{MatchRule, Object, Value};
//!
//! let rule = MatchRule::contains_property("id")
//!     .and(MatchRule::contains_property_value("kind", "frame"));
//!
//! let node: Value = Object::new().with("id", 7).with("kind", "frame").into();
//! assert!(rule.is_match(&node));
//! assert_eq!(
//!     rule.to_string(),
//!     r#"contains property named "id" and contains property named "kind" and kind value is "frame""#
//! );
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};
use std::sync::Arc;

use regex::Regex;

use crate::error::RummageError;
use crate::value::{Key, Value};

type Predicate = dyn Fn(&Value) -> bool + Send + Sync;

const UNDESCRIBED: &str = "not specified";

/// A composable predicate with a human-readable description.
#[derive(Clone)]
pub struct MatchRule {
    handler: Arc<Predicate>,
    desc: Option<Arc<str>>,
}

impl MatchRule {
    /// Create a described rule.
    pub fn rule(
        handler: impl Fn(&Value) -> bool + Send + Sync + 'static,
        desc: impl Into<String>,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            desc: Some(Arc::from(desc.into())),
        }
    }

    /// Wrap a bare predicate into an anonymous, undescribed rule.
    pub fn from_fn(handler: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            desc: None,
        }
    }

    /// A rule that matches nothing.
    pub fn never() -> Self {
        Self::rule(|_| false, "never")
    }

    /// A rule that matches every value.
    pub fn always() -> Self {
        Self::rule(|_| true, "always")
    }

    /// Evaluate this rule against `value`.
    pub fn is_match(&self, value: &Value) -> bool {
        (self.handler)(value)
    }

    /// The rule's description, `"not specified"` when it has none.
    pub fn description(&self) -> &str {
        self.desc.as_deref().unwrap_or(UNDESCRIBED)
    }

    // ── Combinators ───────────────────────────────────────────────────────

    fn combine(
        &self,
        other: MatchRule,
        desc: String,
        op: fn(&MatchRule, &MatchRule, &Value) -> bool,
    ) -> Self {
        let lhs = self.clone();
        Self::rule(move |value| op(&lhs, &other, value), desc)
    }

    /// True iff both rules match.
    #[must_use]
    pub fn and(&self, other: impl Into<MatchRule>) -> Self {
        let other = other.into();
        let desc = format!("{self} and {other}");
        self.combine(other, desc, |a, b, v| a.is_match(v) && b.is_match(v))
    }

    /// True iff either rule matches.
    #[must_use]
    pub fn or(&self, other: impl Into<MatchRule>) -> Self {
        let other = other.into();
        let desc = format!("{self} or {other}");
        self.combine(other, desc, |a, b, v| a.is_match(v) || b.is_match(v))
    }

    /// True iff exactly one rule matches. Both sides are always evaluated.
    #[must_use]
    pub fn xor(&self, other: impl Into<MatchRule>) -> Self {
        let other = other.into();
        let desc = format!("{self}, different of, {other}");
        self.combine(other, desc, |a, b, v| a.is_match(v) ^ b.is_match(v))
    }

    // ── Null / equality ───────────────────────────────────────────────────

    /// Matches `Null` and `Undefined`.
    pub fn is_null() -> Self {
        Self::rule(Value::is_nullish, "is null")
    }

    /// Exact complement of [`is_null`](Self::is_null).
    pub fn is_not_null() -> Self {
        Self::rule(|v| !v.is_nullish(), "is not null")
    }

    /// Strict equality; objects compare by identity.
    pub fn equals(other: impl Into<Value>) -> Self {
        let other = other.into();
        let desc = format!("equals to {other}");
        Self::rule(move |v| *v == other, desc)
    }

    pub fn not_equals(other: impl Into<Value>) -> Self {
        let other = other.into();
        let desc = format!("not equals to {other}");
        Self::rule(move |v| *v != other, desc)
    }

    // ── Strings ───────────────────────────────────────────────────────────

    /// Compare `comp` against the candidate as text; matches when
    /// `comp.cmp(candidate)` under `sensitivity` equals `expected`.
    pub fn compare_string(
        comp: impl Into<String>,
        sensitivity: Sensitivity,
        expected: Ordering,
    ) -> Self {
        let comp = comp.into();
        let desc = match expected {
            Ordering::Equal => {
                format!("compare as {sensitivity} text and must be equals to \"{comp}\"")
            }
            Ordering::Less => {
                format!("compare as {sensitivity} text and must be greater than \"{comp}\"")
            }
            Ordering::Greater => {
                format!("compare as {sensitivity} text and must be lower than \"{comp}\"")
            }
        };
        Self::rule(
            move |v| text_of(v).is_some_and(|text| sensitivity.compare(&comp, &text) == expected),
            desc,
        )
    }

    pub fn string_equals(comp: impl Into<String>, sensitivity: Sensitivity) -> Self {
        let comp = comp.into();
        let desc = format!("as text is equals to {comp} (sensitivity mode as \"{sensitivity}\")");
        Self::rule(
            move |v| {
                text_of(v).is_some_and(|text| sensitivity.compare(&comp, &text) == Ordering::Equal)
            },
            desc,
        )
    }

    /// Non-text candidates never match.
    pub fn string_not_equals(comp: impl Into<String>, sensitivity: Sensitivity) -> Self {
        let comp = comp.into();
        let desc = format!("string not equals to {comp} (sensitivity mode as \"{sensitivity}\")");
        Self::rule(
            move |v| {
                text_of(v).is_some_and(|text| sensitivity.compare(&comp, &text) != Ordering::Equal)
            },
            desc,
        )
    }

    // ── Properties ────────────────────────────────────────────────────────

    pub fn contains_property(key: impl Into<Key>) -> Self {
        let key = key.into();
        let desc = format!("contains property named \"{key}\"");
        Self::rule(move |v| v.has_property(&key), desc)
    }

    /// # Errors
    ///
    /// [`RummageError::InvalidArgument`] when `keys` is empty.
    pub fn contains_any_property<K: Into<Key>>(
        keys: impl IntoIterator<Item = K>,
    ) -> Result<Self, RummageError> {
        fold_required(
            keys,
            "property names are required",
            |key: Key| Self::contains_property(key),
            |acc, next| acc.or(next),
        )
    }

    /// # Errors
    ///
    /// [`RummageError::InvalidArgument`] when `keys` is empty.
    pub fn contains_all_property<K: Into<Key>>(
        keys: impl IntoIterator<Item = K>,
    ) -> Result<Self, RummageError> {
        fold_required(
            keys,
            "property names are required",
            |key: Key| Self::contains_property(key),
            |acc, next| acc.and(next),
        )
    }

    /// The property exists and strictly equals `value`.
    pub fn contains_property_value(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        let desc = format!("{key} value is \"{value}\"");
        let lookup = key.clone();
        Self::contains_property(key).and(Self::rule(
            move |v| v.get_or_undefined(&lookup) == value,
            desc,
        ))
    }

    /// # Errors
    ///
    /// [`RummageError::InvalidArgument`] when `values` is empty.
    pub fn contains_property_some_value<V: Into<Value>>(
        key: impl Into<Key>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, RummageError> {
        let key = key.into();
        fold_required(
            values,
            "property values are required",
            |value: Value| Self::contains_property_value(key.clone(), value),
            |acc, next| acc.or(next),
        )
    }

    /// The property exists, is not null, and equals `value` as text.
    pub fn contains_property_value_string(
        key: impl Into<Key>,
        value: impl Into<String>,
        sensitivity: Sensitivity,
    ) -> Self {
        let key = key.into();
        let value = value.into();
        let desc = format!(
            "Property \"{key}\" value as text is equals to \"{value}\" (sensitivity mode as {sensitivity})"
        );
        let inner = Self::is_not_null().and(Self::string_equals(value, sensitivity));
        let lookup = key.clone();
        Self::contains_property(key).and(Self::rule(
            move |v| inner.is_match(&v.get_or_undefined(&lookup)),
            desc,
        ))
    }

    /// # Errors
    ///
    /// [`RummageError::InvalidArgument`] when `values` is empty.
    pub fn contains_property_some_value_string<S: Into<String>>(
        key: impl Into<Key>,
        values: impl IntoIterator<Item = S>,
        sensitivity: Sensitivity,
    ) -> Result<Self, RummageError> {
        let key = key.into();
        fold_required(
            values,
            "property values are required",
            |value: String| Self::contains_property_value_string(key.clone(), value, sensitivity),
            |acc, next| acc.or(next),
        )
    }

    // ── Types ─────────────────────────────────────────────────────────────

    /// Matches values whose [`Value::type_name`] equals `type_name`.
    pub fn type_of(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let desc = format!("type of equals {type_name}");
        Self::rule(move |v| v.type_name() == type_name, desc)
    }

    pub fn type_of_property(key: impl Into<Key>, type_name: impl Into<String>) -> Self {
        let key = key.into();
        let type_name = type_name.into();
        let desc = format!("{key} is of type \"{type_name}\"");
        let lookup = key.clone();
        Self::contains_property(key).and(Self::rule(
            move |v| v.get_or_undefined(&lookup).type_name() == type_name,
            desc,
        ))
    }

    /// Matches values whose constructor name is `class`. An empty name matches nothing.
    pub fn class_name(class: impl Into<String>) -> Self {
        let class = class.into();
        let desc = format!("constructor name equals \"{class}\"");
        Self::rule(
            move |v| !class.is_empty() && v.class_name().as_deref() == Some(class.as_str()),
            desc,
        )
    }

    /// Matches element-like nodes whose `tagName` equals `tag`, ignoring case.
    pub fn tag_name(tag: impl Into<String>) -> Self {
        let tag = tag.into().to_uppercase();
        let desc = format!("Tag name equals \"{tag}\"");
        let key = Key::from("tagName");
        let lookup = key.clone();
        Self::contains_property(key).and(Self::rule(
            move |v| {
                !tag.is_empty()
                    && v.get_or_undefined(&lookup)
                        .as_str()
                        .is_some_and(|t| t.to_uppercase() == tag)
            },
            desc,
        ))
    }

    // ── Patterns ──────────────────────────────────────────────────────────

    /// The property's value, converted to text, matches `pattern`.
    ///
    /// # Errors
    ///
    /// [`RummageError::InvalidPattern`] when `pattern` does not compile.
    pub fn match_pattern(key: impl Into<Key>, pattern: &str) -> Result<Self, RummageError> {
        let regex = Regex::new(pattern).map_err(|e| RummageError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self::match_regex(key, regex))
    }

    /// [`match_pattern`](Self::match_pattern) with a precompiled expression.
    pub fn match_regex(key: impl Into<Key>, regex: Regex) -> Self {
        let key = key.into();
        let desc = format!(
            "value of property \"{key}\" as \"string\" is matching to expression \"{regex}\""
        );
        let lookup = key.clone();
        Self::contains_property(key).and(Self::rule(
            move |v| {
                let value = v.get_or_undefined(&lookup);
                !value.is_nullish() && regex.is_match(&value.to_string())
            },
            desc,
        ))
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MatchRule").field(&self.description()).finish()
    }
}

impl<F> From<F> for MatchRule
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    fn from(handler: F) -> Self {
        Self::from_fn(handler)
    }
}

impl<R: Into<MatchRule>> BitAnd<R> for MatchRule {
    type Output = MatchRule;

    fn bitand(self, rhs: R) -> MatchRule {
        self.and(rhs)
    }
}

impl<R: Into<MatchRule>> BitOr<R> for MatchRule {
    type Output = MatchRule;

    fn bitor(self, rhs: R) -> MatchRule {
        self.or(rhs)
    }
}

impl<R: Into<MatchRule>> BitXor<R> for MatchRule {
    type Output = MatchRule;

    fn bitxor(self, rhs: R) -> MatchRule {
        self.xor(rhs)
    }
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

/// How strictly two strings are compared.
///
/// Mirrors the locale-comparison modes: `Base` and `Accent` ignore case,
/// `Case` and `Variant` compare exactly. Accent folding is not performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sensitivity {
    #[default]
    Base,
    Accent,
    Case,
    Variant,
}

impl Sensitivity {
    /// Compare `a` against `b`.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Base | Self::Accent => a.to_lowercase().cmp(&b.to_lowercase()),
            Self::Case | Self::Variant => a.cmp(b),
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base => "base",
            Self::Accent => "accent",
            Self::Case => "case",
            Self::Variant => "variant",
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Text form of a primitive candidate; reference values and nulls have none.
fn text_of(value: &Value) -> Option<String> {
    value.is_primitive().then(|| value.to_string())
}

/// Build one rule per item and fold them left with `join`.
fn fold_required<T, U>(
    items: impl IntoIterator<Item = T>,
    message: &str,
    mut build: impl FnMut(U) -> MatchRule,
    join: fn(&MatchRule, MatchRule) -> MatchRule,
) -> Result<MatchRule, RummageError>
where
    T: Into<U>,
{
    let mut items = items.into_iter().map(Into::into);
    let first = items.next().ok_or_else(|| RummageError::invalid(message))?;
    Ok(items.fold(build(first), |acc, item| join(&acc, build(item))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Array, Function, Object};

    fn samples() -> Vec<Value> {
        vec![
            Value::Undefined,
            Value::Null,
            Value::from(true),
            Value::from(0),
            Value::from(42),
            Value::from("42"),
            Value::from("Hello"),
            Value::from(Object::new().with("foo", 1)),
            Value::from(Array::from_iter([1, 2])),
            Value::from(Function::new("f", |_| Value::Null)),
        ]
    }

    fn operands() -> Vec<MatchRule> {
        vec![
            MatchRule::is_null(),
            MatchRule::equals(42),
            MatchRule::type_of("string"),
            MatchRule::contains_property("foo"),
            MatchRule::always(),
            MatchRule::never(),
        ]
    }

    #[test]
    fn combinators_follow_boolean_laws() {
        for a in operands() {
            for b in operands() {
                let and = a.and(b.clone());
                let or = a.or(b.clone());
                let xor = a.xor(b.clone());
                for v in samples() {
                    let (x, y) = (a.is_match(&v), b.is_match(&v));
                    assert_eq!(and.is_match(&v), x && y, "{and} on {v:?}");
                    assert_eq!(or.is_match(&v), x || y, "{or} on {v:?}");
                    assert_eq!(xor.is_match(&v), x ^ y, "{xor} on {v:?}");
                }
            }
        }
    }

    #[test]
    fn operators_match_methods() {
        let v = Value::from(42);
        let rule = (MatchRule::equals(42) | MatchRule::never()) & MatchRule::type_of("number");
        assert!(rule.is_match(&v));
        assert!(!(MatchRule::always() ^ MatchRule::always()).is_match(&v));
    }

    #[test]
    fn combinators_do_not_mutate_operands() {
        let a = MatchRule::equals(1);
        let before = a.to_string();
        let _ = a.and(MatchRule::equals(2)).or(MatchRule::equals(3));
        assert_eq!(a.to_string(), before);
        assert!(a.is_match(&Value::from(1)));
    }

    #[test]
    fn is_null_and_is_not_null_are_complements() {
        assert!(MatchRule::is_null().is_match(&Value::Null));
        assert!(MatchRule::is_null().is_match(&Value::Undefined));
        for v in samples() {
            assert_ne!(
                MatchRule::is_null().is_match(&v),
                MatchRule::is_not_null().is_match(&v)
            );
        }
    }

    #[test]
    fn bare_predicates_are_wrapped_undescribed() {
        let rule = MatchRule::equals(42).and(|v: &Value| v.as_f64().is_some());
        assert!(rule.is_match(&Value::from(42)));
        assert_eq!(rule.description(), "equals to 42 and not specified");
        assert_eq!(MatchRule::from_fn(|_| true).description(), "not specified");
    }

    #[test]
    fn descriptions_compose() {
        let rule = MatchRule::is_null().xor(MatchRule::equals("x"));
        assert_eq!(rule.to_string(), "is null, different of, equals to x");
    }

    #[test]
    fn equality_is_strict() {
        assert!(MatchRule::equals(42).is_match(&Value::from(42)));
        assert!(!MatchRule::equals(42).is_match(&Value::from("42")));
        assert!(MatchRule::not_equals(42).is_match(&Value::from("42")));
    }

    #[test]
    fn string_sensitivity() {
        let base = MatchRule::string_equals("hello", Sensitivity::Base);
        let exact = MatchRule::string_equals("hello", Sensitivity::Variant);
        let hello = Value::from("Hello");

        assert!(base.is_match(&hello));
        assert!(!exact.is_match(&hello));
        assert!(MatchRule::string_not_equals("hello", Sensitivity::Case).is_match(&hello));
        assert!(!MatchRule::string_not_equals("hello", Sensitivity::Base).is_match(&hello));
        // Objects are not text.
        assert!(!base.is_match(&Value::from(Object::new())));
        // Numbers are compared through their text form.
        assert!(MatchRule::string_equals("42", Sensitivity::Base).is_match(&Value::from(42)));
    }

    #[test]
    fn compare_string_ordering() {
        let lower = MatchRule::compare_string("b", Sensitivity::Base, Ordering::Greater);
        let greater = MatchRule::compare_string("b", Sensitivity::Base, Ordering::Less);
        assert!(lower.is_match(&Value::from("a")));
        assert!(greater.is_match(&Value::from("C")));
        assert!(!greater.is_match(&Value::from("a")));
    }

    #[test]
    fn multi_property_rules() {
        let node = Value::from(Object::new().with("a", 1).with("b", 2));

        let any = MatchRule::contains_any_property(["x", "b"]).unwrap();
        let all = MatchRule::contains_all_property(["a", "b"]).unwrap();
        let missing = MatchRule::contains_all_property(["a", "z"]).unwrap();

        assert!(any.is_match(&node));
        assert!(all.is_match(&node));
        assert!(!missing.is_match(&node));
    }

    #[test]
    fn empty_argument_lists_are_rejected() {
        let none: [&str; 0] = [];
        assert!(matches!(
            MatchRule::contains_any_property(none),
            Err(RummageError::InvalidArgument(_))
        ));
        assert!(MatchRule::contains_all_property(none).is_err());
        assert!(MatchRule::contains_property_some_value("k", Vec::<Value>::new()).is_err());
        assert!(MatchRule::contains_property_some_value_string("k", none, Sensitivity::Base)
            .is_err());
    }

    #[test]
    fn property_value_rules() {
        let node = Value::from(Object::new().with("kind", "FRAME").with("size", 3));

        assert!(MatchRule::contains_property_value("size", 3).is_match(&node));
        assert!(!MatchRule::contains_property_value("size", 4).is_match(&node));
        assert!(MatchRule::contains_property_some_value("size", [1, 2, 3])
            .unwrap()
            .is_match(&node));
        assert!(
            MatchRule::contains_property_value_string("kind", "frame", Sensitivity::Base)
                .is_match(&node)
        );
        assert!(MatchRule::contains_property_some_value_string(
            "kind",
            ["group", "frame"],
            Sensitivity::Accent
        )
        .unwrap()
        .is_match(&node));
        assert!(
            !MatchRule::contains_property_value_string("missing", "x", Sensitivity::Base)
                .is_match(&node)
        );
    }

    #[test]
    fn type_rules() {
        let node = Value::from(Object::with_class("FrameNode").with("name", "hero"));

        assert!(MatchRule::type_of("object").is_match(&node));
        assert!(MatchRule::type_of_property("name", "string").is_match(&node));
        assert!(MatchRule::class_name("FrameNode").is_match(&node));
        assert!(!MatchRule::class_name("").is_match(&node));
        assert!(!MatchRule::class_name("PageNode").is_match(&node));
    }

    #[test]
    fn tag_name_ignores_case() {
        let div = Value::from(Object::with_class("HTMLDivElement").with("tagName", "DIV"));
        assert!(MatchRule::tag_name("div").is_match(&div));
        assert!(!MatchRule::tag_name("span").is_match(&div));
    }

    #[test]
    fn pattern_rules() {
        let node = Value::from(Object::new().with("id", 1234).with("name", "invoice_jan"));

        assert!(MatchRule::match_pattern("name", "^invoice_").unwrap().is_match(&node));
        assert!(MatchRule::match_pattern("id", r"^\d{4}$").unwrap().is_match(&node));
        assert!(!MatchRule::match_pattern("missing", ".*").unwrap().is_match(&node));

        let err = MatchRule::match_pattern("name", "(").unwrap_err();
        assert!(matches!(err, RummageError::InvalidPattern { .. }));
    }
}
