use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::RummageError;

/// The name of a property, or the index of an element.
///
/// Intentionally generic: object properties, array slots, directory entry
/// names and host-specific accessors all map onto one of the two variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named property.
    Name(String),

    /// A position in an indexed collection.
    Index(usize),
}

impl Key {
    /// The key rendered as a property name (`3` becomes `"3"`).
    pub fn as_name(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::Name(name) => std::borrow::Cow::Borrowed(name),
            Self::Index(index) => std::borrow::Cow::Owned(index.to_string()),
        }
    }

    fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Name(name) => name.parse().ok(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

// ---------------------------------------------------------------------------
// HostObject
// ---------------------------------------------------------------------------

/// A foreign object model exposed to the engine by reflection.
///
/// Implement this to make rummage search anything that is not built from
/// [`Object`] and [`Array`]: document trees, filesystem entries, handles
/// into another runtime.
///
/// # Error Handling
///
/// `get` may fail for individual properties (permission checks, lazy loads).
/// Strategies skip such properties rather than aborting the node.
pub trait HostObject: Send + Sync + fmt::Debug {
    /// Class name used by [`MatchRule::class_name`](crate::MatchRule::class_name)
    /// and by structural strategies to recognise node kinds.
    fn class_name(&self) -> &str;

    /// Enumerable keys, in enumeration order.
    fn keys(&self) -> Vec<Key>;

    /// All own keys, enumerable or not. Defaults to [`keys`](Self::keys).
    fn own_keys(&self) -> Vec<Key> {
        self.keys()
    }

    /// Read one property. Absent properties yield [`Value::Undefined`].
    fn get(&self, key: &Key) -> Result<Value, RummageError>;

    /// Whether `key` is an own property of this object.
    fn has(&self, key: &Key) -> bool {
        self.own_keys().contains(key)
    }

    /// Text form used when the value is compared as a string.
    fn describe(&self) -> String {
        format!("[object {}]", self.class_name())
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A node of the searched graph.
///
/// Primitive variants compare by value; reference variants (`Array`,
/// `Object`, `Function`, `Host`) compare by identity, so the same object
/// reached through two routes is recognised as one value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Array),
    Object(Object),
    Function(Function),
    Host(Arc<dyn HostObject>),
}

impl Value {
    /// Wrap a host object.
    pub fn host(object: impl HostObject + 'static) -> Self {
        Self::Host(Arc::new(object))
    }

    /// `true` for `Null` and `Undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// `false` for `Undefined`, `Null`, `false`, `0`, `NaN` and `""`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Hashable form of this value's equality. `None` for `NaN`, which
    /// equals nothing.
    pub(crate) fn identity(&self) -> Option<Identity> {
        Some(match self {
            Self::Undefined => Identity::Undefined,
            Self::Null => Identity::Null,
            Self::Bool(b) => Identity::Bool(*b),
            Self::Number(n) if n.is_nan() => return None,
            // `+ 0.0` folds -0 into 0.
            Self::Number(n) => Identity::Number((n + 0.0).to_bits()),
            Self::String(s) => Identity::String(Arc::clone(s)),
            Self::Array(array) => Identity::Ref(Arc::as_ptr(&array.0).cast::<()>() as usize),
            Self::Object(object) => Identity::Ref(Arc::as_ptr(&object.0).cast::<()>() as usize),
            Self::Function(function) => {
                Identity::Ref(Arc::as_ptr(&function.body).cast::<()>() as usize)
            }
            Self::Host(host) => Identity::Ref(Arc::as_ptr(host).cast::<()>() as usize),
        })
    }

    /// Booleans, numbers and strings. Strategies never drill into these.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Number(_) | Self::String(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The `typeof` name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) | Self::Object(_) | Self::Host(_) => "object",
            Self::Function(_) => "function",
        }
    }

    /// The constructor name of this value, `None` for null and undefined.
    pub fn class_name(&self) -> Option<String> {
        let name = match self {
            Self::Undefined | Self::Null => return None,
            Self::Bool(_) => "Boolean",
            Self::Number(_) => "Number",
            Self::String(_) => "String",
            Self::Array(_) => "Array",
            Self::Object(object) => object.class_name(),
            Self::Function(_) => "Function",
            Self::Host(host) => host.class_name(),
        };
        Some(name.to_owned())
    }

    /// Enumerable keys in enumeration order. Empty for primitives.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Self::Array(array) => (0..array.len()).map(Key::Index).collect(),
            Self::Object(object) => object.keys(false),
            Self::Host(host) => host.keys(),
            _ => Vec::new(),
        }
    }

    /// All own keys, including non-enumerable ones such as an array's `length`.
    pub fn own_keys(&self) -> Vec<Key> {
        match self {
            Self::Array(array) => {
                let mut keys: Vec<Key> = (0..array.len()).map(Key::Index).collect();
                keys.push(Key::from("length"));
                keys
            }
            Self::Object(object) => object.keys(true),
            Self::Host(host) => host.own_keys(),
            _ => Vec::new(),
        }
    }

    /// Read a property. Missing properties read as `Undefined`.
    ///
    /// # Errors
    ///
    /// Only host objects fail, with [`RummageError::PropertyAccess`].
    pub fn get(&self, key: &Key) -> Result<Value, RummageError> {
        match self {
            Self::Array(array) => Ok(match key {
                Key::Name(name) if name == "length" => Value::from(array.len()),
                _ => key.as_index().and_then(|i| array.get(i)).unwrap_or_default(),
            }),
            Self::Object(object) => Ok(object.get(&key.as_name()).unwrap_or_default()),
            Self::Host(host) => host.get(key),
            Self::String(s) => Ok(match key {
                Key::Name(name) if name == "length" => Value::from(s.chars().count()),
                _ => Value::Undefined,
            }),
            _ => Ok(Value::Undefined),
        }
    }

    /// Property read for rule evaluation: unreadable properties read as `Undefined`.
    pub(crate) fn get_or_undefined(&self, key: &Key) -> Value {
        self.get(key).unwrap_or_default()
    }

    /// Whether `key` is an own property of this value.
    pub fn has_property(&self, key: &Key) -> bool {
        match self {
            Self::Array(array) => match key {
                Key::Name(name) if name == "length" => true,
                _ => key.as_index().is_some_and(|i| i < array.len()),
            },
            Self::Object(object) => object.contains(&key.as_name()),
            Self::Host(host) => host.has(key),
            Self::String(_) => matches!(key, Key::Name(name) if name == "length"),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Host(a), Self::Host(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Key for hashing values with the same semantics as `==`. A reference
/// identity is only meaningful while the value is kept alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Identity {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(Arc<str>),
    Ref(usize),
}

// Shallow on purpose: graphs may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Array(array) => write!(f, "Array(len={})", array.len()),
            Self::Object(object) => write!(
                f,
                "Object({}, keys={:?})",
                object.class_name(),
                object.keys(true).iter().map(Key::to_string).collect::<Vec<_>>()
            ),
            Self::Function(func) => write!(f, "Function({})", func.name()),
            Self::Host(host) => write!(f, "Host({host:?})"),
        }
    }
}

/// String conversion used by pattern rules and descriptions.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Array(array) => {
                let items: Vec<String> = array
                    .to_vec()
                    .iter()
                    .map(|item| match item {
                        Self::Array(_) => "[object Array]".to_owned(),
                        Self::Undefined | Self::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect();
                f.write_str(&items.join(","))
            }
            Self::Object(object) => write!(f, "[object {}]", object.class_name()),
            Self::Function(func) => write!(f, "function {}() {{ [native code] }}", func.name()),
            Self::Host(host) => f.write_str(&host.describe()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Array::from(items))
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Self::Array(array)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Self::Function(func)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

/// A shared, growable list of values.
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.read().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.write().push(value.into());
    }

    /// Snapshot of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.read().clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from(iter.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

struct Property {
    key: String,
    value: Value,
    enumerable: bool,
}

struct ObjectData {
    class: Option<String>,
    props: RwLock<Vec<Property>>,
}

/// A shared object with ordered properties and an optional class name.
///
/// Properties keep insertion order. Non-enumerable properties are only seen
/// by own-key enumeration, never by plain key enumeration.
#[derive(Clone)]
pub struct Object(Arc<ObjectData>);

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    /// A plain object (class name `Object`).
    pub fn new() -> Self {
        Self(Arc::new(ObjectData {
            class: None,
            props: RwLock::new(Vec::new()),
        }))
    }

    /// An object whose constructor name is `class`.
    pub fn with_class(class: impl Into<String>) -> Self {
        Self(Arc::new(ObjectData {
            class: Some(class.into()),
            props: RwLock::new(Vec::new()),
        }))
    }

    /// Chainable [`set`](Self::set).
    #[must_use]
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Chainable [`define`](Self::define) for a non-enumerable property.
    #[must_use]
    pub fn with_hidden(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.define(key, value, false);
        self
    }

    /// Set an enumerable property, replacing any previous value in place.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.define(key, value, true);
    }

    /// Set a property with explicit enumerability.
    pub fn define(&self, key: impl Into<String>, value: impl Into<Value>, enumerable: bool) {
        let key = key.into();
        let value = value.into();
        let mut props = self.write();
        match props.iter_mut().find(|p| p.key == key) {
            Some(prop) => {
                prop.value = value;
                prop.enumerable = enumerable;
            }
            None => props.push(Property {
                key,
                value,
                enumerable,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read()
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().iter().any(|p| p.key == key)
    }

    pub fn class_name(&self) -> &str {
        self.0.class.as_deref().unwrap_or("Object")
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn keys(&self, include_hidden: bool) -> Vec<Key> {
        self.read()
            .iter()
            .filter(|p| include_hidden || p.enumerable)
            .map(|p| Key::Name(p.key.clone()))
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Property>> {
        self.0.props.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Property>> {
        self.0.props.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Self::new();
        for (key, value) in iter {
            object.set(key, value);
        }
        object
    }
}

// ---------------------------------------------------------------------------
// Function
// ---------------------------------------------------------------------------

type Callable = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A callable value. Strategies never report these as children.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    body: Arc<Callable>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_falsy_values() {
        for falsy in [
            Value::Undefined,
            Value::Null,
            Value::from(false),
            Value::from(0),
            Value::from(-0.0),
            Value::from(f64::NAN),
            Value::from(""),
        ] {
            assert!(!falsy.is_truthy(), "{falsy:?}");
        }
        for truthy in [
            Value::from(true),
            Value::from(-1),
            Value::from("0"),
            Value::from(Vec::<Value>::new()),
            Value::from(Object::new()),
        ] {
            assert!(truthy.is_truthy(), "{truthy:?}");
        }
    }

    #[test]
    fn identity_agrees_with_equality() {
        let object = Object::new().with("x", 1);
        let twin = Object::new().with("x", 1);
        let samples = [
            Value::Undefined,
            Value::Null,
            Value::from(true),
            Value::from(0),
            Value::from(-0.0),
            Value::from(1.5),
            Value::from("a"),
            Value::from(String::from("a")),
            Value::from(object.clone()),
            Value::from(object),
            Value::from(twin),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(a == b, a.identity() == b.identity(), "{a:?} vs {b:?}");
            }
        }
        assert_eq!(Value::from(f64::NAN).identity(), None);
    }

    #[test]
    fn primitives_compare_by_value_references_by_identity() {
        assert_eq!(Value::from(42), Value::from(42.0));
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
        assert_ne!(Value::Null, Value::Undefined);

        let a = Object::new().with("x", 1);
        let b = Object::new().with("x", 1);
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn hidden_properties_only_show_up_in_own_keys() {
        let object: Value = Object::new()
            .with("visible", 1)
            .with_hidden("secret", 2)
            .into();

        assert_eq!(object.keys(), vec![Key::from("visible")]);
        assert_eq!(
            object.own_keys(),
            vec![Key::from("visible"), Key::from("secret")]
        );
        assert!(object.has_property(&Key::from("secret")));
    }

    #[test]
    fn array_exposes_indices_and_length() {
        let array: Value = vec![Value::from(1), Value::from("two")].into();

        assert_eq!(array.keys(), vec![Key::Index(0), Key::Index(1)]);
        assert_eq!(array.own_keys().last(), Some(&Key::from("length")));
        assert_eq!(array.get(&Key::from("length")).unwrap(), Value::from(2));
        assert_eq!(array.get(&Key::from("1")).unwrap(), Value::from("two"));
        assert_eq!(array.get(&Key::Index(9)).unwrap(), Value::Undefined);
    }

    #[test]
    fn set_replaces_in_place_and_keeps_order() {
        let object = Object::new().with("a", 1).with("b", 2).with("a", 3);
        let value = Value::from(object);

        assert_eq!(value.keys(), vec![Key::from("a"), Key::from("b")]);
        assert_eq!(value.get(&Key::from("a")).unwrap(), Value::from(3));
    }

    #[test]
    fn cyclic_values_debug_without_recursing() {
        let node = Object::new();
        node.set("self", node.clone());
        let rendered = format!("{:?}", Value::from(node));
        assert!(rendered.contains("self"));
    }

    #[test]
    fn display_matches_string_conversion() {
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from(Object::with_class("Frame")).to_string(), "[object Frame]");
        let list: Value = vec![Value::from(1), Value::Null, Value::from("x")].into();
        assert_eq!(list.to_string(), "1,,x");
    }

    #[test]
    fn type_and_class_names() {
        assert_eq!(Value::from(true).type_name(), "boolean");
        assert_eq!(Value::from(Object::new()).type_name(), "object");
        let f = Function::new("noop", |_| Value::Undefined);
        assert_eq!(Value::from(f.clone()).type_name(), "function");
        assert_eq!(f.call(&[]), Value::Undefined);
        assert_eq!(Value::from(Array::new()).class_name().as_deref(), Some("Array"));
        assert_eq!(Value::Null.class_name(), None);
    }
}
