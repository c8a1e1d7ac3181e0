use std::fmt;

use crate::error::RummageError;
use crate::value::{Key, Value};

/// One hop of a [`Route`]: the key followed and the value observed there.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePin {
    key: Key,
    value: Value,
}

impl RoutePin {
    /// # Errors
    ///
    /// Returns [`RummageError::InvalidArgument`] for an empty key name.
    /// Indices are non-negative by construction.
    pub fn new(key: impl Into<Key>, value: Value) -> Result<Self, RummageError> {
        let key = key.into();
        if matches!(&key, Key::Name(name) if name.is_empty()) {
            return Err(RummageError::invalid("route pin key can not be empty"));
        }
        Ok(Self { key, value })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for RoutePin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

/// Ordered trail of pins from the search root to a found value.
///
/// Routes are never shared mutably between sibling expansions: each hop
/// produces a new route with [`appended`](Route::appended).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    pins: Vec<RoutePin>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a pin onto this route.
    pub fn push(&mut self, pin: RoutePin) -> &mut Self {
        self.pins.push(pin);
        self
    }

    /// A copy of this route with `pin` appended. `self` is left unchanged.
    #[must_use]
    pub fn appended(&self, pin: RoutePin) -> Self {
        let mut pins = Vec::with_capacity(self.pins.len() + 1);
        pins.extend(self.pins.iter().cloned());
        pins.push(pin);
        Self { pins }
    }

    pub fn pins(&self) -> &[RoutePin] {
        &self.pins
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// The last pin, i.e. where the found value lives.
    pub fn last(&self) -> Option<&RoutePin> {
        self.pins.last()
    }

    /// Keys from root to leaf.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.pins.iter().map(RoutePin::key)
    }
}

/// Renders as `a → b → c`.
impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pin) in self.pins.iter().enumerate() {
            if i > 0 {
                f.write_str(" → ")?;
            }
            fmt::Display::fmt(pin, f)?;
        }
        Ok(())
    }
}
