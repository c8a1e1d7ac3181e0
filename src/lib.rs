//! # rummage
//!
//! Rule-driven search over object graphs of unknown shape.
//!
//! You describe *what* you are looking for with a composable [`MatchRule`],
//! and *how* to open up a node with one or more [`Strategy`] implementations.
//! rummage walks the graph depth-first from a target, once per strategy on
//! its own branch thread, and returns every value the rule accepted together
//! with the [`Route`] of keys that reached it.
//!
//! rummage owns the walk, the rule combinators, the depth guard and the
//! session lifecycle. It does not know your object model: plain data is
//! modelled with [`Object`] and [`Array`], anything else plugs in through
//! [`HostObject`].
//!
//! # Quick Start
//!
//! ```rust
//! use rummage::{KeyPropertyDrillDown, MatchRule, Object, Value};
//!
//! let target = Value::from(
//!     Object::new()
//!         .with("a", Object::new().with("b", Object::new().with("c", 42)))
//!         .with("d", 7),
//! );
//!
//! let outcome = rummage::search()
//!     .rule(MatchRule::equals(42))
//!     .strategy::<KeyPropertyDrillDown>()
//!     .run(target)
//!     .unwrap();
//!
//! assert!(outcome.successfully());
//! assert_eq!(outcome.values(), [Value::from(42)]);
//! assert_eq!(outcome.found()[0].route().to_string(), "a → b → c");
//! println!("found in {}", outcome.work_time());
//! ```
//!
//! # Rules
//!
//! Rules compose with [`and`](MatchRule::and), [`or`](MatchRule::or) and
//! [`xor`](MatchRule::xor) (or `&`, `|`, `^`), and carry a readable
//! description:
//!
//! ```rust
//! use rummage::{MatchRule, Object, Sensitivity, Value};
//!
//! let rule = MatchRule::class_name("Button")
//!     & MatchRule::contains_property_value_string("label", "ok", Sensitivity::Base);
//!
//! let button = Value::from(Object::with_class("Button").with("label", "OK"));
//! assert!(rule.is_match(&button));
//! ```
//!
//! # Custom Strategies
//!
//! Implement [`Strategy`] to teach rummage a new way of finding children:
//!
//! ```rust
//! use rummage::{Params, RummageError, Strategy};
//!
//! #[derive(Default)]
//! struct FirstChild;
//!
//! impl Strategy for FirstChild {
//!     fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
//!         let first = params.target().get(&0usize.into())?;
//!         let _ = params.notify(0usize, first);
//!         Ok(())
//!     }
//! }
//! ```

#![forbid(unsafe_code)]

pub mod fs;
pub mod stack;

mod builder;
mod coordinator;
mod engine;
mod error;
mod results;
mod route;
mod rule;
mod stopwatch;
mod strategies;
mod traits;
mod value;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::SearchBuilder;
pub use coordinator::{Coordinator, SearchHandle, SessionState};
pub use error::RummageError;
pub use results::{DataFound, Outcome};
pub use route::{Route, RoutePin};
pub use rule::{MatchRule, Sensitivity};
pub use stopwatch::{Stopwatch, WorkTime};
pub use strategies::{ClassDrillDown, KeyPropertyDrillDown, OwnPropertyDrillDown, PropertyDrillUp};
pub use traits::{Listener, Params, Strategy};
pub use value::{Array, Function, HostObject, Key, Object, Value};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`SearchBuilder`] to configure and run a search.
///
/// # Example
///
/// ```rust
/// use rummage::{MatchRule, OwnPropertyDrillDown, RummageError, Object, Value};
///
/// let target = Value::from(Object::new().with("x", 1));
///
/// let outcome = rummage::search()
///     .rule(MatchRule::equals(2))
///     .strategy::<OwnPropertyDrillDown>()
///     .run(target)
///     .unwrap();
///
/// assert_eq!(outcome.error(), Some(&RummageError::Unresolved));
/// ```
pub fn search() -> SearchBuilder {
    SearchBuilder::default()
}
