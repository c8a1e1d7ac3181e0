use std::ops::ControlFlow;

use crate::error::RummageError;
use crate::results::{DataFound, Outcome};
use crate::value::{Key, Value};

/// A pluggable way of discovering the children of a node.
///
/// Implement this to teach rummage how to open up a kind of node: property
/// enumeration, structural recognition of host node types, walking upwards
/// through parent links, or anything else.
///
/// # Contract
///
/// `run` calls [`Params::notify`] exactly once per child it recognises, in
/// its own enumeration order. Callables are filtered out by `notify`. A
/// property that can't be read is skipped, not reported.
///
/// # Thread Safety
///
/// `Send + Sync` are required; every branch of a session shares the same
/// strategy instances while walking.
///
/// # Example
///
/// ```rust
/// use rummage::{Params, RummageError, Strategy};
///
/// /// Walks `next` links only.
/// #[derive(Default)]
/// struct NextLink;
///
/// impl Strategy for NextLink {
///     fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
///         let next = params.target().get(&"next".into())?;
///         let _ = params.notify("next", next);
///         Ok(())
///     }
/// }
/// ```
pub trait Strategy: Send + Sync {
    /// Name used in logs and fault reports.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Discover the children of `params.target()`.
    ///
    /// Return `Err` for a failure on this node. The engine reports it, or a
    /// panic, as a [`RummageError::StrategyFault`] and treats the node as a
    /// dead end for this strategy only. Properties that can't be read should
    /// be skipped, not reported.
    fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError>;
}

/// Observer of a search session's lifecycle.
///
/// Every method has a no-op default; implement the ones you need.
/// Progress and error events may arrive from several branch threads at once.
pub trait Listener: Send + Sync {
    /// Before any branch starts.
    fn on_start(&self) {}

    /// A new, non-duplicate match was found in some branch.
    fn on_progress(&self, _found: &DataFound) {}

    /// After the session settles, success or failure.
    fn on_post(&self, _outcome: &Outcome) {}

    /// After a successful session, with the winning branch's values.
    fn on_success(&self, _values: &[Value]) {}

    /// After a failed session, with the terminal error.
    fn on_failure(&self, _error: &RummageError) {}

    /// A recoverable fault: a strategy failing on one node, or a whole branch.
    fn on_error(&self, _error: &RummageError) {}
}

/// Input to [`Strategy::run`]: the node to open and the notification sink.
///
/// The sink belongs to the engine and closes over the branch's accumulator,
/// so strategies stay stateless.
pub struct Params<'a> {
    target: &'a Value,
    sink: &'a mut dyn FnMut(Key, Value) -> ControlFlow<()>,
}

impl<'a> Params<'a> {
    pub fn new(target: &'a Value, sink: &'a mut dyn FnMut(Key, Value) -> ControlFlow<()>) -> Self {
        Self { target, sink }
    }

    pub fn target(&self) -> &Value {
        self.target
    }

    /// Report one discovered child.
    ///
    /// Returns `Break` once the branch needs no more values; strategies
    /// should stop enumerating when they see it.
    pub fn notify(&mut self, key: impl Into<Key>, value: Value) -> ControlFlow<()> {
        if value.is_callable() {
            return ControlFlow::Continue(());
        }
        (self.sink)(key.into(), value)
    }
}

fn short_type_name(full: &str) -> &str {
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Function;

    struct Probe;

    impl Strategy for Probe {
        fn run(&self, params: &mut Params<'_>) -> Result<(), RummageError> {
            let _ = params.notify("f", Value::from(Function::new("f", |_| Value::Null)));
            let _ = params.notify("n", Value::from(1));
            Ok(())
        }
    }

    #[test]
    fn notify_filters_callables() {
        let mut seen = Vec::new();
        let mut sink = |key: Key, value: Value| {
            seen.push((key, value));
            ControlFlow::Continue(())
        };
        let target = Value::Null;
        Probe.run(&mut Params::new(&target, &mut sink)).unwrap();

        assert_eq!(seen, vec![(Key::from("n"), Value::from(1))]);
    }

    #[test]
    fn default_name_is_the_type_name() {
        assert_eq!(Probe.name(), "Probe");
        assert_eq!(short_type_name("a::b::C<d::E>"), "C");
    }
}
