use std::sync::Arc;
use std::thread;

use tracing::warn;

use crate::coordinator::{Completion, Coordinator, SearchHandle};
use crate::engine::{Listeners, SessionConfig, StrategyFactory};
use crate::error::RummageError;
use crate::results::{DataFound, Outcome};
use crate::rule::MatchRule;
use crate::stack;
use crate::traits::{Listener, Strategy};
use crate::value::Value;

// ---------------------------------------------------------------------------
// SearchBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring a rummage search.
///
/// Created via [`rummage::search()`](crate::search). Configure with chained
/// builder methods, then either [`build()`](SearchBuilder::build) a reusable
/// [`Coordinator`], [`run()`](SearchBuilder::run) once on the calling thread,
/// or [`spawn()`](SearchBuilder::spawn) onto a background thread.
///
/// # Example
///
/// ```rust
/// use rummage::{KeyPropertyDrillDown, MatchRule, Object, Value};
///
/// let target = Value::from(Object::new().with("a", Object::new().with("b", 7)));
///
/// let outcome = rummage::search()
///     .rule(MatchRule::equals(7))
///     .strategy::<KeyPropertyDrillDown>()
///     .limit(1)
///     .run(target)
///     .unwrap();
///
/// assert_eq!(outcome.found()[0].route().to_string(), "a → b");
/// ```
pub struct SearchBuilder {
    rule: Option<MatchRule>,
    strategies: Vec<StrategyFactory>,
    limit: Option<usize>,
    max_depth: Option<usize>,
    target: Option<Value>,
    single_use: bool,
    callbacks: Callbacks,
    listeners: Vec<Arc<dyn Listener>>,
}

impl Default for SearchBuilder {
    fn default() -> Self {
        Self {
            rule: None,
            strategies: Vec::new(),
            limit: None,
            max_depth: None,
            target: None,
            single_use: false,
            callbacks: Callbacks::default(),
            listeners: Vec::new(),
        }
    }
}

impl SearchBuilder {
    // ── Rule ──────────────────────────────────────────────────────────────

    /// Set the rule a value must satisfy to be returned.
    ///
    /// Calling this again AND-combines the new rule with the previous one.
    /// Bare predicates are accepted and wrapped into an anonymous rule.
    pub fn rule(mut self, rule: impl Into<MatchRule>) -> Self {
        let rule = rule.into();
        self.rule = Some(match self.rule.take() {
            Some(previous) => previous.and(rule),
            None => rule,
        });
        self
    }

    // ── Strategies ────────────────────────────────────────────────────────

    /// Register a strategy type. Each registered strategy runs as its own
    /// branch; on success, the earliest registered branch with matches wins.
    ///
    /// Registering the same strategy twice logs a warning and keeps the first.
    pub fn strategy<S: Strategy + Default + 'static>(self) -> Self {
        let name = S::default().name().to_owned();
        self.strategy_with(name, S::default)
    }

    /// Register a strategy built by `factory` under an explicit name.
    ///
    /// Use this for strategies that need constructor arguments, such as
    /// [`ClassDrillDown`](crate::ClassDrillDown). Names must be unique.
    pub fn strategy_with<S: Strategy + 'static>(
        mut self,
        name: impl Into<String>,
        factory: impl Fn() -> S + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        if self.strategies.iter().any(|s| s.name == name) {
            warn!(strategy = %name, "strategy already registered, ignoring");
            return self;
        }
        self.strategies.push(StrategyFactory::new(name, factory));
        self
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Stop a branch once it holds `n` matches. `0` is treated as `1`.
    ///
    /// Unlimited by default.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n.max(1));
        self
    }

    /// Collect every match.
    pub fn unlimited(mut self) -> Self {
        self.limit = None;
        self
    }

    /// Maximum depth of a route. Children of the target are at depth 1, and
    /// a node at depth `d` is a dead end (neither tested nor expanded).
    ///
    /// Clamped into `[1, stack::max_safe_depth()]`. Defaults to
    /// [`stack::default_depth()`].
    pub fn max_depth(mut self, d: usize) -> Self {
        self.max_depth = Some(stack::clamp_depth(d));
        self
    }

    /// Default target, used when a session is started without one.
    pub fn target(mut self, target: impl Into<Value>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Release the coordinator's configuration after its first session.
    pub fn single_use(mut self, yes: bool) -> Self {
        self.single_use = yes;
        self
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    /// Called before any branch starts.
    pub fn on_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.start = Some(Box::new(f));
        self
    }

    /// Called for every new match. May be called from several threads.
    pub fn on_progress(mut self, f: impl Fn(&DataFound) + Send + Sync + 'static) -> Self {
        self.callbacks.progress = Some(Box::new(f));
        self
    }

    /// Called with the outcome once the session settles.
    pub fn on_post(mut self, f: impl Fn(&Outcome) + Send + Sync + 'static) -> Self {
        self.callbacks.post = Some(Box::new(f));
        self
    }

    /// Called with the winning values after a successful session.
    pub fn on_success(mut self, f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        self.callbacks.success = Some(Box::new(f));
        self
    }

    /// Called with the terminal error after a failed session.
    pub fn on_failure(mut self, f: impl Fn(&RummageError) + Send + Sync + 'static) -> Self {
        self.callbacks.failure = Some(Box::new(f));
        self
    }

    /// Called for recoverable faults: strategy failures on single nodes and
    /// failed branches. The session keeps going.
    pub fn on_error(mut self, f: impl Fn(&RummageError) + Send + Sync + 'static) -> Self {
        self.callbacks.error = Some(Box::new(f));
        self
    }

    /// Register a [`Listener`] in addition to the closure callbacks.
    pub fn listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Freeze the configuration into a [`Coordinator`].
    ///
    /// # Errors
    ///
    /// [`RummageError::InvalidArgument`] if no rule or no strategy was set.
    pub fn build(self) -> Result<Coordinator, RummageError> {
        let rule = self
            .rule
            .ok_or_else(|| RummageError::invalid("a rule is required"))?;
        if self.strategies.is_empty() {
            return Err(RummageError::invalid("at least one strategy is required"));
        }

        let mut listeners: Vec<Arc<dyn Listener>> = Vec::with_capacity(self.listeners.len() + 1);
        if !self.callbacks.is_empty() {
            listeners.push(Arc::new(self.callbacks));
        }
        listeners.extend(self.listeners);

        Ok(Coordinator::new(SessionConfig {
            rule,
            strategies: self.strategies,
            limit: self.limit,
            max_depth: self.max_depth.unwrap_or_else(stack::default_depth),
            single_use: self.single_use,
            target: self.target,
            listeners: Listeners(listeners),
        }))
    }

    /// Build a single-use coordinator and run it over `target` (or the
    /// default target) on the calling thread.
    ///
    /// # Errors
    ///
    /// Build errors, then start-time errors (see [`Coordinator::search`]).
    /// A search that finds nothing is a failed [`Outcome`], not an `Err`.
    pub fn run(self, target: impl Into<Option<Value>>) -> Result<Outcome, RummageError> {
        self.single_use(true).build()?.search(target)
    }

    /// Build a single-use coordinator and run it on a background thread.
    ///
    /// # Errors
    ///
    /// Build errors, or [`RummageError::SessionAborted`] if the thread can't
    /// be spawned. Everything after that is delivered through the handle.
    pub fn spawn(self, target: impl Into<Option<Value>>) -> Result<SearchHandle, RummageError> {
        let (completion, rx) = Completion::channel();
        let coordinator = self.single_use(true).listener(completion.clone()).build()?;
        let target = target.into();
        let thread = thread::Builder::new()
            .name("rummage-session".into())
            .spawn(move || {
                if let Err(err) = coordinator.search(target) {
                    completion.reject(err);
                }
            })
            .map_err(|e| RummageError::SessionAborted(e.to_string()))?;
        Ok(SearchHandle::new(rx, thread))
    }
}

// ---------------------------------------------------------------------------
// Closure listeners
// ---------------------------------------------------------------------------

type Callback<T> = Option<Box<dyn Fn(&T) + Send + Sync>>;

#[derive(Default)]
struct Callbacks {
    start: Option<Box<dyn Fn() + Send + Sync>>,
    progress: Callback<DataFound>,
    post: Callback<Outcome>,
    success: Callback<[Value]>,
    failure: Callback<RummageError>,
    error: Callback<RummageError>,
}

impl Callbacks {
    fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.progress.is_none()
            && self.post.is_none()
            && self.success.is_none()
            && self.failure.is_none()
            && self.error.is_none()
    }
}

impl Listener for Callbacks {
    fn on_start(&self) {
        if let Some(f) = &self.start {
            f();
        }
    }

    fn on_progress(&self, found: &DataFound) {
        if let Some(f) = &self.progress {
            f(found);
        }
    }

    fn on_post(&self, outcome: &Outcome) {
        if let Some(f) = &self.post {
            f(outcome);
        }
    }

    fn on_success(&self, values: &[Value]) {
        if let Some(f) = &self.success {
            f(values);
        }
    }

    fn on_failure(&self, error: &RummageError) {
        if let Some(f) = &self.failure {
            f(error);
        }
    }

    fn on_error(&self, error: &RummageError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{ClassDrillDown, KeyPropertyDrillDown};
    use crate::value::Object;

    #[test]
    fn build_requires_rule_and_strategy() {
        let missing_rule = SearchBuilder::default()
            .strategy::<KeyPropertyDrillDown>()
            .build();
        assert!(matches!(missing_rule, Err(RummageError::InvalidArgument(_))));

        let missing_strategy = SearchBuilder::default().rule(MatchRule::always()).build();
        assert!(matches!(missing_strategy, Err(RummageError::InvalidArgument(_))));
    }

    #[test]
    fn duplicate_strategies_are_ignored() {
        let builder = SearchBuilder::default()
            .strategy::<KeyPropertyDrillDown>()
            .strategy::<KeyPropertyDrillDown>()
            .strategy_with("FrameNode", || ClassDrillDown::new("FrameNode"))
            .strategy_with("FrameNode", || ClassDrillDown::new("PageNode"));
        let names: Vec<_> = builder.strategies.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["KeyPropertyDrillDown", "FrameNode"]);
    }

    #[test]
    fn repeated_rules_are_and_combined() {
        let builder = SearchBuilder::default()
            .rule(MatchRule::contains_property("a"))
            .rule(MatchRule::contains_property("b"));
        let rule = builder.rule.unwrap();

        assert!(rule.is_match(&Object::new().with("a", 1).with("b", 2).into()));
        assert!(!rule.is_match(&Object::new().with("a", 1).into()));
    }

    #[test]
    fn limit_is_coerced_to_at_least_one() {
        assert_eq!(SearchBuilder::default().limit(0).limit, Some(1));
        assert_eq!(SearchBuilder::default().limit(3).unlimited().limit, None);
    }

    #[test]
    fn max_depth_is_clamped() {
        assert_eq!(SearchBuilder::default().max_depth(0).max_depth, Some(1));
        assert_eq!(
            SearchBuilder::default().max_depth(usize::MAX).max_depth,
            Some(stack::max_safe_depth())
        );
    }
}
