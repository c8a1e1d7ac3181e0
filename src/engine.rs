use std::any::Any;
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, trace, warn};

use crate::error::RummageError;
use crate::results::{DataFound, Outcome};
use crate::route::{Route, RoutePin};
use crate::rule::MatchRule;
use crate::stopwatch::Stopwatch;
use crate::traits::{Listener, Params, Strategy};
use crate::value::{Identity, Key, Value};

/// Stack reserved for every branch thread. The depth bound is derived from it.
pub(crate) const BRANCH_STACK_BYTES: usize = 8 * 1024 * 1024;

// ---------------------------------------------------------------------------
// StrategyFactory
// ---------------------------------------------------------------------------

type BuildStrategy = dyn Fn() -> Box<dyn Strategy> + Send + Sync;

/// Registered strategy constructor. Strategies are built fresh per session.
#[derive(Clone)]
pub(crate) struct StrategyFactory {
    pub name: String,
    build: Arc<BuildStrategy>,
}

impl StrategyFactory {
    pub fn new<S: Strategy + 'static>(
        name: impl Into<String>,
        factory: impl Fn() -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            build: Arc::new(move || Box::new(factory()) as Box<dyn Strategy>),
        }
    }

    pub fn build(&self) -> Box<dyn Strategy> {
        (self.build)()
    }
}

// ---------------------------------------------------------------------------
// Session configuration
// ---------------------------------------------------------------------------

/// Immutable configuration of a coordinator, produced by the builder.
pub(crate) struct SessionConfig {
    pub rule: MatchRule,
    pub strategies: Vec<StrategyFactory>,
    /// `None` means unlimited.
    pub limit: Option<usize>,
    pub max_depth: usize,
    pub single_use: bool,
    pub target: Option<Value>,
    pub listeners: Listeners,
}

/// Fan-out of lifecycle events to every registered listener.
#[derive(Clone, Default)]
pub(crate) struct Listeners(pub Vec<Arc<dyn Listener>>);

impl Listener for Listeners {
    fn on_start(&self) {
        self.0.iter().for_each(|l| l.on_start());
    }

    fn on_progress(&self, found: &DataFound) {
        self.0.iter().for_each(|l| l.on_progress(found));
    }

    fn on_post(&self, outcome: &Outcome) {
        self.0.iter().for_each(|l| l.on_post(outcome));
    }

    fn on_success(&self, values: &[Value]) {
        self.0.iter().for_each(|l| l.on_success(values));
    }

    fn on_failure(&self, error: &RummageError) {
        self.0.iter().for_each(|l| l.on_failure(error));
    }

    fn on_error(&self, error: &RummageError) {
        self.0.iter().for_each(|l| l.on_error(error));
    }
}

// ---------------------------------------------------------------------------
// run()
// ---------------------------------------------------------------------------

/// Execute one search session over `target`.
///
/// Builds fresh strategies, runs one branch per strategy, settles all of
/// them and picks the winner by registration order. Never fails: every
/// search-time fault ends up in the listeners or in the returned outcome.
pub(crate) fn run(config: &SessionConfig, target: &Value) -> Outcome {
    let strategies: Vec<Box<dyn Strategy>> =
        config.strategies.iter().map(StrategyFactory::build).collect();
    let events = &config.listeners;
    let walker = Walker {
        rule: &config.rule,
        strategies: &strategies,
        limit: config.limit,
        max_depth: config.max_depth,
        events,
    };

    let watch = Stopwatch::start();
    debug!(
        rule = %config.rule,
        strategies = strategies.len(),
        max_depth = config.max_depth,
        limit = ?config.limit,
        "search started"
    );
    events.on_start();

    let settled = walker.settle_all(target);

    let mut winner: Option<(&str, Vec<DataFound>)> = None;
    for (strategy, result) in strategies.iter().zip(settled) {
        match result {
            Ok(branch) => {
                trace!(strategy = strategy.name(), matches = branch.matches.len(), "branch settled");
                if winner.is_none() && !branch.matches.is_empty() {
                    winner = Some((strategy.name(), branch.matches));
                }
            }
            Err(fault) => {
                warn!(strategy = strategy.name(), error = %fault, "branch failed");
                events.on_error(&fault);
            }
        }
    }

    let work_time = watch.elapsed();
    let outcome = match winner {
        Some((name, found)) => match Outcome::success(found, work_time) {
            Ok(outcome) => {
                info!(
                    strategy = name,
                    matches = outcome.found().len(),
                    work_time = %work_time,
                    "search resolved"
                );
                outcome
            }
            Err(err) => Outcome::failure(err, work_time),
        },
        None => Outcome::failure(RummageError::Unresolved, work_time),
    };

    events.on_post(&outcome);
    match outcome.error() {
        None => events.on_success(&outcome.values()),
        Some(err) => {
            error!(error = %err, work_time = %work_time, "search failed");
            events.on_failure(err);
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Walker
// ---------------------------------------------------------------------------

/// Per-branch accumulator. Owned by exactly one branch thread.
#[derive(Default)]
pub(crate) struct Branch {
    pub matches: Vec<DataFound>,
    /// Identities of `matches`, for constant-time dedupe.
    seen: HashSet<Identity>,
    /// Set once the result limit is reached; the branch stops expanding.
    pub done: bool,
    pub gauge: StackGauge,
}

/// Where a node sits: its depth and the route that reached it.
struct Frame {
    depth: usize,
    route: Route,
}

/// Records stack addresses seen at each depth, to measure bytes per level.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct StackGauge {
    first: Option<usize>,
    deepest: Option<(usize, usize)>,
}

impl StackGauge {
    fn record(&mut self, depth: usize, addr: usize) {
        if depth == 1 && self.first.is_none() {
            self.first = Some(addr);
        }
        if self.deepest.map_or(true, |(d, _)| depth > d) {
            self.deepest = Some((depth, addr));
        }
    }

    /// Average stack bytes consumed per level of recursion.
    pub fn bytes_per_level(&self) -> Option<usize> {
        let first = self.first?;
        let (depth, addr) = self.deepest?;
        (depth > 1).then(|| first.abs_diff(addr) / (depth - 1))
    }
}

pub(crate) struct Walker<'a> {
    pub rule: &'a MatchRule,
    pub strategies: &'a [Box<dyn Strategy>],
    pub limit: Option<usize>,
    pub max_depth: usize,
    pub events: &'a dyn Listener,
}

impl Walker<'_> {
    /// Run every strategy as an isolated branch against `target` and wait
    /// for all of them. Results are in registration order.
    pub fn settle_all(&self, target: &Value) -> Vec<Result<Branch, RummageError>> {
        thread::scope(|scope| {
            let spawned: Vec<_> = self
                .strategies
                .iter()
                .enumerate()
                .map(|(i, strategy)| {
                    let handle = thread::Builder::new()
                        .name(format!("rummage-branch-{i}"))
                        .stack_size(BRANCH_STACK_BYTES)
                        .spawn_scoped(scope, move || self.run_branch(strategy.as_ref(), target));
                    (strategy.name(), handle)
                })
                .collect();

            spawned
                .into_iter()
                .map(|(name, handle)| {
                    let handle = handle.map_err(|e| branch_fault(name, e.to_string()))?;
                    handle
                        .join()
                        .map_err(|panic| branch_fault(name, panic_message(panic.as_ref())))?
                })
                .collect()
        })
    }

    fn run_branch(&self, strategy: &dyn Strategy, target: &Value) -> Result<Branch, RummageError> {
        let mut branch = Branch::default();
        let root = Frame {
            depth: 0,
            route: Route::new(),
        };
        let mut sink = |key: Key, value: Value| self.visit(&mut branch, &root, key, value);
        strategy
            .run(&mut Params::new(target, &mut sink))
            .map_err(|err| branch_fault(strategy.name(), err.to_string()))?;
        Ok(branch)
    }

    /// Handle one notification: test the child, or descend into it.
    fn visit(&self, branch: &mut Branch, parent: &Frame, key: Key, value: Value) -> ControlFlow<()> {
        if branch.done {
            return ControlFlow::Break(());
        }

        let depth = parent.depth + 1;
        let marker = 0u8;
        branch
            .gauge
            .record(depth, std::hint::black_box(&marker) as *const u8 as usize);

        let pin = match RoutePin::new(key, value.clone()) {
            Ok(pin) => pin,
            Err(err) => {
                warn!(depth, error = %err, "strategy reported an invalid key");
                self.events.on_error(&err);
                return ControlFlow::Continue(());
            }
        };
        let frame = Frame {
            depth,
            route: parent.route.appended(pin),
        };

        if depth >= self.max_depth {
            trace!(depth, route = %frame.route, "depth limit reached");
            return ControlFlow::Continue(());
        }
        if value.is_nullish() {
            return ControlFlow::Continue(());
        }

        if self.rule.is_match(&value) {
            self.collect(branch, frame.route, value);
        } else {
            self.descend(branch, &frame, &value);
        }

        if branch.done {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Record a match unless this branch already holds the same value.
    fn collect(&self, branch: &mut Branch, route: Route, value: Value) {
        let fresh = match value.identity() {
            Some(identity) => branch.seen.insert(identity),
            // NaN never equals itself, so it is never a duplicate.
            None => true,
        };
        if !fresh {
            trace!(route = %route, "duplicate match ignored");
            return;
        }
        let found = DataFound::new(value, route);
        debug!(route = %found.route(), "match found");
        self.events.on_progress(&found);
        branch.matches.push(found);

        if let Some(limit) = self.limit {
            if branch.matches.len() >= limit {
                branch.done = true;
            }
        }
    }

    /// Run every strategy on `target`. An error or a panic in one strategy
    /// skips that strategy on this node only.
    fn descend(&self, branch: &mut Branch, frame: &Frame, target: &Value) {
        for strategy in self.strategies {
            if branch.done {
                return;
            }
            let mut sink = |key: Key, value: Value| self.visit(branch, frame, key, value);
            let run = panic::catch_unwind(AssertUnwindSafe(|| {
                strategy.run(&mut Params::new(target, &mut sink))
            }));
            let reason = match run {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            warn!(
                strategy = strategy.name(),
                depth = frame.depth,
                route = %frame.route,
                error = %reason,
                "strategy failed on node"
            );
            self.events.on_error(&RummageError::StrategyFault {
                strategy: strategy.name().to_owned(),
                reason,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn branch_fault(strategy: &str, reason: String) -> RummageError {
    RummageError::BranchFault {
        strategy: strategy.to_owned(),
        reason,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "strategy panicked".to_owned())
}
