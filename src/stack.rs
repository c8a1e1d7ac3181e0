//! Recursion depth bound.
//!
//! A branch walks the graph with real recursion, so the depth limit must
//! stay well inside the branch thread's stack. The capacity is measured once
//! per process by walking a self-referencing node on a branch-sized stack and
//! reading how many bytes each level consumed. Half of that capacity, capped
//! at [`ABSOLUTE_CEILING`], is the largest depth a session may configure.
//!
//! The measurement can be replaced with `RUMMAGE_STACK_LIMIT` (read once) or
//! at runtime with [`set_capacity_override`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::engine::{Listeners, Walker, BRANCH_STACK_BYTES};
use crate::rule::MatchRule;
use crate::strategies::KeyPropertyDrillDown;
use crate::traits::Strategy;
use crate::value::{Object, Value};

/// Environment variable that replaces the measured capacity.
pub const ENV_CAPACITY: &str = "RUMMAGE_STACK_LIMIT";

/// Share of the measured capacity a session may use.
pub const SAFETY_FACTOR: f64 = 0.5;

/// Upper bound for any configured depth, whatever the measurement says.
pub const ABSOLUTE_CEILING: usize = 10_000;

/// Default depth limit when the builder is not given one.
pub const DEFAULT_DEPTH: usize = 100;

/// Capacity assumed when the probe can't produce a reading.
const FALLBACK_CAPACITY: usize = 1_000;

/// Levels walked by the probe.
const PROBE_LEVELS: usize = 64;

static MEASURED: OnceLock<usize> = OnceLock::new();
static OVERRIDE: AtomicUsize = AtomicUsize::new(0);

/// Levels of recursion a branch stack can hold, before any safety margin.
pub fn capacity() -> usize {
    match OVERRIDE.load(Ordering::Relaxed) {
        0 => *MEASURED.get_or_init(measure),
        n => n,
    }
}

/// Replace the measured capacity, or restore it with `None`.
pub fn set_capacity_override(capacity: Option<usize>) {
    OVERRIDE.store(capacity.unwrap_or(0), Ordering::Relaxed);
}

/// Largest depth limit a session may use.
pub fn max_safe_depth() -> usize {
    safe_depth(capacity())
}

/// Depth limit used when none is configured.
pub fn default_depth() -> usize {
    DEFAULT_DEPTH.min(max_safe_depth())
}

/// Clamp a requested depth into `[1, max_safe_depth()]`.
pub fn clamp_depth(depth: usize) -> usize {
    depth.clamp(1, max_safe_depth())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn safe_depth(capacity: usize) -> usize {
    let safe = (capacity as f64 * SAFETY_FACTOR) as usize;
    safe.clamp(1, ABSOLUTE_CEILING)
}

fn measure() -> usize {
    if let Ok(raw) = std::env::var(ENV_CAPACITY) {
        match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => {
                debug!(capacity = n, "stack capacity taken from {ENV_CAPACITY}");
                return n;
            }
            _ => warn!(value = %raw, "ignoring invalid {ENV_CAPACITY}"),
        }
    }

    match probe_bytes_per_level() {
        Some(bytes) if bytes > 0 => {
            let capacity = BRANCH_STACK_BYTES / bytes;
            debug!(bytes_per_level = bytes, capacity, "stack capacity measured");
            capacity
        }
        _ => {
            warn!(capacity = FALLBACK_CAPACITY, "stack probe gave no reading, using fallback");
            FALLBACK_CAPACITY
        }
    }
}

/// Walk a self-referencing node `PROBE_LEVELS` deep through the real walker.
fn probe_bytes_per_level() -> Option<usize> {
    let node = Object::new();
    node.set("next", node.clone());
    let root = Value::from(node.clone());

    let rule = MatchRule::never();
    let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(KeyPropertyDrillDown)];
    let events = Listeners::default();
    let walker = Walker {
        rule: &rule,
        strategies: &strategies,
        limit: None,
        max_depth: PROBE_LEVELS,
        events: &events,
    };
    let reading = walker
        .settle_all(&root)
        .into_iter()
        .next()
        .and_then(Result::ok)
        .and_then(|branch| branch.gauge.bytes_per_level());

    // Break the cycle so the probe graph is freed.
    node.set("next", Value::Null);
    reading
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_depth_halves_and_caps() {
        assert_eq!(safe_depth(400), 200);
        assert_eq!(safe_depth(1), 1);
        assert_eq!(safe_depth(0), 1);
        assert_eq!(safe_depth(1_000_000), ABSOLUTE_CEILING);
    }

    #[test]
    fn probe_reads_a_positive_frame_size() {
        let bytes = probe_bytes_per_level().expect("probe should produce a reading");
        assert!(bytes > 0);
        assert!(bytes < BRANCH_STACK_BYTES / PROBE_LEVELS);
    }

    #[test]
    fn measured_capacity_allows_the_default_depth() {
        assert!(max_safe_depth() >= 1);
        assert!(default_depth() <= DEFAULT_DEPTH);
        assert!(default_depth() <= max_safe_depth());
        assert_eq!(clamp_depth(0), 1);
        assert_eq!(clamp_depth(usize::MAX), max_safe_depth());
    }
}
