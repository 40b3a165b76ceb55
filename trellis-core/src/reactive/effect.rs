//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a cell it
//! read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    its initial dependencies.
//!
//! 2. When any dependency changes, the effect is flushed in the same
//!    propagation pass as reactions, after every cell it reads is up to date.
//!
//! 3. Each run records a fresh dependency set, exactly like a computed cell.
//!
//! # Differences from Computed
//!
//! - Computed cells return a value; effects do not.
//! - Computed cells are lazy (compute on access); effects are eager.
//! - An effect is a computed cell of `()` that is always watched, so it
//!   shares the same dirty checking: if none of its inputs actually changed,
//!   it does not re-run.
//!
//! The effect lives as long as its handle. Dropping it, or calling
//! [`Effect::dispose`], stops it.

use std::cell::Cell as StdCell;
use std::rc::Rc;

use super::cell::CellOptions;
use super::computed::Computed;
use super::reaction::ActionId;
use super::readable::Readable;
use crate::graph::NodeId;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Cell, Effect, Readable, Writable};
///
/// let count = Cell::new(0);
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("count is {}", count.get())
/// });
///
/// count.set(5); // prints "count is 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
pub struct Effect {
    computation: Computed<()>,
    watcher: StdCell<Option<ActionId>>,
    run_count: Rc<StdCell<usize>>,
}

impl Effect {
    /// Create an effect and run it once.
    pub fn new(run: impl Fn() + 'static) -> Self {
        let run_count = Rc::new(StdCell::new(0));
        let counter = run_count.clone();
        let computation = Computed::with_options(
            move || {
                counter.set(counter.get() + 1);
                run();
            },
            CellOptions::new().with_always_fire(true),
        );

        // Watching the computation evaluates it and keeps it on the flush path.
        let watcher = computation.add_action(|_| {});
        Self {
            computation,
            watcher: StdCell::new(Some(watcher)),
            run_count,
        }
    }

    pub fn id(&self) -> NodeId {
        self.computation.id()
    }

    /// Number of times the effect function has run.
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Stop re-running. Idempotent.
    pub fn dispose(&self) {
        if let Some(watcher) = self.watcher.take() {
            self.computation.remove_action(watcher);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.watcher.get().is_none()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
