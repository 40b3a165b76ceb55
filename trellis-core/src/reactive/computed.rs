//! Computed Cell Implementation
//!
//! A [`Computed`] cell is a cached derived value that re-evaluates only when
//! one of its inputs changes.
//!
//! # How Computed Cells Work
//!
//! 1. On first access, the cell runs its function inside a fresh tracking
//!    frame and caches the result. Every cell read during the run becomes a
//!    dependency.
//!
//! 2. When an input changes, the cell is marked dirty (or maybe dirty, when
//!    the change reaches it through another computed cell). Nothing runs yet.
//!
//! 3. On the next access, a maybe-dirty cell first pulls its inputs. If none
//!    of them actually changed it goes back to clean and keeps its cache.
//!
//! 4. Otherwise it recomputes, diffs the cells it read against its previous
//!    dependencies and commits the new edge set.
//!
//! # Why This Matters
//!
//! - A source changes
//! - 10 computed cells depend on it
//! - Only the ones that are read, or watched by a reaction, recompute
//! - A diamond recomputes its sink once, not once per path

use std::fmt::Display;
use std::rc::Rc;

use super::cell::CellOptions;
use super::cell_core::{Body, CellCore};
use super::readable::impl_readable;
use super::runtime::Runtime;
use crate::error::CellError;
use crate::graph::Node;

/// A cached value derived from other cells.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Cell, Computed, Readable, Writable};
///
/// let count = Cell::new(2);
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    core: Rc<CellCore<T>>,
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Create a computed cell. The function does not run until the cell is
    /// first read or watched.
    pub fn new(f: impl Fn() -> T + 'static) -> Self {
        Self::with_options(f, CellOptions::default())
    }

    pub fn with_options(f: impl Fn() -> T + 'static, options: CellOptions<T>) -> Self {
        Self::build(Node::computed(), Box::new(move || Ok(f())), options)
    }

    /// Create a computed cell from a fallible function.
    ///
    /// An `Err` is handled like a panic in [`new`](Self::new): the cell keeps
    /// its previous value, records the failure and retries on the next read.
    pub fn try_new<E: Display>(f: impl Fn() -> Result<T, E> + 'static) -> Self {
        Self::try_with_options(f, CellOptions::default())
    }

    pub fn try_with_options<E: Display>(
        f: impl Fn() -> Result<T, E> + 'static,
        options: CellOptions<T>,
    ) -> Self {
        let node = Node::computed();
        let id = node.id();
        let compute = move || {
            f().map_err(|err| CellError::Evaluation {
                cell: Runtime::label(id),
                message: err.to_string(),
            })
        };
        Self::build(node, Box::new(compute), options)
    }

    fn build(node: Node, compute: super::cell_core::Compute<T>, options: CellOptions<T>) -> Self {
        Self {
            core: CellCore::new(node, Body::Computed { compute }, None, options),
        }
    }
}

impl_readable!(Computed);

/// Create a computed cell.
pub fn computed<T: Clone + PartialEq + 'static>(f: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Cell, Readable, Writable};
    use std::cell::Cell as Counter;

    fn counting<T: Clone + PartialEq + 'static>(
        calls: &Rc<Counter<usize>>,
        f: impl Fn() -> T + 'static,
    ) -> Computed<T> {
        let calls = calls.clone();
        Computed::new(move || {
            calls.set(calls.get() + 1);
            f()
        })
    }

    #[test]
    fn computed_basic() {
        let cell = Cell::new(5);
        let cell_clone = cell.clone();
        let doubled = Computed::new(move || cell_clone.get() * 2);

        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn computed_is_lazy_and_cached() {
        let calls = Rc::new(Counter::new(0));
        let cell = Cell::new(1);
        let source = cell.clone();
        let derived = counting(&calls, move || source.get() + 1);

        // Nothing runs until the first read
        assert_eq!(calls.get(), 0);

        assert_eq!(derived.get(), 2);
        assert_eq!(derived.get(), 2);
        assert_eq!(calls.get(), 1);

        cell.set(10);
        // Unwatched, so still not recomputed
        assert_eq!(calls.get(), 1);
        assert_eq!(derived.get(), 11);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn computed_chains() {
        let cell = Cell::new(2);
        let source = cell.clone();
        let squared = Computed::new(move || source.get() * source.get());
        let squared_clone = squared.clone();
        let plus_one = Computed::new(move || squared_clone.get() + 1);

        assert_eq!(plus_one.get(), 5);
        cell.set(3);
        assert_eq!(plus_one.get(), 10);
    }

    #[test]
    fn watched_computed_updates_eagerly() {
        let cell = Cell::new(1);
        let source = cell.clone();
        let derived = Computed::new(move || source.get() * 10);

        let seen = Rc::new(Counter::new(0));
        let seen_clone = seen.clone();
        derived.add_action(move |v| seen_clone.set(*v));

        cell.set(4);
        assert_eq!(seen.get(), 40);
    }

    #[test]
    fn unchanged_result_stops_propagation() {
        let cell = Cell::new(1);
        let source = cell.clone();
        let parity = Computed::new(move || source.get() % 2);

        let calls = Rc::new(Counter::new(0));
        let parity_clone = parity.clone();
        let label = counting(&calls, move || format!("parity {}", parity_clone.get()));

        let fired = Rc::new(Counter::new(0));
        let fired_clone = fired.clone();
        label.add_action(move |_| fired_clone.set(fired_clone.get() + 1));
        assert_eq!(calls.get(), 1);

        cell.set(3);
        assert_eq!(calls.get(), 1);
        assert_eq!(fired.get(), 0);

        cell.set(4);
        assert_eq!(calls.get(), 2);
        assert_eq!(fired.get(), 1);
        assert_eq!(label.get(), "parity 0");
    }

    #[test]
    fn failure_keeps_previous_value() {
        let cell = Cell::new(4);
        let source = cell.clone();
        let half = Computed::try_new(move || {
            let v = source.get();
            if v % 2 == 0 {
                Ok(v / 2)
            } else {
                Err(format!("{v} is odd"))
            }
        });

        assert_eq!(half.get(), 2);

        cell.set(5);
        assert_eq!(half.get(), 2);
        match half.try_get() {
            Err(CellError::Evaluation { message, .. }) => assert_eq!(message, "5 is odd"),
            other => panic!("expected evaluation error, got {other:?}"),
        }
        assert!(half.error().is_some());

        cell.set(8);
        assert_eq!(half.get(), 4);
        assert!(half.error().is_none());
        Runtime::take_diagnostics();
    }

    #[test]
    fn panic_in_function_is_contained() {
        let cell = Cell::new(1);
        let source = cell.clone();
        let checked = Computed::new(move || {
            let v = source.get();
            assert!(v < 10, "too large");
            v
        });

        assert_eq!(checked.get(), 1);
        cell.set(20);
        assert_eq!(checked.get(), 1);
        assert!(matches!(checked.error(), Some(CellError::Evaluation { .. })));
        Runtime::take_diagnostics();
    }

    #[test]
    fn never_succeeded_has_no_value() {
        let failing: Computed<i32> = Computed::try_new(|| Err("boom"));
        assert!(failing.try_get().is_err());
        Runtime::take_diagnostics();
    }

    #[test]
    fn first_failure_still_subscribes() {
        let cell = Cell::new(0);
        let source = cell.clone();
        let half = Computed::try_new(move || {
            let v = source.get();
            if v > 0 {
                Ok(v / 2)
            } else {
                Err(format!("{v} is not positive"))
            }
        });

        let seen = Rc::new(Counter::new(-1));
        let seen_clone = seen.clone();
        half.add_action(move |v| seen_clone.set(*v));
        assert!(half.error().is_some());

        cell.set(10);
        assert_eq!(seen.get(), 5);
        assert!(half.error().is_none());
        Runtime::take_diagnostics();
    }

    #[test]
    fn cycle_leaves_cells_dirty_until_cleared() {
        use crate::graph::NodeState;
        use std::cell::RefCell;

        let flag = Cell::new(false);
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));

        let (flag_clone, slot_clone) = (flag.clone(), slot.clone());
        let a = Computed::new(move || {
            if flag_clone.get() {
                slot_clone.borrow().as_ref().map_or(0, |b| b.get() + 1)
            } else {
                7
            }
        });
        let a_clone = a.clone();
        let b = Computed::new(move || a_clone.get() + 1);
        *slot.borrow_mut() = Some(b.clone());

        assert_eq!((a.get(), b.get()), (7, 8));

        flag.set(true);
        assert!(matches!(a.try_get(), Err(CellError::Cycle { .. })));
        let state = |id| Runtime::with_graph(|graph| graph.state(id));
        assert_eq!(state(a.id()), Some(NodeState::Dirty));
        assert_eq!(state(b.id()), Some(NodeState::Dirty));

        flag.set(false);
        assert_eq!((a.get(), b.get()), (7, 8));
        assert_eq!(state(a.id()), Some(NodeState::Clean));
        assert!(a.error().is_none());

        slot.borrow_mut().take();
        Runtime::take_diagnostics();
    }
}

