//! Lazy Cell Implementation
//!
//! A [`LazyCell`] is a computed cell gated by a boolean activation cell.
//! While the activation is off it neither evaluates nor holds edges to its
//! inputs, which keeps features nobody is looking at (collapsed panels,
//! hidden tabs) off the propagation path entirely.
//!
//! # States
//!
//! ```text
//! inactive --activation on--> active-dirty --read/flush--> active-clean
//!    ^                                                          |
//!    +------------------------activation off--------------------+
//! ```
//!
//! The lazy node always keeps one edge from its activation cell, so flipping
//! the activation reaches it like any other change. Everything else it reads
//! is an ordinary dependency, dropped on deactivation.

use std::rc::Rc;

use super::cell::CellOptions;
use super::cell_core::{Body, CellCore};
use super::context::untracked;
use super::readable::{impl_readable, Readable};
use super::runtime::Runtime;
use crate::graph::{Node, NodeState};

/// A computed cell that only evaluates while its activation cell is true.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Cell, LazyCell, Readable, Writable};
///
/// let expanded = Cell::new(false);
/// let rows = Cell::new(3);
/// let summary = LazyCell::with_default(
///     {
///         let rows = rows.clone();
///         move || format!("{} rows", rows.get())
///     },
///     &expanded,
///     String::from("collapsed"),
/// );
///
/// assert_eq!(summary.get(), "collapsed");
/// expanded.set(true);
/// assert_eq!(summary.get(), "3 rows");
/// ```
pub struct LazyCell<T> {
    core: Rc<CellCore<T>>,
}

impl<T: Clone + PartialEq + 'static> LazyCell<T> {
    /// Create a lazy cell with nothing cached. Reading it before its first
    /// activation fails with [`CellError::Inactive`](crate::CellError::Inactive).
    pub fn new<A>(f: impl Fn() -> T + 'static, activation: &A) -> Self
    where
        A: Readable<bool> + Clone + 'static,
    {
        Self::build(f, activation, None, CellOptions::default())
    }

    /// Create a lazy cell that reads as `default` until first activated.
    pub fn with_default<A>(f: impl Fn() -> T + 'static, activation: &A, default: T) -> Self
    where
        A: Readable<bool> + Clone + 'static,
    {
        Self::build(f, activation, Some(default), CellOptions::default())
    }

    pub fn with_options<A>(
        f: impl Fn() -> T + 'static,
        activation: &A,
        default: Option<T>,
        options: CellOptions<T>,
    ) -> Self
    where
        A: Readable<bool> + Clone + 'static,
    {
        Self::build(f, activation, default, options)
    }

    fn build<A>(
        f: impl Fn() -> T + 'static,
        activation: &A,
        default: Option<T>,
        mut options: CellOptions<T>,
    ) -> Self
    where
        A: Readable<bool> + Clone + 'static,
    {
        let activation_id = activation.id();
        let gate = activation.clone();
        let body = Body::Lazy {
            compute: Box::new(move || Ok(f())),
            activation: Box::new(move || untracked(|| gate.try_get().unwrap_or(false))),
            active: std::cell::Cell::new(false),
        };

        // Attach the construction reaction only once the edge is in place.
        let on_change = options.on_change.take();
        let core = CellCore::new(Node::lazy(activation_id), body, default, options);
        let id = core.id();

        let on = untracked(|| activation.try_get().unwrap_or(false));
        Runtime::with_graph(|graph| {
            graph.add_edge(activation_id, id);
            if on {
                graph.set_state(id, NodeState::Dirty);
            }
        });

        if let Some(on_change) = on_change {
            core.add_action(on_change, Default::default());
        }
        Self { core }
    }

    /// Whether the cell is currently subscribed to its inputs.
    ///
    /// Becomes true on the first read or flush after the activation turns
    /// on, and false as soon as it turns off.
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }
}

impl_readable!(LazyCell);

/// Create a lazy cell gated by `activation`.
pub fn lazy_cell<T, A>(f: impl Fn() -> T + 'static, activation: &A) -> LazyCell<T>
where
    T: Clone + PartialEq + 'static,
    A: Readable<bool> + Clone + 'static,
{
    LazyCell::new(f, activation)
}
