//! Cell Implementation
//!
//! A [`Cell`] is the fundamental reactive primitive: a source value that
//! other cells derive from.
//!
//! # How Cells Work
//!
//! 1. When a cell is read inside a computation, it is recorded into that
//!    computation's tracking frame and becomes one of its dependencies.
//!
//! 2. When a cell is set to a different value, the runtime marks everything
//!    downstream dirty and fires the reactions that care.
//!
//! 3. Setting an equal value does nothing at all, unless the cell was built
//!    with `always_fire` or written with [`Writable::force_set`].
//!
//! # Memory Layout
//!
//! A cell handle is a single `Rc` to the shared core. Cloning a handle is
//! cheap and every clone observes the same value.

use std::rc::Rc;

use super::cell_core::{Body, CellCore, Equality};
use super::readable::{impl_readable, Writable};
use super::reaction::ActionFn;
use crate::graph::Node;

/// Construction options shared by every kind of cell.
pub struct CellOptions<T> {
    pub(crate) name: Option<String>,
    pub(crate) always_fire: bool,
    pub(crate) on_change: Option<ActionFn<T>>,
    pub(crate) equality: Option<Equality<T>>,
}

impl<T> Default for CellOptions<T> {
    fn default() -> Self {
        Self {
            name: None,
            always_fire: false,
            on_change: None,
            equality: None,
        }
    }
}

impl<T> CellOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in diagnostics and logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Propagate on every write or recompute, even when the value is equal.
    pub fn with_always_fire(mut self, always_fire: bool) -> Self {
        self.always_fire = always_fire;
        self
    }

    /// Reaction attached at construction.
    pub fn with_on_change(mut self, on_change: impl Fn(&T) + 'static) -> Self {
        self.on_change = Some(Rc::new(on_change));
        self
    }

    /// Replace the default `PartialEq` comparison used to suppress
    /// propagation of unchanged values.
    pub fn with_equality(mut self, equality: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.equality = Some(Rc::new(equality));
        self
    }
}

/// A reactive source cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Cell, Readable, Writable};
///
/// let count = Cell::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Cell<T> {
    core: Rc<CellCore<T>>,
}

impl<T: Clone + PartialEq + 'static> Cell<T> {
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_options(value, CellOptions::default())
    }

    pub fn with_options(value: T, options: CellOptions<T>) -> Self {
        Self {
            core: CellCore::new(Node::source(), Body::Source, Some(value), options),
        }
    }
}

impl_readable!(Cell);

impl<T: Clone + 'static> Writable<T> for Cell<T> {
    fn set(&self, value: T) {
        self.core.write(value, false);
    }

    fn force_set(&self, value: T) {
        self.core.write(value, true);
    }

    fn update(&self, f: impl FnOnce(&T) -> T) {
        self.core.update(f);
    }

    fn update_in_place(&self, f: impl FnOnce(&mut T)) {
        self.core.update_in_place(f);
    }
}

/// Create a source cell.
pub fn cell<T: Clone + PartialEq + 'static>(value: T) -> Cell<T> {
    Cell::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ActionOptions, Readable};
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn cell_get_and_set() {
        let cell = Cell::new(0);
        assert_eq!(cell.get(), 0);

        cell.set(42);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn cell_update() {
        let cell = Cell::new(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get(), 15);

        cell.update_in_place(|v| *v *= 2);
        assert_eq!(cell.get(), 30);
    }

    #[test]
    fn cell_notifies_actions() {
        let cell = Cell::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        cell.add_action(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        cell.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        cell.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn equal_value_is_a_no_op() {
        let cell = Cell::new(7);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();
        cell.add_action(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(7);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        cell.force_set(7);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn always_fire_propagates_equal_values() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();
        let cell = Cell::with_options(
            1,
            CellOptions::new()
                .with_always_fire(true)
                .with_on_change(move |_| {
                    call_count_clone.fetch_add(1, Ordering::SeqCst);
                }),
        );

        cell.set(1);
        cell.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn custom_equality() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let cell = Cell::with_options(
            "Hello".to_string(),
            CellOptions::new()
                .with_equality(|a: &String, b: &String| a.eq_ignore_ascii_case(b))
                .with_on_change(move |v: &String| seen_clone.borrow_mut().push(v.clone())),
        );

        cell.set("HELLO".to_string());
        cell.set("World".to_string());

        assert_eq!(*seen.borrow(), vec!["World".to_string()]);
        assert_eq!(cell.get(), "World");
    }

    #[test]
    fn action_removal() {
        let cell = Cell::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let id = cell.add_action(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(1);
        assert!(cell.remove_action(id));
        assert!(!cell.remove_action(id));
        cell.set(2);

        // Should not have been called again
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_immediately_fires_on_registration() {
        let cell = Cell::new(3);
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();

        cell.add_action_with(
            move |v| seen_clone.store(*v, Ordering::SeqCst),
            ActionOptions::run_immediately(),
        );

        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reaction_guard_detaches() {
        let cell = Cell::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let reaction = cell.react(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        cell.set(1);
        drop(reaction);
        cell.set(2);

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cell_clone_shares_state() {
        let cell1 = Cell::new(0);
        let cell2 = cell1.clone();

        cell1.set(42);
        assert_eq!(cell2.get(), 42);

        cell2.set(100);
        assert_eq!(cell1.get(), 100);
        assert_eq!(cell1.id(), cell2.id());
    }

    #[test]
    fn cell_ids_are_unique() {
        let s1 = Cell::new(0);
        let s2 = Cell::new(0);
        assert_ne!(s1.id(), s2.id());
    }

    #[test]
    fn name_is_kept() {
        let cell = Cell::with_options(0, CellOptions::new().with_name("width"));
        assert_eq!(cell.name().as_deref(), Some("width"));
        assert_eq!(Cell::new(0).name(), None);
    }

    #[test]
    fn with_allows_nested_reads_and_later_writes() {
        let cell = Cell::new(3);
        let sum = cell.with(|v| v + cell.get());
        assert_eq!(sum, 6);

        // Copy out, then write once the borrow is released
        let next = cell.with(|v| v * 10);
        cell.set(next);
        assert_eq!(cell.get(), 30);
    }
}
