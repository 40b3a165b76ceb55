use crate::reactive::{Cell, CellOptions, Readable, Writable};

use super::delegate_readable;

/// A boolean source cell with a [`toggle`](Toggle::toggle) convenience.
#[derive(Clone, Debug)]
pub struct Toggle {
    cell: Cell<bool>,
}

impl Toggle {
    pub fn new(initial: bool) -> Self {
        Self {
            cell: Cell::new(initial),
        }
    }

    pub fn with_options(initial: bool, options: CellOptions<bool>) -> Self {
        Self {
            cell: Cell::with_options(initial, options),
        }
    }

    /// Flip the value. Returns the new value.
    pub fn toggle(&self) -> bool {
        let next = !self.cell.get_untracked();
        self.cell.set(next);
        next
    }

    /// The underlying source cell, e.g. to gate a lazy cell.
    pub fn as_cell(&self) -> &Cell<bool> {
        &self.cell
    }
}

impl Default for Toggle {
    fn default() -> Self {
        Self::new(false)
    }
}

delegate_readable!(impl[] Toggle => bool, cell);

impl Writable<bool> for Toggle {
    fn set(&self, value: bool) {
        self.cell.set(value);
    }

    fn force_set(&self, value: bool) {
        self.cell.force_set(value);
    }

    fn update(&self, f: impl FnOnce(&bool) -> bool) {
        self.cell.update(f);
    }

    fn update_in_place(&self, f: impl FnOnce(&mut bool)) {
        self.cell.update_in_place(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::LazyCell;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn toggle_flips() {
        let toggle = Toggle::default();
        assert!(!toggle.get());

        assert!(toggle.toggle());
        assert!(toggle.get());
        assert!(!toggle.toggle());
    }

    #[test]
    fn toggle_notifies_each_flip() {
        let toggle = Toggle::new(true);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        toggle.add_action(move |v| seen_clone.borrow_mut().push(*v));

        toggle.toggle();
        toggle.toggle();
        toggle.set(true);

        assert_eq!(*seen.borrow(), vec![false, true]);
    }

    #[test]
    fn toggle_gates_lazy_cell() {
        let expanded = Toggle::new(false);
        let details = LazyCell::with_default(|| 42, expanded.as_cell(), 0);

        assert_eq!(details.get(), 0);
        expanded.toggle();
        assert_eq!(details.get(), 42);
    }
}
