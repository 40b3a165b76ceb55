use crate::reactive::{Cell, CellOptions, Readable, Writable};

use super::delegate_readable;

/// An integer source cell with step mutators and optional clamping.
///
/// Every write, including [`Writable::set`], is clamped into
/// `[min, max]` when bounds are configured.
#[derive(Clone, Debug)]
pub struct Counter {
    cell: Cell<i64>,
    initial: i64,
    min: Option<i64>,
    max: Option<i64>,
}

impl Counter {
    pub fn new(initial: i64) -> Self {
        Self::with_options(initial, None, None, CellOptions::default())
    }

    /// A counter clamped to `[min, max]`. The bounds are swapped if given in
    /// the wrong order.
    pub fn bounded(initial: i64, min: i64, max: i64) -> Self {
        Self::with_options(initial, Some(min), Some(max), CellOptions::default())
    }

    pub fn with_options(
        initial: i64,
        min: Option<i64>,
        max: Option<i64>,
        options: CellOptions<i64>,
    ) -> Self {
        let (min, max) = match (min, max) {
            (Some(lo), Some(hi)) if lo > hi => (Some(hi), Some(lo)),
            bounds => bounds,
        };
        let initial = clamp(initial, min, max);
        Self {
            cell: Cell::with_options(initial, options),
            initial,
            min,
            max,
        }
    }

    pub fn increment(&self) {
        self.increment_by(1);
    }

    pub fn decrement(&self) {
        self.increment_by(-1);
    }

    /// Add `step`, saturating at the bounds and at the integer range.
    pub fn increment_by(&self, step: i64) {
        let next = self.cell.get_untracked().saturating_add(step);
        self.set(next);
    }

    /// Restore the initial value.
    pub fn reset(&self) {
        self.cell.set(self.initial);
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    fn clamp(&self, value: i64) -> i64 {
        clamp(value, self.min, self.max)
    }
}

fn clamp(value: i64, min: Option<i64>, max: Option<i64>) -> i64 {
    let value = min.map_or(value, |min| value.max(min));
    max.map_or(value, |max| value.min(max))
}

delegate_readable!(impl[] Counter => i64, cell);

impl Writable<i64> for Counter {
    fn set(&self, value: i64) {
        self.cell.set(self.clamp(value));
    }

    fn force_set(&self, value: i64) {
        self.cell.force_set(self.clamp(value));
    }

    fn update(&self, f: impl FnOnce(&i64) -> i64) {
        self.cell.update(|v| self.clamp(f(v)));
    }

    fn update_in_place(&self, f: impl FnOnce(&mut i64)) {
        self.cell.update_in_place(|v| {
            f(v);
            *v = self.clamp(*v);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as Count;
    use std::rc::Rc;

    #[test]
    fn counter_steps() {
        let counter = Counter::new(0);
        counter.increment();
        counter.increment();
        counter.decrement();
        assert_eq!(counter.get(), 1);

        counter.increment_by(10);
        assert_eq!(counter.get(), 11);

        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn counter_clamps() {
        let counter = Counter::bounded(5, 0, 3);
        assert_eq!(counter.get(), 3);

        counter.increment();
        assert_eq!(counter.get(), 3);

        counter.set(-10);
        assert_eq!(counter.get(), 0);

        counter.update(|v| v + 100);
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn saturated_counter_stays_quiet() {
        let counter = Counter::bounded(0, 0, 1);
        let fired = Rc::new(Count::new(0));
        let fired_clone = fired.clone();
        counter.add_action(move |_| fired_clone.set(fired_clone.get() + 1));

        counter.increment();
        counter.increment();
        counter.increment();

        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn swapped_bounds() {
        let counter = Counter::bounded(0, 10, -10);
        assert_eq!(counter.min(), Some(-10));
        assert_eq!(counter.max(), Some(10));
        counter.increment_by(i64::MAX);
        assert_eq!(counter.get(), 10);
    }
}
