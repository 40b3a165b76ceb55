use std::cmp::Ordering;
use std::rc::Rc;

use crate::reactive::{Computed, Readable};

use super::delegate_readable;

/// A bucket index over a numeric cell and a sorted list of thresholds.
///
/// The index is the number of thresholds less than or equal to the source
/// value, so with thresholds `[600, 1200]` a width of 500 is bucket 0, 800
/// bucket 1 and 1200 bucket 2. The index is a computed cell, so moving the
/// source within a bucket recomputes it but notifies nobody.
///
/// # Example
///
/// ```rust
/// use trellis_core::cells::Breakpoint;
/// use trellis_core::reactive::{Cell, Readable, Writable};
///
/// let width = Cell::new(500.0);
/// let layout = Breakpoint::new(&width, [600.0, 1200.0]);
/// let wide = layout.matches(2);
///
/// assert_eq!(layout.get(), 0);
/// width.set(1300.0);
/// assert_eq!(layout.get(), 2);
/// assert!(wide.get());
/// ```
#[derive(Clone, Debug)]
pub struct Breakpoint {
    index: Computed<usize>,
    buckets: usize,
}

impl Breakpoint {
    /// Thresholds are sorted; incomparable values (NaN) are dropped.
    pub fn new<N, S>(source: &S, thresholds: impl IntoIterator<Item = N>) -> Self
    where
        N: Copy + PartialOrd + 'static,
        S: Readable<N> + Clone + 'static,
    {
        let mut thresholds: Vec<N> = thresholds
            .into_iter()
            .filter(|t| t.partial_cmp(t).is_some())
            .collect();
        thresholds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        thresholds.dedup_by(|a, b| a == b);

        let buckets = thresholds.len() + 1;
        let thresholds: Rc<[N]> = thresholds.into();
        let source = source.clone();
        let index = Computed::new(move || {
            let value = source.get();
            thresholds.partition_point(|t| *t <= value)
        });
        Self { index, buckets }
    }

    /// Number of buckets, one more than the number of thresholds.
    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// A boolean cell that is true while the source is in bucket `i`.
    pub fn matches(&self, i: usize) -> Computed<bool> {
        let index = self.index.clone();
        Computed::new(move || index.get() == i)
    }
}

delegate_readable!(impl[] Breakpoint => usize, index);
