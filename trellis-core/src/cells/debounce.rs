//! Time-shifted cells.
//!
//! [`Debounce`] commits the upstream value once it has been stable for a
//! configured interval; every upstream change before the interval expires
//! cancels the pending timer and starts a new one. [`Delay`] commits every
//! upstream value after a fixed lag, without coalescing.
//!
//! Both are source cells from the graph's point of view: the timer task
//! writes into them, so downstream cells see one ordinary change per commit.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::{spawn_local, JoinHandle};
use tokio::time::sleep;
use tracing::trace;

use crate::reactive::{Cell, Reaction, Readable, Writable};

use super::delegate_readable;

/// A cell that follows another once it stops changing.
///
/// Must be created inside a [`tokio::task::LocalSet`].
pub struct Debounce<T> {
    output: Cell<T>,
    timer: Rc<RefCell<Option<JoinHandle<()>>>>,
    wait: Duration,
    _watch: Reaction,
}

impl<T: Clone + PartialEq + 'static> Debounce<T> {
    pub fn new<S: Readable<T>>(source: &S, wait: Duration) -> Self {
        let output = Cell::new(source.get_untracked());
        let timer: Rc<RefCell<Option<JoinHandle<()>>>> = Rc::new(RefCell::new(None));

        let watch = {
            let output = output.clone();
            let timer = timer.clone();
            let id = output.id();
            source.react(move |value: &T| {
                let output = output.clone();
                let value = value.clone();
                let handle = spawn_local(async move {
                    sleep(wait).await;
                    output.set(value);
                });
                if let Some(previous) = timer.borrow_mut().replace(handle) {
                    if !previous.is_finished() {
                        trace!(cell = %id, "debounce restarted");
                    }
                    previous.abort();
                }
            })
        };

        Self {
            output,
            timer,
            wait,
            _watch: watch,
        }
    }

    /// True while an upstream change is waiting to be committed.
    pub fn is_pending(&self) -> bool {
        self.timer
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the pending change, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.timer.borrow_mut().take() {
            handle.abort();
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl<T> Drop for Debounce<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.borrow_mut().take() {
            handle.abort();
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Debounce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("output", &self.output)
            .field("wait", &self.wait)
            .finish()
    }
}

delegate_readable!(impl[T: Clone + 'static] Debounce<T> => T, output);

/// A cell that repeats every value of another after a fixed lag.
///
/// Must be created inside a [`tokio::task::LocalSet`].
pub struct Delay<T> {
    output: Cell<T>,
    timers: Rc<RefCell<Vec<JoinHandle<()>>>>,
    lag: Duration,
    _watch: Reaction,
}

impl<T: Clone + PartialEq + 'static> Delay<T> {
    pub fn new<S: Readable<T>>(source: &S, lag: Duration) -> Self {
        let output = Cell::new(source.get_untracked());
        let timers: Rc<RefCell<Vec<JoinHandle<()>>>> = Rc::new(RefCell::new(Vec::new()));

        let watch = {
            let output = output.clone();
            let timers = timers.clone();
            source.react(move |value: &T| {
                let output = output.clone();
                let value = value.clone();
                let handle = spawn_local(async move {
                    sleep(lag).await;
                    output.set(value);
                });
                let mut timers = timers.borrow_mut();
                timers.retain(|handle| !handle.is_finished());
                timers.push(handle);
            })
        };

        Self {
            output,
            timers,
            lag,
            _watch: watch,
        }
    }

    /// Number of upstream values still in flight.
    pub fn in_flight(&self) -> usize {
        self.timers
            .borrow()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn lag(&self) -> Duration {
        self.lag
    }
}

impl<T> Drop for Delay<T> {
    fn drop(&mut self) {
        for handle in self.timers.borrow_mut().drain(..) {
            handle.abort();
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Delay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delay")
            .field("output", &self.output)
            .field("lag", &self.lag)
            .finish()
    }
}

delegate_readable!(impl[T: Clone + 'static] Delay<T> => T, output);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Computed;
    use tokio::task::LocalSet;

    fn commits<T: Clone + 'static, R: Readable<T>>(cell: &R) -> Rc<RefCell<Vec<T>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        cell.add_action(move |v: &T| log_clone.borrow_mut().push(v.clone()));
        log
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_commits_last_value_once() {
        LocalSet::new()
            .run_until(async {
                let source = Cell::new(0);
                let debounced = Debounce::new(&source, Duration::from_millis(100));
                let log = commits(&debounced);

                source.set(1);
                sleep(Duration::from_millis(30)).await;
                source.set(2);
                sleep(Duration::from_millis(30)).await;
                source.set(3);
                assert!(debounced.is_pending());
                assert_eq!(debounced.get(), 0);

                sleep(Duration::from_millis(150)).await;
                assert_eq!(*log.borrow(), vec![3]);
                assert_eq!(debounced.get(), 3);
                assert!(!debounced.is_pending());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_cancel_and_drop() {
        LocalSet::new()
            .run_until(async {
                let source = Cell::new("a");
                let debounced = Debounce::new(&source, Duration::from_millis(50));

                source.set("b");
                debounced.cancel();
                sleep(Duration::from_millis(100)).await;
                assert_eq!(debounced.get(), "a");

                source.set("c");
                drop(debounced);
                // The aborted timer must not touch anything after the drop
                sleep(Duration::from_millis(100)).await;
                assert_eq!(source.get(), "c");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_follows_derived_cell() {
        LocalSet::new()
            .run_until(async {
                let query = Cell::new(String::new());
                let query_clone = query.clone();
                let trimmed = Computed::new(move || query_clone.get().trim().to_string());
                let debounced = Debounce::new(&trimmed, Duration::from_millis(200));

                query.set(" rust ".into());
                sleep(Duration::from_millis(250)).await;
                assert_eq!(debounced.get(), "rust");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn delay_replays_every_value() {
        LocalSet::new()
            .run_until(async {
                let source = Cell::new(0);
                let delayed = Delay::new(&source, Duration::from_millis(100));
                let log = commits(&delayed);

                source.set(1);
                sleep(Duration::from_millis(10)).await;
                source.set(2);
                assert_eq!(delayed.in_flight(), 2);

                sleep(Duration::from_millis(95)).await;
                assert_eq!(*log.borrow(), vec![1]);

                sleep(Duration::from_millis(20)).await;
                assert_eq!(*log.borrow(), vec![1, 2]);
                assert_eq!(delayed.in_flight(), 0);
            })
            .await;
    }
}
