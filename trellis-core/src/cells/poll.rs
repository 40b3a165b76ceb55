use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tokio::task::{spawn_local, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::{panic_message, CellError};
use crate::reactive::{Cell, Readable, Runtime, Writable};

use super::delegate_readable;

/// A source cell refreshed on a fixed interval by a producer function.
///
/// The producer runs once at construction for the initial value, then once
/// per tick. A panicking producer is reported as an evaluation failure and
/// the cell keeps its value until the next tick. Ticks missed because the
/// thread was busy are not replayed in a burst.
///
/// Must be created inside a [`tokio::task::LocalSet`].
pub struct Poll<T> {
    cell: Cell<T>,
    period: Duration,
    task: RefCell<Option<JoinHandle<()>>>,
}

impl<T: Clone + PartialEq + 'static> Poll<T> {
    pub fn new(period: Duration, producer: impl Fn() -> T + 'static) -> Self {
        let cell = Cell::new(producer());

        let target = cell.clone();
        let task = spawn_local(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                match panic::catch_unwind(AssertUnwindSafe(|| producer())) {
                    Ok(value) => target.set(value),
                    Err(payload) => Runtime::report(
                        Some(target.id()),
                        CellError::Evaluation {
                            cell: Runtime::label(target.id()),
                            message: panic_message(payload.as_ref()),
                        },
                    ),
                }
            }
        });

        Self {
            cell,
            period,
            task: RefCell::new(Some(task)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.task
            .borrow()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop polling. The cell keeps its last value.
    pub fn cancel(&self) {
        if let Some(task) = self.task.borrow_mut().take() {
            debug!(cell = %self.cell.id(), "polling cancelled");
            task.abort();
        }
    }
}

impl<T> Drop for Poll<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Poll<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poll")
            .field("cell", &self.cell)
            .field("period", &self.period)
            .finish()
    }
}

delegate_readable!(impl[T: Clone + 'static] Poll<T> => T, cell);

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as Count;
    use std::rc::Rc;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn poll_refreshes_on_interval() {
        LocalSet::new()
            .run_until(async {
                let calls = Rc::new(Count::new(0));
                let calls_clone = calls.clone();
                let poll = Poll::new(Duration::from_secs(1), move || {
                    calls_clone.set(calls_clone.get() + 1);
                    calls_clone.get()
                });
                assert_eq!(poll.get(), 1);
                assert!(poll.is_running());

                sleep(Duration::from_millis(3500)).await;
                assert_eq!(poll.get(), 4);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling() {
        LocalSet::new()
            .run_until(async {
                let calls = Rc::new(Count::new(0));
                let calls_clone = calls.clone();
                let poll = Poll::new(Duration::from_millis(100), move || {
                    calls_clone.set(calls_clone.get() + 1);
                    calls_clone.get()
                });

                sleep(Duration::from_millis(150)).await;
                poll.cancel();
                let seen = poll.get();
                sleep(Duration::from_millis(500)).await;

                assert_eq!(poll.get(), seen);
                assert_eq!(calls.get(), 2);
                assert!(!poll.is_running());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_producer_is_reported() {
        LocalSet::new()
            .run_until(async {
                let calls = Rc::new(Count::new(0));
                let calls_clone = calls.clone();
                let poll = Poll::new(Duration::from_millis(100), move || {
                    calls_clone.set(calls_clone.get() + 1);
                    assert!(calls_clone.get() != 2, "sensor offline");
                    calls_clone.get()
                });
                Runtime::take_diagnostics();

                sleep(Duration::from_millis(150)).await;
                assert_eq!(poll.get(), 1);
                let diagnostics = Runtime::take_diagnostics();
                assert!(matches!(
                    diagnostics.as_slice(),
                    [diagnostic] if matches!(diagnostic.error, CellError::Evaluation { .. })
                ));

                sleep(Duration::from_millis(100)).await;
                assert_eq!(poll.get(), 3);
            })
            .await;
    }
}
