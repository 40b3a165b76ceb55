//! Async loader cell.
//!
//! A [`Loader`] starts in [`LoadState::Pending`] and moves to `Ready` or
//! `Failed` when its future completes. The state is an ordinary cell, so a
//! view can branch on it inside a computation, and `value`, `loading` and
//! `error` are derived cells for the common cases.

use std::cell::RefCell;
use std::fmt::{self, Display};
use std::future::Future;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};
use tokio::task::{spawn_local, JoinHandle};
use tracing::debug;

use crate::error::CellError;
use crate::reactive::{Cell, Computed, Readable, Runtime, Writable};

use super::delegate_readable;

/// Progress of an async load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState<T> {
    Pending,
    Ready(T),
    /// The loader's error, rendered with `Display`.
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            LoadState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

type LoadFn<T> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<T, String>>>;

/// A cell driven by an async loader.
///
/// The load starts immediately. Must be created inside a
/// [`tokio::task::LocalSet`].
///
/// # Example
///
/// ```rust
/// use trellis_core::cells::{LoadState, Loader};
/// use trellis_core::reactive::Readable;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// tokio::task::LocalSet::new()
///     .run_until(async {
///         let user = Loader::new(|| async { Ok::<_, String>("ada") });
///         assert!(user.loading().get());
///
///         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
///         assert_eq!(user.get(), LoadState::Ready("ada"));
///     })
///     .await;
/// # }
/// ```
pub struct Loader<T> {
    state: Cell<LoadState<T>>,
    value: Computed<Option<T>>,
    loading: Computed<bool>,
    error: Computed<Option<String>>,
    load: LoadFn<T>,
    task: RefCell<Option<JoinHandle<()>>>,
}

impl<T: Clone + PartialEq + 'static> Loader<T> {
    pub fn new<F, Fut, E>(loader: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
        E: Display,
    {
        let load: LoadFn<T> = Rc::new(move || {
            loader()
                .map(|outcome| outcome.map_err(|err| err.to_string()))
                .boxed_local()
        });

        let state = Cell::new(LoadState::Pending);
        let value = {
            let state = state.clone();
            Computed::new(move || state.with(|s| s.value().cloned()))
        };
        let loading = {
            let state = state.clone();
            Computed::new(move || state.with(LoadState::is_pending))
        };
        let error = {
            let state = state.clone();
            Computed::new(move || state.with(|s| s.error().map(str::to_owned)))
        };

        let loader = Self {
            state,
            value,
            loading,
            error,
            load,
            task: RefCell::new(None),
        };
        loader.start();
        loader
    }

    /// Cancel any load in flight and start a new one.
    pub fn reload(&self) {
        self.state.set(LoadState::Pending);
        self.start();
    }

    fn start(&self) {
        let future = (self.load)();
        let state = self.state.clone();
        let handle = spawn_local(async move {
            let next = match future.await {
                Ok(value) => LoadState::Ready(value),
                Err(message) => {
                    Runtime::report(
                        Some(state.id()),
                        CellError::Evaluation {
                            cell: Runtime::label(state.id()),
                            message: message.clone(),
                        },
                    );
                    LoadState::Failed(message)
                }
            };
            state.set(next);
        });

        if let Some(previous) = self.task.borrow_mut().replace(handle) {
            if !previous.is_finished() {
                debug!(cell = %self.state.id(), "load superseded");
            }
            previous.abort();
        }
    }

    /// The loaded value, `None` while pending or after a failure.
    pub fn value(&self) -> &Computed<Option<T>> {
        &self.value
    }

    pub fn loading(&self) -> &Computed<bool> {
        &self.loading
    }

    pub fn error(&self) -> &Computed<Option<String>> {
        &self.error
    }
}

impl<T> Drop for Loader<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader").field("state", &self.state).finish()
    }
}

delegate_readable!(impl[T: Clone + 'static] Loader<T> => LoadState<T>, state);
