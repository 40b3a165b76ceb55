//! Capability traits shared by every cell handle.
//!
//! [`Readable`] is implemented by all cells, [`Writable`] only by source
//! cells. Specialized cells take `impl Readable<T>` wherever any kind of
//! upstream cell will do.

use crate::error::CellError;
use crate::graph::NodeId;

use super::reaction::{ActionId, ActionOptions, Reaction};

pub trait Readable<T> {
    /// The graph node backing this cell.
    fn id(&self) -> NodeId;

    /// The diagnostic name given at construction.
    fn name(&self) -> Option<String>;

    /// Read the current value, registering a dependency when called inside
    /// a computation.
    ///
    /// If the last evaluation failed, the previously cached value is
    /// returned and the failure is available from [`error`](Self::error).
    ///
    /// # Panics
    ///
    /// On a dependency cycle, or when the cell has no value at all (a
    /// computation that never succeeded, an inactive lazy cell with nothing
    /// cached). Inside another computation this panic is caught and becomes
    /// that computation's failure; use [`try_get`](Self::try_get) to handle
    /// it directly.
    fn get(&self) -> T;

    /// Read the current value, reporting any evaluation failure.
    fn try_get(&self) -> Result<T, CellError>;

    /// Read without registering a dependency.
    fn get_untracked(&self) -> T;

    /// Borrow the current value. Same tracking and failure rules as
    /// [`get`](Self::get).
    ///
    /// # Panics
    ///
    /// The value stays borrowed while `f` runs. Writing to the same cell
    /// from inside `f` panics with a `BorrowMutError`; read it, or copy what
    /// you need out and write after `with` returns.
    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    /// The failure recorded by the last evaluation, if it failed.
    fn error(&self) -> Option<CellError>;

    /// Attach a reaction fired with the new value on every change.
    fn add_action(&self, action: impl Fn(&T) + 'static) -> ActionId {
        self.add_action_with(action, ActionOptions::default())
    }

    fn add_action_with(&self, action: impl Fn(&T) + 'static, options: ActionOptions) -> ActionId;

    /// Detach a reaction. Returns false if it was not attached.
    fn remove_action(&self, id: ActionId) -> bool;

    /// Attach a reaction that detaches itself when the guard drops.
    fn react(&self, action: impl Fn(&T) + 'static) -> Reaction;
}

pub trait Writable<T>: Readable<T> {
    /// Store a value. No-op if it equals the current one, unless the cell
    /// was created with `always_fire`.
    fn set(&self, value: T);

    /// Store a value and propagate even if it is unchanged.
    fn force_set(&self, value: T);

    /// Replace the value with `f(current)`.
    fn update(&self, f: impl FnOnce(&T) -> T);

    /// Mutate the value in place. Always propagates, once per call.
    fn update_in_place(&self, f: impl FnOnce(&mut T));
}

/// Implements `Readable`, `Clone` and `Debug` for a handle wrapping
/// `core: Rc<CellCore<T>>`.
macro_rules! impl_readable {
    ($handle:ident) => {
        impl<T: Clone + 'static> $crate::reactive::Readable<T> for $handle<T> {
            fn id(&self) -> $crate::graph::NodeId {
                self.core.id()
            }

            fn name(&self) -> Option<String> {
                self.core.name()
            }

            fn get(&self) -> T {
                self.core.get()
            }

            fn try_get(&self) -> Result<T, $crate::error::CellError> {
                self.core.try_get()
            }

            fn get_untracked(&self) -> T {
                $crate::reactive::untracked(|| self.core.get())
            }

            fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
                self.core.with(f)
            }

            fn error(&self) -> Option<$crate::error::CellError> {
                self.core.error()
            }

            fn add_action_with(
                &self,
                action: impl Fn(&T) + 'static,
                options: $crate::reactive::ActionOptions,
            ) -> $crate::reactive::ActionId {
                self.core.add_action(::std::rc::Rc::new(action), options)
            }

            fn remove_action(&self, id: $crate::reactive::ActionId) -> bool {
                self.core.remove_action(id)
            }

            fn react(&self, action: impl Fn(&T) + 'static) -> $crate::reactive::Reaction {
                self.core.react(
                    ::std::rc::Rc::new(action),
                    $crate::reactive::ActionOptions::default(),
                )
            }
        }

        impl<T> Clone for $handle<T> {
            fn clone(&self) -> Self {
                Self {
                    core: ::std::rc::Rc::clone(&self.core),
                }
            }
        }

        impl<T: Clone + ::std::fmt::Debug + 'static> ::std::fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($handle))
                    .field("id", &self.core.id())
                    .field("value", &self.core.cached())
                    .field("error", &self.core.error())
                    .finish()
            }
        }
    };
}

pub(crate) use impl_readable;
