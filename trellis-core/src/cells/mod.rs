//! Specialized Cells
//!
//! Ready-made cells built from the primitives in [`crate::reactive`]:
//!
//! - [`Toggle`] and [`Counter`]: source cells with convenience mutators
//! - [`CellList`]: an ordered collection with stable item keys
//! - [`Breakpoint`]: a bucket index over a numeric cell
//! - [`Debounce`] and [`Delay`]: time-shifted copies of another cell
//! - [`Poll`]: a cell refreshed on an interval
//! - [`Loader`]: a cell driven by an async loader
//!
//! Every specialized cell implements [`Readable`](crate::reactive::Readable),
//! so it can be read inside computations and watched like any other cell.
//!
//! # Timers
//!
//! `Debounce`, `Delay`, `Poll` and `Loader` run their timers and futures as
//! tokio tasks spawned with `spawn_local`, so they must be created and driven
//! inside a [`tokio::task::LocalSet`].

mod breakpoint;
mod counter;
mod debounce;
mod list;
mod loader;
mod poll;
mod toggle;

pub use breakpoint::Breakpoint;
pub use counter::Counter;
pub use debounce::{Debounce, Delay};
pub use list::{CellList, ItemKey, Items};
pub use loader::{LoadState, Loader};
pub use poll::Poll;
pub use toggle::Toggle;

/// Implements `Readable` for a wrapper by forwarding to one of its fields.
macro_rules! delegate_readable {
    (impl[$($bounds:tt)*] $handle:ty => $item:ty, $field:ident) => {
        impl<$($bounds)*> $crate::reactive::Readable<$item> for $handle {
            fn id(&self) -> $crate::graph::NodeId {
                self.$field.id()
            }

            fn name(&self) -> Option<String> {
                self.$field.name()
            }

            fn get(&self) -> $item {
                self.$field.get()
            }

            fn try_get(&self) -> Result<$item, $crate::error::CellError> {
                self.$field.try_get()
            }

            fn get_untracked(&self) -> $item {
                self.$field.get_untracked()
            }

            fn with<R>(&self, f: impl FnOnce(&$item) -> R) -> R {
                self.$field.with(f)
            }

            fn error(&self) -> Option<$crate::error::CellError> {
                self.$field.error()
            }

            fn add_action_with(
                &self,
                action: impl Fn(&$item) + 'static,
                options: $crate::reactive::ActionOptions,
            ) -> $crate::reactive::ActionId {
                self.$field.add_action_with(action, options)
            }

            fn remove_action(&self, id: $crate::reactive::ActionId) -> bool {
                self.$field.remove_action(id)
            }

            fn react(&self, action: impl Fn(&$item) + 'static) -> $crate::reactive::Reaction {
                self.$field.react(action)
            }
        }
    };
}

pub(crate) use delegate_readable;
