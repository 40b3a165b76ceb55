//! Reactive Primitives
//!
//! This module implements the core reactive system: cells, computed cells,
//! lazy cells, reactions and effects. Every specialized cell in
//! [`crate::cells`] is built from these.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`Cell`] is a container for mutable state. When a cell is read inside a
//! computation, it is recorded as a dependency of that computation. When its
//! value changes, everything downstream is marked dirty and the reactions
//! that care are fired.
//!
//! ## Computed Cells
//!
//! A [`Computed`] cell is a derived value that caches its result and
//! re-evaluates only when one of its inputs changed. A [`LazyCell`] is a
//! computed cell that additionally waits for an activation cell.
//!
//! ## Reactions and Effects
//!
//! A reaction is a callback attached to one cell with
//! [`Readable::add_action`]. An [`Effect`] is a computation run for its side
//! effects that tracks whatever it reads.
//!
//! # Implementation Notes
//!
//! Dependencies are discovered with a thread-local stack of tracking frames
//! ([`ReactiveContext`]). Structure lives in a per-thread graph owned by the
//! [`Runtime`]; typed state lives in the cells themselves.

mod cell;
mod cell_core;
mod computed;
mod context;
mod effect;
mod lazy;
mod reaction;
mod readable;
mod runtime;

pub use cell::{cell, Cell, CellOptions};
pub use computed::{computed, Computed};
pub use context::{untracked, Dependencies, ReactiveContext};
pub use effect::Effect;
pub use lazy::{lazy_cell, LazyCell};
pub use reaction::{ActionId, ActionOptions, Reaction};
pub use readable::{Readable, Writable};
pub use runtime::{batch, Diagnostic, Reactive, Runtime};
