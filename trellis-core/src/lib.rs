//! Trellis Core
//!
//! This crate provides the reactive engine of the Trellis UI framework.
//! It implements:
//!
//! - Reactive primitives (cells, computed cells, lazy cells, effects)
//! - Automatic dependency tracking and glitch-free propagation
//! - Specialized cells (toggle, counter, list, breakpoint, debounce, poll, loader)
//! - A persistence adapter mirroring cells into durable storage
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Dependency graph arena, dirty marking and topological ordering
//! - `reactive`: Core reactive primitives, tracking context and runtime
//! - `cells`: Ready-made cells built on the primitives
//! - `persist`: Storage backends and persisted cells
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::{Cell, Computed, Effect, Readable, Writable};
//!
//! // Create a source cell
//! let count = Cell::new(0);
//!
//! // Create a derived value
//! let doubled = Computed::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let _effect = Effect::new({
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     move || println!("Count: {}, Doubled: {}", count.get(), doubled.get())
//! });
//!
//! // Update the cell
//! count.set(5);
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing` and never installs a subscriber. Passes
//! are logged at `trace`, dependency changes and lazy activation at `debug`,
//! and failures at `warn` or `error`.
//!
//! [`Readable::get`] has no error channel, so a cycle or a read of a cell
//! that has never had a value unwinds with the [`CellError`] as the panic
//! payload. The enclosing evaluation catches it and records the failure,
//! but the default panic hook still prints one "thread ... panicked" line
//! per nesting level to stderr. Use [`Readable::try_get`] inside
//! computations that may close a cycle, or install a panic hook that skips
//! `CellError` payloads:
//!
//! ```rust
//! use trellis_core::CellError;
//!
//! let default_hook = std::panic::take_hook();
//! std::panic::set_hook(Box::new(move |info| {
//!     if info.payload().downcast_ref::<CellError>().is_none() {
//!         default_hook(info);
//!     }
//! }));
//! # let _ = std::panic::take_hook();
//! ```

pub mod cells;
pub mod config;
pub mod error;
pub mod graph;
pub mod persist;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{CellError, Result, StorageError};
pub use reactive::{batch, untracked, Readable, Runtime, Writable};
