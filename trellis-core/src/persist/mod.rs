//! Persistence Adapter
//!
//! Mirrors cells into durable storage. A [`Persisted`] cell seeds itself
//! from a [`Storage`] backend on construction and writes every change back,
//! encoded with a [`Codec`].
//!
//! Backends are `Send + Sync` so a single store can be shared by the
//! runtimes of several threads; the cells themselves stay on the thread
//! that created them.

mod codec;
mod persisted;
mod storage;

pub use codec::Codec;
pub use persisted::Persisted;
pub use storage::{FileStorage, MemoryStorage, Storage};
