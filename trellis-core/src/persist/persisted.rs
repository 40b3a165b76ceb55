use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Codec, Storage};
use crate::error::{CellError, StorageError};
use crate::reactive::{Cell, Reaction, Readable, Runtime, Writable};
use crate::cells::delegate_readable;

/// A source cell mirrored to a [`Storage`] backend.
///
/// On construction the value is seeded from storage. A missing entry, an
/// unreadable backend or an entry that no longer decodes all fall back to
/// the default. After that every change is encoded and written back; write
/// failures are reported to the diagnostics channel and never interrupt the
/// `set()` that caused them.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use trellis_core::persist::{Codec, MemoryStorage, Persisted};
/// use trellis_core::reactive::{Readable, Writable};
///
/// let storage = Arc::new(MemoryStorage::new());
/// let theme = Persisted::new("theme", "light".to_string(), storage.clone(), Codec::Json);
/// theme.set("dark".to_string());
///
/// let reopened = Persisted::new("theme", "light".to_string(), storage, Codec::Json);
/// assert_eq!(reopened.get(), "dark");
/// ```
pub struct Persisted<T> {
    cell: Cell<T>,
    key: String,
    storage: Arc<dyn Storage>,
    _mirror: Reaction,
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    pub fn new(
        key: impl Into<String>,
        default: T,
        storage: Arc<dyn Storage>,
        codec: Codec,
    ) -> Self {
        let key = key.into();
        let initial = match load(storage.as_ref(), codec, &key) {
            Ok(Some(value)) => {
                debug!(key = %key, "seeded from storage");
                value
            }
            Ok(None) => default,
            Err(err) => {
                warn!(key = %key, error = %err, "stored value unusable, using default");
                default
            }
        };

        let cell = Cell::new(initial);
        let mirror = {
            let key = key.clone();
            let storage = Arc::clone(&storage);
            let id = cell.id();
            cell.react(move |value: &T| {
                let written = codec
                    .encode(value)
                    .and_then(|bytes| storage.write(&key, &bytes));
                if let Err(err) = written {
                    Runtime::report(
                        Some(id),
                        CellError::Storage {
                            key: key.clone(),
                            message: err.to_string(),
                        },
                    );
                }
            })
        };

        Self {
            cell,
            key,
            storage,
            _mirror: mirror,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Delete the stored entry. The cell keeps its current value, and the
    /// next change writes it again.
    pub fn clear_storage(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.key)
    }
}

fn load<T: DeserializeOwned>(
    storage: &dyn Storage,
    codec: Codec,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match storage.read(key)? {
        Some(bytes) => codec.decode(&bytes).map(Some),
        None => Ok(None),
    }
}

delegate_readable!(impl[T: Clone + 'static] Persisted<T> => T, cell);

impl<T: Clone + 'static> Writable<T> for Persisted<T> {
    fn set(&self, value: T) {
        self.cell.set(value);
    }

    fn force_set(&self, value: T) {
        self.cell.force_set(value);
    }

    fn update(&self, f: impl FnOnce(&T) -> T) {
        self.cell.update(f);
    }

    fn update_in_place(&self, f: impl FnOnce(&mut T)) {
        self.cell.update_in_place(f);
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Persisted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("key", &self.key)
            .field("cell", &self.cell)
            .finish()
    }
}
