//! Indexed collection cell.
//!
//! A [`CellList`] is a single source cell holding an ordered map from stable
//! [`ItemKey`]s to items. Keys survive inserts and removals around them, so
//! a view can keep per-item state (a row widget, a selection) keyed by them
//! instead of by position.
//!
//! Each mutating call fires exactly one notification; calls that turn out
//! to change nothing (removing a missing key) fire none.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::reactive::{untracked, Cell, CellOptions, Readable, Writable};

use super::delegate_readable;

/// Stable identity of an item in a [`CellList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(u64);

impl ItemKey {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Snapshot of a list's contents, in order.
#[derive(Debug, Clone)]
pub struct Items<T> {
    entries: IndexMap<ItemKey, T>,
}

impl<T> Items<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: ItemKey) -> Option<&T> {
        self.entries.get(&key)
    }

    pub fn get_index(&self, index: usize) -> Option<(ItemKey, &T)> {
        self.entries.get_index(index).map(|(key, item)| (*key, item))
    }

    pub fn position(&self, key: ItemKey) -> Option<usize> {
        self.entries.get_index_of(&key)
    }

    pub fn contains(&self, key: ItemKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ItemKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemKey, &T)> {
        self.entries.iter().map(|(key, item)| (*key, item))
    }
}

impl<T> Default for Items<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

// Order matters: IndexMap's own equality ignores it.
impl<T: PartialEq> PartialEq for Items<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

/// A reactive ordered sequence with stable per-item identity.
///
/// # Example
///
/// ```rust
/// use trellis_core::cells::CellList;
/// use trellis_core::reactive::Readable;
///
/// let todos = CellList::new();
/// let first = todos.push("write docs");
/// todos.push("ship");
/// todos.remove(first);
///
/// assert_eq!(todos.to_vec(), vec!["ship"]);
/// ```
pub struct CellList<T> {
    cell: Cell<Items<T>>,
}

impl<T: Clone + PartialEq + 'static> CellList<T> {
    pub fn new() -> Self {
        Self::with_options(CellOptions::default())
    }

    pub fn with_options(options: CellOptions<Items<T>>) -> Self {
        Self {
            cell: Cell::with_options(Items::default(), options),
        }
    }

    /// Append an item.
    pub fn push(&self, item: T) -> ItemKey {
        let key = ItemKey::next();
        self.cell.update_in_place(|items| {
            items.entries.insert(key, item);
        });
        key
    }

    /// Insert an item at `index`, clamped to the end of the list.
    pub fn insert(&self, index: usize, item: T) -> ItemKey {
        let key = ItemKey::next();
        self.cell.update_in_place(|items| {
            let index = index.min(items.entries.len());
            items.entries.shift_insert(index, key, item);
        });
        key
    }

    /// Remove an item, keeping the order of the rest.
    pub fn remove(&self, key: ItemKey) -> Option<T> {
        if !self.peek(|items| items.contains(key)) {
            return None;
        }
        let mut removed = None;
        self.cell.update_in_place(|items| removed = items.entries.shift_remove(&key));
        removed
    }

    /// Replace an item in place. Returns false if the key is not present.
    pub fn set(&self, key: ItemKey, item: T) -> bool {
        if !self.peek(|items| items.contains(key)) {
            return false;
        }
        self.cell.update_in_place(|items| {
            if let Some(slot) = items.entries.get_mut(&key) {
                *slot = item;
            }
        });
        true
    }

    pub fn clear(&self) {
        if self.peek(Items::is_empty) {
            return;
        }
        self.cell.update_in_place(|items| items.entries.clear());
    }

    /// Keep only the items matching `keep`. Returns how many were removed.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let doomed: Vec<ItemKey> = self.peek(|items| {
            items
                .iter()
                .filter(|(_, item)| !keep(item))
                .map(|(key, _)| key)
                .collect()
        });
        if doomed.is_empty() {
            return 0;
        }
        self.cell.update_in_place(|items| {
            for key in &doomed {
                items.entries.shift_remove(key);
            }
        });
        doomed.len()
    }

    /// Read one item, tracking the whole list.
    pub fn get_item(&self, key: ItemKey) -> Option<T> {
        self.cell.with(|items| items.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.cell.with(Items::len)
    }

    pub fn is_empty(&self) -> bool {
        self.cell.with(Items::is_empty)
    }

    pub fn keys(&self) -> Vec<ItemKey> {
        self.cell.with(|items| items.keys().collect())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.cell.with(|items| items.values().cloned().collect())
    }

    fn peek<R>(&self, f: impl FnOnce(&Items<T>) -> R) -> R {
        untracked(|| self.cell.with(f))
    }
}

impl<T: Clone + PartialEq + 'static> Default for CellList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + 'static> FromIterator<T> for CellList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items = Items {
            entries: iter.into_iter().map(|item| (ItemKey::next(), item)).collect(),
        };
        Self {
            cell: Cell::new(items),
        }
    }
}

impl<T> Clone for CellList<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for CellList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellList").field("cell", &self.cell).finish()
    }
}

delegate_readable!(impl[T: Clone + 'static] CellList<T> => Items<T>, cell);
