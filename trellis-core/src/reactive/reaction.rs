//! Reaction types for the reactive system.
//!
//! A reaction is a callback attached to a single cell. It receives the
//! cell's new value whenever that value changes, and is how the rendering
//! layer, persistence adapters and timers hook into the graph.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a reaction.
///
/// Closures cannot be compared, so detaching a reaction goes through the id
/// handed out when it was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

impl ActionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared reaction callback.
pub(crate) type ActionFn<T> = Rc<dyn Fn(&T)>;

/// Options for attaching a reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOptions {
    /// Invoke the callback with the current value while attaching it.
    pub run_immediately: bool,
}

impl ActionOptions {
    pub fn run_immediately() -> Self {
        Self {
            run_immediately: true,
        }
    }
}

/// A reaction that detaches itself from its cell when dropped.
pub struct Reaction {
    id: ActionId,
    detach: Option<Box<dyn FnOnce(ActionId)>>,
}

impl Reaction {
    pub(crate) fn new(id: ActionId, detach: Box<dyn FnOnce(ActionId)>) -> Self {
        Self {
            id,
            detach: Some(detach),
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Keep the reaction attached for the lifetime of the cell.
    pub fn forget(mut self) -> ActionId {
        self.detach = None;
        self.id
    }
}

impl Drop for Reaction {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach(self.id);
        }
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("id", &self.id)
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as Flag;

    #[test]
    fn action_ids_are_unique() {
        let id1 = ActionId::new();
        let id2 = ActionId::new();
        let id3 = ActionId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn reaction_detaches_on_drop() {
        let detached = Rc::new(Flag::new(None));
        let detached_clone = detached.clone();
        let id = ActionId::new();

        let reaction = Reaction::new(id, Box::new(move |id| detached_clone.set(Some(id))));
        assert_eq!(detached.get(), None);

        drop(reaction);
        assert_eq!(detached.get(), Some(id));
    }

    #[test]
    fn forgotten_reaction_stays_attached() {
        let detached = Rc::new(Flag::new(false));
        let detached_clone = detached.clone();

        let reaction = Reaction::new(ActionId::new(), Box::new(move |_| detached_clone.set(true)));
        reaction.forget();

        assert!(!detached.get());
    }
}
