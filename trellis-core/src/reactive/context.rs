//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a cell is read,
//! it is recorded into the frame of the computation that read it.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Evaluating a computed cell pushes
//! a frame for it; reads record into the top frame; when the computation
//! completes, the frame is popped and its contents become the cell's new
//! dependency set.
//!
//! Frames nest, so a computed cell that reads another computed cell gets
//! its own frame for the inner evaluation. An untracked frame (no
//! subscriber) hides everything below it, which is how reactions and
//! `untracked` reads avoid picking up dependencies.

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::graph::NodeId;

/// Dependencies collected by one frame. Most computations read a handful of
/// cells, so these stay inline.
pub type Dependencies = SmallVec<[NodeId; 8]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The node being evaluated, or `None` for an untracked frame.
    subscriber: Option<NodeId>,
    /// Cells read so far, in first-read order, without duplicates.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber: Option<NodeId>,
    popped: bool,
}

impl ReactiveContext {
    /// Enter a new tracking frame for the given node.
    pub fn enter(subscriber: NodeId) -> Self {
        Self::push(Some(subscriber))
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber,
                dependencies: Dependencies::new(),
            });
        });

        Self {
            subscriber,
            popped: false,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the node whose frame is on top, if it is a tracking frame.
    pub fn current_subscriber() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber))
    }

    /// Record a read of the given cell into the top frame.
    pub fn track_dependency(node_id: NodeId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber.is_some() && !entry.dependencies.contains(&node_id) {
                    entry.dependencies.push(node_id);
                }
            }
        });
    }

    /// Get the dependencies collected in the current frame.
    pub fn get_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }

    /// The evaluation chain from the outermost frame of `node_id` to the top
    /// of the stack, or `None` if `node_id` is not being evaluated.
    pub fn chain_from(node_id: NodeId) -> Option<Vec<NodeId>> {
        CONTEXT_STACK.with(|stack| {
            let stack = stack.borrow();
            let start = stack
                .iter()
                .position(|entry| entry.subscriber == Some(node_id))?;
            Some(
                stack[start..]
                    .iter()
                    .filter_map(|entry| entry.subscriber)
                    .collect(),
            )
        })
    }

    /// Pop this frame and return what it collected.
    pub fn finish(mut self) -> Dependencies {
        self.popped = true;
        self.pop().map(|entry| entry.dependencies).unwrap_or_default()
    }

    fn pop(&self) -> Option<ContextEntry> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Mismatched frames mean a guard escaped its scope.
            if let Some(entry) = &popped {
                debug_assert_eq!(
                    entry.subscriber, self.subscriber,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber, entry.subscriber
                );
            }
            popped
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.popped {
            self.pop();
        }
    }
}

/// Run `f` without recording any reads into the enclosing computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}
