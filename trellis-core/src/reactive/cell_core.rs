//! Shared cell core.
//!
//! Source, computed and lazy cells are thin handles over one reference
//! counted [`CellCore`]. The core holds the typed state (cached value,
//! compute function, reactions); everything structural lives in the graph
//! node with the same id. Which flavour of cell a core is, is a tag on
//! [`Body`], not a type hierarchy.

use std::cell::{Cell as StdCell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, trace};

use super::cell::CellOptions;
use super::context::{untracked, Dependencies, ReactiveContext};
use super::reaction::{ActionFn, ActionId, ActionOptions, Reaction};
use super::runtime::{Reactive, Runtime};
use crate::error::{panic_message, CellError};
use crate::graph::{Node, NodeId, NodeState};

pub(crate) type Compute<T> = Box<dyn Fn() -> Result<T, CellError>>;
pub(crate) type Equality<T> = Rc<dyn Fn(&T, &T) -> bool>;

pub(crate) enum Body<T> {
    Source,
    Computed {
        compute: Compute<T>,
    },
    Lazy {
        compute: Compute<T>,
        /// Reads the activation cell without tracking.
        activation: Box<dyn Fn() -> bool>,
        active: StdCell<bool>,
    },
}

pub(crate) struct CellCore<T> {
    id: NodeId,
    body: Body<T>,
    value: RefCell<Option<T>>,
    actions: RefCell<Vec<(ActionId, ActionFn<T>)>>,
    equality: Equality<T>,
    always_fire: bool,
    error: RefCell<Option<CellError>>,
}

impl<T: Clone + PartialEq + 'static> CellCore<T> {
    /// Register a new cell with the runtime.
    pub(crate) fn new(
        node: Node,
        body: Body<T>,
        initial: Option<T>,
        options: CellOptions<T>,
    ) -> Rc<Self> {
        let CellOptions {
            name,
            always_fire,
            on_change,
            equality,
        } = options;
        let node = node.with_name(name);
        let id = node.id();

        let core = Rc::new(Self {
            id,
            body,
            value: RefCell::new(initial),
            actions: RefCell::new(Vec::new()),
            equality: equality.unwrap_or_else(|| Rc::new(|a: &T, b: &T| a == b)),
            always_fire,
            error: RefCell::new(None),
        });

        let weak = Rc::downgrade(&core);
        Runtime::register(node, weak);

        if let Some(on_change) = on_change {
            core.add_action(on_change, ActionOptions::default());
        }
        core
    }
}

impl<T: Clone + 'static> CellCore<T> {
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn label(&self) -> String {
        Runtime::label(self.id)
    }

    pub(crate) fn name(&self) -> Option<String> {
        Runtime::with_graph(|graph| {
            graph
                .get_node(self.id)
                .and_then(|node| node.name().map(str::to_owned))
        })
    }

    fn state(&self) -> Option<NodeState> {
        Runtime::with_graph(|graph| graph.state(self.id))
    }

    fn set_state(&self, state: NodeState) {
        Runtime::with_graph(|graph| graph.set_state(self.id, state));
    }

    fn inactive_error(&self) -> CellError {
        CellError::Inactive { cell: self.label() }
    }

    fn has_value(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Record this cell into the enclosing computation, if any.
    fn track(&self) {
        ReactiveContext::track_dependency(self.id);
    }

    /// False only for a lazy cell that is not subscribed to its inputs.
    pub(crate) fn is_active(&self) -> bool {
        match &self.body {
            Body::Lazy { active, .. } => active.get(),
            _ => true,
        }
    }

    pub(crate) fn cached(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub(crate) fn error(&self) -> Option<CellError> {
        self.error.borrow().clone()
    }

    pub(crate) fn try_get(&self) -> Result<T, CellError> {
        self.track();
        self.refresh()?;
        self.cached().ok_or_else(|| self.inactive_error())
    }

    /// Read with fallback: a failed evaluation yields the previous value.
    ///
    /// Panics with the [`CellError`] as payload on a cycle, or when there is
    /// no value to fall back to. An enclosing evaluation catches that panic
    /// and records it as its own failure.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        if let Err(err) = self.settle() {
            panic::panic_any(err);
        }
        let value = self.value.borrow();
        match value.as_ref() {
            Some(value) => f(value),
            None => panic::panic_any(self.inactive_error()),
        }
    }

    pub(crate) fn get(&self) -> T {
        self.with(T::clone)
    }

    fn settle(&self) -> Result<(), CellError> {
        match self.refresh() {
            Ok(()) if self.has_value() => Ok(()),
            Ok(()) => Err(self.inactive_error()),
            Err(err) if !err.is_cycle() && self.has_value() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Evaluate a lazy cell's activation and move it between inactive and
    /// active. Returns false when the cell must not evaluate.
    fn gate_open(&self) -> bool {
        let Body::Lazy {
            activation, active, ..
        } = &self.body
        else {
            return true;
        };

        if untracked(|| activation()) {
            if !active.replace(true) {
                debug!(cell = %self.id, "lazy cell activated");
                // No input edges yet, so a maybe-dirty check would see nothing
                self.set_state(NodeState::Dirty);
            }
            true
        } else {
            if active.replace(false) {
                let _ = Runtime::with_graph(|graph| {
                    graph.replace_dependencies(self.id, std::iter::empty())
                });
                debug!(cell = %self.id, "lazy cell deactivated");
            }
            self.set_state(NodeState::Clean);
            false
        }
    }

    /// Pull the dependencies of a maybe-dirty cell. True if any of them
    /// changed, which also leaves this cell marked dirty.
    fn inputs_changed(&self) -> bool {
        let deps: Vec<NodeId> = Runtime::with_graph(|graph| {
            graph
                .get_node(self.id)
                .map(|node| node.dependencies().iter().copied().collect())
                .unwrap_or_default()
        });

        for dep in Runtime::upgrade(&deps) {
            if dep.refresh().is_err() {
                return true;
            }
            if self.state() == Some(NodeState::Dirty) {
                return true;
            }
        }
        false
    }

    fn evaluate(&self) -> Result<(), CellError> {
        let compute = match &self.body {
            Body::Source => return Ok(()),
            Body::Computed { compute } | Body::Lazy { compute, .. } => compute,
        };

        self.set_state(NodeState::Evaluating);
        let ctx = ReactiveContext::enter(self.id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| compute()));
        let read = ctx.finish();

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(CellError::from_panic(self.label(), payload)),
        };

        let committed = match result {
            Ok(value) => {
                match Runtime::with_graph(|graph| graph.replace_dependencies(self.id, read)) {
                    Ok(diff) => Ok((value, diff)),
                    Err(path) => {
                        let err = Runtime::cycle_from_path(&path);
                        Runtime::report(Some(self.id), err.clone());
                        Err(err)
                    }
                }
            }
            // A cycle's read set contains the cycle edge itself.
            Err(err) if err.is_cycle() => Err(err),
            Err(err) => {
                self.subscribe_after_failure(read);
                Err(err)
            }
        };

        match committed {
            Ok((value, diff)) => {
                if !diff.is_empty() {
                    debug!(
                        cell = %self.id,
                        added = diff.added.len(),
                        removed = diff.removed.len(),
                        "dependencies changed"
                    );
                }

                let changed = match self.value.borrow().as_ref() {
                    Some(old) => self.always_fire || !(self.equality)(old, &value),
                    None => true,
                };
                if changed {
                    *self.value.borrow_mut() = Some(value);
                }
                self.error.borrow_mut().take();

                Runtime::with_graph(|graph| {
                    graph.set_state(self.id, NodeState::Clean);
                    if changed {
                        if let Some(node) = graph.get_node_mut(self.id) {
                            node.bump_version();
                        }
                        graph.mark_dependents_dirty(self.id);
                    }
                });
                trace!(cell = %self.id, changed, "evaluated");
                Ok(())
            }
            Err(err) => {
                // Keep the previous value; retry on the next pull.
                self.set_state(NodeState::Dirty);
                *self.error.borrow_mut() = Some(err.clone());
                if !err.is_cycle() {
                    Runtime::report(Some(self.id), err.clone());
                }
                Err(err)
            }
        }
    }

    /// Add every cell a failed run read to the existing edges, so a change
    /// upstream still reaches this cell. Nothing is removed until a run
    /// succeeds.
    fn subscribe_after_failure(&self, read: Dependencies) {
        let outcome = Runtime::with_graph(|graph| {
            let previous: Vec<NodeId> = graph
                .get_node(self.id)
                .map(|node| node.dependencies().iter().copied().collect())
                .unwrap_or_default();
            graph.replace_dependencies(self.id, previous.into_iter().chain(read))
        });
        match outcome {
            Ok(diff) if !diff.added.is_empty() => {
                debug!(cell = %self.id, added = diff.added.len(), "subscribed after failure");
            }
            Ok(_) => {}
            Err(path) => {
                trace!(cell = %self.id, len = path.len(), "failed run closes a cycle, edges kept");
            }
        }
    }

    fn run_actions(&self) {
        let actions: Vec<ActionFn<T>> = self
            .actions
            .borrow()
            .iter()
            .map(|(_, action)| Rc::clone(action))
            .collect();
        if actions.is_empty() {
            return;
        }
        let Some(value) = self.cached() else {
            return;
        };

        for action in actions {
            self.invoke(&action, &value);
        }
    }

    /// Run one reaction, isolating a panic so the others still run.
    fn invoke(&self, action: &ActionFn<T>, value: &T) {
        let outcome = untracked(|| panic::catch_unwind(AssertUnwindSafe(|| action(value))));
        if let Err(payload) = outcome {
            Runtime::report(
                Some(self.id),
                CellError::Reaction {
                    cell: self.label(),
                    message: panic_message(payload.as_ref()),
                },
            );
        }
    }

    fn sync_action_count(&self) {
        let count = self.actions.borrow().len();
        Runtime::with_graph(|graph| {
            if let Some(node) = graph.get_node_mut(self.id) {
                node.set_action_count(count);
            }
        });
    }

    pub(crate) fn add_action(&self, action: ActionFn<T>, options: ActionOptions) -> ActionId {
        // A computed cell must have evaluated once to be subscribed to its
        // inputs before anything can watch it.
        let _ = untracked(|| self.refresh());

        let id = ActionId::new();
        self.actions.borrow_mut().push((id, Rc::clone(&action)));
        self.sync_action_count();
        Runtime::with_graph(|graph| {
            if let Some(node) = graph.get_node_mut(self.id) {
                node.mark_notified();
            }
        });

        if options.run_immediately {
            if let Some(value) = self.cached() {
                self.invoke(&action, &value);
            }
        }
        id
    }

    pub(crate) fn remove_action(&self, id: ActionId) -> bool {
        let removed = {
            let mut actions = self.actions.borrow_mut();
            let before = actions.len();
            actions.retain(|(action_id, _)| *action_id != id);
            actions.len() != before
        };
        if removed {
            self.sync_action_count();
        }
        removed
    }

    pub(crate) fn react(self: &Rc<Self>, action: ActionFn<T>, options: ActionOptions) -> Reaction {
        let id = self.add_action(action, options);
        let weak = Rc::downgrade(self);
        Reaction::new(
            id,
            Box::new(move |id| {
                if let Some(core) = weak.upgrade() {
                    core.remove_action(id);
                }
            }),
        )
    }

    /// Store a new source value and propagate if it differs.
    pub(crate) fn write(&self, value: T, force: bool) {
        let changed = force
            || self.always_fire
            || match self.value.borrow().as_ref() {
                Some(old) => !(self.equality)(old, &value),
                None => true,
            };
        if !changed {
            trace!(cell = %self.id, "set skipped, value unchanged");
            return;
        }
        *self.value.borrow_mut() = Some(value);
        Runtime::notify_changed(self.id);
    }

    pub(crate) fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = match self.value.borrow().as_ref() {
            Some(value) => f(value),
            None => return,
        };
        self.write(next, false);
    }

    /// Mutate the value in place. Always propagates.
    pub(crate) fn update_in_place(&self, f: impl FnOnce(&mut T)) {
        {
            let mut value = self.value.borrow_mut();
            match value.as_mut() {
                Some(value) => f(value),
                None => return,
            }
        }
        Runtime::notify_changed(self.id);
    }
}

impl<T: Clone + 'static> Reactive for CellCore<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn refresh(&self) -> Result<(), CellError> {
        let Some(state) = self.state() else {
            return Ok(());
        };

        match state {
            NodeState::Clean => Ok(()),
            NodeState::Evaluating => {
                let err = Runtime::cycle_error(self.id);
                Runtime::report(Some(self.id), err.clone());
                Err(err)
            }
            NodeState::MaybeDirty | NodeState::Dirty => {
                if !self.gate_open() {
                    return Ok(());
                }
                if self.state() == Some(NodeState::MaybeDirty) && !self.inputs_changed() {
                    self.set_state(NodeState::Clean);
                    return Ok(());
                }
                self.evaluate()
            }
        }
    }

    fn flush(&self) {
        let watched = !self.actions.borrow().is_empty();
        if !watched {
            // Unwatched lazy cells are only flushed to drop their inputs
            // promptly once deactivated; activation alone never evaluates.
            if let Body::Lazy {
                activation, active, ..
            } = &self.body
            {
                if active.get() && !untracked(|| activation()) {
                    self.gate_open();
                }
            }
            return;
        }

        if let Err(err) = self.refresh() {
            trace!(cell = %self.id, %err, "flush skipped");
            return;
        }

        let fire = Runtime::with_graph(|graph| {
            graph.get_node_mut(self.id).is_some_and(|node| {
                let fire = node.needs_notify();
                node.mark_notified();
                fire
            })
        });
        if fire {
            self.run_actions();
        }
    }
}

impl<T> Drop for CellCore<T> {
    fn drop(&mut self) {
        Runtime::release(self.id);
    }
}
