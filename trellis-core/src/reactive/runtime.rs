//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects cells, the
//! dependency graph and reactions. It owns the graph and schedules
//! propagation passes when source cells change.
//!
//! # How It Works
//!
//! 1. When a cell is created, it registers its graph node and a weak handle
//!    to itself with the runtime.
//!
//! 2. When a computed cell finishes evaluating, it commits the cells it read
//!    as its new dependency edges.
//!
//! 3. When a source cell's value changes, the runtime:
//!    a. Marks the transitive dependents dirty (no recomputation)
//!    b. Orders the affected nodes topologically
//!    c. Flushes every node that has reactions: pull, then fire if changed
//!    d. Computed cells nobody is watching stay dirty until they are read
//!
//! Mutations made while a pass is running (by a reaction, or inside
//! [`batch`]) are marked straight away and queued as roots of the next pass,
//! which still runs before the outermost `set()` returns.
//!
//! # Threading
//!
//! The graph is single-threaded. Each thread gets its own runtime through
//! thread-local storage; cell handles are `!Send`, so they can never reach
//! another thread's graph.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use tracing::{error, trace, warn};

use super::context::ReactiveContext;
use crate::config::RuntimeConfig;
use crate::error::CellError;
use crate::graph::{Node, NodeId, NodeKind, UpdateScheduler};

/// A cell as seen by the runtime, with its value type erased.
pub trait Reactive {
    /// The graph node backing this cell.
    fn node_id(&self) -> NodeId;

    /// Bring the cached value up to date, evaluating if necessary.
    fn refresh(&self) -> Result<(), CellError>;

    /// Called by the scheduler during a pass: pull the value if needed and
    /// fire reactions if it moved since they last ran.
    fn flush(&self);
}

/// A failure reported to the diagnostics channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// The cell involved, if any.
    pub node: Option<NodeId>,
    pub error: CellError,
}

type DiagnosticHook = Rc<dyn Fn(&Diagnostic)>;

struct RuntimeState {
    graph: UpdateScheduler,
    registry: HashMap<NodeId, Weak<dyn Reactive>>,
    /// Roots waiting for the next pass.
    pending: Vec<NodeId>,
    /// True while a pass (or a batch) is running.
    propagating: bool,
    config: RuntimeConfig,
    diagnostics: VecDeque<Diagnostic>,
    hook: Option<DiagnosticHook>,
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            graph: UpdateScheduler::new(),
            registry: HashMap::new(),
            pending: Vec::new(),
            propagating: false,
            config: RuntimeConfig::default(),
            diagnostics: VecDeque::new(),
            hook: None,
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::new());
}

fn with_state<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    RUNTIME.with(|state| f(&mut state.borrow_mut()))
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Replace the configuration of this thread's runtime.
    pub fn configure(config: RuntimeConfig) {
        with_state(|rt| {
            rt.config = config;
            let capacity = rt.config.diagnostic_capacity;
            while rt.diagnostics.len() > capacity {
                rt.diagnostics.pop_front();
            }
        });
    }

    pub fn config() -> RuntimeConfig {
        with_state(|rt| rt.config.clone())
    }

    /// Add a node to the graph and register the cell behind it.
    pub(crate) fn register(node: Node, reactive: Weak<dyn Reactive>) -> NodeId {
        with_state(|rt| {
            let id = rt.graph.add_node(node);
            rt.registry.insert(id, reactive);
            id
        })
    }

    /// Remove a cell's node and all of its edges.
    ///
    /// Called from the cell's destructor, which may run during thread
    /// teardown or while the runtime is busy, so this never panics.
    pub(crate) fn release(node_id: NodeId) {
        let released = RUNTIME.try_with(|state| match state.try_borrow_mut() {
            Ok(mut rt) => {
                rt.graph.remove_node(node_id);
                rt.registry.remove(&node_id);
                rt.pending.retain(|id| *id != node_id);
                true
            }
            Err(_) => false,
        });
        if let Ok(false) = released {
            warn!(node = %node_id, "runtime busy, cell node leaked");
        }
    }

    /// Run `f` with mutable access to the graph.
    ///
    /// `f` must not call back into user code.
    pub(crate) fn with_graph<R>(f: impl FnOnce(&mut UpdateScheduler) -> R) -> R {
        with_state(|rt| f(&mut rt.graph))
    }

    /// Strong handles to the given nodes' cells, skipping released ones.
    pub(crate) fn upgrade(ids: &[NodeId]) -> Vec<Rc<dyn Reactive>> {
        with_state(|rt| {
            ids.iter()
                .filter_map(|id| rt.registry.get(id).and_then(Weak::upgrade))
                .collect()
        })
    }

    pub(crate) fn label(node_id: NodeId) -> String {
        with_state(|rt| rt.graph.label(node_id))
    }

    /// Build the cycle error for a read of `node_id` while it is evaluating.
    pub(crate) fn cycle_error(node_id: NodeId) -> CellError {
        let mut chain = ReactiveContext::chain_from(node_id).unwrap_or_else(|| vec![node_id]);
        chain.push(node_id);
        Self::cycle_from_path(&chain)
    }

    pub(crate) fn cycle_from_path(path: &[NodeId]) -> CellError {
        with_state(|rt| CellError::Cycle {
            chain: path.iter().map(|id| rt.graph.label(*id)).collect(),
        })
    }

    /// Record that a source cell's value changed and propagate.
    ///
    /// Returns once every reaction affected by the change has run, unless a
    /// pass is already in progress further up the stack, in which case the
    /// change is queued for that pass to pick up.
    pub(crate) fn notify_changed(node_id: NodeId) {
        let start = with_state(|rt| {
            let reached = rt.graph.mark_changed(node_id);
            trace!(node = %node_id, reached, "source changed");
            rt.pending.push(node_id);
            !std::mem::replace(&mut rt.propagating, true)
        });

        if start {
            Self::run_passes();
        }
    }

    /// Defer propagation until `f` returns, then run a single pass for every
    /// mutation made inside it.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        let outer = with_state(|rt| std::mem::replace(&mut rt.propagating, true));
        let guard = BatchGuard { outer };
        let result = f();
        drop(guard);
        result
    }

    fn run_passes() {
        let _guard = PassGuard;
        let max_passes = with_state(|rt| rt.config.max_passes);
        let mut passes = 0usize;

        loop {
            let next = with_state(|rt| {
                if rt.pending.is_empty() {
                    return None;
                }
                let roots = std::mem::take(&mut rt.pending);
                let order = rt.graph.affected_in_order(&roots);
                let targets: Vec<Rc<dyn Reactive>> = order
                    .into_iter()
                    .filter(|id| {
                        rt.graph.get_node(*id).is_some_and(|node| {
                            node.action_count() > 0 || node.kind() == NodeKind::Lazy
                        })
                    })
                    .filter_map(|id| rt.registry.get(&id).and_then(Weak::upgrade))
                    .collect();
                Some((roots.len(), targets))
            });

            let Some((roots, targets)) = next else {
                break;
            };

            passes += 1;
            if passes > max_passes {
                with_state(|rt| rt.pending.clear());
                Self::report(None, CellError::PropagationLimit { passes: max_passes });
                break;
            }

            trace!(pass = passes, roots, targets = targets.len(), "propagation pass");
            let _untracked = ReactiveContext::untracked();
            for target in targets {
                target.flush();
            }
        }
    }

    /// Send a failure to the diagnostics channel.
    pub fn report(node: Option<NodeId>, error: CellError) {
        match &error {
            CellError::Reaction { .. } | CellError::PropagationLimit { .. } => {
                error!(node = ?node, %error, "reactive failure")
            }
            _ => warn!(node = ?node, %error, "reactive failure"),
        }

        let diagnostic = Diagnostic { node, error };
        let hook = with_state(|rt| {
            if rt.config.diagnostic_capacity > 0 {
                if rt.diagnostics.len() >= rt.config.diagnostic_capacity {
                    rt.diagnostics.pop_front();
                }
                rt.diagnostics.push_back(diagnostic.clone());
            }
            rt.hook.clone()
        });

        if let Some(hook) = hook {
            hook(&diagnostic);
        }
    }

    /// Drain the buffered diagnostics, oldest first.
    pub fn take_diagnostics() -> Vec<Diagnostic> {
        with_state(|rt| rt.diagnostics.drain(..).collect())
    }

    /// Install a callback invoked for every diagnostic as it is reported.
    pub fn set_diagnostic_hook(hook: impl Fn(&Diagnostic) + 'static) {
        with_state(|rt| rt.hook = Some(Rc::new(hook)));
    }

    pub fn clear_diagnostic_hook() {
        with_state(|rt| rt.hook = None);
    }

    /// Get the cell currently being evaluated, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Number of live cells on this thread.
    pub fn node_count() -> usize {
        with_state(|rt| rt.graph.node_count())
    }
}

/// Clears the propagating flag when the pass loop exits, even by unwinding.
struct PassGuard;

impl Drop for PassGuard {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|state| {
            if let Ok(mut rt) = state.try_borrow_mut() {
                rt.propagating = false;
            }
        });
    }
}

struct BatchGuard {
    outer: bool,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.outer {
            return;
        }
        if std::thread::panicking() {
            let _ = RUNTIME.try_with(|state| {
                if let Ok(mut rt) = state.try_borrow_mut() {
                    rt.propagating = false;
                }
            });
        } else {
            Runtime::run_passes();
        }
    }
}

/// Group several mutations into one propagation pass.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}
