//! Online/offline state fed by the platform connectivity signal.
//!
//! The monitor never probes the network. A device that reports "online"
//! while the path to the server is broken is caught later by the replay
//! itself, not here.

pub mod signal;

pub use signal::{ConnectivitySignal, StaticSignal, parse_state};

use crate::subscribers::{Subscribers, Subscription};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy)]
struct State {
    online: bool,
    /// No platform signal has been seen; `online` is an optimistic guess.
    degraded: bool,
}

/// Current connectivity plus transition subscribers.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<Mutex<State>>,
    /// Held across a state update and its notification so subscribers see
    /// transitions in the order they were applied.
    order: Arc<Mutex<()>>,
    subscribers: Arc<Subscribers<bool>>,
}

impl ConnectivityMonitor {
    /// `initial` is the platform's current state, or `None` when the
    /// platform offers no signal (the monitor then assumes online).
    pub fn new(initial: Option<bool>) -> Self {
        let state = State {
            online: initial.unwrap_or(true),
            degraded: initial.is_none(),
        };
        if state.degraded {
            tracing::warn!(
                "No connectivity signal available; assuming online and relying on per-call failure classification"
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            order: Arc::new(Mutex::new(())),
            subscribers: Arc::new(Subscribers::new()),
        }
    }

    /// Read the platform state once at startup.
    pub fn from_signal(signal: &dyn ConnectivitySignal) -> Self {
        Self::new(signal.current())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    pub fn is_degraded(&self) -> bool {
        self.lock().degraded
    }

    /// Register a transition handler. It receives the new state and fires
    /// once per transition, never for a repeated identical state.
    pub fn subscribe(&self, handler: impl Fn(bool) + Send + Sync + 'static) -> Subscription {
        self.subscribers.add(move |online: &bool| handler(*online))
    }

    /// Feed a platform notification. Returns whether the state changed.
    ///
    /// Handlers run before this returns and must not call `report` themselves.
    pub fn report(&self, online: bool) -> bool {
        let _order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut state = self.lock();
            state.degraded = false;
            if state.online == online {
                return false;
            }
            state.online = online;
        }

        tracing::info!(online, "Connectivity changed");
        self.subscribers.notify(&online);
        true
    }
}
