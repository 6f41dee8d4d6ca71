/// Platform connectivity source, read once when a session starts.
/// Later changes arrive through [`super::ConnectivityMonitor::report`].
pub trait ConnectivitySignal {
    /// `None` when the platform cannot tell.
    fn current(&self) -> Option<bool>;
}

/// A fixed answer: for hosts without a signal, or for tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticSignal {
    state: Option<bool>,
}

impl StaticSignal {
    pub fn new(state: Option<bool>) -> Self {
        Self { state }
    }

    pub fn unknown() -> Self {
        Self { state: None }
    }
}

impl ConnectivitySignal for StaticSignal {
    fn current(&self) -> Option<bool> {
        self.state
    }
}

/// Parse a textual platform notification (`online`, `offline`, ...).
pub fn parse_state(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "online" | "up" | "connected" => Some(true),
        "offline" | "down" | "disconnected" => Some(false),
        _ => None,
    }
}
