//! Per-session state, passed explicitly to the operations that read or write it.

use tokio_util::sync::CancellationToken;

use crate::messages::RetrievalContext;

/// Mutable state of one client session.
///
/// Single-writer rules: only the availability waiter writes `api_ready`; only a
/// completed stream writes `contexts`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub api_ready: bool,
    pub startup_checked: bool,
    /// Contexts of the most recently completed answer.
    pub contexts: Vec<RetrievalContext>,
}

/// A session: its state, whether a query is running, and a token that tears it down.
#[derive(Debug, Default)]
pub struct Session {
    pub state: SessionState,
    in_flight: bool,
    cancel: CancellationToken,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// New submissions are accepted only while the service is ready and nothing is running.
    pub fn can_submit(&self) -> bool {
        self.state.api_ready && !self.in_flight && !self.cancel.is_cancelled()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub(crate) fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }

    /// Token observed by every wait and stream run on behalf of this session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort any in-flight wait or stream. The session can not be reused afterwards.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    /// Start over with fresh state and a new cancellation token.
    pub fn restart(&mut self) {
        self.cancel.cancel();
        *self = Self::default();
    }
}
