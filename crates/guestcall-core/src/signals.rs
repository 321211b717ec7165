use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::ChatError;

/// Callbacks consumed by the UI shell as the guest chat progresses
/// towards a conference ticket.
///
/// Implementations must be Send + Sync: callbacks fire from the session
/// receive loop and from worker tasks, and the consumer is responsible
/// for hopping to a UI-affine context if it needs one.
pub trait TicketProgressListener: Send + Sync {
    /// The event stream finished its handshake.
    fn on_stream_connected(&self);
    /// The chat request was queued on an ACD queue.
    fn on_queued(&self);
    /// An agent answered the chat. The returned text, if non-empty, is
    /// posted back to the conversation as a notice.
    fn on_agent_connected(&self) -> String;
    /// The agent sent a conference ticket. May fire more than once; the
    /// backend is free to resend.
    fn on_ticket(&self, ticket: &str);
    /// A non-recoverable error occurred; the session tears down.
    fn on_error(&self, error: ChatError);
}

/// Wraps the listener behind one-shot guards.
///
/// `queued`, `agent_connected` and `error` are delivered at most once per
/// session; `stream_connected` and `ticket` pass straight through. The
/// latches are atomics because error delivery can race between the
/// receive loop and an external `disconnect()`.
pub struct SignalDispatcher {
    listener: Arc<dyn TicketProgressListener>,
    queued: AtomicBool,
    agent_connected: AtomicBool,
    errored: AtomicBool,
}

impl SignalDispatcher {
    pub fn new(listener: Arc<dyn TicketProgressListener>) -> Self {
        Self {
            listener,
            queued: AtomicBool::new(false),
            agent_connected: AtomicBool::new(false),
            errored: AtomicBool::new(false),
        }
    }

    pub fn stream_connected(&self) {
        self.listener.on_stream_connected();
    }

    pub fn queued(&self) {
        if !self.queued.swap(true, Ordering::SeqCst) {
            self.listener.on_queued();
        }
    }

    /// Returns the notice text on first delivery, `None` afterwards.
    pub fn agent_connected(&self) -> Option<String> {
        if self.agent_connected.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.listener.on_agent_connected())
    }

    pub fn ticket(&self, ticket: &str) {
        self.listener.on_ticket(ticket);
    }

    /// Deliver the first error and swallow the rest. Returns whether this
    /// call was the one delivered.
    pub fn error(&self, error: ChatError) -> bool {
        if self.errored.swap(true, Ordering::SeqCst) {
            tracing::debug!("suppressing error after first: {error}");
            return false;
        }
        self.listener.on_error(error);
        true
    }
}
