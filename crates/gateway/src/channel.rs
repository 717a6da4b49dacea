//! The streaming channel: the server-to-client half of a session.
//!
//! A channel is a framework-agnostic sink. The HTTP layer drains the paired
//! receiver into the SSE response body; everything else only sees `send` and
//! `close`.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use {thiserror::Error, tokio::sync::mpsc};

use apibridge_protocol::{ENDPOINT_EVENT, MESSAGE_EVENT};

/// One server-to-client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// SSE event name; `None` for unnamed events.
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Handshake event carrying the message-post URL for this session.
    pub fn endpoint(url: impl Into<String>) -> Self {
        Self {
            event: Some(ENDPOINT_EVENT.into()),
            data: url.into(),
        }
    }

    /// Ordinary protocol message.
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: Some(MESSAGE_EVENT.into()),
            data: data.into(),
        }
    }
}

/// Write attempted after the stream was torn down. Benign: the caller logs
/// it and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel closed")]
pub struct ChannelClosed;

/// Sender half of one session's stream. Events are delivered to the client
/// in send order; the queue is unbounded so `send` never blocks a caller.
pub struct SseChannel {
    tx: Mutex<Option<mpsc::UnboundedSender<ServerEvent>>>,
    closed: AtomicBool,
}

impl SseChannel {
    /// Create a channel and the receiver the HTTP layer will drain.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
        });
        (channel, rx)
    }

    /// Queue an event for the client. Fails once the channel is closed or
    /// the receiver side is gone.
    pub fn send(&self, event: ServerEvent) -> Result<(), ChannelClosed> {
        let guard = self.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(event).map_err(|_| ChannelClosed),
            None => Err(ChannelClosed),
        }
    }

    /// Close the channel: drops the sender, which ends the SSE body.
    /// Idempotent: only the first call performs the close and returns true.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.tx.lock().unwrap().take();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
