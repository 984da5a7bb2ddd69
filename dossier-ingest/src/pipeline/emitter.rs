//! Event sinks
//!
//! A session writes its events into an [`EventSink`]. The HTTP layer uses a
//! [`ChannelSink`] whose receiver feeds the SSE response; the channel holds
//! a single event, so a slow client back-pressures the token relay instead
//! of letting fragments pile up.

use async_trait::async_trait;
use dossier_common::events::PipelineEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// The receiving side is gone (client disconnected)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Destination of a session's events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event, in order.
    async fn send(&self, event: PipelineEvent) -> Result<(), SinkClosed>;

    fn is_closed(&self) -> bool;
}

/// Bounded channel sink feeding an SSE response
pub struct ChannelSink {
    tx: mpsc::Sender<PipelineEvent>,
}

impl ChannelSink {
    /// Sink plus the receiver the transport drains.
    pub fn channel() -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: PipelineEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// In-memory sink that records every event
///
/// Optionally reports itself closed after a number of events, which is how
/// a client disconnect is simulated.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PipelineEvent>>,
    close_after: Option<usize>,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` events, then behave like a disconnected client.
    pub fn closing_after(n: usize) -> Self {
        Self {
            close_after: Some(n),
            closed: AtomicBool::new(n == 0),
            ..Self::default()
        }
    }

    /// Recorded events so far
    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: PipelineEvent) -> Result<(), SinkClosed> {
        if self.is_closed() {
            return Err(SinkClosed);
        }
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
        if self.close_after.is_some_and(|n| events.len() >= n) {
            self.closed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
