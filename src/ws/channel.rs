//! Outbound side of the session channel

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use super::protocol::ClientEvent;

/// Fire-and-forget sink for outbound events.
///
/// Emitting never blocks and never fails; when no transport is attached or the
/// outbound queue is full the event is dropped.
pub trait SessionChannel {
    fn emit(&self, event: ClientEvent);

    /// Release the transport. Later emits become no-ops.
    fn close(&self) {}
}

/// Cloneable handle onto the outbound queue of a transport
#[derive(Clone, Default)]
pub struct ChannelHandle {
    outbound: Arc<Mutex<Option<mpsc::Sender<ClientEvent>>>>,
}

impl ChannelHandle {
    /// A handle with no transport behind it yet
    pub fn detached() -> Self {
        Self::default()
    }

    /// Handle already wired to an outbound queue
    pub fn attached(outbound: mpsc::Sender<ClientEvent>) -> Self {
        let handle = Self::default();
        handle.attach(outbound);
        handle
    }

    pub fn attach(&self, outbound: mpsc::Sender<ClientEvent>) {
        *self.outbound.lock() = Some(outbound);
    }

    pub fn is_established(&self) -> bool {
        self.outbound
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

impl SessionChannel for ChannelHandle {
    fn emit(&self, event: ClientEvent) {
        let mut outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            trace!(event = event.name(), "Channel not established, dropping event");
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                trace!(event = event.name(), "Outbound queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                trace!(event = event.name(), "Transport gone, dropping event");
                *outbound = None;
            }
        }
    }

    fn close(&self) {
        self.outbound.lock().take();
    }
}

/// Captures emitted events for assertions
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingChannel {
    events: Mutex<Vec<ClientEvent>>,
}

#[cfg(test)]
impl RecordingChannel {
    pub(crate) fn take(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[cfg(test)]
impl SessionChannel for RecordingChannel {
    fn emit(&self, event: ClientEvent) {
        self.events.lock().push(event);
    }
}
