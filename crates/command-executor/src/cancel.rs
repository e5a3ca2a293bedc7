//! Cooperative cancellation
//!
//! A [`CancelHandle`] and its [`CancelSignal`]s share a channel that never
//! carries a message; cancelling closes it. Every signal observes the
//! closure, synchronously through [`CancelSignal::is_cancelled`] and
//! asynchronously by awaiting [`CancelSignal::cancelled`]. Dropping the
//! handle without calling [`CancelHandle::cancel`] does not fire the signal.

use async_channel::{Receiver, Sender};

/// Trigger side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

/// Observer side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: Receiver<()>,
    // Keeps the channel open when every handle is gone
    _anchor: Sender<()>,
}

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let handle = CancelHandle::new();
    let signal = handle.signal();
    (handle, signal)
}

impl CancelHandle {
    /// Create a handle with no observers yet
    pub fn new() -> Self {
        let (sender, receiver) = async_channel::bounded(1);
        Self { sender, receiver }
    }

    /// Fire the signal; idempotent
    pub fn cancel(&self) {
        self.sender.close();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }

    /// Another observer for this handle
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: self.receiver.clone(),
            _anchor: self.sender.clone(),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        CancelHandle::new().signal()
    }

    /// Whether the paired handle has fired
    pub fn is_cancelled(&self) -> bool {
        self.receiver.is_closed()
    }

    /// Resolve once the paired handle fires
    pub async fn cancelled(&self) {
        // Nothing is ever sent, so recv only returns once the channel closes
        let _ = self.receiver.recv().await;
    }
}
