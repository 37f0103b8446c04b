//! Single-slot mailbox: always holds only the most recently published value.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;
use tracing::trace;

/// Create a connected writer/reader pair.
pub fn mailbox<T>() -> (MailboxWriter<T>, MailboxReader<T>) {
    let (tx, rx) = bounded(1);
    (
        MailboxWriter { tx, drain: rx.clone() },
        MailboxReader { rx },
    )
}

/// Publishing side. Keeps its own receiver so it can discard the stale value
/// before putting the new one.
pub struct MailboxWriter<T> {
    tx: Sender<T>,
    drain: Receiver<T>,
}

impl<T> Clone for MailboxWriter<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), drain: self.drain.clone() }
    }
}

impl<T> MailboxWriter<T> {
    /// Drain-then-put. Never blocks.
    pub fn publish(&self, value: T) {
        let mut value = value;
        loop {
            while self.drain.try_recv().is_ok() {}
            match self.tx.try_send(value) {
                Ok(()) => return,
                // Another writer got in between the drain and the put.
                Err(TrySendError::Full(v)) => value = v,
                Err(TrySendError::Disconnected(_)) => {
                    trace!("Mailbox disconnected, value dropped");
                    return;
                }
            }
        }
    }
}

/// Consuming side.
pub struct MailboxReader<T> {
    rx: Receiver<T>,
}

impl<T> MailboxReader<T> {
    /// Block until a value is available. `None` once every writer is gone.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
