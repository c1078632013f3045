use std::{future, sync::Arc};

use tokio::sync::watch;

pub const REASON_SOLD_OUT: &str = "No more seats available.";
pub const REASON_SHUTTING_DOWN: &str = "Server shutting down.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    // the last seat has been purchased
    SoldOut,
    Operator,
    AcceptFailed,
}

impl ShutdownReason {
    /// The reason sent to every connected client
    pub fn message(&self) -> &'static str {
        match self {
            ShutdownReason::SoldOut => REASON_SOLD_OUT,
            ShutdownReason::Operator | ShutdownReason::AcceptFailed => REASON_SHUTTING_DOWN,
        }
    }
}

/// A process wide, one shot shutdown signal
///
/// the first trigger wins, later triggers keep the first reason.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Fires the signal, returns false if it had already been fired
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        self.sender.send_if_modified(|current| match current {
            Some(_) => false,
            None => {
                *current = Some(reason);
                true
            }
        })
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ShutdownListener {
    receiver: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownListener {
    /// Waits until the signal has been fired
    ///
    /// resolves immediately if it was fired before the call.
    pub async fn recv(&mut self) -> ShutdownReason {
        loop {
            let current = *self.receiver.borrow_and_update();
            if let Some(reason) = current {
                return reason;
            }

            if self.receiver.changed().await.is_err() {
                // every handle is gone, the signal can never fire
                return future::pending().await;
            }
        }
    }

    pub fn triggered(&self) -> Option<ShutdownReason> {
        *self.receiver.borrow()
    }
}
