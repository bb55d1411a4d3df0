use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

/// Broadcast topic with bounded capacity.
/// Publishing never blocks the pipeline; slow subscribers lag and skip ahead.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes to every current subscriber. Having none is not an error.
    pub fn publish(&self, msg: T) {
        let _ = self.tx.send(Arc::new(msg));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// Logs every message on `rx` until all publishers are dropped.
pub async fn log_messages<T: fmt::Display>(mut rx: broadcast::Receiver<Arc<T>>) {
    loop {
        match rx.recv().await {
            Ok(msg) => info!("{}", msg),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Event receiver lagged by {} messages.", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
