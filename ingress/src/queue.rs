//! Bounded request queue shared by every producer and worker.

use crate::{
    types::{OrderFragmentMapping, OrderId, Parity, Signature},
    Error,
};
use futures::{channel::mpsc, lock::Mutex, SinkExt, StreamExt};
use std::sync::Arc;

/// Work for the worker pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Register the order on-chain.
    OpenOrder {
        signature: Signature,
        order_id: OrderId,
        parity: Parity,
    },
    /// Deliver one epoch depth worth of fragments to the pods.
    OpenOrderFragmentMapping {
        signature: Signature,
        order_id: OrderId,
        mapping: OrderFragmentMapping,
        depth: usize,
    },
    /// Cancel the order on-chain.
    CancelOrder {
        signature: Signature,
        order_id: OrderId,
    },
    /// Hint the registry to advance the epoch.
    EpochRotation,
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::OpenOrder { .. } => "open_order",
            Request::OpenOrderFragmentMapping { .. } => "open_order_fragment_mapping",
            Request::CancelOrder { .. } => "cancel_order",
            Request::EpochRotation => "epoch_rotation",
        }
    }
}

/// Create a queue holding at most `size` pending requests.
///
/// Every [Mailbox] clone shares a single sender, so the bound does not grow
/// with the number of producers.
pub fn channel(size: usize) -> (Mailbox, Requests) {
    // The sender reserves one slot of its own on top of the buffer
    let (sender, receiver) = mpsc::channel(size.saturating_sub(1));
    (
        Mailbox {
            sender: Arc::new(Mutex::new(sender)),
        },
        Requests {
            receiver: Arc::new(Mutex::new(receiver)),
        },
    )
}

/// Producer side of the queue.
#[derive(Clone)]
pub struct Mailbox {
    sender: Arc<Mutex<mpsc::Sender<Request>>>,
}

impl Mailbox {
    /// Wait for capacity and enqueue `request`.
    pub async fn enqueue(&self, request: Request) -> Result<(), Error> {
        let mut sender = self.sender.lock().await;
        sender.send(request).await.map_err(|_| Error::Closed)
    }

    /// Enqueue `requests` back to back. No other producer's request is
    /// interleaved between them.
    ///
    /// On [Error::Closed] the requests before the failing one stay queued.
    pub async fn enqueue_all(
        &self,
        requests: impl IntoIterator<Item = Request>,
    ) -> Result<(), Error> {
        let mut sender = self.sender.lock().await;
        for request in requests {
            sender.send(request).await.map_err(|_| Error::Closed)?;
        }
        Ok(())
    }

    /// Stop accepting new requests from every producer.
    pub async fn close(&self) {
        self.sender.lock().await.close_channel();
    }
}

/// Consumer side of the queue.
///
/// Cloned handles share one receiver, so every request goes to exactly one
/// consumer.
#[derive(Clone)]
pub struct Requests {
    receiver: Arc<Mutex<mpsc::Receiver<Request>>>,
}

impl Requests {
    /// Next request, or `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<Request> {
        self.receiver.lock().await.next().await
    }

    /// Next request if one is immediately available.
    pub fn try_next(&self) -> Option<Request> {
        let mut receiver = self.receiver.try_lock()?;
        receiver.try_next().ok().flatten()
    }
}
