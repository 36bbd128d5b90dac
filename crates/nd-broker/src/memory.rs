//! In-memory `BrokerGateway` used by worker consumer-loop tests. Mirrors
//! `nd-store`'s `InMemoryNotificationStore`: same trait, same observable
//! behavior (ack, nack-with-requeue, nack-without-requeue), no network.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use nd_common::Channel as NdChannel;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::BrokerError;
use crate::{BrokerGateway, DeliveryHandle, Result};

struct Queue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

/// A named set of unbounded, in-process FIFO queues. `publish`/`publish_to_queue`
/// push onto a queue; `consume` takes its receiver (at most once, like a real
/// AMQP consumer holding a queue's deliveries) and hands back a stream whose
/// deliveries can be acked, nacked-and-dropped, or nacked-and-requeued.
#[derive(Default)]
pub struct InMemoryBrokerGateway {
    queues: Mutex<HashMap<String, Queue>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    stopped: AtomicBool,
}

impl InMemoryBrokerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, queue_name: &str) -> mpsc::UnboundedSender<Vec<u8>> {
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get(queue_name) {
            return queue.tx.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        queues.insert(
            queue_name.to_string(),
            Queue {
                tx: tx.clone(),
                rx: Some(rx),
            },
        );
        tx
    }

    /// Every body published to `queue_name`, in publish order. Tests use this
    /// to assert DLQ routing without needing a real broker to inspect.
    pub fn published_to(&self, queue_name: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .iter()
            .filter(|(q, _)| q == queue_name)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl BrokerGateway for InMemoryBrokerGateway {
    async fn publish(&self, channel: NdChannel, body: &[u8]) -> Result<()> {
        self.publish_to_queue(channel.as_str(), body).await
    }

    async fn publish_to_queue(&self, queue_name: &str, body: &[u8]) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BrokerError::Stopped);
        }
        self.published
            .lock()
            .push((queue_name.to_string(), body.to_vec()));
        self.sender_for(queue_name)
            .send(body.to_vec())
            .map_err(|_| BrokerError::Stopped)
    }

    async fn consume(
        &self,
        queue_name: &str,
        _consumer_tag: &str,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Box<dyn DeliveryHandle>>> + Send>>> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BrokerError::Stopped);
        }

        self.sender_for(queue_name);
        let mut queues = self.queues.lock();
        let queue = queues.get_mut(queue_name).expect("sender_for just inserted this queue");
        let rx = queue
            .rx
            .take()
            .ok_or_else(|| BrokerError::ChannelNotConfigured(queue_name.to_string()))?;
        let requeue_tx = queue.tx.clone();

        Ok(Box::pin(QueueStream { rx, requeue_tx }))
    }

    async fn close(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct QueueStream {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    requeue_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Stream for QueueStream {
    type Item = Result<Box<dyn DeliveryHandle>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(body)) => Poll::Ready(Some(Ok(Box::new(InMemoryDelivery {
                body,
                requeue_tx: this.requeue_tx.clone(),
            }) as Box<dyn DeliveryHandle>))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct InMemoryDelivery {
    body: Vec<u8>,
    requeue_tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl DeliveryHandle for InMemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(&self) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        if requeue {
            let _ = self.requeue_tx.send(self.body.clone());
        }
        Ok(())
    }
}
