//! Per-connection streaming sessions.
//!
//! A session owns one [`Subscriber`] for the lifetime of an event stream
//! connection. It moves through three states:
//!
//! - **Connecting**: [`StreamSession::connect`] registers a fresh subscriber.
//! - **Active**: [`StreamSession::run`] sends the connected notice, then
//!   forwards queued messages to the transport until the client goes away.
//! - **Terminated**: dropping the session unregisters the subscriber. This
//!   happens on every exit path, including a failed write or an aborted task.

use crate::core::StreamNotice;
use crate::registry::{Message, Subscriber, SubscriberId, SubscriberRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The lifecycle of one event stream connection.
#[derive(Debug)]
pub struct StreamSession {
    registry: Arc<SubscriberRegistry>,
    subscriber: Subscriber,
    peer: SocketAddr,
}

impl StreamSession {
    /// Creates the subscriber for a new connection and registers it.
    pub fn connect(registry: Arc<SubscriberRegistry>, queue_capacity: usize, peer: SocketAddr) -> Self {
        let subscriber = Subscriber::new(queue_capacity);
        registry.register(&subscriber);
        info!("New client connected from {}", peer);
        Self {
            registry,
            subscriber,
            peer,
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Drives the session until the client disconnects.
    ///
    /// `transport` carries frame payloads to the client connection. Its
    /// receiving half is dropped when the client goes away, which is the only
    /// thing that ends the session.
    pub async fn run(mut self, transport: mpsc::Sender<Message>) {
        let notice: Message = Arc::from(StreamNotice::CONNECTED.to_payload());
        if transport.send(notice).await.is_err() {
            self.log_disconnect();
            return;
        }

        loop {
            tokio::select! {
                message = self.subscriber.recv() => {
                    let Some(message) = message else {
                        debug!(subscriber = %self.subscriber.id(), "Subscriber queue closed");
                        break;
                    };
                    if transport.send(message).await.is_err() {
                        self.log_disconnect();
                        break;
                    }
                }
                _ = transport.closed() => {
                    self.log_disconnect();
                    break;
                }
            }
        }
    }

    fn log_disconnect(&self) {
        info!("Client disconnected from {}", self.peer);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.registry.unregister(&mut self.subscriber);
    }
}
