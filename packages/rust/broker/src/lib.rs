//! Message-broker plumbing for the errand loop.
//!
//! The worker only ever talks to a [`BrokerConnector`] and the
//! [`ErrandSession`] it hands out. A session is one connection plus one
//! channel with both queues declared and a consumer running; it is never
//! reused after an error.

mod amqp;

use async_trait::async_trait;

use muninn_shared::{BrokerConfig, Result};

pub use amqp::AmqpConnector;

/// A message taken off the inbound queue, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDelivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
}

/// Queue names and flow control for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTopology {
    pub inbound_queue: String,
    pub reply_queue: String,
    pub prefetch: u16,
}

impl From<&BrokerConfig> for QueueTopology {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            inbound_queue: config.inbound_queue.clone(),
            reply_queue: config.reply_queue.clone(),
            prefetch: config.prefetch,
        }
    }
}

impl Default for QueueTopology {
    fn default() -> Self {
        Self::from(&BrokerConfig::default())
    }
}

/// A live, consuming broker session.
///
/// Every error returned from these methods is a connection-level
/// [`muninn_shared::MuninnError::Broker`] error.
#[async_trait]
pub trait ErrandSession: Send {
    /// Wait for the next inbound delivery. `Ok(None)` means the consumer stream ended.
    async fn next_delivery(&mut self) -> Result<Option<InboundDelivery>>;

    /// Publish a message body to the reply queue.
    async fn publish(&mut self, body: &[u8]) -> Result<()>;

    /// Acknowledge a delivery.
    async fn ack(&mut self, delivery_tag: u64) -> Result<()>;

    /// Best-effort teardown before the session is dropped.
    async fn close(&mut self);
}

/// Opens fresh sessions; called once per reconnect attempt.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ErrandSession>>;
}
