//! Broker seam.
//!
//! This module contains:
//! - `BrokerChannel` trait: the handful of AMQP operations the tools need
//! - Queue/exchange declaration specs and the `Delivery` type
//! - Implementations: AMQP (RabbitMQ via lapin), Mock

use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod amqp;
pub mod mock;

pub use amqp::AmqpSession;
pub use mock::{MockChannel, Operation};

// ============================================================================
// Traits
// ============================================================================

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur while talking to the broker.
///
/// None of these are retried. Both tools treat them as fatal.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Channel failed: {0}")]
    Channel(String),

    #[error("Declare failed: {0}")]
    Declare(String),

    #[error("Bind failed: {0}")]
    Bind(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Consume failed: {0}")]
    Consume(String),
}

/// Lazy, unbounded sequence of deliveries.
///
/// Ends when the broker client closes the consumer (channel or connection teardown).
pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;

/// One message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Content type label set by the publisher. Empty when the message carried none.
    pub content_type: String,
    /// Raw payload.
    pub body: Vec<u8>,
}

impl Delivery {
    pub fn new(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

/// Outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Content type, passed through unvalidated.
    pub content_type: String,
    /// Encoded payload.
    pub body: Vec<u8>,
}

/// Queue declaration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name. Empty asks the broker to generate one.
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
}

impl QueueSpec {
    /// Named, non-durable, shared queue that survives its consumers.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            exclusive: false,
            auto_delete: false,
        }
    }

    /// Server-named queue private to this connection, deleted when the consumer goes away.
    pub fn anonymous() -> Self {
        Self {
            name: String::new(),
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }
}

/// Exchange declaration parameters. Only fanout exchanges are used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub durable: bool,
}

impl ExchangeSpec {
    /// Durable fanout exchange.
    pub fn fanout(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
        }
    }
}

/// A single open channel on a broker connection.
///
/// Implementations:
/// - `AmqpSession`: RabbitMQ via lapin, owning its connection
/// - `MockChannel`: in-memory recorder for testing
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a queue and return its name (the generated one for anonymous queues).
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<String>;

    /// Declare a fanout exchange.
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<()>;

    /// Bind a queue to an exchange.
    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()>;

    /// Publish one message and wait for the broker to take it.
    async fn publish(&self, exchange: &str, routing_key: &str, message: &Message) -> Result<()>;

    /// Start consuming from a queue with automatic acknowledgement.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream>;

    /// Close the channel and its connection.
    async fn close(&self) -> Result<()>;
}
