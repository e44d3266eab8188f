//! AMQP (RabbitMQ) broker channel implementation.
//!
//! One connection and one channel per process, no pooling and no reconnection.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tracing::{debug, info};

use super::{
    BrokerChannel, BrokerError, Delivery, DeliveryStream, ExchangeSpec, Message, QueueSpec,
    Result,
};

/// Consumer tag announced to the broker.
const CONSUMER_TAG: &str = "rmq-sniffer";

/// Reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// An open AMQP connection together with its single channel.
pub struct AmqpSession {
    connection: Connection,
    channel: Channel,
}

impl AmqpSession {
    /// Connect to the broker and open a channel.
    pub async fn open(uri: &str) -> Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to connect to RabbitMQ: {}", e)))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(format!("Failed to open a channel: {}", e)))?;

        info!(channel_id = channel.id(), "Connected to AMQP");

        Ok(Self {
            connection,
            channel,
        })
    }
}

/// Convert a lapin delivery into the broker-agnostic form.
fn to_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let content_type = delivery
        .properties
        .content_type()
        .as_ref()
        .map(|ct| ct.as_str().to_string())
        .unwrap_or_default();

    Delivery {
        content_type,
        body: delivery.data,
    }
}

#[async_trait]
impl BrokerChannel for AmqpSession {
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<String> {
        let queue = self
            .channel
            .queue_declare(
                &spec.name,
                QueueDeclareOptions {
                    durable: spec.durable,
                    exclusive: spec.exclusive,
                    auto_delete: spec.auto_delete,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Declare(format!("Failed to declare a queue: {}", e)))?;

        let name = queue.name().as_str().to_string();
        debug!(queue = %name, "Declared queue");
        Ok(name)
    }

    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<()> {
        self.channel
            .exchange_declare(
                &spec.name,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: spec.durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Declare(format!("Failed to declare an exchange: {}", e)))?;

        debug!(exchange = %spec.name, "Declared fanout exchange");
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Bind(format!("Failed to bind a queue: {}", e)))?;

        info!(queue = %queue, exchange = %exchange, "Bound queue to exchange");
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, message: &Message) -> Result<()> {
        let properties =
            BasicProperties::default().with_content_type(message.content_type.as_str().into());

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await
            .map_err(|e| BrokerError::Publish(format!("Failed to publish a message: {}", e)))?;

        confirm.await.map_err(|e| {
            BrokerError::Publish(format!("Publish confirmation failed: {}", e))
        })?;

        debug!(
            exchange = %exchange,
            routing_key = %routing_key,
            bytes = message.body.len(),
            "Published message"
        );
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(format!("Failed to register a consumer: {}", e)))?;

        let deliveries = consumer.map(|delivery| {
            delivery
                .map(to_delivery)
                .map_err(|e| BrokerError::Consume(format!("Consumer delivery error: {}", e)))
        });

        Ok(deliveries.boxed())
    }

    async fn close(&self) -> Result<()> {
        self.channel
            .close(REPLY_SUCCESS, "Bye")
            .await
            .map_err(|e| BrokerError::Channel(format!("Failed to close the channel: {}", e)))?;

        self.connection
            .close(REPLY_SUCCESS, "Bye")
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to close the connection: {}", e)))?;

        debug!("Closed AMQP channel and connection");
        Ok(())
    }
}
