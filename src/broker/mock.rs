//! Mock broker channel for testing.
//!
//! Records every operation in order and serves deliveries pushed by the test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{
    BrokerChannel, BrokerError, Delivery, DeliveryStream, ExchangeSpec, Message, QueueSpec,
    Result,
};

/// A broker operation as observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    DeclareQueue(QueueSpec),
    DeclareExchange(ExchangeSpec),
    BindQueue {
        queue: String,
        exchange: String,
        routing_key: String,
    },
    Publish {
        exchange: String,
        routing_key: String,
        message: Message,
    },
    Consume {
        queue: String,
    },
    Close,
}

/// Mock broker channel for testing.
pub struct MockChannel {
    operations: RwLock<Vec<Operation>>,
    fail_on_declare: RwLock<bool>,
    fail_on_publish: RwLock<bool>,
    generated: AtomicUsize,
    feeder: Mutex<Option<mpsc::UnboundedSender<Result<Delivery>>>>,
    deliveries: Mutex<Option<mpsc::UnboundedReceiver<Result<Delivery>>>>,
}

impl Default for MockChannel {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            operations: RwLock::new(Vec::new()),
            fail_on_declare: RwLock::new(false),
            fail_on_publish: RwLock::new(false),
            generated: AtomicUsize::new(0),
            feeder: Mutex::new(Some(tx)),
            deliveries: Mutex::new(Some(rx)),
        }
    }
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_declare(&self, fail: bool) {
        *self.fail_on_declare.write().await = fail;
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    pub async fn operations(&self) -> Vec<Operation> {
        self.operations.read().await.clone()
    }

    pub async fn published(&self) -> Vec<Message> {
        self.operations
            .read()
            .await
            .iter()
            .filter_map(|op| match op {
                Operation::Publish { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Queue a delivery for the consumer. Returns false once input has ended.
    pub fn push(&self, delivery: Delivery) -> bool {
        self.push_result(Ok(delivery))
    }

    /// Queue a consumer-side broker failure.
    pub fn push_error(&self, error: BrokerError) -> bool {
        self.push_result(Err(error))
    }

    fn push_result(&self, item: Result<Delivery>) -> bool {
        match self.feeder.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|tx| tx.send(item).is_ok()),
            Err(_) => false,
        }
    }

    /// Close the delivery stream, as the broker does on teardown.
    pub fn end_of_input(&self) {
        if let Ok(mut guard) = self.feeder.lock() {
            guard.take();
        }
    }

    async fn record(&self, op: Operation) {
        self.operations.write().await.push(op);
    }
}

#[async_trait]
impl BrokerChannel for MockChannel {
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<String> {
        if *self.fail_on_declare.read().await {
            return Err(BrokerError::Declare("Mock declare failure".to_string()));
        }
        self.record(Operation::DeclareQueue(spec.clone())).await;

        if spec.name.is_empty() {
            let n = self.generated.fetch_add(1, Ordering::SeqCst);
            Ok(format!("amq.gen-mock-{}", n))
        } else {
            Ok(spec.name.clone())
        }
    }

    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<()> {
        if *self.fail_on_declare.read().await {
            return Err(BrokerError::Declare("Mock declare failure".to_string()));
        }
        self.record(Operation::DeclareExchange(spec.clone())).await;
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
        self.record(Operation::BindQueue {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        })
        .await;
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, message: &Message) -> Result<()> {
        if *self.fail_on_publish.read().await {
            return Err(BrokerError::Publish("Mock publish failure".to_string()));
        }
        self.record(Operation::Publish {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            message: message.clone(),
        })
        .await;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let rx = self
            .deliveries
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .ok_or_else(|| BrokerError::Consume("Mock consumer already taken".to_string()))?;

        self.record(Operation::Consume {
            queue: queue.to_string(),
        })
        .await;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn close(&self) -> Result<()> {
        self.end_of_input();
        self.record(Operation::Close).await;
        Ok(())
    }
}
