//! Destination resolution.
//!
//! Maps a mode flag and a name onto the exchange, routing key and setup steps
//! each tool performs before publishing or consuming.

use std::fmt;

use tracing::debug;

use crate::broker::{BrokerChannel, BrokerError, ExchangeSpec, QueueSpec, Result};

/// Where messages go (sender) or come from (sniffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationMode {
    /// Named queue on the default exchange.
    Queue,
    /// Named durable fanout exchange.
    Exchange,
}

/// A resolved `-q <name>` or `-e <name>` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub mode: DestinationMode,
    pub name: String,
}

/// One broker setup step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupAction {
    DeclareQueue(QueueSpec),
    DeclareExchange(ExchangeSpec),
    /// Bind the most recently declared queue.
    BindDeclaredQueue {
        exchange: String,
        routing_key: String,
    },
}

/// Everything the sender needs before it can publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPlan {
    pub exchange: String,
    pub routing_key: String,
    pub setup: Vec<SetupAction>,
}

/// Everything the sniffer needs before it can consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePlan {
    pub setup: Vec<SetupAction>,
}

impl Destination {
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            mode: DestinationMode::Queue,
            name: name.into(),
        }
    }

    pub fn exchange(name: impl Into<String>) -> Self {
        Self {
            mode: DestinationMode::Exchange,
            name: name.into(),
        }
    }

    /// Resolve the publish side.
    ///
    /// Queue mode publishes on the default exchange with the queue name as routing key.
    /// Exchange mode publishes on the fanout exchange with an empty routing key.
    pub fn publish_plan(&self) -> PublishPlan {
        match self.mode {
            DestinationMode::Queue => PublishPlan {
                exchange: String::new(),
                routing_key: self.name.clone(),
                setup: vec![SetupAction::DeclareQueue(QueueSpec::named(&self.name))],
            },
            DestinationMode::Exchange => PublishPlan {
                exchange: self.name.clone(),
                routing_key: String::new(),
                setup: vec![SetupAction::DeclareExchange(ExchangeSpec::fanout(
                    &self.name,
                ))],
            },
        }
    }

    /// Resolve the subscribe side.
    ///
    /// Exchange mode needs a private queue bound to the exchange, since a fanout
    /// exchange cannot be consumed from directly.
    pub fn subscribe_plan(&self) -> SubscribePlan {
        let setup = match self.mode {
            DestinationMode::Queue => {
                vec![SetupAction::DeclareQueue(QueueSpec::named(&self.name))]
            }
            DestinationMode::Exchange => vec![
                SetupAction::DeclareExchange(ExchangeSpec::fanout(&self.name)),
                SetupAction::DeclareQueue(QueueSpec::anonymous()),
                SetupAction::BindDeclaredQueue {
                    exchange: self.name.clone(),
                    routing_key: String::new(),
                },
            ],
        };
        SubscribePlan { setup }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            DestinationMode::Queue => write!(f, "queue '{}'", self.name),
            DestinationMode::Exchange => write!(f, "exchange '{}'", self.name),
        }
    }
}

/// Run setup steps in order, stopping at the first failure.
///
/// Returns the name of the last declared queue, if any.
async fn apply_setup(
    setup: &[SetupAction],
    channel: &dyn BrokerChannel,
) -> Result<Option<String>> {
    let mut declared: Option<String> = None;

    for action in setup {
        match action {
            SetupAction::DeclareQueue(spec) => {
                declared = Some(channel.declare_queue(spec).await?);
            }
            SetupAction::DeclareExchange(spec) => {
                channel.declare_exchange(spec).await?;
            }
            SetupAction::BindDeclaredQueue {
                exchange,
                routing_key,
            } => {
                let queue = declared.as_deref().ok_or_else(|| {
                    BrokerError::Bind("No queue declared before bind".to_string())
                })?;
                channel.bind_queue(queue, exchange, routing_key).await?;
            }
        }
    }

    Ok(declared)
}

impl PublishPlan {
    /// Declare whatever the publish target needs.
    pub async fn apply(&self, channel: &dyn BrokerChannel) -> Result<()> {
        apply_setup(&self.setup, channel).await?;
        debug!(
            exchange = %self.exchange,
            routing_key = %self.routing_key,
            "Publish target ready"
        );
        Ok(())
    }
}

impl SubscribePlan {
    /// Declare and bind, returning the queue to consume from.
    pub async fn apply(&self, channel: &dyn BrokerChannel) -> Result<String> {
        let queue = apply_setup(&self.setup, channel)
            .await?
            .ok_or_else(|| BrokerError::Consume("No queue to consume from".to_string()))?;
        debug!(queue = %queue, "Subscription ready");
        Ok(queue)
    }
}
