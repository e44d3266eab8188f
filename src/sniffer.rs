//! Sniffer: subscribe to a destination and render deliveries until stopped.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::broker::{BrokerChannel, BrokerError};
use crate::destination::Destination;
use crate::lifecycle::{consume, ConsumeEnd, ConsumeError, Lifecycle, LifecycleState};
use crate::render::Renderer;

/// Errors that end a sniffer run.
#[derive(Debug, thiserror::Error)]
pub enum SniffError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Consume(#[from] ConsumeError),

    #[error("Consumer task failed: {0}")]
    Task(String),
}

/// Result of a completed run.
#[derive(Debug)]
pub struct SniffOutcome<W> {
    pub rendered: usize,
    pub end: ConsumeEnd,
    /// The renderer's output stream, handed back after shutdown.
    pub output: W,
}

/// One subscription on one channel.
pub struct Sniffer<W: Write> {
    channel: Arc<dyn BrokerChannel>,
    destination: Destination,
    renderer: Renderer<W>,
    lifecycle: Lifecycle,
}

impl<W> Sniffer<W>
where
    W: Write + Send + 'static,
{
    pub fn new(
        channel: Arc<dyn BrokerChannel>,
        destination: Destination,
        renderer: Renderer<W>,
    ) -> Self {
        Self {
            channel,
            destination,
            renderer,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Watch the lifecycle state from outside the run.
    pub fn lifecycle(&self) -> tokio::sync::watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Set up the subscription and render deliveries until `shutdown` resolves or
    /// the broker closes the stream. The channel is closed before returning.
    pub async fn run_until<F>(self, shutdown: F) -> Result<SniffOutcome<W>, SniffError>
    where
        F: Future<Output = ()>,
    {
        let Sniffer {
            channel,
            destination,
            mut renderer,
            lifecycle,
        } = self;

        let subscribed = async {
            let queue = destination.subscribe_plan().apply(channel.as_ref()).await?;
            let deliveries = channel.consume(&queue).await?;
            Ok::<_, BrokerError>((queue, deliveries))
        }
        .await;
        let (queue, deliveries) = match subscribed {
            Ok(subscribed) => subscribed,
            Err(e) => {
                close_channel(channel.as_ref()).await;
                lifecycle.finish();
                return Err(e.into());
            }
        };

        info!(
            destination = %destination,
            queue = %queue,
            "Listening for messages"
        );

        let stop = lifecycle.subscribe();
        let mut task = tokio::spawn(async move {
            let result = consume(deliveries, &mut renderer, stop).await;
            (renderer, result)
        });

        tokio::pin!(shutdown);
        let joined = tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Interrupted, stopping");
                lifecycle.stop();
                (&mut task).await
            }
            joined = &mut task => joined,
        };
        lifecycle.stop();

        close_channel(channel.as_ref()).await;
        lifecycle.finish();

        let (renderer, result) = joined.map_err(|e| SniffError::Task(e.to_string()))?;
        let report = result.inspect_err(|e| error!(error = %e, "Consume loop failed"))?;

        info!(
            rendered = report.rendered,
            end = ?report.end,
            "Sniffer stopped"
        );

        Ok(SniffOutcome {
            rendered: report.rendered,
            end: report.end,
            output: renderer.into_inner(),
        })
    }

    /// Run until Ctrl-C.
    pub async fn run_until_ctrl_c(self) -> Result<SniffOutcome<W>, SniffError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

async fn close_channel(channel: &dyn BrokerChannel) {
    if let Err(e) = channel.close().await {
        warn!(error = %e, "Failed to close broker channel");
    }
}
