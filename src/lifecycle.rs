//! Sniffer lifecycle: `Running -> Stopping -> Stopped`.
//!
//! The state lives in a watch channel. The consume loop holds a receiver and
//! selects over it together with the delivery stream, so a stop request is seen
//! without polling.

use std::io::{self, Write};

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::broker::{BrokerError, DeliveryStream};
use crate::render::Renderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Stopping,
    Stopped,
}

/// Owner of the lifecycle state.
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        Self { state }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Request a stop. Only moves forward from `Running`.
    pub fn stop(&self) {
        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::Stopping;
                true
            } else {
                false
            }
        });
    }

    /// Mark shutdown complete.
    pub fn finish(&self) {
        self.state.send_replace(LifecycleState::Stopped);
    }
}

/// Why the consume loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeEnd {
    /// A stop was requested.
    Stopped,
    /// The broker closed the delivery stream.
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeReport {
    pub rendered: usize,
    pub end: ConsumeEnd,
}

/// Errors that end the consume loop.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Render deliveries in arrival order until stopped or the stream ends.
///
/// A delivery that is already being rendered completes; no delivery is taken once
/// the state has left `Running`.
pub async fn consume<W: Write>(
    mut deliveries: DeliveryStream,
    renderer: &mut Renderer<W>,
    mut stop: watch::Receiver<LifecycleState>,
) -> Result<ConsumeReport, ConsumeError> {
    let mut rendered = 0;

    loop {
        if *stop.borrow_and_update() != LifecycleState::Running {
            debug!(rendered, "Consume loop observed stop");
            return Ok(ConsumeReport {
                rendered,
                end: ConsumeEnd::Stopped,
            });
        }

        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() {
                    // Lifecycle owner is gone, nobody is left to ask for output.
                    return Ok(ConsumeReport {
                        rendered,
                        end: ConsumeEnd::Stopped,
                    });
                }
            }
            next = deliveries.next() => match next {
                Some(Ok(delivery)) => {
                    renderer.render(&delivery)?;
                    rendered += 1;
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    info!(rendered, "Delivery stream closed");
                    return Ok(ConsumeReport {
                        rendered,
                        end: ConsumeEnd::EndOfInput,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerChannel, Delivery, MockChannel};
    use crate::render::FrameWriter;

    fn renderer() -> Renderer<Vec<u8>> {
        Renderer::new(Vec::new(), "logs", FrameWriter::new("."))
    }

    #[test]
    fn test_state_moves_forward_only() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopping);

        lifecycle.finish();
        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_subscriber_sees_stop() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.subscribe();
        lifecycle.stop();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Stopping);
    }

    #[tokio::test]
    async fn test_renders_until_end_of_input() {
        let channel = MockChannel::new();
        channel.push(Delivery::new("text/plain", "one"));
        channel.push(Delivery::new("text/plain", "two"));
        channel.end_of_input();
        let deliveries = channel.consume("logs").await.unwrap();

        let lifecycle = Lifecycle::new();
        let mut r = renderer();
        let report = consume(deliveries, &mut r, lifecycle.subscribe())
            .await
            .unwrap();

        assert_eq!(
            report,
            ConsumeReport {
                rendered: 2,
                end: ConsumeEnd::EndOfInput
            }
        );
        let out = String::from_utf8(r.into_inner()).unwrap();
        let bodies: Vec<&str> = out.lines().filter(|l| !l.contains(" | ")).collect();
        assert_eq!(bodies, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_takes_nothing_after_stop() {
        let channel = MockChannel::new();
        channel.push(Delivery::new("text/plain", "ignored"));
        let deliveries = channel.consume("logs").await.unwrap();

        let lifecycle = Lifecycle::new();
        let stop = lifecycle.subscribe();
        lifecycle.stop();

        let mut r = renderer();
        let report = consume(deliveries, &mut r, stop).await.unwrap();

        assert_eq!(report.rendered, 0);
        assert_eq!(report.end, ConsumeEnd::Stopped);
        assert!(r.get_ref().is_empty());
    }

    #[tokio::test]
    async fn test_stop_wakes_idle_loop() {
        let channel = MockChannel::new();
        let deliveries = channel.consume("logs").await.unwrap();
        let lifecycle = Lifecycle::new();
        let stop = lifecycle.subscribe();

        let task = tokio::spawn(async move {
            let mut r = renderer();
            consume(deliveries, &mut r, stop).await
        });

        tokio::task::yield_now().await;
        lifecycle.stop();

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.end, ConsumeEnd::Stopped);
        drop(channel);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_output_error_ends_loop() {
        let channel = MockChannel::new();
        channel.push(Delivery::new("text/plain", "first"));
        channel.push(Delivery::new("text/plain", "second"));
        let deliveries = channel.consume("logs").await.unwrap();

        let lifecycle = Lifecycle::new();
        let mut r = Renderer::new(ClosedPipe, "logs", FrameWriter::new("."));
        let result = consume(deliveries, &mut r, lifecycle.subscribe()).await;

        match result {
            Err(ConsumeError::Output(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected output error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broker_error_ends_loop() {
        let channel = MockChannel::new();
        channel.push(Delivery::new("text/plain", "before"));
        channel.push_error(BrokerError::Consume("connection reset".to_string()));
        let deliveries = channel.consume("logs").await.unwrap();

        let lifecycle = Lifecycle::new();
        let mut r = renderer();
        let result = consume(deliveries, &mut r, lifecycle.subscribe()).await;

        assert!(matches!(result, Err(ConsumeError::Broker(_))));
        assert!(String::from_utf8(r.into_inner()).unwrap().contains("before"));
    }
}
