//! RabbitMQ round trips using testcontainers.
//!
//! Run with: cargo test --test broker_amqp --features container-tests -- --nocapture
//!
//! These tests spin up RabbitMQ in a container using testcontainers-rs.
//! No manual RabbitMQ setup required.

use std::sync::Arc;
use std::time::Duration;

use rmqtools::broker::{AmqpSession, BrokerChannel, Message};
use rmqtools::destination::Destination;
use rmqtools::encoding::{encode, ValueEncoding};
use rmqtools::lifecycle::ConsumeEnd;
use rmqtools::render::{hexdump, FrameWriter, Renderer};
use rmqtools::sender::publish_once;
use rmqtools::sniffer::Sniffer;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    GenericImage, ImageExt,
};
use tokio::sync::oneshot;

/// Start RabbitMQ container.
///
/// Returns (container, amqp_url) where amqp_url is suitable for AMQP connection.
async fn start_rabbitmq() -> (testcontainers::ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("rabbitmq", "3-management")
        .with_exposed_port(5672.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Server startup complete"));

    let container = image
        .with_startup_timeout(Duration::from_secs(60))
        .start()
        .await
        .expect("Failed to start rabbitmq container");

    // Brief delay to ensure RabbitMQ is fully ready
    tokio::time::sleep(Duration::from_secs(2)).await;

    let host_port = container
        .get_host_port_ipv4(5672)
        .await
        .expect("Failed to get mapped port");

    let host = container
        .get_host()
        .await
        .expect("Failed to get container host");

    let amqp_url = format!("amqp://guest:guest@{}:{}", host, host_port);

    println!("RabbitMQ available at: {}", amqp_url);

    (container, amqp_url)
}

async fn send(
    url: &str,
    destination: &Destination,
    content_type: &str,
    encoding: ValueEncoding,
    value: &str,
) {
    let session = AmqpSession::open(url).await.expect("Failed to connect sender");
    let message = Message {
        content_type: content_type.to_string(),
        body: encode(encoding, value).expect("Failed to encode"),
    };
    publish_once(&session, destination, &message)
        .await
        .expect("Failed to publish");
    session.close().await.expect("Failed to close sender");
}

async fn sniffer(url: &str, destination: Destination) -> Sniffer<Vec<u8>> {
    let session = AmqpSession::open(url).await.expect("Failed to connect sniffer");
    let renderer = Renderer::new(Vec::new(), destination.name.clone(), FrameWriter::new("."));
    Sniffer::new(Arc::new(session), destination, renderer)
}

#[tokio::test]
async fn test_queue_text_round_trip() {
    println!("=== AMQP Queue Text Round Trip ===");

    let (_container, url) = start_rabbitmq().await;
    let destination = Destination::queue(format!("logs-{}", uuid::Uuid::new_v4()));

    // Queue mode keeps the message until someone consumes it.
    send(&url, &destination, "text/plain", ValueEncoding::String, "Hello").await;

    let outcome = sniffer(&url, destination)
        .await
        .run_until(tokio::time::sleep(Duration::from_secs(2)))
        .await
        .expect("Sniffer failed");

    assert_eq!(outcome.end, ConsumeEnd::Stopped);
    assert_eq!(outcome.rendered, 1);
    let out = String::from_utf8(outcome.output).unwrap();
    assert!(out.lines().any(|l| l == "Hello"), "output was: {}", out);

    println!("=== AMQP Queue Text Round Trip PASSED ===");
}

#[tokio::test]
async fn test_fanout_int_round_trip() {
    println!("=== AMQP Fanout Int Round Trip ===");

    let (_container, url) = start_rabbitmq().await;
    let destination = Destination::exchange(format!("frames-{}", uuid::Uuid::new_v4()));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let s = sniffer(&url, destination.clone()).await;
    let task = tokio::spawn(s.run_until(async {
        let _ = stop_rx.await;
    }));

    // Fanout only reaches queues bound at publish time.
    tokio::time::sleep(Duration::from_secs(1)).await;
    send(&url, &destination, "application/octet-stream", ValueEncoding::Int, "42").await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    stop_tx.send(()).expect("Sniffer already gone");
    let outcome = task
        .await
        .expect("Sniffer task panicked")
        .expect("Sniffer failed");

    assert_eq!(outcome.rendered, 1);
    let out = String::from_utf8(outcome.output).unwrap();
    assert!(out.ends_with(&hexdump::dump(&[0, 0, 0, 0x2a])), "output was: {}", out);

    println!("=== AMQP Fanout Int Round Trip PASSED ===");
}

#[tokio::test]
async fn test_fanout_reaches_every_sniffer() {
    let (_container, url) = start_rabbitmq().await;
    let destination = Destination::exchange(format!("fan-{}", uuid::Uuid::new_v4()));

    let mut stops = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let s = sniffer(&url, destination.clone()).await;
        tasks.push(tokio::spawn(s.run_until(async {
            let _ = stop_rx.await;
        })));
        stops.push(stop_tx);
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    send(&url, &destination, "text/plain", ValueEncoding::String, "both").await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    for stop in stops {
        let _ = stop.send(());
    }
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.rendered, 1);
    }
}
