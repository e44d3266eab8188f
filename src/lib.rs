//! rmqtools - RabbitMQ sender and sniffer
//!
//! Library behind the `rmq-sender` and `rmq-sniffer` binaries: destination
//! resolution, value encoding, delivery rendering and the sniffer lifecycle,
//! all behind a small broker seam so they can be exercised without RabbitMQ.

pub mod broker;
pub mod cli;
pub mod config;
pub mod destination;
pub mod encoding;
pub mod lifecycle;
pub mod render;
pub mod sender;
pub mod sniffer;
pub mod utils;
