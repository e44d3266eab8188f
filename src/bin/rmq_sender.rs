//! rmq-sender: publish a single value
//!
//! Encodes one value and publishes it to a queue (`-q`) or a fanout
//! exchange (`-e`), then exits.
//!
//! ## Usage
//! ```text
//! rmq-sender (-q <name> | -e <name>) [--url <uri>] <content-type> <string|int> <value>
//! ```
//!
//! ## Configuration
//! - RMQTOOLS_CONFIG: YAML configuration file (optional)
//! - RMQTOOLS__BROKER__*: broker host, port, user, password, vhost, url
//! - AMQP_URL: broker URI when nothing else sets one
//! - RMQTOOLS_LOG: log filter (default: info)

use std::process::ExitCode;

use tracing::{debug, error, info, warn};

use rmqtools::broker::{AmqpSession, BrokerChannel, Message};
use rmqtools::cli::parse_sender;
use rmqtools::config::Config;
use rmqtools::encoding::encode;
use rmqtools::sender::publish_once;
use rmqtools::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match parse_sender(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            debug!(reason = %e, "Not running");
            println!("{}", e.output().trim_end());
            return ExitCode::SUCCESS;
        }
    };

    // Encode before connecting so a bad value never opens a channel.
    let body = match encode(args.value_type, &args.value) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Nothing published");
            return ExitCode::SUCCESS;
        }
    };
    debug!(body = %hex::encode(&body), "Encoded value");

    let config = match Config::load(None) {
        Ok(config) => config.with_url(args.url),
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(broker = %config.broker.redacted_uri(), "Connecting");
    let session = match AmqpSession::open(&config.broker.uri()).await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Broker unavailable");
            return ExitCode::FAILURE;
        }
    };

    let message = Message {
        content_type: args.content_type,
        body,
    };
    let result = publish_once(&session, &args.destination, &message).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close broker connection");
    }

    match result {
        Ok(()) => {
            info!(
                value = %args.value,
                content_type = %message.content_type,
                value_type = args.value_type.as_str(),
                destination = %args.destination,
                "Sent"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Failed to publish");
            ExitCode::FAILURE
        }
    }
}
