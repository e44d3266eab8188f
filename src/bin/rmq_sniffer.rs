//! rmq-sniffer: print messages from a queue or fanout exchange
//!
//! Subscribes to a queue (`-q`) or binds a private queue to a fanout
//! exchange (`-e`) and renders each delivery by content type until Ctrl-C.
//!
//! ## Output
//! ```text
//! <timestamp> | <name> | <content type>
//! <body>
//! ```
//! - text/plain: the body as text
//! - image/jpeg: body saved as `frame_<timestamp>_<seq>.jpg` in the frame directory
//! - anything else: canonical hex dump
//!
//! ## Configuration
//! - RMQTOOLS_CONFIG: YAML configuration file (optional)
//! - RMQTOOLS__BROKER__*: broker host, port, user, password, vhost, url
//! - RMQTOOLS__SNIFFER__FRAME_DIR: frame directory (default: .)
//! - AMQP_URL: broker URI when nothing else sets one
//! - RMQTOOLS_LOG: log filter (default: info)

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{debug, error, info};

use rmqtools::broker::AmqpSession;
use rmqtools::cli::parse_sniffer;
use rmqtools::config::Config;
use rmqtools::render::{FrameWriter, Renderer};
use rmqtools::sniffer::Sniffer;
use rmqtools::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match parse_sniffer(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            debug!(reason = %e, "Not running");
            println!("{}", e.output().trim_end());
            return ExitCode::SUCCESS;
        }
    };

    let config = match Config::load(None) {
        Ok(config) => config.with_url(args.url).with_frame_dir(args.frame_dir),
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

    let renderer = Renderer::new(
        std::io::stdout(),
        args.destination.name.clone(),
        FrameWriter::new(config.sniffer.frame_dir),
    );

    match Sniffer::new(Arc::new(session), args.destination, renderer)
        .run_until_ctrl_c()
        .await
    {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Sniffer failed");
            ExitCode::FAILURE
        }
    }
}
