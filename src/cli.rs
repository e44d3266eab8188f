//! Command-line parsing for both tools.
//!
//! Parsing never touches the broker, so a bad command line can be rejected
//! before any connection is attempted.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{error::ErrorKind, Args, CommandFactory, Parser};

use crate::destination::Destination;
use crate::encoding::ValueEncoding;

const SENDER_EXAMPLES: &str = "\
Examples:
  rmq-sender -q log_chan text/plain string Hello
  rmq-sender -e data_feed application/bytes int 42";

const SNIFFER_EXAMPLES: &str = "\
Examples:
  rmq-sniffer -q log_chan
  rmq-sniffer -e data_feed --frame-dir /tmp/frames";

/// Command line rejected, or help/version requested.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// `--help` or `--version`; the text is ready to print.
    #[error("{0}")]
    Info(String),

    /// Wrong arguments. `usage` is the full help text to show instead.
    #[error("{reason}")]
    Invalid { reason: String, usage: String },
}

impl UsageError {
    /// Text to print on stdout.
    pub fn output(&self) -> &str {
        match self {
            UsageError::Info(text) => text,
            UsageError::Invalid { usage, .. } => usage,
        }
    }
}

/// Exactly one of `-q` or `-e`.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct DestinationArgs {
    /// Publish to / consume from the named queue
    #[arg(short = 'q', value_name = "NAME")]
    pub queue: Option<String>,

    /// Publish to / consume from the named fanout exchange
    #[arg(short = 'e', value_name = "NAME")]
    pub exchange: Option<String>,
}

impl DestinationArgs {
    fn into_destination(self) -> Option<Destination> {
        match (self.queue, self.exchange) {
            (Some(name), None) => Some(Destination::queue(name)),
            (None, Some(name)) => Some(Destination::exchange(name)),
            _ => None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "rmq-sender",
    version,
    about = "Publish a single value to a RabbitMQ queue or fanout exchange",
    after_help = SENDER_EXAMPLES
)]
struct SenderCli {
    #[command(flatten)]
    destination: DestinationArgs,

    /// Broker URI, overrides configuration
    #[arg(long, value_name = "URI")]
    url: Option<String>,

    /// Content type attached to the message, e.g. text/plain
    content_type: String,

    /// How to encode the value
    #[arg(value_enum)]
    value_type: ValueEncoding,

    /// The value to send
    #[arg(allow_hyphen_values = true)]
    value: String,
}

#[derive(Parser, Debug)]
#[command(
    name = "rmq-sniffer",
    version,
    about = "Print messages arriving on a RabbitMQ queue or fanout exchange",
    after_help = SNIFFER_EXAMPLES
)]
struct SnifferCli {
    #[command(flatten)]
    destination: DestinationArgs,

    /// Broker URI, overrides configuration
    #[arg(long, value_name = "URI")]
    url: Option<String>,

    /// Directory for saved image/jpeg frames, overrides configuration
    #[arg(long, value_name = "DIR")]
    frame_dir: Option<PathBuf>,
}

/// Parsed sender command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderArgs {
    pub destination: Destination,
    pub url: Option<String>,
    pub content_type: String,
    pub value_type: ValueEncoding,
    pub value: String,
}

/// Parsed sniffer command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnifferArgs {
    pub destination: Destination,
    pub url: Option<String>,
    pub frame_dir: Option<PathBuf>,
}

fn usage_error<C: CommandFactory>(err: clap::Error) -> UsageError {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => UsageError::Info(err.to_string()),
        _ => UsageError::Invalid {
            reason: err.kind().as_str().unwrap_or("invalid arguments").to_string(),
            usage: C::command().render_help().to_string(),
        },
    }
}

fn missing_destination<C: CommandFactory>() -> UsageError {
    UsageError::Invalid {
        reason: "exactly one of -q or -e is required".to_string(),
        usage: C::command().render_help().to_string(),
    }
}

/// Parse sender arguments, including the program name.
pub fn parse_sender<I, T>(args: I) -> Result<SenderArgs, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = SenderCli::try_parse_from(args).map_err(usage_error::<SenderCli>)?;
    let destination = cli
        .destination
        .into_destination()
        .ok_or_else(missing_destination::<SenderCli>)?;

    Ok(SenderArgs {
        destination,
        url: cli.url,
        content_type: cli.content_type,
        value_type: cli.value_type,
        value: cli.value,
    })
}

/// Parse sniffer arguments, including the program name.
pub fn parse_sniffer<I, T>(args: I) -> Result<SnifferArgs, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = SnifferCli::try_parse_from(args).map_err(usage_error::<SnifferCli>)?;
    let destination = cli
        .destination
        .into_destination()
        .ok_or_else(missing_destination::<SnifferCli>)?;

    Ok(SnifferArgs {
        destination,
        url: cli.url,
        frame_dir: cli.frame_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_cli_is_consistent() {
        SenderCli::command().debug_assert();
    }

    #[test]
    fn test_sniffer_cli_is_consistent() {
        SnifferCli::command().debug_assert();
    }

    #[test]
    fn test_sender_negative_int_value() {
        let args = parse_sender(["rmq-sender", "-q", "n", "text/plain", "int", "-5"]).unwrap();
        assert_eq!(args.value, "-5");
        assert_eq!(args.value_type, ValueEncoding::Int);
    }

    #[test]
    fn test_usage_text_has_examples() {
        let err = parse_sender(["rmq-sender"]).unwrap_err();
        assert!(err.output().contains("rmq-sender -q log_chan text/plain string Hello"));
    }
}
