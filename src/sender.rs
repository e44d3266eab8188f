//! Sender: publish one encoded value to a destination.

use tracing::debug;

use crate::broker::{BrokerChannel, Message, Result};
use crate::destination::Destination;

/// Declare the destination and publish `message` once.
pub async fn publish_once(
    channel: &dyn BrokerChannel,
    destination: &Destination,
    message: &Message,
) -> Result<()> {
    let plan = destination.publish_plan();
    plan.apply(channel).await?;
    channel
        .publish(&plan.exchange, &plan.routing_key, message)
        .await?;

    debug!(
        destination = %destination,
        content_type = %message.content_type,
        bytes = message.body.len(),
        "Published message"
    );
    Ok(())
}
