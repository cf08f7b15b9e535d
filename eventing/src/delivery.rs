use crate::{
	clock::Clock,
	subscription::{DeliveryReceiver, SubscriptionEntry, SubscriptionRegistry},
	traits::Deliver,
};
use protocol::types::NotificationMessage;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

// task ends when the subscription terminates, which drops the sender
pub(crate) async fn delivery_task<D: Deliver>(
	entry: Arc<SubscriptionEntry>,
	registry: Weak<SubscriptionRegistry>,
	mut receiver: DeliveryReceiver,
	deliver: Arc<D>,
	clock: Arc<dyn Clock>,
	max_consecutive_failures: Option<u32>,
) {
	while let Some(message) = receiver.recv().await {
		// state may have changed since the message was queued
		if !entry.is_deliverable(clock.now()) {
			trace!("{}: skipping delivery, not active", entry.reference);
			continue;
		}

		let message = NotificationMessage {
			subscription_reference: Some(entry.reference),
			..NotificationMessage::clone(&message)
		};

		match deliver.deliver(&entry.consumer, &message).await {
			Ok(()) => {
				trace!("{}: delivered message on {}", entry.reference, message.topic);
				entry.record_delivery_success();
			}
			Err(e) => {
				warn!("{}: {e}", entry.reference);
				if entry.record_delivery_failure(max_consecutive_failures) {
					warn!(
						"{} terminated after too many consecutive delivery failures",
						entry.reference
					);
					// nothing else would free its slot until the next sweep
					if let Some(registry) = registry.upgrade() {
						registry.remove(entry.reference);
					}
					break;
				}
			}
		}
	}

	debug!("{}: delivery task finished", entry.reference);
}
