//! Seams to the outside world

use crate::error::DeliveryError;
use protocol::types::{ConsumerReference, NotificationMessage};
use std::future::Future;

/// Delivers push notifications to consumers.
///
/// The message has its `subscription_reference` set to the subscription it is delivered for.
pub trait Deliver: Send + Sync + 'static {
	fn deliver(
		&self,
		consumer: &ConsumerReference,
		message: &NotificationMessage,
	) -> impl Future<Output = Result<(), DeliveryError>> + Send;

	/// Whether notifications can be delivered to this consumer at all.
	/// Checked once when subscribing
	fn accepts(&self, #[allow(unused)] consumer: &ConsumerReference) -> bool {
		true
	}
}
