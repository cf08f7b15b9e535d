use eventing::{Deliver, error::DeliveryError};
use protocol::{
	types::{ConsumerReference, NotificationMessage},
	v1::Notify,
};
use std::time::Duration;

/// Pushes notifications to consumers as JSON `POST` requests
pub struct HttpDelivery {
	client: reqwest::Client,
}

impl HttpDelivery {
	pub fn new(timeout: Duration) -> reqwest::Result<Self> {
		Ok(Self {
			client: reqwest::Client::builder().timeout(timeout).build()?,
		})
	}
}

impl Deliver for HttpDelivery {
	async fn deliver(
		&self,
		consumer: &ConsumerReference,
		message: &NotificationMessage,
	) -> Result<(), DeliveryError> {
		let failed = |e: reqwest::Error| DeliveryError {
			address: consumer.address.to_string(),
			reason: e.to_string(),
		};

		self.client
			.post(consumer.address.clone())
			.json(&Notify {
				messages: vec![message.clone()],
			})
			.send()
			.await
			.map_err(failed)?
			.error_for_status()
			.map_err(failed)?;

		Ok(())
	}
	fn accepts(&self, consumer: &ConsumerReference) -> bool {
		matches!(consumer.address.scheme(), "http" | "https")
	}
}
