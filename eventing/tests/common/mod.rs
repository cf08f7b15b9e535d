#![allow(dead_code)]

use anyhow::{Context, Result};
use eventing::{Broker, Deliver, ManualClock, Options, TopicSet, error::DeliveryError};
use protocol::types::{ConsumerReference, NotificationMessage, TopicDescription};
use std::{sync::Arc, time::Duration};
use tokio::sync::{Semaphore, mpsc};

pub const TRIGGER: &str = "tns1:Device/Trigger";
pub const OTHER: &str = "tns1:Device/Other";
pub const RELAY: &str = "tns1:Device/Relay";

/// Records every delivery attempt. If gated, each attempt waits for a permit
/// before completing.
pub struct Recorder {
	attempts: mpsc::UnboundedSender<NotificationMessage>,
	gate: Option<Arc<Semaphore>>,
	fail: bool,
}

impl Deliver for Recorder {
	async fn deliver(
		&self,
		consumer: &ConsumerReference,
		message: &NotificationMessage,
	) -> Result<(), DeliveryError> {
		let _ = self.attempts.send(message.clone());

		if let Some(gate) = &self.gate {
			gate.acquire().await.unwrap().forget();
		}

		if self.fail {
			return Err(DeliveryError {
				address: consumer.address.to_string(),
				reason: "consumer unreachable".to_owned(),
			});
		}

		Ok(())
	}
}

pub struct Attempts(mpsc::UnboundedReceiver<NotificationMessage>);

impl Attempts {
	pub async fn next(&mut self) -> Result<NotificationMessage> {
		tokio::time::timeout(Duration::from_secs(5), self.0.recv())
			.await
			.context("no delivery attempt")?
			.context("deliverer dropped")
	}
	/// Waits a moment and makes sure there were no more attempts
	pub async fn assert_none(&mut self) {
		tokio::time::sleep(Duration::from_millis(50)).await;
		if let Ok(message) = self.0.try_recv() {
			panic!("unexpected delivery attempt on {}", message.topic);
		}
	}
}

pub struct Setup {
	pub broker: Arc<Broker<Recorder>>,
	pub clock: Arc<ManualClock>,
	pub attempts: Attempts,
}

pub struct Builder {
	options: Options,
	topics: TopicSet,
	gate: Option<Arc<Semaphore>>,
	fail: bool,
}

pub fn builder() -> Builder {
	Builder {
		options: Options::default(),
		topics: TopicSet::default(),
		gate: None,
		fail: false,
	}
}

impl Builder {
	pub fn options(mut self, options: Options) -> Self {
		self.options = options;
		self
	}
	/// [`TRIGGER`], [`OTHER`] and the [`RELAY`] property
	pub fn device_topics(mut self) -> Self {
		self.topics = TopicSet::new(vec![
			TopicDescription {
				path: TRIGGER.to_owned(),
				property: false,
			},
			TopicDescription {
				path: OTHER.to_owned(),
				property: false,
			},
			TopicDescription {
				path: RELAY.to_owned(),
				property: true,
			},
		]);
		self
	}
	pub fn gate(mut self, gate: Arc<Semaphore>) -> Self {
		self.gate = Some(gate);
		self
	}
	pub fn failing(mut self) -> Self {
		self.fail = true;
		self
	}
	pub fn build(self) -> Setup {
		let (tx, rx) = mpsc::unbounded_channel();
		let clock = Arc::new(ManualClock::new(chrono::Utc::now()));

		let broker = Broker::with_clock(
			self.options,
			self.topics,
			Recorder {
				attempts: tx,
				gate: self.gate,
				fail: self.fail,
			},
			clock.clone(),
		);

		Setup {
			broker: Arc::new(broker),
			clock,
			attempts: Attempts(rx),
		}
	}
}

pub fn consumer() -> ConsumerReference {
	ConsumerReference {
		address: "http://consumer.local/notify".parse().unwrap(),
	}
}

pub fn message(topic: &str, n: u64) -> NotificationMessage {
	NotificationMessage::new(topic, serde_json::json!({ "n": n }))
}

pub fn number(message: &NotificationMessage) -> u64 {
	message.payload["n"].as_u64().unwrap()
}
