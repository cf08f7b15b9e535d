//! Fans published messages out to subscriptions and pull points

use crate::{
	filter::{CompiledFilter, matches},
	pull_point::PullPointRegistry,
	subscription::SubscriptionRegistry,
	topic::TopicSet,
};
use ahash::RandomState;
use dashmap::DashMap;
use protocol::types::NotificationMessage;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a published message ended up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
	/// Number of push subscriptions the message was queued for delivery on
	pub subscriptions: usize,
	/// Number of pull points the message was enqueued on
	pub pull_points: usize,
}

pub(crate) struct Dispatcher {
	// latest message of every property topic
	current: DashMap<String, Arc<NotificationMessage>, RandomState>,
}

impl Dispatcher {
	pub fn new() -> Self {
		Self {
			current: DashMap::with_hasher(RandomState::new()),
		}
	}
	pub fn publish(
		&self,
		mut message: NotificationMessage,
		topics: &TopicSet,
		subscriptions: &SubscriptionRegistry,
		pull_points: &PullPointRegistry,
	) -> PublishOutcome {
		// set per delivery
		message.subscription_reference = None;
		let message = Arc::new(message);

		if topics.is_property(&message.topic) {
			trace!("current message of {} updated", message.topic);
			self.current
				.insert(message.topic.clone(), Arc::clone(&message));
		}

		let outcome = PublishOutcome {
			subscriptions: subscriptions.offer(&message),
			pull_points: pull_points.offer(&message),
		};

		debug!(
			"message on {} dispatched to {} subscriptions and {} pull points",
			message.topic, outcome.subscriptions, outcome.pull_points
		);

		outcome
	}
	pub fn current(&self, topic: &str) -> Option<Arc<NotificationMessage>> {
		self.current.get(topic).map(|message| Arc::clone(&message))
	}
	/// Current messages of all property topics that pass the filter
	pub fn current_matching(&self, filter: &CompiledFilter) -> Vec<Arc<NotificationMessage>> {
		self.current
			.iter()
			.filter(|message| matches(message.value(), filter))
			.map(|message| Arc::clone(message.value()))
			.collect()
	}
}
