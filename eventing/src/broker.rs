use crate::{
	clock::{Clock, SystemClock},
	delivery::delivery_task,
	dispatcher::{Dispatcher, PublishOutcome},
	error::{
		CreatePullPointError, CurrentMessageError, FilterError, GetMessagesError, PauseError,
		RenewError, ResumeError, SubscribeError,
	},
	filter::CompiledFilter,
	options::Options,
	pull_point::PullPointRegistry,
	subscription::SubscriptionRegistry,
	topic::{Dialect, TopicMatcher, TopicSet},
	traits::Deliver,
};
use protocol::{
	types::{
		ConsumerReference, Filter, NotificationMessage, PullPointReference, SubscriptionReference,
		TerminationTime, TopicExpression,
	},
	v1::{GetTopicsResponse, RenewResponse, SubscribeResponse, SubscriptionStatus},
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The event service: push subscriptions, pull points and the topics they listen on.
///
/// All methods take `&self`, put the broker in an [`Arc`] to share it between tasks.
pub struct Broker<D> {
	subscriptions: Arc<SubscriptionRegistry>,
	pull_points: PullPointRegistry,
	dispatcher: Dispatcher,
	topics: TopicSet,
	deliver: Arc<D>,
	clock: Arc<dyn Clock>,
	options: Options,
}

impl<D: Deliver> Broker<D> {
	pub fn new(options: Options, topics: TopicSet, deliver: D) -> Self {
		Self::with_clock(options, topics, deliver, Arc::new(SystemClock))
	}
	pub fn with_clock(
		options: Options,
		topics: TopicSet,
		deliver: D,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			subscriptions: Arc::new(SubscriptionRegistry::new(options, Arc::clone(&clock))),
			pull_points: PullPointRegistry::new(options),
			dispatcher: Dispatcher::new(),
			topics,
			deliver: Arc::new(deliver),
			clock,
			options,
		}
	}
	/// Creates a push subscription and starts delivering to it.
	///
	/// Must be called from within a tokio runtime.
	pub fn subscribe(
		&self,
		consumer: ConsumerReference,
		filter: &Filter,
		initial_termination_time: Option<TerminationTime>,
		policy: Option<Value>,
	) -> Result<SubscribeResponse, SubscribeError> {
		if !self.deliver.accepts(&consumer) {
			return Err(SubscribeError::UnsupportedConsumer(
				consumer.address.to_string(),
			));
		}
		let filter = CompiledFilter::compile(filter, &self.topics)?;

		let created =
			self.subscriptions
				.create(consumer, filter, initial_termination_time, policy)?;
		let reference = created.entry.reference;

		tokio::spawn(delivery_task(
			created.entry,
			Arc::downgrade(&self.subscriptions),
			created.receiver,
			Arc::clone(&self.deliver),
			Arc::clone(&self.clock),
			self.options.max_consecutive_delivery_failures,
		));

		Ok(SubscribeResponse {
			subscription_reference: reference,
			current_time: created.current_time,
			termination_time: created.termination_time,
		})
	}
	pub fn renew(
		&self,
		reference: SubscriptionReference,
		termination_time: TerminationTime,
	) -> Result<RenewResponse, RenewError> {
		let (current_time, termination_time) =
			self.subscriptions.renew(reference, termination_time)?;

		Ok(RenewResponse {
			current_time,
			termination_time,
		})
	}
	/// Terminates the subscription. Unsubscribing a subscription that doesn't exist
	/// (anymore) succeeds without doing anything.
	pub fn unsubscribe(&self, reference: SubscriptionReference) {
		if !self.subscriptions.unsubscribe(reference) {
			debug!("{reference}: unsubscribe of unknown subscription ignored");
		}
	}
	pub fn pause(&self, reference: SubscriptionReference) -> Result<(), PauseError> {
		self.subscriptions.pause(reference)
	}
	pub fn resume(&self, reference: SubscriptionReference) -> Result<(), ResumeError> {
		self.subscriptions.resume(reference)
	}
	/// `None` if the subscription doesn't exist or was terminated
	pub fn status(&self, reference: SubscriptionReference) -> Option<SubscriptionStatus> {
		self.subscriptions.status(reference)
	}
	pub fn create_pull_point(
		&self,
		filter: &Filter,
	) -> Result<PullPointReference, CreatePullPointError> {
		let filter = CompiledFilter::compile(filter, &self.topics)?;

		self.pull_points.create(filter)
	}
	/// See [`PullPointRegistry::get_messages`]
	pub async fn get_messages(
		&self,
		reference: PullPointReference,
		maximum: i64,
		timeout: Option<Duration>,
		cancel: &CancellationToken,
	) -> Result<Vec<NotificationMessage>, GetMessagesError> {
		self.pull_points
			.get_messages(reference, maximum, timeout, cancel)
			.await
	}
	/// Destroys the pull point. Destroying a pull point that doesn't exist (anymore)
	/// succeeds without doing anything.
	pub fn destroy_pull_point(&self, reference: PullPointReference) {
		if !self.pull_points.destroy(reference) {
			debug!("{reference}: destroy of unknown pull point ignored");
		}
	}
	/// Enqueues the current message of every property topic that the pull point's
	/// filter accepts
	pub fn set_synchronization_point(
		&self,
		reference: PullPointReference,
	) -> Result<(), GetMessagesError> {
		let filter = self
			.pull_points
			.filter(reference)
			.ok_or(GetMessagesError::UnknownPullPoint(reference))?;
		let current = self.dispatcher.current_matching(&filter);

		let queued = self.pull_points.offer_to(reference, &current)?;
		debug!("{reference}: synchronization point set, {queued} current messages queued");

		Ok(())
	}
	/// The last message published on a property topic
	pub fn get_current_message(
		&self,
		topic: &TopicExpression,
	) -> Result<NotificationMessage, CurrentMessageError> {
		let matcher = TopicMatcher::compile(topic)?;
		self.topics.check_supported(topic, &matcher)?;

		let topic = matcher
			.as_single_topic()
			.ok_or_else(|| CurrentMessageError::NotConcrete(topic.expression.clone()))?;

		self.dispatcher
			.current(topic)
			.map(Arc::unwrap_or_clone)
			.ok_or_else(|| CurrentMessageError::NoCurrentMessage(topic.to_owned()))
	}
	pub fn get_topics(&self) -> GetTopicsResponse {
		GetTopicsResponse {
			topic_expression_dialects: Dialect::ALL.iter().map(|d| d.uri().to_owned()).collect(),
			fixed_topic_set: self.topics.is_fixed(),
			topics: self.topics.topics().to_vec(),
		}
	}
	/// Hands a produced message to every matching subscription and pull point
	pub fn publish(&self, mut message: NotificationMessage) -> Result<PublishOutcome, FilterError> {
		// subscribers match against the path the topic set was checked with
		let trimmed = message.topic.trim();
		if trimmed.len() != message.topic.len() {
			message.topic = trimmed.to_owned();
		}
		let topic = TopicExpression::concrete(message.topic.clone());
		let matcher = TopicMatcher::compile(&topic)?;
		self.topics.check_supported(&topic, &matcher)?;

		Ok(self.dispatcher.publish(
			message,
			&self.topics,
			&self.subscriptions,
			&self.pull_points,
		))
	}
	/// Reclaims expired subscriptions. Returns how many were removed
	pub fn sweep(&self) -> usize {
		let removed = self.subscriptions.sweep();
		if removed > 0 {
			info!("{removed} expired subscriptions removed");
		}

		removed
	}
	pub fn subscription_count(&self) -> usize {
		self.subscriptions.len()
	}
	pub fn pull_point_count(&self) -> usize {
		self.pull_points.len()
	}
}
