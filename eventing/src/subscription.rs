//! Push subscription registry
//!
//! Every subscription is guarded by its own mutex, the registry map itself is sharded,
//! so operations on different subscriptions never wait on each other.
//!
//! Expiry is lazy: whoever touches a subscription after its termination time
//! terminates it. [`SubscriptionRegistry::sweep`] only reclaims memory of subscriptions
//! nobody touches anymore.

use crate::{
	clock::Clock,
	error::{PauseError, RenewError, ResumeError, SubscribeError, TerminationOutOfRange},
	filter::{CompiledFilter, matches},
	options::Options,
};
use ahash::RandomState;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use protocol::{
	types::{
		ConsumerReference, NotificationMessage, SubscriptionReference, SubscriptionState,
		TerminationTime,
	},
	v1::SubscriptionStatus,
};
use serde_json::Value;
use std::sync::{
	Arc, Mutex, MutexGuard,
	atomic::{AtomicUsize, Ordering},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(crate) type DeliverySender = mpsc::Sender<Arc<NotificationMessage>>;
pub(crate) type DeliveryReceiver = mpsc::Receiver<Arc<NotificationMessage>>;

pub(crate) struct SubscriptionEntry {
	pub reference: SubscriptionReference,
	pub consumer: ConsumerReference,
	pub filter: CompiledFilter,
	pub policy: Option<Value>,
	pub creation_time: DateTime<Utc>,
	inner: Mutex<EntryState>,
}

struct EntryState {
	state: SubscriptionState,
	termination_time: DateTime<Utc>,
	// dropped on termination, which ends the delivery task
	sender: Option<DeliverySender>,
	consecutive_failures: u32,
}

/// Result of offering a published message to a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
	Queued,
	NotMatched,
	Paused,
	/// The consumer is too slow, message dropped
	Full,
	Terminated,
}

impl EntryState {
	/// Applies lazy expiry, returns `true` if the subscription is still alive
	fn check_alive(&mut self, reference: SubscriptionReference, now: DateTime<Utc>) -> bool {
		if self.state == SubscriptionState::Terminated {
			return false;
		}
		if now > self.termination_time {
			debug!("{reference} expired at {}", self.termination_time);
			self.terminate();
			return false;
		}

		true
	}
	fn terminate(&mut self) {
		self.state = SubscriptionState::Terminated;
		self.sender = None;
	}
}

impl SubscriptionEntry {
	fn lock(&self) -> MutexGuard<'_, EntryState> {
		self.inner.lock().unwrap()
	}
	pub fn offer(&self, message: &Arc<NotificationMessage>, now: DateTime<Utc>) -> Offer {
		let mut inner = self.lock();
		// liveness first, so dead subscriptions get reclaimed whatever the topic
		if !inner.check_alive(self.reference, now) {
			return Offer::Terminated;
		}
		if !matches(message, &self.filter) {
			return Offer::NotMatched;
		}
		if inner.state == SubscriptionState::Paused {
			return Offer::Paused;
		}

		let Some(sender) = &inner.sender else {
			return Offer::Terminated;
		};
		match sender.try_send(Arc::clone(message)) {
			Ok(()) => Offer::Queued,
			Err(TrySendError::Full(_)) => Offer::Full,
			Err(TrySendError::Closed(_)) => {
				inner.terminate();
				Offer::Terminated
			}
		}
	}
	/// Whether a delivery attempt may be made right now
	pub fn is_deliverable(&self, now: DateTime<Utc>) -> bool {
		let mut inner = self.lock();
		inner.check_alive(self.reference, now) && inner.state == SubscriptionState::Active
	}
	pub fn record_delivery_success(&self) {
		self.lock().consecutive_failures = 0;
	}
	/// Returns `true` if the subscription got terminated because of this failure
	pub fn record_delivery_failure(&self, max_consecutive_failures: Option<u32>) -> bool {
		let mut inner = self.lock();
		inner.consecutive_failures += 1;

		match max_consecutive_failures {
			Some(max)
				if inner.consecutive_failures >= max
					&& inner.state != SubscriptionState::Terminated =>
			{
				inner.terminate();
				true
			}
			_ => false,
		}
	}
}

/// A freshly created subscription
pub(crate) struct Created {
	pub entry: Arc<SubscriptionEntry>,
	pub receiver: DeliveryReceiver,
	pub current_time: DateTime<Utc>,
	pub termination_time: DateTime<Utc>,
}

/// Registry of all live push subscriptions
pub struct SubscriptionRegistry {
	subscriptions: DashMap<SubscriptionReference, Arc<SubscriptionEntry>, RandomState>,
	count: AtomicUsize,
	clock: Arc<dyn Clock>,
	options: Options,
}

impl SubscriptionRegistry {
	pub fn new(options: Options, clock: Arc<dyn Clock>) -> Self {
		Self {
			subscriptions: DashMap::with_hasher(RandomState::new()),
			count: AtomicUsize::new(0),
			clock,
			options,
		}
	}
	/// The acceptable `[minimum, maximum]` termination time range at `now`
	pub fn acceptable_range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
		let secs = |s: u64| {
			i64::try_from(s)
				.ok()
				.and_then(Duration::try_seconds)
				.unwrap_or(Duration::MAX)
		};

		(
			now.checked_add_signed(secs(self.options.min_termination_secs))
				.unwrap_or(DateTime::<Utc>::MAX_UTC),
			now.checked_add_signed(secs(self.options.max_termination_secs))
				.unwrap_or(DateTime::<Utc>::MAX_UTC),
		)
	}
	fn resolve_termination(
		&self,
		requested: TerminationTime,
		now: DateTime<Utc>,
	) -> Result<DateTime<Utc>, TerminationOutOfRange> {
		let requested = requested.resolve(now);
		let (minimum, maximum) = self.acceptable_range(now);

		if requested < minimum || requested > maximum {
			return Err(TerminationOutOfRange {
				requested,
				minimum,
				maximum,
			});
		}

		Ok(requested)
	}
	pub(crate) fn create(
		&self,
		consumer: ConsumerReference,
		filter: CompiledFilter,
		initial_termination_time: Option<TerminationTime>,
		policy: Option<Value>,
	) -> Result<Created, SubscribeError> {
		let now = self.clock.now();

		let requested = initial_termination_time.unwrap_or(TerminationTime::Relative(
			i64::try_from(self.options.default_termination_secs).unwrap_or(i64::MAX),
		));
		let termination_time = self.resolve_termination(requested, now)?;

		if !self.reserve_slot() {
			// the limit may be held by subscriptions that are already dead
			self.sweep();
			if !self.reserve_slot() {
				return Err(SubscribeError::LimitReached(self.options.max_subscriptions));
			}
		}

		let (sender, receiver) = mpsc::channel(self.options.delivery_channel_size);

		let reference = SubscriptionReference(Uuid::now_v7());
		let entry = Arc::new(SubscriptionEntry {
			reference,
			consumer,
			filter,
			policy,
			creation_time: now,
			inner: Mutex::new(EntryState {
				state: SubscriptionState::Active,
				termination_time,
				sender: Some(sender),
				consecutive_failures: 0,
			}),
		});

		self.subscriptions.insert(reference, Arc::clone(&entry));

		info!(
			"{reference} created for {} until {termination_time}",
			entry.consumer.address
		);

		Ok(Created {
			entry,
			receiver,
			current_time: now,
			termination_time,
		})
	}
	fn reserve_slot(&self) -> bool {
		let max = self.options.max_subscriptions;
		self.count
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
				(n < max).then_some(n + 1)
			})
			.is_ok()
	}
	fn get(&self, reference: SubscriptionReference) -> Option<Arc<SubscriptionEntry>> {
		// clone out of the map so no shard lock is held while locking the entry
		self.subscriptions
			.get(&reference)
			.map(|entry| Arc::clone(&entry))
	}
	pub(crate) fn remove(&self, reference: SubscriptionReference) {
		if self.subscriptions.remove(&reference).is_some() {
			self.count.fetch_sub(1, Ordering::AcqRel);
		}
	}
	/// Changes the termination time. Doesn't change whether the subscription is paused
	pub fn renew(
		&self,
		reference: SubscriptionReference,
		termination_time: TerminationTime,
	) -> Result<(DateTime<Utc>, DateTime<Utc>), RenewError> {
		let entry = self
			.get(reference)
			.ok_or(RenewError::UnknownSubscription(reference))?;

		let now = self.clock.now();
		let mut inner = entry.lock();
		if !inner.check_alive(reference, now) {
			drop(inner);
			self.remove(reference);
			return Err(RenewError::UnknownSubscription(reference));
		}

		let termination_time = self.resolve_termination(termination_time, now)?;
		inner.termination_time = termination_time;

		debug!("{reference} renewed until {termination_time}");

		Ok((now, termination_time))
	}
	/// Terminates the subscription.
	///
	/// Returns `false` if it didn't exist or was already terminated, which is not an error.
	pub fn unsubscribe(&self, reference: SubscriptionReference) -> bool {
		let Some(entry) = self.get(reference) else {
			return false;
		};

		let was_alive = {
			let mut inner = entry.lock();
			let alive = inner.check_alive(reference, self.clock.now());
			inner.terminate();
			alive
		};
		self.remove(reference);

		if was_alive {
			info!("{reference} unsubscribed");
		}

		was_alive
	}
	pub fn pause(&self, reference: SubscriptionReference) -> Result<(), PauseError> {
		let entry = self
			.get(reference)
			.ok_or(PauseError::UnknownSubscription(reference))?;

		let mut inner = entry.lock();
		if !inner.check_alive(reference, self.clock.now()) {
			drop(inner);
			self.remove(reference);
			return Err(PauseError::UnknownSubscription(reference));
		}
		if inner.state == SubscriptionState::Paused {
			return Err(PauseError::AlreadyPaused(reference));
		}

		inner.state = SubscriptionState::Paused;
		debug!("{reference} paused");

		Ok(())
	}
	pub fn resume(&self, reference: SubscriptionReference) -> Result<(), ResumeError> {
		let entry = self
			.get(reference)
			.ok_or(ResumeError::UnknownSubscription(reference))?;

		let mut inner = entry.lock();
		if !inner.check_alive(reference, self.clock.now()) {
			drop(inner);
			self.remove(reference);
			return Err(ResumeError::UnknownSubscription(reference));
		}
		if inner.state != SubscriptionState::Paused {
			return Err(ResumeError::NotPaused(reference));
		}

		inner.state = SubscriptionState::Active;
		debug!("{reference} resumed");

		Ok(())
	}
	/// `None` if the subscription doesn't exist or was terminated
	pub fn status(&self, reference: SubscriptionReference) -> Option<SubscriptionStatus> {
		let entry = self.get(reference)?;

		let mut inner = entry.lock();
		if !inner.check_alive(reference, self.clock.now()) {
			drop(inner);
			self.remove(reference);
			return None;
		}

		Some(SubscriptionStatus {
			state: inner.state,
			creation_time: entry.creation_time,
			termination_time: inner.termination_time,
			subscription_policy: entry.policy.clone(),
		})
	}
	/// Offers a message to every subscription, returns how many queued it for delivery
	pub(crate) fn offer(&self, message: &Arc<NotificationMessage>) -> usize {
		let now = self.clock.now();
		let entries: Vec<_> = self
			.subscriptions
			.iter()
			.map(|entry| Arc::clone(entry.value()))
			.collect();

		let mut queued = 0;
		for entry in entries {
			match entry.offer(message, now) {
				Offer::Queued => queued += 1,
				Offer::Full => {
					warn!(
						"{} is not keeping up, dropped message on {}",
						entry.reference, message.topic
					);
				}
				Offer::Terminated => self.remove(entry.reference),
				Offer::NotMatched | Offer::Paused => {}
			}
		}

		queued
	}
	/// Removes expired and terminated subscriptions, returns how many were removed
	pub fn sweep(&self) -> usize {
		let now = self.clock.now();
		let dead: Vec<_> = self
			.subscriptions
			.iter()
			.filter(|entry| !entry.value().lock().check_alive(*entry.key(), now))
			.map(|entry| *entry.key())
			.collect();

		for reference in &dead {
			self.remove(*reference);
		}

		dead.len()
	}
	/// Number of live subscriptions
	pub fn len(&self) -> usize {
		self.count.load(Ordering::Acquire)
	}
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{clock::ManualClock, topic::TopicSet};
	use protocol::types::{Filter, TopicExpression};
	use serde_json::json;

	fn registry(options: Options) -> (SubscriptionRegistry, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(Utc::now()));
		(SubscriptionRegistry::new(options, clock.clone()), clock)
	}

	fn consumer() -> ConsumerReference {
		ConsumerReference {
			address: "http://consumer.local/notify".parse().unwrap(),
		}
	}

	fn create(registry: &SubscriptionRegistry, secs: i64) -> Created {
		registry
			.create(
				consumer(),
				CompiledFilter::any(),
				Some(TerminationTime::Relative(secs)),
				None,
			)
			.map_err(|e| e.to_string())
			.unwrap()
	}

	#[test]
	fn initial_termination_bounds() {
		let (registry, _clock) = registry(Options::default());

		let created = create(&registry, 60);
		assert_eq!(
			created.termination_time - created.current_time,
			Duration::seconds(60)
		);

		let err = registry
			.create(
				consumer(),
				CompiledFilter::any(),
				Some(TerminationTime::Relative(999_999_999)),
				None,
			)
			.err()
			.unwrap();
		let SubscribeError::TerminationTime(range) = err else {
			panic!("unexpected error {err}");
		};
		assert_eq!(range.maximum - range.minimum, Duration::seconds(24 * 60 * 60 - 1));

		assert!(matches!(
			registry.create(
				consumer(),
				CompiledFilter::any(),
				Some(TerminationTime::Relative(-5)),
				None
			),
			Err(SubscribeError::TerminationTime(_))
		));
	}

	#[test]
	fn default_termination() {
		let (registry, _clock) = registry(Options::default());

		let created = registry
			.create(consumer(), CompiledFilter::any(), None, None)
			.map_err(|e| e.to_string())
			.unwrap();
		assert_eq!(
			created.termination_time - created.current_time,
			Duration::seconds(300)
		);
	}

	#[test]
	fn lazy_expiry() {
		let (registry, clock) = registry(Options::default());
		let created = create(&registry, 10);
		let reference = created.entry.reference;

		clock.advance(Duration::seconds(10));
		assert!(registry.status(reference).is_some(), "alive exactly at termination time");

		clock.advance(Duration::seconds(1));
		assert!(matches!(
			registry.renew(reference, TerminationTime::Relative(60)),
			Err(RenewError::UnknownSubscription(_))
		));
		assert!(registry.is_empty());
		// unsubscribing an expired subscription is a no-op
		assert!(!registry.unsubscribe(reference));
	}

	#[test]
	fn renew_keeps_paused() {
		let (registry, clock) = registry(Options::default());
		let reference = create(&registry, 10).entry.reference;

		registry.pause(reference).unwrap();
		let (now, until) = registry
			.renew(reference, TerminationTime::Relative(120))
			.unwrap();
		assert_eq!(until - now, Duration::seconds(120));

		clock.advance(Duration::seconds(60));
		let status = registry.status(reference).unwrap();
		assert_eq!(status.state, SubscriptionState::Paused);
	}

	#[test]
	fn renew_out_of_range() {
		let (registry, _clock) = registry(Options::default());
		let reference = create(&registry, 10).entry.reference;

		assert!(matches!(
			registry.renew(reference, TerminationTime::Relative(0)),
			Err(RenewError::TerminationTime(_))
		));
	}

	#[test]
	fn pause_resume_transitions() {
		let (registry, _clock) = registry(Options::default());
		let reference = create(&registry, 60).entry.reference;

		assert!(matches!(
			registry.resume(reference),
			Err(ResumeError::NotPaused(_))
		));
		registry.pause(reference).unwrap();
		assert!(matches!(
			registry.pause(reference),
			Err(PauseError::AlreadyPaused(_))
		));
		registry.resume(reference).unwrap();

		assert!(registry.unsubscribe(reference));
		assert!(!registry.unsubscribe(reference));
		assert!(matches!(
			registry.pause(reference),
			Err(PauseError::UnknownSubscription(_))
		));
		assert!(matches!(
			registry.resume(reference),
			Err(ResumeError::UnknownSubscription(_))
		));
	}

	#[test]
	fn offer_respects_state() {
		let (registry, clock) = registry(Options::default());
		let mut created = create(&registry, 10);
		let message = Arc::new(NotificationMessage::new("tns1:Device/Trigger", json!({})));

		assert_eq!(registry.offer(&message), 1);
		assert!(created.receiver.try_recv().is_ok());

		registry.pause(created.entry.reference).unwrap();
		assert_eq!(registry.offer(&message), 0);
		assert!(created.receiver.try_recv().is_err());

		registry.resume(created.entry.reference).unwrap();
		clock.advance(Duration::seconds(11));
		assert_eq!(registry.offer(&message), 0);
		assert!(registry.is_empty());
	}

	#[test]
	fn subscription_limit() {
		let (registry, _clock) = registry(Options {
			max_subscriptions: 1,
			..Default::default()
		});
		let reference = create(&registry, 60).entry.reference;

		assert!(matches!(
			registry.create(consumer(), CompiledFilter::any(), None, None),
			Err(SubscribeError::LimitReached(1))
		));

		registry.unsubscribe(reference);
		create(&registry, 60);
	}

	#[test]
	fn limit_reclaims_dead_subscriptions() {
		let (registry, clock) = registry(Options {
			max_subscriptions: 1,
			..Default::default()
		});
		create(&registry, 10);

		clock.advance(Duration::seconds(11));
		let second = create(&registry, 60);
		assert_eq!(registry.len(), 1);

		// terminated by failed deliveries but never removed from the map
		assert!(second.entry.record_delivery_failure(Some(1)));
		create(&registry, 60);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn offer_reclaims_expired_regardless_of_filter() {
		let (registry, clock) = registry(Options::default());
		let filter = CompiledFilter::compile(
			&Filter::topic(TopicExpression::simple("tns1:Device/Trigger")),
			&TopicSet::default(),
		)
		.unwrap();
		registry
			.create(
				consumer(),
				filter,
				Some(TerminationTime::Relative(10)),
				None,
			)
			.map_err(|e| e.to_string())
			.unwrap();

		clock.advance(Duration::seconds(11));
		let other = Arc::new(NotificationMessage::new("tns1:Device/Other", json!({})));
		assert_eq!(registry.offer(&other), 0);
		assert!(registry.is_empty());
	}

	#[test]
	fn huge_termination_bounds() {
		let (registry, _clock) = registry(Options {
			default_termination_secs: u64::MAX,
			max_termination_secs: u64::MAX,
			..Default::default()
		});

		let now = Utc::now();
		let (minimum, maximum) = registry.acceptable_range(now);
		assert!(minimum > now);
		assert_eq!(maximum, DateTime::<Utc>::MAX_UTC);

		let created = registry
			.create(consumer(), CompiledFilter::any(), None, None)
			.map_err(|e| e.to_string())
			.unwrap();
		assert_eq!(created.termination_time, DateTime::<Utc>::MAX_UTC);
	}

	#[test]
	fn sweep_reclaims_expired() {
		let (registry, clock) = registry(Options::default());
		create(&registry, 10);
		create(&registry, 100);

		clock.advance(Duration::seconds(50));
		assert_eq!(registry.sweep(), 1);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn failure_policy() {
		let (registry, _clock) = registry(Options::default());
		let created = create(&registry, 60);

		assert!(!created.entry.record_delivery_failure(Some(2)));
		created.entry.record_delivery_success();
		assert!(!created.entry.record_delivery_failure(Some(2)));
		assert!(created.entry.record_delivery_failure(Some(2)));
		assert!(registry.status(created.entry.reference).is_none());
	}
}
