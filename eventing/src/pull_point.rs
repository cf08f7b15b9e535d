//! Pull point registry
//!
//! Each pull point owns a bounded FIFO queue behind its own mutex. Waiters in
//! [`PullPointRegistry::get_messages`] register interest on the pull point's [`Notify`]
//! *before* looking at the queue, so a message enqueued in between is never missed.

use crate::{
	error::{CreatePullPointError, GetMessagesError},
	filter::{CompiledFilter, matches},
	options::{Options, OverflowPolicy},
};
use ahash::RandomState;
use dashmap::DashMap;
use protocol::types::{NotificationMessage, PullPointReference};
use std::{
	collections::VecDeque,
	future,
	pin::pin,
	sync::{
		Arc, Mutex, MutexGuard,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
use tokio::{
	select,
	sync::Notify,
	time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

pub(crate) struct PullPoint {
	pub reference: PullPointReference,
	pub filter: CompiledFilter,
	queue: Mutex<Queue>,
	notify: Notify,
}

struct Queue {
	messages: VecDeque<Arc<NotificationMessage>>,
	destroyed: bool,
	dropped: u64,
}

/// Result of offering a published message to a pull point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueue {
	Queued,
	/// Queued after dropping the oldest message
	QueuedDroppingOldest,
	Rejected,
	NotMatched,
	Destroyed,
}

impl PullPoint {
	fn lock(&self) -> MutexGuard<'_, Queue> {
		self.queue.lock().unwrap()
	}
	pub fn enqueue(
		&self,
		message: &Arc<NotificationMessage>,
		capacity: usize,
		overflow: OverflowPolicy,
	) -> Enqueue {
		if !matches(message, &self.filter) {
			return Enqueue::NotMatched;
		}

		let result = {
			let mut queue = self.lock();
			if queue.destroyed {
				return Enqueue::Destroyed;
			}

			if queue.messages.len() < capacity {
				queue.messages.push_back(Arc::clone(message));
				Enqueue::Queued
			} else {
				queue.dropped += 1;
				match overflow {
					OverflowPolicy::RejectNew => return Enqueue::Rejected,
					OverflowPolicy::DropOldest => {
						queue.messages.pop_front();
						queue.messages.push_back(Arc::clone(message));
						Enqueue::QueuedDroppingOldest
					}
				}
			}
		};

		// wakes exactly one waiter, or lets the next one through immediately
		self.notify.notify_one();

		result
	}
	/// Takes up to `maximum` messages from the head of the queue
	fn take(queue: &mut Queue, maximum: usize) -> Vec<NotificationMessage> {
		let n = maximum.min(queue.messages.len());
		queue
			.messages
			.drain(..n)
			.map(Arc::unwrap_or_clone)
			.collect()
	}
}

async fn sleep_until_some(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => sleep_until(deadline).await,
		None => future::pending().await,
	}
}

/// Registry of all live pull points
pub struct PullPointRegistry {
	pull_points: DashMap<PullPointReference, Arc<PullPoint>, RandomState>,
	count: AtomicUsize,
	options: Options,
}

impl PullPointRegistry {
	pub fn new(options: Options) -> Self {
		Self {
			pull_points: DashMap::with_hasher(RandomState::new()),
			count: AtomicUsize::new(0),
			options,
		}
	}
	pub fn create(
		&self,
		filter: CompiledFilter,
	) -> Result<PullPointReference, CreatePullPointError> {
		let max = self.options.max_pull_points;
		self.count
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
				(n < max).then_some(n + 1)
			})
			.map_err(|_| CreatePullPointError::LimitReached(max))?;

		let reference = PullPointReference(Uuid::now_v7());
		self.pull_points.insert(
			reference,
			Arc::new(PullPoint {
				reference,
				filter,
				queue: Mutex::new(Queue {
					messages: VecDeque::new(),
					destroyed: false,
					dropped: 0,
				}),
				notify: Notify::new(),
			}),
		);

		info!("{reference} created");

		Ok(reference)
	}
	fn get(&self, reference: PullPointReference) -> Option<Arc<PullPoint>> {
		self.pull_points
			.get(&reference)
			.map(|pull_point| Arc::clone(&pull_point))
	}
	/// Removes up to `maximum` messages, oldest first.
	///
	/// If the queue is empty, waits until a message arrives, `timeout` elapses,
	/// `cancel` is cancelled or the pull point is destroyed. Timing out or getting
	/// cancelled returns no messages and leaves the queue untouched. Doesn't wait at all
	/// if no timeout is given.
	pub async fn get_messages(
		&self,
		reference: PullPointReference,
		maximum: i64,
		timeout: Option<Duration>,
		cancel: &CancellationToken,
	) -> Result<Vec<NotificationMessage>, GetMessagesError> {
		if maximum <= 0 {
			return Err(GetMessagesError::InvalidMaximum(maximum));
		}
		let maximum = usize::try_from(maximum).unwrap_or(usize::MAX);

		let pull_point = self
			.get(reference)
			.ok_or(GetMessagesError::UnknownPullPoint(reference))?;

		// `Some(None)`: a timeout too far out to represent, waits without a deadline
		let deadline = timeout.map(|timeout| Instant::now().checked_add(timeout));

		loop {
			let mut notified = pin!(pull_point.notify.notified());
			// register before checking the queue so that no enqueue can slip in between
			notified.as_mut().enable();

			{
				let mut queue = pull_point.lock();
				if queue.destroyed {
					return Err(GetMessagesError::Destroyed(reference));
				}
				if !queue.messages.is_empty() {
					let messages = PullPoint::take(&mut queue, maximum);
					if !queue.messages.is_empty() {
						// leftovers are for the next waiter
						pull_point.notify.notify_one();
					}
					trace!("{reference}: {} messages taken", messages.len());
					return Ok(messages);
				}
			}

			let Some(deadline) = deadline else {
				return Ok(Vec::new());
			};

			select! {
				_ = &mut notified => continue,
				_ = sleep_until_some(deadline) => {
					debug!("{reference}: timed out waiting for messages");
					return Ok(Vec::new());
				}
				_ = cancel.cancelled() => {
					debug!("{reference}: waiting for messages cancelled");
					return Ok(Vec::new());
				}
			}
		}
	}
	/// Destroys the pull point, waking everyone waiting on it.
	///
	/// Returns `false` if it didn't exist or was already destroyed, which is not an error.
	pub fn destroy(&self, reference: PullPointReference) -> bool {
		let Some((_, pull_point)) = self.pull_points.remove(&reference) else {
			return false;
		};
		self.count.fetch_sub(1, Ordering::AcqRel);

		let dropped = {
			let mut queue = pull_point.lock();
			queue.destroyed = true;
			queue.messages.clear();
			queue.dropped
		};
		pull_point.notify.notify_waiters();

		info!("{reference} destroyed, {dropped} messages were dropped during its lifetime");

		true
	}
	/// Enqueues the message on every matching pull point, returns on how many
	pub(crate) fn offer(&self, message: &Arc<NotificationMessage>) -> usize {
		let pull_points: Vec<_> = self
			.pull_points
			.iter()
			.map(|pull_point| Arc::clone(pull_point.value()))
			.collect();

		let mut queued = 0;
		for pull_point in pull_points {
			match pull_point.enqueue(
				message,
				self.options.pull_point_queue_capacity,
				self.options.overflow_policy,
			) {
				Enqueue::Queued => queued += 1,
				Enqueue::QueuedDroppingOldest => {
					debug!("{} is full, dropped its oldest message", pull_point.reference);
					queued += 1;
				}
				Enqueue::Rejected => {
					debug!(
						"{} is full, rejected message on {}",
						pull_point.reference, message.topic
					);
				}
				Enqueue::NotMatched | Enqueue::Destroyed => {}
			}
		}

		queued
	}
	/// Enqueues the messages on a single pull point, skipping the ones its filter rejects
	pub(crate) fn offer_to(
		&self,
		reference: PullPointReference,
		messages: &[Arc<NotificationMessage>],
	) -> Result<usize, GetMessagesError> {
		let pull_point = self
			.get(reference)
			.ok_or(GetMessagesError::UnknownPullPoint(reference))?;

		let mut queued = 0;
		for message in messages {
			match pull_point.enqueue(
				message,
				self.options.pull_point_queue_capacity,
				self.options.overflow_policy,
			) {
				Enqueue::Queued | Enqueue::QueuedDroppingOldest => queued += 1,
				Enqueue::Destroyed => return Err(GetMessagesError::Destroyed(reference)),
				Enqueue::Rejected | Enqueue::NotMatched => {}
			}
		}

		Ok(queued)
	}
	pub(crate) fn filter(&self, reference: PullPointReference) -> Option<CompiledFilter> {
		self.get(reference).map(|pull_point| pull_point.filter.clone())
	}
	/// Number of queued messages, `None` if the pull point doesn't exist
	pub fn queued(&self, reference: PullPointReference) -> Option<usize> {
		self.get(reference).map(|pull_point| pull_point.lock().messages.len())
	}
	/// Number of live pull points
	pub fn len(&self) -> usize {
		self.count.load(Ordering::Acquire)
	}
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
