use chrono::{DateTime, Utc};
use protocol::types::{PullPointReference, SubscriptionReference};
use thiserror::Error;

/// A filter could not be compiled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
	#[error("unknown topic expression dialect {0}")]
	DialectUnknown(String),
	#[error("invalid topic expression {expression:?}: {reason}")]
	InvalidTopicExpression {
		expression: String,
		reason: &'static str,
	},
	#[error("{0:?} names more than one topic")]
	MultipleTopicsSpecified(String),
	#[error("topic {0:?} is not supported")]
	TopicNotSupported(String),
	#[error("unknown filter dialect {0}")]
	UnknownFilter(String),
	#[error("invalid producer properties expression {expression:?}: {reason}")]
	InvalidProducerProperties {
		expression: String,
		reason: &'static str,
	},
	#[error("invalid message content expression {expression:?}: {reason}")]
	InvalidMessageContent {
		expression: String,
		reason: &'static str,
	},
}

/// Requested termination time is outside of the acceptable range
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("termination time {requested} is not within [{minimum}, {maximum}]")]
pub struct TerminationOutOfRange {
	pub requested: DateTime<Utc>,
	pub minimum: DateTime<Utc>,
	pub maximum: DateTime<Utc>,
}

/// Errors that [`Broker::subscribe`][crate::Broker::subscribe] can return
#[derive(Error, Debug)]
pub enum SubscribeError {
	#[error(transparent)]
	Filter(#[from] FilterError),
	#[error(transparent)]
	TerminationTime(#[from] TerminationOutOfRange),
	#[error("subscription limit of {0} reached")]
	LimitReached(usize),
	#[error("consumer address {0} is not supported")]
	UnsupportedConsumer(String),
}

/// Errors that [`Broker::renew`][crate::Broker::renew] can return
#[derive(Error, Debug)]
pub enum RenewError {
	#[error("{0} does not exist or was terminated")]
	UnknownSubscription(SubscriptionReference),
	#[error(transparent)]
	TerminationTime(#[from] TerminationOutOfRange),
}

/// Errors that [`Broker::pause`][crate::Broker::pause] can return
#[derive(Error, Debug)]
pub enum PauseError {
	#[error("{0} does not exist or was terminated")]
	UnknownSubscription(SubscriptionReference),
	#[error("{0} is already paused")]
	AlreadyPaused(SubscriptionReference),
}

/// Errors that [`Broker::resume`][crate::Broker::resume] can return
#[derive(Error, Debug)]
pub enum ResumeError {
	#[error("{0} does not exist or was terminated")]
	UnknownSubscription(SubscriptionReference),
	#[error("{0} is not paused")]
	NotPaused(SubscriptionReference),
}

/// Errors that [`Broker::create_pull_point`][crate::Broker::create_pull_point] can return
#[derive(Error, Debug)]
pub enum CreatePullPointError {
	#[error(transparent)]
	Filter(#[from] FilterError),
	#[error("pull point limit of {0} reached")]
	LimitReached(usize),
}

/// Errors that [`Broker::get_messages`][crate::Broker::get_messages] can return
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GetMessagesError {
	#[error("{0} does not exist or was destroyed")]
	UnknownPullPoint(PullPointReference),
	#[error("{0} was destroyed while waiting for messages")]
	Destroyed(PullPointReference),
	#[error("maximum number of messages must be positive, got {0}")]
	InvalidMaximum(i64),
}

/// Errors that [`Broker::get_current_message`][crate::Broker::get_current_message] can return
#[derive(Error, Debug)]
pub enum CurrentMessageError {
	#[error(transparent)]
	Topic(#[from] FilterError),
	#[error("{0:?} does not name a single topic")]
	NotConcrete(String),
	#[error("no current message on topic {0:?}")]
	NoCurrentMessage(String),
}

/// A push delivery attempt failed
#[derive(Error, Debug)]
#[error("delivery to {address} failed: {reason}")]
pub struct DeliveryError {
	pub address: String,
	pub reason: String,
}

/// [`Options`][crate::Options] that contradict each other
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidOptions {
	#[error("min_termination_secs ({min}) is greater than max_termination_secs ({max})")]
	TerminationBounds { min: u64, max: u64 },
}
