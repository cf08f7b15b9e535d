use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Dialect URI of the WS-Topics simple topic expression grammar
pub const SIMPLE_DIALECT: &str = "http://docs.oasis-open.org/wsn/t-1/TopicExpression/Simple";
/// Dialect URI of the WS-Topics concrete topic expression grammar
pub const CONCRETE_DIALECT: &str = "http://docs.oasis-open.org/wsn/t-1/TopicExpression/Concrete";
/// Dialect URI of the WS-Topics full topic expression grammar
pub const FULL_DIALECT: &str = "http://docs.oasis-open.org/wsn/t-1/TopicExpression/Full";
/// Dialect of message content and producer properties expressions
pub const JSON_POINTER_DIALECT: &str = "urn:eventing:filter:json-pointer";

/// Reference to a push subscription
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SubscriptionReference(pub Uuid);

/// Reference to a pull point
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PullPointReference(pub Uuid);

impl fmt::Display for SubscriptionReference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "subscription-{}", self.0)
	}
}

impl fmt::Display for PullPointReference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "pullpoint-{}", self.0)
	}
}

/// Address notifications of a push subscription are delivered to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReference {
	pub address: Url,
}

/// A dialect-qualified string identifying one or more topics
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopicExpression {
	/// Either a full dialect URI or one of the short names `simple`, `concrete`, `full`
	pub dialect: String,
	pub expression: String,
}

impl TopicExpression {
	pub fn simple(expression: impl Into<String>) -> Self {
		Self {
			dialect: SIMPLE_DIALECT.to_owned(),
			expression: expression.into(),
		}
	}
	pub fn concrete(expression: impl Into<String>) -> Self {
		Self {
			dialect: CONCRETE_DIALECT.to_owned(),
			expression: expression.into(),
		}
	}
	pub fn full(expression: impl Into<String>) -> Self {
		Self {
			dialect: FULL_DIALECT.to_owned(),
			expression: expression.into(),
		}
	}
}

/// Predicate over message content or producer properties
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContentExpression {
	pub dialect: String,
	pub expression: String,
}

impl ContentExpression {
	pub fn json_pointer(expression: impl Into<String>) -> Self {
		Self {
			dialect: JSON_POINTER_DIALECT.to_owned(),
			expression: expression.into(),
		}
	}
}

/// Selects which messages a subscription or pull point is interested in.
///
/// Every present part must match. An empty filter matches everything.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
	#[serde(default)]
	pub topic: Option<TopicExpression>,
	#[serde(default)]
	pub producer_properties: Option<ContentExpression>,
	#[serde(default)]
	pub message_content: Option<ContentExpression>,
}

impl Filter {
	pub fn topic(topic: TopicExpression) -> Self {
		Self {
			topic: Some(topic),
			..Default::default()
		}
	}
}

/// Requested termination time, either absolute or relative to the server's current time
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationTime {
	Absolute(DateTime<Utc>),
	/// seconds from now
	Relative(i64),
}

impl TerminationTime {
	pub fn resolve(self, now: DateTime<Utc>) -> DateTime<Utc> {
		match self {
			TerminationTime::Absolute(at) => at,
			TerminationTime::Relative(secs) => Duration::try_seconds(secs)
				.and_then(|d| now.checked_add_signed(d))
				.unwrap_or(if secs < 0 {
					DateTime::<Utc>::MIN_UTC
				} else {
					DateTime::<Utc>::MAX_UTC
				}),
		}
	}
}

/// A single notification, immutable once produced
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NotificationMessage {
	/// Concrete topic path, e.g. `tns1:Device/Trigger`
	pub topic: String,
	#[serde(default)]
	pub producer_reference: Option<String>,
	/// Set when delivered through a push subscription
	#[serde(default)]
	pub subscription_reference: Option<SubscriptionReference>,
	#[serde(default)]
	pub payload: Value,
}

impl NotificationMessage {
	pub fn new(topic: impl Into<String>, payload: Value) -> Self {
		Self {
			topic: topic.into(),
			producer_reference: None,
			subscription_reference: None,
			payload,
		}
	}
	pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
		self.producer_reference = Some(producer.into());
		self
	}
}

/// Lifecycle state of a push subscription
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
	Active,
	Paused,
	Terminated,
}

/// A topic the service can produce messages on
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
	pub path: String,
	/// Messages on this topic describe state rather than discrete events
	#[serde(default)]
	pub property: bool,
}
