//! v1 of the events API
//!
//! All types that implement [`Request`] are sent as JSON in an HTTP POST request
//! to their respective path under `/events/v1`. Failures are returned as a JSON [`Fault`].

use crate::{
	Request,
	fault::Fault,
	types::{
		ConsumerReference, Filter, NotificationMessage, PullPointReference, SubscriptionReference,
		SubscriptionState, TerminationTime, TopicDescription, TopicExpression,
	},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Creates a push subscription
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubscribeRequest {
	pub consumer_reference: ConsumerReference,
	#[serde(default)]
	pub filter: Filter,
	/// If not given, the server's default subscription lifetime is used
	#[serde(default)]
	pub initial_termination_time: Option<TerminationTime>,
	/// Opaque subscription policy, kept as is
	#[serde(default)]
	pub subscription_policy: Option<Value>,
}
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubscribeResponse {
	pub subscription_reference: SubscriptionReference,
	pub current_time: DateTime<Utc>,
	pub termination_time: DateTime<Utc>,
}
impl Request for SubscribeRequest {
	type Response = SubscribeResponse;
	type Error = Fault;

	const PATH: &'static str = "/subscribe";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RenewRequest {
	pub subscription_reference: SubscriptionReference,
	pub termination_time: TerminationTime,
}
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RenewResponse {
	pub current_time: DateTime<Utc>,
	pub termination_time: DateTime<Utc>,
}
impl Request for RenewRequest {
	type Response = RenewResponse;
	type Error = Fault;

	const PATH: &'static str = "/renew";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UnsubscribeRequest {
	pub subscription_reference: SubscriptionReference,
}
impl Request for UnsubscribeRequest {
	type Response = ();
	type Error = Fault;

	const PATH: &'static str = "/unsubscribe";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PauseSubscriptionRequest {
	pub subscription_reference: SubscriptionReference,
}
impl Request for PauseSubscriptionRequest {
	type Response = ();
	type Error = Fault;

	const PATH: &'static str = "/pause_subscription";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResumeSubscriptionRequest {
	pub subscription_reference: SubscriptionReference,
}
impl Request for ResumeSubscriptionRequest {
	type Response = ();
	type Error = Fault;

	const PATH: &'static str = "/resume_subscription";
}

/// Current state of a subscription
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubscriptionStatusRequest {
	pub subscription_reference: SubscriptionReference,
}
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubscriptionStatus {
	pub state: SubscriptionState,
	pub creation_time: DateTime<Utc>,
	pub termination_time: DateTime<Utc>,
	#[serde(default)]
	pub subscription_policy: Option<Value>,
}
impl Request for SubscriptionStatusRequest {
	/// `None` if the subscription doesn't exist or was terminated
	type Response = Option<SubscriptionStatus>;
	type Error = Fault;

	const PATH: &'static str = "/subscription_status";
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CreatePullPointRequest {
	/// Only messages matching this filter are queued. Matches everything by default
	#[serde(default)]
	pub filter: Filter,
}
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreatePullPointResponse {
	pub pull_point_reference: PullPointReference,
}
impl Request for CreatePullPointRequest {
	type Response = CreatePullPointResponse;
	type Error = Fault;

	const PATH: &'static str = "/create_pull_point";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GetMessagesRequest {
	pub pull_point_reference: PullPointReference,
	pub maximum_number: i64,
	/// How long to wait on an empty queue, in milliseconds. Doesn't wait if not given
	#[serde(default)]
	pub timeout_ms: Option<u64>,
}
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GetMessagesResponse {
	pub messages: Vec<NotificationMessage>,
}
impl Request for GetMessagesRequest {
	type Response = GetMessagesResponse;
	type Error = Fault;

	const PATH: &'static str = "/get_messages";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DestroyPullPointRequest {
	pub pull_point_reference: PullPointReference,
}
impl Request for DestroyPullPointRequest {
	type Response = ();
	type Error = Fault;

	const PATH: &'static str = "/destroy_pull_point";
}

/// Queues the current message of every property topic matched by the pull point
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetSynchronizationPointRequest {
	pub pull_point_reference: PullPointReference,
}
impl Request for SetSynchronizationPointRequest {
	type Response = ();
	type Error = Fault;

	const PATH: &'static str = "/set_synchronization_point";
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GetCurrentMessageRequest {
	pub topic: TopicExpression,
}
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GetCurrentMessageResponse {
	pub message: NotificationMessage,
}
impl Request for GetCurrentMessageRequest {
	type Response = GetCurrentMessageResponse;
	type Error = Fault;

	const PATH: &'static str = "/get_current_message";
}

/// Lists the supported topic expression dialects and topics
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GetTopicsRequest {}
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GetTopicsResponse {
	pub topic_expression_dialects: Vec<String>,
	/// If `true`, only the listed topics can be subscribed to
	pub fixed_topic_set: bool,
	pub topics: Vec<TopicDescription>,
}
impl Request for GetTopicsRequest {
	type Response = GetTopicsResponse;
	type Error = Fault;

	const PATH: &'static str = "/get_topics";
}

/// Sent by producers
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PublishRequest {
	pub message: NotificationMessage,
}
impl Request for PublishRequest {
	type Response = ();
	type Error = Fault;

	const PATH: &'static str = "/publish";
}

/// Body of a push delivery, POSTed to the consumer reference address.
///
/// Every message has its `subscription_reference` set.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Notify {
	pub messages: Vec<NotificationMessage>,
}
