//! Typed client for the event service HTTP API

use protocol::{
	API_BASE_PATH, Fault, Request,
	types::{
		ConsumerReference, Filter, NotificationMessage, PullPointReference, SubscriptionReference,
		TerminationTime, TopicExpression,
	},
	v1::*,
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
	#[error("error making the request")]
	Request(#[from] reqwest::Error),
	#[error(transparent)]
	Api(#[from] Fault),
	#[error("invalid server url: {0}")]
	Url(#[from] url::ParseError),
}

impl Error {
	/// The fault returned by the server, if any
	pub fn fault(&self) -> Option<&Fault> {
		match self {
			Error::Api(fault) => Some(fault),
			_ => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Client {
	http: reqwest::Client,
	api_url: Url,
}

impl Client {
	/// `server_url` is the root of the server, e.g. `http://localhost:8080`
	pub fn new(server_url: &Url) -> Result<Self, Error> {
		Ok(Self {
			http: reqwest::Client::new(),
			api_url: server_url.join(&format!("{API_BASE_PATH}/"))?,
		})
	}
	async fn make_request<R: Request>(&self, req: &R) -> Result<R::Response, Error> {
		let url = self.api_url.join(R::PATH.trim_start_matches('/'))?;

		let res = self.http.post(url).json(req).send().await?;

		if !res.status().is_success() {
			let fault = res.json::<Fault>().await?;

			return Err(Error::Api(fault));
		}

		Ok(res.json::<R::Response>().await?)
	}
	pub async fn subscribe(
		&self,
		consumer: Url,
		filter: Filter,
		initial_termination_time: Option<TerminationTime>,
		subscription_policy: Option<Value>,
	) -> Result<SubscribeResponse, Error> {
		self.make_request(&SubscribeRequest {
			consumer_reference: ConsumerReference { address: consumer },
			filter,
			initial_termination_time,
			subscription_policy,
		})
		.await
	}
	pub async fn renew(
		&self,
		subscription_reference: SubscriptionReference,
		termination_time: TerminationTime,
	) -> Result<RenewResponse, Error> {
		self.make_request(&RenewRequest {
			subscription_reference,
			termination_time,
		})
		.await
	}
	pub async fn unsubscribe(
		&self,
		subscription_reference: SubscriptionReference,
	) -> Result<(), Error> {
		self.make_request(&UnsubscribeRequest {
			subscription_reference,
		})
		.await
	}
	pub async fn pause(&self, subscription_reference: SubscriptionReference) -> Result<(), Error> {
		self.make_request(&PauseSubscriptionRequest {
			subscription_reference,
		})
		.await
	}
	pub async fn resume(&self, subscription_reference: SubscriptionReference) -> Result<(), Error> {
		self.make_request(&ResumeSubscriptionRequest {
			subscription_reference,
		})
		.await
	}
	pub async fn status(
		&self,
		subscription_reference: SubscriptionReference,
	) -> Result<Option<SubscriptionStatus>, Error> {
		self.make_request(&SubscriptionStatusRequest {
			subscription_reference,
		})
		.await
	}
	pub async fn create_pull_point(&self, filter: Filter) -> Result<PullPointReference, Error> {
		self.make_request(&CreatePullPointRequest { filter })
			.await
			.map(|response| response.pull_point_reference)
	}
	/// Waits up to `timeout` for messages if the pull point is empty
	pub async fn get_messages(
		&self,
		pull_point_reference: PullPointReference,
		maximum_number: i64,
		timeout: Option<Duration>,
	) -> Result<Vec<NotificationMessage>, Error> {
		self.make_request(&GetMessagesRequest {
			pull_point_reference,
			maximum_number,
			timeout_ms: timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
		})
		.await
		.map(|response| response.messages)
	}
	pub async fn destroy_pull_point(
		&self,
		pull_point_reference: PullPointReference,
	) -> Result<(), Error> {
		self.make_request(&DestroyPullPointRequest {
			pull_point_reference,
		})
		.await
	}
	pub async fn set_synchronization_point(
		&self,
		pull_point_reference: PullPointReference,
	) -> Result<(), Error> {
		self.make_request(&SetSynchronizationPointRequest {
			pull_point_reference,
		})
		.await
	}
	pub async fn get_current_message(
		&self,
		topic: TopicExpression,
	) -> Result<NotificationMessage, Error> {
		self.make_request(&GetCurrentMessageRequest { topic })
			.await
			.map(|response| response.message)
	}
	pub async fn get_topics(&self) -> Result<GetTopicsResponse, Error> {
		self.make_request(&GetTopicsRequest {}).await
	}
	pub async fn publish(&self, message: NotificationMessage) -> Result<(), Error> {
		self.make_request(&PublishRequest { message }).await
	}
}
