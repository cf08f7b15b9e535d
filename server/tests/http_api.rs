use anyhow::{Context, Result};
use axum::{Json, Router, extract::State, routing::post};
use client::Client;
use eventing::Options;
use protocol::{
	FaultKind,
	types::{Filter, NotificationMessage, TerminationTime, TopicDescription, TopicExpression},
	v1::Notify,
};
use server::{
	ServerState, app,
	config::{Config, DeliveryConfig},
};
use std::time::Duration;
use tokio::{net::TcpListener, sync::mpsc};
use url::Url;

const TRIGGER: &str = "tns1:Device/Trigger";
const RELAY: &str = "tns1:Device/Relay";

async fn start_server() -> Result<Client> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;

	let state = ServerState::new(Config {
		bind_to: addr,
		broker: Options::default(),
		topics: vec![
			TopicDescription {
				path: TRIGGER.to_owned(),
				property: false,
			},
			TopicDescription {
				path: RELAY.to_owned(),
				property: true,
			},
		],
		delivery: DeliveryConfig::default(),
		sweep_interval_secs: 60,
		max_pull_timeout_ms: 10_000,
	})?;

	tokio::spawn(async move { axum::serve(listener, app(state)).await });

	Ok(Client::new(&format!("http://{addr}").parse()?)?)
}

/// A push consumer, returns its address and the received notifications
async fn start_consumer() -> Result<(Url, mpsc::UnboundedReceiver<NotificationMessage>)> {
	async fn notify(
		State(tx): State<mpsc::UnboundedSender<NotificationMessage>>,
		Json(notify): Json<Notify>,
	) {
		for message in notify.messages {
			let _ = tx.send(message);
		}
	}

	let (tx, rx) = mpsc::unbounded_channel();
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;
	let app = Router::new().route("/notify", post(notify)).with_state(tx);

	tokio::spawn(async move { axum::serve(listener, app).await });

	Ok((format!("http://{addr}/notify").parse()?, rx))
}

fn message(topic: &str, n: u64) -> NotificationMessage {
	NotificationMessage::new(topic, serde_json::json!({ "n": n }))
}

#[tokio::test]
async fn push_subscription() -> Result<()> {
	let client = start_server().await?;
	let (consumer, mut notifications) = start_consumer().await?;

	let subscription = client
		.subscribe(
			consumer,
			Filter::topic(TopicExpression::simple(TRIGGER)),
			Some(TerminationTime::Relative(60)),
			Some(serde_json::json!({ "note": "kept as is" })),
		)
		.await?;

	client.publish(message(RELAY, 1)).await?;
	client.publish(message(TRIGGER, 2)).await?;

	let received = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
		.await?
		.context("consumer gone")?;
	assert_eq!(received.topic, TRIGGER);
	assert_eq!(
		received.subscription_reference,
		Some(subscription.subscription_reference)
	);

	let status = client
		.status(subscription.subscription_reference)
		.await?
		.context("subscription should exist")?;
	assert_eq!(
		status.subscription_policy,
		Some(serde_json::json!({ "note": "kept as is" }))
	);

	client.unsubscribe(subscription.subscription_reference).await?;
	client.unsubscribe(subscription.subscription_reference).await?;
	assert!(
		client
			.status(subscription.subscription_reference)
			.await?
			.is_none()
	);

	let error = client
		.pause(subscription.subscription_reference)
		.await
		.unwrap_err();
	assert_eq!(error.fault().unwrap().kind, FaultKind::PauseFailed);

	Ok(())
}

#[tokio::test]
async fn termination_time_out_of_range() -> Result<()> {
	let client = start_server().await?;
	let (consumer, _notifications) = start_consumer().await?;

	let error = client
		.subscribe(
			consumer,
			Filter::default(),
			Some(TerminationTime::Relative(999_999_999)),
			None,
		)
		.await
		.unwrap_err();

	let fault = error.fault().context("expected a fault")?;
	assert!(fault.acceptable_range().is_some());
	assert!(fault.is_retryable());

	Ok(())
}

#[tokio::test]
async fn unsupported_consumer_scheme() -> Result<()> {
	let client = start_server().await?;

	let error = client
		.subscribe(
			"mailto:someone@example.com".parse()?,
			Filter::default(),
			None,
			None,
		)
		.await
		.unwrap_err();
	assert_eq!(
		error.fault().unwrap().kind,
		FaultKind::SubscribeCreationFailed
	);

	Ok(())
}

#[tokio::test]
async fn pull_point() -> Result<()> {
	let client = start_server().await?;

	let pull_point = client.create_pull_point(Filter::default()).await?;

	let waiter = {
		let client = client.clone();
		tokio::spawn(async move {
			client
				.get_messages(pull_point, 2, Some(Duration::from_secs(5)))
				.await
		})
	};
	tokio::time::sleep(Duration::from_millis(50)).await;
	client.publish(message(TRIGGER, 1)).await?;
	assert_eq!(waiter.await??.len(), 1);

	for n in 2..=4 {
		client.publish(message(TRIGGER, n)).await?;
	}
	let messages = client.get_messages(pull_point, 2, None).await?;
	assert_eq!(messages.len(), 2);
	assert_eq!(messages[0].payload["n"], 2);
	assert_eq!(messages[1].payload["n"], 3);

	client.destroy_pull_point(pull_point).await?;
	client.destroy_pull_point(pull_point).await?;

	let error = client.get_messages(pull_point, 2, None).await.unwrap_err();
	assert_eq!(
		error.fault().unwrap().kind,
		FaultKind::UnableToGetMessages
	);

	Ok(())
}

#[tokio::test]
async fn topics_and_current_message() -> Result<()> {
	let client = start_server().await?;

	let topics = client.get_topics().await?;
	assert!(topics.fixed_topic_set);
	assert_eq!(topics.topics.len(), 2);

	let error = client
		.get_current_message(TopicExpression::simple(RELAY))
		.await
		.unwrap_err();
	assert!(matches!(
		error.fault().unwrap().kind,
		FaultKind::NoCurrentMessageOnTopic { .. }
	));

	client.publish(message(RELAY, 7)).await?;
	let current = client
		.get_current_message(TopicExpression::simple(RELAY))
		.await?;
	assert_eq!(current.payload["n"], 7);

	let pull_point = client
		.create_pull_point(Filter::topic(TopicExpression::full("tns1:Device//.")))
		.await?;
	client.set_synchronization_point(pull_point).await?;
	let messages = client.get_messages(pull_point, 10, None).await?;
	assert_eq!(messages.len(), 1);
	assert_eq!(messages[0].topic, RELAY);

	let error = client
		.create_pull_point(Filter::topic(TopicExpression::simple("tns1:PTZ/Move")))
		.await
		.unwrap_err();
	assert_eq!(
		error.fault().unwrap().kind,
		FaultKind::TopicNotSupported
	);

	Ok(())
}
