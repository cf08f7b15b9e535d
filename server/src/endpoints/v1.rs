use crate::ServerState;
use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::post,
};
use eventing::RESOURCE_UNKNOWN;
use protocol::{
	Fault, FaultKind, Request,
	v1::*,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum Error {
	#[error(transparent)]
	Fault(#[from] Fault),
}

impl Error {
	fn status(&self) -> StatusCode {
		let Error::Fault(fault) = self;

		if fault.subcode.as_deref() == Some(RESOURCE_UNKNOWN) {
			return StatusCode::NOT_FOUND;
		}
		match fault.kind {
			FaultKind::NoCurrentMessageOnTopic { .. } => StatusCode::NOT_FOUND,
			FaultKind::SubscribeCreationFailed | FaultKind::UnableToCreatePullPoint => {
				StatusCode::SERVICE_UNAVAILABLE
			}
			FaultKind::PauseFailed | FaultKind::ResumeFailed => StatusCode::CONFLICT,
			ref kind if kind.is_receiver_fault() => StatusCode::INTERNAL_SERVER_ERROR,
			_ => StatusCode::BAD_REQUEST,
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			error!("{self}");
		} else {
			warn!("{self}");
		}

		let Error::Fault(fault) = self;
		(status, Json(fault)).into_response()
	}
}

pub fn routes() -> Router<ServerState> {
	Router::new()
		.route(SubscribeRequest::PATH, post(subscribe))
		.route(RenewRequest::PATH, post(renew))
		.route(UnsubscribeRequest::PATH, post(unsubscribe))
		.route(PauseSubscriptionRequest::PATH, post(pause_subscription))
		.route(ResumeSubscriptionRequest::PATH, post(resume_subscription))
		.route(SubscriptionStatusRequest::PATH, post(subscription_status))
		.route(CreatePullPointRequest::PATH, post(create_pull_point))
		.route(GetMessagesRequest::PATH, post(get_messages))
		.route(DestroyPullPointRequest::PATH, post(destroy_pull_point))
		.route(
			SetSynchronizationPointRequest::PATH,
			post(set_synchronization_point),
		)
		.route(GetCurrentMessageRequest::PATH, post(get_current_message))
		.route(GetTopicsRequest::PATH, post(get_topics))
		.route(PublishRequest::PATH, post(publish))
}

type Result<T> = std::result::Result<Json<T>, Error>;

async fn subscribe(
	State(state): State<ServerState>,
	Json(request): Json<SubscribeRequest>,
) -> Result<SubscribeResponse> {
	let response = state
		.broker
		.subscribe(
			request.consumer_reference,
			&request.filter,
			request.initial_termination_time,
			request.subscription_policy,
		)
		.map_err(Fault::from)?;

	Ok(Json(response))
}

async fn renew(
	State(state): State<ServerState>,
	Json(request): Json<RenewRequest>,
) -> Result<RenewResponse> {
	let response = state
		.broker
		.renew(request.subscription_reference, request.termination_time)
		.map_err(Fault::from)?;

	Ok(Json(response))
}

async fn unsubscribe(
	State(state): State<ServerState>,
	Json(request): Json<UnsubscribeRequest>,
) -> Result<()> {
	state.broker.unsubscribe(request.subscription_reference);

	Ok(Json(()))
}

async fn pause_subscription(
	State(state): State<ServerState>,
	Json(request): Json<PauseSubscriptionRequest>,
) -> Result<()> {
	state
		.broker
		.pause(request.subscription_reference)
		.map_err(Fault::from)?;

	Ok(Json(()))
}

async fn resume_subscription(
	State(state): State<ServerState>,
	Json(request): Json<ResumeSubscriptionRequest>,
) -> Result<()> {
	state
		.broker
		.resume(request.subscription_reference)
		.map_err(Fault::from)?;

	Ok(Json(()))
}

async fn subscription_status(
	State(state): State<ServerState>,
	Json(request): Json<SubscriptionStatusRequest>,
) -> Result<Option<SubscriptionStatus>> {
	Ok(Json(state.broker.status(request.subscription_reference)))
}

async fn create_pull_point(
	State(state): State<ServerState>,
	Json(request): Json<CreatePullPointRequest>,
) -> Result<CreatePullPointResponse> {
	let pull_point_reference = state
		.broker
		.create_pull_point(&request.filter)
		.map_err(Fault::from)?;

	Ok(Json(CreatePullPointResponse {
		pull_point_reference,
	}))
}

async fn get_messages(
	State(state): State<ServerState>,
	Json(request): Json<GetMessagesRequest>,
) -> Result<GetMessagesResponse> {
	let timeout = request
		.timeout_ms
		.map(|ms| Duration::from_millis(ms).min(state.config.max_pull_timeout()));
	// a disconnecting client drops this future, which is just as side effect free
	let cancel = state.shutdown.child_token();

	let messages = state
		.broker
		.get_messages(
			request.pull_point_reference,
			request.maximum_number,
			timeout,
			&cancel,
		)
		.await
		.map_err(Fault::from)?;

	debug!(
		"{}: returning {} messages",
		request.pull_point_reference,
		messages.len()
	);

	Ok(Json(GetMessagesResponse { messages }))
}

async fn destroy_pull_point(
	State(state): State<ServerState>,
	Json(request): Json<DestroyPullPointRequest>,
) -> Result<()> {
	state.broker.destroy_pull_point(request.pull_point_reference);

	Ok(Json(()))
}

async fn set_synchronization_point(
	State(state): State<ServerState>,
	Json(request): Json<SetSynchronizationPointRequest>,
) -> Result<()> {
	state
		.broker
		.set_synchronization_point(request.pull_point_reference)
		.map_err(Fault::from)?;

	Ok(Json(()))
}

async fn get_current_message(
	State(state): State<ServerState>,
	Json(request): Json<GetCurrentMessageRequest>,
) -> Result<GetCurrentMessageResponse> {
	let message = state
		.broker
		.get_current_message(&request.topic)
		.map_err(Fault::from)?;

	Ok(Json(GetCurrentMessageResponse { message }))
}

async fn get_topics(
	State(state): State<ServerState>,
	Json(_request): Json<GetTopicsRequest>,
) -> Result<GetTopicsResponse> {
	Ok(Json(state.broker.get_topics()))
}

async fn publish(
	State(state): State<ServerState>,
	Json(request): Json<PublishRequest>,
) -> Result<()> {
	state
		.broker
		.publish(request.message)
		.map_err(Fault::from)?;

	Ok(Json(()))
}
