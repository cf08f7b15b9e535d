use anyhow::Result;
use axum::Router;
use clap::Parser;
use config::Config;
use delivery::HttpDelivery;
use endpoints::event_routes;
use eventing::{Broker, TopicSet};
use logging::init_logging;
use std::sync::Arc;
use sweeper::init_sweeper;
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub mod cmd_args;
pub mod config;
pub mod delivery;
pub mod endpoints;
pub mod logging;
pub mod sweeper;

#[derive(Clone)]
pub struct ServerState {
	pub broker: Arc<Broker<HttpDelivery>>,
	pub config: Arc<Config>,
	/// Cancelled when the server is shutting down
	pub shutdown: CancellationToken,
}

impl ServerState {
	pub fn new(config: Config) -> Result<Self> {
		let delivery = HttpDelivery::new(std::time::Duration::from_millis(
			config.delivery.timeout_ms,
		))?;
		let broker = Broker::new(
			config.broker,
			TopicSet::new(config.topics.clone()),
			delivery,
		);

		Ok(Self {
			broker: Arc::new(broker),
			config: Arc::new(config),
			shutdown: CancellationToken::new(),
		})
	}
}

pub fn app(state: ServerState) -> Router {
	Router::new()
		.nest("/events", event_routes())
		.with_state(state)
}

pub async fn main() -> Result<()> {
	init_logging();

	let args = cmd_args::Args::parse();
	let mut config = config::read_config(&args.config).await?;
	if let Some(bind_to) = args.bind_to {
		config.bind_to = bind_to;
	}

	let listener = tokio::net::TcpListener::bind(config.bind_to).await?;

	let state = ServerState::new(config)?;
	init_sweeper(state.clone());

	let shutdown = state.shutdown.clone();
	tokio::spawn(async move {
		if let Err(e) = ctrl_c().await {
			error!("failed to listen for ctrl-c: {e}");
			return;
		}
		info!("Shutting down.");
		shutdown.cancel();
	});

	let shutdown = state.shutdown.clone();
	let app = app(state);

	info!("TCP listener bound on {}", listener.local_addr()?);
	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown.cancelled_owned())
		.await?;

	Ok(())
}
