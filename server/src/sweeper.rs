use crate::ServerState;
use tokio::{
	select, spawn,
	time::{MissedTickBehavior, interval},
};
use tracing::debug;

/// Periodically reclaims subscriptions that expired without anyone touching them
pub fn init_sweeper(state: ServerState) {
	spawn(async move {
		let mut interval = interval(state.config.sweep_interval());
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			select! {
				_ = state.shutdown.cancelled() => break,
				_ = interval.tick() => {
					let removed = state.broker.sweep();
					debug!(
						"sweep done, {removed} removed, {} subscriptions and {} pull points live",
						state.broker.subscription_count(),
						state.broker.pull_point_count()
					);
				}
			}
		}
	});
}
