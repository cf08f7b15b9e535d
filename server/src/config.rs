use eventing::Options;
use protocol::types::TopicDescription;
use serde::Deserialize;
use std::{net::SocketAddr, path::Path, time::Duration};
use tokio::fs::read_to_string;

#[derive(Deserialize, Debug)]
pub struct Config {
	/// Socket to which bind the server
	pub bind_to: SocketAddr,
	/// Subscription and pull point limits
	#[serde(default)]
	pub broker: Options,
	/// Topics produced by this server. Any topic is accepted if empty
	#[serde(default)]
	pub topics: Vec<TopicDescription>,
	/// push delivery config
	#[serde(default)]
	pub delivery: DeliveryConfig,
	/// How often expired subscriptions are reclaimed, in seconds
	#[serde(default = "default_sweep_interval")]
	pub sweep_interval_secs: u64,
	/// Upper bound on how long a GetMessages call may wait, in milliseconds
	#[serde(default = "default_max_pull_timeout")]
	pub max_pull_timeout_ms: u64,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct DeliveryConfig {
	/// Timeout of a single push delivery, in milliseconds
	pub timeout_ms: u64,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self { timeout_ms: 5000 }
	}
}

fn default_sweep_interval() -> u64 {
	60
}

fn default_max_pull_timeout() -> u64 {
	60_000
}

impl Config {
	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs.max(1))
	}
	pub fn max_pull_timeout(&self) -> Duration {
		Duration::from_millis(self.max_pull_timeout_ms)
	}
}

pub async fn read_config(path: impl AsRef<Path>) -> anyhow::Result<Config> {
	parse_config(&read_to_string(path).await?)
}

fn parse_config(text: &str) -> anyhow::Result<Config> {
	let config: Config = toml::from_str(text)?;
	config.broker.validate()?;

	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;
	use eventing::OverflowPolicy;

	#[test]
	fn parses_config() {
		let config = parse_config(
			r#"
			bind_to = "127.0.0.1:8080"
			sweep_interval_secs = 30

			[broker]
			max_termination_secs = 3600
			overflow_policy = "reject_new"
			max_consecutive_delivery_failures = 5

			[[topics]]
			path = "tns1:Device/Trigger"

			[[topics]]
			path = "tns1:Device/Relay"
			property = true
			"#,
		)
		.unwrap();

		assert_eq!(config.broker.max_termination_secs, 3600);
		assert_eq!(config.broker.default_termination_secs, 300);
		assert_eq!(config.broker.overflow_policy, OverflowPolicy::RejectNew);
		assert_eq!(config.broker.max_consecutive_delivery_failures, Some(5));
		assert_eq!(config.topics.len(), 2);
		assert!(config.topics[1].property);
		assert_eq!(config.delivery.timeout_ms, 5000);
		assert_eq!(config.max_pull_timeout(), Duration::from_secs(60));
	}

	#[test]
	fn inverted_termination_bounds() {
		let error = parse_config(
			r#"
			bind_to = "127.0.0.1:8080"

			[broker]
			min_termination_secs = 600
			max_termination_secs = 60
			"#,
		)
		.unwrap_err();

		assert!(error.to_string().contains("min_termination_secs"));
	}
}
