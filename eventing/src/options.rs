use crate::error::InvalidOptions;
use serde::Deserialize;

/// What happens when a message is enqueued on a full pull point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
	/// Discard the oldest queued message to make room
	DropOldest,
	/// Discard the new message
	RejectNew,
}

/// Configuration options
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Options {
	/// Lifetime of a subscription if the subscriber doesn't ask for one, in seconds
	pub default_termination_secs: u64,
	/// Shortest acceptable subscription lifetime, in seconds
	pub min_termination_secs: u64,
	/// Longest acceptable subscription lifetime, in seconds
	pub max_termination_secs: u64,
	/// Maximum number of live push subscriptions
	pub max_subscriptions: usize,
	/// Maximum number of live pull points
	pub max_pull_points: usize,
	/// Maximum number of messages queued in a single pull point
	pub pull_point_queue_capacity: usize,
	pub overflow_policy: OverflowPolicy,
	/// The size of the channel between the dispatcher and each subscription's delivery task
	///
	/// If a consumer is slower than this, new messages for it are dropped
	pub delivery_channel_size: usize,
	/// Terminate a subscription after this many failed deliveries in a row.
	/// Never terminates if not set
	pub max_consecutive_delivery_failures: Option<u32>,
}

impl Options {
	pub fn validate(&self) -> Result<(), InvalidOptions> {
		if self.min_termination_secs > self.max_termination_secs {
			return Err(InvalidOptions::TerminationBounds {
				min: self.min_termination_secs,
				max: self.max_termination_secs,
			});
		}

		Ok(())
	}
}

impl Default for Options {
	fn default() -> Self {
		Self {
			default_termination_secs: 300,
			min_termination_secs: 1,
			max_termination_secs: 24 * 60 * 60,
			max_subscriptions: 1024,
			max_pull_points: 256,
			pull_point_queue_capacity: 1024,
			overflow_policy: OverflowPolicy::DropOldest,
			delivery_channel_size: 64,
			max_consecutive_delivery_failures: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn termination_bounds() {
		assert_eq!(Options::default().validate(), Ok(()));

		let inverted = Options {
			min_termination_secs: 60,
			max_termination_secs: 10,
			..Default::default()
		};
		assert_eq!(
			inverted.validate(),
			Err(InvalidOptions::TerminationBounds { min: 60, max: 10 })
		);
	}
}
