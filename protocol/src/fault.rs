//! Structured faults returned by every operation of the event service
//!
//! A [`Fault`] is the logical `(code, reason, detail)` triple. The code is
//! hierarchical: a top level `Sender`/`Receiver` value, the namespace-qualified
//! fault name, and optionally a more specific subcode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const NAMESPACE_PREFIX: &str = "wsnt";

/// All fault kinds, with their structured detail
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "code")]
pub enum FaultKind {
	SubscribeCreationFailed,
	InvalidFilter {
		/// filter parts that were not understood
		unknown_filters: Vec<String>,
	},
	InvalidTopicExpression,
	TopicExpressionDialectUnknown {
		dialect: String,
	},
	TopicNotSupported,
	MultipleTopicsSpecified,
	InvalidProducerPropertiesExpression,
	InvalidMessageContentExpression,
	UnacceptableInitialTerminationTime {
		minimum: DateTime<Utc>,
		maximum: DateTime<Utc>,
	},
	UnacceptableTerminationTime {
		minimum: DateTime<Utc>,
		maximum: DateTime<Utc>,
	},
	UnableToDestroySubscription,
	PauseFailed,
	ResumeFailed,
	UnableToCreatePullPoint,
	UnableToGetMessages,
	UnableToDestroyPullPoint,
	NoCurrentMessageOnTopic {
		topic: String,
	},
}

impl FaultKind {
	pub fn name(&self) -> &'static str {
		match self {
			FaultKind::SubscribeCreationFailed => "SubscribeCreationFailedFault",
			FaultKind::InvalidFilter { .. } => "InvalidFilterFault",
			FaultKind::InvalidTopicExpression => "InvalidTopicExpressionFault",
			FaultKind::TopicExpressionDialectUnknown { .. } => "TopicExpressionDialectUnknownFault",
			FaultKind::TopicNotSupported => "TopicNotSupportedFault",
			FaultKind::MultipleTopicsSpecified => "MultipleTopicsSpecifiedFault",
			FaultKind::InvalidProducerPropertiesExpression => {
				"InvalidProducerPropertiesExpressionFault"
			}
			FaultKind::InvalidMessageContentExpression => "InvalidMessageContentExpressionFault",
			FaultKind::UnacceptableInitialTerminationTime { .. } => {
				"UnacceptableInitialTerminationTimeFault"
			}
			FaultKind::UnacceptableTerminationTime { .. } => "UnacceptableTerminationTimeFault",
			FaultKind::UnableToDestroySubscription => "UnableToDestroySubscriptionFault",
			FaultKind::PauseFailed => "PauseFailedFault",
			FaultKind::ResumeFailed => "ResumeFailedFault",
			FaultKind::UnableToCreatePullPoint => "UnableToCreatePullPointFault",
			FaultKind::UnableToGetMessages => "UnableToGetMessagesFault",
			FaultKind::UnableToDestroyPullPoint => "UnableToDestroyPullPointFault",
			FaultKind::NoCurrentMessageOnTopic { .. } => "NoCurrentMessageOnTopicFault",
		}
	}
	/// Whether the failure lies with the server rather than the request
	pub fn is_receiver_fault(&self) -> bool {
		matches!(
			self,
			FaultKind::SubscribeCreationFailed
				| FaultKind::UnableToCreatePullPoint
				| FaultKind::UnableToDestroySubscription
				| FaultKind::UnableToDestroyPullPoint
		)
	}
}

/// A fault returned to the caller of an operation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", .kind.name(), .reason)]
pub struct Fault {
	#[serde(flatten)]
	pub kind: FaultKind,
	/// More specific condition below the fault kind, e.g. `wsrf-r:ResourceUnknownFault`
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subcode: Option<String>,
	/// Human readable reason
	pub reason: String,
}

/// One level of a hierarchical fault code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCode {
	pub value: String,
	pub subcode: Option<Box<FaultCode>>,
}

impl Fault {
	pub fn new(kind: FaultKind, reason: impl Into<String>) -> Self {
		Self {
			kind,
			subcode: None,
			reason: reason.into(),
		}
	}
	pub fn with_subcode(mut self, subcode: impl Into<String>) -> Self {
		self.subcode = Some(subcode.into());
		self
	}
	/// The full code chain of this fault
	pub fn code(&self) -> FaultCode {
		let top = if self.kind.is_receiver_fault() {
			"env:Receiver"
		} else {
			"env:Sender"
		};

		let innermost = self.subcode.as_ref().map(|value| {
			Box::new(FaultCode {
				value: value.clone(),
				subcode: None,
			})
		});

		FaultCode {
			value: top.to_owned(),
			subcode: Some(Box::new(FaultCode {
				value: format!("{NAMESPACE_PREFIX}:{}", self.kind.name()),
				subcode: innermost,
			})),
		}
	}
	/// `true` if the same operation may succeed when retried later or with adjusted
	/// parameters, `false` if it is permanently invalid as issued.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self.kind,
			FaultKind::SubscribeCreationFailed
				| FaultKind::UnableToCreatePullPoint
				| FaultKind::UnacceptableInitialTerminationTime { .. }
				| FaultKind::UnacceptableTerminationTime { .. }
				| FaultKind::NoCurrentMessageOnTopic { .. }
		)
	}
	/// The acceptable termination time range, for time-bound faults
	pub fn acceptable_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
		match self.kind {
			FaultKind::UnacceptableInitialTerminationTime { minimum, maximum }
			| FaultKind::UnacceptableTerminationTime { minimum, maximum } => {
				Some((minimum, maximum))
			}
			_ => None,
		}
	}
}

impl fmt::Display for FaultCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.value)?;
		if let Some(subcode) = &self.subcode {
			write!(f, "/{subcode}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn code_chain_includes_subcode() {
		let fault = Fault::new(FaultKind::PauseFailed, "subscription is gone")
			.with_subcode("wsrf-r:ResourceUnknownFault");

		assert_eq!(
			fault.code().to_string(),
			"env:Sender/wsnt:PauseFailedFault/wsrf-r:ResourceUnknownFault"
		);
	}

	#[test]
	fn receiver_faults() {
		let fault = Fault::new(FaultKind::UnableToCreatePullPoint, "too many pull points");

		assert_eq!(
			fault.code().to_string(),
			"env:Receiver/wsnt:UnableToCreatePullPointFault"
		);
		assert!(fault.is_retryable());
	}

	#[test]
	fn time_faults_carry_range_over_json() {
		let minimum = DateTime::from_timestamp(1_000, 0).unwrap();
		let maximum = DateTime::from_timestamp(2_000, 0).unwrap();
		let fault = Fault::new(
			FaultKind::UnacceptableInitialTerminationTime { minimum, maximum },
			"too far in the future",
		);

		let json = serde_json::to_value(&fault).unwrap();
		assert_eq!(json["code"], "UnacceptableInitialTerminationTime");

		let back: Fault = serde_json::from_value(json).unwrap();
		assert_eq!(back.acceptable_range(), Some((minimum, maximum)));
		assert!(back.is_retryable());
	}
}
