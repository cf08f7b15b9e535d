//! Maps every internal failure condition to exactly one [`Fault`]

use crate::error::{
	CreatePullPointError, CurrentMessageError, FilterError, GetMessagesError, PauseError,
	RenewError, ResumeError, SubscribeError,
};
use protocol::{Fault, FaultKind};

/// Subcode for operations on references that don't exist or were terminated/destroyed
pub const RESOURCE_UNKNOWN: &str = "wsrf-r:ResourceUnknownFault";

impl From<FilterError> for Fault {
	fn from(e: FilterError) -> Self {
		let reason = e.to_string();
		let kind = match e {
			FilterError::DialectUnknown(dialect) => {
				FaultKind::TopicExpressionDialectUnknown { dialect }
			}
			FilterError::InvalidTopicExpression { .. } => FaultKind::InvalidTopicExpression,
			FilterError::MultipleTopicsSpecified(_) => FaultKind::MultipleTopicsSpecified,
			FilterError::TopicNotSupported(_) => FaultKind::TopicNotSupported,
			FilterError::UnknownFilter(filter) => FaultKind::InvalidFilter {
				unknown_filters: vec![filter],
			},
			FilterError::InvalidProducerProperties { .. } => {
				FaultKind::InvalidProducerPropertiesExpression
			}
			FilterError::InvalidMessageContent { .. } => FaultKind::InvalidMessageContentExpression,
		};

		Fault::new(kind, reason)
	}
}

impl From<SubscribeError> for Fault {
	fn from(e: SubscribeError) -> Self {
		match e {
			SubscribeError::Filter(e) => e.into(),
			SubscribeError::TerminationTime(range) => Fault::new(
				FaultKind::UnacceptableInitialTerminationTime {
					minimum: range.minimum,
					maximum: range.maximum,
				},
				range.to_string(),
			),
			e @ (SubscribeError::LimitReached(_) | SubscribeError::UnsupportedConsumer(_)) => {
				Fault::new(FaultKind::SubscribeCreationFailed, e.to_string())
			}
		}
	}
}

impl From<RenewError> for Fault {
	fn from(e: RenewError) -> Self {
		match e {
			RenewError::UnknownSubscription(_) => {
				Fault::new(FaultKind::UnableToDestroySubscription, e.to_string())
					.with_subcode(RESOURCE_UNKNOWN)
			}
			RenewError::TerminationTime(range) => Fault::new(
				FaultKind::UnacceptableTerminationTime {
					minimum: range.minimum,
					maximum: range.maximum,
				},
				range.to_string(),
			),
		}
	}
}

impl From<PauseError> for Fault {
	fn from(e: PauseError) -> Self {
		let fault = Fault::new(FaultKind::PauseFailed, e.to_string());
		match e {
			PauseError::UnknownSubscription(_) => fault.with_subcode(RESOURCE_UNKNOWN),
			PauseError::AlreadyPaused(_) => fault,
		}
	}
}

impl From<ResumeError> for Fault {
	fn from(e: ResumeError) -> Self {
		let fault = Fault::new(FaultKind::ResumeFailed, e.to_string());
		match e {
			ResumeError::UnknownSubscription(_) => fault.with_subcode(RESOURCE_UNKNOWN),
			ResumeError::NotPaused(_) => fault,
		}
	}
}

impl From<CreatePullPointError> for Fault {
	fn from(e: CreatePullPointError) -> Self {
		match e {
			CreatePullPointError::Filter(e) => e.into(),
			CreatePullPointError::LimitReached(_) => {
				Fault::new(FaultKind::UnableToCreatePullPoint, e.to_string())
			}
		}
	}
}

impl From<GetMessagesError> for Fault {
	fn from(e: GetMessagesError) -> Self {
		let fault = Fault::new(FaultKind::UnableToGetMessages, e.to_string());
		match e {
			GetMessagesError::UnknownPullPoint(_) | GetMessagesError::Destroyed(_) => {
				fault.with_subcode(RESOURCE_UNKNOWN)
			}
			GetMessagesError::InvalidMaximum(_) => fault,
		}
	}
}

impl From<CurrentMessageError> for Fault {
	fn from(e: CurrentMessageError) -> Self {
		match e {
			CurrentMessageError::Topic(e) => e.into(),
			CurrentMessageError::NotConcrete(_) => {
				Fault::new(FaultKind::InvalidTopicExpression, e.to_string())
			}
			CurrentMessageError::NoCurrentMessage(topic) => Fault::new(
				FaultKind::NoCurrentMessageOnTopic {
					topic: topic.clone(),
				},
				format!("no current message on topic {topic:?}"),
			),
		}
	}
}
