//! Wire types of the event service
//!
//! Shared between the server, the client and the `eventing` core.

use serde::{Serialize, de::DeserializeOwned};

pub mod fault;
/// Data model shared by all operations
pub mod types;
pub mod v1;

pub use fault::{Fault, FaultCode, FaultKind};

/// Base path all [`Request`] paths are relative to
pub const API_BASE_PATH: &str = "/events/v1";

pub trait Request: Serialize + DeserializeOwned {
	/// JSON payload if the request was successful (code 200)
	type Response: Serialize + DeserializeOwned;
	/// JSON payload of the request failed (status code - error)
	type Error: Serialize + DeserializeOwned;

	/// Request route path
	const PATH: &'static str;
}
