//! An event notification broker: push subscriptions, pull points and topic filters.
//!
//! # Guide
//!
//! - Create a [`Broker`] with [`Options`], the [`TopicSet`] of topics produced by the
//!   service and a [`Deliver`] implementation that pushes notifications to consumers.
//!   - An empty [`TopicSet`] accepts any valid topic expression.
//!   - Topics flagged as properties remember their last message,
//!     see [`Broker::get_current_message`] and [`Broker::set_synchronization_point`].
//! - Push consumers [`subscribe`][Broker::subscribe] with a [`Filter`][protocol::types::Filter]
//!   and a termination time. Each subscription gets its own delivery task, so a slow consumer
//!   never holds up the others.
//!   - Subscriptions can be [renewed][Broker::renew], [paused][Broker::pause],
//!     [resumed][Broker::resume] and [unsubscribed][Broker::unsubscribe].
//!   - A subscription expires as soon as its termination time passes. Messages published while
//!     it is paused are dropped, not buffered.
//! - Pull consumers [create a pull point][Broker::create_pull_point] and
//!   [get messages][Broker::get_messages] from it, optionally waiting for them.
//! - Producers [`publish`][Broker::publish] messages.
//! - Call [`Broker::sweep`] periodically to reclaim memory of subscriptions that expired
//!   without anyone touching them.
//!
//! Every error converts into a [`protocol::Fault`].
//!
//! # Backpressure
//!
//! Pull points hold at most [`Options::pull_point_queue_capacity`] messages. When full, either
//! the oldest or the new message is dropped, depending on [`Options::overflow_policy`].
//! Push subscriptions drop new messages when their delivery task falls
//! [`Options::delivery_channel_size`] messages behind.

mod broker;
mod clock;
mod delivery;
mod dispatcher;
/// Error types
pub mod error;
mod fault;
pub mod filter;
mod options;
mod pull_point;
mod subscription;
pub mod topic;
mod traits;

pub use broker::Broker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::PublishOutcome;
pub use fault::RESOURCE_UNKNOWN;
pub use options::{Options, OverflowPolicy};
pub use pull_point::PullPointRegistry;
pub use subscription::SubscriptionRegistry;
pub use topic::TopicSet;
pub use traits::Deliver;
