//! Core domain types for the coordination kernel.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobState and Priority for scheduled work
//! - QueueMetrics for queue occupancy
//! - Session and Context for TTL-scoped agent context
//! - EventRecord and JobEvent for publish/subscribe notifications

mod events;
mod id;
mod job;
mod queue;
mod session;

pub use events::{DEFAULT_EMITTER, DEFAULT_OWNER, DeliveryFailure, EventRecord, JobEvent, topics};
pub use id::{JobId, SessionId, SubscriptionId};
pub use job::{Job, JobSpec, JobState, Priority};
pub use queue::QueueMetrics;
pub use session::{Context, Session};
