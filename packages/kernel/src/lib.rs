//! In-process coordination kernel.
//!
//! Three independent components, each an explicit instance with its own
//! configuration:
//!
//! - [`JobQueue`] - priority scheduler with lifecycle states and bounded retry
//! - [`EventBus`] - synchronous publish/subscribe with a bounded history
//! - [`SessionManager`] - TTL-scoped context store with lazy expiry
//!
//! [`Kernel`] composes them and publishes every job transition on the bus.
//!
//! # Usage
//!
//! ```
//! use kernel::{Kernel, KernelConfig};
//! use kernel_core::{JobSpec, Priority};
//! use serde_json::json;
//!
//! let kernel = Kernel::new(KernelConfig::default()).unwrap();
//! let session = kernel.sessions().create(None, None);
//! let job_id = kernel.enqueue(
//!     JobSpec::new("ingest", json!({ "session_id": session.to_string() }))
//!         .with_priority(Priority::High),
//! );
//!
//! let job = kernel.dequeue().unwrap();
//! assert_eq!(job.id, job_id);
//! kernel.complete(job.id, json!({ "rows": 12 }));
//! ```

mod config;
mod event_bus;
mod job_queue;
mod kernel;
mod session_manager;
mod sync;

pub use config::{BusConfig, ConfigError, KernelConfig, QueueConfig, SessionConfig};
pub use event_bus::{EventBus, HandlerResult};
pub use job_queue::{FailOutcome, JobQueue};
pub use kernel::{KERNEL_EMITTER, Kernel};
pub use session_manager::SessionManager;
