//! Actor runtime that drains a kernel's job queue.
//!
//! The kernel is synchronous and knows nothing about execution. This crate
//! adds the worker layer on top of it with Ractor.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor that owns the worker pool
//! - `WorkerActor` - Polls the queue and runs the handler registered for a job's kind
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use actors::{JobHandlerRegistry, SupervisorArgs, WorkerConfig, job_handler, start_supervisor};
//! use kernel::Kernel;
//!
//! let kernel = Arc::new(Kernel::default());
//! let mut handlers = JobHandlerRegistry::new();
//! handlers.register(job_handler!("ingest", |job| Ok(job.payload)));
//!
//! let (supervisor, handle) =
//!     start_supervisor(SupervisorArgs::new(kernel, handlers, WorkerConfig::default())).await?;
//! ```

mod config;
mod handler;
mod messages;
mod supervisor;
mod worker_actor;

pub use config::WorkerConfig;
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, JobHandlerRegistry};
pub use messages::{ActorError, SupervisorMessage, WorkerMessage};
pub use supervisor::{Supervisor, SupervisorArgs, start_supervisor};
pub use worker_actor::{WorkerActor, WorkerArgs};

/// Job type handlers receive, re-exported for [`job_handler!`].
pub use kernel_core::Job;

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
