//! `servitor`: a service runtime core (process-wide service registry,
//! session-carrying worker pools, coordinated multi-stage shutdown) and an
//! incremental HTTP/1.1 package parser.
//!
//! See `SPEC_FULL.md` and `DESIGN.md` at the repository root for the full
//! requirements this crate implements and the grounding for each piece.
//! The two load-bearing subsystems are [`service`]/[`registry`]/[`shutdown`]
//! (the service runtime) and [`http`] (the package parser); [`session`],
//! [`task`], and [`pool`] are the shared plumbing both sit on.

#[cfg(test)]
test_r::enable!();

pub mod config;
pub mod error;
pub mod http;
pub mod pool;
pub mod registry;
pub mod runtime;
pub mod service;
pub mod session;
pub mod shutdown;
pub mod task;
pub mod telemetry;

pub use error::{HttpError, RuntimeError};
pub use registry::ServiceRegistry;
pub use runtime::Runtime;
pub use service::{ConsumerHandle, LifecycleHooks, Service, ShutdownStage};
pub use session::SessionContext;
pub use shutdown::ShutdownCoordinator;
