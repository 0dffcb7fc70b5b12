//! Audit events module
//!
//! Typed records of what a procedure did (requests, responses, failures,
//! extractions, injections, lifecycle), plus the sinks they are forwarded to.

mod sink;
mod types;

pub use sink::{EventSink, MemorySink, NullSink, TracingSink};
pub use types::{AbortReason, Event, EventKind, Events, Severity};
