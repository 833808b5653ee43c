// =============================================================================
// Push Module
// =============================================================================
//
// Outbound notification pipeline:
// - Gateway client (HTTP, per-token success/failure semantics)
// - Dispatcher (per-user grouping, bounded fan-out, aggregate outcomes)

pub mod client;
pub mod dispatcher;

pub use client::{PushClient, PushMessage, PushPriority};
pub use dispatcher::{dispatch_alerts, DispatchSummary};
