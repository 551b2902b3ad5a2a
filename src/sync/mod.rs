//! Background sync plumbing
//!
//! `SyncRegistry` holds the tags the agent asked to be woken for;
//! `ConnectivityMonitor` is the host loop that fires them when the backend
//! can be reached.

mod monitor;
mod registry;

pub use monitor::ConnectivityMonitor;
pub use registry::SyncRegistry;
