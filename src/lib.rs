// Offline agent library
//
// A local HTTP agent that keeps the saved-locations app usable offline:
// cache-backed fetch strategies, a durable photo-upload queue and
// background sync that replays queued uploads once the backend is back.

pub mod agent;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod notify;
pub mod queue;
pub mod response;
pub mod server;
pub mod sync;
