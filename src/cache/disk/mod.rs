//! Disk-based response caches
//!
//! Each named cache lives in its own directory so that deleting a cache at
//! version rollover is a single directory removal:
//!
//! ```text
//! <root>/locations-static-v1/entries/<sha256>.<generation>.data
//! <root>/locations-static-v1/entries/<sha256>.meta
//! ```
//!
//! Every file is written through a temp file and rename. The `.meta` file
//! names the body generation it belongs to and is written last, so readers
//! never observe a partially written or mixed entry.

pub use self::backend::DiskBackend;
pub use self::disk_cache::DiskCache;
pub use self::error::DiskCacheError;
pub use self::storage::DiskCacheStorage;
pub use self::tokio_backend::TokioFsBackend;

pub mod backend;
mod disk_cache;
mod error;
mod index;
mod storage;
pub mod tokio_backend;
mod types;
mod utils;
