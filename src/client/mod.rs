//! Client Module
//!
//! The proxy workers hold. It satisfies the same operation contract as a
//! local backend, forwarding every call to the coordinator.
//!
//! ## Core Concepts
//! - **Dual calling convention**: [`StorageClient`] is the async core;
//!   [`BlockingStorageClient`] wraps it with one blocking entry point per
//!   operation for callers outside an event loop.
//! - **Rehydration**: a serialized proxy is just a [`StorageHandle`]
//!   (name + coordinator URL). Deserializing reconstructs a working proxy
//!   that lazily re-registers. Registration is idempotent, so copies sent
//!   to other processes all converge on the same named backend.

pub mod blocking;
pub mod proxy;

#[cfg(test)]
mod tests;

pub use blocking::BlockingStorageClient;
pub use proxy::{StorageClient, StorageHandle};
