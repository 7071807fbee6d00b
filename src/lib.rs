//! Shared Optimization-Study Storage Library
//!
//! This library crate defines the pieces that let many worker processes
//! share one logical study store through a single coordinator process. It
//! serves as the foundation for the coordinator binary (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of four loosely coupled subsystems:
//!
//! - **`storage`**: The backend layer. Defines the canonical operation set
//!   (`StorageBackend`) every backend implements and ships the default
//!   in-memory backend.
//! - **`wire`**: The codec. Hand-written, per-record conversions between
//!   domain records and transport-safe JSON trees, round-tripping exactly.
//! - **`coordinator`**: The authority. A registry mapping storage names to
//!   backend instances plus the HTTP handlers that dispatch every remote
//!   operation against the named backend.
//! - **`client`**: The proxy workers hold. Forwards every operation to the
//!   coordinator, in a blocking or non-blocking calling convention, and
//!   rehydrates from its name after crossing process boundaries.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod storage;
pub mod wire;
