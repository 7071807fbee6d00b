//! Coordinator Module
//!
//! The long-lived authority every worker talks to.
//!
//! ## Core Concepts
//! - **Registry**: `StorageRegistry` owns the name → backend map; at most one
//!   backend per name, created lazily by the registration protocol.
//! - **Dispatch**: one match arm per operation decodes arguments, invokes the
//!   named backend and encodes the result; backend errors pass through
//!   verbatim as typed conditions.
//! - **Serialization of effects**: the coordinator binary serves these
//!   handlers on a current-thread runtime, so no two operations against one
//!   name observably interleave.

pub mod handlers;
pub mod protocol;
pub mod registry;
