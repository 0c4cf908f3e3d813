//! ha-release-fleet — the provider-facing side of ha-release.
//!
//! Defines the narrow contract ha-release needs from a cloud provider:
//! list a group's members, read its desired capacity and load balancers,
//! read per-instance load balancer health, tag an instance, terminate an
//! instance. Backends implement [`FleetClient`]; this crate ships
//! [`MemoryFleet`], an in-memory backend used by the test suites.
//!
//! # Components
//!
//! - **`types`** — Group, member, health and termination-mark types
//! - **`client`** — The `FleetClient` trait
//! - **`memory`** — Scriptable in-memory fleet
//! - **`error`** — `FleetError` and its transient/fatal classification

pub mod client;
pub mod error;
pub mod memory;
pub mod types;

pub use client::FleetClient;
pub use error::{FleetError, FleetResult};
pub use memory::{FleetOp, MemoryFleet, TerminationRecord};
pub use types::*;
