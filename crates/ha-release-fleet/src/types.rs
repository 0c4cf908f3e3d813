//! Domain types shared by every fleet backend.
//!
//! A group is owned by the provider's autoscaling service; this crate only
//! reads it. The single piece of state ha-release writes is the
//! [`TerminationMark`] tag on a member instance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of a compute instance.
pub type InstanceId = String;

/// Identifier of a load balancer attached to a group.
pub type LoadBalancerId = String;

// ── Group ──────────────────────────────────────────────────────────

/// Identifies the fleet group a release runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub name: String,
    pub region: String,
    /// Credential profile used to reach the provider.
    pub profile: String,
}

impl GroupRef {
    pub fn new(name: &str, region: &str, profile: &str) -> Self {
        Self {
            name: name.to_string(),
            region: region.to_string(),
            profile: profile.to_string(),
        }
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.name)
    }
}

/// Point-in-time view of a group's scaling attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
    /// Target size set by the group's own scaling policy.
    pub desired_capacity: u32,
    /// Attached load balancers, in attachment order. May be empty.
    pub load_balancers: Vec<LoadBalancerId>,
    /// How the group decides instance health ("EC2", "ELB", ...).
    pub health_check_type: Option<String>,
}

impl GroupDescription {
    /// Whether the group replaces instances based on load balancer health.
    pub fn uses_lb_health(&self) -> bool {
        self.health_check_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("ELB"))
    }
}

// ── Member ─────────────────────────────────────────────────────────

/// One compute instance currently belonging to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub instance_id: InstanceId,
    pub tags: BTreeMap<String, String>,
}

impl Member {
    /// A member with no tags.
    pub fn new(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            tags: BTreeMap::new(),
        }
    }

    /// Builder-style tag insertion.
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether this member carries the termination mark.
    pub fn is_marked(&self) -> bool {
        self.tag(TerminationMark::KEY) == Some(TerminationMark::VALUE)
    }
}

/// The durable "selected for retirement" tag.
///
/// Never removed once written: a marked instance is expected to be
/// destroyed, and a restarted run rebuilds its worklist from this tag alone.
pub struct TerminationMark;

impl TerminationMark {
    pub const KEY: &'static str = "marked_for_termination";
    pub const VALUE: &'static str = "true";
}

// ── Health ─────────────────────────────────────────────────────────

/// A load balancer's verdict on one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthState {
    InService,
    OutOfService,
    /// Not registered with the load balancer, or a state we don't know.
    Unknown,
}

impl HealthState {
    /// Map a provider state string onto a health state.
    pub fn from_provider(state: &str) -> Self {
        match state {
            "InService" => HealthState::InService,
            "OutOfService" => HealthState::OutOfService,
            _ => HealthState::Unknown,
        }
    }

    pub fn is_in_service(self) -> bool {
        self == HealthState::InService
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::InService => "InService",
            HealthState::OutOfService => "OutOfService",
            HealthState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}
