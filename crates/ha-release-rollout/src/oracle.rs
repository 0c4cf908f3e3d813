//! Capacity oracle — how many members should serve, and how many do.
//!
//! Every answer is a fresh read from the fleet, wrapped in the retry
//! policy. Nothing is cached between calls.
//!
//! Current capacity counts `InService` members on the group's *first*
//! load balancer only. Groups with several load balancers are not fully
//! supported; the others are ignored.

use tracing::debug;

use ha_release_fleet::{
    FleetClient, FleetResult, GroupDescription, GroupRef, HealthState, InstanceId, Member,
};

use crate::error::RolloutResult;
use crate::retry::RetryPolicy;

/// One reading of both capacity numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacitySnapshot {
    pub desired: u32,
    pub current: u32,
}

impl CapacitySnapshot {
    /// Whether the group serves at least its desired capacity.
    pub fn is_satisfied(&self) -> bool {
        self.current >= self.desired
    }
}

/// Per-instance health on one load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerHealth {
    pub load_balancer: String,
    /// In member listing order.
    pub instances: Vec<(InstanceId, HealthState)>,
}

/// Derives desired and current capacity for a group.
pub struct CapacityOracle<C> {
    client: C,
    retry: RetryPolicy,
}

impl<C: FleetClient> CapacityOracle<C> {
    pub fn new(client: C, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// The underlying fleet client, for calls that must not be retried.
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Desired capacity of the group.
    pub async fn desired(&self, group: &GroupRef) -> RolloutResult<u32> {
        self.retry
            .run("read desired capacity", || self.client.desired_capacity(group))
            .await
    }

    /// Number of members `InService` on the group's first load balancer.
    ///
    /// Zero when the group has no load balancers or no members.
    pub async fn current(&self, group: &GroupRef) -> RolloutResult<u32> {
        self.retry
            .run("read current capacity", || self.read_current(group))
            .await
    }

    /// Fresh desired and current readings.
    pub async fn snapshot(&self, group: &GroupRef) -> RolloutResult<CapacitySnapshot> {
        let desired = self.desired(group).await?;
        let current = self.current(group).await?;
        Ok(CapacitySnapshot { desired, current })
    }

    /// Current members of the group.
    pub async fn members(&self, group: &GroupRef) -> RolloutResult<Vec<Member>> {
        self.retry
            .run("list group members", || self.client.list_members(group))
            .await
    }

    pub async fn describe(&self, group: &GroupRef) -> RolloutResult<GroupDescription> {
        self.retry
            .run("describe group", || self.client.describe_group(group))
            .await
    }

    /// Health of every member on every attached load balancer.
    pub async fn health_report(&self, group: &GroupRef) -> RolloutResult<Vec<LoadBalancerHealth>> {
        self.retry
            .run("read health report", || self.read_health_report(group))
            .await
    }

    async fn read_current(&self, group: &GroupRef) -> FleetResult<u32> {
        let description = self.client.describe_group(group).await?;
        let Some(first) = description.load_balancers.first() else {
            return Ok(0);
        };
        if description.load_balancers.len() > 1 {
            debug!(
                %group,
                counted = %first,
                ignored = description.load_balancers.len() - 1,
                "only the first load balancer is counted"
            );
        }

        let ids = member_ids(&self.client.list_members(group).await?);
        if ids.is_empty() {
            return Ok(0);
        }

        let health = self.client.health_of(first, &ids).await?;
        Ok(health.values().filter(|h| h.is_in_service()).count() as u32)
    }

    async fn read_health_report(&self, group: &GroupRef) -> FleetResult<Vec<LoadBalancerHealth>> {
        let description = self.client.describe_group(group).await?;
        let ids = member_ids(&self.client.list_members(group).await?);

        let mut report = Vec::with_capacity(description.load_balancers.len());
        for lb in &description.load_balancers {
            let health = if ids.is_empty() {
                Default::default()
            } else {
                self.client.health_of(lb, &ids).await?
            };
            let instances = ids
                .iter()
                .map(|id| {
                    let state = health.get(id).copied().unwrap_or(HealthState::Unknown);
                    (id.clone(), state)
                })
                .collect();
            report.push(LoadBalancerHealth {
                load_balancer: lb.clone(),
                instances,
            });
        }
        Ok(report)
    }
}

fn member_ids(members: &[Member]) -> Vec<InstanceId> {
    members.iter().map(|m| m.instance_id.clone()).collect()
}
