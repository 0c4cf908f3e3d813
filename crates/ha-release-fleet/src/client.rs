//! The fleet client contract.
//!
//! A thin façade over the provider's group, instance and load balancer
//! services. Every method is a single provider call (or the smallest fixed
//! set of calls that answers the question). No retries and no business
//! logic live here; callers layer those on top.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::error::FleetResult;
use crate::types::{GroupDescription, GroupRef, HealthState, InstanceId, Member};

/// Read/act access to one provider account.
pub trait FleetClient: Send + Sync {
    /// Current members of the group, in the provider's listing order.
    ///
    /// Fails with `GroupNotFound` if the group does not exist.
    fn list_members(
        &self,
        group: &GroupRef,
    ) -> impl Future<Output = FleetResult<Vec<Member>>> + Send;

    /// Desired capacity, attached load balancers and health-check type.
    fn describe_group(
        &self,
        group: &GroupRef,
    ) -> impl Future<Output = FleetResult<GroupDescription>> + Send;

    /// Desired capacity of the group.
    fn desired_capacity(&self, group: &GroupRef) -> impl Future<Output = FleetResult<u32>> + Send {
        async move { Ok(self.describe_group(group).await?.desired_capacity) }
    }

    /// Health of each requested instance on one load balancer.
    ///
    /// Every requested ID appears in the result. Instances the load
    /// balancer does not know about are reported as `Unknown`.
    fn health_of(
        &self,
        load_balancer: &str,
        instance_ids: &[InstanceId],
    ) -> impl Future<Output = FleetResult<HashMap<InstanceId, HealthState>>> + Send;

    /// Set a tag on a member. Re-tagging with the same value is a no-op.
    fn tag(
        &self,
        member: &Member,
        key: &str,
        value: &str,
    ) -> impl Future<Output = FleetResult<()>> + Send;

    /// Terminate a member.
    ///
    /// Fails with `InstanceNotFound` if the instance is already gone.
    fn terminate(&self, member: &Member) -> impl Future<Output = FleetResult<()>> + Send;
}

impl<T: FleetClient> FleetClient for Arc<T> {
    fn list_members(
        &self,
        group: &GroupRef,
    ) -> impl Future<Output = FleetResult<Vec<Member>>> + Send {
        (**self).list_members(group)
    }

    fn describe_group(
        &self,
        group: &GroupRef,
    ) -> impl Future<Output = FleetResult<GroupDescription>> + Send {
        (**self).describe_group(group)
    }

    fn desired_capacity(&self, group: &GroupRef) -> impl Future<Output = FleetResult<u32>> + Send {
        (**self).desired_capacity(group)
    }

    fn health_of(
        &self,
        load_balancer: &str,
        instance_ids: &[InstanceId],
    ) -> impl Future<Output = FleetResult<HashMap<InstanceId, HealthState>>> + Send {
        (**self).health_of(load_balancer, instance_ids)
    }

    fn tag(
        &self,
        member: &Member,
        key: &str,
        value: &str,
    ) -> impl Future<Output = FleetResult<()>> + Send {
        (**self).tag(member, key, value)
    }

    fn terminate(&self, member: &Member) -> impl Future<Output = FleetResult<()>> + Send {
        (**self).terminate(member)
    }
}
