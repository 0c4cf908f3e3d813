//! `FleetClient` over AWS Auto Scaling, EC2 and classic ELB.

use std::collections::HashMap;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_autoscaling::types::AutoScalingGroup;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::types::Tag;
use tracing::debug;

use ha_release_fleet::{
    FleetClient, FleetError, FleetResult, GroupDescription, GroupRef, HealthState, InstanceId,
    Member,
};

use crate::error::fleet_error;

/// One AWS account/region, reached through a named credentials profile.
#[derive(Debug, Clone)]
pub struct AwsFleet {
    autoscaling: aws_sdk_autoscaling::Client,
    ec2: aws_sdk_ec2::Client,
    elb: aws_sdk_elasticloadbalancing::Client,
}

impl AwsFleet {
    /// Resolve credentials for the group's profile and region.
    pub async fn connect(group: &GroupRef) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(group.region.clone()))
            .profile_name(&group.profile)
            .load()
            .await;
        debug!(region = %group.region, profile = %group.profile, "aws config loaded");
        Self::from_config(&config)
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            autoscaling: aws_sdk_autoscaling::Client::new(config),
            ec2: aws_sdk_ec2::Client::new(config),
            elb: aws_sdk_elasticloadbalancing::Client::new(config),
        }
    }

    async fn auto_scaling_group(&self, group: &GroupRef) -> FleetResult<AutoScalingGroup> {
        let output = self
            .autoscaling
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(&group.name)
            .send()
            .await
            .map_err(|e| fleet_error("DescribeAutoScalingGroups", None, e))?;

        output
            .auto_scaling_groups()
            .first()
            .cloned()
            .ok_or_else(|| FleetError::GroupNotFound(group.name.clone()))
    }
}

impl FleetClient for AwsFleet {
    async fn list_members(&self, group: &GroupRef) -> FleetResult<Vec<Member>> {
        let asg = self.auto_scaling_group(group).await?;
        let ids: Vec<InstanceId> = asg
            .instances()
            .iter()
            .filter_map(|i| i.instance_id().map(str::to_string))
            .collect();

        // An empty ID filter would describe every instance in the account.
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let output = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(ids.clone()))
            .send()
            .await
            .map_err(|e| fleet_error("DescribeInstances", None, e))?;

        let mut tags: HashMap<String, Vec<Tag>> = HashMap::new();
        for instance in output.reservations().iter().flat_map(|r| r.instances()) {
            if let Some(id) = instance.instance_id() {
                tags.insert(id.to_string(), instance.tags().to_vec());
            }
        }

        Ok(members_in_group_order(&ids, tags))
    }

    async fn describe_group(&self, group: &GroupRef) -> FleetResult<GroupDescription> {
        let asg = self.auto_scaling_group(group).await?;
        Ok(GroupDescription {
            desired_capacity: asg.desired_capacity().unwrap_or(0).max(0) as u32,
            load_balancers: asg.load_balancer_names().to_vec(),
            health_check_type: asg.health_check_type().map(str::to_string),
        })
    }

    async fn health_of(
        &self,
        load_balancer: &str,
        instance_ids: &[InstanceId],
    ) -> FleetResult<HashMap<InstanceId, HealthState>> {
        if instance_ids.is_empty() {
            return Ok(HashMap::new());
        }

        // Asking about an unregistered instance is an error on the ELB side,
        // so read every registered instance and project onto the request.
        let output = self
            .elb
            .describe_instance_health()
            .load_balancer_name(load_balancer)
            .send()
            .await
            .map_err(|e| fleet_error("DescribeInstanceHealth", None, e))?;

        let registered: HashMap<&str, HealthState> = output
            .instance_states()
            .iter()
            .filter_map(|s| {
                let id = s.instance_id()?;
                Some((id, HealthState::from_provider(s.state().unwrap_or_default())))
            })
            .collect();

        Ok(instance_ids
            .iter()
            .map(|id| {
                let state = registered
                    .get(id.as_str())
                    .copied()
                    .unwrap_or(HealthState::Unknown);
                (id.clone(), state)
            })
            .collect())
    }

    async fn tag(&self, member: &Member, key: &str, value: &str) -> FleetResult<()> {
        self.ec2
            .create_tags()
            .resources(&member.instance_id)
            .tags(Tag::builder().key(key).value(value).build())
            .send()
            .await
            .map_err(|e| fleet_error("CreateTags", Some(&member.instance_id), e))?;
        Ok(())
    }

    async fn terminate(&self, member: &Member) -> FleetResult<()> {
        self.ec2
            .terminate_instances()
            .instance_ids(&member.instance_id)
            .send()
            .await
            .map_err(|e| fleet_error("TerminateInstances", Some(&member.instance_id), e))?;
        Ok(())
    }
}

/// Members in Auto Scaling order, dropping instances EC2 no longer reports.
fn members_in_group_order(ids: &[InstanceId], mut tags: HashMap<String, Vec<Tag>>) -> Vec<Member> {
    ids.iter()
        .filter_map(|id| {
            let tags = tags.remove(id)?;
            let tags = tags
                .iter()
                .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
                .collect();
            Some(Member {
                instance_id: id.clone(),
                tags,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(key: &str, value: &str) -> Tag {
        Tag::builder().key(key).value(value).build()
    }

    #[test]
    fn members_follow_group_order_and_skip_vanished() {
        let ids = vec!["i-b".to_string(), "i-a".to_string(), "i-gone".to_string()];
        let mut tags = HashMap::new();
        tags.insert("i-a".to_string(), vec![tag("Name", "web")]);
        tags.insert(
            "i-b".to_string(),
            vec![tag("marked_for_termination", "true")],
        );

        let members = members_in_group_order(&ids, tags);

        let order: Vec<_> = members.iter().map(|m| m.instance_id.as_str()).collect();
        assert_eq!(order, vec!["i-b", "i-a"]);
        assert!(members[0].is_marked());
        assert_eq!(members[1].tag("Name"), Some("web"));
    }
}
