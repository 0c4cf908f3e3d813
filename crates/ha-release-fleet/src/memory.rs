//! In-memory fleet — a scriptable stand-in for a provider account.
//!
//! `MemoryFleet` models a single group behind one or more load balancers.
//! Instances can be given a warm-up (a number of health reads during which
//! they report `OutOfService`), the group can launch replacements when a
//! member is terminated, and transient failures can be queued per
//! operation. Every termination is recorded together with the in-service
//! count and desired capacity observed at that instant.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::client::FleetClient;
use crate::error::{FleetError, FleetResult};
use crate::types::{GroupDescription, GroupRef, HealthState, InstanceId, Member};

/// Operations of the fleet contract, for failure injection and call counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FleetOp {
    ListMembers,
    DescribeGroup,
    HealthOf,
    Tag,
    Terminate,
}

/// One terminate call that found its instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationRecord {
    pub instance_id: InstanceId,
    /// In-service count on the first load balancer just before the call.
    pub in_service: u32,
    pub desired: u32,
}

#[derive(Debug)]
struct MemInstance {
    id: InstanceId,
    tags: BTreeMap<String, String>,
    alive: bool,
    registered: bool,
    /// Health reads left before this instance reports `InService`.
    warmup: u32,
}

#[derive(Debug)]
struct MemState {
    group_name: String,
    group_exists: bool,
    desired: u32,
    load_balancers: Vec<String>,
    health_check_type: Option<String>,
    instances: Vec<MemInstance>,
    replacement_warmup: Option<u32>,
    launched: u32,
    failures: HashMap<FleetOp, VecDeque<FleetError>>,
    calls: HashMap<FleetOp, usize>,
    terminations: Vec<TerminationRecord>,
}

impl MemState {
    fn enter(&mut self, op: FleetOp) -> FleetResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!(?op, error = %err, "injected fleet failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn check_group(&self, group: &GroupRef) -> FleetResult<()> {
        if self.group_exists && group.name == self.group_name {
            Ok(())
        } else {
            Err(FleetError::GroupNotFound(group.name.clone()))
        }
    }

    fn in_service(&self) -> u32 {
        self.instances
            .iter()
            .filter(|i| i.alive && i.registered && i.warmup == 0)
            .count() as u32
    }

    fn instance_mut(&mut self, id: &str) -> Option<&mut MemInstance> {
        self.instances.iter_mut().find(|i| i.alive && i.id == id)
    }
}

/// A single-group fleet held in memory.
#[derive(Debug)]
pub struct MemoryFleet {
    state: Mutex<MemState>,
}

impl MemoryFleet {
    /// A group with the given desired capacity, one load balancer named
    /// `"{group}-lb"`, ELB health checks and no instances.
    pub fn new(group: &str, desired: u32) -> Self {
        Self {
            state: Mutex::new(MemState {
                group_name: group.to_string(),
                group_exists: true,
                desired,
                load_balancers: vec![format!("{group}-lb")],
                health_check_type: Some("ELB".to_string()),
                instances: Vec::new(),
                replacement_warmup: None,
                launched: 0,
                failures: HashMap::new(),
                calls: HashMap::new(),
                terminations: Vec::new(),
            }),
        }
    }

    /// A fleet whose group does not exist.
    pub fn missing(group: &str) -> Self {
        let fleet = Self::new(group, 0);
        fleet.lock().group_exists = false;
        fleet
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        // A panicking test thread must not hide the state from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an in-service instance registered with every load balancer.
    pub fn with_instance(self, id: &str) -> Self {
        self.with_warming_instance(id, 0)
    }

    /// Add an instance that reports `OutOfService` for its first `warmup`
    /// health reads.
    pub fn with_warming_instance(self, id: &str, warmup: u32) -> Self {
        self.launch(id, warmup);
        self
    }

    /// Add an instance that already carries the given tag.
    pub fn with_tagged_instance(self, id: &str, key: &str, value: &str) -> Self {
        self.launch(id, 0);
        if let Some(inst) = self.lock().instance_mut(id) {
            inst.tags.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Add an instance that is a group member but not registered with
    /// any load balancer.
    pub fn with_unregistered_instance(self, id: &str) -> Self {
        self.launch(id, 0);
        if let Some(inst) = self.lock().instance_mut(id) {
            inst.registered = false;
        }
        self
    }

    /// Replace the attached load balancers.
    pub fn with_load_balancers(self, lbs: &[&str]) -> Self {
        self.lock().load_balancers = lbs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_health_check_type(self, kind: Option<&str>) -> Self {
        self.lock().health_check_type = kind.map(str::to_string);
        self
    }

    /// Launch a replacement (warming for `warmup` health reads) each time a
    /// member is terminated, the way an autoscaling group restores its
    /// desired capacity.
    pub fn with_auto_replace(self, warmup: u32) -> Self {
        self.lock().replacement_warmup = Some(warmup);
        self
    }

    /// Queue `count` copies of `err` for the next calls of `op`.
    pub fn inject_failures(&self, op: FleetOp, count: usize, err: FleetError) {
        let mut state = self.lock();
        let queue = state.failures.entry(op).or_default();
        queue.extend(std::iter::repeat_n(err, count));
    }

    fn launch(&self, id: &str, warmup: u32) {
        self.lock().instances.push(MemInstance {
            id: id.to_string(),
            tags: BTreeMap::new(),
            alive: true,
            registered: true,
            warmup,
        });
    }

    /// Remove an instance behind the controller's back.
    pub fn remove_externally(&self, id: &str) {
        if let Some(inst) = self.lock().instance_mut(id) {
            inst.alive = false;
        }
    }

    /// IDs of the live members, in launch order.
    pub fn member_ids(&self) -> Vec<InstanceId> {
        self.lock()
            .instances
            .iter()
            .filter(|i| i.alive)
            .map(|i| i.id.clone())
            .collect()
    }

    /// Tags of a live member.
    pub fn tags_of(&self, id: &str) -> Option<BTreeMap<String, String>> {
        self.lock().instance_mut(id).map(|i| i.tags.clone())
    }

    /// Successful terminations, in call order.
    pub fn terminations(&self) -> Vec<TerminationRecord> {
        self.lock().terminations.clone()
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn calls(&self, op: FleetOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }
}

impl FleetClient for MemoryFleet {
    async fn list_members(&self, group: &GroupRef) -> FleetResult<Vec<Member>> {
        let mut state = self.lock();
        state.enter(FleetOp::ListMembers)?;
        state.check_group(group)?;
        Ok(state
            .instances
            .iter()
            .filter(|i| i.alive)
            .map(|i| Member {
                instance_id: i.id.clone(),
                tags: i.tags.clone(),
            })
            .collect())
    }

    async fn describe_group(&self, group: &GroupRef) -> FleetResult<GroupDescription> {
        let mut state = self.lock();
        state.enter(FleetOp::DescribeGroup)?;
        state.check_group(group)?;
        Ok(GroupDescription {
            desired_capacity: state.desired,
            load_balancers: state.load_balancers.clone(),
            health_check_type: state.health_check_type.clone(),
        })
    }

    async fn health_of(
        &self,
        load_balancer: &str,
        instance_ids: &[InstanceId],
    ) -> FleetResult<HashMap<InstanceId, HealthState>> {
        let mut state = self.lock();
        state.enter(FleetOp::HealthOf)?;
        if !state.load_balancers.iter().any(|lb| lb == load_balancer) {
            return Err(FleetError::Provider(format!(
                "load balancer not found: {load_balancer}"
            )));
        }

        let mut health = HashMap::with_capacity(instance_ids.len());
        for id in instance_ids {
            let verdict = match state.instance_mut(id) {
                Some(inst) if inst.registered && inst.warmup > 0 => {
                    inst.warmup -= 1;
                    HealthState::OutOfService
                }
                Some(inst) if inst.registered => HealthState::InService,
                _ => HealthState::Unknown,
            };
            health.insert(id.clone(), verdict);
        }
        Ok(health)
    }

    async fn tag(&self, member: &Member, key: &str, value: &str) -> FleetResult<()> {
        let mut state = self.lock();
        state.enter(FleetOp::Tag)?;
        let inst = state
            .instance_mut(&member.instance_id)
            .ok_or_else(|| FleetError::InstanceNotFound(member.instance_id.clone()))?;
        inst.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn terminate(&self, member: &Member) -> FleetResult<()> {
        let mut state = self.lock();
        state.enter(FleetOp::Terminate)?;

        let in_service = state.in_service();
        let desired = state.desired;
        let inst = state
            .instance_mut(&member.instance_id)
            .ok_or_else(|| FleetError::InstanceNotFound(member.instance_id.clone()))?;
        inst.alive = false;

        state.terminations.push(TerminationRecord {
            instance_id: member.instance_id.clone(),
            in_service,
            desired,
        });

        if let Some(warmup) = state.replacement_warmup {
            state.launched += 1;
            let id = format!("i-replacement-{}", state.launched);
            debug!(%id, warmup, "launching replacement instance");
            state.instances.push(MemInstance {
                id,
                tags: BTreeMap::new(),
                alive: true,
                registered: true,
                warmup,
            });
        }
        Ok(())
    }
}
