//! Release controller — drives the replacement state machine.
//!
//! A run marks every current member for termination, rebuilds its
//! candidate set from the marks, then retires candidates one at a time.
//! Each termination waits until the group's in-service count has reached
//! its desired capacity, so a replacement must pass load balancer health
//! checks before the next old instance goes away.
//!
//! Per member: `Untouched → Marked → (waiting for capacity) → Terminating
//! → Terminated`. Only the mark is persisted; it is the recovery log for
//! an interrupted run.

use std::collections::VecDeque;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use ha_release_fleet::{FleetClient, FleetError, GroupRef, InstanceId, Member, TerminationMark};

use crate::config::ReleaseConfig;
use crate::error::{RolloutError, RolloutResult};
use crate::oracle::{CapacityOracle, CapacitySnapshot};
use crate::pacer::{Pacer, Wait};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Every candidate was retired.
    Completed,
    /// Shutdown was requested; `remaining` candidates keep their marks.
    Interrupted,
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub outcome: ReleaseOutcome,
    /// Terminated by this run, in order.
    pub terminated: Vec<InstanceId>,
    /// Candidates that were already gone when their turn came.
    pub already_gone: Vec<InstanceId>,
    /// Candidates left when the run stopped.
    pub remaining: Vec<InstanceId>,
    /// Capacity readings taken by the gate.
    pub capacity_checks: u32,
    /// Poll intervals spent waiting for capacity.
    pub capacity_waits: u32,
    /// Settle intervals between terminations.
    pub settle_waits: u32,
}

impl ReleaseReport {
    fn new() -> Self {
        Self {
            outcome: ReleaseOutcome::Completed,
            terminated: Vec::new(),
            already_gone: Vec::new(),
            remaining: Vec::new(),
            capacity_checks: 0,
            capacity_waits: 0,
            settle_waits: 0,
        }
    }

    fn interrupted(mut self, candidates: &VecDeque<Member>) -> Self {
        self.outcome = ReleaseOutcome::Interrupted;
        self.remaining = candidates.iter().map(|m| m.instance_id.clone()).collect();
        self
    }
}

/// Retires a group's members one at a time without dropping below
/// desired capacity.
pub struct ReleaseController<C> {
    group: GroupRef,
    oracle: CapacityOracle<C>,
    config: ReleaseConfig,
    pacer: Pacer,
}

impl<C: FleetClient> ReleaseController<C> {
    pub fn new(
        client: C,
        group: GroupRef,
        config: ReleaseConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let oracle = CapacityOracle::new(client, config.retry.clone());
        Self {
            group,
            oracle,
            config,
            pacer: Pacer::new(shutdown),
        }
    }

    /// Apply the termination mark to every current member.
    ///
    /// Members already marked are left alone, so re-running after a crash
    /// is safe. Returns the number of members newly marked.
    pub async fn mark_all(&self) -> RolloutResult<usize> {
        let members = self.oracle.members(&self.group).await?;
        let mut marked = 0;

        for member in &members {
            if member.is_marked() {
                debug!(instance = %member.instance_id, "already marked for termination");
                continue;
            }

            let tagged = self
                .oracle
                .retry_policy()
                .run("mark instance", || {
                    self.oracle
                        .client()
                        .tag(member, TerminationMark::KEY, TerminationMark::VALUE)
                })
                .await;

            match tagged {
                Ok(()) => {
                    info!(instance = %member.instance_id, "marked instance for termination");
                    marked += 1;
                }
                Err(RolloutError::Fleet {
                    source: FleetError::InstanceNotFound(_),
                    ..
                }) => {
                    warn!(instance = %member.instance_id, "instance left the group before it could be marked");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(marked)
    }

    /// Rebuild the candidate set from the marks on current members.
    ///
    /// Instances that were marked and have since left the group are not
    /// candidates; their work is already done.
    pub async fn recover_candidates(&self) -> RolloutResult<VecDeque<Member>> {
        let members = self.oracle.members(&self.group).await?;
        Ok(members.into_iter().filter(Member::is_marked).collect())
    }

    /// Run a full release: mark, recover, drain.
    pub async fn run(&mut self) -> RolloutResult<ReleaseReport> {
        self.preflight().await?;

        let marked = self.mark_all().await?;
        let candidates = self.recover_candidates().await?;
        info!(
            group = %self.group,
            marked,
            candidates = candidates.len(),
            "recovered candidate set"
        );

        self.drain(candidates).await
    }

    /// Retire `candidates` in order, gated on capacity.
    pub async fn drain(&mut self, mut candidates: VecDeque<Member>) -> RolloutResult<ReleaseReport> {
        let mut report = ReleaseReport::new();

        while !candidates.is_empty() {
            if self.pacer.is_cancelled() {
                return Ok(self.stop(report, &candidates));
            }

            if self.wait_for_capacity(&mut report).await? == Wait::Cancelled {
                return Ok(self.stop(report, &candidates));
            }

            let Some(member) = candidates.pop_front() else {
                break;
            };

            info!(instance = %member.instance_id, remaining = candidates.len(), "terminating instance");
            match self.oracle.client().terminate(&member).await {
                Ok(()) => report.terminated.push(member.instance_id),
                Err(FleetError::InstanceNotFound(_)) => {
                    warn!(instance = %member.instance_id, "instance already gone, treating as terminated");
                    report.already_gone.push(member.instance_id);
                }
                Err(source) => {
                    return Err(RolloutError::Fleet {
                        operation: "terminate instance",
                        source,
                    });
                }
            }

            if candidates.is_empty() {
                break;
            }
            if self.pacer.wait(self.config.settle_interval()).await == Wait::Cancelled {
                return Ok(self.stop(report, &candidates));
            }
            report.settle_waits += 1;
        }

        info!(
            group = %self.group,
            terminated = report.terminated.len(),
            already_gone = report.already_gone.len(),
            "release completed"
        );
        Ok(report)
    }

    /// Block until current capacity reaches desired capacity.
    async fn wait_for_capacity(&mut self, report: &mut ReleaseReport) -> RolloutResult<Wait> {
        let mut snapshot = self.check_capacity(report).await?;

        while !snapshot.is_satisfied() {
            info!(
                current = snapshot.current,
                desired = snapshot.desired,
                "waiting on capacity"
            );
            if self.pacer.wait(self.config.poll_interval()).await == Wait::Cancelled {
                return Ok(Wait::Cancelled);
            }
            report.capacity_waits += 1;
            snapshot = self.check_capacity(report).await?;
        }

        Ok(Wait::Elapsed)
    }

    async fn check_capacity(&self, report: &mut ReleaseReport) -> RolloutResult<CapacitySnapshot> {
        let snapshot = self.oracle.snapshot(&self.group).await?;
        report.capacity_checks += 1;
        info!(
            current = snapshot.current,
            desired = snapshot.desired,
            "capacity"
        );
        Ok(snapshot)
    }

    /// Log what the release is about to work against.
    async fn preflight(&self) -> RolloutResult<()> {
        let description = self.oracle.describe(&self.group).await?;
        info!(
            group = %self.group,
            desired = description.desired_capacity,
            load_balancers = ?description.load_balancers,
            "starting release"
        );

        if !description.uses_lb_health() {
            warn!(
                group = %self.group,
                health_check_type = description.health_check_type.as_deref().unwrap_or("none"),
                "group does not use load balancer health checks; replacements may be counted late"
            );
        }
        if description.load_balancers.is_empty() && description.desired_capacity > 0 {
            warn!(
                group = %self.group,
                "group has no load balancers; current capacity reads 0 and the gate cannot open"
            );
        }

        for lb in self.oracle.health_report(&self.group).await? {
            for (instance, state) in &lb.instances {
                info!(load_balancer = %lb.load_balancer, %instance, %state, "instance health");
            }
        }
        Ok(())
    }

    fn stop(&self, report: ReleaseReport, candidates: &VecDeque<Member>) -> ReleaseReport {
        warn!(
            group = %self.group,
            remaining = candidates.len(),
            "release interrupted; marked instances will be picked up by the next run"
        );
        report.interrupted(candidates)
    }
}
