//! End-to-end release scenarios against the in-memory fleet.
//!
//! All tests run on tokio's paused clock, so the 10s poll and settle
//! intervals cost nothing and elapsed time can be asserted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use ha_release_fleet::{FleetError, FleetOp, MemoryFleet, TerminationMark};
use ha_release_rollout::*;

fn group() -> ha_release_fleet::GroupRef {
    ha_release_fleet::GroupRef::new("web", "eu-west-1", "test")
}

fn controller(
    fleet: &Arc<MemoryFleet>,
    shutdown: watch::Receiver<bool>,
) -> ReleaseController<Arc<MemoryFleet>> {
    ReleaseController::new(fleet.clone(), group(), ReleaseConfig::default(), shutdown)
}

fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(elapsed >= expected, "elapsed {elapsed:?}, expected {expected:?}");
    assert!(
        elapsed < expected + Duration::from_secs(1),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn full_capacity_drains_in_listed_order() {
    let fleet = Arc::new(
        MemoryFleet::new("web", 3)
            .with_tagged_instance("i-1", TerminationMark::KEY, TerminationMark::VALUE)
            .with_tagged_instance("i-2", TerminationMark::KEY, TerminationMark::VALUE)
            .with_tagged_instance("i-3", TerminationMark::KEY, TerminationMark::VALUE)
            .with_auto_replace(0),
    );
    let (_tx, rx) = watch::channel(false);
    let start = Instant::now();

    let report = controller(&fleet, rx).run().await.unwrap();

    assert_eq!(report.outcome, ReleaseOutcome::Completed);
    assert_eq!(report.terminated, vec!["i-1", "i-2", "i-3"]);
    assert_eq!(report.capacity_checks, 3);
    assert_eq!(report.capacity_waits, 0);
    assert_eq!(report.settle_waits, 2);
    assert!(report.remaining.is_empty());
    // Two settle intervals between three terminations, none after the last.
    assert_elapsed(start, Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn gate_blocks_until_replacement_is_in_service() {
    // i-2 fails its first two health reads, so the group sits at 1 of 2.
    let fleet = Arc::new(
        MemoryFleet::new("web", 2)
            .with_instance("i-1")
            .with_warming_instance("i-2", 2)
            .with_auto_replace(0),
    );
    let (_tx, rx) = watch::channel(false);
    let mut ctl = controller(&fleet, rx);

    ctl.mark_all().await.unwrap();
    let candidates = ctl.recover_candidates().await.unwrap();
    let start = Instant::now();
    let report = ctl.drain(candidates).await.unwrap();

    assert_eq!(report.capacity_waits, 2);
    assert_eq!(report.terminated, vec!["i-1", "i-2"]);
    let first = &fleet.terminations()[0];
    assert_eq!((first.in_service, first.desired), (2, 2));
    // Two poll intervals before the first termination, one settle after it.
    assert_elapsed(start, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn empty_group_completes_immediately() {
    let fleet = Arc::new(MemoryFleet::new("web", 0));
    let (_tx, rx) = watch::channel(false);
    let start = Instant::now();

    let report = controller(&fleet, rx).run().await.unwrap();

    assert_eq!(report.outcome, ReleaseOutcome::Completed);
    assert!(report.terminated.is_empty());
    assert_eq!(report.capacity_checks, 0);
    assert_eq!(fleet.calls(FleetOp::Terminate), 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn zero_desired_never_blocks_the_gate() {
    let fleet = Arc::new(
        MemoryFleet::new("web", 0)
            .with_instance("i-1")
            .with_instance("i-2")
            .with_instance("i-3"),
    );
    let (_tx, rx) = watch::channel(false);

    let report = controller(&fleet, rx).run().await.unwrap();

    assert_eq!(report.terminated, vec!["i-1", "i-2", "i-3"]);
    assert_eq!(report.capacity_waits, 0);
    assert_eq!(report.settle_waits, 2);
    assert!(fleet.member_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn gate_holds_desired_capacity_at_every_termination() {
    let fleet = Arc::new(
        MemoryFleet::new("web", 3)
            .with_instance("i-1")
            .with_instance("i-2")
            .with_instance("i-3")
            .with_auto_replace(2),
    );
    let (_tx, rx) = watch::channel(false);

    let report = controller(&fleet, rx).run().await.unwrap();

    let terminations = fleet.terminations();
    assert_eq!(terminations.len(), 3);
    for record in &terminations {
        assert!(
            record.in_service >= record.desired,
            "{} terminated at {}/{}",
            record.instance_id,
            record.in_service,
            record.desired
        );
    }
    assert!(report.capacity_waits > 0);
    // Replacements are never candidates of the run that launched them.
    assert_eq!(
        fleet.member_ids(),
        vec!["i-replacement-1", "i-replacement-2", "i-replacement-3"]
    );
}

#[tokio::test(start_paused = true)]
async fn candidate_removed_externally_does_not_abort_run() {
    let fleet = Arc::new(
        MemoryFleet::new("web", 0)
            .with_instance("i-1")
            .with_instance("i-2")
            .with_instance("i-3"),
    );
    let (_tx, rx) = watch::channel(false);
    let mut ctl = controller(&fleet, rx);

    ctl.mark_all().await.unwrap();
    let candidates = ctl.recover_candidates().await.unwrap();
    fleet.remove_externally("i-2");

    let report = ctl.drain(candidates).await.unwrap();

    assert_eq!(report.outcome, ReleaseOutcome::Completed);
    assert_eq!(report.terminated, vec!["i-1", "i-3"]);
    assert_eq!(report.already_gone, vec!["i-2"]);
}

#[tokio::test(start_paused = true)]
async fn interrupted_run_resumes_from_marks() {
    let fleet = Arc::new(
        MemoryFleet::new("web", 3)
            .with_instance("i-1")
            .with_instance("i-2")
            .with_instance("i-3")
            .with_auto_replace(0),
    );
    let (tx, rx) = watch::channel(false);
    let mut first = controller(&fleet, rx);

    // The first termination happens at t=0; the signal lands during the
    // settle interval that follows it.
    let run = tokio::spawn(async move { first.run().await });
    tokio::time::sleep(Duration::from_secs(5)).await;
    tx.send(true).unwrap();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.outcome, ReleaseOutcome::Interrupted);
    assert_eq!(report.terminated, vec!["i-1"]);
    assert_eq!(report.remaining, vec!["i-2", "i-3"]);

    // A fresh controller knows nothing of the first run's memory.
    let (_tx, rx) = watch::channel(false);
    let second = controller(&fleet, rx);
    let recovered: Vec<_> = second
        .recover_candidates()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.instance_id)
        .collect();
    assert_eq!(recovered, report.remaining);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_capacity_wait_leaves_all_candidates() {
    let fleet = Arc::new(
        MemoryFleet::new("web", 2)
            .with_instance("i-1")
            .with_warming_instance("i-2", 100),
    );
    let (tx, rx) = watch::channel(false);
    let mut ctl = controller(&fleet, rx);

    let run = tokio::spawn(async move { ctl.run().await });
    tokio::time::sleep(Duration::from_secs(25)).await;
    tx.send(true).unwrap();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.outcome, ReleaseOutcome::Interrupted);
    assert!(report.terminated.is_empty());
    assert_eq!(report.remaining, vec!["i-1", "i-2"]);
    assert_eq!(fleet.calls(FleetOp::Terminate), 0);
}

#[tokio::test(start_paused = true)]
async fn group_without_lb_health_checks_still_releases() {
    let fleet = Arc::new(
        MemoryFleet::new("web", 0)
            .with_instance("i-1")
            .with_health_check_type(Some("EC2"))
            .with_load_balancers(&[]),
    );
    let (_tx, rx) = watch::channel(false);

    let report = controller(&fleet, rx).run().await.unwrap();

    assert_eq!(report.outcome, ReleaseOutcome::Completed);
    assert_eq!(report.terminated, vec!["i-1"]);
    assert_eq!(fleet.calls(FleetOp::HealthOf), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_group_is_fatal_before_marking() {
    let fleet = Arc::new(MemoryFleet::missing("web"));
    let (_tx, rx) = watch::channel(false);

    let err = controller(&fleet, rx).run().await.unwrap_err();

    assert_eq!(err.fleet_error(), &FleetError::GroupNotFound("web".into()));
    assert_eq!(fleet.calls(FleetOp::Tag), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_capacity_reads_are_fatal() {
    let fleet = Arc::new(MemoryFleet::new("web", 1).with_instance("i-1"));
    let (_tx, rx) = watch::channel(false);
    let config = ReleaseConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut ctl = ReleaseController::new(fleet.clone(), group(), config, rx);

    ctl.mark_all().await.unwrap();
    let candidates = ctl.recover_candidates().await.unwrap();
    fleet.inject_failures(
        FleetOp::DescribeGroup,
        3,
        FleetError::Provider("throttled".into()),
    );

    let err = ctl.drain(candidates).await.unwrap_err();

    assert!(matches!(
        err,
        RolloutError::RetriesExhausted { attempts: 3, .. }
    ));
    assert!(fleet.terminations().is_empty());
    // The mark survives as recovery state for the next run.
    assert!(fleet.tags_of("i-1").unwrap().contains_key(TerminationMark::KEY));
}
