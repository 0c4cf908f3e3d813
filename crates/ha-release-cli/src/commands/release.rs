//! `ha-release` — run a release against one autoscaling group.

use anyhow::{Context, bail};
use tokio::sync::watch;
use tracing::{info, warn};

use ha_release_aws::AwsFleet;
use ha_release_fleet::GroupRef;
use ha_release_rollout::{ReleaseConfig, ReleaseController, ReleaseOutcome};

pub async fn release(asg: &str, region: &str, profile: &str) -> anyhow::Result<()> {
    let group = GroupRef::new(asg, region, profile);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received, stopping after the current step");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "failed to install CTRL+C handler"),
        }
    });

    let fleet = AwsFleet::connect(&group).await;
    let mut controller =
        ReleaseController::new(fleet, group.clone(), ReleaseConfig::default(), shutdown_rx);

    let report = controller
        .run()
        .await
        .with_context(|| format!("release of {group} failed"))?;

    match report.outcome {
        ReleaseOutcome::Completed => {
            info!(
                terminated = report.terminated.len(),
                already_gone = report.already_gone.len(),
                "all marked instances retired"
            );
            Ok(())
        }
        ReleaseOutcome::Interrupted => bail!(
            "release of {group} interrupted; {} instance(s) still marked for termination, re-run to finish",
            report.remaining.len()
        ),
    }
}
