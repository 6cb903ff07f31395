//! Full campaign runs under one tracked job.

use crate::error::{AppError, Result};
use crate::models::{AutomationJob, Campaign, JobOutcome, RunSettings};
use crate::pipeline::{Services, run_detection, run_discovery, run_posting};
use crate::store::Store;

/// Run the full pipeline for a campaign, tracking progress on `job`.
///
/// The job moves to `Processing` immediately, hits coarse progress
/// checkpoints after each stage, and ends `Completed` with a summary or
/// `Failed` with the error message. A campaign with no targets or no
/// vetted forms completes normally with zero counts.
pub async fn run_campaign(
    services: &Services,
    store: &dyn Store,
    mut job: AutomationJob,
    settings: &RunSettings,
) -> Result<AutomationJob> {
    job.start();
    store.update_job(&job).await?;

    match run_stages(services, store, &mut job, settings).await {
        Ok(outcome) => {
            job.complete(outcome);
        }
        Err(error) => {
            log::error!("Campaign job {} failed: {}", job.id, error);
            job.fail(error.to_string());
        }
    }

    store.update_job(&job).await?;
    Ok(job)
}

async fn run_stages(
    services: &Services,
    store: &dyn Store,
    job: &mut AutomationJob,
    settings: &RunSettings,
) -> Result<JobOutcome> {
    let campaign = load_runnable_campaign(store, job).await?;

    let discovery = run_discovery(services, store, &campaign, settings).await?;
    job.set_progress(25);
    store.update_job(job).await?;

    let detection = run_detection(services, store, &campaign, settings).await?;
    job.set_progress(50);
    store.update_job(job).await?;

    let posting = if settings.auto_post {
        run_posting(services, store, &campaign, settings).await?
    } else {
        log::info!(
            "Auto-posting disabled for campaign {}, stopping after detection",
            campaign.id
        );
        Default::default()
    };

    Ok(JobOutcome::Campaign {
        targets_found: discovery.valid_targets,
        forms_detected: detection.forms_detected,
        comments_posted: posting.posted,
        comments_failed: posting.failed,
    })
}

/// The campaign referenced by the job, verified to exist and be enabled.
async fn load_runnable_campaign(
    store: &dyn Store,
    job: &AutomationJob,
) -> Result<Campaign> {
    let campaign_id = job
        .campaign_id
        .as_deref()
        .ok_or_else(|| AppError::validation("job has no campaign"))?;
    let campaign = store
        .get_campaign(campaign_id)
        .await?
        .ok_or_else(|| AppError::validation(format!("campaign {campaign_id} not found")))?;
    if !campaign.enabled {
        return Err(AppError::validation(format!(
            "campaign {campaign_id} is paused"
        )));
    }
    Ok(campaign)
}
