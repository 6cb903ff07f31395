//! Detection stage: score comment forms on pending targets.

use std::time::Duration;

use crate::error::Result;
use crate::models::{Campaign, CrawlStatus, RunSettings};
use crate::pipeline::Services;
use crate::store::Store;

/// Summary of one detection stage run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetectionStats {
    pub targets_checked: usize,
    pub forms_detected: usize,
    pub targets_failed: usize,

    /// Targets skipped by robots policy
    pub targets_skipped: usize,
}

/// Run form detection over every pending target of a campaign.
///
/// Only the highest-confidence form per target is persisted. A failed
/// fetch marks the target errored and the run continues.
pub async fn run_detection(
    services: &Services,
    store: &dyn Store,
    campaign: &Campaign,
    settings: &RunSettings,
) -> Result<DetectionStats> {
    let threshold = settings
        .min_confidence_score
        .unwrap_or(services.config.detection.auto_post_threshold);
    let delay = Duration::from_millis(
        settings
            .rate_limit_delay
            .unwrap_or(services.config.http.request_delay_ms),
    );

    let targets = store.targets_for_campaign(&campaign.id).await?;
    let pending: Vec<_> = targets
        .into_iter()
        .filter(|t| t.status == CrawlStatus::Pending)
        .collect();

    log::info!(
        "Detecting forms on {} pending targets for campaign {}",
        pending.len(),
        campaign.id
    );

    let mut stats = DetectionStats::default();
    let total = pending.len();

    for (i, target) in pending.iter().enumerate() {
        // A robots skip is not a check: the target stays pending so a later
        // run with a friendlier policy can pick it up.
        if settings.respect_robots_txt && !services.policy.allows(&target.url).await {
            stats.targets_skipped += 1;
            continue;
        }

        match services
            .detector
            .detect(target, settings.enable_js_rendering, threshold)
            .await
        {
            Ok(maps) => {
                stats.targets_checked += 1;
                // Best map only; lower-confidence siblings add no value.
                if let Some(best) = maps.into_iter().next() {
                    match store.insert_form_map(&best).await {
                        Ok(()) => stats.forms_detected += 1,
                        Err(error) => {
                            log::warn!("Failed to persist form map {}: {}", best.id, error)
                        }
                    }
                }
                store.set_target_status(&target.id, CrawlStatus::Checked).await?;
            }
            Err(error) => {
                stats.targets_failed += 1;
                log::warn!("Detection failed for {}: {}", target.url, error);
                store.set_target_status(&target.id, CrawlStatus::Error).await?;
            }
        }

        if i + 1 < total {
            tokio::time::sleep(delay).await;
        }
    }

    log::info!(
        "Detection for {}: {} checked, {} forms, {} failed, {} skipped",
        campaign.id,
        stats.targets_checked,
        stats.forms_detected,
        stats.targets_failed,
        stats.targets_skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{Campaign, Config, Target};
    use crate::services::RobotsRules;
    use crate::store::MemoryStore;

    fn services() -> Services {
        Services::from_config(Arc::new(Config::default())).unwrap()
    }

    #[tokio::test]
    async fn test_no_pending_targets_completes_with_zero_counts() {
        let store = MemoryStore::new();
        let campaign = Campaign::new("camp_1", "https://example.com", "rust", "guide", 5);
        store.create_campaign(&campaign).await.unwrap();

        let mut checked = Target::new("camp_1", "https://blog.example.com/post", "rust");
        checked.status = CrawlStatus::Checked;
        store.upsert_target(&checked).await.unwrap();

        let stats = run_detection(&services(), &store, &campaign, &RunSettings::default())
            .await
            .unwrap();
        assert_eq!(stats.targets_checked, 0);
        assert_eq!(stats.forms_detected, 0);
        assert_eq!(stats.targets_failed, 0);
    }

    #[tokio::test]
    async fn test_robots_disallowed_target_stays_pending() {
        let store = MemoryStore::new();
        let campaign = Campaign::new("camp_1", "https://example.com", "rust", "guide", 5);
        store.create_campaign(&campaign).await.unwrap();

        let target = Target::new("camp_1", "https://blog.example.com/post", "rust");
        store.upsert_target(&target).await.unwrap();

        let services = services();
        services
            .policy
            .preload(
                "https://blog.example.com",
                RobotsRules::parse("User-agent: *\nDisallow: /\n", "PromoPilot"),
            )
            .await;

        let settings = RunSettings {
            respect_robots_txt: true,
            ..RunSettings::default()
        };
        let stats = run_detection(&services, &store, &campaign, &settings)
            .await
            .unwrap();
        assert_eq!(stats.targets_skipped, 1);
        assert_eq!(stats.targets_checked, 0);

        let stored = store
            .targets_for_campaign("camp_1")
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.id == target.id)
            .unwrap();
        assert_eq!(stored.status, CrawlStatus::Pending);
    }
}
