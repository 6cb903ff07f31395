//! Discovery stage: find and persist candidate targets for a campaign.

use crate::error::Result;
use crate::models::{Campaign, RunSettings};
use crate::pipeline::Services;
use crate::services::DiscoverySource;
use crate::store::Store;

/// Summary of one discovery stage run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryStats {
    /// Raw deduplicated URLs collected from the search surface
    pub urls_discovered: usize,

    /// Targets newly persisted this run
    pub valid_targets: usize,
}

/// Discover candidate pages for the campaign keyword and persist them.
///
/// Rediscovered targets are merged, not duplicated, and only newly
/// persisted targets count toward the campaign total.
pub async fn run_discovery(
    services: &Services,
    store: &dyn Store,
    campaign: &Campaign,
    settings: &RunSettings,
) -> Result<DiscoveryStats> {
    let max_targets = settings
        .max_targets
        .unwrap_or(services.config.discovery.max_results);

    log::info!(
        "Discovering up to {} targets for campaign {} (keyword '{}')",
        max_targets,
        campaign.id,
        campaign.keyword
    );

    let outcome = services
        .discovery
        .discover(&campaign.keyword, max_targets, &campaign.id)
        .await?;

    let mut stats = DiscoveryStats {
        urls_discovered: outcome.urls_discovered,
        valid_targets: 0,
    };

    for target in &outcome.targets {
        match store.upsert_target(target).await {
            Ok(true) => stats.valid_targets += 1,
            Ok(false) => log::debug!("Target {} rediscovered, merged", target.id),
            // A single persistence failure must not abort the run.
            Err(error) => log::warn!("Failed to persist target {}: {}", target.url, error),
        }
    }

    if stats.valid_targets > 0 {
        if let Some(mut campaign) = store.get_campaign(&campaign.id).await? {
            campaign.targets_found += stats.valid_targets as u64;
            campaign.updated_at = chrono::Utc::now();
            store.update_campaign(&campaign).await?;
        }
    }

    log::info!(
        "Discovery for {}: {} URLs seen, {} new targets",
        campaign.id,
        stats.urls_discovered,
        stats.valid_targets
    );
    Ok(stats)
}
