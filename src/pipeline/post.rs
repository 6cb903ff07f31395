//! Posting stage: generate content and submit it through vetted forms.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::Result;
use crate::models::{
    Campaign, FormMap, PostingAccount, PostingResult, PostingStatus, RunSettings,
};
use crate::pipeline::Services;
use crate::services::{ContentRequest, content_excerpt};
use crate::store::Store;

/// Summary of one posting stage run.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostingStats {
    pub posted: usize,
    pub failed: usize,
}

/// Submit comments through vetted form maps until the run cap or the
/// campaign's desired volume is reached.
///
/// Each target receives at most one successful post per campaign. Dry
/// runs exercise the full generation path but persist nothing.
pub async fn run_posting(
    services: &Services,
    store: &dyn Store,
    campaign: &Campaign,
    settings: &RunSettings,
) -> Result<PostingStats> {
    let run_cap = settings
        .max_posts
        .unwrap_or(services.config.posting.max_posts);
    let remaining = campaign
        .desired_posts
        .saturating_sub(campaign.links_posted as usize);
    let cap = run_cap.min(remaining);

    if cap == 0 {
        log::info!(
            "Campaign {} already reached its desired volume, nothing to post",
            campaign.id
        );
        return Ok(PostingStats::default());
    }

    let queue = posting_queue(store, campaign).await?;
    if queue.is_empty() {
        log::info!("No vetted forms available for campaign {}", campaign.id);
        return Ok(PostingStats::default());
    }

    let accounts = store.accounts().await?;
    let mut stats = PostingStats::default();

    for (i, map) in queue.iter().take(cap).enumerate() {
        let account = pick_account(&accounts);
        let request = ContentRequest {
            keyword: campaign.keyword.clone(),
            target_url: campaign.target_url.clone(),
            anchor_text: campaign.anchor_text.clone(),
            locale: None,
        };
        let content = services.content.generate(&request).await;
        log::debug!(
            "Generated {} words via '{}' for {}",
            content.word_count,
            content.provider,
            map.target_url
        );

        match services
            .poster
            .submit(map, &account, &content.html, settings.dry_run)
            .await
        {
            Ok(outcome) => {
                match outcome.status {
                    PostingStatus::Posted => stats.posted += 1,
                    PostingStatus::Failed => stats.failed += 1,
                }
                if !settings.dry_run {
                    let result = PostingResult {
                        id: store.allocate_id("pr").await?,
                        campaign_id: campaign.id.clone(),
                        target_url: map.target_url.clone(),
                        status: outcome.status,
                        live_url: outcome.live_url,
                        excerpt: content_excerpt(&content.html),
                        posted_at: Utc::now(),
                    };
                    store.insert_posting_result(&result).await?;
                }
            }
            Err(error) => {
                stats.failed += 1;
                log::warn!("Submission failed for {}: {}", map.target_url, error);
            }
        }

        if i + 1 < queue.len().min(cap) {
            let delay = inter_post_delay(services, settings);
            tokio::time::sleep(delay).await;
        }
    }

    if stats.posted > 0 && !settings.dry_run {
        if let Some(mut campaign) = store.get_campaign(&campaign.id).await? {
            campaign.links_posted += stats.posted as u64;
            campaign.updated_at = Utc::now();
            store.update_campaign(&campaign).await?;
        }
    }

    log::info!(
        "Posting for {}: {} posted, {} failed{}",
        campaign.id,
        stats.posted,
        stats.failed,
        if settings.dry_run { " (dry run)" } else { "" }
    );
    Ok(stats)
}

/// Vetted maps not yet successfully posted to, one per target URL.
async fn posting_queue(store: &dyn Store, campaign: &Campaign) -> Result<Vec<FormMap>> {
    let already_posted: Vec<String> = store
        .posting_results(&campaign.id)
        .await?
        .into_iter()
        .filter(|r| r.status == PostingStatus::Posted)
        .map(|r| r.target_url)
        .collect();

    let mut queue: Vec<FormMap> = store
        .form_maps_for_campaign(&campaign.id)
        .await?
        .into_iter()
        .filter(|m| m.is_vetted() && !already_posted.contains(&m.target_url))
        .collect();
    queue.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    // One map per target: after the confidence sort, the first seen wins.
    let mut seen = std::collections::HashSet::new();
    queue.retain(|m| seen.insert(m.target_url.clone()));
    Ok(queue)
}

/// Random configured account, or a built-in identity when none exist.
fn pick_account(accounts: &[PostingAccount]) -> PostingAccount {
    accounts
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| PostingAccount::new("acct_default", "Alex Morgan", "alex.morgan@example.net"))
}

/// Randomized delay between submissions.
fn inter_post_delay(services: &Services, settings: &RunSettings) -> Duration {
    if let Some(delay) = settings.rate_limit_delay {
        return Duration::from_millis(delay);
    }
    let min = services.config.posting.delay_min_ms;
    let max = services.config.posting.delay_max_ms;
    if min >= max {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{Config, FieldRole, FormField, FormStatus};
    use crate::store::MemoryStore;

    fn services() -> Services {
        Services::from_config(Arc::new(Config::default())).unwrap()
    }

    fn vetted_map(id: &str, target_url: &str, confidence: i32) -> FormMap {
        FormMap {
            id: id.into(),
            campaign_id: "camp_1".into(),
            target_id: "tgt_1".into(),
            target_url: target_url.into(),
            selector: "form#commentform".into(),
            action: format!("{target_url}/submit"),
            method: "post".into(),
            fields: vec![FormField {
                role: FieldRole::Comment,
                name: "comment".into(),
                value: None,
            }],
            submit_selector: "input[type=submit]".into(),
            confidence,
            status: FormStatus::Vetted,
            needs_human_review: false,
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_no_vetted_maps_completes_with_zero_counts() {
        let store = MemoryStore::new();
        let campaign = Campaign::new("camp_1", "https://example.com", "rust", "guide", 5);
        store.create_campaign(&campaign).await.unwrap();

        let stats = run_posting(&services(), &store, &campaign, &RunSettings::default())
            .await
            .unwrap();
        assert_eq!(stats.posted, 0);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_desired_volume_already_met_posts_nothing() {
        let store = MemoryStore::new();
        let mut campaign = Campaign::new("camp_1", "https://example.com", "rust", "guide", 3);
        campaign.links_posted = 3;
        store.create_campaign(&campaign).await.unwrap();
        store
            .insert_form_map(&vetted_map("fm_1", "https://blog.example.com/post", 30))
            .await
            .unwrap();

        let stats = run_posting(&services(), &store, &campaign, &RunSettings::default())
            .await
            .unwrap();
        assert_eq!(stats.posted, 0);
        assert_eq!(stats.failed, 0);
        assert!(store.posting_results("camp_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_prefers_higher_confidence_per_target() {
        let store = MemoryStore::new();
        let campaign = Campaign::new("camp_1", "https://example.com", "rust", "guide", 5);
        store.create_campaign(&campaign).await.unwrap();

        store
            .insert_form_map(&vetted_map("fm_a", "https://a.example.com/post", 20))
            .await
            .unwrap();
        store
            .insert_form_map(&vetted_map("fm_b", "https://a.example.com/post", 30))
            .await
            .unwrap();
        store
            .insert_form_map(&vetted_map("fm_c", "https://b.example.com/post", 25))
            .await
            .unwrap();

        let queue = posting_queue(&store, &campaign).await.unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].id, "fm_b");
        assert_eq!(queue[1].id, "fm_c");
    }

    #[tokio::test]
    async fn test_already_posted_targets_are_excluded() {
        let store = MemoryStore::new();
        let campaign = Campaign::new("camp_1", "https://example.com", "rust", "guide", 5);
        store.create_campaign(&campaign).await.unwrap();
        store
            .insert_form_map(&vetted_map("fm_a", "https://a.example.com/post", 30))
            .await
            .unwrap();
        store
            .insert_posting_result(&PostingResult {
                id: "pr_1".into(),
                campaign_id: "camp_1".into(),
                target_url: "https://a.example.com/post".into(),
                status: PostingStatus::Posted,
                live_url: None,
                excerpt: "hi".into(),
                posted_at: Utc::now(),
            })
            .await
            .unwrap();

        let queue = posting_queue(&store, &campaign).await.unwrap();
        assert!(queue.is_empty());
    }
}
