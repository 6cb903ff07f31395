//! Persistence abstractions for campaigns, targets, form maps, jobs, and
//! posting results.
//!
//! Two backends exist: an in-memory store for tests and embedding, and a
//! JSON-file store for the CLI. Both share the same trait so the pipeline
//! never knows which one it runs against.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AutomationJob, Campaign, CrawlStatus, FormMap, PostingAccount, PostingResult, Target,
};

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Storage backend for all pipeline state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Allocate a sequential identifier with the given prefix, e.g.
    /// `job_000007`.
    async fn allocate_id(&self, prefix: &str) -> Result<String>;

    async fn create_campaign(&self, campaign: &Campaign) -> Result<()>;

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>>;

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()>;

    async fn list_campaigns(&self) -> Result<Vec<Campaign>>;

    /// Insert a target or merge it into an existing record with the same
    /// id. Merging accumulates discovery keywords and keeps the existing
    /// crawl status. Returns `true` when the target was new.
    async fn upsert_target(&self, target: &Target) -> Result<bool>;

    async fn targets_for_campaign(&self, campaign_id: &str) -> Result<Vec<Target>>;

    async fn set_target_status(&self, target_id: &str, status: CrawlStatus) -> Result<()>;

    async fn insert_form_map(&self, map: &FormMap) -> Result<()>;

    async fn form_maps_for_campaign(&self, campaign_id: &str) -> Result<Vec<FormMap>>;

    async fn create_job(&self, job: &AutomationJob) -> Result<()>;

    async fn update_job(&self, job: &AutomationJob) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Option<AutomationJob>>;

    /// Most recently created job for a campaign, if any.
    async fn latest_job(&self, campaign_id: &str) -> Result<Option<AutomationJob>>;

    async fn insert_posting_result(&self, result: &PostingResult) -> Result<()>;

    async fn posting_results(&self, campaign_id: &str) -> Result<Vec<PostingResult>>;

    async fn add_account(&self, account: &PostingAccount) -> Result<()>;

    async fn accounts(&self) -> Result<Vec<PostingAccount>>;
}

/// Merge a rediscovered target into its stored record.
///
/// Keywords accumulate, fresher page metadata wins, and the existing crawl
/// status survives so rediscovery never resets detection progress.
pub(crate) fn merge_target(existing: &mut Target, incoming: &Target) {
    for keyword in &incoming.discovered_by_keywords {
        existing.add_keyword(keyword);
    }
    if incoming.relevance > existing.relevance {
        existing.relevance = incoming.relevance;
    }
    if incoming.title.is_some() {
        existing.title = incoming.title.clone();
    }
    if incoming.description.is_some() {
        existing.description = incoming.description.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_target_accumulates_keywords_and_keeps_status() {
        let mut existing = Target::new("camp_1", "https://example.com/blog", "rust");
        existing.status = CrawlStatus::Checked;
        existing.relevance = 0.6;

        let mut incoming = Target::new("camp_1", "https://example.com/blog", "cargo");
        incoming.relevance = 0.4;
        incoming.title = Some("A post".into());

        merge_target(&mut existing, &incoming);
        assert_eq!(existing.discovered_by_keywords, vec!["rust", "cargo"]);
        assert_eq!(existing.status, CrawlStatus::Checked);
        assert_eq!(existing.relevance, 0.6);
        assert_eq!(existing.title.as_deref(), Some("A post"));
    }
}
