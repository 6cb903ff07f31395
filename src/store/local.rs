//! JSON-file store for CLI runs.
//!
//! Each collection lives in one JSON file under the root directory:
//!
//! ```text
//! {root}/
//! ├── campaigns.json
//! ├── targets.json
//! ├── form_maps.json
//! ├── jobs.json
//! ├── posting_results.json
//! ├── accounts.json
//! └── counters.json
//! ```
//!
//! Writes are atomic (temp file, then rename) so a crash mid-write never
//! leaves a truncated collection behind. A single internal lock serializes
//! read-modify-write cycles.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    AutomationJob, Campaign, CrawlStatus, FormMap, PostingAccount, PostingResult, Target,
};
use crate::store::{Store, merge_target};

const CAMPAIGNS: &str = "campaigns.json";
const TARGETS: &str = "targets.json";
const FORM_MAPS: &str = "form_maps.json";
const JOBS: &str = "jobs.json";
const POSTING_RESULTS: &str = "posting_results.json";
const ACCOUNTS: &str = "accounts.json";
const COUNTERS: &str = "counters.json";

/// Filesystem-backed store.
pub struct LocalStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    async fn write_bytes(&self, file: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(file);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut out = tokio::fs::File::create(&tmp).await?;
        out.write_all(bytes).await?;
        out.flush().await?;
        drop(out);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T> {
        match tokio::fs::read(self.path(file)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(file, &bytes).await
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn allocate_id(&self, prefix: &str) -> Result<String> {
        let _guard = self.lock.lock().await;
        let mut counters: HashMap<String, u64> = self.read_json(COUNTERS).await?;
        let counter = counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        let id = format!("{prefix}_{:06}", counter);
        self.write_json(COUNTERS, &counters).await?;
        Ok(id)
    }

    async fn create_campaign(&self, campaign: &Campaign) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut campaigns: Vec<Campaign> = self.read_json(CAMPAIGNS).await?;
        campaigns.retain(|c| c.id != campaign.id);
        campaigns.push(campaign.clone());
        self.write_json(CAMPAIGNS, &campaigns).await
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let campaigns: Vec<Campaign> = self.read_json(CAMPAIGNS).await?;
        Ok(campaigns.into_iter().find(|c| c.id == id))
    }

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut campaigns: Vec<Campaign> = self.read_json(CAMPAIGNS).await?;
        let Some(existing) = campaigns.iter_mut().find(|c| c.id == campaign.id) else {
            return Err(AppError::store(format!(
                "campaign {} does not exist",
                campaign.id
            )));
        };
        *existing = campaign.clone();
        self.write_json(CAMPAIGNS, &campaigns).await
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self.read_json(CAMPAIGNS).await?;
        campaigns.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(campaigns)
    }

    async fn upsert_target(&self, target: &Target) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut targets: Vec<Target> = self.read_json(TARGETS).await?;
        let inserted = match targets.iter_mut().find(|t| t.id == target.id) {
            Some(existing) => {
                merge_target(existing, target);
                false
            }
            None => {
                targets.push(target.clone());
                true
            }
        };
        self.write_json(TARGETS, &targets).await?;
        Ok(inserted)
    }

    async fn targets_for_campaign(&self, campaign_id: &str) -> Result<Vec<Target>> {
        let targets: Vec<Target> = self.read_json(TARGETS).await?;
        let mut targets: Vec<_> = targets
            .into_iter()
            .filter(|t| t.campaign_id == campaign_id)
            .collect();
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(targets)
    }

    async fn set_target_status(&self, target_id: &str, status: CrawlStatus) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut targets: Vec<Target> = self.read_json(TARGETS).await?;
        let Some(target) = targets.iter_mut().find(|t| t.id == target_id) else {
            return Err(AppError::store(format!("target {target_id} does not exist")));
        };
        target.status = status;
        self.write_json(TARGETS, &targets).await
    }

    async fn insert_form_map(&self, map: &FormMap) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut maps: Vec<FormMap> = self.read_json(FORM_MAPS).await?;
        maps.retain(|m| m.id != map.id);
        maps.push(map.clone());
        self.write_json(FORM_MAPS, &maps).await
    }

    async fn form_maps_for_campaign(&self, campaign_id: &str) -> Result<Vec<FormMap>> {
        let maps: Vec<FormMap> = self.read_json(FORM_MAPS).await?;
        Ok(maps
            .into_iter()
            .filter(|m| m.campaign_id == campaign_id)
            .collect())
    }

    async fn create_job(&self, job: &AutomationJob) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut jobs: Vec<AutomationJob> = self.read_json(JOBS).await?;
        jobs.push(job.clone());
        self.write_json(JOBS, &jobs).await
    }

    async fn update_job(&self, job: &AutomationJob) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut jobs: Vec<AutomationJob> = self.read_json(JOBS).await?;
        let Some(existing) = jobs.iter_mut().find(|j| j.id == job.id) else {
            return Err(AppError::store(format!("job {} does not exist", job.id)));
        };
        *existing = job.clone();
        self.write_json(JOBS, &jobs).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<AutomationJob>> {
        let jobs: Vec<AutomationJob> = self.read_json(JOBS).await?;
        Ok(jobs.into_iter().find(|j| j.id == id))
    }

    async fn latest_job(&self, campaign_id: &str) -> Result<Option<AutomationJob>> {
        let jobs: Vec<AutomationJob> = self.read_json(JOBS).await?;
        Ok(jobs
            .into_iter()
            .rev()
            .find(|j| j.campaign_id.as_deref() == Some(campaign_id)))
    }

    async fn insert_posting_result(&self, result: &PostingResult) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut results: Vec<PostingResult> = self.read_json(POSTING_RESULTS).await?;
        results.push(result.clone());
        self.write_json(POSTING_RESULTS, &results).await
    }

    async fn posting_results(&self, campaign_id: &str) -> Result<Vec<PostingResult>> {
        let results: Vec<PostingResult> = self.read_json(POSTING_RESULTS).await?;
        Ok(results
            .into_iter()
            .filter(|r| r.campaign_id == campaign_id)
            .collect())
    }

    async fn add_account(&self, account: &PostingAccount) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut accounts: Vec<PostingAccount> = self.read_json(ACCOUNTS).await?;
        accounts.retain(|a| a.id != account.id);
        accounts.push(account.clone());
        self.write_json(ACCOUNTS, &accounts).await
    }

    async fn accounts(&self) -> Result<Vec<PostingAccount>> {
        self.read_json(ACCOUNTS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobKind, PostingStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_campaign_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = LocalStore::new(tmp.path());
            let campaign =
                Campaign::new("camp_1", "https://example.com", "rust", "this guide", 5);
            store.create_campaign(&campaign).await.unwrap();
        }

        let store = LocalStore::new(tmp.path());
        let loaded = store.get_campaign("camp_1").await.unwrap().unwrap();
        assert_eq!(loaded.keyword, "rust");
    }

    #[tokio::test]
    async fn test_allocate_id_persists_counter() {
        let tmp = TempDir::new().unwrap();
        {
            let store = LocalStore::new(tmp.path());
            assert_eq!(store.allocate_id("job").await.unwrap(), "job_000001");
        }

        let store = LocalStore::new(tmp.path());
        assert_eq!(store.allocate_id("job").await.unwrap(), "job_000002");
    }

    #[tokio::test]
    async fn test_missing_collections_read_as_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        assert!(store.list_campaigns().await.unwrap().is_empty());
        assert!(store.accounts().await.unwrap().is_empty());
        assert!(store.latest_job("camp_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_target_merges_across_writes() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let target = Target::new("camp_1", "https://example.com/blog", "rust");
        assert!(store.upsert_target(&target).await.unwrap());
        let again = Target::new("camp_1", "https://example.com/blog", "cargo");
        assert!(!store.upsert_target(&again).await.unwrap());

        let targets = store.targets_for_campaign("camp_1").await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].discovered_by_keywords, vec!["rust", "cargo"]);
    }

    #[tokio::test]
    async fn test_job_update_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let mut job = AutomationJob::new("job_1", JobKind::Campaign, Some("camp_1".into()));
        store.create_job(&job).await.unwrap();

        job.start();
        job.set_progress(50);
        store.update_job(&job).await.unwrap();

        let loaded = store.get_job("job_1").await.unwrap().unwrap();
        assert_eq!(loaded.progress, 50);
    }

    #[tokio::test]
    async fn test_posting_results_filter_by_campaign() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        for (id, campaign_id) in [("pr_1", "camp_1"), ("pr_2", "camp_2")] {
            store
                .insert_posting_result(&PostingResult {
                    id: id.into(),
                    campaign_id: campaign_id.into(),
                    target_url: "https://example.com/post".into(),
                    status: PostingStatus::Posted,
                    live_url: None,
                    excerpt: "hello".into(),
                    posted_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let results = store.posting_results("camp_1").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "pr_1");
    }
}
