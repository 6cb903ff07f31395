//! In-memory store for tests and embedding.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{
    AutomationJob, Campaign, CrawlStatus, FormMap, PostingAccount, PostingResult, Target,
};
use crate::store::{Store, merge_target};

#[derive(Default)]
struct State {
    campaigns: HashMap<String, Campaign>,
    targets: HashMap<String, Target>,
    form_maps: Vec<FormMap>,
    jobs: Vec<AutomationJob>,
    posting_results: Vec<PostingResult>,
    accounts: Vec<PostingAccount>,
    counters: HashMap<String, u64>,
}

/// Store backed by process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().expect("store lock poisoned");
        f(&mut state)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn allocate_id(&self, prefix: &str) -> Result<String> {
        Ok(self.with_state(|state| {
            let counter = state.counters.entry(prefix.to_string()).or_insert(0);
            *counter += 1;
            format!("{prefix}_{:06}", counter)
        }))
    }

    async fn create_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.with_state(|state| {
            state
                .campaigns
                .insert(campaign.id.clone(), campaign.clone());
        });
        Ok(())
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self.with_state(|state| state.campaigns.get(id).cloned()))
    }

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.with_state(|state| {
            if !state.campaigns.contains_key(&campaign.id) {
                return Err(AppError::store(format!(
                    "campaign {} does not exist",
                    campaign.id
                )));
            }
            state
                .campaigns
                .insert(campaign.id.clone(), campaign.clone());
            Ok(())
        })
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        Ok(self.with_state(|state| {
            let mut campaigns: Vec<_> = state.campaigns.values().cloned().collect();
            campaigns.sort_by(|a, b| a.id.cmp(&b.id));
            campaigns
        }))
    }

    async fn upsert_target(&self, target: &Target) -> Result<bool> {
        Ok(self.with_state(|state| match state.targets.get_mut(&target.id) {
            Some(existing) => {
                merge_target(existing, target);
                false
            }
            None => {
                state.targets.insert(target.id.clone(), target.clone());
                true
            }
        }))
    }

    async fn targets_for_campaign(&self, campaign_id: &str) -> Result<Vec<Target>> {
        Ok(self.with_state(|state| {
            let mut targets: Vec<_> = state
                .targets
                .values()
                .filter(|t| t.campaign_id == campaign_id)
                .cloned()
                .collect();
            targets.sort_by(|a, b| a.id.cmp(&b.id));
            targets
        }))
    }

    async fn set_target_status(&self, target_id: &str, status: CrawlStatus) -> Result<()> {
        self.with_state(|state| match state.targets.get_mut(target_id) {
            Some(target) => {
                target.status = status;
                Ok(())
            }
            None => Err(AppError::store(format!("target {target_id} does not exist"))),
        })
    }

    async fn insert_form_map(&self, map: &FormMap) -> Result<()> {
        self.with_state(|state| {
            state.form_maps.retain(|m| m.id != map.id);
            state.form_maps.push(map.clone());
        });
        Ok(())
    }

    async fn form_maps_for_campaign(&self, campaign_id: &str) -> Result<Vec<FormMap>> {
        Ok(self.with_state(|state| {
            state
                .form_maps
                .iter()
                .filter(|m| m.campaign_id == campaign_id)
                .cloned()
                .collect()
        }))
    }

    async fn create_job(&self, job: &AutomationJob) -> Result<()> {
        self.with_state(|state| state.jobs.push(job.clone()));
        Ok(())
    }

    async fn update_job(&self, job: &AutomationJob) -> Result<()> {
        self.with_state(|state| {
            match state.jobs.iter_mut().find(|j| j.id == job.id) {
                Some(existing) => {
                    *existing = job.clone();
                    Ok(())
                }
                None => Err(AppError::store(format!("job {} does not exist", job.id))),
            }
        })
    }

    async fn get_job(&self, id: &str) -> Result<Option<AutomationJob>> {
        Ok(self.with_state(|state| state.jobs.iter().find(|j| j.id == id).cloned()))
    }

    async fn latest_job(&self, campaign_id: &str) -> Result<Option<AutomationJob>> {
        Ok(self.with_state(|state| {
            state
                .jobs
                .iter()
                .rev()
                .find(|j| j.campaign_id.as_deref() == Some(campaign_id))
                .cloned()
        }))
    }

    async fn insert_posting_result(&self, result: &PostingResult) -> Result<()> {
        self.with_state(|state| state.posting_results.push(result.clone()));
        Ok(())
    }

    async fn posting_results(&self, campaign_id: &str) -> Result<Vec<PostingResult>> {
        Ok(self.with_state(|state| {
            state
                .posting_results
                .iter()
                .filter(|r| r.campaign_id == campaign_id)
                .cloned()
                .collect()
        }))
    }

    async fn add_account(&self, account: &PostingAccount) -> Result<()> {
        self.with_state(|state| {
            state.accounts.retain(|a| a.id != account.id);
            state.accounts.push(account.clone());
        });
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<PostingAccount>> {
        Ok(self.with_state(|state| state.accounts.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobKind;

    #[tokio::test]
    async fn test_allocate_id_is_sequential_per_prefix() {
        let store = MemoryStore::new();
        assert_eq!(store.allocate_id("job").await.unwrap(), "job_000001");
        assert_eq!(store.allocate_id("job").await.unwrap(), "job_000002");
        assert_eq!(store.allocate_id("camp").await.unwrap(), "camp_000001");
    }

    #[tokio::test]
    async fn test_campaign_roundtrip_and_update() {
        let store = MemoryStore::new();
        let mut campaign = Campaign::new("camp_1", "https://example.com", "rust", "this guide", 5);
        store.create_campaign(&campaign).await.unwrap();

        campaign.links_posted = 2;
        store.update_campaign(&campaign).await.unwrap();

        let loaded = store.get_campaign("camp_1").await.unwrap().unwrap();
        assert_eq!(loaded.links_posted, 2);
    }

    #[tokio::test]
    async fn test_update_missing_campaign_fails() {
        let store = MemoryStore::new();
        let campaign = Campaign::new("ghost", "https://example.com", "k", "a", 1);
        assert!(store.update_campaign(&campaign).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_target_merges_on_rediscovery() {
        let store = MemoryStore::new();
        let target = Target::new("camp_1", "https://example.com/blog", "rust");
        assert!(store.upsert_target(&target).await.unwrap());

        let again = Target::new("camp_1", "https://example.com/blog", "cargo");
        assert!(!store.upsert_target(&again).await.unwrap());

        let targets = store.targets_for_campaign("camp_1").await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].discovered_by_keywords, vec!["rust", "cargo"]);
    }

    #[tokio::test]
    async fn test_latest_job_picks_most_recent() {
        let store = MemoryStore::new();
        let first = AutomationJob::new("job_1", JobKind::Discover, Some("camp_1".into()));
        let second = AutomationJob::new("job_2", JobKind::Post, Some("camp_1".into()));
        let other = AutomationJob::new("job_3", JobKind::Post, Some("camp_2".into()));
        store.create_job(&first).await.unwrap();
        store.create_job(&second).await.unwrap();
        store.create_job(&other).await.unwrap();

        let latest = store.latest_job("camp_1").await.unwrap().unwrap();
        assert_eq!(latest.id, "job_2");
    }
}
