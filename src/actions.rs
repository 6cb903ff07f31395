//! Caller-facing actions over the pipeline.
//!
//! Every action checks the per-caller request quota, records an
//! `AutomationJob` for the work it performs, and returns a serializable
//! response. This is the surface the CLI (and any embedding server) talks
//! to; nothing below this layer knows about callers or quotas.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{
    AutomationJob, Campaign, CrawlStatus, FormMap, FormStatus, JobKind, JobOutcome,
    PostingResult, PostingStatus, RunSettings, Target,
};
use crate::pipeline::{Services, run_campaign, run_detection, run_discovery, run_posting};
use crate::rate_limit::RateLimiter;
use crate::store::Store;

/// The action facade.
pub struct Actions {
    services: Services,
    store: Arc<dyn Store>,
    limiter: RateLimiter,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub target_url: String,
    pub keyword: String,
    pub anchor_text: String,
    pub desired_posts: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub campaign_id: String,

    #[serde(default)]
    pub settings: RunSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: String,
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<JobOutcome>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResponse {
    fn from_job(job: &AutomationJob) -> Self {
        Self {
            job_id: job.id.clone(),
            status: status_label(job),
            outcome: job.outcome.clone(),
            error: job.error.clone(),
        }
    }
}

fn status_label(job: &AutomationJob) -> String {
    format!("{:?}", job.status).to_lowercase()
}

/// Discovery job result plus the campaign's accumulated targets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResponse {
    pub job_id: String,
    pub status: String,
    pub urls_discovered: usize,
    pub valid_targets: usize,
    pub targets: Vec<Target>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detection job result plus the campaign's accumulated form maps.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub job_id: String,
    pub status: String,
    pub forms_detected: usize,
    pub forms: Vec<FormMap>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Posting job result plus the per-attempt records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub job_id: String,
    pub status: String,
    pub posted: usize,
    pub failed: usize,
    pub details: Vec<PostingResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts over everything a campaign has stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    pub targets: usize,
    pub pending_targets: usize,
    pub forms_detected: usize,
    pub vetted_forms: usize,
    pub posted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub campaign: Campaign,
    pub stats: CampaignStats,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_job: Option<AutomationJob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub campaign_id: String,
    pub total_results: usize,
    pub successful_posts: usize,
    pub failed_posts: usize,

    /// Live URLs of successfully placed comments
    pub live_urls: Vec<String>,

    pub targets: Vec<Target>,
    pub form_maps: Vec<FormMap>,
    pub posting_results: Vec<PostingResult>,
}

impl Actions {
    pub fn new(services: Services, store: Arc<dyn Store>, limiter: RateLimiter) -> Self {
        Self {
            services,
            store,
            limiter,
        }
    }

    /// Create a new campaign.
    pub async fn create_campaign(
        &self,
        caller: &str,
        request: CreateCampaignRequest,
    ) -> Result<Campaign> {
        self.limiter.check_and_consume(caller)?;

        if !crate::utils::is_http(&request.target_url) {
            return Err(AppError::validation("targetUrl must be an http(s) URL"));
        }
        if request.keyword.trim().is_empty() {
            return Err(AppError::validation("keyword must not be empty"));
        }
        if request.anchor_text.trim().is_empty() {
            return Err(AppError::validation("anchorText must not be empty"));
        }
        if request.desired_posts == 0 {
            return Err(AppError::validation("desiredPosts must be > 0"));
        }

        let id = self.store.allocate_id("camp").await?;
        let campaign = Campaign::new(
            id,
            request.target_url,
            request.keyword,
            request.anchor_text,
            request.desired_posts,
        );
        self.store.create_campaign(&campaign).await?;
        log::info!("Created campaign {} for '{}'", campaign.id, campaign.keyword);
        Ok(campaign)
    }

    /// Run target discovery for a campaign.
    pub async fn discover(&self, caller: &str, request: RunRequest) -> Result<DiscoverResponse> {
        self.limiter.check_and_consume(caller)?;
        let campaign = self.runnable_campaign(&request.campaign_id).await?;
        let mut job = self.new_job(JobKind::Discover, &campaign.id).await?;

        let stage = run_discovery(&self.services, self.store.as_ref(), &campaign, &request.settings)
            .await;
        let (urls_discovered, valid_targets) = match &stage {
            Ok(stats) => {
                job.complete(JobOutcome::Discover {
                    urls_discovered: stats.urls_discovered,
                    valid_targets: stats.valid_targets,
                });
                (stats.urls_discovered, stats.valid_targets)
            }
            Err(error) => {
                job.fail(error.to_string());
                (0, 0)
            }
        };
        self.store.update_job(&job).await?;

        let targets = if stage.is_ok() {
            self.store.targets_for_campaign(&campaign.id).await?
        } else {
            Vec::new()
        };
        Ok(DiscoverResponse {
            job_id: job.id.clone(),
            status: status_label(&job),
            urls_discovered,
            valid_targets,
            targets,
            error: job.error,
        })
    }

    /// Run form detection for a campaign's pending targets.
    pub async fn detect_forms(&self, caller: &str, request: RunRequest) -> Result<DetectResponse> {
        self.limiter.check_and_consume(caller)?;
        let campaign = self.runnable_campaign(&request.campaign_id).await?;
        let mut job = self.new_job(JobKind::Detect, &campaign.id).await?;

        let stage = run_detection(&self.services, self.store.as_ref(), &campaign, &request.settings)
            .await;
        let forms_detected = match &stage {
            Ok(stats) => {
                job.complete(JobOutcome::Detect {
                    forms_detected: stats.forms_detected,
                });
                stats.forms_detected
            }
            Err(error) => {
                job.fail(error.to_string());
                0
            }
        };
        self.store.update_job(&job).await?;

        let forms = if stage.is_ok() {
            self.store.form_maps_for_campaign(&campaign.id).await?
        } else {
            Vec::new()
        };
        Ok(DetectResponse {
            job_id: job.id.clone(),
            status: status_label(&job),
            forms_detected,
            forms,
            error: job.error,
        })
    }

    /// Run the posting loop for a campaign.
    pub async fn post_comments(&self, caller: &str, request: RunRequest) -> Result<PostResponse> {
        self.limiter.check_and_consume(caller)?;
        let campaign = self.runnable_campaign(&request.campaign_id).await?;
        let mut job = self.new_job(JobKind::Post, &campaign.id).await?;

        let stage = run_posting(&self.services, self.store.as_ref(), &campaign, &request.settings)
            .await;
        let (posted, failed) = match &stage {
            Ok(stats) => {
                job.complete(JobOutcome::Post {
                    posted: stats.posted,
                    failed: stats.failed,
                });
                (stats.posted, stats.failed)
            }
            Err(error) => {
                job.fail(error.to_string());
                (0, 0)
            }
        };
        self.store.update_job(&job).await?;

        let details = if stage.is_ok() {
            self.store.posting_results(&campaign.id).await?
        } else {
            Vec::new()
        };
        Ok(PostResponse {
            job_id: job.id.clone(),
            status: status_label(&job),
            posted,
            failed,
            details,
            error: job.error,
        })
    }

    /// Run the full pipeline for a campaign under one job.
    pub async fn start_campaign(&self, caller: &str, request: RunRequest) -> Result<JobResponse> {
        self.limiter.check_and_consume(caller)?;
        let job_id = self.store.allocate_id("job").await?;
        let job = AutomationJob::new(job_id, JobKind::Campaign, Some(request.campaign_id.clone()));
        self.store.create_job(&job).await?;

        let job = run_campaign(&self.services, self.store.as_ref(), job, &request.settings).await?;
        Ok(JobResponse::from_job(&job))
    }

    /// Campaign record, aggregate counts, and the most recent job.
    pub async fn get_status(&self, caller: &str, campaign_id: &str) -> Result<StatusResponse> {
        self.limiter.check_and_consume(caller)?;
        let campaign = self.campaign(campaign_id).await?;
        let latest_job = self.store.latest_job(campaign_id).await?;

        let targets = self.store.targets_for_campaign(campaign_id).await?;
        let forms = self.store.form_maps_for_campaign(campaign_id).await?;
        let results = self.store.posting_results(campaign_id).await?;
        let stats = CampaignStats {
            targets: targets.len(),
            pending_targets: targets
                .iter()
                .filter(|t| t.status == CrawlStatus::Pending)
                .count(),
            forms_detected: forms.len(),
            vetted_forms: forms
                .iter()
                .filter(|f| f.status == FormStatus::Vetted)
                .count(),
            posted: results
                .iter()
                .filter(|r| r.status == PostingStatus::Posted)
                .count(),
            failed: results
                .iter()
                .filter(|r| r.status == PostingStatus::Failed)
                .count(),
        };

        Ok(StatusResponse {
            campaign,
            stats,
            latest_job,
        })
    }

    /// Everything a campaign has produced so far, with summary counts up
    /// front.
    pub async fn get_results(&self, caller: &str, campaign_id: &str) -> Result<ResultsResponse> {
        self.limiter.check_and_consume(caller)?;
        self.campaign(campaign_id).await?;

        let targets = self.store.targets_for_campaign(campaign_id).await?;
        let form_maps = self.store.form_maps_for_campaign(campaign_id).await?;
        let posting_results = self.store.posting_results(campaign_id).await?;

        let successful_posts = posting_results
            .iter()
            .filter(|r| r.status == PostingStatus::Posted)
            .count();
        let live_urls: Vec<String> = posting_results
            .iter()
            .filter(|r| r.status == PostingStatus::Posted)
            .filter_map(|r| r.live_url.clone())
            .collect();

        Ok(ResultsResponse {
            campaign_id: campaign_id.to_string(),
            total_results: posting_results.len(),
            successful_posts,
            failed_posts: posting_results.len() - successful_posts,
            live_urls,
            targets,
            form_maps,
            posting_results,
        })
    }

    async fn campaign(&self, id: &str) -> Result<Campaign> {
        self.store
            .get_campaign(id)
            .await?
            .ok_or_else(|| AppError::validation(format!("campaign {id} not found")))
    }

    async fn runnable_campaign(&self, id: &str) -> Result<Campaign> {
        let campaign = self.campaign(id).await?;
        if !campaign.enabled {
            return Err(AppError::validation(format!("campaign {id} is paused")));
        }
        Ok(campaign)
    }

    async fn new_job(&self, kind: JobKind, campaign_id: &str) -> Result<AutomationJob> {
        let id = self.store.allocate_id("job").await?;
        let mut job = AutomationJob::new(id, kind, Some(campaign_id.to_string()));
        self.store.create_job(&job).await?;
        job.start();
        self.store.update_job(&job).await?;
        Ok(job)
    }
}
