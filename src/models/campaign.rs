//! Campaign and discovered-target data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::url::get_domain;

/// A user's automation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign unique identifier
    pub id: String,

    /// URL the generated backlinks point at
    pub target_url: String,

    /// Primary keyword driving discovery and content
    pub keyword: String,

    /// Visible text of the injected hyperlink
    pub anchor_text: String,

    /// Desired posting volume
    pub desired_posts: usize,

    /// Paused campaigns never start new jobs
    pub enabled: bool,

    /// Cumulative count of discovered targets
    pub targets_found: u64,

    /// Cumulative count of successful posts
    pub links_posted: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a new enabled campaign.
    pub fn new(
        id: impl Into<String>,
        target_url: impl Into<String>,
        keyword: impl Into<String>,
        anchor_text: impl Into<String>,
        desired_posts: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            target_url: target_url.into(),
            keyword: keyword.into(),
            anchor_text: anchor_text.into(),
            desired_posts,
            enabled: true,
            targets_found: 0,
            links_posted: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Crawl status of a discovered target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Pending,
    Checked,
    Error,
}

/// A discovered candidate page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Stable identifier derived from campaign id and URL
    pub id: String,

    /// Owning campaign
    pub campaign_id: String,

    /// Candidate page URL
    pub url: String,

    /// Domain derived from the URL
    pub domain: String,

    /// Keywords that surfaced this target, accumulated across discoveries
    pub discovered_by_keywords: Vec<String>,

    /// Crawl status
    pub status: CrawlStatus,

    /// Lightweight relevance score in [0, 1]
    pub relevance: f32,

    /// Page title captured during the pre-filter fetch
    #[serde(default)]
    pub title: Option<String>,

    /// Meta description captured during the pre-filter fetch
    #[serde(default)]
    pub description: Option<String>,

    pub discovered_at: DateTime<Utc>,
}

impl Target {
    /// Create a pending target discovered by the given keyword.
    pub fn new(campaign_id: impl Into<String>, url: impl Into<String>, keyword: &str) -> Self {
        let campaign_id = campaign_id.into();
        let url = url.into();
        Self {
            id: Self::derive_id(&campaign_id, &url),
            domain: get_domain(&url).unwrap_or_default(),
            campaign_id,
            url,
            discovered_by_keywords: vec![keyword.to_string()],
            status: CrawlStatus::Pending,
            relevance: 0.0,
            title: None,
            description: None,
            discovered_at: Utc::now(),
        }
    }

    /// Stable identifier: truncated hex sha256 of campaign id + URL.
    pub fn derive_id(campaign_id: &str, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(campaign_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        format!("tgt_{}", &hex::encode(digest)[..16])
    }

    /// Record an additional discovery keyword, deduplicating.
    pub fn add_keyword(&mut self, keyword: &str) {
        if !self.discovered_by_keywords.iter().any(|k| k == keyword) {
            self.discovered_by_keywords.push(keyword.to_string());
        }
    }
}
