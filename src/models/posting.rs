//! Posting outcomes and reusable posting identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome status of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingStatus {
    Posted,
    Failed,
}

/// The recorded outcome of one submission attempt. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingResult {
    pub id: String,

    /// Owning campaign
    pub campaign_id: String,

    /// Page the submission was made against
    pub target_url: String,

    pub status: PostingStatus,

    /// Live URL of the resulting comment, when known
    #[serde(default)]
    pub live_url: Option<String>,

    /// Leading excerpt of the submitted content, tags stripped
    pub excerpt: String,

    pub posted_at: DateTime<Utc>,
}

/// A reusable identity used to diversify submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingAccount {
    pub id: String,

    /// Name submitted in the author field
    pub display_name: String,

    /// Address submitted in the email field
    pub email: String,

    /// Optional site submitted in the website field
    #[serde(default)]
    pub website: Option<String>,

    /// Optional cookie/session context sent with the submission
    #[serde(default)]
    pub cookie: Option<String>,
}

impl PostingAccount {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: email.into(),
            website: None,
            cookie: None,
        }
    }
}
