//! Automation job records and run settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of tracked execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Discover,
    Detect,
    Post,
    /// Full pipeline run over a campaign
    Campaign,
}

/// Lifecycle status of a job. Terminal states are `Completed` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Per-kind result summary carried by a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobOutcome {
    Discover {
        urls_discovered: usize,
        valid_targets: usize,
    },
    Detect {
        forms_detected: usize,
    },
    Post {
        posted: usize,
        failed: usize,
    },
    Campaign {
        targets_found: usize,
        forms_detected: usize,
        comments_posted: usize,
        comments_failed: usize,
    },
}

/// One tracked execution of a pipeline stage or full campaign run.
///
/// The single piece of mutable shared state polled by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationJob {
    pub id: String,

    /// Owning campaign, when the job runs in campaign context
    pub campaign_id: Option<String>,

    pub kind: JobKind,
    pub status: JobStatus,

    /// Coarse progress percentage, updated at pipeline checkpoints
    pub progress: u8,

    /// Summary written when the job completes
    #[serde(default)]
    pub outcome: Option<JobOutcome>,

    /// Error message written when the job fails
    #[serde(default)]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AutomationJob {
    /// Create a pending job.
    pub fn new(id: impl Into<String>, kind: JobKind, campaign_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            campaign_id,
            kind,
            status: JobStatus::Pending,
            progress: 0,
            outcome: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the job into `Processing`.
    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.touch();
    }

    /// Update the coarse progress percentage.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
        self.touch();
    }

    /// Finish the job with a result summary.
    pub fn complete(&mut self, outcome: JobOutcome) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.outcome = Some(outcome);
        self.touch();
    }

    /// Fail the job with a descriptive message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.touch();
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Caller-supplied options recognized by the pipeline actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RunSettings {
    /// Discovery cap; falls back to the configured default when unset
    pub max_targets: Option<usize>,

    /// Posting cap per run; falls back to the configured default when unset
    pub max_posts: Option<usize>,

    /// Whether posting proceeds without human review
    pub auto_post: bool,

    /// Simulate submission without an actual HTTP POST
    pub dry_run: bool,

    /// Check robots.txt before fetching targets
    pub respect_robots_txt: bool,

    /// Override for the inter-request delay, in milliseconds
    pub rate_limit_delay: Option<u64>,

    /// Override for the vetting promotion threshold
    pub min_confidence_score: Option<i32>,

    /// Fetch pages through the rendering service
    pub enable_js_rendering: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_targets: None,
            max_posts: None,
            auto_post: true,
            dry_run: false,
            respect_robots_txt: true,
            rate_limit_delay: None,
            min_confidence_score: None,
            enable_js_rendering: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let mut job = AutomationJob::new("job_1", JobKind::Campaign, Some("camp_1".into()));
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.is_terminal());

        job.start();
        assert_eq!(job.status, JobStatus::Processing);

        job.set_progress(25);
        assert_eq!(job.progress, 25);

        job.complete(JobOutcome::Campaign {
            targets_found: 3,
            forms_detected: 2,
            comments_posted: 1,
            comments_failed: 1,
        });
        assert!(job.is_terminal());
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_failed_job_keeps_message() {
        let mut job = AutomationJob::new("job_2", JobKind::Discover, None);
        job.start();
        job.fail("campaign not found");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("campaign not found"));
    }

    #[test]
    fn test_outcome_serializes_tagged_by_kind() {
        let outcome = JobOutcome::Post {
            posted: 2,
            failed: 1,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "post");
        assert_eq!(json["posted"], 2);
    }

    #[test]
    fn test_progress_is_capped() {
        let mut job = AutomationJob::new("job_3", JobKind::Detect, None);
        job.set_progress(150);
        assert_eq!(job.progress, 100);
    }
}
