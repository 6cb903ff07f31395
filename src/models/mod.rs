// src/models/mod.rs

//! Domain models for the automation pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod campaign;
mod config;
mod form_map;
mod job;
mod posting;

// Re-export all public types
pub use campaign::{Campaign, CrawlStatus, Target};
pub use config::{
    Config, ContentConfig, DetectionConfig, DiscoveryConfig, HttpConfig, PostingConfig,
    ProviderConfig, RateLimitConfig, RenderConfig, RoleKeywords,
};
pub use form_map::{FieldRole, FormField, FormMap, FormStatus};
pub use job::{AutomationJob, JobKind, JobOutcome, JobStatus, RunSettings};
pub use posting::{PostingAccount, PostingResult, PostingStatus};
