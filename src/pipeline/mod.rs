//! Pipeline stages and the campaign orchestrator.
//!
//! - `run_discovery`: find candidate pages for a campaign keyword
//! - `run_detection`: score comment forms on pending targets
//! - `run_posting`: generate content and submit through vetted forms
//! - `run_campaign`: the three stages end to end under one tracked job

mod detect;
mod discover;
mod orchestrator;
mod post;

use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::services::{
    CommentPoster, ContentChain, DiscoverySource, FormDetector, PolicyFilter, RenderClient,
    TargetDiscovery,
};
use crate::utils::http::create_client;

pub use detect::{DetectionStats, run_detection};
pub use discover::{DiscoveryStats, run_discovery};
pub use orchestrator::run_campaign;
pub use post::{PostingStats, run_posting};

/// The service bundle shared by every pipeline stage.
pub struct Services {
    pub config: Arc<Config>,
    pub discovery: Box<dyn DiscoverySource>,
    pub detector: FormDetector,
    pub content: ContentChain,
    pub poster: CommentPoster,
    pub policy: PolicyFilter,
}

impl Services {
    /// Wire up all services from configuration with a shared HTTP client.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let client = create_client(&config.http)?;
        let render = RenderClient::from_config(&config.render, client.clone());

        Ok(Self {
            discovery: Box::new(TargetDiscovery::new(config.clone(), client.clone())),
            detector: FormDetector::new(config.clone(), client.clone(), render),
            content: ContentChain::from_config(&config.content, client.clone()),
            poster: CommentPoster::new(client.clone()),
            policy: PolicyFilter::new(client, config.http.user_agent.clone()),
            config,
        })
    }
}
