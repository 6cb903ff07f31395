//! Service layer for the automation pipeline.
//!
//! This module contains the business logic for:
//! - Target discovery (`TargetDiscovery`)
//! - Comment-form detection (`FormDetector`)
//! - Content generation (`ContentChain`)
//! - Comment submission (`CommentPoster`)
//! - Robots policy checks (`PolicyFilter`)
//! - Rendered fetches for JS-heavy pages (`RenderClient`)

mod content;
mod detection;
mod discovery;
mod poster;
mod render;
mod repair;
mod robots;

pub use content::{
    ContentChain, ContentProvider, ContentRequest, GeneratedContent, HttpProvider,
    TemplateProvider,
};
pub use detection::{FormDetector, classify_field};
pub use discovery::{DiscoveryOutcome, DiscoverySource, TargetDiscovery};
pub use poster::{CommentPoster, SubmissionOutcome, build_payload, content_excerpt};
pub use render::RenderClient;
pub use repair::repair_content;
pub use robots::{PolicyFilter, RobotsRules};
