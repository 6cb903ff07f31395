//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client behavior settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Target discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Form detection thresholds and keyword tables
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Content generation chain settings
    #[serde(default)]
    pub content: ContentConfig,

    /// Posting loop settings
    #[serde(default)]
    pub posting: PostingConfig,

    /// Headless rendering service settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Per-identifier request quota settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.search_timeout_secs == 0 {
            return Err(AppError::validation("http.search_timeout_secs must be > 0"));
        }
        if self.discovery.max_results == 0 {
            return Err(AppError::validation("discovery.max_results must be > 0"));
        }
        if self.discovery.query_templates.is_empty() {
            return Err(AppError::validation("No discovery query templates defined"));
        }
        if self.detection.role_keywords.comment.is_empty() {
            return Err(AppError::validation(
                "detection.role_keywords.comment must not be empty",
            ));
        }
        if self.detection.min_confidence > self.detection.auto_post_threshold {
            return Err(AppError::validation(
                "detection.min_confidence must not exceed detection.auto_post_threshold",
            ));
        }
        if self.content.min_length == 0 {
            return Err(AppError::validation("content.min_length must be > 0"));
        }
        if self.posting.delay_min_ms > self.posting.delay_max_ms {
            return Err(AppError::validation(
                "posting.delay_min_ms must not exceed posting.delay_max_ms",
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(AppError::validation("rate_limit.window_secs must be > 0"));
        }
        if self.rate_limit.quota == 0 {
            return Err(AppError::validation("rate_limit.quota must be > 0"));
        }
        Ok(())
    }
}

/// HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Page fetch timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Shorter timeout for search queries
    #[serde(default = "defaults::search_timeout")]
    pub search_timeout_secs: u64,

    /// Delay between outbound requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            search_timeout_secs: defaults::search_timeout(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Target discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Search surface endpoint queried with `q={query}`
    #[serde(default = "defaults::search_endpoint")]
    pub search_endpoint: String,

    /// Default cap on discovered URLs per run
    #[serde(default = "defaults::max_results")]
    pub max_results: usize,

    /// Query templates; `{keyword}` is replaced with the campaign keyword
    #[serde(default = "defaults::query_templates")]
    pub query_templates: Vec<String>,

    /// Domains excluded from candidate URLs
    #[serde(default = "defaults::skip_domains")]
    pub skip_domains: Vec<String>,

    /// Lexical signals a candidate URL must carry to qualify as a blog/article
    #[serde(default = "defaults::content_hints")]
    pub content_hints: Vec<String>,

    /// Perform a cheap secondary fetch to confirm a comment form before persisting
    #[serde(default = "defaults::precheck")]
    pub precheck: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_endpoint: defaults::search_endpoint(),
            max_results: defaults::max_results(),
            query_templates: defaults::query_templates(),
            skip_domains: defaults::skip_domains(),
            content_hints: defaults::content_hints(),
            precheck: defaults::precheck(),
        }
    }
}

/// Form detection thresholds and keyword tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum confidence for a FormMap to be retained
    #[serde(default = "defaults::min_confidence")]
    pub min_confidence: i32,

    /// Confidence at or above which a FormMap is vetted for auto-posting
    #[serde(default = "defaults::auto_post_threshold")]
    pub auto_post_threshold: i32,

    /// Settle delay after rendered fetches, in milliseconds
    #[serde(default = "defaults::js_settle_ms")]
    pub js_settle_ms: u64,

    /// Field role keyword table
    #[serde(default)]
    pub role_keywords: RoleKeywords,

    /// Keywords identifying a submit control by its text or value
    #[serde(default = "defaults::submit_keywords")]
    pub submit_keywords: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: defaults::min_confidence(),
            auto_post_threshold: defaults::auto_post_threshold(),
            js_settle_ms: defaults::js_settle_ms(),
            role_keywords: RoleKeywords::default(),
            submit_keywords: defaults::submit_keywords(),
        }
    }
}

/// Keyword table mapping markup text to field roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleKeywords {
    #[serde(default = "defaults::comment_keywords")]
    pub comment: Vec<String>,

    #[serde(default = "defaults::email_keywords")]
    pub email: Vec<String>,

    #[serde(default = "defaults::name_keywords")]
    pub name: Vec<String>,

    #[serde(default = "defaults::website_keywords")]
    pub website: Vec<String>,
}

impl Default for RoleKeywords {
    fn default() -> Self {
        Self {
            comment: defaults::comment_keywords(),
            email: defaults::email_keywords(),
            name: defaults::name_keywords(),
            website: defaults::website_keywords(),
        }
    }
}

/// Content generation chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Minimum character length for provider output to count as success
    #[serde(default = "defaults::min_length")]
    pub min_length: usize,

    /// Default locale for the template generator
    #[serde(default = "defaults::locale")]
    pub locale: String,

    /// Generation providers, tried in listed order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_length: defaults::min_length(),
            locale: defaults::locale(),
            providers: Vec::new(),
        }
    }
}

/// One HTTP content provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider tag recorded on generated content
    pub name: String,

    /// Chat-completions endpoint URL
    pub endpoint: String,

    /// Model identifier sent to the endpoint
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,
}

/// Posting loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingConfig {
    /// Default cap on posts per run
    #[serde(default = "defaults::max_posts")]
    pub max_posts: usize,

    /// Lower bound of the randomized inter-post delay
    #[serde(default = "defaults::delay_min")]
    pub delay_min_ms: u64,

    /// Upper bound of the randomized inter-post delay
    #[serde(default = "defaults::delay_max")]
    pub delay_max_ms: u64,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            max_posts: defaults::max_posts(),
            delay_min_ms: defaults::delay_min(),
            delay_max_ms: defaults::delay_max(),
        }
    }
}

/// Headless rendering service settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenderConfig {
    /// Render service base URL; rendered fetches fail when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Optional access token appended to render requests
    #[serde(default)]
    pub token: Option<String>,
}

/// Per-identifier request quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds
    #[serde(default = "defaults::window_secs")]
    pub window_secs: u64,

    /// Requests allowed per identifier per window
    #[serde(default = "defaults::quota")]
    pub quota: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: defaults::window_secs(),
            quota: defaults::quota(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; PromoPilot/1.0)".into()
    }
    pub fn timeout() -> u64 {
        25
    }
    pub fn search_timeout() -> u64 {
        15
    }
    pub fn request_delay() -> u64 {
        1500
    }

    // Discovery defaults
    pub fn search_endpoint() -> String {
        "https://html.duckduckgo.com/html/".into()
    }
    pub fn max_results() -> usize {
        20
    }
    pub fn query_templates() -> Vec<String> {
        vec![
            "{keyword} \"leave a comment\"".into(),
            "{keyword} \"post a comment\" blog".into(),
            "{keyword} inurl:blog comments".into(),
            "{keyword} \"leave a reply\"".into(),
        ]
    }
    pub fn skip_domains() -> Vec<String> {
        vec![
            "facebook.com".into(),
            "twitter.com".into(),
            "x.com".into(),
            "instagram.com".into(),
            "youtube.com".into(),
            "linkedin.com".into(),
            "pinterest.com".into(),
            "tiktok.com".into(),
            "reddit.com".into(),
            "wikipedia.org".into(),
            "amazon.com".into(),
            "google.com".into(),
            "duckduckgo.com".into(),
            "bing.com".into(),
        ]
    }
    pub fn content_hints() -> Vec<String> {
        vec![
            "blog".into(),
            "article".into(),
            "post".into(),
            "news".into(),
            "forum".into(),
            "story".into(),
        ]
    }
    pub fn precheck() -> bool {
        true
    }

    // Detection defaults
    pub fn min_confidence() -> i32 {
        8
    }
    pub fn auto_post_threshold() -> i32 {
        12
    }
    pub fn js_settle_ms() -> u64 {
        2500
    }
    pub fn submit_keywords() -> Vec<String> {
        vec!["submit".into(), "post".into(), "comment".into()]
    }
    pub fn comment_keywords() -> Vec<String> {
        vec!["comment".into(), "message".into()]
    }
    pub fn email_keywords() -> Vec<String> {
        vec!["email".into()]
    }
    pub fn name_keywords() -> Vec<String> {
        vec!["name".into(), "author".into()]
    }
    pub fn website_keywords() -> Vec<String> {
        vec!["website".into(), "url".into()]
    }

    // Content defaults
    pub fn min_length() -> usize {
        500
    }
    pub fn locale() -> String {
        "en".into()
    }

    // Posting defaults
    pub fn max_posts() -> usize {
        10
    }
    pub fn delay_min() -> u64 {
        5_000
    }
    pub fn delay_max() -> u64 {
        10_000
    }

    // Rate limit defaults
    pub fn window_secs() -> u64 {
        60
    }
    pub fn quota() -> u32 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.detection.min_confidence = 20;
        config.detection.auto_post_threshold = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_posting_delays() {
        let mut config = Config::default();
        config.posting.delay_min_ms = 10_000;
        config.posting.delay_max_ms = 5_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_thresholds_match_product_defaults() {
        let config = Config::default();
        assert_eq!(config.detection.min_confidence, 8);
        assert_eq!(config.detection.auto_post_threshold, 12);
        assert_eq!(config.rate_limit.quota, 10);
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.detection.min_confidence, config.detection.min_confidence);
        assert_eq!(parsed.discovery.query_templates, config.discovery.query_templates);
    }
}
