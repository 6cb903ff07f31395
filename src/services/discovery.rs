//! Target discovery service.
//!
//! Issues keyword-qualified queries against a search surface, extracts
//! outbound links from the results page, and filters them down to candidate
//! blog/article pages likely to carry a public comment form.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Target};
use crate::utils::http::fetch_text_with_timeout;
use crate::utils::url::{get_domain, is_http};

/// Summary of a discovery run.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Raw deduplicated URLs collected from the search surface
    pub urls_discovered: usize,

    /// Candidates that survived filtering and the pre-filter fetch
    pub targets: Vec<Target>,

    /// Queries that failed outright
    pub query_failures: usize,
}

/// A source of candidate targets for a keyword.
///
/// The pipeline only depends on this trait, so discovery can be swapped
/// out in tests and embeddings.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn discover(
        &self,
        keyword: &str,
        max_results: usize,
        campaign_id: &str,
    ) -> Result<DiscoveryOutcome>;
}

/// Service for discovering candidate pages by keyword.
pub struct TargetDiscovery {
    config: Arc<Config>,
    client: Client,
}

impl TargetDiscovery {
    pub fn new(config: Arc<Config>, client: Client) -> Self {
        Self { config, client }
    }

    /// Whether the pacing delay applies after processing item `index`.
    ///
    /// Every fetch is paced except the last, regardless of whether the
    /// item itself passed or failed.
    fn pause_between(index: usize, total: usize) -> bool {
        index + 1 < total
    }
}

#[async_trait]
impl DiscoverySource for TargetDiscovery {
    /// Discover up to `max_results` candidate targets for a keyword.
    ///
    /// A single query failure is logged and skipped; the run fails only when
    /// every query fails.
    async fn discover(
        &self,
        keyword: &str,
        max_results: usize,
        campaign_id: &str,
    ) -> Result<DiscoveryOutcome> {
        let queries = self.build_queries(keyword);
        let delay = Duration::from_millis(self.config.http.request_delay_ms);

        let mut outcome = DiscoveryOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut urls: Vec<String> = Vec::new();

        for (i, query) in queries.iter().enumerate() {
            match self.run_query(query).await {
                Ok(links) => {
                    for url in links {
                        if urls.len() >= max_results {
                            break;
                        }
                        if seen.insert(url.clone()) {
                            urls.push(url);
                        }
                    }
                }
                Err(error) => {
                    outcome.query_failures += 1;
                    log::warn!("Search query '{}' failed: {}", query, error);
                }
            }

            if urls.len() >= max_results {
                break;
            }
            // Artificial pause between queries to avoid anti-automation defenses.
            if Self::pause_between(i, queries.len()) {
                tokio::time::sleep(delay).await;
            }
        }

        if outcome.query_failures == queries.len() {
            return Err(AppError::discovery("all search queries failed"));
        }

        outcome.urls_discovered = urls.len();

        let total = urls.len();
        for (i, url) in urls.into_iter().enumerate() {
            let mut target = Target::new(campaign_id, url, keyword);
            target.relevance = self.relevance_of(&target.url, keyword);

            if self.config.discovery.precheck {
                let keep = self.precheck(&mut target).await;
                // Pace after every precheck fetch, pass or fail, so a run
                // of rejects still looks human.
                if Self::pause_between(i, total) {
                    tokio::time::sleep(delay).await;
                }
                if !keep {
                    continue;
                }
            }

            outcome.targets.push(target);
        }

        Ok(outcome)
    }
}

impl TargetDiscovery {
    /// Expand the configured query templates with the campaign keyword.
    fn build_queries(&self, keyword: &str) -> Vec<String> {
        self.config
            .discovery
            .query_templates
            .iter()
            .map(|template| template.replace("{keyword}", keyword))
            .collect()
    }

    /// Execute one search query with the shorter search timeout.
    async fn run_query(&self, query: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.config.discovery.search_endpoint)
            .query(&[("q", query)])
            .timeout(Duration::from_secs(self.config.http.search_timeout_secs))
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;
        Ok(self.extract_result_links(&html))
    }

    /// Pull outbound links from a results page, unwrapping redirect
    /// parameters and dropping everything that is not a candidate.
    fn extract_result_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let link_sel = Selector::parse("a[href]").expect("static selector");

        let mut links = Vec::new();
        for element in document.select(&link_sel) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(url) = self.unwrap_result_link(href) else {
                continue;
            };
            if self.is_candidate(&url) {
                links.push(url);
            }
        }
        links
    }

    /// Search surfaces wrap outbound links in a redirect with the real URL
    /// in a query parameter.
    fn unwrap_result_link(&self, href: &str) -> Option<String> {
        let absolute = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };
        let parsed = Url::parse(&absolute).ok()?;

        for (key, value) in parsed.query_pairs() {
            if key == "uddg" || key == "url" || key == "q" {
                if is_http(&value) {
                    return Some(value.to_string());
                }
            }
        }
        Some(parsed.to_string())
    }

    /// Candidate filter: http(s) only, no social-media domains, and at
    /// least one lexical signal of being a blog/article page.
    fn is_candidate(&self, url: &str) -> bool {
        if !is_http(url) {
            return false;
        }
        let Some(domain) = get_domain(url) else {
            return false;
        };
        if self
            .config
            .discovery
            .skip_domains
            .iter()
            .any(|skip| domain == *skip || domain.ends_with(&format!(".{skip}")))
        {
            return false;
        }

        let lower = url.to_lowercase();
        self.config
            .discovery
            .content_hints
            .iter()
            .any(|hint| lower.contains(hint.as_str()))
    }

    /// Lightweight relevance analysis from URL shape alone.
    fn relevance_of(&self, url: &str, keyword: &str) -> f32 {
        let lower = url.to_lowercase();
        let mut score: f32 = 0.3;

        let slug = keyword.to_lowercase().replace(' ', "-");
        if lower.contains(&slug) || lower.contains(&keyword.to_lowercase().replace(' ', "")) {
            score += 0.4;
        }

        let hints = self
            .config
            .discovery
            .content_hints
            .iter()
            .filter(|hint| lower.contains(hint.as_str()))
            .count();
        score += 0.1 * hints.min(3) as f32;

        score.min(1.0)
    }

    /// Cheap pre-filter fetch before the full detection pass: the page must
    /// hint at a comment form. Captures title and meta description while
    /// the page is in hand.
    async fn precheck(&self, target: &mut Target) -> bool {
        let html = match fetch_text_with_timeout(
            &self.client,
            &target.url,
            self.config.http.timeout_secs,
        )
        .await
        {
            Ok(text) => text,
            Err(error) => {
                log::debug!("Precheck fetch failed for {}: {}", target.url, error);
                return false;
            }
        };

        let lower = html.to_lowercase();
        if !lower.contains("<form") || !lower.contains("comment") {
            return false;
        }

        let (title, description) = extract_page_meta(&html);
        target.title = title;
        target.description = description;
        true
    }
}

/// Extract `<title>` and meta description from a page.
fn extract_page_meta(html: &str) -> (Option<String>, Option<String>) {
    let document = Html::parse_document(html);

    let title_sel = Selector::parse("title").expect("static selector");
    let title = document
        .select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let meta_sel = Selector::parse("meta[name=description]").expect("static selector");
    let description = document
        .select(&meta_sel)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    (title, description)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery() -> TargetDiscovery {
        TargetDiscovery::new(Arc::new(Config::default()), Client::new())
    }

    #[test]
    fn test_build_queries_expands_keyword() {
        let queries = discovery().build_queries("project management");
        assert!(!queries.is_empty());
        assert!(queries.iter().all(|q| q.contains("project management")));
        assert!(queries.iter().any(|q| q.contains("leave a comment")));
    }

    #[test]
    fn test_is_candidate_filters_social_and_schemes() {
        let d = discovery();
        assert!(d.is_candidate("https://example.com/blog/great-tools"));
        assert!(!d.is_candidate("https://facebook.com/blog/page"));
        assert!(!d.is_candidate("https://m.youtube.com/watch?v=1"));
        assert!(!d.is_candidate("ftp://example.com/blog"));
        // No lexical blog/article signal at all
        assert!(!d.is_candidate("https://example.com/"));
    }

    #[test]
    fn test_unwrap_redirect_link() {
        let d = discovery();
        let wrapped = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fblog%2Fpost";
        assert_eq!(
            d.unwrap_result_link(wrapped),
            Some("https://example.com/blog/post".to_string())
        );
    }

    #[test]
    fn test_extract_result_links_dedup_happens_upstream() {
        let d = discovery();
        let html = r#"
            <a href="https://example.com/blog/one">One</a>
            <a href="https://facebook.com/blog/x">Social</a>
            <a href="/relative">Relative</a>
            <a href="https://example.org/article/two">Two</a>
        "#;
        let links = d.extract_result_links(html);
        assert_eq!(
            links,
            vec![
                "https://example.com/blog/one".to_string(),
                "https://example.org/article/two".to_string(),
            ]
        );
    }

    #[test]
    fn test_pacing_applies_between_items_but_not_after_last() {
        // The delay slot does not depend on whether the item passed.
        assert!(TargetDiscovery::pause_between(0, 3));
        assert!(TargetDiscovery::pause_between(1, 3));
        assert!(!TargetDiscovery::pause_between(2, 3));
        assert!(!TargetDiscovery::pause_between(0, 1));
    }

    #[test]
    fn test_relevance_rewards_keyword_slug() {
        let d = discovery();
        let with_kw = d.relevance_of("https://example.com/blog/project-management-tips", "project management");
        let without = d.relevance_of("https://example.com/blog/something-else", "project management");
        assert!(with_kw > without);
        assert!(with_kw <= 1.0);
    }

    #[test]
    fn test_extract_page_meta() {
        let html = r#"<html><head><title> My Post </title>
            <meta name="description" content="A fine post"></head><body></body></html>"#;
        let (title, description) = extract_page_meta(html);
        assert_eq!(title.as_deref(), Some("My Post"));
        assert_eq!(description.as_deref(), Some("A fine post"));
    }
}
