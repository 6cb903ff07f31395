//! robots.txt fetching, parsing, and policy checks.
//!
//! A disallowed URL is a skip, never an error: the posting loop moves on to
//! the next target. Rules are cached per domain for the life of the run.
//! Unreachable or missing robots.txt means the site states no policy, so
//! fetches are allowed.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

use crate::utils::url::origin;

/// Parsed rules from one robots.txt, reduced to the groups that apply to us.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Path prefixes we may not fetch
    disallow: Vec<String>,

    /// Path prefixes explicitly allowed, taking precedence over disallow
    allow: Vec<String>,
}

impl RobotsRules {
    /// Parse robots.txt content, keeping the groups addressed to `*` or to
    /// a user-agent token our agent string contains.
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let agent_lower = user_agent.to_lowercase();

        let mut rules = Self::default();
        let mut group_applies = false;
        let mut in_agent_lines = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // A run of user-agent lines opens a fresh group.
                    if !in_agent_lines {
                        group_applies = false;
                        in_agent_lines = true;
                    }
                    let token = value.to_lowercase();
                    if token == "*" || agent_lower.contains(&token) {
                        group_applies = true;
                    }
                }
                "disallow" => {
                    in_agent_lines = false;
                    if group_applies && !value.is_empty() {
                        rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    in_agent_lines = false;
                    if group_applies && !value.is_empty() {
                        rules.allow.push(value.to_string());
                    }
                }
                _ => {
                    in_agent_lines = false;
                }
            }
        }
        rules
    }

    /// Whether a path may be fetched under these rules.
    pub fn allows(&self, path: &str) -> bool {
        if self.allow.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }
        !self.disallow.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Per-run robots policy gate with a per-domain rules cache.
pub struct PolicyFilter {
    client: Client,
    user_agent: String,
    cache: Mutex<HashMap<String, RobotsRules>>,
}

impl PolicyFilter {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the cache with rules for an origin, bypassing the fetch.
    pub async fn preload(&self, origin: impl Into<String>, rules: RobotsRules) {
        self.cache.lock().await.insert(origin.into(), rules);
    }

    /// Whether policy permits fetching this URL.
    pub async fn allows(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(origin) = origin(url) else {
            return false;
        };

        let rules = {
            let mut cache = self.cache.lock().await;
            match cache.get(&origin) {
                Some(rules) => rules.clone(),
                None => {
                    let rules = self.fetch_rules(&origin).await;
                    cache.insert(origin.clone(), rules.clone());
                    rules
                }
            }
        };

        let allowed = rules.allows(parsed.path());
        if !allowed {
            log::info!("Robots policy disallows {}", url);
        }
        allowed
    }

    async fn fetch_rules(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");
        let response = self
            .client
            .get(&robots_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => match r.text().await {
                Ok(body) => RobotsRules::parse(&body, &self.user_agent),
                Err(_) => RobotsRules::default(),
            },
            // No robots.txt, or unreachable: the site states no policy.
            _ => RobotsRules::default(),
        }
    }
}
