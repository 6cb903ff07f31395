//! Content generation chain.
//!
//! Providers are tried in priority order; a provider succeeds only when it
//! returns non-empty content above the configured minimum length. The chain
//! then guarantees the mandated backlink is present and runs the repair
//! pass. If every provider fails, a deterministic locale-aware template
//! takes over, with a final static template behind it, so the chain never
//! produces an empty artifact.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{ContentConfig, ProviderConfig};
use crate::services::repair::repair_content;

/// Input to one generation run.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub keyword: String,
    pub target_url: String,
    pub anchor_text: String,
    pub locale: Option<String>,
}

/// Output of the chain: HTML body plus provenance and metadata.
#[derive(Debug, Clone)]
pub struct GeneratedContent {
    pub html: String,
    /// Tag of the provider that produced the body
    pub provider: String,
    pub word_count: usize,
}

/// An interchangeable content source.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &ContentRequest) -> Result<String>;
}

/// Provider backed by an OpenAI-style chat-completions endpoint.
pub struct HttpProvider {
    name: String,
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

impl HttpProvider {
    /// Build from configuration; returns `None` (logged) when the API key
    /// environment variable is unset, so the chain skips the provider.
    pub fn from_config(config: &ProviderConfig, client: Client) -> Option<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                log::warn!(
                    "Provider '{}' disabled: {} is not set",
                    config.name,
                    config.api_key_env
                );
                return None;
            }
        };
        Some(Self {
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            client,
        })
    }

    fn build_prompt(request: &ContentRequest) -> String {
        format!(
            "Write a friendly, on-topic blog comment of 150-250 words about \"{}\". \
             Work in the phrase \"{}\" as the visible text of exactly one HTML link \
             pointing at {} . Return HTML paragraphs only, no markdown.",
            request.keyword, request.anchor_text, request.target_url
        )
    }
}

#[async_trait]
impl ContentProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &ContentRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You write short, natural blog comments in HTML."
                },
                {
                    "role": "user",
                    "content": Self::build_prompt(request)
                }
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(60))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: serde_json::Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::provider(&self.name, "response had no message content"))
    }
}

/// Deterministic locale-aware template generator. Always succeeds.
pub struct TemplateProvider {
    locale: String,
}

impl TemplateProvider {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }

    /// Render the template for a request, honoring a per-request locale
    /// override.
    pub fn render(&self, request: &ContentRequest) -> String {
        let locale = request.locale.as_deref().unwrap_or(&self.locale);
        let link = format!(
            "<a href=\"{}\">{}</a>",
            request.target_url, request.anchor_text
        );

        match locale.split(['-', '_']).next().unwrap_or("en") {
            "de" => format!(
                "<p>Vielen Dank für diesen Beitrag zum Thema {kw}. Ich beschäftige mich \
                 seit einiger Zeit mit {kw} und finde die hier beschriebenen Ansätze sehr \
                 hilfreich, gerade weil viele Artikel das Thema nur oberflächlich behandeln.</p>\
                 <p>Wer tiefer einsteigen möchte, dem kann ich {link} empfehlen. Dort werden \
                 die wichtigsten Fragen rund um {kw} Schritt für Schritt erklärt, mit \
                 Beispielen aus der Praxis und konkreten Empfehlungen für den Einstieg.</p>\
                 <p>Ich bin gespannt auf weitere Artikel aus dieser Reihe und freue mich \
                 auf den Austausch in den Kommentaren.</p>",
                kw = request.keyword,
                link = link
            ),
            "es" => format!(
                "<p>Gracias por este artículo sobre {kw}. Llevo un tiempo trabajando con \
                 {kw} y los consejos que se comparten aquí son de los más útiles que he \
                 encontrado, sobre todo por los ejemplos concretos.</p>\
                 <p>Para quien quiera profundizar, recomiendo {link}, donde se explican \
                 paso a paso las cuestiones más importantes de {kw}, con casos reales y \
                 sugerencias prácticas para empezar.</p>\
                 <p>Espero con interés las próximas entradas y la conversación en los \
                 comentarios.</p>",
                kw = request.keyword,
                link = link
            ),
            _ => format!(
                "<p>Thanks for this write-up on {kw}. I've been working with {kw} for a \
                 while now, and it's refreshing to see the practical side covered instead \
                 of the usual high-level overview; the concrete examples here mirror a lot \
                 of what we ran into ourselves.</p>\
                 <p>For anyone who wants to dig deeper, {link} walks through the most \
                 common questions around {kw} step by step, with worked examples and \
                 sensible recommendations for getting started without overcommitting to \
                 tooling on day one.</p>\
                 <p>Looking forward to the follow-up posts in this series, and to the \
                 discussion in the comments below.</p>",
                kw = request.keyword,
                link = link
            ),
        }
    }
}

#[async_trait]
impl ContentProvider for TemplateProvider {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, request: &ContentRequest) -> Result<String> {
        Ok(self.render(request))
    }
}

/// Final static template, guaranteed non-empty and to contain the link.
fn static_fallback(request: &ContentRequest) -> String {
    format!(
        "<p>Great post! Readers interested in {} may also find \
         <a href=\"{}\">{}</a> useful.</p>",
        request.keyword, request.target_url, request.anchor_text
    )
}

/// The provider fallback chain.
pub struct ContentChain {
    providers: Vec<Box<dyn ContentProvider>>,
    fallback: TemplateProvider,
    min_length: usize,
}

impl ContentChain {
    /// Build the chain from configuration. Providers with missing
    /// credentials are skipped at construction time.
    pub fn from_config(config: &ContentConfig, client: Client) -> Self {
        let providers = config
            .providers
            .iter()
            .filter_map(|p| {
                HttpProvider::from_config(p, client.clone())
                    .map(|p| Box::new(p) as Box<dyn ContentProvider>)
            })
            .collect();
        Self {
            providers,
            fallback: TemplateProvider::new(config.locale.clone()),
            min_length: config.min_length,
        }
    }

    /// Chain with explicit providers, used by tests and embedders.
    pub fn with_providers(
        providers: Vec<Box<dyn ContentProvider>>,
        fallback: TemplateProvider,
        min_length: usize,
    ) -> Self {
        Self {
            providers,
            fallback,
            min_length,
        }
    }

    /// Generate content for a request. Never fails and never returns an
    /// empty body.
    pub async fn generate(&self, request: &ContentRequest) -> GeneratedContent {
        for provider in &self.providers {
            match provider.generate(request).await {
                Ok(html) if html.trim().len() >= self.min_length => {
                    return finalize(html, provider.name(), request);
                }
                Ok(html) => {
                    log::debug!(
                        "Provider '{}' returned {} chars, below minimum {}; trying next",
                        provider.name(),
                        html.trim().len(),
                        self.min_length
                    );
                }
                Err(error) => {
                    log::warn!("Provider '{}' failed: {}; trying next", provider.name(), error);
                }
            }
        }

        let html = self.fallback.render(request);
        if html.trim().is_empty() {
            return finalize(static_fallback(request), "static", request);
        }
        finalize(html, self.fallback.name(), request)
    }
}

/// Backlink guarantee + repair pass + metadata.
fn finalize(html: String, provider: &str, request: &ContentRequest) -> GeneratedContent {
    let html = ensure_backlink(&html, request);
    let html = repair_content(&html);
    let word_count = count_words(&html);
    GeneratedContent {
        html,
        provider: provider.to_string(),
        word_count,
    }
}

/// Verify the mandated hyperlink is present; if missing, wrap the first
/// case-insensitive occurrence of the primary keyword in an anchor tag.
pub fn ensure_backlink(html: &str, request: &ContentRequest) -> String {
    if html.contains(&format!("href=\"{}\"", request.target_url))
        || html.contains(&format!("href='{}'", request.target_url))
    {
        return html.to_string();
    }

    // Lowercasing can shift byte offsets for non-ASCII text, so positions
    // found in the lowered copy are only used when they land on char
    // boundaries of the original.
    let lower = html.to_lowercase();
    let keyword = request.keyword.to_lowercase();
    if !keyword.is_empty() {
        if let Some(pos) = lower.find(&keyword) {
            let end = pos + keyword.len();
            if html.is_char_boundary(pos) && html.is_char_boundary(end) {
                let original = &html[pos..end];
                let mut out = String::with_capacity(html.len() + 64);
                out.push_str(&html[..pos]);
                out.push_str(&format!(
                    "<a href=\"{}\">{}</a>",
                    request.target_url, original
                ));
                out.push_str(&html[end..]);
                return out;
            }
        }
    }

    // Keyword never appears: append a closing line carrying the link.
    format!(
        "{html}<p>More on this topic: <a href=\"{}\">{}</a>.</p>",
        request.target_url, request.anchor_text
    )
}

/// Word count over the text content, tags stripped.
fn count_words(html: &str) -> usize {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    tags.replace_all(html, " ").split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        name: &'static str,
        output: Result<String>,
    }

    #[async_trait]
    impl ContentProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _request: &ContentRequest) -> Result<String> {
            match &self.output {
                Ok(html) => Ok(html.clone()),
                Err(_) => Err(AppError::provider(self.name, "canned failure")),
            }
        }
    }

    fn request() -> ContentRequest {
        ContentRequest {
            keyword: "project management".into(),
            target_url: "https://example.com/tool".into(),
            anchor_text: "this planning tool".into(),
            locale: None,
        }
    }

    fn long_body(with_link: bool) -> String {
        let link = if with_link {
            "<a href=\"https://example.com/tool\">this planning tool</a>"
        } else {
            "project management"
        };
        format!(
            "<p>{}</p><p>{}</p>",
            "A long discussion of planning practice. ".repeat(10),
            link
        )
    }

    fn chain(providers: Vec<Box<dyn ContentProvider>>) -> ContentChain {
        ContentChain::with_providers(providers, TemplateProvider::new("en"), 500)
    }

    #[tokio::test]
    async fn test_provider_success_keeps_provider_tag() {
        let chain = chain(vec![Box::new(FixedProvider {
            name: "primary",
            output: Ok(long_body(true)),
        })]);
        let content = chain.generate(&request()).await;
        assert_eq!(content.provider, "primary");
        assert!(content.html.contains("href=\"https://example.com/tool\""));
        assert!(content.word_count > 0);
    }

    #[tokio::test]
    async fn test_missing_backlink_is_injected_around_keyword() {
        let chain = chain(vec![Box::new(FixedProvider {
            name: "primary",
            output: Ok(long_body(false)),
        })]);
        let content = chain.generate(&request()).await;
        assert!(content.html.contains(
            "<a href=\"https://example.com/tool\">project management</a>"
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_falls_through_to_next() {
        let chain = chain(vec![
            Box::new(FixedProvider {
                name: "flaky",
                output: Err(AppError::provider("flaky", "timeout")),
            }),
            Box::new(FixedProvider {
                name: "backup",
                output: Ok(long_body(true)),
            }),
        ]);
        let content = chain.generate(&request()).await;
        assert_eq!(content.provider, "backup");
    }

    #[tokio::test]
    async fn test_short_output_is_treated_as_failure() {
        let chain = chain(vec![Box::new(FixedProvider {
            name: "terse",
            output: Ok("<p>too short</p>".into()),
        })]);
        let content = chain.generate(&request()).await;
        assert_eq!(content.provider, "template");
    }

    #[tokio::test]
    async fn test_total_failure_uses_template_with_link() {
        let chain = chain(vec![]);
        let content = chain.generate(&request()).await;
        assert_eq!(content.provider, "template");
        assert!(!content.html.trim().is_empty());
        assert!(content.html.contains("href=\"https://example.com/tool\""));
    }

    #[tokio::test]
    async fn test_locale_override_selects_template() {
        let mut req = request();
        req.locale = Some("de-DE".into());
        let chain = chain(vec![]);
        let content = chain.generate(&req).await;
        assert!(content.html.contains("Vielen Dank"));
        assert!(content.html.contains("href=\"https://example.com/tool\""));
    }

    #[test]
    fn test_ensure_backlink_noop_when_present() {
        let req = request();
        let html = "<p>see <a href=\"https://example.com/tool\">tool</a></p>";
        assert_eq!(ensure_backlink(html, &req), html);
    }

    #[test]
    fn test_ensure_backlink_appends_when_keyword_absent() {
        let req = request();
        let html = "<p>nothing relevant here</p>";
        let out = ensure_backlink(html, &req);
        assert!(out.starts_with(html));
        assert!(out.contains("href=\"https://example.com/tool\""));
        assert!(out.contains("this planning tool"));
    }

    #[test]
    fn test_static_fallback_always_carries_link() {
        let req = request();
        let html = static_fallback(&req);
        assert!(!html.trim().is_empty());
        assert!(html.contains("href=\"https://example.com/tool\""));
    }

    #[test]
    fn test_count_words_strips_tags() {
        assert_eq!(count_words("<p>one two</p> three"), 3);
    }
}
