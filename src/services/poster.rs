//! Comment submission against a vetted FormMap.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{FieldRole, FormMap, PostingAccount, PostingStatus};

/// Leading length of the stored content excerpt, in characters.
const EXCERPT_CHARS: usize = 160;

/// The observed result of one submission attempt.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub status: PostingStatus,

    /// Final URL after redirects, when the submission landed
    pub live_url: Option<String>,

    /// HTTP status of the submission response, when one was received
    pub http_status: Option<u16>,
}

/// Submits generated content through detected comment forms.
pub struct CommentPoster {
    client: Client,
}

impl CommentPoster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Submit `content` through the form described by `map`, signing it
    /// with `account`. In dry-run mode the payload is built but nothing is
    /// sent, and the attempt reports as posted.
    pub async fn submit(
        &self,
        map: &FormMap,
        account: &PostingAccount,
        content: &str,
        dry_run: bool,
    ) -> Result<SubmissionOutcome> {
        // A map without a comment field cannot carry the content anywhere.
        if map.field(FieldRole::Comment).is_none() {
            return Err(AppError::posting(&map.id, "form map has no comment field"));
        }

        let payload = build_payload(map, account, content);

        if dry_run {
            log::info!(
                "Dry run: would submit {} fields to {} ({})",
                payload.len(),
                map.action,
                map.target_url
            );
            return Ok(SubmissionOutcome {
                status: PostingStatus::Posted,
                live_url: None,
                http_status: None,
            });
        }

        let mut request = self
            .client
            .post(&map.action)
            .timeout(Duration::from_secs(30))
            .header("Referer", &map.target_url)
            .form(&payload);
        if let Some(cookie) = &account.cookie {
            request = request.header("Cookie", cookie);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(error) => {
                log::warn!("Submission to {} failed: {}", map.action, error);
                return Ok(SubmissionOutcome {
                    status: PostingStatus::Failed,
                    live_url: None,
                    http_status: error.status().map(|s| s.as_u16()),
                });
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();
        if status.is_success() || status.is_redirection() {
            Ok(SubmissionOutcome {
                status: PostingStatus::Posted,
                live_url: Some(final_url),
                http_status: Some(status.as_u16()),
            })
        } else {
            log::warn!("Submission to {} rejected with {}", map.action, status);
            Ok(SubmissionOutcome {
                status: PostingStatus::Failed,
                live_url: None,
                http_status: Some(status.as_u16()),
            })
        }
    }
}

/// Assemble the form-encoded payload from the map's classified fields.
///
/// Hidden fields keep their captured values; the site rejects submissions
/// without them.
pub fn build_payload(
    map: &FormMap,
    account: &PostingAccount,
    content: &str,
) -> Vec<(String, String)> {
    let mut payload = Vec::with_capacity(map.fields.len());
    for field in &map.fields {
        let value = match field.role {
            FieldRole::Comment => content.to_string(),
            FieldRole::Name => account.display_name.clone(),
            FieldRole::Email => account.email.clone(),
            FieldRole::Website => account.website.clone().unwrap_or_default(),
            FieldRole::Hidden => field.value.clone().unwrap_or_default(),
        };
        payload.push((field.name.clone(), value));
    }
    payload
}

/// Leading excerpt of submitted content with tags stripped, for the
/// posting record.
pub fn content_excerpt(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    let text = tags.replace_all(html, " ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() <= EXCERPT_CHARS {
        return text;
    }
    let mut excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    excerpt.push('…');
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormField, FormStatus};
    use chrono::Utc;

    fn sample_map() -> FormMap {
        FormMap {
            id: "fm_1".into(),
            campaign_id: "camp_1".into(),
            target_id: "tgt_1".into(),
            target_url: "https://example.com/post".into(),
            selector: "form#commentform".into(),
            action: "https://example.com/wp-comments-post.php".into(),
            method: "post".into(),
            fields: vec![
                FormField {
                    role: FieldRole::Comment,
                    name: "comment".into(),
                    value: None,
                },
                FormField {
                    role: FieldRole::Name,
                    name: "author".into(),
                    value: None,
                },
                FormField {
                    role: FieldRole::Email,
                    name: "email".into(),
                    value: None,
                },
                FormField {
                    role: FieldRole::Website,
                    name: "url".into(),
                    value: None,
                },
                FormField {
                    role: FieldRole::Hidden,
                    name: "comment_post_ID".into(),
                    value: Some("42".into()),
                },
            ],
            submit_selector: "input[type=submit]".into(),
            confidence: 30,
            status: FormStatus::Vetted,
            needs_human_review: false,
            detected_at: Utc::now(),
        }
    }

    fn account() -> PostingAccount {
        let mut account = PostingAccount::new("acct_1", "Jamie Reed", "jamie@example.net");
        account.website = Some("https://jamie.example.net".into());
        account
    }

    #[test]
    fn test_payload_maps_roles_to_field_names() {
        let payload = build_payload(&sample_map(), &account(), "<p>hello</p>");
        let get = |name: &str| {
            payload
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(get("comment"), Some("<p>hello</p>"));
        assert_eq!(get("author"), Some("Jamie Reed"));
        assert_eq!(get("email"), Some("jamie@example.net"));
        assert_eq!(get("url"), Some("https://jamie.example.net"));
        assert_eq!(get("comment_post_ID"), Some("42"));
    }

    #[test]
    fn test_payload_without_website_sends_empty_value() {
        let account = PostingAccount::new("acct_2", "Sam", "sam@example.net");
        let payload = build_payload(&sample_map(), &account, "hi");
        let url = payload.iter().find(|(key, _)| key == "url").unwrap();
        assert_eq!(url.1, "");
    }

    #[tokio::test]
    async fn test_dry_run_skips_the_request() {
        // The action points at an unroutable address, so an actual send
        // would fail; dry run must succeed without one.
        let mut map = sample_map();
        map.action = "http://192.0.2.1/wp-comments-post.php".into();
        let poster = CommentPoster::new(Client::new());
        let outcome = poster
            .submit(&map, &account(), "<p>hello</p>", true)
            .await
            .unwrap();
        assert_eq!(outcome.status, PostingStatus::Posted);
        assert!(outcome.live_url.is_none());
        assert!(outcome.http_status.is_none());
    }

    #[tokio::test]
    async fn test_map_without_comment_field_is_rejected() {
        let mut map = sample_map();
        map.fields.retain(|f| f.role != FieldRole::Comment);
        let poster = CommentPoster::new(Client::new());
        let error = poster
            .submit(&map, &account(), "<p>hello</p>", true)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("no comment field"));
    }

    #[test]
    fn test_excerpt_strips_tags_and_truncates() {
        let short = content_excerpt("<p>Just a <strong>short</strong> note.</p>");
        assert_eq!(short, "Just a short note.");

        let long_html = format!("<p>{}</p>", "word ".repeat(100));
        let excerpt = content_excerpt(&long_html);
        assert!(excerpt.ends_with('…'));
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 1);
    }
}
