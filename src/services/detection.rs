//! Form detection engine.
//!
//! Fetches a candidate page, enumerates its forms, and scores each form by
//! how likely it is to be a public comment form. Scoring is additive and
//! capped per category, so one strong signal cannot be faked by stacking
//! many weak ones.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Config, FieldRole, FormField, FormMap, FormStatus, RoleKeywords, Target};
use crate::services::RenderClient;
use crate::utils::http::fetch_text;
use crate::utils::url::resolve;

// Scoring weights. One bonus per category.
const SCORE_COMMENT: i32 = 15;
const SCORE_EMAIL: i32 = 10;
const SCORE_NAME: i32 = 8;
const SCORE_WEBSITE: i32 = 3;
const SCORE_SUBMIT: i32 = 5;
const SCORE_CONTEXT_KEYWORD: i32 = 5;
const SCORE_CONTEXT_PHRASE: i32 = 3;

const CONTEXT_KEYWORDS: [&str; 3] = ["comment", "reply", "respond"];
const CONTEXT_PHRASES: [&str; 3] = ["leave a comment", "post a comment", "leave a reply"];

/// Selector used when a form has a comment field but no visible submit
/// control. Many sites rely on implicit form submission.
const FALLBACK_SUBMIT_SELECTOR: &str = "input[type=submit], button[type=submit], button";

/// Classify one form field by matching its markup text against the role
/// keyword table. Case-insensitive substring match over name, id,
/// placeholder, and associated label text, in role priority order.
pub fn classify_field(
    keywords: &RoleKeywords,
    name: &str,
    id: &str,
    placeholder: &str,
    label: &str,
) -> Option<FieldRole> {
    let haystack = format!("{name} {id} {placeholder} {label}").to_lowercase();
    let matches = |needles: &[String]| needles.iter().any(|n| haystack.contains(n.as_str()));

    if matches(&keywords.comment) {
        Some(FieldRole::Comment)
    } else if matches(&keywords.email) {
        Some(FieldRole::Email)
    } else if matches(&keywords.name) {
        Some(FieldRole::Name)
    } else if matches(&keywords.website) {
        Some(FieldRole::Website)
    } else {
        None
    }
}

/// Service scoring candidate pages for usable comment forms.
pub struct FormDetector {
    config: Arc<Config>,
    client: Client,
    render: Option<RenderClient>,
}

impl FormDetector {
    pub fn new(config: Arc<Config>, client: Client, render: Option<RenderClient>) -> Self {
        Self {
            config,
            client,
            render,
        }
    }

    /// Fetch a target page and return its scored FormMaps, sorted by
    /// confidence descending. `auto_post_threshold` controls promotion to
    /// `vetted`.
    pub async fn detect(
        &self,
        target: &Target,
        js_rendering: bool,
        auto_post_threshold: i32,
    ) -> Result<Vec<FormMap>> {
        let html = if js_rendering {
            let render = self.render.as_ref().ok_or_else(|| {
                AppError::config("JS rendering requested but no render endpoint configured")
            })?;
            render
                .content(&target.url, self.config.detection.js_settle_ms)
                .await?
        } else {
            fetch_text(&self.client, &target.url)
                .await
                .map_err(|error| AppError::detection(&target.url, error))?
        };

        Ok(self.score_page(&html, target, auto_post_threshold))
    }

    /// Score every form in a page. Pure with respect to I/O; exercised
    /// directly by tests with fixture HTML.
    pub fn score_page(&self, html: &str, target: &Target, auto_post_threshold: i32) -> Vec<FormMap> {
        let document = Html::parse_document(html);
        let form_sel = Selector::parse("form").expect("static selector");

        let mut maps: Vec<FormMap> = document
            .select(&form_sel)
            .enumerate()
            .filter_map(|(idx, form)| self.score_form(form, idx, target, auto_post_threshold))
            .collect();

        maps.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        maps
    }

    fn score_form(
        &self,
        form: ElementRef<'_>,
        index: usize,
        target: &Target,
        auto_post_threshold: i32,
    ) -> Option<FormMap> {
        let keywords = &self.config.detection.role_keywords;
        let labels = label_texts(form);

        let field_sel = Selector::parse("input, textarea, select").expect("static selector");
        let mut fields: Vec<FormField> = Vec::new();
        let mut seen_roles: Vec<FieldRole> = Vec::new();
        let mut confidence = 0;

        for element in form.select(&field_sel) {
            let value = element.value();
            let name = value.attr("name").unwrap_or("");
            let id = value.attr("id").unwrap_or("");
            let field_type = value.attr("type").unwrap_or("").to_lowercase();

            // Submit/button inputs are controls, not fields.
            if field_type == "submit" || field_type == "button" {
                continue;
            }

            if field_type == "hidden" {
                if !name.is_empty() {
                    fields.push(FormField {
                        role: FieldRole::Hidden,
                        name: name.to_string(),
                        value: value.attr("value").map(str::to_string),
                    });
                }
                continue;
            }

            let placeholder = value.attr("placeholder").unwrap_or("");
            let label = labels.get(id).cloned().unwrap_or_default();

            let Some(role) = classify_field(keywords, name, id, placeholder, &label) else {
                continue;
            };

            // First field per role wins; extras neither score nor submit.
            if seen_roles.contains(&role) {
                continue;
            }
            seen_roles.push(role);
            confidence += match role {
                FieldRole::Comment => SCORE_COMMENT,
                FieldRole::Email => SCORE_EMAIL,
                FieldRole::Name => SCORE_NAME,
                FieldRole::Website => SCORE_WEBSITE,
                FieldRole::Hidden => 0,
            };

            fields.push(FormField {
                role,
                name: if name.is_empty() { id } else { name }.to_string(),
                value: None,
            });
        }

        // A FormMap with no comment field is discarded outright.
        if !seen_roles.contains(&FieldRole::Comment) {
            return None;
        }

        let submit_selector = find_submit_control(form, &self.config.detection.submit_keywords);
        if submit_selector.is_some() {
            confidence += SCORE_SUBMIT;
        }

        // Context bonuses scan the form's visible text, not its markup;
        // attribute signals are already paid for by field classification.
        let text = form
            .text()
            .collect::<String>()
            .to_lowercase();
        if CONTEXT_KEYWORDS.iter().any(|k| text.contains(k)) {
            confidence += SCORE_CONTEXT_KEYWORD;
        }
        if CONTEXT_PHRASES.iter().any(|p| text.contains(p)) {
            confidence += SCORE_CONTEXT_PHRASE;
        }

        if confidence < self.config.detection.min_confidence {
            return None;
        }

        let needs_human_review = confidence < auto_post_threshold;
        let action = form
            .value()
            .attr("action")
            .filter(|a| !a.trim().is_empty())
            .and_then(|a| resolve(&target.url, a))
            .unwrap_or_else(|| target.url.clone());
        let method = form
            .value()
            .attr("method")
            .unwrap_or("post")
            .to_lowercase();

        Some(FormMap {
            id: format!("fm_{}_{}", target.id.trim_start_matches("tgt_"), index),
            campaign_id: target.campaign_id.clone(),
            target_id: target.id.clone(),
            target_url: target.url.clone(),
            selector: form_locator(form, index),
            action,
            method,
            fields,
            submit_selector: submit_selector
                .unwrap_or_else(|| FALLBACK_SUBMIT_SELECTOR.to_string()),
            confidence,
            status: if needs_human_review {
                FormStatus::Detected
            } else {
                FormStatus::Vetted
            },
            needs_human_review,
            detected_at: Utc::now(),
        })
    }
}

/// Collect label text keyed by the label's `for` attribute.
fn label_texts(form: ElementRef<'_>) -> HashMap<String, String> {
    let label_sel = Selector::parse("label[for]").expect("static selector");
    form.select(&label_sel)
        .filter_map(|label| {
            let target = label.value().attr("for")?;
            let text: String = label.text().collect::<String>().trim().to_string();
            Some((target.to_string(), text))
        })
        .collect()
}

/// Locate the submit control, returning a CSS locator for it.
fn find_submit_control(form: ElementRef<'_>, submit_keywords: &[String]) -> Option<String> {
    let input_submit = Selector::parse("input[type=submit]").expect("static selector");
    if form.select(&input_submit).next().is_some() {
        return Some("input[type=submit]".to_string());
    }

    let button_submit = Selector::parse("button[type=submit]").expect("static selector");
    if form.select(&button_submit).next().is_some() {
        return Some("button[type=submit]".to_string());
    }

    let any_button = Selector::parse("button").expect("static selector");
    for button in form.select(&any_button) {
        let mut text: String = button.text().collect();
        if let Some(value) = button.value().attr("value") {
            text.push(' ');
            text.push_str(value);
        }
        let text = text.to_lowercase();
        if submit_keywords.iter().any(|k| text.contains(k.as_str())) {
            return Some("button".to_string());
        }
    }

    None
}

/// Structural locator for a form: prefer its id, then its name, then its
/// document position.
fn form_locator(form: ElementRef<'_>, index: usize) -> String {
    if let Some(id) = form.value().attr("id") {
        return format!("form#{id}");
    }
    if let Some(name) = form.value().attr("name") {
        return format!("form[name='{name}']");
    }
    format!("form:nth-of-type({})", index + 1)
}
