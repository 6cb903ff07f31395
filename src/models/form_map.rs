//! Scored descriptions of detected comment forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic role inferred for one form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Comment,
    Email,
    Name,
    Website,
    /// Preserved for submission but never scored
    Hidden,
}

/// One classified field inside a detected form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    /// Inferred role
    pub role: FieldRole,

    /// The field's `name` attribute, used as the submission key
    pub name: String,

    /// Prefilled value, kept for hidden fields
    #[serde(default)]
    pub value: Option<String>,
}

/// Review status of a FormMap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    /// Retained but below the auto-post threshold
    Detected,
    /// Eligible for posting without human review
    Vetted,
}

/// The structured, scored description of one detected form on one page.
///
/// Immutable after creation except for status promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormMap {
    /// Identifier derived from target id and form position
    pub id: String,

    /// Owning campaign
    pub campaign_id: String,

    /// Target this form was found on
    pub target_id: String,

    /// Page URL the form was found on
    pub target_url: String,

    /// Structural locator for the form element
    pub selector: String,

    /// Resolved form action URL; the page URL when the action is implicit
    pub action: String,

    /// Form method, lowercased
    pub method: String,

    /// Classified fields
    pub fields: Vec<FormField>,

    /// Locator for the submit control; synthesized when none was found
    pub submit_selector: String,

    /// Weighted-sum confidence score
    pub confidence: i32,

    /// Review status
    pub status: FormStatus,

    /// Set when confidence falls below the auto-post threshold
    pub needs_human_review: bool,

    pub detected_at: DateTime<Utc>,
}

impl FormMap {
    /// Field of the given role, if present.
    pub fn field(&self, role: FieldRole) -> Option<&FormField> {
        self.fields.iter().find(|f| f.role == role)
    }

    /// Promote a detected map to vetted after human review.
    pub fn promote(&mut self) {
        self.status = FormStatus::Vetted;
        self.needs_human_review = false;
    }

    /// Whether this map may be posted to without review.
    pub fn is_vetted(&self) -> bool {
        self.status == FormStatus::Vetted
    }
}
