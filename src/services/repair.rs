//! Conservative repair of known content malformations.
//!
//! Generation providers occasionally return HTML with a fixed set of
//! defects: hyperlinks split across adjacent anchor tags, doubled emphasis
//! tags, and angle brackets that arrive entity-encoded. The repair pass
//! corrects exactly those patterns and nothing else; if a pass would gut
//! the content it is rejected and the original is kept.

use std::sync::OnceLock;

use regex::Regex;

/// Repair is rejected when it would shrink content below this fraction.
const MIN_RETAINED_FRACTION: f64 = 0.5;

fn anchor_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a\s+href="([^"]+)"[^>]*>(.*?)</a>"#).expect("valid regex")
    })
}

fn encoded_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&lt;(/?)(p|br|a|strong|em|b|i|ul|ol|li|h[1-6])&gt;").expect("valid regex")
    })
}

/// Run the repair pass over generated HTML.
///
/// Running it on already-well-formed content is a no-op.
pub fn repair_content(html: &str) -> String {
    let mut repaired = decode_stray_tags(html);
    repaired = merge_split_anchors(&repaired);
    repaired = collapse_doubled_emphasis(&repaired);

    // Reject destructive repairs rather than lose content.
    if (repaired.len() as f64) < (html.len() as f64) * MIN_RETAINED_FRACTION {
        return html.to_string();
    }
    repaired
}

/// Decode angle-bracket entities that wrap known tag names.
fn decode_stray_tags(html: &str) -> String {
    encoded_tag_pattern().replace_all(html, "<$1$2>").into_owned()
}

/// An anchor awaiting output, possibly absorbing adjacent twins.
struct PendingAnchor {
    href: String,
    inner: String,
    /// Verbatim source text, emitted unchanged when no merge happened
    raw: String,
    merged: bool,
}

impl PendingAnchor {
    fn flush(self, out: &mut String) {
        // An anchor left empty by a bad split carries no information.
        if self.inner.trim().is_empty() {
            return;
        }
        if self.merged {
            out.push_str(&format!("<a href=\"{}\">{}</a>", self.href, self.inner));
        } else {
            out.push_str(&self.raw);
        }
    }
}

/// Merge consecutive anchors with the same href into one, and drop empty
/// anchors entirely. Anchors with distinct hrefs are left alone, and
/// untouched anchors are emitted verbatim.
fn merge_split_anchors(html: &str) -> String {
    let pattern = anchor_pattern();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    let mut pending: Option<PendingAnchor> = None;
    for caps in pattern.captures_iter(html) {
        let whole = caps.get(0).expect("match");
        let href = &caps[1];
        let inner = &caps[2];

        let gap = &html[cursor..whole.start()];
        match pending.take() {
            Some(prev) if prev.href == href && gap.trim().is_empty() => {
                // Same link split across adjacent tags: merge the texts.
                pending = Some(PendingAnchor {
                    inner: format!("{}{}{}", prev.inner, gap, inner),
                    href: prev.href,
                    raw: prev.raw,
                    merged: true,
                });
            }
            Some(prev) => {
                prev.flush(&mut out);
                out.push_str(gap);
                pending = Some(PendingAnchor {
                    href: href.to_string(),
                    inner: inner.to_string(),
                    raw: whole.as_str().to_string(),
                    merged: false,
                });
            }
            None => {
                out.push_str(gap);
                pending = Some(PendingAnchor {
                    href: href.to_string(),
                    inner: inner.to_string(),
                    raw: whole.as_str().to_string(),
                    merged: false,
                });
            }
        }
        cursor = whole.end();
    }

    if let Some(prev) = pending {
        prev.flush(&mut out);
    }
    out.push_str(&html[cursor..]);
    out
}

/// Collapse immediately doubled emphasis tags.
fn collapse_doubled_emphasis(html: &str) -> String {
    let mut result = html.to_string();
    for tag in ["strong", "em", "b", "i"] {
        let open = format!("<{tag}><{tag}>");
        let close = format!("</{tag}></{tag}>");
        let open_once = format!("<{tag}>");
        let close_once = format!("</{tag}>");
        while result.contains(&open) {
            result = result.replace(&open, &open_once);
        }
        while result.contains(&close) {
            result = result.replace(&close, &close_once);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_on_well_formed_content() {
        let html = "<p>Read <a href=\"https://example.com\">our guide</a> and \
                    <a href=\"https://other.com\">this one</a> for <strong>more</strong>.</p>";
        assert_eq!(repair_content(html), html);
    }

    #[test]
    fn test_merges_split_anchor() {
        let html = r#"<p><a href="https://example.com">pro</a><a href="https://example.com">ject</a></p>"#;
        assert_eq!(
            repair_content(html),
            r#"<p><a href="https://example.com">project</a></p>"#
        );
    }

    #[test]
    fn test_distinct_hrefs_are_not_merged() {
        let html = r#"<a href="https://a.com">a</a><a href="https://b.com">b</a>"#;
        assert_eq!(repair_content(html), html);
    }

    #[test]
    fn test_drops_empty_anchor() {
        let html = r#"<p>This paragraph carries plenty of surrounding prose <a href="https://example.com"></a>so dropping the empty anchor is a small, safe edit.</p>"#;
        assert_eq!(
            repair_content(html),
            "<p>This paragraph carries plenty of surrounding prose so dropping the empty anchor is a small, safe edit.</p>"
        );
    }

    #[test]
    fn test_collapses_doubled_emphasis() {
        let html = "<p><strong><strong>bold</strong></strong> and <em><em>soft</em></em></p>";
        assert_eq!(
            repair_content(html),
            "<p><strong>bold</strong> and <em>soft</em></p>"
        );
    }

    #[test]
    fn test_decodes_stray_encoded_tags() {
        let html = "&lt;p&gt;hello &lt;strong&gt;world&lt;/strong&gt;&lt;/p&gt;";
        assert_eq!(repair_content(html), "<p>hello <strong>world</strong></p>");
    }

    #[test]
    fn test_destructive_repair_is_rejected() {
        // Content dominated by empty anchors: removing them would cut the
        // length by far more than half, so the original must be kept.
        let html = r#"<a href="https://example.com">   </a><a href="https://example.com">  </a>x"#;
        assert_eq!(repair_content(html), html);
    }

    #[test]
    fn test_leaves_unknown_entities_alone() {
        let html = "<p>5 &lt; 10 &amp; 10 &gt; 5</p>";
        assert_eq!(repair_content(html), html);
    }
}
