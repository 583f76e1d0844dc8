//! Content extraction from Gmail payload trees.
//!
//! A `format=full` message arrives as a MIME part tree: leaves carry inline
//! base64url data, containers carry child parts. The extractors here resolve
//! that tree into a single body string, pull out subject and date headers,
//! and hunt for an unsubscribe target. Absence of content is always a value
//! (a fallback string or `None`), never an error.

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;

use super::types::{GmailHeader, GmailPayload};

/// Fixed fallback for payloads with no decodable body content.
pub const NO_READABLE_CONTENT: &str = "No readable content";

/// Fallback subject for messages that carry no Subject header.
pub const NO_SUBJECT: &str = "No Subject";

/// Resolves a payload tree to body text.
///
/// The node's own inline data wins outright. Otherwise, among immediate
/// children an HTML leaf beats a plain-text leaf, and container children are
/// recursed into depth-first in child order, the first non-empty nested
/// result winning. Undecodable base64 and non-UTF-8 data count as absent.
pub fn extract_body(payload: &GmailPayload) -> String {
    body_from_node(payload).unwrap_or_else(|| NO_READABLE_CONTENT.to_string())
}

fn body_from_node(payload: &GmailPayload) -> Option<String> {
    if let Some(text) = decode_part_data(payload) {
        return Some(text);
    }

    let parts = payload.parts.as_deref()?;

    if let Some(html) = find_leaf(parts, "text/html") {
        return Some(html);
    }
    if let Some(plain) = find_leaf(parts, "text/plain") {
        return Some(plain);
    }

    parts
        .iter()
        .filter(|part| part.parts.is_some())
        .find_map(body_from_node)
}

fn find_leaf(parts: &[GmailPayload], mime: &str) -> Option<String> {
    parts
        .iter()
        .filter(|part| has_mime_type(part, mime))
        .find_map(decode_part_data)
}

fn has_mime_type(part: &GmailPayload, mime: &str) -> bool {
    part.mime_type
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case(mime))
}

fn decode_part_data(part: &GmailPayload) -> Option<String> {
    let data = part.body.as_ref()?.data.as_deref()?;
    if data.is_empty() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(data).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Subject header value, defaulting when the header is missing.
pub fn extract_subject(payload: &GmailPayload) -> String {
    payload
        .header("Subject")
        .map(str::to_string)
        .unwrap_or_else(|| NO_SUBJECT.to_string())
}

/// Date header parsed as RFC 2822 and normalized to RFC 3339 UTC text.
/// Missing or unparseable dates propagate as `None`.
pub fn extract_received_at(payload: &GmailPayload) -> Option<String> {
    let raw = payload.header("Date")?;
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
}

/// Finds an unsubscribe URL: the `List-Unsubscribe` header first (an
/// angle-bracketed URL, else the first bare URL token), then an ordered scan
/// of the body for unsubscribe, opt-out, and tracked-redirect URL shapes.
pub fn extract_unsubscribe_link(headers: &[GmailHeader], body: &str) -> Option<String> {
    if let Some(link) = link_from_header(headers) {
        return Some(link);
    }

    body_url_patterns()
        .iter()
        .find_map(|pattern| pattern.find(body))
        .map(|m| m.as_str().to_string())
}

fn link_from_header(headers: &[GmailHeader]) -> Option<String> {
    let value = headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("List-Unsubscribe"))
        .map(|h| h.value.as_str())?;

    if let Some(captures) = angle_url_regex().captures(value) {
        return captures.get(1).map(|m| m.as_str().to_string());
    }
    bare_url_regex().find(value).map(|m| m.as_str().to_string())
}

static ANGLE_URL_RE: OnceLock<Regex> = OnceLock::new();
static BARE_URL_RE: OnceLock<Regex> = OnceLock::new();
static BODY_URL_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn angle_url_regex() -> &'static Regex {
    ANGLE_URL_RE.get_or_init(|| compile(r"(?i)<(https?://[^>]+)>"))
}

fn bare_url_regex() -> &'static Regex {
    BARE_URL_RE.get_or_init(|| compile(r#"(?i)https?://[^\s,<>"']+"#))
}

/// Body patterns in priority order: plain unsubscribe URLs, opt-out
/// variants, then tracked redirects on a `click.` host.
fn body_url_patterns() -> &'static [Regex] {
    BODY_URL_PATTERNS.get_or_init(|| {
        [
            r#"(?i)https?://[^\s"'<>]*unsubscribe[^\s"'<>]*"#,
            r#"(?i)https?://[^\s"'<>]*opt[-_]?out[^\s"'<>]*"#,
            r#"(?i)https?://[^\s/"'<>]*click\.[^\s"'<>]+"#,
        ]
        .iter()
        .map(|pattern| compile(pattern))
        .collect()
    })
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|error| panic!("URL pattern failed to compile: {error}"))
}
