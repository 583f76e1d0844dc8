//! Wire types for the Gmail REST API (v1).
//!
//! Field names follow the API's camelCase JSON; only the fields this crate
//! reads are declared, serde skips the rest.

use serde::{Deserialize, Serialize};

/// Response from `users.messages.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessageList {
    /// Absent entirely when the mailbox is empty.
    #[serde(default)]
    pub messages: Option<Vec<GmailMessageStub>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// Id/thread pair returned by the list call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessageStub {
    pub id: String,
    pub thread_id: String,
}

/// A full message as returned by `users.messages.get?format=full`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub label_ids: Option<Vec<String>>,
    #[serde(default)]
    pub snippet: Option<String>,
    pub payload: GmailPayload,
    /// Milliseconds since epoch, as a string.
    #[serde(default)]
    pub internal_date: Option<String>,
}

/// One node of the MIME part tree: a leaf with inline body data, or a
/// container whose `parts` hold the children.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailPayload {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub headers: Option<Vec<GmailHeader>>,
    #[serde(default)]
    pub body: Option<GmailBody>,
    #[serde(default)]
    pub parts: Option<Vec<GmailPayload>>,
}

impl GmailPayload {
    /// Case-insensitive header lookup against this node's header list.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailHeader {
    pub name: String,
    pub value: String,
}

/// Inline body content of a leaf part, base64url-encoded without padding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailBody {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attachment_id: Option<String>,
}

/// Request body for `users.messages.modify`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMessageRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<String>,
}

impl ModifyMessageRequest {
    /// A modify request that only removes the given labels.
    pub fn remove_labels(labels: &[&str]) -> Self {
        Self {
            add_label_ids: Vec::new(),
            remove_label_ids: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}
