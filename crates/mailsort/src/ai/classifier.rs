//! Email classifier backed by an OpenAI-compatible chat-completions API.

use std::sync::OnceLock;
use std::time::Duration;

use log::debug;
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::category_repo::CategoryRow;
use crate::db::email_repo::RawEmailRow;

/// Default sampling temperature. Low, since the task is classification.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Character budget for the email body included in the prompt.
pub const DEFAULT_MAX_BODY_CHARS: usize = 1000;

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Length cap for remote error bodies quoted in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn cap_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

/// Errors that can occur during email categorization.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Classifier returned no completion content")]
    EmptyResponse,

    #[error("Failed to parse classifier response: {0}")]
    ResponseParse(String),

    #[error("Classifier assigned category id {0}, which is not one of the user's categories")]
    UnknownCategory(i64),
}

/// A parsed categorization for one message.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailCategorization {
    /// Remote id of the categorized message. Attached after parsing, not
    /// part of the model response.
    #[serde(skip)]
    pub email_id: String,

    /// Id of the assigned category.
    pub category_id: i64,

    /// Model-written summary, requested as 2-3 sentences.
    pub summary: String,

    /// Model confidence in [0, 1].
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Classifier over an OpenAI-compatible `/chat/completions` endpoint.
pub struct EmailClassifier {
    http: Client,
    api_base: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
    max_body_chars: usize,
}

impl EmailClassifier {
    /// Creates a classifier against the given API base URL.
    pub fn new(
        api_base: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Result<Self, ClassifierError> {
        let http = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        })
    }

    /// Overrides the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Overrides the body character budget.
    pub fn with_max_body_chars(mut self, max_body_chars: usize) -> Self {
        self.max_body_chars = max_body_chars;
        self
    }

    /// Assigns the email to one of the user's categories.
    ///
    /// The response is parsed strictly as data; out-of-range confidence and
    /// category ids outside the supplied set are rejected.
    pub async fn categorize(
        &self,
        email: &RawEmailRow,
        categories: &[CategoryRow],
    ) -> Result<EmailCategorization, ClassifierError> {
        let prompt = build_prompt(&email.subject, &email.body, categories, self.max_body_chars);
        debug!("Categorization prompt for {}:\n{}", email.email_id, prompt);

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body: cap_error_body(&body),
            });
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            ClassifierError::ResponseParse(format!("Malformed completion envelope: {}", e))
        })?;

        let content = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or(ClassifierError::EmptyResponse)?;
        debug!("Categorization response for {}:\n{}", email.email_id, content);

        parse_categorization(content, &email.email_id, categories)
    }
}

/// Classification seam over the model call. Orchestration depends on this
/// trait rather than on [`EmailClassifier`] directly, so runs can execute
/// against scripted outcomes in tests.
#[async_trait::async_trait]
pub trait Categorize: Send + Sync {
    /// Assigns one message to a category from the supplied set.
    async fn categorize(
        &self,
        email: &RawEmailRow,
        categories: &[CategoryRow],
    ) -> Result<EmailCategorization, ClassifierError>;
}

#[async_trait::async_trait]
impl Categorize for EmailClassifier {
    async fn categorize(
        &self,
        email: &RawEmailRow,
        categories: &[CategoryRow],
    ) -> Result<EmailCategorization, ClassifierError> {
        EmailClassifier::categorize(self, email, categories).await
    }
}

/// Builds the single-turn categorization prompt.
fn build_prompt(
    subject: &str,
    body: &str,
    categories: &[CategoryRow],
    max_body_chars: usize,
) -> String {
    let category_lines: String = categories
        .iter()
        .map(|c| {
            format!(
                "Category {}: '{}' - {}",
                c.category_id,
                c.name,
                c.description.as_deref().unwrap_or("No description")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let cleaned = strip_html(body);
    let truncated = truncate_chars(&cleaned, max_body_chars);

    format!(
        r#"You are an email categorization assistant. Assign the email below to exactly one of the user's categories and summarize it.

Categories:
{categories}

Email subject: {subject}
Email body:
{body}

Respond ONLY with a JSON object of the shape:
{{"category_id": <integer id of the chosen category>, "summary": "<2-3 sentence summary>", "confidence": <float between 0.0 and 1.0>}}"#,
        categories = category_lines,
        subject = subject,
        body = truncated,
    )
}

/// Parses a completion into a categorization, validating confidence range
/// and category membership before attaching the message id.
fn parse_categorization(
    content: &str,
    email_id: &str,
    categories: &[CategoryRow],
) -> Result<EmailCategorization, ClassifierError> {
    let json_str = extract_json(content);

    let mut parsed: EmailCategorization = serde_json::from_str(&json_str).map_err(|e| {
        ClassifierError::ResponseParse(format!(
            "Failed to parse JSON: {}. Response was: {}",
            e, json_str
        ))
    })?;

    if !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(ClassifierError::ResponseParse(format!(
            "Confidence {} outside [0, 1]",
            parsed.confidence
        )));
    }
    if !categories
        .iter()
        .any(|c| c.category_id == parsed.category_id)
    {
        return Err(ClassifierError::UnknownCategory(parsed.category_id));
    }

    parsed.email_id = email_id.to_string();
    Ok(parsed)
}

/// Extracts the first JSON object from a response, tolerating surrounding
/// prose. The scanner tracks string boundaries and escape sequences.
fn extract_json(response: &str) -> String {
    let start = match response.find('{') {
        Some(idx) => idx,
        None => return response.to_string(),
    };

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = response.len();

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                depth += 1;
            }
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    response[start..end].to_string()
}

/// Strips HTML down to text: script and style blocks go with their content,
/// remaining tags are dropped, common entities are decoded, and whitespace
/// is collapsed.
fn strip_html(body: &str) -> String {
    let without_blocks = script_style_regex().replace_all(body, " ");
    let without_tags = tag_regex().replace_all(&without_blocks, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    whitespace_regex()
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}

/// Truncates to a character budget, marking the cut with an ellipsis.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

static SCRIPT_STYLE_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn script_style_regex() -> &'static Regex {
    SCRIPT_STYLE_RE.get_or_init(|| {
        compile(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
    })
}

fn tag_regex() -> &'static Regex {
    TAG_RE.get_or_init(|| compile(r"(?s)<[^>]+>"))
}

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| compile(r"\s+"))
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|error| panic!("HTML pattern failed to compile: {error}"))
}
