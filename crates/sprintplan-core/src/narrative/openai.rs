//! OpenAI-compatible chat-completions annotator.
//!
//! Requests run on a private current-thread runtime and are bounded by a
//! timeout, so callers see a plain blocking API.

use std::time::Duration;

use indoc::indoc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::{
    DaySummary, FocusLabelRequest, MemberDescriptor, NarrativeAnnotator, SubtaskDraft,
    SubtaskRequest,
};
use crate::error::NarrativeError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const FOCUS_LABEL_PROMPT: &str = indoc! {"
    You name focus blocks in an engineer's daily plan.
    Answer with a single line of at most 140 characters and no markdown.
    If any item is due within 3 days of the block date, mention the deadline risk.
"};

const GROUP_PROMPT: &str = indoc! {"
    You explain why several engineering work items should be done in one sitting.
    Answer with one sentence of at most 25 words and no markdown.
"};

const DAY_SUMMARY_PROMPT: &str = indoc! {"
    You write short day recaps for an engineer from structured plan data.
    Use plain text, at most two short paragraphs and under 120 words.
    Do not invent work that is not in the data.
"};

const SUBTASK_PROMPT: &str = indoc! {"
    You are a delivery lead breaking an engineering ticket into actionable work items.
    Respond with a JSON array only. Each element has keys text_sub, tags and est_hours.
    Do not include markdown or commentary outside of the JSON.
"};

/// Connection settings for [`OpenAiAnnotator`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Narrative annotator backed by an OpenAI-compatible HTTP API.
pub struct OpenAiAnnotator {
    client: Client,
    runtime: tokio::runtime::Runtime,
    api_key: String,
    settings: OpenAiSettings,
}

impl OpenAiAnnotator {
    /// Build an annotator. An empty key yields [`NarrativeError::NotConfigured`].
    pub fn new(api_key: impl Into<String>, settings: OpenAiSettings) -> Result<Self, NarrativeError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(NarrativeError::NotConfigured);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NarrativeError::Http(format!("runtime init failed: {e}")))?;
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| NarrativeError::Http(format!("client init failed: {e}")))?;
        Ok(Self {
            client,
            runtime,
            api_key,
            settings,
        })
    }

    /// Build an annotator reading the key from environment variable `var`.
    pub fn from_env(var: &str, settings: OpenAiSettings) -> Result<Self, NarrativeError> {
        let key = std::env::var(var).map_err(|_| NarrativeError::NotConfigured)?;
        Self::new(key, settings)
    }

    pub fn settings(&self) -> &OpenAiSettings {
        &self.settings
    }

    fn complete(&self, system: &str, user: String) -> Result<String, NarrativeError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let request = async {
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| NarrativeError::Http(e.to_string()))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(NarrativeError::RateLimited);
            }
            if status.is_client_error() {
                return Err(NarrativeError::Rejected(status.as_u16()));
            }
            if !status.is_success() {
                return Err(NarrativeError::Http(format!("HTTP {status}")));
            }
            resp.json::<Value>()
                .await
                .map_err(|e| NarrativeError::Malformed(e.to_string()))
        };

        let timeout = self.settings.timeout;
        let data = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, request).await })
            .map_err(|_| NarrativeError::Timeout(timeout.as_secs()))??;

        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| NarrativeError::Malformed("missing choices[0].message.content".into()))?
            .trim();
        if text.is_empty() {
            return Err(NarrativeError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

fn member_lines(members: &[MemberDescriptor]) -> String {
    members
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let due = m
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unscheduled".to_string());
            format!("{}. [{}] {} (due {})", i + 1, m.ticket_id, m.detail.trim(), due)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read the first non-empty string among `keys`.
fn first_text<'a>(entry: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| entry.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|t| !t.is_empty())
}

fn tag_text(tag: &Value) -> String {
    match tag {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn draft_from(entry: &Value, default_tags: &[String]) -> Option<SubtaskDraft> {
    let entry = entry.as_object()?;
    let text = first_text(entry, &["text_sub", "text"])?;

    let tags = match entry.get("tags") {
        None | Some(Value::Null) => default_tags.to_vec(),
        Some(Value::Array(list)) => list
            .iter()
            .filter(|t| !t.is_null())
            .map(tag_text)
            .filter(|t| !t.is_empty())
            .collect(),
        Some(single) => match tag_text(single) {
            t if t.is_empty() => default_tags.to_vec(),
            t => vec![t],
        },
    };

    let est_hours = match entry.get("est_hours") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|h| h.is_finite() && *h > 0.0);

    Some(SubtaskDraft {
        text: text.to_string(),
        tags,
        est_hours,
    })
}

/// Parse a completion into drafts, skipping entries without text.
fn parse_subtasks(raw: &str, request: &SubtaskRequest) -> Result<Vec<SubtaskDraft>, NarrativeError> {
    let body = raw.trim();
    let body = body
        .strip_prefix("```json")
        .or_else(|| body.strip_prefix("```"))
        .map(|b| b.trim_end().trim_end_matches("```"))
        .unwrap_or(body);

    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| NarrativeError::Malformed(format!("subtasks are not JSON: {e}")))?;
    let entries = value
        .as_array()
        .ok_or_else(|| NarrativeError::Malformed("subtasks must be a JSON array".into()))?;

    let drafts: Vec<SubtaskDraft> = entries
        .iter()
        .filter_map(|entry| draft_from(entry, &request.tags))
        .take(request.max_items)
        .collect();
    if drafts.is_empty() {
        return Err(NarrativeError::Malformed("no usable subtasks".into()));
    }
    Ok(drafts)
}

impl NarrativeAnnotator for OpenAiAnnotator {
    fn label_focus_block(&self, request: &FocusLabelRequest) -> Result<String, NarrativeError> {
        let user = format!(
            "Block date: {}\nCurrent label: {}\nItems:\n{}",
            request.date,
            request.fallback,
            member_lines(&request.items)
        );
        let text = self.complete(FOCUS_LABEL_PROMPT, user)?;
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    fn describe_group(
        &self,
        key: &str,
        members: &[MemberDescriptor],
    ) -> Result<String, NarrativeError> {
        let user = format!("Batch key: {key}\nItems:\n{}", member_lines(members));
        self.complete(GROUP_PROMPT, user)
    }

    fn summarize_day(&self, summary: &DaySummary) -> Result<String, NarrativeError> {
        let payload = serde_json::to_string_pretty(summary)
            .map_err(|e| NarrativeError::Malformed(e.to_string()))?;
        self.complete(DAY_SUMMARY_PROMPT, format!("Day data:\n{payload}"))
    }

    fn suggest_subtasks(
        &self,
        request: &SubtaskRequest,
    ) -> Result<Vec<SubtaskDraft>, NarrativeError> {
        let tags = if request.tags.is_empty() {
            "none".to_string()
        } else {
            request.tags.join(", ")
        };
        let user = format!(
            "Ticket title: {}\nStory points: {}\nTags: {tags}\nCreate at most {} subtasks.\n\
             Estimate each subtask in hours as a number (may be fractional).",
            request.title.trim(),
            request.story_points,
            request.max_items
        );
        let raw = self.complete(SUBTASK_PROMPT, user)?;
        parse_subtasks(&raw, request)
    }

    fn scope(&self) -> String {
        format!("{}@{}", self.settings.model, self.settings.temperature)
    }
}
