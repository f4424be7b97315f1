//! Best-effort narrative enrichment.
//!
//! Every planning and reconciliation step computes a deterministic label or
//! result first. A [`NarrativeAnnotator`] may then replace that label with
//! friendlier text. Annotator failures never escape the call site: they are
//! logged and the deterministic value is kept.

pub mod cache;
pub mod openai;
pub mod retry;

pub use cache::CachedAnnotator;
pub use openai::OpenAiAnnotator;
pub use retry::RetryPolicy;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::NarrativeError;

/// One work item as presented to the annotator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    pub item_id: String,
    pub ticket_id: String,
    pub detail: String,
    pub due_date: Option<NaiveDate>,
}

/// Input for labelling one Focus block.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct FocusLabelRequest {
    pub date: NaiveDate,
    /// Deterministic label used when the annotator cannot help.
    pub fallback: String,
    pub items: Vec<MemberDescriptor>,
}

/// A blocked item and the reason given for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockedDescriptor {
    pub item: String,
    pub note: String,
}

/// What happened on one evening, in human terms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EveningDigest {
    pub date: NaiveDate,
    pub completed: Vec<String>,
    pub in_progress: Vec<String>,
    pub blocked: Vec<BlockedDescriptor>,
    pub carried: Vec<String>,
    pub notes: Vec<String>,
}

/// Today's plan, in human terms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MorningDigest {
    pub date: NaiveDate,
    pub checklist: Vec<String>,
    pub batches: Vec<String>,
    pub risks: Vec<String>,
    pub context_tags: Vec<String>,
}

/// Structured payload for a day summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DaySummary {
    Morning(MorningDigest),
    Evening(EveningDigest),
}

impl DaySummary {
    pub fn date(&self) -> NaiveDate {
        match self {
            DaySummary::Morning(m) => m.date,
            DaySummary::Evening(e) => e.date,
        }
    }
}

/// Input for breaking one ticket into work items.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubtaskRequest {
    pub ticket_id: String,
    pub title: String,
    pub story_points: u32,
    /// Ticket tags; drafts without their own tags inherit these.
    pub tags: Vec<String>,
    pub max_items: usize,
}

/// One suggested work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtaskDraft {
    pub text: String,
    pub tags: Vec<String>,
    pub est_hours: Option<f64>,
}

/// Source of optional human-readable text.
///
/// All methods default to [`NarrativeError::NotConfigured`], so an
/// implementation only overrides what it can actually produce.
pub trait NarrativeAnnotator {
    /// Short label for a Focus block.
    fn label_focus_block(&self, _request: &FocusLabelRequest) -> Result<String, NarrativeError> {
        Err(NarrativeError::NotConfigured)
    }

    /// One sentence explaining why an affinity group belongs together.
    fn describe_group(
        &self,
        _key: &str,
        _members: &[MemberDescriptor],
    ) -> Result<String, NarrativeError> {
        Err(NarrativeError::NotConfigured)
    }

    /// Free-text recap of a day.
    fn summarize_day(&self, _summary: &DaySummary) -> Result<String, NarrativeError> {
        Err(NarrativeError::NotConfigured)
    }

    /// Work item bullets for a ticket, at most `request.max_items`.
    fn suggest_subtasks(
        &self,
        _request: &SubtaskRequest,
    ) -> Result<Vec<SubtaskDraft>, NarrativeError> {
        Err(NarrativeError::NotConfigured)
    }

    /// Distinguishes cached results produced under different settings
    /// (model, temperature).
    fn scope(&self) -> String {
        String::new()
    }
}

/// Annotator that never produces text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAnnotator;

impl NarrativeAnnotator for DisabledAnnotator {}

impl<A: NarrativeAnnotator + ?Sized> NarrativeAnnotator for &A {
    fn label_focus_block(&self, request: &FocusLabelRequest) -> Result<String, NarrativeError> {
        (**self).label_focus_block(request)
    }

    fn describe_group(
        &self,
        key: &str,
        members: &[MemberDescriptor],
    ) -> Result<String, NarrativeError> {
        (**self).describe_group(key, members)
    }

    fn summarize_day(&self, summary: &DaySummary) -> Result<String, NarrativeError> {
        (**self).summarize_day(summary)
    }

    fn suggest_subtasks(
        &self,
        request: &SubtaskRequest,
    ) -> Result<Vec<SubtaskDraft>, NarrativeError> {
        (**self).suggest_subtasks(request)
    }

    fn scope(&self) -> String {
        (**self).scope()
    }
}

impl<A: NarrativeAnnotator + ?Sized> NarrativeAnnotator for Box<A> {
    fn label_focus_block(&self, request: &FocusLabelRequest) -> Result<String, NarrativeError> {
        (**self).label_focus_block(request)
    }

    fn describe_group(
        &self,
        key: &str,
        members: &[MemberDescriptor],
    ) -> Result<String, NarrativeError> {
        (**self).describe_group(key, members)
    }

    fn summarize_day(&self, summary: &DaySummary) -> Result<String, NarrativeError> {
        (**self).summarize_day(summary)
    }

    fn suggest_subtasks(
        &self,
        request: &SubtaskRequest,
    ) -> Result<Vec<SubtaskDraft>, NarrativeError> {
        (**self).suggest_subtasks(request)
    }

    fn scope(&self) -> String {
        (**self).scope()
    }
}

/// Label for a Focus block: the annotator's text if it has any, else the
/// request's fallback.
pub fn label_or_fallback(annotator: &dyn NarrativeAnnotator, request: &FocusLabelRequest) -> String {
    if request.items.is_empty() {
        return request.fallback.clone();
    }
    match annotator.label_focus_block(request) {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => request.fallback.clone(),
        Err(NarrativeError::NotConfigured) => request.fallback.clone(),
        Err(e) => {
            tracing::warn!(
                fallback = %request.fallback,
                date = %request.date,
                "focus label unavailable: {e}"
            );
            request.fallback.clone()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{EchoAnnotator, FailingAnnotator};
    use super::*;

    fn request(items: usize) -> FocusLabelRequest {
        FocusLabelRequest {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            fallback: "aws.lambda".into(),
            items: (0..items)
                .map(|i| MemberDescriptor {
                    item_id: format!("i{i}"),
                    ticket_id: "T".into(),
                    detail: "work".into(),
                    due_date: None,
                })
                .collect(),
        }
    }

    #[test]
    fn disabled_annotator_uses_fallback() {
        assert_eq!(label_or_fallback(&DisabledAnnotator, &request(2)), "aws.lambda");
    }

    #[test]
    fn failing_annotator_uses_fallback() {
        let annotator = FailingAnnotator::default();
        assert_eq!(label_or_fallback(&annotator, &request(1)), "aws.lambda");
        assert_eq!(annotator.calls.get(), 1);
    }

    #[test]
    fn annotator_text_overwrites_fallback() {
        assert_eq!(label_or_fallback(&EchoAnnotator::default(), &request(1)), "label:aws.lambda");
    }

    #[test]
    fn empty_request_skips_annotator() {
        let annotator = EchoAnnotator::default();
        assert_eq!(label_or_fallback(&annotator, &request(0)), "aws.lambda");
        assert_eq!(annotator.label_calls.get(), 0);
    }

    #[test]
    fn day_summary_serializes_with_kind_tag() {
        let summary = DaySummary::Evening(EveningDigest {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            completed: vec!["T: a".into()],
            in_progress: vec![],
            blocked: vec![],
            carried: vec![],
            notes: vec![],
        });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "evening");
        assert_eq!(json["date"], "2024-01-02");
    }
}
