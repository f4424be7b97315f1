//! Memoization of focus-block labels.
//!
//! The cache is owned by whoever constructs it (usually one CLI invocation),
//! so two planners never share results.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::NaiveDate;

use super::{
    DaySummary, FocusLabelRequest, MemberDescriptor, NarrativeAnnotator, SubtaskDraft,
    SubtaskRequest,
};
use crate::error::NarrativeError;

/// Default number of labels kept.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    date: NaiveDate,
    fallback: String,
    items: Vec<(String, String, String, Option<NaiveDate>)>,
    scope: String,
}

impl CacheKey {
    fn new(request: &FocusLabelRequest, scope: String) -> Self {
        Self {
            date: request.date,
            fallback: request.fallback.clone(),
            items: request
                .items
                .iter()
                .map(|m| {
                    (
                        m.item_id.clone(),
                        m.ticket_id.clone(),
                        m.detail.trim().to_string(),
                        m.due_date,
                    )
                })
                .collect(),
            scope,
        }
    }
}

#[derive(Default)]
struct Entries {
    map: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
}

/// Wraps an annotator and remembers successful focus labels.
///
/// Failures are not cached, so a later call may still succeed. Group
/// descriptions and day summaries pass straight through.
pub struct CachedAnnotator<A> {
    inner: A,
    capacity: usize,
    entries: Mutex<Entries>,
}

impl<A: NarrativeAnnotator> CachedAnnotator<A> {
    pub fn new(inner: A) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: A, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<A: NarrativeAnnotator> NarrativeAnnotator for CachedAnnotator<A> {
    fn label_focus_block(&self, request: &FocusLabelRequest) -> Result<String, NarrativeError> {
        let key = CacheKey::new(request, self.inner.scope());
        if let Some(hit) = self.lock().map.get(&key) {
            return Ok(hit.clone());
        }

        let label = self.inner.label_focus_block(request)?;

        let mut entries = self.lock();
        if entries.map.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
        if entries.map.insert(key.clone(), label.clone()).is_none() {
            entries.order.push_back(key);
        }
        Ok(label)
    }

    fn describe_group(
        &self,
        key: &str,
        members: &[MemberDescriptor],
    ) -> Result<String, NarrativeError> {
        self.inner.describe_group(key, members)
    }

    fn summarize_day(&self, summary: &DaySummary) -> Result<String, NarrativeError> {
        self.inner.summarize_day(summary)
    }

    fn suggest_subtasks(
        &self,
        request: &SubtaskRequest,
    ) -> Result<Vec<SubtaskDraft>, NarrativeError> {
        self.inner.suggest_subtasks(request)
    }

    fn scope(&self) -> String {
        self.inner.scope()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::testing::{EchoAnnotator, FailingAnnotator, ScriptedSubtasks};

    fn request(fallback: &str, detail: &str) -> FocusLabelRequest {
        FocusLabelRequest {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            fallback: fallback.into(),
            items: vec![MemberDescriptor {
                item_id: "i1".into(),
                ticket_id: "T1".into(),
                detail: detail.into(),
                due_date: None,
            }],
        }
    }

    #[test]
    fn repeated_request_hits_cache() {
        let cached = CachedAnnotator::new(EchoAnnotator::default());
        let first = cached.label_focus_block(&request("k", "work")).unwrap();
        let second = cached.label_focus_block(&request("k", " work ")).unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().label_calls.get(), 1);
    }

    #[test]
    fn different_fallback_misses() {
        let cached = CachedAnnotator::new(EchoAnnotator::default());
        cached.label_focus_block(&request("a", "work")).unwrap();
        cached.label_focus_block(&request("b", "work")).unwrap();
        assert_eq!(cached.inner().label_calls.get(), 2);
        assert_eq!(cached.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cached = CachedAnnotator::new(FailingAnnotator::default());
        assert!(cached.label_focus_block(&request("a", "w")).is_err());
        assert!(cached.label_focus_block(&request("a", "w")).is_err());
        assert_eq!(cached.inner().calls.get(), 2);
        assert!(cached.is_empty());
    }

    #[test]
    fn oldest_entry_evicted_at_capacity() {
        let cached = CachedAnnotator::with_capacity(EchoAnnotator::default(), 2);
        cached.label_focus_block(&request("a", "w")).unwrap();
        cached.label_focus_block(&request("b", "w")).unwrap();
        cached.label_focus_block(&request("c", "w")).unwrap();
        assert_eq!(cached.len(), 2);

        // "a" was evicted, so asking again calls through
        cached.label_focus_block(&request("a", "w")).unwrap();
        assert_eq!(cached.inner().label_calls.get(), 4);
    }

    #[test]
    fn subtask_suggestions_pass_through_uncached() {
        let cached = CachedAnnotator::new(ScriptedSubtasks {
            drafts: vec![SubtaskDraft {
                text: "Draft runbook".into(),
                tags: vec!["k8s".into()],
                est_hours: Some(2.0),
            }],
            ..ScriptedSubtasks::default()
        });
        let request = SubtaskRequest {
            ticket_id: "T1".into(),
            title: "Upgrade ingress".into(),
            story_points: 2,
            tags: vec!["k8s".into()],
            max_items: 5,
        };
        assert_eq!(cached.suggest_subtasks(&request).unwrap().len(), 1);
        assert_eq!(cached.suggest_subtasks(&request).unwrap().len(), 1);
        assert_eq!(cached.inner().calls.get(), 2);
        assert!(cached.is_empty());
    }
}
