//! Evening reconciliation: apply the day's outcomes and carry the rest.
//!
//! One run does four things, the first three in a single store transaction:
//! - set item statuses (completed → done, partial → in progress,
//!   blocked → blocked),
//! - append one audit entry per touched item to the day's log,
//! - carry every unfinished block member to the next workday, keeping the
//!   note of the block it came from,
//! - ask the narrative annotator for a recap (best effort, retried).
//!
//! # Usage
//! ```rust,ignore
//! use sprintplan_core::evening::{EveningReconciler, EveningReport};
//!
//! let report = EveningReport::new(today).with_completed(["a"]).with_partial(["b"]);
//! let outcome = EveningReconciler::new().reconcile_with_store(&db, &report, &annotator)?;
//! println!("{:?}", outcome.notes);
//! ```

pub mod carry_forward;

pub use carry_forward::{carry_groups, CarryGroup, SOLO_NOTE};

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{NarrativeError, Result, ValidationError};
use crate::narrative::{BlockedDescriptor, DaySummary, EveningDigest, NarrativeAnnotator, RetryPolicy};
use crate::schedule::{DailyLogItem, PlanBucket, Workdays};
use crate::store::{DailyLogStore, PlanStore, Transactional, WorkItemStore};
use crate::work::{WorkItem, WorkItemStatus};

/// A blocked item and why it is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedItem {
    pub id: String,
    pub note: String,
}

impl BlockedItem {
    pub fn new(id: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            note: note.into(),
        }
    }
}

/// What the user reports at the end of `date`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EveningReport {
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: Vec<String>,
    #[serde(default)]
    pub partial: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<BlockedItem>,
}

impl EveningReport {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    pub fn with_completed<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_partial<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partial.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_blocked(mut self, id: impl Into<String>, note: impl Into<String>) -> Self {
        self.blocked.push(BlockedItem::new(id, note));
        self
    }

    /// Collapse duplicates within each list and reject ids reported under
    /// two different outcomes.
    pub fn normalized(&self) -> std::result::Result<EveningReport, ValidationError> {
        let completed = dedup(self.completed.iter().cloned());
        let partial = dedup(self.partial.iter().cloned());

        let mut blocked: Vec<BlockedItem> = Vec::new();
        for item in &self.blocked {
            if !blocked.iter().any(|b| b.id == item.id) {
                blocked.push(item.clone());
            }
        }

        let conflict = |id: &str, first: &'static str, second: &'static str| {
            ValidationError::ConflictingOutcome {
                id: id.to_string(),
                first,
                second,
            }
        };
        for id in &partial {
            if completed.contains(id) {
                return Err(conflict(id, "completed", "partial"));
            }
        }
        for item in &blocked {
            if completed.contains(&item.id) {
                return Err(conflict(&item.id, "completed", "blocked"));
            }
            if partial.contains(&item.id) {
                return Err(conflict(&item.id, "partial", "blocked"));
            }
        }

        Ok(EveningReport {
            date: self.date,
            completed,
            partial,
            blocked,
        })
    }
}

fn dedup(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.clone())).collect()
}

/// A next-day block that received carried items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarriedBlock {
    pub block_id: String,
    pub date: NaiveDate,
    pub bucket: PlanBucket,
    pub note: String,
    /// Items carried under this note.
    pub item_ids: Vec<String>,
    /// Links that did not exist before the run.
    pub newly_attached: usize,
}

/// Result of one evening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EveningOutcome {
    pub date: NaiveDate,
    pub target_day: NaiveDate,
    /// Rows whose status was updated.
    pub status_updates: usize,
    pub log_entries: Vec<DailyLogItem>,
    pub plan_delta: Vec<CarriedBlock>,
    pub notes: Vec<String>,
    pub summary: Option<String>,
}

impl EveningOutcome {
    pub fn carried_count(&self) -> usize {
        self.plan_delta.iter().map(|b| b.item_ids.len()).sum()
    }
}

/// Applies evening reports against a store.
#[derive(Debug, Clone, Default)]
pub struct EveningReconciler {
    workdays: Workdays,
    retry: RetryPolicy,
}

impl EveningReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workdays(mut self, workdays: Workdays) -> Self {
        self.workdays = workdays;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn workdays(&self) -> &Workdays {
        &self.workdays
    }

    /// Apply `report` and carry unfinished work forward.
    ///
    /// Validation happens before anything is written. Status changes, the
    /// audit log and carried blocks commit together; the recap is requested
    /// only after that commit and never fails the run.
    pub fn reconcile_with_store<S>(
        &self,
        store: &S,
        report: &EveningReport,
        annotator: &dyn NarrativeAnnotator,
    ) -> Result<EveningOutcome>
    where
        S: WorkItemStore + PlanStore + DailyLogStore + Transactional,
    {
        let report = report.normalized()?;
        let target_day = self.workdays.next_after(report.date)?;

        let applied = store.atomically(|tx| apply(tx, &report, target_day))?;

        let mut notes = Vec::new();
        let carried: usize = applied.plan_delta.iter().map(|b| b.item_ids.len()).sum();
        if carried > 0 {
            notes.push(format!("Carried {carried} work item(s) to {target_day}."));
        }
        tracing::info!(
            date = %report.date,
            updates = applied.status_updates,
            logged = applied.log_entries.len(),
            carried,
            "evening reconciled"
        );

        let digest = EveningDigest {
            date: report.date,
            completed: applied.completed.iter().map(WorkItem::descriptor).collect(),
            in_progress: applied.partial.iter().map(WorkItem::descriptor).collect(),
            blocked: applied
                .blocked
                .iter()
                .map(|(item, note)| BlockedDescriptor {
                    item: item.descriptor(),
                    note: note.clone(),
                })
                .collect(),
            carried: applied.carried.iter().map(WorkItem::descriptor).collect(),
            notes: notes.clone(),
        };
        let summary = self.summarize(annotator, &DaySummary::Evening(digest));

        Ok(EveningOutcome {
            date: report.date,
            target_day,
            status_updates: applied.status_updates,
            log_entries: applied.log_entries,
            plan_delta: applied.plan_delta,
            notes,
            summary,
        })
    }

    fn summarize(&self, annotator: &dyn NarrativeAnnotator, summary: &DaySummary) -> Option<String> {
        match self.retry.run_blocking(|_| annotator.summarize_day(summary)) {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) | Err(NarrativeError::NotConfigured) => None,
            Err(e) => {
                tracing::warn!(date = %summary.date(), "day summary unavailable: {e}");
                None
            }
        }
    }
}

/// Everything written inside the transaction, plus the items it touched.
struct Applied {
    status_updates: usize,
    log_entries: Vec<DailyLogItem>,
    plan_delta: Vec<CarriedBlock>,
    completed: Vec<WorkItem>,
    partial: Vec<WorkItem>,
    blocked: Vec<(WorkItem, String)>,
    carried: Vec<WorkItem>,
}

fn existing<S: WorkItemStore>(store: &S, ids: &[String]) -> Result<Vec<WorkItem>> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        match store.work_item(id)? {
            Some(item) => items.push(item),
            None => tracing::warn!(item = %id, "unknown work item in evening report, skipped"),
        }
    }
    Ok(items)
}

fn ids_of(items: &[WorkItem]) -> Vec<String> {
    items.iter().map(|i| i.id.clone()).collect()
}

fn apply<S>(store: &S, report: &EveningReport, target_day: NaiveDate) -> Result<Applied>
where
    S: WorkItemStore + PlanStore + DailyLogStore,
{
    let completed = existing(store, &report.completed)?;
    let partial = existing(store, &report.partial)?;
    let mut blocked = Vec::new();
    for entry in &report.blocked {
        match store.work_item(&entry.id)? {
            Some(item) => blocked.push((item, entry.note.clone())),
            None => tracing::warn!(item = %entry.id, "unknown work item in evening report, skipped"),
        }
    }

    let mut status_updates = store.set_work_item_status(&ids_of(&completed), WorkItemStatus::Done)?;
    status_updates += store.set_work_item_status(&ids_of(&partial), WorkItemStatus::InProgress)?;
    let blocked_ids: Vec<String> = blocked.iter().map(|(i, _)| i.id.clone()).collect();
    status_updates += store.set_work_item_status(&blocked_ids, WorkItemStatus::Blocked)?;

    let log = store.daily_log_for(report.date)?;
    let mut log_entries = Vec::new();
    let plain = completed
        .iter()
        .map(|i| (i, WorkItemStatus::Done, None))
        .chain(partial.iter().map(|i| (i, WorkItemStatus::InProgress, None)));
    let noted = blocked
        .iter()
        .map(|(i, note)| (i, WorkItemStatus::Blocked, Some(note.clone())));
    for (item, status, note) in plain.chain(noted) {
        let entry = DailyLogItem {
            item_id: item.id.clone(),
            status,
            note,
        };
        store.append_log_item(&log, &entry)?;
        log_entries.push(entry);
    }

    let done: HashSet<&str> = report.completed.iter().map(String::as_str).collect();
    let today = store.plan_blocks_on(report.date)?;
    let mut plan_delta = Vec::new();
    for group in carry_groups(&today, &done) {
        let block = match store.find_focus_block(target_day, &group.note)? {
            Some(block) => block,
            None => store.create_plan_block(target_day, PlanBucket::Focus, Some(&group.note))?,
        };
        let newly_attached = store.attach_items(&block.id, &group.item_ids)?;
        tracing::debug!(
            note = %group.note,
            block = %block.id,
            items = group.item_ids.len(),
            newly_attached,
            "carried block"
        );
        plan_delta.push(CarriedBlock {
            block_id: block.id,
            date: target_day,
            bucket: PlanBucket::Focus,
            note: group.note,
            item_ids: group.item_ids,
            newly_attached,
        });
    }

    let carried_ids: Vec<String> = plan_delta
        .iter()
        .flat_map(|b| b.item_ids.iter().cloned())
        .collect();
    let carried = existing(store, &carried_ids)?;

    Ok(Applied {
        status_updates,
        log_entries,
        plan_delta,
        completed,
        partial,
        blocked,
        carried,
    })
}
