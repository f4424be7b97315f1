//! Plan builder: allocate batches and solo items to workdays.
//!
//! The builder is a greedy, deterministic walk over two queues:
//! - *batches*: affinity keys with at least two open members, ordered by
//!   earliest member due date, then by their first member in
//!   (ticket, seq) order,
//! - *singletons*: everything else, ordered by (due date, ticket, seq).
//!
//! Both cursors are shared across the horizon. Each day gets up to
//! [`PlanConstraints::focus_blocks_per_day`] Focus blocks, limited to
//! `max_contexts_per_day` distinct context prefixes, and one Admin block.
//!
//! # Usage
//! ```rust,ignore
//! use sprintplan_core::scheduler::{PlanBuilder, PlanRequest};
//!
//! let request = PlanRequest::new(start).with_days(5);
//! let stored = PlanBuilder::new().build_with_store(&db, &request, &annotator)?;
//! ```

pub mod capacity;

pub use capacity::PlanConstraints;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::narrative::{label_or_fallback, FocusLabelRequest, MemberDescriptor, NarrativeAnnotator};
use crate::schedule::{context_prefix, AffinityGroup, PlanBlock, PlannedBlock, Workdays};
use crate::store::{AffinityStore, PlanStore, Transactional, WorkItemStore};
use crate::work::{WorkItem, WorkItemQuery};

/// Default horizon length in workdays.
pub const DEFAULT_HORIZON_DAYS: u32 = 5;

/// Parameters of one planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub start: NaiveDate,
    /// Number of workdays to plan.
    pub days: u32,
    pub workdays: Workdays,
    pub constraints: PlanConstraints,
    /// Replace stored blocks dated on or after the first horizon day.
    pub clear_existing: bool,
    /// Restrict planning to these tickets. Empty means all.
    pub ticket_ids: Vec<String>,
}

impl PlanRequest {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            start,
            days: DEFAULT_HORIZON_DAYS,
            workdays: Workdays::default(),
            constraints: PlanConstraints::default(),
            clear_existing: true,
            ticket_ids: Vec::new(),
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn with_workdays(mut self, workdays: Workdays) -> Self {
        self.workdays = workdays;
        self
    }

    pub fn with_constraints(mut self, constraints: PlanConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn keep_existing(mut self) -> Self {
        self.clear_existing = false;
        self
    }

    pub fn with_tickets(mut self, ticket_ids: Vec<String>) -> Self {
        self.ticket_ids = ticket_ids;
        self
    }
}

/// Data the builder plans from.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    /// Candidate items. Only todo and in-progress items are planned.
    pub items: &'a [WorkItem],
    /// Due date per ticket id.
    pub due_dates: &'a HashMap<String, Option<NaiveDate>>,
    pub groups: &'a [AffinityGroup],
}

/// Result of a planning run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    /// Workdays covered by the run.
    pub horizon: Vec<NaiveDate>,
    /// Blocks in emission order: per day, Focus blocks then the Admin block.
    pub blocks: Vec<PlannedBlock>,
    /// Open items that found no place in the horizon.
    pub unscheduled: Vec<String>,
}

impl PlanOutcome {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks_on(&self, date: NaiveDate) -> impl Iterator<Item = &PlannedBlock> {
        self.blocks.iter().filter(move |b| b.date == date)
    }
}

/// A planning run after it was written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPlan {
    pub outcome: PlanOutcome,
    pub blocks: Vec<PlanBlock>,
    /// Stored blocks removed before writing.
    pub cleared: usize,
}

struct Batch<'a> {
    key: &'a str,
    earliest_due: Option<NaiveDate>,
    /// Smallest (ticket, seq) among the members.
    first_member: (&'a str, u32),
    members: Vec<&'a WorkItem>,
}

/// Per-day bookkeeping of context prefixes and used capacity.
struct DayState<'a> {
    contexts: BTreeSet<&'a str>,
    placed: u32,
}

impl<'a> DayState<'a> {
    fn new() -> Self {
        Self {
            contexts: BTreeSet::new(),
            placed: 0,
        }
    }

    fn admits(&self, prefix: &str, max_contexts: u32) -> bool {
        self.contexts.contains(prefix) || (self.contexts.len() as u32) < max_contexts
    }
}

/// Greedy horizon planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanBuilder;

impl PlanBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Plan `inputs` over the request's horizon.
    ///
    /// Invalid constraints and empty horizons are rejected before anything
    /// is computed. No open items yields an empty plan.
    pub fn build(
        &self,
        request: &PlanRequest,
        inputs: PlanInputs<'_>,
        annotator: &dyn NarrativeAnnotator,
    ) -> Result<PlanOutcome> {
        request.constraints.validate()?;
        let horizon = request.workdays.horizon(request.start, request.days)?;

        let due_of = |item: &WorkItem| -> Option<NaiveDate> {
            inputs.due_dates.get(&item.ticket_id).copied().flatten()
        };
        let order_key = |item: &WorkItem| {
            (
                due_of(item).unwrap_or(NaiveDate::MAX),
                item.ticket_id.clone(),
                item.seq,
            )
        };

        let mut open: Vec<&WorkItem> = inputs.items.iter().filter(|i| i.status.is_open()).collect();
        if open.is_empty() {
            tracing::info!("no open work items; nothing to plan");
            return Ok(PlanOutcome {
                horizon,
                ..PlanOutcome::default()
            });
        }
        open.sort_by_key(|i| order_key(i));

        let dominant = dominant_keys(&open, inputs.groups);

        let mut by_key: BTreeMap<&str, Vec<&WorkItem>> = BTreeMap::new();
        let mut singletons: Vec<&WorkItem> = Vec::new();
        for item in &open {
            match dominant.get(item.id.as_str()) {
                Some(key) => by_key.entry(*key).or_default().push(item),
                None => singletons.push(item),
            }
        }

        let mut batches: Vec<Batch<'_>> = Vec::new();
        for (key, members) in by_key {
            if members.len() < 2 {
                singletons.extend(members);
                continue;
            }
            let earliest_due = members.iter().filter_map(|m| due_of(m)).min();
            let first_member = members
                .iter()
                .map(|m| (m.ticket_id.as_str(), m.seq))
                .min()
                .unwrap_or_default();
            batches.push(Batch {
                key,
                earliest_due,
                first_member,
                members,
            });
        }
        batches.sort_by(|a, b| {
            let a_due = a.earliest_due.unwrap_or(NaiveDate::MAX);
            let b_due = b.earliest_due.unwrap_or(NaiveDate::MAX);
            a_due
                .cmp(&b_due)
                .then_with(|| a.first_member.cmp(&b.first_member))
                .then_with(|| a.key.cmp(b.key))
        });
        singletons.sort_by_key(|i| order_key(i));

        let constraints = &request.constraints;
        let per_day = constraints.focus_blocks_per_day();
        let max_contexts = constraints.max_contexts_per_day;
        tracing::debug!(
            batches = batches.len(),
            singletons = singletons.len(),
            per_day,
            buffer = constraints.buffer_blocks(),
            "plan queues ready"
        );

        let describe = |members: &[&WorkItem]| -> Vec<MemberDescriptor> {
            members
                .iter()
                .map(|m| MemberDescriptor {
                    item_id: m.id.clone(),
                    ticket_id: m.ticket_id.clone(),
                    detail: m.text.clone(),
                    due_date: due_of(m),
                })
                .collect()
        };

        let mut used: HashSet<&str> = HashSet::new();
        let mut blocks = Vec::new();
        let mut batch_cursor = 0;
        let mut single_cursor = 0;

        for &day in &horizon {
            let mut state = DayState::new();

            while state.placed < per_day && batch_cursor < batches.len() {
                let batch = &batches[batch_cursor];
                batch_cursor += 1;

                let prefix = context_prefix(batch.key);
                if !state.admits(prefix, max_contexts) {
                    tracing::debug!(%day, key = batch.key, "batch skipped: context limit");
                    continue;
                }
                let members: Vec<&WorkItem> = batch
                    .members
                    .iter()
                    .copied()
                    .filter(|m| !used.contains(m.id.as_str()))
                    .collect();
                if members.is_empty() {
                    continue;
                }

                state.contexts.insert(prefix);
                state.placed += 1;
                used.extend(members.iter().map(|m| m.id.as_str()));

                let label = label_or_fallback(
                    annotator,
                    &FocusLabelRequest {
                        date: day,
                        fallback: batch.key.to_string(),
                        items: describe(&members),
                    },
                );
                blocks.push(PlannedBlock::focus(
                    day,
                    label,
                    members.iter().map(|m| m.id.clone()).collect(),
                ));
            }

            while state.placed < per_day && single_cursor < singletons.len() {
                let item = singletons[single_cursor];
                single_cursor += 1;
                if used.contains(item.id.as_str()) {
                    continue;
                }

                let dominant_key = dominant.get(item.id.as_str()).copied();
                let prefix = dominant_key.map(context_prefix).unwrap_or(item.ticket_id.as_str());
                if !state.admits(prefix, max_contexts) {
                    tracing::debug!(%day, item = %item.id, "singleton skipped: context limit");
                    continue;
                }

                state.contexts.insert(prefix);
                state.placed += 1;
                used.insert(item.id.as_str());

                let fallback = match dominant_key {
                    Some(key) => key.to_string(),
                    None => format!("solo:{}", item.ticket_id),
                };
                let label = label_or_fallback(
                    annotator,
                    &FocusLabelRequest {
                        date: day,
                        fallback,
                        items: describe(&[item]),
                    },
                );
                blocks.push(PlannedBlock::focus(day, label, vec![item.id.clone()]));
            }

            blocks.push(PlannedBlock::buffer(day));
        }

        let unscheduled: Vec<String> = open
            .iter()
            .filter(|i| !used.contains(i.id.as_str()))
            .map(|i| i.id.clone())
            .collect();
        if !unscheduled.is_empty() {
            tracing::warn!(count = unscheduled.len(), "open items left outside the horizon");
        }

        tracing::info!(
            days = horizon.len(),
            blocks = blocks.len(),
            placed = used.len(),
            "plan built"
        );
        Ok(PlanOutcome {
            horizon,
            blocks,
            unscheduled,
        })
    }

    /// Load inputs from the store, build the plan and persist it.
    ///
    /// Clearing and writing happen in one transaction. An empty plan leaves
    /// stored blocks untouched.
    pub fn build_with_store<S>(
        &self,
        store: &S,
        request: &PlanRequest,
        annotator: &dyn NarrativeAnnotator,
    ) -> Result<StoredPlan>
    where
        S: WorkItemStore + AffinityStore + PlanStore + Transactional,
    {
        let items = store.list_work_items(&WorkItemQuery::open(&request.ticket_ids))?;
        let ticket_ids: Vec<String> = items
            .iter()
            .map(|i| i.ticket_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let due_dates = store.ticket_due_dates(&ticket_ids)?;
        let groups = store.list_affinity_groups()?;

        let outcome = self.build(
            request,
            PlanInputs {
                items: &items,
                due_dates: &due_dates,
                groups: &groups,
            },
            annotator,
        )?;

        if outcome.is_empty() {
            return Ok(StoredPlan {
                outcome,
                blocks: Vec::new(),
                cleared: 0,
            });
        }

        let (cleared, blocks) = store.atomically(|tx| {
            let mut cleared = 0;
            if request.clear_existing {
                if let Some(first) = outcome.horizon.first() {
                    cleared = tx.delete_plan_from(*first)?;
                }
            }
            let blocks = tx.insert_plan_blocks(&outcome.blocks)?;
            Ok((cleared, blocks))
        })?;

        tracing::info!(cleared, written = blocks.len(), "plan stored");
        Ok(StoredPlan {
            outcome,
            blocks,
            cleared,
        })
    }
}

/// Smallest key among the groups containing each open item.
fn dominant_keys<'a>(open: &[&WorkItem], groups: &'a [AffinityGroup]) -> HashMap<String, &'a str> {
    let open_ids: HashSet<&str> = open.iter().map(|i| i.id.as_str()).collect();
    let mut dominant: HashMap<String, &'a str> = HashMap::new();
    for group in groups {
        for member in &group.member_ids {
            if !open_ids.contains(member.as_str()) {
                continue;
            }
            dominant
                .entry(member.clone())
                .and_modify(|current| {
                    if group.key.as_str() < *current {
                        *current = group.key.as_str();
                    }
                })
                .or_insert(group.key.as_str());
        }
    }
    dominant
}
