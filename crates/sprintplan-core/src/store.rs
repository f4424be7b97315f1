//! Storage seams used by the scheduling core.
//!
//! The core never talks to SQLite directly; it asks for these capabilities
//! and [`crate::storage::Database`] provides them. Tests and alternative
//! backends can implement the same traits.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::Result;
use crate::schedule::{AffinityGroup, DailyLog, DailyLogItem, PlanBlock, PlanBucket, PlannedBlock};
use crate::work::{WorkItem, WorkItemQuery, WorkItemStatus};

/// Work items and ticket metadata.
pub trait WorkItemStore {
    /// Items matching `query`, ordered by (ticket id, seq).
    fn list_work_items(&self, query: &WorkItemQuery) -> Result<Vec<WorkItem>>;

    fn work_item(&self, id: &str) -> Result<Option<WorkItem>>;

    /// Due date per ticket. Unknown tickets are absent from the map.
    fn ticket_due_dates(&self, ticket_ids: &[String]) -> Result<HashMap<String, Option<NaiveDate>>>;

    /// Set `status` on every existing id. Missing ids are skipped; the
    /// return value counts rows actually updated.
    fn set_work_item_status(&self, ids: &[String], status: WorkItemStatus) -> Result<usize>;
}

/// Persisted affinity groups.
pub trait AffinityStore {
    fn clear_affinity_groups(&self) -> Result<usize>;
    fn insert_affinity_groups(&self, groups: &[AffinityGroup]) -> Result<()>;
    fn list_affinity_groups(&self) -> Result<Vec<AffinityGroup>>;
}

/// Persisted plan blocks.
pub trait PlanStore {
    /// Delete blocks dated on or after `date`. Returns the number removed.
    fn delete_plan_from(&self, date: NaiveDate) -> Result<usize>;

    /// Write blocks in order; returns them with their new ids.
    fn insert_plan_blocks(&self, blocks: &[PlannedBlock]) -> Result<Vec<PlanBlock>>;

    /// Blocks on `date` in insertion order.
    fn plan_blocks_on(&self, date: NaiveDate) -> Result<Vec<PlanBlock>>;

    /// Every block ordered by (date, insertion order).
    fn list_plan_blocks(&self) -> Result<Vec<PlanBlock>>;

    /// First Focus block on `date` carrying exactly `note`.
    fn find_focus_block(&self, date: NaiveDate, note: &str) -> Result<Option<PlanBlock>>;

    fn create_plan_block(
        &self,
        date: NaiveDate,
        bucket: PlanBucket,
        note: Option<&str>,
    ) -> Result<PlanBlock>;

    /// Link items to a block, ignoring links that already exist. Returns
    /// the number of new links.
    fn attach_items(&self, block_id: &str, item_ids: &[String]) -> Result<usize>;
}

/// Append-only evening audit trail.
pub trait DailyLogStore {
    /// The log for `date`, created on first use.
    fn daily_log_for(&self, date: NaiveDate) -> Result<DailyLog>;

    fn append_log_item(&self, log: &DailyLog, item: &DailyLogItem) -> Result<()>;

    fn log_items_on(&self, date: NaiveDate) -> Result<Vec<DailyLogItem>>;
}

/// All-or-nothing execution of a group of store operations.
pub trait Transactional {
    /// Run `f`; commit when it returns `Ok`, roll back otherwise.
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}
