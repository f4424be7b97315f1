//! Tickets and the work items they decompose into.
//!
//! A [`Ticket`] comes from an external tracker and is read-only to the
//! scheduling core apart from its due date. A [`WorkItem`] is the smallest
//! schedulable unit: it belongs to exactly one ticket and carries the tags the
//! affinity grouper reads.

pub mod decompose;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Work item status.
///
/// Evening reconciliation moves items between any two states:
///
///   todo | in_progress | blocked ──completed──> done
///   todo | in_progress | blocked ──partial────> in_progress
///   todo | in_progress | blocked ──blocked────> blocked
///
/// Items not mentioned in an evening report keep their status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Todo,
    InProgress,
    Blocked,
    Done,
}

/// Tickets share the work item status vocabulary.
pub type TicketStatus = WorkItemStatus;

impl WorkItemStatus {
    pub const ALL: [WorkItemStatus; 4] = [
        WorkItemStatus::Todo,
        WorkItemStatus::InProgress,
        WorkItemStatus::Blocked,
        WorkItemStatus::Done,
    ];

    /// Statuses the planner treats as open work.
    pub const OPEN: [WorkItemStatus; 2] = [WorkItemStatus::Todo, WorkItemStatus::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemStatus::Todo => "todo",
            WorkItemStatus::InProgress => "in_progress",
            WorkItemStatus::Blocked => "blocked",
            WorkItemStatus::Done => "done",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, WorkItemStatus::Todo | WorkItemStatus::InProgress)
    }
}

impl Default for WorkItemStatus {
    fn default() -> Self {
        WorkItemStatus::Todo
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkItemStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(WorkItemStatus::Todo),
            "in_progress" | "in-progress" => Ok(WorkItemStatus::InProgress),
            "blocked" => Ok(WorkItemStatus::Blocked),
            "done" => Ok(WorkItemStatus::Done),
            _ => Err(ValidationError::UnknownStatus(s.to_string())),
        }
    }
}

/// A ticket imported from the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub story_points: u32,
    /// Technology tags, copied onto generated work items.
    #[serde(default)]
    pub tech: Vec<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: TicketStatus,
}

impl Ticket {
    pub fn new(id: impl Into<String>, title: impl Into<String>, story_points: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            story_points,
            tech: Vec::new(),
            due_date: None,
            status: TicketStatus::Todo,
        }
    }

    pub fn with_tech<I, S>(mut self, tech: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tech = tech.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }
}

/// A schedulable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    pub id: String,
    pub ticket_id: String,
    /// Ordinal within the ticket, starting at 1.
    pub seq: u32,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub est_hours: Option<f64>,
    #[serde(default)]
    pub status: WorkItemStatus,
}

impl WorkItem {
    pub fn new(ticket_id: impl Into<String>, seq: u32, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ticket_id.into(),
            seq,
            text: text.into(),
            tags: Vec::new(),
            est_hours: None,
            status: WorkItemStatus::Todo,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: WorkItemStatus) -> Self {
        self.status = status;
        self
    }

    /// `<ticket>: <text>`, the form used in summaries and narrative prompts.
    pub fn descriptor(&self) -> String {
        format!("{}: {}", self.ticket_id, self.text)
    }
}

/// Filter for [`crate::store::WorkItemStore::list_work_items`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkItemQuery {
    /// Empty means any status.
    pub statuses: Vec<WorkItemStatus>,
    /// Empty means every ticket.
    pub ticket_ids: Vec<String>,
}

impl WorkItemQuery {
    /// Todo and in-progress items, optionally restricted to some tickets.
    pub fn open(ticket_ids: &[String]) -> Self {
        Self {
            statuses: WorkItemStatus::OPEN.to_vec(),
            ticket_ids: ticket_ids.to_vec(),
        }
    }
}
