//! Plan and audit-log types shared by the plan builder, the evening
//! reconciler and the store.

pub mod workdays;

pub use workdays::{Workdays, MAX_HORIZON_DAYS};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::work::WorkItemStatus;

/// Note given to the daily Admin block.
pub const BUFFER_NOTE: &str = "Buffer/Slack";

/// Kind of a scheduled block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlanBucket {
    /// Concentrated work on one batch or one solo item
    Focus,
    /// Unscheduled slack kept free every day
    Admin,
    /// Calendar time (never produced by the builder)
    Meeting,
}

impl PlanBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanBucket::Focus => "Focus",
            PlanBucket::Admin => "Admin",
            PlanBucket::Meeting => "Meeting",
        }
    }
}

impl fmt::Display for PlanBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanBucket {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Focus" => Ok(PlanBucket::Focus),
            "Admin" => Ok(PlanBucket::Admin),
            "Meeting" => Ok(PlanBucket::Meeting),
            _ => Err(ValidationError::UnknownBucket(s.to_string())),
        }
    }
}

/// A block produced by the plan builder, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedBlock {
    pub date: NaiveDate,
    pub bucket: PlanBucket,
    pub note: Option<String>,
    pub item_ids: Vec<String>,
}

impl PlannedBlock {
    pub fn focus(date: NaiveDate, note: impl Into<String>, item_ids: Vec<String>) -> Self {
        Self {
            date,
            bucket: PlanBucket::Focus,
            note: Some(note.into()),
            item_ids,
        }
    }

    pub fn buffer(date: NaiveDate) -> Self {
        Self {
            date,
            bucket: PlanBucket::Admin,
            note: Some(BUFFER_NOTE.to_string()),
            item_ids: Vec::new(),
        }
    }
}

/// A persisted plan row with its member links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanBlock {
    pub id: String,
    pub date: NaiveDate,
    pub bucket: PlanBucket,
    pub note: Option<String>,
    pub item_ids: Vec<String>,
}

/// A set of work items worth doing together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffinityGroup {
    /// `<contexts or "misc">[:<env>]`, e.g. `aws.lambda+terraform:staging`.
    pub key: String,
    pub rationale: String,
    pub member_ids: Vec<String>,
}

impl AffinityGroup {
    /// The context part of the key (everything before the first `:`).
    pub fn context_prefix(&self) -> &str {
        context_prefix(&self.key)
    }
}

/// Context part of an affinity key.
pub fn context_prefix(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

/// One audit log per calendar date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyLog {
    pub id: String,
    pub date: NaiveDate,
}

/// One status change recorded in a daily log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyLogItem {
    pub item_id: String,
    pub status: WorkItemStatus,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_parse() {
        assert_eq!("Focus".parse::<PlanBucket>().unwrap(), PlanBucket::Focus);
        assert_eq!("Admin".parse::<PlanBucket>().unwrap(), PlanBucket::Admin);
        assert!("focus".parse::<PlanBucket>().is_err());
    }

    #[test]
    fn prefix_strips_environment() {
        assert_eq!(context_prefix("aws.lambda+terraform:staging"), "aws.lambda+terraform");
        assert_eq!(context_prefix("misc"), "misc");
        assert_eq!(context_prefix("misc:prod"), "misc");
    }

    #[test]
    fn buffer_block_has_no_members() {
        let block = PlannedBlock::buffer(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(block.bucket, PlanBucket::Admin);
        assert!(block.item_ids.is_empty());
        assert_eq!(block.note.as_deref(), Some(BUFFER_NOTE));
    }
}
