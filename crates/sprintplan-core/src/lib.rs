//! # Sprintplan Core Library
//!
//! This library turns a backlog of small work items into a day-by-day plan
//! and reconciles that plan every evening against what actually got done.
//! The `sprintplan` CLI is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Affinity grouping**: batches items that share infrastructure context
//!   and environment, read from their tags
//! - **Plan builder**: greedy allocation of batches and solo items to
//!   workdays under capacity and context-diversity limits
//! - **Evening reconciler**: applies completed/partial/blocked outcomes and
//!   carries unfinished work to the next workday
//! - **Narrative**: optional, best-effort labels and recaps from an
//!   OpenAI-compatible API, always backed by a deterministic fallback
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`AffinityGrouper`]: tag-based batching
//! - [`PlanBuilder`]: horizon planning
//! - [`EveningReconciler`]: end-of-day status and carry-forward
//! - [`Database`]: SQLite implementation of the [`store`] traits
//! - [`Config`]: application configuration management

pub mod affinity;
pub mod error;
pub mod evening;
pub mod narrative;
pub mod report;
pub mod schedule;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod work;

pub use affinity::{AffinityCandidate, AffinityGrouper, AffinityRun};
pub use error::{ConfigError, CoreError, DatabaseError, NarrativeError, ValidationError};
pub use evening::{BlockedItem, CarriedBlock, EveningOutcome, EveningReconciler, EveningReport};
pub use narrative::{DisabledAnnotator, NarrativeAnnotator};
pub use report::{morning_report, MorningReport};
pub use schedule::{AffinityGroup, PlanBlock, PlanBucket, PlannedBlock, Workdays};
pub use scheduler::{PlanBuilder, PlanConstraints, PlanOutcome, PlanRequest};
pub use storage::{Config, Database};
pub use work::{Ticket, WorkItem, WorkItemQuery, WorkItemStatus};
