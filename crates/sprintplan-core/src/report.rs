//! Morning report: today's plan as a checklist.
//!
//! The report is a read-only projection of stored plan blocks. Focus blocks
//! contribute one checklist entry per member; Admin blocks are listed as
//! batches without members. An optional narrative recap is requested from
//! the annotator and never fails the report.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::narrative::{DaySummary, MorningDigest, NarrativeAnnotator};
use crate::schedule::{PlanBlock, PlanBucket};
use crate::store::{PlanStore, WorkItemStore};
use crate::work::WorkItem;

/// Focus blocks with more members than this are flagged as a risk.
pub const LARGE_BLOCK_THRESHOLD: usize = 6;

/// Number of dominant tags reported.
pub const CONTEXT_TAG_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item_id: String,
    pub ticket_id: String,
    pub seq: u32,
    pub text: String,
    pub why_now: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub block_id: String,
    pub bucket: PlanBucket,
    pub note: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub text: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorningReport {
    pub date: NaiveDate,
    pub checklist: Vec<ChecklistItem>,
    pub batches: Vec<BatchSummary>,
    pub risks: Vec<String>,
    pub context_tags: Vec<String>,
    pub narrative: Option<NarrativeSection>,
}

fn why_now(note: Option<&str>, due: Option<NaiveDate>) -> String {
    let mut bits = Vec::new();
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        bits.push(format!("batch: {note}"));
    }
    if let Some(due) = due {
        bits.push(format!("due {due}"));
    }
    if bits.is_empty() {
        "scheduled".to_string()
    } else {
        bits.join(" + ")
    }
}

/// Most frequent tags across `items`, ties broken alphabetically.
pub fn dominant_tags<'a, I>(items: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a WorkItem>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        for tag in &item.tags {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // BTreeMap order is alphabetical; a stable sort keeps it for ties.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(limit).map(|(t, _)| t.to_string()).collect()
}

impl MorningReport {
    /// Build the deterministic part of the report from `blocks` on `date`.
    ///
    /// `items` maps work item ids to items; members missing from it are
    /// ignored.
    pub fn from_plan(
        date: NaiveDate,
        blocks: &[PlanBlock],
        items: &HashMap<String, WorkItem>,
        due_dates: &HashMap<String, Option<NaiveDate>>,
    ) -> Self {
        let mut checklist = Vec::new();
        let mut batches = Vec::new();
        let mut scheduled: Vec<&WorkItem> = Vec::new();

        let focus = blocks.iter().filter(|b| b.bucket == PlanBucket::Focus);
        let admin = blocks.iter().filter(|b| b.bucket == PlanBucket::Admin);

        for block in focus {
            let mut members: Vec<&WorkItem> =
                block.item_ids.iter().filter_map(|id| items.get(id)).collect();
            members.sort_by(|a, b| (&a.ticket_id, a.seq).cmp(&(&b.ticket_id, b.seq)));

            for item in &members {
                let due = due_dates.get(&item.ticket_id).copied().flatten();
                checklist.push(ChecklistItem {
                    item_id: item.id.clone(),
                    ticket_id: item.ticket_id.clone(),
                    seq: item.seq,
                    text: item.text.clone(),
                    why_now: why_now(block.note.as_deref(), due),
                    tags: item.tags.clone(),
                });
            }
            batches.push(BatchSummary {
                block_id: block.id.clone(),
                bucket: PlanBucket::Focus,
                note: block.note.clone().unwrap_or_else(|| "solo".into()),
                members: members.iter().map(|m| m.id.clone()).collect(),
            });
            scheduled.extend(members);
        }

        for block in admin {
            batches.push(BatchSummary {
                block_id: block.id.clone(),
                bucket: PlanBucket::Admin,
                note: block.note.clone().unwrap_or_else(|| "Admin".into()),
                members: Vec::new(),
            });
        }

        let risks = batches
            .iter()
            .filter(|b| b.bucket == PlanBucket::Focus && b.members.len() > LARGE_BLOCK_THRESHOLD)
            .map(|b| {
                format!(
                    "Large block ({} work items) in '{}': consider splitting.",
                    b.members.len(),
                    b.note
                )
            })
            .collect();

        Self {
            date,
            checklist,
            batches,
            risks,
            context_tags: dominant_tags(scheduled, CONTEXT_TAG_LIMIT),
            narrative: None,
        }
    }

    pub fn digest(&self) -> MorningDigest {
        MorningDigest {
            date: self.date,
            checklist: self
                .checklist
                .iter()
                .map(|c| format!("{}#{} {} ({})", c.ticket_id, c.seq, c.text, c.why_now))
                .collect(),
            batches: self
                .batches
                .iter()
                .map(|b| format!("{} [{}] ({} items)", b.note, b.bucket, b.members.len()))
                .collect(),
            risks: self.risks.clone(),
            context_tags: self.context_tags.clone(),
        }
    }

    /// Attach a narrative recap. Failures are recorded, not returned.
    pub fn with_narrative(mut self, annotator: &dyn NarrativeAnnotator) -> Self {
        let section = match annotator.summarize_day(&DaySummary::Morning(self.digest())) {
            Ok(text) => NarrativeSection {
                text: Some(text.trim().to_string()).filter(|t| !t.is_empty()),
                error: None,
            },
            Err(e) => {
                tracing::warn!(date = %self.date, "morning narrative unavailable: {e}");
                NarrativeSection {
                    text: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.narrative = Some(section);
        self
    }
}

/// Load the plan for `date` and build its morning report.
pub fn morning_report<S>(
    store: &S,
    date: NaiveDate,
    narrative: Option<&dyn NarrativeAnnotator>,
) -> Result<MorningReport>
where
    S: WorkItemStore + PlanStore,
{
    let blocks = store.plan_blocks_on(date)?;

    let mut items: HashMap<String, WorkItem> = HashMap::new();
    for block in &blocks {
        for id in &block.item_ids {
            if items.contains_key(id) {
                continue;
            }
            if let Some(item) = store.work_item(id)? {
                items.insert(id.clone(), item);
            }
        }
    }
    let mut ticket_ids: Vec<String> = items.values().map(|i| i.ticket_id.clone()).collect();
    ticket_ids.sort();
    ticket_ids.dedup();
    let due_dates = store.ticket_due_dates(&ticket_ids)?;

    let report = MorningReport::from_plan(date, &blocks, &items, &due_dates);
    tracing::info!(
        %date,
        checklist = report.checklist.len(),
        batches = report.batches.len(),
        "morning report built"
    );
    Ok(match narrative {
        Some(annotator) => report.with_narrative(annotator),
        None => report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::testing::{EchoAnnotator, FailingAnnotator};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn item(id: &str, ticket: &str, seq: u32, tags: &[&str]) -> WorkItem {
        WorkItem::new(ticket, seq, format!("do {id}"))
            .with_id(id)
            .with_tags(tags.iter().copied())
    }

    fn block(id: &str, bucket: PlanBucket, note: &str, ids: &[&str]) -> PlanBlock {
        PlanBlock {
            id: id.into(),
            date: date(),
            bucket,
            note: Some(note.into()),
            item_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn index(items: Vec<WorkItem>) -> HashMap<String, WorkItem> {
        items.into_iter().map(|i| (i.id.clone(), i)).collect()
    }

    #[test]
    fn checklist_ordered_by_ticket_and_seq_with_reasons() {
        let items = index(vec![
            item("b", "T2", 1, &["aws.s3"]),
            item("a2", "T1", 2, &["aws.s3"]),
            item("a1", "T1", 1, &["aws.s3", "prod"]),
        ]);
        let due: HashMap<String, Option<NaiveDate>> =
            [("T1".to_string(), NaiveDate::from_ymd_opt(2024, 1, 3))].into_iter().collect();
        let blocks = vec![
            block("adm", PlanBucket::Admin, "Buffer/Slack", &[]),
            block("f1", PlanBucket::Focus, "aws.s3", &["b", "a2", "a1"]),
        ];

        let report = MorningReport::from_plan(date(), &blocks, &items, &due);
        let order: Vec<_> = report.checklist.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b"]);
        assert_eq!(report.checklist[0].why_now, "batch: aws.s3 + due 2024-01-03");
        assert_eq!(report.checklist[2].why_now, "batch: aws.s3");

        assert_eq!(report.batches.len(), 2);
        assert_eq!(report.batches[0].block_id, "f1");
        assert_eq!(report.batches[1].note, "Buffer/Slack");
        assert!(report.batches[1].members.is_empty());
        assert_eq!(report.context_tags, vec!["aws.s3", "prod"]);
        assert!(report.risks.is_empty());
    }

    #[test]
    fn large_focus_block_is_a_risk() {
        let ids: Vec<String> = (0..7).map(|n| format!("i{n}")).collect();
        let items = index(ids.iter().enumerate().map(|(n, id)| item(id, "T", n as u32 + 1, &[])).collect());
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let report = MorningReport::from_plan(
            date(),
            &[block("f", PlanBucket::Focus, "k8s.ingress", &refs)],
            &items,
            &HashMap::new(),
        );
        assert_eq!(
            report.risks,
            vec!["Large block (7 work items) in 'k8s.ingress': consider splitting."]
        );
    }

    #[test]
    fn dominant_tag_ties_are_alphabetical() {
        let items = vec![
            item("a", "T", 1, &["zeta", "alpha"]),
            item("b", "T", 2, &["beta", "zeta"]),
            item("c", "T", 3, &["gamma"]),
        ];
        assert_eq!(dominant_tags(&items, 3), vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn empty_plan_gives_empty_report() {
        let report = MorningReport::from_plan(date(), &[], &HashMap::new(), &HashMap::new());
        assert!(report.checklist.is_empty());
        assert!(report.batches.is_empty());
        assert!(report.context_tags.is_empty());
    }

    #[test]
    fn narrative_text_and_failure_recorded() {
        let report = MorningReport::from_plan(date(), &[], &HashMap::new(), &HashMap::new());
        let ok = report.clone().with_narrative(&EchoAnnotator::default());
        assert_eq!(
            ok.narrative.and_then(|n| n.text).as_deref(),
            Some("recap for 2024-01-01")
        );

        let failed = report.with_narrative(&FailingAnnotator::default());
        let section = failed.narrative.unwrap();
        assert_eq!(section.text, None);
        assert!(section.error.unwrap().contains("timed out"));
    }
}
