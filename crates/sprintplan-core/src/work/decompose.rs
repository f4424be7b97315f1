//! Decomposition of tickets into work items.
//!
//! A narrative annotator may suggest the items first. When it cannot, the
//! template applies: the number of items grows with story points and every
//! item inherits the ticket's technology tags so the affinity grouper can
//! batch them.

use super::{Ticket, WorkItem};
use crate::error::NarrativeError;
use crate::narrative::{NarrativeAnnotator, SubtaskDraft, SubtaskRequest};

/// Estimate for the first generated item, in hours.
pub const FIRST_ITEM_HOURS: f64 = 1.0;

/// Estimate for every later generated item, in hours.
pub const DEFAULT_ITEM_HOURS: f64 = 1.5;

/// Most items requested from a narrative annotator.
pub const MAX_SUGGESTED_ITEMS: usize = 5;

const STEP_TEMPLATES: [&str; 5] = [
    "Scope & prep: confirm requirements for",
    "Implement core change for",
    "Validate in staging: tests/runbook for",
    "Prepare prod change window: checklist for",
    "Deploy & verify in prod: metrics/logs for",
];

/// Number of work items a ticket of `story_points` decomposes into.
pub fn item_count_for_points(story_points: u32) -> usize {
    match story_points {
        0 | 1 => 1,
        2 => 2,
        3 | 4 => 3,
        _ => 5,
    }
}

/// Build work items for `ticket`, numbering them from `first_seq`.
///
/// The caller persists the result; ids are fresh v4 UUIDs.
pub fn decompose_ticket(ticket: &Ticket, first_seq: u32) -> Vec<WorkItem> {
    let title = ticket.title.trim();
    (0..item_count_for_points(ticket.story_points))
        .map(|i| {
            let mut item = WorkItem::new(
                ticket.id.clone(),
                first_seq + i as u32,
                format!("{} '{}'", STEP_TEMPLATES[i], title),
            )
            .with_tags(ticket.tech.iter().cloned());
            item.est_hours = Some(if i == 0 {
                FIRST_ITEM_HOURS
            } else {
                DEFAULT_ITEM_HOURS
            });
            item
        })
        .collect()
}

/// Ask `annotator` for item drafts. `None` means the template should be
/// used instead.
pub fn suggested_drafts(
    ticket: &Ticket,
    annotator: &dyn NarrativeAnnotator,
) -> Option<Vec<SubtaskDraft>> {
    let request = SubtaskRequest {
        ticket_id: ticket.id.clone(),
        title: ticket.title.trim().to_string(),
        story_points: ticket.story_points,
        tags: ticket.tech.clone(),
        max_items: MAX_SUGGESTED_ITEMS,
    };
    match annotator.suggest_subtasks(&request) {
        Ok(drafts) if !drafts.is_empty() => Some(drafts),
        Ok(_) => None,
        Err(NarrativeError::NotConfigured) => None,
        Err(e) => {
            tracing::warn!(ticket = %ticket.id, "suggested work items unavailable, using template: {e}");
            None
        }
    }
}

/// Build work items from drafts, numbering them from `first_seq`.
///
/// Drafts without tags inherit the ticket's tags; blank drafts are dropped.
pub fn items_from_drafts(ticket: &Ticket, drafts: &[SubtaskDraft], first_seq: u32) -> Vec<WorkItem> {
    drafts
        .iter()
        .filter(|d| !d.text.trim().is_empty())
        .take(MAX_SUGGESTED_ITEMS)
        .enumerate()
        .map(|(i, draft)| {
            let tags = if draft.tags.is_empty() {
                &ticket.tech
            } else {
                &draft.tags
            };
            let mut item = WorkItem::new(ticket.id.clone(), first_seq + i as u32, draft.text.trim())
                .with_tags(tags.iter().cloned());
            item.est_hours = draft.est_hours;
            item
        })
        .collect()
}

/// Suggested items when the annotator has them, else the template.
pub fn decompose_with(
    ticket: &Ticket,
    drafts: Option<&[SubtaskDraft]>,
    first_seq: u32,
) -> Vec<WorkItem> {
    match drafts {
        Some(drafts) => {
            let items = items_from_drafts(ticket, drafts, first_seq);
            if items.is_empty() {
                decompose_ticket(ticket, first_seq)
            } else {
                items
            }
        }
        None => decompose_ticket(ticket, first_seq),
    }
}
