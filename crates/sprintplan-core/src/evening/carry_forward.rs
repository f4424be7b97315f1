//! Carry unfinished block members to the next workday.
//!
//! Members are grouped by the note of the block they sat in, so a batch
//! planned as `aws.lambda` is carried as `aws.lambda` and keeps its identity
//! across days. Blocks without a note are carried under [`SOLO_NOTE`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::schedule::PlanBlock;

/// Note used for members of blocks that have none.
pub const SOLO_NOTE: &str = "solo";

/// Items to carry under one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryGroup {
    pub note: String,
    pub item_ids: Vec<String>,
}

/// Note a block's members are carried under.
pub fn carry_note(block: &PlanBlock) -> &str {
    match block.note.as_deref().map(str::trim) {
        Some(note) if !note.is_empty() => note,
        _ => SOLO_NOTE,
    }
}

/// Group every member of `blocks` not in `completed` by carry note.
///
/// Groups are ordered by first appearance of their note; an item listed in
/// several blocks is carried once, under the first.
pub fn carry_groups(blocks: &[PlanBlock], completed: &HashSet<&str>) -> Vec<CarryGroup> {
    let mut groups: Vec<CarryGroup> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for block in blocks {
        let note = carry_note(block);
        for id in &block.item_ids {
            if completed.contains(id.as_str()) || !seen.insert(id.as_str()) {
                continue;
            }
            match groups.iter_mut().find(|g| g.note == note) {
                Some(group) => group.item_ids.push(id.clone()),
                None => groups.push(CarryGroup {
                    note: note.to_string(),
                    item_ids: vec![id.clone()],
                }),
            }
        }
    }

    groups
}
