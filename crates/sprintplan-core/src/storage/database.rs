//! SQLite-based storage for tickets, work items, plans and daily logs.
//!
//! [`Database`] implements every store trait in [`crate::store`], so the
//! affinity grouper, plan builder and evening reconciler can run against it
//! directly.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, Result};
use crate::schedule::{AffinityGroup, DailyLog, DailyLogItem, PlanBlock, PlanBucket, PlannedBlock};
use crate::store::{AffinityStore, DailyLogStore, PlanStore, Transactional, WorkItemStore};
use crate::narrative::NarrativeAnnotator;
use crate::work::decompose::{decompose_with, suggested_drafts};
use crate::work::{Ticket, WorkItem, WorkItemQuery, WorkItemStatus};

/// File name of the database inside the data directory.
pub const DB_FILE: &str = "sprintplan.db";

/// SQLite database backing the planner.
pub struct Database {
    conn: Connection,
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

const TICKET_COLUMNS: &str = "id, title, description, story_points, tech, due_date, status";
const WORK_ITEM_COLUMNS: &str = "id, ticket_id, seq, text, tags, est_hours, status";

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        story_points: row.get(3)?,
        tech: json_column(row, 4)?,
        due_date: row.get(5)?,
        status: parse_column(row, 6)?,
    })
}

fn work_item_from_row(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        seq: row.get(2)?,
        text: row.get(3)?,
        tags: json_column(row, 4)?,
        est_hours: row.get(5)?,
        status: parse_column(row, 6)?,
    })
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/sprintplan.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join(DB_FILE);
        Self::open_at(&path)
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Tickets ─────────────────────────────────────────────────────────

    /// Insert a ticket or replace the fields of an existing one.
    pub fn upsert_ticket(&self, ticket: &Ticket) -> Result<()> {
        let tech = serde_json::to_string(&ticket.tech)?;
        self.conn.execute(
            &format!(
                "INSERT INTO tickets ({TICKET_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    story_points = excluded.story_points,
                    tech = excluded.tech,
                    due_date = excluded.due_date,
                    status = excluded.status"
            ),
            params![
                ticket.id,
                ticket.title,
                ticket.description,
                ticket.story_points,
                tech,
                ticket.due_date,
                ticket.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// # Errors
    /// Returns [`CoreError::NotFound`] for an unknown id.
    pub fn ticket(&self, id: &str) -> Result<Ticket> {
        self.conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"),
                [id],
                ticket_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("ticket", id))
    }

    /// All tickets ordered by due date (undated last), then id.
    pub fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets
             ORDER BY due_date IS NULL, due_date, id"
        ))?;
        let tickets = stmt
            .query_map([], ticket_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    // ── Work items ──────────────────────────────────────────────────────

    /// Insert work items as given. Returns the number inserted.
    pub fn create_work_items(&self, items: &[WorkItem]) -> Result<usize> {
        let mut stmt = self.conn.prepare(&format!(
            "INSERT INTO work_items ({WORK_ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ))?;
        let mut inserted = 0;
        for item in items {
            inserted += stmt.execute(params![
                item.id,
                item.ticket_id,
                item.seq,
                item.text,
                serde_json::to_string(&item.tags)?,
                item.est_hours,
                item.status.as_str(),
            ])?;
        }
        Ok(inserted)
    }

    /// The seq a new item of `ticket_id` should start at.
    pub fn next_seq(&self, ticket_id: &str) -> Result<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(seq) FROM work_items WHERE ticket_id = ?1",
            [ticket_id],
            |row| row.get(0),
        )?;
        Ok(max.map_or(1, |m| m + 1))
    }

    /// Decompose a stored ticket and persist the new items after any
    /// existing ones. Items come from `annotator` when it has suggestions,
    /// else from the template.
    pub fn decompose_ticket(
        &self,
        ticket_id: &str,
        annotator: &dyn NarrativeAnnotator,
    ) -> Result<Vec<WorkItem>> {
        let ticket = self.ticket(ticket_id)?;
        let drafts = suggested_drafts(&ticket, annotator);
        self.atomically(|db| {
            let items = decompose_with(&ticket, drafts.as_deref(), db.next_seq(ticket_id)?);
            db.create_work_items(&items)?;
            Ok(items)
        })
    }

    // ── Plan blocks ─────────────────────────────────────────────────────

    fn block_item_ids(&self, block_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT item_id FROM plan_block_items WHERE block_id = ?1 ORDER BY position",
        )?;
        let ids = stmt
            .query_map([block_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn load_blocks(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<PlanBlock>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(PlanBlock {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    bucket: parse_column::<PlanBucket>(row, 2)?,
                    note: row.get(3)?,
                    item_ids: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut blocks = Vec::with_capacity(rows.len());
        for mut block in rows {
            block.item_ids = self.block_item_ids(&block.id)?;
            blocks.push(block);
        }
        Ok(blocks)
    }
}

impl Transactional for Database {
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }
}

impl WorkItemStore for Database {
    fn list_work_items(&self, query: &WorkItemQuery) -> Result<Vec<WorkItem>> {
        let mut sql = format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items");
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if !query.statuses.is_empty() {
            clauses.push(format!("status IN ({})", placeholders(query.statuses.len())));
            values.extend(query.statuses.iter().map(|s| s.as_str().to_string()));
        }
        if !query.ticket_ids.is_empty() {
            clauses.push(format!("ticket_id IN ({})", placeholders(query.ticket_ids.len())));
            values.extend(query.ticket_ids.iter().cloned());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ticket_id, seq");

        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), work_item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn work_item(&self, id: &str) -> Result<Option<WorkItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items WHERE id = ?1"),
                [id],
                work_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn ticket_due_dates(&self, ticket_ids: &[String]) -> Result<HashMap<String, Option<NaiveDate>>> {
        if ticket_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, due_date FROM tickets WHERE id IN ({})",
            placeholders(ticket_ids.len())
        ))?;
        let due = stmt
            .query_map(params_from_iter(ticket_ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<NaiveDate>>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(due)
    }

    fn set_work_item_status(&self, ids: &[String], status: WorkItemStatus) -> Result<usize> {
        let mut stmt = self
            .conn
            .prepare_cached("UPDATE work_items SET status = ?1 WHERE id = ?2")?;
        let mut updated = 0;
        for id in ids {
            updated += stmt.execute(params![status.as_str(), id])?;
        }
        Ok(updated)
    }
}

impl AffinityStore for Database {
    fn clear_affinity_groups(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM affinity_groups", [])?)
    }

    fn insert_affinity_groups(&self, groups: &[AffinityGroup]) -> Result<()> {
        let mut insert_group = self
            .conn
            .prepare_cached("INSERT INTO affinity_groups (key, rationale) VALUES (?1, ?2)")?;
        let mut insert_member = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO affinity_group_members (group_id, item_id, position)
             VALUES (?1, ?2, ?3)",
        )?;
        for group in groups {
            let group_id = insert_group.insert(params![group.key, group.rationale])?;
            for (position, item_id) in group.member_ids.iter().enumerate() {
                insert_member.execute(params![group_id, item_id, position as i64])?;
            }
        }
        Ok(())
    }

    fn list_affinity_groups(&self) -> Result<Vec<AffinityGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.key, g.rationale, m.item_id
             FROM affinity_groups g
             LEFT JOIN affinity_group_members m ON m.group_id = g.id
             ORDER BY g.key, g.id, m.position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut groups: Vec<(i64, AffinityGroup)> = Vec::new();
        for row in rows {
            let (id, key, rationale, member) = row?;
            if groups.last().map(|(last, _)| *last) != Some(id) {
                groups.push((
                    id,
                    AffinityGroup {
                        key,
                        rationale,
                        member_ids: Vec::new(),
                    },
                ));
            }
            if let (Some(member), Some((_, group))) = (member, groups.last_mut()) {
                group.member_ids.push(member);
            }
        }
        Ok(groups.into_iter().map(|(_, g)| g).collect())
    }
}

impl PlanStore for Database {
    fn delete_plan_from(&self, date: NaiveDate) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM plan_blocks WHERE date >= ?1", [date])?)
    }

    fn insert_plan_blocks(&self, blocks: &[PlannedBlock]) -> Result<Vec<PlanBlock>> {
        let mut stored = Vec::with_capacity(blocks.len());
        for block in blocks {
            let mut created = self.create_plan_block(block.date, block.bucket, block.note.as_deref())?;
            self.attach_items(&created.id, &block.item_ids)?;
            created.item_ids = self.block_item_ids(&created.id)?;
            stored.push(created);
        }
        Ok(stored)
    }

    fn plan_blocks_on(&self, date: NaiveDate) -> Result<Vec<PlanBlock>> {
        self.load_blocks(
            "SELECT id, date, bucket, note FROM plan_blocks WHERE date = ?1 ORDER BY rowid",
            &[&date],
        )
    }

    fn list_plan_blocks(&self) -> Result<Vec<PlanBlock>> {
        self.load_blocks(
            "SELECT id, date, bucket, note FROM plan_blocks ORDER BY date, rowid",
            &[],
        )
    }

    fn find_focus_block(&self, date: NaiveDate, note: &str) -> Result<Option<PlanBlock>> {
        let found = self
            .load_blocks(
                "SELECT id, date, bucket, note FROM plan_blocks
                 WHERE date = ?1 AND bucket = 'Focus' AND note = ?2
                 ORDER BY rowid LIMIT 1",
                &[&date, &note],
            )?
            .into_iter()
            .next();
        Ok(found)
    }

    fn create_plan_block(
        &self,
        date: NaiveDate,
        bucket: PlanBucket,
        note: Option<&str>,
    ) -> Result<PlanBlock> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO plan_blocks (id, date, bucket, note) VALUES (?1, ?2, ?3, ?4)",
            params![id, date, bucket.as_str(), note],
        )?;
        Ok(PlanBlock {
            id,
            date,
            bucket,
            note: note.map(str::to_string),
            item_ids: Vec::new(),
        })
    }

    fn attach_items(&self, block_id: &str, item_ids: &[String]) -> Result<usize> {
        let mut next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM plan_block_items WHERE block_id = ?1",
            [block_id],
            |row| row.get(0),
        )?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO plan_block_items (block_id, item_id, position)
             VALUES (?1, ?2, ?3)",
        )?;
        let mut attached = 0;
        for item_id in item_ids {
            let inserted = stmt.execute(params![block_id, item_id, next])?;
            if inserted > 0 {
                attached += inserted;
                next += 1;
            }
        }
        Ok(attached)
    }
}

impl DailyLogStore for Database {
    fn daily_log_for(&self, date: NaiveDate) -> Result<DailyLog> {
        let existing: Option<String> = self
            .conn
            .query_row("SELECT id FROM daily_logs WHERE date = ?1", [date], |row| row.get(0))
            .optional()?;
        if let Some(id) = existing {
            return Ok(DailyLog { id, date });
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO daily_logs (id, date) VALUES (?1, ?2)",
            params![id, date],
        )?;
        Ok(DailyLog { id, date })
    }

    fn append_log_item(&self, log: &DailyLog, item: &DailyLogItem) -> Result<()> {
        self.conn.execute(
            "INSERT INTO daily_log_items (log_id, item_id, status, note) VALUES (?1, ?2, ?3, ?4)",
            params![log.id, item.item_id, item.status.as_str(), item.note],
        )?;
        Ok(())
    }

    fn log_items_on(&self, date: NaiveDate) -> Result<Vec<DailyLogItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.item_id, i.status, i.note
             FROM daily_log_items i
             JOIN daily_logs l ON l.id = i.log_id
             WHERE l.date = ?1
             ORDER BY i.id",
        )?;
        let items = stmt
            .query_map([date], |row| {
                Ok(DailyLogItem {
                    item_id: row.get(0)?,
                    status: parse_column(row, 1)?,
                    note: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::testing::{FailingAnnotator, ScriptedSubtasks};
    use crate::narrative::{DisabledAnnotator, SubtaskDraft};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn db_with_items() -> Database {
        let db = Database::open_memory().unwrap();
        db.upsert_ticket(
            &Ticket::new("T1", "Rotate keys", 2)
                .with_tech(["iam", "aws.kms"])
                .with_due_date(date(2024, 1, 10)),
        )
        .unwrap();
        db.upsert_ticket(&Ticket::new("T2", "Bump chart", 1)).unwrap();
        db.create_work_items(&[
            WorkItem::new("T1", 1, "one").with_id("a").with_tags(["iam"]),
            WorkItem::new("T1", 2, "two").with_id("b").with_status(WorkItemStatus::Done),
            WorkItem::new("T2", 1, "three").with_id("c"),
        ])
        .unwrap();
        db
    }

    #[test]
    fn ticket_round_trip_and_upsert() {
        let db = db_with_items();
        let t1 = db.ticket("T1").unwrap();
        assert_eq!(t1.tech, vec!["iam", "aws.kms"]);
        assert_eq!(t1.due_date, Some(date(2024, 1, 10)));

        db.upsert_ticket(&Ticket::new("T1", "Rotate all keys", 3)).unwrap();
        let t1 = db.ticket("T1").unwrap();
        assert_eq!(t1.title, "Rotate all keys");
        assert_eq!(t1.due_date, None);
        assert_eq!(db.list_tickets().unwrap().len(), 2);
    }

    #[test]
    fn missing_ticket_is_not_found() {
        let db = Database::open_memory().unwrap();
        assert!(matches!(db.ticket("nope"), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn list_filters_by_status_and_ticket() {
        let db = db_with_items();
        let open = db.list_work_items(&WorkItemQuery::open(&[])).unwrap();
        let ids: Vec<_> = open.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(open[0].tags, vec!["iam"]);

        let t2 = db.list_work_items(&WorkItemQuery::open(&["T2".to_string()])).unwrap();
        assert_eq!(t2.len(), 1);

        let all = db.list_work_items(&WorkItemQuery::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn due_dates_for_known_tickets() {
        let db = db_with_items();
        let due = db
            .ticket_due_dates(&["T1".to_string(), "T2".to_string(), "T9".to_string()])
            .unwrap();
        assert_eq!(due.get("T1"), Some(&Some(date(2024, 1, 10))));
        assert_eq!(due.get("T2"), Some(&None));
        assert!(!due.contains_key("T9"));
    }

    #[test]
    fn status_update_skips_missing_ids() {
        let db = db_with_items();
        let updated = db
            .set_work_item_status(&["a".to_string(), "ghost".to_string()], WorkItemStatus::Blocked)
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(db.work_item("a").unwrap().unwrap().status, WorkItemStatus::Blocked);
        assert!(db.work_item("ghost").unwrap().is_none());
    }

    #[test]
    fn decompose_continues_sequence() {
        let db = db_with_items();
        let items = db.decompose_ticket("T1", &DisabledAnnotator).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].seq, 3);
        assert_eq!(items[0].tags, vec!["iam", "aws.kms"]);
        assert_eq!(db.next_seq("T1").unwrap(), 5);
        assert_eq!(db.next_seq("T3").unwrap(), 1);
    }

    #[test]
    fn decompose_persists_suggested_items() {
        let db = db_with_items();
        let annotator = ScriptedSubtasks {
            drafts: vec![SubtaskDraft {
                text: "Rotate the staging key first".into(),
                tags: Vec::new(),
                est_hours: Some(0.75),
            }],
            ..ScriptedSubtasks::default()
        };
        let items = db.decompose_ticket("T1", &annotator).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].seq, 3);

        let stored = db.work_item(&items[0].id).unwrap().unwrap();
        assert_eq!(stored.text, "Rotate the staging key first");
        assert_eq!(stored.tags, vec!["iam", "aws.kms"]);
        assert_eq!(stored.est_hours, Some(0.75));
        assert_eq!(db.next_seq("T1").unwrap(), 4);
    }

    #[test]
    fn decompose_falls_back_when_annotator_fails() {
        let db = db_with_items();
        let items = db.decompose_ticket("T2", &FailingAnnotator::default()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].seq, 2);
        assert!(items[0].text.starts_with("Scope & prep"));
    }

    #[test]
    fn affinity_groups_round_trip() {
        let db = db_with_items();
        let groups = vec![
            AffinityGroup {
                key: "misc".into(),
                rationale: "similar tags".into(),
                member_ids: vec!["c".into(), "a".into()],
            },
            AffinityGroup {
                key: "iam".into(),
                rationale: "shared context: iam".into(),
                member_ids: vec!["a".into(), "b".into()],
            },
        ];
        db.insert_affinity_groups(&groups).unwrap();
        let listed = db.list_affinity_groups().unwrap();
        assert_eq!(listed[0].key, "iam");
        assert_eq!(listed[1].member_ids, vec!["c", "a"]);

        assert_eq!(db.clear_affinity_groups().unwrap(), 2);
        assert!(db.list_affinity_groups().unwrap().is_empty());
    }

    #[test]
    fn plan_blocks_keep_order_and_clear_from_date() {
        let db = db_with_items();
        db.insert_plan_blocks(&[
            PlannedBlock::focus(date(2024, 1, 1), "iam", vec!["a".into(), "c".into()]),
            PlannedBlock::buffer(date(2024, 1, 1)),
            PlannedBlock::focus(date(2024, 1, 2), "solo:T2", vec!["c".into()]),
            PlannedBlock::buffer(date(2024, 1, 2)),
        ])
        .unwrap();

        let monday = db.plan_blocks_on(date(2024, 1, 1)).unwrap();
        assert_eq!(monday.len(), 2);
        assert_eq!(monday[0].item_ids, vec!["a", "c"]);
        assert_eq!(monday[1].bucket, PlanBucket::Admin);
        assert!(monday[1].item_ids.is_empty());

        assert_eq!(db.delete_plan_from(date(2024, 1, 2)).unwrap(), 2);
        assert_eq!(db.list_plan_blocks().unwrap().len(), 2);
    }

    #[test]
    fn attach_is_idempotent_and_appends() {
        let db = db_with_items();
        let block = db
            .create_plan_block(date(2024, 1, 3), PlanBucket::Focus, Some("X"))
            .unwrap();
        assert_eq!(db.attach_items(&block.id, &["c".into()]).unwrap(), 1);
        assert_eq!(db.attach_items(&block.id, &["a".into(), "c".into()]).unwrap(), 1);

        let found = db.find_focus_block(date(2024, 1, 3), "X").unwrap().unwrap();
        assert_eq!(found.id, block.id);
        assert_eq!(found.item_ids, vec!["c", "a"]);
        assert!(db.find_focus_block(date(2024, 1, 3), "Y").unwrap().is_none());
    }

    #[test]
    fn daily_log_created_once_per_date() {
        let db = db_with_items();
        let first = db.daily_log_for(date(2024, 1, 1)).unwrap();
        let again = db.daily_log_for(date(2024, 1, 1)).unwrap();
        assert_eq!(first, again);

        db.append_log_item(
            &first,
            &DailyLogItem {
                item_id: "a".into(),
                status: WorkItemStatus::Done,
                note: None,
            },
        )
        .unwrap();
        assert_eq!(db.log_items_on(date(2024, 1, 1)).unwrap().len(), 1);
        assert!(db.log_items_on(date(2024, 1, 2)).unwrap().is_empty());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = db_with_items();
        let result: Result<()> = db.atomically(|tx| {
            tx.set_work_item_status(&["a".to_string()], WorkItemStatus::Done)?;
            Err(CoreError::Custom("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.work_item("a").unwrap().unwrap().status, WorkItemStatus::Todo);
    }

    #[test]
    fn open_at_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        {
            let db = Database::open_at(&path).unwrap();
            db.upsert_ticket(&Ticket::new("T1", "Persist", 1)).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.ticket("T1").unwrap().title, "Persist");
    }
}
