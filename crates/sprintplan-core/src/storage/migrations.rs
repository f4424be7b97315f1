//! Database schema migrations for sprintplan.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use indoc::indoc;
use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("failed to read schema_version: {e}");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: tickets, work items, affinity groups, plan blocks and the
/// daily audit log.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(indoc! {"
        CREATE TABLE IF NOT EXISTS tickets (
            id           TEXT PRIMARY KEY,
            title        TEXT NOT NULL,
            description  TEXT NOT NULL DEFAULT '',
            story_points INTEGER NOT NULL DEFAULT 0,
            tech         TEXT NOT NULL DEFAULT '[]',
            due_date     TEXT,
            status       TEXT NOT NULL DEFAULT 'todo'
        );

        CREATE TABLE IF NOT EXISTS work_items (
            id        TEXT PRIMARY KEY,
            ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
            seq       INTEGER NOT NULL,
            text      TEXT NOT NULL,
            tags      TEXT NOT NULL DEFAULT '[]',
            est_hours REAL,
            status    TEXT NOT NULL DEFAULT 'todo',
            UNIQUE (ticket_id, seq)
        );

        CREATE TABLE IF NOT EXISTS affinity_groups (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            key       TEXT NOT NULL,
            rationale TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS affinity_group_members (
            group_id INTEGER NOT NULL REFERENCES affinity_groups(id) ON DELETE CASCADE,
            item_id  TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            PRIMARY KEY (group_id, item_id)
        );

        CREATE TABLE IF NOT EXISTS plan_blocks (
            id     TEXT PRIMARY KEY,
            date   TEXT NOT NULL,
            bucket TEXT NOT NULL,
            note   TEXT
        );

        CREATE TABLE IF NOT EXISTS plan_block_items (
            block_id TEXT NOT NULL REFERENCES plan_blocks(id) ON DELETE CASCADE,
            item_id  TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            PRIMARY KEY (block_id, item_id)
        );

        CREATE TABLE IF NOT EXISTS daily_logs (
            id   TEXT PRIMARY KEY,
            date TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS daily_log_items (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            log_id     TEXT NOT NULL REFERENCES daily_logs(id) ON DELETE CASCADE,
            item_id    TEXT NOT NULL,
            status     TEXT NOT NULL,
            note       TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
    "})?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: indexes for the planner's date and status lookups.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(indoc! {"
        CREATE INDEX IF NOT EXISTS idx_work_items_status ON work_items(status);
        CREATE INDEX IF NOT EXISTS idx_plan_blocks_date ON plan_blocks(date);
        CREATE INDEX IF NOT EXISTS idx_plan_block_items_item ON plan_block_items(item_id);
        CREATE INDEX IF NOT EXISTS idx_daily_log_items_log ON daily_log_items(log_id);
    "})?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn v1_database_upgrades_to_v2() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);
        let index: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_plan_blocks_date'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index, 1);
    }
}
