use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::error::{ApiError, ApiResult};
use crate::models::{ItemStatus, TodoItem, TodoItemCreation, TodoItemUpdate};

const ITEM_COLUMNS: &str = "id, title, description, status, created_at, updated_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn connect<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening database at {}", path.as_ref().display()))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS todo_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'Doing'
                    CHECK (status IN ('Doing', 'Done', 'Deleted')),
                created_at TEXT,
                updated_at TEXT
            );
            "#,
            )
            .context("creating todo_items table")?;
        Ok(())
    }

    /// Inserts the item and stores the generated id back into `item`.
    pub fn create_item(&self, item: &mut TodoItemCreation) -> ApiResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO todo_items (title, description, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![item.title, item.description, item.status, now],
        )?;
        item.id = self.conn.last_insert_rowid();
        Ok(())
    }

    /// Fetches a row regardless of its status, soft-deleted rows included.
    pub fn get_item(&self, id: i64) -> ApiResult<TodoItem> {
        self.conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM todo_items WHERE id = ?1"),
                params![id],
                item_from_row,
            )
            .optional()?
            .ok_or(ApiError::NotFound(id))
    }

    /// Applies the present fields and returns the number of rows touched.
    /// An unknown id touches nothing and is not an error.
    pub fn update_item(&self, id: i64, changes: &TodoItemUpdate) -> ApiResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let mut assignments = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();
        if let Some(title) = &changes.title {
            assignments.push("title = ?");
            values.push(title);
        }
        if let Some(description) = &changes.description {
            assignments.push("description = ?");
            values.push(description);
        }
        if let Some(status) = &changes.status {
            assignments.push("status = ?");
            values.push(status);
        }
        assignments.push("updated_at = ?");
        values.push(&now);
        values.push(&id);

        let sql = format!(
            "UPDATE todo_items SET {} WHERE id = ?",
            assignments.join(", ")
        );
        Ok(self.conn.execute(&sql, values.as_slice())?)
    }

    pub fn count_active(&self) -> ApiResult<i64> {
        let total = self.conn.query_row(
            "SELECT COUNT(*) FROM todo_items WHERE status <> ?1",
            params![ItemStatus::Deleted],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Newest first, soft-deleted rows excluded.
    pub fn list_items(&self, limit: i64, offset: i64) -> ApiResult<Vec<TodoItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM todo_items WHERE status <> ?1
             ORDER BY id DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![ItemStatus::Deleted, limit, offset], item_from_row)?;

        let mut items = Vec::new();
        for item in rows {
            items.push(item?);
        }
        Ok(items)
    }

    /// Marks the row `Deleted` without checking that it exists.
    pub fn soft_delete_item(&self, id: i64) -> ApiResult<usize> {
        let now = Utc::now().to_rfc3339();
        let touched = self.conn.execute(
            "UPDATE todo_items SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![ItemStatus::Deleted, now, id],
        )?;
        Ok(touched)
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<TodoItem> {
    let created_at: Option<String> = row.get(4)?;
    let updated_at: Option<String> = row.get(5)?;
    Ok(TodoItem {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        created_at: created_at.as_deref().and_then(parse_datetime),
        updated_at: updated_at.as_deref().and_then(parse_datetime),
    })
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Database {
        Database::connect(":memory:").unwrap()
    }

    fn insert(db: &Database, title: &str) -> i64 {
        let mut item = TodoItemCreation {
            title: title.to_string(),
            description: format!("{title} description"),
            ..Default::default()
        };
        db.create_item(&mut item).unwrap();
        item.id
    }

    #[test]
    fn create_assigns_id_and_timestamps() {
        let db = memory_db();
        let first = insert(&db, "first");
        let second = insert(&db, "second");
        assert_eq!((first, second), (1, 2));

        let item = db.get_item(second).unwrap();
        assert_eq!(item.title, "second");
        assert_eq!(item.description, "second description");
        assert_eq!(item.status, ItemStatus::Doing);
        assert!(item.created_at.is_some());
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn get_missing_row_is_not_found() {
        let db = memory_db();
        assert!(matches!(db.get_item(42), Err(ApiError::NotFound(42))));
    }

    #[test]
    fn partial_update_leaves_other_columns() {
        let db = memory_db();
        let id = insert(&db, "before");
        let changes = TodoItemUpdate {
            title: Some("after".to_string()),
            ..Default::default()
        };
        assert_eq!(db.update_item(id, &changes).unwrap(), 1);

        let item = db.get_item(id).unwrap();
        assert_eq!(item.title, "after");
        assert_eq!(item.description, "before description");
        assert_eq!(item.status, ItemStatus::Doing);
    }

    #[test]
    fn update_of_unknown_id_touches_nothing() {
        let db = memory_db();
        let changes = TodoItemUpdate {
            status: Some(ItemStatus::Done),
            ..Default::default()
        };
        assert_eq!(db.update_item(99, &changes).unwrap(), 0);
        assert_eq!(db.update_item(99, &TodoItemUpdate::default()).unwrap(), 0);
    }

    #[test]
    fn soft_deleted_rows_leave_listing_but_stay_fetchable() {
        let db = memory_db();
        let keep = insert(&db, "keep");
        let gone = insert(&db, "gone");

        assert_eq!(db.soft_delete_item(gone).unwrap(), 1);
        assert_eq!(db.soft_delete_item(gone).unwrap(), 1);
        assert_eq!(db.soft_delete_item(1000).unwrap(), 0);

        assert_eq!(db.get_item(gone).unwrap().status, ItemStatus::Deleted);
        assert_eq!(db.count_active().unwrap(), 1);
        let ids: Vec<i64> = db.list_items(10, 0).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![keep]);
    }

    #[test]
    fn listing_is_newest_first_and_paginated() {
        let db = memory_db();
        for n in 1..=25 {
            insert(&db, &format!("item {n}"));
        }
        let ids: Vec<i64> = db.list_items(10, 10).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, (6..=15).rev().collect::<Vec<_>>());
        assert_eq!(db.list_items(10, 20).unwrap().len(), 5);
        assert_eq!(db.count_active().unwrap(), 25);
    }

    #[test]
    fn unknown_stored_status_is_a_decode_error() {
        let db = memory_db();
        db.conn
            .execute_batch("CREATE TABLE loose (status TEXT); INSERT INTO loose VALUES ('Archived');")
            .unwrap();
        let decoded: rusqlite::Result<ItemStatus> =
            db.conn.query_row("SELECT status FROM loose", [], |row| row.get(0));
        assert!(decoded.is_err());
    }
}
