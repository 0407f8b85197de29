//! SQLite-backed template store.
//!
//! `headers` and `rows` are stored as JSON text, timestamps as RFC 3339 with
//! microsecond precision so lexical order matches time order. A column that
//! fails to encode or decode is a storage fault, not a client error.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{next_timestamp, TemplateStore};
use crate::error::{FormError, FormResult};
use crate::types::{Template, TemplateDraft};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS templates (
    key           TEXT PRIMARY KEY NOT NULL,
    branch_id     TEXT NOT NULL,
    department_id TEXT NOT NULL,
    position_id   TEXT NOT NULL,
    headers       TEXT NOT NULL,
    rows          TEXT NOT NULL,
    source_file   TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_templates_bdp
    ON templates (branch_id, department_id, position_id);
"#;

const SELECT_COLUMNS: &str = "key, branch_id, department_id, position_id, headers, rows, \
                              source_file, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// A row as stored, before JSON and timestamp decoding.
struct StoredRow {
    key: String,
    branch_id: String,
    department_id: String,
    position_id: String,
    headers: String,
    rows: String,
    source_file: Option<String>,
    created_at: String,
    updated_at: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            branch_id: row.get(1)?,
            department_id: row.get(2)?,
            position_id: row.get(3)?,
            headers: row.get(4)?,
            rows: row.get(5)?,
            source_file: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_template(self) -> FormResult<Template> {
        Ok(Template {
            headers: decode_json(&self.key, "headers", &self.headers)?,
            rows: decode_json(&self.key, "rows", &self.rows)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            key: self.key,
            branch_id: self.branch_id,
            department_id: self.department_id,
            position_id: self.position_id,
            source_file: self.source_file,
        })
    }
}

fn decode_json<T: DeserializeOwned>(key: &str, column: &str, raw: &str) -> FormResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| FormError::Storage(format!("bad {} column for '{}': {}", column, key, e)))
}

fn encode_json<T: Serialize>(value: &T) -> FormResult<String> {
    serde_json::to_string(value)
        .map_err(|e| FormError::Storage(format!("failed to encode column: {}", e)))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> FormResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| FormError::Storage(format!("bad timestamp '{}': {}", raw, e)))
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> FormResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> FormResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> FormResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| FormError::Storage("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| FormError::Storage(format!("storage task failed: {}", e)))?
    }
}

fn select_one(conn: &Connection, key: &str) -> FormResult<Option<Template>> {
    let sql = format!("SELECT {} FROM templates WHERE key = ?1", SELECT_COLUMNS);
    conn.query_row(&sql, [key], StoredRow::from_row)
        .optional()?
        .map(StoredRow::into_template)
        .transpose()
}

/// Upsert one draft inside the caller's transaction.
fn write_one(conn: &Connection, draft: TemplateDraft) -> FormResult<Template> {
    let template = match select_one(conn, &draft.key.to_string())? {
        Some(prev) => {
            let updated_at = next_timestamp(Some(prev.updated_at));
            draft.into_template(prev.created_at, updated_at)
        }
        None => {
            let now = next_timestamp(None);
            draft.into_template(now, now)
        }
    };

    conn.execute(
        "INSERT INTO templates \
         (key, branch_id, department_id, position_id, headers, rows, source_file, \
         created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT(key) DO UPDATE SET \
         headers = excluded.headers, rows = excluded.rows, \
         source_file = excluded.source_file, updated_at = excluded.updated_at",
        params![
            template.key,
            template.branch_id,
            template.department_id,
            template.position_id,
            encode_json(&template.headers)?,
            encode_json(&template.rows)?,
            template.source_file,
            format_timestamp(&template.created_at),
            format_timestamp(&template.updated_at),
        ],
    )?;
    Ok(template)
}

#[async_trait]
impl TemplateStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn list(&self) -> FormResult<Vec<Template>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM templates ORDER BY updated_at DESC, key ASC",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let stored = stmt
                .query_map([], StoredRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            stored.into_iter().map(StoredRow::into_template).collect()
        })
        .await
    }

    async fn get(&self, key: &str) -> FormResult<Option<Template>> {
        let key = key.to_string();
        self.with_conn(move |conn| select_one(conn, &key)).await
    }

    async fn upsert(&self, draft: TemplateDraft) -> FormResult<Template> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let template = write_one(&tx, draft)?;
            tx.commit()?;
            Ok(template)
        })
        .await
    }

    /// One transaction for the whole batch; the first failure rolls back
    /// every write before it.
    async fn upsert_many(&self, drafts: Vec<TemplateDraft>) -> FormResult<Vec<Template>> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let templates = drafts
                .into_iter()
                .map(|draft| write_one(&tx, draft))
                .collect::<FormResult<Vec<_>>>()?;
            tx.commit()?;
            Ok(templates)
        })
        .await
    }

    async fn remove(&self, key: &str) -> FormResult<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM templates WHERE key = ?1", [key.as_str()])?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, TableCell, TemplateKey};
    use tempfile::TempDir;

    fn draft(key: &str, label: &str) -> TemplateDraft {
        TemplateDraft {
            key: TemplateKey::parse(key).unwrap(),
            headers: vec!["STT".to_string(), "Chỉ tiêu".to_string()],
            rows: vec![vec![
                TableCell::fixed(CellValue::Number(1.0)),
                TableCell {
                    value: CellValue::Text(label.to_string()),
                    is_input: true,
                },
            ]],
            source_file: Some("form.xlsx".to_string()),
        }
    }

    fn open() -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("templates.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_cells() {
        let (_dir, store) = open();
        let saved = store.upsert(draft("b1|d1|p1", "Mục tiêu")).await.unwrap();
        let loaded = store.get("b1|d1|p1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.rows[0][1].value, CellValue::Text("Mục tiêu".to_string()));
        assert!(loaded.rows[0][1].is_input);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_created_at() {
        let (_dir, store) = open();
        let first = store.upsert(draft("b1|d1|p1", "a")).await.unwrap();
        let second = store.upsert(draft("b1|d1|p1", "b")).await.unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);

        let loaded = store.get("b1|d1|p1").await.unwrap().unwrap();
        assert_eq!(loaded.rows[0][1].value, CellValue::Text("b".to_string()));
    }

    #[tokio::test]
    async fn test_list_order_and_remove() {
        let (_dir, store) = open();
        store.upsert(draft("b1|d1|p1", "a")).await.unwrap();
        store.upsert(draft("b1|d1|p2", "a")).await.unwrap();
        store.upsert(draft("b1|d1|p1", "c")).await.unwrap();

        let keys: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.key)
            .collect();
        assert_eq!(keys, vec!["b1|d1|p1", "b1|d1|p2"]);

        assert!(store.remove("b1|d1|p1").await.unwrap());
        assert!(!store.remove("b1|d1|p1").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert(draft("b1|d1|p1", "a")).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get("b1|d1|p1").await.unwrap().is_some());
    }

    fn insert_raw(store: &SqliteStore, key: &str, headers: &str) {
        let conn = store.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO templates \
             (key, branch_id, department_id, position_id, headers, rows, source_file, \
             created_at, updated_at) \
             VALUES (?1, 'b1', 'd1', 'p9', ?2, '[]', NULL, \
             '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
            params![key, headers],
        )
        .unwrap();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CORRUPT ROWS
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_corrupt_json_column_is_a_storage_error() {
        let (_dir, store) = open();
        insert_raw(&store, "b1|d1|p9", "not json");

        assert!(matches!(
            store.get("b1|d1|p9").await,
            Err(FormError::Storage(msg)) if msg.contains("headers")
        ));
        assert!(matches!(store.list().await, Err(FormError::Storage(_))));
        assert!(matches!(
            store.upsert(draft("b1|d1|p9", "a")).await,
            Err(FormError::Storage(_))
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BATCH UPSERT
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_upsert_many_commits_every_key() {
        let (_dir, store) = open();
        let first = store.upsert(draft("b1|d1|p1", "old")).await.unwrap();
        let written = store
            .upsert_many(vec![draft("b1|d1|p1", "new"), draft("b1|d1|p2", "new")])
            .await
            .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(written[0].created_at, first.created_at);
        assert!(written[0].updated_at > first.updated_at);
        for key in ["b1|d1|p1", "b1|d1|p2"] {
            let loaded = store.get(key).await.unwrap().unwrap();
            assert_eq!(loaded.rows[0][1].value, CellValue::Text("new".to_string()));
        }
    }

    #[tokio::test]
    async fn test_upsert_many_rolls_back_on_failure() {
        let (_dir, store) = open();
        store.upsert(draft("b1|d1|p1", "old")).await.unwrap();
        insert_raw(&store, "b1|d1|p9", "not json");

        let result = store
            .upsert_many(vec![
                draft("b1|d1|p1", "new"),
                draft("b1|d1|p2", "new"),
                draft("b1|d1|p9", "new"),
            ])
            .await;
        assert!(matches!(result, Err(FormError::Storage(_))));

        let p1 = store.get("b1|d1|p1").await.unwrap().unwrap();
        assert_eq!(p1.rows[0][1].value, CellValue::Text("old".to_string()));
        assert!(store.get("b1|d1|p2").await.unwrap().is_none());
    }
}
