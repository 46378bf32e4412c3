// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key/value record operations.

use murmur_core::{MurmurError, StoreOp, Timestamp};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

const UPSERT_SQL: &str = "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// Insert or replace the value stored under `key`.
pub async fn put(db: &Database, key: &str, value: &str) -> Result<(), MurmurError> {
    let key = key.to_string();
    let value = value.to_string();
    let updated_at = Timestamp::now().to_rfc3339();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(UPSERT_SQL, params![key, value, updated_at])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the value stored under `key`.
pub async fn get(db: &Database, key: &str) -> Result<Option<String>, MurmurError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            let result = conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            });
            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Delete `key`, reporting whether a row existed.
pub async fn remove(db: &Database, key: &str) -> Result<bool, MurmurError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let affected = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(affected > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// List keys that start with the literal `prefix`, ascending.
///
/// Compared with `substr` rather than `LIKE`, which folds ASCII case and
/// treats `%` and `_` as wildcards.
pub async fn list_keys(db: &Database, prefix: &str) -> Result<Vec<String>, MurmurError> {
    let prefix = prefix.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC",
            )?;
            let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
            let mut keys = Vec::new();
            for row in rows {
                keys.push(row?);
            }
            Ok(keys)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply every operation in one transaction.
pub async fn apply(db: &Database, ops: Vec<StoreOp>) -> Result<(), MurmurError> {
    if ops.is_empty() {
        return Ok(());
    }
    let updated_at = Timestamp::now().to_rfc3339();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            for op in &ops {
                match op {
                    StoreOp::Put { key, value } => {
                        tx.execute(UPSERT_SQL, params![key, value, updated_at])?;
                    }
                    StoreOp::Remove { key } => {
                        tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                    }
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of stored records.
pub async fn count(db: &Database) -> Result<u64, MurmurError> {
    db.connection()
        .call(|conn| -> Result<u64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("kv.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn put_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        put(&db, "conversation.c1", "payload").await.unwrap();
        assert_eq!(
            get(&db, "conversation.c1").await.unwrap().as_deref(),
            Some("payload")
        );
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let (db, _dir) = setup_db().await;
        assert_eq!(get(&db, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_replaces_existing_value() {
        let (db, _dir) = setup_db().await;
        put(&db, "k", "one").await.unwrap();
        put(&db, "k", "two").await.unwrap();
        assert_eq!(get(&db, "k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_reports_presence() {
        let (db, _dir) = setup_db().await;
        put(&db, "k", "v").await.unwrap();
        assert!(remove(&db, "k").await.unwrap());
        assert!(!remove(&db, "k").await.unwrap());
        assert_eq!(get(&db, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_keys_matches_literal_prefix_in_order() {
        let (db, _dir) = setup_db().await;
        for key in [
            "conversation.b",
            "conversation.a",
            "conversations.index",
            "draft.a",
            "conversationXa",
        ] {
            put(&db, key, "v").await.unwrap();
        }
        let keys = list_keys(&db, "conversation.").await.unwrap();
        assert_eq!(keys, vec!["conversation.a", "conversation.b"]);
    }

    #[tokio::test]
    async fn list_keys_is_case_sensitive() {
        let (db, _dir) = setup_db().await;
        for key in ["conversation.a", "CONVERSATION.B", "Draft.x", "draft.y"] {
            put(&db, key, "v").await.unwrap();
        }
        assert_eq!(
            list_keys(&db, "conversation.").await.unwrap(),
            vec!["conversation.a"]
        );
        assert_eq!(list_keys(&db, "draft.").await.unwrap(), vec!["draft.y"]);
    }

    #[tokio::test]
    async fn list_keys_treats_wildcards_literally() {
        let (db, _dir) = setup_db().await;
        put(&db, "a_b.1", "v").await.unwrap();
        put(&db, "axb.1", "v").await.unwrap();
        put(&db, "100%.1", "v").await.unwrap();
        put(&db, "1000.1", "v").await.unwrap();
        assert_eq!(list_keys(&db, "a_b").await.unwrap(), vec!["a_b.1"]);
        assert_eq!(list_keys(&db, "100%").await.unwrap(), vec!["100%.1"]);
    }

    #[tokio::test]
    async fn apply_commits_puts_and_removes_together() {
        let (db, _dir) = setup_db().await;
        put(&db, "draft.c1", "old").await.unwrap();
        apply(
            &db,
            vec![
                StoreOp::put("conversation.c1", "record"),
                StoreOp::put("conversations.index", "[]"),
                StoreOp::remove("draft.c1"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            get(&db, "conversation.c1").await.unwrap().as_deref(),
            Some("record")
        );
        assert_eq!(get(&db, "draft.c1").await.unwrap(), None);
    }
}
