//! Persistent disk tier fronted by the TTL+LRU memory tier. A single
//! `rusqlite` table, the same choice the teacher makes for `vault_db.rs`
//! over a hand-rolled file format.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;

pub struct DiskCache {
    conn: parking_lot::Mutex<Connection>,
}

impl DiskCache {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: parking_lot::Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value, expires_at FROM cache WHERE key = ?1")?;
        let row: Option<(Vec<u8>, i64)> = stmt
            .query_row(params![key], |r| Ok((r.get(0)?, r.get(1)?)))
            .ok();

        match row {
            Some((value, expires_at)) if expires_at > Utc::now().timestamp() => Ok(Some(value)),
            Some(_) => {
                conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &[u8], ttl: Duration) -> anyhow::Result<()> {
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cache (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(&dir.path().join("cache.sqlite")).unwrap();
        cache.set("k", b"hello", Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn expired_entries_return_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(&dir.path().join("cache.sqlite")).unwrap();
        cache.set("k", b"hello", Duration::from_secs(0)).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("k").unwrap(), None);
    }
}
