//! Named cache management.
//!
//! A named cache is a row in `caches`; its entries cascade on delete, so
//! dropping a generation is a single statement per cache name.

use super::connection::CacheDb;
use super::timestamp;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Entry count and body size of one named cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    pub name: String,
    pub entries: u64,
    pub bytes: u64,
}

impl CacheDb {
    /// Create a named cache if it doesn't exist yet.
    pub async fn open_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let created_at = timestamp(chrono::Utc::now());
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all existing caches, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a named cache and every entry in it.
    ///
    /// Returns false if no cache had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Per-cache entry counts and sizes.
    pub async fn cache_stats(&self) -> Result<Vec<CacheStats>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.name, COUNT(e.key_hash), COALESCE(SUM(e.body_len), 0)
                     FROM caches c LEFT JOIN entries e ON e.cache_name = c.name
                     GROUP BY c.name
                     ORDER BY c.created_at ASC, c.name ASC",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(CacheStats {
                            name: row.get(0)?,
                            entries: row.get::<_, i64>(1)? as u64,
                            bytes: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("app-static-v1").await.unwrap();
        db.open_cache("app-static-v1").await.unwrap();

        assert!(db.has_cache("app-static-v1").await.unwrap());
        assert_eq!(db.cache_names().await.unwrap(), vec!["app-static-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("app-static-v1").await.unwrap();
        db.open_cache("app-static-v2").await.unwrap();

        assert!(db.delete_cache("app-static-v1").await.unwrap());
        assert!(!db.delete_cache("app-static-v1").await.unwrap());
        assert!(!db.has_cache("app-static-v1").await.unwrap());
        assert!(db.has_cache("app-static-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_for_empty_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("app-api-v1").await.unwrap();

        let stats = db.cache_stats().await.unwrap();
        assert_eq!(stats, vec![CacheStats { name: "app-api-v1".into(), entries: 0, bytes: 0 }]);
    }

    #[tokio::test]
    async fn test_created_at_is_fixed_width_and_orders_names() {
        use crate::http::{Request, Response};

        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("site-static-v2").await.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let request = Request::get(url::Url::parse("https://example.com/").unwrap());
        db.put("site-api-v2", &request, &Response::new(200, "ok")).await.unwrap();

        assert_eq!(db.cache_names().await.unwrap(), vec!["site-static-v2".to_string(), "site-api-v2".to_string()]);

        let created: Vec<String> = db
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT created_at FROM caches")?;
                stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()
            })
            .await
            .unwrap();
        for value in created {
            assert_eq!(value.len(), "2026-01-01T00:00:00.000000Z".len(), "{value}");
            assert!(value.ends_with('Z'), "{value}");
        }
    }
}
