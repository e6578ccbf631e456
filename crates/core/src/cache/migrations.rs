//! Cache store schema migrations.
//!
//! Applied migrations are recorded in `schema_history`; each pending one runs
//! in its own transaction together with its history row.

use super::Error;
use super::connection::CacheDb;
use tokio_rusqlite::{Connection, params};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version.
const MIGRATIONS: &[Migration] =
    &[Migration { version: 1, name: "named_caches", sql: include_str!("../../migrations/001_named_caches.sql") }];

/// Bring the schema up to the latest version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_history (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_history", [], |row| row.get(0))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.name, migration.version)))?;
            tx.execute(
                "INSERT INTO schema_history (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::info!(version = migration.version, name = migration.name, "applied cache schema migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

impl CacheDb {
    /// Highest applied schema version.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| -> Result<i64, Error> {
                let version =
                    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_history", [], |row| row.get(0))?;
                Ok(version)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rerun_is_noop() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let (tables, history): (i64, i64) = conn
            .call(|conn| {
                let tables = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('caches', 'entries')",
                    [],
                    |row| row.get(0),
                )?;
                let history = conn.query_row("SELECT COUNT(*) FROM schema_history", [], |row| row.get(0))?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>((tables, history))
            })
            .await
            .unwrap();

        assert_eq!(tables, 2);
        assert_eq!(history, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_schema_version_is_latest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let latest = MIGRATIONS.last().map(|m| m.version).unwrap_or_default();
        assert_eq!(db.schema_version().await.unwrap(), latest);
    }
}
