//! Cached response storage.
//!
//! Entries are keyed by (cache name, request key). Writes are UPSERTs, so a
//! fresher response for the same key replaces the old one in place.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::request_key;
use super::timestamp;
use crate::Error;
use crate::http::{Method, Request, Response, ResponseType};

/// A stored response with its storage metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub cache_name: String,
    pub key_hash: String,
    pub url: String,
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

impl CachedEntry {
    /// Time since the entry was written.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.stored_at).to_std().unwrap_or_default()
    }

    pub fn is_older_than(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

/// Row as read from SQLite, before decoding.
struct RawEntry {
    cache_name: String,
    key_hash: String,
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_type: String,
    stored_at: String,
}

impl RawEntry {
    const COLUMNS: &'static str =
        "cache_name, key_hash, url, status, status_text, headers_json, body, response_type, stored_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            cache_name: row.get(0)?,
            key_hash: row.get(1)?,
            url: row.get(2)?,
            status: row.get(3)?,
            status_text: row.get(4)?,
            headers_json: row.get(5)?,
            body: row.get(6)?,
            response_type: row.get(7)?,
            stored_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<CachedEntry, Error> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::CorruptEntry(format!("headers of {}: {e}", self.url)))?;
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)
            .map_err(|e| Error::CorruptEntry(format!("stored_at of {}: {e}", self.url)))?
            .with_timezone(&Utc);

        Ok(CachedEntry {
            cache_name: self.cache_name,
            key_hash: self.key_hash,
            url: self.url,
            response: Response {
                status: self.status,
                status_text: self.status_text,
                headers,
                body: Bytes::from(self.body),
                response_type: ResponseType::parse(&self.response_type),
            },
            stored_at,
        })
    }
}

impl CacheDb {
    /// Store a response for a request in a named cache.
    ///
    /// Creates the cache if needed. Refuses non-GET requests and responses
    /// that are not cacheable (non-2xx, 206, or not `basic`).
    pub async fn put(&self, cache_name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        if request.method != Method::Get {
            return Err(Error::NotCacheable(format!("{} {}", request.method, request.url)));
        }
        if !response.is_cacheable() {
            return Err(Error::NotCacheable(format!(
                "{} status {} type {}",
                request.url,
                response.status,
                response.response_type.as_str()
            )));
        }

        let cache_name = cache_name.to_string();
        let key_hash = request_key(request);
        let method = request.method.as_str();
        let url = request.key_url();
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
        let response = response.clone();
        let quota = self.quota_bytes;
        let now = Utc::now();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;

                if let Some(quota) = quota {
                    let used: i64 = tx.query_row(
                        "SELECT COALESCE(SUM(body_len), 0) FROM entries
                         WHERE NOT (cache_name = ?1 AND key_hash = ?2)",
                        params![cache_name, key_hash],
                        |row| row.get(0),
                    )?;
                    let used = used as u64;
                    let incoming = response.body.len() as u64;
                    if used + incoming > quota {
                        return Err(Error::QuotaExceeded { used, incoming, quota });
                    }
                }

                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![cache_name, timestamp(now)],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        cache_name, key_hash, method, url, status, status_text,
                        headers_json, body, body_len, response_type, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        body_len = excluded.body_len,
                        response_type = excluded.response_type,
                        stored_at = excluded.stored_at",
                    params![
                        cache_name,
                        key_hash,
                        method,
                        url,
                        response.status,
                        response.status_text,
                        headers_json,
                        &response.body[..],
                        response.body.len() as i64,
                        response.response_type.as_str(),
                        timestamp(now),
                    ],
                )?;

                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request in one named cache.
    ///
    /// Only GET requests are ever stored, so anything else is a miss.
    pub async fn match_request(&self, cache_name: &str, request: &Request) -> Result<Option<CachedEntry>, Error> {
        if request.method != Method::Get {
            return Ok(None);
        }

        let cache_name = cache_name.to_string();
        let key_hash = request_key(request);
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let sql = format!("SELECT {} FROM entries WHERE cache_name = ?1 AND key_hash = ?2", RawEntry::COLUMNS);
                let result = conn.query_row(&sql, params![cache_name, key_hash], RawEntry::from_row);

                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::decode).transpose()
    }

    /// Look up a request across every named cache, newest entry first.
    pub async fn match_any(&self, request: &Request) -> Result<Option<CachedEntry>, Error> {
        if request.method != Method::Get {
            return Ok(None);
        }

        let key_hash = request_key(request);
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let sql = format!(
                    "SELECT {} FROM entries WHERE key_hash = ?1 ORDER BY stored_at DESC LIMIT 1",
                    RawEntry::COLUMNS
                );
                let result = conn.query_row(&sql, params![key_hash], RawEntry::from_row);

                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::decode).transpose()
    }

    /// Remove one entry. Returns false if it wasn't there.
    pub async fn delete_entry(&self, cache_name: &str, request: &Request) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        let key_hash = request_key(request);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                    params![cache_name, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a named cache, in insertion order.
    pub async fn keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY stored_at ASC, url ASC")?;
                let urls = stmt
                    .query_map(params![cache_name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries of a named cache written more than `max_age` ago.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_older_than(&self, cache_name: &str, max_age: Duration) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let cutoff = timestamp(cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND stored_at < ?2",
                    params![cache_name, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Total body bytes across every named cache.
    pub async fn total_bytes(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let total: i64 = conn.query_row("SELECT COALESCE(SUM(body_len), 0) FROM entries", [], |row| row.get(0))?;
                Ok(total as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/api/health");
        let response = Response::new(200, r#"{"status":"ok"}"#).with_header("Content-Type", "application/json");

        db.put("app-api-v1", &request, &response).await.unwrap();

        let entry = db.match_request("app-api-v1", &request).await.unwrap().unwrap();
        assert_eq!(entry.response, response);
        assert_eq!(entry.url, "https://example.com/api/health");
        assert!(db.has_cache("app-api-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/logo.png");
        db.put("app-images-v1", &request, &Response::new(200, "png")).await.unwrap();

        assert!(db.match_request("app-static-v1", &request).await.unwrap().is_none());
        assert!(db.match_any(&request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_overwrites_in_place() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/page");
        db.put("app-dynamic-v1", &request, &Response::new(200, "old")).await.unwrap();
        db.put("app-dynamic-v1", &request, &Response::new(200, "new")).await.unwrap();

        let entry = db.match_request("app-dynamic-v1", &request).await.unwrap().unwrap();
        assert_eq!(entry.response.body, Bytes::from("new"));
        assert_eq!(db.keys("app-dynamic-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refuses_partial_and_opaque() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/video.mp4");

        let partial = db.put("app-dynamic-v1", &request, &Response::new(206, "part")).await;
        assert!(matches!(partial, Err(Error::NotCacheable(_))));

        let opaque = Response::new(200, "").with_type(ResponseType::Opaque);
        let result = db.put("app-dynamic-v1", &request, &opaque).await;
        assert!(matches!(result, Err(Error::NotCacheable(_))));

        assert!(db.match_any(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refuses_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/api/contact").with_method(Method::Post);

        let result = db.put("app-api-v1", &request, &Response::new(200, "ok")).await;
        assert!(matches!(result, Err(Error::NotCacheable(_))));
        assert!(db.match_request("app-api-v1", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let db = CacheDb::open_in_memory().await.unwrap().with_quota(8);
        db.put("app-static-v1", &get("https://example.com/a.js"), &Response::new(200, "12345"))
            .await
            .unwrap();

        let result = db
            .put("app-static-v1", &get("https://example.com/b.js"), &Response::new(200, "6789"))
            .await;
        assert!(matches!(result, Err(Error::QuotaExceeded { used: 5, incoming: 4, quota: 8 })));

        // replacing an entry does not count its old body against the quota
        db.put("app-static-v1", &get("https://example.com/a.js"), &Response::new(200, "abcdefgh"))
            .await
            .unwrap();
        assert_eq!(db.total_bytes().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_delete_cache_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/app.css");
        db.put("app-static-v1", &request, &Response::new(200, "body{}")).await.unwrap();

        db.delete_cache("app-static-v1").await.unwrap();
        assert!(db.match_any(&request).await.unwrap().is_none());
        assert_eq!(db.total_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/about");
        db.put("app-dynamic-v1", &request, &Response::new(200, "hi")).await.unwrap();

        assert!(db.delete_entry("app-dynamic-v1", &request).await.unwrap());
        assert!(!db.delete_entry("app-dynamic-v1", &request).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("app-api-v1", &get("https://example.com/api/a"), &Response::new(200, "a"))
            .await
            .unwrap();

        assert_eq!(db.purge_older_than("app-api-v1", Duration::from_secs(60)).await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(db.purge_older_than("app-api-v1", Duration::from_millis(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entry_age() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("https://example.com/api/a");
        db.put("app-api-v1", &request, &Response::new(200, "a")).await.unwrap();

        let entry = db.match_request("app-api-v1", &request).await.unwrap().unwrap();
        assert!(!entry.is_older_than(Duration::from_secs(60)));
    }
}
