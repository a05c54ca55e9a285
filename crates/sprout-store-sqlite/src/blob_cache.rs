//! [`SqliteCacheStorage`] and [`SqliteBlobCache`]: the durable asset tier.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use sprout_core::{
  cache::{BlobCache, CacheStorage},
  resource::{CachedEntryMeta, CachedResource},
};

use crate::{
  Error, Result,
  encode::{RawCacheEntry, RawEntryMeta, encode_dt, encode_resource_type},
  schema::SCHEMA,
};

/// Opens named blob caches backed by the `cache_entries` table.
#[derive(Clone)]
pub struct SqliteCacheStorage {
  conn: tokio_rusqlite::Connection,
}

impl SqliteCacheStorage {
  /// Open (or create) a standalone cache database at `path`.
  pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory cache database for tests.
  pub async fn connect_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn })
  }

  /// Share a connection whose schema is already initialised.
  pub(crate) fn from_connection(conn: tokio_rusqlite::Connection) -> Self {
    Self { conn }
  }
}

impl CacheStorage for SqliteCacheStorage {
  type Cache = SqliteBlobCache;
  type Error = Error;

  async fn open(&self, name: &str) -> Result<SqliteBlobCache> {
    let name_str = name.to_owned();
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
          rusqlite::params![name_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(SqliteBlobCache {
      conn: self.conn.clone(),
      name: name.to_owned(),
    })
  }
}

/// One named cache. Cloning is cheap.
#[derive(Clone)]
pub struct SqliteBlobCache {
  conn: tokio_rusqlite::Connection,
  name: String,
}

impl SqliteBlobCache {
  pub fn name(&self) -> &str { &self.name }
}

impl BlobCache for SqliteBlobCache {
  type Error = Error;

  async fn put(&self, entry: CachedResource) -> Result<()> {
    let name      = self.name.clone();
    let type_str  = encode_resource_type(entry.resource_type).to_owned();
    let size      = i64::try_from(entry.size)
      .map_err(|_| Error::Decode(format!("entry too large: {} bytes", entry.size)))?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cache_entries (
             cache_name, url, resource_key, resource_type,
             body, cached_at, size, digest
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(cache_name, url) DO UPDATE SET
             resource_key  = excluded.resource_key,
             resource_type = excluded.resource_type,
             body          = excluded.body,
             cached_at     = excluded.cached_at,
             size          = excluded.size,
             digest        = excluded.digest",
          rusqlite::params![
            name,
            entry.url,
            entry.key,
            type_str,
            entry.bytes.as_ref(),
            entry.cached_at,
            size,
            entry.digest,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get(&self, url: &str) -> Result<Option<CachedResource>> {
    let name    = self.name.clone();
    let url_str = url.to_owned();

    let raw: Option<RawCacheEntry> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT url, resource_key, resource_type, body, cached_at, size, digest
               FROM cache_entries WHERE cache_name = ?1 AND url = ?2",
              rusqlite::params![name, url_str],
              |row| {
                Ok(RawCacheEntry {
                  url:           row.get(0)?,
                  resource_key:  row.get(1)?,
                  resource_type: row.get(2)?,
                  body:          row.get(3)?,
                  cached_at:     row.get(4)?,
                  size:          row.get(5)?,
                  digest:        row.get(6)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCacheEntry::into_resource).transpose()
  }

  async fn delete(&self, url: &str) -> Result<bool> {
    let name    = self.name.clone();
    let url_str = url.to_owned();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM cache_entries WHERE cache_name = ?1 AND url = ?2",
          rusqlite::params![name, url_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let name = self.name.clone();

    let urls = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT url FROM cache_entries WHERE cache_name = ?1 ORDER BY url",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(urls)
  }

  async fn entries(&self) -> Result<Vec<CachedEntryMeta>> {
    let name = self.name.clone();

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT url, resource_type, size FROM cache_entries
           WHERE cache_name = ?1 ORDER BY url",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name], |row| {
            Ok(RawEntryMeta {
              url:           row.get(0)?,
              resource_type: row.get(1)?,
              size:          row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntryMeta::into_meta).collect()
  }

  async fn clear(&self) -> Result<()> {
    let name = self.name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM cache_entries WHERE cache_name = ?1",
          rusqlite::params![name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
