//! SQL schema for the Sprout SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Whole-state JSON snapshots, one row per storage name.
-- Rewritten on every mutation of the entity store.
CREATE TABLE IF NOT EXISTS kv_store (
    name        TEXT PRIMARY KEY,
    snapshot    TEXT NOT NULL,
    updated_at  TEXT NOT NULL    -- RFC 3339 UTC
);

-- Named blob caches (the durable asset tier).
CREATE TABLE IF NOT EXISTS caches (
    name        TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name     TEXT NOT NULL REFERENCES caches(name) ON DELETE CASCADE,
    url            TEXT NOT NULL,
    resource_key   TEXT NOT NULL,
    resource_type  TEXT NOT NULL,   -- 'video' | 'image' | 'audio'
    body           BLOB NOT NULL,
    cached_at      INTEGER NOT NULL, -- epoch ms
    size           INTEGER NOT NULL,
    digest         TEXT NOT NULL,    -- hex SHA-256 of body
    PRIMARY KEY (cache_name, url)
);

PRAGMA user_version = 1;
";
