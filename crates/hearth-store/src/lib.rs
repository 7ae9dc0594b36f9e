// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use hearth_app::{ListingScope, ProjectId};
use rusqlite::{Connection, OptionalExtension, params};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

pub const APP_NAME: &str = "hearth";

/// Well-known cache keys. The listings payload lives under a single fixed
/// key and is replaced wholesale on every successful refresh.
pub const LISTINGS_CACHE_KEY: &str = "listings-payload";
pub const SCOPE_KEY: &str = "listing-scope";

/// Boundary polygons change rarely; a day of staleness is acceptable.
pub const GEOMETRY_TTL: Duration = Duration::hours(24);

const GEOMETRY_KEY_PREFIX: &str = "geometry:";

pub fn geometry_key(project_id: &ProjectId) -> String {
    format!("{GEOMETRY_KEY_PREFIX}{project_id}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload: String,
    pub fetched_at: OffsetDateTime,
}

impl CacheEntry {
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.fetched_at
    }
}

/// Local cache over a single SQLite file. Each slot is independently keyed
/// (the listings key, one key per project's geometry, the persisted filter
/// choice), so writers never contend on the same row.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(
                    "CREATE TABLE cache (
                        key TEXT PRIMARY KEY,
                        payload TEXT NOT NULL,
                        fetched_at TEXT NOT NULL
                    );",
                )
                .context("create schema")?;
        }
        Ok(())
    }

    pub fn put(&self, key: &str, payload: &str) -> Result<()> {
        self.put_at(key, payload, OffsetDateTime::now_utc())
    }

    /// Insert with an explicit timestamp; tests use this to age entries.
    pub fn put_at(&self, key: &str, payload: &str, fetched_at: OffsetDateTime) -> Result<()> {
        let stamp = fetched_at.format(&Rfc3339).context("format timestamp")?;
        self.conn
            .execute(
                "INSERT INTO cache (key, payload, fetched_at) VALUES (?, ?, ?)
                 ON CONFLICT (key) DO UPDATE SET payload = excluded.payload,
                     fetched_at = excluded.fetched_at",
                params![key, payload, stamp],
            )
            .with_context(|| format!("upsert cache key {key}"))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT payload, fetched_at FROM cache WHERE key = ?",
                params![key],
                |row| {
                    let payload: String = row.get(0)?;
                    let fetched_at: String = row.get(1)?;
                    Ok((payload, fetched_at))
                },
            )
            .optional()
            .with_context(|| format!("read cache key {key}"))?;

        let Some((payload, stamp)) = row else {
            return Ok(None);
        };
        let fetched_at = OffsetDateTime::parse(&stamp, &Rfc3339)
            .with_context(|| format!("parse cached timestamp {stamp:?} for key {key}"))?;
        Ok(Some(CacheEntry {
            payload,
            fetched_at,
        }))
    }

    pub fn invalidate(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM cache WHERE key = ?", params![key])
            .with_context(|| format!("delete cache key {key}"))?;
        Ok(removed > 0)
    }

    pub fn put_listings(&self, payload: &str) -> Result<()> {
        self.put(LISTINGS_CACHE_KEY, payload)
    }

    /// Last successfully fetched listings payload, however old. Staleness
    /// is acceptable here: the cache exists for instant first paint and
    /// upstream-outage fallback.
    pub fn get_listings(&self) -> Result<Option<CacheEntry>> {
        self.get(LISTINGS_CACHE_KEY)
    }

    pub fn put_geometry(&self, project_id: &ProjectId, payload: &str) -> Result<()> {
        self.put(&geometry_key(project_id), payload)
    }

    pub fn get_geometry(
        &self,
        project_id: &ProjectId,
        ttl: Duration,
    ) -> Result<Option<CacheEntry>> {
        let Some(entry) = self.get(&geometry_key(project_id))? else {
            return Ok(None);
        };
        if entry.age(OffsetDateTime::now_utc()) > ttl {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Delete geometry entries older than the TTL; returns how many were
    /// removed. The listings slot is never evicted.
    pub fn evict_stale_geometry(&self, ttl: Duration) -> Result<usize> {
        let cutoff = OffsetDateTime::now_utc() - ttl;
        let stamp = cutoff.format(&Rfc3339).context("format cutoff")?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM cache WHERE key LIKE ? AND fetched_at < ?",
                params![format!("{GEOMETRY_KEY_PREFIX}%"), stamp],
            )
            .context("evict stale geometry")?;
        Ok(removed)
    }

    pub fn save_scope(&self, scope: ListingScope) -> Result<()> {
        self.put(SCOPE_KEY, scope.as_str())
    }

    pub fn load_scope(&self) -> Result<Option<ListingScope>> {
        let Some(entry) = self.get(SCOPE_KEY)? else {
            return Ok(None);
        };
        Ok(ListingScope::parse(&entry.payload))
    }
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    let mut stmt = conn
        .prepare("PRAGMA table_info(cache)")
        .context("inspect cache table")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .context("read cache columns")?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("collect cache columns")?;

    for required in ["key", "payload", "fetched_at"] {
        if !columns.iter().any(|column| column == required) {
            bail!(
                "database file exists but is not a hearth cache (missing cache.{required}); \
                 point storage.db_path at a fresh file"
            );
        }
    }
    Ok(())
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("HEARTH_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set HEARTH_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("hearth.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}
