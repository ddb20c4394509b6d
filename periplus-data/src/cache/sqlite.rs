//! SQLite-backed [`SiteCache`].
//!
//! Sites are stored as compact JSON payloads keyed by `(source_id, id)`.
//! All queries run on Tokio's blocking pool.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use periplus_core::{Site, Source};
use rusqlite::{Connection, OpenFlags, params};

use crate::wire::CompactSite;

use super::{
    CacheError, CachedSource, DownloadState, SiteCache, StorageEstimate, sort_cached, unix_now,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sources (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        color TEXT NOT NULL,
        category TEXT NOT NULL,
        priority INTEGER NOT NULL,
        enabled_by_default INTEGER NOT NULL,
        site_count INTEGER NOT NULL,
        downloaded_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sites (
        source_id TEXT NOT NULL,
        id TEXT NOT NULL,
        payload TEXT NOT NULL,
        PRIMARY KEY (source_id, id)
    );
";

/// Cache persisted in a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteSiteCache {
    path: Utf8PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSiteCache {
    /// Create the cache file if needed and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Open`] when the file cannot be opened or the
    /// schema cannot be created.
    pub fn initialise(path: impl AsRef<Utf8Path>) -> Result<Self, CacheError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let cache = Self::open_with_flags(path.as_ref(), flags)?;
        {
            let connection = cache.lock();
            connection
                .execute_batch(SCHEMA)
                .map_err(|source| open_error(&cache.path, source))?;
        }
        Ok(cache)
    }

    /// Open an existing cache file.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Open`] when the file does not exist or cannot be
    /// opened.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, CacheError> {
        Self::open_with_flags(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_WRITE)
    }

    fn open_with_flags(path: &Utf8Path, flags: OpenFlags) -> Result<Self, CacheError> {
        let connection = Connection::open_with_flags(path.as_std_path(), flags)
            .map_err(|source| open_error(path, source))?;
        Ok(Self {
            path: path.to_path_buf(),
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Replace the cached copy of `source` with `sites`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Query`] if the write fails; the previous copy is
    /// kept in that case.
    pub async fn store_source(&self, source: &Source, sites: &[Site]) -> Result<(), CacheError> {
        let cached = CachedSource::from_source(source, sites.len(), unix_now());
        let payloads = sites
            .iter()
            .map(|site| {
                serde_json::to_string(&CompactSite::from_site(site))
                    .map(|payload| (site.id.clone(), payload))
                    .map_err(CacheError::query)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "caching {} sites for source {} in {}",
            payloads.len(),
            cached.id,
            self.path
        );
        self.with_connection(move |connection| write_source(connection, &cached, &payloads))
            .await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn with_connection<T, F>(&self, task: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection.lock().unwrap_or_else(PoisonError::into_inner);
            task(&mut guard)
        })
        .await
        .map_err(|err| CacheError::Task {
            message: err.to_string(),
        })?
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.lock()
    }
}

fn open_error(path: &Utf8Path, source: rusqlite::Error) -> CacheError {
    CacheError::Open {
        path: path.to_path_buf(),
        source: Arc::new(source),
    }
}

fn write_source(
    connection: &mut Connection,
    cached: &CachedSource,
    payloads: &[(String, String)],
) -> Result<(), CacheError> {
    let tx = connection.transaction().map_err(CacheError::query)?;
    tx.execute("DELETE FROM sites WHERE source_id = ?1", params![cached.id])
        .map_err(CacheError::query)?;
    tx.execute(
        "INSERT OR REPLACE INTO sources \
         (id, name, color, category, priority, enabled_by_default, site_count, downloaded_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            cached.id,
            cached.name,
            cached.color,
            cached.category,
            cached.priority,
            cached.enabled_by_default,
            i64::try_from(cached.site_count).unwrap_or(i64::MAX),
            cached.downloaded_at,
        ],
    )
    .map_err(CacheError::query)?;
    {
        let mut insert = tx
            .prepare("INSERT OR REPLACE INTO sites (source_id, id, payload) VALUES (?1, ?2, ?3)")
            .map_err(CacheError::query)?;
        for (id, payload) in payloads {
            insert
                .execute(params![cached.id, id, payload])
                .map_err(CacheError::query)?;
        }
    }
    tx.commit().map_err(CacheError::query)
}

fn read_sources(connection: &Connection) -> Result<Vec<CachedSource>, CacheError> {
    let mut statement = connection
        .prepare(
            "SELECT id, name, color, category, priority, enabled_by_default, site_count, \
             downloaded_at FROM sources",
        )
        .map_err(CacheError::query)?;
    let rows = statement
        .query_map([], |row| {
            let site_count: i64 = row.get(6)?;
            Ok(CachedSource {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                category: row.get(3)?,
                priority: row.get(4)?,
                enabled_by_default: row.get(5)?,
                site_count: usize::try_from(site_count).unwrap_or(0),
                downloaded_at: row.get(7)?,
            })
        })
        .map_err(CacheError::query)?;
    let mut sources = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(CacheError::query)?;
    sort_cached(&mut sources);
    Ok(sources)
}

fn read_sites(connection: &Connection) -> Result<Vec<Site>, CacheError> {
    let mut statement = connection
        .prepare("SELECT source_id, id, payload FROM sites ORDER BY source_id, rowid")
        .map_err(CacheError::query)?;
    let mut rows = statement.query([]).map_err(CacheError::query)?;
    let mut sites = Vec::new();
    while let Some(row) = rows.next().map_err(CacheError::query)? {
        let source_id: String = row.get(0).map_err(CacheError::query)?;
        let id: String = row.get(1).map_err(CacheError::query)?;
        let payload: String = row.get(2).map_err(CacheError::query)?;
        let compact: CompactSite =
            serde_json::from_str(&payload).map_err(|source| CacheError::Decode {
                id,
                source: Arc::new(source),
            })?;
        sites.push(compact.expand(&source_id));
    }
    Ok(sites)
}

fn count_sites(connection: &Connection) -> Result<usize, CacheError> {
    let count: i64 = connection
        .query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))
        .map_err(CacheError::query)?;
    Ok(usize::try_from(count).unwrap_or(0))
}

#[async_trait]
impl SiteCache for SqliteSiteCache {
    async fn has_offline_data(&self) -> Result<bool, CacheError> {
        self.with_connection(|connection| Ok(count_sites(connection)? > 0))
            .await
    }

    async fn download_state(&self) -> Result<DownloadState, CacheError> {
        self.with_connection(|connection| {
            let mut downloaded_sources: Vec<String> = Vec::new();
            let mut last_updated = None;
            for source in read_sources(connection)? {
                last_updated = last_updated.max(Some(source.downloaded_at));
                downloaded_sources.push(source.id);
            }
            downloaded_sources.sort();
            Ok(DownloadState {
                downloaded_sources,
                total_sites: count_sites(connection)?,
                last_updated,
            })
        })
        .await
    }

    async fn cached_sources(&self) -> Result<Vec<CachedSource>, CacheError> {
        self.with_connection(|connection| read_sources(connection))
            .await
    }

    async fn cached_sites(&self) -> Result<Vec<Site>, CacheError> {
        self.with_connection(|connection| read_sites(connection))
            .await
    }

    async fn storage_estimate(&self) -> Result<StorageEstimate, CacheError> {
        self.with_connection(|connection| {
            let page_count: i64 = connection
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .map_err(CacheError::query)?;
            let page_size: i64 = connection
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .map_err(CacheError::query)?;
            let used = page_count.saturating_mul(page_size);
            Ok(StorageEstimate {
                used_bytes: u64::try_from(used).unwrap_or(0),
                quota_bytes: None,
            })
        })
        .await
    }
}
