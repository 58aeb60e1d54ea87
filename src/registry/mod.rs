//! Short-link registry and scan log
//!
//! Owns the lifecycle of short identifiers, the append-only scan log and
//! the instance settings. All state lives in one SQLite connection guarded
//! by a mutex; every mutation runs as a single transaction, so a resolve
//! racing a delete either records its scan before the cascade or fails with
//! [`Error::NotFound`].

pub mod id;
mod models;
mod schema;

pub use models::{DateCount, LinkDetail, LinkSummary, ScanEvent, ShortLink};

use crate::error::{Error, Result};
use crate::gate::ProStatus;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// User agent recorded when the client sent none.
pub const UNKNOWN_USER_AGENT: &str = "unknown";

const IS_PRO_KEY: &str = "is_pro";
const MAX_ID_ATTEMPTS: usize = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent store of short links and their scans
pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    /// Open (creating if needed) a file-backed registry.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        info!(path = %path.display(), "Opened link registry");
        Self::from_connection(conn)
    }

    /// Open a registry that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("registry connection mutex poisoned".to_string()))
    }

    /// Create a short link for `target_url`.
    pub fn create_link(&self, target_url: &str) -> Result<ShortLink> {
        self.create_link_at(target_url, Utc::now())
    }

    /// Create a short link with an explicit creation time.
    pub fn create_link_at(&self, target_url: &str, created_at: DateTime<Utc>) -> Result<ShortLink> {
        let target_url = validate_target(target_url)?;
        let created_micros = created_at.timestamp_micros();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = id::generate();
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM links WHERE id = ?1) \
                 OR EXISTS(SELECT 1 FROM retired_links WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if taken {
                warn!(%id, attempt, "Generated short id already used, retrying");
                continue;
            }

            tx.execute(
                "INSERT INTO links (id, target_url, created_at) VALUES (?1, ?2, ?3)",
                params![id, target_url, created_micros],
            )?;
            tx.commit()?;

            info!(%id, url = %target_url, "Created short link");
            return Ok(ShortLink {
                id,
                target_url: target_url.to_string(),
                created_at: from_micros(created_micros)?,
            });
        }

        Err(Error::Storage(format!(
            "could not allocate an unused short id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    /// Look up a link without recording a scan.
    pub fn get_link(&self, id: &str) -> Result<ShortLink> {
        let conn = self.conn()?;
        fetch_link(&conn, id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Resolve `id` to its target and record one scan.
    pub fn resolve_link(&self, id: &str, user_agent: Option<&str>) -> Result<String> {
        self.resolve_link_at(id, user_agent, Utc::now())
    }

    /// Resolve `id`, recording the scan at `scanned_at`.
    ///
    /// The existence check and the insert share one transaction; nothing is
    /// recorded when the link is missing.
    pub fn resolve_link_at(
        &self,
        id: &str,
        user_agent: Option<&str>,
        scanned_at: DateTime<Utc>,
    ) -> Result<String> {
        let user_agent = normalize_user_agent(user_agent);

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let target: Option<String> = tx
            .query_row(
                "SELECT target_url FROM links WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(target) = target else {
            return Err(Error::NotFound(id.to_string()));
        };

        tx.execute(
            "INSERT INTO scans (link_id, scanned_at, user_agent) VALUES (?1, ?2, ?3)",
            params![id, scanned_at.timestamp_micros(), user_agent],
        )?;
        tx.commit()?;

        debug!(%id, user_agent, "Recorded scan");
        Ok(target)
    }

    /// Delete a link and all of its scans. Returns `false` if it did not exist.
    pub fn delete_link(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let scans = tx.execute("DELETE FROM scans WHERE link_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM links WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT OR IGNORE INTO retired_links (id) VALUES (?1)",
            params![id],
        )?;
        tx.commit()?;

        info!(%id, scans, "Deleted short link");
        Ok(true)
    }

    /// All links with their scan counts, newest first.
    pub fn list_links(&self) -> Result<Vec<LinkSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT l.id, l.target_url, l.created_at, COUNT(s.id) \
             FROM links l LEFT JOIN scans s ON s.link_id = l.id \
             GROUP BY l.id \
             ORDER BY l.created_at DESC, l.rowid DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut links = Vec::new();
        for row in rows {
            let (id, target_url, created_at, count) = row?;
            links.push(LinkSummary {
                link: ShortLink {
                    id,
                    target_url,
                    created_at: from_micros(created_at)?,
                },
                scan_count: count.max(0) as u64,
            });
        }
        Ok(links)
    }

    /// Link, scans newest first, and per-date counts oldest first.
    pub fn get_detail(&self, id: &str) -> Result<LinkDetail> {
        let conn = self.conn()?;
        let link = fetch_link(&conn, id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, scanned_at, user_agent FROM scans \
             WHERE link_id = ?1 ORDER BY scanned_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut scans = Vec::new();
        for row in rows {
            let (scan_id, scanned_at, user_agent) = row?;
            scans.push(ScanEvent {
                id: scan_id,
                link_id: link.id.clone(),
                scanned_at: from_micros(scanned_at)?,
                user_agent,
            });
        }

        let per_date_counts = per_date_counts(&scans);
        Ok(LinkDetail {
            link,
            scans,
            per_date_counts,
        })
    }

    /// Load the instance-wide pro flag from settings.
    pub fn pro_status(&self) -> Result<ProStatus> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![IS_PRO_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ProStatus::new(value.as_deref() == Some("true")))
    }

    /// Persist a completed purchase and flip `status` to pro.
    ///
    /// Idempotent: returns `true` only for the confirmation that changed the
    /// flag.
    pub fn confirm_purchase(&self, status: &ProStatus) -> Result<bool> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, 'true') \
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![IS_PRO_KEY],
        )?;

        let changed = status.activate();
        if changed {
            info!("Purchase confirmed, instance upgraded to pro");
        } else {
            debug!("Purchase confirmation repeated, instance already pro");
        }
        Ok(changed)
    }

    /// Pick up a purchase confirmed through another connection, such as a
    /// separate `qrtist upgrade` process. Returns the current flag.
    pub fn refresh_pro_status(&self, status: &ProStatus) -> Result<bool> {
        if !status.is_pro() && self.pro_status()?.is_pro() && status.activate() {
            info!("Picked up pro purchase recorded by another process");
        }
        Ok(status.is_pro())
    }
}

fn fetch_link(conn: &Connection, id: &str) -> Result<Option<ShortLink>> {
    let row = conn
        .query_row(
            "SELECT id, target_url, created_at FROM links WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, target_url, created_at)) => Ok(Some(ShortLink {
            id,
            target_url,
            created_at: from_micros(created_at)?,
        })),
        None => Ok(None),
    }
}

fn validate_target(target_url: &str) -> Result<&str> {
    let target_url = target_url.trim();
    if target_url.is_empty() {
        return Err(Error::InvalidInput("target URL must not be empty".to_string()));
    }

    // The URL parser silently drops these, but the stored string ends up in
    // a Location header verbatim.
    if target_url.chars().any(char::is_control) {
        return Err(Error::InvalidInput(
            "target URL must not contain control characters".to_string(),
        ));
    }

    let parsed = Url::parse(target_url)
        .map_err(|e| Error::InvalidInput(format!("invalid target URL '{target_url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(target_url),
        other => Err(Error::InvalidInput(format!(
            "unsupported URL scheme '{other}', expected http or https"
        ))),
    }
}

fn normalize_user_agent(user_agent: Option<&str>) -> &str {
    match user_agent {
        Some(ua) if !ua.trim().is_empty() => ua,
        _ => UNKNOWN_USER_AGENT,
    }
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::Storage(format!("timestamp {micros} out of range")))
}

fn per_date_counts(scans: &[ScanEvent]) -> Vec<DateCount> {
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for scan in scans {
        *buckets.entry(scan.scanned_at.date_naive()).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|(date, count)| DateCount { date, count })
        .collect()
}
