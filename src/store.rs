//! SQLite adapter for the linker's catalog and persistence traits.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::linker::{CatalogProvider, LinkStore};
use crate::models::{CatalogEntry, EntryId, OwnerId, Record, RecordId, RecordKind};

/// Tables read and written by [`SqliteStore`].
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS artists (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS songs (
        id INTEGER PRIMARY KEY,
        artist_id INTEGER NOT NULL REFERENCES artists(id),
        title TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist_id);

    CREATE TABLE IF NOT EXISTS performances (
        id INTEGER PRIMARY KEY,
        artist_id INTEGER REFERENCES artists(id),
        title TEXT NOT NULL,
        songs_checked_at TEXT
    );

    CREATE TABLE IF NOT EXISTS music_videos (
        id INTEGER PRIMARY KEY,
        artist_id INTEGER REFERENCES artists(id),
        title TEXT NOT NULL,
        songs_checked_at TEXT
    );

    CREATE TABLE IF NOT EXISTS performance_songs (
        performance_id INTEGER NOT NULL REFERENCES performances(id),
        song_id INTEGER NOT NULL REFERENCES songs(id),
        PRIMARY KEY (performance_id, song_id)
    );

    CREATE TABLE IF NOT EXISTS music_video_songs (
        music_video_id INTEGER NOT NULL REFERENCES music_videos(id),
        song_id INTEGER NOT NULL REFERENCES songs(id),
        PRIMARY KEY (music_video_id, song_id)
    );";

struct Tables {
    records: &'static str,
    links: &'static str,
    link_record_column: &'static str,
}

impl Tables {
    fn insert_link_sql(&self) -> String {
        format!(
            "INSERT OR IGNORE INTO {} ({}, song_id) VALUES (?1, ?2)",
            self.links, self.link_record_column
        )
    }

    fn delete_links_sql(&self) -> String {
        format!("DELETE FROM {} WHERE {} = ?1", self.links, self.link_record_column)
    }
}

fn tables(kind: RecordKind) -> Tables {
    match kind {
        RecordKind::Performance => Tables {
            records: "performances",
            links: "performance_songs",
            link_record_column: "performance_id",
        },
        RecordKind::MusicVideo => Tables {
            records: "music_videos",
            links: "music_video_songs",
            link_record_column: "music_video_id",
        },
    }
}

/// Catalog and link persistence for one record kind.
pub struct SqliteStore {
    conn: Connection,
    kind: RecordKind,
}

impl SqliteStore {
    pub fn new(conn: Connection, kind: RecordKind) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, kind })
    }

    pub fn open(path: &Path, kind: RecordKind) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::new(conn, kind)
    }

    /// Create missing tables.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to create schema")
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Every artist, in id order. Catalog for filename auto-fill.
    pub fn artists(&self) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, name FROM artists ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok(CatalogEntry::new(row.get(0)?, row.get::<_, String>(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read artists")
    }

    /// Checked timestamp of one record, if the record exists.
    pub fn checked_at(&self, record: RecordId) -> Result<Option<Option<String>>> {
        let t = tables(self.kind);
        let sql = format!("SELECT songs_checked_at FROM {} WHERE id = ?1", t.records);
        let value = self
            .conn
            .query_row(&sql, [record], |row| row.get::<_, Option<String>>(0))
            .optional()?;
        Ok(value)
    }

    fn links_for(&self, record: RecordId) -> Result<Vec<EntryId>> {
        let t = tables(self.kind);
        let sql = format!(
            "SELECT song_id FROM {} WHERE {} = ?1 ORDER BY song_id",
            t.links, t.link_record_column
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([record], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<EntryId>>>()?)
    }

    fn records_page(&self, after: Option<RecordId>, limit: usize, unchecked_only: bool) -> Result<Vec<Record>> {
        let t = tables(self.kind);
        let filter = if unchecked_only {
            "AND songs_checked_at IS NULL"
        } else {
            ""
        };
        let sql = format!(
            "SELECT id, title, artist_id, songs_checked_at FROM {}
             WHERE id > ?1 {}
             ORDER BY id
             LIMIT ?2",
            t.records, filter
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![after.unwrap_or(i64::MIN), limit])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let id: RecordId = row.get(0)?;
            records.push(Record {
                id,
                title: row.get(1)?,
                owner_id: row.get(2)?,
                links: Vec::new(),
                checked_at: row.get(3)?,
            });
        }
        drop(rows);

        for record in &mut records {
            record.links = self.links_for(record.id)?;
        }
        Ok(records)
    }
}

impl CatalogProvider for SqliteStore {
    fn entries_for_owner(&self, owner: OwnerId) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, title FROM songs WHERE artist_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map([owner], |row| Ok(CatalogEntry::new(row.get(0)?, row.get::<_, String>(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl LinkStore for SqliteStore {
    fn unchecked_records(&self, after: Option<RecordId>, limit: usize) -> Result<Vec<Record>> {
        self.records_page(after, limit, true)
    }

    fn all_records(&self, after: Option<RecordId>, limit: usize) -> Result<Vec<Record>> {
        self.records_page(after, limit, false)
    }

    fn insert_link(&self, record: RecordId, entry: EntryId) -> Result<()> {
        let sql = tables(self.kind).insert_link_sql();
        self.conn.prepare_cached(&sql)?.execute(params![record, entry])?;
        Ok(())
    }

    fn delete_links(&self, record: RecordId) -> Result<()> {
        self.conn.execute(&tables(self.kind).delete_links_sql(), [record])?;
        Ok(())
    }

    fn mark_checked(&self, record: RecordId, at: DateTime<Utc>) -> Result<()> {
        let t = tables(self.kind);
        let sql = format!("UPDATE {} SET songs_checked_at = ?1 WHERE id = ?2", t.records);
        let changed = self.conn.execute(&sql, params![at.to_rfc3339(), record])?;
        if changed == 0 {
            bail!("no {} with id {}", self.kind.label(), record);
        }
        Ok(())
    }

    /// Delete and insert in one transaction so a failed commit keeps the old links.
    fn commit_links(&self, record: RecordId, entries: &[EntryId], replace: bool) -> Result<()> {
        let t = tables(self.kind);
        let tx = self.conn.unchecked_transaction()?;
        if replace {
            tx.execute(&t.delete_links_sql(), [record])?;
        }
        {
            let mut stmt = tx.prepare_cached(&t.insert_link_sql())?;
            for &entry in entries {
                stmt.execute(params![record, entry])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
