pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt row for sample {id}: {message}")]
    CorruptRow { id: i64, message: String },
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Owner of the sample collection. All mutation goes through one handle;
/// construct it at startup and pass it to whichever component needs it.
pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for better concurrent read performance
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", 1)?;
        Ok(())
    }

    /// V1: samples + analysis + link tables.
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS samples (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path       TEXT NOT NULL UNIQUE,
                file_name       TEXT NOT NULL,
                file_size       INTEGER NOT NULL,
                date_added      TEXT NOT NULL,

                -- Derived by the naming engine once analysis exists
                suggested_name  TEXT,
                tags            TEXT,   -- JSON array of lower-case strings

                -- Set when classification was attempted, success or not.
                -- A sample with classified_at but no analysis row failed.
                classified_at   TEXT,

                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_samples_file_name ON samples(file_name);

            CREATE TABLE IF NOT EXISTS sample_analysis (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sample_id       INTEGER NOT NULL UNIQUE REFERENCES samples(id) ON DELETE CASCADE,

                bpm             INTEGER,
                key             TEXT,
                instrument      TEXT NOT NULL,
                energy          INTEGER NOT NULL,
                mood            TEXT NOT NULL,
                is_loop         INTEGER NOT NULL,

                bit_depth       INTEGER NOT NULL,
                sample_rate     INTEGER NOT NULL,
                bitrate         INTEGER,
                format          TEXT NOT NULL,

                duration        REAL NOT NULL,
                has_vocals      INTEGER NOT NULL,
                confidence      REAL NOT NULL,

                analyzed_at     TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_analysis_instrument ON sample_analysis(instrument);
            CREATE INDEX IF NOT EXISTS idx_analysis_mood ON sample_analysis(mood);
            CREATE INDEX IF NOT EXISTS idx_analysis_bpm ON sample_analysis(bpm);

            -- Duplicate groups stored as a full mesh: one row per directed edge.
            CREATE TABLE IF NOT EXISTS duplicate_links (
                sample_id       INTEGER NOT NULL REFERENCES samples(id) ON DELETE CASCADE,
                other_id        INTEGER NOT NULL REFERENCES samples(id) ON DELETE CASCADE,
                PRIMARY KEY (sample_id, other_id)
            );

            CREATE INDEX IF NOT EXISTS idx_dup_sample ON duplicate_links(sample_id);

            -- Similarity links, both directions inserted together.
            CREATE TABLE IF NOT EXISTS similar_links (
                sample_id       INTEGER NOT NULL REFERENCES samples(id) ON DELETE CASCADE,
                other_id        INTEGER NOT NULL REFERENCES samples(id) ON DELETE CASCADE,
                score           REAL NOT NULL,
                PRIMARY KEY (sample_id, other_id)
            );

            CREATE INDEX IF NOT EXISTS idx_sim_sample ON similar_links(sample_id);
            ",
        )?;
        Ok(())
    }
}
