use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::models::{
    AudioQuality, Instrument, Mood, NewSample, Sample, SampleAnalysis,
};
use super::{Database, DbError, Result};

/// Outcome of one ingest batch.
#[derive(Debug, Default)]
pub struct IngestResult {
    pub inserted: u64,
    pub skipped: u64,
}

/// Flat row as read from the LEFT JOIN, before enum/tag decoding.
struct SampleRow {
    id: i64,
    file_path: String,
    file_name: String,
    file_size: i64,
    date_added: String,
    suggested_name: Option<String>,
    tags: Option<String>,
    bpm: Option<i32>,
    key: Option<String>,
    instrument: Option<String>,
    energy: Option<i32>,
    mood: Option<String>,
    is_loop: Option<bool>,
    bit_depth: Option<i32>,
    sample_rate: Option<i32>,
    bitrate: Option<i32>,
    format: Option<String>,
    duration: Option<f64>,
    has_vocals: Option<bool>,
    confidence: Option<f64>,
}

const SAMPLE_SELECT: &str = "
    SELECT s.id, s.file_path, s.file_name, s.file_size, s.date_added,
           s.suggested_name, s.tags,
           a.bpm, a.key, a.instrument, a.energy, a.mood, a.is_loop,
           a.bit_depth, a.sample_rate, a.bitrate, a.format,
           a.duration, a.has_vocals, a.confidence
    FROM samples s
    LEFT JOIN sample_analysis a ON a.sample_id = s.id";

impl Database {
    /// Append a batch of discovered files to the library, unclassified.
    /// Paths already present are skipped — ids are never reused and
    /// file_path/file_name are immutable once set.
    pub fn insert_samples(&self, batch: &[NewSample]) -> Result<IngestResult> {
        let tx = self.conn.unchecked_transaction()?;
        let mut result = IngestResult::default();

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO samples (file_path, file_name, file_size, date_added)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for s in batch {
                let changed = stmt.execute(params![
                    s.file_path,
                    s.file_name,
                    s.file_size,
                    s.date_added.to_rfc3339(),
                ])?;
                if changed == 1 {
                    result.inserted += 1;
                } else {
                    result.skipped += 1;
                }
            }
        }

        tx.commit()?;
        Ok(result)
    }

    /// Load the whole collection in insertion order, hydrated with analysis,
    /// tags, and both link sets.
    pub fn get_all_samples(&self) -> Result<Vec<Sample>> {
        let rows = self.load_rows(&format!("{SAMPLE_SELECT} ORDER BY s.id"))?;
        let duplicates = self.load_links("duplicate_links")?;
        let similars = self.load_links("similar_links")?;

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                let mut sample = decode_row(row)?;
                if let Some(set) = duplicates.get(&id) {
                    sample.duplicate_ids = set.clone();
                }
                if let Some(set) = similars.get(&id) {
                    sample.similar_ids = set.clone();
                }
                Ok(sample)
            })
            .collect()
    }

    /// Samples never handed to the classifier (no attempt recorded).
    pub fn get_unclassified_samples(&self) -> Result<Vec<Sample>> {
        let rows = self.load_rows(&format!(
            "{SAMPLE_SELECT} WHERE s.classified_at IS NULL ORDER BY s.id"
        ))?;
        rows.into_iter().map(decode_row).collect()
    }

    /// Write back a successful classification: the analysis row plus the
    /// suggested name and tags, in one transaction.
    pub fn store_classification(
        &self,
        sample_id: i64,
        analysis: &SampleAnalysis,
        suggested_name: &str,
        tags: &BTreeSet<String>,
    ) -> Result<()> {
        let tags_json =
            serde_json::to_string(&tags.iter().collect::<Vec<_>>()).map_err(|e| {
                DbError::CorruptRow {
                    id: sample_id,
                    message: format!("tag encoding failed: {e}"),
                }
            })?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO sample_analysis (
                sample_id, bpm, key, instrument, energy, mood, is_loop,
                bit_depth, sample_rate, bitrate, format,
                duration, has_vocals, confidence
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(sample_id) DO UPDATE SET
                bpm = excluded.bpm,
                key = excluded.key,
                instrument = excluded.instrument,
                energy = excluded.energy,
                mood = excluded.mood,
                is_loop = excluded.is_loop,
                bit_depth = excluded.bit_depth,
                sample_rate = excluded.sample_rate,
                bitrate = excluded.bitrate,
                format = excluded.format,
                duration = excluded.duration,
                has_vocals = excluded.has_vocals,
                confidence = excluded.confidence,
                analyzed_at = datetime('now')",
            params![
                sample_id,
                analysis.bpm,
                analysis.key,
                analysis.instrument.as_str(),
                analysis.energy,
                analysis.mood.as_str(),
                analysis.is_loop,
                analysis.quality.bit_depth,
                analysis.quality.sample_rate,
                analysis.quality.bitrate,
                analysis.quality.format,
                analysis.duration,
                analysis.has_vocals,
                analysis.confidence,
            ],
        )?;
        tx.execute(
            "UPDATE samples
             SET suggested_name = ?1, tags = ?2, classified_at = datetime('now')
             WHERE id = ?3",
            params![suggested_name, tags_json, sample_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Record a failed classification attempt. The sample stays in the
    /// library with no analysis; it is not retried without --force.
    pub fn mark_classification_failed(&self, sample_id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM sample_analysis WHERE sample_id = ?1",
            params![sample_id],
        )?;
        tx.execute(
            "UPDATE samples
             SET suggested_name = NULL, tags = NULL, classified_at = datetime('now')
             WHERE id = ?1",
            params![sample_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Replace all duplicate links with the given groups. Every member of a
    /// group links to every other member (full mesh), so symmetry holds by
    /// construction. All-or-nothing per run.
    pub fn replace_duplicate_links(&self, groups: &[Vec<i64>]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM duplicate_links", [])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO duplicate_links (sample_id, other_id) VALUES (?1, ?2)",
            )?;
            for group in groups {
                for &a in group {
                    for &b in group {
                        if a != b {
                            stmt.execute(params![a, b])?;
                        }
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace all similarity links with the given unordered pairs; both
    /// directions are inserted together so the sets stay symmetric.
    pub fn replace_similar_links(&self, pairs: &[(i64, i64, f64)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM similar_links", [])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO similar_links (sample_id, other_id, score) VALUES (?1, ?2, ?3)",
            )?;
            for &(a, b, score) in pairs {
                stmt.execute(params![a, b, score])?;
                stmt.execute(params![b, a, score])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Explicitly remove a sample. Analysis and both sides of every link go
    /// with it via ON DELETE CASCADE. Returns false if the id was unknown.
    pub fn remove_sample(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM samples WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn load_rows(&self, sql: &str) -> Result<Vec<SampleRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SampleRow {
                    id: row.get(0)?,
                    file_path: row.get(1)?,
                    file_name: row.get(2)?,
                    file_size: row.get(3)?,
                    date_added: row.get(4)?,
                    suggested_name: row.get(5)?,
                    tags: row.get(6)?,
                    bpm: row.get(7)?,
                    key: row.get(8)?,
                    instrument: row.get(9)?,
                    energy: row.get(10)?,
                    mood: row.get(11)?,
                    is_loop: row.get(12)?,
                    bit_depth: row.get(13)?,
                    sample_rate: row.get(14)?,
                    bitrate: row.get(15)?,
                    format: row.get(16)?,
                    duration: row.get(17)?,
                    has_vocals: row.get(18)?,
                    confidence: row.get(19)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn load_links(&self, table: &str) -> Result<HashMap<i64, BTreeSet<i64>>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT sample_id, other_id FROM {table}"))?;
        let mut links: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (a, b) = row?;
            links.entry(a).or_default().insert(b);
        }
        Ok(links)
    }
}

fn decode_row(row: SampleRow) -> Result<Sample> {
    let corrupt = |message: String| DbError::CorruptRow {
        id: row.id,
        message,
    };

    let date_added: DateTime<Utc> = row
        .date_added
        .parse()
        .map_err(|e| corrupt(format!("bad date_added: {e}")))?;

    let tags: BTreeSet<String> = match &row.tags {
        Some(json) => serde_json::from_str::<Vec<String>>(json)
            .map_err(|e| corrupt(format!("bad tags: {e}")))?
            .into_iter()
            .collect(),
        None => BTreeSet::new(),
    };

    // An analysis row is present iff instrument is non-null.
    let analysis = match &row.instrument {
        Some(label) => {
            let instrument = Instrument::parse(label)
                .ok_or_else(|| corrupt(format!("unknown instrument {label:?}")))?;
            let mood_label = row
                .mood
                .as_deref()
                .ok_or_else(|| corrupt("analysis row missing mood".into()))?;
            let mood = Mood::parse(mood_label)
                .ok_or_else(|| corrupt(format!("unknown mood {mood_label:?}")))?;
            Some(SampleAnalysis {
                bpm: row.bpm,
                key: row.key.clone(),
                instrument,
                energy: row
                    .energy
                    .ok_or_else(|| corrupt("analysis row missing energy".into()))?,
                mood,
                is_loop: row
                    .is_loop
                    .ok_or_else(|| corrupt("analysis row missing is_loop".into()))?,
                quality: AudioQuality {
                    bit_depth: row
                        .bit_depth
                        .ok_or_else(|| corrupt("analysis row missing bit_depth".into()))?,
                    sample_rate: row
                        .sample_rate
                        .ok_or_else(|| corrupt("analysis row missing sample_rate".into()))?,
                    bitrate: row.bitrate,
                    format: row
                        .format
                        .clone()
                        .ok_or_else(|| corrupt("analysis row missing format".into()))?,
                },
                duration: row
                    .duration
                    .ok_or_else(|| corrupt("analysis row missing duration".into()))?,
                has_vocals: row
                    .has_vocals
                    .ok_or_else(|| corrupt("analysis row missing has_vocals".into()))?,
                confidence: row
                    .confidence
                    .ok_or_else(|| corrupt("analysis row missing confidence".into()))?,
            })
        }
        None => None,
    };

    Ok(Sample {
        id: row.id,
        file_path: row.file_path,
        file_name: row.file_name,
        file_size: row.file_size,
        date_added,
        analysis,
        suggested_name: row.suggested_name,
        duplicate_ids: BTreeSet::new(),
        similar_ids: BTreeSet::new(),
        tags,
    })
}
