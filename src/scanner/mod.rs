//! Filesystem discovery: walk sample directories, pick out supported audio
//! files, and register anything the library has not seen before.

use std::path::Path;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use walkdir::WalkDir;

use crate::db::models::NewSample;
use crate::db::Database;
use crate::SUPPORTED_EXTENSIONS;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub scanned: u64,
    pub new: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Walk the given directories and register every supported audio file.
/// Files already in the library (by path) are skipped; re-scanning is safe.
pub fn scan(db: &Database, paths: &[String]) -> Result<ScanResult, ScanError> {
    let mut audio_files: Vec<walkdir::DirEntry> = Vec::new();

    for path in paths {
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if is_supported(entry.path()) {
                audio_files.push(entry);
            }
        }
    }

    let pb = ProgressBar::new(audio_files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb.set_message("Scanning...");

    let mut result = ScanResult::default();
    let mut batch: Vec<NewSample> = Vec::with_capacity(audio_files.len());

    for entry in &audio_files {
        result.scanned += 1;
        match read_sample(entry.path()) {
            Ok(sample) => batch.push(sample),
            Err(e) => {
                log::warn!("Error reading {}: {}", entry.path().display(), e);
                result.errors += 1;
            }
        }
        pb.inc(1);
    }

    let ingest = db.insert_samples(&batch)?;
    result.new = ingest.inserted;
    result.skipped = ingest.skipped;

    pb.finish_with_message(format!(
        "Done: {} new, {} skipped, {} errors",
        result.new, result.skipped, result.errors
    ));

    Ok(result)
}

fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

fn read_sample(path: &Path) -> Result<NewSample, ScanError> {
    let meta = std::fs::metadata(path)?;
    Ok(NewSample {
        file_path: path.to_string_lossy().to_string(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_size: meta.len() as i64,
        date_added: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str, bytes: usize) {
        fs::write(dir.join(name), vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn scan_registers_only_supported_files() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "kick.wav", 100);
        touch(tmp.path(), "notes.txt", 10);
        fs::create_dir(tmp.path().join("sub")).unwrap();
        touch(&tmp.path().join("sub"), "snare.FLAC", 200);

        let db = Database::open_in_memory().unwrap();
        let result = scan(&db, &[tmp.path().to_string_lossy().to_string()]).unwrap();

        assert_eq!(result.scanned, 2);
        assert_eq!(result.new, 2);
        assert_eq!(result.errors, 0);

        let samples = db.get_all_samples().unwrap();
        assert_eq!(samples.len(), 2);
        let mut names: Vec<&str> = samples.iter().map(|s| s.file_name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["kick.wav", "snare.FLAC"]);
        assert!(samples.iter().all(|s| s.file_size > 0));
    }

    #[test]
    fn rescan_skips_known_paths() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "kick.wav", 100);

        let db = Database::open_in_memory().unwrap();
        let dirs = [tmp.path().to_string_lossy().to_string()];
        assert_eq!(scan(&db, &dirs).unwrap().new, 1);

        touch(tmp.path(), "snare.wav", 100);
        let second = scan(&db, &dirs).unwrap();
        assert_eq!(second.new, 1);
        assert_eq!(second.skipped, 1);
        assert_eq!(db.get_all_samples().unwrap().len(), 2);
    }
}
