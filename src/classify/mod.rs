//! The classification pipeline: a pluggable per-file classifier, boundary
//! validation of its output, and a batched parallel runner that writes
//! results back through the naming engine.

pub mod heuristic;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rayon::prelude::*;
use thiserror::Error;

use crate::db::models::{Sample, SampleAnalysis};
use crate::db::Database;
use crate::naming;

/// Per-file classification failure. Local to one sample; the sample stays in
/// the library with no analysis and the batch continues.
#[derive(Error, Debug, Clone)]
pub enum ClassifyError {
    #[error("unreadable file: {0}")]
    Unreadable(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("classification timed out")]
    Timeout,
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),
}

/// Batch-level failure (the batch itself could not proceed).
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

/// The pluggable classification capability: one sample file record in,
/// derived metadata or an explicit error out. Implementations must be
/// idempotent for the same input and must not return partial metadata.
pub trait Classifier: Sync {
    fn classify(&self, sample: &Sample) -> Result<SampleAnalysis, ClassifyError>;
}

/// Cooperative cancellation for an in-flight batch. Cancelling stops new
/// classification work from being issued; results already written stay.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Typed outcome of one classification batch.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub classified: u64,
    pub failed: Vec<(String, ClassifyError)>,
    pub cancelled: bool,
}

/// Validate classifier output at the boundary so invariant violations never
/// reach the store: clamp values into their declared ranges, reject garbage.
fn validate(mut analysis: SampleAnalysis) -> Result<SampleAnalysis, ClassifyError> {
    if !analysis.confidence.is_finite() {
        return Err(ClassifyError::MalformedMetadata(format!(
            "confidence {} is not finite",
            analysis.confidence
        )));
    }
    if !analysis.duration.is_finite() || analysis.duration <= 0.0 {
        return Err(ClassifyError::MalformedMetadata(format!(
            "duration {} is not positive",
            analysis.duration
        )));
    }

    analysis.energy = analysis.energy.clamp(1, 10);
    analysis.confidence = analysis.confidence.clamp(0.0, 1.0);
    Ok(analysis)
}

/// Classify a batch of samples with bounded parallelism.
///
/// Samples are processed in chunks: each chunk is classified in parallel,
/// then its results are written back serially through the single database
/// handle before the next chunk starts. This gives incremental progress,
/// bounded memory, and a consistent store if the batch is cancelled midway.
///
/// `progress` is called with `(completed, total)` after every unit of work;
/// the counter is atomic, so the fraction is monotonically non-decreasing.
pub fn classify_batch(
    db: &Database,
    classifier: &dyn Classifier,
    jobs: usize,
    force: bool,
    filter: Option<&str>,
    cancel: &CancelToken,
    progress: &(dyn Fn(u64, u64) + Sync),
) -> Result<BatchResult, BatchError> {
    let samples = if force {
        db.get_all_samples()?
    } else {
        db.get_unclassified_samples()?
    };

    let samples: Vec<Sample> = if let Some(pattern) = filter {
        let pattern_lower = pattern.to_lowercase();
        samples
            .into_iter()
            .filter(|s| s.file_path.to_lowercase().contains(&pattern_lower))
            .collect()
    } else {
        samples
    };

    let total = samples.len() as u64;
    if total == 0 {
        log::info!("No samples to classify");
        return Ok(BatchResult::default());
    }

    log::info!("Classifying {} samples with {} workers", total, jobs);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .expect("worker pool");

    let completed = AtomicU64::new(0);
    let mut result = BatchResult::default();

    // Chunk size jobs * 2: enough parallelism, bounded result memory.
    let chunk_size = jobs.max(1) * 2;

    for chunk in samples.chunks(chunk_size) {
        if cancel.is_cancelled() {
            log::info!("Classification cancelled; keeping completed work");
            result.cancelled = true;
            break;
        }

        let outcomes: Vec<(&Sample, Result<SampleAnalysis, ClassifyError>)> =
            pool.install(|| {
                chunk
                    .par_iter()
                    .map(|sample| {
                        let outcome = classifier.classify(sample).and_then(validate);
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        progress(done, total);
                        (sample, outcome)
                    })
                    .collect()
            });

        // Serial write-back through the single collection owner.
        for (sample, outcome) in outcomes {
            match outcome {
                Ok(analysis) => {
                    let suggested = naming::suggest_name(&sample.file_name, &analysis);
                    let tags = naming::derive_tags(&analysis);
                    db.store_classification(sample.id, &analysis, &suggested, &tags)?;
                    result.classified += 1;
                }
                Err(e) => {
                    log::warn!("Classification failed for {}: {}", sample.file_path, e);
                    db.mark_classification_failed(sample.id)?;
                    result.failed.push((sample.file_path.clone(), e));
                }
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AudioQuality, Instrument, Mood, NewSample};
    use chrono::Utc;
    use std::sync::Mutex;

    fn ingest(db: &Database, names: &[&str]) {
        let batch: Vec<NewSample> = names
            .iter()
            .map(|n| NewSample {
                file_path: format!("/samples/{n}"),
                file_name: n.to_string(),
                file_size: 1000,
                date_added: Utc::now(),
            })
            .collect();
        db.insert_samples(&batch).unwrap();
    }

    fn stub_analysis() -> SampleAnalysis {
        SampleAnalysis {
            bpm: Some(120),
            key: None,
            instrument: Instrument::Kick,
            energy: 5,
            mood: Mood::Chill,
            is_loop: false,
            quality: AudioQuality {
                bit_depth: 16,
                sample_rate: 44100,
                bitrate: None,
                format: "wav".into(),
            },
            duration: 1.0,
            has_vocals: false,
            confidence: 0.8,
        }
    }

    /// Fails any file whose name contains "bad", succeeds otherwise.
    struct StubClassifier;

    impl Classifier for StubClassifier {
        fn classify(&self, sample: &Sample) -> Result<SampleAnalysis, ClassifyError> {
            if sample.file_name.contains("bad") {
                Err(ClassifyError::UnsupportedFormat(sample.file_name.clone()))
            } else {
                Ok(stub_analysis())
            }
        }
    }

    #[test]
    fn validate_clamps_out_of_range_values() {
        let mut a = stub_analysis();
        a.energy = 14;
        a.confidence = 1.7;
        let v = validate(a).unwrap();
        assert_eq!(v.energy, 10);
        assert_eq!(v.confidence, 1.0);

        let mut a = stub_analysis();
        a.energy = -2;
        a.confidence = -0.1;
        let v = validate(a).unwrap();
        assert_eq!(v.energy, 1);
        assert_eq!(v.confidence, 0.0);
    }

    #[test]
    fn validate_rejects_garbage() {
        let mut a = stub_analysis();
        a.confidence = f64::NAN;
        assert!(matches!(
            validate(a),
            Err(ClassifyError::MalformedMetadata(_))
        ));

        let mut a = stub_analysis();
        a.duration = 0.0;
        assert!(matches!(
            validate(a),
            Err(ClassifyError::MalformedMetadata(_))
        ));
    }

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &["kick_a.wav", "bad_file.xyz", "kick_b.wav"]);

        let result = classify_batch(
            &db,
            &StubClassifier,
            2,
            false,
            None,
            &CancelToken::new(),
            &|_, _| {},
        )
        .unwrap();

        assert_eq!(result.classified, 2);
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].0.contains("bad_file"));
        assert!(!result.cancelled);

        // The failed sample is still in the library, just without analysis.
        let samples = db.get_all_samples().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples.iter().filter(|s| s.analysis.is_some()).count(), 2);

        // Nothing left to classify without --force.
        assert!(db.get_unclassified_samples().unwrap().is_empty());
    }

    #[test]
    fn write_back_includes_name_and_tags() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &["kick_a.wav"]);

        classify_batch(
            &db,
            &StubClassifier,
            1,
            false,
            None,
            &CancelToken::new(),
            &|_, _| {},
        )
        .unwrap();

        let s = &db.get_all_samples().unwrap()[0];
        assert_eq!(s.display_name(), "Chill_House_Kick_120BPM.wav");
        assert!(s.tags.contains("kick"));
        assert!(s.tags.contains("chill"));
    }

    #[test]
    fn progress_is_monotonic_and_reaches_total() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &["a.wav", "b.wav", "c.wav", "d.wav", "e.wav"]);

        let seen = Mutex::new(Vec::new());
        let record = |done, total| seen.lock().unwrap().push((done, total));
        classify_batch(&db, &StubClassifier, 2, false, None, &CancelToken::new(), &record)
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|&(_, total)| total == 5));
        let mut dones: Vec<u64> = seen.iter().map(|&(d, _)| d).collect();
        dones.sort_unstable();
        assert_eq!(dones, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn cancelled_batch_keeps_completed_work() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &["a.wav", "b.wav", "c.wav", "d.wav", "e.wav", "f.wav"]);

        // Chunk size is 2 with one job; cancel after the first chunk lands.
        let cancel = CancelToken::new();
        let cancel_after = cancel.clone();
        let trip = move |done: u64, _| {
            if done >= 2 {
                cancel_after.cancel();
            }
        };
        let result =
            classify_batch(&db, &StubClassifier, 1, false, None, &cancel, &trip).unwrap();

        assert!(result.cancelled);
        assert_eq!(result.classified, 2);

        let classified = db
            .get_all_samples()
            .unwrap()
            .iter()
            .filter(|s| s.analysis.is_some())
            .count();
        assert_eq!(classified, 2);
        // The rest are still offered for classification later.
        assert_eq!(db.get_unclassified_samples().unwrap().len(), 4);
    }

    #[test]
    fn filter_narrows_the_batch() {
        let db = Database::open_in_memory().unwrap();
        ingest(&db, &["kick_a.wav", "snare_a.wav"]);

        let result = classify_batch(
            &db,
            &StubClassifier,
            1,
            false,
            Some("kick"),
            &CancelToken::new(),
            &|_, _| {},
        )
        .unwrap();
        assert_eq!(result.classified, 1);
        assert_eq!(db.get_unclassified_samples().unwrap().len(), 1);
    }
}
