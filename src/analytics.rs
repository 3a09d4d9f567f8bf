//! Library-wide summary statistics, recomputed on demand from the full
//! collection rather than maintained incrementally.

use crate::db::models::{Instrument, Sample};

/// Fixed tempo histogram buckets. Half-open at the top except the last;
/// samples below 60 bpm land in no bucket.
pub const BPM_BUCKETS: [(&str, i32, i32); 5] = [
    ("60-80", 60, 80),
    ("80-100", 80, 100),
    ("100-120", 100, 120),
    ("120-140", 120, 140),
    ("140+", 140, i32::MAX),
];

/// Point-in-time snapshot of the library.
#[derive(Debug, Clone)]
pub struct Analytics {
    /// Every sample, classified or not.
    pub total_samples: usize,
    pub analyzed_samples: usize,
    /// One entry per instrument, zero-filled, in enum order.
    pub instrument_counts: Vec<(Instrument, usize)>,
    pub bpm_distribution: Vec<(&'static str, usize)>,
    /// Samples belonging to some duplicate group.
    pub duplicate_count: usize,
    /// Analyzed samples below CD quality (sample rate or bit depth).
    pub quality_issues: usize,
    /// Bytes across the whole library, classified or not.
    pub total_file_size: i64,
}

pub fn compute(samples: &[Sample]) -> Analytics {
    let analyzed: Vec<_> = samples.iter().filter_map(|s| s.analysis.as_ref()).collect();

    let instrument_counts = Instrument::ALL
        .iter()
        .map(|&instrument| {
            let count = analyzed.iter().filter(|a| a.instrument == instrument).count();
            (instrument, count)
        })
        .collect();

    let bpms: Vec<i32> = analyzed.iter().filter_map(|a| a.bpm).collect();
    let bpm_distribution = BPM_BUCKETS
        .iter()
        .map(|&(label, lo, hi)| {
            let count = bpms.iter().filter(|&&b| b >= lo && (b < hi || hi == i32::MAX)).count();
            (label, count)
        })
        .collect();

    Analytics {
        total_samples: samples.len(),
        analyzed_samples: analyzed.len(),
        instrument_counts,
        bpm_distribution,
        duplicate_count: samples.iter().filter(|s| !s.duplicate_ids.is_empty()).count(),
        quality_issues: analyzed
            .iter()
            .filter(|a| a.quality.sample_rate < 44100 || a.quality.bit_depth < 16)
            .count(),
        total_file_size: samples.iter().map(|s| s.file_size).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AudioQuality, Mood, SampleAnalysis};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn sample(id: i64, size: i64, analysis: Option<SampleAnalysis>) -> Sample {
        Sample {
            id,
            file_path: format!("/s/{id}.wav"),
            file_name: format!("{id}.wav"),
            file_size: size,
            date_added: Utc::now(),
            analysis,
            suggested_name: None,
            duplicate_ids: BTreeSet::new(),
            similar_ids: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    fn analysis(instrument: Instrument, bpm: Option<i32>, sample_rate: i32, bit_depth: i32) -> SampleAnalysis {
        SampleAnalysis {
            bpm,
            key: None,
            instrument,
            energy: 5,
            mood: Mood::Chill,
            is_loop: false,
            quality: AudioQuality {
                bit_depth,
                sample_rate,
                bitrate: None,
                format: "wav".into(),
            },
            duration: 2.0,
            has_vocals: false,
            confidence: 0.8,
        }
    }

    #[test]
    fn totals_count_unclassified_samples() {
        let samples = vec![
            sample(1, 1000, Some(analysis(Instrument::Kick, Some(140), 44100, 16))),
            sample(2, 2000, None), // classification failed — still counted here
        ];
        let a = compute(&samples);
        assert_eq!(a.total_samples, 2);
        assert_eq!(a.analyzed_samples, 1);
        assert_eq!(a.total_file_size, 3000);

        // ... but the failed sample appears in no instrument bucket.
        let counted: usize = a.instrument_counts.iter().map(|&(_, c)| c).sum();
        assert_eq!(counted, 1);
    }

    #[test]
    fn instrument_counts_are_zero_filled_and_sum_to_analyzed() {
        let samples = vec![
            sample(1, 100, Some(analysis(Instrument::Kick, None, 44100, 24))),
            sample(2, 100, Some(analysis(Instrument::Kick, None, 44100, 24))),
            sample(3, 100, Some(analysis(Instrument::Pad, None, 44100, 24))),
        ];
        let a = compute(&samples);
        assert_eq!(a.instrument_counts.len(), Instrument::ALL.len());
        let total: usize = a.instrument_counts.iter().map(|&(_, c)| c).sum();
        assert_eq!(total, a.analyzed_samples);

        let kick = a
            .instrument_counts
            .iter()
            .find(|(i, _)| *i == Instrument::Kick)
            .unwrap();
        assert_eq!(kick.1, 2);
        let snare = a
            .instrument_counts
            .iter()
            .find(|(i, _)| *i == Instrument::Snare)
            .unwrap();
        assert_eq!(snare.1, 0);
    }

    #[test]
    fn bpm_buckets_are_half_open_with_open_top() {
        let mk = |bpm| sample(bpm as i64, 0, Some(analysis(Instrument::Fx, Some(bpm), 44100, 16)));
        let samples = vec![mk(59), mk(60), mk(80), mk(100), mk(139), mk(140), mk(200)];
        let a = compute(&samples);
        let dist: Vec<usize> = a.bpm_distribution.iter().map(|&(_, c)| c).collect();
        // 59 lands nowhere; 80 goes to "80-100", 140 to "140+".
        assert_eq!(dist, vec![1, 1, 1, 1, 2]);
    }

    #[test]
    fn quality_issues_flag_sub_cd_audio() {
        let samples = vec![
            sample(1, 0, Some(analysis(Instrument::Vocal, None, 22050, 16))),
            sample(2, 0, Some(analysis(Instrument::Vocal, None, 48000, 8))),
            sample(3, 0, Some(analysis(Instrument::Vocal, None, 44100, 16))),
            sample(4, 0, None),
        ];
        assert_eq!(compute(&samples).quality_issues, 2);
    }

    #[test]
    fn duplicate_count_counts_linked_samples() {
        let mut a = sample(1, 100, None);
        let mut b = sample(2, 100, None);
        a.duplicate_ids.insert(2);
        b.duplicate_ids.insert(1);
        let c = sample(3, 100, None);
        assert_eq!(compute(&[a, b, c]).duplicate_count, 2);
    }
}
