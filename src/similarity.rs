//! Perceptual similarity links between classified samples.
//!
//! The score is a weighted sum over instrument, tempo, energy, and mood.
//! Weights are summed in integer hundredths so the strict `> 0.70` link
//! threshold is exact; a pair at 0.25 + 0.25 + 0.20 must not link, and f64
//! summation would nudge it just past the threshold.

use rayon::prelude::*;

use crate::db::models::{Sample, SampleAnalysis};
use crate::db::{Database, Result};

/// Link threshold in hundredths. A pair links iff its score is above this.
const LINK_THRESHOLD: u32 = 70;

const INSTRUMENT_WEIGHT: u32 = 30;
const BPM_CLOSE_WEIGHT: u32 = 25;
const BPM_NEAR_WEIGHT: u32 = 15;
const ENERGY_CLOSE_WEIGHT: u32 = 20;
const ENERGY_NEAR_WEIGHT: u32 = 10;
const MOOD_WEIGHT: u32 = 25;

#[derive(Debug)]
pub struct SimilarityResult {
    pub samples_scored: usize,
    pub pairs_linked: usize,
}

/// Recompute similarity links over every classified sample and replace the
/// stored links wholesale.
pub fn recompute_similarity(db: &Database) -> Result<SimilarityResult> {
    let samples = db.get_all_samples()?;
    let pairs = similar_pairs(&samples);
    db.replace_similar_links(&pairs)?;

    let scored = samples.iter().filter(|s| s.analysis.is_some()).count();
    Ok(SimilarityResult {
        samples_scored: scored,
        pairs_linked: pairs.len(),
    })
}

/// Score every unordered pair of classified samples, returning those above
/// the link threshold. Samples without analysis are skipped entirely.
pub fn similar_pairs(samples: &[Sample]) -> Vec<(i64, i64, f64)> {
    let classified: Vec<(i64, &SampleAnalysis)> = samples
        .iter()
        .filter_map(|s| s.analysis.as_ref().map(|a| (s.id, a)))
        .collect();

    (0..classified.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let (id_a, a) = classified[i];
            classified[i + 1..]
                .iter()
                .filter_map(move |&(id_b, b)| {
                    let points = score_points(a, b);
                    (points > LINK_THRESHOLD)
                        .then_some((id_a, id_b, points as f64 / 100.0))
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Similarity score in [0, 1]. Symmetric; identical analyses score 1.0.
pub fn similarity_score(a: &SampleAnalysis, b: &SampleAnalysis) -> f64 {
    score_points(a, b) as f64 / 100.0
}

fn score_points(a: &SampleAnalysis, b: &SampleAnalysis) -> u32 {
    let mut points = 0;

    if a.instrument == b.instrument {
        points += INSTRUMENT_WEIGHT;
    }

    // Tempo only contributes when both sides have one.
    if let (Some(bpm_a), Some(bpm_b)) = (a.bpm, b.bpm) {
        let diff = (bpm_a - bpm_b).abs();
        if diff <= 5 {
            points += BPM_CLOSE_WEIGHT;
        } else if diff <= 10 {
            points += BPM_NEAR_WEIGHT;
        }
    }

    let energy_diff = (a.energy - b.energy).abs();
    if energy_diff <= 1 {
        points += ENERGY_CLOSE_WEIGHT;
    } else if energy_diff <= 2 {
        points += ENERGY_NEAR_WEIGHT;
    }

    if a.mood == b.mood {
        points += MOOD_WEIGHT;
    }

    points
}
