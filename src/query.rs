//! Read-only filtered projections of the sample collection.

use std::ops::RangeInclusive;

use crate::db::models::{Instrument, Mood, Sample};

/// Energy assumed for samples with no analysis when range-filtering.
const DEFAULT_ENERGY: i32 = 5;

/// Search and filter criteria. Every unset field passes everything; all set
/// fields are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct FilterQuery {
    /// Free text, split on spaces; every term must match somewhere.
    pub text: Option<String>,
    pub instrument: Option<Instrument>,
    pub mood: Option<Mood>,
    /// Inclusive. Samples with no bpm always pass.
    pub bpm: Option<RangeInclusive<i32>>,
    /// Inclusive. Samples with no analysis count as energy 5.
    pub energy: Option<RangeInclusive<i32>>,
}

impl FilterQuery {
    pub fn apply<'a>(&self, samples: &'a [Sample]) -> Vec<&'a Sample> {
        samples.iter().filter(|s| self.matches(s)).collect()
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        if let Some(text) = &self.text {
            let terms = text.to_lowercase();
            if !terms
                .split(' ')
                .filter(|t| !t.is_empty())
                .all(|term| term_matches(sample, term))
            {
                return false;
            }
        }

        // Facet filters require analysis; an unclassified sample never
        // matches a set instrument or mood filter.
        if let Some(instrument) = self.instrument {
            match &sample.analysis {
                Some(a) if a.instrument == instrument => {}
                _ => return false,
            }
        }
        if let Some(mood) = self.mood {
            match &sample.analysis {
                Some(a) if a.mood == mood => {}
                _ => return false,
            }
        }

        // Range filters are permissive on missing data.
        if let Some(range) = &self.bpm {
            if let Some(bpm) = sample.analysis.as_ref().and_then(|a| a.bpm) {
                if !range.contains(&bpm) {
                    return false;
                }
            }
        }
        if let Some(range) = &self.energy {
            let energy = sample
                .analysis
                .as_ref()
                .map(|a| a.energy)
                .unwrap_or(DEFAULT_ENERGY);
            if !range.contains(&energy) {
                return false;
            }
        }

        true
    }
}

/// One search term matches if it is a substring of the display name, the
/// joined tag list, the key, or the "{bpm}bpm" literal.
fn term_matches(sample: &Sample, term: &str) -> bool {
    if sample.display_name().to_lowercase().contains(term) {
        return true;
    }

    let joined_tags = sample.tags.iter().cloned().collect::<Vec<_>>().join(" ");
    if joined_tags.contains(term) {
        return true;
    }

    if let Some(analysis) = &sample.analysis {
        if let Some(key) = &analysis.key {
            if key.to_lowercase().contains(term) {
                return true;
            }
        }
        if let Some(bpm) = analysis.bpm {
            if format!("{bpm}bpm").contains(term) {
                return true;
            }
        }
    }

    false
}
