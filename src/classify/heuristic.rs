//! Bundled classifier backend: filename heuristics for the categorical
//! fields, hash-derived values for the numeric ones. Everything is a pure
//! function of the file name, so classification is idempotent as the
//! `Classifier` contract requires.

use std::path::Path;

use crate::db::models::{AudioQuality, Instrument, Mood, Sample, SampleAnalysis};
use crate::SUPPORTED_EXTENSIONS;

use super::{Classifier, ClassifyError};

const NOTE_NAMES: [&str; 7] = ["C", "D", "E", "F", "G", "A", "B"];

pub struct FilenameClassifier;

impl Classifier for FilenameClassifier {
    fn classify(&self, sample: &Sample) -> Result<SampleAnalysis, ClassifyError> {
        let ext = Path::new(&sample.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ClassifyError::UnsupportedFormat(sample.file_name.clone()));
        }

        let name = sample.file_name.to_lowercase();
        let instrument = detect_instrument(&name);
        let mood = detect_mood(&name);

        let (bpm_lo, bpm_hi) = bpm_range(&name);
        let bpm = bpm_lo + (hash(&name, "bpm") % (bpm_hi - bpm_lo + 1) as u64) as i32;

        let note = NOTE_NAMES[(hash(&name, "note") % 7) as usize];
        let scale = if hash(&name, "scale") % 2 == 0 { "major" } else { "minor" };

        Ok(SampleAnalysis {
            bpm: Some(bpm),
            key: Some(format!("{note} {scale}")),
            instrument,
            energy: 1 + (hash(&name, "energy") % 10) as i32,
            mood,
            is_loop: name.contains("loop") || name.contains("_lp"),
            quality: AudioQuality {
                bit_depth: if hash(&name, "depth") % 2 == 0 { 16 } else { 24 },
                sample_rate: if hash(&name, "rate") % 2 == 0 { 44100 } else { 48000 },
                bitrate: Some([192, 256, 320][(hash(&name, "bitrate") % 3) as usize]),
                format: ext,
            },
            duration: 0.5 + (hash(&name, "duration") % 300) as f64 / 10.0,
            has_vocals: instrument == Instrument::Vocal,
            confidence: (60 + (hash(&name, "confidence") % 36)) as f64 / 100.0,
        })
    }
}

/// First matching substring wins, tiered like the recording-type classifier.
fn detect_instrument(name: &str) -> Instrument {
    const TIERS: &[(&[&str], Instrument)] = &[
        (&["kick", "bd"], Instrument::Kick),
        (&["snare", "sd"], Instrument::Snare),
        (&["bass", "sub"], Instrument::Bass),
        (&["perc"], Instrument::Percussion),
        (&["pad"], Instrument::Pad),
        (&["lead"], Instrument::Lead),
        (&["melody", "synth"], Instrument::Melody),
        (&["fx", "effect", "sweep"], Instrument::Fx),
        (&["vocal", "vox"], Instrument::Vocal),
    ];
    for (needles, instrument) in TIERS {
        if needles.iter().any(|n| name.contains(n)) {
            return *instrument;
        }
    }
    Instrument::Unknown
}

fn detect_mood(name: &str) -> Mood {
    const TIERS: &[(&[&str], Mood)] = &[
        (&["dark", "deep"], Mood::Dark),
        (&["bright", "happy"], Mood::Bright),
        (&["aggressive", "hard"], Mood::Aggressive),
        (&["melodic", "sweet"], Mood::Melodic),
        (&["energetic", "pump"], Mood::Energetic),
        (&["ambient", "atmos"], Mood::Ambient),
        (&["emotional"], Mood::Emotional),
    ];
    for (needles, mood) in TIERS {
        if needles.iter().any(|n| name.contains(n)) {
            return *mood;
        }
    }
    Mood::Chill
}

/// Plausible tempo range from genre hints in the name; the fallback spans
/// the full reference range.
fn bpm_range(name: &str) -> (i32, i32) {
    if name.contains("trap") {
        (140, 160)
    } else if name.contains("house") {
        (120, 130)
    } else if name.contains("dnb") || name.contains("drum") {
        (170, 180)
    } else if name.contains("hip") || name.contains("hop") {
        (80, 95)
    } else if name.contains("techno") {
        (125, 135)
    } else {
        (60, 200)
    }
}

/// FNV-1a over the name plus a per-field salt, so each derived field gets an
/// independent stream from the same input.
fn hash(name: &str, salt: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for byte in name.bytes().chain([b':']).chain(salt.bytes()) {
        h ^= byte as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn sample(name: &str) -> Sample {
        Sample {
            id: 1,
            file_path: format!("/samples/{name}"),
            file_name: name.to_string(),
            file_size: 1000,
            date_added: Utc::now(),
            analysis: None,
            suggested_name: None,
            duplicate_ids: BTreeSet::new(),
            similar_ids: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn classification_is_idempotent() {
        let s = sample("dark_trap_kick_01.wav");
        let a = FilenameClassifier.classify(&s).unwrap();
        let b = FilenameClassifier.classify(&s).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unsupported_extension_fails_explicitly() {
        let err = FilenameClassifier.classify(&sample("notes.txt")).unwrap_err();
        assert!(matches!(err, ClassifyError::UnsupportedFormat(_)));
        let err = FilenameClassifier.classify(&sample("noext")).unwrap_err();
        assert!(matches!(err, ClassifyError::UnsupportedFormat(_)));
    }

    #[test]
    fn instrument_and_mood_from_name() {
        let a = FilenameClassifier
            .classify(&sample("dark_trap_kick_01.wav"))
            .unwrap();
        assert_eq!(a.instrument, Instrument::Kick);
        assert_eq!(a.mood, Mood::Dark);
        assert!(!a.has_vocals);

        let a = FilenameClassifier
            .classify(&sample("pump_vox_chop.flac"))
            .unwrap();
        assert_eq!(a.instrument, Instrument::Vocal);
        assert_eq!(a.mood, Mood::Energetic);
        assert!(a.has_vocals);

        let a = FilenameClassifier.classify(&sample("201_audio.wav")).unwrap();
        assert_eq!(a.instrument, Instrument::Unknown);
        assert_eq!(a.mood, Mood::Chill);
    }

    #[test]
    fn loop_markers_set_the_flag() {
        assert!(FilenameClassifier
            .classify(&sample("bass_loop.wav"))
            .unwrap()
            .is_loop);
        assert!(FilenameClassifier
            .classify(&sample("bass_lp.wav"))
            .unwrap()
            .is_loop);
        assert!(!FilenameClassifier
            .classify(&sample("bass_hit.wav"))
            .unwrap()
            .is_loop);
    }

    #[test]
    fn genre_hint_constrains_bpm() {
        let a = FilenameClassifier
            .classify(&sample("trap_kick.wav"))
            .unwrap();
        let bpm = a.bpm.unwrap();
        assert!((140..=160).contains(&bpm));

        let a = FilenameClassifier
            .classify(&sample("house_groove.wav"))
            .unwrap();
        assert!((120..=130).contains(&a.bpm.unwrap()));
    }

    #[test]
    fn derived_values_respect_declared_ranges() {
        for name in ["a.wav", "kick.mp3", "vocal_take_7.aiff", "weird name (2).ogg"] {
            let a = FilenameClassifier.classify(&sample(name)).unwrap();
            assert!((1..=10).contains(&a.energy), "{name}: energy {}", a.energy);
            assert!((0.6..=0.95).contains(&a.confidence));
            assert!((60..=200).contains(&a.bpm.unwrap()));
            assert!(a.duration > 0.0);
            assert!([16, 24].contains(&a.quality.bit_depth));
            assert!([44100, 48000].contains(&a.quality.sample_rate));
        }
    }
}
