//! Suggested display names and tag sets derived from a sample's analysis.
//! Everything here is pure and deterministic.

use std::collections::BTreeSet;
use std::path::Path;

use crate::db::models::SampleAnalysis;

/// Mood is only trusted in the name above this confidence.
const MOOD_CONFIDENCE_FLOOR: f64 = 0.7;

/// Build a suggested display name: applicable parts joined with `_`,
/// keeping the original file extension.
pub fn suggest_name(file_name: &str, analysis: &SampleAnalysis) -> String {
    let mut parts: Vec<String> = Vec::new();

    if analysis.confidence > MOOD_CONFIDENCE_FLOOR {
        parts.push(analysis.mood.as_str().to_string());
    }

    if let Some(hint) = analysis.bpm.and_then(genre_hint) {
        parts.push(hint.to_string());
    }

    parts.push(analysis.instrument.as_str().to_string());

    if let Some(bpm) = analysis.bpm {
        parts.push(format!("{bpm}BPM"));
    }

    if let Some(key) = &analysis.key {
        parts.push(key.replace(' ', ""));
    }

    let base = parts.join("_");
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

/// Genre hint from tempo. First matching band wins.
fn genre_hint(bpm: i32) -> Option<&'static str> {
    if (130..=150).contains(&bpm) {
        Some("Trap")
    } else if (120..=129).contains(&bpm) {
        Some("House")
    } else if bpm <= 90 {
        Some("Lofi")
    } else {
        None
    }
}

/// Derive the lower-case tag set for a classified sample.
pub fn derive_tags(analysis: &SampleAnalysis) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();

    tags.insert(analysis.instrument.as_str().to_lowercase());
    tags.insert(analysis.mood.as_str().to_lowercase());

    if analysis.energy >= 8 {
        tags.insert("high-energy".to_string());
    } else if analysis.energy <= 3 {
        tags.insert("low-energy".to_string());
    }

    if analysis.is_loop {
        tags.insert("loop".to_string());
    }

    if analysis.has_vocals {
        tags.insert("vocal".to_string());
    }

    if let Some(bpm) = analysis.bpm {
        if bpm >= 140 {
            tags.insert("fast".to_string());
        } else if bpm <= 80 {
            tags.insert("slow".to_string());
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AudioQuality, Instrument, Mood};

    fn analysis() -> SampleAnalysis {
        SampleAnalysis {
            bpm: Some(140),
            key: Some("C minor".into()),
            instrument: Instrument::Kick,
            energy: 8,
            mood: Mood::Dark,
            is_loop: false,
            quality: AudioQuality {
                bit_depth: 24,
                sample_rate: 44100,
                bitrate: None,
                format: "wav".into(),
            },
            duration: 1.5,
            has_vocals: false,
            confidence: 0.9,
        }
    }

    #[test]
    fn full_name_with_all_parts() {
        assert_eq!(
            suggest_name("kick_01.wav", &analysis()),
            "Dark_Trap_Kick_140BPM_Cminor.wav"
        );
    }

    #[test]
    fn low_confidence_drops_mood() {
        let mut a = analysis();
        a.confidence = 0.7; // not strictly above the floor
        assert_eq!(suggest_name("kick_01.wav", &a), "Trap_Kick_140BPM_Cminor.wav");
    }

    #[test]
    fn missing_bpm_and_key_leave_only_instrument() {
        let mut a = analysis();
        a.bpm = None;
        a.key = None;
        a.confidence = 0.5;
        assert_eq!(suggest_name("kick_01.wav", &a), "Kick.wav");
    }

    #[test]
    fn extension_is_preserved_unchanged() {
        let mut a = analysis();
        a.bpm = None;
        a.key = None;
        a.confidence = 0.5;
        assert_eq!(suggest_name("loop.FLAC", &a), "Kick.FLAC");
        assert_eq!(suggest_name("noext", &a), "Kick");
    }

    #[test]
    fn genre_hint_bands() {
        assert_eq!(genre_hint(130), Some("Trap"));
        assert_eq!(genre_hint(150), Some("Trap"));
        assert_eq!(genre_hint(129), Some("House"));
        assert_eq!(genre_hint(120), Some("House"));
        assert_eq!(genre_hint(90), Some("Lofi"));
        assert_eq!(genre_hint(91), None);
        assert_eq!(genre_hint(119), None);
        assert_eq!(genre_hint(151), None);
    }

    #[test]
    fn tag_set_for_energetic_kick() {
        let tags = derive_tags(&analysis());
        let expected: BTreeSet<String> =
            ["kick", "dark", "high-energy", "fast"].map(String::from).into();
        assert_eq!(tags, expected);
    }

    #[test]
    fn tag_edges() {
        let mut a = analysis();
        a.energy = 3;
        a.bpm = Some(80);
        a.is_loop = true;
        a.has_vocals = true;
        let tags = derive_tags(&a);
        assert!(tags.contains("low-energy"));
        assert!(!tags.contains("high-energy"));
        assert!(tags.contains("slow"));
        assert!(tags.contains("loop"));
        assert!(tags.contains("vocal"));

        // Mid-range energy and tempo add neither tag
        a.energy = 5;
        a.bpm = Some(100);
        a.is_loop = false;
        a.has_vocals = false;
        let tags = derive_tags(&a);
        let expected: BTreeSet<String> = ["kick", "dark"].map(String::from).into();
        assert_eq!(tags, expected);
    }
}
