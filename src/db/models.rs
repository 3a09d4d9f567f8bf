use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// Instrument role assigned by the classifier. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Kick,
    Snare,
    Bass,
    Melody,
    Fx,
    Vocal,
    Percussion,
    Lead,
    Pad,
    Unknown,
}

impl Instrument {
    pub const ALL: [Instrument; 10] = [
        Self::Kick,
        Self::Snare,
        Self::Bass,
        Self::Melody,
        Self::Fx,
        Self::Vocal,
        Self::Percussion,
        Self::Lead,
        Self::Pad,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kick => "Kick",
            Self::Snare => "Snare",
            Self::Bass => "Bass",
            Self::Melody => "Melody",
            Self::Fx => "FX",
            Self::Vocal => "Vocal",
            Self::Percussion => "Percussion",
            Self::Lead => "Lead",
            Self::Pad => "Pad",
            Self::Unknown => "Unknown",
        }
    }

    /// Case-insensitive parse of the display label.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
    }
}

/// Mood assigned by the classifier. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
    Dark,
    Bright,
    Aggressive,
    Chill,
    Melodic,
    Energetic,
    Ambient,
    Emotional,
}

impl Mood {
    pub const ALL: [Mood; 8] = [
        Self::Dark,
        Self::Bright,
        Self::Aggressive,
        Self::Chill,
        Self::Melodic,
        Self::Energetic,
        Self::Ambient,
        Self::Emotional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Bright => "Bright",
            Self::Aggressive => "Aggressive",
            Self::Chill => "Chill",
            Self::Melodic => "Melodic",
            Self::Energetic => "Energetic",
            Self::Ambient => "Ambient",
            Self::Emotional => "Emotional",
        }
    }

    /// Case-insensitive parse of the display label.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
    }
}

/// Technical quality of the source file as reported by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioQuality {
    pub bit_depth: i32,
    pub sample_rate: i32,
    pub bitrate: Option<i32>,
    pub format: String,
}

/// Derived musical metadata for one sample. Immutable once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleAnalysis {
    pub bpm: Option<i32>,
    pub key: Option<String>,
    pub instrument: Instrument,
    /// Perceived intensity, 1-10.
    pub energy: i32,
    pub mood: Mood,
    pub is_loop: bool,
    pub quality: AudioQuality,
    /// Seconds.
    pub duration: f64,
    pub has_vocals: bool,
    /// Classifier's self-reported certainty, 0-1.
    pub confidence: f64,
}

/// Ingest record for one discovered file (the file discovery feed).
#[derive(Debug, Clone)]
pub struct NewSample {
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub date_added: DateTime<Utc>,
}

/// One sample in the library, hydrated with all derived state.
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub date_added: DateTime<Utc>,
    /// None until classification succeeds; stays None if it failed.
    pub analysis: Option<SampleAnalysis>,
    pub suggested_name: Option<String>,
    /// Ids of the other members of this sample's duplicate group (full mesh).
    pub duplicate_ids: BTreeSet<i64>,
    /// Ids of samples scoring above the similarity threshold.
    pub similar_ids: BTreeSet<i64>,
    /// Lower-case tags derived from analysis.
    pub tags: BTreeSet<String>,
}

impl Sample {
    /// Name shown in listings: the suggested name once set, else the file name.
    pub fn display_name(&self) -> &str {
        self.suggested_name.as_deref().unwrap_or(&self.file_name)
    }
}
