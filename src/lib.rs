pub mod analytics;
pub mod classify;
pub mod config;
pub mod db;
pub mod dedupe;
pub mod naming;
pub mod query;
pub mod scanner;
pub mod similarity;

/// Audio file extensions we support
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "aiff", "aif", "flac", "m4a", "ogg", "wma",
];

/// Application name for XDG paths
pub const APP_NAME: &str = "cratedigger";
