use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::deduplication::{Comparators, DuplicatePolicy};
use crate::error::{Error, Result};
use crate::safety::CopyMode;
use crate::template::PathPattern;

/// Destination pattern per media kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patterns {
    pub image: String,
    pub video: String,
    pub music: String,
    pub audio: String,
    pub generic: String,
}

impl Default for Patterns {
    fn default() -> Self {
        Self {
            image: "Images/%y/%m %M/%n".to_string(),
            video: "Videos/%y/%m %M/%n".to_string(),
            music: "Music/%y/%n".to_string(),
            audio: "Audio/%y/%n".to_string(),
            generic: "Other/%y/%n".to_string(),
        }
    }
}

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Level requested by `-v` flags; `None` when no flag was given
    pub fn from_verbosity(verbose: u8) -> Option<Self> {
        match verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Configuration of an organize run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether to run without making changes
    pub dry_run: bool,

    /// Whether to descend into subdirectories
    pub recursive: bool,

    /// Paths skipped during the walk, with everything below them
    pub ignore_paths: Vec<PathBuf>,

    /// Root of the organized tree
    pub destination: PathBuf,

    /// Destination pattern per media kind
    pub patterns: Patterns,

    /// What to do with colliding files
    pub duplicate_policy: DuplicatePolicy,

    /// Properties compared to detect identical content
    pub comparators: Comparators,

    /// How existing files at the destination are treated
    pub copy_mode: CopyMode,

    /// Number of threads to use for processing (0 = auto)
    pub threads: usize,

    /// Log level used when no verbosity flag overrides it
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dry_run: false,
            recursive: true,
            ignore_paths: Vec::new(),
            destination: PathBuf::from("organized"),
            patterns: Patterns::default(),
            duplicate_policy: DuplicatePolicy::Unique,
            comparators: Comparators::default(),
            copy_mode: CopyMode::RequireEmpty,
            threads: 0, // Auto
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("media-organizer").join("config.json"))
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Configured log level unless `-v` flags ask for more
    pub fn effective_log_level(&self, verbose: u8) -> LogLevel {
        LogLevel::from_verbosity(verbose).unwrap_or(self.log_level)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "Destination must not be empty".to_string(),
            ));
        }

        // Every pattern must compile
        for (kind, pattern) in [
            ("image", &self.patterns.image),
            ("video", &self.patterns.video),
            ("music", &self.patterns.music),
            ("audio", &self.patterns.audio),
            ("generic", &self.patterns.generic),
        ] {
            pattern.parse::<PathPattern>().map_err(|e| {
                Error::Configuration(format!("Invalid {} pattern: {}", kind, e))
            })?;
        }

        Ok(())
    }
}
