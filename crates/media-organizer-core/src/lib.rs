//! Core functionality for organizing media collections.
//!
//! This library provides the components of an organize run:
//! - Directory walking and per-format metadata decoding
//! - Destination path templates
//! - Duplicate detection and resolution
//! - Safe plan execution

// -- External Dependencies --

use log::info;
use rayon::ThreadPool;

// -- Standard Library --
use std::{
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use deduplication::{Comparators, CopyPlanItem, DuplicatePolicy, DuplicateResolver};
pub use discovery::{walk, ProgressFn, Walker};
pub use error::{DecodeError, Error, Result};
pub use organize::{CopyPlan, PlanFailure, PlanSummary};
pub use safety::{CopyMode, ExecutionReport, SafetyManager};
pub use template::{PathPattern, PatternIndex};
pub use types::*;

// -- Public Modules --
pub mod checksum;
pub mod config;
pub mod deduplication;
pub mod discovery;
pub mod formats;
pub mod logging;
pub mod organize;
pub mod progress;
pub mod safety;
pub mod template;
pub mod types;

/// Main entry point for an organize run
pub struct MediaOrganizer {
    config: Config,
    destination: PathBuf,
    pool: ThreadPool,
    shutdown_requested: Arc<AtomicBool>,
    progress: Option<Arc<ProgressFn>>,
}

impl MediaOrganizer {
    /// Create a new MediaOrganizer with the provided configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let threads = match config.threads {
            0 => num_cpus::get(),
            n => n,
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build thread pool: {}", e)))?;

        let destination = if config.destination.is_absolute() {
            config.destination.clone()
        } else {
            std::env::current_dir()?.join(&config.destination)
        };

        Ok(Self {
            config,
            destination,
            pool,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Report walk progress to `progress`
    pub fn with_progress(mut self, progress: Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Flag that cancels a running walk or execution once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_requested)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Absolute destination root
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn walker(&self) -> Walker {
        // The destination may live inside the source tree
        let mut ignored = self.config.ignore_paths.clone();
        ignored.push(self.destination.clone());

        let walker = Walker::new()
            .recursive(self.config.recursive)
            .with_ignore_paths(ignored.as_slice())
            .with_shutdown_flag(self.shutdown_handle());
        match &self.progress {
            Some(progress) => walker.with_progress(Arc::clone(progress)),
            None => walker,
        }
    }

    /// Walk `source` and decode every file
    pub fn scan(&self, source: &Path) -> Result<Vec<MetaData>> {
        info!("Scanning {}", source.display());
        let walker = self.walker();
        let records = self.pool.install(|| walker.walk(source))?;
        info!("Found {} entries", records.len());
        Ok(records)
    }

    /// Build the copy plan for `source`
    ///
    /// Files that cannot be decoded, placed or hashed end up in
    /// [`CopyPlan::failures`]; the rest of the plan proceeds without them.
    pub fn plan(&self, source: &Path) -> Result<CopyPlan> {
        info!("Scanning {}", source.display());
        let walker = self.walker();
        let (records, mut failures) = self.pool.install(|| walker.walk_lenient(source))?;
        let parsed = records.iter().filter(|r| !r.is_directory()).count() + failures.len();

        let (mut items, unplaced) =
            organize::plan_copies(&records, &self.destination, &self.config.patterns)?;
        failures.extend(unplaced);

        let resolver =
            DuplicateResolver::new(self.config.duplicate_policy, self.config.comparators);
        let unhashed = self
            .pool
            .install(|| resolver.precompute_checksums(&mut items));
        failures.extend(unhashed);
        let resolution = resolver.resolve(items);
        failures.extend(resolution.failures);

        let summary = PlanSummary {
            parsed,
            valid: resolution.items.len(),
            duplicates: resolution.duplicates.len(),
            failed: failures.len(),
        };
        info!(
            "Plan: {} parsed, {} valid, {} duplicates, {} failed",
            summary.parsed, summary.valid, summary.duplicates, summary.failed
        );

        Ok(CopyPlan {
            items: resolution.items,
            duplicates: resolution.duplicates,
            failures,
            summary,
        })
    }

    /// Apply `plan` under the configured copy mode
    pub fn execute(&self, plan: &CopyPlan, source: &Path) -> Result<ExecutionReport> {
        SafetyManager::new(self.config.copy_mode, self.config.dry_run)
            .with_shutdown_flag(self.shutdown_handle())
            .execute_plan(&plan.items, &self.destination, &[source.to_path_buf()])
    }

    /// Plan and execute in one go
    pub fn run(&self, source: &Path) -> Result<(CopyPlan, ExecutionReport)> {
        // Fail before the walk when the destination is unusable
        SafetyManager::new(self.config.copy_mode, self.config.dry_run)
            .check_destination(&self.destination, &[source.to_path_buf()])?;

        let plan = self.plan(source)?;
        let report = self.execute(&plan, source)?;
        Ok((plan, report))
    }
}
