//! Destination checks and plan execution.
//!
//! Nothing here deletes or overwrites a file unless the [`CopyMode`] asks for
//! it, and a dry run only logs what would change.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::deduplication::CopyPlanItem;
use crate::error::{Error, Result};
use crate::logging::{log_file_error, log_fs_modification};

/// How an existing destination is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyMode {
    /// The destination must be missing or empty
    #[default]
    RequireEmpty,
    /// Copy only targets that do not exist yet
    Delta,
    /// Replace existing targets
    ForceOverwrite,
    /// Remove the destination tree first
    WipeBefore,
}

/// Outcome of a plan execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub copied: usize,
    pub skipped: usize,
}

pub struct SafetyManager {
    mode: CopyMode,
    dry_run: bool,
    shutdown: Arc<AtomicBool>,
}

impl SafetyManager {
    pub fn new(mode: CopyMode, dry_run: bool) -> Self {
        Self {
            mode,
            dry_run,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop copying once the flag is set
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Verify the destination satisfies the mode's preconditions
    pub fn check_destination(&self, destination: &Path, source_roots: &[PathBuf]) -> Result<()> {
        match self.mode {
            CopyMode::RequireEmpty if !is_missing_or_empty(destination)? => {
                Err(Error::DestinationConflict(format!(
                    "{} exists and is not empty",
                    destination.display()
                )))
            }
            CopyMode::WipeBefore => {
                let destination = canonical_or_given(destination);
                for source in source_roots {
                    let source = canonical_or_given(source);
                    if source.starts_with(&destination) || destination.starts_with(&source) {
                        return Err(Error::DestinationConflict(format!(
                            "{} overlaps source {}, refusing to wipe it",
                            destination.display(),
                            source.display()
                        )));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Copy every planned item into place
    pub fn execute_plan(
        &self,
        items: &[CopyPlanItem],
        destination: &Path,
        source_roots: &[PathBuf],
    ) -> Result<ExecutionReport> {
        self.check_destination(destination, source_roots)?;

        if self.mode == CopyMode::WipeBefore && destination.exists() {
            if self.dry_run {
                log_fs_modification("WIPE (dry run)", destination, None);
            } else {
                fs::remove_dir_all(destination)?;
                log_fs_modification("WIPE", destination, None);
            }
        }

        let mut report = ExecutionReport::default();
        for item in items {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }

            let source = item.source_path();
            let target = item.destination_path();
            if target.exists() {
                match self.mode {
                    CopyMode::Delta => {
                        debug!("Skipping existing {}", target.display());
                        report.skipped += 1;
                        continue;
                    }
                    CopyMode::ForceOverwrite => {}
                    CopyMode::RequireEmpty | CopyMode::WipeBefore => {
                        return Err(Error::DestinationConflict(format!(
                            "{} already exists",
                            target.display()
                        )));
                    }
                }
            }

            let details = format!("from {}", source.display());
            if self.dry_run {
                log_fs_modification("COPY (dry run)", target, Some(&details));
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(source, target).map_err(|e| {
                    log_file_error(source, "copy", &e);
                    Error::Io(e)
                })?;
                log_fs_modification("COPY", target, Some(&details));
            }
            report.copied += 1;
        }

        info!(
            "Copied {} files, skipped {}{}",
            report.copied,
            report.skipped,
            if self.dry_run { " (dry run)" } else { "" }
        );
        Ok(report)
    }
}

fn is_missing_or_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

fn canonical_or_given(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
