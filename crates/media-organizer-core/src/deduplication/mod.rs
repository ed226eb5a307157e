//! Duplicate resolution over planned copies.
//!
//! Items are visited in plan order and the first one seen wins. Three
//! collision sets are tracked: destination paths, content fingerprints (built
//! from the configured [`Comparators`]) and capture timestamps.
//!
//! The capture timestamp is the `Timestamp` tag only. None of the built-in
//! decoders set it, so that set stays empty until a decoder reporting capture
//! dates (EXIF, for instance) is added. Filesystem dates (`DateCreated`,
//! `DateModified`) are never compared: copies made in the same second would
//! collide. Files whose size or checksum cannot be read are set aside as
//! failures and never take part in a collision.

use bitflags::bitflags;
use chrono::{DateTime, Local};
use log::{debug, info};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::checksum::{compute_checksum, ChecksumAlgorithm};
use crate::error::{Error, Result};
use crate::logging::log_file_error;
use crate::organize::PlanFailure;
use crate::types::{TagKey, Tags};

bitflags! {
    /// Properties compared to decide whether two files have the same content
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Comparators: u8 {
        const FILENAME = 1 << 0;
        const SIZE     = 1 << 1;
        const MD5      = 1 << 2;
        const SHA1     = 1 << 3;
        const BLAKE3   = 1 << 4;
    }
}

impl Default for Comparators {
    fn default() -> Self {
        Self::SIZE | Self::BLAKE3
    }
}

impl Comparators {
    /// Parse a comma separated list such as `filename,size,md5`
    pub fn from_list(list: &str) -> Result<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(Self::empty(), |acc, name| {
                Self::from_name(&name.to_ascii_uppercase())
                    .map(|flag| acc | flag)
                    .ok_or_else(|| Error::Configuration(format!("unknown comparator '{}'", name)))
            })
    }

    /// Strongest requested content hash
    pub fn checksum_algorithm(&self) -> Option<ChecksumAlgorithm> {
        if self.contains(Self::BLAKE3) {
            Some(ChecksumAlgorithm::Blake3)
        } else if self.contains(Self::SHA1) {
            Some(ChecksumAlgorithm::Sha1)
        } else if self.contains(Self::MD5) {
            Some(ChecksumAlgorithm::Md5)
        } else {
            None
        }
    }
}

/// What happens to items that collide with an earlier one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Drop every colliding item
    #[default]
    Unique,
    /// Keep everything, renaming destination clashes to `name(2).ext`
    KeepAll,
}

/// One planned file copy
#[derive(Debug)]
pub struct CopyPlanItem {
    source_path: PathBuf,
    destination_path: PathBuf,
    metadata: Tags,
    checksum: OnceCell<String>,
}

impl CopyPlanItem {
    pub fn new(source_path: PathBuf, destination_path: PathBuf, metadata: Tags) -> Self {
        Self {
            source_path,
            destination_path,
            metadata,
            checksum: OnceCell::new(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn metadata(&self) -> &Tags {
        &self.metadata
    }

    /// Content checksum, read from disk on first use only
    pub fn checksum(&self, algorithm: ChecksumAlgorithm) -> Result<&str> {
        self.checksum_with(|path| compute_checksum(path, algorithm))
    }

    /// Like [`checksum`](Self::checksum) with a custom hasher for the first computation
    pub fn checksum_with<F>(&self, compute: F) -> Result<&str>
    where
        F: FnOnce(&Path) -> Result<String>,
    {
        self.checksum
            .get_or_try_init(|| compute(&self.source_path))
            .map(String::as_str)
    }

    /// Copy a computed checksum into the tags
    fn store_checksum_tag(&mut self) {
        if let Some(checksum) = self.checksum.get() {
            let checksum = checksum.clone();
            self.metadata.insert_text(TagKey::Checksum, checksum);
        }
    }

    fn size(&self) -> Result<i64> {
        match self.metadata.integer(TagKey::Size) {
            Some(size) => Ok(size),
            None => Ok(fs::metadata(&self.source_path)?.len() as i64),
        }
    }

    fn file_name(&self) -> Option<String> {
        self.metadata.text(TagKey::FileName).or_else(|| {
            self.source_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    file_name: Option<String>,
    size: Option<i64>,
    checksum: Option<String>,
}

/// Items kept by the resolver, the sources it dropped and those it could not read
#[derive(Debug, Default)]
pub struct Resolution {
    pub items: Vec<CopyPlanItem>,
    pub duplicates: BTreeSet<PathBuf>,
    pub failures: Vec<PlanFailure>,
}

/// Removes or renames colliding plan items
#[derive(Debug, Clone, Copy)]
pub struct DuplicateResolver {
    policy: DuplicatePolicy,
    comparators: Comparators,
}

impl DuplicateResolver {
    pub fn new(policy: DuplicatePolicy, comparators: Comparators) -> Self {
        Self {
            policy,
            comparators,
        }
    }

    /// Hash every item in parallel when a checksum comparator is set
    ///
    /// Items that cannot be hashed are removed from `items` and returned.
    pub fn precompute_checksums(&self, items: &mut Vec<CopyPlanItem>) -> Vec<PlanFailure> {
        let Some(algorithm) = self.comparators.checksum_algorithm() else {
            return Vec::new();
        };

        let results: Vec<Option<Error>> = items
            .par_iter_mut()
            .map(|item| match item.checksum(algorithm).map(|_| ()) {
                Ok(_) => {
                    item.store_checksum_tag();
                    None
                }
                Err(e) => {
                    log_file_error(item.source_path(), "checksum", &e);
                    Some(e)
                }
            })
            .collect();

        let mut failures = Vec::new();
        let mut hashed = Vec::with_capacity(items.len());
        for (item, result) in items.drain(..).zip(results) {
            match result {
                None => hashed.push(item),
                Some(error) => failures.push(PlanFailure {
                    source: item.source_path,
                    error,
                }),
            }
        }
        *items = hashed;
        failures
    }

    /// Filter `items` in order, first seen wins
    pub fn resolve(&self, items: Vec<CopyPlanItem>) -> Resolution {
        let mut destinations: HashSet<PathBuf> = HashSet::new();
        let mut fingerprints: HashMap<Fingerprint, Vec<PathBuf>> = HashMap::new();
        let mut timestamps: HashMap<DateTime<Local>, Vec<PathBuf>> = HashMap::new();
        let mut resolution = Resolution::default();

        for mut item in items {
            let fingerprint = match self.fingerprint(&item) {
                Ok(fingerprint) => fingerprint,
                Err(error) => {
                    log_file_error(item.source_path(), "fingerprint", &error);
                    resolution.failures.push(PlanFailure {
                        source: item.source_path,
                        error,
                    });
                    continue;
                }
            };
            let timestamp = item.metadata.timestamp(TagKey::Timestamp);

            match self.policy {
                DuplicatePolicy::Unique => {
                    let original = if destinations.contains(&item.destination_path) {
                        Some("destination")
                    } else if fingerprint
                        .as_ref()
                        .is_some_and(|f| fingerprints.contains_key(f))
                    {
                        Some("content")
                    } else if timestamp.is_some_and(|t| timestamps.contains_key(&t)) {
                        Some("timestamp")
                    } else {
                        None
                    };
                    if let Some(reason) = original {
                        debug!(
                            "Duplicate {} ({} collision)",
                            item.source_path.display(),
                            reason
                        );
                        resolution.duplicates.insert(item.source_path);
                        continue;
                    }
                }
                DuplicatePolicy::KeepAll => {
                    if destinations.contains(&item.destination_path) {
                        let renamed = next_free_name(&item.destination_path, &destinations);
                        debug!(
                            "Renaming {} to {}",
                            item.destination_path.display(),
                            renamed.display()
                        );
                        item.destination_path = renamed;
                    }
                }
            }

            destinations.insert(item.destination_path.clone());
            if let Some(fingerprint) = fingerprint {
                fingerprints
                    .entry(fingerprint)
                    .or_default()
                    .push(item.source_path.clone());
            }
            if let Some(timestamp) = timestamp {
                timestamps
                    .entry(timestamp)
                    .or_default()
                    .push(item.source_path.clone());
            }
            item.store_checksum_tag();
            resolution.items.push(item);
        }

        info!(
            "Kept {} items, {} duplicates, {} unreadable",
            resolution.items.len(),
            resolution.duplicates.len(),
            resolution.failures.len()
        );
        resolution
    }

    fn fingerprint(&self, item: &CopyPlanItem) -> Result<Option<Fingerprint>> {
        if self.comparators.is_empty() {
            return Ok(None);
        }
        let file_name = if self.comparators.contains(Comparators::FILENAME) {
            item.file_name()
        } else {
            None
        };
        let size = if self.comparators.contains(Comparators::SIZE) {
            Some(item.size()?)
        } else {
            None
        };
        let checksum = match self.comparators.checksum_algorithm() {
            Some(algorithm) => Some(item.checksum(algorithm)?.to_string()),
            None => None,
        };
        Ok(Some(Fingerprint {
            file_name,
            size,
            checksum,
        }))
    }
}

/// `name(2).ext`, `name(3).ext`, ... first one not in `taken`
fn next_free_name(path: &Path, taken: &HashSet<PathBuf>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 2;
    loop {
        let candidate = path.with_file_name(format!("{}({}){}", stem, counter, extension));
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
