//! Copy plan construction: records in, destination paths out.

use log::warn;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::Patterns;
use crate::deduplication::CopyPlanItem;
use crate::error::{Error, Result};
use crate::template::{PathPattern, PatternIndex};
use crate::types::{MediaKind, MetaData};

/// Counts reported with a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Files found by the walk, decoded or not
    pub parsed: usize,
    /// Files with a destination that survived duplicate resolution
    pub valid: usize,
    /// Files dropped as duplicates
    pub duplicates: usize,
    /// Files left out because they could not be decoded, placed or hashed
    pub failed: usize,
}

/// A file left out of the plan and why
#[derive(Debug)]
pub struct PlanFailure {
    pub source: PathBuf,
    pub error: Error,
}

/// Approved copies plus what was left out and why
#[derive(Debug, Default)]
pub struct CopyPlan {
    pub items: Vec<CopyPlanItem>,
    pub duplicates: BTreeSet<PathBuf>,
    pub failures: Vec<PlanFailure>,
    pub summary: PlanSummary,
}

impl CopyPlan {
    /// Ordered (source, destination) pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.items
            .iter()
            .map(|item| (item.source_path(), item.destination_path()))
    }
}

/// Compiled pattern for each non-directory kind
struct KindPatterns {
    image: PathPattern,
    video: PathPattern,
    music: PathPattern,
    audio: PathPattern,
    generic: PathPattern,
}

impl KindPatterns {
    fn compile(patterns: &Patterns) -> Result<Self> {
        Ok(Self {
            image: patterns.image.parse()?,
            video: patterns.video.parse()?,
            music: patterns.music.parse()?,
            audio: patterns.audio.parse()?,
            generic: patterns.generic.parse()?,
        })
    }

    fn get(&self, kind: MediaKind) -> Option<&PathPattern> {
        match kind {
            MediaKind::Directory => None,
            MediaKind::Image => Some(&self.image),
            MediaKind::Video => Some(&self.video),
            MediaKind::Music => Some(&self.music),
            MediaKind::Audio => Some(&self.audio),
            MediaKind::GenericFile => Some(&self.generic),
        }
    }
}

/// Resolve a destination for every file record, in record order
///
/// Files whose pattern cannot be resolved are returned as failures so the
/// rest of the plan can proceed.
pub fn plan_copies(
    records: &[MetaData],
    destination: &Path,
    patterns: &Patterns,
) -> Result<(Vec<CopyPlanItem>, Vec<PlanFailure>)> {
    let compiled = KindPatterns::compile(patterns)?;
    let index = PatternIndex::preload(records);

    let resolved: Vec<_> = records
        .par_iter()
        .filter_map(|record| {
            let pattern = compiled.get(record.kind())?;
            let tags = record.tags()?;
            let result = pattern
                .resolve(&index, destination, record)
                .map(|path| finish_path(path, destination, record.path(), pattern));
            Some((record.path(), tags, result))
        })
        .collect();

    let mut items = Vec::new();
    let mut failures = Vec::new();
    for (source, tags, result) in resolved {
        match result {
            Ok(target) => items.push(CopyPlanItem::new(
                source.to_path_buf(),
                target,
                tags.clone(),
            )),
            Err(error) => {
                warn!("No destination for {}: {}", source.display(), error);
                failures.push(PlanFailure {
                    source: source.to_path_buf(),
                    error,
                });
            }
        }
    }
    Ok((items, failures))
}

/// Add the source extension unless the pattern placed it already
fn finish_path(path: PathBuf, destination: &Path, source: &Path, pattern: &PathPattern) -> PathBuf {
    // Every segment dropped out: keep the source name
    if path == destination {
        return match source.file_name() {
            Some(name) => path.join(name),
            None => path,
        };
    }
    if pattern.uses_extension() {
        return path;
    }
    match (source.extension(), path.file_name()) {
        (Some(ext), Some(name)) => {
            let mut name = name.to_os_string();
            name.push(".");
            name.push(ext);
            path.with_file_name(name)
        }
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TagKey, TagValue, Tags};
    use chrono::{Local, TimeZone};

    fn record(path: &str, kind: MediaKind, with_date: bool) -> MetaData {
        let mut tags = Tags::new();
        let name = Path::new(path).file_name().unwrap().to_string_lossy();
        tags.insert_text(TagKey::FileName, name);
        if with_date {
            let taken = Local.with_ymd_and_hms(2021, 7, 14, 9, 30, 0).unwrap();
            tags.insert(TagKey::Timestamp, TagValue::Timestamp(taken));
        }
        MetaData::file(kind, path, tags)
    }

    fn patterns() -> Patterns {
        Patterns {
            image: "%y/%M/%n".into(),
            video: "video/%n.%e".into(),
            music: "%c".into(),
            audio: "%n".into(),
            generic: "%n".into(),
        }
    }

    #[test]
    fn test_plan_in_record_order_with_extension() {
        let records = vec![
            MetaData::directory("/src"),
            record("/src/img.jpg", MediaKind::Image, true),
            record("/src/clip.MP4", MediaKind::Video, false),
        ];
        let (items, failures) = plan_copies(&records, Path::new("/dest"), &patterns()).unwrap();

        assert!(failures.is_empty());
        let targets: Vec<_> = items.iter().map(|i| i.destination_path()).collect();
        assert_eq!(
            targets,
            vec![
                Path::new("/dest/2021/July/img.jpg"),
                Path::new("/dest/video/clip.MP4"),
            ]
        );
    }

    #[test]
    fn test_failures_do_not_stop_the_plan() {
        let records = vec![
            record("/src/undated.jpg", MediaKind::Image, false),
            record("/src/dated.jpg", MediaKind::Image, true),
        ];
        let (items, failures) = plan_copies(&records, Path::new("/dest"), &patterns()).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, PathBuf::from("/src/undated.jpg"));
        assert!(matches!(failures[0].error, Error::MissingTag { token: 'y', .. }));
    }

    #[test]
    fn test_all_segments_dropped_keeps_source_name() {
        let records = vec![record("/src/song.mp3", MediaKind::Music, false)];
        let (items, _) = plan_copies(&records, Path::new("/dest"), &patterns()).unwrap();
        assert_eq!(items[0].destination_path(), Path::new("/dest/song.mp3"));
    }
}
