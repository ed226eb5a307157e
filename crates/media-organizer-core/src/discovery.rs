use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::formats::{self, filesystem_tags, Decoder};
use crate::logging::{log_decode_skip, log_file_error};
use crate::organize::PlanFailure;
use crate::types::{MediaKind, MetaData};

/// Progress callback: fraction of top-level entries finished, directory being scanned
pub type ProgressFn = dyn Fn(f64, &str) + Send + Sync;

/// Walk `root_path` and decode every file found
pub fn walk<P: AsRef<Path>>(
    root_path: &Path,
    recursive: bool,
    ignore_paths: &[P],
) -> Result<Vec<MetaData>> {
    Walker::new()
        .recursive(recursive)
        .with_ignore_paths(ignore_paths)
        .walk(root_path)
}

/// Depth-first metadata walker
///
/// Output order: a directory record, then its files in file-name order, then
/// (when recursive) each subdirectory's records in file-name order.
#[derive(Clone)]
pub struct Walker {
    recursive: bool,
    ignore_paths: Vec<PathBuf>,
    shutdown: Arc<AtomicBool>,
    progress: Option<Arc<ProgressFn>>,
}

impl Default for Walker {
    fn default() -> Self {
        Self::new()
    }
}

impl Walker {
    pub fn new() -> Self {
        Self {
            recursive: true,
            ignore_paths: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Skip these paths and everything below them
    pub fn with_ignore_paths<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        self.ignore_paths
            .extend(paths.iter().map(|p| canonical_or_given(p.as_ref())));
        self
    }

    /// Share a cancellation flag; the walk stops at the next directory level once set
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Walk `root_path`, failing on the first file that cannot be decoded
    ///
    /// Every failure of the walk is reported, several of them as [`Error::Batch`].
    pub fn walk(&self, root_path: &Path) -> Result<Vec<MetaData>> {
        let (records, failures) = self.walk_lenient(root_path)?;
        match Error::from_failures(failures.into_iter().map(|f| f.error).collect()) {
            Some(error) => Err(error),
            None => Ok(records),
        }
    }

    /// Walk `root_path`, setting aside files and directories that fail
    ///
    /// Failures come back in traversal order next to the records that did
    /// decode. Cancellation and an unreadable root still fail the walk.
    pub fn walk_lenient(&self, root_path: &Path) -> Result<(Vec<MetaData>, Vec<PlanFailure>)> {
        let metadata =
            fs::metadata(root_path).map_err(|_| Error::NotFound(root_path.to_path_buf()))?;
        let root = fs::canonicalize(root_path)?;

        if self.is_ignored(&root) {
            log_decode_skip(&root, "root is ignored");
            return Ok((Vec::new(), Vec::new()));
        }

        if metadata.is_file() {
            let (decoder, kind) =
                formats::lookup(&root).ok_or_else(|| Error::UnsupportedFormat(root.clone()))?;
            return Ok(match decode_file(&root, decoder, kind) {
                Ok(record) => (vec![record], Vec::new()),
                Err(error) => (Vec::new(), vec![PlanFailure { source: root, error }]),
            });
        }
        if !metadata.is_dir() {
            return Err(Error::NotFound(root));
        }

        let walked = self.walk_directory(&root, true)?;
        if let Some(progress) = &self.progress {
            progress(1.0, &root.to_string_lossy());
        }
        Ok(walked)
    }

    /// Records below `dir` plus the entries that failed
    ///
    /// Errors only on cancellation or when `dir` itself cannot be listed.
    fn walk_directory(
        &self,
        dir: &Path,
        top_level: bool,
    ) -> Result<(Vec<MetaData>, Vec<PlanFailure>)> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.into_path();
            if self.is_ignored(&path) {
                log_decode_skip(&path, "ignored path");
                continue;
            }
            if path.is_dir() {
                subdirs.push(path);
            } else if path.is_file() {
                files.push(path);
            } else {
                log_decode_skip(&path, "not a regular file");
            }
        }

        let total = files.len() + subdirs.len();
        let finished = AtomicUsize::new(0);
        let tick = |path: &Path| {
            if let (true, Some(progress)) = (top_level, &self.progress) {
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                progress(done as f64 / total as f64, &path.to_string_lossy());
            }
        };

        let (file_results, dir_results) = rayon::join(
            || {
                files
                    .par_iter()
                    .map(|path| {
                        let (decoder, kind) = formats::lookup_or_generic(path);
                        let result = decode_file(path, decoder, kind);
                        tick(path.as_path());
                        result
                    })
                    .collect::<Vec<_>>()
            },
            || {
                if !self.recursive {
                    return Vec::new();
                }
                subdirs
                    .par_iter()
                    .map(|path| {
                        let result = self.walk_directory(path, false);
                        tick(path.as_path());
                        result
                    })
                    .collect::<Vec<_>>()
            },
        );

        // par_iter keeps input order, so enumeration order survives the join
        let mut records = vec![MetaData::directory(dir)];
        let mut failures = Vec::new();
        for (path, result) in files.into_iter().zip(file_results) {
            match result {
                Ok(record) => records.push(record),
                Err(error) => failures.push(PlanFailure { source: path, error }),
            }
        }
        for (path, result) in subdirs.into_iter().zip(dir_results) {
            match result {
                Ok((nested, nested_failures)) => {
                    records.extend(nested);
                    failures.extend(nested_failures);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => {
                    log_file_error(&path, "list", &error);
                    failures.push(PlanFailure { source: path, error });
                }
            }
        }

        Ok((records, failures))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_paths.iter().any(|ignored| path.starts_with(ignored))
    }
}

/// Decode one file and merge in its filesystem tags
fn decode_file(path: &Path, decoder: Decoder, kind: MediaKind) -> Result<MetaData> {
    let mut tags = filesystem_tags(path).map_err(|e| {
        log_file_error(path, "metadata", &e);
        Error::Io(e)
    })?;

    let mut reader = BufReader::new(File::open(path)?);
    match decoder.decode(&mut reader) {
        Ok(decoded) => tags.extend(decoded),
        Err(source) => {
            log_file_error(path, "decode", &source);
            return Err(Error::MalformedData {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    Ok(MetaData::file(kind, path, tags))
}

fn canonical_or_given(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagKey;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn create_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let file_path = dir.join(name);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(contents).unwrap();
        file_path
    }

    fn setup_test_directory() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("b_sub");
        fs::create_dir(&sub).unwrap();

        create_file(dir.path(), "c.txt", b"notes");
        create_file(dir.path(), "a.jpg", b"DUMMY IMAGE DATA");
        create_file(&sub, "inner.avi", b"RIFF");
        dir
    }

    fn names(records: &[MetaData]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_depth_first_order() {
        let dir = setup_test_directory();
        let records = walk::<PathBuf>(dir.path(), true, &[]).unwrap();

        let root = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            names(&records),
            vec![root, "a.jpg".into(), "c.txt".into(), "b_sub".into(), "inner.avi".into()]
        );
        assert!(records[0].is_directory());
        assert_eq!(records[1].kind(), MediaKind::Image);
        assert_eq!(records[2].kind(), MediaKind::GenericFile);
        assert_eq!(records[4].kind(), MediaKind::Video);
    }

    #[test]
    fn test_non_recursive() {
        let dir = setup_test_directory();
        let records = walk::<PathBuf>(dir.path(), false, &[]).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_ignored_subdirectory() {
        let dir = setup_test_directory();
        let ignored = [dir.path().join("b_sub")];
        let records = walk(dir.path(), true, &ignored[..]).unwrap();
        assert!(records.iter().all(|r| !r.path().ends_with("b_sub")));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_ignored_root_is_empty() {
        let dir = setup_test_directory();
        let ignored = [dir.path().to_path_buf()];
        assert!(walk(&dir.path().join("b_sub"), true, &ignored[..])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_root() {
        let dir = tempdir().unwrap();
        let result = walk::<PathBuf>(&dir.path().join("nope"), true, &[]);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_single_file() {
        let dir = setup_test_directory();
        let records = walk::<PathBuf>(&dir.path().join("a.jpg"), true, &[]).unwrap();
        assert_eq!(records.len(), 1);
        let tags = records[0].tags().unwrap();
        assert_eq!(tags.integer(TagKey::Size), Some(16));

        let result = walk::<PathBuf>(&dir.path().join("c.txt"), true, &[]);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let dir = tempdir().unwrap();
        create_file(dir.path(), "broken.bmp", b"XX not a bitmap at all");
        let result = walk::<PathBuf>(dir.path(), true, &[]);
        assert!(matches!(result, Err(Error::MalformedData { .. })));
    }

    #[test]
    fn test_every_failure_in_batch() {
        let dir = tempdir().unwrap();
        create_file(dir.path(), "one.bmp", b"XX");
        create_file(dir.path(), "two.bmp", b"YY");
        create_file(dir.path(), "fine.txt", b"ok");
        match walk::<PathBuf>(dir.path(), true, &[]) {
            Err(Error::Batch(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected batch error, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_walk_keeps_sibling_directories() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good");
        let other = dir.path().join("other");
        fs::create_dir(&good).unwrap();
        fs::create_dir(&other).unwrap();
        for i in 0..5 {
            create_file(&good, &format!("{}.txt", i), b"fine");
        }
        let broken = create_file(&other, "broken.bmp", b"XX not a bitmap");
        create_file(&other, "note.txt", b"fine");

        let (records, failures) = Walker::new().walk_lenient(dir.path()).unwrap();

        assert_eq!(records.iter().filter(|r| !r.is_directory()).count(), 6);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, fs::canonicalize(&broken).unwrap());
        assert!(matches!(failures[0].error, Error::MalformedData { .. }));
    }

    #[test]
    fn test_lenient_walk_of_broken_single_file() {
        let dir = tempdir().unwrap();
        let broken = create_file(dir.path(), "broken.bmp", b"XX");
        let (records, failures) = Walker::new().walk_lenient(&broken).unwrap();
        assert!(records.is_empty());
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_cancelled_walk() {
        let dir = setup_test_directory();
        let flag = Arc::new(AtomicBool::new(true));
        let result = Walker::new().with_shutdown_flag(flag).walk(dir.path());
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_progress_reaches_one() {
        let dir = setup_test_directory();
        let seen = Arc::new(Mutex::new(Vec::<f64>::new()));
        let sink = Arc::clone(&seen);
        Walker::new()
            .with_progress(Arc::new(move |fraction: f64, _dir: &str| {
                sink.lock().unwrap().push(fraction);
            }))
            .walk(dir.path())
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.iter().all(|f| (0.0..=1.0).contains(f)));
    }
}
