mod common;

use common::*;
use media_organizer_core::{
    Comparators, Config, CopyMode, DecodeError, DuplicatePolicy, Error, MediaOrganizer, Patterns,
};
use std::fs;
use std::path::{Path, PathBuf};

fn config(destination: &Path) -> Config {
    Config {
        destination: destination.to_path_buf(),
        patterns: Patterns {
            image: "images/%n".to_string(),
            video: "videos/%n".to_string(),
            music: "music/%o".to_string(),
            audio: "audio/%n".to_string(),
            generic: "other/%n".to_string(),
        },
        comparators: Comparators::empty(),
        threads: 2,
        ..Config::default()
    }
}

fn relative_destinations(organizer: &MediaOrganizer, source: &Path) -> Vec<PathBuf> {
    let plan = organizer.plan(source).unwrap();
    plan.pairs()
        .map(|(_, target)| target.strip_prefix(organizer.destination()).unwrap().to_path_buf())
        .collect()
}

#[test]
fn test_plan_follows_traversal_order() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "b.png", &png_with_comment(2, 2, "b"));
    write_file(&source, "a.mp3", &mp3_with_id3v1("A", None));
    write_file(&source, "nested/c.txt", b"c");

    let organizer = MediaOrganizer::new(config(&destination)).unwrap();
    assert_eq!(
        relative_destinations(&organizer, &source),
        vec![
            PathBuf::from("music/a.mp3"),
            PathBuf::from("images/b.png"),
            PathBuf::from("other/c.txt"),
        ]
    );
}

#[test]
fn test_unique_policy_drops_same_content() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    let image = png_with_comment(4, 4, "same");
    write_file(&source, "one/photo.png", &image);
    write_file(&source, "two/copy.png", &image);
    write_file(&source, "two/different.png", &png_with_comment(4, 4, "other"));

    let mut config = config(&destination);
    config.comparators = Comparators::SIZE | Comparators::BLAKE3;
    let organizer = MediaOrganizer::new(config).unwrap();
    let plan = organizer.plan(&source).unwrap();

    assert_eq!(plan.summary.parsed, 3);
    assert_eq!(plan.summary.valid, 2);
    assert_eq!(plan.summary.duplicates, 1);
    assert!(plan.duplicates.contains(&source.join("two/copy.png")));
    assert!(plan.items.iter().all(|item| item
        .metadata()
        .contains(media_organizer_core::TagKey::Checksum)));
}

#[test]
fn test_keep_all_renames_destination_clash() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "a/photo.png", &png_with_comment(1, 1, "first"));
    write_file(&source, "b/photo.png", &png_with_comment(1, 1, "second"));

    let mut config = config(&destination);
    config.duplicate_policy = DuplicatePolicy::KeepAll;
    let organizer = MediaOrganizer::new(config).unwrap();

    assert_eq!(
        relative_destinations(&organizer, &source),
        vec![
            PathBuf::from("images/photo.png"),
            PathBuf::from("images/photo(2).png"),
        ]
    );
}

#[test]
fn test_optional_segments_drop_out() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));
    write_file(&source, "song.mp3", &mp3_with_id3v1("S", None));

    let mut config = config(&destination);
    config.patterns.image = "cam %c/%n".to_string();
    config.patterns.music = "%t".to_string();
    let organizer = MediaOrganizer::new(config).unwrap();
    let plan = organizer.plan(&source).unwrap();

    assert!(plan.failures.is_empty());
    assert_eq!(
        relative_destinations(&organizer, &source),
        vec![PathBuf::from("photo.png"), PathBuf::from("song.mp3")]
    );
}

#[test]
fn test_corrupt_file_does_not_sink_the_plan() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    for i in 0..20 {
        write_file(
            &source,
            &format!("good/{:02}.png", i),
            &png_with_comment(1, 1, &format!("image {}", i)),
        );
    }
    let broken = write_file(&source, "other/broken.bmp", b"XX not a bitmap");
    write_file(&source, "other/notes.txt", b"still planned");

    let mut config = config(&destination);
    config.comparators = Comparators::SIZE | Comparators::BLAKE3;
    let organizer = MediaOrganizer::new(config).unwrap();
    let plan = organizer.plan(&source).unwrap();

    assert_eq!(plan.items.len(), 21);
    assert_eq!(plan.failures.len(), 1);
    assert_eq!(plan.failures[0].source, broken);
    assert!(matches!(
        plan.failures[0].error,
        Error::MalformedData {
            source: DecodeError::InvalidSignature(_),
            ..
        }
    ));
    assert_eq!(plan.summary.parsed, 22);
    assert_eq!(plan.summary.valid, 21);
    assert_eq!(plan.summary.failed, 1);
}

#[test]
fn test_run_copies_what_decoded() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "a/photo.png", &png_with_comment(1, 1, "x"));
    write_file(&source, "b/odd.bmp", &bmp(99, 1, 1));

    let organizer = MediaOrganizer::new(config(&destination)).unwrap();
    let (plan, report) = organizer.run(&source).unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(plan.summary.failed, 1);
    assert!(destination.join("images/photo.png").is_file());
    assert!(!destination.join("images/odd.bmp").exists());
}

#[test]
fn test_run_copies_into_destination() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));
    write_file(&source, "deep/song.mp3", &mp3_with_id3v1("S", Some(2)));

    let organizer = MediaOrganizer::new(config(&destination)).unwrap();
    let (plan, report) = organizer.run(&source).unwrap();

    assert_eq!(report.copied, 2);
    assert_eq!(plan.summary.valid, 2);
    assert_eq!(
        fs::read(destination.join("music/song.mp3")).unwrap(),
        mp3_with_id3v1("S", Some(2))
    );
    assert!(destination.join("images/photo.png").is_file());
}

#[test]
fn test_dry_run_leaves_destination_untouched() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));

    let mut config = config(&destination);
    config.dry_run = true;
    let organizer = MediaOrganizer::new(config).unwrap();
    let (_, report) = organizer.run(&source).unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(fs::read_dir(&destination).unwrap().count(), 0);
}

#[test]
fn test_require_empty_destination() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));
    write_file(&destination, "existing.txt", b"keep me");

    let organizer = MediaOrganizer::new(config(&destination)).unwrap();
    let result = organizer.run(&source);
    assert!(matches!(result, Err(Error::DestinationConflict(_))));
    assert_eq!(fs::read(destination.join("existing.txt")).unwrap(), b"keep me");
}

#[test]
fn test_delta_run_skips_existing() {
    let (_src, source) = scratch_dir();
    let (_dst, destination) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));
    write_file(&source, "song.mp3", &mp3_with_id3v1("S", None));

    let mut config = config(&destination);
    config.copy_mode = CopyMode::Delta;
    let organizer = MediaOrganizer::new(config).unwrap();
    let (_, first) = organizer.run(&source).unwrap();
    let (_, second) = organizer.run(&source).unwrap();

    assert_eq!(first.copied, 2);
    assert_eq!(second.copied, 0);
    assert_eq!(second.skipped, 2);
}

#[test]
fn test_destination_inside_source_is_not_scanned() {
    let (_src, source) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));
    write_file(&source, "organized/images/old.png", &png_with_comment(1, 1, "y"));

    let mut config = config(&source.join("organized"));
    config.copy_mode = CopyMode::Delta;
    let organizer = MediaOrganizer::new(config).unwrap();
    let plan = organizer.plan(&source).unwrap();

    assert_eq!(plan.summary.parsed, 1);
}

#[test]
fn test_destination_equal_to_source_scans_nothing() {
    let (_src, source) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));

    let organizer = MediaOrganizer::new(config(&source)).unwrap();
    assert!(organizer.scan(&source).unwrap().is_empty());
}

#[test]
fn test_wipe_before_refuses_overlapping_destination() {
    let (_src, source) = scratch_dir();
    write_file(&source, "photo.png", &png_with_comment(1, 1, "x"));

    let mut config = config(&source.join("out"));
    config.copy_mode = CopyMode::WipeBefore;
    let organizer = MediaOrganizer::new(config).unwrap();
    assert!(matches!(
        organizer.run(&source),
        Err(Error::DestinationConflict(_))
    ));
    assert!(source.join("photo.png").exists());
}
