//! Synthetic media fixtures shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory with its canonical path
///
/// The walker reports canonical paths, so tests compare against this one.
pub fn scratch_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    (dir, root)
}

/// Write `contents` to `dir/relative`, creating parent directories
pub fn write_file(dir: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::File::create(&path)
        .unwrap()
        .write_all(contents)
        .unwrap();
    path
}

fn latin1_field(text: &str, width: usize) -> Vec<u8> {
    let mut field = text.as_bytes().to_vec();
    field.resize(width, 0);
    field
}

/// Audio payload followed by an ID3v1 trailer; `track` makes it ID3v1.1
pub fn mp3_with_id3v1(title: &str, track: Option<u8>) -> Vec<u8> {
    let mut data = vec![0xFF, 0xFB, 0x90, 0x00];
    data.extend_from_slice(&[0u8; 60]);

    data.extend_from_slice(b"TAG");
    data.extend_from_slice(&latin1_field(title, 30));
    data.extend_from_slice(&latin1_field("Artist", 30));
    data.extend_from_slice(&latin1_field("Album", 30));
    data.extend_from_slice(b"1999");
    let mut comment = latin1_field("comment", 30);
    if let Some(track) = track {
        comment[28] = 0;
        comment[29] = track;
    }
    data.extend_from_slice(&comment);
    data.push(17); // Rock
    data
}

fn png_chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut data = (body.len() as u32).to_be_bytes().to_vec();
    data.extend_from_slice(kind);
    data.extend_from_slice(body);
    data.extend_from_slice(&[0u8; 4]);
    data
}

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// PNG stream with an IHDR, a `tEXt` Comment and IEND
pub fn png_with_comment(width: u32, height: u32, comment: &str) -> Vec<u8> {
    let mut ihdr = width.to_be_bytes().to_vec();
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);

    let mut text = b"Comment\0".to_vec();
    text.extend_from_slice(comment.as_bytes());

    let mut data = PNG_SIGNATURE.to_vec();
    data.extend_from_slice(&png_chunk(b"IHDR", &ihdr));
    data.extend_from_slice(&png_chunk(b"IDAT", &[0x78, 0x9C, 0x01]));
    data.extend_from_slice(&png_chunk(b"tEXt", &text));
    data.extend_from_slice(&png_chunk(b"IEND", b""));
    data
}

/// BMP file header plus a DIB header of the given size
pub fn bmp(header_size: u32, width: i32, height: i32) -> Vec<u8> {
    let mut data = b"BM".to_vec();
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&header_size.to_le_bytes());
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.resize(14 + header_size as usize, 0);
    data
}

fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut data = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    data.extend_from_slice(kind);
    data.extend_from_slice(body);
    data
}

/// Minimal M4A with a title and album in its item list
pub fn m4a(title: &str, album: &str) -> Vec<u8> {
    let text_item = |kind: &[u8; 4], text: &str| {
        let mut body = vec![0, 0, 0, 1, 0, 0, 0, 0];
        body.extend_from_slice(text.as_bytes());
        mp4_box(kind, &mp4_box(b"data", &body))
    };

    let mut items = text_item(b"\xA9nam", title);
    items.extend_from_slice(&text_item(b"\xA9alb", album));
    let ilst = mp4_box(b"ilst", &items);
    let mut meta_body = vec![0u8; 4];
    meta_body.extend_from_slice(&ilst);
    let moov = mp4_box(b"moov", &mp4_box(b"udta", &mp4_box(b"meta", &meta_body)));

    let mut data = mp4_box(b"ftyp", b"M4A \0\0\0\0");
    data.extend_from_slice(&mp4_box(b"mdat", &[0u8; 32]));
    data.extend_from_slice(&moov);
    data
}
