//! ID3v1 trailer and ID3v2 header tags of MP3 files.
//!
//! Both tag versions are read independently and merged, ID3v2 values taking
//! precedence per key.

use std::io::{Read, Seek, SeekFrom};

use log::{debug, trace, warn};

use crate::error::{DecodeError, DecodeResult};
use crate::formats::genres::genre_name;
use crate::formats::reader::{fixed_latin1, latin1, read_array, read_vec, stream_len};
use crate::types::{TagKey, TagValue, Tags};

const V1_TAG_LEN: u64 = 128;
const V2_HEADER_LEN: usize = 10;
const V2_FRAME_HEADER_LEN: usize = 10;

const FLAG_UNSYNCHRONISATION: u8 = 0x80;
const FLAG_EXTENDED_HEADER: u8 = 0x40;

/// Decode and merge the ID3v2 and ID3v1 tags of a stream
pub fn decode<R: Read + Seek>(reader: &mut R) -> DecodeResult<Tags> {
    let v2 = decode_v2(reader)?;
    let v1 = decode_v1(reader)?;

    let mut versions = Vec::new();
    let mut tags = Tags::new();
    if let Some((version, v2_tags)) = v2 {
        versions.push(version);
        tags.extend(v2_tags);
    }
    if let Some((version, v1_tags)) = v1 {
        versions.push(version);
        tags.merge_missing(v1_tags);
    }
    if !versions.is_empty() {
        tags.insert_text(TagKey::Version, versions.join(", "));
    }
    Ok(tags)
}

/// Fixed 128-byte `TAG` trailer, returning the version string and its tags
pub fn decode_v1<R: Read + Seek>(reader: &mut R) -> DecodeResult<Option<(String, Tags)>> {
    let len = stream_len(reader)?;
    if len < V1_TAG_LEN {
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(len - V1_TAG_LEN))?;
    let block: [u8; 128] = read_array(reader, "ID3v1 tag")?;
    if &block[..3] != b"TAG" {
        return Ok(None);
    }

    let mut tags = Tags::new();
    insert_nonempty(&mut tags, TagKey::Title, fixed_latin1(&block[3..33]));
    insert_nonempty(&mut tags, TagKey::Artist, fixed_latin1(&block[33..63]));
    insert_nonempty(&mut tags, TagKey::Album, fixed_latin1(&block[63..93]));
    let year = fixed_latin1(&block[93..97]);
    if !year.is_empty() {
        tags.insert(TagKey::Year, TagValue::numeric_or_text(year));
    }

    let comment = &block[97..127];
    // ID3v1.1 steals the last comment byte for the track number
    let version = if comment[28] == 0 && comment[29] != 0 {
        tags.insert_integer(TagKey::Track, i64::from(comment[29]));
        insert_nonempty(&mut tags, TagKey::Comment, fixed_latin1(&comment[..28]));
        "ID3v1.1"
    } else {
        insert_nonempty(&mut tags, TagKey::Comment, fixed_latin1(comment));
        "ID3v1"
    };

    if let Some(genre) = genre_name(usize::from(block[127])) {
        tags.insert_text(TagKey::Genre, genre);
    }

    Ok(Some((version.to_string(), tags)))
}

/// `ID3` header and frame list at the start of the stream
pub fn decode_v2<R: Read + Seek>(reader: &mut R) -> DecodeResult<Option<(String, Tags)>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut header = Vec::with_capacity(V2_HEADER_LEN);
    reader
        .by_ref()
        .take(V2_HEADER_LEN as u64)
        .read_to_end(&mut header)?;
    if header.len() < 3 || &header[..3] != b"ID3" {
        return Ok(None);
    }
    if header.len() < V2_HEADER_LEN {
        return Err(DecodeError::ShortRead("ID3v2 header"));
    }

    let major = header[3];
    let revision = header[4];
    let flags = header[5];
    let size = synchsafe([header[6], header[7], header[8], header[9]]);
    let version = format!("ID3v2.{}.{}", major, revision);

    let mut body = read_vec(reader, size as usize, "ID3v2 tag")?;
    if major < 3 {
        warn!("{} tags use 3-byte frame ids and are not decoded", version);
        return Ok(None);
    }
    if flags & FLAG_UNSYNCHRONISATION != 0 {
        body = resynchronise(&body);
    }

    let mut pos = 0;
    if flags & FLAG_EXTENDED_HEADER != 0 {
        if body.len() < 4 {
            return Err(DecodeError::ShortRead("ID3v2 extended header"));
        }
        let size_bytes = [body[0], body[1], body[2], body[3]];
        // v2.3 excludes the size field itself, v2.4 includes it
        pos = match major {
            3 => u32::from_be_bytes(size_bytes) as usize + 4,
            _ => synchsafe(size_bytes) as usize,
        };
    }

    let mut tags = Tags::new();
    while pos + V2_FRAME_HEADER_LEN <= body.len() {
        let frame = &body[pos..pos + V2_FRAME_HEADER_LEN];
        if frame[0] == 0 {
            // padding
            break;
        }
        let id = [frame[0], frame[1], frame[2], frame[3]];
        let size_bytes = [frame[4], frame[5], frame[6], frame[7]];
        let frame_size = match major {
            3 => u32::from_be_bytes(size_bytes),
            _ => synchsafe(size_bytes),
        } as usize;

        let start = pos + V2_FRAME_HEADER_LEN;
        let end = start
            .checked_add(frame_size)
            .filter(|&end| end <= body.len())
            .ok_or(DecodeError::ShortRead("ID3v2 frame"))?;

        match frame_key(&id) {
            Some(key) => {
                let text = decode_text(&body[start..end])?;
                if !text.is_empty() {
                    tags.insert(key, frame_value(key, text));
                }
            }
            None => trace!("Skipping ID3v2 frame {}", latin1(&id)),
        }
        pos = end;
    }

    debug!("Decoded {} with {} tags", version, tags.len());
    Ok(Some((version, tags)))
}

fn frame_key(id: &[u8; 4]) -> Option<TagKey> {
    match id {
        b"TALB" => Some(TagKey::Album),
        b"TIT2" => Some(TagKey::Title),
        b"TPE2" => Some(TagKey::Artist),
        b"TYER" => Some(TagKey::Year),
        b"TRCK" => Some(TagKey::Track),
        _ => None,
    }
}

fn frame_value(key: TagKey, text: String) -> TagValue {
    match key {
        TagKey::Year => TagValue::numeric_or_text(text),
        // "3/12" means track 3 of 12
        TagKey::Track => {
            let number = text.split('/').next().unwrap_or("").trim().parse::<i64>();
            match number {
                Ok(n) => TagValue::Integer(n),
                Err(_) => TagValue::Text(text),
            }
        }
        _ => TagValue::Text(text),
    }
}

/// Text frame payload: one encoding byte then the string
fn decode_text(payload: &[u8]) -> DecodeResult<String> {
    let Some((&encoding, data)) = payload.split_first() else {
        return Ok(String::new());
    };
    let text = match encoding {
        0 => latin1(data),
        1 => utf16_with_bom(data)?,
        2 => utf16(data, u16::from_be_bytes)?,
        3 => String::from_utf8(data.to_vec())
            .map_err(|e| DecodeError::UnsupportedEncoding(format!("UTF-8 frame: {}", e)))?,
        other => {
            return Err(DecodeError::UnsupportedEncoding(format!(
                "ID3v2 text encoding {}",
                other
            )))
        }
    };
    Ok(text.trim_end_matches('\0').to_string())
}

fn utf16_with_bom(data: &[u8]) -> DecodeResult<String> {
    match data {
        [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes),
        [] => Ok(String::new()),
        _ => Err(DecodeError::UnsupportedEncoding(
            "UTF-16 frame without byte order mark".to_string(),
        )),
    }
}

fn utf16(data: &[u8], to_unit: fn([u8; 2]) -> u16) -> DecodeResult<String> {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|e| DecodeError::UnsupportedEncoding(format!("UTF-16 frame: {}", e)))
}

/// 28-bit integer stored in the low 7 bits of four bytes
fn synchsafe(bytes: [u8; 4]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 7) | u32::from(b & 0x7F))
}

/// Undo unsynchronisation: every `FF 00` pair becomes `FF`
fn resynchronise(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut previous = 0u8;
    for &b in data {
        if !(previous == 0xFF && b == 0x00) {
            out.push(b);
        }
        previous = b;
    }
    out
}

fn insert_nonempty(tags: &mut Tags, key: TagKey, text: String) {
    if !text.is_empty() {
        tags.insert_text(key, text);
    }
}
