//! ISO base media (MP4/M4A/MOV) metadata from the `moov/udta/meta/ilst` tree.
//!
//! Each box is a 4-byte big-endian size (header included) followed by a 4-byte
//! type. A size of 1 means a 64-bit size follows the type, a size of 0 means
//! the box runs to the end of its parent. Item boxes inside `ilst` hold a
//! `data` box whose first 8 payload bytes are type flags and a reserved word.

use std::io::{Read, Seek, SeekFrom};

use log::{trace, warn};

use crate::error::{DecodeError, DecodeResult};
use crate::formats::genres::genre_name;
use crate::formats::reader::{
    latin1, read_array, read_u32_be, read_u64_be, read_vec, stream_len, until_nul,
};
use crate::types::{TagKey, TagValue, Tags};

const MAX_DEPTH: usize = 16;

/// `data` box type flags and reserved word
const DATA_PREFIX_LEN: u64 = 8;

const DATA_TYPE_IMPLICIT: u8 = 0;
const DATA_TYPE_TEXT: u8 = 1;
const DATA_TYPE_INTEGER: u8 = 21;

/// Decode the iTunes-style item list of an MP4 container
pub fn decode<R: Read + Seek>(reader: &mut R) -> DecodeResult<Tags> {
    let end = stream_len(reader)?;
    let mut tags = Tags::new();
    parse_boxes(reader, 0, end, 0, false, &mut tags)?;
    Ok(tags)
}

struct BoxHeader {
    kind: [u8; 4],
    payload: u64,
    end: u64,
}

/// Bytes to skip after the header before a container's children start,
/// or `None` for boxes that are not descended into.
fn container_padding(kind: &[u8; 4]) -> Option<u64> {
    match kind {
        b"moov" | b"trak" | b"mdia" | b"minf" | b"stbl" | b"udta" | b"ilst" => Some(0),
        b"meta" => Some(4),
        b"stsd" => Some(8),
        b"mp4a" | b"drms" => Some(28),
        _ => None,
    }
}

fn item_tag(kind: &[u8; 4]) -> Option<TagKey> {
    let key = match kind {
        b"\xA9alb" => TagKey::Album,
        b"\xA9ART" => TagKey::Artist,
        b"aART" => TagKey::AlbumArtist,
        b"\xA9cmt" => TagKey::Comment,
        b"\xA9day" => TagKey::Year,
        b"\xA9nam" => TagKey::Title,
        b"\xA9gen" | b"gnre" => TagKey::Genre,
        b"trkn" => TagKey::Track,
        b"disk" => TagKey::Disc,
        b"\xA9wrt" => TagKey::Composer,
        b"\xA9too" => TagKey::Encoder,
        b"tmpo" => TagKey::Bpm,
        b"cprt" => TagKey::Copyright,
        b"\xA9grp" => TagKey::Grouping,
        b"catg" => TagKey::Category,
        b"keyw" => TagKey::Keyword,
        b"desc" => TagKey::Description,
        _ => return None,
    };
    Some(key)
}

/// Read the box header at `pos`. `None` means the declared size is too small
/// to be a box; the caller stops iterating that level.
fn read_box_header<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    limit: u64,
) -> DecodeResult<Option<BoxHeader>> {
    reader.seek(SeekFrom::Start(pos))?;
    let size = read_u32_be(reader, "MP4 box header")?;
    let kind: [u8; 4] = read_array(reader, "MP4 box type")?;
    let (header_len, size) = match size {
        1 => (16, read_u64_be(reader, "MP4 box large size")?),
        0 => (8, limit - pos),
        n => (8, u64::from(n)),
    };
    if size < header_len {
        warn!(
            "Skipping malformed MP4 box '{}' with size {} at offset {}",
            latin1(&kind),
            size,
            pos
        );
        return Ok(None);
    }
    Ok(Some(BoxHeader {
        kind,
        payload: pos + header_len,
        end: pos.saturating_add(size),
    }))
}

fn parse_boxes<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    depth: usize,
    in_item_list: bool,
    tags: &mut Tags,
) -> DecodeResult<()> {
    if depth > MAX_DEPTH {
        warn!("MP4 box nesting deeper than {}, ignoring the rest", MAX_DEPTH);
        return Ok(());
    }

    let mut pos = start;
    while pos + 8 <= end {
        let Some(header) = read_box_header(reader, pos, end)? else {
            break;
        };
        let padding = container_padding(&header.kind);

        if header.end > end {
            if in_item_list || padding.is_some() {
                return Err(DecodeError::ShortRead("MP4 box"));
            }
            trace!("Box '{}' runs past its parent", latin1(&header.kind));
            break;
        }

        if in_item_list {
            parse_item(reader, &header, tags)?;
        } else if let Some(padding) = padding {
            parse_boxes(
                reader,
                header.payload + padding,
                header.end,
                depth + 1,
                &header.kind == b"ilst",
                tags,
            )?;
        } else {
            trace!("Skipping MP4 box '{}'", latin1(&header.kind));
        }
        pos = header.end;
    }
    Ok(())
}

/// Decode the first `data` child of an `ilst` item
fn parse_item<R: Read + Seek>(
    reader: &mut R,
    item: &BoxHeader,
    tags: &mut Tags,
) -> DecodeResult<()> {
    let Some(key) = item_tag(&item.kind) else {
        trace!("Skipping unknown ilst item '{}'", latin1(&item.kind));
        return Ok(());
    };

    let mut pos = item.payload;
    while pos + 8 <= item.end {
        let Some(child) = read_box_header(reader, pos, item.end)? else {
            break;
        };
        if child.end > item.end {
            return Err(DecodeError::ShortRead("MP4 data box"));
        }
        if &child.kind == b"data" {
            if child.end < child.payload + DATA_PREFIX_LEN {
                return Err(DecodeError::ShortRead("MP4 data box"));
            }
            let type_flags: [u8; 4] = read_array(reader, "MP4 data type")?;
            let _reserved: [u8; 4] = read_array(reader, "MP4 data reserved")?;
            let len = child.end - child.payload - DATA_PREFIX_LEN;
            let payload = read_vec(reader, len as usize, "MP4 data payload")?;

            if let Some(value) = decode_data(&item.kind, key, type_flags[3], &payload)? {
                tags.insert(key, value);
            }
            return Ok(());
        }
        pos = child.end;
    }
    Ok(())
}

fn decode_data(
    kind: &[u8; 4],
    key: TagKey,
    data_type: u8,
    payload: &[u8],
) -> DecodeResult<Option<TagValue>> {
    match data_type {
        DATA_TYPE_TEXT => {
            let text = latin1(until_nul(payload));
            if text.is_empty() {
                return Ok(None);
            }
            Ok(Some(match key {
                TagKey::Year => TagValue::numeric_or_text(text),
                _ => TagValue::Text(text),
            }))
        }
        DATA_TYPE_IMPLICIT | DATA_TYPE_INTEGER => match kind {
            // (reserved, number, total, reserved) as 16-bit words
            b"trkn" | b"disk" => {
                if payload.len() < 4 {
                    return Err(DecodeError::ShortRead("MP4 track number"));
                }
                let number = u16::from_be_bytes([payload[2], payload[3]]);
                Ok(Some(TagValue::Integer(i64::from(number))))
            }
            b"gnre" => {
                let index = integer(payload)?;
                Ok(index
                    .and_then(|i| usize::try_from(i - 1).ok())
                    .and_then(genre_name)
                    .map(|name| TagValue::Text(name.to_string())))
            }
            _ => Ok(integer(payload)?.map(TagValue::Integer)),
        },
        other => Err(DecodeError::UnsupportedEncoding(format!(
            "MP4 data type {}",
            other
        ))),
    }
}

fn integer(payload: &[u8]) -> DecodeResult<Option<i64>> {
    let value = match payload.len() {
        0 => return Ok(None),
        1 => i64::from(payload[0]),
        2 => i64::from(u16::from_be_bytes([payload[0], payload[1]])),
        4 => i64::from(u32::from_be_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ])),
        n => {
            return Err(DecodeError::UnsupportedEncoding(format!(
                "{}-byte MP4 integer",
                n
            )))
        }
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut data = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        data.extend_from_slice(kind);
        data.extend_from_slice(body);
        data
    }

    fn data_box(data_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0, 0, 0, data_type, 0, 0, 0, 0];
        body.extend_from_slice(payload);
        mp4_box(b"data", &body)
    }

    fn item(kind: &[u8; 4], data_type: u8, payload: &[u8]) -> Vec<u8> {
        mp4_box(kind, &data_box(data_type, payload))
    }

    fn movie_with_items(items: &[Vec<u8>]) -> Vec<u8> {
        let ilst = mp4_box(b"ilst", &items.concat());
        let mut meta_body = vec![0u8; 4];
        meta_body.extend_from_slice(&ilst);
        let meta = mp4_box(b"meta", &meta_body);
        let udta = mp4_box(b"udta", &meta);
        let moov = mp4_box(b"moov", &udta);

        let mut file = mp4_box(b"ftyp", b"M4A \0\0\0\0");
        file.extend_from_slice(&mp4_box(b"mdat", &[0xEE; 64]));
        file.extend_from_slice(&moov);
        file
    }

    #[test]
    fn test_item_list() {
        let data = movie_with_items(&[
            item(b"\xA9nam", 1, b"Title\0"),
            item(b"\xA9ART", 1, b"Artist"),
            item(b"\xA9day", 1, b"2019"),
            item(b"trkn", 0, &[0, 0, 0, 3, 0, 12, 0, 0]),
            item(b"tmpo", 21, &[0, 120]),
            item(b"gnre", 0, &[0, 18]),
        ]);
        let tags = decode(&mut Cursor::new(data)).unwrap();
        assert_eq!(tags.text(TagKey::Title).as_deref(), Some("Title"));
        assert_eq!(tags.text(TagKey::Artist).as_deref(), Some("Artist"));
        assert_eq!(tags.integer(TagKey::Year), Some(2019));
        assert_eq!(tags.integer(TagKey::Track), Some(3));
        assert_eq!(tags.integer(TagKey::Bpm), Some(120));
        assert_eq!(tags.text(TagKey::Genre).as_deref(), Some("Rock"));
    }

    #[test]
    fn test_unknown_items_are_skipped() {
        let data = movie_with_items(&[
            item(b"covr", 13, &[0xFF, 0xD8, 0xFF]),
            item(b"\xA9alb", 1, b"Album"),
        ]);
        let tags = decode(&mut Cursor::new(data)).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.text(TagKey::Album).as_deref(), Some("Album"));
    }

    #[test]
    fn test_unsupported_data_type_is_fatal() {
        let data = movie_with_items(&[item(b"\xA9nam", 2, b"\0T\0i")]);
        let result = decode(&mut Cursor::new(data));
        assert!(matches!(result, Err(DecodeError::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_undersized_box_does_not_loop() {
        let mut data = mp4_box(b"ftyp", b"isom");
        // declared size 4 is smaller than any header
        data.extend_from_slice(&[0, 0, 0, 4]);
        data.extend_from_slice(b"junk");
        data.extend_from_slice(&[0u8; 16]);
        let tags = decode(&mut Cursor::new(data)).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn test_meta_padding_is_required() {
        // Without the 4-byte version/flags word the item list is misaligned
        let ilst = mp4_box(b"ilst", &item(b"\xA9nam", 1, b"Title"));
        let meta = mp4_box(b"meta", &ilst);
        let moov = mp4_box(b"moov", &mp4_box(b"udta", &meta));
        let tags = decode(&mut Cursor::new(moov)).unwrap();
        assert!(tags.get(TagKey::Title).is_none());
    }

    #[test]
    fn test_truncated_container_is_fatal() {
        let mut data = movie_with_items(&[item(b"\xA9nam", 1, b"Title")]);
        data.truncate(data.len() - 6);
        let result = decode(&mut Cursor::new(data));
        assert!(matches!(result, Err(DecodeError::ShortRead(_))));
    }

    #[test]
    fn test_sample_description_padding() {
        // stsd (8) > mp4a (28) > udta is walked without reading the padding
        let udta = mp4_box(
            b"udta",
            &mp4_box(b"meta", &{
                let mut body = vec![0u8; 4];
                body.extend_from_slice(&mp4_box(
                    b"ilst",
                    &item(b"\xA9too", 1, b"encoder"),
                ));
                body
            }),
        );
        let mut mp4a_body = vec![0xFFu8; 28];
        mp4a_body.extend_from_slice(&udta);
        let mut stsd_body = vec![0xFFu8; 8];
        stsd_body.extend_from_slice(&mp4_box(b"mp4a", &mp4a_body));
        let stbl = mp4_box(b"stbl", &mp4_box(b"stsd", &stsd_body));
        let trak = mp4_box(b"trak", &mp4_box(b"mdia", &mp4_box(b"minf", &stbl)));
        let moov = mp4_box(b"moov", &trak);

        let tags = decode(&mut Cursor::new(moov)).unwrap();
        assert_eq!(tags.text(TagKey::Encoder).as_deref(), Some("encoder"));
    }
}
