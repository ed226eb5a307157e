use std::io::{Read, Seek};

use log::{debug, trace};

use crate::error::{DecodeError, DecodeResult};
use crate::formats::reader::{latin1, read_or_eof, read_vec, skip, split_nul};
use crate::types::{TagKey, Tags};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
const CRC_LEN: u64 = 4;

/// Textual keyword surfaced as a tag
const COMMENT_KEY: &str = "Comment";

/// Collect the comment text and image size from a PNG chunk stream.
///
/// A stream without the PNG signature yields no tags rather than an error.
pub fn decode<R: Read + Seek>(reader: &mut R) -> DecodeResult<Tags> {
    let mut tags = Tags::new();

    let mut signature = [0u8; 8];
    match read_or_eof(reader, &mut signature, "PNG signature") {
        Ok(true) if signature == SIGNATURE => {}
        Ok(_) | Err(DecodeError::ShortRead(_)) => {
            debug!("Missing PNG signature, no tags decoded");
            return Ok(tags);
        }
        Err(e) => return Err(e),
    }

    let mut header = [0u8; 8];
    while read_or_eof(reader, &mut header, "PNG chunk header")? {
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let chunk_type = [header[4], header[5], header[6], header[7]];

        match &chunk_type {
            b"IHDR" => {
                let body = read_vec(reader, length as usize, "IHDR chunk")?;
                if body.len() < 8 {
                    return Err(DecodeError::ShortRead("IHDR chunk"));
                }
                let width = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let height = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                tags.insert_integer(TagKey::Width, i64::from(width));
                tags.insert_integer(TagKey::Height, i64::from(height));
                tags.insert_text(TagKey::Resolution, format!("{}x{}", width, height));
                skip(reader, CRC_LEN, "IHDR checksum")?;
            }
            b"tEXt" | b"iTXt" => {
                let body = read_vec(reader, length as usize, "PNG text chunk")?;
                let (key, value) = if &chunk_type == b"tEXt" {
                    parse_text(&body)?
                } else {
                    parse_international_text(&body)?
                };
                if key == COMMENT_KEY {
                    tags.insert_text(TagKey::Comment, value);
                } else {
                    debug!("Discarding PNG text keyword '{}'", key);
                }
                skip(reader, CRC_LEN, "PNG text checksum")?;
            }
            b"IEND" => break,
            _ => {
                trace!("Skipping PNG chunk {}", latin1(&chunk_type));
                skip(reader, u64::from(length) + CRC_LEN, "PNG chunk")?;
            }
        }
    }

    Ok(tags)
}

/// `tEXt`: Latin-1 `keyword\0text`
fn parse_text(body: &[u8]) -> DecodeResult<(String, String)> {
    let (key, value) = split_nul(body).ok_or(DecodeError::Unterminated("tEXt keyword"))?;
    Ok((latin1(key), latin1(value)))
}

/// `iTXt`: `keyword\0 flag method language\0 translated\0 text` with UTF-8 text
fn parse_international_text(body: &[u8]) -> DecodeResult<(String, String)> {
    let (key, rest) = split_nul(body).ok_or(DecodeError::Unterminated("iTXt keyword"))?;
    let key = latin1(key);
    if rest.len() < 2 {
        return Err(DecodeError::ShortRead("iTXt compression fields"));
    }
    let compressed = rest[0] != 0;
    let (_language, rest) =
        split_nul(&rest[2..]).ok_or(DecodeError::Unterminated("iTXt language tag"))?;
    let (_translated, text) =
        split_nul(rest).ok_or(DecodeError::Unterminated("iTXt translated keyword"))?;

    if key != COMMENT_KEY {
        return Ok((key, String::new()));
    }
    if compressed {
        return Err(DecodeError::UnsupportedEncoding(
            "compressed iTXt".to_string(),
        ));
    }
    let text = String::from_utf8(text.to_vec())
        .map_err(|e| DecodeError::UnsupportedEncoding(format!("iTXt text: {}", e)))?;
    Ok((key, text))
}
