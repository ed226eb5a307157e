use std::io::Read;

use log::debug;

use crate::error::{DecodeError, DecodeResult};
use crate::formats::reader::{read_array, read_u32_le, read_vec};
use crate::types::{TagKey, Tags};

/// OS/2 `BITMAPCOREHEADER`
const CORE_HEADER_SIZE: u32 = 12;
/// Windows `BITMAPINFOHEADER`
const INFO_HEADER_SIZE: u32 = 40;

const SIGNATURES: [&[u8; 2]; 6] = [b"BM", b"BA", b"CI", b"CP", b"IC", b"PT"];

/// Read width and height from the DIB header of a BMP file
pub fn decode<R: Read>(reader: &mut R) -> DecodeResult<Tags> {
    let file_header: [u8; 14] = read_array(reader, "BMP file header")?;
    if !SIGNATURES.iter().any(|sig| file_header[..2] == sig[..]) {
        return Err(DecodeError::InvalidSignature("BMP"));
    }

    let header_size = read_u32_le(reader, "DIB header size")?;
    let (width, height) = match header_size {
        CORE_HEADER_SIZE => {
            let body = read_vec(reader, (header_size - 4) as usize, "BITMAPCOREHEADER")?;
            let width = u16::from_le_bytes([body[0], body[1]]);
            let height = u16::from_le_bytes([body[2], body[3]]);
            (i64::from(width), i64::from(height))
        }
        INFO_HEADER_SIZE => {
            let body = read_vec(reader, (header_size - 4) as usize, "BITMAPINFOHEADER")?;
            let width = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
            // Negative height marks a top-down bitmap
            let height = i32::from_le_bytes([body[4], body[5], body[6], body[7]]);
            (i64::from(width), i64::from(height).abs())
        }
        other => {
            return Err(DecodeError::UnsupportedVariant(format!(
                "DIB header size {}",
                other
            )))
        }
    };
    debug!("BMP header size {}: {}x{}", header_size, width, height);

    let mut tags = Tags::new();
    tags.insert_integer(TagKey::Width, width);
    tags.insert_integer(TagKey::Height, height);
    tags.insert_text(TagKey::Resolution, format!("{}x{}", width, height));
    Ok(tags)
}
