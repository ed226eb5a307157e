//! Small byte-level helpers shared by the decoders.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::error::{DecodeError, DecodeResult};

/// Read exactly `N` bytes, mapping a premature end of stream to `ShortRead`
pub(crate) fn read_array<const N: usize, R: Read>(
    reader: &mut R,
    what: &'static str,
) -> DecodeResult<[u8; N]> {
    let mut buf = [0u8; N];
    read_into(reader, &mut buf, what)?;
    Ok(buf)
}

/// Read exactly `len` bytes into a fresh buffer
pub(crate) fn read_vec<R: Read>(
    reader: &mut R,
    len: usize,
    what: &'static str,
) -> DecodeResult<Vec<u8>> {
    let mut buf = Vec::new();
    let read = reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if read < len {
        return Err(DecodeError::ShortRead(what));
    }
    Ok(buf)
}

fn read_into<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> DecodeResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => DecodeError::ShortRead(what),
        _ => DecodeError::Io(e),
    })
}

/// Fill `buf` unless the stream is already at its end.
///
/// Returns `Ok(false)` on a clean end of stream, `ShortRead` when only part of
/// the buffer could be filled.
pub(crate) fn read_or_eof<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> DecodeResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::Io(e)),
        }
    }
    match filled {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        _ => Err(DecodeError::ShortRead(what)),
    }
}

pub(crate) fn read_u32_be<R: Read>(reader: &mut R, what: &'static str) -> DecodeResult<u32> {
    Ok(u32::from_be_bytes(read_array(reader, what)?))
}

pub(crate) fn read_u64_be<R: Read>(reader: &mut R, what: &'static str) -> DecodeResult<u64> {
    Ok(u64::from_be_bytes(read_array(reader, what)?))
}

pub(crate) fn read_u32_le<R: Read>(reader: &mut R, what: &'static str) -> DecodeResult<u32> {
    Ok(u32::from_le_bytes(read_array(reader, what)?))
}

/// Skip `count` bytes forward; `ShortRead` when fewer than `count` remain
pub(crate) fn skip<R: Seek>(reader: &mut R, count: u64, what: &'static str) -> DecodeResult<()> {
    let position = reader.stream_position()?;
    if stream_len(reader)?.saturating_sub(position) < count {
        return Err(DecodeError::ShortRead(what));
    }
    reader.seek(SeekFrom::Current(count as i64))?;
    Ok(())
}

/// Total stream length, leaving the cursor where it was
pub(crate) fn stream_len<R: Seek>(reader: &mut R) -> DecodeResult<u64> {
    let current = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current))?;
    Ok(len)
}

/// ISO-8859-1 maps every byte to the code point of the same value
pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Bytes up to (not including) the first NUL
pub(crate) fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Split at the first NUL, dropping the separator
pub(crate) fn split_nul(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let at = bytes.iter().position(|&b| b == 0)?;
    Some((&bytes[..at], &bytes[at + 1..]))
}

/// Fixed-width Latin-1 field with trailing NULs and spaces removed
pub(crate) fn fixed_latin1(bytes: &[u8]) -> String {
    latin1(until_nul(bytes))
        .trim_end_matches([' ', '\0'])
        .to_string()
}
