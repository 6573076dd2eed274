//! Length-prefixed field codec for segment records.
//!
//! A record is two fields back to back: the raw URL, then the payload. Each
//! field is a varint byte count followed by that many raw bytes. The varint
//! is unsigned LEB128 (seven value bits per byte, high bit set on every byte
//! but the last), capped at ten bytes for a `u64`.
//!
//! End-of-file is only legal before the first byte of a field's length
//! prefix. [`read_field`] reports that as `Ok(None)`; a field cut short
//! anywhere else decodes as [`GatekeeperError::Corrupt`].

use std::io::{self, Read, Seek, SeekFrom, Write};

use gatekeeper_error::{GatekeeperError, Result};

/// Longest legal encoding of a `u64` length prefix.
pub const MAX_UVARINT_LEN: usize = 10;

/// Append one length-prefixed field to `w`, returning the total bytes
/// written (prefix plus payload).
pub fn write_field<W: Write>(w: &mut W, bytes: &[u8]) -> Result<u64> {
    let mut prefix = [0_u8; MAX_UVARINT_LEN];
    let prefix_len = encode_uvarint(&mut prefix, bytes.len() as u64);
    w.write_all(&prefix[..prefix_len])?;
    w.write_all(bytes)?;
    Ok(prefix_len as u64 + bytes.len() as u64)
}

/// Read one length-prefixed field from `r`.
///
/// Returns the total bytes consumed together with the field contents, or
/// `None` on clean end-of-file.
pub fn read_field<R: Read>(r: &mut R) -> Result<Option<(u64, Vec<u8>)>> {
    let Some((len, prefix_len)) = read_uvarint(r)? else {
        return Ok(None);
    };
    let mut bytes = Vec::new();
    let got = r.by_ref().take(len).read_to_end(&mut bytes)?;
    if (got as u64) < len {
        return Err(GatekeeperError::corrupt(format!(
            "field truncated: length prefix says {len} bytes, found {got}"
        )));
    }
    Ok(Some((prefix_len + len, bytes)))
}

/// Skip one length-prefixed field without materializing it, returning the
/// bytes it occupies.
///
/// Unlike [`read_field`] this is only called mid-record, so end-of-file at
/// the length prefix is corruption, not a clean end.
pub fn skip_field<R: Read + Seek>(r: &mut R) -> Result<u64> {
    let Some((len, prefix_len)) = read_uvarint(r)? else {
        return Err(GatekeeperError::corrupt("record ends before a field"));
    };
    let distance =
        i64::try_from(len).map_err(|_| GatekeeperError::corrupt("field length overflows a seek"))?;
    r.seek(SeekFrom::Current(distance))?;
    Ok(prefix_len + len)
}

/// Encode `value` as LEB128 into `buf`, returning the encoded length.
pub fn encode_uvarint(buf: &mut [u8; MAX_UVARINT_LEN], mut value: u64) -> usize {
    let mut len = 0;
    while value >= 0x80 {
        buf[len] = (value as u8) | 0x80;
        value >>= 7;
        len += 1;
    }
    buf[len] = value as u8;
    len + 1
}

/// Decode a LEB128 `u64` from `r`, returning the value and the bytes it
/// consumed. `Ok(None)` means end-of-file before the first byte; running out
/// mid-encoding, or an encoding wider than a `u64`, is corruption.
fn read_uvarint<R: Read>(r: &mut R) -> Result<Option<(u64, u64)>> {
    let mut value = 0_u64;
    let mut shift = 0_u32;
    let mut consumed = 0_u64;
    loop {
        let byte = match read_byte(r)? {
            Some(byte) => byte,
            None if consumed == 0 => return Ok(None),
            None => return Err(GatekeeperError::corrupt("length prefix cut short")),
        };
        consumed += 1;
        if shift == 63 && byte > 1 {
            return Err(GatekeeperError::corrupt("length prefix overflows u64"));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some((value, consumed)));
        }
        shift += 7;
    }
}

fn read_byte<R: Read>(r: &mut R) -> Result<Option<u8>> {
    let mut byte = [0_u8; 1];
    loop {
        match r.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}
