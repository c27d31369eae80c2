//! Raw byte decoding for scalar kinds.

use crate::schema::Endian;

pub(crate) fn decode_unsigned(bytes: &[u8], endian: Endian) -> u128 {
    let fold = |acc: u128, b: &u8| (acc << 8) | u128::from(*b);
    match endian {
        Endian::Big => bytes.iter().fold(0, fold),
        Endian::Little => bytes.iter().rev().fold(0, fold),
    }
}

pub(crate) fn decode_signed(bytes: &[u8], endian: Endian) -> i128 {
    let raw = decode_unsigned(bytes, endian);
    let bits = bytes.len() * 8;
    if bits == 0 || bits >= 128 {
        return raw as i128;
    }
    let shift = 128 - bits;
    ((raw << shift) as i128) >> shift
}

/// 4 or 8 byte IEEE-754 value; other sizes are rejected when fields are derived
pub(crate) fn decode_float(bytes: &[u8], endian: Endian) -> f64 {
    match bytes.len() {
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(bytes);
            match endian {
                Endian::Little => f64::from(f32::from_le_bytes(raw)),
                Endian::Big => f64::from(f32::from_be_bytes(raw)),
            }
        }
        _ => {
            let mut raw = [0u8; 8];
            let n = bytes.len().min(8);
            raw[..n].copy_from_slice(&bytes[..n]);
            match endian {
                Endian::Little => f64::from_le_bytes(raw),
                Endian::Big => f64::from_be_bytes(raw),
            }
        }
    }
}
