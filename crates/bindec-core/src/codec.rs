//! Character codecs for `char` fields.
//!
//! Decoding never fails: bytes that do not form a valid sequence are written
//! as `\xNN` escapes so that the dump still shows what was in the file.

use encoding_rs::{DecoderResult, Encoding};
use std::fmt;
use std::fmt::Write;

/// Byte order of a multi-byte Unicode form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Read a byte order mark, falling back to little endian
    Detect,
    /// Little endian, no BOM
    Little,
    /// Big endian, no BOM
    Big,
}

/// A resolved character encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// 7-bit ASCII
    Ascii,
    /// ISO-8859-1, one byte per code point
    Latin1,
    /// UTF-8
    Utf8,
    /// UTF-16
    Utf16(ByteOrder),
    /// UTF-32
    Utf32(ByteOrder),
    /// Any other WHATWG encoding label
    Legacy(&'static Encoding),
}

impl Codec {
    /// Resolves an encoding name, ignoring case, `_` and `-` differences
    pub fn lookup(name: &str) -> Option<Self> {
        let key: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let codec = match key.as_str() {
            "ascii" | "usascii" | "646" => Self::Ascii,
            "latin1" | "latin" | "l1" | "iso88591" | "8859" | "cp819" => Self::Latin1,
            "utf8" | "u8" | "utf" | "cp65001" => Self::Utf8,
            "utf16" | "u16" => Self::Utf16(ByteOrder::Detect),
            "utf16le" => Self::Utf16(ByteOrder::Little),
            "utf16be" => Self::Utf16(ByteOrder::Big),
            "utf32" | "u32" => Self::Utf32(ByteOrder::Detect),
            "utf32le" => Self::Utf32(ByteOrder::Little),
            "utf32be" => Self::Utf32(ByteOrder::Big),
            _ => Self::Legacy(Encoding::for_label(name.trim().as_bytes())?),
        };
        Some(codec)
    }

    /// Whether `name` names a known encoding
    pub fn is_valid_name(name: &str) -> bool {
        Self::lookup(name).is_some()
    }

    /// Decodes `data`, escaping malformed input
    pub fn decode(&self, data: &[u8]) -> String {
        let mut out = String::with_capacity(data.len());
        match *self {
            Self::Ascii => {
                for &b in data {
                    if b.is_ascii() {
                        out.push(b as char);
                    } else {
                        push_escaped(&[b], &mut out);
                    }
                }
            }
            Self::Latin1 => out.extend(data.iter().map(|&b| b as char)),
            Self::Utf8 => decode_utf8(data, &mut out),
            Self::Utf16(order) => decode_utf16(data, order, &mut out),
            Self::Utf32(order) => decode_utf32(data, order, &mut out),
            Self::Legacy(encoding) => decode_legacy(encoding, data, &mut out),
        }
        out
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = |o: &ByteOrder| match o {
            ByteOrder::Detect => "",
            ByteOrder::Little => "LE",
            ByteOrder::Big => "BE",
        };
        match self {
            Self::Ascii => f.write_str("ascii"),
            Self::Latin1 => f.write_str("latin-1"),
            Self::Utf8 => f.write_str("utf-8"),
            Self::Utf16(o) => write!(f, "utf-16{}", order(o)),
            Self::Utf32(o) => write!(f, "utf-32{}", order(o)),
            Self::Legacy(e) => f.write_str(e.name()),
        }
    }
}

fn push_escaped(bytes: &[u8], out: &mut String) {
    for b in bytes {
        let _ = write!(out, "\\x{:02x}", b);
    }
}

fn decode_utf8(mut data: &[u8], out: &mut String) {
    loop {
        match std::str::from_utf8(data) {
            Ok(valid) => {
                out.push_str(valid);
                return;
            }
            Err(e) => {
                let (valid, rest) = data.split_at(e.valid_up_to());
                // valid_up_to marks a char boundary
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let bad = e.error_len().unwrap_or(rest.len());
                push_escaped(&rest[..bad], out);
                data = &rest[bad..];
            }
        }
    }
}

fn detect_order(data: &[u8], bom_le: &[u8], bom_be: &[u8], order: ByteOrder) -> (bool, usize) {
    match order {
        ByteOrder::Little => (false, 0),
        ByteOrder::Big => (true, 0),
        ByteOrder::Detect if data.starts_with(bom_le) => (false, bom_le.len()),
        ByteOrder::Detect if data.starts_with(bom_be) => (true, bom_be.len()),
        ByteOrder::Detect => (false, 0),
    }
}

fn decode_utf16(data: &[u8], order: ByteOrder, out: &mut String) {
    let (big, start) = detect_order(data, &[0xff, 0xfe], &[0xfe, 0xff], order);
    let body = &data[start..];
    let units = body.chunks_exact(2).map(|pair| {
        if big {
            u16::from_be_bytes([pair[0], pair[1]])
        } else {
            u16::from_le_bytes([pair[0], pair[1]])
        }
    });

    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => out.push(c),
            Err(e) => {
                let unit = e.unpaired_surrogate();
                let bytes = if big {
                    unit.to_be_bytes()
                } else {
                    unit.to_le_bytes()
                };
                push_escaped(&bytes, out);
            }
        }
    }
    push_escaped(body.chunks_exact(2).remainder(), out);
}

fn decode_utf32(data: &[u8], order: ByteOrder, out: &mut String) {
    let (big, start) = detect_order(
        data,
        &[0xff, 0xfe, 0x00, 0x00],
        &[0x00, 0x00, 0xfe, 0xff],
        order,
    );
    let body = &data[start..];
    let mut chunks = body.chunks_exact(4);
    for quad in &mut chunks {
        let bytes = [quad[0], quad[1], quad[2], quad[3]];
        let unit = if big {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        };
        match char::from_u32(unit) {
            Some(c) => out.push(c),
            None => push_escaped(quad, out),
        }
    }
    push_escaped(chunks.remainder(), out);
}

fn decode_legacy(encoding: &'static Encoding, data: &[u8], out: &mut String) {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut src = data;
    loop {
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(src.len())
            .unwrap_or(src.len() * 4 + 16);
        out.reserve(needed);

        let (result, read) = decoder.decode_to_string_without_replacement(src, out, true);
        match result {
            DecoderResult::InputEmpty => return,
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(bad, after) => {
                let end = read.saturating_sub(usize::from(after));
                let start = end.saturating_sub(usize::from(bad));
                push_escaped(&src[start..end], out);
            }
        }
        src = &src[read..];
    }
}
