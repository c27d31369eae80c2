//! Decode & render engine.
//!
//! Walks a root structure against an input stream and writes an
//! offset-annotated text dump. Every output record starts with
//! `\n`, the absolute input offset as 8 hex digits and an indent of
//! `2 + 4 * nesting` spaces.
//!
//! ```
//! use bindec_core::{render, Catalog, Defaults, FieldDef, Placement};
//! use serde_json::json;
//! use std::io::Cursor;
//!
//! let mut catalog = Catalog::new(Defaults::new())?;
//! let mut fields = Vec::new();
//! let defs = json!({"magic": {"base": "uint", "size": 2, "format": "{:04x}", "endian": "big"}});
//! catalog.create_fields("main", "", false, defs.as_object().unwrap(), &mut fields)?;
//! let root = FieldDef::structure("main", Placement::Normal, fields);
//!
//! let mut out = Vec::new();
//! render(&root, Cursor::new(vec![0xca, 0xfe]), &mut out)?;
//! assert_eq!(String::from_utf8_lossy(&out), "\n00000000  magic: cafe\nSUCCESS\n");
//! # Ok::<(), bindec_core::Error>(())
//! ```

mod cursor;
mod value;

pub use cursor::InputCursor;

use std::io::{Read, Seek, Write};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::format::{split_float, split_scaled, Number};
use crate::namespace::Namespace;
use crate::schema::{FieldDef, FieldKind, Placement, StructDef, UnionDef, Variant};
use value::{decode_float, decode_signed, decode_unsigned};

const OFFSET_WIDTH: usize = 8;
const INITIAL_INDENT: usize = 2;
const INDENT_STEP: usize = 4;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Every field was decoded
    Complete {
        /// Bytes consumed from the starting offset
        bytes: u64,
    },
    /// The input ended in the middle of a field
    Truncated {
        /// Offset where the failing read started
        offset: u64,
    },
}

/// Decodes `root` from `input` into `output` with a fresh namespace
pub fn render<R, W>(root: &FieldDef, input: R, output: W) -> Result<RenderOutcome>
where
    R: Read + Seek,
    W: Write,
{
    Renderer::new(input, output)?.render(root)
}

/// State of one decode run
#[derive(Debug)]
pub struct Renderer<R, W> {
    input: InputCursor<R>,
    out: W,
    ns: Namespace,
    nesting: usize,
    label_width: usize,
    suffix: &'static str,
    path: Vec<String>,
    buf: Vec<u8>,
}

impl<R: Read + Seek, W: Write> Renderer<R, W> {
    /// Creates a renderer reading from the current position of `input`
    pub fn new(input: R, out: W) -> Result<Self> {
        Ok(Self {
            input: InputCursor::new(input)?,
            out,
            ns: Namespace::new(),
            nesting: 0,
            label_width: 1,
            suffix: "",
            path: Vec::new(),
            buf: Vec::new(),
        })
    }

    /// Values published so far
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Absolute offset of the next input byte
    pub fn offset(&self) -> u64 {
        self.input.offset()
    }

    /// Returns the output sink
    pub fn into_output(self) -> W {
        self.out
    }

    /// Decodes the members of the root structure and writes the end marker.
    ///
    /// Truncated input is reported through [`RenderOutcome::Truncated`];
    /// any other error aborts with the output written so far kept.
    pub fn render(&mut self, root: &FieldDef) -> Result<RenderOutcome> {
        let def = match &root.kind {
            FieldKind::Struct(def) => def,
            _ => {
                return Err(Error::invalid_root(format!(
                    "\"{}\" is not a structure",
                    root.name
                )))
            }
        };

        let start = self.input.offset();
        debug!("Rendering \"{}\" from offset {:#x}", root.name, start);

        self.path.clear();
        self.path.push(root.name.clone());
        let result = self.dump_members(def);

        let outcome = match result {
            Ok(()) => {
                self.out.write_all(b"\nSUCCESS\n")?;
                RenderOutcome::Complete {
                    bytes: self.input.offset() - start,
                }
            }
            Err(Error::TruncatedInput { offset, .. }) => {
                debug!("Input ended at offset {:#x}", offset);
                self.out
                    .write_all(b"\nWARNING: Unexpected end of input data.\n")?;
                RenderOutcome::Truncated { offset }
            }
            Err(e) => {
                if let Err(flush) = self.out.flush() {
                    warn!("Failed to flush output: {}", flush);
                }
                return Err(e);
            }
        };
        self.out.flush()?;
        Ok(outcome)
    }

    fn line_header_at(&mut self, offset: u64) -> Result<()> {
        let indent = INITIAL_INDENT + self.nesting * INDENT_STEP;
        write!(
            self.out,
            "\n{:0width$x}{:indent$}",
            offset,
            "",
            width = OFFSET_WIDTH,
            indent = indent
        )?;
        Ok(())
    }

    fn line_header(&mut self) -> Result<()> {
        self.line_header_at(self.input.offset())
    }

    fn qualified(&self, name: &str) -> String {
        let mut full = self.path.join(".");
        if !full.is_empty() {
            full.push('.');
        }
        full.push_str(name);
        full
    }

    fn violation(&self, name: &str, err: Error) -> Error {
        match err {
            Error::TruncatedInput { .. } | Error::SchemaViolation { .. } => err,
            other => Error::violation(self.qualified(name), other.to_string()),
        }
    }

    fn resolve_count(&self, field: &FieldDef) -> Result<u64> {
        field
            .count
            .resolve(&self.ns)
            .map_err(|e| self.violation(&field.name, e))
    }

    fn dump_members(&mut self, def: &StructDef) -> Result<()> {
        let prev_width = self.label_width;
        let prev_suffix = self.suffix;

        self.label_width = label_width(def);
        self.suffix = match def.placement {
            Placement::Oneline => ";",
            _ => "",
        };
        let result = self.dump_member_list(def);

        self.label_width = prev_width;
        self.suffix = prev_suffix;
        result
    }

    fn dump_member_list(&mut self, def: &StructDef) -> Result<()> {
        let mut need_new_line = true;

        for field in def.fields.iter() {
            if field.is_skip() {
                self.dump_skip(field)?;
                need_new_line = true;
                continue;
            }

            let single_scalar = is_single_scalar(field);
            if need_new_line || !single_scalar || def.placement != Placement::Oneline {
                self.line_header()?;
            } else {
                self.out.write_all(b"  ")?;
            }
            need_new_line = !single_scalar;

            self.dump_field(field)?;
        }
        Ok(())
    }

    fn dump_skip(&mut self, field: &FieldDef) -> Result<()> {
        let count = self.resolve_count(field)?;
        let at = self.input.offset();
        self.input.skip(count)?;
        self.line_header_at(at)?;
        write!(self.out, "-------- skipped {} bytes", count)?;
        Ok(())
    }

    fn dump_field(&mut self, field: &FieldDef) -> Result<()> {
        match &field.kind {
            FieldKind::Union(def) => self.dump_union(field, def),
            FieldKind::Struct(def) => self.dump_struct(field, def),
            FieldKind::Skip => {
                // only reachable as a union payload
                let count = self.resolve_count(field)?;
                self.input.skip(count)?;
                write!(self.out, "-------- skipped {} bytes", count)?;
                Ok(())
            }
            _ => self.dump_scalar(field),
        }
    }

    fn dump_struct(&mut self, field: &FieldDef, def: &StructDef) -> Result<()> {
        let count = self.resolve_count(field)?;

        if count == 1 {
            write!(self.out, "{}:", field.name)?;
            self.nesting += 1;
            self.path.push(field.name.clone());
            self.dump_members(def)?;
            self.path.pop();
            self.nesting -= 1;
            return Ok(());
        }

        write!(self.out, "{} (count == {}):", field.name, count)?;
        let digits = index_digits(count);
        self.nesting += 1;
        for i in 0..count {
            self.line_header()?;
            write!(self.out, "{}[{:>digits$}]:", field.name, i, digits = digits)?;
            self.nesting += 1;
            self.path.push(format!("{}[{}]", field.name, i));
            self.dump_members(def)?;
            self.path.pop();
            self.nesting -= 1;
        }
        self.nesting -= 1;
        Ok(())
    }

    fn dump_scalar(&mut self, field: &FieldDef) -> Result<()> {
        let Some(scalar) = field.kind.scalar() else {
            return Ok(());
        };

        if field.is_trivially_one() {
            let label = format!("{}:", field.name);
            write!(self.out, "{:<width$} ", label, width = self.label_width + 1)?;
            self.dump_unit(field, scalar.size)?;
            self.out.write_all(self.suffix.as_bytes())?;
            return Ok(());
        }

        let count = self.resolve_count(field)?;
        write!(self.out, "{} (count == {})", field.name, count)?;
        if count == 0 {
            return Ok(());
        }

        self.out.write_all(b":")?;
        let digits = index_digits(count);
        let wrap_at = scalar.wrap_at.max(1);
        self.nesting += 1;
        for i in 0..count {
            if i % wrap_at == 0 {
                self.line_header()?;
                if count > wrap_at {
                    write!(self.out, "{}[{:>digits$}]: ", field.name, i, digits = digits)?;
                }
            } else {
                self.out.write_all(scalar.separator.as_bytes())?;
            }
            self.dump_unit(field, scalar.size)?;
        }
        self.nesting -= 1;
        Ok(())
    }

    /// Reads one entry of a scalar field and writes its text
    fn dump_unit(&mut self, field: &FieldDef, size: usize) -> Result<()> {
        self.buf.resize(size, 0);
        self.input.read_exact(&mut self.buf)?;
        let bytes = self.buf.as_slice();

        let text = match &field.kind {
            FieldKind::Int(def) => def.format.render(Number::Signed(decode_signed(bytes, def.endian))),
            FieldKind::UInt(def) => {
                let value = decode_unsigned(bytes, def.endian);
                self.ns.publish(&field.name, value);
                def.format.render(Number::Unsigned(value))
            }
            FieldKind::Float(def) => def.format.render(Number::Float(decode_float(bytes, def.endian))),
            FieldKind::Timestamp(def) => {
                let raw = decode_unsigned(bytes, def.endian);
                let instant = split_scaled(raw, def.multiplier).ok_or_else(|| {
                    Error::violation(
                        self.qualified(&field.name),
                        format!("timestamp {} is out of range", raw),
                    )
                })?;
                def.format
                    .render(instant.0, instant.1, def.tzoffs)
                    .map_err(|e| self.violation(&field.name, e))?
            }
            FieldKind::FloatTimestamp(def) => {
                let raw = decode_float(bytes, def.endian);
                let instant = split_float(raw).ok_or_else(|| {
                    Error::violation(
                        self.qualified(&field.name),
                        format!("timestamp {} is out of range", raw),
                    )
                })?;
                def.format
                    .render(instant.0, instant.1, def.tzoffs)
                    .map_err(|e| self.violation(&field.name, e))?
            }
            FieldKind::Char(def) => {
                let end = if def.stop_on_zero {
                    bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len())
                } else {
                    bytes.len()
                };
                let mut text = def.encoding.decode(&bytes[..end]);
                if let Some(length) = &def.length {
                    let max = length
                        .resolve(&self.ns)
                        .map_err(|e| self.violation(&field.name, e))?;
                    if let Some((cut, _)) = usize::try_from(max)
                        .ok()
                        .and_then(|max| text.char_indices().nth(max))
                    {
                        text.truncate(cut);
                    }
                }
                format!("\"{}\"", text)
            }
            FieldKind::Skip | FieldKind::Struct(_) | FieldKind::Union(_) => String::new(),
        };

        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn dump_union(&mut self, field: &FieldDef, def: &UnionDef) -> Result<()> {
        let prev_width = self.label_width;
        self.label_width = 1;
        let result = self.dump_union_entries(field, def);
        self.label_width = prev_width;
        result
    }

    fn dump_union_entries(&mut self, field: &FieldDef, def: &UnionDef) -> Result<()> {
        let count = self.resolve_count(field)?;
        self.out.write_all(field.name.as_bytes())?;

        if count == 1 {
            let start = self.input.offset();
            self.out.write_all(b".")?;
            let variant = self.choose_variant(field, def, None)?;
            return self.dump_variant(field, variant, None, start);
        }

        write!(self.out, " (count == {}):", count)?;
        let digits = index_digits(count);
        self.nesting += 1;
        for i in 0..count {
            let start = self.input.offset();
            let variant = self.choose_variant(field, def, Some(i))?;
            self.line_header()?;
            write!(self.out, "{}[{:>digits$}].", field.name, i, digits = digits)?;
            self.dump_variant(field, variant, Some(i), start)?;
        }
        self.nesting -= 1;
        Ok(())
    }

    fn dump_variant(
        &mut self,
        field: &FieldDef,
        variant: &Variant,
        index: Option<u64>,
        start: u64,
    ) -> Result<()> {
        self.input.skip(variant.data_offset)?;

        let segment = match index {
            Some(i) => format!("{}[{}]", field.name, i),
            None => field.name.clone(),
        };
        self.path.push(segment);
        let result = self.dump_field(&variant.field);
        self.path.pop();
        result?;

        let Some(total) = variant.total_size else {
            return Ok(());
        };
        let consumed = self.input.offset() - start;
        if consumed > total {
            let mut name = format!("{}.{}", field.name, variant.field.name);
            if let Some(i) = index {
                name = format!("{}[{}]", name, i);
            }
            return Err(Error::violation(
                self.qualified(&name),
                format!(
                    "total size ({}) specified for field variant {} is smaller than the actual number of bytes consumed ({})",
                    total, name, consumed
                ),
            ));
        }
        self.input.skip(total - consumed)
    }

    /// Prefetches bytes, evaluates triggers in order and rewinds the input
    fn choose_variant<'d>(
        &mut self,
        field: &FieldDef,
        def: &'d UnionDef,
        index: Option<u64>,
    ) -> Result<&'d Variant> {
        let start = self.input.offset();
        let mut prefetched = Vec::new();
        let selected = self.select_variant(field, def, &mut prefetched);
        self.ns.clear_raw();
        self.input.rewind(prefetched.len() as u64)?;

        // a short prefetch counts as truncation at the union itself
        let selected = selected.map_err(|e| match e {
            Error::TruncatedInput {
                offset,
                requested,
                available,
            } => {
                let back = offset.saturating_sub(start);
                Error::truncated(start, requested + back, available + back)
            }
            other => other,
        })?;

        match selected {
            Some(variant) => {
                trace!(
                    "Selected variant \"{}\" of \"{}\" at position {:#x}",
                    variant.field.name,
                    field.name,
                    self.input.offset()
                );
                Ok(variant)
            }
            None => {
                let name = match index {
                    Some(i) => format!("{}[{}]", field.name, i),
                    None => field.name.clone(),
                };
                Err(Error::violation(
                    self.qualified(&name),
                    "no union variant selected",
                ))
            }
        }
    }

    fn select_variant<'d>(
        &mut self,
        field: &FieldDef,
        def: &'d UnionDef,
        prefetched: &mut Vec<u8>,
    ) -> Result<Option<&'d Variant>> {
        for variant in def.variants.iter() {
            if variant.prefetch_size > prefetched.len() {
                let have = prefetched.len();
                prefetched.resize(variant.prefetch_size, 0);
                if let Err(e) = self.input.read_exact(&mut prefetched[have..]) {
                    prefetched.truncate(have);
                    return Err(e);
                }
                self.ns.set_raw(prefetched.as_slice());
            }

            let hit = match &variant.trigger {
                None => true,
                Some(trigger) => trigger.eval_trigger(&self.ns).map_err(|e| {
                    let name = format!("{}.{}", field.name, variant.field.name);
                    Error::violation(
                        self.qualified(&name),
                        format!("trigger \"{}\" failed: {}", trigger, e),
                    )
                })?,
            };
            if hit {
                return Ok(Some(variant));
            }
        }
        Ok(None)
    }
}

fn is_single_scalar(field: &FieldDef) -> bool {
    field.is_trivially_one() && !field.is_structure() && !field.is_union()
}

fn label_width(def: &StructDef) -> usize {
    if def.placement != Placement::Aligned {
        return 1;
    }
    def.fields
        .iter()
        .filter(|f| is_single_scalar(f) && !f.is_skip())
        .map(|f| f.name.chars().count())
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Digits needed to print the largest index of `count` entries
fn index_digits(count: u64) -> usize {
    if count <= 1 {
        1
    } else {
        (count - 1).to_string().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use crate::schema::Catalog;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::io::Cursor;

    fn build(format: Value) -> FieldDef {
        let mut catalog = Catalog::new(Defaults::new()).unwrap();
        let mut fields = Vec::new();
        catalog
            .create_fields("main", "", false, format.as_object().unwrap(), &mut fields)
            .unwrap();
        FieldDef::structure("main", Placement::Normal, fields)
    }

    fn dump(format: Value, input: &[u8]) -> (String, Result<RenderOutcome>) {
        let root = build(format);
        let mut out = Vec::new();
        let result = render(&root, Cursor::new(input.to_vec()), &mut out);
        (String::from_utf8(out).unwrap(), result)
    }

    fn u8_hex() -> Value {
        json!({"base": "uint", "size": 1, "format": "{:02x}"})
    }

    #[test]
    fn test_endianness() {
        let (text, result) = dump(
            json!({
                "a": {"base": "int", "size": 3, "format": "{:06x}", "endian": "little"},
                "b": {"base": "int", "size": 3, "format": "{:06x}", "endian": "big"}
            }),
            &[0x1a, 0x2b, 0x3c, 0x1a, 0x2b, 0x3c],
        );
        assert_eq!(text, "\n00000000  a: 3c2b1a\n00000003  b: 1a2b3c\nSUCCESS\n");
        assert_eq!(result.unwrap(), RenderOutcome::Complete { bytes: 6 });
    }

    #[test]
    fn test_unsigned_value_published() {
        let root = build(json!({"i1": {"base": "uint", "size": 3, "endian": "little"}}));
        let mut out = Vec::new();
        let mut renderer = Renderer::new(Cursor::new(vec![0x3c, 0x2b, 0x1a]), &mut out).unwrap();
        renderer.render(&root).unwrap();
        assert_eq!(renderer.namespace().get("i1"), Some(0x1a2b3c));
    }

    #[test]
    fn test_timestamp_multiplier() {
        let (text, _) = dump(
            json!({"t": {
                "base": "ts", "size": 6, "multiplier": 1000, "tzoffs": 0,
                "endian": "little", "format": "%Y-%m-%d %H:%M:%S.%f"
            }}),
            &[0x5b, 0xc2, 0x2e, 0xfe, 0x84, 0x01],
        );
        assert_eq!(text, "\n00000000  t: 2022-12-10 22:36:28.123000\nSUCCESS\n");
    }

    #[test]
    fn test_character_truncation() {
        let (text, _) = dump(
            json!({
                "s": {"base": "char", "size": 16, "stop_on_zero": true, "length": 10},
                "r": {"base": "char", "size": 16, "stop_on_zero": false, "length": 1000}
            }),
            b"0123456789ABCDEF0123456789ABCDEF",
        );
        assert_eq!(
            text,
            "\n00000000  s: \"0123456789\"\n00000010  r: \"0123456789ABCDEF\"\nSUCCESS\n"
        );

        let (text, _) = dump(
            json!({"s": {"base": "char", "size": 5, "stop_on_zero": true}}),
            b"AB\0CD",
        );
        assert_eq!(text, "\n00000000  s: \"AB\"\nSUCCESS\n");
    }

    #[test]
    fn test_dynamic_length() {
        let (text, _) = dump(
            json!({
                "len": {"base": "uint", "size": 1},
                "s": {"base": "char", "size": 4, "length": "len - 1"}
            }),
            b"\x03abcd",
        );
        assert_eq!(text, "\n00000000  len: 3\n00000001  s: \"ab\"\nSUCCESS\n");
    }

    #[test]
    fn test_union_dispatch_order() {
        let root = build(json!({"u": {"variants": {
            "v1": {"base": "uint", "size": 1, "prefetch_size": 1, "trigger": "RAW[0] == 0x00"},
            "v2": {"base": "uint", "size": 1, "prefetch_size": 2, "trigger": "RAW[1] == 0x00"},
            "v3": {"base": "uint", "size": 1, "format": "{:02x}", "prefetch_size": 3,
                   "trigger": "RAW[0] == 0x78 and RAW[2] == 0xbc"},
            "v4": {"base": "uint", "size": 1, "prefetch_size": 4}
        }}}));
        let mut out = Vec::new();
        let mut renderer = Renderer::new(Cursor::new(vec![0x78, 0x9a, 0xbc]), &mut out).unwrap();
        renderer.render(&root).unwrap();
        assert_eq!(renderer.namespace().get("v3"), Some(0x78));
        assert!(renderer.namespace().raw().is_none());
        drop(renderer);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\n00000000  u.v3: 78\nSUCCESS\n"
        );
    }

    #[test]
    fn test_union_array_and_data_offset() {
        let (text, _) = dump(
            json!({"u": {"count": 2, "variants": {
                "a": {"base": "uint", "size": 1, "format": "{:02x}", "prefetch_size": 1,
                      "trigger": "RAW[0] < 0x80"},
                "b": {"base": "uint", "size": 2, "format": "{:04x}", "endian": "big",
                      "prefetch_size": 1, "data_offset": 1}
            }}}),
            &[0x01, 0x80, 0x02, 0x03],
        );
        assert_eq!(
            text,
            "\n00000000  u (count == 2):\n00000000      u[0].a: 01\n00000001      u[1].b: 0203\nSUCCESS\n"
        );
    }

    #[test]
    fn test_total_size_padding() {
        let format = |total: u64| {
            json!({
                "u": {"variants": {"v": {
                    "fields": {"a": {"base": "uint", "size": 1, "count": 9, "format": "{:02x}"}},
                    "total_size": total
                }}},
                "tail": u8_hex()
            })
        };
        let input: Vec<u8> = (0u8..12).collect();

        let (text, _) = dump(format(11), &input);
        assert_eq!(
            text,
            "\n00000000  u.v:\n00000000      a (count == 9):\n00000000          00 01 02 03 04 05 06 07 08\n0000000b  tail: 0b\nSUCCESS\n"
        );

        let (_, result) = dump(format(8), &input);
        match result.unwrap_err() {
            Error::SchemaViolation { field, message } => {
                assert_eq!(field, "main.u.v");
                assert!(message.contains("smaller than the actual number of bytes consumed (9)"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_skip() {
        let root = build(json!({
            "a": u8_hex(),
            "gap": {"base": "skip", "count": 2},
            "b": u8_hex()
        }));
        let mut out = Vec::new();
        let mut renderer = Renderer::new(Cursor::new(vec![1, 2, 3, 4]), &mut out).unwrap();
        let outcome = renderer.render(&root).unwrap();
        assert_eq!(outcome, RenderOutcome::Complete { bytes: 4 });
        assert_eq!(renderer.namespace().get("gap"), None);
        assert_eq!(renderer.namespace().len(), 2);
        drop(renderer);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\n00000000  a: 01\n00000001  -------- skipped 2 bytes\n00000003  b: 04\nSUCCESS\n"
        );
    }

    #[test]
    fn test_oneline_placement() {
        let (text, _) = dump(
            json!({"hdr": {"placement": "oneline", "fields": {
                "a": u8_hex(),
                "b": u8_hex(),
                "arr": {"base": "uint", "size": 1, "format": "{:02x}", "count": 2},
                "c": u8_hex()
            }}}),
            &[1, 2, 3, 4, 5],
        );
        assert_eq!(
            text,
            "\n00000000  hdr:\n00000000      a: 01;  b: 02;\n00000002      arr (count == 2):\n00000002          03 04\n00000004      c: 05;\nSUCCESS\n"
        );
    }

    #[test]
    fn test_aligned_placement() {
        let (text, _) = dump(
            json!({"s": {"placement": "aligned", "fields": {
                "a": u8_hex(),
                "long_name": u8_hex()
            }}}),
            &[1, 2],
        );
        assert_eq!(
            text,
            "\n00000000  s:\n00000000      a:         01\n00000001      long_name: 02\nSUCCESS\n"
        );
    }

    #[test]
    fn test_array_wrapping() {
        let (text, _) = dump(
            json!({"d": {"base": "uint", "size": 1, "format": "{:02x}", "count": 5,
                         "wrap_at": 2, "separator": ","}}),
            &[0, 1, 2, 3, 4],
        );
        assert_eq!(
            text,
            "\n00000000  d (count == 5):\n00000000      d[0]: 00,01\n00000002      d[2]: 02,03\n00000004      d[4]: 04\nSUCCESS\n"
        );
    }

    #[test]
    fn test_index_labels_are_right_aligned() {
        let (text, _) = dump(
            json!({"d": {"base": "uint", "size": 1, "format": "{:x}", "count": 11, "wrap_at": 10}}),
            &[0; 11],
        );
        assert_eq!(
            text,
            "\n00000000  d (count == 11):\n00000000      d[ 0]: 0 0 0 0 0 0 0 0 0 0\n0000000a      d[10]: 0\nSUCCESS\n"
        );
    }

    #[test]
    fn test_dynamic_count() {
        let format = json!({
            "n": {"base": "uint", "size": 1},
            "d": {"base": "uint", "size": 1, "count": "n", "format": "{:02x}"}
        });
        let (text, _) = dump(format.clone(), &[2, 0xaa, 0xbb]);
        assert_eq!(
            text,
            "\n00000000  n: 2\n00000001  d (count == 2):\n00000001      aa bb\nSUCCESS\n"
        );

        let (text, _) = dump(format, &[0]);
        assert_eq!(text, "\n00000000  n: 0\n00000001  d (count == 0)\nSUCCESS\n");
    }

    #[test]
    fn test_negative_dynamic_count() {
        let (_, result) = dump(
            json!({
                "n": {"base": "uint", "size": 1},
                "d": {"base": "uint", "size": 1, "count": "n - 5"}
            }),
            &[2, 0],
        );
        assert!(matches!(
            result.unwrap_err(),
            Error::SchemaViolation { field, .. } if field == "main.d"
        ));
    }

    #[test]
    fn test_structure_array() {
        let (text, _) = dump(
            json!({"p": {"count": 2, "fields": {"x": u8_hex()}}}),
            &[1, 2],
        );
        assert_eq!(
            text,
            "\n00000000  p (count == 2):\n00000000      p[0]:\n00000000          x: 01\n00000001      p[1]:\n00000001          x: 02\nSUCCESS\n"
        );
    }

    #[test]
    fn test_truncated_input() {
        let (text, result) = dump(
            json!({
                "a": {"base": "uint", "size": 2, "format": "{:04x}", "endian": "little"},
                "b": {"base": "uint", "size": 2, "format": "{:04x}", "endian": "little"}
            }),
            &[1, 2, 3],
        );
        assert_eq!(
            text,
            "\n00000000  a: 0201\n00000002  b: \nWARNING: Unexpected end of input data.\n"
        );
        assert_eq!(result.unwrap(), RenderOutcome::Truncated { offset: 2 });
    }

    #[test]
    fn test_truncated_skip() {
        let (text, result) = dump(json!({"gap": {"base": "skip", "count": 4}}), &[1, 2]);
        assert_eq!(text, "\nWARNING: Unexpected end of input data.\n");
        assert_eq!(result.unwrap(), RenderOutcome::Truncated { offset: 0 });
    }

    #[test]
    fn test_no_variant_selected() {
        let (text, result) = dump(
            json!({"u": {"variants": {
                "v1": {"base": "uint", "size": 1, "prefetch_size": 1, "trigger": "RAW[0] == 1"}
            }}}),
            &[2],
        );
        assert_eq!(text, "\n00000000  u.");
        match result.unwrap_err() {
            Error::SchemaViolation { field, message } => {
                assert_eq!(field, "main.u");
                assert_eq!(message, "no union variant selected");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_short_prefetch_truncates_at_union() {
        let (text, result) = dump(
            json!({"u": {"variants": {
                "a": {"base": "uint", "size": 1, "prefetch_size": 1, "trigger": "RAW[0] == 0xff"},
                "b": {"base": "uint", "size": 1, "prefetch_size": 4}
            }}}),
            &[0x01, 0x02],
        );
        assert_eq!(text, "\n00000000  u.\nWARNING: Unexpected end of input data.\n");
        assert_eq!(result.unwrap(), RenderOutcome::Truncated { offset: 0 });
    }

    #[test]
    fn test_failing_trigger_names_variant() {
        let root = build(json!({
            "h": {"base": "uint", "size": 1, "format": "{:02x}"},
            "u": {"variants": {
                "v1": {"base": "uint", "size": 1, "prefetch_size": 1, "trigger": "RAW[3] == 0"}
            }}
        }));
        let mut out = Vec::new();
        let mut renderer = Renderer::new(Cursor::new(vec![0xaa, 0x01, 0x02]), &mut out).unwrap();
        match renderer.render(&root).unwrap_err() {
            Error::SchemaViolation { field, message } => {
                assert_eq!(field, "main.u.v1");
                assert!(message.starts_with("trigger \"RAW[3] == 0\" failed"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(renderer.offset(), 1);
        assert_eq!(renderer.namespace().raw(), None);
    }

    #[test]
    fn test_undefined_trigger_name() {
        let (_, result) = dump(
            json!({"u": {"variants": {
                "v1": {"base": "uint", "size": 1, "trigger": "missing == 1"}
            }}}),
            &[0x01],
        );
        match result.unwrap_err() {
            Error::SchemaViolation { field, message } => {
                assert_eq!(field, "main.u.v1");
                assert!(message.contains("\"missing\" is not defined"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    struct BrokenFlush(Vec<u8>);

    impl Write for BrokenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "closed"))
        }
    }

    #[test]
    fn test_decode_error_survives_flush_failure() {
        let root = build(json!({"u": {"variants": {
            "v1": {"base": "uint", "size": 1, "prefetch_size": 1, "trigger": "RAW[0] == 1"}
        }}}));
        let mut out = BrokenFlush(Vec::new());
        let err = render(&root, Cursor::new(vec![2]), &mut out).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { .. }), "{:?}", err);
        assert_eq!(out.0, b"\n00000000  u.".to_vec());
    }

    #[test]
    fn test_offsets_start_at_input_position() {
        let root = build(json!({"a": u8_hex()}));
        let mut input = Cursor::new(vec![0u8; 0x12]);
        input.set_position(0x11);
        let mut out = Vec::new();
        render(&root, input, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\n00000011  a: 00\nSUCCESS\n");
    }

    #[test]
    fn test_root_must_be_structure() {
        let catalog = Catalog::new(Defaults::new()).unwrap();
        let not_struct = catalog.get("uint").unwrap();
        let err = render(not_struct, Cursor::new(vec![0u8]), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidRoot(_)));
    }
}
