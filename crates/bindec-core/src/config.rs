//! Configuration documents and default values.
//!
//! Schema and config files are JSON with `//` end-of-line comments. Both
//! may carry a `DEFAULTS` section whose `default_*` options tune the
//! built-in field kinds, and a `TYPEDEFS` section with reusable definitions.

use serde_json::{Map, Value};
use std::path::Path;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{NumberClass, NumberFormat, TimeFormat};
use crate::schema::{Endian, Placement};

/// Top-level key holding `default_*` options
pub const DEFAULTS_KEY: &str = "DEFAULTS";

/// Top-level key holding reusable definitions
pub const TYPEDEFS_KEY: &str = "TYPEDEFS";

/// End-of-line comment marker recognised in documents
pub const COMMENT_DELIMITER: &str = "//";

/// Number of lines shown before a JSON syntax error
const ERROR_CONTEXT_LINES: usize = 10;

/// The config written by `--recreate-config` and used when no config file exists.
pub const STANDARD_CONFIG: &str = r#"
{
    "DEFAULTS":
    {
        // "*_format" for numbers: "{:[[fill]align][sign][#][0][width][,|_][.precision][type]}" inside literal text
        // "*_format" for timestamps: strftime conversions, %f gives microseconds
        // encodings: ascii, latin-1, utf-8, utf-16[-le|-be], utf-32[-le|-be] or any WHATWG label (windows-1250, shift_jis, ...)

        "default_array_separator":" ",
        "default_endian":"system",                      // little, big, system
        "default_integer_format":"0x{:x}",              // for int and uint of any size
        "default_integer_size":4,                       // default size in bytes for int and uint
        "default_timestamp_format":"%Y-%m-%d %H:%M:%S", // default timestamp format
        "default_timezone_offset":3600,                 // timezone offset in seconds; null == local timezone
        "default_integral_timestamp_size":4,            // default size in bytes for integral timestamp (unix time)
        "default_float_format":"{:f}",                  // default floating point number format
        "default_stop_str_on_zero":true,                // cut strings at the first zero byte
        "default_float_size":4,                         // 4 or 8 (IEEE-754)
        "default_character_encoding":"ascii",           // default character encoding
        "default_struct_field_placement":"normal"       // normal, aligned, oneline; layout of single scalar fields:
                                                        //   normal: one per line, "label: value"
                                                        //   aligned: one per line, labels and values aligned to the same column
                                                        //   oneline: "label1: value1;  label2: value2" in one line
    },

    // Built-in kinds:
    //   int - signed integer
    //   uint - unsigned integer; its value may be used by later count, length and trigger expressions
    //   ts - integral unix timestamp, at least 4 bytes, optionally divided by "multiplier"
    //   fts - floating point unix timestamp, exactly 8 bytes
    //   float - IEEE-754 single or double
    //   char - a string of characters; "length" in characters, "size" in bytes
    //   struct - a structure made of named fields
    //   union - a list of variants, one of them chosen by its "trigger" expression
    //   skip - skips "count" bytes

    "TYPEDEFS":
    {
        "uint8" :{"base":"uint", "size":1, "format":"0x{:02x}"},
        "uint16":{"base":"uint", "size":2, "format":"0x{:04x}"},
        "uint32":{"base":"uint", "size":4, "format":"0x{:08x}"},
        "uint64":{"base":"uint", "size":8, "format":"0x{:016x}"},

        "int8"  :{"base":"int",  "size":1, "format":"{:+4d}"},
        "int16" :{"base":"int",  "size":2, "format":"{:+6d}"},
        "int32" :{"base":"int",  "size":4, "format":"{:+11d}"},
        "int64" :{"base":"int",  "size":8, "format":"{:+20d}"},

        "utc_time32":{"base":"ts", "size":4, "multiplier":1, "tzoffs":0},
        "loc_time32":{"base":"utc_time32", "tzoffs":null},

        "float32":{"base":"float", "size":4, "format":"{:f}"},
        "float64":{"base":"float", "size":8, "format":"{:f}"},

        // raw dumps

        "uint8_dump":
        {
            "fields":
            {
                "data": {"base":"uint8", "count":1000000000000, "wrap_at":32}
            }
        },

        "byte_dump":"uint8_dump",

        "uint16_dump":
        {
            "fields":
            {
                "data": {"base":"uint16", "count":500000000000, "wrap_at":16}
            }
        },

        "word_dump":"uint16_dump",

        "uint32_dump":
        {
            "fields":
            {
                "data": {"base":"uint32", "count":250000000000, "wrap_at":8}
            }
        },

        "dword_dump":"uint32_dump"
    }
}
"#;

/// Removes end-of-line comments, leading and trailing blanks and empty lines.
///
/// Comment markers inside single or double quoted strings are kept. A
/// quote or marker preceded by a backslash does not count.
pub fn strip_comments(text: &str, delimiter: &str) -> String {
    let mut kept_lines = Vec::new();
    let mut quote: Option<char> = None;

    for raw in text.lines() {
        let line = if quote.is_none() { raw.trim_start() } else { raw };
        let mut end = line.len();
        let mut prev: Option<char> = None;

        for (i, c) in line.char_indices() {
            let escaped = prev == Some('\\');
            match quote {
                Some(q) => {
                    if c == q && !escaped {
                        quote = None;
                    }
                }
                None if escaped => {}
                None if !delimiter.is_empty() && line[i..].starts_with(delimiter) => {
                    end = i;
                    break;
                }
                None if c == '"' || c == '\'' => quote = Some(c),
                None => {}
            }
            prev = Some(c);
        }

        let mut kept = &line[..end];
        if quote.is_none() {
            kept = kept.trim_end();
        }
        if !kept.is_empty() {
            kept_lines.push(kept);
        }
    }

    kept_lines.join("\n")
}

/// Parses a JSON-with-comments document whose top level must be an object
pub fn parse_document(text: &str) -> Result<Map<String, Value>> {
    let bare = strip_comments(text, COMMENT_DELIMITER);
    match serde_json::from_str::<Value>(&bare) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Document {
            message: format!("top level value must be an object, got {}", json_type(&other)),
            context: String::new(),
        }),
        Err(e) => {
            let lines: Vec<&str> = bare.lines().collect();
            let last = e.line().min(lines.len());
            let first = last.saturating_sub(ERROR_CONTEXT_LINES);
            let context = format!(
                "\nthe context (the error was detected in the last line before separator):\n    {}\n----------------------------------------",
                lines[first..last].join("\n    ")
            );
            Err(Error::Document {
                message: e.to_string(),
                context,
            })
        }
    }
}

/// Reads and parses a document from disk
pub fn load_document(path: &Path) -> Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    parse_document(&text)
}

/// The standard config, parsed
pub fn standard_config() -> Result<Map<String, Value>> {
    parse_document(STANDARD_CONFIG)
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Widest integer the decoder can hold
pub const MAX_INTEGER_BYTES: usize = 16;

/// Hard bounds applied while definitions are derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLimits {
    /// Largest literal `count`
    pub max_count: u64,
    /// Largest union `prefetch_size`
    pub max_prefetch_size: usize,
    /// Largest union `data_offset`
    pub max_data_offset: u64,
    /// Largest integer size in bytes
    pub max_integer_size: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_count: 1 << 40, // 1 TiB
            max_prefetch_size: 1024,
            max_data_offset: 1024,
            max_integer_size: MAX_INTEGER_BYTES,
        }
    }
}

impl SchemaLimits {
    /// Creates limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest literal count
    pub fn max_count(mut self, max: u64) -> Self {
        self.max_count = max;
        self
    }

    /// Sets the largest union prefetch size
    pub fn max_prefetch_size(mut self, max: usize) -> Self {
        self.max_prefetch_size = max;
        self
    }

    /// Sets the largest union data offset
    pub fn max_data_offset(mut self, max: u64) -> Self {
        self.max_data_offset = max;
        self
    }

    /// Sets the largest integer size, at most [`MAX_INTEGER_BYTES`]
    pub fn max_integer_size(mut self, max: usize) -> Self {
        self.max_integer_size = max.min(MAX_INTEGER_BYTES);
        self
    }
}

/// Defaults picked up by the built-in kinds when a [`Catalog`](crate::Catalog) is created.
///
/// Formats are kept as text and validated when set; the built-in kinds parse
/// them again when they are constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    /// Separator between array entries
    pub separator: String,
    /// Byte order of numeric fields
    pub endian: Endian,
    /// Pattern for `int` and `uint`
    pub integer_format: String,
    /// Size of `int` and `uint`
    pub integer_size: usize,
    /// Pattern for `ts` and `fts`
    pub timestamp_format: String,
    /// Time zone offset in seconds, `None` for local time
    pub timezone_offset: Option<i32>,
    /// Size of `ts`
    pub integral_timestamp_size: usize,
    /// Pattern for `float`
    pub float_format: String,
    /// Size of `float`
    pub float_size: usize,
    /// Whether `char` stops at the first zero byte
    pub stop_on_zero: bool,
    /// Encoding of `char`
    pub encoding: Codec,
    /// Placement of `struct`
    pub placement: Placement,
    /// Derivation bounds
    pub limits: SchemaLimits,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            endian: Endian::native(),
            integer_format: "{:d}".to_string(),
            integer_size: 4,
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            timezone_offset: Some(0),
            integral_timestamp_size: 4,
            float_format: "{:f}".to_string(),
            float_size: 4,
            stop_on_zero: false,
            encoding: Codec::Ascii,
            placement: Placement::Normal,
            limits: SchemaLimits::default(),
        }
    }
}

impl Defaults {
    /// Creates defaults with built-in values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the array separator
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Sets the byte order
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Sets the time zone offset
    pub fn timezone_offset(mut self, offset: Option<i32>) -> Self {
        self.timezone_offset = offset;
        self
    }

    /// Sets the structure placement
    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Sets the derivation bounds
    pub fn limits(mut self, limits: SchemaLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Applies a `DEFAULTS` section on top of the current values
    pub fn apply(&mut self, section: &Map<String, Value>) -> Result<()> {
        for (option, value) in section {
            self.apply_one(option, value)?;
        }
        Ok(())
    }

    fn apply_one(&mut self, option: &str, value: &Value) -> Result<()> {
        let fail = |msg: String| Error::default_value(option, msg);

        match option {
            "default_array_separator" => {
                self.separator = expect_str(value).map_err(fail)?.to_string();
            }
            "default_endian" => {
                let text = expect_str(value).map_err(fail)?;
                self.endian = Endian::parse(text).ok_or_else(|| {
                    fail(format!(
                        "legal values: \"little\", \"big\", \"system\"; got: \"{}\"",
                        text
                    ))
                })?;
            }
            "default_integer_format" => {
                let text = expect_str(value).map_err(fail)?;
                NumberFormat::parse(text, NumberClass::Integer).map_err(|e| fail(e.to_string()))?;
                self.integer_format = text.to_string();
            }
            "default_integer_size" => {
                let max = self.limits.max_integer_size as u64;
                self.integer_size = expect_range(value, 1, max).map_err(fail)? as usize;
            }
            "default_timestamp_format" => {
                let text = expect_str(value).map_err(fail)?;
                TimeFormat::parse(text).map_err(|e| fail(e.to_string()))?;
                self.timestamp_format = text.to_string();
            }
            "default_timezone_offset" => {
                self.timezone_offset = parse_tzoffs(value).map_err(fail)?;
            }
            "default_integral_timestamp_size" => {
                self.integral_timestamp_size = expect_range(value, 4, 8).map_err(fail)? as usize;
            }
            "default_float_format" => {
                let text = expect_str(value).map_err(fail)?;
                NumberFormat::parse(text, NumberClass::Float).map_err(|e| fail(e.to_string()))?;
                self.float_format = text.to_string();
            }
            "default_float_size" => match value.as_u64() {
                Some(size @ (4 | 8)) => self.float_size = size as usize,
                _ => {
                    return Err(fail(format!(
                        "only 4 and 8 are allowed (IEEE-754), got: {}",
                        value
                    )))
                }
            },
            "default_stop_str_on_zero" => {
                self.stop_on_zero = value
                    .as_bool()
                    .ok_or_else(|| fail(format!("boolean expected, got: {}", value)))?;
            }
            "default_character_encoding" => {
                let text = expect_str(value).map_err(fail)?;
                self.encoding = Codec::lookup(text)
                    .ok_or_else(|| fail(format!("invalid encoding specifier: \"{}\"", text)))?;
            }
            "default_struct_field_placement" => {
                let text = expect_str(value).map_err(fail)?;
                self.placement = Placement::parse(text).ok_or_else(|| {
                    fail(format!("invalid placement specifier: \"{}\"", text))
                })?;
            }
            _ => return Err(fail("unknown option".to_string())),
        }
        Ok(())
    }
}

fn expect_str(value: &Value) -> std::result::Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, got: {}", value))
}

fn expect_range(value: &Value, min: u64, max: u64) -> std::result::Result<u64, String> {
    match value.as_u64() {
        Some(v) if (min..=max).contains(&v) => Ok(v),
        _ => Err(format!(
            "expected integer in range [{}..{}], got: {}",
            min, max, value
        )),
    }
}

/// Parses a time zone offset: `null`, or whole minutes within ±12 hours
pub(crate) fn parse_tzoffs(value: &Value) -> std::result::Result<Option<i32>, String> {
    const MAX_TZOFFS: i64 = 12 * 3600;
    match value {
        Value::Null => Ok(None),
        _ => match value.as_i64() {
            Some(v) if (-MAX_TZOFFS..=MAX_TZOFFS).contains(&v) && v % 60 == 0 => Ok(Some(v as i32)),
            _ => Err(format!(
                "expected null or integer divisible by 60 within ±43200, got: {}",
                value
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_strip_comments() {
        let text = r#"
            {
                "a": "http://x", // trailing
                // whole line

                "b": 'it''s // not a comment'
            }
        "#;
        assert_eq!(
            strip_comments(text, "//"),
            "{\n\"a\": \"http://x\",\n\"b\": 'it''s // not a comment'\n}"
        );
    }

    #[test]
    fn test_strip_comments_escaped_quote() {
        let text = r#""a\"b // c" // d"#;
        assert_eq!(strip_comments(text, "//"), r#""a\"b // c""#);
    }

    #[test]
    fn test_parse_document_keeps_key_order() {
        let doc = parse_document("{\"z\": 1, // one\n\"a\": 2}").unwrap();
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_parse_document_error_context() {
        let err = parse_document("{\n\"a\": 1,\n\"b\" 2\n}").unwrap_err();
        match err {
            Error::Document { context, .. } => {
                assert!(context.contains("\"b\" 2"));
                assert!(context.ends_with("----------------------------------------"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(parse_document("[1, 2]").is_err());
    }

    #[test]
    fn test_standard_config_parses() {
        let doc = standard_config().unwrap();
        assert!(doc.contains_key(DEFAULTS_KEY));
        assert!(doc[TYPEDEFS_KEY].get("dword_dump").is_some());

        let mut defaults = Defaults::new();
        defaults
            .apply(doc[DEFAULTS_KEY].as_object().unwrap())
            .unwrap();
        assert_eq!(defaults.integer_format, "0x{:x}");
        assert_eq!(defaults.timezone_offset, Some(3600));
        assert!(defaults.stop_on_zero);
    }

    #[test]
    fn test_apply_rejects_invalid_values() {
        let cases = [
            ("default_array_separator", json!(1)),
            ("default_endian", json!("middle")),
            ("default_integer_format", json!("{:.2d}")),
            ("default_integer_size", json!(0)),
            ("default_integer_size", json!(17)),
            ("default_timestamp_format", json!("%Q")),
            ("default_timezone_offset", json!(61)),
            ("default_timezone_offset", json!(43260)),
            ("default_integral_timestamp_size", json!(3)),
            ("default_float_format", json!("{:x}")),
            ("default_float_size", json!(2)),
            ("default_stop_str_on_zero", json!(1)),
            ("default_character_encoding", json!("UTF-33")),
            ("default_struct_field_placement", json!("inline")),
            ("default_unknown", json!(1)),
        ];
        for (option, value) in cases {
            let mut section = Map::new();
            section.insert(option.to_string(), value);
            let err = Defaults::new().apply(&section).unwrap_err();
            assert!(
                matches!(err, Error::DefaultValue { .. }),
                "{} accepted",
                option
            );
        }
    }

    #[test]
    fn test_apply_accepts_null_timezone() {
        let mut defaults = Defaults::new();
        let section = json!({"default_timezone_offset": null, "default_endian": "big"});
        defaults.apply(section.as_object().unwrap()).unwrap();
        assert_eq!(defaults.timezone_offset, None);
        assert_eq!(defaults.endian, Endian::Big);
    }
}
