//! The nine built-in kinds every schema starts from.

use std::sync::Arc;

use super::{
    CharDef, FieldDef, FieldKind, NumericDef, Scalar, StructDef, TimestampDef, UnionDef,
    DEFAULT_WRAP_AT,
};
use crate::config::Defaults;
use crate::error::{Error, Result};
use crate::format::{NumberClass, NumberFormat, TimeFormat};

pub(crate) fn base_types(defaults: &Defaults) -> Result<Vec<FieldDef>> {
    let scalar = |size: usize| Scalar {
        size,
        separator: defaults.separator.clone(),
        wrap_at: DEFAULT_WRAP_AT,
    };
    let integer = || -> Result<NumericDef> {
        Ok(NumericDef {
            scalar: scalar(defaults.integer_size),
            endian: defaults.endian,
            format: NumberFormat::parse(&defaults.integer_format, NumberClass::Integer)
                .map_err(|e| Error::default_value("default_integer_format", e.to_string()))?,
        })
    };
    let time_format = TimeFormat::parse(&defaults.timestamp_format)
        .map_err(|e| Error::default_value("default_timestamp_format", e.to_string()))?;
    let timestamp = |size: usize| TimestampDef {
        scalar: scalar(size),
        endian: defaults.endian,
        format: time_format.clone(),
        tzoffs: defaults.timezone_offset,
        multiplier: 1,
    };

    Ok(vec![
        FieldDef::new("int", FieldKind::Int(integer()?)),
        FieldDef::new("uint", FieldKind::UInt(integer()?)),
        FieldDef::new(
            "ts",
            FieldKind::Timestamp(timestamp(defaults.integral_timestamp_size)),
        ),
        FieldDef::new("fts", FieldKind::FloatTimestamp(timestamp(8))),
        FieldDef::new(
            "float",
            FieldKind::Float(NumericDef {
                scalar: scalar(defaults.float_size),
                endian: defaults.endian,
                format: NumberFormat::parse(&defaults.float_format, NumberClass::Float)
                    .map_err(|e| Error::default_value("default_float_format", e.to_string()))?,
            }),
        ),
        FieldDef::new(
            "char",
            FieldKind::Char(CharDef {
                scalar: scalar(1),
                encoding: defaults.encoding,
                stop_on_zero: defaults.stop_on_zero,
                length: None,
            }),
        ),
        FieldDef::new("skip", FieldKind::Skip),
        FieldDef::new(
            "struct",
            FieldKind::Struct(StructDef {
                placement: defaults.placement,
                fields: Arc::new(Vec::new()),
            }),
        ),
        FieldDef::new(
            "union",
            FieldKind::Union(UnionDef {
                variants: Arc::new(Vec::new()),
            }),
        ),
    ])
}
