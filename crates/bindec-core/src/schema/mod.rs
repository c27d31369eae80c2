//! Field definition model.
//!
//! Every definition is a [`FieldDef`]: a name, a [`Count`] and a closed set
//! of kinds in [`FieldKind`]. Definitions are derived from a base by cloning
//! it and applying validated overrides (see [`Catalog`]); once built they are
//! immutable templates shared by the rest of the run.

mod builtin;
mod catalog;
mod derive;

pub use catalog::Catalog;

use std::fmt;
use std::sync::Arc;

use crate::codec::Codec;
use crate::error::Result;
use crate::expr::Expr;
use crate::format::{NumberFormat, TimeFormat};
use crate::namespace::Namespace;

/// Entries per output row when `wrap_at` is not given
pub const DEFAULT_WRAP_AT: u64 = 0x8000_0000;

/// Names that can never be used for a field
pub const RESERVED_NAMES: &[&str] = &[
    "struct", "char", "float", "fts", "int", "skip", "ts", "uint", "union", "DEFAULTS", "TYPEDEFS",
    "RAW", "and", "or", "not", "True", "False", "true", "false",
];

/// Byte order of numeric fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl Endian {
    /// Byte order of the host
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Parses `little`, `big` or `system`
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "little" => Some(Self::Little),
            "big" => Some(Self::Big),
            "system" => Some(Self::native()),
            _ => None,
        }
    }
}

/// Layout of trivially singular scalar fields inside a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// One field per line
    Normal,
    /// One field per line with values aligned to a common column
    Aligned,
    /// Consecutive single scalars share a line
    Oneline,
}

impl Placement {
    /// Parses `normal`, `aligned` or `oneline`
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "normal" => Some(Self::Normal),
            "aligned" => Some(Self::Aligned),
            "oneline" => Some(Self::Oneline),
            _ => None,
        }
    }
}

/// Number of repetitions of a field, or of characters for `length`
#[derive(Debug, Clone, PartialEq)]
pub enum Count {
    /// Literal value from the schema
    Fixed(u64),
    /// Expression evaluated each time the field is decoded
    Dynamic(Expr),
}

impl Count {
    /// True only for a literal 1
    pub fn is_trivially_one(&self) -> bool {
        matches!(self, Self::Fixed(1))
    }

    /// Resolves the count against the values decoded so far
    pub fn resolve(&self, ns: &Namespace) -> Result<u64> {
        match self {
            Self::Fixed(n) => Ok(*n),
            Self::Dynamic(expr) => expr.eval_count(ns),
        }
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{}", n),
            Self::Dynamic(expr) => write!(f, "{}", expr),
        }
    }
}

/// Attributes shared by every scalar kind
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    /// Size of one entry in bytes
    pub size: usize,
    /// Text between array entries
    pub separator: String,
    /// Entries per output row
    pub wrap_at: u64,
}

/// Integers and floats
#[derive(Debug, Clone, PartialEq)]
pub struct NumericDef {
    /// Common scalar attributes
    pub scalar: Scalar,
    /// Byte order
    pub endian: Endian,
    /// Output pattern
    pub format: NumberFormat,
}

/// Unix timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampDef {
    /// Common scalar attributes
    pub scalar: Scalar,
    /// Byte order
    pub endian: Endian,
    /// strftime pattern
    pub format: TimeFormat,
    /// Offset east of UTC in seconds, `None` for local time
    pub tzoffs: Option<i32>,
    /// Units per second of an integral timestamp
    pub multiplier: u64,
}

/// Character strings
#[derive(Debug, Clone, PartialEq)]
pub struct CharDef {
    /// Common scalar attributes
    pub scalar: Scalar,
    /// Text encoding
    pub encoding: Codec,
    /// Cut the bytes at the first zero
    pub stop_on_zero: bool,
    /// Maximum number of characters shown
    pub length: Option<Count>,
}

/// Structures: ordered named fields
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    /// Layout of single scalar members
    pub placement: Placement,
    /// Members in declaration order, shared with derived definitions
    pub fields: Arc<Vec<FieldDef>>,
}

/// Unions: ordered variants, one chosen per occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct UnionDef {
    /// Variants in declaration order, shared with derived definitions
    pub variants: Arc<Vec<Variant>>,
}

/// A union member together with its selection attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// The payload definition
    pub field: FieldDef,
    /// Bytes that must be visible in `RAW` before the trigger is evaluated
    pub prefetch_size: usize,
    /// Bytes skipped between selection and payload
    pub data_offset: u64,
    /// Bytes the whole variant occupies, including `data_offset`
    pub total_size: Option<u64>,
    /// Selection condition; `None` selects unconditionally
    pub trigger: Option<Expr>,
}

/// Concrete kind of a definition
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Signed integer
    Int(NumericDef),
    /// Unsigned integer; publishes its value to the namespace
    UInt(NumericDef),
    /// IEEE-754 float
    Float(NumericDef),
    /// Integral unix timestamp
    Timestamp(TimestampDef),
    /// Floating point unix timestamp
    FloatTimestamp(TimestampDef),
    /// Character string
    Char(CharDef),
    /// Bytes skipped without output
    Skip,
    /// Structure
    Struct(StructDef),
    /// Union
    Union(UnionDef),
}

impl FieldKind {
    /// Name of the built-in kind this one descends from
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Timestamp(_) => "ts",
            Self::FloatTimestamp(_) => "fts",
            Self::Char(_) => "char",
            Self::Skip => "skip",
            Self::Struct(_) => "struct",
            Self::Union(_) => "union",
        }
    }

    /// Scalar attributes, if this is a scalar kind
    pub fn scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Int(n) | Self::UInt(n) | Self::Float(n) => Some(&n.scalar),
            Self::Timestamp(t) | Self::FloatTimestamp(t) => Some(&t.scalar),
            Self::Char(c) => Some(&c.scalar),
            Self::Skip | Self::Struct(_) | Self::Union(_) => None,
        }
    }

    pub(crate) fn scalar_mut(&mut self) -> Option<&mut Scalar> {
        match self {
            Self::Int(n) | Self::UInt(n) | Self::Float(n) => Some(&mut n.scalar),
            Self::Timestamp(t) | Self::FloatTimestamp(t) => Some(&mut t.scalar),
            Self::Char(c) => Some(&mut c.scalar),
            Self::Skip | Self::Struct(_) | Self::Union(_) => None,
        }
    }
}

/// A named, counted field definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub(crate) name: String,
    pub(crate) count: Count,
    pub(crate) kind: FieldKind,
}

impl FieldDef {
    pub(crate) fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            count: Count::Fixed(1),
            kind,
        }
    }

    /// Builds a structure around already derived fields
    pub fn structure(name: impl Into<String>, placement: Placement, fields: Vec<FieldDef>) -> Self {
        Self::new(
            name,
            FieldKind::Struct(StructDef {
                placement,
                fields: Arc::new(fields),
            }),
        )
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repetition count
    pub fn count(&self) -> &Count {
        &self.count
    }

    /// Concrete kind
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// True for structures
    pub fn is_structure(&self) -> bool {
        matches!(self.kind, FieldKind::Struct(_))
    }

    /// True for unions
    pub fn is_union(&self) -> bool {
        matches!(self.kind, FieldKind::Union(_))
    }

    /// True for skip fields
    pub fn is_skip(&self) -> bool {
        matches!(self.kind, FieldKind::Skip)
    }

    /// True when the count is a literal 1
    pub fn is_trivially_one(&self) -> bool {
        self.count.is_trivially_one()
    }

    /// Size of one entry for scalar kinds
    pub fn size(&self) -> Option<usize> {
        self.kind.scalar().map(|s| s.size)
    }

    /// Structure members
    pub fn fields(&self) -> Option<&[FieldDef]> {
        match &self.kind {
            FieldKind::Struct(s) => Some(s.fields.as_slice()),
            _ => None,
        }
    }

    /// Structure member by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// Union variants
    pub fn variants(&self) -> Option<&[Variant]> {
        match &self.kind {
            FieldKind::Union(u) => Some(u.variants.as_slice()),
            _ => None,
        }
    }
}
