//! # bindec-core
//!
//! A library for decoding binary files into a readable, offset-annotated
//! text dump driven by a JSON schema.
//!
//! This crate provides the core functionality for:
//! - Building field definitions by deriving from built-in and named bases
//! - Evaluating count, length and union trigger expressions
//! - Decoding a byte stream against a root structure and rendering the result
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`]: Schema documents, defaults and the standard config
//! - [`schema`]: Field definition model and the [`Catalog`] of named definitions
//! - [`expr`]: Expression language and its evaluator
//! - [`render`]: Decode & render engine
//! - [`session`]: Building a catalog and selecting the root for one run
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use bindec_core::{config, render, Session, SessionConfig};
//! use std::io::Cursor;
//!
//! let format = config::parse_document(r#"
//!     {
//!         "magic": {"base": "uint", "size": 2, "endian": "big", "format": "{:04x}"},
//!         "name":  {"base": "char", "size": 4}
//!     }
//! "#)?;
//! let session = Session::build(&config::standard_config()?, &format, SessionConfig::new())?;
//! let root = session.root(None)?;
//!
//! let mut out = Vec::new();
//! render(&root, Cursor::new(b"\xca\xfeabc\0".to_vec()), &mut out)?;
//! assert!(String::from_utf8_lossy(&out).contains("magic: cafe"));
//! # Ok::<(), bindec_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod config;
pub mod error;
pub mod expr;
pub mod format;
pub mod namespace;
pub mod render;
pub mod schema;
pub mod session;

// Re-export primary types for convenience
pub use codec::Codec;
pub use config::{Defaults, SchemaLimits};
pub use error::{Error, Result};
pub use expr::{Expr, Value};
pub use format::{NumberFormat, TimeFormat};
pub use namespace::Namespace;
pub use render::{render, InputCursor, RenderOutcome, Renderer};
pub use schema::{Catalog, Count, Endian, FieldDef, FieldKind, Placement};
pub use session::{Session, SessionConfig};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
