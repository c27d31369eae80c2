//! Value formatting: number patterns and timestamp patterns.
//!
//! Both kinds are parsed once, when a field is derived, so that a bad
//! pattern surfaces as a schema error instead of mid-way through a dump.

mod number;
mod time;

pub use number::{Number, NumberClass, NumberFormat};
pub use time::{split_float, split_scaled, TimeFormat};
