//! Values decoded so far, visible to count, length and trigger expressions.

use std::collections::HashMap;

/// Name under which the union prefetch buffer is exposed to triggers.
pub const RAW_NAME: &str = "RAW";

/// Per-run mapping from field name to its most recently decoded unsigned value.
///
/// Only unsigned integer fields publish here; a later decode of a field with
/// the same name overwrites the earlier value. While a union chooses its
/// variant the prefetched bytes are additionally visible as `RAW`.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    values: HashMap<String, u128>,
    raw: Option<Vec<u8>>,
}

impl Namespace {
    /// Creates an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decoded unsigned value under `name`
    pub fn publish(&mut self, name: &str, value: u128) {
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    /// Returns the last value published under `name`
    pub fn get(&self, name: &str) -> Option<u128> {
        self.values.get(name).copied()
    }

    /// Exposes the prefetch buffer as `RAW`
    pub fn set_raw(&mut self, data: &[u8]) {
        match &mut self.raw {
            Some(buf) => {
                buf.clear();
                buf.extend_from_slice(data);
            }
            None => self.raw = Some(data.to_vec()),
        }
    }

    /// Removes the prefetch buffer
    pub fn clear_raw(&mut self) {
        self.raw = None;
    }

    /// Returns the prefetch buffer while a union is dispatching
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Number of published values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing has been published yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_overwrites() {
        let mut ns = Namespace::new();
        ns.publish("len", 3);
        ns.publish("len", 7);
        assert_eq!(ns.get("len"), Some(7));
        assert_eq!(ns.len(), 1);
        assert_eq!(ns.get("missing"), None);
    }

    #[test]
    fn test_raw_slot() {
        let mut ns = Namespace::new();
        assert!(ns.raw().is_none());
        ns.set_raw(&[0x78]);
        ns.set_raw(&[0x78, 0x9a]);
        assert_eq!(ns.raw(), Some(&[0x78, 0x9a][..]));
        ns.clear_raw();
        assert!(ns.raw().is_none());
        assert!(ns.is_empty());
    }
}
