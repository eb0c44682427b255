//! Interned strings in the string segment.
//!
//! Strings are stored once, length-prefixed, in a byte segment of their own;
//! the 16-bit offset of the length byte is the string's identity for the
//! lifetime of the VM. `STRING` cells and dictionary name cells carry these
//! offsets, which makes string equality a payload comparison. Interned
//! strings are never freed.
//!
//! A side map handles deduplication; it is rebuilt from the segment when a
//! snapshot is loaded rather than serialized.

use ahash::AHashMap;

use crate::error::{VmError, VmResult};
use crate::memory::STRING_SIZE;

/// Longest internable string (the length prefix is one byte).
pub const MAX_STRING_LEN: usize = 255;

/// The interned string table.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Digest {
    /// Length-prefixed string bytes; `top` is the next free offset.
    bytes: Vec<u8>,
    top: u32,
    /// Dedup map from contents to offset. Rebuilt on load.
    #[serde(skip)]
    map: AHashMap<String, u16>,
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

impl Digest {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: vec![0; STRING_SIZE],
            top: 0,
            map: AHashMap::new(),
        }
    }

    /// Interns a string, returning its stable offset.
    ///
    /// Re-interning the same contents returns the original offset.
    pub fn intern(&mut self, s: &str) -> VmResult<u16> {
        if let Some(&offset) = self.map.get(s) {
            return Ok(offset);
        }
        let len = s.len();
        if len > MAX_STRING_LEN {
            return Err(VmError::StringSegmentFull);
        }
        let start = self.top as usize;
        let end = start + 1 + len;
        if end > STRING_SIZE || start > usize::from(u16::MAX) {
            return Err(VmError::StringSegmentFull);
        }
        self.bytes[start] = len as u8;
        self.bytes[start + 1..end].copy_from_slice(s.as_bytes());
        self.top = end as u32;
        let offset = start as u16;
        self.map.insert(s.to_owned(), offset);
        Ok(offset)
    }

    /// Looks up the offset of already-interned contents without interning.
    #[must_use]
    pub fn find(&self, s: &str) -> Option<u16> {
        self.map.get(s).copied()
    }

    /// Returns the string at `offset`.
    ///
    /// Offsets come from [`Digest::intern`]; anything else yields garbage but
    /// never panics beyond the segment bound.
    #[must_use]
    pub fn get(&self, offset: u16) -> &str {
        let start = usize::from(offset);
        let len = usize::from(self.bytes[start]);
        std::str::from_utf8(&self.bytes[start + 1..start + 1 + len]).unwrap_or("")
    }

    /// Rebuilds the dedup map by walking the segment. Called after a
    /// snapshot load, where the map was skipped.
    pub fn rehydrate(&mut self) {
        self.map.clear();
        let mut at = 0usize;
        while at < self.top as usize {
            let len = usize::from(self.bytes[at]);
            if let Ok(s) = std::str::from_utf8(&self.bytes[at + 1..at + 1 + len]) {
                self.map.insert(s.to_owned(), at as u16);
            }
            at += 1 + len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_deduplicated() {
        let mut digest = Digest::new();
        let a = digest.intern("square").unwrap();
        let b = digest.intern("square").unwrap();
        let c = digest.intern("cube").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(digest.get(a), "square");
        assert_eq!(digest.get(c), "cube");
    }

    #[test]
    fn test_find_does_not_intern() {
        let mut digest = Digest::new();
        assert_eq!(digest.find("missing"), None);
        let offset = digest.intern("present").unwrap();
        assert_eq!(digest.find("present"), Some(offset));
    }

    #[test]
    fn test_rehydrate_restores_dedup() {
        let mut digest = Digest::new();
        let a = digest.intern("one").unwrap();
        let b = digest.intern("two").unwrap();
        digest.map.clear();
        digest.rehydrate();
        assert_eq!(digest.find("one"), Some(a));
        assert_eq!(digest.find("two"), Some(b));
        assert_eq!(digest.intern("one").unwrap(), a);
    }
}
