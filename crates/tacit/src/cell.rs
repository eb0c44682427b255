//! Tagged 32-bit cells.
//!
//! A cell is the unit of storage everywhere in the VM: on the data stack, the
//! return stack, the global heap, and inside list payloads. Cells are raw
//! `u32` words. A word is TAGGED iff it sits in the sign-negative NaN space
//! with a nonzero mantissa; every other word is a NUMBER and reinterprets as
//! `f32`. Encoding a number canonicalizes NaN to the positive quiet NaN, so
//! arithmetic can never forge a tagged word.
//!
//! Mantissa layout of a tagged word (bits 22..0):
//!
//! ```text
//! | tag (6 bits, 22..17) | meta (1 bit, 16) | payload (16 bits, 15..0) |
//! ```
//!
//! `Tag::Number` is 0 and is never encoded as a tagged word, which keeps the
//! mantissa of every tagged word nonzero (distinct from negative infinity).

use strum::{Display, FromRepr};

/// Top nine bits (sign + exponent) of every tagged word.
const TAG_SPACE: u32 = 0xFF80_0000;
/// Mask selecting the 23 mantissa bits.
const MANTISSA_MASK: u32 = 0x007F_FFFF;
/// Canonical quiet NaN used when storing a NaN-valued number.
const CANONICAL_NAN: u32 = 0x7FC0_0000;

const TAG_SHIFT: u32 = 17;
const META_BIT: u32 = 1 << 16;

/// Discriminates the tagged-cell variants.
///
/// The set is closed; `Number` exists only as the answer of [`Cell::tag`] for
/// numeric cells and is never part of an encoded tagged word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Tag {
    Number = 0,
    Sentinel = 1,
    Code = 2,
    String = 3,
    Local = 4,
    List = 5,
    #[strum(serialize = "ref")]
    DataRef = 6,
}

/// Payload values of `Tag::Sentinel` cells.
///
/// `Nil` is the runtime non-value; the rest are compile-time closers left on
/// the data stack by immediate words, plus the `DEFAULT` clause marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u16)]
pub enum Sentinel {
    Nil = 0,
    EndDefinition = 1,
    EndIf = 2,
    EndDo = 3,
    EndWhen = 4,
    EndOf = 5,
    EndCase = 6,
    Default = 7,
}

/// A single 32-bit VM cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Cell(u32);

impl Cell {
    /// The `NIL` sentinel.
    pub const NIL: Self = Self(TAG_SPACE | ((Tag::Sentinel as u32) << TAG_SHIFT));

    /// Zero, as a number cell.
    pub const ZERO: Self = Self(0);

    /// Reconstructs a cell from its raw word.
    #[inline]
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw word.
    #[inline]
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Encodes a number cell, canonicalizing NaN so the tagged space stays
    /// unreachable from arithmetic.
    #[inline]
    #[must_use]
    pub fn number(value: f32) -> Self {
        if value.is_nan() {
            Self(CANONICAL_NAN)
        } else {
            Self(value.to_bits())
        }
    }

    /// Encodes a small integer as a number cell.
    ///
    /// Exact for the ranges the VM produces (cell indices, counts and code
    /// addresses are all below 2^24).
    #[inline]
    #[must_use]
    pub fn int(value: i32) -> Self {
        Self::number(value as f32)
    }

    /// Encodes a tagged cell.
    #[inline]
    #[must_use]
    pub fn tagged(tag: Tag, payload: u16, meta: bool) -> Self {
        debug_assert!(tag != Tag::Number, "Tag::Number cannot be encoded as tagged");
        let meta = if meta { META_BIT } else { 0 };
        Self(TAG_SPACE | ((tag as u32) << TAG_SHIFT) | meta | u32::from(payload))
    }

    /// A sentinel cell.
    #[inline]
    #[must_use]
    pub fn sentinel(s: Sentinel) -> Self {
        Self::tagged(Tag::Sentinel, s as u16, false)
    }

    /// A code cell: builtin opcode (< 128) or user code address (>= 128).
    /// `immediate` sets the meta bit.
    #[inline]
    #[must_use]
    pub fn code(addr: u16, immediate: bool) -> Self {
        Self::tagged(Tag::Code, addr, immediate)
    }

    /// An interned-string cell.
    #[inline]
    #[must_use]
    pub fn string(offset: u16) -> Self {
        Self::tagged(Tag::String, offset, false)
    }

    /// A list header with the given slot count.
    #[inline]
    #[must_use]
    pub fn list(slots: u16) -> Self {
        Self::tagged(Tag::List, slots, false)
    }

    /// A reference carrying an absolute cell index into the data segment.
    #[inline]
    #[must_use]
    pub fn data_ref(cell_index: u16) -> Self {
        Self::tagged(Tag::DataRef, cell_index, false)
    }

    /// A compile-time local marker carrying a slot index relative to BP.
    #[inline]
    #[must_use]
    pub fn local(slot: u16) -> Self {
        Self::tagged(Tag::Local, slot, false)
    }

    /// True when this word is tagged (non-numeric).
    #[inline]
    #[must_use]
    pub fn is_tagged(self) -> bool {
        (self.0 & TAG_SPACE) == TAG_SPACE && (self.0 & MANTISSA_MASK) != 0
    }

    /// The tag of this cell; `Tag::Number` for numeric cells.
    #[inline]
    #[must_use]
    pub fn tag(self) -> Tag {
        if self.is_tagged() {
            let raw = ((self.0 >> TAG_SHIFT) & 0x3F) as u8;
            Tag::from_repr(raw).unwrap_or(Tag::Number)
        } else {
            Tag::Number
        }
    }

    /// Payload of a tagged cell. Meaningless for numbers.
    #[inline]
    #[must_use]
    pub fn payload(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Meta bit of a tagged cell.
    #[inline]
    #[must_use]
    pub fn meta(self) -> bool {
        self.is_tagged() && (self.0 & META_BIT) != 0
    }

    /// Numeric value, guarded: `None` for tagged cells.
    #[inline]
    #[must_use]
    pub fn as_number(self) -> Option<f32> {
        if self.is_tagged() {
            None
        } else {
            Some(f32::from_bits(self.0))
        }
    }

    #[inline]
    #[must_use]
    pub fn is_number(self) -> bool {
        !self.is_tagged()
    }

    #[inline]
    #[must_use]
    pub fn is_list(self) -> bool {
        self.tag() == Tag::List
    }

    #[inline]
    #[must_use]
    pub fn is_ref(self) -> bool {
        self.tag() == Tag::DataRef
    }

    #[inline]
    #[must_use]
    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }

    /// Sentinel payload, if this is a sentinel cell.
    #[inline]
    #[must_use]
    pub fn as_sentinel(self) -> Option<Sentinel> {
        if self.tag() == Tag::Sentinel {
            Sentinel::from_repr(self.payload())
        } else {
            None
        }
    }

    /// Branch truth: numeric zero and `NIL` are false, everything else true.
    #[inline]
    #[must_use]
    pub fn is_truthy(self) -> bool {
        match self.as_number() {
            Some(n) => n != 0.0,
            None => !self.is_nil(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_round_trip() {
        for v in [0.0f32, 1.0, -1.0, 3.25, 1e10, -1e-10, f32::INFINITY] {
            let cell = Cell::number(v);
            assert!(cell.is_number());
            assert_eq!(cell.as_number(), Some(v));
        }
    }

    #[test]
    fn test_negative_infinity_is_a_number() {
        let cell = Cell::number(f32::NEG_INFINITY);
        assert!(cell.is_number());
        assert_eq!(cell.as_number(), Some(f32::NEG_INFINITY));
    }

    #[test]
    fn test_nan_is_canonicalized() {
        let cell = Cell::number(f32::NAN);
        assert!(cell.is_number());
        assert!(cell.as_number().unwrap().is_nan());
        // The stored bit pattern must stay out of the tagged space.
        assert!(!Cell::from_bits(cell.bits()).is_tagged());
    }

    #[test]
    fn test_tagged_fields_round_trip() {
        let cell = Cell::tagged(Tag::DataRef, 0x1234, false);
        assert!(cell.is_tagged());
        assert_eq!(cell.tag(), Tag::DataRef);
        assert_eq!(cell.payload(), 0x1234);
        assert!(!cell.meta());

        let imm = Cell::code(42, true);
        assert_eq!(imm.tag(), Tag::Code);
        assert_eq!(imm.payload(), 42);
        assert!(imm.meta());
    }

    #[test]
    fn test_tagged_cells_are_not_numbers() {
        for tag in [Tag::Sentinel, Tag::Code, Tag::String, Tag::Local, Tag::List, Tag::DataRef] {
            assert_eq!(Cell::tagged(tag, 0, false).as_number(), None);
            assert_eq!(Cell::tagged(tag, u16::MAX, true).as_number(), None);
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Cell::number(0.0).is_truthy());
        assert!(Cell::number(5.0).is_truthy());
        assert!(!Cell::NIL.is_truthy());
        assert!(Cell::list(3).is_truthy());
    }

    #[test]
    fn test_sentinel_round_trip() {
        for s in [
            Sentinel::Nil,
            Sentinel::EndDefinition,
            Sentinel::EndIf,
            Sentinel::EndDo,
            Sentinel::EndWhen,
            Sentinel::EndOf,
            Sentinel::EndCase,
            Sentinel::Default,
        ] {
            assert_eq!(Cell::sentinel(s).as_sentinel(), Some(s));
        }
        assert!(Cell::NIL.is_nil());
    }
}
