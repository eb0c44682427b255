//! Bytecode emission into the fixed code segment.
//!
//! The code segment is byte-addressed and append-only within a submission:
//! `cp` is the next free byte and survives across submissions so previously
//! compiled definitions stay callable. Forward branches are emitted with a
//! zero operand and patched once the target is known; offsets are signed
//! 16-bit, relative to the byte just past the operand.

use crate::bytecode::op::Op;
use crate::error::{ParseError, ParseResult, VmError, VmResult};
use crate::memory::{CODE_SIZE, CODE_START};

/// The code segment plus the compile pointer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CodeSegment {
    bytes: Vec<u8>,
    cp: usize,
}

impl Default for CodeSegment {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeSegment {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: vec![0; CODE_SIZE],
            cp: CODE_START,
        }
    }

    /// Next free byte address; doubles as the entry address of whatever is
    /// emitted next.
    #[must_use]
    pub fn here(&self) -> usize {
        self.cp
    }

    /// Rewinds the compile pointer. Used to discard a failed submission.
    pub fn rewind(&mut self, to: usize) {
        self.cp = to;
    }

    fn reserve(&mut self, len: usize) -> ParseResult<usize> {
        if self.cp + len > CODE_SIZE {
            return Err(ParseError::Limit { what: "code segment" });
        }
        let at = self.cp;
        self.cp += len;
        Ok(at)
    }

    /// Emits a no-operand instruction.
    pub fn emit(&mut self, op: Op) -> ParseResult<()> {
        let at = self.reserve(1)?;
        self.bytes[at] = op as u8;
        Ok(())
    }

    /// Emits an instruction with a u16 operand (little-endian).
    pub fn emit_u16(&mut self, op: Op, operand: u16) -> ParseResult<()> {
        let at = self.reserve(3)?;
        self.bytes[at] = op as u8;
        self.bytes[at + 1..at + 3].copy_from_slice(&operand.to_le_bytes());
        Ok(())
    }

    /// Emits an instruction with an f32 operand (little-endian bits).
    pub fn emit_f32(&mut self, op: Op, operand: f32) -> ParseResult<()> {
        let at = self.reserve(5)?;
        self.bytes[at] = op as u8;
        self.bytes[at + 1..at + 5].copy_from_slice(&operand.to_bits().to_le_bytes());
        Ok(())
    }

    /// Emits a two-byte user-code call: high bit set on the first byte.
    pub fn emit_call_user(&mut self, addr: u16) -> ParseResult<()> {
        debug_assert!(addr >= CODE_START as u16);
        if addr > 0x7FFF {
            return Err(ParseError::Limit { what: "user code address" });
        }
        let at = self.reserve(2)?;
        self.bytes[at] = 0x80 | (addr >> 8) as u8;
        self.bytes[at + 1] = (addr & 0xFF) as u8;
        Ok(())
    }

    /// Emits a branch with a zero placeholder offset, returning the operand
    /// position for a later [`CodeSegment::patch_branch`].
    pub fn emit_branch_placeholder(&mut self, op: Op) -> ParseResult<usize> {
        let at = self.reserve(3)?;
        self.bytes[at] = op as u8;
        self.bytes[at + 1] = 0;
        self.bytes[at + 2] = 0;
        Ok(at + 1)
    }

    /// Patches the branch operand at `operand_pos` to jump to the current
    /// compile pointer. Offsets are relative to the byte just past the
    /// operand.
    pub fn patch_branch(&mut self, operand_pos: usize) -> ParseResult<()> {
        let raw = self.cp as i64 - (operand_pos as i64 + 2);
        let offset = i16::try_from(raw).map_err(|_| ParseError::Limit { what: "branch offset" })?;
        self.bytes[operand_pos..operand_pos + 2].copy_from_slice(&offset.to_le_bytes());
        Ok(())
    }

    /// Overwrites a previously emitted u16 operand (used to patch `Reserve`
    /// with the final local count).
    pub fn patch_u16(&mut self, operand_pos: usize, value: u16) {
        self.bytes[operand_pos..operand_pos + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Fetches one byte for the interpreter.
    #[inline]
    pub fn byte(&self, ip: usize) -> VmResult<u8> {
        self.bytes
            .get(ip)
            .copied()
            .ok_or(VmError::SegmentBounds { segment: "code", index: ip, limit: CODE_SIZE })
    }

    /// Reads a little-endian u16 operand.
    #[inline]
    pub fn read_u16(&self, ip: usize) -> VmResult<u16> {
        let lo = self.byte(ip)?;
        let hi = self.byte(ip + 1)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Reads a little-endian i16 operand.
    #[inline]
    pub fn read_i16(&self, ip: usize) -> VmResult<i16> {
        Ok(self.read_u16(ip)? as i16)
    }

    /// Reads a little-endian f32 operand.
    #[inline]
    pub fn read_f32(&self, ip: usize) -> VmResult<f32> {
        let mut raw = [0u8; 4];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = self.byte(ip + i)?;
        }
        Ok(f32::from_bits(u32::from_le_bytes(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_starts_past_the_builtin_page() {
        let code = CodeSegment::new();
        assert_eq!(code.here(), CODE_START);
    }

    #[test]
    fn test_emit_and_read_back() {
        let mut code = CodeSegment::new();
        let start = code.here();
        code.emit(Op::Dup).unwrap();
        code.emit_u16(Op::Call, 0x1234).unwrap();
        code.emit_f32(Op::LiteralNumber, 2.5).unwrap();

        assert_eq!(code.byte(start).unwrap(), Op::Dup as u8);
        assert_eq!(code.byte(start + 1).unwrap(), Op::Call as u8);
        assert_eq!(code.read_u16(start + 2).unwrap(), 0x1234);
        assert_eq!(code.byte(start + 4).unwrap(), Op::LiteralNumber as u8);
        assert_eq!(code.read_f32(start + 5).unwrap(), 2.5);
    }

    #[test]
    fn test_branch_patching_is_relative_to_past_the_operand() {
        let mut code = CodeSegment::new();
        let start = code.here();
        let operand = code.emit_branch_placeholder(Op::Branch).unwrap();
        code.emit(Op::Dup).unwrap();
        code.emit(Op::Drop).unwrap();
        code.patch_branch(operand).unwrap();

        // Branch at start, operand at start+1, next instruction at start+3,
        // target at start+5: offset = 5 - 3 = 2.
        assert_eq!(code.read_i16(start + 1).unwrap(), 2);
    }

    #[test]
    fn test_user_call_encoding_sets_the_high_bit() {
        let mut code = CodeSegment::new();
        let start = code.here();
        code.emit_call_user(0x1234).unwrap();
        assert_eq!(code.byte(start).unwrap(), 0x80 | 0x12);
        assert_eq!(code.byte(start + 1).unwrap(), 0x34);
    }
}
