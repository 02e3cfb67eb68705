//! Encodes a descriptor plus operand assignment into instruction bytes.

use model_abi::InstructionWindow;
use serde::Serialize;

use crate::descriptor::{FieldKind, ImmWidth, InstructionDescriptor};
use crate::enumerator::OperandAssignment;

/// Byte that introduces the prefixed opcode space.
pub const PREFIX: u8 = 0xCB;

/// Assembled instruction, zero-padded to the window size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct InstructionBytes {
    bytes: [u8; 4],
    len: u8,
}

impl InstructionBytes {
    pub fn bytes(&self) -> [u8; 4] {
        self.bytes
    }

    /// Encoded length, excluding padding.
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    pub fn window(&self) -> InstructionWindow {
        InstructionWindow::new(self.bytes)
    }
}

/// Returns the value of `kind` in `assignment`.
pub fn field_value(assignment: &OperandAssignment, kind: FieldKind) -> u8 {
    match kind {
        FieldKind::Reg8 => assignment.reg8,
        FieldKind::Reg8Src => assignment.reg8_src,
        FieldKind::Reg16 => assignment.reg16,
        FieldKind::Cond => assignment.cond,
        FieldKind::Bit => assignment.bit,
    }
}

pub(crate) fn field_slot(assignment: &mut OperandAssignment, kind: FieldKind) -> &mut u8 {
    match kind {
        FieldKind::Reg8 => &mut assignment.reg8,
        FieldKind::Reg8Src => &mut assignment.reg8_src,
        FieldKind::Reg16 => &mut assignment.reg16,
        FieldKind::Cond => &mut assignment.cond,
        FieldKind::Bit => &mut assignment.bit,
    }
}

/// Opcode byte (after any prefix) with every present field ORed in.
pub fn opcode_byte(desc: &InstructionDescriptor, assignment: &OperandAssignment) -> u8 {
    desc.fields().fold(desc.opcode, |opcode, (kind, spec)| {
        opcode | (field_value(assignment, kind) << spec.shift)
    })
}

/// Assembles the instruction: optional prefix, opcode, then the immediate in
/// little-endian order.
pub fn assemble(desc: &InstructionDescriptor, assignment: &OperandAssignment) -> InstructionBytes {
    let mut bytes = [0u8; 4];
    let mut len = 0;
    if desc.prefixed {
        bytes[len] = PREFIX;
        len += 1;
    }
    bytes[len] = opcode_byte(desc, assignment);
    len += 1;
    let [lo, hi] = assignment.imm.to_le_bytes();
    match desc.imm {
        ImmWidth::None => {}
        ImmWidth::Byte => {
            bytes[len] = lo;
            len += 1;
        }
        ImmWidth::Word => {
            bytes[len] = lo;
            bytes[len + 1] = hi;
            len += 2;
        }
    }
    InstructionBytes {
        bytes,
        len: len as u8,
    }
}

/// Recovers the field values and immediate from assembled bytes.
///
/// Sweep indices are not encoded and come back zero.
pub fn decode_fields(desc: &InstructionDescriptor, bytes: &InstructionBytes) -> OperandAssignment {
    let raw = bytes.bytes();
    let at = usize::from(desc.prefixed);
    let opcode = raw[at];
    let mut assignment = OperandAssignment::default();
    for (kind, spec) in desc.fields() {
        let mask = (1u8 << kind.width()) - 1;
        *field_slot(&mut assignment, kind) = (opcode >> spec.shift) & mask;
    }
    assignment.imm = match desc.imm {
        ImmWidth::None => 0,
        ImmWidth::Byte => u16::from(raw[at + 1]),
        ImmWidth::Word => u16::from_le_bytes([raw[at + 1], raw[at + 2]]),
    };
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{PREFIXED, PRIMARY};

    fn row(table: &[InstructionDescriptor], mnemonic: &str) -> InstructionDescriptor {
        *table
            .iter()
            .find(|d| d.mnemonic == mnemonic)
            .expect("row present")
    }

    #[test]
    fn ld_r_r_places_both_registers() {
        let desc = row(PRIMARY, "LD r,r'");
        let assignment = OperandAssignment {
            reg8: 2,
            reg8_src: 7,
            ..OperandAssignment::default()
        };
        let bytes = assemble(&desc, &assignment);
        assert_eq!(bytes.as_slice(), &[0x57]);
        assert_eq!(bytes.bytes(), [0x57, 0, 0, 0]);
    }

    #[test]
    fn word_immediate_is_little_endian() {
        let desc = row(PRIMARY, "CALL cc,a16");
        let assignment = OperandAssignment {
            cond: 3,
            imm: 0x1234,
            ..OperandAssignment::default()
        };
        assert_eq!(assemble(&desc, &assignment).as_slice(), &[0xDC, 0x34, 0x12]);
    }

    #[test]
    fn prefixed_rows_lead_with_cb() {
        let desc = row(PREFIXED, "BIT b,r");
        let assignment = OperandAssignment {
            bit: 7,
            reg8: 6,
            ..OperandAssignment::default()
        };
        let bytes = assemble(&desc, &assignment);
        assert_eq!(bytes.as_slice(), &[0xCB, 0x7E]);
        assert_eq!(decode_fields(&desc, &bytes), assignment);
    }
}
