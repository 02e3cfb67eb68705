//! Instruction tables for the primary and `0xCB`-prefixed opcode spaces.
//!
//! Register fields use the SM83 operand encoding. Register-pair fields on
//! `LD (rr),A` / `LD A,(rr)` stop at `DE`: the `HL+`/`HL-` forms share the
//! field bits and get their own rows.

use crate::descriptor::{FlagSweep, InstructionDescriptor, ValueSweep};

const fn op(mnemonic: &'static str, opcode: u8) -> InstructionDescriptor {
    InstructionDescriptor::new(mnemonic, opcode)
}

const fn cb(mnemonic: &'static str, opcode: u8) -> InstructionDescriptor {
    InstructionDescriptor::new(mnemonic, opcode).prefixed()
}

/// ALU `A,r` form: carry-in and operand values both matter.
const fn alu_r(mnemonic: &'static str, opcode: u8) -> InstructionDescriptor {
    op(mnemonic, opcode)
        .reg8(0)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::All)
}

/// ALU `A,d8` form; the immediate already covers the operand.
const fn alu_d8(mnemonic: &'static str, opcode: u8) -> InstructionDescriptor {
    op(mnemonic, opcode)
        .imm8()
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::Accumulator)
}

/// Rotate/shift block behind the prefix.
const fn cb_shift(mnemonic: &'static str, opcode: u8) -> InstructionDescriptor {
    cb(mnemonic, opcode)
        .reg8(0)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::All)
}

pub const PRIMARY: &[InstructionDescriptor] = &[
    op("NOP", 0x00),
    op("LD rr,d16", 0x01).reg16(4, 4).imm16(),
    op("LD (rr),A", 0x02).reg16(4, 2).values(ValueSweep::All),
    op("INC rr", 0x03).reg16(4, 4).values(ValueSweep::All),
    op("INC r", 0x04)
        .reg8(3)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::All),
    op("DEC r", 0x05)
        .reg8(3)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::All),
    op("LD r,d8", 0x06).reg8(3).imm8(),
    op("RLCA", 0x07)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::Accumulator),
    op("LD (a16),SP", 0x08).imm16().values(ValueSweep::All),
    op("ADD HL,rr", 0x09)
        .reg16(4, 4)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::All),
    op("LD A,(rr)", 0x0A).reg16(4, 2).values(ValueSweep::All),
    op("DEC rr", 0x0B).reg16(4, 4).values(ValueSweep::All),
    op("RRCA", 0x0F)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::Accumulator),
    op("STOP", 0x10),
    op("RLA", 0x17)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::Accumulator),
    op("JR e", 0x18).imm8(),
    op("RRA", 0x1F)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::Accumulator),
    op("JR cc,e", 0x20).cond(3).imm8().flags(FlagSweep::Conditions),
    op("LD (HL+),A", 0x22).values(ValueSweep::All),
    op("DAA", 0x27)
        .flags(FlagSweep::All)
        .values(ValueSweep::AccumulatorExhaustive),
    op("LD A,(HL+)", 0x2A).values(ValueSweep::All),
    op("CPL", 0x2F)
        .flags(FlagSweep::All)
        .values(ValueSweep::Accumulator),
    op("LD (HL-),A", 0x32).values(ValueSweep::All),
    op("SCF", 0x37).flags(FlagSweep::All),
    op("LD A,(HL-)", 0x3A).values(ValueSweep::All),
    op("CCF", 0x3F).flags(FlagSweep::All),
    op("LD r,r'", 0x40)
        .reg8(3)
        .reg8_src(0)
        .skip(&[0x76])
        .values(ValueSweep::All),
    op("HALT", 0x76),
    alu_r("ADD A,r", 0x80),
    alu_r("ADC A,r", 0x88),
    alu_r("SUB r", 0x90),
    alu_r("SBC A,r", 0x98),
    alu_r("AND r", 0xA0),
    alu_r("XOR r", 0xA8),
    alu_r("OR r", 0xB0),
    alu_r("CP r", 0xB8),
    op("RET cc", 0xC0)
        .cond(3)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::All),
    op("POP rr", 0xC1).reg16(4, 4).values(ValueSweep::All),
    op("JP cc,a16", 0xC2)
        .cond(3)
        .imm16()
        .flags(FlagSweep::Conditions),
    op("JP a16", 0xC3).imm16(),
    op("CALL cc,a16", 0xC4)
        .cond(3)
        .imm16()
        .flags(FlagSweep::Conditions),
    op("PUSH rr", 0xC5)
        .reg16(4, 4)
        .flags(FlagSweep::All)
        .values(ValueSweep::All),
    alu_d8("ADD A,d8", 0xC6),
    op("RST n", 0xC7).bit(3).values(ValueSweep::All),
    op("RET", 0xC9).values(ValueSweep::All),
    op("CALL a16", 0xCD).imm16(),
    alu_d8("ADC A,d8", 0xCE),
    alu_d8("SUB d8", 0xD6),
    op("RETI", 0xD9).values(ValueSweep::All),
    alu_d8("SBC A,d8", 0xDE),
    op("LDH (a8),A", 0xE0).imm8().values(ValueSweep::Accumulator),
    op("LD (C),A", 0xE2).values(ValueSweep::All),
    alu_d8("AND d8", 0xE6),
    op("ADD SP,e", 0xE8).imm8().values(ValueSweep::All),
    op("JP HL", 0xE9).values(ValueSweep::All),
    op("LD (a16),A", 0xEA).imm16().values(ValueSweep::Accumulator),
    alu_d8("XOR d8", 0xEE),
    op("LDH A,(a8)", 0xF0).imm8(),
    op("LD A,(C)", 0xF2).values(ValueSweep::All),
    op("DI", 0xF3),
    alu_d8("OR d8", 0xF6),
    op("LD HL,SP+e", 0xF8).imm8().values(ValueSweep::All),
    op("LD SP,HL", 0xF9).values(ValueSweep::All),
    op("LD A,(a16)", 0xFA).imm16(),
    op("EI", 0xFB),
    alu_d8("CP d8", 0xFE),
];

pub const PREFIXED: &[InstructionDescriptor] = &[
    cb_shift("RLC r", 0x00),
    cb_shift("RRC r", 0x08),
    cb_shift("RL r", 0x10),
    cb_shift("RR r", 0x18),
    cb_shift("SLA r", 0x20),
    cb_shift("SRA r", 0x28),
    cb_shift("SWAP r", 0x30),
    cb_shift("SRL r", 0x38),
    cb("BIT b,r", 0x40)
        .bit(3)
        .reg8(0)
        .flags(FlagSweep::Conditions)
        .values(ValueSweep::All),
    cb("RES b,r", 0x80).bit(3).reg8(0).values(ValueSweep::All),
    cb("SET b,r", 0xC0).bit(3).reg8(0).values(ValueSweep::All),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler;
    use crate::coverage::OpcodeSpace;
    use crate::enumerator::{ImmediatePolicy, OperandSpace};
    use std::collections::BTreeMap;

    #[test]
    fn tables_validate() {
        for desc in PRIMARY.iter().chain(PREFIXED) {
            assert_eq!(desc.validate(), Ok(()), "{}", desc.mnemonic);
        }
    }

    #[test]
    fn prefix_flag_matches_table() {
        assert!(PRIMARY.iter().all(|d| !d.prefixed));
        assert!(PREFIXED.iter().all(|d| d.prefixed));
    }

    /// Each valid opcode is produced by exactly one row.
    #[test]
    fn rows_partition_the_opcode_spaces() {
        for (table, space) in [(PRIMARY, OpcodeSpace::Primary), (PREFIXED, OpcodeSpace::Prefixed)] {
            let mut owners: BTreeMap<u8, &str> = BTreeMap::new();
            for desc in table {
                let operands = OperandSpace::new(desc, ImmediatePolicy::default());
                for assignment in operands.iter() {
                    let opcode = assembler::opcode_byte(desc, &assignment);
                    if let Some(previous) = owners.insert(opcode, desc.mnemonic) {
                        assert_eq!(
                            previous, desc.mnemonic,
                            "{opcode:#04x} claimed by two rows"
                        );
                    }
                }
            }
            for opcode in 0..=0xFFu8 {
                assert_eq!(
                    owners.contains_key(&opcode),
                    space.is_valid(opcode),
                    "{opcode:#04x} in {space:?}"
                );
            }
        }
    }
}
