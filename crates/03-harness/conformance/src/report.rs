//! Text rendering for runs, divergences and coverage.

use std::io::{self, Write};

use model_abi::ArchState;

use crate::coverage::{Coverage, OpcodeSpace};
use crate::descriptor::{FieldKind, ImmWidth, InstructionDescriptor};
use crate::disasm;
use crate::enumerator::OperandAssignment;
use crate::error::Divergence;

const REG8_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const REG16_NAMES: [&str; 4] = ["BC", "DE", "HL", "SP/AF"];
const COND_NAMES: [&str; 4] = ["NZ", "Z", "NC", "C"];

/// Operand dump order, outermost odometer digit first.
const DISPLAY_ORDER: [FieldKind; 5] = [
    FieldKind::Reg8,
    FieldKind::Reg8Src,
    FieldKind::Reg16,
    FieldKind::Cond,
    FieldKind::Bit,
];

/// State table followed by a blank line.
pub fn write_state<W: Write>(out: &mut W, state: &ArchState) -> io::Result<()> {
    write!(out, "{state}")?;
    writeln!(out)
}

/// One line per operand field present in `desc`.
pub fn write_operands<W: Write>(
    out: &mut W,
    desc: &InstructionDescriptor,
    assignment: &OperandAssignment,
) -> io::Result<()> {
    match desc.imm {
        ImmWidth::None => {}
        ImmWidth::Byte => writeln!(out, "imm: {:02x}", assignment.imm)?,
        ImmWidth::Word => writeln!(out, "imm: {:04x}", assignment.imm)?,
    }
    for kind in DISPLAY_ORDER {
        if desc.field(kind).is_none() {
            continue;
        }
        let value = crate::assembler::field_value(assignment, kind);
        let index = usize::from(value);
        match kind {
            FieldKind::Reg8 | FieldKind::Reg8Src => {
                writeln!(out, "r8: {} ({value})", REG8_NAMES[index & 7])?
            }
            FieldKind::Reg16 => writeln!(out, "r16: {} ({value})", REG16_NAMES[index & 3])?,
            FieldKind::Cond => writeln!(out, "cond: {} ({value})", COND_NAMES[index & 3])?,
            FieldKind::Bit => writeln!(out, "bit: {value}")?,
        }
    }
    Ok(())
}

/// Full divergence report: instruction, operands, input and both outputs.
pub fn write_divergence<W: Write>(out: &mut W, divergence: &Divergence) -> io::Result<()> {
    let mismatch = &divergence.mismatch;
    writeln!(out, "\n  === STATE MISMATCH ===")?;
    writeln!(out, "\n - Instruction -")?;
    let bytes = mismatch
        .bytes
        .as_slice()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{bytes}  {}", disasm::disassemble(mismatch.bytes.as_slice()))?;
    write_operands(out, &divergence.descriptor, &divergence.assignment)?;
    writeln!(out, "\n - Input state -")?;
    write_state(out, &mismatch.input)?;
    writeln!(out, "\n - CPU output state -")?;
    write_state(out, &mismatch.device)?;
    writeln!(out, "\n - Emulated output state -")?;
    write_state(out, &mismatch.reference)?;
    writeln!(out, "Differing: {}", mismatch.fields.join(", "))
}

/// Verbose header line for a descriptor.
pub fn write_instruction_header<W: Write>(
    out: &mut W,
    desc: &InstructionDescriptor,
) -> io::Result<()> {
    write!(out, "{}   ", desc.mnemonic)?;
    if desc.prefixed {
        write!(out, "(CB prefix)")?;
    }
    writeln!(out)
}

pub fn write_skipped<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, " Skipping")
}

pub fn write_permutations<W: Write>(out: &mut W, count: u64) -> io::Result<()> {
    writeln!(out, " Ran {count} permutations")
}

pub fn write_table_summary<W: Write>(
    out: &mut W,
    passed: usize,
    total: usize,
    space: OpcodeSpace,
) -> io::Result<()> {
    writeln!(out, "Tested {passed}/{total} {}instructions", space.label())
}

/// Tested/valid counts and, when incomplete, the 16-column grid of untested
/// opcodes.
pub fn write_coverage<W: Write>(
    out: &mut W,
    coverage: &Coverage,
    space: OpcodeSpace,
) -> io::Result<()> {
    let tally = coverage.tally(space);
    let prefix = space.label();
    writeln!(out, "Tested {}/{} {prefix}opcodes", tally.tested, tally.valid)?;
    if tally.is_complete() {
        return Ok(());
    }
    writeln!(out, "\nTable of untested {prefix}opcodes:")?;
    for op in 0..=0xFFu8 {
        if coverage.is_tested(space, op) || !space.is_valid(op) {
            write!(out, "-- ")?;
        } else {
            write!(out, "{op:02x} ")?;
        }
        if op & 0xF == 0xF {
            writeln!(out)?;
        }
    }
    writeln!(out)
}
