//! Free-running trace of the device over a loaded program.

use std::io::Write;

use model_abi::flags::{C_BIT, H_BIT, N_BIT, Z_BIT};
use model_abi::{ArchState, BusLog, ClockedDevice, FlatMemory};
use serde::Serialize;

use crate::driver::{self, DriverError};
use crate::error::HarnessError;

const ADDRESS_SPACE: usize = 0x1_0000;

/// On-disk program encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramFormat {
    /// Raw bytes loaded at address 0.
    Binary,
    /// Whitespace-separated hex bytes; `//` and `#` start a comment.
    HexText,
}

/// Decodes a program image for [`FlatMemory`].
pub fn load_program(raw: &[u8], format: ProgramFormat) -> Result<Vec<u8>, HarnessError> {
    let image = match format {
        ProgramFormat::Binary => raw.to_vec(),
        ProgramFormat::HexText => parse_hex(&String::from_utf8_lossy(raw))?,
    };
    if image.len() > ADDRESS_SPACE {
        return Err(HarnessError::ProgramTooLarge { len: image.len() });
    }
    Ok(image)
}

fn parse_hex(text: &str) -> Result<Vec<u8>, HarnessError> {
    let mut image = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let code = line.split("//").next().unwrap_or_default();
        let code = code.split('#').next().unwrap_or_default();
        for token in code.split_whitespace() {
            let byte = u8::from_str_radix(token, 16).map_err(|_| HarnessError::InvalidHex {
                line: index + 1,
                token: token.to_string(),
            })?;
            image.push(byte);
        }
    }
    Ok(image)
}

#[derive(Clone, Copy, Debug)]
pub struct TraceConfig {
    /// Stop after this many retired instructions.
    pub max_instructions: u64,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_instructions: 100_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TraceEnd {
    Halted,
    /// The device stopped making progress without halting.
    Finished,
    Limit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    pub instructions: u64,
    pub cycles: u64,
    pub end: TraceEnd,
}

/// Resets `device` to the canonical state and runs it over `mem`, printing the
/// registers after each retirement.
pub fn trace<D, W>(
    device: &mut D,
    mem: &mut FlatMemory,
    config: TraceConfig,
    out: &mut W,
) -> Result<TraceSummary, HarnessError>
where
    D: ClockedDevice,
    W: Write,
{
    device.reset(&ArchState::canonical());
    let mut log = BusLog::new();
    let mut summary = TraceSummary {
        instructions: 0,
        cycles: 0,
        end: TraceEnd::Limit,
    };

    while summary.instructions < config.max_instructions {
        log.clear();
        match driver::step_instruction(device, mem, &mut log) {
            Ok(cycles) => summary.cycles += u64::from(cycles),
            Err(DriverError::SimulationFinished { cycles }) => {
                summary.cycles += u64::from(cycles);
                summary.end = TraceEnd::Finished;
                writeln!(out, "Simulation finished, exiting")?;
                break;
            }
            Err(err) => return Err(err.into()),
        }
        summary.instructions += 1;

        let state = device.state();
        write_registers(out, &state)?;
        if state.halted {
            summary.end = TraceEnd::Halted;
            writeln!(out, "CPU halted, exiting")?;
            break;
        }
    }
    log::info!(
        "trace ended ({:?}) after {} instructions, {} cycles",
        summary.end,
        summary.instructions,
        summary.cycles
    );
    Ok(summary)
}

fn write_registers<W: Write>(out: &mut W, state: &ArchState) -> std::io::Result<()> {
    let flag = |bit: u8| (state.regs.f >> bit) & 1;
    writeln!(out, " PC   SP   AF   BC   DE   HL   Fl")?;
    writeln!(
        out,
        "{:04x} {:04x} {:04x} {:04x} {:04x} {:04x} {}{}{}{}\n",
        state.pc,
        state.sp,
        state.regs.af(),
        state.regs.bc(),
        state.regs.de(),
        state.regs.hl(),
        flag(Z_BIT),
        flag(N_BIT),
        flag(H_BIT),
        flag(C_BIT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_text_ignores_comments() {
        let text = b"3e 12    // ld a, 0x12\n# whole line\n76\n";
        let image = load_program(text, ProgramFormat::HexText).unwrap();
        assert_eq!(image, vec![0x3E, 0x12, 0x76]);
    }

    #[test]
    fn hex_text_reports_bad_token() {
        let err = load_program(b"00\n0g\n", ProgramFormat::HexText).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::InvalidHex { line: 2, ref token } if token == "0g"
        ));
    }

    #[test]
    fn binary_larger_than_address_space_is_rejected() {
        let raw = vec![0u8; ADDRESS_SPACE + 1];
        let err = load_program(&raw, ProgramFormat::Binary).unwrap_err();
        assert!(matches!(err, HarnessError::ProgramTooLarge { len } if len == ADDRESS_SPACE + 1));
    }
}
