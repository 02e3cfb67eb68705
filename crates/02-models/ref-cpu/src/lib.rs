//! Instruction-at-a-time SM83 interpreter used as the conformance oracle.
//!
//! The interpreter executes one whole instruction per [`RefCpu::step`] call
//! against a [`bus::ProbeBus`] that serves the 4-byte instruction window and
//! records writes.

pub mod bus;
pub mod core;
pub mod cpu;
pub mod instr;

use model_abi::{ArchState, InstructionWindow, ModelError, ReferenceModel};

use crate::bus::ProbeBus;
use crate::core::Core;

/// Reference model wired to an instruction window.
#[derive(Clone, Debug, Default)]
pub struct RefCpu {
    core: Core<ProbeBus>,
}

impl RefCpu {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceModel for RefCpu {
    fn reset(&mut self, state: &ArchState, window: InstructionWindow) {
        let cpu = &mut self.core.cpu;
        cpu.load_registers(&state.regs);
        cpu.pc = state.pc;
        cpu.sp = state.sp;
        cpu.ime = state.ime;
        cpu.halted = false;
        self.core.bus.reset(window);
    }

    fn step(&mut self) -> Result<u32, ModelError> {
        self.core.bus.begin_instruction();
        let cycles = self.core.step()?;
        if let Some(overflow) = self.core.bus.take_overflow() {
            return Err(overflow.into());
        }
        log::trace!(
            "ref step pc={:#06x} cycles={cycles} writes={}",
            self.core.cpu.pc,
            self.core.bus.log().len()
        );
        Ok(cycles)
    }

    fn state(&self) -> ArchState {
        let cpu = &self.core.cpu;
        ArchState {
            regs: cpu.registers(),
            pc: cpu.pc,
            sp: cpu.sp,
            halted: cpu.halted,
            ime: cpu.ime,
            bus: self.core.bus.log().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_abi::BusAccess;
    use pretty_assertions::assert_eq;

    #[test]
    fn reset_clears_halt_and_log() {
        let mut cpu = RefCpu::new();
        cpu.reset(&ArchState::canonical(), InstructionWindow::new([0x76, 0, 0, 0]));
        cpu.step().unwrap();
        assert!(cpu.state().halted);

        let mut start = ArchState::canonical();
        start.halted = true;
        cpu.reset(&start, InstructionWindow::new([0x00, 0, 0, 0]));
        let state = cpu.state();
        assert!(!state.halted);
        assert!(state.bus.is_empty());
    }

    #[test]
    fn step_reports_writes_of_that_instruction_only() {
        let mut cpu = RefCpu::new();
        let mut start = ArchState::canonical();
        start.regs.b = 0x12;
        start.regs.c = 0x34;
        cpu.reset(&start, InstructionWindow::new([0xC5, 0x00, 0, 0]));
        cpu.step().unwrap();
        assert_eq!(
            cpu.state().bus.as_slice(),
            &[BusAccess::write(0xFFFF, 0x12), BusAccess::write(0xFFFE, 0x34)]
        );
        cpu.step().unwrap();
        assert!(cpu.state().bus.is_empty());
    }

    #[test]
    fn ei_enables_ime_at_retirement() {
        let mut cpu = RefCpu::new();
        cpu.reset(&ArchState::canonical(), InstructionWindow::new([0xFB, 0, 0, 0]));
        cpu.step().unwrap();
        assert!(cpu.state().ime);
    }
}
