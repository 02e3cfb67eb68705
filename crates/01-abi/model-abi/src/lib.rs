//! Model ABI shared between the conformance harness and the CPU models it drives.
//!
//! This crate defines the protocol boundary between the harness (layer 03) and
//! the reference and clocked device models (layer 02): the architectural state
//! snapshot, the bounded bus transaction log, the instruction window served to
//! both models, and the two collaborator traits.

#![allow(missing_docs)]

pub mod bus;
pub mod flags;
pub mod state;

pub use bus::{
    AccessKind, BusAccess, BusLog, BusLogOverflow, BusTarget, FlatMemory, InstructionWindow,
    BUS_LOG_CAPACITY, OPEN_BUS,
};
pub use flags::Flags;
pub use state::{ArchState, Reg8, Registers};

use thiserror::Error;

/// Failures a reference model can surface while stepping.
///
/// None of these are device defects: they indicate the harness handed the
/// model something it cannot execute, or the harness' own bookkeeping broke.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error(transparent)]
    BusLog(#[from] BusLogOverflow),

    #[error("illegal opcode {opcode:#04x} at {pc:#06x}")]
    IllegalOpcode { opcode: u8, pc: u16 },
}

/// Instruction-at-a-time software model used as the correctness oracle.
pub trait ReferenceModel {
    /// Loads `state` and the instruction window, clearing the bus log and any
    /// pending fetch so the next `step` starts at `state.pc`.
    fn reset(&mut self, state: &ArchState, window: InstructionWindow);

    /// Executes exactly one instruction and returns the cycles it consumed.
    fn step(&mut self) -> Result<u32, ModelError>;

    /// Captures the current architectural state, including the bus log of the
    /// last step.
    fn state(&self) -> ArchState;
}

/// Signals sampled from a clocked device after an evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusSignals {
    /// Address presented on the memory bus.
    pub addr: u16,
    /// Write strobe for the current bus cycle.
    pub write_enable: bool,
    /// Data presented for a write.
    pub write_data: u8,
    /// High for the clock phase in which an instruction retired.
    pub instruction_retired: bool,
    /// The simulation can make no further progress.
    pub finished: bool,
}

/// Clock-edge evaluated CPU model (the device under test).
///
/// The model only advances inside [`ClockedDevice::eval`]; the caller owns the
/// clock line and the memory bus.
pub trait ClockedDevice {
    /// Loads `state` with the clock low and the sequencer ready to fetch.
    fn reset(&mut self, state: &ArchState);

    /// Drives the clock input.
    fn set_clock(&mut self, high: bool);

    /// Returns the current level of the clock input.
    fn clock(&self) -> bool;

    /// Evaluates the model against its current inputs.
    fn eval(&mut self);

    /// Samples the output signals.
    fn signals(&self) -> BusSignals;

    /// Drives the read-data bus for the address presented this cycle.
    fn supply_read(&mut self, value: u8);

    /// Captures the architectural state. The bus log is left empty; bus
    /// activity is observed by whoever drives the clock.
    fn state(&self) -> ArchState;
}
