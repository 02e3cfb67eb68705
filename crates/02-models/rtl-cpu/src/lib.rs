//! Clock-edge evaluated SM83 used as the device under test.
//!
//! The model exposes the port-level view a hardware simulation would: a clock
//! input, an address bus, a write strobe with its data, a read-data input and
//! the `instruction_retired` / `finished` status lines. Internally every
//! opcode is decoded into a micro-op [`microcode::Plan`] of bus cycles
//! followed by a single commit at retirement.

pub mod alu;
mod device;
pub mod microcode;

pub use device::{RtlCpu, WATCHDOG_CYCLES};
