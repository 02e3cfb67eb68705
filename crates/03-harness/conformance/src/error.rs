use std::fmt;
use std::io;

use model_abi::{BusLogOverflow, ModelError};
use thiserror::Error;

use crate::descriptor::{DescriptorError, InstructionDescriptor};
use crate::driver::DriverError;
use crate::enumerator::OperandAssignment;
use crate::oracle::Mismatch;

/// A failed comparison with the operand context it ran under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence {
    pub descriptor: InstructionDescriptor,
    pub assignment: OperandAssignment,
    pub mismatch: Mismatch,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} diverged on {:02x?} in {}",
            self.descriptor.mnemonic,
            self.mismatch.bytes.as_slice(),
            self.mismatch.fields.join(", ")
        )
    }
}

/// Errors that end a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("{0}")]
    Divergence(Box<Divergence>),

    #[error("{mnemonic}: simulation finished after {cycles} cycles without retiring")]
    SimulationFinished { mnemonic: &'static str, cycles: u32 },

    #[error("invalid instruction table: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("reference model failed: {0}")]
    Model(#[from] ModelError),

    #[error("harness defect: {0}")]
    BusLog(#[from] BusLogOverflow),

    #[error("program line {line}: {token:?} is not a hex byte")]
    InvalidHex { line: usize, token: String },

    #[error("program is {len} bytes, larger than the address space")]
    ProgramTooLarge { len: usize },

    #[error("report output failed: {0}")]
    Io(#[from] io::Error),
}

impl From<DriverError> for HarnessError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::SimulationFinished { cycles } => HarnessError::SimulationFinished {
                mnemonic: "",
                cycles,
            },
            DriverError::BusLog(overflow) => HarnessError::BusLog(overflow),
        }
    }
}

impl HarnessError {
    /// Attaches the running mnemonic to errors raised below the descriptor
    /// loop.
    pub(crate) fn in_instruction(self, name: &'static str) -> Self {
        match self {
            HarnessError::SimulationFinished { cycles, .. } => HarnessError::SimulationFinished {
                mnemonic: name,
                cycles,
            },
            other => other,
        }
    }

    /// Whether the device under test is at fault, as opposed to the harness.
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            HarnessError::Divergence(_) | HarnessError::SimulationFinished { .. }
        )
    }
}
