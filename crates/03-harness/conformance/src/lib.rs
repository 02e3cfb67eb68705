//! Differential conformance harness for SM83 CPU models.
//!
//! For every row of the instruction tables the harness enumerates the operand
//! space, assembles each instruction into a 4-byte window, runs it on a
//! [`ReferenceModel`](model_abi::ReferenceModel) and on a
//! [`ClockedDevice`](model_abi::ClockedDevice) from the same input state, and
//! compares the resulting snapshots. The first mismatch aborts the run with a
//! full report; a clean run ends with per-space opcode coverage.

pub mod assembler;
pub mod coverage;
pub mod descriptor;
pub mod disasm;
pub mod driver;
pub mod enumerator;
pub mod error;
pub mod harness;
pub mod oracle;
pub mod report;
pub mod selfcheck;
pub mod table;
pub mod trace;

pub use assembler::{assemble, InstructionBytes};
pub use coverage::{Coverage, OpcodeSpace, Tally};
pub use descriptor::{FlagSweep, ImmWidth, InstructionDescriptor, ValueSweep};
pub use driver::{step_instruction, DriverError, Phase, Stepper};
pub use enumerator::{ImmediatePolicy, OperandAssignment, OperandSpace};
pub use error::{Divergence, HarnessError};
pub use harness::{Harness, HarnessConfig, RunSummary, TableSummary, Verbosity};
pub use oracle::{Mismatch, Oracle, Verdict};
pub use selfcheck::{self_check, Fault, FaultInjector, FaultOutcome};
pub use table::{PREFIXED, PRIMARY};
pub use trace::{load_program, trace, ProgramFormat, TraceConfig, TraceEnd, TraceSummary};
