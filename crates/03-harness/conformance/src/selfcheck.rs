//! Verifies that the oracle notices a deliberately broken reference model.

use model_abi::flags::{C_BIT, H_BIT, N_BIT, Z_BIT};
use model_abi::{
    ArchState, BusAccess, ClockedDevice, InstructionWindow, ModelError, Reg8, ReferenceModel,
};
use serde::Serialize;

use crate::assembler;
use crate::descriptor::InstructionDescriptor;
use crate::enumerator::{ImmediatePolicy, OperandSpace};
use crate::error::{Divergence, HarnessError};
use crate::oracle::{Oracle, Verdict};

/// A single corruption applied by [`FaultInjector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Fault {
    /// XOR of one `F` bit (4-7) into the reset state.
    FlagBit(u8),
    /// Inverts the low bit of a register in the stepped snapshot.
    Register(Reg8),
    StackPointer,
    ProgramCounter,
    InterruptEnable,
    /// Inverts the halted flag of the stepped snapshot.
    Halted,
    /// Appends a write that never happened.
    BusWrite,
}

impl Fault {
    /// Every fault the self-check runs by default.
    pub fn catalogue() -> Vec<Fault> {
        let mut faults: Vec<Fault> = [Z_BIT, N_BIT, H_BIT, C_BIT]
            .into_iter()
            .map(Fault::FlagBit)
            .collect();
        faults.extend(
            Reg8::ALL
                .into_iter()
                .filter(|&r| r != Reg8::F)
                .map(Fault::Register),
        );
        faults.extend([
            Fault::StackPointer,
            Fault::ProgramCounter,
            Fault::InterruptEnable,
            Fault::Halted,
            Fault::BusWrite,
        ]);
        faults
    }

    /// Name of the compared field the fault must show up in.
    pub fn field(self) -> &'static str {
        match self {
            Fault::FlagBit(Z_BIT) => "F.Z",
            Fault::FlagBit(N_BIT) => "F.N",
            Fault::FlagBit(H_BIT) => "F.H",
            Fault::FlagBit(C_BIT) => "F.C",
            Fault::FlagBit(_) => "F.low",
            Fault::Register(Reg8::F) => "F.C",
            Fault::Register(reg) => reg.name(),
            Fault::StackPointer => "SP",
            Fault::ProgramCounter => "PC",
            Fault::InterruptEnable => "IME",
            Fault::Halted => "halted",
            Fault::BusWrite => "bus",
        }
    }
}

/// Reference model wrapper that corrupts its inputs or outputs.
pub struct FaultInjector<R> {
    inner: R,
    fault: Option<Fault>,
}

impl<R> FaultInjector<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, fault: None }
    }

    pub fn set_fault(&mut self, fault: Option<Fault>) {
        self.fault = fault;
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ReferenceModel> ReferenceModel for FaultInjector<R> {
    fn reset(&mut self, state: &ArchState, window: InstructionWindow) {
        match self.fault {
            Some(Fault::FlagBit(bit)) => {
                let mut state = state.clone();
                state.regs.f ^= 1 << (bit & 7);
                self.inner.reset(&state, window);
            }
            _ => self.inner.reset(state, window),
        }
    }

    fn step(&mut self) -> Result<u32, ModelError> {
        self.inner.step()
    }

    fn state(&self) -> ArchState {
        let mut state = self.inner.state();
        match self.fault {
            Some(Fault::Register(reg)) => {
                let flipped = if reg == Reg8::F { 1 << C_BIT } else { 1 };
                state.regs.set(reg, state.regs.get(reg) ^ flipped);
            }
            Some(Fault::StackPointer) => state.sp ^= 1,
            Some(Fault::ProgramCounter) => state.pc ^= 1,
            Some(Fault::InterruptEnable) => state.ime = !state.ime,
            Some(Fault::Halted) => state.halted = !state.halted,
            Some(Fault::BusWrite) => {
                if state.bus.push(BusAccess::write(0xFFFF, 0x00)).is_err() {
                    log::warn!("bus log full, phantom write dropped");
                }
            }
            Some(Fault::FlagBit(_)) | None => {}
        }
        state
    }
}

/// What the oracle reported for one fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FaultOutcome {
    pub fault: Fault,
    pub fields: Vec<&'static str>,
}

impl FaultOutcome {
    /// The mismatch named the faulted field.
    pub fn caught(&self) -> bool {
        self.fields.contains(&self.fault.field())
    }
}

/// Runs the first operand point of `desc` once clean, then once per fault.
///
/// The clean run must match; a clean divergence is returned as an error
/// since no fault result would mean anything.
pub fn self_check<R, D>(
    reference: R,
    device: D,
    desc: &InstructionDescriptor,
    faults: &[Fault],
) -> Result<Vec<FaultOutcome>, HarnessError>
where
    R: ReferenceModel,
    D: ClockedDevice,
{
    desc.validate()?;
    let operands = OperandSpace::new(desc, ImmediatePolicy::default());
    let assignment = operands.start().unwrap_or_default();
    let bytes = assembler::assemble(desc, &assignment);
    let input = operands.input_state(&assignment);

    let mut oracle = Oracle::new(FaultInjector::new(reference), device);
    let clean = oracle
        .check(&bytes, &input)
        .map_err(|err| err.in_instruction(desc.mnemonic))?;
    if let Verdict::Mismatch(mismatch) = clean {
        return Err(HarnessError::Divergence(Box::new(Divergence {
            descriptor: *desc,
            assignment,
            mismatch: *mismatch,
        })));
    }

    let mut outcomes = Vec::with_capacity(faults.len());
    for &fault in faults {
        oracle.reference_mut().set_fault(Some(fault));
        let verdict = oracle
            .check(&bytes, &input)
            .map_err(|err| err.in_instruction(desc.mnemonic))?;
        let fields = match verdict {
            Verdict::Match { .. } => Vec::new(),
            Verdict::Mismatch(mismatch) => mismatch.fields,
        };
        let outcome = FaultOutcome { fault, fields };
        if !outcome.caught() {
            log::warn!("{fault:?} was not caught");
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_covers_every_compared_field_kind() {
        let faults = Fault::catalogue();
        assert_eq!(faults.len(), 4 + 7 + 5);
        let fields: Vec<_> = faults.iter().map(|f| f.field()).collect();
        for name in [
            "F.Z", "F.N", "F.H", "F.C", "A", "L", "SP", "PC", "IME", "halted", "bus",
        ] {
            assert!(fields.contains(&name), "{name}");
        }
    }

    #[test]
    fn outcome_requires_named_field() {
        let outcome = FaultOutcome {
            fault: Fault::StackPointer,
            fields: vec!["PC"],
        };
        assert!(!outcome.caught());
        let outcome = FaultOutcome {
            fault: Fault::StackPointer,
            fields: vec!["SP"],
        };
        assert!(outcome.caught());
    }
}
