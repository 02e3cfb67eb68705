//! Dual-model equivalence check for one instruction.

use model_abi::{ArchState, BusLog, ClockedDevice, ReferenceModel};
use serde::Serialize;

use crate::assembler::InstructionBytes;
use crate::driver;
use crate::error::HarnessError;

/// Both snapshots of a failed comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub bytes: InstructionBytes,
    pub input: ArchState,
    pub reference: ArchState,
    pub device: ArchState,
    /// Compared fields that differ, in report order.
    pub fields: Vec<&'static str>,
}

/// Outcome of one comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Match { ref_cycles: u32, dut_cycles: u32 },
    Mismatch(Box<Mismatch>),
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match { .. })
    }
}

/// Owns both models and the device's bus log.
pub struct Oracle<R, D> {
    reference: R,
    device: D,
    log: BusLog,
}

impl<R: ReferenceModel, D: ClockedDevice> Oracle<R, D> {
    pub fn new(reference: R, device: D) -> Self {
        Self {
            reference,
            device,
            log: BusLog::new(),
        }
    }

    pub fn reference(&self) -> &R {
        &self.reference
    }

    pub fn reference_mut(&mut self) -> &mut R {
        &mut self.reference
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Runs `bytes` on both models from `input` and compares the results.
    ///
    /// The reference always steps first. Errors are harness defects or a
    /// device that stopped without retiring, never a mismatch.
    pub fn check(
        &mut self,
        bytes: &InstructionBytes,
        input: &ArchState,
    ) -> Result<Verdict, HarnessError> {
        self.reference.reset(input, bytes.window());
        let ref_cycles = self.reference.step()?;
        let reference = self.reference.state();

        self.device.reset(input);
        self.log.clear();
        let mut window = bytes.window();
        let dut_cycles = driver::step_instruction(&mut self.device, &mut window, &mut self.log)?;
        let mut device = self.device.state();
        device.bus = self.log.clone();

        let fields = reference.differing_fields(&device);
        if fields.is_empty() {
            return Ok(Verdict::Match {
                ref_cycles,
                dut_cycles,
            });
        }
        log::warn!(
            "mismatch on {:02x?}: {}",
            bytes.as_slice(),
            fields.join(", ")
        );
        Ok(Verdict::Mismatch(Box::new(Mismatch {
            bytes: *bytes,
            input: input.clone(),
            reference,
            device,
            fields,
        })))
    }
}
