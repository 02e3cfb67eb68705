//! Odometer traversal of a descriptor's operand space and input sweep.
//!
//! Digits, innermost first: immediate, bit index, condition, register pair,
//! secondary register, primary register, value sweep, flag sweep. Encodings in
//! the descriptor's skip list are stepped over.

use std::num::NonZeroU16;

use model_abi::ArchState;
use serde::Serialize;

use crate::assembler;
use crate::descriptor::{ImmWidth, InstructionDescriptor};

/// Default stride for sampled 2-byte immediates: 256 values covering every
/// byte in both halves, `0x0000` through `0xFFFF`.
pub const DEFAULT_WORD_STRIDE: u16 = 0x0101;

/// How 2-byte immediates are enumerated. 1-byte immediates are always
/// exhaustive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ImmediatePolicy {
    /// Every value `0x0000..=0xFFFF`.
    Exhaustive,
    /// Multiples of `stride` that fit in 16 bits.
    Sampled { stride: NonZeroU16 },
}

impl Default for ImmediatePolicy {
    fn default() -> Self {
        match NonZeroU16::new(DEFAULT_WORD_STRIDE) {
            Some(stride) => ImmediatePolicy::Sampled { stride },
            None => ImmediatePolicy::Exhaustive,
        }
    }
}

impl ImmediatePolicy {
    /// Number of 2-byte immediate values enumerated.
    pub fn word_count(self) -> u32 {
        match self {
            ImmediatePolicy::Exhaustive => 0x1_0000,
            ImmediatePolicy::Sampled { stride } => 0xFFFF / u32::from(stride.get()) + 1,
        }
    }

    fn word_value(self, index: u32) -> u16 {
        match self {
            ImmediatePolicy::Exhaustive => index as u16,
            ImmediatePolicy::Sampled { stride } => (index * u32::from(stride.get())) as u16,
        }
    }

    fn count(self, width: ImmWidth) -> u32 {
        match width {
            ImmWidth::None => 1,
            ImmWidth::Byte => 0x100,
            ImmWidth::Word => self.word_count(),
        }
    }

    fn value(self, width: ImmWidth, index: u32) -> u16 {
        match width {
            ImmWidth::None => 0,
            ImmWidth::Byte => index as u16,
            ImmWidth::Word => self.word_value(index),
        }
    }
}

/// One point of the operand space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct OperandAssignment {
    pub reg8: u8,
    pub reg8_src: u8,
    pub reg16: u8,
    pub cond: u8,
    pub bit: u8,
    pub imm: u16,
    /// Position of `imm` in the immediate sequence.
    pub imm_index: u32,
    pub value_index: u16,
    pub flag_index: u8,
}

/// Operand space of one descriptor under an immediate policy.
#[derive(Clone, Copy, Debug)]
pub struct OperandSpace<'d> {
    desc: &'d InstructionDescriptor,
    policy: ImmediatePolicy,
}

impl<'d> OperandSpace<'d> {
    pub fn new(desc: &'d InstructionDescriptor, policy: ImmediatePolicy) -> Self {
        Self { desc, policy }
    }

    pub fn descriptor(&self) -> &'d InstructionDescriptor {
        self.desc
    }

    /// First non-skipped assignment, or `None` if every encoding is skipped.
    pub fn start(&self) -> Option<OperandAssignment> {
        let mut assignment = OperandAssignment::default();
        if self.is_skipped(&assignment) && self.advance(&mut assignment) {
            return None;
        }
        Some(assignment)
    }

    /// Steps to the next non-skipped assignment.
    ///
    /// Returns `true` once the space is exhausted; the assignment is then
    /// back at zero.
    pub fn advance(&self, assignment: &mut OperandAssignment) -> bool {
        loop {
            if self.bump(assignment) {
                return true;
            }
            if !self.is_skipped(assignment) {
                return false;
            }
        }
    }

    /// Input state for `assignment`: canonical reset plus the sweep digits.
    pub fn input_state(&self, assignment: &OperandAssignment) -> ArchState {
        let mut state = ArchState::canonical();
        let sweep = self.desc.sweep;
        sweep
            .values
            .apply(usize::from(assignment.value_index), &mut state);
        state.regs.f = sweep.flags.flags(usize::from(assignment.flag_index));
        state
    }

    /// Number of assignments, skipped encodings excluded.
    pub fn len(&self) -> u64 {
        self.iter().count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.start().is_none()
    }

    pub fn iter(&self) -> Iter<'d> {
        Iter {
            space: *self,
            next: self.start(),
        }
    }

    fn is_skipped(&self, assignment: &OperandAssignment) -> bool {
        !self.desc.skip.is_empty()
            && self
                .desc
                .skip
                .contains(&assembler::opcode_byte(self.desc, assignment))
    }

    /// Increments the odometer by one; returns `true` on wrap-around.
    fn bump(&self, a: &mut OperandAssignment) -> bool {
        let imm_count = self.policy.count(self.desc.imm);
        a.imm_index += 1;
        if a.imm_index < imm_count {
            a.imm = self.policy.value(self.desc.imm, a.imm_index);
            return false;
        }
        a.imm_index = 0;
        a.imm = 0;

        for (kind, spec) in self.desc.fields() {
            let digit = assembler::field_slot(a, kind);
            *digit += 1;
            if *digit < spec.limit {
                return false;
            }
            *digit = 0;
        }

        a.value_index += 1;
        if usize::from(a.value_index) < self.desc.sweep.values.len() {
            return false;
        }
        a.value_index = 0;

        a.flag_index += 1;
        if usize::from(a.flag_index) < self.desc.sweep.flags.len() {
            return false;
        }
        a.flag_index = 0;
        true
    }
}

/// Iterator over an [`OperandSpace`].
#[derive(Clone, Debug)]
pub struct Iter<'d> {
    space: OperandSpace<'d>,
    next: Option<OperandAssignment>,
}

impl Iterator for Iter<'_> {
    type Item = OperandAssignment;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let mut following = current;
        self.next = if self.space.advance(&mut following) {
            None
        } else {
            Some(following)
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FlagSweep, ValueSweep};
    use pretty_assertions::assert_eq;

    #[test]
    fn default_stride_spans_full_word_range() {
        let policy = ImmediatePolicy::default();
        assert_eq!(policy.word_count(), 256);
        assert_eq!(policy.word_value(0), 0x0000);
        assert_eq!(policy.word_value(1), 0x0101);
        assert_eq!(policy.word_value(255), 0xFFFF);
        assert_eq!(ImmediatePolicy::Exhaustive.word_count(), 65536);
    }

    #[test]
    fn immediate_is_the_innermost_digit() {
        let desc = InstructionDescriptor::new("LD r,d8", 0x06).reg8(3).imm8();
        let space = OperandSpace::new(&desc, ImmediatePolicy::default());
        let points: Vec<_> = space.iter().take(258).collect();
        assert_eq!((points[1].reg8, points[1].imm), (0, 1));
        assert_eq!((points[255].reg8, points[255].imm), (0, 255));
        assert_eq!((points[256].reg8, points[256].imm), (1, 0));
        assert_eq!(space.len(), 8 * 256);
    }

    #[test]
    fn flag_sweep_is_the_outermost_digit() {
        let desc = InstructionDescriptor::new("INC r", 0x04)
            .reg8(3)
            .flags(FlagSweep::Conditions)
            .values(ValueSweep::Accumulator);
        let space = OperandSpace::new(&desc, ImmediatePolicy::default());
        let points: Vec<_> = space.iter().collect();
        assert_eq!(points.len(), 8 * 7 * 4);
        assert_eq!(points[8].value_index, 1);
        assert_eq!(points[8 * 7].flag_index, 1);
        let state = space.input_state(&points[8 * 7 + 8]);
        assert_eq!(state.regs.f, 0x80);
        assert_eq!(state.regs.a, 0x01);
    }

    #[test]
    fn skipped_encodings_never_appear() {
        let desc = InstructionDescriptor::new("LD r,r'", 0x40)
            .reg8(3)
            .reg8_src(0)
            .skip(&[0x76]);
        let space = OperandSpace::new(&desc, ImmediatePolicy::default());
        let opcodes: Vec<u8> = space
            .iter()
            .map(|a| assembler::opcode_byte(&desc, &a))
            .collect();
        assert_eq!(opcodes.len(), 63);
        assert!(!opcodes.contains(&0x76));
    }

    #[test]
    fn fully_skipped_space_is_empty() {
        let desc = InstructionDescriptor::new("HALT only", 0x76).skip(&[0x76]);
        let space = OperandSpace::new(&desc, ImmediatePolicy::default());
        assert!(space.is_empty());
        assert_eq!(space.iter().count(), 0);
    }

    #[test]
    fn advance_reports_exhaustion_and_rewinds() {
        let desc = InstructionDescriptor::new("JR cc,e", 0x20).cond(3);
        let space = OperandSpace::new(&desc, ImmediatePolicy::default());
        let mut assignment = space.start().expect("non-empty");
        for expected in 1..4 {
            assert!(!space.advance(&mut assignment));
            assert_eq!(assignment.cond, expected);
        }
        assert!(space.advance(&mut assignment));
        assert_eq!(assignment, OperandAssignment::default());
    }
}
