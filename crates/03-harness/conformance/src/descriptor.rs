//! Static description of one instruction family and its operand space.

use model_abi::ArchState;
use serde::Serialize;
use thiserror::Error;

/// Sample values used by the accumulator and register sweeps.
pub const VALUE_SAMPLES: [u8; 7] = [0x00, 0x01, 0x0F, 0x10, 0x7F, 0x80, 0xFF];

/// `F` values covering every `Z`/`C` combination.
pub const CONDITION_FLAGS: [u8; 4] = [0x00, 0x80, 0x10, 0x90];

/// Operand kinds that can be encoded into the opcode byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FieldKind {
    /// Primary 8-bit register selector (`B C D E H L (HL) A`).
    Reg8,
    /// Secondary 8-bit register selector, the source of `LD r,r'`.
    Reg8Src,
    /// Register pair selector.
    Reg16,
    /// Branch condition selector (`NZ Z NC C`).
    Cond,
    /// Bit index or restart vector index.
    Bit,
}

impl FieldKind {
    /// Enumeration order, innermost first.
    pub const ODOMETER: [FieldKind; 5] = [
        FieldKind::Bit,
        FieldKind::Cond,
        FieldKind::Reg16,
        FieldKind::Reg8Src,
        FieldKind::Reg8,
    ];

    /// Number of opcode bits the field occupies.
    pub const fn width(self) -> u8 {
        match self {
            FieldKind::Reg8 | FieldKind::Reg8Src | FieldKind::Bit => 3,
            FieldKind::Reg16 | FieldKind::Cond => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::Reg8 => "r8",
            FieldKind::Reg8Src => "r8'",
            FieldKind::Reg16 => "r16",
            FieldKind::Cond => "cond",
            FieldKind::Bit => "bit",
        }
    }
}

/// Position and value range of an encoded operand field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FieldSpec {
    /// Bit position of the field's least significant bit.
    pub shift: u8,
    /// Number of values the field takes, `0..limit`.
    pub limit: u8,
}

impl FieldSpec {
    pub const fn new(shift: u8, limit: u8) -> Self {
        Self { shift, limit }
    }

    /// Field mask for a field of `width` bits, widened so bits past the opcode
    /// byte stay visible.
    pub const fn mask(self, width: u8) -> u32 {
        ((1u32 << width) - 1) << self.shift
    }
}

/// Width of the immediate operand following the opcode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ImmWidth {
    #[default]
    None,
    Byte,
    Word,
}

impl ImmWidth {
    pub const fn bytes(self) -> usize {
        match self {
            ImmWidth::None => 0,
            ImmWidth::Byte => 1,
            ImmWidth::Word => 2,
        }
    }
}

/// Flag states each operand combination is run against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum FlagSweep {
    /// `F = 0` only.
    #[default]
    Canonical,
    /// Every `Z`/`C` combination, so each condition is both met and unmet.
    Conditions,
    /// All sixteen flag nibbles.
    All,
}

impl FlagSweep {
    pub const fn len(self) -> usize {
        match self {
            FlagSweep::Canonical => 1,
            FlagSweep::Conditions => CONDITION_FLAGS.len(),
            FlagSweep::All => 16,
        }
    }

    /// `F` value for sweep position `index`.
    pub fn flags(self, index: usize) -> u8 {
        match self {
            FlagSweep::Canonical => 0,
            FlagSweep::Conditions => CONDITION_FLAGS[index % CONDITION_FLAGS.len()],
            FlagSweep::All => ((index & 0x0F) as u8) << 4,
        }
    }
}

/// Register contents each operand combination is run against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ValueSweep {
    /// All registers zero.
    #[default]
    Canonical,
    /// `A` over [`VALUE_SAMPLES`].
    Accumulator,
    /// `A` over every byte value.
    AccumulatorExhaustive,
    /// `A` over [`VALUE_SAMPLES`]; as the outer digit every other register is
    /// set to one sample `v`, with `SP = v:v`.
    All,
}

impl ValueSweep {
    pub const fn len(self) -> usize {
        match self {
            ValueSweep::Canonical => 1,
            ValueSweep::Accumulator => VALUE_SAMPLES.len(),
            ValueSweep::AccumulatorExhaustive => 256,
            ValueSweep::All => VALUE_SAMPLES.len() * VALUE_SAMPLES.len(),
        }
    }

    /// Loads sweep position `index` into `state`.
    pub fn apply(self, index: usize, state: &mut ArchState) {
        let samples = VALUE_SAMPLES.len();
        match self {
            ValueSweep::Canonical => {}
            ValueSweep::Accumulator => state.regs.a = VALUE_SAMPLES[index % samples],
            ValueSweep::AccumulatorExhaustive => state.regs.a = index as u8,
            ValueSweep::All => {
                let v = VALUE_SAMPLES[(index / samples) % samples];
                let regs = &mut state.regs;
                regs.a = VALUE_SAMPLES[index % samples];
                regs.b = v;
                regs.c = v;
                regs.d = v;
                regs.e = v;
                regs.h = v;
                regs.l = v;
                state.sp = u16::from_be_bytes([v, v]);
            }
        }
    }
}

/// Input states swept for every operand combination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct InputSweep {
    pub flags: FlagSweep,
    pub values: ValueSweep,
}

/// One row of an instruction table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct InstructionDescriptor {
    pub mnemonic: &'static str,
    /// Opcode with every operand field zero.
    pub opcode: u8,
    /// Encoded behind the `0xCB` prefix.
    pub prefixed: bool,
    pub reg8: Option<FieldSpec>,
    pub reg8_src: Option<FieldSpec>,
    pub reg16: Option<FieldSpec>,
    pub cond: Option<FieldSpec>,
    pub bit: Option<FieldSpec>,
    pub imm: ImmWidth,
    pub sweep: InputSweep,
    /// Opcode bytes inside the field space that belong to another instruction.
    pub skip: &'static [u8],
    pub enabled: bool,
}

/// Table validation failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("{mnemonic}: {field} field has an empty range")]
    EmptyField {
        mnemonic: &'static str,
        field: &'static str,
    },

    #[error("{mnemonic}: {field} limit {limit} does not fit in {width} bits")]
    LimitTooWide {
        mnemonic: &'static str,
        field: &'static str,
        limit: u8,
        width: u8,
    },

    #[error("{mnemonic}: {field} field extends past bit 7")]
    OutOfByte {
        mnemonic: &'static str,
        field: &'static str,
    },

    #[error("{mnemonic}: {field} field overlaps {other}")]
    Overlap {
        mnemonic: &'static str,
        field: &'static str,
        other: &'static str,
    },

    #[error("{mnemonic}: {field} field overlaps set bits of base opcode {opcode:#04x}")]
    OverlapsOpcode {
        mnemonic: &'static str,
        field: &'static str,
        opcode: u8,
    },
}

impl InstructionDescriptor {
    /// Descriptor with no operand fields, no immediate and the canonical sweep.
    pub const fn new(mnemonic: &'static str, opcode: u8) -> Self {
        Self {
            mnemonic,
            opcode,
            prefixed: false,
            reg8: None,
            reg8_src: None,
            reg16: None,
            cond: None,
            bit: None,
            imm: ImmWidth::None,
            sweep: InputSweep {
                flags: FlagSweep::Canonical,
                values: ValueSweep::Canonical,
            },
            skip: &[],
            enabled: true,
        }
    }

    pub const fn prefixed(self) -> Self {
        Self {
            prefixed: true,
            ..self
        }
    }

    pub const fn reg8(self, shift: u8) -> Self {
        Self {
            reg8: Some(FieldSpec::new(shift, 8)),
            ..self
        }
    }

    pub const fn reg8_src(self, shift: u8) -> Self {
        Self {
            reg8_src: Some(FieldSpec::new(shift, 8)),
            ..self
        }
    }

    pub const fn reg16(self, shift: u8, limit: u8) -> Self {
        Self {
            reg16: Some(FieldSpec::new(shift, limit)),
            ..self
        }
    }

    pub const fn cond(self, shift: u8) -> Self {
        Self {
            cond: Some(FieldSpec::new(shift, 4)),
            ..self
        }
    }

    pub const fn bit(self, shift: u8) -> Self {
        Self {
            bit: Some(FieldSpec::new(shift, 8)),
            ..self
        }
    }

    pub const fn imm8(self) -> Self {
        Self {
            imm: ImmWidth::Byte,
            ..self
        }
    }

    pub const fn imm16(self) -> Self {
        Self {
            imm: ImmWidth::Word,
            ..self
        }
    }

    pub const fn flags(self, flags: FlagSweep) -> Self {
        Self {
            sweep: InputSweep {
                flags,
                values: self.sweep.values,
            },
            ..self
        }
    }

    pub const fn values(self, values: ValueSweep) -> Self {
        Self {
            sweep: InputSweep {
                flags: self.sweep.flags,
                values,
            },
            ..self
        }
    }

    pub const fn skip(self, skip: &'static [u8]) -> Self {
        Self { skip, ..self }
    }

    pub const fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }

    /// Returns the spec of `kind`, if the descriptor has that field.
    pub fn field(&self, kind: FieldKind) -> Option<FieldSpec> {
        match kind {
            FieldKind::Reg8 => self.reg8,
            FieldKind::Reg8Src => self.reg8_src,
            FieldKind::Reg16 => self.reg16,
            FieldKind::Cond => self.cond,
            FieldKind::Bit => self.bit,
        }
    }

    /// Present fields in odometer order, innermost first.
    pub fn fields(&self) -> impl Iterator<Item = (FieldKind, FieldSpec)> + '_ {
        FieldKind::ODOMETER
            .into_iter()
            .filter_map(|kind| self.field(kind).map(|spec| (kind, spec)))
    }

    /// Checks the field layout against the opcode byte.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mnemonic = self.mnemonic;
        let mut claimed: Vec<(&'static str, u32)> = Vec::with_capacity(5);
        for (kind, spec) in self.fields() {
            let field = kind.name();
            let width = kind.width();
            if spec.limit == 0 {
                return Err(DescriptorError::EmptyField { mnemonic, field });
            }
            if u32::from(spec.limit) > 1u32 << width {
                return Err(DescriptorError::LimitTooWide {
                    mnemonic,
                    field,
                    limit: spec.limit,
                    width,
                });
            }
            let mask = spec.mask(width);
            if u32::from(spec.shift) + u32::from(width) > 8 {
                return Err(DescriptorError::OutOfByte { mnemonic, field });
            }
            if mask & u32::from(self.opcode) != 0 {
                return Err(DescriptorError::OverlapsOpcode {
                    mnemonic,
                    field,
                    opcode: self.opcode,
                });
            }
            if let Some(&(other, _)) = claimed.iter().find(|(_, bits)| bits & mask != 0) {
                return Err(DescriptorError::Overlap {
                    mnemonic,
                    field,
                    other,
                });
            }
            claimed.push((field, mask));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let desc = InstructionDescriptor::new("LD r,r'", 0x40)
            .reg8(3)
            .reg8_src(0)
            .skip(&[0x76])
            .values(ValueSweep::All);
        assert_eq!(desc.reg8, Some(FieldSpec::new(3, 8)));
        assert_eq!(desc.reg8_src, Some(FieldSpec::new(0, 8)));
        assert_eq!(desc.sweep.flags, FlagSweep::Canonical);
        assert_eq!(desc.sweep.values, ValueSweep::All);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let desc = InstructionDescriptor::new("bad", 0x00).reg8(3).bit(4);
        assert_eq!(
            desc.validate(),
            Err(DescriptorError::Overlap {
                mnemonic: "bad",
                field: "r8",
                other: "bit",
            })
        );
    }

    #[test]
    fn field_over_base_bits_is_rejected() {
        let desc = InstructionDescriptor::new("bad", 0x08).reg8(3);
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::OverlapsOpcode { opcode: 0x08, .. })
        ));
    }

    #[test]
    fn field_past_bit_seven_is_rejected() {
        let desc = InstructionDescriptor::new("bad", 0x00).reg8(6);
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::OutOfByte { field: "r8", .. })
        ));
    }

    #[test]
    fn limit_must_fit_width() {
        let desc = InstructionDescriptor::new("bad", 0x00).reg16(4, 5);
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::LimitTooWide { limit: 5, width: 2, .. })
        ));
        let empty = InstructionDescriptor::new("bad", 0x00).reg16(4, 0);
        assert!(matches!(
            empty.validate(),
            Err(DescriptorError::EmptyField { .. })
        ));
    }

    #[test]
    fn all_value_sweep_sets_outer_digit_everywhere() {
        let mut state = ArchState::canonical();
        ValueSweep::All.apply(VALUE_SAMPLES.len() + 2, &mut state);
        assert_eq!(state.regs.a, 0x0F);
        assert_eq!(state.regs.b, 0x01);
        assert_eq!(state.regs.l, 0x01);
        assert_eq!(state.sp, 0x0101);
        assert_eq!(state.regs.f, 0);
    }
}
