use conformance::assembler::{decode_fields, opcode_byte};
use conformance::{
    assemble, Coverage, ImmWidth, ImmediatePolicy, OpcodeSpace, OperandAssignment, OperandSpace,
    PREFIXED, PRIMARY,
};
use proptest::prelude::*;

fn any_row() -> impl Strategy<Value = usize> {
    0..PRIMARY.len() + PREFIXED.len()
}

fn descriptor(index: usize) -> conformance::InstructionDescriptor {
    PRIMARY.iter().chain(PREFIXED).nth(index).copied().unwrap()
}

proptest! {
    #[test]
    fn assembly_round_trips_fields(index in any_row(), seed in any::<[u8; 5]>(), imm in any::<u16>()) {
        let desc = descriptor(index);
        let mut assignment = OperandAssignment::default();
        if let Some(spec) = desc.reg8 { assignment.reg8 = seed[0] % spec.limit; }
        if let Some(spec) = desc.reg8_src { assignment.reg8_src = seed[1] % spec.limit; }
        if let Some(spec) = desc.reg16 { assignment.reg16 = seed[2] % spec.limit; }
        if let Some(spec) = desc.cond { assignment.cond = seed[3] % spec.limit; }
        if let Some(spec) = desc.bit { assignment.bit = seed[4] % spec.limit; }
        assignment.imm = match desc.imm {
            ImmWidth::None => 0,
            ImmWidth::Byte => imm & 0xFF,
            ImmWidth::Word => imm,
        };

        let bytes = assemble(&desc, &assignment);
        prop_assert_eq!(bytes, assemble(&desc, &assignment));
        prop_assert_eq!(bytes.len(), usize::from(desc.prefixed) + 1 + desc.imm.bytes());
        prop_assert!(bytes.bytes()[bytes.len()..].iter().all(|&b| b == 0));

        let decoded = decode_fields(&desc, &bytes);
        prop_assert_eq!(decoded, assignment);
        prop_assert_eq!(opcode_byte(&desc, &decoded), bytes.as_slice()[usize::from(desc.prefixed)]);
    }

    #[test]
    fn enumeration_is_repeatable(index in any_row()) {
        let desc = descriptor(index);
        let space = OperandSpace::new(&desc, ImmediatePolicy::default());
        // Large spaces are only compared on a prefix.
        let limit = if space.len() <= 1 << 16 { usize::MAX } else { 4096 };
        let first: Vec<_> = space.iter().take(limit).collect();
        let second: Vec<_> = space.iter().take(limit).collect();
        if limit == usize::MAX {
            prop_assert_eq!(first.len() as u64, space.len());
        }
        prop_assert_eq!(first, second);
    }

    #[test]
    fn coverage_is_monotonic_and_bounded(ops in proptest::collection::vec(any::<u8>(), 0..600)) {
        let mut coverage = Coverage::new();
        let mut previous = 0;
        for op in ops {
            coverage.mark(OpcodeSpace::Primary, op);
            let tally = coverage.tally(OpcodeSpace::Primary);
            prop_assert!(tally.tested >= previous);
            prop_assert!(tally.tested <= tally.valid);
            previous = tally.tested;
        }
    }
}

#[test]
fn operand_space_sizes_multiply_out() {
    for desc in PRIMARY.iter().chain(PREFIXED) {
        let space = OperandSpace::new(desc, ImmediatePolicy::default());
        let fields: u64 = desc.fields().map(|(_, spec)| u64::from(spec.limit)).product();
        let imm: u64 = match desc.imm {
            ImmWidth::None => 1,
            ImmWidth::Byte => 256,
            ImmWidth::Word => u64::from(ImmediatePolicy::default().word_count()),
        };
        let sweep = (desc.sweep.flags.len() * desc.sweep.values.len()) as u64;
        let expected = fields * imm * sweep - desc.skip.len() as u64 * imm * sweep;
        assert_eq!(space.len(), expected, "{}", desc.mnemonic);
    }
}
