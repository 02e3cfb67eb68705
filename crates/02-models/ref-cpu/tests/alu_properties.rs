use anyhow::Result;
use model_abi::{ArchState, Flags, InstructionWindow, ReferenceModel};
use proptest::prelude::*;
use ref_cpu::RefCpu;

fn run_one(bytes: [u8; 4], setup: impl FnOnce(&mut ArchState)) -> Result<ArchState> {
    let mut start = ArchState::canonical();
    setup(&mut start);
    let mut cpu = RefCpu::new();
    cpu.reset(&start, InstructionWindow::new(bytes));
    cpu.step()?;
    Ok(cpu.state())
}

proptest! {
    #[test]
    fn adc_matches_wide_addition(a in any::<u8>(), b in any::<u8>(), carry in any::<bool>()) {
        // ADC A,B
        let state = run_one([0x88, 0, 0, 0], |s| {
            s.regs.a = a;
            s.regs.b = b;
            s.regs.f = if carry { 0x10 } else { 0x00 };
        }).unwrap();
        let cin = u16::from(carry);
        let wide = u16::from(a) + u16::from(b) + cin;
        let flags = Flags::from_byte(state.regs.f);
        prop_assert_eq!(state.regs.a, wide as u8);
        prop_assert_eq!(flags.z(), wide as u8 == 0);
        prop_assert!(!flags.n());
        prop_assert_eq!(flags.h(), u16::from(a & 0x0F) + u16::from(b & 0x0F) + cin > 0x0F);
        prop_assert_eq!(flags.c(), wide > 0xFF);
    }

    #[test]
    fn sbc_matches_wide_subtraction(a in any::<u8>(), b in any::<u8>(), carry in any::<bool>()) {
        // SBC A,B
        let state = run_one([0x98, 0, 0, 0], |s| {
            s.regs.a = a;
            s.regs.b = b;
            s.regs.f = if carry { 0x10 } else { 0x00 };
        }).unwrap();
        let cin = i16::from(carry);
        let wide = i16::from(a) - i16::from(b) - cin;
        let flags = Flags::from_byte(state.regs.f);
        prop_assert_eq!(state.regs.a, wide as u8);
        prop_assert!(flags.n());
        prop_assert_eq!(flags.h(), i16::from(a & 0x0F) - i16::from(b & 0x0F) - cin < 0);
        prop_assert_eq!(flags.c(), wide < 0);
    }

    #[test]
    fn add_sp_flags_come_from_low_byte(sp in any::<u16>(), offset in any::<u8>()) {
        // ADD SP,e8
        let state = run_one([0xE8, offset, 0, 0], |s| s.sp = sp).unwrap();
        let flags = Flags::from_byte(state.regs.f);
        let low = u16::from(sp as u8);
        prop_assert_eq!(state.sp, sp.wrapping_add(offset as i8 as u16));
        prop_assert_eq!(flags.h(), (low & 0x0F) + u16::from(offset & 0x0F) > 0x0F);
        prop_assert_eq!(flags.c(), low + u16::from(offset) > 0xFF);
        prop_assert!(!flags.z());
    }
}

#[test]
fn daa_corrects_packed_bcd_addition() -> Result<()> {
    // 0x19 + 0x28 = 0x41 binary, 47 decimal.
    let sum = run_one([0x80, 0, 0, 0], |s| {
        s.regs.a = 0x19;
        s.regs.b = 0x28;
    })?;
    let adjusted = run_one([0x27, 0, 0, 0], |s| {
        s.regs.a = sum.regs.a;
        s.regs.f = sum.regs.f;
    })?;
    assert_eq!(adjusted.regs.a, 0x47);
    assert!(!Flags::from_byte(adjusted.regs.f).c());
    Ok(())
}

#[test]
fn pop_af_discards_low_flag_bits() -> Result<()> {
    let state = run_one([0xF1, 0, 0, 0], |s| s.sp = 0x0001)?;
    // Bytes at 1 and 2 are the padding zeros.
    assert_eq!(state.regs.a, 0x00);
    assert_eq!(state.regs.f, 0x00);
    let state = run_one([0xF1, 0, 0, 0], |s| s.sp = 0x0100)?;
    assert_eq!(state.regs.a, 0xAA);
    assert_eq!(state.regs.f, 0xA0);
    Ok(())
}

#[test]
fn bit_preserves_carry_and_sets_half() -> Result<()> {
    // BIT 7,A
    let state = run_one([0xCB, 0x7F, 0, 0], |s| {
        s.regs.a = 0x7F;
        s.regs.f = 0x10;
    })?;
    assert_eq!(state.regs.f, 0xB0);
    assert_eq!(state.pc, 2);
    Ok(())
}
