use anyhow::{bail, Result};
use model_abi::{ArchState, BusAccess, ClockedDevice, InstructionWindow, OPEN_BUS};
use pretty_assertions::assert_eq;
use rtl_cpu::{RtlCpu, WATCHDOG_CYCLES};

/// Minimal clock loop: toggles, evaluates and serves the window on the high
/// phase until the device retires.
fn clock_one(
    cpu: &mut RtlCpu,
    window: &InstructionWindow,
    writes: &mut Vec<BusAccess>,
) -> Result<u32> {
    let mut rising = 0;
    loop {
        let high = !cpu.clock();
        cpu.set_clock(high);
        cpu.eval();
        let signals = cpu.signals();
        if signals.finished {
            bail!("finished after {rising} cycles");
        }
        if !high {
            continue;
        }
        rising += 1;
        cpu.supply_read(window.peek(signals.addr));
        if signals.write_enable {
            writes.push(BusAccess::write(signals.addr, signals.write_data));
        }
        if signals.instruction_retired {
            return Ok(rising);
        }
    }
}

fn run(bytes: [u8; 4], start: &ArchState) -> Result<(ArchState, Vec<BusAccess>, u32)> {
    let mut cpu = RtlCpu::new();
    cpu.reset(start);
    let mut writes = Vec::new();
    let cycles = clock_one(&mut cpu, &InstructionWindow::new(bytes), &mut writes)?;
    Ok((cpu.state(), writes, cycles))
}

#[test]
fn nop_retires_after_fetch_and_decode() -> Result<()> {
    let (state, writes, cycles) = run([0x00, 0, 0, 0], &ArchState::canonical())?;
    assert_eq!(cycles, 2);
    assert_eq!(state.pc, 1);
    assert!(writes.is_empty());
    Ok(())
}

#[test]
fn call_pushes_return_address_high_first() -> Result<()> {
    let (state, writes, _) = run([0xCD, 0x34, 0x12, 0x00], &ArchState::canonical())?;
    assert_eq!(state.pc, 0x1234);
    assert_eq!(state.sp, 0xFFFE);
    assert_eq!(
        writes,
        vec![BusAccess::write(0xFFFF, 0x00), BusAccess::write(0xFFFE, 0x03)]
    );
    Ok(())
}

#[test]
fn ld_a16_sp_stores_low_byte_first() -> Result<()> {
    let mut start = ArchState::canonical();
    start.sp = 0xBEEF;
    let (_, writes, _) = run([0x08, 0xFF, 0xFF, 0x00], &start)?;
    assert_eq!(
        writes,
        vec![BusAccess::write(0xFFFF, 0xEF), BusAccess::write(0x0000, 0xBE)]
    );
    Ok(())
}

#[test]
fn inc_hl_writes_incremented_open_bus() -> Result<()> {
    let mut start = ArchState::canonical();
    start.regs.h = 0x80;
    let (state, writes, _) = run([0x34, 0, 0, 0], &start)?;
    assert_eq!(writes, vec![BusAccess::write(0x8000, OPEN_BUS.wrapping_add(1))]);
    assert_eq!(state.regs.f, 0x00);
    Ok(())
}

#[test]
fn prefixed_swap_on_register() -> Result<()> {
    let mut start = ArchState::canonical();
    start.regs.a = 0x12;
    start.regs.f = 0x10;
    let (state, _, _) = run([0xCB, 0x37, 0, 0], &start)?;
    assert_eq!(state.regs.a, 0x21);
    assert_eq!(state.regs.f, 0x00);
    assert_eq!(state.pc, 2);
    Ok(())
}

#[test]
fn pop_af_masks_flag_nibble() -> Result<()> {
    let mut start = ArchState::canonical();
    start.sp = 0x1000;
    let (state, _, _) = run([0xF1, 0, 0, 0], &start)?;
    assert_eq!(state.regs.a, OPEN_BUS);
    assert_eq!(state.regs.f, OPEN_BUS & 0xF0);
    assert_eq!(state.sp, 0x1002);
    Ok(())
}

#[test]
fn halt_parks_the_sequencer() -> Result<()> {
    let mut cpu = RtlCpu::new();
    cpu.reset(&ArchState::canonical());
    let window = InstructionWindow::new([0x76, 0, 0, 0]);
    let mut writes = Vec::new();
    clock_one(&mut cpu, &window, &mut writes)?;
    assert!(cpu.state().halted);
    assert_eq!(cpu.state().pc, 1);
    // A halted device never retires again; the watchdog ends the simulation.
    assert!(clock_one(&mut cpu, &window, &mut writes).is_err());
    Ok(())
}

#[test]
fn illegal_opcode_finishes_the_simulation() {
    let mut cpu = RtlCpu::new();
    cpu.reset(&ArchState::canonical());
    let mut writes = Vec::new();
    let err = clock_one(&mut cpu, &InstructionWindow::new([0xD3, 0, 0, 0]), &mut writes)
        .unwrap_err();
    assert_eq!(err.to_string(), "finished after 1 cycles");
}

#[test]
fn watchdog_bound_exceeds_longest_instruction() -> Result<()> {
    // CALL a16 is the longest plan.
    let (_, _, cycles) = run([0xCD, 0, 0, 0], &ArchState::canonical())?;
    assert!(cycles < WATCHDOG_CYCLES);
    Ok(())
}

#[test]
fn reset_clears_halt_and_pending_fetch() -> Result<()> {
    let mut cpu = RtlCpu::new();
    let mut start = ArchState::canonical();
    start.halted = true;
    start.regs.b = 7;
    cpu.reset(&start);
    assert!(!cpu.state().halted);
    assert!(!cpu.clock());
    // INC B
    let mut writes = Vec::new();
    clock_one(&mut cpu, &InstructionWindow::new([0x04, 0, 0, 0]), &mut writes)?;
    assert_eq!(cpu.state().regs.b, 8);
    Ok(())
}
