use model_abi::{ArchState, BusLog, BusSignals, ClockedDevice, Registers};

use crate::alu::{self, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use crate::microcode::{
    self, AddrSel, Commit, DataSel, Latch, Operand, Pair, Plan, Uop, SLOT_A, SLOT_F,
};

/// Rising edges allowed between retirements before the model gives up.
pub const WATCHDOG_CYCLES: u32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    /// Next edge issues the first opcode fetch.
    Reset,
    Running,
    /// Parked by `HALT` or `STOP`; no further fetches.
    Halted,
}

/// What the byte on the read-data bus will be latched into at the next edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Opcode,
    Prefixed,
    Latch(Latch),
}

/// Clock-edge evaluated SM83.
///
/// Each rising edge performs one bus cycle: latch the data requested by the
/// previous cycle, then present the next address. The first edge after reset
/// issues the opcode fetch; the retiring edge commits the instruction and
/// overlaps the fetch of the next one.
#[derive(Clone, Debug)]
pub struct RtlCpu {
    // Ports.
    clk: bool,
    prev_clk: bool,
    addr: u16,
    write_enable: bool,
    write_data: u8,
    data_in: u8,
    retired: bool,
    finished: bool,

    // Architectural registers.
    rf: [u8; 8],
    sp: u16,
    pc: u16,
    ime: bool,
    halted: bool,

    // Sequencer.
    stage: Stage,
    pending: Option<Pending>,
    plan: Plan,
    cursor: usize,
    commit: Commit,
    cb: u8,
    z: u8,
    w: u8,
    watchdog: u32,
}

impl Default for RtlCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl RtlCpu {
    pub fn new() -> Self {
        Self {
            clk: false,
            prev_clk: false,
            addr: 0,
            write_enable: false,
            write_data: 0,
            data_in: 0,
            retired: false,
            finished: false,
            rf: [0; 8],
            sp: 0,
            pc: 0,
            ime: false,
            halted: false,
            stage: Stage::Reset,
            pending: None,
            plan: Plan::new(),
            cursor: 0,
            commit: Commit::None,
            cb: 0,
            z: 0,
            w: 0,
            watchdog: 0,
        }
    }

    fn pair(&self, pair: Pair) -> u16 {
        match pair.slots() {
            Some((hi, lo)) => u16::from_be_bytes([self.rf[usize::from(hi)], self.rf[usize::from(lo)]]),
            None => self.sp,
        }
    }

    fn set_pair(&mut self, pair: Pair, value: u16) {
        let [hi_value, lo_value] = value.to_be_bytes();
        match pair.slots() {
            Some((hi, lo)) => {
                self.rf[usize::from(hi)] = hi_value;
                self.rf[usize::from(lo)] = if lo == SLOT_F { lo_value & 0xF0 } else { lo_value };
            }
            None => self.sp = value,
        }
    }

    fn flags(&self) -> u8 {
        self.rf[usize::from(SLOT_F)]
    }

    fn set_flags(&mut self, value: u8) {
        self.rf[usize::from(SLOT_F)] = value & 0xF0;
    }

    fn slot(&self, slot: u8) -> u8 {
        self.rf[usize::from(slot & 0x07)]
    }

    fn set_slot(&mut self, slot: u8, value: u8) {
        self.rf[usize::from(slot & 0x07)] = value;
    }

    fn wz(&self) -> u16 {
        u16::from_be_bytes([self.w, self.z])
    }

    fn operand(&self, operand: Operand) -> u8 {
        match operand {
            Operand::Slot(slot) => self.slot(slot),
            Operand::Z => self.z,
        }
    }

    fn rising_edge(&mut self) {
        self.retired = false;
        self.write_enable = false;
        if self.finished {
            return;
        }

        self.watchdog += 1;
        if self.watchdog > WATCHDOG_CYCLES {
            log::debug!("watchdog expired at pc={:#06x}", self.pc);
            self.finished = true;
            return;
        }

        match self.stage {
            Stage::Reset => {
                self.stage = Stage::Running;
                self.present_read(self.pc, Pending::Opcode);
                return;
            }
            Stage::Halted => return,
            Stage::Running => {}
        }

        match self.pending.take() {
            Some(Pending::Opcode) => {
                self.pc = self.pc.wrapping_add(1);
                self.begin(self.data_in);
                return;
            }
            Some(Pending::Prefixed) => {
                self.pc = self.pc.wrapping_add(1);
                self.cb = self.data_in;
                let decoded = microcode::decode_prefixed(self.cb);
                self.load_plan(decoded.plan, decoded.commit);
                return;
            }
            Some(Pending::Latch(Latch::Z)) => self.z = self.data_in,
            Some(Pending::Latch(Latch::W)) => self.w = self.data_in,
            None => {}
        }
        self.advance();
    }

    fn begin(&mut self, opcode: u8) {
        if opcode == 0xCB {
            self.present_read(self.pc, Pending::Prefixed);
            return;
        }
        match microcode::decode(opcode, self.flags()) {
            Some(decoded) => {
                log::trace!("decode {opcode:#04x} pc={:#06x} plan={:?}", self.pc, decoded.plan);
                self.load_plan(decoded.plan, decoded.commit);
            }
            None => {
                log::debug!("illegal opcode {opcode:#04x}, finishing");
                self.finished = true;
            }
        }
    }

    fn load_plan(&mut self, plan: Plan, commit: Commit) {
        self.plan = plan;
        self.cursor = 0;
        self.commit = commit;
        self.advance();
    }

    /// Issues the next micro-op, or retires when the plan has drained.
    fn advance(&mut self) {
        match self.plan.get(self.cursor).copied() {
            Some(uop) => {
                self.cursor += 1;
                self.issue(uop);
            }
            None => self.retire(),
        }
    }

    fn retire(&mut self) {
        let commit = std::mem::replace(&mut self.commit, Commit::None);
        self.apply(commit);
        self.plan.clear();
        self.cursor = 0;
        self.retired = true;
        self.watchdog = 0;
        if self.halted {
            self.stage = Stage::Halted;
        } else {
            self.present_read(self.pc, Pending::Opcode);
        }
    }

    fn present_read(&mut self, addr: u16, pending: Pending) {
        self.addr = addr;
        self.pending = Some(pending);
    }

    fn resolve(&mut self, sel: AddrSel) -> u16 {
        match sel {
            AddrSel::Hl => self.pair(Pair::Hl),
            AddrSel::Bc => self.pair(Pair::Bc),
            AddrSel::De => self.pair(Pair::De),
            AddrSel::Wz => self.wz(),
            AddrSel::WzNext => self.wz().wrapping_add(1),
            AddrSel::HighZ => 0xFF00 | u16::from(self.z),
            AddrSel::HighC => 0xFF00 | u16::from(self.slot(1)),
            AddrSel::Pop => {
                let addr = self.sp;
                self.sp = self.sp.wrapping_add(1);
                addr
            }
            AddrSel::Push => {
                self.sp = self.sp.wrapping_sub(1);
                self.sp
            }
        }
    }

    fn data(&self, sel: DataSel) -> u8 {
        let [pc_high, pc_low] = self.pc.to_be_bytes();
        let [sp_high, sp_low] = self.sp.to_be_bytes();
        match sel {
            DataSel::Slot(slot) => self.slot(slot),
            DataSel::Z => self.z,
            DataSel::PcHigh => pc_high,
            DataSel::PcLow => pc_low,
            DataSel::SpLow => sp_low,
            DataSel::SpHigh => sp_high,
            DataSel::StepZ { decrement } => alu::step8(self.z, decrement, 0).0,
            DataSel::Prefixed => self.prefixed_result(self.z).0,
        }
    }

    /// Result and flags of the current CB operation applied to `value`.
    fn prefixed_result(&self, value: u8) -> (u8, u8) {
        let y = (self.cb >> 3) & 0x07;
        match self.cb >> 6 {
            0 => alu::shift(y, value, self.flags()),
            1 => (value, alu::test_bit(y, value, self.flags())),
            2 => (value & !(1 << y), self.flags()),
            _ => (value | (1 << y), self.flags()),
        }
    }

    fn issue(&mut self, uop: Uop) {
        match uop {
            Uop::Immediate(latch) => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                self.present_read(addr, Pending::Latch(latch));
            }
            Uop::Read(sel, latch) => {
                let addr = self.resolve(sel);
                self.present_read(addr, Pending::Latch(latch));
            }
            Uop::Write(sel, data) => {
                let value = self.data(data);
                self.addr = self.resolve(sel);
                self.write_data = value;
                self.write_enable = true;
            }
            Uop::Idle => {}
        }
    }

    fn apply(&mut self, commit: Commit) {
        let f = self.flags();
        match commit {
            Commit::None => {}
            Commit::Copy { dst, src } => self.set_slot(dst, self.slot(src)),
            Commit::LoadZ(slot) => self.set_slot(slot, self.z),
            Commit::LoadWz(pair) => self.set_pair(pair, self.wz()),
            Commit::StepPair { pair, decrement } => {
                let value = self.pair(pair);
                let next = if decrement {
                    value.wrapping_sub(1)
                } else {
                    value.wrapping_add(1)
                };
                self.set_pair(pair, next);
            }
            Commit::StepSlot { slot, decrement } => {
                let (value, flags) = alu::step8(self.slot(slot), decrement, f);
                self.set_slot(slot, value);
                self.set_flags(flags);
            }
            Commit::StepMemoryFlags { decrement } => {
                let (_, flags) = alu::step8(self.z, decrement, f);
                self.set_flags(flags);
            }
            Commit::AddHl(pair) => {
                let (value, flags) = alu::add16(self.pair(Pair::Hl), self.pair(pair), f);
                self.set_pair(Pair::Hl, value);
                self.set_flags(flags);
            }
            Commit::Alu { select, operand } => {
                let (value, flags) = alu::alu8(select, self.slot(SLOT_A), self.operand(operand), f);
                self.set_slot(SLOT_A, value);
                self.set_flags(flags);
            }
            Commit::RotateA(select) => {
                let (value, flags) = alu::shift(select, self.slot(SLOT_A), f);
                self.set_slot(SLOT_A, value);
                self.set_flags(flags & FLAG_C);
            }
            Commit::Daa => {
                let (value, flags) = alu::daa(self.slot(SLOT_A), f);
                self.set_slot(SLOT_A, value);
                self.set_flags(flags);
            }
            Commit::Cpl => {
                self.set_slot(SLOT_A, !self.slot(SLOT_A));
                self.set_flags(f | FLAG_N | FLAG_H);
            }
            Commit::Scf => self.set_flags((f & FLAG_Z) | FLAG_C),
            Commit::Ccf => self.set_flags((f & FLAG_Z) | ((f ^ FLAG_C) & FLAG_C)),
            Commit::Halt => self.halted = true,
            Commit::SetIme(enabled) => self.ime = enabled,
            Commit::JumpWz { enable_interrupts } => {
                self.pc = self.wz();
                if enable_interrupts {
                    self.ime = true;
                }
            }
            Commit::JumpHl => self.pc = self.pair(Pair::Hl),
            Commit::JumpRelative => {
                self.pc = self.pc.wrapping_add(i16::from(self.z as i8) as u16);
            }
            Commit::Vector(index) => self.pc = u16::from(index) << 3,
            Commit::AddSp => {
                let (value, flags) = alu::offset_sp(self.sp, self.z);
                self.sp = value;
                self.set_flags(flags);
            }
            Commit::LdHlSpOffset => {
                let (value, flags) = alu::offset_sp(self.sp, self.z);
                self.set_pair(Pair::Hl, value);
                self.set_flags(flags);
            }
            Commit::LdSpHl => self.sp = self.pair(Pair::Hl),
            Commit::HlPost { load_a, decrement } => {
                if load_a {
                    self.set_slot(SLOT_A, self.z);
                }
                let hl = self.pair(Pair::Hl);
                let next = if decrement {
                    hl.wrapping_sub(1)
                } else {
                    hl.wrapping_add(1)
                };
                self.set_pair(Pair::Hl, next);
            }
            Commit::Shift { select, slot } => {
                let (value, flags) = alu::shift(select, self.slot(slot), f);
                self.set_slot(slot, value);
                self.set_flags(flags);
            }
            Commit::ShiftMemoryFlags(select) => {
                let (_, flags) = alu::shift(select, self.z, f);
                self.set_flags(flags);
            }
            Commit::Bit { bit, operand } => {
                let flags = alu::test_bit(bit, self.operand(operand), f);
                self.set_flags(flags);
            }
            Commit::Res { bit, slot } => self.set_slot(slot, self.slot(slot) & !(1 << bit)),
            Commit::Set { bit, slot } => self.set_slot(slot, self.slot(slot) | (1 << bit)),
        }
    }
}

impl ClockedDevice for RtlCpu {
    fn reset(&mut self, state: &ArchState) {
        let regs = &state.regs;
        *self = Self::new();
        self.rf = [regs.b, regs.c, regs.d, regs.e, regs.h, regs.l, regs.f & 0xF0, regs.a];
        self.sp = state.sp;
        self.pc = state.pc;
        self.ime = state.ime;
    }

    fn set_clock(&mut self, high: bool) {
        self.clk = high;
    }

    fn clock(&self) -> bool {
        self.clk
    }

    fn eval(&mut self) {
        if self.clk && !self.prev_clk {
            self.rising_edge();
        }
        self.prev_clk = self.clk;
    }

    fn signals(&self) -> BusSignals {
        BusSignals {
            addr: self.addr,
            write_enable: self.write_enable,
            write_data: self.write_data,
            instruction_retired: self.retired,
            finished: self.finished,
        }
    }

    fn supply_read(&mut self, value: u8) {
        self.data_in = value;
    }

    fn state(&self) -> ArchState {
        let rf = &self.rf;
        ArchState {
            regs: Registers {
                a: rf[usize::from(SLOT_A)],
                f: rf[usize::from(SLOT_F)],
                b: rf[0],
                c: rf[1],
                d: rf[2],
                e: rf[3],
                h: rf[4],
                l: rf[5],
            },
            pc: self.pc,
            sp: self.sp,
            halted: self.halted,
            ime: self.ime,
            bus: BusLog::new(),
        }
    }
}
