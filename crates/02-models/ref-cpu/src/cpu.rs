use model_abi::{Flags, Registers};

use crate::bus::Bus;

/// CPU register file and execution state.
#[derive(Clone, Debug, Default)]
pub struct Cpu {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub ime: bool,
    pub halted: bool,
}

impl Cpu {
    /// Creates a CPU with every register cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the register file from a snapshot.
    pub fn load_registers(&mut self, regs: &Registers) {
        self.a = regs.a;
        self.f = Flags::from_byte(regs.f);
        self.b = regs.b;
        self.c = regs.c;
        self.d = regs.d;
        self.e = regs.e;
        self.h = regs.h;
        self.l = regs.l;
    }

    /// Captures the register file.
    pub fn registers(&self) -> Registers {
        Registers {
            a: self.a,
            f: self.f.to_byte(),
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            h: self.h,
            l: self.l,
        }
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f.to_byte()])
    }

    /// Sets `AF`; the low nibble of `F` is not writable.
    #[inline]
    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        self.f = Flags::from_byte(f & 0xF0);
    }

    /// Reads the next byte and advances the program counter.
    pub fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let byte = bus.read8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// Reads the next two bytes as a little-endian 16-bit value.
    pub fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Pushes a 16-bit value, high byte first.
    pub fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.sp = self.sp.wrapping_sub(1);
        bus.write8(self.sp, hi);
        self.sp = self.sp.wrapping_sub(1);
        bus.write8(self.sp, lo);
    }

    /// Pops a 16-bit value from the stack.
    pub fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.read8(self.sp);
        self.sp = self.sp.wrapping_add(1);
        let hi = bus.read8(self.sp);
        self.sp = self.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ProbeBus;
    use model_abi::{BusAccess, InstructionWindow};

    #[test]
    fn push_writes_high_byte_first() {
        let mut cpu = Cpu::new();
        let mut bus = ProbeBus::new(InstructionWindow::default());
        cpu.push16(&mut bus, 0xBEEF);
        assert_eq!(cpu.sp, 0xFFFE);
        assert_eq!(
            bus.log().as_slice(),
            &[BusAccess::write(0xFFFF, 0xBE), BusAccess::write(0xFFFE, 0xEF)]
        );
    }

    #[test]
    fn set_af_masks_low_flag_nibble() {
        let mut cpu = Cpu::new();
        cpu.set_af(0x12FF);
        assert_eq!(cpu.af(), 0x12F0);
    }
}
