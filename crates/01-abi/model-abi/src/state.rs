use core::fmt;

use serde::{Deserialize, Serialize};

use crate::bus::BusLog;
use crate::flags::{C_BIT, H_BIT, N_BIT, Z_BIT};

/// Names one of the eight 8-bit registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reg8 {
    A,
    F,
    B,
    C,
    D,
    E,
    H,
    L,
}

impl Reg8 {
    pub const ALL: [Reg8; 8] = [
        Reg8::A,
        Reg8::F,
        Reg8::B,
        Reg8::C,
        Reg8::D,
        Reg8::E,
        Reg8::H,
        Reg8::L,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Reg8::A => "A",
            Reg8::F => "F",
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
        }
    }
}

/// Register file snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Registers {
    pub a: u8,
    /// Flags; only the high nibble is architectural.
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
}

impl Registers {
    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn get(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::F => self.f,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
        }
    }

    pub fn set(&mut self, reg: Reg8, value: u8) {
        let slot = match reg {
            Reg8::A => &mut self.a,
            Reg8::F => &mut self.f,
            Reg8::B => &mut self.b,
            Reg8::C => &mut self.c,
            Reg8::D => &mut self.d,
            Reg8::E => &mut self.e,
            Reg8::H => &mut self.h,
            Reg8::L => &mut self.l,
        };
        *slot = value;
    }
}

/// Full observable CPU state taken before or after a step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchState {
    pub regs: Registers,
    pub pc: u16,
    pub sp: u16,
    pub halted: bool,
    /// Interrupt master enable.
    pub ime: bool,
    /// Accesses observed during the last step.
    pub bus: BusLog,
}

impl ArchState {
    /// The harness' canonical reset state: every field zero.
    pub fn canonical() -> Self {
        Self::default()
    }

    /// Lists the compared fields that differ between two snapshots.
    ///
    /// Flag bits are reported individually so a report can point at the exact
    /// bit that diverged.
    pub fn differing_fields(&self, other: &ArchState) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.pc != other.pc {
            fields.push("PC");
        }
        if self.sp != other.sp {
            fields.push("SP");
        }
        for reg in Reg8::ALL {
            if reg == Reg8::F {
                continue;
            }
            if self.regs.get(reg) != other.regs.get(reg) {
                fields.push(reg.name());
            }
        }
        for (bit, name) in [(Z_BIT, "F.Z"), (N_BIT, "F.N"), (H_BIT, "F.H"), (C_BIT, "F.C")] {
            if (self.regs.f ^ other.regs.f) & (1 << bit) != 0 {
                fields.push(name);
            }
        }
        if self.regs.f & 0x0F != other.regs.f & 0x0F {
            fields.push("F.low");
        }
        if self.halted != other.halted {
            fields.push("halted");
        }
        if self.ime != other.ime {
            fields.push("IME");
        }
        if self.bus != other.bus {
            fields.push("bus");
        }
        fields
    }
}

impl fmt::Display for ArchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |bit: u8| (self.regs.f >> bit) & 1;
        writeln!(f, " PC   SP   AF   BC   DE   HL  ZNHC hlt IME")?;
        writeln!(
            f,
            "{:04x} {:04x} {:04x} {:04x} {:04x} {:04x} {}{}{}{}  {}   {}",
            self.pc,
            self.sp,
            self.regs.af(),
            self.regs.bc(),
            self.regs.de(),
            self.regs.hl(),
            flag(Z_BIT),
            flag(N_BIT),
            flag(H_BIT),
            flag(C_BIT),
            u8::from(self.halted),
            u8::from(self.ime)
        )?;
        for access in self.bus.iter() {
            writeln!(f, "  {access}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusAccess;
    use pretty_assertions::assert_eq;

    #[test]
    fn pairs_are_big_endian_views() {
        let regs = Registers {
            a: 0x12,
            f: 0xB0,
            b: 0x34,
            c: 0x56,
            h: 0xC0,
            l: 0x01,
            ..Registers::default()
        };
        assert_eq!(regs.af(), 0x12B0);
        assert_eq!(regs.bc(), 0x3456);
        assert_eq!(regs.hl(), 0xC001);
    }

    #[test]
    fn diff_names_each_field() {
        let base = ArchState::canonical();
        let mut other = base.clone();
        other.regs.f = 0x20;
        other.regs.e = 1;
        other.ime = true;
        other.bus.push(BusAccess::write(0xFFFF, 0)).expect("capacity");
        assert_eq!(base.differing_fields(&other), vec!["E", "F.H", "IME", "bus"]);
        assert!(base.differing_fields(&base.clone()).is_empty());
    }

    #[test]
    fn display_matches_dump_layout() {
        let mut state = ArchState::canonical();
        state.pc = 0x0001;
        state.regs.f = 0x90;
        state.bus.push(BusAccess::write(0xFFFE, 0x01)).expect("capacity");
        let text = state.to_string();
        assert!(text.contains("0001 0000 0090 0000 0000 0000 1001  0   0"), "{text}");
        assert!(text.contains("Mem write: addr=fffe val=01"), "{text}");
    }
}
