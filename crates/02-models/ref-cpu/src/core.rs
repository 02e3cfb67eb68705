use model_abi::ModelError;

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::instr;

/// Every primary opcode that the SM83 leaves undefined.
pub const ILLEGAL_OPCODES: [u8; 11] = [
    0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

/// CPU register file paired with the bus it executes against.
#[derive(Clone, Debug, Default)]
pub struct Core<B: Bus> {
    /// CPU register file and run state.
    pub cpu: Cpu,
    /// Memory bus implementation.
    pub bus: B,
}

impl<B: Bus> Core<B> {
    pub fn new(bus: B) -> Self {
        Self {
            cpu: Cpu::new(),
            bus,
        }
    }

    /// Fetches and executes one instruction, returning its T-cycle cost.
    pub fn step(&mut self) -> Result<u32, ModelError> {
        let pc = self.cpu.pc;
        let opcode = self.cpu.fetch8(&mut self.bus);
        self.execute_opcode(opcode, pc)
    }

    fn execute_opcode(&mut self, opcode: u8, pc: u16) -> Result<u32, ModelError> {
        let cycles = match opcode {
            0x00 => instr::op_nop(),
            0x01 | 0x11 | 0x21 | 0x31 => instr::op_ld_rr_d16(self, opcode >> 4),
            0x02 | 0x12 => instr::op_ld_mem_rr_a(self, opcode >> 4),
            0x03 | 0x13 | 0x23 | 0x33 => instr::op_inc_rr(self, opcode >> 4),
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                instr::op_inc_r(self, opcode >> 3)
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                instr::op_dec_r(self, opcode >> 3)
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                instr::op_ld_r_d8(self, opcode >> 3)
            }
            0x07 | 0x0F | 0x17 | 0x1F => instr::op_rotate_a(self, opcode >> 3),
            0x08 => instr::op_ld_mem_a16_sp(self),
            0x09 | 0x19 | 0x29 | 0x39 => instr::op_add_hl_rr(self, opcode >> 4),
            0x0A | 0x1A => instr::op_ld_a_mem_rr(self, opcode >> 4),
            0x0B | 0x1B | 0x2B | 0x3B => instr::op_dec_rr(self, opcode >> 4),
            0x10 => instr::op_stop(self),
            0x18 => instr::op_jr(self, true),
            0x20 | 0x28 | 0x30 | 0x38 => {
                let taken = self.cpu.f.condition(opcode >> 3);
                instr::op_jr(self, taken)
            }
            0x22 => instr::op_ld_hl_inc_dec(self, true, 1),
            0x2A => instr::op_ld_hl_inc_dec(self, false, 1),
            0x32 => instr::op_ld_hl_inc_dec(self, true, -1),
            0x3A => instr::op_ld_hl_inc_dec(self, false, -1),
            0x27 => instr::op_daa(self),
            0x2F => instr::op_cpl(self),
            0x37 => instr::op_scf(self),
            0x3F => instr::op_ccf(self),
            0x76 => instr::op_halt(self),
            0x40..=0x7F => instr::op_ld_r_r(self, opcode),
            0x80..=0xBF => instr::op_alu_a_r(self, opcode),
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                let taken = self.cpu.f.condition(opcode >> 3);
                instr::op_ret_cc(self, taken)
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => instr::op_pop_rr(self, opcode >> 4),
            0xC5 | 0xD5 | 0xE5 | 0xF5 => instr::op_push_rr(self, opcode >> 4),
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let taken = self.cpu.f.condition(opcode >> 3);
                instr::op_jp_a16(self, taken)
            }
            0xC3 => instr::op_jp_a16(self, true),
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let taken = self.cpu.f.condition(opcode >> 3);
                instr::op_call_a16(self, taken)
            }
            0xCD => instr::op_call_a16(self, true),
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                instr::op_alu_a_d8(self, opcode)
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => instr::op_rst(self, opcode),
            0xC9 => instr::op_ret(self),
            0xD9 => instr::op_reti(self),
            0xCB => {
                let sub = self.cpu.fetch8(&mut self.bus);
                instr::op_cb(self, sub)
            }
            0xE0 => instr::op_ldh_a8_a(self),
            0xE2 => instr::op_ldh_c_a(self),
            0xE8 => instr::op_add_sp_e8(self),
            0xE9 => instr::op_jp_hl(self),
            0xEA => instr::op_ld_a16_a(self),
            0xF0 => instr::op_ldh_a_a8(self),
            0xF2 => instr::op_ldh_a_c(self),
            0xF3 => instr::op_set_ime(self, false),
            0xF8 => instr::op_ld_hl_sp_plus_e8(self),
            0xF9 => instr::op_ld_sp_hl(self),
            0xFA => instr::op_ld_a_a16(self),
            0xFB => instr::op_set_ime(self, true),
            _ => {
                log::warn!("illegal opcode {opcode:#04x} at {pc:#06x}");
                return Err(ModelError::IllegalOpcode { opcode, pc });
            }
        };
        Ok(cycles)
    }
}
