//! Opcode helpers for the reference interpreter.
//!
//! Each helper executes one instruction family against a [`Core`] and returns
//! the T-cycles it consumed. Operand selectors use the SM83 encoding: 8-bit
//! register codes `B C D E H L (HL) A`, pair codes `BC DE HL SP`, condition
//! codes `NZ Z NC C`.

use crate::bus::Bus;
use crate::core::Core;

/// Execution cost for common instruction classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleCost {
    Clocks4 = 4,
    Clocks8 = 8,
    Clocks12 = 12,
    Clocks16 = 16,
    Clocks20 = 20,
    Clocks24 = 24,
}

impl CycleCost {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// 8-bit ALU operations selected by bits 3..=5 of the `0x80..=0xBF` block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    /// Decodes the operation from an opcode's `y` field.
    pub fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

/// Reads an 8-bit operand by register code; `(HL)` costs an extra bus cycle.
#[inline]
pub fn read_r8<B: Bus>(core: &mut Core<B>, code: u8) -> (u8, u32) {
    let cpu = &core.cpu;
    match code & 0x07 {
        0 => (cpu.b, 0),
        1 => (cpu.c, 0),
        2 => (cpu.d, 0),
        3 => (cpu.e, 0),
        4 => (cpu.h, 0),
        5 => (cpu.l, 0),
        6 => {
            let addr = cpu.hl();
            (core.bus.read8(addr), CycleCost::Clocks4.as_u32())
        }
        _ => (cpu.a, 0),
    }
}

/// Writes an 8-bit operand by register code; `(HL)` costs an extra bus cycle.
#[inline]
pub fn write_r8<B: Bus>(core: &mut Core<B>, code: u8, value: u8) -> u32 {
    let cpu = &mut core.cpu;
    match code & 0x07 {
        0 => cpu.b = value,
        1 => cpu.c = value,
        2 => cpu.d = value,
        3 => cpu.e = value,
        4 => cpu.h = value,
        5 => cpu.l = value,
        6 => {
            let addr = cpu.hl();
            core.bus.write8(addr, value);
            return CycleCost::Clocks4.as_u32();
        }
        _ => cpu.a = value,
    }
    0
}

/// Reads a register pair by code, with code 3 selecting `SP`.
#[inline]
fn read_rr<B: Bus>(core: &Core<B>, code: u8) -> u16 {
    match code & 0x03 {
        0 => core.cpu.bc(),
        1 => core.cpu.de(),
        2 => core.cpu.hl(),
        _ => core.cpu.sp,
    }
}

/// Writes a register pair by code, with code 3 selecting `SP`.
#[inline]
fn write_rr<B: Bus>(core: &mut Core<B>, code: u8, value: u16) {
    match code & 0x03 {
        0 => core.cpu.set_bc(value),
        1 => core.cpu.set_de(value),
        2 => core.cpu.set_hl(value),
        _ => core.cpu.sp = value,
    }
}

fn add8(a: u8, b: u8, carry: bool, core_flags: &mut model_abi::Flags) -> u8 {
    let cin = u8::from(carry);
    let sum = a.wrapping_add(b).wrapping_add(cin);
    let half = ((a ^ b ^ sum) & 0x10) != 0;
    let carry_out = (((a & b) | ((a | b) & !sum)) & 0x80) != 0;
    core_flags.set_z(sum == 0);
    core_flags.set_n(false);
    core_flags.set_h(half);
    core_flags.set_c(carry_out);
    sum
}

fn sub8(a: u8, b: u8, borrow: bool, core_flags: &mut model_abi::Flags) -> u8 {
    let cin = u8::from(borrow);
    let diff = a.wrapping_sub(b).wrapping_sub(cin);
    let half = ((a ^ b ^ diff) & 0x10) != 0;
    let borrow_out = (((!a & b) | (!(a ^ b) & diff)) & 0x80) != 0;
    core_flags.set_z(diff == 0);
    core_flags.set_n(true);
    core_flags.set_h(half);
    core_flags.set_c(borrow_out);
    diff
}

fn alu_assign<B: Bus>(core: &mut Core<B>, operand: u8, op: AluOp) {
    let cpu = &mut core.cpu;
    let a = cpu.a;
    let logic = |flags: &mut model_abi::Flags, result: u8, half: bool| {
        flags.set_z(result == 0);
        flags.set_n(false);
        flags.set_h(half);
        flags.set_c(false);
        result
    };
    cpu.a = match op {
        AluOp::Add => add8(a, operand, false, &mut cpu.f),
        AluOp::Adc => {
            let carry = cpu.f.c();
            add8(a, operand, carry, &mut cpu.f)
        }
        AluOp::Sub => sub8(a, operand, false, &mut cpu.f),
        AluOp::Sbc => {
            let carry = cpu.f.c();
            sub8(a, operand, carry, &mut cpu.f)
        }
        AluOp::And => logic(&mut cpu.f, a & operand, true),
        AluOp::Xor => logic(&mut cpu.f, a ^ operand, false),
        AluOp::Or => logic(&mut cpu.f, a | operand, false),
        AluOp::Cp => {
            sub8(a, operand, false, &mut cpu.f);
            a
        }
    };
}

#[inline]
pub fn op_nop() -> u32 {
    CycleCost::Clocks4.as_u32()
}

/// Loads a 16-bit immediate into one of the register pairs.
pub fn op_ld_rr_d16<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let imm = core.cpu.fetch16(&mut core.bus);
    write_rr(core, rp, imm);
    CycleCost::Clocks12.as_u32()
}

/// Stores `A` at the address held in `BC` or `DE`.
pub fn op_ld_mem_rr_a<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let addr = read_rr(core, rp & 0x01);
    core.bus.write8(addr, core.cpu.a);
    CycleCost::Clocks8.as_u32()
}

/// Loads `A` from the address held in `BC` or `DE`.
pub fn op_ld_a_mem_rr<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let addr = read_rr(core, rp & 0x01);
    core.cpu.a = core.bus.read8(addr);
    CycleCost::Clocks8.as_u32()
}

/// Loads an immediate byte into a register or `(HL)`.
pub fn op_ld_r_d8<B: Bus>(core: &mut Core<B>, dst: u8) -> u32 {
    let imm = core.cpu.fetch8(&mut core.bus);
    let extra = write_r8(core, dst, imm);
    CycleCost::Clocks8.as_u32() + extra
}

/// `LD (a16),SP`: low byte first.
pub fn op_ld_mem_a16_sp<B: Bus>(core: &mut Core<B>) -> u32 {
    let addr = core.cpu.fetch16(&mut core.bus);
    let [hi, lo] = core.cpu.sp.to_be_bytes();
    core.bus.write8(addr, lo);
    core.bus.write8(addr.wrapping_add(1), hi);
    CycleCost::Clocks20.as_u32()
}

/// `LDH (a8),A`.
pub fn op_ldh_a8_a<B: Bus>(core: &mut Core<B>) -> u32 {
    let offset = core.cpu.fetch8(&mut core.bus);
    core.bus.write8(0xFF00 | u16::from(offset), core.cpu.a);
    CycleCost::Clocks12.as_u32()
}

/// `LDH A,(a8)`.
pub fn op_ldh_a_a8<B: Bus>(core: &mut Core<B>) -> u32 {
    let offset = core.cpu.fetch8(&mut core.bus);
    core.cpu.a = core.bus.read8(0xFF00 | u16::from(offset));
    CycleCost::Clocks12.as_u32()
}

/// `LD (C),A`.
pub fn op_ldh_c_a<B: Bus>(core: &mut Core<B>) -> u32 {
    core.bus.write8(0xFF00 | u16::from(core.cpu.c), core.cpu.a);
    CycleCost::Clocks8.as_u32()
}

/// `LD A,(C)`.
pub fn op_ldh_a_c<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.a = core.bus.read8(0xFF00 | u16::from(core.cpu.c));
    CycleCost::Clocks8.as_u32()
}

/// `LD A,(a16)`.
pub fn op_ld_a_a16<B: Bus>(core: &mut Core<B>) -> u32 {
    let addr = core.cpu.fetch16(&mut core.bus);
    core.cpu.a = core.bus.read8(addr);
    CycleCost::Clocks16.as_u32()
}

/// `LD (a16),A`.
pub fn op_ld_a16_a<B: Bus>(core: &mut Core<B>) -> u32 {
    let addr = core.cpu.fetch16(&mut core.bus);
    core.bus.write8(addr, core.cpu.a);
    CycleCost::Clocks16.as_u32()
}

/// Copies between registers or `(HL)`; `0x76` never reaches this helper.
pub fn op_ld_r_r<B: Bus>(core: &mut Core<B>, opcode: u8) -> u32 {
    let (value, read_cycles) = read_r8(core, opcode);
    let write_cycles = write_r8(core, opcode >> 3, value);
    CycleCost::Clocks4.as_u32() + read_cycles + write_cycles
}

/// `INC r` / `INC (HL)`; carry is preserved.
pub fn op_inc_r<B: Bus>(core: &mut Core<B>, idx: u8) -> u32 {
    let (value, read_cycles) = read_r8(core, idx);
    let result = value.wrapping_add(1);
    let write_cycles = write_r8(core, idx, result);
    let f = &mut core.cpu.f;
    f.set_z(result == 0);
    f.set_n(false);
    f.set_h(((value ^ result) & 0x10) != 0);
    CycleCost::Clocks4.as_u32() + read_cycles + write_cycles
}

/// `DEC r` / `DEC (HL)`; carry is preserved.
pub fn op_dec_r<B: Bus>(core: &mut Core<B>, idx: u8) -> u32 {
    let (value, read_cycles) = read_r8(core, idx);
    let result = value.wrapping_sub(1);
    let write_cycles = write_r8(core, idx, result);
    let f = &mut core.cpu.f;
    f.set_z(result == 0);
    f.set_n(true);
    f.set_h(((value ^ result) & 0x10) != 0);
    CycleCost::Clocks4.as_u32() + read_cycles + write_cycles
}

pub fn op_inc_rr<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let value = read_rr(core, rp).wrapping_add(1);
    write_rr(core, rp, value);
    CycleCost::Clocks8.as_u32()
}

pub fn op_dec_rr<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let value = read_rr(core, rp).wrapping_sub(1);
    write_rr(core, rp, value);
    CycleCost::Clocks8.as_u32()
}

/// `ADD HL,rr`; zero flag is preserved.
pub fn op_add_hl_rr<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let lhs = core.cpu.hl();
    let rhs = read_rr(core, rp);
    let result = lhs.wrapping_add(rhs);
    core.cpu.set_hl(result);
    let f = &mut core.cpu.f;
    f.set_n(false);
    f.set_h(((lhs & 0x0FFF) + (rhs & 0x0FFF)) > 0x0FFF);
    f.set_c((u32::from(lhs) + u32::from(rhs)) > 0xFFFF);
    CycleCost::Clocks8.as_u32()
}

/// Shared `SP + e8` adder: flags come from the low byte.
fn sp_plus_e8<B: Bus>(core: &mut Core<B>, offset: u8) -> u16 {
    let sp = core.cpu.sp;
    let off = offset as i8 as i16 as u16;
    let result = sp.wrapping_add(off);
    let f = &mut core.cpu.f;
    f.set_z(false);
    f.set_n(false);
    f.set_h(((sp ^ off ^ result) & 0x0010) != 0);
    f.set_c(((sp ^ off ^ result) & 0x0100) != 0);
    result
}

pub fn op_add_sp_e8<B: Bus>(core: &mut Core<B>) -> u32 {
    let imm = core.cpu.fetch8(&mut core.bus);
    core.cpu.sp = sp_plus_e8(core, imm);
    CycleCost::Clocks16.as_u32()
}

pub fn op_ld_hl_sp_plus_e8<B: Bus>(core: &mut Core<B>) -> u32 {
    let imm = core.cpu.fetch8(&mut core.bus);
    let result = sp_plus_e8(core, imm);
    core.cpu.set_hl(result);
    CycleCost::Clocks12.as_u32()
}

pub fn op_ld_sp_hl<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.sp = core.cpu.hl();
    CycleCost::Clocks8.as_u32()
}

/// `LD (HL+),A` / `LD (HL-),A` / `LD A,(HL+)` / `LD A,(HL-)`.
pub fn op_ld_hl_inc_dec<B: Bus>(core: &mut Core<B>, to_memory: bool, step: i16) -> u32 {
    let addr = core.cpu.hl();
    if to_memory {
        core.bus.write8(addr, core.cpu.a);
    } else {
        core.cpu.a = core.bus.read8(addr);
    }
    core.cpu.set_hl(addr.wrapping_add(step as u16));
    CycleCost::Clocks8.as_u32()
}

/// Unconditional or conditional relative jump.
pub fn op_jr<B: Bus>(core: &mut Core<B>, taken: bool) -> u32 {
    let off = core.cpu.fetch8(&mut core.bus);
    if taken {
        core.cpu.pc = core.cpu.pc.wrapping_add(off as i8 as i16 as u16);
        CycleCost::Clocks12.as_u32()
    } else {
        CycleCost::Clocks8.as_u32()
    }
}

/// ALU operation on `A` with a register or `(HL)` operand.
pub fn op_alu_a_r<B: Bus>(core: &mut Core<B>, opcode: u8) -> u32 {
    let (operand, read_cycles) = read_r8(core, opcode);
    alu_assign(core, operand, AluOp::from_code(opcode >> 3));
    CycleCost::Clocks4.as_u32() + read_cycles
}

/// ALU operation on `A` with an immediate operand.
pub fn op_alu_a_d8<B: Bus>(core: &mut Core<B>, opcode: u8) -> u32 {
    let imm = core.cpu.fetch8(&mut core.bus);
    alu_assign(core, imm, AluOp::from_code(opcode >> 3));
    CycleCost::Clocks8.as_u32()
}

/// `RLCA`, `RRCA`, `RLA`, `RRA`: accumulator rotates that always clear `Z`.
pub fn op_rotate_a<B: Bus>(core: &mut Core<B>, variant: u8) -> u32 {
    let (result, carry) = rotate(variant, core.cpu.a, core.cpu.f.c());
    core.cpu.a = result;
    let f = &mut core.cpu.f;
    f.set_z(false);
    f.set_n(false);
    f.set_h(false);
    f.set_c(carry);
    CycleCost::Clocks4.as_u32()
}

/// Adjusts `A` for binary-coded decimal representation.
pub fn op_daa<B: Bus>(core: &mut Core<B>) -> u32 {
    let mut a = core.cpu.a;
    let mut carry = core.cpu.f.c();

    if !core.cpu.f.n() {
        if carry || a > 0x99 {
            a = a.wrapping_add(0x60);
            carry = true;
        }
        if core.cpu.f.h() || (a & 0x0F) > 0x09 {
            a = a.wrapping_add(0x06);
        }
    } else {
        if carry {
            a = a.wrapping_sub(0x60);
        }
        if core.cpu.f.h() {
            a = a.wrapping_sub(0x06);
        }
    }

    core.cpu.a = a;
    core.cpu.f.set_z(a == 0);
    core.cpu.f.set_h(false);
    core.cpu.f.set_c(carry);
    CycleCost::Clocks4.as_u32()
}

pub fn op_cpl<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.a = !core.cpu.a;
    core.cpu.f.set_n(true);
    core.cpu.f.set_h(true);
    CycleCost::Clocks4.as_u32()
}

pub fn op_scf<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.f.set_n(false);
    core.cpu.f.set_h(false);
    core.cpu.f.set_c(true);
    CycleCost::Clocks4.as_u32()
}

pub fn op_ccf<B: Bus>(core: &mut Core<B>) -> u32 {
    let carry = core.cpu.f.c();
    core.cpu.f.set_n(false);
    core.cpu.f.set_h(false);
    core.cpu.f.set_c(!carry);
    CycleCost::Clocks4.as_u32()
}

/// `DI` / `EI`. The enable takes effect at retirement: interrupts are never
/// delivered mid-test, so there is no observable one-instruction delay.
pub fn op_set_ime<B: Bus>(core: &mut Core<B>, enabled: bool) -> u32 {
    core.cpu.ime = enabled;
    CycleCost::Clocks4.as_u32()
}

pub fn op_halt<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.halted = true;
    CycleCost::Clocks4.as_u32()
}

/// `STOP` consumes its padding byte and parks the CPU like `HALT`.
pub fn op_stop<B: Bus>(core: &mut Core<B>) -> u32 {
    let _ = core.cpu.fetch8(&mut core.bus);
    core.cpu.halted = true;
    CycleCost::Clocks4.as_u32()
}

pub fn op_jp_hl<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.pc = core.cpu.hl();
    CycleCost::Clocks4.as_u32()
}

/// `PUSH rr` with code 3 selecting `AF`.
pub fn op_push_rr<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let value = match rp & 0x03 {
        3 => core.cpu.af(),
        code => read_rr(core, code),
    };
    core.cpu.push16(&mut core.bus, value);
    CycleCost::Clocks16.as_u32()
}

/// `POP rr` with code 3 selecting `AF`.
pub fn op_pop_rr<B: Bus>(core: &mut Core<B>, rp: u8) -> u32 {
    let value = core.cpu.pop16(&mut core.bus);
    match rp & 0x03 {
        3 => core.cpu.set_af(value),
        code => write_rr(core, code, value),
    }
    CycleCost::Clocks12.as_u32()
}

/// Absolute jump, taken or not; the address is always fetched.
pub fn op_jp_a16<B: Bus>(core: &mut Core<B>, taken: bool) -> u32 {
    let addr = core.cpu.fetch16(&mut core.bus);
    if taken {
        core.cpu.pc = addr;
        CycleCost::Clocks16.as_u32()
    } else {
        CycleCost::Clocks12.as_u32()
    }
}

/// Subroutine call, taken or not; the address is always fetched.
pub fn op_call_a16<B: Bus>(core: &mut Core<B>, taken: bool) -> u32 {
    let addr = core.cpu.fetch16(&mut core.bus);
    if !taken {
        return CycleCost::Clocks12.as_u32();
    }
    let ret = core.cpu.pc;
    core.cpu.push16(&mut core.bus, ret);
    core.cpu.pc = addr;
    CycleCost::Clocks24.as_u32()
}

pub fn op_ret<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.pc = core.cpu.pop16(&mut core.bus);
    CycleCost::Clocks16.as_u32()
}

pub fn op_reti<B: Bus>(core: &mut Core<B>) -> u32 {
    core.cpu.pc = core.cpu.pop16(&mut core.bus);
    core.cpu.ime = true;
    CycleCost::Clocks16.as_u32()
}

pub fn op_ret_cc<B: Bus>(core: &mut Core<B>, taken: bool) -> u32 {
    if taken {
        core.cpu.pc = core.cpu.pop16(&mut core.bus);
        CycleCost::Clocks20.as_u32()
    } else {
        CycleCost::Clocks8.as_u32()
    }
}

/// `RST n`: calls the fixed vector encoded in bits 3..=5.
pub fn op_rst<B: Bus>(core: &mut Core<B>, opcode: u8) -> u32 {
    let ret = core.cpu.pc;
    core.cpu.push16(&mut core.bus, ret);
    core.cpu.pc = u16::from(opcode & 0x38);
    CycleCost::Clocks16.as_u32()
}

/// Rotate/shift group shared by the accumulator rotates and the CB block.
///
/// Returns the result and the carry out.
#[inline]
fn rotate(variant: u8, value: u8, carry_in: bool) -> (u8, bool) {
    match variant & 0x07 {
        // RLC
        0 => (value.rotate_left(1), value & 0x80 != 0),
        // RRC
        1 => (value.rotate_right(1), value & 0x01 != 0),
        // RL
        2 => ((value << 1) | u8::from(carry_in), value & 0x80 != 0),
        // RR
        3 => ((value >> 1) | (u8::from(carry_in) << 7), value & 0x01 != 0),
        // SLA
        4 => (value << 1, value & 0x80 != 0),
        // SRA
        5 => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
        // SWAP
        6 => (value.rotate_left(4), false),
        // SRL
        _ => (value >> 1, value & 0x01 != 0),
    }
}

/// Executes a CB-prefixed opcode.
pub fn op_cb<B: Bus>(core: &mut Core<B>, sub: u8) -> u32 {
    let x = sub >> 6;
    let y = (sub >> 3) & 0x07;
    let z = sub & 0x07;
    let (value, read_cycles) = read_r8(core, z);

    let write_cycles = match x {
        0 => {
            let (result, carry) = rotate(y, value, core.cpu.f.c());
            let cycles = write_r8(core, z, result);
            let f = &mut core.cpu.f;
            f.set_z(result == 0);
            f.set_n(false);
            f.set_h(false);
            f.set_c(carry);
            cycles
        }
        1 => {
            let f = &mut core.cpu.f;
            f.set_z(value & (1 << y) == 0);
            f.set_n(false);
            f.set_h(true);
            0
        }
        2 => write_r8(core, z, value & !(1 << y)),
        _ => write_r8(core, z, value | (1 << y)),
    };
    CycleCost::Clocks8.as_u32() + read_cycles + write_cycles
}

#[cfg(test)]
mod tests {
    use super::rotate;

    #[test]
    fn rotate_group_carries() {
        assert_eq!(rotate(0, 0x81, false), (0x03, true));
        assert_eq!(rotate(1, 0x01, false), (0x80, true));
        assert_eq!(rotate(2, 0x80, true), (0x01, true));
        assert_eq!(rotate(3, 0x01, true), (0x80, true));
        assert_eq!(rotate(4, 0xC0, false), (0x80, true));
        assert_eq!(rotate(5, 0x81, false), (0xC0, true));
        assert_eq!(rotate(6, 0x12, true), (0x21, false));
        assert_eq!(rotate(7, 0x81, false), (0x40, true));
    }
}
