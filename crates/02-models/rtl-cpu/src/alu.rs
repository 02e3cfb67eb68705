//! Combinational datapath of the clocked model.
//!
//! Every function takes the incoming `F` byte and returns the result together
//! with the outgoing `F` byte. Arithmetic is carried out at a wider width and
//! the flags are read from the overflow bits.

pub const FLAG_Z: u8 = 0x80;
pub const FLAG_N: u8 = 0x40;
pub const FLAG_H: u8 = 0x20;
pub const FLAG_C: u8 = 0x10;

#[inline]
fn flag(bit: u8, on: bool) -> u8 {
    if on {
        bit
    } else {
        0
    }
}

#[inline]
fn zero(value: u8) -> u8 {
    flag(FLAG_Z, value == 0)
}

/// Eight-way ALU selected by the `y` field of `0x80..=0xBF` and `0xC6..=0xFE`.
pub fn alu8(select: u8, a: u8, b: u8, f: u8) -> (u8, u8) {
    let carry_in = u16::from(f & FLAG_C != 0);
    match select & 0x07 {
        // ADD / ADC
        sel @ (0 | 1) => {
            let cin = if sel == 1 { carry_in } else { 0 };
            let wide = u16::from(a) + u16::from(b) + cin;
            let half = u16::from(a & 0x0F) + u16::from(b & 0x0F) + cin;
            let result = wide as u8;
            let out = zero(result) | flag(FLAG_H, half > 0x0F) | flag(FLAG_C, wide > 0xFF);
            (result, out)
        }
        // SUB / SBC / CP
        sel @ (2 | 3 | 7) => {
            let cin = if sel == 3 { carry_in } else { 0 };
            let subtrahend = u16::from(b) + cin;
            let result = u16::from(a).wrapping_sub(subtrahend) as u8;
            let out = zero(result)
                | FLAG_N
                | flag(FLAG_H, u16::from(a & 0x0F) < u16::from(b & 0x0F) + cin)
                | flag(FLAG_C, u16::from(a) < subtrahend);
            if sel == 7 {
                (a, out)
            } else {
                (result, out)
            }
        }
        4 => {
            let result = a & b;
            (result, zero(result) | FLAG_H)
        }
        5 => {
            let result = a ^ b;
            (result, zero(result))
        }
        _ => {
            let result = a | b;
            (result, zero(result))
        }
    }
}

/// `INC`/`DEC` on an 8-bit operand; carry passes through.
pub fn step8(value: u8, decrement: bool, f: u8) -> (u8, u8) {
    let keep = f & FLAG_C;
    if decrement {
        let result = value.wrapping_sub(1);
        let out = zero(result) | FLAG_N | flag(FLAG_H, value & 0x0F == 0x00) | keep;
        (result, out)
    } else {
        let result = value.wrapping_add(1);
        let out = zero(result) | flag(FLAG_H, value & 0x0F == 0x0F) | keep;
        (result, out)
    }
}

/// `ADD HL,rr`; zero passes through.
pub fn add16(hl: u16, rhs: u16, f: u8) -> (u16, u8) {
    let wide = u32::from(hl) + u32::from(rhs);
    let half = u32::from(hl & 0x0FFF) + u32::from(rhs & 0x0FFF);
    let out = (f & FLAG_Z) | flag(FLAG_H, half > 0x0FFF) | flag(FLAG_C, wide > 0xFFFF);
    (wide as u16, out)
}

/// `SP + e8` shared by `ADD SP,e8` and `LD HL,SP+e8`.
///
/// Both carries come from the unsigned addition of the low byte.
pub fn offset_sp(sp: u16, offset: u8) -> (u16, u8) {
    let low = u16::from(sp as u8);
    let half = (low & 0x0F) + u16::from(offset & 0x0F);
    let carry = low + u16::from(offset);
    let result = sp.wrapping_add(i16::from(offset as i8) as u16);
    (result, flag(FLAG_H, half > 0x0F) | flag(FLAG_C, carry > 0xFF))
}

/// Shift/rotate unit of the CB block, selected by `y`.
///
/// Sets `Z` from the result; the accumulator rotates clear it afterwards.
pub fn shift(select: u8, value: u8, f: u8) -> (u8, u8) {
    let carry_in = f & FLAG_C != 0;
    let wide = u16::from(value);
    let (result, carry) = match select & 0x07 {
        0 => ((wide << 1 | wide >> 7) as u8, value >> 7),
        1 => ((wide >> 1 | wide << 7) as u8, value & 1),
        2 => ((wide << 1 | u16::from(carry_in)) as u8, value >> 7),
        3 => ((wide >> 1 | u16::from(carry_in) << 7) as u8, value & 1),
        4 => ((wide << 1) as u8, value >> 7),
        5 => (((wide >> 1) | (wide & 0x80)) as u8, value & 1),
        6 => (((wide << 4) | (wide >> 4)) as u8, 0),
        _ => ((wide >> 1) as u8, value & 1),
    };
    (result, zero(result) | flag(FLAG_C, carry != 0))
}

/// `BIT b,x`: carry passes through.
pub fn test_bit(bit: u8, value: u8, f: u8) -> u8 {
    flag(FLAG_Z, value & (1 << (bit & 7)) == 0) | FLAG_H | (f & FLAG_C)
}

/// Decimal adjust after a BCD add or subtract.
pub fn daa(a: u8, f: u8) -> (u8, u8) {
    let subtract = f & FLAG_N != 0;
    let mut correction = 0u8;
    let mut carry = false;
    if f & FLAG_H != 0 || (!subtract && a & 0x0F > 0x09) {
        correction |= 0x06;
    }
    if f & FLAG_C != 0 || (!subtract && a > 0x99) {
        correction |= 0x60;
        carry = true;
    }
    let result = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    (result, zero(result) | (f & FLAG_N) | flag(FLAG_C, carry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cp_keeps_accumulator() {
        assert_eq!(alu8(7, 0x10, 0x20, 0), (0x10, FLAG_N | FLAG_C));
        assert_eq!(alu8(7, 0x42, 0x42, 0), (0x42, FLAG_Z | FLAG_N));
    }

    #[test]
    fn sbc_borrows_through_carry() {
        assert_eq!(alu8(3, 0x00, 0x00, FLAG_C), (0xFF, FLAG_N | FLAG_H | FLAG_C));
    }

    #[test]
    fn step8_half_carry_edges() {
        assert_eq!(step8(0x0F, false, FLAG_C), (0x10, FLAG_H | FLAG_C));
        assert_eq!(step8(0x10, true, 0), (0x0F, FLAG_N | FLAG_H));
        assert_eq!(step8(0x01, true, 0), (0x00, FLAG_Z | FLAG_N));
    }

    #[test]
    fn daa_after_subtract() {
        // 0x42 - 0x15 = 0x2D with half borrow; BCD result is 27.
        let (a, f) = alu8(2, 0x42, 0x15, 0);
        assert_eq!(daa(a, f), (0x27, FLAG_N));
    }

    #[test]
    fn offset_sp_negative() {
        assert_eq!(offset_sp(0x0005, 0xFF), (0x0004, FLAG_H | FLAG_C));
        assert_eq!(offset_sp(0x0000, 0xFF), (0xFFFF, 0));
    }

    #[test]
    fn swap_clears_carry() {
        assert_eq!(shift(6, 0xF0, FLAG_C), (0x0F, 0));
        assert_eq!(shift(6, 0x00, 0), (0x00, FLAG_Z));
    }
}
