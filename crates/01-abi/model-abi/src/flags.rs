use core::fmt;

/// Bit position of the zero flag inside `F`.
pub const Z_BIT: u8 = 7;
/// Bit position of the subtract flag inside `F`.
pub const N_BIT: u8 = 6;
/// Bit position of the half-carry flag inside `F`.
pub const H_BIT: u8 = 5;
/// Bit position of the carry flag inside `F`.
pub const C_BIT: u8 = 4;

/// Decoded view of the `F` register.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    z: bool,
    n: bool,
    h: bool,
    c: bool,
}

impl Flags {
    /// Creates flags with all bits cleared.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an `F` register value; the low nibble is ignored.
    #[inline]
    pub fn from_byte(value: u8) -> Self {
        Self {
            z: value & (1 << Z_BIT) != 0,
            n: value & (1 << N_BIT) != 0,
            h: value & (1 << H_BIT) != 0,
            c: value & (1 << C_BIT) != 0,
        }
    }

    /// Encodes the flag bits into the `F` register representation.
    #[inline]
    pub fn to_byte(self) -> u8 {
        (u8::from(self.z) << Z_BIT)
            | (u8::from(self.n) << N_BIT)
            | (u8::from(self.h) << H_BIT)
            | (u8::from(self.c) << C_BIT)
    }

    #[inline]
    pub fn set_z(&mut self, value: bool) {
        self.z = value;
    }

    #[inline]
    pub fn set_n(&mut self, value: bool) {
        self.n = value;
    }

    #[inline]
    pub fn set_h(&mut self, value: bool) {
        self.h = value;
    }

    #[inline]
    pub fn set_c(&mut self, value: bool) {
        self.c = value;
    }

    #[inline]
    pub fn z(self) -> bool {
        self.z
    }

    #[inline]
    pub fn n(self) -> bool {
        self.n
    }

    #[inline]
    pub fn h(self) -> bool {
        self.h
    }

    #[inline]
    pub fn c(self) -> bool {
        self.c
    }

    /// Evaluates a 2-bit branch condition code (`NZ`, `Z`, `NC`, `C`).
    #[inline]
    pub fn condition(self, cc: u8) -> bool {
        match cc & 0x03 {
            0 => !self.z,
            1 => self.z,
            2 => !self.c,
            _ => self.c,
        }
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Z{} N{} H{} C{}",
            u8::from(self.z),
            u8::from(self.n),
            u8::from(self.h),
            u8::from(self.c)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip_drops_low_nibble() {
        let flags = Flags::from_byte(0xBF);
        assert_eq!(flags.to_byte(), 0xB0);
        assert!(flags.z() && !flags.n() && flags.h() && flags.c());
    }

    #[test]
    fn conditions_follow_z_and_c() {
        let z_only = Flags::from_byte(0x80);
        assert!(!z_only.condition(0));
        assert!(z_only.condition(1));
        assert!(z_only.condition(2));
        assert!(!z_only.condition(3));
    }
}
