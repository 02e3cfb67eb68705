//! Opcode decoder producing a micro-op plan and a retirement action.
//!
//! Every instruction is split into the bus cycles it needs after the opcode
//! fetch (the [`Plan`]) and a single [`Commit`] applied when the plan drains.
//! Memory writes and stack pointer moves happen while the plan runs; every
//! other register effect is deferred to the commit.

use smallvec::SmallVec;

/// Register file slot of `F`.
///
/// Slots follow the operand encoding `B C D E H L (HL) A`; `(HL)` never names
/// a register, so its slot holds the flags.
pub const SLOT_F: u8 = 6;
/// Register file slot of `A`.
pub const SLOT_A: u8 = 7;
/// Operand code selecting memory at `HL`.
pub const OPERAND_HL: u8 = 6;

/// Temporary latch targeted by a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Latch {
    Z,
    W,
}

/// Address source for a bus cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrSel {
    Hl,
    Bc,
    De,
    Wz,
    /// `WZ + 1`.
    WzNext,
    /// `0xFF00 | Z`.
    HighZ,
    /// `0xFF00 | C`.
    HighC,
    /// Read at `SP`, then increment `SP`.
    Pop,
    /// Decrement `SP`, then write at `SP`.
    Push,
}

/// Data source for a write cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSel {
    Slot(u8),
    Z,
    PcHigh,
    PcLow,
    SpLow,
    SpHigh,
    /// `Z` passed through the incrementer or decrementer.
    StepZ { decrement: bool },
    /// `Z` passed through the CB unit.
    Prefixed,
}

/// One bus cycle after the opcode fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Uop {
    /// Read at `PC` and advance it.
    Immediate(Latch),
    Read(AddrSel, Latch),
    Write(AddrSel, DataSel),
    /// Internal cycle with no bus activity.
    Idle,
}

/// Bus cycles of one instruction; sized for the longest (`CALL`).
pub type Plan = SmallVec<[Uop; 8]>;

/// Register pair selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pair {
    Bc,
    De,
    Hl,
    Sp,
    Af,
}

impl Pair {
    /// Decodes the `p` field with code 3 naming `SP`.
    pub fn with_sp(code: u8) -> Self {
        match code & 0x03 {
            0 => Pair::Bc,
            1 => Pair::De,
            2 => Pair::Hl,
            _ => Pair::Sp,
        }
    }

    /// Decodes the `p` field with code 3 naming `AF` (stack operations).
    pub fn with_af(code: u8) -> Self {
        match code & 0x03 {
            3 => Pair::Af,
            other => Pair::with_sp(other),
        }
    }

    /// High and low register slots; `SP` has none.
    pub fn slots(self) -> Option<(u8, u8)> {
        match self {
            Pair::Bc => Some((0, 1)),
            Pair::De => Some((2, 3)),
            Pair::Hl => Some((4, 5)),
            Pair::Af => Some((SLOT_A, SLOT_F)),
            Pair::Sp => None,
        }
    }
}

/// Second operand of an ALU operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Slot(u8),
    Z,
}

/// Architectural effect applied when the plan drains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commit {
    None,
    Copy { dst: u8, src: u8 },
    LoadZ(u8),
    LoadWz(Pair),
    StepPair { pair: Pair, decrement: bool },
    StepSlot { slot: u8, decrement: bool },
    /// Flags of an `INC`/`DEC (HL)` whose result was already written.
    StepMemoryFlags { decrement: bool },
    AddHl(Pair),
    Alu { select: u8, operand: Operand },
    RotateA(u8),
    Daa,
    Cpl,
    Scf,
    Ccf,
    Halt,
    SetIme(bool),
    /// `PC = WZ`, optionally setting IME (`RETI`).
    JumpWz { enable_interrupts: bool },
    JumpHl,
    JumpRelative,
    Vector(u8),
    AddSp,
    LdHlSpOffset,
    LdSpHl,
    /// `LD (HL±),A` / `LD A,(HL±)`.
    HlPost { load_a: bool, decrement: bool },
    Shift { select: u8, slot: u8 },
    ShiftMemoryFlags(u8),
    Bit { bit: u8, operand: Operand },
    Res { bit: u8, slot: u8 },
    Set { bit: u8, slot: u8 },
}

/// Decoded primary instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub plan: Plan,
    pub commit: Commit,
}

impl Decoded {
    fn new(plan: &[Uop], commit: Commit) -> Self {
        Self {
            plan: SmallVec::from_slice(plan),
            commit,
        }
    }
}

use AddrSel as A;
use DataSel as D;
use Latch::{W, Z};
use Uop::{Idle, Immediate, Read, Write};

/// Decodes a primary opcode given the current flags.
///
/// Returns `None` for the undefined opcodes; `0xCB` must be routed to
/// [`decode_prefixed`] by the caller once the second byte is fetched.
pub fn decode(opcode: u8, flags: u8) -> Option<Decoded> {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let taken = condition(y & 0x03, flags);

    let decoded = match x {
        0 => match (z, y) {
            (0, 0) => Decoded::new(&[], Commit::None),
            (0, 1) => Decoded::new(
                &[
                    Immediate(Z),
                    Immediate(W),
                    Write(A::Wz, D::SpLow),
                    Write(A::WzNext, D::SpHigh),
                ],
                Commit::None,
            ),
            (0, 2) => Decoded::new(&[Immediate(Z)], Commit::Halt),
            (0, 3) => Decoded::new(&[Immediate(Z), Idle], Commit::JumpRelative),
            (0, _) if taken => Decoded::new(&[Immediate(Z), Idle], Commit::JumpRelative),
            (0, _) => Decoded::new(&[Immediate(Z)], Commit::None),
            (1, _) if y & 1 == 0 => {
                Decoded::new(&[Immediate(Z), Immediate(W)], Commit::LoadWz(Pair::with_sp(p)))
            }
            (1, _) => Decoded::new(&[Idle], Commit::AddHl(Pair::with_sp(p))),
            (2, _) => indirect_accumulator(y),
            (3, _) => Decoded::new(
                &[Idle],
                Commit::StepPair {
                    pair: Pair::with_sp(p),
                    decrement: y & 1 == 1,
                },
            ),
            (4 | 5, OPERAND_HL) => {
                let decrement = z == 5;
                Decoded::new(
                    &[Read(A::Hl, Z), Write(A::Hl, D::StepZ { decrement })],
                    Commit::StepMemoryFlags { decrement },
                )
            }
            (4 | 5, _) => Decoded::new(
                &[],
                Commit::StepSlot {
                    slot: y,
                    decrement: z == 5,
                },
            ),
            (6, OPERAND_HL) => Decoded::new(&[Immediate(Z), Write(A::Hl, D::Z)], Commit::None),
            (6, _) => Decoded::new(&[Immediate(Z)], Commit::LoadZ(y)),
            (_, 0..=3) => Decoded::new(&[], Commit::RotateA(y)),
            (_, 4) => Decoded::new(&[], Commit::Daa),
            (_, 5) => Decoded::new(&[], Commit::Cpl),
            (_, 6) => Decoded::new(&[], Commit::Scf),
            (_, _) => Decoded::new(&[], Commit::Ccf),
        },
        1 => match (y, z) {
            (OPERAND_HL, OPERAND_HL) => Decoded::new(&[], Commit::Halt),
            (OPERAND_HL, src) => Decoded::new(&[Write(A::Hl, D::Slot(src))], Commit::None),
            (dst, OPERAND_HL) => Decoded::new(&[Read(A::Hl, Z)], Commit::LoadZ(dst)),
            (dst, src) => Decoded::new(&[], Commit::Copy { dst, src }),
        },
        2 if z == OPERAND_HL => Decoded::new(
            &[Read(A::Hl, Z)],
            Commit::Alu {
                select: y,
                operand: Operand::Z,
            },
        ),
        2 => Decoded::new(
            &[],
            Commit::Alu {
                select: y,
                operand: Operand::Slot(z),
            },
        ),
        _ => return decode_high(opcode, y, z, p, taken),
    };
    Some(decoded)
}

/// `LD (BC/DE/HL±),A` and the matching loads into `A`.
fn indirect_accumulator(y: u8) -> Decoded {
    let load_a = y & 1 == 1;
    let (addr, post) = match y >> 1 {
        0 => (A::Bc, None),
        1 => (A::De, None),
        2 => (A::Hl, Some(false)),
        _ => (A::Hl, Some(true)),
    };
    let uop = if load_a {
        Read(addr, Z)
    } else {
        Write(addr, D::Slot(SLOT_A))
    };
    let commit = match (post, load_a) {
        (Some(decrement), _) => Commit::HlPost { load_a, decrement },
        (None, true) => Commit::LoadZ(SLOT_A),
        (None, false) => Commit::None,
    };
    Decoded::new(&[uop], commit)
}

/// Decodes the `0xC0..=0xFF` quadrant.
fn decode_high(opcode: u8, y: u8, z: u8, p: u8, taken: bool) -> Option<Decoded> {
    const POP: [Uop; 2] = [Read(A::Pop, Z), Read(A::Pop, W)];
    const RETURN: [Uop; 3] = [Read(A::Pop, Z), Read(A::Pop, W), Idle];
    const CALL: [Uop; 5] = [
        Immediate(Z),
        Immediate(W),
        Idle,
        Write(A::Push, D::PcHigh),
        Write(A::Push, D::PcLow),
    ];
    let jump = Commit::JumpWz {
        enable_interrupts: false,
    };

    let decoded = match opcode {
        0xC0 | 0xC8 | 0xD0 | 0xD8 if taken => {
            Decoded::new(&[Idle, RETURN[0], RETURN[1], RETURN[2]], jump)
        }
        0xC0 | 0xC8 | 0xD0 | 0xD8 => Decoded::new(&[Idle], Commit::None),
        0xC9 => Decoded::new(&RETURN, jump),
        0xD9 => Decoded::new(
            &RETURN,
            Commit::JumpWz {
                enable_interrupts: true,
            },
        ),
        0xC1 | 0xD1 | 0xE1 | 0xF1 => Decoded::new(&POP, Commit::LoadWz(Pair::with_af(p))),
        0xC5 | 0xD5 | 0xE5 | 0xF5 => {
            let (hi, lo) = Pair::with_af(p).slots()?;
            Decoded::new(
                &[
                    Idle,
                    Write(A::Push, D::Slot(hi)),
                    Write(A::Push, D::Slot(lo)),
                ],
                Commit::None,
            )
        }
        0xC2 | 0xCA | 0xD2 | 0xDA if taken => {
            Decoded::new(&[Immediate(Z), Immediate(W), Idle], jump)
        }
        0xC2 | 0xCA | 0xD2 | 0xDA => Decoded::new(&[Immediate(Z), Immediate(W)], Commit::None),
        0xC3 => Decoded::new(&[Immediate(Z), Immediate(W), Idle], jump),
        0xC4 | 0xCC | 0xD4 | 0xDC if taken => Decoded::new(&CALL, jump),
        0xC4 | 0xCC | 0xD4 | 0xDC => Decoded::new(&CALL[..2], Commit::None),
        0xCD => Decoded::new(&CALL, jump),
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => Decoded::new(
            &[Immediate(Z)],
            Commit::Alu {
                select: y,
                operand: Operand::Z,
            },
        ),
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => Decoded::new(
            &[
                Idle,
                Write(A::Push, D::PcHigh),
                Write(A::Push, D::PcLow),
            ],
            Commit::Vector(y),
        ),
        0xE0 => Decoded::new(
            &[Immediate(Z), Write(A::HighZ, D::Slot(SLOT_A))],
            Commit::None,
        ),
        0xF0 => Decoded::new(&[Immediate(Z), Read(A::HighZ, Z)], Commit::LoadZ(SLOT_A)),
        0xE2 => Decoded::new(&[Write(A::HighC, D::Slot(SLOT_A))], Commit::None),
        0xF2 => Decoded::new(&[Read(A::HighC, Z)], Commit::LoadZ(SLOT_A)),
        0xEA => Decoded::new(
            &[Immediate(Z), Immediate(W), Write(A::Wz, D::Slot(SLOT_A))],
            Commit::None,
        ),
        0xFA => Decoded::new(
            &[Immediate(Z), Immediate(W), Read(A::Wz, Z)],
            Commit::LoadZ(SLOT_A),
        ),
        0xE8 => Decoded::new(&[Immediate(Z), Idle, Idle], Commit::AddSp),
        0xF8 => Decoded::new(&[Immediate(Z), Idle], Commit::LdHlSpOffset),
        0xE9 => Decoded::new(&[], Commit::JumpHl),
        0xF9 => Decoded::new(&[Idle], Commit::LdSpHl),
        0xF3 => Decoded::new(&[], Commit::SetIme(false)),
        0xFB => Decoded::new(&[], Commit::SetIme(true)),
        _ => {
            debug_assert!(z == 3 || z == 4 || z == 5, "opcode {opcode:#04x} fell through");
            return None;
        }
    };
    Some(decoded)
}

/// Decodes the byte following a `0xCB` prefix.
pub fn decode_prefixed(sub: u8) -> Decoded {
    let x = sub >> 6;
    let y = (sub >> 3) & 0x07;
    let z = sub & 0x07;
    let memory = z == OPERAND_HL;

    match (x, memory) {
        (0, true) => Decoded::new(
            &[Read(A::Hl, Z), Write(A::Hl, D::Prefixed)],
            Commit::ShiftMemoryFlags(y),
        ),
        (0, false) => Decoded::new(&[], Commit::Shift { select: y, slot: z }),
        (1, true) => Decoded::new(
            &[Read(A::Hl, Z)],
            Commit::Bit {
                bit: y,
                operand: Operand::Z,
            },
        ),
        (1, false) => Decoded::new(
            &[],
            Commit::Bit {
                bit: y,
                operand: Operand::Slot(z),
            },
        ),
        (_, true) => Decoded::new(&[Read(A::Hl, Z), Write(A::Hl, D::Prefixed)], Commit::None),
        (2, false) => Decoded::new(&[], Commit::Res { bit: y, slot: z }),
        (_, false) => Decoded::new(&[], Commit::Set { bit: y, slot: z }),
    }
}

/// Evaluates a condition code against an `F` byte.
pub fn condition(cc: u8, flags: u8) -> bool {
    let z = flags & crate::alu::FLAG_Z != 0;
    let c = flags & crate::alu::FLAG_C != 0;
    match cc & 0x03 {
        0 => !z,
        1 => z,
        2 => !c,
        _ => c,
    }
}
