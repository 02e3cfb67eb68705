//! Opcode coverage accounting for both opcode spaces.

use serde::Serialize;

/// Primary opcodes with no instruction; `0xCB` is the prefix itself.
const INVALID_PRIMARY: [u8; 12] = [
    0xCB, 0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OpcodeSpace {
    Primary,
    /// Opcodes behind the `0xCB` prefix.
    Prefixed,
}

impl OpcodeSpace {
    pub fn is_valid(self, opcode: u8) -> bool {
        match self {
            OpcodeSpace::Primary => !INVALID_PRIMARY.contains(&opcode),
            OpcodeSpace::Prefixed => true,
        }
    }

    /// Prefix used in report lines, e.g. `Tested 256/256 CB opcodes`.
    pub fn label(self) -> &'static str {
        match self {
            OpcodeSpace::Primary => "",
            OpcodeSpace::Prefixed => "CB ",
        }
    }

    pub fn of(prefixed: bool) -> Self {
        if prefixed {
            OpcodeSpace::Prefixed
        } else {
            OpcodeSpace::Primary
        }
    }
}

/// Tested and valid opcode counts for one space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub tested: u16,
    pub valid: u16,
}

impl Tally {
    pub fn is_complete(&self) -> bool {
        self.tested == self.valid
    }
}

/// Which opcodes have passed at least one comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coverage {
    primary: [bool; 256],
    prefixed: [bool; 256],
}

impl Default for Coverage {
    fn default() -> Self {
        Self::new()
    }
}

impl Coverage {
    pub fn new() -> Self {
        Self {
            primary: [false; 256],
            prefixed: [false; 256],
        }
    }

    fn table(&self, space: OpcodeSpace) -> &[bool; 256] {
        match space {
            OpcodeSpace::Primary => &self.primary,
            OpcodeSpace::Prefixed => &self.prefixed,
        }
    }

    /// Records a passing comparison. Invalid opcodes are ignored so the
    /// tested count can never exceed the valid count.
    pub fn mark(&mut self, space: OpcodeSpace, opcode: u8) {
        if !space.is_valid(opcode) {
            return;
        }
        let table = match space {
            OpcodeSpace::Primary => &mut self.primary,
            OpcodeSpace::Prefixed => &mut self.prefixed,
        };
        table[usize::from(opcode)] = true;
    }

    pub fn is_tested(&self, space: OpcodeSpace, opcode: u8) -> bool {
        self.table(space)[usize::from(opcode)]
    }

    pub fn tally(&self, space: OpcodeSpace) -> Tally {
        let mut tally = Tally::default();
        for opcode in 0..=0xFFu8 {
            if space.is_valid(opcode) {
                tally.valid += 1;
                if self.is_tested(space, opcode) {
                    tally.tested += 1;
                }
            }
        }
        tally
    }

    /// Valid opcodes that have not been tested, ascending.
    pub fn untested(&self, space: OpcodeSpace) -> impl Iterator<Item = u8> + '_ {
        (0..=0xFFu8).filter(move |&op| space.is_valid(op) && !self.is_tested(space, op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_counts_match_opcode_map() {
        let coverage = Coverage::new();
        assert_eq!(
            coverage.tally(OpcodeSpace::Primary),
            Tally {
                tested: 0,
                valid: 244
            }
        );
        assert_eq!(coverage.tally(OpcodeSpace::Prefixed).valid, 256);
    }

    #[test]
    fn marking_is_idempotent_and_bounded() {
        let mut coverage = Coverage::new();
        coverage.mark(OpcodeSpace::Primary, 0x00);
        let once = coverage.clone();
        coverage.mark(OpcodeSpace::Primary, 0x00);
        assert_eq!(coverage, once);
        coverage.mark(OpcodeSpace::Primary, 0xD3);
        assert!(!coverage.is_tested(OpcodeSpace::Primary, 0xD3));
        assert_eq!(coverage.tally(OpcodeSpace::Primary).tested, 1);
        assert!(!coverage.is_tested(OpcodeSpace::Prefixed, 0x00));
    }

    #[test]
    fn untested_skips_invalid_and_tested() {
        let mut coverage = Coverage::new();
        for op in 0..=0xFFu8 {
            if op != 0x42 {
                coverage.mark(OpcodeSpace::Primary, op);
            }
        }
        assert_eq!(coverage.untested(OpcodeSpace::Primary).collect::<Vec<_>>(), vec![0x42]);
    }
}
