use core::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Maximum number of bus accesses recorded for one instruction.
pub const BUS_LOG_CAPACITY: usize = 16;

/// Value served for every address outside the instruction window.
pub const OPEN_BUS: u8 = 0xAA;

/// Direction of a bus access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// One observed memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusAccess {
    pub kind: AccessKind,
    pub addr: u16,
    pub value: u8,
}

impl BusAccess {
    /// Convenience constructor for a write access.
    pub fn write(addr: u16, value: u8) -> Self {
        Self {
            kind: AccessKind::Write,
            addr,
            value,
        }
    }
}

impl fmt::Display for BusAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        };
        write!(f, "Mem {kind}: addr={:04x} val={:02x}", self.addr, self.value)
    }
}

/// Raised when an instruction produces more accesses than the log can hold.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("bus log overflow: more than {BUS_LOG_CAPACITY} accesses in one instruction")]
pub struct BusLogOverflow;

/// Ordered, bounded record of the accesses made during one instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLog {
    entries: SmallVec<[BusAccess; BUS_LOG_CAPACITY]>,
}

impl BusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an access, refusing to grow past [`BUS_LOG_CAPACITY`].
    pub fn push(&mut self, access: BusAccess) -> Result<(), BusLogOverflow> {
        if self.entries.len() == BUS_LOG_CAPACITY {
            return Err(BusLogOverflow);
        }
        self.entries.push(access);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[BusAccess] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &BusAccess> {
        self.entries.iter()
    }
}

/// Memory seen by a model during a step.
pub trait BusTarget {
    /// Returns the byte served for a read of `addr`.
    fn read(&mut self, addr: u16) -> u8;
    /// Applies a write of `value` to `addr`.
    fn write(&mut self, addr: u16, value: u8);
}

/// The 4-byte instruction buffer mapped at address zero.
///
/// Reads below address 4 return the buffer, every other address returns
/// [`OPEN_BUS`]. Writes never modify the buffer: they only show up in the bus
/// log of whoever observed them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructionWindow {
    bytes: [u8; 4],
}

impl InstructionWindow {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.bytes
    }

    /// Returns the byte visible at `addr`.
    #[inline]
    pub fn peek(&self, addr: u16) -> u8 {
        match self.bytes.get(usize::from(addr)) {
            Some(byte) => *byte,
            None => OPEN_BUS,
        }
    }
}

impl BusTarget for InstructionWindow {
    fn read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn write(&mut self, _addr: u16, _value: u8) {}
}

/// Flat 64 KiB RAM used when running whole programs.
pub struct FlatMemory {
    bytes: Box<[u8; 0x10000]>,
}

impl FlatMemory {
    /// Creates zeroed memory with `image` copied to address zero.
    ///
    /// Bytes beyond the 64 KiB address space are ignored.
    pub fn with_image(image: &[u8]) -> Self {
        let mut bytes = Box::new([0u8; 0x10000]);
        let len = image.len().min(bytes.len());
        bytes[..len].copy_from_slice(&image[..len]);
        Self { bytes }
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.bytes[usize::from(addr)]
    }
}

impl BusTarget for FlatMemory {
    fn read(&mut self, addr: u16) -> u8 {
        self.bytes[usize::from(addr)]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.bytes[usize::from(addr)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_serves_buffer_then_open_bus() {
        let mut window = InstructionWindow::new([0x3C, 0x12, 0x34, 0x56]);
        assert_eq!(window.read(0), 0x3C);
        assert_eq!(window.read(3), 0x56);
        assert_eq!(window.read(4), OPEN_BUS);
        assert_eq!(window.read(0xFFFF), OPEN_BUS);
        window.write(1, 0x99);
        assert_eq!(window.read(1), 0x12, "writes must not alter the window");
    }

    #[test]
    fn log_rejects_access_past_capacity() {
        let mut log = BusLog::new();
        for i in 0..BUS_LOG_CAPACITY {
            log.push(BusAccess::write(i as u16, 0)).expect("within capacity");
        }
        assert_eq!(log.push(BusAccess::write(0, 0)), Err(BusLogOverflow));
        assert_eq!(log.len(), BUS_LOG_CAPACITY);
    }

    #[test]
    fn flat_memory_applies_writes() {
        let mut mem = FlatMemory::with_image(&[0x00, 0x76]);
        assert_eq!(mem.read(1), 0x76);
        mem.write(0xC000, 0x42);
        assert_eq!(mem.peek(0xC000), 0x42);
    }
}
