use model_abi::{BusAccess, BusLog, BusLogOverflow, BusTarget, InstructionWindow};

/// Memory bus abstraction used by the opcode helpers.
pub trait Bus {
    /// Reads an 8-bit value from the provided address.
    fn read8(&mut self, addr: u16) -> u8;
    /// Writes an 8-bit value to the provided address.
    fn write8(&mut self, addr: u16, value: u8);
}

/// Bus that serves the instruction window and records every write.
///
/// Writes are not applied to memory, so a later read of the same address
/// still sees the window (or open bus).
#[derive(Clone, Debug, Default)]
pub struct ProbeBus {
    window: InstructionWindow,
    log: BusLog,
    overflow: Option<BusLogOverflow>,
}

impl ProbeBus {
    pub fn new(window: InstructionWindow) -> Self {
        Self {
            window,
            log: BusLog::new(),
            overflow: None,
        }
    }

    /// Replaces the window and forgets all recorded activity.
    pub fn reset(&mut self, window: InstructionWindow) {
        self.window = window;
        self.log.clear();
        self.overflow = None;
    }

    /// Clears the log ahead of the next instruction.
    pub fn begin_instruction(&mut self) {
        self.log.clear();
        self.overflow = None;
    }

    /// Returns the overflow latched since the last `begin_instruction`, if any.
    pub fn take_overflow(&mut self) -> Option<BusLogOverflow> {
        self.overflow.take()
    }

    pub fn log(&self) -> &BusLog {
        &self.log
    }
}

impl Bus for ProbeBus {
    fn read8(&mut self, addr: u16) -> u8 {
        self.window.read(addr)
    }

    fn write8(&mut self, addr: u16, value: u8) {
        if let Err(err) = self.log.push(BusAccess::write(addr, value)) {
            self.overflow.get_or_insert(err);
        }
    }
}
