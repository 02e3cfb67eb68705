//! Half-cycle stepping of a clocked device through one instruction.
//!
//! Every tick toggles the clock and evaluates the device. On the high phase
//! the driver serves the presented address from the bus target and records a
//! write if the strobe is up. The step ends the first time the device reports
//! a retirement on the high phase.

use model_abi::{BusAccess, BusLog, BusLogOverflow, BusTarget, ClockedDevice};
use thiserror::Error;

/// Driver state between half-cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The next tick drives the clock low.
    DriveLow,
    /// The next tick drives the clock high.
    DriveHigh,
    /// An instruction retired; further ticks are no-ops.
    Retired,
    /// The device finished without retiring; further ticks are no-ops.
    Aborted,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("simulation finished after {cycles} cycles without retiring an instruction")]
    SimulationFinished { cycles: u32 },

    #[error(transparent)]
    BusLog(#[from] BusLogOverflow),
}

/// Explicit half-cycle state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stepper {
    phase: Phase,
    cycles: u32,
}

impl Stepper {
    /// Starts from the device's current clock level.
    pub fn new<D: ClockedDevice>(device: &D) -> Self {
        let phase = if device.clock() {
            Phase::DriveLow
        } else {
            Phase::DriveHigh
        };
        Self { phase, cycles: 0 }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Low-to-high transitions driven so far.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Advances one half-cycle.
    pub fn tick<D, M>(
        &mut self,
        device: &mut D,
        mem: &mut M,
        log: &mut BusLog,
    ) -> Result<Phase, DriverError>
    where
        D: ClockedDevice,
        M: BusTarget,
    {
        let high = match self.phase {
            Phase::Retired | Phase::Aborted => return Ok(self.phase),
            Phase::DriveLow => false,
            Phase::DriveHigh => true,
        };

        device.set_clock(high);
        device.eval();
        let signals = device.signals();
        if signals.finished {
            self.phase = Phase::Aborted;
            return Err(DriverError::SimulationFinished {
                cycles: self.cycles,
            });
        }
        if !high {
            self.phase = Phase::DriveHigh;
            return Ok(self.phase);
        }

        self.cycles += 1;
        device.supply_read(mem.read(signals.addr));
        if signals.write_enable {
            log::trace!(
                "write {:#06x} <- {:#04x} at cycle {}",
                signals.addr,
                signals.write_data,
                self.cycles
            );
            log.push(BusAccess::write(signals.addr, signals.write_data))?;
            mem.write(signals.addr, signals.write_data);
        }
        self.phase = if signals.instruction_retired {
            Phase::Retired
        } else {
            Phase::DriveLow
        };
        Ok(self.phase)
    }
}

/// Drives `device` until one instruction retires.
///
/// `log` receives the writes of this instruction; the caller clears it between
/// instructions. Returns the number of rising edges driven.
pub fn step_instruction<D, M>(device: &mut D, mem: &mut M, log: &mut BusLog) -> Result<u32, DriverError>
where
    D: ClockedDevice,
    M: BusTarget,
{
    let mut stepper = Stepper::new(device);
    while stepper.tick(device, mem, log)? != Phase::Retired {}
    Ok(stepper.cycles())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_abi::{ArchState, BusSignals, InstructionWindow, BUS_LOG_CAPACITY, OPEN_BUS};

    /// Scripted device: one entry of `script` per rising edge.
    #[derive(Default)]
    struct Scripted {
        clk: bool,
        prev: bool,
        edge: usize,
        script: Vec<BusSignals>,
        reads: Vec<u8>,
        current: BusSignals,
    }

    impl ClockedDevice for Scripted {
        fn reset(&mut self, _state: &ArchState) {}

        fn set_clock(&mut self, high: bool) {
            self.clk = high;
        }

        fn clock(&self) -> bool {
            self.clk
        }

        fn eval(&mut self) {
            if self.clk && !self.prev {
                self.current = self.script.get(self.edge).copied().unwrap_or(BusSignals {
                    finished: true,
                    ..BusSignals::default()
                });
                self.edge += 1;
            }
            self.prev = self.clk;
        }

        fn signals(&self) -> BusSignals {
            self.current
        }

        fn supply_read(&mut self, value: u8) {
            self.reads.push(value);
        }

        fn state(&self) -> ArchState {
            ArchState::canonical()
        }
    }

    fn fetch(addr: u16) -> BusSignals {
        BusSignals {
            addr,
            ..BusSignals::default()
        }
    }

    #[test]
    fn phases_alternate_until_retirement() {
        let mut device = Scripted {
            script: vec![
                fetch(0),
                fetch(1),
                BusSignals {
                    instruction_retired: true,
                    addr: 2,
                    ..BusSignals::default()
                },
            ],
            ..Scripted::default()
        };
        let mut window = InstructionWindow::new([0x11, 0x22, 0x33, 0x44]);
        let mut log = BusLog::new();
        let mut stepper = Stepper::new(&device);
        assert_eq!(stepper.phase(), Phase::DriveHigh);

        let mut seen = Vec::new();
        loop {
            let phase = stepper.tick(&mut device, &mut window, &mut log).unwrap();
            seen.push(phase);
            if phase == Phase::Retired {
                break;
            }
        }
        assert_eq!(
            seen,
            [
                Phase::DriveLow,
                Phase::DriveHigh,
                Phase::DriveLow,
                Phase::DriveHigh,
                Phase::Retired
            ]
        );
        assert_eq!(stepper.cycles(), 3);
        assert_eq!(device.reads, vec![0x11, 0x22, 0x33]);
        assert_eq!(
            stepper.tick(&mut device, &mut window, &mut log),
            Ok(Phase::Retired)
        );
    }

    #[test]
    fn writes_are_logged_in_order() {
        let write = |addr, value| BusSignals {
            addr,
            write_enable: true,
            write_data: value,
            ..BusSignals::default()
        };
        let mut device = Scripted {
            script: vec![
                fetch(0),
                write(0xFFFF, 0x12),
                BusSignals {
                    instruction_retired: true,
                    ..write(0xFFFE, 0x34)
                },
            ],
            ..Scripted::default()
        };
        let mut window = InstructionWindow::default();
        let mut log = BusLog::new();
        let cycles = step_instruction(&mut device, &mut window, &mut log).unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(
            log.as_slice(),
            &[BusAccess::write(0xFFFF, 0x12), BusAccess::write(0xFFFE, 0x34)]
        );
        assert_eq!(device.reads, vec![0x00, OPEN_BUS, OPEN_BUS]);
    }

    #[test]
    fn finished_device_aborts_with_cycle_count() {
        let mut device = Scripted {
            script: vec![fetch(0), fetch(1)],
            ..Scripted::default()
        };
        let mut window = InstructionWindow::default();
        let mut log = BusLog::new();
        let err = step_instruction(&mut device, &mut window, &mut log).unwrap_err();
        assert_eq!(err, DriverError::SimulationFinished { cycles: 2 });
    }

    #[test]
    fn write_storm_overflows_the_log() {
        let storm = BusSignals {
            write_enable: true,
            ..BusSignals::default()
        };
        let mut device = Scripted {
            script: vec![storm; BUS_LOG_CAPACITY + 1],
            ..Scripted::default()
        };
        let mut window = InstructionWindow::default();
        let mut log = BusLog::new();
        let err = step_instruction(&mut device, &mut window, &mut log).unwrap_err();
        assert_eq!(err, DriverError::BusLog(BusLogOverflow));
    }

    #[test]
    fn starts_low_when_clock_is_high() {
        let device = Scripted {
            clk: true,
            ..Scripted::default()
        };
        assert_eq!(Stepper::new(&device).phase(), Phase::DriveLow);
    }
}
