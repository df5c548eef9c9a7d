//! Service calls.

use vantage_arch::Word;

use super::super::super::Cpu;
use crate::parts::bios;
use crate::parts::bus::Bus;

/// Software interrupt: the immediate selects a firmware service.
///
/// The firmware layer is high-level emulated, so the call dispatches
/// directly instead of trapping through supervisor mode. Blocking services
/// rewind the program counter themselves so they re-execute on wake.
pub fn swi(cpu: &mut Cpu, bus: &mut Bus, selector: Word) {
    bios::dispatch(cpu, bus, selector);
    cpu.etc.cycles += 3;
}
