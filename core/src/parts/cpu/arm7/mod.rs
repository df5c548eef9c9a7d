//! ARM7 processor core.
//!
//! A dual-mode interpreter: the 32-bit instruction set and the 16-bit
//! compressed set share one register file and the same execution families.
//! The three-stage pipeline is modelled only where it is architecturally
//! visible: the program counter reads two instruction widths ahead of the
//! executing instruction.

use std::collections::VecDeque;

use bitfield_struct::bitfield;
use log::{debug, error, trace};

use vantage_arch::{Block, Word};

use crate::api::part::proc::Processor;
use crate::parts::bus::Bus;

pub mod insn;

/// Stack pointer register index.
pub const SP: usize = 13;
/// Link register index.
pub const LR: usize = 14;
/// Program counter register index.
pub const PC: usize = 15;

/// Interrupt exception vector.
const VEC_IRQ: Word = 0x0000_0018;

/// Emulated cycles after which an unmoving program counter is treated as a
/// crash (~10 s at 16.78 MHz).
const STALL_LIMIT: u64 = 167_800_000;

/// Depth of the branch trace kept for crash records.
const TRACE_DEPTH: usize = 50;

/// Operating mode.
#[must_use]
#[rustfmt::skip]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    /// User mode.
    Usr = 0x10,
    /// Fast-interrupt mode.
    Fiq = 0x11,
    /// Interrupt mode.
    Irq = 0x12,
    /// Supervisor mode.
    Svc = 0x13,
    /// Abort mode.
    Abt = 0x17,
    /// Undefined-instruction mode.
    Und = 0x1b,
    /// System mode (privileged; shares the user bank).
    #[default]
    Sys = 0x1f,
}

impl Mode {
    /// Decodes the five mode-selector bits.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x1f {
            0x11 => Self::Fiq,
            0x12 => Self::Irq,
            0x13 => Self::Svc,
            0x17 => Self::Abt,
            0x1b => Self::Und,
            0x1f => Self::Sys,
            _ => Self::Usr,
        }
    }

    /// Encodes the five mode-selector bits.
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Index of this mode's banked registers.
    const fn bank(self) -> usize {
        match self {
            Self::Usr | Self::Sys => 0,
            Self::Fiq => 1,
            Self::Irq => 2,
            Self::Svc => 3,
            Self::Abt => 4,
            Self::Und => 5,
        }
    }
}

/// Program status word.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Psr {
    /// `PSR[4:0]`: Mode selector.
    #[bits(5)]
    pub mode: Mode,
    /// `PSR[5]`: Compressed (16-bit) instruction set selected.
    pub thumb: bool,
    /// `PSR[6]`: Fast-interrupt mask.
    pub fiq_mask: bool,
    /// `PSR[7]`: Interrupt mask.
    pub irq_mask: bool,
    #[bits(20)]
    __: u32,
    /// `PSR[28]`: Overflow flag.
    pub v: bool,
    /// `PSR[29]`: Carry flag.
    pub c: bool,
    /// `PSR[30]`: Zero flag.
    pub z: bool,
    /// `PSR[31]`: Negative flag.
    pub n: bool,
}

/// Processor registers.
#[derive(Debug)]
pub struct Registers {
    /// Active register file; the last entry is the program counter.
    pub r: [Word; 16],
    /// Current status word.
    pub cpsr: Psr,
    /// Saved status word of the active privileged mode.
    pub spsr: Psr,
    /// Banked R13/R14 per mode class.
    bank: [[Word; 2]; 6],
    /// Banked saved status per mode class.
    spsr_bank: [Psr; 6],
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            r: [0; 16],
            cpsr: Psr::new().with_mode(Mode::Sys),
            spsr: Psr::new(),
            bank: [[0; 2]; 6],
            spsr_bank: [Psr::new(); 6],
        }
    }
}

impl Registers {
    /// Reads a register as an instruction operand.
    ///
    /// The program counter reads one instruction width ahead of its stored
    /// value (two widths ahead of the executing instruction).
    #[must_use]
    pub fn get(&self, idx: usize) -> Word {
        if idx == PC {
            self.r[PC] + if self.cpsr.thumb() { 2 } else { 4 }
        } else {
            self.r[idx]
        }
    }

    /// Writes a register.
    pub fn set(&mut self, idx: usize, value: Word) {
        self.r[idx] = value;
    }

    /// Swaps the active R13/R14 view for a mode change.
    fn swap_bank(&mut self, from: Mode, to: Mode) {
        let (from, to) = (from.bank(), to.bank());
        if from == to {
            return;
        }
        self.bank[from] = [self.r[SP], self.r[LR]];
        self.spsr_bank[from] = self.spsr;
        [self.r[SP], self.r[LR]] = self.bank[to];
        self.spsr = self.spsr_bank[to];
    }
}

/// Processor internals.
#[derive(Debug, Default)]
pub struct Internal {
    /// Halted awaiting an interrupt.
    pub halted: bool,
    /// Crash-grade fault encountered; stepping is suspended.
    pub crashed: bool,
    /// Cycle cost accumulator for the executing instruction.
    cycles: Word,
    /// Recent branches, oldest first.
    branches: VecDeque<(Word, Word)>,
    /// Previously executed address, for stall detection.
    stall_pc: Word,
    /// Cycles accumulated at an unmoving program counter.
    stall: u64,
    /// Captured crash state.
    pub crash: Option<Crash>,
}

/// Crash record captured on an invalid-PC fault.
#[derive(Clone, Debug)]
pub struct Crash {
    /// Faulting program counter.
    pub pc: Word,
    /// Register file at the fault.
    pub regs: [Word; 16],
    /// Status word at the fault.
    pub cpsr: Word,
    /// Recent branches, oldest first.
    pub branches: Vec<(Word, Word)>,
    /// Words around the stack pointer.
    pub stack: Vec<Word>,
}

/// Central processing unit.
#[derive(Debug, Default)]
pub struct Cpu {
    /// Processor registers.
    pub reg: Registers,
    /// Processor internals.
    pub etc: Internal,
}

impl Cpu {
    /// Constructs a new `Cpu` in its direct-boot state.
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self::default();
        cpu.boot();
        cpu
    }

    /// Initializes the register file to the post-firmware state.
    pub fn boot(&mut self) {
        self.reg = Registers::default();
        self.etc = Internal::default();
        // Stacks the firmware would have installed.
        self.reg.bank[Mode::Irq.bank()] = [0x0300_7fa0, 0];
        self.reg.bank[Mode::Svc.bank()] = [0x0300_7fe0, 0];
        self.reg.r[SP] = 0x0300_7f00;
        // Direct boot to the cartridge entry point.
        self.reg.r[PC] = 0x0800_0000;
    }

    /// Executes one instruction, returning its cycle cost.
    ///
    /// Checks for a pending interrupt first; while halted, returns zero so
    /// the caller can advance peripherals in quanta until one arrives.
    pub fn step(&mut self, bus: &mut Bus) -> Word {
        if self.etc.crashed {
            return 0;
        }

        // A pending enabled interrupt always wakes the core; whether the
        // exception is taken also depends on the master enable and mask.
        let pending = bus.io.pic.pending() != 0;
        if pending {
            self.etc.halted = false;
            if bus.io.pic.enabled() && !self.reg.cpsr.irq_mask() {
                self.interrupt();
            }
        }
        if self.etc.halted {
            return 0;
        }

        // Mirror, then validate, the fetch address.
        let pc = Self::canonical(self.reg.r[PC]);
        if !Self::executable(pc) {
            error!("invalid program counter: {pc:#010x}");
            self.crash(bus, pc);
            return 0;
        }
        self.reg.r[PC] = pc;
        self.watch_stall(bus, pc);
        if self.etc.crashed {
            return 0;
        }

        self.etc.cycles = 0;
        if self.reg.cpsr.thumb() {
            self.etc.cycles += bus.cycles_for(pc, 2);
            let code = bus.fetch_16(pc);
            self.reg.r[PC] = pc.wrapping_add(2);
            trace!("{pc:#010x}: {code:#06x}");
            insn::thumb(self, bus, code);
        } else {
            self.etc.cycles += bus.cycles_for(pc, 4);
            let code = bus.fetch_32(pc);
            self.reg.r[PC] = pc.wrapping_add(4);
            trace!("{pc:#010x}: {code:#010x}");
            insn::arm(self, bus, code);
        }
        self.etc.cycles
    }

    /// Applies the work-RAM, video-RAM, and ROM mirrors to a fetch address.
    fn canonical(pc: Word) -> Word {
        match pc {
            0x0300_8000..=0x03ff_ffff => 0x0300_0000 | (pc & 0x7fff),
            0x0204_0000..=0x02ff_ffff => 0x0200_0000 | (pc & 0x3_ffff),
            0x0601_8000..=0x06ff_ffff => 0x0600_0000 | ((pc & 0xff_ffff) % 0x1_8000),
            0x0800_0000..=0x0fff_ffff => 0x0800_0000 | (pc & 0x1ff_ffff),
            _ => pc,
        }
    }

    /// Checks whether an address lies in an executable region.
    fn executable(pc: Word) -> bool {
        matches!(
            pc,
            0x0000_0000..=0x0000_3fff
                | 0x0200_0000..=0x0203_ffff
                | 0x0300_0000..=0x0300_7fff
                | 0x0600_0000..=0x0601_7fff
                | 0x0800_0000..=0x0fff_ffff
        )
    }

    /// Accumulates time spent at one address, treating a long stall as a
    /// crash-equivalent fault.
    fn watch_stall(&mut self, bus: &mut Bus, pc: Word) {
        if pc == self.etc.stall_pc {
            self.etc.stall += u64::from(self.etc.cycles.max(1));
            if self.etc.stall > STALL_LIMIT {
                error!("program counter stalled at {pc:#010x}");
                self.crash(bus, pc);
            }
        } else {
            self.etc.stall_pc = pc;
            self.etc.stall = 0;
        }
    }

    /// Captures a crash record and suspends execution.
    fn crash(&mut self, bus: &mut Bus, pc: Word) {
        let sp = self.reg.r[SP];
        let stack = (0..16u32)
            .map(|i| bus.read_32(sp.wrapping_add(i * 4)))
            .collect();
        self.etc.crash = Some(Crash {
            pc,
            regs: self.reg.r,
            cpsr: self.reg.cpsr.into_bits(),
            branches: self.etc.branches.iter().copied().collect(),
            stack,
        });
        self.etc.crashed = true;
        self.etc.halted = true;
    }

    /// Switches the operating mode, rebanking R13/R14 and the saved status.
    pub fn switch_mode(&mut self, mode: Mode) {
        let old = self.reg.cpsr.mode();
        if old == mode {
            return;
        }
        self.reg.swap_bank(old, mode);
        self.reg.cpsr = self.reg.cpsr.with_mode(mode);
    }

    /// Enters the interrupt exception.
    fn interrupt(&mut self) {
        let old = self.reg.cpsr;
        debug!("interrupt taken at {:#010x}", self.reg.r[PC]);
        self.switch_mode(Mode::Irq);
        self.reg.spsr = old;
        // Return address chosen so `subs pc, lr, #4` re-executes the
        // interrupted instruction in either width.
        self.reg.r[LR] = self.reg.r[PC].wrapping_add(4);
        self.reg.cpsr = self.reg.cpsr.with_thumb(false).with_irq_mask(true);
        self.jump(VEC_IRQ);
        self.etc.cycles += 3;
    }

    /// Restores the saved status word, switching bank and width atomically.
    ///
    /// This is the privileged-return path used when the program counter is
    /// written with the S bit set.
    pub(super) fn restore_cpsr(&mut self) {
        let spsr = self.reg.spsr;
        let old = self.reg.cpsr.mode();
        if old != spsr.mode() {
            self.reg.swap_bank(old, spsr.mode());
        }
        self.reg.cpsr = spsr;
    }

    /// Branches to `target`, recording the edge and aligning per the active
    /// instruction width.
    pub(crate) fn jump(&mut self, target: Word) {
        let from = self.reg.r[PC];
        let target = if self.reg.cpsr.thumb() {
            target & !1
        } else {
            target & !3
        };
        self.etc.branches.push_back((from, target));
        if self.etc.branches.len() > TRACE_DEPTH {
            self.etc.branches.pop_front();
        }
        self.reg.r[PC] = target;
        // Pipeline refill.
        self.etc.cycles += 2;
    }

    /// Branches to `target`, selecting the instruction width from bit 0.
    pub(super) fn exchange(&mut self, target: Word) {
        self.reg.cpsr = self.reg.cpsr.with_thumb(target & 1 != 0);
        self.jump(target);
    }

    /// Checks a condition code against the flags.
    #[must_use]
    pub fn condition(&self, cond: Word) -> bool {
        let psr = self.reg.cpsr;
        match cond {
            0x0 => psr.z(),
            0x1 => !psr.z(),
            0x2 => psr.c(),
            0x3 => !psr.c(),
            0x4 => psr.n(),
            0x5 => !psr.n(),
            0x6 => psr.v(),
            0x7 => !psr.v(),
            0x8 => psr.c() && !psr.z(),
            0x9 => !psr.c() || psr.z(),
            0xa => psr.n() == psr.v(),
            0xb => psr.n() != psr.v(),
            0xc => !psr.z() && psr.n() == psr.v(),
            0xd => psr.z() || psr.n() != psr.v(),
            0xe => true,
            // Reserved "never": treated as a no-op.
            _ => false,
        }
    }

    /// Reads a byte, charging access cycles.
    pub(super) fn read_8(&mut self, bus: &mut Bus, addr: Word) -> Word {
        self.etc.cycles += bus.cycles_for(addr, 1);
        Word::from(bus.read_8(addr))
    }

    /// Reads a halfword, charging access cycles.
    pub(super) fn read_16(&mut self, bus: &mut Bus, addr: Word) -> Word {
        self.etc.cycles += bus.cycles_for(addr, 2);
        Word::from(bus.read_16(addr))
    }

    /// Reads a word, charging access cycles.
    pub(super) fn read_32(&mut self, bus: &mut Bus, addr: Word) -> Word {
        self.etc.cycles += bus.cycles_for(addr, 4);
        bus.read_32(addr)
    }

    /// Writes a byte, charging access cycles.
    pub(super) fn write_8(&mut self, bus: &mut Bus, addr: Word, data: Word) {
        self.etc.cycles += bus.cycles_for(addr, 1);
        bus.write_8(addr, data as u8);
    }

    /// Writes a halfword, charging access cycles.
    pub(super) fn write_16(&mut self, bus: &mut Bus, addr: Word, data: Word) {
        self.etc.cycles += bus.cycles_for(addr, 2);
        bus.write_16(addr, data as u16);
    }

    /// Writes a word, charging access cycles.
    pub(super) fn write_32(&mut self, bus: &mut Bus, addr: Word, data: Word) {
        self.etc.cycles += bus.cycles_for(addr, 4);
        bus.write_32(addr, data);
    }
}

impl Block for Cpu {
    fn ready(&self) -> bool {
        !self.etc.halted && !self.etc.crashed
    }

    fn reset(&mut self) {
        self.boot();
    }
}

impl Processor for Cpu {
    fn goto(&mut self, pc: u32) {
        self.reg.r[PC] = pc;
    }

    fn wake(&mut self) {
        self.etc.halted = false;
    }

    fn halted(&self) -> bool {
        self.etc.halted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pc_reads_one_width_ahead() {
        let mut cpu = Cpu::new();
        cpu.reg.r[PC] = 0x0800_0004;
        assert_eq!(cpu.reg.get(PC), 0x0800_0008);
        cpu.reg.cpsr = cpu.reg.cpsr.with_thumb(true);
        assert_eq!(cpu.reg.get(PC), 0x0800_0006);
    }

    #[test]
    fn mode_switch_swaps_sp_and_lr() {
        let mut cpu = Cpu::new();
        let sys_sp = cpu.reg.r[SP];
        cpu.switch_mode(Mode::Irq);
        assert_eq!(cpu.reg.r[SP], 0x0300_7fa0);
        cpu.reg.r[SP] = 0x0300_7f90;
        cpu.switch_mode(Mode::Sys);
        assert_eq!(cpu.reg.r[SP], sys_sp);
        cpu.switch_mode(Mode::Irq);
        assert_eq!(cpu.reg.r[SP], 0x0300_7f90);
    }

    #[test]
    fn canonical_applies_mirrors() {
        assert_eq!(Cpu::canonical(0x0300_8000), 0x0300_0000);
        assert_eq!(Cpu::canonical(0x0204_0000), 0x0200_0000);
        assert_eq!(Cpu::canonical(0x0a00_0123), 0x0800_0123);
        assert_eq!(Cpu::canonical(0x0601_8004), 0x0600_0004);
    }

    #[test]
    fn condition_codes_follow_flags() {
        let mut cpu = Cpu::new();
        cpu.reg.cpsr = cpu.reg.cpsr.with_z(true).with_c(true);
        assert!(cpu.condition(0x0)); // EQ
        assert!(!cpu.condition(0x1)); // NE
        assert!(cpu.condition(0x2)); // CS
        assert!(!cpu.condition(0x8)); // HI (C && !Z)
        assert!(cpu.condition(0xd)); // LE (Z)
        assert!(!cpu.condition(0xf)); // reserved: never
    }
}
