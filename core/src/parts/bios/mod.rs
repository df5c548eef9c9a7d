//! High-level emulated firmware.
//!
//! The firmware region carries a small amount of real code: the exception
//! vector branches into an interrupt trampoline that saves context, calls
//! the user handler installed at `0x03007FFC` from system mode, and returns
//! with `subs pc, lr, #4`. Everything else (the documented service calls)
//! is dispatched natively from the service-call opcode.

use log::{debug, warn};
use vantage_arch::mem::Rom;
use vantage_arch::{Half, Word};

use super::bus::Bus;
use super::cpu::arm7::{Cpu, PC, SP};

mod decomp;
mod math;

/// Firmware region size.
pub const SIZE: usize = 0x4000;

/// Interrupt-acknowledge word maintained for the wait services.
pub const ACK: Word = 0x0300_7ff8;
/// User interrupt handler pointer.
pub const HANDLER: Word = 0x0300_7ffc;
/// Header-valid marker written at boot.
pub const HEADER_OK: Word = 0x0300_7ffa;
/// Default user handler: a `bx lr` stub near the end of the region.
pub const STUB: Word = 0x0000_3ff0;

/// Builds the firmware region image.
///
/// The region is filled with no-ops; real code exists only at the interrupt
/// vector, the trampoline, and the default handler stub.
#[must_use]
pub fn image() -> Rom {
    let mut image = vec![0u8; SIZE];

    // NOP sled over the whole region.
    for i in 0..SIZE / 4 {
        let nop = 0xe1a0_0000u32.to_le_bytes();
        image[i * 4..i * 4 + 4].copy_from_slice(&nop);
    }

    let mut emit = |base: usize, words: &[Word]| {
        for (i, word) in words.iter().enumerate() {
            image[base + i * 4..base + i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
    };

    // Interrupt vector: branch to the trampoline.
    emit(0x18, &[0xea00_0058]);

    // Interrupt trampoline.
    emit(
        0x180,
        &[
            0xe92d_500f, // stmdb sp!, {r0-r3, r12, lr}
            0xe3a0_0301, // mov   r0, #0x04000000
            0xe280_0c02, // add   r0, r0, #0x200
            0xe1d0_10b0, // ldrh  r1, [r0]          ; enable mask
            0xe1d0_20b2, // ldrh  r2, [r0, #2]      ; request flags
            0xe001_1002, // and   r1, r1, r2
            0xe59f_303c, // ldr   r3, =ACK
            0xe1d3_20b0, // ldrh  r2, [r3]
            0xe182_2001, // orr   r2, r2, r1
            0xe1c3_20b0, // strh  r2, [r3]          ; publish to the waiters
            0xe321_f09f, // msr   cpsr_c, #0x9f     ; system mode, irqs masked
            0xe92d_4000, // stmdb sp!, {lr}
            0xe59f_3020, // ldr   r3, =ACK
            0xe593_3004, // ldr   r3, [r3, #4]      ; user handler
            0xe28f_e000, // add   lr, pc, #0
            0xe12f_ff13, // bx    r3
            0xe8bd_4000, // ldmia sp!, {lr}
            0xe321_f092, // msr   cpsr_c, #0x92     ; interrupt mode
            0xe8bd_500f, // ldmia sp!, {r0-r3, r12, lr}
            0xe25e_f004, // subs  pc, lr, #4
            0xe1a0_0000, // nop
            0xe1a0_0000, // nop
            ACK,         // literal pool
            ACK,
        ],
    );

    // Default user handler: return immediately.
    emit(STUB as usize, &[0xe12f_ff1e]); // bx lr

    Rom::from(image)
}

/// Dispatches a firmware service call by selector.
#[allow(clippy::too_many_lines)]
pub fn dispatch(cpu: &mut Cpu, bus: &mut Bus, selector: Word) {
    debug!("service call {selector:#04x}");
    match selector {
        0x00 => soft_reset(cpu),
        0x01 => ram_reset(cpu, bus),
        // Halt and stop both idle until an interrupt arrives.
        0x02 | 0x03 => cpu.etc.halted = true,
        0x04 => intr_wait(cpu, bus),
        0x05 => {
            // Convenience form: wait on a fresh vertical blank.
            let stat = bus.io.read_16(0x004);
            bus.io.write_16(0x004, stat | 0x0008);
            cpu.reg.set(0, 1);
            cpu.reg.set(1, 1);
            intr_wait(cpu, bus);
        }
        0x06 => math::div(cpu, cpu.reg.get(0), cpu.reg.get(1)),
        0x07 => math::div(cpu, cpu.reg.get(1), cpu.reg.get(0)),
        0x08 => cpu.reg.set(0, math::sqrt(cpu.reg.get(0))),
        0x09 => math::arctan(cpu),
        0x0a => math::arctan2(cpu),
        0x0b => cpu_set(cpu, bus),
        0x0c => cpu_fast_set(cpu, bus),
        0x0d => cpu.reg.set(0, 0xbaae_187f), // firmware checksum
        0x0e => math::bg_affine_set(cpu, bus),
        0x0f => math::obj_affine_set(cpu, bus),
        0x10 => decomp::bit_unpack(cpu, bus),
        0x11 => decomp::lz77(cpu, bus, false),
        0x12 => decomp::lz77(cpu, bus, true),
        0x13 => decomp::huffman(cpu, bus),
        0x14 => decomp::run_length(cpu, bus, false),
        0x15 => decomp::run_length(cpu, bus, true),
        0x16 | 0x17 => decomp::diff_8(cpu, bus),
        0x18 => decomp::diff_16(cpu, bus),
        0x19 => {
            // Sound bias adjustment; the level lands in the bias register.
            bus.io.apu.bias = cpu.reg.get(0) as Half & 0x3fe;
        }
        0x1f => math::midi_key_to_freq(cpu),
        _ => warn!("unimplemented service call {selector:#04x}"),
    }
}

/// Rewinds the program counter so the executing service re-runs on wake.
fn rewind(cpu: &mut Cpu) {
    let width = if cpu.reg.cpsr.thumb() { 2 } else { 4 };
    cpu.reg.r[PC] = cpu.reg.r[PC].wrapping_sub(width);
}

/// Soft reset: back to the cartridge entry point with a fresh stack.
fn soft_reset(cpu: &mut Cpu) {
    cpu.reg.set(SP, 0x0300_7f00);
    cpu.reg.cpsr = cpu.reg.cpsr.with_thumb(false);
    cpu.jump(0x0800_0000);
}

/// Register/RAM reset: clears the regions selected by the flag bits.
fn ram_reset(cpu: &mut Cpu, bus: &mut Bus) {
    let flags = cpu.reg.get(0);
    if flags & 0x01 != 0 {
        bus.ewram.clear();
    }
    if flags & 0x02 != 0 {
        // Work RAM, excluding the firmware scratch words at the top.
        for offset in 0..0x7e00 {
            bus.iwram.store_8(offset, 0);
        }
    }
    if flags & 0x04 != 0 {
        bus.palette.clear();
    }
    if flags & 0x08 != 0 {
        bus.vram.clear();
    }
    if flags & 0x10 != 0 {
        bus.oam.clear();
    }
    if flags & 0x80 != 0 {
        // Reset the video, sound, and transfer registers to defaults.
        bus.io.write_16(0x004, 0);
        for offset in (0x008..=0x00e).step_by(2) {
            bus.io.write_16(offset, 0);
        }
        for offset in (0x060..=0x0a6).step_by(2) {
            bus.io.write_16(offset, 0);
        }
        for offset in (0x0b0..=0x0de).step_by(2) {
            bus.io.write_16(offset, 0);
        }
    }
}

/// Interrupt wait: sleep until one of the selected interrupts fires.
///
/// Publishes through the acknowledge word the trampoline maintains. Blocks
/// by rewinding the program counter and halting, so the service re-executes
/// after each wake until its condition holds.
fn intr_wait(cpu: &mut Cpu, bus: &mut Bus) {
    let wait = cpu.reg.get(1) as Half;
    if cpu.reg.get(0) != 0 {
        // Discard stale acknowledgements, once.
        let ack = bus.read_16(ACK);
        bus.write_16(ACK, ack & !wait);
        cpu.reg.set(0, 0);
    }

    let ack = bus.read_16(ACK);
    if ack & wait != 0 {
        bus.write_16(ACK, ack & !wait);
        return;
    }

    // The service forces the master enable; the caller is responsible for
    // the individual enable bits.
    bus.io.pic.ime = 1;
    cpu.reg.cpsr = cpu.reg.cpsr.with_irq_mask(false);
    cpu.etc.halted = true;
    rewind(cpu);
}

/// Block copy/fill in halfwords or words.
fn cpu_set(cpu: &mut Cpu, bus: &mut Bus) {
    let mut src = cpu.reg.get(0);
    let mut dst = cpu.reg.get(1);
    let ctrl = cpu.reg.get(2);
    let count = ctrl & 0x1f_ffff;
    let fill = ctrl & (1 << 24) != 0;
    let wide = ctrl & (1 << 26) != 0;

    if wide {
        let fixed = if fill { bus.read_32(src & !3) } else { 0 };
        for i in 0..count {
            let value = if fill { fixed } else { bus.read_32(src & !3) };
            bus.write_32(dst & !3, value);
            dst = dst.wrapping_add(4);
            if !fill {
                src = src.wrapping_add(4);
            }
            pace(bus, i, 4);
        }
        drain(bus, count, 4);
    } else {
        let fixed = if fill { bus.read_16(src & !1) } else { 0 };
        for i in 0..count {
            let value = if fill { fixed } else { bus.read_16(src & !1) };
            bus.write_16(dst & !1, value);
            dst = dst.wrapping_add(2);
            if !fill {
                src = src.wrapping_add(2);
            }
            pace(bus, i, 2);
        }
        drain(bus, count, 2);
    }
}

/// Word-wise block copy/fill; the unit count rounds to a multiple of 8.
fn cpu_fast_set(cpu: &mut Cpu, bus: &mut Bus) {
    let mut src = cpu.reg.get(0);
    let mut dst = cpu.reg.get(1);
    let ctrl = cpu.reg.get(2);
    let count = (ctrl & 0x1f_ffff) / 8 * 8;
    let fill = ctrl & (1 << 24) != 0;

    let fixed = if fill { bus.read_32(src & !3) } else { 0 };
    for i in 0..count {
        let value = if fill { fixed } else { bus.read_32(src & !3) };
        bus.write_32(dst & !3, value);
        dst = dst.wrapping_add(4);
        if !fill {
            src = src.wrapping_add(4);
        }
        pace(bus, i, 4);
    }
    drain(bus, count, 4);
}

/// Batch size for peripheral pacing during long block services.
const BATCH: Word = 64;

/// Advances peripherals after each batch of transferred units, so a long
/// copy cannot starve the video unit of blanking progress.
fn pace(bus: &mut Bus, unit: Word, cost: Word) {
    if (unit + 1) % BATCH == 0 {
        bus.tick(cost * BATCH);
    }
}

/// Advances peripherals for the final partial batch.
fn drain(bus: &mut Bus, count: Word, cost: Word) {
    bus.tick(cost * (count % BATCH) + 2);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Cpu, Bus) {
        (Cpu::new(), Bus::new(image()))
    }

    #[test]
    fn image_installs_vector_and_trampoline() {
        let rom = image();
        assert_eq!(rom.load_32(0x18), 0xea00_0058);
        assert_eq!(rom.load_32(0x180), 0xe92d_500f);
        assert_eq!(rom.load_32(0x1cc), 0xe25e_f004);
        assert_eq!(rom.load_32(0x1d8), ACK);
        assert_eq!(rom.load_32(STUB as usize), 0xe12f_ff1e);
    }

    #[test]
    fn halt_sets_the_flag() {
        let (mut cpu, mut bus) = setup();
        dispatch(&mut cpu, &mut bus, 0x02);
        assert!(cpu.etc.halted);
    }

    #[test]
    fn intr_wait_halts_and_rewinds() {
        let (mut cpu, mut bus) = setup();
        cpu.reg.r[PC] = 0x0800_0004; // past the service opcode
        cpu.reg.set(0, 1);
        cpu.reg.set(1, 1);
        dispatch(&mut cpu, &mut bus, 0x04);
        assert!(cpu.etc.halted);
        assert_eq!(cpu.reg.r[PC], 0x0800_0000);
        assert_eq!(bus.io.pic.ime, 1);
        // After the acknowledge word fills in, the re-executed service
        // completes and consumes the bit.
        bus.write_16(ACK, 1);
        cpu.etc.halted = false;
        cpu.reg.r[PC] = 0x0800_0004;
        dispatch(&mut cpu, &mut bus, 0x04);
        assert!(!cpu.etc.halted);
        assert_eq!(bus.read_16(ACK), 0);
    }

    #[test]
    fn cpu_set_fills_and_copies() {
        let (mut cpu, mut bus) = setup();
        bus.write_32(0x0300_0000, 0x5555_aaaa);
        // Fill 8 words.
        cpu.reg.set(0, 0x0300_0000);
        cpu.reg.set(1, 0x0200_0000);
        cpu.reg.set(2, 8 | (1 << 24) | (1 << 26));
        dispatch(&mut cpu, &mut bus, 0x0b);
        for i in 0..8 {
            assert_eq!(bus.read_32(0x0200_0000 + i * 4), 0x5555_aaaa);
        }
        // Copy halfwords back.
        cpu.reg.set(0, 0x0200_0000);
        cpu.reg.set(1, 0x0200_0100);
        cpu.reg.set(2, 4);
        dispatch(&mut cpu, &mut bus, 0x0b);
        assert_eq!(bus.read_32(0x0200_0100), 0x5555_aaaa);
        assert_eq!(bus.read_32(0x0200_0104), 0x5555_aaaa);
    }

    #[test]
    fn ram_reset_clears_selected_regions() {
        let (mut cpu, mut bus) = setup();
        bus.write_32(0x0200_0000, 0x1234_5678);
        bus.write_32(0x0300_0000, 0x1234_5678);
        bus.write_32(0x0300_7ff8, 0xdddd_dddd);
        cpu.reg.set(0, 0x03);
        dispatch(&mut cpu, &mut bus, 0x01);
        assert_eq!(bus.read_32(0x0200_0000), 0);
        assert_eq!(bus.read_32(0x0300_0000), 0);
        // Scratch words above the cleared window survive.
        assert_eq!(bus.read_32(0x0300_7ff8), 0xdddd_dddd);
    }
}
