use vantage_arch::{Half, Word};

use super::*;
use crate::api::part::proc::Processor;
use crate::parts::cart::header::Header;
use crate::parts::cpu::arm7::{PC, SP};

/// Builds a bootable ROM image with `code` at the entry point.
fn rom_with(code: &[Word]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x4000];
    for (i, word) in code.iter().enumerate() {
        rom[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    rom[0xa0..0xa4].copy_from_slice(b"TEST");
    rom[0xbd] = Header::hchk(&rom);
    rom
}

/// Builds a bootable ROM image with compressed-set `code` at the entry.
fn rom_with_thumb(code: &[Half]) -> Vec<u8> {
    let words: Vec<Word> = code
        .chunks(2)
        .map(|pair| Word::from(pair[0]) | (Word::from(*pair.get(1).unwrap_or(&0)) << 16))
        .collect();
    rom_with(&words)
}

fn boot(code: &[Word]) -> GameBoyAdvance {
    let mut agb = GameBoyAdvance::new();
    agb.load_rom(&rom_with(code)).unwrap();
    agb
}

#[test]
fn direct_boot_lands_on_the_entry_point() {
    let agb = boot(&[0xe1a0_0000]);
    assert_eq!(agb.cpu().reg.r[PC], 0x0800_0000);
    assert!(!agb.cpu().reg.cpsr.thumb());
    assert_eq!(agb.cpu().reg.r[SP], 0x0300_7f00);
}

#[test]
fn header_marker_reflects_checksum() {
    let agb = boot(&[0xe1a0_0000]);
    assert_eq!(agb.bus().iwram.load_8(0x7ffa), 1);

    let mut rom = rom_with(&[0xe1a0_0000]);
    rom[0xbd] ^= 0xff;
    let mut agb = GameBoyAdvance::new();
    agb.load_rom(&rom).unwrap();
    assert_eq!(agb.bus().iwram.load_8(0x7ffa), 0);
}

#[test]
fn rotated_immediate_move() {
    // mov r0, #0x0200, ror #8: loads 0x02000000.
    let mut agb = boot(&[0xe3a0_0402]);
    agb.step();
    assert_eq!(agb.cpu().reg.get(0), 0x0200_0000);
}

#[test]
fn block_transfer_with_writeback() {
    let mut agb = boot(&[
        0xe3a0_0402, // mov r0, #0x02000000
        0xe3a0_1010, // mov r1, #0x10
        0xe3a0_2020, // mov r2, #0x20
        0xe8a0_0006, // stmia r0!, {r1, r2}
        0xe3a0_1000, // mov r1, #0
        0xe3a0_2000, // mov r2, #0
        0xe3a0_0402, // mov r0, #0x02000000
        0xe8b0_0006, // ldmia r0!, {r1, r2}
    ]);
    for _ in 0..8 {
        agb.step();
    }
    assert_eq!(agb.cpu().reg.get(1), 0x10);
    assert_eq!(agb.cpu().reg.get(2), 0x20);
    assert_eq!(agb.cpu().reg.get(0), 0x0200_0008);
    assert_eq!(agb.bus_mut().read_32(0x0200_0000), 0x10);
    assert_eq!(agb.bus_mut().read_32(0x0200_0004), 0x20);
}

#[test]
fn mode3_pixel_reaches_framebuffer() {
    let mut agb = boot(&[0xea00_0000 | 0x00ff_fffe]); // spin in place
    // Mode 3 with background 2 enabled.
    agb.bus_mut().write_16(0x0400_0000, 0x0403);
    let offset = (10 * 240 + 20) * 2;
    agb.bus_mut().write_16(0x0600_0000 + offset, 0x7fff);
    agb.frame();
    let pixel = agb.framebuffer()[10 * 240 + 20];
    assert_eq!(pixel, 0xfff8_f8f8);
    // An untouched pixel shows the backdrop (palette entry zero: black).
    assert_eq!(agb.framebuffer()[0], 0xff00_0000);
}

#[test]
fn halt_service_wakes_on_vblank_interrupt() {
    let mut agb = boot(&[
        0xe3a0_0301, // mov r0, #0x04000000
        0xe3a0_1008, // mov r1, #8
        0xe1c0_10b4, // strh r1, [r0, #4]   ; dispstat: vblank irq
        0xe3a0_1001, // mov r1, #1
        0xe280_2c02, // add r2, r0, #0x200
        0xe1c2_10b0, // strh r1, [r2]       ; ie = vblank
        0xe1c2_10b8, // strh r1, [r2, #8]   ; ime = 1
        0xef02_0000, // swi 0x02            ; halt
        0xeaff_fffe, // b .
    ]);
    for _ in 0..8 {
        agb.step();
    }
    assert!(agb.cpu().halted());
    // A frame's worth of idle quanta delivers the vertical blank.
    for _ in 0..10_000 {
        agb.step();
        if !agb.cpu().halted() {
            break;
        }
    }
    assert!(!agb.cpu().halted());
    // The interrupt vectors into the firmware trampoline.
    assert!(agb.cpu().reg.r[PC] < 0x4000);
}

#[test]
fn interrupt_return_resumes_compressed_loop() {
    // A tight compressed-mode loop: two no-ops and a branch back.
    let mut agb = GameBoyAdvance::new();
    agb.load_rom(&rom_with_thumb(&[
        0x46c0, // nop (mov r8, r8)
        0x46c0, // nop
        0xe7fc, // b -4
    ]))
    .unwrap();

    // Switch the boot state into the compressed loop.
    agb.cpu_mut().reg.cpsr = agb.cpu_mut().reg.cpsr.with_thumb(true);
    // Enable the vertical-blank interrupt.
    agb.bus_mut().write_16(0x0400_0004, 0x0008);
    agb.bus_mut().write_16(0x0400_0200, 0x0001);
    agb.bus_mut().write_16(0x0400_0208, 0x0001);

    let mut vectored = false;
    for _ in 0..2_000_000 {
        agb.step();
        if agb.cpu().reg.r[PC] < 0x4000 {
            vectored = true;
            break;
        }
    }
    assert!(vectored, "interrupt never vectored into the firmware");

    // Run the trampoline to completion: back in the loop, back in the
    // compressed set, with the interrupt mode left behind.
    for _ in 0..10_000 {
        agb.step();
        if agb.cpu().reg.r[PC] >= 0x0800_0000 {
            break;
        }
    }
    assert!(agb.cpu().reg.r[PC] >= 0x0800_0000);
    assert!(agb.cpu().reg.cpsr.thumb());
    assert!((0x0800_0000..0x0800_0008).contains(&agb.cpu().reg.r[PC]));
    assert!(!agb.cpu().reg.cpsr.irq_mask());
    assert!(agb.crash().is_none());
}

#[test]
fn stall_detection_flags_a_crash() {
    let mut agb = boot(&[0xeaff_fffe]); // b .
    for _ in 0..200_000_000 / 8 {
        agb.step();
        if agb.crash().is_some() {
            break;
        }
    }
    let crash = agb.crash().expect("stall never detected");
    assert_eq!(crash.pc, 0x0800_0000);
    assert!(!crash.branches.is_empty());
}

#[test]
fn save_round_trips_through_the_facade() {
    let mut rom = rom_with(&[0xe1a0_0000]);
    let marker = b"SRAM_V113";
    rom[0x1000..0x1000 + marker.len()].copy_from_slice(marker);
    let mut agb = GameBoyAdvance::new();
    agb.load_rom(&rom).unwrap();

    agb.bus_mut().write_8(0x0e00_0123, 0x5a);
    assert!(agb.save_dirty());
    assert_eq!(agb.save_data()[0x123], 0x5a);

    let mut blob = vec![0x11u8; 0x8000];
    blob[0x40] = 0x77;
    agb.load_save(&blob).unwrap();
    assert_eq!(agb.bus_mut().read_8(0x0e00_0040), 0x77);
    assert!(matches!(
        agb.load_save(&[0u8; 3]),
        Err(Error::Cart(cart::Error::Save { .. }))
    ));
}

#[test]
fn audio_fifo_flows_to_the_host_ring() {
    let mut agb = boot(&[0xeaff_fffe]);
    // Master enable; FIFO A full volume to both sides, timer 0.
    agb.bus_mut().write_16(0x0400_0084, 0x0080);
    agb.bus_mut().write_16(0x0400_0082, 0x0304);
    // Timer 0 overflows every cycle.
    agb.bus_mut().write_16(0x0400_0100, 0xffff);
    agb.bus_mut().write_16(0x0400_0102, 0x0080);
    agb.bus_mut().write_32(0x0400_00a0, 0x4040_4040);
    for _ in 0..2000 {
        agb.step();
    }
    let mut out = [0i16; 64];
    let n = agb.audio_samples(&mut out);
    assert!(n > 0);
    assert!(out[..n].iter().any(|&s| s != 0));
}
