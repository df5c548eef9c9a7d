//! Block data transfers.

use log::warn;
use vantage_arch::Word;

use super::super::super::{Cpu, PC};
use crate::parts::bus::Bus;

/// Load/store multiple (32-bit encoding).
///
/// Registers always transfer lowest-address-first; the addressing mode only
/// chooses where the block sits relative to the base.
pub fn bdt(cpu: &mut Cpu, bus: &mut Bus, code: Word) {
    let rn = ((code >> 16) & 0xf) as usize;
    let load = code & (1 << 20) != 0;
    let writeback = code & (1 << 21) != 0;
    let s = code & (1 << 22) != 0;
    let up = code & (1 << 23) != 0;
    let pre = code & (1 << 24) != 0;
    let list = code & 0xffff;

    let count = list.count_ones();
    if count == 0 {
        warn!("block transfer with empty register list: {code:#010x}");
        return;
    }

    let base = cpu.reg.get(rn);
    // Normalize to an ascending walk from the block's lowest address.
    let (start, pre) = if up {
        (base, pre)
    } else {
        (base.wrapping_sub(4 * count), !pre)
    };
    let end = if up {
        base.wrapping_add(4 * count)
    } else {
        base.wrapping_sub(4 * count)
    };

    if s && !(load && list & (1 << PC) != 0) {
        // User-bank transfer; privileged software on this console runs on
        // the system bank anyway, so the plain bank is close enough.
        warn!("user-bank block transfer: {code:#010x}");
    }

    // The base register's new value is visible to stores after the first
    // transferred register on hardware; storing the original everywhere is
    // the tolerated simplification.
    let stored_base = base;

    let mut addr = start;
    for idx in 0..16 {
        if list & (1 << idx) == 0 {
            continue;
        }
        if pre {
            addr = addr.wrapping_add(4);
        }
        if load {
            let value = cpu.read_32(bus, addr);
            if idx == PC {
                if s {
                    // Privileged return: status and PC restore atomically.
                    cpu.restore_cpsr();
                }
                cpu.jump(value);
            } else {
                cpu.reg.set(idx, value);
            }
        } else {
            let value = match idx {
                // The stored PC slot holds the executing address + 12.
                PC => cpu.reg.r[PC].wrapping_add(8),
                _ if idx == rn => stored_base,
                _ => cpu.reg.get(idx),
            };
            cpu.write_32(bus, addr, value);
        }
        if !pre {
            addr = addr.wrapping_add(4);
        }
    }

    // Writeback is suppressed for a load that includes the base: the loaded
    // value wins the register.
    if writeback && !(load && list & (1 << rn) != 0) {
        cpu.reg.set(rn, end);
    }
    cpu.etc.cycles += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_arch::mem::Rom;

    fn setup() -> (Cpu, Bus) {
        (Cpu::new(), Bus::new(Rom::from(vec![0u8; 16])))
    }

    #[test]
    fn stmia_then_ldmia_round_trips() {
        let (mut cpu, mut bus) = setup();
        cpu.reg.set(0, 0x0200_0000);
        cpu.reg.set(1, 0x10);
        cpu.reg.set(2, 0x20);
        // stmia r0!, {r1, r2}
        bdt(&mut cpu, &mut bus, 0xe8a0_0006);
        assert_eq!(bus.read_32(0x0200_0000), 0x10);
        assert_eq!(bus.read_32(0x0200_0004), 0x20);
        assert_eq!(cpu.reg.get(0), 0x0200_0008);

        cpu.reg.set(0, 0x0200_0000);
        cpu.reg.set(1, 0);
        cpu.reg.set(2, 0);
        // ldmia r0!, {r1, r2}
        bdt(&mut cpu, &mut bus, 0xe8b0_0006);
        assert_eq!(cpu.reg.get(1), 0x10);
        assert_eq!(cpu.reg.get(2), 0x20);
        assert_eq!(cpu.reg.get(0), 0x0200_0008);
    }

    #[test]
    fn descending_block_matches_push_layout() {
        let (mut cpu, mut bus) = setup();
        cpu.reg.set(13, 0x0300_0020);
        cpu.reg.set(4, 0x44);
        cpu.reg.set(14, 0xee);
        // stmdb sp!, {r4, lr}
        bdt(&mut cpu, &mut bus, 0xe92d_4010);
        assert_eq!(cpu.reg.get(13), 0x0300_0018);
        assert_eq!(bus.read_32(0x0300_0018), 0x44);
        assert_eq!(bus.read_32(0x0300_001c), 0xee);
        // ldmia sp!, {r4, pc}
        cpu.reg.set(4, 0);
        bdt(&mut cpu, &mut bus, 0xe8bd_8010);
        assert_eq!(cpu.reg.get(4), 0x44);
        assert_eq!(cpu.reg.r[PC], 0xec); // word-aligned branch target
    }

    #[test]
    fn load_with_base_in_list_suppresses_writeback() {
        let (mut cpu, mut bus) = setup();
        bus.write_32(0x0300_0000, 0xaaaa_aaaa);
        bus.write_32(0x0300_0004, 0x0123_4567);
        cpu.reg.set(0, 0x0300_0000);
        // ldmia r0!, {r0, r1}
        bdt(&mut cpu, &mut bus, 0xe8b0_0003);
        assert_eq!(cpu.reg.get(0), 0xaaaa_aaaa);
        assert_eq!(cpu.reg.get(1), 0x0123_4567);
    }
}
