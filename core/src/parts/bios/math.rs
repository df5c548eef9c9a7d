//! Arithmetic services.

use std::f64::consts::TAU;

use vantage_arch::Word;

use super::super::bus::Bus;
use super::super::cpu::arm7::Cpu;

/// Signed division: quotient, remainder, and absolute quotient.
///
/// Division by zero yields the sign of the numerator (or zero), with the
/// numerator passed through as the remainder.
pub fn div(cpu: &mut Cpu, num: Word, denom: Word) {
    let num = num as i32;
    let denom = denom as i32;
    let (quot, rem) = if denom == 0 {
        (num.signum(), num)
    } else {
        (num.wrapping_div(denom), num.wrapping_rem(denom))
    };
    cpu.reg.set(0, quot as Word);
    cpu.reg.set(1, rem as Word);
    cpu.reg.set(3, quot.unsigned_abs());
}

/// Integer square root by the binary digit method.
#[must_use]
pub fn sqrt(mut value: Word) -> Word {
    let mut result = 0;
    let mut bit = 1 << 30;
    while bit > value {
        bit >>= 2;
    }
    while bit != 0 {
        if value >= result + bit {
            value -= result + bit;
            result = (result >> 1) + bit;
        } else {
            result >>= 1;
        }
        bit >>= 2;
    }
    result
}

/// Arc tangent of a 16.16 fixed-point ratio.
///
/// The result maps a full turn onto the 16-bit range, so a right angle is
/// `0x4000`.
pub fn arctan(cpu: &mut Cpu) {
    let tan = (cpu.reg.get(0) as i32) as f64 / 65536.0;
    let angle = tan.atan() / TAU * 65536.0;
    cpu.reg.set(0, (angle as i32) as Word);
}

/// Arc tangent of y/x over the full circle, 0..=0xFFFF.
pub fn arctan2(cpu: &mut Cpu) {
    let y = (cpu.reg.get(0) as i32) as f64 / 65536.0;
    let x = (cpu.reg.get(1) as i32) as f64 / 65536.0;
    let mut angle = y.atan2(x);
    if angle < 0.0 {
        angle += TAU;
    }
    cpu.reg.set(0, Word::from((angle / TAU * 65536.0) as u16));
}

/// Computes background affine parameter sets.
///
/// Each 20-byte source entry (origin center, display center, scales, angle)
/// produces a 16-byte destination entry (2.8 matrix plus 19.8 start point).
pub fn bg_affine_set(cpu: &mut Cpu, bus: &mut Bus) {
    let mut src = cpu.reg.get(0);
    let mut dst = cpu.reg.get(1);
    let count = cpu.reg.get(2);

    for _ in 0..count {
        let origin_x = bus.read_32(src) as i32;
        let origin_y = bus.read_32(src + 4) as i32;
        let disp_x = i32::from(bus.read_16(src + 8) as i16);
        let disp_y = i32::from(bus.read_16(src + 10) as i16);
        let scale_x = f64::from(bus.read_16(src + 12) as i16) / 256.0;
        let scale_y = f64::from(bus.read_16(src + 14) as i16) / 256.0;
        let theta = f64::from(bus.read_16(src + 16)) / 65536.0 * TAU;

        let (sin, cos) = theta.sin_cos();
        let pa = (cos * 256.0 / scale_x) as i32 as i16;
        let pb = (sin * 256.0 / scale_x) as i32 as i16;
        let pc = (-sin * 256.0 / scale_y) as i32 as i16;
        let pd = (cos * 256.0 / scale_y) as i32 as i16;

        let start_x =
            origin_x - ((i32::from(pa) * disp_x + i32::from(pb) * disp_y) >> 8);
        let start_y =
            origin_y - ((i32::from(pc) * disp_x + i32::from(pd) * disp_y) >> 8);

        bus.write_16(dst, pa as u16);
        bus.write_16(dst + 2, pb as u16);
        bus.write_16(dst + 4, pc as u16);
        bus.write_16(dst + 6, pd as u16);
        bus.write_32(dst + 8, start_x as Word);
        bus.write_32(dst + 12, start_y as Word);

        src += 20;
        dst += 16;
    }
}

/// Computes sprite affine parameter sets.
///
/// Source entries are 8 bytes (scales, angle); the four matrix halfwords
/// land `R3` bytes apart, matching the parameter layout interleaved with
/// sprite attributes.
pub fn obj_affine_set(cpu: &mut Cpu, bus: &mut Bus) {
    let mut src = cpu.reg.get(0);
    let mut dst = cpu.reg.get(1);
    let count = cpu.reg.get(2);
    let stride = cpu.reg.get(3);

    for _ in 0..count {
        let scale_x = f64::from(bus.read_16(src) as i16) / 256.0;
        let scale_y = f64::from(bus.read_16(src + 2) as i16) / 256.0;
        let theta = f64::from(bus.read_16(src + 4)) / 65536.0 * TAU;

        let (sin, cos) = theta.sin_cos();
        let pa = (cos * scale_x * 256.0) as i32 as i16;
        let pb = (sin * scale_x * 256.0) as i32 as i16;
        let pc = (-sin * scale_y * 256.0) as i32 as i16;
        let pd = (cos * scale_y * 256.0) as i32 as i16;

        bus.write_16(dst, pa as u16);
        bus.write_16(dst + stride, pb as u16);
        bus.write_16(dst + stride * 2, pc as u16);
        bus.write_16(dst + stride * 3, pd as u16);

        src += 8;
        dst += stride * 4;
    }
}

/// MIDI key to playback frequency conversion.
pub fn midi_key_to_freq(cpu: &mut Cpu) {
    let key = f64::from(cpu.reg.get(1));
    let fine = f64::from(cpu.reg.get(2));
    let freq = 440.0 * ((key - 69.0 + fine / 256.0) / 12.0).exp2();
    cpu.reg.set(0, (freq * 2048.0) as Word);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::bios;

    #[test]
    fn div_produces_quotient_remainder_abs() {
        let mut cpu = Cpu::new();
        div(&mut cpu, (-7i32) as Word, 2);
        assert_eq!(cpu.reg.get(0) as i32, -3);
        assert_eq!(cpu.reg.get(1) as i32, -1);
        assert_eq!(cpu.reg.get(3), 3);
    }

    #[test]
    fn div_by_zero_is_tolerated() {
        let mut cpu = Cpu::new();
        div(&mut cpu, 5, 0);
        assert_eq!(cpu.reg.get(0), 1);
        assert_eq!(cpu.reg.get(1), 5);
        div(&mut cpu, (-5i32) as Word, 0);
        assert_eq!(cpu.reg.get(0) as i32, -1);
    }

    #[test]
    fn sqrt_matches_integers() {
        assert_eq!(sqrt(0), 0);
        assert_eq!(sqrt(1), 1);
        assert_eq!(sqrt(81), 9);
        assert_eq!(sqrt(82), 9);
        assert_eq!(sqrt(0xffff_ffff), 0xffff);
    }

    #[test]
    fn arctan2_quadrants() {
        let mut cpu = Cpu::new();
        // Straight up: a quarter turn.
        cpu.reg.set(0, 0x0001_0000);
        cpu.reg.set(1, 0);
        arctan2(&mut cpu);
        assert_eq!(cpu.reg.get(0), 0x4000);
        // Straight left: half a turn.
        cpu.reg.set(0, 0);
        cpu.reg.set(1, (-0x0001_0000i32) as Word);
        arctan2(&mut cpu);
        assert_eq!(cpu.reg.get(0), 0x8000);
    }

    #[test]
    fn identity_affine_matrix() {
        let mut cpu = Cpu::new();
        let mut bus = Bus::new(bios::image());
        // Scale 1.0, angle 0.
        bus.write_16(0x0200_0000, 0x0100);
        bus.write_16(0x0200_0002, 0x0100);
        bus.write_16(0x0200_0004, 0);
        cpu.reg.set(0, 0x0200_0000);
        cpu.reg.set(1, 0x0200_0100);
        cpu.reg.set(2, 1);
        cpu.reg.set(3, 2);
        obj_affine_set(&mut cpu, &mut bus);
        assert_eq!(bus.read_16(0x0200_0100), 0x0100); // pa
        assert_eq!(bus.read_16(0x0200_0102), 0x0000); // pb
        assert_eq!(bus.read_16(0x0200_0104), 0x0000); // pc
        assert_eq!(bus.read_16(0x0200_0106), 0x0100); // pd
    }
}
