// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Handlers for ARM instructions. Each returns the cycle cost of the
//! retired instruction.

use common::numutil::{NumExt, U32Ext};

use crate::{
    interface::{ArmSystem, SysWrapper},
    registers::Flag::*,
};

pub type ArmHandler<S> = fn(&mut SysWrapper<S>, ArmInst) -> u16;
pub type ArmLut<S> = [ArmHandler<S>; 4096];

impl<S: ArmSystem> SysWrapper<S> {
    pub fn arm_unknown(&mut self, inst: ArmInst) -> u16 {
        log::warn!(
            "Unknown ARM{} ARM opcode: 0x{:08X}",
            if S::I == 0 { 9 } else { 7 },
            inst.0
        );
        1
    }

    pub fn arm_b<const LINK: bool>(&mut self, inst: ArmInst) -> u16 {
        let nn = inst.0.i24().wrapping_mul(4);
        let pc = self.cpur().regs.pc();
        if LINK {
            self.cpu().regs.set_reg(14, pc.wrapping_sub(4));
        }
        self.set_pc(pc.wrapping_add_signed(nn));
        3
    }

    pub fn arm_bx(&mut self, inst: ArmInst) -> u16 {
        let rn = self.reg(inst.reg(0));
        if rn.is_bit(0) {
            self.cpu().regs.set_flag(Thumb, true);
        }
        self.set_pc(rn);
        3
    }

    pub fn arm_blx_reg(&mut self, inst: ArmInst) -> u16 {
        let rn = self.reg(inst.reg(0));
        let pc = self.cpur().regs.pc();
        self.cpu().regs.set_reg(14, pc.wrapping_sub(4));
        if rn.is_bit(0) {
            self.cpu().regs.set_flag(Thumb, true);
        }
        self.set_pc(rn);
        3
    }

    pub fn arm_swi(&mut self, _inst: ArmInst) -> u16 {
        self.exception(0x08)
    }

    pub fn arm_mrs<const SPSR: bool>(&mut self, inst: ArmInst) -> u16 {
        let psr = if SPSR {
            self.cpur().regs.spsr()
        } else {
            self.cpur().regs.cpsr()
        };
        self.set_reg(inst.reg(12), psr);
        1
    }

    pub fn arm_msr<const SPSR: bool, const IMM: bool>(&mut self, inst: ArmInst) -> u16 {
        let value = if IMM {
            (inst.0 & 0xFF).rotate_right(inst.0.bits(8, 4) << 1)
        } else {
            self.reg(inst.reg(0))
        };

        let mut mask = 0;
        for (bit, field) in [
            (16, 0x0000_00FF_u32),
            (17, 0x0000_FF00),
            (18, 0x00FF_0000),
            (19, 0xFF00_0000),
        ] {
            if inst.0.is_bit(bit) {
                mask |= field;
            }
        }
        // Only the flag field is writable from User mode
        if self.cpur().regs.cpsr() & 0x1F == 0x10 {
            mask &= 0xFF00_0000;
        }

        if SPSR {
            let spsr = self.cpur().regs.spsr();
            self.cpu().regs.set_spsr((spsr & !mask) | (value & mask));
        } else {
            let cpsr = self.cpur().regs.cpsr();
            self.set_cpsr((cpsr & !mask) | (value & mask), false);
        }
        1
    }

    /// ARMv5: CLZ
    pub fn arm_clz(&mut self, inst: ArmInst) -> u16 {
        let rm = self.reg(inst.reg(0));
        self.set_reg(inst.reg(12), rm.leading_zeros());
        1
    }

    /// ARMv5: QADD/QSUB/QDADD/QDSUB
    pub fn arm_qalu<const OP: u16>(&mut self, inst: ArmInst) -> u16 {
        let rm = self.reg(inst.reg(0)) as i32;
        let rn = self.reg(inst.reg(16)) as i32;
        let mut sat = false;

        let addend = if OP >= 2 {
            let doubled = (rn as i64) * 2;
            sat |= doubled != doubled.clamp(i32::MIN as i64, i32::MAX as i64);
            doubled.clamp(i32::MIN as i64, i32::MAX as i64) as i32
        } else {
            rn
        };
        let result = if OP & 1 == 0 {
            (rm as i64) + (addend as i64)
        } else {
            (rm as i64) - (addend as i64)
        };
        sat |= result != result.clamp(i32::MIN as i64, i32::MAX as i64);
        let result = result.clamp(i32::MIN as i64, i32::MAX as i64) as i32;

        if sat {
            // Q is sticky
            self.cpu().regs.set_flag(QClamped, true);
        }
        self.set_reg(inst.reg(12), result as u32);
        1
    }

    pub fn arm_mul<const OP: u16, const SET: bool>(&mut self, inst: ArmInst) -> u16 {
        let rm = self.reg(inst.reg(0));
        let rs = self.reg(inst.reg(8));
        let rn = self.reg(inst.reg(12));
        let dlo = rn as u64;
        let dhi = self.reg(inst.reg(16)) as u64;

        let (out, long, cycles) = match OP {
            0b000 => (rm.wrapping_mul(rs) as u64, false, 2),
            0b001 => (rm.wrapping_mul(rs).wrapping_add(rn) as u64, false, 3),
            0b100 => ((rm as u64).wrapping_mul(rs as u64), true, 3),
            0b101 => (
                (rm as u64)
                    .wrapping_mul(rs as u64)
                    .wrapping_add(dlo | (dhi << 32)),
                true,
                4,
            ),
            0b110 => (
                (rm as i32 as i64).wrapping_mul(rs as i32 as i64) as u64,
                true,
                3,
            ),
            _ => (
                (rm as i32 as i64)
                    .wrapping_mul(rs as i32 as i64)
                    .wrapping_add((dlo | (dhi << 32)) as i64) as u64,
                true,
                4,
            ),
        };

        if long {
            self.set_reg(inst.reg(16), (out >> 32) as u32);
            self.set_reg(inst.reg(12), out as u32);
        } else {
            self.set_reg(inst.reg(16), out as u32);
        }
        if SET {
            let zero = if long { out == 0 } else { out as u32 == 0 };
            let cpu = self.cpu();
            cpu.regs.set_flag(Zero, zero);
            cpu.regs.set_flag(Neg, out.is_bit(if long { 63 } else { 31 }));
            cpu.regs.set_flag(Carry, false);
        }
        cycles
    }

    /// ARMv5: the signed halfword multiply family.
    /// 0 = SMLAxy, 1 = SMLAWy/SMULWy, 2 = SMLALxy, 3 = SMULxy.
    pub fn arm_mul_half<const OP: u16>(&mut self, inst: ArmInst) -> u16 {
        let x = inst.0.is_bit(5);
        let y = inst.0.is_bit(6);
        let rm = self.reg(inst.reg(0));
        let rs = self.reg(inst.reg(8));
        let a = (if x { rm >> 16 } else { rm }) as i16 as i32;
        let b = (if y { rs >> 16 } else { rs }) as i16 as i32;

        match OP {
            0 => {
                let rn = self.reg(inst.reg(12)) as i32;
                let (result, q) = a.wrapping_mul(b).overflowing_add(rn);
                if q {
                    self.cpu().regs.set_flag(QClamped, true);
                }
                self.set_reg(inst.reg(16), result as u32);
                1
            }
            1 => {
                // Here bit 5 selects SMULW over SMLAW instead of a half
                let product = (((rm as i32 as i64) * (b as i64)) >> 16) as i32;
                if x {
                    self.set_reg(inst.reg(16), product as u32);
                } else {
                    let rn = self.reg(inst.reg(12)) as i32;
                    let (result, q) = product.overflowing_add(rn);
                    if q {
                        self.cpu().regs.set_flag(QClamped, true);
                    }
                    self.set_reg(inst.reg(16), result as u32);
                }
                1
            }
            2 => {
                let acc = ((self.reg(inst.reg(16)) as u64) << 32) | self.reg(inst.reg(12)) as u64;
                let result = (acc as i64).wrapping_add((a as i64) * (b as i64)) as u64;
                self.set_reg(inst.reg(16), (result >> 32) as u32);
                self.set_reg(inst.reg(12), result as u32);
                2
            }
            _ => {
                self.set_reg(inst.reg(16), a.wrapping_mul(b) as u32);
                1
            }
        }
    }

    pub fn arm_alu_reg<const OP: u16, const SET: bool>(&mut self, inst: ArmInst) -> u16 {
        let m = inst.reg(0);
        let d = inst.reg(12);
        let n = inst.reg(16);
        let t = inst.0.bits(5, 2);
        let carry = self.cpur().regs.flag(Carry);

        if inst.0.is_bit(4) {
            // Shift by register; R15 reads one instruction later here
            let amount = self.reg(inst.reg(8)) & 0xFF;
            let rm = self.cpur().regs.reg_pc4(m);
            let second_op = self.shifted_op::<SET, false>(rm, t, amount);
            let rn = self.cpur().regs.reg_pc4(n);
            self.alu::<OP, SET>(rn, second_op, d, carry) + 1
        } else {
            let amount = inst.0.bits(7, 5);
            let rm = self.reg(m);
            let second_op = self.shifted_op::<SET, true>(rm, t, amount);
            let rn = self.reg(n);
            self.alu::<OP, SET>(rn, second_op, d, carry)
        }
    }

    pub fn arm_alu_imm<const OP: u16, const SET: bool>(&mut self, inst: ArmInst) -> u16 {
        let carry = self.cpur().regs.flag(Carry);
        let d = inst.reg(12);
        let n = inst.reg(16);
        let s = inst.0.bits(8, 4);
        let second_op = self.cpu().ror::<SET, false>(inst.0 & 0xFF, s << 1);
        let rn = self.reg(n);
        self.alu::<OP, SET>(rn, second_op, d, carry)
    }

    fn alu<const OP: u16, const SET: bool>(&mut self, a: u32, b: u32, dest: u32, carry: bool) -> u16 {
        let value = match OP {
            0x0 => self.cpu().and::<SET>(a, b),
            0x1 => self.cpu().xor::<SET>(a, b),
            0x2 => self.cpu().sub::<SET>(a, b),
            0x3 => self.cpu().sub::<SET>(b, a),
            0x4 => self.cpu().add::<SET>(a, b),
            0x5 => self.cpu().adc::<SET>(a, b, carry as u32),
            0x6 => self.cpu().sbc::<SET>(a, b, carry as u32),
            0x7 => self.cpu().sbc::<SET>(b, a, carry as u32),
            0x8 => {
                // TST
                self.cpu().and::<true>(a, b);
                0
            }
            0x9 => {
                // TEQ
                self.cpu().xor::<true>(a, b);
                0
            }
            0xA => {
                // CMP
                self.cpu().sub::<true>(a, b);
                0
            }
            0xB => {
                // CMN
                self.cpu().add::<true>(a, b);
                0
            }
            0xC => self.cpu().or::<SET>(a, b),
            0xD => {
                // MOV
                self.cpu().set_nz::<SET>(b);
                b
            }
            0xE => self.cpu().bit_clear::<SET>(a, b),
            _ => self.cpu().not::<SET>(b),
        };

        let test = OP >= 0x8 && OP <= 0xB;
        if SET && dest == 15 && !test && self.cpur().regs.has_spsr() {
            // Return from exception: the mode comes back before the jump
            let spsr = self.cpur().regs.spsr();
            self.set_cpsr(spsr, false);
        }
        if !test {
            self.set_reg(dest, value);
            if dest == 15 {
                return 3;
            }
        }
        1
    }

    fn shifted_op<const CPSR: bool, const IMM: bool>(&mut self, nn: u32, op: u32, amount: u32) -> u32 {
        if op + amount == 0 {
            // Special case: no shift
            nn
        } else {
            match op {
                0 => self.cpu().lsl::<CPSR>(nn, amount),
                1 => self.cpu().lsr::<CPSR, IMM>(nn, amount),
                2 => self.cpu().asr::<CPSR, IMM>(nn, amount),
                _ => self.cpu().ror::<CPSR, IMM>(nn, amount),
            }
        }
    }

    pub fn arm_swp<const BYTE: bool>(&mut self, inst: ArmInst) -> u16 {
        let addr = self.reg(inst.reg(16));
        let m = inst.reg(0);
        let d = inst.reg(12);

        let mem_value = if BYTE {
            self.read::<u8>(addr).u32()
        } else {
            self.read_word_ldrswp(addr)
        };
        let reg = self.reg(m);
        if BYTE {
            self.write::<u8>(addr, reg.u8());
        } else {
            self.write::<u32>(addr, reg);
        }
        self.set_reg(d, mem_value);
        4
    }

    /// Single word/byte transfers. OP packs opcode bits 20-24 (L, W, B,
    /// U, P).
    pub fn arm_ldrstr<const OP: u16, const IMM: bool>(&mut self, inst: ArmInst) -> u16 {
        let ldr = OP.is_bit(0);
        let writeback = OP.is_bit(1);
        let byte = OP.is_bit(2);
        let up = OP.is_bit(3);
        let pre = OP.is_bit(4);
        let n = inst.reg(16);
        let d = inst.reg(12);
        let width = if byte { 1 } else { 4 };

        let offs = if IMM {
            inst.0 & 0xFFF
        } else {
            let s = inst.0.bits(7, 5);
            let t = inst.0.bits(5, 2);
            let rm = self.reg(inst.reg(0));
            self.shifted_op::<false, true>(rm, t, s)
        };
        self.ldrstr(!pre, up, width, !pre || writeback, !ldr, n, d, offs)
    }

    /// Halfword, signed and doubleword transfers. OP packs opcode bits
    /// 20-24 (L, W, I, U, P); the transfer kind comes from bits 5-6.
    pub fn arm_ldrstr_half<const OP: u16>(&mut self, inst: ArmInst) -> u16 {
        let ldr = OP.is_bit(0);
        let writeback_bit = OP.is_bit(1);
        let imm = OP.is_bit(2);
        let up = OP.is_bit(3);
        let pre = OP.is_bit(4);
        let n = inst.reg(16);
        let d = inst.reg(12);
        let opc = inst.0.bits(5, 2);

        let offs = if imm {
            (inst.0 & 0xF) | (inst.0.bits(8, 4) << 4)
        } else {
            self.reg(inst.reg(0))
        };
        let writeback = !pre || writeback_bit;

        let mut addr = self.reg(n);
        if pre {
            addr = Self::mod_with_offs(addr, offs, up);
        }

        let cost;
        match (ldr, opc) {
            (false, 1) => {
                // STRH
                let value = self.cpur().regs.reg_pc4(d);
                self.write::<u16>(addr, value.u16());
                cost = 2;
            }
            (true, 1) => {
                // LDRH
                let value = self.read::<u16>(addr);
                self.set_reg(d, value);
                cost = 3;
            }
            (true, 2) => {
                // LDRSB
                let value = self.read::<u8>(addr) as i8 as i32 as u32;
                self.set_reg(d, value);
                cost = 3;
            }
            (true, _) => {
                // LDRSH
                let value = self.read_hword_ldrsh(addr);
                self.set_reg(d, value);
                cost = 3;
            }
            (false, 2) if S::IS_V5 => {
                // LDRD
                let lo = self.read::<u32>(addr);
                let hi = self.read::<u32>(addr.wrapping_add(4));
                self.set_reg(d, lo);
                self.set_reg(d + 1, hi);
                cost = 4;
            }
            (false, 3) if S::IS_V5 => {
                // STRD
                let lo = self.reg(d);
                let hi = self.reg(d + 1);
                self.write::<u32>(addr, lo);
                self.write::<u32>(addr.wrapping_add(4), hi);
                cost = 3;
            }
            _ => return self.arm_unknown(inst),
        }

        if !pre {
            addr = Self::mod_with_offs(addr, offs, up);
        }
        if writeback && (!ldr || n != d) {
            self.cpu().regs.set_reg(n, addr);
        }
        cost
    }

    #[allow(clippy::too_many_arguments)]
    fn ldrstr(
        &mut self,
        post: bool,
        up: bool,
        width: u32,
        writeback: bool,
        str: bool,
        n: u32,
        d: u32,
        offs: u32,
    ) -> u16 {
        let mut addr = self.reg(n);
        if !post {
            addr = Self::mod_with_offs(addr, offs, up);
        }

        let mut cost = if str { 2 } else { 3 };
        if str {
            let value = self.cpur().regs.reg_pc4(d);
            match width {
                4 => self.write::<u32>(addr, value),
                _ => self.write::<u8>(addr, value.u8()),
            }
        } else {
            let value = match width {
                4 => self.read_word_ldrswp(addr),
                _ => self.read::<u8>(addr).u32(),
            };
            if d == 15 {
                cost += 2;
            }
            self.set_reg_allow_switch(d, value);
        }

        if post {
            addr = Self::mod_with_offs(addr, offs, up);
        }
        // Edge case: if n == d on an LDR, writeback does nothing
        if writeback && (str || n != d) {
            self.cpu().regs.set_reg(n, addr);
        }
        cost
    }

    /// Block transfers. OP packs opcode bits 20-24 (L, W, S, U, P).
    pub fn arm_stm_ldm<const OP: u16>(&mut self, inst: ArmInst) -> u16 {
        let ldr = OP.is_bit(0);
        let writeback = OP.is_bit(1);
        let user = OP.is_bit(2);
        let up = OP.is_bit(3);
        let pre = OP.is_bit(4);
        let n = inst.reg(16);
        let rlist = (inst.0 & 0xFFFF) as u16;

        if rlist == 0 {
            return self.on_empty_rlist(n, !ldr, up, pre);
        }

        let count = rlist.count_ones();
        let initial = self.reg(n);
        let end = Self::mod_with_offs(initial, count * 4, up);
        // Transfers always run upwards from the lowest address involved
        let mut addr = match (up, pre) {
            (true, false) => initial,
            (true, true) => initial.wrapping_add(4),
            (false, false) => initial.wrapping_sub(count * 4).wrapping_add(4),
            (false, true) => initial.wrapping_sub(count * 4),
        };

        let load_pc = ldr && rlist.is_bit(15);
        // LDM with S and the PC in the list returns from an exception;
        // any other S-variant moves the user bank
        let restore = user && load_pc;
        let user_bank = user && !load_pc;
        let first = rlist.trailing_zeros();
        let mut pc_value = 0;

        for r in 0..16u16 {
            if !rlist.is_bit(r) {
                continue;
            }
            if ldr {
                let value = self.read::<u32>(addr);
                if r == 15 {
                    pc_value = value;
                } else if user_bank {
                    self.cpu().regs.set_usr_reg(r.u32(), value);
                } else {
                    self.cpu().regs.set_reg(r.u32(), value);
                }
            } else {
                let value = if user_bank {
                    self.cpur().regs.usr_reg(r.u32())
                } else if r.u32() == n && writeback && r.u32() != first.u32() {
                    // The base is stored after its writeback happened,
                    // unless it is the first register in the list
                    end
                } else {
                    self.cpur().regs.reg_pc4(r.u32())
                };
                self.write::<u32>(addr, value);
            }
            addr = addr.wrapping_add(4);
        }

        if writeback && !(ldr && rlist.is_bit(n.u16())) {
            self.cpu().regs.set_reg(n, end);
        }
        if restore && self.cpur().regs.has_spsr() {
            let spsr = self.cpur().regs.spsr();
            self.set_cpsr(spsr, false);
        }
        if load_pc {
            if restore {
                self.set_pc(pc_value);
            } else {
                self.set_reg_allow_switch(15, pc_value);
            }
        }

        count as u16 + if ldr { 2 } else { 1 } + if load_pc { 2 } else { 0 }
    }

    /// An empty register list transfers R15 and moves the base by 0x40
    /// on ARMv4; ARMv5 only moves the base.
    pub(crate) fn on_empty_rlist(&mut self, n: u32, str: bool, up: bool, pre: bool) -> u16 {
        let addr = self.reg(n);
        self.cpu()
            .regs
            .set_reg(n, Self::mod_with_offs(addr, 0x40, up));
        if S::IS_V5 {
            return if str { 1 } else { 2 };
        }

        if str {
            let addr = match (up, pre) {
                (true, true) => addr.wrapping_add(4),
                (true, false) => addr,
                (false, true) => addr.wrapping_sub(0x40),
                (false, false) => addr.wrapping_sub(0x3C),
            };
            let width = if self.cpur().regs.is_thumb() { 2 } else { 4 };
            let value = self.cpur().regs.pc().wrapping_add(width);
            self.write::<u32>(addr, value);
            2
        } else {
            let value = self.read::<u32>(addr);
            self.set_pc(value);
            5
        }
    }

    /// CP15 transfers; the ARM9 forwards them to the coprocessor
    /// collaborator.
    pub fn arm_cp15<const MRC: bool>(&mut self, inst: ArmInst) -> u16 {
        if inst.reg(8) != 15 || inst.0.bits(21, 3) != 0 {
            return self.arm_unknown(inst);
        }
        let cn = inst.reg(16);
        let cm = inst.reg(0);
        let cp = inst.0.bits(5, 3);
        let d = inst.reg(12);

        if MRC {
            let value = self.get_cp15(cn, cm, cp);
            if d == 15 {
                // Reads into R15 only update the flags
                let cpsr = (self.cpur().regs.cpsr() & 0x0FFF_FFFF) | (value & 0xF000_0000);
                self.cpu().regs.set_cpsr(cpsr, false);
            } else {
                self.cpu().regs.set_reg(d, value);
            }
        } else {
            let value = self.cpur().regs.reg_pc4(d);
            self.set_cp15(cn, cm, cp, value);
        }
        2
    }

    /// Modify a value with an offset, either adding or subtracting.
    pub(crate) fn mod_with_offs(value: u32, offs: u32, up: bool) -> u32 {
        if up {
            value.wrapping_add(offs)
        } else {
            value.wrapping_sub(offs)
        }
    }
}

#[derive(Copy, Clone)]
pub struct ArmInst(pub u32);

impl ArmInst {
    pub fn reg(self, idx: u32) -> u32 {
        self.0.bits(idx, 4)
    }
}
