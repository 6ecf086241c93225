// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Handlers for THUMB instructions. Each returns the cycle cost of the
//! retired instruction.

use common::numutil::{NumExt, U16Ext};

use crate::{
    interface::{ArmSystem, SysWrapper},
    lut::{CONDITION, COND_TRUE},
    registers::Flag::*,
};

pub type ThumbHandler<S> = fn(&mut SysWrapper<S>, ThumbInst) -> u16;
pub type ThumbLut<S> = [ThumbHandler<S>; 1024];

impl<S: ArmSystem> SysWrapper<S> {
    pub fn thumb_unknown(&mut self, inst: ThumbInst) -> u16 {
        log::warn!(
            "Unknown ARM{} THUMB opcode: 0x{:04X}",
            if S::I == 0 { 9 } else { 7 },
            inst.0
        );
        1
    }

    // THUMB.1
    pub fn thumb_shift<const TY: u16>(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(0);
        let s = inst.low(3);
        let n = inst.0.bits(6, 5).u32();
        let rs = self.reg(s.u32());
        let value = match TY {
            0 => self.cpu().lsl::<true>(rs, n),
            1 => self.cpu().lsr::<true, true>(rs, n),
            _ => self.cpu().asr::<true, true>(rs, n),
        };
        self.cpu().regs.set_reg(d.u32(), value);
        1
    }

    // THUMB.2
    pub fn thumb_addsub<const IMM: bool, const SUB: bool>(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(0);
        let s = inst.low(3);
        let n = inst.0.bits(6, 3);
        let rs = self.reg(s.u32());
        let rn = if IMM { n.u32() } else { self.reg(n.u32()) };
        let value = if SUB {
            self.cpu().sub::<true>(rs, rn)
        } else {
            self.cpu().add::<true>(rs, rn)
        };
        self.cpu().regs.set_reg(d.u32(), value);
        1
    }

    // THUMB.3
    pub fn thumb_imm<const OP: u16>(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(8);
        let n = (inst.0 & 0xFF).u32();
        let rd = self.reg(d.u32());
        match OP {
            0 => {
                // MOV
                self.cpu().set_nz::<true>(n);
                self.cpu().regs.set_reg(d.u32(), n);
            }
            1 => {
                // CMP
                self.cpu().sub::<true>(rd, n);
            }
            2 => {
                let value = self.cpu().add::<true>(rd, n);
                self.cpu().regs.set_reg(d.u32(), value);
            }
            _ => {
                let value = self.cpu().sub::<true>(rd, n);
                self.cpu().regs.set_reg(d.u32(), value);
            }
        }
        1
    }

    // THUMB.4
    pub fn thumb_alu<const OP: u16>(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(0);
        let s = inst.low(3);
        let rd = self.reg(d.u32());
        let rs = self.reg(s.u32());

        let mut cost = 1;
        let value = match OP {
            0x0 => self.cpu().and::<true>(rd, rs),
            0x1 => self.cpu().xor::<true>(rd, rs),
            0x2 => {
                cost += 1;
                self.cpu().lsl::<true>(rd, rs & 0xFF)
            }
            0x3 => {
                cost += 1;
                self.cpu().lsr::<true, false>(rd, rs & 0xFF)
            }
            0x4 => {
                cost += 1;
                self.cpu().asr::<true, false>(rd, rs & 0xFF)
            }
            0x5 => {
                let c = self.cpur().regs.flag(Carry) as u32;
                self.cpu().adc::<true>(rd, rs, c)
            }
            0x6 => {
                let c = self.cpur().regs.flag(Carry) as u32;
                self.cpu().sbc::<true>(rd, rs, c)
            }
            0x7 => {
                cost += 1;
                self.cpu().ror::<true, false>(rd, rs & 0xFF)
            }
            0x8 => {
                // TST
                self.cpu().and::<true>(rd, rs);
                rd
            }
            0x9 => self.cpu().neg::<true>(rs),
            0xA => {
                // CMP
                self.cpu().sub::<true>(rd, rs);
                rd
            }
            0xB => {
                // CMN
                self.cpu().add::<true>(rd, rs);
                rd
            }
            0xC => self.cpu().or::<true>(rd, rs),
            0xD => {
                cost += 1;
                self.cpu().mul::<true>(rd, rs)
            }
            0xE => self.cpu().bit_clear::<true>(rd, rs),
            _ => self.cpu().not::<true>(rs),
        };
        self.cpu().regs.set_reg(d.u32(), value);
        cost
    }

    // THUMB.5
    pub fn thumb_hi_add(&mut self, inst: ThumbInst) -> u16 {
        let s = inst.0.bits(3, 4).u32();
        let d = (inst.low(0) | (inst.0.bit(7) << 3)).u32();
        let value = self.reg(d).wrapping_add(self.reg(s));
        self.set_reg(d, value);
        if d == 15 {
            3
        } else {
            1
        }
    }

    pub fn thumb_hi_cmp(&mut self, inst: ThumbInst) -> u16 {
        let s = inst.0.bits(3, 4).u32();
        let d = (inst.low(0) | (inst.0.bit(7) << 3)).u32();
        let rd = self.reg(d);
        let rs = self.reg(s);
        self.cpu().sub::<true>(rd, rs);
        1
    }

    pub fn thumb_hi_mov(&mut self, inst: ThumbInst) -> u16 {
        let s = inst.0.bits(3, 4).u32();
        let d = (inst.low(0) | (inst.0.bit(7) << 3)).u32();
        let value = self.reg(s);
        self.set_reg(d, value);
        if d == 15 {
            3
        } else {
            1
        }
    }

    pub fn thumb_hi_bx(&mut self, inst: ThumbInst) -> u16 {
        let s = inst.0.bits(3, 4).u32();
        let rn = self.reg(s);
        if inst.0.is_bit(7) {
            // BLX
            if !S::IS_V5 {
                return self.thumb_unknown(inst);
            }
            let lr = self.cpur().regs.pc().wrapping_sub(2) | 1;
            self.cpu().regs.set_reg(14, lr);
        }
        if !rn.is_bit(0) {
            self.cpu().regs.set_flag(Thumb, false);
        }
        self.set_pc(rn);
        3
    }

    // THUMB.6
    pub fn thumb_ldr_pc(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(8);
        let n = (inst.0 & 0xFF).u32();
        let addr = (self.cpur().regs.pc() & !2).wrapping_add(n << 2);
        let value = self.read_word_ldrswp(addr);
        self.cpu().regs.set_reg(d.u32(), value);
        3
    }

    // THUMB.7/8
    pub fn thumb_ldrstr_reg<const OP: u16>(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(0);
        let rb = self.reg(inst.low(3).u32());
        let ro = self.reg(inst.low(6).u32());
        let rd = self.reg(d.u32());
        let addr = rb.wrapping_add(ro);

        match OP {
            0 => self.write::<u32>(addr, rd),       // STR
            1 => self.write::<u16>(addr, rd.u16()), // STRH
            2 => self.write::<u8>(addr, rd.u8()),   // STRB
            3 => {
                // LDSB
                let value = self.read::<u8>(addr) as i8 as i32 as u32;
                self.cpu().regs.set_reg(d.u32(), value);
            }
            4 => {
                // LDR
                let value = self.read_word_ldrswp(addr);
                self.cpu().regs.set_reg(d.u32(), value);
            }
            5 => {
                // LDRH
                let value = self.read::<u16>(addr);
                self.cpu().regs.set_reg(d.u32(), value);
            }
            6 => {
                // LDRB
                let value = self.read::<u8>(addr).u32();
                self.cpu().regs.set_reg(d.u32(), value);
            }
            _ => {
                // LDSH
                let value = self.read_hword_ldrsh(addr);
                self.cpu().regs.set_reg(d.u32(), value);
            }
        }
        if OP > 2 {
            3
        } else {
            2
        }
    }

    // THUMB.9
    pub fn thumb_ldrstr_imm<const OP: u16>(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(0);
        let rb = self.reg(inst.low(3).u32());
        let rd = self.reg(d.u32());
        let n = inst.0.bits(6, 5).u32();

        match OP {
            0 => self.write::<u32>(rb.wrapping_add(n << 2), rd), // STR
            1 => {
                // LDR
                let value = self.read_word_ldrswp(rb.wrapping_add(n << 2));
                self.cpu().regs.set_reg(d.u32(), value);
            }
            2 => self.write::<u8>(rb.wrapping_add(n), rd.u8()), // STRB
            _ => {
                // LDRB
                let value = self.read::<u8>(rb.wrapping_add(n)).u32();
                self.cpu().regs.set_reg(d.u32(), value);
            }
        }
        if OP.is_bit(0) {
            3
        } else {
            2
        }
    }

    // THUMB.10
    pub fn thumb_ldrstr_h<const LDR: bool>(&mut self, inst: ThumbInst) -> u16 {
        let d = inst.low(0);
        let rb = self.reg(inst.low(3).u32());
        let addr = rb.wrapping_add(inst.0.bits(6, 5).u32() << 1);

        if LDR {
            let value = self.read::<u16>(addr);
            self.cpu().regs.set_reg(d.u32(), value);
            3
        } else {
            let rd = self.reg(d.u32());
            self.write::<u16>(addr, rd.u16());
            2
        }
    }

    // THUMB.11
    pub fn thumb_str_sp(&mut self, inst: ThumbInst) -> u16 {
        let n = (inst.0 & 0xFF).u32();
        let d = inst.low(8);
        let rd = self.reg(d.u32());
        let addr = self.reg(13).wrapping_add(n << 2);
        self.write::<u32>(addr, rd);
        2
    }

    pub fn thumb_ldr_sp(&mut self, inst: ThumbInst) -> u16 {
        let n = (inst.0 & 0xFF).u32();
        let d = inst.low(8);
        let addr = self.reg(13).wrapping_add(n << 2);
        let value = self.read_word_ldrswp(addr);
        self.cpu().regs.set_reg(d.u32(), value);
        3
    }

    // THUMB.12
    pub fn thumb_rel_addr<const SP: bool>(&mut self, inst: ThumbInst) -> u16 {
        let n = (inst.0 & 0xFF).u32();
        let d = inst.low(8);
        let value = if SP {
            self.reg(13).wrapping_add(n << 2)
        } else {
            (self.cpur().regs.pc() & !2).wrapping_add(n << 2)
        };
        self.cpu().regs.set_reg(d.u32(), value);
        1
    }

    // THUMB.13
    pub fn thumb_sp_offs(&mut self, inst: ThumbInst) -> u16 {
        let n = ((inst.0 & 0x7F) << 2).u32();
        let sp = self.reg(13);
        let value = if inst.0.is_bit(7) {
            sp.wrapping_sub(n)
        } else {
            sp.wrapping_add(n)
        };
        self.cpu().regs.set_reg(13, value);
        1
    }

    // THUMB.14
    pub fn thumb_push<const LR: bool>(&mut self, inst: ThumbInst) -> u16 {
        let rlist = inst.0 & 0xFF;
        if rlist == 0 && !LR {
            return self.on_empty_rlist(13, true, false, true);
        }
        let count = rlist.count_ones() + LR as u32;
        let sp = self.reg(13).wrapping_sub(count * 4);
        self.cpu().regs.set_reg(13, sp);

        let mut addr = sp;
        for r in 0..8u16 {
            if rlist.is_bit(r) {
                let value = self.reg(r.u32());
                self.write::<u32>(addr, value);
                addr = addr.wrapping_add(4);
            }
        }
        if LR {
            let value = self.reg(14);
            self.write::<u32>(addr, value);
        }
        count as u16 + 1
    }

    pub fn thumb_pop<const PC: bool>(&mut self, inst: ThumbInst) -> u16 {
        let rlist = inst.0 & 0xFF;
        if rlist == 0 && !PC {
            return self.on_empty_rlist(13, false, true, false);
        }
        let mut sp = self.reg(13);
        for r in 0..8u16 {
            if rlist.is_bit(r) {
                let value = self.read::<u32>(sp);
                self.cpu().regs.set_reg(r.u32(), value);
                sp = sp.wrapping_add(4);
            }
        }
        let mut cost = rlist.count_ones() as u16 + 2;
        if PC {
            let value = self.read::<u32>(sp);
            sp = sp.wrapping_add(4);
            self.cpu().regs.set_reg(13, sp);
            if S::IS_V5 && !value.is_bit(0) {
                self.cpu().regs.set_flag(Thumb, false);
            }
            self.set_pc(value);
            cost += 2;
        } else {
            self.cpu().regs.set_reg(13, sp);
        }
        cost
    }

    // THUMB.15
    pub fn thumb_stmia(&mut self, inst: ThumbInst) -> u16 {
        let b = inst.low(8).u32();
        let rlist = inst.0 & 0xFF;
        if rlist == 0 {
            return self.on_empty_rlist(b, true, true, false);
        }
        let count = rlist.count_ones();
        let initial = self.reg(b);
        let end = initial.wrapping_add(count * 4);
        let first = rlist.trailing_zeros();

        let mut addr = initial;
        for r in 0..8u16 {
            if !rlist.is_bit(r) {
                continue;
            }
            // A base that is not the first entry stores its written-back
            // value
            let value = if r.u32() == b && r.u32() != first {
                end
            } else {
                self.reg(r.u32())
            };
            self.write::<u32>(addr, value);
            addr = addr.wrapping_add(4);
        }
        self.cpu().regs.set_reg(b, end);
        count as u16 + 1
    }

    pub fn thumb_ldmia(&mut self, inst: ThumbInst) -> u16 {
        let b = inst.low(8).u32();
        let rlist = inst.0 & 0xFF;
        if rlist == 0 {
            return self.on_empty_rlist(b, false, true, false);
        }
        let count = rlist.count_ones();
        let mut addr = self.reg(b);
        for r in 0..8u16 {
            if rlist.is_bit(r) {
                let value = self.read::<u32>(addr);
                self.cpu().regs.set_reg(r.u32(), value);
                addr = addr.wrapping_add(4);
            }
        }
        if !rlist.is_bit(b.u16()) {
            self.cpu().regs.set_reg(b, addr);
        }
        count as u16 + 2
    }

    // THUMB.16
    pub fn thumb_bcond<const COND: u16>(&mut self, inst: ThumbInst) -> u16 {
        let idx = ((COND as u32) << 4) | (self.cpur().regs.cpsr() >> 28);
        if CONDITION[idx as usize] == COND_TRUE {
            let nn = ((inst.0 & 0xFF) as i8 as i32) * 2;
            let pc = self.cpur().regs.pc();
            self.set_pc(pc.wrapping_add_signed(nn));
            3
        } else {
            1
        }
    }

    // THUMB.17
    pub fn thumb_swi(&mut self, _inst: ThumbInst) -> u16 {
        self.exception(0x08)
    }

    // THUMB.18
    pub fn thumb_b(&mut self, inst: ThumbInst) -> u16 {
        let nn = (inst.0.i10() as i32) * 2;
        let pc = self.cpur().regs.pc();
        self.set_pc(pc.wrapping_add_signed(nn));
        3
    }

    // THUMB.19
    pub fn thumb_set_lr(&mut self, inst: ThumbInst) -> u16 {
        let lr = self
            .cpur()
            .regs
            .pc()
            .wrapping_add_signed((inst.0.i10() as i32) << 12);
        self.cpu().regs.set_reg(14, lr);
        1
    }

    pub fn thumb_bl<const EXCHANGE: bool>(&mut self, inst: ThumbInst) -> u16 {
        let pc = self.cpur().regs.pc();
        let target = self
            .reg(14)
            .wrapping_add(((inst.0 & 0x7FF) as u32) << 1);
        self.cpu().regs.set_reg(14, pc.wrapping_sub(2) | 1);
        if EXCHANGE {
            // BLX drops to ARM (ARMv5)
            self.cpu().regs.set_flag(Thumb, false);
            self.set_pc(target & !3);
        } else {
            self.set_pc(target);
        }
        3
    }
}

#[derive(Copy, Clone)]
pub struct ThumbInst(pub u16);

impl ThumbInst {
    pub fn low(self, idx: u16) -> u16 {
        self.0.bits(idx, 3)
    }
}
