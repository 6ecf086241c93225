// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Lookup tables for instructions, both ARM and THUMB.
//!
//! The ARM table has 4096 slots indexed by opcode bits 20-27 and 4-7,
//! the THUMB table 1024 slots indexed by opcode bits 6-15; both are
//! expanded at compile time from the encoding bit patterns. The
//! condition table folds the 4-bit condition field and the current
//! NZCV flags into one byte.

use crate::{
    inst_arm::{ArmHandler, ArmLut},
    inst_thumb::{ThumbHandler, ThumbLut},
    interface::{ArmSystem, SysWrapper},
};

pub(crate) const COND_FALSE: u8 = 0;
pub(crate) const COND_TRUE: u8 = 1;
pub(crate) const COND_RESERVED: u8 = 2;

/// Indexed by `((opcode >> 24) & 0xF0) | (cpsr >> 28)`. The reserved
/// condition is dispatched separately, it encodes BLX and the HLE
/// hook opcodes.
pub(crate) const CONDITION: [u8; 256] = make_condition_table();

const fn make_condition_table() -> [u8; 256] {
    // This condition table is taken from mGBA sources, which are licensed under
    // MPL2 at https://github.com/mgba-emu/mgba
    // Thank you to endrift and other mGBA contributors!
    const COND_MASKS: [u16; 16] = [
        0xF0F0, // EQ [-Z--]
        0x0F0F, // NE [-z--]
        0xCCCC, // CS [--C-]
        0x3333, // CC [--c-]
        0xFF00, // MI [N---]
        0x00FF, // PL [n---]
        0xAAAA, // VS [---V]
        0x5555, // VC [---v]
        0x0C0C, // HI [-zC-]
        0xF3F3, // LS [-Z--] || [--c-]
        0xAA55, // GE [N--V] || [n--v]
        0x55AA, // LT [N--v] || [n--V]
        0x0A05, // GT [Nz-V] || [nz-v]
        0xF5FA, // LE [-Z--] || [Nz-v] || [nz-V]
        0xFFFF, // AL [----]
        0x0000, // NV
    ];

    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        let cond = i >> 4;
        let flags = i & 0xF;
        table[i] = if cond == 0xF {
            COND_RESERVED
        } else if COND_MASKS[cond] & (1 << flags) != 0 {
            COND_TRUE
        } else {
            COND_FALSE
        };
        i += 1;
    }
    table
}

impl<S: ArmSystem> SysWrapper<S> {
    pub const fn make_arm_lut() -> ArmLut<S> {
        let mut lut: ArmLut<S> = [Self::arm_unknown; 4096];
        let mut i = 0;
        while i < 4096 {
            lut[i] = Self::arm_handler(i);
            i += 1;
        }
        lut
    }

    pub const fn make_thumb_lut() -> ThumbLut<S> {
        let mut lut: ThumbLut<S> = [Self::thumb_unknown; 1024];
        let mut i = 0;
        while i < 1024 {
            lut[i] = Self::thumb_handler(i);
            i += 1;
        }
        lut
    }

    const fn arm_handler(i: usize) -> ArmHandler<S> {
        let hi = (i >> 4) & 0xFF; // opcode bits 20-27
        let lo = i & 0xF; // opcode bits 4-7
        match hi >> 5 {
            0b000 => Self::arm_handler_000(hi, lo),
            0b001 => {
                let op = (hi >> 1) & 0xF;
                let s = hi & 1 == 1;
                if !s && op >= 8 {
                    // The S=0 test-op hole holds MSR with immediate
                    match op {
                        9 => Self::arm_msr::<false, true>,
                        0xB => Self::arm_msr::<true, true>,
                        _ => Self::arm_unknown,
                    }
                } else {
                    Self::alu_imm_handler(hi)
                }
            }
            0b010 => Self::ldrstr_handler(hi, true),
            0b011 => {
                if lo & 1 == 1 {
                    Self::arm_unknown
                } else {
                    Self::ldrstr_handler(hi, false)
                }
            }
            0b100 => Self::stm_ldm_handler(hi),
            0b101 => {
                if hi & 0x10 != 0 {
                    Self::arm_b::<true>
                } else {
                    Self::arm_b::<false>
                }
            }
            // Coprocessor loads/stores are not a thing on these consoles
            0b110 => Self::arm_unknown,
            _ => {
                if hi & 0x10 != 0 {
                    Self::arm_swi
                } else if lo & 1 == 1 && S::IS_V5 {
                    if hi & 1 == 1 {
                        Self::arm_cp15::<true>
                    } else {
                        Self::arm_cp15::<false>
                    }
                } else {
                    Self::arm_unknown
                }
            }
        }
    }

    const fn arm_handler_000(hi: usize, lo: usize) -> ArmHandler<S> {
        let op = (hi >> 1) & 0xF;
        let s = hi & 1 == 1;

        // Multiplies and SWP occupy the 1001 column
        if lo == 0b1001 {
            return match (op, s) {
                (0, false) => Self::arm_mul::<0b000, false>,
                (0, true) => Self::arm_mul::<0b000, true>,
                (1, false) => Self::arm_mul::<0b001, false>,
                (1, true) => Self::arm_mul::<0b001, true>,
                (4, false) => Self::arm_mul::<0b100, false>,
                (4, true) => Self::arm_mul::<0b100, true>,
                (5, false) => Self::arm_mul::<0b101, false>,
                (5, true) => Self::arm_mul::<0b101, true>,
                (6, false) => Self::arm_mul::<0b110, false>,
                (6, true) => Self::arm_mul::<0b110, true>,
                (7, false) => Self::arm_mul::<0b111, false>,
                (7, true) => Self::arm_mul::<0b111, true>,
                (8, false) => Self::arm_swp::<false>,
                (0xA, false) => Self::arm_swp::<true>,
                _ => Self::arm_unknown,
            };
        }

        // Halfword, signed and doubleword transfers use 1011/1101/1111
        if lo == 0b1011 || lo == 0b1101 || lo == 0b1111 {
            return Self::halfword_handler(hi);
        }

        if !s && op >= 8 {
            // ARMv5 signed halfword multiplies
            if lo & 0b1001 == 0b1000 {
                return if S::IS_V5 {
                    match op {
                        8 => Self::arm_mul_half::<0>,
                        9 => Self::arm_mul_half::<1>,
                        0xA => Self::arm_mul_half::<2>,
                        _ => Self::arm_mul_half::<3>,
                    }
                } else {
                    Self::arm_unknown
                };
            }
            // PSR transfers, branches and saturating math sit in the
            // S=0 test-op hole
            return match (op, lo) {
                (8, 0) => Self::arm_mrs::<false>,
                (0xA, 0) => Self::arm_mrs::<true>,
                (9, 0) => Self::arm_msr::<false, false>,
                (0xB, 0) => Self::arm_msr::<true, false>,
                (9, 1) => Self::arm_bx,
                (0xB, 1) => {
                    if S::IS_V5 {
                        Self::arm_clz
                    } else {
                        Self::arm_unknown
                    }
                }
                (9, 3) => {
                    if S::IS_V5 {
                        Self::arm_blx_reg
                    } else {
                        Self::arm_unknown
                    }
                }
                (8, 5) => {
                    if S::IS_V5 {
                        Self::arm_qalu::<0>
                    } else {
                        Self::arm_unknown
                    }
                }
                (9, 5) => {
                    if S::IS_V5 {
                        Self::arm_qalu::<1>
                    } else {
                        Self::arm_unknown
                    }
                }
                (0xA, 5) => {
                    if S::IS_V5 {
                        Self::arm_qalu::<2>
                    } else {
                        Self::arm_unknown
                    }
                }
                (0xB, 5) => {
                    if S::IS_V5 {
                        Self::arm_qalu::<3>
                    } else {
                        Self::arm_unknown
                    }
                }
                _ => Self::arm_unknown,
            };
        }

        Self::alu_reg_handler(hi)
    }

    const fn alu_reg_handler(hi: usize) -> ArmHandler<S> {
        match hi & 0x1F {
            0x00 => Self::arm_alu_reg::<0x0, false>,
            0x01 => Self::arm_alu_reg::<0x0, true>,
            0x02 => Self::arm_alu_reg::<0x1, false>,
            0x03 => Self::arm_alu_reg::<0x1, true>,
            0x04 => Self::arm_alu_reg::<0x2, false>,
            0x05 => Self::arm_alu_reg::<0x2, true>,
            0x06 => Self::arm_alu_reg::<0x3, false>,
            0x07 => Self::arm_alu_reg::<0x3, true>,
            0x08 => Self::arm_alu_reg::<0x4, false>,
            0x09 => Self::arm_alu_reg::<0x4, true>,
            0x0A => Self::arm_alu_reg::<0x5, false>,
            0x0B => Self::arm_alu_reg::<0x5, true>,
            0x0C => Self::arm_alu_reg::<0x6, false>,
            0x0D => Self::arm_alu_reg::<0x6, true>,
            0x0E => Self::arm_alu_reg::<0x7, false>,
            0x0F => Self::arm_alu_reg::<0x7, true>,
            0x11 => Self::arm_alu_reg::<0x8, true>,
            0x13 => Self::arm_alu_reg::<0x9, true>,
            0x15 => Self::arm_alu_reg::<0xA, true>,
            0x17 => Self::arm_alu_reg::<0xB, true>,
            0x18 => Self::arm_alu_reg::<0xC, false>,
            0x19 => Self::arm_alu_reg::<0xC, true>,
            0x1A => Self::arm_alu_reg::<0xD, false>,
            0x1B => Self::arm_alu_reg::<0xD, true>,
            0x1C => Self::arm_alu_reg::<0xE, false>,
            0x1D => Self::arm_alu_reg::<0xE, true>,
            0x1E => Self::arm_alu_reg::<0xF, false>,
            _ => Self::arm_alu_reg::<0xF, true>,
        }
    }

    const fn alu_imm_handler(hi: usize) -> ArmHandler<S> {
        match hi & 0x1F {
            0x00 => Self::arm_alu_imm::<0x0, false>,
            0x01 => Self::arm_alu_imm::<0x0, true>,
            0x02 => Self::arm_alu_imm::<0x1, false>,
            0x03 => Self::arm_alu_imm::<0x1, true>,
            0x04 => Self::arm_alu_imm::<0x2, false>,
            0x05 => Self::arm_alu_imm::<0x2, true>,
            0x06 => Self::arm_alu_imm::<0x3, false>,
            0x07 => Self::arm_alu_imm::<0x3, true>,
            0x08 => Self::arm_alu_imm::<0x4, false>,
            0x09 => Self::arm_alu_imm::<0x4, true>,
            0x0A => Self::arm_alu_imm::<0x5, false>,
            0x0B => Self::arm_alu_imm::<0x5, true>,
            0x0C => Self::arm_alu_imm::<0x6, false>,
            0x0D => Self::arm_alu_imm::<0x6, true>,
            0x0E => Self::arm_alu_imm::<0x7, false>,
            0x0F => Self::arm_alu_imm::<0x7, true>,
            0x11 => Self::arm_alu_imm::<0x8, true>,
            0x13 => Self::arm_alu_imm::<0x9, true>,
            0x15 => Self::arm_alu_imm::<0xA, true>,
            0x17 => Self::arm_alu_imm::<0xB, true>,
            0x18 => Self::arm_alu_imm::<0xC, false>,
            0x19 => Self::arm_alu_imm::<0xC, true>,
            0x1A => Self::arm_alu_imm::<0xD, false>,
            0x1B => Self::arm_alu_imm::<0xD, true>,
            0x1C => Self::arm_alu_imm::<0xE, false>,
            0x1D => Self::arm_alu_imm::<0xE, true>,
            0x1E => Self::arm_alu_imm::<0xF, false>,
            _ => Self::arm_alu_imm::<0xF, true>,
        }
    }

    const fn ldrstr_handler(hi: usize, imm: bool) -> ArmHandler<S> {
        if imm {
            match hi & 0x1F {
                0x00 => Self::arm_ldrstr::<0x00, true>,
                0x01 => Self::arm_ldrstr::<0x01, true>,
                0x02 => Self::arm_ldrstr::<0x02, true>,
                0x03 => Self::arm_ldrstr::<0x03, true>,
                0x04 => Self::arm_ldrstr::<0x04, true>,
                0x05 => Self::arm_ldrstr::<0x05, true>,
                0x06 => Self::arm_ldrstr::<0x06, true>,
                0x07 => Self::arm_ldrstr::<0x07, true>,
                0x08 => Self::arm_ldrstr::<0x08, true>,
                0x09 => Self::arm_ldrstr::<0x09, true>,
                0x0A => Self::arm_ldrstr::<0x0A, true>,
                0x0B => Self::arm_ldrstr::<0x0B, true>,
                0x0C => Self::arm_ldrstr::<0x0C, true>,
                0x0D => Self::arm_ldrstr::<0x0D, true>,
                0x0E => Self::arm_ldrstr::<0x0E, true>,
                0x0F => Self::arm_ldrstr::<0x0F, true>,
                0x10 => Self::arm_ldrstr::<0x10, true>,
                0x11 => Self::arm_ldrstr::<0x11, true>,
                0x12 => Self::arm_ldrstr::<0x12, true>,
                0x13 => Self::arm_ldrstr::<0x13, true>,
                0x14 => Self::arm_ldrstr::<0x14, true>,
                0x15 => Self::arm_ldrstr::<0x15, true>,
                0x16 => Self::arm_ldrstr::<0x16, true>,
                0x17 => Self::arm_ldrstr::<0x17, true>,
                0x18 => Self::arm_ldrstr::<0x18, true>,
                0x19 => Self::arm_ldrstr::<0x19, true>,
                0x1A => Self::arm_ldrstr::<0x1A, true>,
                0x1B => Self::arm_ldrstr::<0x1B, true>,
                0x1C => Self::arm_ldrstr::<0x1C, true>,
                0x1D => Self::arm_ldrstr::<0x1D, true>,
                0x1E => Self::arm_ldrstr::<0x1E, true>,
                _ => Self::arm_ldrstr::<0x1F, true>,
            }
        } else {
            match hi & 0x1F {
                0x00 => Self::arm_ldrstr::<0x00, false>,
                0x01 => Self::arm_ldrstr::<0x01, false>,
                0x02 => Self::arm_ldrstr::<0x02, false>,
                0x03 => Self::arm_ldrstr::<0x03, false>,
                0x04 => Self::arm_ldrstr::<0x04, false>,
                0x05 => Self::arm_ldrstr::<0x05, false>,
                0x06 => Self::arm_ldrstr::<0x06, false>,
                0x07 => Self::arm_ldrstr::<0x07, false>,
                0x08 => Self::arm_ldrstr::<0x08, false>,
                0x09 => Self::arm_ldrstr::<0x09, false>,
                0x0A => Self::arm_ldrstr::<0x0A, false>,
                0x0B => Self::arm_ldrstr::<0x0B, false>,
                0x0C => Self::arm_ldrstr::<0x0C, false>,
                0x0D => Self::arm_ldrstr::<0x0D, false>,
                0x0E => Self::arm_ldrstr::<0x0E, false>,
                0x0F => Self::arm_ldrstr::<0x0F, false>,
                0x10 => Self::arm_ldrstr::<0x10, false>,
                0x11 => Self::arm_ldrstr::<0x11, false>,
                0x12 => Self::arm_ldrstr::<0x12, false>,
                0x13 => Self::arm_ldrstr::<0x13, false>,
                0x14 => Self::arm_ldrstr::<0x14, false>,
                0x15 => Self::arm_ldrstr::<0x15, false>,
                0x16 => Self::arm_ldrstr::<0x16, false>,
                0x17 => Self::arm_ldrstr::<0x17, false>,
                0x18 => Self::arm_ldrstr::<0x18, false>,
                0x19 => Self::arm_ldrstr::<0x19, false>,
                0x1A => Self::arm_ldrstr::<0x1A, false>,
                0x1B => Self::arm_ldrstr::<0x1B, false>,
                0x1C => Self::arm_ldrstr::<0x1C, false>,
                0x1D => Self::arm_ldrstr::<0x1D, false>,
                0x1E => Self::arm_ldrstr::<0x1E, false>,
                _ => Self::arm_ldrstr::<0x1F, false>,
            }
        }
    }

    const fn halfword_handler(hi: usize) -> ArmHandler<S> {
        match hi & 0x1F {
            0x00 => Self::arm_ldrstr_half::<0x00>,
            0x01 => Self::arm_ldrstr_half::<0x01>,
            0x02 => Self::arm_ldrstr_half::<0x02>,
            0x03 => Self::arm_ldrstr_half::<0x03>,
            0x04 => Self::arm_ldrstr_half::<0x04>,
            0x05 => Self::arm_ldrstr_half::<0x05>,
            0x06 => Self::arm_ldrstr_half::<0x06>,
            0x07 => Self::arm_ldrstr_half::<0x07>,
            0x08 => Self::arm_ldrstr_half::<0x08>,
            0x09 => Self::arm_ldrstr_half::<0x09>,
            0x0A => Self::arm_ldrstr_half::<0x0A>,
            0x0B => Self::arm_ldrstr_half::<0x0B>,
            0x0C => Self::arm_ldrstr_half::<0x0C>,
            0x0D => Self::arm_ldrstr_half::<0x0D>,
            0x0E => Self::arm_ldrstr_half::<0x0E>,
            0x0F => Self::arm_ldrstr_half::<0x0F>,
            0x10 => Self::arm_ldrstr_half::<0x10>,
            0x11 => Self::arm_ldrstr_half::<0x11>,
            0x12 => Self::arm_ldrstr_half::<0x12>,
            0x13 => Self::arm_ldrstr_half::<0x13>,
            0x14 => Self::arm_ldrstr_half::<0x14>,
            0x15 => Self::arm_ldrstr_half::<0x15>,
            0x16 => Self::arm_ldrstr_half::<0x16>,
            0x17 => Self::arm_ldrstr_half::<0x17>,
            0x18 => Self::arm_ldrstr_half::<0x18>,
            0x19 => Self::arm_ldrstr_half::<0x19>,
            0x1A => Self::arm_ldrstr_half::<0x1A>,
            0x1B => Self::arm_ldrstr_half::<0x1B>,
            0x1C => Self::arm_ldrstr_half::<0x1C>,
            0x1D => Self::arm_ldrstr_half::<0x1D>,
            0x1E => Self::arm_ldrstr_half::<0x1E>,
            _ => Self::arm_ldrstr_half::<0x1F>,
        }
    }

    const fn stm_ldm_handler(hi: usize) -> ArmHandler<S> {
        match hi & 0x1F {
            0x00 => Self::arm_stm_ldm::<0x00>,
            0x01 => Self::arm_stm_ldm::<0x01>,
            0x02 => Self::arm_stm_ldm::<0x02>,
            0x03 => Self::arm_stm_ldm::<0x03>,
            0x04 => Self::arm_stm_ldm::<0x04>,
            0x05 => Self::arm_stm_ldm::<0x05>,
            0x06 => Self::arm_stm_ldm::<0x06>,
            0x07 => Self::arm_stm_ldm::<0x07>,
            0x08 => Self::arm_stm_ldm::<0x08>,
            0x09 => Self::arm_stm_ldm::<0x09>,
            0x0A => Self::arm_stm_ldm::<0x0A>,
            0x0B => Self::arm_stm_ldm::<0x0B>,
            0x0C => Self::arm_stm_ldm::<0x0C>,
            0x0D => Self::arm_stm_ldm::<0x0D>,
            0x0E => Self::arm_stm_ldm::<0x0E>,
            0x0F => Self::arm_stm_ldm::<0x0F>,
            0x10 => Self::arm_stm_ldm::<0x10>,
            0x11 => Self::arm_stm_ldm::<0x11>,
            0x12 => Self::arm_stm_ldm::<0x12>,
            0x13 => Self::arm_stm_ldm::<0x13>,
            0x14 => Self::arm_stm_ldm::<0x14>,
            0x15 => Self::arm_stm_ldm::<0x15>,
            0x16 => Self::arm_stm_ldm::<0x16>,
            0x17 => Self::arm_stm_ldm::<0x17>,
            0x18 => Self::arm_stm_ldm::<0x18>,
            0x19 => Self::arm_stm_ldm::<0x19>,
            0x1A => Self::arm_stm_ldm::<0x1A>,
            0x1B => Self::arm_stm_ldm::<0x1B>,
            0x1C => Self::arm_stm_ldm::<0x1C>,
            0x1D => Self::arm_stm_ldm::<0x1D>,
            0x1E => Self::arm_stm_ldm::<0x1E>,
            _ => Self::arm_stm_ldm::<0x1F>,
        }
    }

    const fn thumb_handler(i: usize) -> ThumbHandler<S> {
        // i holds opcode bits 6-15
        let b8 = i >> 2; // opcode bits 8-15
        match i >> 5 {
            0b00000 => Self::thumb_shift::<0>,
            0b00001 => Self::thumb_shift::<1>,
            0b00010 => Self::thumb_shift::<2>,
            0b00011 => match (i >> 3) & 3 {
                0 => Self::thumb_addsub::<false, false>,
                1 => Self::thumb_addsub::<false, true>,
                2 => Self::thumb_addsub::<true, false>,
                _ => Self::thumb_addsub::<true, true>,
            },
            0b00100 => Self::thumb_imm::<0>,
            0b00101 => Self::thumb_imm::<1>,
            0b00110 => Self::thumb_imm::<2>,
            0b00111 => Self::thumb_imm::<3>,
            0b01000 => {
                if i & 0x10 == 0 {
                    match i & 0xF {
                        0x0 => Self::thumb_alu::<0x0>,
                        0x1 => Self::thumb_alu::<0x1>,
                        0x2 => Self::thumb_alu::<0x2>,
                        0x3 => Self::thumb_alu::<0x3>,
                        0x4 => Self::thumb_alu::<0x4>,
                        0x5 => Self::thumb_alu::<0x5>,
                        0x6 => Self::thumb_alu::<0x6>,
                        0x7 => Self::thumb_alu::<0x7>,
                        0x8 => Self::thumb_alu::<0x8>,
                        0x9 => Self::thumb_alu::<0x9>,
                        0xA => Self::thumb_alu::<0xA>,
                        0xB => Self::thumb_alu::<0xB>,
                        0xC => Self::thumb_alu::<0xC>,
                        0xD => Self::thumb_alu::<0xD>,
                        0xE => Self::thumb_alu::<0xE>,
                        _ => Self::thumb_alu::<0xF>,
                    }
                } else {
                    match (i >> 2) & 3 {
                        0 => Self::thumb_hi_add,
                        1 => Self::thumb_hi_cmp,
                        2 => Self::thumb_hi_mov,
                        _ => Self::thumb_hi_bx,
                    }
                }
            }
            0b01001 => Self::thumb_ldr_pc,
            0b01010 | 0b01011 => match (i >> 3) & 7 {
                0 => Self::thumb_ldrstr_reg::<0>,
                1 => Self::thumb_ldrstr_reg::<1>,
                2 => Self::thumb_ldrstr_reg::<2>,
                3 => Self::thumb_ldrstr_reg::<3>,
                4 => Self::thumb_ldrstr_reg::<4>,
                5 => Self::thumb_ldrstr_reg::<5>,
                6 => Self::thumb_ldrstr_reg::<6>,
                _ => Self::thumb_ldrstr_reg::<7>,
            },
            0b01100 => Self::thumb_ldrstr_imm::<0>,
            0b01101 => Self::thumb_ldrstr_imm::<1>,
            0b01110 => Self::thumb_ldrstr_imm::<2>,
            0b01111 => Self::thumb_ldrstr_imm::<3>,
            0b10000 => Self::thumb_ldrstr_h::<false>,
            0b10001 => Self::thumb_ldrstr_h::<true>,
            0b10010 => Self::thumb_str_sp,
            0b10011 => Self::thumb_ldr_sp,
            0b10100 => Self::thumb_rel_addr::<false>,
            0b10101 => Self::thumb_rel_addr::<true>,
            0b10110 | 0b10111 => match b8 & 0xFF {
                0xB0 => Self::thumb_sp_offs,
                0xB4 => Self::thumb_push::<false>,
                0xB5 => Self::thumb_push::<true>,
                0xBC => Self::thumb_pop::<false>,
                0xBD => Self::thumb_pop::<true>,
                _ => Self::thumb_unknown,
            },
            0b11000 => Self::thumb_stmia,
            0b11001 => Self::thumb_ldmia,
            0b11010 | 0b11011 => match b8 & 0xF {
                0x0 => Self::thumb_bcond::<0x0>,
                0x1 => Self::thumb_bcond::<0x1>,
                0x2 => Self::thumb_bcond::<0x2>,
                0x3 => Self::thumb_bcond::<0x3>,
                0x4 => Self::thumb_bcond::<0x4>,
                0x5 => Self::thumb_bcond::<0x5>,
                0x6 => Self::thumb_bcond::<0x6>,
                0x7 => Self::thumb_bcond::<0x7>,
                0x8 => Self::thumb_bcond::<0x8>,
                0x9 => Self::thumb_bcond::<0x9>,
                0xA => Self::thumb_bcond::<0xA>,
                0xB => Self::thumb_bcond::<0xB>,
                0xC => Self::thumb_bcond::<0xC>,
                0xD => Self::thumb_bcond::<0xD>,
                0xE => Self::thumb_unknown,
                _ => Self::thumb_swi,
            },
            0b11100 => Self::thumb_b,
            0b11101 => {
                if S::IS_V5 {
                    Self::thumb_bl::<true>
                } else {
                    Self::thumb_unknown
                }
            }
            0b11110 => Self::thumb_set_lr,
            _ => Self::thumb_bl::<false>,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn condition_table_basics() {
        // EQ needs Z, which is flag bit 30 -> index bit 2
        assert_eq!(CONDITION[0x04], COND_TRUE);
        assert_eq!(CONDITION[0x00], COND_FALSE);
        // NE is the inverse
        assert_eq!(CONDITION[0x14], COND_FALSE);
        assert_eq!(CONDITION[0x10], COND_TRUE);
        // AL holds for every flag combination
        for flags in 0..16 {
            assert_eq!(CONDITION[0xE0 | flags], COND_TRUE);
        }
        // The NV row is reserved
        for flags in 0..16 {
            assert_eq!(CONDITION[0xF0 | flags], COND_RESERVED);
        }
    }

    #[test]
    fn condition_table_signed() {
        // GE: N == V
        assert_eq!(CONDITION[0xA0], COND_TRUE); // neither
        assert_eq!(CONDITION[0xA9], COND_TRUE); // both (N=8, V=1)
        assert_eq!(CONDITION[0xA8], COND_FALSE); // N only
        assert_eq!(CONDITION[0xA1], COND_FALSE); // V only
    }
}
