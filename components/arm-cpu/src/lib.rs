// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

mod alu;
mod exceptions;
mod hle;
pub mod inst_arm;
pub mod inst_thumb;
pub mod interface;
mod lut;
pub mod registers;

use common::{numutil::NumExt, Time};
pub use exceptions::Interrupt;
pub use hle::{
    DLDI_CLEAR, DLDI_IS_INSERTED, DLDI_READ, DLDI_STARTUP, DLDI_STOP, DLDI_WRITE, HLE_IRQ_RETURN,
};
use inst_arm::ArmInst;
use inst_thumb::ThumbInst;
pub use interface::{ArmSystem, BiosCall, RwType, SysWrapper};
use lut::{CONDITION, COND_FALSE, COND_RESERVED};
pub use registers::{Flag, Mode, Registers};

/// State of a single ARM processor. The console owns two of these and
/// steps them through [`Cpu::run_opcode`]; everything the interpreter
/// needs besides this state is reached through the [`ArmSystem`] the
/// entry points take.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cpu {
    pub regs: Registers,
    /// The two prefetched opcodes. `pipeline[1]` was fetched at the
    /// current PC, giving the architectural R15 offset of 8/4.
    pub pipeline: [u32; 2],
    /// Cycle cursor of this CPU, in global cycles.
    pub cycles: Time,
    /// Halt bitfield; bit 0 is waiting-for-interrupt. The CPU runs only
    /// while this is entirely clear.
    pub halted: u8,
    pub ime: bool,
    pub ie: u32,
    pub irf: u32,
    pub post_flg: u8,
}

impl Cpu {
    /// Execute the next instruction and return its cycle cost.
    #[inline]
    pub fn run_opcode<S: ArmSystem>(ds: &mut S) -> u16 {
        SysWrapper::new(ds).run_opcode()
    }

    /// Prepare the CPU to boot the BIOS at the reset vector.
    pub fn boot_bios<S: ArmSystem>(ds: &mut S) {
        SysWrapper::new(ds).boot_bios()
    }

    /// Prepare the CPU to directly boot a loaded NDS ROM, skipping the
    /// BIOS.
    pub fn direct_boot<S: ArmSystem>(ds: &mut S) {
        SysWrapper::new(ds).direct_boot()
    }

    /// Refill the pipeline after an out-of-line change to R15.
    pub fn flush_pipeline<S: ArmSystem>(ds: &mut S) {
        SysWrapper::new(ds).flush_pipeline()
    }

    pub fn halt(&mut self, bit: u8) {
        self.halted |= 1 << bit;
    }

    pub fn unhalt(&mut self, bit: u8) {
        self.halted &= !(1 << bit);
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted != 0
    }
}

impl<S: ArmSystem> SysWrapper<S> {
    /// Push the next opcode through the pipeline and execute it,
    /// returning the cycle cost of the instruction.
    pub fn run_opcode(&mut self) -> u16 {
        let op = {
            let cpu = self.cpu();
            let op = cpu.pipeline[0];
            cpu.pipeline[0] = cpu.pipeline[1];
            op
        };

        if self.cpur().regs.is_thumb() {
            // Fill the pipeline, incrementing the program counter
            let pc = self.cpu().regs.bump_pc(2);
            let next = self.get::<u16>(pc).u32();
            self.cpu().pipeline[1] = next;

            let handler = S::THUMB_LUT[((op >> 6) & 0x3FF) as usize];
            handler(self, ThumbInst(op as u16))
        } else {
            // Fill the pipeline, incrementing the program counter
            let pc = self.cpu().regs.bump_pc(4);
            let next = self.get::<u32>(pc);
            self.cpu().pipeline[1] = next;

            // Evaluate the current opcode's condition
            let cond = ((op >> 24) & 0xF0) | (self.cpur().regs.cpsr() >> 28);
            match CONDITION[cond as usize] {
                COND_FALSE => 1,
                COND_RESERVED => self.handle_reserved(op),
                _ => {
                    let idx = ((op >> 16) & 0xFF0) | ((op >> 4) & 0xF);
                    let handler = S::ARM_LUT[idx as usize];
                    handler(self, ArmInst(op))
                }
            }
        }
    }

    /// Adjust the program counter and refill the pipeline after a jump.
    pub fn flush_pipeline(&mut self) {
        if self.cpur().regs.is_thumb() {
            let pc = {
                let regs = &mut self.cpu().regs;
                regs.set_pc(regs.pc() & !1);
                regs.bump_pc(2)
            };
            let p0 = self.get::<u16>(pc.wrapping_sub(2)).u32();
            let p1 = self.get::<u16>(pc).u32();
            self.cpu().pipeline = [p0, p1];
        } else {
            let pc = {
                let regs = &mut self.cpu().regs;
                regs.set_pc(regs.pc() & !3);
                regs.bump_pc(4)
            };
            let p0 = self.get::<u32>(pc.wrapping_sub(4));
            let p1 = self.get::<u32>(pc);
            self.cpu().pipeline = [p0, p1];
        }
    }

    /// Prepare to boot the BIOS: Supervisor mode, interrupts off, reset
    /// vector.
    pub fn boot_bios(&mut self) {
        self.set_cpsr(0x0000_00D3, false);
        self.cpu()
            .regs
            .set_pc(if S::I == 0 { 0xFFFF_0000 } else { 0 });
        self.flush_pipeline();

        let cpu = self.cpu();
        cpu.ime = false;
        cpu.ie = 0;
        cpu.irf = 0;
        cpu.post_flg = 0;
    }

    /// Prepare to directly boot an NDS ROM: the entry point comes from
    /// the header the loader placed in main memory.
    pub fn direct_boot(&mut self) {
        let entry = self.read::<u32>(if S::I == 0 { 0x027F_FE24 } else { 0x027F_FE34 });

        let regs = &mut self.cpu().regs;
        if S::I == 0 {
            regs.set_usr_reg(13, 0x0300_2F7C);
            regs.set_mode_sp(Mode::Irq, 0x0300_3F80);
            regs.set_mode_sp(Mode::Supervisor, 0x0300_3FC0);
        } else {
            regs.set_usr_reg(13, 0x0380_FD80);
            regs.set_mode_sp(Mode::Irq, 0x0380_FF80);
            regs.set_mode_sp(Mode::Supervisor, 0x0380_FFC0);
        }

        self.set_cpsr(0x0000_00DF, false); // System, interrupts off
        let regs = &mut self.cpu().regs;
        regs.set_usr_reg(12, entry);
        regs.set_usr_reg(14, entry);
        regs.set_pc(entry);
        self.flush_pipeline();
    }

    #[inline]
    pub fn reg(&self, r: u32) -> u32 {
        self.cpur().regs.reg(r)
    }

    /// Set the PC and refill the pipeline.
    #[inline]
    pub fn set_pc(&mut self, value: u32) {
        self.cpu().regs.set_pc(value);
        self.flush_pipeline();
    }

    /// Set a register. Needs special behavior due to PC.
    pub fn set_reg(&mut self, r: u32, value: u32) {
        if r == 15 {
            self.set_pc(value);
        } else {
            self.cpu().regs.set_reg(r, value);
        }
    }

    /// Set a register. Additionally allows an ARM/THUMB switch when
    /// setting the PC, on ARMv5.
    pub fn set_reg_allow_switch(&mut self, r: u32, value: u32) {
        if r == 15 {
            if S::IS_V5 {
                self.cpu().regs.set_flag(Flag::Thumb, value.is_bit(0));
            }
            self.set_pc(value);
        } else {
            self.cpu().regs.set_reg(r, value);
        }
    }
}
