// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Exception entry, the interrupt unit, and the memory-mapped interrupt
//! control registers.

use common::{numutil::NumExt, Time};

use crate::{
    interface::{ArmSystem, BiosCall, SysWrapper},
    registers::Flag::IrqDisable,
    Cpu,
};

/// Writable IE bits, which differ per CPU and console mode.
const IE_MASK_ARM9: u32 = 0x003F_3F7F;
const IE_MASK_ARM7: u32 = 0x01FF_3FFF;
const IE_MASK_GBA: u32 = 0x3FFF;

impl Cpu {
    pub fn exception<S: ArmSystem>(ds: &mut S, vector: u8) -> u16 {
        SysWrapper::new(ds).exception(vector)
    }

    /// Set the CPSR, rechecking the interrupt condition afterwards.
    pub fn set_cpsr<S: ArmSystem>(ds: &mut S, value: u32, save: bool) {
        SysWrapper::new(ds).set_cpsr(value, save)
    }

    pub fn send_interrupt<S: ArmSystem>(ds: &mut S, int: Interrupt) {
        Self::send_interrupt_idx(ds, int as u16);
    }

    pub fn send_interrupt_idx<S: ArmSystem>(ds: &mut S, bit: u16) {
        SysWrapper::new(ds).send_interrupt(bit)
    }

    /// The scheduled interrupt delivery task.
    pub fn handle_pending_irq<S: ArmSystem>(ds: &mut S) {
        SysWrapper::new(ds).handle_pending_irq()
    }

    pub fn write_ime<S: ArmSystem>(ds: &mut S, value: u8) {
        SysWrapper::new(ds).write_ime(value)
    }

    pub fn write_ie<S: ArmSystem>(ds: &mut S, mask: u32, value: u32) {
        SysWrapper::new(ds).write_ie(mask, value)
    }

    /// Write to the IF register. Setting a bit acknowledges the
    /// interrupt, clearing it.
    pub fn write_irf(&mut self, mask: u32, value: u32) {
        self.irf &= !(value & mask);
    }

    pub fn write_post_flg<S: ArmSystem>(ds: &mut S, value: u8) {
        // The first bit can be set, but never cleared
        // For some reason, the second bit is writable on the ARM9
        let cpu = ds.cpu();
        cpu.post_flg |= value & 0x01;
        if S::I == 0 {
            cpu.post_flg = (cpu.post_flg & !0x02) | (value & 0x02);
        }
    }
}

impl<S: ArmSystem> SysWrapper<S> {
    /// Deliver an exception: switch modes, save the return state, jump
    /// to the vector. Forwarded to the HLE BIOS when one is attached,
    /// unless this is the ARM9 running with a low vector base.
    pub fn exception(&mut self, vector: u8) -> u16 {
        if self.hle_bios_attached() && (S::I == 1 || self.exception_addr() != 0) {
            match self.bios_call(vector) {
                BiosCall::Done(cycles) => return cycles,
                BiosCall::EnterIrq => return self.handle_hle_irq(),
                BiosCall::Unhandled => {}
            }
        }

        const MODES: [u32; 8] = [0x13, 0x1B, 0x13, 0x17, 0x17, 0x13, 0x12, 0x11];
        let cpsr = self.cpur().regs.cpsr();
        // ARM state, interrupts off, new mode; the old CPSR moves into
        // the target SPSR
        self.set_cpsr(
            (cpsr & !0x3F) | 0x80 | MODES[(vector >> 2) as usize],
            true,
        );

        {
            let regs = &mut self.cpu().regs;
            let thumb_entry = regs.spsr().is_bit(5);
            let lr = regs.pc().wrapping_add(if thumb_entry { 2 } else { 0 });
            regs.set_reg(14, lr);
        }
        let base = if S::I == 0 { self.exception_addr() } else { 0 };
        self.cpu().regs.set_pc(base.wrapping_add(vector as u32));
        self.flush_pipeline();
        3
    }

    /// Set the CPSR; enabling interrupts with a request pending delivers
    /// it after the acknowledge latency.
    pub fn set_cpsr(&mut self, value: u32, save: bool) {
        self.cpu().regs.set_cpsr(value, save);
        self.check_interrupt();
    }

    /// Schedule the delayed interrupt check when an interrupt is
    /// enabled and pending.
    pub(crate) fn check_interrupt(&mut self) {
        let cpu = self.cpur();
        if cpu.ime && (cpu.ie & cpu.irf) != 0 && !cpu.regs.flag(IrqDisable) {
            let delay = if S::I == 1 && !self.gba_mode() { 2 } else { 1 };
            self.schedule_irq_check(delay as Time);
        }
    }

    /// Raise an interrupt request bit, triggering the interrupt or
    /// unhalting the CPU when the conditions are met.
    /// The ARM9 needs IME set to unhalt, but the ARM7 doesn't care.
    pub fn send_interrupt(&mut self, bit: u16) {
        self.cpu().irf |= 1 << bit;
        let cpu = self.cpur();
        if cpu.ie & cpu.irf != 0 {
            if cpu.ime && !cpu.regs.flag(IrqDisable) {
                let delay = if S::I == 1 && !self.gba_mode() { 2 } else { 1 };
                self.schedule_irq_check(delay as Time);
            } else if cpu.ime || S::I == 1 {
                self.cpu().unhalt(0);
            }
        }
    }

    /// Trigger an interrupt and unhalt the CPU if the conditions still
    /// hold.
    pub fn handle_pending_irq(&mut self) {
        let cpu = self.cpur();
        if cpu.ime && (cpu.ie & cpu.irf) != 0 && !cpu.regs.flag(IrqDisable) {
            self.exception(0x18);
            self.cpu().unhalt(0);
        }
    }

    pub fn write_ime(&mut self, value: u8) {
        self.cpu().ime = value & 0x01 != 0;
        self.check_interrupt();
    }

    pub fn write_ie(&mut self, mask: u32, value: u32) {
        let mask = mask
            & if S::I == 0 {
                IE_MASK_ARM9
            } else if self.gba_mode() {
                IE_MASK_GBA
            } else {
                IE_MASK_ARM7
            };
        let cpu = self.cpu();
        cpu.ie = (cpu.ie & !mask) | (value & mask);
        self.check_interrupt();
    }
}

/// Possible interrupts.
/// These are the same between GBA and NDS, so
/// putting them here is OK.
#[repr(C)]
#[derive(Copy, Clone)]
pub enum Interrupt {
    VBlank,
    HBlank,
    VCounter,
    Timer0,
    Timer1,
    Timer2,
    Timer3,
    Serial,
    Dma0,
    Dma1,
    Dma2,
    Dma3,
    Joypad,
    GamePak,
    Unused1,
    Unused2,
    IpcSync,
    IpcSendFifoEmpty,
    IpcRecvFifoNotEmpty,
    CardTransferComplete,
    CardIreqMc,
    GeometryFifo,
    ScreensOpen,
    SpiBus,
    Wifi,
}
