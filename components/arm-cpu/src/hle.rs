// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The reserved-condition escape hatch: ARMv5 BLX, the HLE BIOS IRQ
//! return opcode, and the DLDI driver hooks.

use common::numutil::{NumExt, U32Ext};

use crate::{
    inst_arm::ArmInst,
    interface::{ArmSystem, SysWrapper},
    registers::Flag::Thumb,
};

/// Sentinel opcode the HLE BIOS leaves as the interrupt return address.
pub const HLE_IRQ_RETURN: u32 = 0xFF00_0000;

/// Sentinel opcodes patched over the DLDI driver's entry points. They
/// carry the reserved condition so real code can never collide with
/// them.
pub const DLDI_STARTUP: u32 = 0xF900_0000;
pub const DLDI_IS_INSERTED: u32 = 0xF900_0001;
pub const DLDI_READ: u32 = 0xF900_0002;
pub const DLDI_WRITE: u32 = 0xF900_0003;
pub const DLDI_CLEAR: u32 = 0xF900_0004;
pub const DLDI_STOP: u32 = 0xF900_0005;

impl<S: ArmSystem> SysWrapper<S> {
    /// Handle an opcode with the reserved condition code.
    pub fn handle_reserved(&mut self, op: u32) -> u16 {
        // The ARM9-exclusive BLX instruction uses the reserved condition
        // code, so let it run
        if op & 0x0E00_0000 == 0x0A00_0000 {
            return self.arm_blx_imm(op);
        }

        // If the special HLE BIOS opcode was jumped to, return from an
        // HLE interrupt
        if self.hle_bios_attached() && op == HLE_IRQ_RETURN {
            return self.finish_hle_irq();
        }

        // If a DLDI function was jumped to, run it and return through LR
        if self.dldi_patched() {
            let r0 = match op {
                DLDI_STARTUP => self.dldi_startup(),
                DLDI_IS_INSERTED => self.dldi_is_inserted(),
                DLDI_READ => {
                    let (sector, count, buf) = (self.reg(0), self.reg(1), self.reg(2));
                    self.dldi_read_sectors(sector, count, buf)
                }
                DLDI_WRITE => {
                    let (sector, count, buf) = (self.reg(0), self.reg(1), self.reg(2));
                    self.dldi_write_sectors(sector, count, buf)
                }
                DLDI_CLEAR => self.dldi_clear_status(),
                DLDI_STOP => self.dldi_shutdown(),
                _ => self.reg(0),
            };
            self.cpu().regs.set_reg(0, r0);

            let lr = self.reg(14);
            if lr.is_bit(0) {
                self.cpu().regs.set_flag(Thumb, true);
            }
            self.set_pc(lr);
            return 3;
        }

        self.arm_unknown(ArmInst(op))
    }

    /// BLX with an immediate target; always links and drops to THUMB.
    fn arm_blx_imm(&mut self, op: u32) -> u16 {
        let pc = self.cpur().regs.pc();
        self.cpu().regs.set_reg(14, pc.wrapping_sub(4));
        self.cpu().regs.set_flag(Thumb, true);
        let nn = op
            .i24()
            .wrapping_mul(4)
            .wrapping_add((((op >> 24) & 1) << 1) as i32);
        self.set_pc(pc.wrapping_add_signed(nn));
        3
    }

    /// HLE replacement for the BIOS interrupt entry: push the scratch
    /// registers, point LR at the HLE return opcode and jump to the
    /// handler the game registered.
    pub fn handle_hle_irq(&mut self) -> u16 {
        let cpsr = self.cpur().regs.cpsr();
        self.set_cpsr((cpsr & !0x3F) | 0x80 | 0x12, true);
        {
            let regs = &mut self.cpu().regs;
            let thumb_entry = regs.spsr().is_bit(5);
            let lr = regs.pc().wrapping_add(if thumb_entry { 2 } else { 0 });
            regs.set_reg(14, lr);
        }
        self.stmdb_writeback(13, 0x500F); // R0-R3, R12, LR

        let ret = if S::I == 1 { 0x0000_0000 } else { 0xFFFF_0000 };
        self.cpu().regs.set_reg(14, ret);
        let handler_ptr = if S::I == 1 {
            0x03FF_FFFC
        } else {
            self.dtcm_addr().wrapping_add(0x3FFC)
        };
        let target = self.read::<u32>(handler_ptr);
        self.cpu().regs.set_pc(target);
        self.flush_pipeline();
        3
    }

    /// Return from an HLE interrupt, popping what `handle_hle_irq`
    /// pushed and restoring the interrupted mode.
    fn finish_hle_irq(&mut self) -> u16 {
        // Update the wait flags if in the middle of an HLE IntrWait
        // function
        if self.bios_should_check() {
            self.bios_check_wait_flags();
        }

        self.ldmia_writeback(13, 0x500F); // R0-R3, R12, LR
        let lr = self.reg(14);
        self.cpu().regs.set_pc(lr.wrapping_sub(4));
        if self.cpur().regs.has_spsr() {
            let spsr = self.cpur().regs.spsr();
            self.set_cpsr(spsr, false);
        }
        self.flush_pipeline();
        3
    }

    /// STMDB with writeback, as the IRQ stub uses it.
    fn stmdb_writeback(&mut self, rn: u32, rlist: u16) {
        let count = rlist.count_ones();
        let base = self.reg(rn).wrapping_sub(count * 4);
        self.cpu().regs.set_reg(rn, base);

        let mut addr = base;
        for r in 0..16u16 {
            if rlist.is_bit(r) {
                let value = self.reg(r.u32());
                self.write::<u32>(addr, value);
                addr = addr.wrapping_add(4);
            }
        }
    }

    /// LDMIA with writeback, the inverse of the IRQ stub's push.
    fn ldmia_writeback(&mut self, rn: u32, rlist: u16) {
        let mut addr = self.reg(rn);
        for r in 0..16u16 {
            if rlist.is_bit(r) {
                let value = self.read::<u32>(addr);
                self.cpu().regs.set_reg(r.u32(), value);
                addr = addr.wrapping_add(4);
            }
        }
        self.cpu().regs.set_reg(rn, addr);
    }
}
