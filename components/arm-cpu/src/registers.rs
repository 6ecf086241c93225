// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The banked ARM register file.
//!
//! All registers live in one flat bank file; `ptr` maps the 16 logical
//! registers to whichever cell is banked in for the current mode. A mode
//! switch only rewrites the handles, it never copies register values.

use bitmatch::bitmatch;
use common::numutil::NumExt;

// Bank file layout: user R0..R14 and the PC, the FIQ bank, R13/R14 for
// each privileged mode, then the five SPSRs.
const PC: usize = 15;
const FIQ_R8: usize = 16;
const IRQ_R13: usize = 23;
const SVC_R13: usize = 25;
const ABT_R13: usize = 27;
const UND_R13: usize = 29;
const SPSR_FIQ: usize = 31;
const SPSR_IRQ: usize = 32;
const SPSR_SVC: usize = 33;
const SPSR_ABT: usize = 34;
const SPSR_UND: usize = 35;
const BANK_SIZE: usize = 36;

#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Registers {
    bank: [u32; BANK_SIZE],
    /// Handles of the currently banked-in cell for each logical register.
    /// R0..R7 and the PC always resolve to the user bank.
    ptr: [u8; 16],
    /// Handle of the current mode's SPSR, unbound in User/System mode.
    spsr: Option<u8>,
    pub(crate) cpsr: u32,
}

impl Registers {
    /// Read a logical register through its current bank handle.
    #[inline]
    pub fn reg(&self, r: u32) -> u32 {
        self.bank[self.ptr[r.us()].us()]
    }

    /// Write a logical register through its current bank handle.
    /// Writes to R15 do not flush the pipeline; jumps go through the
    /// interpreter, which does.
    #[inline]
    pub fn set_reg(&mut self, r: u32, value: u32) {
        self.bank[self.ptr[r.us()].us()] = value;
    }

    /// Read a register from the user bank, regardless of mode.
    #[inline]
    pub fn usr_reg(&self, r: u32) -> u32 {
        self.bank[r.us()]
    }

    /// Write a register in the user bank, regardless of mode.
    #[inline]
    pub fn set_usr_reg(&mut self, r: u32, value: u32) {
        self.bank[r.us()] = value;
    }

    /// Get a register's value for the next instruction (PC will be +4)
    #[inline]
    pub fn reg_pc4(&self, r: u32) -> u32 {
        if r == 15 {
            self.pc().wrapping_add(4)
        } else {
            self.reg(r)
        }
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.bank[PC]
    }

    #[inline]
    pub fn set_pc(&mut self, value: u32) {
        self.bank[PC] = value;
    }

    /// Advance the PC and return its new value.
    #[inline]
    pub fn bump_pc(&mut self, by: u32) -> u32 {
        self.bank[PC] = self.bank[PC].wrapping_add(by);
        self.bank[PC]
    }

    #[inline]
    pub fn cpsr(&self) -> u32 {
        self.cpsr
    }

    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        self.cpsr.is_bit(flag as u16)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag, en: bool) {
        self.cpsr = self.cpsr.set_bit(flag as u16, en);
    }

    #[inline]
    pub fn is_thumb(&self) -> bool {
        self.flag(Flag::Thumb)
    }

    /// The SPSR of the current mode, or the CPSR itself where no SPSR
    /// is banked in.
    pub fn spsr(&self) -> u32 {
        match self.spsr {
            Some(idx) => self.bank[idx.us()],
            None => self.cpsr,
        }
    }

    /// Write the current mode's SPSR. Does nothing in User/System mode.
    pub fn set_spsr(&mut self, value: u32) {
        if let Some(idx) = self.spsr {
            self.bank[idx.us()] = value;
        }
    }

    pub fn has_spsr(&self) -> bool {
        self.spsr.is_some()
    }

    /// Set the CPSR, rewiring the bank handles when the mode field
    /// changed. With `save`, the outgoing CPSR is stored in the incoming
    /// mode's SPSR. Unknown modes leave the handles untouched.
    ///
    /// Interrupt conditions are rechecked by the interpreter wrapper,
    /// not here.
    pub fn set_cpsr(&mut self, value: u32, save: bool) {
        if (value ^ self.cpsr) & 0x1F != 0 {
            match Mode::get(value & 0x1F) {
                Some(mode) => self.bind_mode(mode),
                None => log::warn!("Unknown CPU mode: 0x{:X}", value & 0x1F),
            }
        }
        if save {
            if let Some(idx) = self.spsr {
                self.bank[idx.us()] = self.cpsr;
            }
        }
        self.cpsr = value;
    }

    /// Point the handles for R8..R14 and the SPSR at the banks of the
    /// given mode.
    fn bind_mode(&mut self, mode: Mode) {
        for r in 8..=12 {
            self.ptr[r] = if mode == Mode::Fiq {
                (FIQ_R8 + r - 8) as u8
            } else {
                r as u8
            };
        }
        let (r13, spsr) = match mode {
            Mode::User | Mode::System => (13, None),
            Mode::Fiq => (FIQ_R8 + 5, Some(SPSR_FIQ as u8)),
            Mode::Irq => (IRQ_R13, Some(SPSR_IRQ as u8)),
            Mode::Supervisor => (SVC_R13, Some(SPSR_SVC as u8)),
            Mode::Abort => (ABT_R13, Some(SPSR_ABT as u8)),
            Mode::Undefined => (UND_R13, Some(SPSR_UND as u8)),
        };
        self.ptr[13] = r13 as u8;
        self.ptr[14] = (r13 + 1) as u8;
        self.spsr = spsr;
    }

    /// Write the R13 cell of the given mode's bank, regardless of the
    /// current mode. Used when setting up boot stacks.
    pub fn set_mode_sp(&mut self, mode: Mode, value: u32) {
        let r13 = match mode {
            Mode::User | Mode::System => 13,
            Mode::Fiq => FIQ_R8 + 5,
            Mode::Irq => IRQ_R13,
            Mode::Supervisor => SVC_R13,
            Mode::Abort => ABT_R13,
            Mode::Undefined => UND_R13,
        };
        self.bank[r13] = value;
    }
}

impl Default for Registers {
    fn default() -> Self {
        let mut ptr = [0; 16];
        for (i, p) in ptr.iter_mut().enumerate() {
            *p = i as u8;
        }
        Self {
            bank: [0; BANK_SIZE],
            ptr,
            spsr: None,
            cpsr: 0,
        }
    }
}

/// Execution context of the CPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
    System,
}

impl Mode {
    #[bitmatch]
    pub fn get(n: u32) -> Option<Self> {
        #[bitmatch]
        match n {
            "10000" => Some(Self::User),
            "10001" => Some(Self::Fiq),
            "10010" => Some(Self::Irq),
            "10011" => Some(Self::Supervisor),
            "10111" => Some(Self::Abort),
            "11011" => Some(Self::Undefined),
            "11111" => Some(Self::System),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::User => 0b10000,
            Self::Fiq => 0b10001,
            Self::Irq => 0b10010,
            Self::Supervisor => 0b10011,
            Self::Abort => 0b10111,
            Self::Undefined => 0b11011,
            Self::System => 0b11111,
        }
    }
}

/// Flags inside CPSR.
#[derive(Copy, Clone)]
pub enum Flag {
    Neg = 31,
    Zero = 30,
    Carry = 29,
    Overflow = 28,
    QClamped = 27,
    IrqDisable = 7,
    FiqDisable = 6,
    Thumb = 5,
}

impl Flag {
    pub fn mask(self) -> u32 {
        1u32 << self as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_switch_rewires_handles() {
        let mut regs = Registers::default();
        regs.set_reg(13, 0x1000);
        regs.set_cpsr(0xD2, false); // IRQ, interrupts off

        // R13/R14 now resolve to the IRQ bank, the rest stays user.
        regs.set_reg(13, 0x2000);
        assert_eq!(regs.reg(13), 0x2000);
        assert_eq!(regs.usr_reg(13), 0x1000);
        for r in 0..=12 {
            assert_eq!(regs.ptr[r], r as u8);
        }
        assert!(regs.has_spsr());

        regs.set_cpsr(0xD3, false); // Supervisor
        assert_eq!(regs.reg(13), 0);
        regs.set_cpsr(0x10, false); // back to User
        assert_eq!(regs.reg(13), 0x1000);
        assert!(!regs.has_spsr());
    }

    #[test]
    fn fiq_banks_r8_to_r14() {
        let mut regs = Registers::default();
        for r in 8..=14 {
            regs.set_reg(r, 100 + r);
        }
        regs.set_cpsr(0xD1, false); // FIQ
        for r in 8..=14 {
            assert_eq!(regs.reg(r), 0);
            regs.set_reg(r, 200 + r);
        }
        regs.set_cpsr(0x1F, false); // System shares the user bank
        for r in 8..=14 {
            assert_eq!(regs.reg(r), 100 + r);
        }
    }

    #[test]
    fn unknown_mode_keeps_bindings() {
        let mut regs = Registers::default();
        regs.set_cpsr(0xD2, false);
        let ptr = regs.ptr;
        regs.set_cpsr(0xC7, false); // mode 0x07 does not exist
        assert_eq!(regs.ptr, ptr);
        assert_eq!(regs.cpsr(), 0xC7);
    }

    #[test]
    fn spsr_saved_on_switch() {
        let mut regs = Registers::default();
        regs.set_cpsr(0x1F, false);
        regs.set_cpsr(0x92, true); // IRQ, save old CPSR
        assert_eq!(regs.spsr(), 0x1F);

        // Without a banked SPSR, reading falls back to the CPSR.
        regs.set_cpsr(0x10, false);
        assert_eq!(regs.spsr(), 0x10);
    }

    #[test]
    fn pc_always_user_banked() {
        let mut regs = Registers::default();
        regs.set_pc(0x8000_0000);
        regs.set_cpsr(0xD1, false);
        assert_eq!(regs.reg(15), 0x8000_0000);
        assert_eq!(regs.bump_pc(4), 0x8000_0004);
    }
}
