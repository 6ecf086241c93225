// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use std::ops::{Deref, DerefMut};

use common::{numutil::NumExt, Time};

use crate::{inst_arm::ArmLut, inst_thumb::ThumbLut, Cpu};

/// Trait for a system that contains this CPU.
///
/// The NDS implements it twice, once per processor; both implementations
/// deref to the shared console so the interpreter reaches memory, the
/// scheduler and the optional HLE collaborators through one bound.
pub trait ArmSystem: Sized + 'static {
    /// Is this an ARMv5 system? ARMv4 otherwise.
    const IS_V5: bool;
    /// Bus view of this CPU: 0 for the ARM9, 1 for the ARM7.
    const I: usize;
    /// LUT for ARM instructions.
    const ARM_LUT: ArmLut<Self> = SysWrapper::<Self>::make_arm_lut();
    /// LUT for THUMB instructions.
    const THUMB_LUT: ThumbLut<Self> = SysWrapper::<Self>::make_thumb_lut();

    /// Get the CPU.
    fn cpur(&self) -> &Cpu;
    /// Get the CPU.
    fn cpu(&mut self) -> &mut Cpu;

    /// Get the value at the given memory address.
    fn get<T: RwType>(&mut self, addr: u32) -> T;
    /// Set the value at the given memory address.
    fn set<T: RwType>(&mut self, addr: u32, value: T);

    /// Is the console running in GBA mode? Affects the IE write mask and
    /// the IRQ acknowledge latency of the ARM7.
    fn gba_mode(&self) -> bool;
    /// Schedule a recheck of this CPU's interrupt condition after the
    /// given amount of global cycles.
    fn schedule_irq_check(&mut self, delay: Time);

    /// The exception vector base. Fixed to 0 on the ARM7; the ARM9 reads
    /// it from the CP15 collaborator.
    fn exception_addr(&self) -> u32 {
        0
    }
    /// Base address of the data TCM, used by the HLE IRQ handoff.
    fn dtcm_addr(&self) -> u32 {
        0
    }
    /// Callback for getting a CP15 register. Only consulted when
    /// `IS_V5 == true`.
    fn get_cp15(&mut self, _cn: u32, _cm: u32, _cp: u32) -> u32 {
        0
    }
    /// Callback for setting a CP15 register. Only consulted when
    /// `IS_V5 == true`.
    fn set_cp15(&mut self, _cn: u32, _cm: u32, _cp: u32, _value: u32) {}

    /// Is an HLE BIOS attached to this system?
    fn hle_bios_attached(&self) -> bool {
        false
    }
    /// Forward an exception vector to the HLE BIOS.
    fn bios_call(&mut self, _vector: u8) -> BiosCall {
        BiosCall::Unhandled
    }
    /// Is the HLE BIOS inside an IntrWait-style function that needs its
    /// wait flags updated on IRQ return?
    fn bios_should_check(&self) -> bool {
        false
    }
    /// Update the HLE BIOS wait flags for this CPU.
    fn bios_check_wait_flags(&mut self) {}

    /// Has a DLDI driver been patched into the loaded ROM?
    fn dldi_patched(&self) -> bool {
        false
    }
    fn dldi_startup(&mut self) -> u32 {
        0
    }
    fn dldi_is_inserted(&mut self) -> u32 {
        0
    }
    fn dldi_read_sectors(&mut self, _sector: u32, _count: u32, _buf: u32) -> u32 {
        0
    }
    fn dldi_write_sectors(&mut self, _sector: u32, _count: u32, _buf: u32) -> u32 {
        0
    }
    fn dldi_clear_status(&mut self) -> u32 {
        0
    }
    fn dldi_shutdown(&mut self) -> u32 {
        0
    }
}

/// Result of forwarding an exception vector to the HLE BIOS.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum BiosCall {
    /// No HLE BIOS attached, or it does not handle this vector; run the
    /// real one.
    Unhandled,
    /// The BIOS serviced the call at the given cycle cost.
    Done(u16),
    /// The BIOS asks for the HLE IRQ entry sequence.
    EnterIrq,
}

/// Wrapper for the system that the instruction handlers are implemented
/// on. Raw pointer was chosen to avoid lifetimes.
#[repr(transparent)]
pub struct SysWrapper<S: ArmSystem> {
    pub inner: *mut S,
}

impl<S: ArmSystem> SysWrapper<S> {
    pub fn new(inner: &mut S) -> Self {
        Self { inner }
    }

    /// Read from the bus (LE). Unaligned halfwords rotate into the upper
    /// byte on ARMv4.
    pub fn read<T: RwType>(&mut self, addr: u32) -> T::ReadOutput {
        let value = self.get::<T>(addr).u32();
        T::ReadOutput::from_u32(if !S::IS_V5 && T::WIDTH == 2 && addr.is_bit(0) {
            value.rotate_right(8)
        } else {
            value
        })
    }

    /// Write to the bus (LE).
    pub fn write<T: RwType>(&mut self, addr: u32, value: T) {
        self.set(addr, value);
    }

    /// Read a half-word from the bus (LE).
    /// If the address is unaligned, do LDRSH behavior.
    pub fn read_hword_ldrsh(&mut self, addr: u32) -> u32 {
        let value = self.get::<u16>(addr).u32();
        if !S::IS_V5 && addr.is_bit(0) {
            (value >> 8) as i8 as i32 as u32
        } else {
            value as i16 as i32 as u32
        }
    }

    /// Read a word from the bus (LE).
    /// If the address is unaligned, do LDR/SWP behavior.
    pub fn read_word_ldrswp(&mut self, addr: u32) -> u32 {
        let value = self.get::<u32>(addr & !3);
        value.rotate_right((addr & 3) << 3)
    }
}

impl<S: ArmSystem> Deref for SysWrapper<S> {
    type Target = S;

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { &*self.inner }
    }
}

impl<S: ArmSystem> DerefMut for SysWrapper<S> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.inner }
    }
}

/// Trait for a type that the CPU can read/write memory with.
/// On this ARM CPU, it is u8, u16, u32.
pub trait RwType: NumExt + 'static {
    type ReadOutput: RwType;
}

impl RwType for u8 {
    type ReadOutput = Self;
}

impl RwType for u16 {
    /// u16 outputs u32: On unaligned reads, the CPU
    /// shifts the result, therefore making it 32bit.
    type ReadOutput = u32;
}

impl RwType for u32 {
    type ReadOutput = Self;
}
