// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The dual-CPU interpreter core of the console: an ARM946E-S and an
//! ARM7TDMI stepping in lockstep against the shared scheduler. Memory,
//! video, timers and friends live behind the collaborator traits in
//! [`interface`].

mod cpu;
pub mod interface;
mod scheduling;
#[cfg(test)]
mod tests;

use std::{
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

use arm_cpu::{interface::ArmSystem, Cpu, Interrupt};
use common::{components::scheduler::Scheduler, Time};

pub use crate::interface::{Bus, Cp15, DldiDriver, HleBios, NullBus};
pub use crate::scheduling::NdsEvent;

/// How often the global cycle counters are pulled back toward zero.
pub const RESET_CYCLES_INTERVAL: Time = 0x7FFF_FFFF;

/// Macro for creating a wrapper of the system, specifically with
/// the use case of being able to implement ARM CPU support twice,
/// since the NDS has 2 CPUs.
macro_rules! nds_wrapper {
    ($name:ident, $idx:expr) => {
        /// Wrapper for one of the CPUs.
        /// Raw pointer was chosen to avoid lifetimes.
        #[repr(transparent)]
        pub struct $name(*mut Nds);

        impl Deref for $name {
            type Target = Nds;

            #[inline]
            fn deref(&self) -> &Self::Target {
                unsafe { &*self.0 }
            }
        }

        impl DerefMut for $name {
            #[inline]
            fn deref_mut(&mut self) -> &mut Self::Target {
                unsafe { &mut *self.0 }
            }
        }

        impl NdsCpu for $name {
            const I: usize = $idx;
        }

        unsafe impl Send for $name {}
    };
}

nds_wrapper!(Nds9, 0);
nds_wrapper!(Nds7, 1);

pub struct Nds {
    pub cpu9: Cpu,
    pub cpu7: Cpu,
    pub scheduler: Scheduler<NdsEvent>,
    /// Cleared by an outside actor to make the frame drivers return;
    /// the only atomic in the core.
    running: AtomicBool,
    gba_mode: bool,

    pub bus: Box<dyn Bus>,
    pub cp15: Option<Box<dyn Cp15>>,
    pub hle_bios: Option<Box<dyn HleBios>>,
    pub dldi: Option<Box<dyn DldiDriver>>,
}

impl Nds {
    /// Create a console around the given bus. Boxed so the CPU wrappers
    /// always point at a stable address.
    pub fn new(bus: Box<dyn Bus>, gba_mode: bool) -> Box<Self> {
        let mut nds = Box::new(Self {
            cpu9: Cpu::default(),
            cpu7: Cpu::default(),
            scheduler: Scheduler::default(),
            running: AtomicBool::new(false),
            gba_mode,
            bus,
            cp15: None,
            hle_bios: None,
            dldi: None,
        });
        nds.scheduler
            .schedule(NdsEvent::ResetCycles, RESET_CYCLES_INTERVAL);
        nds
    }

    #[inline]
    pub fn nds9(&mut self) -> Nds9 {
        Nds9(self as *mut Nds)
    }

    #[inline]
    pub fn nds7(&mut self) -> Nds7 {
        Nds7(self as *mut Nds)
    }

    #[inline]
    pub fn gba_mode(&self) -> bool {
        self.gba_mode
    }

    /// Reset both CPUs to the BIOS boot state.
    pub fn init(&mut self) {
        Cpu::boot_bios(&mut self.nds9());
        Cpu::boot_bios(&mut self.nds7());
    }

    /// Skip the BIOS and boot the ROM whose header the loader placed in
    /// main memory.
    pub fn direct_boot(&mut self) {
        Cpu::direct_boot(&mut self.nds9());
        Cpu::direct_boot(&mut self.nds7());
    }

    /// Run a frame in NDS mode: both CPUs interleave until the next
    /// scheduled task comes due, with the ARM7 at half the ARM9 clock.
    pub fn run_nds_frame(&mut self) {
        while self.running.swap(true, Ordering::AcqRel) {
            // Run the CPUs until the next scheduled task
            while self.scheduler.next_due() > self.scheduler.now() {
                if !self.cpu9.is_halted() && self.scheduler.now() >= self.cpu9.cycles {
                    let cost = Cpu::run_opcode(&mut self.nds9());
                    self.cpu9.cycles = self.scheduler.now() + cost as Time;
                }

                // Run the ARM7 at half the speed of the ARM9
                if !self.cpu7.is_halted() && self.scheduler.now() >= self.cpu7.cycles {
                    let cost = Cpu::run_opcode(&mut self.nds7());
                    self.cpu7.cycles = self.scheduler.now() + ((cost as Time) << 1);
                }

                // Count cycles up to the next soonest event
                let next9 = if self.cpu9.is_halted() {
                    Time::MAX
                } else {
                    self.cpu9.cycles
                };
                let next7 = if self.cpu7.is_halted() {
                    Time::MAX
                } else {
                    self.cpu7.cycles
                };
                self.scheduler.jump_to(next9.min(next7));
            }

            self.run_due_tasks();
        }
    }

    /// Run a frame in GBA mode; only the ARM7 is consulted and it
    /// drives the global cycle counter directly.
    pub fn run_gba_frame(&mut self) {
        while self.running.swap(true, Ordering::AcqRel) {
            // Run the ARM7 until the next scheduled task
            if self.cpu7.cycles > self.scheduler.now() {
                self.scheduler.jump_to(self.cpu7.cycles);
            }
            while !self.cpu7.is_halted() && self.scheduler.next_due() > self.cpu7.cycles {
                let cost = Cpu::run_opcode(&mut self.nds7());
                let now = self.scheduler.now() + cost as Time;
                self.scheduler.jump_to(now);
                self.cpu7.cycles = now;
            }

            self.run_due_tasks();
        }
    }

    /// Jump to the next scheduled task and run everything that is due,
    /// in deadline order with ties resolved by schedule order.
    fn run_due_tasks(&mut self) {
        self.scheduler.jump_to(self.scheduler.next_due());
        while let Some(event) = self.scheduler.get_next_pending() {
            event.kind.dispatch(self, event.late_by);
        }
    }

    /// Allow a frame driver to enter its loop.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Ask the frame driver to return once the current task batch is
    /// done. Returns false when it was not running.
    pub fn request_stop(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Schedule a task after the given amount of global cycles.
    pub fn schedule(&mut self, event: NdsEvent, delay: Time) {
        self.scheduler.schedule(event, delay);
    }

    /// Pull the global cycle counter and everything denominated in it
    /// back toward zero, preserving all deadlines relative to it.
    fn reset_cycles(&mut self) {
        let now = self.scheduler.now();
        self.cpu9.cycles -= now.min(self.cpu9.cycles);
        self.cpu7.cycles -= now.min(self.cpu7.cycles);
        self.scheduler.rebase();
        self.scheduler
            .schedule(NdsEvent::ResetCycles, RESET_CYCLES_INTERVAL);
    }

    #[inline]
    pub fn cpu(&self, cpu: usize) -> &Cpu {
        if cpu == 0 {
            &self.cpu9
        } else {
            &self.cpu7
        }
    }

    #[inline]
    pub fn cpu_mut(&mut self, cpu: usize) -> &mut Cpu {
        if cpu == 0 {
            &mut self.cpu9
        } else {
            &mut self.cpu7
        }
    }

    /// Raise an interrupt request bit on one of the CPUs.
    pub fn send_interrupt(&mut self, cpu: usize, int: Interrupt) {
        self.send_interrupt_idx(cpu, int as u16);
    }

    pub fn send_interrupt_idx(&mut self, cpu: usize, bit: u16) {
        if cpu == 0 {
            Cpu::send_interrupt_idx(&mut self.nds9(), bit);
        } else {
            Cpu::send_interrupt_idx(&mut self.nds7(), bit);
        }
    }

    pub fn write_ime(&mut self, cpu: usize, value: u8) {
        if cpu == 0 {
            Cpu::write_ime(&mut self.nds9(), value);
        } else {
            Cpu::write_ime(&mut self.nds7(), value);
        }
    }

    pub fn write_ie(&mut self, cpu: usize, mask: u32, value: u32) {
        if cpu == 0 {
            Cpu::write_ie(&mut self.nds9(), mask, value);
        } else {
            Cpu::write_ie(&mut self.nds7(), mask, value);
        }
    }

    pub fn write_if(&mut self, cpu: usize, mask: u32, value: u32) {
        self.cpu_mut(cpu).write_irf(mask, value);
    }

    pub fn write_post_flg(&mut self, cpu: usize, value: u8) {
        if cpu == 0 {
            Cpu::write_post_flg(&mut self.nds9(), value);
        } else {
            Cpu::write_post_flg(&mut self.nds7(), value);
        }
    }
}

/// Trait for things that need to operate on a single CPU.
/// I = 0 for the ARM9, I = 1 for the ARM7, matching the bus views.
pub trait NdsCpu: ArmSystem + DerefMut<Target = Nds> {
    const I: usize;
}
