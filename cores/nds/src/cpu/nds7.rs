// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use arm_cpu::{interface::ArmSystem, BiosCall, Cpu, RwType};
use common::Time;

use super::{bus_get, bus_set};
use crate::{Nds, Nds7, NdsCpu, NdsEvent};

impl ArmSystem for Nds7 {
    const IS_V5: bool = false;
    const I: usize = <Self as NdsCpu>::I;

    fn cpur(&self) -> &Cpu {
        &self.cpu7
    }

    fn cpu(&mut self) -> &mut Cpu {
        &mut self.cpu7
    }

    fn get<T: RwType>(&mut self, addr: u32) -> T {
        bus_get(&mut *self.bus, <Self as NdsCpu>::I, addr)
    }

    fn set<T: RwType>(&mut self, addr: u32, value: T) {
        bus_set(&mut *self.bus, <Self as NdsCpu>::I, addr, value)
    }

    fn gba_mode(&self) -> bool {
        (**self).gba_mode()
    }

    fn schedule_irq_check(&mut self, delay: Time) {
        self.scheduler
            .schedule(NdsEvent::CheckIrq { arm7: true }, delay);
    }

    fn hle_bios_attached(&self) -> bool {
        self.hle_bios.is_some()
    }

    fn bios_call(&mut self, vector: u8) -> BiosCall {
        let nds: &mut Nds = self;
        match nds.hle_bios.as_mut() {
            Some(bios) => bios.execute(vector, <Self as NdsCpu>::I, &mut nds.cpu7.regs),
            None => BiosCall::Unhandled,
        }
    }

    fn bios_should_check(&self) -> bool {
        self.hle_bios.as_ref().is_some_and(|bios| bios.should_check())
    }

    fn bios_check_wait_flags(&mut self) {
        if let Some(bios) = self.hle_bios.as_mut() {
            bios.check_wait_flags(<Self as NdsCpu>::I);
        }
    }

    fn dldi_patched(&self) -> bool {
        self.dldi.as_ref().is_some_and(|dldi| dldi.is_patched())
    }

    fn dldi_startup(&mut self) -> u32 {
        self.dldi.as_mut().map_or(0, |dldi| dldi.startup())
    }

    fn dldi_is_inserted(&mut self) -> u32 {
        self.dldi.as_mut().map_or(0, |dldi| dldi.is_inserted())
    }

    fn dldi_read_sectors(&mut self, sector: u32, count: u32, buf: u32) -> u32 {
        self.dldi
            .as_mut()
            .map_or(0, |dldi| dldi.read_sectors(<Self as NdsCpu>::I, sector, count, buf))
    }

    fn dldi_write_sectors(&mut self, sector: u32, count: u32, buf: u32) -> u32 {
        self.dldi
            .as_mut()
            .map_or(0, |dldi| dldi.write_sectors(<Self as NdsCpu>::I, sector, count, buf))
    }

    fn dldi_clear_status(&mut self) -> u32 {
        self.dldi.as_mut().map_or(0, |dldi| dldi.clear_status())
    }

    fn dldi_shutdown(&mut self) -> u32 {
        self.dldi.as_mut().map_or(0, |dldi| dldi.shutdown())
    }
}
