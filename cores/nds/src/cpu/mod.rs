// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! CPU implementations. The two wrappers plug the shared interpreter
//! into the console, giving each processor its own bus view and
//! interrupt latency.

mod nds7;
mod nds9;

use arm_cpu::RwType;
use common::numutil::NumExt;

use crate::interface::Bus;

pub(crate) fn bus_get<T: RwType>(bus: &mut dyn Bus, cpu: usize, addr: u32) -> T {
    match T::WIDTH {
        1 => T::from_u8(bus.read8(cpu, addr)),
        2 => T::from_u16(bus.read16(cpu, addr)),
        _ => T::from_u32(bus.read32(cpu, addr)),
    }
}

pub(crate) fn bus_set<T: RwType>(bus: &mut dyn Bus, cpu: usize, addr: u32, value: T) {
    match T::WIDTH {
        1 => bus.write8(cpu, addr, value.u8()),
        2 => bus.write16(cpu, addr, value.u16()),
        _ => bus.write32(cpu, addr, value.u32()),
    }
}
