// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use std::mem;

use arm_cpu::Cpu;
use common::{components::scheduler::Kind, TimeS};

use crate::{interface::NullBus, Nds};

/// Events the interpreter core schedules for itself, plus an opaque
/// kind for the peripherals behind the bus.
#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum NdsEvent {
    /// Deliver a pending interrupt to a CPU after the acknowledge
    /// latency.
    CheckIrq { arm7: bool },
    /// Rebase all cycle counters before the global counter can
    /// overflow.
    ResetCycles,
    /// Stop the frame driver after the current task batch.
    PauseEmulation,
    /// An event owned by the bus collaborator.
    Peripheral(u16),
}

impl NdsEvent {
    pub fn dispatch(self, ds: &mut Nds, late_by: TimeS) {
        match self {
            Self::CheckIrq { arm7 } => {
                if arm7 {
                    Cpu::handle_pending_irq(&mut ds.nds7());
                } else {
                    Cpu::handle_pending_irq(&mut ds.nds9());
                }
            }
            Self::ResetCycles => ds.reset_cycles(),
            Self::PauseEmulation => {
                ds.request_stop();
            }
            Self::Peripheral(id) => {
                // The bus steps out of the console while it handles its
                // own event, so it can be handed the console itself.
                let mut bus = mem::replace(&mut ds.bus, Box::new(NullBus));
                bus.handle_event(ds, id, late_by);
                ds.bus = bus;
            }
        }
    }
}

impl Kind for NdsEvent {}

impl Default for NdsEvent {
    fn default() -> Self {
        Self::PauseEmulation
    }
}
