// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use arm_cpu::{
    registers::{Flag, Mode, Registers},
    BiosCall, Cpu, SysWrapper, DLDI_READ, DLDI_STARTUP, HLE_IRQ_RETURN,
};

use crate::{interface::*, Nds, NdsEvent, RESET_CYCLES_INTERVAL};

/// Sparse little-endian RAM covering the full address space; reads of
/// unwritten memory are zero, like the real bus on open addresses.
#[derive(Default)]
struct RamBus {
    mem: BTreeMap<u32, u8>,
}

impl RamBus {
    fn byte(&self, addr: u32) -> u8 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    fn set_word(&mut self, addr: u32, value: u32) {
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.mem.insert(addr + i as u32, b);
        }
    }

    fn set_hword(&mut self, addr: u32, value: u16) {
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.mem.insert(addr + i as u32, b);
        }
    }
}

impl Bus for RamBus {
    fn read8(&mut self, _cpu: usize, addr: u32) -> u8 {
        self.byte(addr)
    }

    fn read16(&mut self, _cpu: usize, addr: u32) -> u16 {
        let addr = addr & !1;
        u16::from_le_bytes([self.byte(addr), self.byte(addr + 1)])
    }

    fn read32(&mut self, _cpu: usize, addr: u32) -> u32 {
        let addr = addr & !3;
        u32::from_le_bytes([
            self.byte(addr),
            self.byte(addr + 1),
            self.byte(addr + 2),
            self.byte(addr + 3),
        ])
    }

    fn write8(&mut self, _cpu: usize, addr: u32, value: u8) {
        self.mem.insert(addr, value);
    }

    fn write16(&mut self, _cpu: usize, addr: u32, value: u16) {
        let addr = addr & !1;
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.mem.insert(addr + i as u32, b);
        }
    }

    fn write32(&mut self, _cpu: usize, addr: u32, value: u32) {
        let addr = addr & !3;
        self.set_word(addr, value);
    }
}

/// Boot a console with the given ARM programs at the two reset vectors.
fn with_programs(program9: &[u32], program7: &[u32]) -> Box<Nds> {
    let mut bus = RamBus::default();
    for (i, op) in program9.iter().enumerate() {
        bus.set_word(0xFFFF_0000 + (i as u32) * 4, *op);
    }
    for (i, op) in program7.iter().enumerate() {
        bus.set_word((i as u32) * 4, *op);
    }
    let mut nds = Nds::new(Box::new(bus), false);
    nds.init();
    nds
}

fn step9(nds: &mut Nds) -> u16 {
    Cpu::run_opcode(&mut nds.nds9())
}

/// Jump to the next deadline and run all tasks due there, the way the
/// frame drivers do.
fn drain(nds: &mut Nds) {
    nds.scheduler.jump_to(nds.scheduler.next_due());
    while let Some(event) = nds.scheduler.get_next_pending() {
        event.kind.dispatch(nds, event.late_by);
    }
}

#[test]
fn cold_boot() {
    let nds = with_programs(&[0xE3A0_0005, 0xE280_0003], &[0xE3A0_2003]);

    assert_eq!(nds.cpu9.regs.cpsr(), 0x0000_00D3);
    assert_eq!(nds.cpu9.regs.pc(), 0xFFFF_0004);
    assert_eq!(nds.cpu9.pipeline[0], 0xE3A0_0005);
    assert_eq!(nds.cpu9.pipeline[1], 0xE280_0003);
    assert!(!nds.cpu9.ime);
    assert_eq!(nds.cpu9.ie, 0);
    assert_eq!(nds.cpu9.irf, 0);

    assert_eq!(nds.cpu7.regs.cpsr(), 0x0000_00D3);
    assert_eq!(nds.cpu7.regs.pc(), 0x0000_0004);
    assert_eq!(nds.cpu7.pipeline[0], 0xE3A0_2003);
}

#[test]
fn alu_imm() {
    // mov r0, #5; add r0, r0, #3
    let mut nds = with_programs(&[0xE3A0_0005, 0xE280_0003], &[]);
    assert_eq!(step9(&mut nds), 1);
    assert_eq!(step9(&mut nds), 1);
    assert_eq!(nds.cpu9.regs.reg(0), 8);
}

#[test]
fn alu_flags() {
    // movs r0, #0; movs r1, #1; subs r2, r1, #2
    let mut nds = with_programs(&[0xE3B0_0000, 0xE3B0_1001, 0xE251_2002], &[]);
    step9(&mut nds);
    assert!(nds.cpu9.regs.flag(Flag::Zero));
    step9(&mut nds);
    assert!(!nds.cpu9.regs.flag(Flag::Zero));
    step9(&mut nds);
    // 1 - 2 = -1: negative, no borrow -> carry clear
    assert!(nds.cpu9.regs.flag(Flag::Neg));
    assert!(!nds.cpu9.regs.flag(Flag::Carry));
    assert_eq!(nds.cpu9.regs.reg(2), 0xFFFF_FFFF);
}

#[test]
fn condition_false_costs_one_cycle() {
    // movs r0, #1 (clears Z); moveq r0, #0x63
    let mut nds = with_programs(&[0xE3B0_0001, 0x03A0_0063], &[]);
    step9(&mut nds);
    assert_eq!(step9(&mut nds), 1);
    assert_eq!(nds.cpu9.regs.reg(0), 1);
}

#[test]
fn unknown_opcode_is_skipped() {
    // An undefined-space opcode must log and continue, not raise UND
    let mut nds = with_programs(&[0xE600_0010, 0xE3A0_0005], &[]);
    let cpsr = nds.cpu9.regs.cpsr();
    assert_eq!(step9(&mut nds), 1);
    assert_eq!(nds.cpu9.regs.cpsr(), cpsr);
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.reg(0), 5);
}

#[test]
fn load_store_word() {
    // mov r1, #0x200; mov r0, #0x42; str r0, [r1]; ldr r2, [r1]
    let mut nds = with_programs(
        &[0xE3A0_1C02, 0xE3A0_0042, 0xE581_0000, 0xE591_2000],
        &[],
    );
    for _ in 0..4 {
        step9(&mut nds);
    }
    assert_eq!(nds.cpu9.regs.reg(2), 0x42);
    assert_eq!(nds.bus.read32(0, 0x200), 0x42);
}

#[test]
fn load_store_half_signed() {
    // mov r1, #0x200; mvn r0, #0; strh r0, [r1]; ldrsh r2, [r1]
    let mut nds = with_programs(
        &[0xE3A0_1C02, 0xE3E0_0000, 0xE1C1_00B0, 0xE1D1_20F0],
        &[],
    );
    for _ in 0..4 {
        step9(&mut nds);
    }
    assert_eq!(nds.bus.read16(0, 0x200), 0xFFFF);
    assert_eq!(nds.cpu9.regs.reg(2), 0xFFFF_FFFF);
}

#[test]
fn block_transfer_roundtrip() {
    // mov sp, #0x400; mov r0, #1; mov r1, #2;
    // stmdb sp!, {r0, r1}; ldmia sp!, {r2, r3}
    let mut nds = with_programs(
        &[
            0xE3A0_DB01,
            0xE3A0_0001,
            0xE3A0_1002,
            0xE92D_0003,
            0xE8BD_000C,
        ],
        &[],
    );
    for _ in 0..3 {
        step9(&mut nds);
    }
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.reg(13), 0x3F8);
    assert_eq!(nds.bus.read32(0, 0x3F8), 1);
    assert_eq!(nds.bus.read32(0, 0x3FC), 2);
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.reg(2), 1);
    assert_eq!(nds.cpu9.regs.reg(3), 2);
    assert_eq!(nds.cpu9.regs.reg(13), 0x400);
}

#[test]
fn multiply() {
    // mov r0, #7; mov r1, #6; mul r2, r0, r1
    let mut nds = with_programs(&[0xE3A0_0007, 0xE3A0_1006, 0xE002_0190], &[]);
    for _ in 0..3 {
        step9(&mut nds);
    }
    assert_eq!(nds.cpu9.regs.reg(2), 42);
}

#[test]
fn psr_transfer() {
    // mrs r0, cpsr; msr cpsr_f, #0xF0000000
    let mut nds = with_programs(&[0xE10F_0000, 0xE328_F20F], &[]);
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.reg(0), 0x0000_00D3);
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.cpsr() >> 28, 0xF);
    // The mode field is untouched
    assert_eq!(nds.cpu9.regs.cpsr() & 0x1F, 0x13);
}

#[test]
fn swap() {
    // mov r2, #0x200; mov r1, #9; swp r0, r1, [r2]
    let mut nds = with_programs(&[0xE3A0_2C02, 0xE3A0_1009, 0xE102_0091], &[]);
    for _ in 0..3 {
        step9(&mut nds);
    }
    assert_eq!(nds.cpu9.regs.reg(0), 0);
    assert_eq!(nds.bus.read32(0, 0x200), 9);
}

#[test]
fn branch_and_link() {
    // bl +8
    let mut nds = with_programs(&[0xEB00_0000], &[]);
    assert_eq!(step9(&mut nds), 3);
    assert_eq!(nds.cpu9.regs.reg(14), 0xFFFF_0004);
    // Target was 0xFFFF0008; the refilled pipeline puts R15 one word on
    assert_eq!(nds.cpu9.regs.pc(), 0xFFFF_000C);
    assert_eq!(nds.cpu9.pipeline[0], nds.bus.read32(0, 0xFFFF_0008));
}

#[test]
fn blx_via_reserved_condition() {
    let mut nds = with_programs(&[0xFA00_0001], &[]);
    assert_eq!(step9(&mut nds), 3);
    assert!(nds.cpu9.regs.flag(Flag::Thumb));
    assert_eq!(nds.cpu9.regs.reg(14), 0xFFFF_0004);
    // Target 0xFFFF0008 + 4; THUMB refill leaves R15 a halfword on
    assert_eq!(nds.cpu9.regs.pc(), 0xFFFF_000E);
}

#[test]
fn exception_return_via_subs() {
    let mut nds = with_programs(&[], &[]);
    {
        let mut nds9 = nds.nds9();
        Cpu::set_cpsr(&mut nds9, 0x0000_001F, false);
        Cpu::set_cpsr(&mut nds9, 0x0000_00D2, true); // IRQ, saving System
    }
    nds.cpu9.regs.set_reg(14, 0x204);
    // subs pc, lr, #4 at 0x400
    let mut bus = RamBus::default();
    bus.set_word(0x400, 0xE25E_F004);
    nds.bus = Box::new(bus);
    nds.cpu9.regs.set_pc(0x400);
    Cpu::flush_pipeline(&mut nds.nds9());

    assert_eq!(step9(&mut nds), 3);
    assert_eq!(nds.cpu9.regs.cpsr(), 0x0000_001F);
    assert_eq!(nds.cpu9.regs.pc(), 0x204);
}

#[test]
fn thumb_basics() {
    let mut nds = with_programs(&[], &[]);
    let mut bus = RamBus::default();
    bus.set_hword(0x100, 0x2005); // mov r0, #5
    bus.set_hword(0x102, 0x3003); // add r0, #3
    bus.set_hword(0x104, 0xB401); // push {r0}
    bus.set_hword(0x106, 0xBC02); // pop {r1}
    nds.bus = Box::new(bus);

    nds.cpu9.regs.set_flag(Flag::Thumb, true);
    nds.cpu9.regs.set_reg(13, 0x400);
    nds.cpu9.regs.set_pc(0x100);
    Cpu::flush_pipeline(&mut nds.nds9());

    step9(&mut nds);
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.reg(0), 8);
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.reg(13), 0x3FC);
    assert_eq!(nds.bus.read32(0, 0x3FC), 8);
    step9(&mut nds);
    assert_eq!(nds.cpu9.regs.reg(1), 8);
    assert_eq!(nds.cpu9.regs.reg(13), 0x400);
}

#[test]
fn thumb_bx_to_arm() {
    let mut nds = with_programs(&[], &[]);
    let mut bus = RamBus::default();
    bus.set_hword(0x100, 0x4700); // bx r0
    nds.bus = Box::new(bus);

    nds.cpu9.regs.set_flag(Flag::Thumb, true);
    nds.cpu9.regs.set_reg(0, 0x200);
    nds.cpu9.regs.set_pc(0x100);
    Cpu::flush_pipeline(&mut nds.nds9());

    assert_eq!(step9(&mut nds), 3);
    assert!(!nds.cpu9.regs.flag(Flag::Thumb));
    assert_eq!(nds.cpu9.regs.pc(), 0x204);
}

#[test]
fn mode_switch_banks_and_save() {
    let mut nds = with_programs(&[], &[]);
    let mut nds9 = nds.nds9();
    Cpu::set_cpsr(&mut nds9, 0x0000_0010, false);
    nds.cpu9.regs.set_reg(13, 0x1000);

    let mut nds9 = nds.nds9();
    Cpu::set_cpsr(&mut nds9, 0x0000_00D2, true);
    // The outgoing CPSR lands in the incoming mode's SPSR
    assert_eq!(nds.cpu9.regs.cpsr(), 0x0000_00D2);
    assert_eq!(nds.cpu9.regs.spsr(), 0x0000_0010);
    // R13 now resolves to the IRQ bank
    assert_eq!(nds.cpu9.regs.reg(13), 0);
    assert_eq!(nds.cpu9.regs.usr_reg(13), 0x1000);
}

#[test]
fn irq_latency_arm9() {
    let mut nds = with_programs(&[], &[]);
    Cpu::set_cpsr(&mut nds.nds9(), 0x0000_0053, false); // I clear
    nds.write_ime(0, 1);
    nds.write_ie(0, !0, 1);
    nds.cpu9.halt(0);

    let before = nds.scheduler.len();
    let now = nds.scheduler.now();
    nds.send_interrupt_idx(0, 0);
    // Exactly one task, one cycle out
    assert_eq!(nds.scheduler.len(), before + 1);
    assert_eq!(nds.scheduler.next_due(), now + 1);

    drain(&mut nds);
    assert_eq!(nds.cpu9.regs.cpsr() & 0x1F, 0x12);
    assert!(nds.cpu9.regs.flag(Flag::IrqDisable));
    assert_eq!(nds.cpu9.regs.pc(), 0x1C); // vector 0x18, refilled
    assert_eq!(nds.cpu9.halted, 0);
}

#[test]
fn irq_latency_arm7_nds_vs_gba() {
    let mut nds = with_programs(&[], &[]);
    Cpu::set_cpsr(&mut nds.nds7(), 0x0000_0053, false);
    nds.write_ime(1, 1);
    nds.write_ie(1, !0, 1);
    let now = nds.scheduler.now();
    nds.send_interrupt_idx(1, 0);
    // Two cycles on the ARM7 in NDS mode
    assert_eq!(nds.scheduler.next_due(), now + 2);

    let mut gba = Nds::new(Box::new(RamBus::default()), true);
    gba.init();
    Cpu::set_cpsr(&mut gba.nds7(), 0x0000_0053, false);
    gba.write_ime(1, 1);
    gba.write_ie(1, !0, 1);
    let now = gba.scheduler.now();
    gba.send_interrupt_idx(1, 0);
    assert_eq!(gba.scheduler.next_due(), now + 1);
}

#[test]
fn arm7_unhalts_without_ime() {
    let mut nds = with_programs(&[], &[]);
    nds.write_ie(1, !0, 1);
    nds.cpu7.halt(0);
    let tasks = nds.scheduler.len();
    nds.send_interrupt_idx(1, 0);
    // Unhalted without delivering anything
    assert_eq!(nds.cpu7.halted, 0);
    assert_eq!(nds.scheduler.len(), tasks);

    // The ARM9 needs IME for the same wakeup
    nds.write_ie(0, !0, 1);
    nds.cpu9.halt(0);
    nds.send_interrupt_idx(0, 0);
    assert_eq!(nds.cpu9.halted, 1);
    // The boot CPSR leaves I set, so turning IME on schedules nothing
    nds.write_ime(0, 1);
    assert_eq!(nds.scheduler.len(), tasks);
}

#[test]
fn ie_write_masks() {
    let mut nds = with_programs(&[], &[]);
    nds.write_ie(0, !0, !0);
    assert_eq!(nds.cpu9.ie, 0x003F_3F7F);
    nds.write_ie(1, !0, !0);
    assert_eq!(nds.cpu7.ie, 0x01FF_3FFF);

    let mut gba = Nds::new(Box::new(RamBus::default()), true);
    gba.init();
    gba.write_ie(1, !0, !0);
    assert_eq!(gba.cpu7.ie, 0x3FFF);
}

#[test]
fn if_write_one_to_clear() {
    let mut nds = with_programs(&[], &[]);
    nds.send_interrupt_idx(1, 0);
    nds.send_interrupt_idx(1, 3);
    assert_eq!(nds.cpu7.irf, 0b1001);
    nds.write_if(1, !0, 0b0001);
    assert_eq!(nds.cpu7.irf, 0b1000);
    nds.write_if(1, !0, !0);
    assert_eq!(nds.cpu7.irf, 0);
}

#[test]
fn post_flg_semantics() {
    let mut nds = with_programs(&[], &[]);
    nds.write_post_flg(0, 1);
    assert_eq!(nds.cpu9.post_flg, 1);
    nds.write_post_flg(0, 0);
    assert_eq!(nds.cpu9.post_flg, 1); // bit 0 never clears
    nds.write_post_flg(0, 2);
    assert_eq!(nds.cpu9.post_flg, 3); // bit 1 writable on the ARM9
    nds.write_post_flg(0, 0);
    assert_eq!(nds.cpu9.post_flg, 1);

    nds.write_post_flg(1, 3);
    assert_eq!(nds.cpu7.post_flg, 1); // bit 1 ignored on the ARM7
}

#[test]
fn gba_frame_drive() {
    let mut bus = RamBus::default();
    bus.set_word(0, 0xEAFF_FFFE); // b .
    let mut nds = Nds::new(Box::new(bus), true);
    nds.init();

    nds.schedule(NdsEvent::PauseEmulation, 30);
    nds.start();
    nds.run_gba_frame();

    // The branch costs 3; the ARM7 drives the clock directly
    assert_eq!(nds.scheduler.now(), 30);
    assert_eq!(nds.cpu7.cycles, 30);
}

#[test]
fn nds_frame_clock_ratio() {
    // Both CPUs run a long chain of 1-cycle adds; the ARM7 is charged
    // double for each, so it retires half as many
    let adds = [0xE280_0001u32; 32]; // add r0, r0, #1
    let mut nds = with_programs(&adds, &adds);
    nds.schedule(NdsEvent::PauseEmulation, 12);
    nds.start();
    nds.run_nds_frame();

    assert_eq!(nds.cpu9.regs.reg(0), 12);
    assert_eq!(nds.cpu7.regs.reg(0), 6);
    assert_eq!(nds.scheduler.now(), 12);
}

#[test]
fn both_halted_jumps_to_deadline() {
    let mut nds = with_programs(&[], &[]);
    nds.cpu9.halt(0);
    nds.cpu7.halt(0);
    nds.schedule(NdsEvent::PauseEmulation, 50);
    nds.start();
    nds.run_nds_frame();
    assert_eq!(nds.scheduler.now(), 50);
}

#[test]
fn reset_cycles_preserves_offsets() {
    let mut nds = with_programs(&[], &[]);
    nds.scheduler.jump_to(80);
    nds.cpu9.cycles = 100;
    nds.cpu7.cycles = 90;
    nds.schedule(NdsEvent::PauseEmulation, 20); // due at 100

    NdsEvent::ResetCycles.dispatch(&mut nds, 0);

    assert_eq!(nds.scheduler.now(), 0);
    assert_eq!(nds.cpu9.cycles, 20);
    assert_eq!(nds.cpu7.cycles, 10);
    // The pause is still 20 cycles out
    assert_eq!(nds.scheduler.next_due(), 20);
}

#[test]
fn peripheral_events_reach_the_bus() {
    struct CountingBus {
        seen: Arc<Mutex<Vec<u16>>>,
    }
    impl Bus for CountingBus {
        fn read8(&mut self, _: usize, _: u32) -> u8 {
            0
        }
        fn read16(&mut self, _: usize, _: u32) -> u16 {
            0
        }
        fn read32(&mut self, _: usize, _: u32) -> u32 {
            0
        }
        fn write8(&mut self, _: usize, _: u32, _: u8) {}
        fn write16(&mut self, _: usize, _: u32, _: u16) {}
        fn write32(&mut self, _: usize, _: u32, _: u32) {}
        fn handle_event(&mut self, nds: &mut Nds, id: u16, _late_by: i64) {
            self.seen.lock().unwrap().push(id);
            if id == 1 {
                nds.schedule(NdsEvent::Peripheral(2), 5);
            }
            nds.send_interrupt_idx(1, 7);
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut nds = Nds::new(
        Box::new(CountingBus { seen: Arc::clone(&seen) }),
        false,
    );
    nds.schedule(NdsEvent::Peripheral(1), 10);
    drain(&mut nds);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(nds.cpu7.irf, 1 << 7);
    drain(&mut nds);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}

#[test]
fn direct_boot_register_setup() {
    let mut bus = RamBus::default();
    bus.set_word(0x027F_FE24, 0x0200_0000);
    bus.set_word(0x027F_FE34, 0x0238_0000);
    let mut nds = Nds::new(Box::new(bus), false);
    nds.direct_boot();

    assert_eq!(nds.cpu9.regs.cpsr(), 0x0000_00DF);
    assert_eq!(nds.cpu9.regs.usr_reg(12), 0x0200_0000);
    assert_eq!(nds.cpu9.regs.usr_reg(14), 0x0200_0000);
    assert_eq!(nds.cpu9.regs.pc(), 0x0200_0004);
    assert_eq!(nds.cpu9.regs.usr_reg(13), 0x0300_2F7C);

    assert_eq!(nds.cpu7.regs.cpsr(), 0x0000_00DF);
    assert_eq!(nds.cpu7.regs.pc(), 0x0238_0004);
    assert_eq!(nds.cpu7.regs.usr_reg(13), 0x0380_FD80);
}

struct StubBios;

impl HleBios for StubBios {
    fn execute(&mut self, vector: u8, _cpu: usize, _regs: &mut Registers) -> BiosCall {
        if vector == 0x18 {
            BiosCall::EnterIrq
        } else {
            BiosCall::Done(3)
        }
    }

    fn should_check(&self) -> bool {
        false
    }

    fn check_wait_flags(&mut self, _cpu: usize) {}
}

#[test]
fn hle_irq_roundtrip() {
    let mut nds = with_programs(&[], &[]);
    nds.hle_bios = Some(Box::new(StubBios));
    // The handler pointer games register for the ARM7
    nds.bus.write32(1, 0x03FF_FFFC, 0x100);

    Cpu::set_cpsr(&mut nds.nds7(), 0x0000_001F, false);
    nds.cpu7.regs.set_mode_sp(Mode::Irq, 0x300);
    nds.cpu7.regs.set_reg(13, 0x700);
    for r in 0..4 {
        nds.cpu7.regs.set_reg(r, r + 1);
    }
    nds.cpu7.regs.set_reg(12, 5);
    nds.cpu7.regs.set_pc(0x800);
    Cpu::flush_pipeline(&mut nds.nds7());

    let cost = Cpu::exception(&mut nds.nds7(), 0x18);
    assert_eq!(cost, 3);
    assert_eq!(nds.cpu7.regs.cpsr() & 0x1F, 0x12);
    // Scratch registers went to the IRQ stack
    assert_eq!(nds.cpu7.regs.reg(13), 0x300 - 24);
    // LR now aims at the HLE return opcode
    assert_eq!(nds.cpu7.regs.reg(14), 0);
    // And execution moved to the registered handler
    assert_eq!(nds.cpu7.regs.pc(), 0x104);

    // Clobber the scratch registers, then return from the interrupt
    for r in 0..4 {
        nds.cpu7.regs.set_reg(r, 0xDEAD);
    }
    let cost = SysWrapper::new(&mut nds.nds7()).handle_reserved(HLE_IRQ_RETURN);
    assert_eq!(cost, 3);
    // Back in System mode with the user stack, scratch regs intact
    assert_eq!(nds.cpu7.regs.cpsr(), 0x0000_001F);
    assert_eq!(nds.cpu7.regs.reg(13), 0x700);
    for r in 0..4 {
        assert_eq!(nds.cpu7.regs.reg(r), r + 1);
    }
    assert_eq!(nds.cpu7.regs.reg(12), 5);
}

#[test]
fn dldi_sentinels() {
    #[derive(Default)]
    struct StubDldi {
        calls: Arc<Mutex<Vec<(usize, u32, u32, u32)>>>,
    }
    impl DldiDriver for StubDldi {
        fn is_patched(&self) -> bool {
            true
        }
        fn startup(&mut self) -> u32 {
            0xAA
        }
        fn is_inserted(&mut self) -> u32 {
            1
        }
        fn read_sectors(&mut self, cpu: usize, sector: u32, count: u32, buf: u32) -> u32 {
            self.calls.lock().unwrap().push((cpu, sector, count, buf));
            1
        }
        fn write_sectors(&mut self, _: usize, _: u32, _: u32, _: u32) -> u32 {
            1
        }
        fn clear_status(&mut self) -> u32 {
            1
        }
        fn shutdown(&mut self) -> u32 {
            1
        }
    }

    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut nds = with_programs(&[], &[]);
    nds.dldi = Some(Box::new(StubDldi { calls: Arc::clone(&calls) }));

    nds.cpu7.regs.set_reg(14, 0x50);
    nds.cpu7.regs.set_reg(0, 9);
    nds.cpu7.regs.set_reg(1, 2);
    nds.cpu7.regs.set_reg(2, 0x1000);
    let cost = SysWrapper::new(&mut nds.nds7()).handle_reserved(DLDI_READ);
    assert_eq!(cost, 3);
    assert_eq!(nds.cpu7.regs.reg(0), 1);
    // Returned through LR
    assert_eq!(nds.cpu7.regs.pc(), 0x54);
    assert_eq!(*calls.lock().unwrap(), vec![(1, 9, 2, 0x1000)]);

    let _ = SysWrapper::new(&mut nds.nds7()).handle_reserved(DLDI_STARTUP);
    assert_eq!(nds.cpu7.regs.reg(0), 0xAA);
}

#[test]
fn stop_flag_protocol() {
    let mut nds = with_programs(&[], &[]);
    nds.cpu9.halt(0);
    nds.cpu7.halt(0);
    // Without start() the driver returns immediately
    nds.run_nds_frame();
    assert_eq!(nds.scheduler.now(), 0);

    // A pause stops the loop even with further tasks pending
    nds.schedule(NdsEvent::PauseEmulation, 10);
    nds.schedule(NdsEvent::PauseEmulation, RESET_CYCLES_INTERVAL * 4);
    nds.start();
    nds.run_nds_frame();
    assert_eq!(nds.scheduler.now(), 10);
}

#[test]
fn scheduled_order_among_ties() {
    // Two peripheral events at the same deadline run in schedule order
    struct OrderBus {
        seen: Arc<Mutex<Vec<u16>>>,
    }
    impl Bus for OrderBus {
        fn read8(&mut self, _: usize, _: u32) -> u8 {
            0
        }
        fn read16(&mut self, _: usize, _: u32) -> u16 {
            0
        }
        fn read32(&mut self, _: usize, _: u32) -> u32 {
            0
        }
        fn write8(&mut self, _: usize, _: u32, _: u8) {}
        fn write16(&mut self, _: usize, _: u32, _: u16) {}
        fn write32(&mut self, _: usize, _: u32, _: u32) {}
        fn handle_event(&mut self, _nds: &mut Nds, id: u16, _late_by: i64) {
            self.seen.lock().unwrap().push(id);
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut nds = Nds::new(Box::new(OrderBus { seen: Arc::clone(&seen) }), false);
    nds.schedule(NdsEvent::Peripheral(1), 10);
    nds.schedule(NdsEvent::Peripheral(2), 10);
    drain(&mut nds);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}
