//! Disk machine - a Z80 host that routes extension traps to the disk driver.

use std::num::NonZeroU16;

use log::{debug, trace};
use z80emu::host::TsCounter;
use z80emu::{Clock, Cpu, Io, Memory, StkReg16, Z80NMOS};

use crate::bios::BiosImage;
use crate::drive::DiskDrive;
use crate::driver::patch::{EXTENSION_OPCODE_BASE, EXTENSION_PREFIX};
use crate::driver::{DiskDriver, ExtensionHost, RegisterResult, RegisterSnapshot};
use crate::error::DiskResult;
use crate::memory::{FlatMemory, MemoryBus};
use crate::{ExitReason, MachineExit};

/// Type alias for the clock.
type TsClock = TsCounter<i32>;

/// Initial stack pointer for programs started with `run_from`.
pub const STACK_TOP: u16 = 0xF380;

/// T-states an `ED xx` instruction takes on real hardware.
const TRAP_T_STATES: u64 = 8;

/// Machine bus - flat RAM, no I/O devices.
struct Bus<'a> {
    memory: &'a mut [u8; 0x10000],
}

impl Memory for Bus<'_> {
    type Timestamp = i32;

    fn read_debug(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn read_mem(&self, addr: u16, _ts: Self::Timestamp) -> u8 {
        self.memory[addr as usize]
    }

    fn write_mem(&mut self, addr: u16, value: u8, _ts: Self::Timestamp) {
        self.memory[addr as usize] = value;
    }
}

impl Io for Bus<'_> {
    type Timestamp = i32;
    type WrIoBreak = ();
    type RetiBreak = ();

    fn read_io(&mut self, _port: u16, _ts: Self::Timestamp) -> (u8, Option<NonZeroU16>) {
        (0xFF, None)
    }

    fn write_io(
        &mut self,
        _port: u16,
        _value: u8,
        _ts: Self::Timestamp,
    ) -> (Option<Self::WrIoBreak>, Option<NonZeroU16>) {
        (None, None)
    }
}

/// Which extension numbers (0x0-0xF) are routed to a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapTable {
    routed: u16,
}

impl TrapTable {
    pub fn is_routed(&self, extension: u8) -> bool {
        extension < 16 && self.routed & (1 << extension) != 0
    }
}

impl ExtensionHost for TrapTable {
    fn claim_extensions(&mut self, extensions: &[u8]) {
        for &ext in extensions.iter().filter(|&&e| e < 16) {
            self.routed |= 1 << ext;
        }
    }

    fn release_extensions(&mut self, extensions: &[u8]) {
        for &ext in extensions.iter().filter(|&&e| e < 16) {
            self.routed &= !(1 << ext);
        }
    }
}

/// Z80 with 64 KiB RAM, a patched disk BIOS and the disk driver.
pub struct DiskMachine<D: DiskDrive> {
    cpu: Z80NMOS,
    clock: TsClock,
    driver: DiskDriver<FlatMemory, D>,
    traps: TrapTable,
    bios: BiosImage,
    /// Executed T-states plus drive latency charged by the driver.
    cycles: u64,
    trap_count: u64,
    /// Stop after this many cycles.
    pub t_state_limit: Option<u64>,
}

impl<D: DiskDrive> DiskMachine<D> {
    /// Connect the driver (patching `bios`) and map the BIOS into RAM.
    pub fn new(bios: BiosImage, drive: D) -> DiskResult<Self> {
        let mut machine = Self {
            cpu: Z80NMOS::default(),
            clock: TsClock::default(),
            driver: DiskDriver::new(FlatMemory::new(), drive),
            traps: TrapTable::default(),
            bios,
            cycles: 0,
            trap_count: 0,
            t_state_limit: None,
        };
        machine.driver.connect(&mut machine.traps, &mut machine.bios)?;
        machine
            .driver
            .bus_mut()
            .load_at(machine.bios.base(), machine.bios.bytes());
        Ok(machine)
    }

    /// The BIOS image as patched at connect time.
    pub fn bios(&self) -> &BiosImage {
        &self.bios
    }

    pub fn memory(&self) -> &FlatMemory {
        self.driver.bus()
    }

    pub fn memory_mut(&mut self) -> &mut FlatMemory {
        self.driver.bus_mut()
    }

    pub fn drive(&self) -> &D {
        self.driver.drive()
    }

    pub fn drive_mut(&mut self) -> &mut D {
        self.driver.drive_mut()
    }

    pub fn traps(&self) -> &TrapTable {
        &self.traps
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn trap_count(&self) -> u64 {
        self.trap_count
    }

    /// Load binary data into memory at a specific address.
    pub fn load_at(&mut self, address: u16, data: &[u8]) {
        self.driver.bus_mut().load_at(address, data);
    }

    /// Current CPU registers.
    pub fn registers(&self) -> RegisterSnapshot {
        let af = self.cpu.get_reg16(StkReg16::AF);
        let bc = self.cpu.get_reg16(StkReg16::BC);
        RegisterSnapshot {
            pc: self.cpu.get_pc(),
            sp: self.cpu.get_sp(),
            f: af as u8,
            a: (af >> 8) as u8,
            b: (bc >> 8) as u8,
            c: bc as u8,
            de: self.cpu.get_reg16(StkReg16::DE),
            hl: self.cpu.get_reg16(StkReg16::HL),
        }
    }

    fn apply(&mut self, result: &RegisterResult) {
        let regs = result.apply(&self.registers());
        self.cpu
            .set_reg16(StkReg16::AF, u16::from_be_bytes([regs.a, regs.f]));
        self.cpu
            .set_reg16(StkReg16::BC, u16::from_be_bytes([regs.b, regs.c]));
        self.cpu.set_reg16(StkReg16::HL, regs.hl);
    }

    /// Extension number of a routed trap instruction at `pc`, if any.
    fn pending_trap(&self, pc: u16) -> Option<u8> {
        let mem = self.driver.bus();
        if mem.read(pc) != EXTENSION_PREFIX {
            return None;
        }
        let op = mem.read(pc.wrapping_add(1));
        if op & 0xF0 != EXTENSION_OPCODE_BASE {
            return None;
        }
        let ext = op & 0x0F;
        self.traps.is_routed(ext).then_some(ext)
    }

    fn handle_trap(&mut self, ext: u8, pc: u16) {
        let regs = self.registers();
        let result = self.driver.dispatch(ext, &regs);
        trace!("EXT {:#X} -> {:?}", ext, result);
        self.apply(&result);
        self.cpu.set_pc(pc.wrapping_add(2));

        let cost = TRAP_T_STATES + result.extra_cycles.unwrap_or(0) as u64;
        self.cycles += cost;
        self.driver.drive_mut().advance(cost);
        self.driver.extension_finish();
        self.trap_count += 1;
    }

    fn exit(&self, reason: ExitReason) -> MachineExit {
        MachineExit {
            reason,
            t_states: self.cycles,
            pc: self.cpu.get_pc(),
            traps: self.trap_count,
        }
    }

    /// Run from `start_address` until HALT or the T-state limit.
    pub fn run_from(&mut self, start_address: u16) -> DiskResult<MachineExit> {
        self.cpu.reset();
        self.cpu.set_pc(start_address);
        self.cpu.set_sp(STACK_TOP);

        loop {
            if let Some(limit) = self.t_state_limit {
                if self.cycles >= limit {
                    debug!("T-state limit reached at {:#06X}", self.cpu.get_pc());
                    return Ok(self.exit(ExitReason::TStateLimit));
                }
            }

            let pc = self.cpu.get_pc();
            if let Some(ext) = self.pending_trap(pc) {
                self.handle_trap(ext, pc);
                continue;
            }

            // Execute instruction
            let before = self.clock.as_timestamp();
            let mut bus = Bus {
                memory: self.driver.bus_mut().as_array_mut(),
            };

            let _result =
                self.cpu
                    .execute_next(&mut bus, &mut self.clock, None::<fn(z80emu::CpuDebug)>);

            let elapsed = self.clock.as_timestamp().wrapping_sub(before).max(0) as u64;
            self.cycles += elapsed;
            self.driver.drive_mut().advance(elapsed);

            // Check for HALT instruction
            if self.cpu.is_halt() {
                return Ok(self.exit(ExitReason::Halt));
            }
        }
    }

    /// Disconnect the driver: traps are no longer routed, motors stop.
    pub fn disconnect(&mut self) {
        self.driver.disconnect(&mut self.traps);
    }

    /// Machine power loss.
    pub fn power_off(&mut self) {
        self.driver.power_off();
    }
}
