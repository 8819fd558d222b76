//! Routine handlers. Each one reproduces the register contract of a
//! DOS kernel disk driver entry point.

use log::{debug, warn};

use super::dpb::{dpb_for_media, BYTES_PER_SECTOR, MIN_MEDIA_DESCRIPTOR};
use super::registers::{RegisterResult, RegisterSnapshot};
use super::{DiskDriver, EXTRA_CYCLES_PER_SECTOR};
use crate::drive::{DiskChange, DiskDrive};
use crate::error::DosError;
use crate::memory::{read_block, write_block, MemoryBus};

/// Text CHOICE leaves in RAM. There is no format menu to offer.
pub const CHOICE_STRING: &[u8] = b"CHOICE\0\0\0\0\0\0";

/// CHOICE writes its string immediately below this address.
pub const CHOICE_STRING_TOP: u16 = 0x8FFF;

fn transfer_cycles(sectors: u8) -> u32 {
    sectors as u32 * EXTRA_CYCLES_PER_SECTOR
}

impl<B: MemoryBus, D: DiskDrive> DiskDriver<B, D> {
    /// INIHRD: the hardware is always ready.
    pub(super) fn inihrd(&mut self) -> RegisterResult {
        RegisterResult::none()
    }

    /// DRIVES: L = 1 when Z is set (single drive requested), else 2.
    pub(super) fn drives(&mut self, regs: &RegisterSnapshot) -> RegisterResult {
        let count = if regs.zero() { 1 } else { 2 };
        RegisterResult::none().with_hl((regs.hl & 0xFF00) | count)
    }

    /// DSKIO: carry set = write, clear = read.
    pub(super) fn dskio(&mut self, regs: &RegisterSnapshot) -> RegisterResult {
        if regs.carry() {
            self.dskio_write(regs)
        } else {
            self.dskio_read(regs)
        }
    }

    fn dskio_read(&mut self, regs: &RegisterSnapshot) -> RegisterResult {
        let ctx = &mut self.context;
        let spin = ctx.drive.motor_on(regs.a);

        match ctx.drive.read_sectors(regs.a, regs.de, regs.b) {
            Ok(bytes) => {
                write_block(&mut ctx.bus, regs.hl, &bytes);
                RegisterResult::success(regs.f)
                    .with_b(0)
                    .with_extra_cycles(spin + transfer_cycles(regs.b))
            }
            Err(e) => {
                debug!("DSKIO read failed: {}", e);
                RegisterResult::failure(regs.f, DosError::NotReady)
                    .with_b(regs.b)
                    .with_extra_cycles(spin)
            }
        }
    }

    fn dskio_write(&mut self, regs: &RegisterSnapshot) -> RegisterResult {
        let ctx = &mut self.context;
        let spin = ctx.drive.motor_on(regs.a);

        if !ctx.drive.disk_present(regs.a) {
            return RegisterResult::failure(regs.f, DosError::NotReady)
                .with_b(regs.b)
                .with_extra_cycles(spin);
        }

        if ctx.drive.disk_write_protected(regs.a) {
            return RegisterResult::failure(regs.f, DosError::WriteProtected)
                .with_b(regs.b)
                .with_extra_cycles(spin);
        }

        let data = read_block(&ctx.bus, regs.hl, regs.b as usize * BYTES_PER_SECTOR);
        match ctx.drive.write_sectors(regs.a, regs.de, regs.b, &data) {
            Ok(()) => RegisterResult::success(regs.f)
                .with_b(0)
                .with_extra_cycles(spin + transfer_cycles(regs.b)),
            Err(e) => {
                debug!("DSKIO write failed: {}", e);
                RegisterResult::failure(regs.f, DosError::NotReady)
                    .with_b(regs.b)
                    .with_extra_cycles(spin)
            }
        }
    }

    /// DSKCHG: B = 1 not changed, 0 unknown, 0xFF changed. Unless the drive
    /// vouches for the disk, the media byte is read from the first FAT
    /// sector and a fresh DPB is written at HL + 1.
    pub(super) fn dskchg(&mut self, regs: &RegisterSnapshot) -> RegisterResult {
        let change = self.context.drive.disk_has_changed(regs.a);

        if change == DiskChange::NotChanged {
            return RegisterResult::success(regs.f).with_b(1);
        }

        let spin = self.context.drive.motor_on(regs.a);
        let media = match self.context.drive.read_sectors(regs.a, 0, 2) {
            Ok(bytes) => bytes.get(BYTES_PER_SECTOR).copied(),
            Err(e) => {
                debug!("DSKCHG read failed: {}", e);
                None
            }
        };

        let Some(media) = media else {
            return RegisterResult::failure(regs.f, DosError::NotReady)
                .with_b(0)
                .with_extra_cycles(spin);
        };

        self.getdpb(&RegisterSnapshot { b: media, ..*regs });

        let status = if change == DiskChange::Changed { 0xFF } else { 0 };
        RegisterResult::success(regs.f)
            .with_b(status)
            .with_extra_cycles(spin + transfer_cycles(2))
    }

    /// GETDPB: media descriptor in B (or C when B is 0). The DPB is copied
    /// to HL + 1. Descriptors below 0xF8 are ignored without an error.
    pub(super) fn getdpb(&mut self, regs: &RegisterSnapshot) -> RegisterResult {
        let media = if regs.b == 0 { regs.c } else { regs.b };

        if media < MIN_MEDIA_DESCRIPTOR {
            warn!("GETDPB: invalid media descriptor {:#04X}", media);
            return RegisterResult::none();
        }

        if let Some(dpb) = dpb_for_media(media) {
            write_block(&mut self.context.bus, regs.hl.wrapping_add(1), dpb);
        }
        RegisterResult::none()
    }

    /// CHOICE: no format menu exists; leaves a placeholder string in RAM
    /// and points HL at it.
    pub(super) fn choice(&mut self) -> RegisterResult {
        let mut address = CHOICE_STRING_TOP;
        for &ch in CHOICE_STRING.iter().rev() {
            address = address.wrapping_sub(1);
            self.context.bus.write(address, ch);
        }
        RegisterResult::none().with_hl(address)
    }

    /// DSKFMT: formatting is not supported. Drive number in D.
    pub(super) fn dskfmt(&mut self, regs: &RegisterSnapshot) -> RegisterResult {
        let drive = regs.d();
        let ctx = &mut self.context;
        let spin = ctx.drive.motor_on(drive);

        if !ctx.drive.disk_present(drive) {
            return RegisterResult::failure(regs.f, DosError::NotReady).with_extra_cycles(spin);
        }

        if ctx.drive.disk_write_protected(drive) {
            return RegisterResult::failure(regs.f, DosError::WriteProtected)
                .with_extra_cycles(spin);
        }

        warn!("DSKFMT: formatting is not supported (choice {:#04X})", regs.a);
        RegisterResult::failure(regs.f, DosError::Unsupported).with_extra_cycles(spin)
    }

    /// MTOFF: stop every motor now.
    pub(super) fn mtoff(&mut self) -> RegisterResult {
        self.context.drive.all_motors_off_now();
        RegisterResult::none()
    }
}
