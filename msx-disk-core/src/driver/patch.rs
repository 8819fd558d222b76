//! BIOS patching: redirect the kernel's driver calls into extension traps.
//!
//! Each patch site receives `ED Ex` (the extension instruction for routine
//! `x`) followed by a tail byte. Sites inside the DOS kernel where a driver
//! routine is called directly get a NOP tail so execution falls through to
//! the rest of the caller. Jump table entries get a RET tail.

use log::info;

use super::DriverRoutine;
use crate::bios::BiosImage;
use crate::error::{DiskError, DiskResult};

/// Prefix byte of every extension instruction.
pub const EXTENSION_PREFIX: u8 = 0xED;

/// Second opcode byte of extension 0: `ED E0`.
pub const EXTENSION_OPCODE_BASE: u8 = 0xE0;

pub const OP_NOP: u8 = 0x00;
pub const OP_RET: u8 = 0xC9;

/// One patched location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSite {
    /// Kernel address of the first patched byte.
    pub address: u16,
    pub routine: DriverRoutine,
    /// Byte following the trap: NOP at call sites, RET in the jump table.
    pub tail: u8,
}

impl PatchSite {
    /// The three bytes written at this site.
    pub fn bytes(&self) -> [u8; 3] {
        [
            EXTENSION_PREFIX,
            EXTENSION_OPCODE_BASE | self.routine.extension(),
            self.tail,
        ]
    }
}

/// Every patch site, in the order they are applied.
#[rustfmt::skip]
pub const PATCH_TABLE: [PatchSite; 8] = [
    // Kernel call sites with no jump table entry
    PatchSite { address: 0x576F, routine: DriverRoutine::Inihrd, tail: OP_NOP },
    PatchSite { address: 0x5850, routine: DriverRoutine::Drives, tail: OP_NOP },
    // Driver jump table
    PatchSite { address: 0x4010, routine: DriverRoutine::Dskio, tail: OP_RET },
    PatchSite { address: 0x4013, routine: DriverRoutine::Dskchg, tail: OP_RET },
    PatchSite { address: 0x4016, routine: DriverRoutine::Getdpb, tail: OP_RET },
    PatchSite { address: 0x4019, routine: DriverRoutine::Choice, tail: OP_RET },
    PatchSite { address: 0x401C, routine: DriverRoutine::Dskfmt, tail: OP_RET },
    PatchSite { address: 0x401F, routine: DriverRoutine::Mtoff, tail: OP_RET },
];

/// Patch a BIOS image so every driver routine traps into the dispatcher.
///
/// All sites are checked before the first byte is written; on error the
/// image is left untouched.
pub fn patch_disk_bios(bios: &mut BiosImage) -> DiskResult<()> {
    if let Some(site) = PATCH_TABLE.iter().find(|s| !bios.contains(s.address, 3)) {
        return Err(DiskError::PatchOutOfRange {
            address: site.address,
        });
    }

    for site in &PATCH_TABLE {
        for (i, byte) in site.bytes().into_iter().enumerate() {
            bios.write(site.address + i as u16, byte)?;
        }
    }

    info!(
        "Disk BIOS patched: {} sites (image base {:#06X}, {} bytes)",
        PATCH_TABLE.len(),
        bios.base(),
        bios.len()
    );
    Ok(())
}
