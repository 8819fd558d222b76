//! MSX Disk BIOS Emulation Core
//!
//! This crate replaces the floppy controller routines of an MSX disk ROM
//! with calls into host code:
//! - BIOS patching: driver entry points become `ED E8`..`ED EF` traps
//! - Disk driver: the eight routines behind those traps
//! - Drive layer: motors, media change and sector I/O over disk images
//!
//! # Architecture
//!
//! The emulator uses a layered design:
//! - `MemoryBus` trait: Z80 address space as seen by the routines
//! - `DiskDrive` trait: Drive hardware (two drives, A and B)
//! - `ExtensionHost` trait: CPU side of the trap protocol
//! - `DiskMachine`: Integrates a Z80 CPU with the disk driver

pub mod bios;
pub mod bundle;
pub mod drive;
pub mod driver;
pub mod error;
pub mod machine;
pub mod memory;

pub use bios::{BiosImage, DEFAULT_BIOS_BASE};
pub use bundle::{load_bundle, load_bundle_from_path, BundleManifest, DiskBundle, DriveEntry};
pub use drive::{DiskChange, DiskDrive, DiskImage, ImageDiskDrive};
pub use driver::{
    patch_disk_bios, DiskDriver, DriverRoutine, Dpb, ExtensionHost, RegisterResult,
    RegisterSnapshot,
};
pub use error::{DiskError, DiskResult, DosError};
pub use machine::DiskMachine;
pub use memory::{FlatMemory, MemoryBus};

/// Reason for a machine run to stop.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// CPU halted
    Halt,
    /// T-state limit reached
    TStateLimit,
}

/// Information about a finished run.
#[derive(Debug, Clone)]
pub struct MachineExit {
    pub reason: ExitReason,
    pub t_states: u64,
    pub pc: u16,
    /// Number of extension traps handled.
    pub traps: u64,
}
