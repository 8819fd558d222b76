//! Error types for the disk BIOS emulation layer.

use thiserror::Error;

/// Errors that can occur while driving disks, patching BIOS images or
/// loading bundles.
///
/// None of these ever reach software running inside the emulated machine:
/// routine handlers translate them into [`DosError`] codes.
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Invalid drive: {0}")]
    InvalidDrive(u8),

    #[error("No disk in drive {0}")]
    NoDisk(u8),

    #[error("Disk in drive {0} is write protected")]
    WriteProtected(u8),

    #[error("Sectors {start}..{end} out of range (disk has {total})")]
    SectorOutOfRange { start: u32, end: u32, total: u32 },

    #[error("Sector data is {actual} bytes, expected {expected}")]
    ShortSectorData { expected: usize, actual: usize },

    #[error("Bad disk image size: {0} bytes")]
    BadImageSize(usize),

    #[error("Unknown media descriptor: {0:#04X}")]
    UnknownMedia(u8),

    #[error("Patch address {address:#06X} outside BIOS image")]
    PatchOutOfRange { address: u16 },

    #[error("Bundle error: {0}")]
    Bundle(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Error codes reported to the DOS kernel in register A (with carry set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DosError {
    /// Write attempted on a protected medium.
    WriteProtected = 0,
    /// Drive empty or the drive layer refused the request.
    NotReady = 2,
    /// Requested function is not implemented (formatting).
    Unsupported = 16,
}

impl DosError {
    /// Raw code as loaded into register A.
    pub fn code(self) -> u8 {
        self as u8
    }
}
