//! DiskDrive trait - the contract between the disk driver and a drive device.

use crate::error::DiskResult;

/// Answer to "has the disk in this drive changed?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskChange {
    Changed,
    NotChanged,
    /// The drive cannot tell; the caller must inspect the medium.
    Unknown,
}

/// A floppy drive device with one or more drives.
///
/// Drive numbers come straight from register A, so implementations must
/// cope with out-of-range values (report no disk / fail the request).
pub trait DiskDrive {
    /// Turn the motor on. Returns the spin-up latency in CPU cycles
    /// (0 if the motor was already running).
    fn motor_on(&mut self, drive: u8) -> u32;

    /// Schedule every motor to stop after the normal spin-down delay.
    fn all_motors_off(&mut self);

    /// Stop every motor immediately.
    fn all_motors_off_now(&mut self);

    fn disk_present(&self, drive: u8) -> bool;

    fn disk_write_protected(&self, drive: u8) -> bool;

    /// Query the media-change status. May consume a pending change.
    fn disk_has_changed(&mut self, drive: u8) -> DiskChange;

    /// Read `count` 512-byte sectors starting at logical sector `start`.
    fn read_sectors(&mut self, drive: u8, start: u16, count: u8) -> DiskResult<Vec<u8>>;

    /// Write `count` sectors from `data` (exactly `count * 512` bytes).
    fn write_sectors(&mut self, drive: u8, start: u16, count: u8, data: &[u8]) -> DiskResult<()>;

    /// Let `cycles` CPU cycles of time pass (motor timers).
    fn advance(&mut self, _cycles: u64) {}
}
