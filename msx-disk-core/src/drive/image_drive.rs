//! Image-backed floppy drive device.

use log::{debug, info};

use super::adapter::{DiskChange, DiskDrive};
use super::image::DiskImage;
use crate::error::{DiskError, DiskResult};

/// Number of drives the device exposes (A: and B:).
pub const DRIVE_COUNT: usize = 2;

/// Cycles charged when a stopped motor has to spin up.
pub const MOTOR_SPINUP_CYCLES: u32 = 360_000;

/// Cycles between a normal motor-off request and the motors stopping
/// (about 2.2 s at 3.58 MHz).
pub const MOTOR_SPINDOWN_CYCLES: u64 = 7_875_000;

/// State of a single drive.
#[derive(Debug, Clone, Default)]
struct DriveSlot {
    image: Option<DiskImage>,
    write_protected: bool,
    motor: bool,
    /// Set on insert/eject, consumed by the next change query.
    changed: bool,
    /// A read has succeeded since the disk went in.
    verified: bool,
}

/// Two-drive device serving sectors from in-memory disk images.
#[derive(Debug, Clone, Default)]
pub struct ImageDiskDrive {
    slots: [DriveSlot; DRIVE_COUNT],
    /// Cycles left before a scheduled spin-down stops the motors.
    spin_down: Option<u64>,
}

impl ImageDiskDrive {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, drive: u8) -> Option<&DriveSlot> {
        self.slots.get(drive as usize)
    }

    fn slot_mut(&mut self, drive: u8) -> DiskResult<&mut DriveSlot> {
        self.slots
            .get_mut(drive as usize)
            .ok_or(DiskError::InvalidDrive(drive))
    }

    /// Insert a disk, replacing any disk already in the drive.
    pub fn insert_disk(
        &mut self,
        drive: u8,
        image: DiskImage,
        write_protected: bool,
    ) -> DiskResult<()> {
        let slot = self.slot_mut(drive)?;
        info!(
            "Drive {}: disk inserted ({} sectors{})",
            drive,
            image.sector_count(),
            if write_protected { ", write protected" } else { "" }
        );
        slot.image = Some(image);
        slot.write_protected = write_protected;
        slot.changed = true;
        slot.verified = false;
        Ok(())
    }

    /// Remove the disk from a drive, returning it.
    pub fn eject_disk(&mut self, drive: u8) -> DiskResult<Option<DiskImage>> {
        let slot = self.slot_mut(drive)?;
        let image = slot.image.take();
        if image.is_some() {
            info!("Drive {}: disk ejected", drive);
            slot.changed = true;
            slot.verified = false;
        }
        Ok(image)
    }

    pub fn set_write_protected(&mut self, drive: u8, protected: bool) -> DiskResult<()> {
        self.slot_mut(drive)?.write_protected = protected;
        Ok(())
    }

    /// Disk currently in a drive.
    pub fn image(&self, drive: u8) -> Option<&DiskImage> {
        self.slot(drive).and_then(|s| s.image.as_ref())
    }

    pub fn motor_is_on(&self, drive: u8) -> bool {
        self.slot(drive).is_some_and(|s| s.motor)
    }

    pub fn any_motor_on(&self) -> bool {
        self.slots.iter().any(|s| s.motor)
    }

    /// True while a delayed motor-off is pending.
    pub fn spin_down_pending(&self) -> bool {
        self.spin_down.is_some()
    }

    fn stop_motors(&mut self) {
        for slot in &mut self.slots {
            slot.motor = false;
        }
        self.spin_down = None;
    }
}

impl DiskDrive for ImageDiskDrive {
    fn motor_on(&mut self, drive: u8) -> u32 {
        let Ok(slot) = self.slot_mut(drive) else {
            return 0;
        };
        let latency = if slot.motor { 0 } else { MOTOR_SPINUP_CYCLES };
        slot.motor = true;
        self.spin_down = None;
        latency
    }

    fn all_motors_off(&mut self) {
        if self.any_motor_on() {
            self.spin_down = Some(MOTOR_SPINDOWN_CYCLES);
        }
    }

    fn all_motors_off_now(&mut self) {
        debug!("All motors off");
        self.stop_motors();
    }

    fn disk_present(&self, drive: u8) -> bool {
        self.image(drive).is_some()
    }

    fn disk_write_protected(&self, drive: u8) -> bool {
        self.slot(drive).is_some_and(|s| s.write_protected)
    }

    fn disk_has_changed(&mut self, drive: u8) -> DiskChange {
        let Ok(slot) = self.slot_mut(drive) else {
            return DiskChange::Unknown;
        };
        if slot.changed {
            slot.changed = false;
            DiskChange::Changed
        } else if slot.motor && slot.verified && slot.image.is_some() {
            // The disk cannot be swapped while it spins
            DiskChange::NotChanged
        } else {
            DiskChange::Unknown
        }
    }

    fn read_sectors(&mut self, drive: u8, start: u16, count: u8) -> DiskResult<Vec<u8>> {
        let slot = self.slot_mut(drive)?;
        let image = slot.image.as_ref().ok_or(DiskError::NoDisk(drive))?;
        let bytes = image.read_sectors(start, count)?;
        slot.verified = true;
        Ok(bytes)
    }

    fn write_sectors(&mut self, drive: u8, start: u16, count: u8, data: &[u8]) -> DiskResult<()> {
        let slot = self.slot_mut(drive)?;
        if slot.write_protected {
            return Err(DiskError::WriteProtected(drive));
        }
        let image = slot.image.as_mut().ok_or(DiskError::NoDisk(drive))?;
        image.write_sectors(start, count, data)
    }

    fn advance(&mut self, cycles: u64) {
        if let Some(remaining) = self.spin_down {
            if cycles >= remaining {
                debug!("Motors spun down");
                self.stop_motors();
            } else {
                self.spin_down = Some(remaining - cycles);
            }
        }
    }
}
