//! Drive devices for the disk driver.
//!
//! - `DiskDrive`: the contract the routines drive (motors, sectors, media state)
//! - `DiskImage`: sector-addressed image bytes
//! - `ImageDiskDrive`: two-drive device over disk images

mod adapter;
mod image;
mod image_drive;

pub use adapter::{DiskChange, DiskDrive};
pub use image::DiskImage;
pub use image_drive::{ImageDiskDrive, DRIVE_COUNT, MOTOR_SPINDOWN_CYCLES, MOTOR_SPINUP_CYCLES};
