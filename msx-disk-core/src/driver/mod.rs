//! Disk driver: the eight disk BIOS routines behind CPU extension traps.
//!
//! The CPU host claims extensions 0x8-0xF for the driver. When it executes
//! one of the patched `ED E8`..`ED EF` instructions it captures a
//! [`RegisterSnapshot`], calls [`DiskDriver::dispatch`], and applies the
//! returned [`RegisterResult`].

pub mod dpb;
pub mod patch;
pub mod registers;
mod routines;

use log::{debug, info, warn};

pub use dpb::{Dpb, DPB_SIZE, MIN_MEDIA_DESCRIPTOR};
pub use patch::{patch_disk_bios, PatchSite, PATCH_TABLE};
pub use registers::{RegisterResult, RegisterSnapshot, FLAG_C, FLAG_Z};

use crate::bios::BiosImage;
use crate::drive::DiskDrive;
use crate::error::DiskResult;
use crate::memory::MemoryBus;

/// Disk driver routines and their extension numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverRoutine {
    /// 0x8: Initialize hardware
    Inihrd = 0x8,
    /// 0x9: Number of drives
    Drives = 0x9,
    /// 0xA: Sector read/write
    Dskio = 0xA,
    /// 0xB: Disk change status
    Dskchg = 0xB,
    /// 0xC: Get Disk Parameter Block
    Getdpb = 0xC,
    /// 0xD: Format choice string
    Choice = 0xD,
    /// 0xE: Format disk
    Dskfmt = 0xE,
    /// 0xF: Motors off
    Mtoff = 0xF,
}

impl DriverRoutine {
    pub const ALL: [DriverRoutine; 8] = [
        Self::Inihrd,
        Self::Drives,
        Self::Dskio,
        Self::Dskchg,
        Self::Getdpb,
        Self::Choice,
        Self::Dskfmt,
        Self::Mtoff,
    ];

    /// Extension number (low nibble of the trap opcode).
    pub fn extension(self) -> u8 {
        self as u8
    }

    /// Kernel name of the routine.
    pub fn name(self) -> &'static str {
        match self {
            Self::Inihrd => "INIHRD",
            Self::Drives => "DRIVES",
            Self::Dskio => "DSKIO",
            Self::Dskchg => "DSKCHG",
            Self::Getdpb => "GETDPB",
            Self::Choice => "CHOICE",
            Self::Dskfmt => "DSKFMT",
            Self::Mtoff => "MTOFF",
        }
    }
}

impl TryFrom<u8> for DriverRoutine {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x8 => Ok(Self::Inihrd),
            0x9 => Ok(Self::Drives),
            0xA => Ok(Self::Dskio),
            0xB => Ok(Self::Dskchg),
            0xC => Ok(Self::Getdpb),
            0xD => Ok(Self::Choice),
            0xE => Ok(Self::Dskfmt),
            0xF => Ok(Self::Mtoff),
            _ => Err(value),
        }
    }
}

/// Extension numbers the driver claims from the CPU host.
pub const DRIVER_EXTENSIONS: [u8; 8] = [0x8, 0x9, 0xA, 0xB, 0xC, 0xD, 0xE, 0xF];

/// Cycles charged for each sector transferred.
pub const EXTRA_CYCLES_PER_SECTOR: u32 = 10_000;

/// CPU side of the extension protocol: decides which trap numbers reach us.
pub trait ExtensionHost {
    /// Route the given extension numbers to the disk driver.
    fn claim_extensions(&mut self, extensions: &[u8]);

    /// Stop routing the given extension numbers.
    fn release_extensions(&mut self, extensions: &[u8]);
}

/// Everything the routines operate on, owned for the life of the driver.
pub struct DriverContext<B, D> {
    pub bus: B,
    pub drive: D,
}

/// The disk driver: dispatches extension calls to the routine handlers.
pub struct DiskDriver<B: MemoryBus, D: DiskDrive> {
    context: DriverContext<B, D>,
    connected: bool,
}

impl<B: MemoryBus, D: DiskDrive> DiskDriver<B, D> {
    pub fn new(bus: B, drive: D) -> Self {
        Self {
            context: DriverContext { bus, drive },
            connected: false,
        }
    }

    pub fn bus(&self) -> &B {
        &self.context.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.context.bus
    }

    pub fn drive(&self) -> &D {
        &self.context.drive
    }

    pub fn drive_mut(&mut self) -> &mut D {
        &mut self.context.drive
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Patch the BIOS and start receiving extension calls from `host`.
    pub fn connect<H: ExtensionHost + ?Sized>(
        &mut self,
        host: &mut H,
        bios: &mut BiosImage,
    ) -> DiskResult<()> {
        patch_disk_bios(bios)?;
        host.claim_extensions(&DRIVER_EXTENSIONS);
        self.connected = true;
        info!("Disk driver connected");
        Ok(())
    }

    /// Stop receiving extension calls and stop every motor.
    pub fn disconnect<H: ExtensionHost + ?Sized>(&mut self, host: &mut H) {
        host.release_extensions(&DRIVER_EXTENSIONS);
        self.connected = false;
        self.context.drive.all_motors_off_now();
        info!("Disk driver disconnected");
    }

    /// Machine power loss: motors stop, routing stays in place.
    pub fn power_off(&mut self) {
        debug!("Power off");
        self.context.drive.all_motors_off_now();
    }

    /// Handle one extension call.
    pub fn dispatch(&mut self, extension: u8, regs: &RegisterSnapshot) -> RegisterResult {
        match DriverRoutine::try_from(extension) {
            Ok(routine) => self.call(routine, regs),
            Err(ext) => {
                warn!("Extension {:#X} is not a disk routine", ext);
                RegisterResult::none()
            }
        }
    }

    /// Run a routine against a register snapshot.
    pub fn call(&mut self, routine: DriverRoutine, regs: &RegisterSnapshot) -> RegisterResult {
        debug!(
            "{} (F={:#04X} A={:#04X} B={:#04X} C={:#04X} DE={:#06X} HL={:#06X} SP={:#06X}) at {:#06X}",
            routine.name(),
            regs.f,
            regs.a,
            regs.b,
            regs.c,
            regs.de,
            regs.hl,
            regs.sp,
            regs.pc
        );

        use DriverRoutine::*;

        match routine {
            Inihrd => self.inihrd(),
            Drives => self.drives(regs),
            Dskio => self.dskio(regs),
            Dskchg => self.dskchg(regs),
            Getdpb => self.getdpb(regs),
            Choice => self.choice(),
            Dskfmt => self.dskfmt(regs),
            Mtoff => self.mtoff(),
        }
    }

    /// Called by the host once a trapped instruction has completed:
    /// motors spin down after the normal delay.
    pub fn extension_finish(&mut self) {
        self.context.drive.all_motors_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::{DiskImage, ImageDiskDrive};
    use crate::memory::FlatMemory;

    #[derive(Default)]
    struct RecordingHost {
        claimed: Vec<u8>,
    }

    impl ExtensionHost for RecordingHost {
        fn claim_extensions(&mut self, extensions: &[u8]) {
            self.claimed.extend_from_slice(extensions);
        }

        fn release_extensions(&mut self, extensions: &[u8]) {
            self.claimed.retain(|e| !extensions.contains(e));
        }
    }

    fn driver() -> DiskDriver<FlatMemory, ImageDiskDrive> {
        let mut drive = ImageDiskDrive::new();
        drive
            .insert_disk(0, DiskImage::blank(0xF9).unwrap(), false)
            .unwrap();
        DiskDriver::new(FlatMemory::new(), drive)
    }

    #[test]
    fn test_routine_numbers() {
        for routine in DriverRoutine::ALL {
            assert_eq!(DriverRoutine::try_from(routine.extension()), Ok(routine));
        }
        assert_eq!(DriverRoutine::try_from(0x7), Err(0x7));
        assert_eq!(DriverRoutine::try_from(0x10), Err(0x10));
        assert_eq!(DriverRoutine::Dskio.name(), "DSKIO");
    }

    #[test]
    fn test_connect_patches_and_claims() {
        let mut driver = driver();
        let mut host = RecordingHost::default();
        let mut bios = BiosImage::new(vec![0; 0x4000], 0x4000);

        driver.connect(&mut host, &mut bios).unwrap();
        assert!(driver.is_connected());
        assert_eq!(host.claimed, DRIVER_EXTENSIONS.to_vec());
        assert_eq!(bios.read(0x4011), Some(0xEA));
    }

    #[test]
    fn test_failed_connect_claims_nothing() {
        let mut driver = driver();
        let mut host = RecordingHost::default();
        let mut bios = BiosImage::new(vec![0; 0x100], 0x4000);

        assert!(driver.connect(&mut host, &mut bios).is_err());
        assert!(!driver.is_connected());
        assert!(host.claimed.is_empty());
    }

    #[test]
    fn test_disconnect_releases_and_stops_motors() {
        let mut driver = driver();
        let mut host = RecordingHost::default();
        let mut bios = BiosImage::new(vec![0; 0x4000], 0x4000);
        driver.connect(&mut host, &mut bios).unwrap();

        driver.drive_mut().motor_on(0);
        driver.disconnect(&mut host);
        assert!(host.claimed.is_empty());
        assert!(!driver.is_connected());
        assert!(!driver.drive().any_motor_on());
    }

    #[test]
    fn test_power_off_keeps_routing() {
        let mut driver = driver();
        let mut host = RecordingHost::default();
        let mut bios = BiosImage::new(vec![0; 0x4000], 0x4000);
        driver.connect(&mut host, &mut bios).unwrap();

        driver.drive_mut().motor_on(0);
        driver.drive_mut().motor_on(1);
        driver.power_off();
        assert!(!driver.drive().any_motor_on());
        assert_eq!(host.claimed.len(), 8);
        assert!(driver.is_connected());
    }

    #[test]
    fn test_extension_finish_schedules_spin_down() {
        let mut driver = driver();
        driver.drive_mut().motor_on(0);
        driver.extension_finish();
        assert!(driver.drive().motor_is_on(0));
        assert!(driver.drive().spin_down_pending());
    }

    #[test]
    fn test_unknown_extension_is_ignored() {
        let mut driver = driver();
        let result = driver.dispatch(0x3, &RegisterSnapshot::default());
        assert!(result.is_empty());
    }
}
