//! Disk BIOS ROM image.

use std::path::Path;

use crate::error::{DiskError, DiskResult};

/// Address a disk BIOS ROM is normally mapped at (page 1).
pub const DEFAULT_BIOS_BASE: u16 = 0x4000;

/// A loaded disk BIOS / DOS kernel image and the CPU address it sits at.
///
/// Addresses passed to [`BiosImage::read`] and [`BiosImage::write`] are CPU
/// addresses; the image translates them through its base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiosImage {
    bytes: Vec<u8>,
    base: u16,
}

impl BiosImage {
    pub fn new(bytes: Vec<u8>, base: u16) -> Self {
        Self { bytes, base }
    }

    /// Load a ROM file.
    pub fn load(path: impl AsRef<Path>, base: u16) -> DiskResult<Self> {
        Ok(Self::new(std::fs::read(path)?, base))
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn index(&self, address: u16) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        (offset < self.bytes.len()).then_some(offset)
    }

    /// True if `len` bytes starting at `address` all lie inside the image.
    pub fn contains(&self, address: u16, len: u16) -> bool {
        match len.checked_sub(1) {
            None => true,
            Some(last) => {
                self.index(address).is_some()
                    && address
                        .checked_add(last)
                        .and_then(|end| self.index(end))
                        .is_some()
            }
        }
    }

    pub fn read(&self, address: u16) -> Option<u8> {
        self.index(address).map(|i| self.bytes[i])
    }

    pub fn write(&mut self, address: u16, value: u8) -> DiskResult<()> {
        let i = self
            .index(address)
            .ok_or(DiskError::PatchOutOfRange { address })?;
        self.bytes[i] = value;
        Ok(())
    }

    /// Save the image, e.g. after patching.
    pub fn save(&self, path: impl AsRef<Path>) -> DiskResult<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_translation() {
        let mut bios = BiosImage::new(vec![0; 0x4000], DEFAULT_BIOS_BASE);
        bios.write(0x4010, 0xED).unwrap();
        assert_eq!(bios.bytes()[0x10], 0xED);
        assert_eq!(bios.read(0x4010), Some(0xED));
        assert_eq!(bios.read(0x3FFF), None);
        assert_eq!(bios.read(0x8000), None);
    }

    #[test]
    fn test_write_outside_image() {
        let mut bios = BiosImage::new(vec![0; 16], 0x4000);
        assert!(matches!(
            bios.write(0x4010, 1),
            Err(DiskError::PatchOutOfRange { address: 0x4010 })
        ));
    }

    #[test]
    fn test_contains() {
        let bios = BiosImage::new(vec![0; 0x4000], 0x4000);
        assert!(bios.contains(0x4010, 3));
        assert!(bios.contains(0x7FFD, 3));
        assert!(!bios.contains(0x7FFE, 3));
        assert!(!bios.contains(0x3FFF, 3));
        assert!(bios.contains(0x0000, 0));
    }

    #[test]
    fn test_zero_base_image() {
        let bios = BiosImage::new(vec![0; 0x8000], 0);
        assert!(bios.contains(0x576F, 3));
        assert_eq!(bios.read(0x5850), Some(0));
    }
}
