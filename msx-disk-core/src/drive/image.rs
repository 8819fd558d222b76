//! Sector-addressed disk images.

use std::path::Path;

use crate::driver::dpb::{geometry_for_media, Dpb, BYTES_PER_SECTOR};
use crate::error::{DiskError, DiskResult};

/// OEM name written into the boot sector of blank images.
const OEM_NAME: &[u8; 8] = b"MSXDISK ";

/// Raw disk image made of 512-byte logical sectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImage {
    bytes: Vec<u8>,
}

impl DiskImage {
    /// Wrap raw image bytes. The size must be a non-zero multiple of 512.
    pub fn from_bytes(bytes: Vec<u8>) -> DiskResult<Self> {
        if bytes.is_empty() || bytes.len() % BYTES_PER_SECTOR != 0 {
            return Err(DiskError::BadImageSize(bytes.len()));
        }
        Ok(Self { bytes })
    }

    /// Load an image file.
    pub fn load(path: impl AsRef<Path>) -> DiskResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Write the image back to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> DiskResult<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Create an empty, freshly formatted image for a media descriptor.
    pub fn blank(media: u8) -> DiskResult<Self> {
        let dpb = Dpb::for_media(media).ok_or(DiskError::UnknownMedia(media))?;
        let geometry = geometry_for_media(media).ok_or(DiskError::UnknownMedia(media))?;
        let total = geometry.total_sectors();
        let mut bytes = vec![0u8; total as usize * BYTES_PER_SECTOR];

        // Boot sector: short jump, OEM name, BIOS parameter block
        bytes[0..3].copy_from_slice(&[0xEB, 0xFE, 0x90]);
        bytes[3..11].copy_from_slice(OEM_NAME);
        bytes[11..13].copy_from_slice(&dpb.sector_size().to_le_bytes());
        bytes[13] = dpb.sectors_per_cluster();
        bytes[14..16].copy_from_slice(&dpb.first_fat_sector().to_le_bytes());
        bytes[16] = dpb.fat_count();
        bytes[17..19].copy_from_slice(&(dpb.max_directory_entries() as u16).to_le_bytes());
        bytes[19..21].copy_from_slice(&(total as u16).to_le_bytes());
        bytes[21] = media;
        bytes[22..24].copy_from_slice(&(dpb.sectors_per_fat() as u16).to_le_bytes());
        bytes[24..26].copy_from_slice(&geometry.sectors_per_track.to_le_bytes());
        bytes[26..28].copy_from_slice(&geometry.sides.to_le_bytes());

        // Each FAT copy starts with the media byte followed by two filler bytes
        for copy in 0..dpb.fat_count() as usize {
            let sector = dpb.first_fat_sector() as usize + copy * dpb.sectors_per_fat() as usize;
            let offset = sector * BYTES_PER_SECTOR;
            bytes[offset..offset + 3].copy_from_slice(&[media, 0xFF, 0xFF]);
        }

        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn sector_count(&self) -> u32 {
        (self.bytes.len() / BYTES_PER_SECTOR) as u32
    }

    /// Media descriptor from the first FAT byte, if the image has a FAT sector.
    pub fn media_descriptor(&self) -> Option<u8> {
        self.bytes.get(BYTES_PER_SECTOR).copied()
    }

    fn byte_range(&self, start: u16, count: u8) -> DiskResult<std::ops::Range<usize>> {
        let first = start as u32;
        let end = first + count as u32;
        if end > self.sector_count() {
            return Err(DiskError::SectorOutOfRange {
                start: first,
                end,
                total: self.sector_count(),
            });
        }
        Ok(first as usize * BYTES_PER_SECTOR..end as usize * BYTES_PER_SECTOR)
    }

    pub fn read_sectors(&self, start: u16, count: u8) -> DiskResult<Vec<u8>> {
        let range = self.byte_range(start, count)?;
        Ok(self.bytes[range].to_vec())
    }

    pub fn write_sectors(&mut self, start: u16, count: u8, data: &[u8]) -> DiskResult<()> {
        let range = self.byte_range(start, count)?;
        if data.len() != range.len() {
            return Err(DiskError::ShortSectorData {
                expected: range.len(),
                actual: data.len(),
            });
        }
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}
