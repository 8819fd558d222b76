//! Disk Parameter Block (DPB) records.
//!
//! The DPB is the geometry record the DOS kernel keeps per drive. GETDPB
//! and DSKCHG copy one of these into kernel memory, one byte past HL.
//!
//! Layout (18 bytes, MSX-DOS 1):
//! - Byte 0: Media descriptor
//! - Bytes 1-2: Sector size (LE16, always 512)
//! - Byte 3: Directory mask (entries per sector - 1)
//! - Byte 4: Directory shift
//! - Byte 5: Cluster mask (sectors per cluster - 1)
//! - Byte 6: Cluster shift
//! - Bytes 7-8: First FAT sector (LE16)
//! - Byte 9: Number of FAT copies
//! - Byte 10: Maximum root directory entries
//! - Bytes 11-12: First data sector (LE16)
//! - Bytes 13-14: Highest cluster number (LE16)
//! - Byte 15: Sectors per FAT
//! - Bytes 16-17: First directory sector (LE16)

/// Size of a DPB record in bytes.
pub const DPB_SIZE: usize = 18;

/// Lowest media descriptor with a DPB. Anything below is rejected.
pub const MIN_MEDIA_DESCRIPTOR: u8 = 0xF8;

/// Bytes per sector, fixed for every supported medium.
pub const BYTES_PER_SECTOR: usize = 512;

/// DPB records indexed by `media - 0xF8`.
#[rustfmt::skip]
const DPB_TABLE: [[u8; DPB_SIZE]; 8] = [
    // F8: 80 tracks, 9 sectors, 1 side, 3.5" 360 KB
    [0xF8, 0x00, 0x02, 0x0F, 0x04, 0x01, 0x02, 0x01, 0x00, 0x02, 0x70, 0x0C, 0x00, 0x63, 0x01, 0x02, 0x05, 0x00],
    // F9: 80 tracks, 9 sectors, 2 sides, 3.5" 720 KB
    [0xF9, 0x00, 0x02, 0x0F, 0x04, 0x01, 0x02, 0x01, 0x00, 0x02, 0x70, 0x0E, 0x00, 0xCA, 0x02, 0x03, 0x07, 0x00],
    // FA: 80 tracks, 8 sectors, 1 side, 3.5" 320 KB
    [0xFA, 0x00, 0x02, 0x0F, 0x04, 0x01, 0x02, 0x01, 0x00, 0x02, 0x70, 0x0A, 0x00, 0x3C, 0x01, 0x01, 0x03, 0x00],
    // FB: 80 tracks, 8 sectors, 2 sides, 3.5" 640 KB
    [0xFB, 0x00, 0x02, 0x0F, 0x04, 0x01, 0x02, 0x01, 0x00, 0x02, 0x70, 0x0C, 0x00, 0x7B, 0x02, 0x02, 0x05, 0x00],
    // FC: 40 tracks, 9 sectors, 1 side, 5.25" 180 KB
    [0xFC, 0x00, 0x02, 0x0F, 0x04, 0x00, 0x01, 0x01, 0x00, 0x02, 0x40, 0x09, 0x00, 0x60, 0x01, 0x02, 0x05, 0x00],
    // FD: 40 tracks, 9 sectors, 2 sides, 5.25" 360 KB
    [0xFD, 0x00, 0x02, 0x0F, 0x04, 0x01, 0x02, 0x01, 0x00, 0x02, 0x70, 0x0C, 0x00, 0x63, 0x01, 0x02, 0x05, 0x00],
    // FE: 40 tracks, 8 sectors, 1 side, 5.25" 160 KB
    [0xFE, 0x00, 0x02, 0x0F, 0x04, 0x00, 0x01, 0x01, 0x00, 0x02, 0x40, 0x07, 0x00, 0x3A, 0x01, 0x01, 0x03, 0x00],
    // FF: 40 tracks, 8 sectors, 2 sides, 5.25" 320 KB
    [0xFF, 0x00, 0x02, 0x0F, 0x04, 0x01, 0x02, 0x01, 0x00, 0x02, 0x70, 0x0A, 0x00, 0x3C, 0x01, 0x01, 0x03, 0x00],
];

/// Physical layout of a medium, used to build blank images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaGeometry {
    pub tracks: u16,
    pub sectors_per_track: u16,
    pub sides: u16,
}

impl MediaGeometry {
    pub fn total_sectors(&self) -> u32 {
        self.tracks as u32 * self.sectors_per_track as u32 * self.sides as u32
    }
}

#[rustfmt::skip]
const GEOMETRY_TABLE: [MediaGeometry; 8] = [
    MediaGeometry { tracks: 80, sectors_per_track: 9, sides: 1 },
    MediaGeometry { tracks: 80, sectors_per_track: 9, sides: 2 },
    MediaGeometry { tracks: 80, sectors_per_track: 8, sides: 1 },
    MediaGeometry { tracks: 80, sectors_per_track: 8, sides: 2 },
    MediaGeometry { tracks: 40, sectors_per_track: 9, sides: 1 },
    MediaGeometry { tracks: 40, sectors_per_track: 9, sides: 2 },
    MediaGeometry { tracks: 40, sectors_per_track: 8, sides: 1 },
    MediaGeometry { tracks: 40, sectors_per_track: 8, sides: 2 },
];

fn table_index(media: u8) -> Option<usize> {
    media
        .checked_sub(MIN_MEDIA_DESCRIPTOR)
        .map(|i| i as usize)
}

/// Look up the raw DPB record for a media descriptor.
/// Returns None for descriptors below 0xF8.
pub fn dpb_for_media(media: u8) -> Option<&'static [u8; DPB_SIZE]> {
    table_index(media).map(|i| &DPB_TABLE[i])
}

/// Look up the physical geometry for a media descriptor.
pub fn geometry_for_media(media: u8) -> Option<MediaGeometry> {
    table_index(media).map(|i| GEOMETRY_TABLE[i])
}

/// Decoded, read-only view of a DPB record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dpb<'a> {
    raw: &'a [u8; DPB_SIZE],
}

impl<'a> Dpb<'a> {
    /// DPB for a media descriptor, if supported.
    pub fn for_media(media: u8) -> Option<Dpb<'static>> {
        dpb_for_media(media).map(|raw| Dpb { raw })
    }

    fn word(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.raw[offset], self.raw[offset + 1]])
    }

    pub fn as_bytes(&self) -> &'a [u8; DPB_SIZE] {
        self.raw
    }

    pub fn media(&self) -> u8 {
        self.raw[0]
    }

    pub fn sector_size(&self) -> u16 {
        self.word(1)
    }

    pub fn directory_mask(&self) -> u8 {
        self.raw[3]
    }

    pub fn directory_shift(&self) -> u8 {
        self.raw[4]
    }

    pub fn cluster_mask(&self) -> u8 {
        self.raw[5]
    }

    pub fn cluster_shift(&self) -> u8 {
        self.raw[6]
    }

    pub fn sectors_per_cluster(&self) -> u8 {
        self.cluster_mask() + 1
    }

    pub fn first_fat_sector(&self) -> u16 {
        self.word(7)
    }

    pub fn fat_count(&self) -> u8 {
        self.raw[9]
    }

    pub fn max_directory_entries(&self) -> u8 {
        self.raw[10]
    }

    pub fn first_data_sector(&self) -> u16 {
        self.word(11)
    }

    pub fn highest_cluster(&self) -> u16 {
        self.word(13)
    }

    pub fn sectors_per_fat(&self) -> u8 {
        self.raw[15]
    }

    pub fn first_directory_sector(&self) -> u16 {
        self.word(16)
    }
}
