//! Disk bundle loading from ZIP files with manifest support.
//!
//! A bundle is a ZIP file holding a disk BIOS image, disk images and an
//! optional program, plus an optional `manifest.json` describing how they
//! fit together. Without a manifest, one is derived from the file names.

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::bios::{BiosImage, DEFAULT_BIOS_BASE};
use crate::drive::{DiskImage, ImageDiskDrive, DRIVE_COUNT};
use crate::error::{DiskError, DiskResult};

/// Name of the manifest inside a bundle.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Default program load/start address.
pub const DEFAULT_LOAD_ADDRESS: u16 = 0x0100;

/// Drive entry in a bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveEntry {
    pub image: String,
    #[serde(default)]
    pub write_protected: bool,
}

/// Bundle manifest schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bios: Option<String>,
    #[serde(default)]
    pub bios_base: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub load_address: Option<String>,
    #[serde(default)]
    pub drives: Vec<DriveEntry>,
}

/// Loaded bundle: manifest plus every file in the archive, keyed by name.
#[derive(Debug, Clone)]
pub struct DiskBundle {
    pub manifest: BundleManifest,
    pub files: BTreeMap<String, Vec<u8>>,
}

fn has_extension(name: &str, exts: &[&str]) -> bool {
    let upper = name.to_uppercase();
    exts.iter().any(|ext| upper.ends_with(ext))
}

/// Parse a hex address such as `0x4000`, `4000h` or `4000`.
pub fn parse_address(text: &str) -> DiskResult<u16> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_suffix('h'))
        .or_else(|| trimmed.strip_suffix('H'))
        .unwrap_or(trimmed);
    u16::from_str_radix(digits, 16)
        .map_err(|_| DiskError::Bundle(format!("bad address '{}'", text)))
}

impl BundleManifest {
    /// Manifest derived from file names: first `*.ROM` is the BIOS, first
    /// `*.COM`/`*.BIN` the program, `*.DSK` files fill the drives in order.
    pub fn from_files<'a>(names: impl IntoIterator<Item = &'a String>) -> Self {
        let mut names: Vec<&String> = names.into_iter().collect();
        names.sort();

        let first = |exts: &[&str]| {
            names
                .iter()
                .find(|n| has_extension(n, exts))
                .map(|n| n.to_string())
        };

        Self {
            name: "Unnamed Bundle".to_string(),
            description: None,
            bios: first(&[".ROM"]),
            bios_base: None,
            program: first(&[".COM", ".BIN"]),
            load_address: None,
            drives: names
                .iter()
                .filter(|n| has_extension(n, &[".DSK"]))
                .take(DRIVE_COUNT)
                .map(|n| DriveEntry {
                    image: n.to_string(),
                    write_protected: false,
                })
                .collect(),
        }
    }

    pub fn bios_base(&self) -> DiskResult<u16> {
        self.bios_base
            .as_deref()
            .map_or(Ok(DEFAULT_BIOS_BASE), parse_address)
    }

    pub fn load_address(&self) -> DiskResult<u16> {
        self.load_address
            .as_deref()
            .map_or(Ok(DEFAULT_LOAD_ADDRESS), parse_address)
    }
}

impl DiskBundle {
    fn file(&self, name: &str) -> DiskResult<&[u8]> {
        self.files
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DiskError::Bundle(format!("'{}' not found in bundle", name)))
    }

    /// The BIOS image named by the manifest, if any.
    pub fn bios_image(&self) -> DiskResult<Option<BiosImage>> {
        self.manifest
            .bios
            .as_deref()
            .map(|name| {
                Ok(BiosImage::new(
                    self.file(name)?.to_vec(),
                    self.manifest.bios_base()?,
                ))
            })
            .transpose()
    }

    /// Program bytes and load address, if the bundle has a program.
    pub fn program(&self) -> DiskResult<Option<(u16, Vec<u8>)>> {
        self.manifest
            .program
            .as_deref()
            .map(|name| Ok((self.manifest.load_address()?, self.file(name)?.to_vec())))
            .transpose()
    }

    /// Build a drive with the manifest's disks inserted.
    pub fn build_drive(&self) -> DiskResult<ImageDiskDrive> {
        if self.manifest.drives.len() > DRIVE_COUNT {
            return Err(DiskError::Bundle(format!(
                "{} drives listed, at most {} supported",
                self.manifest.drives.len(),
                DRIVE_COUNT
            )));
        }

        let mut drive = ImageDiskDrive::new();
        for (index, entry) in self.manifest.drives.iter().enumerate() {
            let image = DiskImage::from_bytes(self.file(&entry.image)?.to_vec())?;
            drive.insert_disk(index as u8, image, entry.write_protected)?;
        }
        Ok(drive)
    }
}

/// Load a bundle from ZIP data.
pub fn load_bundle<R: Read + Seek>(reader: R) -> DiskResult<DiskBundle> {
    let mut archive = ZipArchive::new(reader)?;
    let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut manifest: Option<BundleManifest> = None;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        // Nested paths are flattened to the file name
        let name = file.name().to_string();
        let filename = name.rsplit('/').next().unwrap_or(&name).to_string();

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        if filename.eq_ignore_ascii_case(MANIFEST_NAME) {
            manifest = Some(serde_json::from_slice(&content)?);
        } else {
            debug!("Bundle file {} ({} bytes)", filename, content.len());
            files.insert(filename, content);
        }
    }

    let manifest = manifest.unwrap_or_else(|| BundleManifest::from_files(files.keys()));
    info!(
        "Loaded bundle '{}': {} files, {} drives",
        manifest.name,
        files.len(),
        manifest.drives.len()
    );
    Ok(DiskBundle { manifest, files })
}

/// Load a bundle from a file path.
pub fn load_bundle_from_path(path: impl AsRef<Path>) -> DiskResult<DiskBundle> {
    let file = std::fs::File::open(path)?;
    load_bundle(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::drive::DiskDrive;

    fn zip_of(entries: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x4000").unwrap(), 0x4000);
        assert_eq!(parse_address("C000h").unwrap(), 0xC000);
        assert_eq!(parse_address("100").unwrap(), 0x0100);
        assert!(parse_address("0x10000").is_err());
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn test_manifest_bundle() {
        let disk = DiskImage::blank(0xF9).unwrap();
        let manifest = br#"{
            "name": "Test",
            "bios": "disk.rom",
            "biosBase": "0x4000",
            "program": "boot.bin",
            "loadAddress": "0xC000",
            "drives": [{ "image": "a.dsk", "writeProtected": true }]
        }"#;
        let rom = vec![0u8; 0x4000];
        let bundle = load_bundle(zip_of(&[
            ("manifest.json", manifest),
            ("disk.rom", &rom[..]),
            ("boot.bin", &[0x76]),
            ("disks/a.dsk", disk.as_bytes()),
        ]))
        .unwrap();

        assert_eq!(bundle.manifest.name, "Test");
        assert_eq!(bundle.files.len(), 3);

        let bios = bundle.bios_image().unwrap().unwrap();
        assert_eq!(bios.base(), 0x4000);
        assert_eq!(bios.len(), 0x4000);

        assert_eq!(bundle.program().unwrap(), Some((0xC000, vec![0x76])));

        let drive = bundle.build_drive().unwrap();
        assert!(drive.disk_present(0));
        assert!(drive.disk_write_protected(0));
        assert!(!drive.disk_present(1));
    }

    #[test]
    fn test_default_manifest() {
        let disk = DiskImage::blank(0xF8).unwrap();
        let bundle = load_bundle(zip_of(&[
            ("b.dsk", disk.as_bytes()),
            ("a.dsk", disk.as_bytes()),
            ("c.dsk", disk.as_bytes()),
            ("DISK.ROM", &[0u8; 16]),
            ("GAME.COM", &[0xC9]),
        ]))
        .unwrap();

        let m = &bundle.manifest;
        assert_eq!(m.bios.as_deref(), Some("DISK.ROM"));
        assert_eq!(m.program.as_deref(), Some("GAME.COM"));
        let images: Vec<&str> = m.drives.iter().map(|d| d.image.as_str()).collect();
        assert_eq!(images, ["a.dsk", "b.dsk"]);
        assert_eq!(m.load_address().unwrap(), DEFAULT_LOAD_ADDRESS);
        assert_eq!(m.bios_base().unwrap(), DEFAULT_BIOS_BASE);
    }

    #[test]
    fn test_missing_file() {
        let bundle = load_bundle(zip_of(&[(
            "manifest.json",
            br#"{ "name": "X", "bios": "nope.rom" }"#,
        )]))
        .unwrap();
        assert!(matches!(bundle.bios_image(), Err(DiskError::Bundle(_))));
    }

    #[test]
    fn test_bad_manifest_json() {
        let result = load_bundle(zip_of(&[("manifest.json", b"{ not json")]));
        assert!(matches!(result, Err(DiskError::Json(_))));
    }

    #[test]
    fn test_bad_disk_image() {
        let bundle = load_bundle(zip_of(&[
            ("manifest.json", br#"{ "name": "X", "drives": [{ "image": "a.dsk" }] }"#),
            ("a.dsk", &[0u8; 100]),
        ]))
        .unwrap();
        assert!(matches!(
            bundle.build_drive(),
            Err(DiskError::BadImageSize(100))
        ));
    }
}
