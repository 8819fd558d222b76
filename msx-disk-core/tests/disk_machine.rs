//! Integration tests: Z80 programs calling the patched disk BIOS, with
//! disks loaded from real ZIP bundles.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use msx_disk_core::driver::dpb::dpb_for_media;
use msx_disk_core::driver::FLAG_C;
use msx_disk_core::{
    load_bundle_from_path, DiskImage, DiskMachine, ExitReason, ImageDiskDrive, MemoryBus,
};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn write_bundle(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn boot(entries: &[(&str, &[u8])]) -> (DiskMachine<ImageDiskDrive>, u16) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");
    write_bundle(&path, entries);

    let bundle = load_bundle_from_path(&path).expect("Failed to load bundle");
    let bios = bundle.bios_image().unwrap().expect("bundle has a BIOS");
    let drive = bundle.build_drive().unwrap();
    let (address, program) = bundle.program().unwrap().expect("bundle has a program");

    let mut machine = DiskMachine::new(bios, drive).unwrap();
    machine.load_at(address, &program);
    (machine, address)
}

#[rustfmt::skip]
const SECTOR_ROUND_TRIP: &[u8] = &[
    // Write sector 20 of A: from 0xC000
    0x21, 0x00, 0xC0,       // LD HL, 0xC000
    0x11, 0x14, 0x00,       // LD DE, 20
    0x06, 0x01,             // LD B, 1
    0x3E, 0x00,             // LD A, 0
    0x37,                   // SCF
    0xCD, 0x10, 0x40,       // CALL DSKIO
    // Read it back into 0xC200
    0x21, 0x00, 0xC2,       // LD HL, 0xC200
    0x11, 0x14, 0x00,       // LD DE, 20
    0x06, 0x01,             // LD B, 1
    0x3E, 0x00,             // LD A, 0
    0xB7,                   // OR A
    0xCD, 0x10, 0x40,       // CALL DSKIO
    // Write to the protected disk in B:
    0x21, 0x00, 0xC0,       // LD HL, 0xC000
    0x11, 0x00, 0x00,       // LD DE, 0
    0x06, 0x01,             // LD B, 1
    0x3E, 0x01,             // LD A, 1
    0x37,                   // SCF
    0xCD, 0x10, 0x40,       // CALL DSKIO
    0x76,                   // HALT
];

#[test]
fn test_sector_round_trip_from_bundle() {
    let rom = vec![0u8; 0x4000];
    let disk = DiskImage::blank(0xF9).unwrap();
    let manifest = br#"{
        "name": "Round trip",
        "bios": "DISK.ROM",
        "program": "TEST.BIN",
        "drives": [
            { "image": "A.DSK" },
            { "image": "B.DSK", "writeProtected": true }
        ]
    }"#;

    let (mut machine, start) = boot(&[
        ("manifest.json", manifest),
        ("DISK.ROM", &rom[..]),
        ("TEST.BIN", SECTOR_ROUND_TRIP),
        ("A.DSK", disk.as_bytes()),
        ("B.DSK", disk.as_bytes()),
    ]);

    let pattern: Vec<u8> = (0..512).map(|i| (i * 7) as u8).collect();
    machine.load_at(0xC000, &pattern);

    let exit = machine.run_from(start).unwrap();
    assert_eq!(exit.reason, ExitReason::Halt);
    assert_eq!(exit.traps, 3);

    // Last call failed: write protected
    let regs = machine.registers();
    assert_eq!(regs.f & FLAG_C, FLAG_C);
    assert_eq!(regs.a, 0);
    assert_eq!(regs.b, 1);

    assert_eq!(&machine.memory().as_slice()[0xC200..0xC400], &pattern[..]);

    // The image survives a save and reload
    let dir = tempfile::tempdir().unwrap();
    let saved = dir.path().join("A.DSK");
    machine.drive().image(0).unwrap().save(&saved).unwrap();
    let reloaded = DiskImage::load(&saved).unwrap();
    assert_eq!(reloaded.read_sectors(20, 1).unwrap(), pattern);
    assert_eq!(machine.drive().image(1).unwrap().as_bytes(), disk.as_bytes());
}

#[rustfmt::skip]
const MEDIA_CHECKS: &[u8] = &[
    0x3E, 0x00,             // LD A, 0
    0x21, 0x00, 0xD0,       // LD HL, 0xD000
    0xCD, 0x13, 0x40,       // CALL DSKCHG
    0x78,                   // LD A, B
    0x32, 0x00, 0xE0,       // LD (0xE000), A
    0x3E, 0x00,             // LD A, 0
    0x21, 0x00, 0xD0,       // LD HL, 0xD000
    0xCD, 0x13, 0x40,       // CALL DSKCHG
    0x78,                   // LD A, B
    0x32, 0x01, 0xE0,       // LD (0xE001), A
    0x06, 0xF8,             // LD B, 0xF8
    0x21, 0x00, 0xD8,       // LD HL, 0xD800
    0xCD, 0x16, 0x40,       // CALL GETDPB
    0xCD, 0x19, 0x40,       // CALL CHOICE
    0x22, 0x02, 0xE0,       // LD (0xE002), HL
    0xCD, 0x1F, 0x40,       // CALL MTOFF
    0x76,                   // HALT
];

#[test]
fn test_media_checks_from_default_manifest() {
    let rom = vec![0u8; 0x4000];
    let disk = DiskImage::blank(0xF9).unwrap();

    // No manifest: ROM, program and disk are picked by extension
    let (mut machine, start) = boot(&[
        ("DISK.ROM", &rom[..]),
        ("CHECK.COM", MEDIA_CHECKS),
        ("A.DSK", disk.as_bytes()),
    ]);
    assert_eq!(start, 0x0100);

    let exit = machine.run_from(start).unwrap();
    assert_eq!(exit.reason, ExitReason::Halt);
    assert_eq!(exit.traps, 5);

    let mem = machine.memory();
    // Freshly inserted disk reports changed, then not changed
    assert_eq!(mem.read(0xE000), 0xFF);
    assert_eq!(mem.read(0xE001), 0x01);

    let dpb_f9 = dpb_for_media(0xF9).unwrap();
    assert_eq!(&mem.as_slice()[0xD001..0xD001 + dpb_f9.len()], &dpb_f9[..]);
    let dpb_f8 = dpb_for_media(0xF8).unwrap();
    assert_eq!(&mem.as_slice()[0xD801..0xD801 + dpb_f8.len()], &dpb_f8[..]);

    // CHOICE pointer and string
    assert_eq!(mem.read(0xE002), 0xF3);
    assert_eq!(mem.read(0xE003), 0x8F);
    assert_eq!(&mem.as_slice()[0x8FF3..0x8FF9], b"CHOICE");

    assert!(!machine.drive().any_motor_on());
}

#[test]
fn test_empty_drive_not_ready() {
    let rom = vec![0u8; 0x4000];
    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3E, 0x01,             // LD A, 1 (drive B: is empty)
        0x06, 0x01,             // LD B, 1
        0x11, 0x00, 0x00,       // LD DE, 0
        0x21, 0x00, 0xC0,       // LD HL, 0xC000
        0xB7,                   // OR A
        0xCD, 0x10, 0x40,       // CALL DSKIO
        0x76,                   // HALT
    ];
    let disk = DiskImage::blank(0xF8).unwrap();
    let (mut machine, start) = boot(&[
        ("DISK.ROM", &rom[..]),
        ("TEST.BIN", program),
        ("A.DSK", disk.as_bytes()),
    ]);

    machine.run_from(start).unwrap();
    let regs = machine.registers();
    assert_eq!(regs.f & FLAG_C, FLAG_C);
    assert_eq!(regs.a, 2);
    assert_eq!(regs.b, 1);
}
