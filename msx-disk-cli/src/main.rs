//! MSX disk CLI - boot disk BIOS images and inspect disk formats.
//!
//! Usage:
//!   msxdisk run [--bundle ZIP] [--bios ROM] [--disk DSK]... [--program BIN]
//!   msxdisk patch IN OUT
//!   msxdisk dpb MEDIA
//!   msxdisk format MEDIA OUT
//!
//! Examples:
//!   msxdisk run --bundle game.zip               # Bundle with manifest
//!   msxdisk run --bios DISK.ROM --disk a.dsk --program boot.bin --load-address C000
//!   msxdisk patch DISK.ROM DISK-PATCHED.ROM     # Patch a ROM for other emulators
//!   msxdisk dpb F9                              # Show the 720K DPB
//!   msxdisk format F9 blank.dsk                 # Create an empty 720K disk

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{info, LevelFilter};

use msx_disk_core::bundle::parse_address;
use msx_disk_core::drive::DRIVE_COUNT;
use msx_disk_core::driver::dpb::geometry_for_media;
use msx_disk_core::{
    load_bundle_from_path, patch_disk_bios, BiosImage, DiskImage, DiskMachine, Dpb,
    ImageDiskDrive, MemoryBus, DEFAULT_BIOS_BASE,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// MSX Disk BIOS Emulator CLI
#[derive(Parser, Debug)]
#[command(name = "msxdisk")]
#[command(about = "Run MSX disk BIOS code with host-emulated drives")]
struct Args {
    /// Enable routine and memory transfer tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Boot a bundle or loose files and run a program until HALT
    Run(RunArgs),

    /// Write a patched copy of a disk BIOS image
    Patch {
        input: PathBuf,
        output: PathBuf,

        /// Address the image is mapped at (hex)
        #[arg(long, value_parser = parse_hex)]
        base: Option<u16>,
    },

    /// Print the Disk Parameter Block for a media descriptor (hex)
    Dpb {
        #[arg(value_parser = parse_media)]
        media: u8,
    },

    /// Write a blank disk image for a media descriptor (hex)
    Format {
        #[arg(value_parser = parse_media)]
        media: u8,
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Disk bundle (ZIP with optional manifest.json)
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Disk BIOS ROM image (overrides the bundle's)
    #[arg(long)]
    bios: Option<PathBuf>,

    /// Address the BIOS is mapped at (hex)
    #[arg(long, value_parser = parse_hex)]
    base: Option<u16>,

    /// Disk images for drives A and B (replace the bundle's)
    #[arg(long = "disk")]
    disks: Vec<PathBuf>,

    /// Write-protect a drive (A or B)
    #[arg(long = "protect")]
    protect: Vec<char>,

    /// Z80 program to load and run (overrides the bundle's)
    #[arg(long)]
    program: Option<PathBuf>,

    /// Program load and start address (hex)
    #[arg(long, value_parser = parse_hex)]
    load_address: Option<u16>,

    /// Stop after this many T-states
    #[arg(long)]
    max_t_states: Option<u64>,

    /// Dump memory after the run, as ADDR:LEN (hex)
    #[arg(long = "dump", value_parser = parse_dump)]
    dumps: Vec<(u16, u16)>,

    /// Write disk images given with --disk back after the run
    #[arg(long)]
    save_disks: bool,
}

fn parse_hex(text: &str) -> Result<u16, String> {
    parse_address(text).map_err(|e| e.to_string())
}

fn parse_media(text: &str) -> Result<u8, String> {
    let media = parse_hex(text)?;
    u8::try_from(media).map_err(|_| format!("media descriptor {} out of range", text))
}

fn parse_dump(text: &str) -> Result<(u16, u16), String> {
    let (addr, len) = text
        .split_once(':')
        .ok_or_else(|| format!("expected ADDR:LEN, got '{}'", text))?;
    Ok((parse_hex(addr)?, parse_hex(len)?))
}

fn init_logging(trace: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if trace {
        builder.filter_module("msx_disk_core", LevelFilter::Trace);
    }
    builder.init();
}

fn drive_index(letter: char) -> CliResult<u8> {
    match letter.to_ascii_uppercase() {
        'A' => Ok(0),
        'B' => Ok(1),
        _ => Err(format!("Unknown drive: {}", letter).into()),
    }
}

fn print_dump(memory: &impl MemoryBus, address: u16, len: u16) {
    for row in (0..len).step_by(16) {
        let start = address.wrapping_add(row);
        let bytes: Vec<u8> = (0..16.min(len - row))
            .map(|i| memory.read(start.wrapping_add(i)))
            .collect();
        let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = bytes
            .iter()
            .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
            .collect();
        println!("{:04X}: {:<47}  {}", start, hex.join(" "), ascii);
    }
}

fn run(args: RunArgs) -> CliResult<()> {
    let bundle = args.bundle.as_ref().map(load_bundle_from_path).transpose()?;

    // BIOS: --bios wins over the bundle
    let bios = match (&args.bios, &bundle) {
        (Some(path), _) => BiosImage::load(path, args.base.unwrap_or(DEFAULT_BIOS_BASE))?,
        (None, Some(bundle)) => {
            let bios = bundle
                .bios_image()?
                .ok_or("Bundle has no BIOS image; pass --bios")?;
            match args.base {
                Some(base) => BiosImage::new(bios.bytes().to_vec(), base),
                None => bios,
            }
        }
        (None, None) => return Err("No BIOS image: pass --bios or --bundle".into()),
    };

    // Drives: --disk replaces the bundle's disks
    let mut drive = match &bundle {
        Some(bundle) if args.disks.is_empty() => bundle.build_drive()?,
        _ => ImageDiskDrive::new(),
    };
    if args.disks.len() > DRIVE_COUNT {
        return Err(format!("At most {} disks supported", DRIVE_COUNT).into());
    }
    for (index, path) in args.disks.iter().enumerate() {
        drive.insert_disk(index as u8, DiskImage::load(path)?, false)?;
    }
    for &letter in &args.protect {
        drive.set_write_protected(drive_index(letter)?, true)?;
    }

    // Program: --program wins over the bundle
    let (load_address, program) = match (&args.program, &bundle) {
        (Some(path), _) => (args.load_address.unwrap_or(0x0100), std::fs::read(path)?),
        (None, Some(bundle)) => {
            let (address, data) = bundle
                .program()?
                .ok_or("Bundle has no program; pass --program")?;
            (args.load_address.unwrap_or(address), data)
        }
        (None, None) => return Err("No program: pass --program or --bundle".into()),
    };

    let mut machine = DiskMachine::new(bios, drive)?;
    machine.t_state_limit = args.max_t_states;
    machine.load_at(load_address, &program);
    info!("Running {} bytes at {:#06X}", program.len(), load_address);

    let exit = machine.run_from(load_address)?;
    machine.power_off();

    let regs = machine.registers();
    println!(
        "Exit: {:?} at {:04X} after {} T-states, {} disk calls",
        exit.reason, exit.pc, exit.t_states, exit.traps
    );
    println!(
        "AF={:02X}{:02X} BC={:04X} DE={:04X} HL={:04X} SP={:04X}",
        regs.a,
        regs.f,
        regs.bc(),
        regs.de,
        regs.hl,
        regs.sp
    );

    for &(address, len) in &args.dumps {
        print_dump(machine.memory(), address, len);
    }

    if args.save_disks {
        for (index, path) in args.disks.iter().enumerate() {
            if let Some(image) = machine.drive().image(index as u8) {
                image.save(path)?;
                eprintln!("Saved {}", path.display());
            }
        }
    }

    Ok(())
}

fn main() -> CliResult<()> {
    let args = Args::parse();
    init_logging(args.trace);

    match args.command {
        Command::Run(run_args) => run(run_args),
        Command::Patch {
            input,
            output,
            base,
        } => {
            let mut bios = BiosImage::load(&input, base.unwrap_or(DEFAULT_BIOS_BASE))?;
            patch_disk_bios(&mut bios)?;
            bios.save(&output)?;
            eprintln!("Patched {} -> {}", input.display(), output.display());
            Ok(())
        }
        Command::Dpb { media } => {
            let dpb = Dpb::for_media(media).ok_or(format!("Unknown media: {:02X}", media))?;
            let hex: Vec<String> = dpb
                .as_bytes()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect();
            println!("DPB {:02X}: {}", media, hex.join(" "));
            println!("  sector size        {}", dpb.sector_size());
            println!("  sectors/cluster    {}", dpb.sectors_per_cluster());
            println!(
                "  FATs               {} x {} sectors from {}",
                dpb.fat_count(),
                dpb.sectors_per_fat(),
                dpb.first_fat_sector()
            );
            println!(
                "  directory          {} entries from {}",
                dpb.max_directory_entries(),
                dpb.first_directory_sector()
            );
            println!("  first data sector  {}", dpb.first_data_sector());
            println!("  highest cluster    {}", dpb.highest_cluster());
            if let Some(geometry) = geometry_for_media(media) {
                println!(
                    "  geometry           {} tracks x {} sectors x {} sides ({} sectors)",
                    geometry.tracks,
                    geometry.sectors_per_track,
                    geometry.sides,
                    geometry.total_sectors()
                );
            }
            Ok(())
        }
        Command::Format { media, output } => {
            let image = DiskImage::blank(media)?;
            image.save(&output)?;
            eprintln!(
                "Wrote {} ({} sectors, media {:02X})",
                output.display(),
                image.sector_count(),
                media
            );
            Ok(())
        }
    }
}
