use anyhow::{Context, Result};
use clap::Parser;
use emu_core::System;
use std::env;
use std::fs::File;
use std::io::Write;

#[derive(Parser)]
struct Args {
    /// System to run: "apple2"
    system: String,

    /// ROM images to load, as PATH@HEXADDR (e.g. monitor.bin@F800).
    /// May be given multiple times.
    #[arg(long = "rom")]
    roms: Vec<String>,

    /// Disk II boot ROM (256 bytes) for the slot 6 controller
    #[arg(long)]
    disk_rom: Option<String>,

    /// Disk image (.do/.dsk/.po) for drive 1
    #[arg(long)]
    disk: Option<String>,

    /// Keys to feed the keyboard latch, one per frame
    #[arg(long, default_value = "")]
    keys: String,

    /// Breakpoint addresses (hex), may be given multiple times
    #[arg(long = "breakpoint")]
    breakpoints: Vec<String>,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Dump save-state to this file as JSON
    #[arg(long, default_value = "state.json")]
    save: String,

    /// Print per-frame stop reasons and the final debug state
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Suppress all per-frame output (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Preserve env-var gated core logs (EMU_LOG_LEVEL etc.)
    #[arg(long, default_value_t = false)]
    keep_logs: bool,
}

/// Parse "path@F800" into its parts.
fn parse_rom_spec(spec: &str) -> Result<(String, u16)> {
    let (path, addr) = spec
        .rsplit_once('@')
        .with_context(|| format!("ROM spec {spec:?} is not PATH@HEXADDR"))?;
    let addr = u16::from_str_radix(addr.trim_start_matches('$'), 16)
        .with_context(|| format!("bad ROM address in {spec:?}"))?;
    Ok((path.to_string(), addr))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Core logging is useful when debugging the emulator itself but very
    // noisy; the CLI keeps it off by default. Opt back in with --keep-logs.
    if !args.keep_logs {
        env::remove_var("EMU_LOG_LEVEL");
        env::remove_var("EMU_LOG_CATEGORIES");
    }

    match args.system.as_str() {
        "apple2" => run_apple2(&args),
        other => anyhow::bail!("Unsupported system: {}", other),
    }
}

fn run_apple2(args: &Args) -> Result<()> {
    let mut sys = emu_apple2::Apple2System::standard();

    for spec in &args.roms {
        let (path, addr) = parse_rom_spec(spec)?;
        let length = std::fs::metadata(&path)
            .with_context(|| format!("failed to stat {path}"))?
            .len() as usize;
        sys.load_rom_file(&path, addr, length)
            .with_context(|| format!("failed to load ROM {path}"))?;
        log::info!("loaded {path} at {addr:#06X} ({length} bytes)");
    }

    if let Some(path) = &args.disk_rom {
        let data = std::fs::read(path).with_context(|| format!("failed to read {path}"))?;
        sys.mount("DiskRom", &data)
            .with_context(|| format!("failed to mount controller ROM {path}"))?;
    }

    if let Some(path) = &args.disk {
        sys.attach_disk_image(path)
            .with_context(|| format!("failed to attach disk image {path}"))?;
        log::info!("attached {path}");
    }

    for bp in &args.breakpoints {
        let addr = u16::from_str_radix(bp.trim_start_matches('$'), 16)
            .with_context(|| format!("bad breakpoint address {bp:?}"))?;
        sys.cpu_mut().add_breakpoint(addr);
    }

    sys.cold_reset();

    let mut keys = args.keys.bytes();
    for fnum in 1..=args.frames {
        if let Some(key) = keys.next() {
            sys.key_down(key);
        }

        let stop = sys.step_frame()?;
        if args.quiet {
            continue;
        }

        if args.debug {
            println!("Frame {fnum}: stopped with {stop:?}");
        }
        if let emu_core::StopReason::Breakpoint(addr) = stop {
            println!("Breakpoint at {addr:#06X} (frame {fnum})");
            break;
        }
    }

    if args.debug {
        println!(
            "DEBUG STATE:\n{}",
            serde_json::to_string_pretty(&sys.debug_state())?
        );
    }

    let state = sys.save_state();
    let mut f = File::create(&args.save)?;
    write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
    Ok(())
}
