//! Apple II machine built on the reusable 6502 core.
//!
//! [`Apple2System`] owns the CPU (which owns the address space), the slot
//! backplane and the keyboard latch. Peripheral cards install their memory
//! hooks once at setup; everything a frontend needs goes through this
//! struct or the [`System`] trait, so several independent machines can
//! coexist in one process.

pub mod codec;
pub mod disk2;
pub mod image;
pub mod keyboard;
pub mod language_card;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::{json, Value};

use emu_core::cpu_6502::{Cpu6502, CpuError, StatusFlags, StopReason};
use emu_core::memory::{AddressSpace, MemoryError, MemoryHook, PageMode};
use emu_core::{MountPointInfo, System};

use disk2::DiskII;
use image::{DiskImage, DiskImageError, SectorOrder};
use keyboard::KeyboardLatch;
use language_card::LanguageCard16K;

/// NTSC Apple II CPU clock.
pub const CPU_FREQUENCY_HZ: u64 = 1_020_484;
pub const FRAMES_PER_SECOND: u64 = 60;
/// Cycles executed per call to `step_frame`.
pub const CYCLES_PER_FRAME: u64 = CPU_FREQUENCY_HZ / FRAMES_PER_SECOND;

#[derive(thiserror::Error, Debug)]
pub enum Apple2Error {
    #[error("CPU halted: {0}")]
    Cpu(#[from] CpuError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Disk(#[from] DiskImageError),
    #[error("slot {0} already holds a card")]
    SlotOccupied(usize),
    #[error("no Disk II controller is installed")]
    NoController,
    #[error("unknown mount point {0:?}")]
    UnknownMountPoint(String),
    #[error("{id}: expected {expected} bytes, got {actual}")]
    BadMountData {
        id: String,
        expected: usize,
        actual: usize,
    },
}

/// A backplane slot: statically-typed card dispatch instead of downcasts.
#[derive(Debug, Default)]
pub enum SlotCard {
    #[default]
    Empty,
    DiskII(Rc<RefCell<DiskII>>),
    LanguageCard(Rc<RefCell<LanguageCard16K>>),
}

/// Registers restored by `load_state`.
#[derive(Deserialize)]
struct CpuState {
    a: u8,
    x: u8,
    y: u8,
    sp: u8,
    pc: u16,
    flags: StatusFlags,
    cycles: u64,
}

pub struct Apple2System {
    cpu: Cpu6502,
    slots: [SlotCard; 8],
    keyboard: Rc<RefCell<KeyboardLatch>>,
    mounted: BTreeSet<String>,
}

impl Apple2System {
    /// A bare 48K machine: RAM below `$C000`, unmapped I/O page row, ROM
    /// above `$D000`, keyboard latch installed. No cards.
    pub fn new() -> Self {
        let mut memory = AddressSpace::new();
        memory.set_page_modes(0x00, 0xBF, PageMode::ReadWrite);
        memory.set_page_modes(0xC0, 0xCF, PageMode::Unmapped);
        memory.set_page_modes(0xD0, 0xFF, PageMode::ReadOnly);

        let mut cpu = Cpu6502::new(memory);

        let keyboard = Rc::new(RefCell::new(KeyboardLatch::new()));
        cpu.memory.install_read_hook(MemoryHook::new(
            keyboard::KEYBOARD_DATA,
            keyboard::KEYBOARD_DATA,
            false,
            keyboard.clone(),
        ));
        cpu.memory.install_read_hook(MemoryHook::new(
            keyboard::KEYBOARD_STROBE,
            keyboard::KEYBOARD_STROBE,
            false,
            keyboard.clone(),
        ));
        cpu.memory.install_write_hook(MemoryHook::new(
            keyboard::KEYBOARD_STROBE,
            keyboard::KEYBOARD_STROBE,
            false,
            keyboard.clone(),
        ));

        Self {
            cpu,
            slots: std::array::from_fn(|_| SlotCard::Empty),
            keyboard,
            mounted: BTreeSet::new(),
        }
    }

    /// The historical configuration: language card in slot 0, Disk II
    /// controller in slot 6.
    pub fn standard() -> Self {
        let mut system = Self::new();
        system
            .install_language_card(0)
            .expect("slot 0 is free on a new machine");
        system
            .install_disk_ii(6)
            .expect("slot 6 is free on a new machine");
        system
    }

    /// Install a Disk II controller. Its ROM window and I/O strobe hooks
    /// are appended now; install order across cards is dispatch priority.
    pub fn install_disk_ii(&mut self, slot: usize) -> Result<Rc<RefCell<DiskII>>, Apple2Error> {
        if !matches!(self.slots[slot], SlotCard::Empty) {
            return Err(Apple2Error::SlotOccupied(slot));
        }

        let card = Rc::new(RefCell::new(DiskII::new(slot as u8)));
        let (rom_base, io_base) = {
            let card = card.borrow();
            (card.rom_base(), card.io_base())
        };

        let memory = &mut self.cpu.memory;
        memory.install_read_hook(MemoryHook::new(rom_base, rom_base + 0xFF, false, card.clone()));
        memory.install_read_hook(MemoryHook::new(io_base, io_base + 0x0F, false, card.clone()));
        memory.install_write_hook(MemoryHook::new(io_base, io_base + 0x0F, false, card.clone()));

        self.slots[slot] = SlotCard::DiskII(card.clone());
        Ok(card)
    }

    /// Install a 16K language card: bank-switch strobes, status switches
    /// and the `$D000-$FFFF` overlay.
    pub fn install_language_card(
        &mut self,
        slot: usize,
    ) -> Result<Rc<RefCell<LanguageCard16K>>, Apple2Error> {
        if !matches!(self.slots[slot], SlotCard::Empty) {
            return Err(Apple2Error::SlotOccupied(slot));
        }

        let card = Rc::new(RefCell::new(LanguageCard16K::new(slot as u8)));
        let (status_base, io_base) = {
            let card = card.borrow();
            (card.status_base(), card.io_base())
        };

        let memory = &mut self.cpu.memory;
        memory.install_read_hook(MemoryHook::new(
            status_base,
            status_base + 1,
            false,
            card.clone(),
        ));
        memory.install_read_hook(MemoryHook::new(io_base, io_base + 0x0F, false, card.clone()));
        memory.install_write_hook(MemoryHook::new(io_base, io_base + 0x0F, false, card.clone()));
        memory.install_read_hook(MemoryHook::new(0xD000, 0xFFFF, false, card.clone()));
        memory.install_write_hook(MemoryHook::new(0xD000, 0xFFFF, false, card.clone()));

        self.slots[slot] = SlotCard::LanguageCard(card.clone());
        Ok(card)
    }

    /// First Disk II controller on the backplane.
    pub fn disk_controller(&self) -> Option<Rc<RefCell<DiskII>>> {
        self.slots.iter().find_map(|slot| match slot {
            SlotCard::DiskII(card) => Some(card.clone()),
            _ => None,
        })
    }

    pub fn language_card(&self) -> Option<Rc<RefCell<LanguageCard16K>>> {
        self.slots.iter().find_map(|slot| match slot {
            SlotCard::LanguageCard(card) => Some(card.clone()),
            _ => None,
        })
    }

    /// Attach a disk image file to the first drive.
    pub fn attach_disk_image<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Apple2Error> {
        let controller = self.disk_controller().ok_or(Apple2Error::NoController)?;
        controller.borrow_mut().attach_image_path(path)?;
        self.mounted.insert("Disk1".to_string());
        Ok(())
    }

    /// Copy a ROM file into the address space.
    pub fn load_rom_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        offset: u16,
        length: usize,
    ) -> Result<(), Apple2Error> {
        self.cpu.memory.load_binary(path, offset, length)?;
        Ok(())
    }

    /// Deliver a key press into the keyboard latch. Call between frames,
    /// never from another thread while a batch is running.
    pub fn key_down(&mut self, ascii: u8) {
        self.keyboard.borrow_mut().press(ascii);
    }

    pub fn cpu(&self) -> &Cpu6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu6502 {
        &mut self.cpu
    }

    /// Read through the bus, `bypass_hooks` for trusted consumers like a
    /// video renderer scanning text pages.
    pub fn read_byte(&self, addr: u16, bypass_hooks: bool) -> u8 {
        self.cpu.memory.read_byte(addr, bypass_hooks)
    }

    pub fn write_byte(&mut self, addr: u16, value: u8, bypass_hooks: bool) {
        self.cpu.memory.write_byte(addr, value, bypass_hooks);
    }

    /// Run an arbitrary cycle batch (the `step_frame` path uses one frame).
    pub fn run_batch(&mut self, cycle_budget: u64) -> Result<StopReason, Apple2Error> {
        Ok(self.cpu.run_batch(cycle_budget)?)
    }

    /// Execution state snapshot for debugger frontends.
    pub fn debug_state(&self) -> Value {
        let drive = self.disk_controller().map(|card| {
            let card = card.borrow();
            json!({
                "slot": card.slot(),
                "track": card.track(),
                "head_position": card.head_position(),
                "motor_on": card.motor_on(),
                "has_disk": card.image().is_some(),
            })
        });
        let language_card = self.language_card().map(|card| {
            let card = card.borrow();
            json!({
                "slot": card.slot(),
                "read_ram": card.read_ram(),
                "write_ram": card.write_ram(),
                "bank1": card.bank1(),
            })
        });

        json!({
            "cpu": {
                "a": self.cpu.a,
                "x": self.cpu.x,
                "y": self.cpu.y,
                "sp": self.cpu.sp,
                "pc": self.cpu.pc,
                "status": self.cpu.flags.as_byte(),
                "cycles": self.cpu.cycles,
            },
            "vectors": {
                "nmi": self.cpu.memory.read_word(emu_core::cpu_6502::NMI_VECTOR),
                "reset": self.cpu.memory.read_word(emu_core::cpu_6502::RESET_VECTOR),
                "irq": self.cpu.memory.read_word(emu_core::cpu_6502::IRQ_VECTOR),
            },
            "drive": drive,
            "language_card": language_card,
        })
    }

    fn mount_rom(&mut self, id: &str, offset: u16, expected: usize, data: &[u8]) -> Result<(), Apple2Error> {
        if data.len() != expected {
            return Err(Apple2Error::BadMountData {
                id: id.to_string(),
                expected,
                actual: data.len(),
            });
        }
        self.cpu.memory.load_bytes(offset, data)?;
        self.mounted.insert(id.to_string());
        Ok(())
    }
}

impl Default for Apple2System {
    fn default() -> Self {
        Self::standard()
    }
}

impl System for Apple2System {
    type Error = Apple2Error;

    fn reset(&mut self) {
        self.cpu.reset();
    }

    fn cold_reset(&mut self) {
        self.cpu.cold_reset();
    }

    fn step_frame(&mut self) -> Result<StopReason, Self::Error> {
        self.run_batch(CYCLES_PER_FRAME)
    }

    fn save_state(&self) -> Value {
        let mut state = json!({
            "system": "apple2",
            "version": 1,
            "cpu": {
                "a": self.cpu.a,
                "x": self.cpu.x,
                "y": self.cpu.y,
                "sp": self.cpu.sp,
                "pc": self.cpu.pc,
                "flags": self.cpu.flags,
                "cycles": self.cpu.cycles,
            },
        });

        if let Some(card) = self.disk_controller() {
            let card = card.borrow();
            state["drive"] = json!({
                "track": card.track(),
                "head_position": card.head_position(),
                "motor_on": card.motor_on(),
            });
        }
        if let Some(card) = self.language_card() {
            let card = card.borrow();
            state["language_card"] = json!({
                "read_ram": card.read_ram(),
                "write_ram": card.write_ram(),
                "bank1": card.bank1(),
            });
        }

        state
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let state: CpuState = serde_json::from_value(v["cpu"].clone())?;
        self.cpu.a = state.a;
        self.cpu.x = state.x;
        self.cpu.y = state.y;
        self.cpu.sp = state.sp;
        self.cpu.pc = state.pc;
        self.cpu.flags = state.flags;
        self.cpu.cycles = state.cycles;
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        let mut points = vec![
            MountPointInfo {
                id: "RomE0".to_string(),
                name: "BASIC ROM $E000".to_string(),
                extensions: vec!["bin".to_string(), "rom".to_string()],
                required: false,
            },
            MountPointInfo {
                id: "RomE8".to_string(),
                name: "BASIC ROM $E800".to_string(),
                extensions: vec!["bin".to_string(), "rom".to_string()],
                required: false,
            },
            MountPointInfo {
                id: "RomF0".to_string(),
                name: "BASIC ROM $F000".to_string(),
                extensions: vec!["bin".to_string(), "rom".to_string()],
                required: false,
            },
            MountPointInfo {
                id: "RomF8".to_string(),
                name: "Monitor ROM $F800".to_string(),
                extensions: vec!["bin".to_string(), "rom".to_string()],
                required: true,
            },
        ];
        if self.disk_controller().is_some() {
            points.push(MountPointInfo {
                id: "DiskRom".to_string(),
                name: "Disk II boot ROM".to_string(),
                extensions: vec!["bin".to_string(), "rom".to_string()],
                required: false,
            });
            points.push(MountPointInfo {
                id: "Disk1".to_string(),
                name: "Disk drive 1".to_string(),
                extensions: vec!["do".to_string(), "dsk".to_string(), "po".to_string()],
                required: false,
            });
        }
        points
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        match mount_point_id {
            "RomE0" => self.mount_rom("RomE0", 0xE000, 0x800, data),
            "RomE8" => self.mount_rom("RomE8", 0xE800, 0x800, data),
            "RomF0" => self.mount_rom("RomF0", 0xF000, 0x800, data),
            "RomF8" => self.mount_rom("RomF8", 0xF800, 0x800, data),
            "DiskRom" => {
                let controller = self.disk_controller().ok_or(Apple2Error::NoController)?;
                if data.len() != 256 {
                    return Err(Apple2Error::BadMountData {
                        id: mount_point_id.to_string(),
                        expected: 256,
                        actual: data.len(),
                    });
                }
                let mut rom = [0u8; 256];
                rom.copy_from_slice(data);
                controller.borrow_mut().set_rom(rom);
                self.mounted.insert(mount_point_id.to_string());
                Ok(())
            }
            "Disk1" => {
                // Raw byte mounts carry no filename, so assume DOS order;
                // use `attach_disk_image` for extension-driven selection.
                let controller = self.disk_controller().ok_or(Apple2Error::NoController)?;
                let image = DiskImage::from_bytes(data, SectorOrder::Dos33)?;
                controller.borrow_mut().attach_image(image);
                self.mounted.insert(mount_point_id.to_string());
                Ok(())
            }
            other => Err(Apple2Error::UnknownMountPoint(other.to_string())),
        }
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        match mount_point_id {
            "RomE0" => self.cpu.memory.load_bytes(0xE000, &[0xCC; 0x800])?,
            "RomE8" => self.cpu.memory.load_bytes(0xE800, &[0xCC; 0x800])?,
            "RomF0" => self.cpu.memory.load_bytes(0xF000, &[0xCC; 0x800])?,
            "RomF8" => self.cpu.memory.load_bytes(0xF800, &[0xCC; 0x800])?,
            "DiskRom" => {
                let controller = self.disk_controller().ok_or(Apple2Error::NoController)?;
                controller.borrow_mut().set_rom([0xCC; 256]);
            }
            "Disk1" => {
                let controller = self.disk_controller().ok_or(Apple2Error::NoController)?;
                controller.borrow_mut().eject();
            }
            other => return Err(Apple2Error::UnknownMountPoint(other.to_string())),
        }
        self.mounted.remove(mount_point_id);
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        self.mounted.contains(mount_point_id)
    }
}
