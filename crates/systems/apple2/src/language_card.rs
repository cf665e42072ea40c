//! 16K RAM "language card".
//!
//! The card shadows the $D000-$FFFF ROM region with RAM: 8K at
//! $E000-$FFFF plus two 4K banks that alternate at $D000-$DFFF. Sixteen
//! soft switches at `$C080 + $10·slot` select what reads return, whether
//! writes land in card RAM, and which $D000 bank is active. Write enable
//! arms only after the same odd switch is touched twice in a row.

use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::memory::{HookHandler, RawView, UNINITIALIZED_FILL};

const RAM_SIZE: usize = 16 * 1024;

/// Card RAM layout: bank 1 of $D000 at 0x0000, bank 2 at 0x1000, the
/// $E000-$FFFF region at 0x2000.
const BANK1_BASE: usize = 0x0000;
const BANK2_BASE: usize = 0x1000;
const HIGH_BASE: usize = 0x2000;

#[derive(Debug)]
pub struct LanguageCard16K {
    slot: u8,
    /// Reads of $D000-$FFFF come from card RAM instead of ROM.
    read_ram: bool,
    /// Writes of $D000-$FFFF land in card RAM.
    write_ram: bool,
    /// Bank 1 (instead of bank 2) is mapped at $D000-$DFFF.
    bank1: bool,
    /// Switch seen by the previous $C08x access, for the arming rule.
    last_switch: u8,
    ram: Box<[u8; RAM_SIZE]>,
}

impl LanguageCard16K {
    pub fn new(slot: u8) -> Self {
        debug_assert!(slot < 8);
        Self {
            slot,
            read_ram: false,
            write_ram: false,
            bank1: false,
            last_switch: 0xFF,
            ram: Box::new([UNINITIALIZED_FILL; RAM_SIZE]),
        }
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn io_base(&self) -> u16 {
        0xC080 + 0x10 * self.slot as u16
    }

    /// Soft switches reporting the current mapping: `$C011` reads bank
    /// state, `$C012` reads whether RAM is being read.
    pub fn status_base(&self) -> u16 {
        0xC011 + 0x10 * self.slot as u16
    }

    pub fn read_ram(&self) -> bool {
        self.read_ram
    }

    pub fn write_ram(&self) -> bool {
        self.write_ram
    }

    pub fn bank1(&self) -> bool {
        self.bank1
    }

    /// RAM offset for an address in $D000-$FFFF under the current bank.
    fn ram_offset(&self, addr: u16) -> usize {
        if addr >= 0xE000 {
            HIGH_BASE + (addr as usize - 0xE000)
        } else if self.bank1 {
            BANK1_BASE + (addr as usize - 0xD000)
        } else {
            BANK2_BASE + (addr as usize - 0xD000)
        }
    }

    /// Decode one $C08x access.
    ///
    /// Low two bits pick the read/write mapping (00 read RAM, 01 read ROM
    /// + arm write, 10 read ROM, 11 read RAM + arm write); bit 3 picks the
    /// $D000 bank. Odd switches enable writing only when the previous
    /// access hit the same switch; even switches disarm it.
    fn select(&mut self, switch: u8) {
        self.bank1 = switch & 0x08 != 0;
        self.read_ram = matches!(switch & 0x03, 0x00 | 0x03);
        if switch & 0x01 == 0 {
            self.write_ram = false;
        } else if self.last_switch == switch {
            self.write_ram = true;
        }
        self.last_switch = switch;

        log(LogCategory::SoftSwitch, LogLevel::Debug, || {
            format!(
                "LC: switch {switch:#03X} -> {}{} d000={}",
                if self.read_ram { "R" } else { "x" },
                if self.write_ram { "W" } else { "x" },
                if self.bank1 { "bank1" } else { "bank2" },
            )
        });
    }

    fn handle(&mut self, addr: u16, value: Option<u8>) -> Option<u8> {
        let io_base = self.io_base();
        if (io_base..=io_base + 0x0F).contains(&addr) {
            self.select((addr - io_base) as u8);
            return Some(0x00);
        }

        let status_base = self.status_base();
        if addr == status_base {
            return Some(if self.bank1 { 0x80 } else { 0x00 });
        }
        if addr == status_base + 1 {
            return Some(if self.read_ram { 0x80 } else { 0x00 });
        }

        if (0xD000..=0xFFFF).contains(&addr) {
            return match value {
                // Read: serve card RAM when mapped, else fall through to
                // the ROM in the backing array.
                None => self.read_ram.then(|| self.ram[self.ram_offset(addr)]),
                Some(byte) => {
                    if self.write_ram {
                        let offset = self.ram_offset(addr);
                        self.ram[offset] = byte;
                    }
                    // The write never reaches the ROM either way.
                    None
                }
            };
        }

        None
    }
}

impl HookHandler for LanguageCard16K {
    fn on_access(&mut self, _raw: &RawView<'_>, addr: u16, value: Option<u8>) -> Option<u8> {
        self.handle(addr, value)
    }
}
