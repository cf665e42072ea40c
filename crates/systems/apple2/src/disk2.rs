//! Disk II controller card.
//!
//! Sixteen soft switches at `$C080 + $10·slot` drive the stepper phases,
//! the spindle motor, drive select and the Q6/Q7 mode latches:
//!
//! ```text
//! 0/1  PHASE 0 OFF/ON          8/9  MOTOR OFF/ON
//! 2/3  PHASE 1 OFF/ON          A/B  SELECT DRIVE 1/2
//! 4/5  PHASE 2 OFF/ON          C/D  Q6 -> L/H
//! 6/7  PHASE 3 OFF/ON          E/F  Q7 -> L/H
//!
//! Q6 Q7:  LL read   HL sense write protect   LH write   HH write load
//! ```
//!
//! The card's 256-byte boot ROM shows through the slot window at
//! `$C000 + $100·slot`.

use std::path::Path;

use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::memory::{HookHandler, RawView, UNINITIALIZED_FILL};

use crate::image::{DiskImage, DiskImageError};

const ROM_SIZE: usize = 256;
pub const MAX_TRACK: u8 = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriveMode {
    Read,
    SenseWriteProtect,
    Write,
    WriteLoad,
}

/// Disk II controller state: soft-switch latches, stepper position, head
/// position and the optional mounted image.
#[derive(Debug)]
pub struct DiskII {
    slot: u8,
    rom: [u8; ROM_SIZE],
    phases: [bool; 4],
    motor_on: bool,
    drive_2_selected: bool,
    q6: bool,
    q7: bool,
    /// Coil the head is currently aligned with.
    active_phase: u8,
    /// Head position in half-track units, 0..=68.
    half_track: u8,
    /// Byte position under the head, wrapping at the track length.
    head_position: usize,
    /// Byte armed by a write-load strobe, written by the next write strobe.
    write_latch: u8,
    image: Option<DiskImage>,
}

impl DiskII {
    pub fn new(slot: u8) -> Self {
        debug_assert!(slot < 8);
        Self {
            slot,
            rom: [UNINITIALIZED_FILL; ROM_SIZE],
            phases: [false; 4],
            motor_on: false,
            drive_2_selected: false,
            q6: false,
            q7: false,
            active_phase: 0,
            half_track: 0,
            head_position: 0,
            write_latch: 0,
            image: None,
        }
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// First address of the card's I/O strobe range.
    pub fn io_base(&self) -> u16 {
        0xC080 + 0x10 * self.slot as u16
    }

    /// First address of the card's ROM window.
    pub fn rom_base(&self) -> u16 {
        0xC000 + 0x100 * self.slot as u16
    }

    /// Load the 256-byte boot ROM (the P5 PROM on the real card).
    pub fn load_rom<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let data = std::fs::read(&path)?;
        if data.len() < ROM_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "{}: controller ROM is {} bytes, need {ROM_SIZE}",
                    path.as_ref().display(),
                    data.len()
                ),
            ));
        }
        self.rom.copy_from_slice(&data[..ROM_SIZE]);
        Ok(())
    }

    pub fn set_rom(&mut self, rom: [u8; ROM_SIZE]) {
        self.rom = rom;
    }

    pub fn attach_image(&mut self, image: DiskImage) {
        self.head_position = 0;
        self.image = Some(image);
    }

    pub fn eject(&mut self) -> Option<DiskImage> {
        self.image.take()
    }

    pub fn image(&self) -> Option<&DiskImage> {
        self.image.as_ref()
    }

    pub fn image_mut(&mut self) -> Option<&mut DiskImage> {
        self.image.as_mut()
    }

    /// Attach an image file.
    pub fn attach_image_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), DiskImageError> {
        self.attach_image(DiskImage::open(path)?);
        Ok(())
    }

    /// Whole track under the head (half-track positions collapse down).
    pub fn track(&self) -> u8 {
        self.half_track / 2
    }

    pub fn head_position(&self) -> usize {
        self.head_position
    }

    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    pub fn drive_2_selected(&self) -> bool {
        self.drive_2_selected
    }

    fn mode(&self) -> DriveMode {
        match (self.q6, self.q7) {
            (false, false) => DriveMode::Read,
            (true, false) => DriveMode::SenseWriteProtect,
            (false, true) => DriveMode::Write,
            (true, true) => DriveMode::WriteLoad,
        }
    }

    /// Energize phase coil `phase`.
    ///
    /// The head moves toward the energized coil: one half-track to an
    /// adjacent coil, a whole track (two halves) to the opposite coil,
    /// inward when the coil index grows and back toward track 0 when it
    /// shrinks. Position is clamped to the [0, 34] track range.
    fn phase_on(&mut self, phase: u8) {
        self.phases[phase as usize] = true;

        let halves = match (phase + 4 - self.active_phase) & 3 {
            1 => 1,
            3 => -1,
            2 if phase > self.active_phase => 2,
            2 => -2,
            _ => 0,
        };
        self.active_phase = phase;
        if halves == 0 {
            return;
        }

        let position = (self.half_track as i16 + halves).clamp(0, MAX_TRACK as i16 * 2);
        self.half_track = position as u8;
        log(LogCategory::Disk, LogLevel::Debug, || {
            format!("drive stepped to track {}", self.track())
        });
    }

    /// Serve the nibble under the head; the head only advances while the
    /// spindle is turning.
    fn read_nibble(&mut self) -> u8 {
        let Some(image) = &self.image else {
            // No disk in the drive: the data register just reads empty.
            return 0x00;
        };
        if self.drive_2_selected {
            return 0x00;
        }
        let track = image.track((self.half_track / 2) as usize);
        let nibble = track[self.head_position % track.len()];
        if self.motor_on {
            self.head_position = (self.head_position + 1) % track.len();
        }
        nibble
    }

    /// Write the latched byte at the head position.
    fn write_nibble(&mut self) {
        let latch = self.write_latch;
        let track_index = (self.half_track / 2) as usize;
        let motor_on = self.motor_on;
        let drive_2 = self.drive_2_selected;
        let Some(image) = &mut self.image else {
            return;
        };
        if drive_2 || image.write_protected() {
            return;
        }
        let len = image.track_len(track_index);
        let position = self.head_position % len;
        image.set_nibble(track_index, position, latch);
        if motor_on {
            self.head_position = (position + 1) % len;
        }
    }

    /// One access to the card's I/O strobe range. `value` is the byte of a
    /// write access, `None` for a read.
    fn strobe(&mut self, command: u8, value: Option<u8>) -> u8 {
        match command {
            0x0 => self.phases[0] = false,
            0x1 => self.phase_on(0),
            0x2 => self.phases[1] = false,
            0x3 => self.phase_on(1),
            0x4 => self.phases[2] = false,
            0x5 => self.phase_on(2),
            0x6 => self.phases[3] = false,
            0x7 => self.phase_on(3),
            0x8 => {
                self.motor_on = false;
                log(LogCategory::Disk, LogLevel::Info, || "motor off".into());
            }
            0x9 => {
                self.motor_on = true;
                log(LogCategory::Disk, LogLevel::Info, || "motor on".into());
            }
            0xA => self.drive_2_selected = false,
            0xB => self.drive_2_selected = true,
            0xC => self.q6 = false,
            0xD => self.q6 = true,
            0xE => self.q7 = false,
            0xF => self.q7 = true,
            _ => unreachable!("strobe commands are a 4-bit decode"),
        }

        // Only the Q6/Q7 register strobes engage the data path; the phase,
        // motor and select switches just latch state.
        match self.mode() {
            DriveMode::Read if command == 0xC => self.read_nibble(),
            DriveMode::Write if command == 0xC => {
                self.write_nibble();
                0x00
            }
            DriveMode::WriteLoad if command == 0xD => {
                if let Some(byte) = value {
                    self.write_latch = byte;
                }
                0x00
            }
            DriveMode::SenseWriteProtect if command == 0xD || command == 0xE => {
                let protected = self
                    .image
                    .as_ref()
                    .is_some_and(|image| image.write_protected());
                if protected {
                    0x80
                } else {
                    0x00
                }
            }
            _ => 0x00,
        }
    }
}

impl HookHandler for DiskII {
    fn on_access(&mut self, _raw: &RawView<'_>, addr: u16, value: Option<u8>) -> Option<u8> {
        let rom_base = self.rom_base();
        if (rom_base..=rom_base + 0xFF).contains(&addr) {
            return Some(self.rom[(addr - rom_base) as usize]);
        }

        let io_base = self.io_base();
        if (io_base..=io_base + 0x0F).contains(&addr) {
            return Some(self.strobe((addr - io_base) as u8, value));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::image::{SectorOrder, IMAGE_SIZE};

    fn drive_with_disk() -> DiskII {
        let mut drive = DiskII::new(6);
        let mut data = vec![0u8; IMAGE_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 253) as u8;
        }
        drive.attach_image(DiskImage::from_bytes(&data, SectorOrder::Dos33).unwrap());
        drive
    }

    #[test]
    fn phase_sequence_steps_one_track_forward() {
        let mut drive = drive_with_disk();
        assert_eq!(drive.track(), 0);
        drive.strobe(0x3, None); // phase 1 on
        drive.strobe(0x7, None); // phase 3 on
        drive.strobe(0x2, None); // phase 1 off
        drive.strobe(0x6, None); // phase 3 off
        assert_eq!(drive.track(), 1);
    }

    #[test]
    fn track_is_clamped_at_the_rails() {
        let mut drive = drive_with_disk();
        // Walk backwards from track 0: the head stays on track 0.
        drive.strobe(0x7, None); // phase 3 on
        drive.strobe(0x3, None); // phase 1 on: step out, clamped
        assert_eq!(drive.track(), 0);

        // Seek inward the way DOS does, one half-track per adjacent coil,
        // far past the last track.
        for _ in 0..40 {
            drive.strobe(0x3, None); // phase 1
            drive.strobe(0x5, None); // phase 2
            drive.strobe(0x7, None); // phase 3
            drive.strobe(0x1, None); // phase 0
        }
        assert_eq!(drive.track(), MAX_TRACK);
    }

    #[test]
    fn ascending_phase_sequence_seeks_continuously() {
        let mut drive = drive_with_disk();
        // Two whole tracks per 1-2-3-0 revolution.
        for _ in 0..3 {
            drive.strobe(0x3, None);
            drive.strobe(0x5, None);
            drive.strobe(0x7, None);
            drive.strobe(0x1, None);
        }
        assert_eq!(drive.track(), 6);

        // And back out again.
        for _ in 0..2 {
            drive.strobe(0x7, None); // phase 3
            drive.strobe(0x5, None); // phase 2
            drive.strobe(0x3, None); // phase 1
            drive.strobe(0x1, None); // phase 0
        }
        assert_eq!(drive.track(), 2);
    }

    #[test]
    fn read_strobe_serves_nibbles_and_motor_gates_advance() {
        let mut drive = drive_with_disk();
        // Motor off: the same nibble forever.
        let first = drive.strobe(0xC, None);
        assert_eq!(drive.strobe(0xC, None), first);
        assert_eq!(drive.head_position(), 0);

        // Motor on: the head moves.
        drive.strobe(0x9, None);
        let _ = drive.strobe(0xC, None);
        assert_eq!(drive.head_position(), 1);
    }

    #[test]
    fn read_strobes_find_the_address_prologue() {
        let mut drive = drive_with_disk();
        drive.strobe(0x9, None); // motor on

        // Skip the sync lead-in; the first framing bytes are D5 AA 96.
        let mut seen = Vec::new();
        for _ in 0..codec::NIBBLES_PER_TRACK {
            let nibble = drive.strobe(0xC, None);
            if nibble != 0xFF {
                seen.push(nibble);
                if seen.len() == 3 {
                    break;
                }
            }
        }
        assert_eq!(seen, vec![0xD5, 0xAA, 0x96]);
    }

    #[test]
    fn no_disk_reads_zero() {
        let mut drive = DiskII::new(6);
        drive.strobe(0x9, None);
        assert_eq!(drive.strobe(0xC, None), 0x00);
    }

    #[test]
    fn write_protect_sense_reports_bit_seven() {
        let mut drive = drive_with_disk();
        assert_eq!(drive.strobe(0xD, None), 0x00); // Q6H, Q7L: sense
        drive.image_mut().unwrap().set_write_protect(true);
        assert_eq!(drive.strobe(0xD, None), 0x80);
        drive.strobe(0xC, None); // back to read mode
    }

    #[test]
    fn write_load_then_write_patches_the_track() {
        let mut drive = drive_with_disk();
        drive.strobe(0x9, None); // motor on

        drive.strobe(0xF, None); // Q7 high
        drive.strobe(0xD, Some(0xD5)); // write-load: latch 0xD5
        drive.strobe(0xC, None); // Q6 low -> write mode: commit at head
        assert_eq!(drive.image().unwrap().track(0)[0], 0xD5);
        assert_eq!(drive.head_position(), 1);

        drive.strobe(0xE, None); // Q7 low: back to read mode
    }

    #[test]
    fn write_protect_blocks_the_write_path() {
        let mut drive = drive_with_disk();
        drive.image_mut().unwrap().set_write_protect(true);
        drive.strobe(0x9, None);
        drive.strobe(0xF, None);
        drive.strobe(0xD, Some(0xD5));
        drive.strobe(0xC, None);
        assert_eq!(drive.image().unwrap().track(0)[0], 0xFF); // untouched sync
    }

    #[test]
    fn selecting_the_empty_second_drive_reads_zero() {
        let mut drive = drive_with_disk();
        drive.strobe(0x9, None);
        assert_ne!(drive.strobe(0xC, None), 0x00);
        drive.strobe(0xB, None); // select drive 2
        assert_eq!(drive.strobe(0xC, None), 0x00);
        drive.strobe(0xA, None); // back to drive 1
        assert_ne!(drive.strobe(0xC, None), 0x00);
    }
}
