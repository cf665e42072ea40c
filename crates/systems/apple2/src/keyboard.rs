//! Keyboard latch soft switches.
//!
//! `$C000` reads the latch: bit 7 is the key strobe, the low bits the
//! ASCII code of the last key. Touching `$C010` (read or write) clears the
//! strobe. Key events are injected from outside the stepping loop via
//! [`KeyboardLatch::press`], never concurrently with it.

use emu_core::memory::{HookHandler, RawView};

pub const KEYBOARD_DATA: u16 = 0xC000;
pub const KEYBOARD_STROBE: u16 = 0xC010;

#[derive(Debug, Default)]
pub struct KeyboardLatch {
    latch: u8,
}

impl KeyboardLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a key: ASCII in the low bits, strobe bit set.
    pub fn press(&mut self, ascii: u8) {
        self.latch = ascii | 0x80;
    }

    pub fn value(&self) -> u8 {
        self.latch
    }

    pub fn strobe_set(&self) -> bool {
        self.latch & 0x80 != 0
    }
}

impl HookHandler for KeyboardLatch {
    fn on_access(&mut self, _raw: &RawView<'_>, addr: u16, _value: Option<u8>) -> Option<u8> {
        match addr {
            KEYBOARD_DATA => Some(self.latch),
            KEYBOARD_STROBE => {
                let before = self.latch;
                self.latch &= 0x7F;
                Some(before)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(latch: &mut KeyboardLatch, addr: u16) -> Option<u8> {
        let mem = emu_core::memory::AddressSpace::new();
        latch.on_access(&mem.raw(), addr, None)
    }

    #[test]
    fn press_sets_strobe_and_code() {
        let mut kb = KeyboardLatch::new();
        kb.press(b'A');
        assert_eq!(access(&mut kb, KEYBOARD_DATA), Some(0xC1));
        // Reading the data register does not clear the strobe.
        assert!(kb.strobe_set());
    }

    #[test]
    fn strobe_switch_clears_bit_seven() {
        let mut kb = KeyboardLatch::new();
        kb.press(b'A');
        assert_eq!(access(&mut kb, KEYBOARD_STROBE), Some(0xC1));
        assert!(!kb.strobe_set());
        assert_eq!(access(&mut kb, KEYBOARD_DATA), Some(0x41));
    }
}
