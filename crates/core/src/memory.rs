//! Byte-addressable 64KiB address space with memory-mapped peripheral hooks.
//!
//! Peripherals install [`MemoryHook`]s over the address ranges they decode.
//! Hooks are consulted in installation order on every access; the first
//! non-bypass hook that satisfies an access short-circuits the backing
//! array. Installation order therefore *is* the dispatch priority, which is
//! how overlapping windows (a bank switch sitting on top of ROM, say) are
//! disambiguated.

use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub const MEMORY_SIZE: usize = 0x10000;
pub const PAGE_SIZE: usize = 0x100;
pub const PAGE_COUNT: usize = MEMORY_SIZE / PAGE_SIZE;

/// Fill pattern for bytes no binary was ever loaded into. 0xCC makes reads
/// of uninitialized memory stand out in traces instead of blending in as 0.
pub const UNINITIALIZED_FILL: u8 = 0xCC;

/// Access behavior of one 256-byte page when no hook claims the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageMode {
    /// Plain RAM.
    ReadWrite,
    /// ROM: reads hit the backing array, writes are discarded.
    ReadOnly,
    /// Nothing decodes here: reads return 0x00, writes are discarded.
    Unmapped,
}

#[derive(thiserror::Error, Debug)]
pub enum MemoryError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("{path} holds {actual} bytes but {needed} were requested")]
    ShortFile {
        path: String,
        needed: usize,
        actual: usize,
    },
    #[error("load of {length} bytes at {offset:#06X} runs past the end of the address space")]
    OutOfRange { offset: u16, length: usize },
}

/// Hook-free view of the backing array, handed to hook handlers that need
/// to re-enter memory (e.g. a bank switch serving the ROM underneath its
/// own window). Honors page modes but never dispatches hooks.
pub struct RawView<'a> {
    ram: &'a [u8; MEMORY_SIZE],
    pages: &'a [PageMode; PAGE_COUNT],
}

impl RawView<'_> {
    pub fn read(&self, addr: u16) -> u8 {
        match self.pages[addr as usize / PAGE_SIZE] {
            PageMode::Unmapped => 0x00,
            _ => self.ram[addr as usize],
        }
    }
}

/// Behavior attached to a range of addresses.
///
/// `value` is `None` for a read access and `Some(byte)` for a write. The
/// return value is the byte driven onto the bus for a read; handlers that
/// exist only for their side effects return `None` and the scan continues.
pub trait HookHandler {
    fn on_access(&mut self, raw: &RawView<'_>, addr: u16, value: Option<u8>) -> Option<u8>;
}

/// An installable intercept over an inclusive address range.
///
/// With `bypass` set the handler only observes the access: the scan keeps
/// going and the backing array still serves it. Without `bypass` the hook
/// owns the access (for reads, provided its handler produces a byte).
pub struct MemoryHook {
    start: u16,
    end: u16,
    bypass: bool,
    handler: Rc<RefCell<dyn HookHandler>>,
}

impl MemoryHook {
    pub fn new(start: u16, end: u16, bypass: bool, handler: Rc<RefCell<dyn HookHandler>>) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            end,
            bypass,
            handler,
        }
    }

    #[inline]
    pub fn matches(&self, addr: u16) -> bool {
        self.start <= addr && addr <= self.end
    }
}

impl std::fmt::Debug for MemoryHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHook")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("bypass", &self.bypass)
            .finish()
    }
}

/// The machine's 64KiB address space: backing array, per-page access modes
/// and the ordered read/write hook lists.
#[derive(Debug)]
pub struct AddressSpace {
    ram: Box<[u8; MEMORY_SIZE]>,
    pages: [PageMode; PAGE_COUNT],
    read_hooks: Vec<MemoryHook>,
    write_hooks: Vec<MemoryHook>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self {
            ram: Box::new([UNINITIALIZED_FILL; MEMORY_SIZE]),
            pages: [PageMode::ReadWrite; PAGE_COUNT],
            read_hooks: Vec::new(),
            write_hooks: Vec::new(),
        }
    }

    /// Set the mode of every page in `first..=last`.
    pub fn set_page_modes(&mut self, first: u8, last: u8, mode: PageMode) {
        for page in first..=last {
            self.pages[page as usize] = mode;
        }
    }

    pub fn page_mode(&self, addr: u16) -> PageMode {
        self.pages[addr as usize / PAGE_SIZE]
    }

    /// Append a read hook. Installation order is dispatch priority.
    pub fn install_read_hook(&mut self, hook: MemoryHook) {
        self.read_hooks.push(hook);
    }

    /// Append a write hook. Installation order is dispatch priority.
    pub fn install_write_hook(&mut self, hook: MemoryHook) {
        self.write_hooks.push(hook);
    }

    fn raw_view(&self) -> RawView<'_> {
        RawView {
            ram: &self.ram,
            pages: &self.pages,
        }
    }

    pub fn read_byte(&self, addr: u16, bypass_hooks: bool) -> u8 {
        if !bypass_hooks {
            let raw = self.raw_view();
            for hook in &self.read_hooks {
                if !hook.matches(addr) {
                    continue;
                }
                let result = hook.handler.borrow_mut().on_access(&raw, addr, None);
                if !hook.bypass {
                    if let Some(value) = result {
                        return value;
                    }
                }
            }
        }

        match self.pages[addr as usize / PAGE_SIZE] {
            PageMode::Unmapped => 0x00,
            _ => self.ram[addr as usize],
        }
    }

    pub fn write_byte(&mut self, addr: u16, value: u8, bypass_hooks: bool) {
        if !bypass_hooks {
            let raw = self.raw_view();
            for hook in &self.write_hooks {
                if !hook.matches(addr) {
                    continue;
                }
                hook.handler.borrow_mut().on_access(&raw, addr, Some(value));
                if !hook.bypass {
                    // The hook consumed the write.
                    return;
                }
            }
        }

        if self.pages[addr as usize / PAGE_SIZE] == PageMode::ReadWrite {
            self.ram[addr as usize] = value;
        }
    }

    /// Little-endian 16-bit read, bypassing hooks (used for vectors).
    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr, true) as u16;
        let hi = self.read_byte(addr.wrapping_add(1), true) as u16;
        (hi << 8) | lo
    }

    /// Copy exactly `length` bytes of `path` into the backing array at
    /// `offset`. Fails loudly on a missing or short file; bytes outside any
    /// load keep the 0xCC fill so stale reads are recognizable.
    pub fn load_binary<P: AsRef<Path>>(
        &mut self,
        path: P,
        offset: u16,
        length: usize,
    ) -> Result<(), MemoryError> {
        let display = path.as_ref().display().to_string();
        let end = offset as usize + length;
        if end > MEMORY_SIZE {
            return Err(MemoryError::OutOfRange { offset, length });
        }

        let mut file = File::open(&path).map_err(|source| MemoryError::Open {
            path: display.clone(),
            source,
        })?;
        let mut data = vec![0u8; length];
        let mut filled = 0usize;
        while filled < length {
            let n = file
                .read(&mut data[filled..])
                .map_err(|source| MemoryError::Read {
                    path: display.clone(),
                    source,
                })?;
            if n == 0 {
                return Err(MemoryError::ShortFile {
                    path: display,
                    needed: length,
                    actual: filled,
                });
            }
            filled += n;
        }

        self.ram[offset as usize..end].copy_from_slice(&data);
        Ok(())
    }

    /// Copy a byte slice into the backing array (ROM images already in
    /// memory, test fixtures). Same bounds rule as [`Self::load_binary`].
    pub fn load_bytes(&mut self, offset: u16, data: &[u8]) -> Result<(), MemoryError> {
        let end = offset as usize + data.len();
        if end > MEMORY_SIZE {
            return Err(MemoryError::OutOfRange {
                offset,
                length: data.len(),
            });
        }
        self.ram[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    /// Direct view for trusted internal consumers (debugger, tests).
    pub fn raw(&self) -> RawView<'_> {
        self.raw_view()
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHook {
        hits: usize,
        serve: Option<u8>,
    }

    impl HookHandler for CountingHook {
        fn on_access(&mut self, _raw: &RawView<'_>, _addr: u16, _value: Option<u8>) -> Option<u8> {
            self.hits += 1;
            self.serve
        }
    }

    #[test]
    fn fresh_memory_reads_fill_pattern() {
        let mem = AddressSpace::new();
        assert_eq!(mem.read_byte(0x1234, false), UNINITIALIZED_FILL);
    }

    #[test]
    fn unmapped_pages_read_zero_and_drop_writes() {
        let mut mem = AddressSpace::new();
        mem.set_page_modes(0x20, 0x20, PageMode::Unmapped);
        mem.write_byte(0x2010, 0x55, false);
        assert_eq!(mem.read_byte(0x2010, false), 0x00);
    }

    #[test]
    fn read_only_pages_drop_writes() {
        let mut mem = AddressSpace::new();
        mem.load_bytes(0xD000, &[0xA5]).unwrap();
        mem.set_page_modes(0xD0, 0xD0, PageMode::ReadOnly);
        mem.write_byte(0xD000, 0x00, false);
        assert_eq!(mem.read_byte(0xD000, false), 0xA5);
    }

    #[test]
    fn first_registered_hook_wins_on_overlap() {
        let mut mem = AddressSpace::new();
        let first = Rc::new(RefCell::new(CountingHook {
            hits: 0,
            serve: Some(0x11),
        }));
        let second = Rc::new(RefCell::new(CountingHook {
            hits: 0,
            serve: Some(0x22),
        }));
        mem.install_read_hook(MemoryHook::new(0xC000, 0xC0FF, false, first.clone()));
        mem.install_read_hook(MemoryHook::new(0xC000, 0xC0FF, false, second.clone()));

        assert_eq!(mem.read_byte(0xC080, false), 0x11);
        assert_eq!(first.borrow().hits, 1);
        // Short-circuited before the second hook and the backing array.
        assert_eq!(second.borrow().hits, 0);
    }

    #[test]
    fn bypass_hook_observes_without_satisfying() {
        let mut mem = AddressSpace::new();
        let watcher = Rc::new(RefCell::new(CountingHook {
            hits: 0,
            serve: Some(0x99),
        }));
        mem.install_read_hook(MemoryHook::new(0x0000, 0xFFFF, true, watcher.clone()));
        mem.load_bytes(0x0300, &[0x42]).unwrap();

        assert_eq!(mem.read_byte(0x0300, false), 0x42);
        assert_eq!(watcher.borrow().hits, 1);
    }

    #[test]
    fn side_effect_hook_falls_through_to_backing_array() {
        let mut mem = AddressSpace::new();
        let soft_switch = Rc::new(RefCell::new(CountingHook {
            hits: 0,
            serve: None,
        }));
        mem.install_read_hook(MemoryHook::new(0x0300, 0x0300, false, soft_switch.clone()));
        mem.load_bytes(0x0300, &[0x7F]).unwrap();

        assert_eq!(mem.read_byte(0x0300, false), 0x7F);
        assert_eq!(soft_switch.borrow().hits, 1);
    }

    #[test]
    fn write_hook_consumes_the_store() {
        let mut mem = AddressSpace::new();
        let hook = Rc::new(RefCell::new(CountingHook {
            hits: 0,
            serve: None,
        }));
        mem.load_bytes(0x0400, &[0x00]).unwrap();
        mem.install_write_hook(MemoryHook::new(0x0400, 0x0400, false, hook.clone()));

        mem.write_byte(0x0400, 0xEE, false);
        assert_eq!(hook.borrow().hits, 1);
        assert_eq!(mem.read_byte(0x0400, false), 0x00);
    }

    #[test]
    fn bypass_flag_skips_hooks_entirely() {
        let mut mem = AddressSpace::new();
        let hook = Rc::new(RefCell::new(CountingHook {
            hits: 0,
            serve: Some(0xAB),
        }));
        mem.install_read_hook(MemoryHook::new(0x0000, 0xFFFF, false, hook.clone()));
        mem.load_bytes(0x2000, &[0x5A]).unwrap();

        assert_eq!(mem.read_byte(0x2000, true), 0x5A);
        assert_eq!(hook.borrow().hits, 0);
    }

    #[test]
    fn load_binary_missing_file_is_an_error() {
        let mut mem = AddressSpace::new();
        let err = mem
            .load_binary("/nonexistent/rom.bin", 0xF800, 0x800)
            .unwrap_err();
        assert!(matches!(err, MemoryError::Open { .. }));
    }

    #[test]
    fn load_binary_short_file_is_an_error() {
        use std::io::Write;
        let dir = std::env::temp_dir();
        let path = dir.join("emu_core_short_rom_test.bin");
        let mut f = File::create(&path).unwrap();
        f.write_all(&[0u8; 16]).unwrap();
        drop(f);

        let mut mem = AddressSpace::new();
        let err = mem.load_binary(&path, 0x0000, 32).unwrap_err();
        assert!(matches!(err, MemoryError::ShortFile { actual: 16, .. }));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_past_end_of_address_space_is_rejected() {
        let mut mem = AddressSpace::new();
        let err = mem.load_bytes(0xFFF0, &[0u8; 0x20]).unwrap_err();
        assert!(matches!(err, MemoryError::OutOfRange { .. }));
    }

    #[test]
    fn read_word_is_little_endian() {
        let mut mem = AddressSpace::new();
        mem.load_bytes(0xFFFC, &[0x00, 0xFF]).unwrap();
        assert_eq!(mem.read_word(0xFFFC), 0xFF00);
    }
}
