//! Sector-ordered disk images (.do / .po) and their nibblized form.
//!
//! An image is encoded into per-track nibble buffers once when the drive
//! attaches it; the controller then serves and mutates nibbles directly.
//! `to_bytes` decodes the tracks back into a flat image for write-back.

use std::fs;
use std::path::{Path, PathBuf};

use crate::codec;

pub const TRACKS_PER_DISK: usize = 35;
pub const IMAGE_SIZE: usize = TRACKS_PER_DISK * codec::BYTES_PER_TRACK;

/// DOS 3.3 physical interleave: logical position in the image of each
/// on-disk sector number.
pub const DOS33_ORDER: [usize; 16] = [0, 7, 14, 6, 13, 5, 12, 4, 11, 3, 10, 2, 9, 1, 8, 15];
/// ProDOS interleave.
pub const PRODOS_ORDER: [usize; 16] = [0, 8, 1, 9, 2, 10, 3, 11, 4, 12, 5, 13, 6, 14, 7, 15];

/// Volume number used when the image has no catalog to take one from.
const DEFAULT_VOLUME: u8 = 0xFE;

/// Catalog sector location in a DOS 3.3 image (track $11, first sector);
/// byte 6 of it is the volume number.
const CATALOG_TRACK: usize = 0x11;
const CATALOG_VOLUME_OFFSET: usize = 0x06;

#[derive(thiserror::Error, Debug)]
pub enum DiskImageError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}: disk image is {actual} bytes, expected {IMAGE_SIZE}")]
    BadSize { path: String, actual: usize },
    #[error("{path}: unrecognized disk image extension (expected .do, .dsk or .po)")]
    UnknownFormat { path: String },
}

/// Which interleave table maps logical sectors to their physical slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorOrder {
    Dos33,
    Prodos,
}

impl SectorOrder {
    pub fn table(self) -> &'static [usize; 16] {
        match self {
            SectorOrder::Dos33 => &DOS33_ORDER,
            SectorOrder::Prodos => &PRODOS_ORDER,
        }
    }

    /// Pick the order from a file extension. `.dsk` images are DOS-ordered
    /// in practice.
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "do" | "dsk" => Some(SectorOrder::Dos33),
            "po" => Some(SectorOrder::Prodos),
            _ => None,
        }
    }
}

/// A mounted floppy: 35 nibblized tracks plus enough bookkeeping to write
/// the image back out. Track buffers keep their length for the lifetime of
/// the image; disk writes replace nibbles in place.
#[derive(Debug)]
pub struct DiskImage {
    tracks: Vec<Vec<u8>>,
    order: SectorOrder,
    volume: u8,
    write_protect: bool,
    path: Option<PathBuf>,
}

impl DiskImage {
    /// Load and nibblize a sector-ordered image file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DiskImageError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let order =
            SectorOrder::from_path(path).ok_or_else(|| DiskImageError::UnknownFormat {
                path: display.clone(),
            })?;
        let data = fs::read(path).map_err(|source| DiskImageError::Io {
            path: display.clone(),
            source,
        })?;
        if data.len() != IMAGE_SIZE {
            return Err(DiskImageError::BadSize {
                path: display,
                actual: data.len(),
            });
        }

        let mut image = Self::from_bytes(&data, order)?;
        image.path = Some(path.to_path_buf());
        Ok(image)
    }

    /// Nibblize an image already in memory.
    pub fn from_bytes(data: &[u8], order: SectorOrder) -> Result<Self, DiskImageError> {
        if data.len() != IMAGE_SIZE {
            return Err(DiskImageError::BadSize {
                path: "<memory>".into(),
                actual: data.len(),
            });
        }

        let volume = match order {
            // DOS images name their volume in the catalog VTOC.
            SectorOrder::Dos33 => data[CATALOG_TRACK * codec::BYTES_PER_TRACK + CATALOG_VOLUME_OFFSET],
            SectorOrder::Prodos => DEFAULT_VOLUME,
        };
        let volume = if volume == 0 { DEFAULT_VOLUME } else { volume };

        let tracks = (0..TRACKS_PER_DISK)
            .map(|track| {
                let offset = track * codec::BYTES_PER_TRACK;
                codec::encode_track(
                    &data[offset..offset + codec::BYTES_PER_TRACK],
                    order.table(),
                    track as u8,
                    volume,
                )
            })
            .collect();

        Ok(Self {
            tracks,
            order,
            volume,
            write_protect: false,
            path: None,
        })
    }

    pub fn order(&self) -> SectorOrder {
        self.order
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn write_protected(&self) -> bool {
        self.write_protect
    }

    pub fn set_write_protect(&mut self, protect: bool) {
        self.write_protect = protect;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn track(&self, index: usize) -> &[u8] {
        &self.tracks[index]
    }

    pub fn track_len(&self, index: usize) -> usize {
        self.tracks[index].len()
    }

    /// Replace one nibble of a track (the controller's write path).
    pub fn set_nibble(&mut self, track: usize, position: usize, nibble: u8) {
        self.tracks[track][position] = nibble;
    }

    /// Decode every track back into a flat sector-ordered image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(IMAGE_SIZE);
        for track in &self.tracks {
            data.extend_from_slice(&codec::decode_track(track, self.order.table()));
        }
        data
    }

    /// Write the image back to the file it was loaded from (or `path`).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DiskImageError> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()).map_err(|source| DiskImageError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_image() -> Vec<u8> {
        let mut data = vec![0u8; IMAGE_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = ((i / 7) ^ (i * 13)) as u8;
        }
        // Catalog volume byte.
        data[CATALOG_TRACK * codec::BYTES_PER_TRACK + CATALOG_VOLUME_OFFSET] = 0xFE;
        data
    }

    #[test]
    fn dos33_image_round_trips_byte_for_byte() {
        let data = pattern_image();
        let image = DiskImage::from_bytes(&data, SectorOrder::Dos33).unwrap();
        assert_eq!(image.to_bytes(), data);
    }

    #[test]
    fn prodos_image_round_trips_byte_for_byte() {
        let data = pattern_image();
        let image = DiskImage::from_bytes(&data, SectorOrder::Prodos).unwrap();
        assert_eq!(image.to_bytes(), data);
    }

    #[test]
    fn dos33_volume_comes_from_the_catalog() {
        let mut data = pattern_image();
        data[CATALOG_TRACK * codec::BYTES_PER_TRACK + CATALOG_VOLUME_OFFSET] = 0x7B;
        let image = DiskImage::from_bytes(&data, SectorOrder::Dos33).unwrap();
        assert_eq!(image.volume(), 0x7B);
    }

    #[test]
    fn track_buffers_have_fixed_length() {
        let image = DiskImage::from_bytes(&pattern_image(), SectorOrder::Dos33).unwrap();
        for track in 0..TRACKS_PER_DISK {
            assert_eq!(image.track_len(track), codec::NIBBLES_PER_TRACK);
        }
    }

    #[test]
    fn truncated_image_is_rejected() {
        let err = DiskImage::from_bytes(&[0u8; 1000], SectorOrder::Dos33).unwrap_err();
        assert!(matches!(err, DiskImageError::BadSize { actual: 1000, .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        use std::io::Write;
        let path = std::env::temp_dir().join("emu_apple2_image_test.nib");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 16]).unwrap();
        drop(f);

        let err = DiskImage::open(&path).unwrap_err();
        assert!(matches!(err, DiskImageError::UnknownFormat { .. }));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn open_picks_the_order_from_the_extension() {
        let data = pattern_image();
        let path = std::env::temp_dir().join("emu_apple2_open_test.do");
        fs::write(&path, &data).unwrap();

        let image = DiskImage::open(&path).unwrap();
        assert_eq!(image.order(), SectorOrder::Dos33);
        assert_eq!(image.volume(), 0xFE);
        assert_eq!(image.path(), Some(path.as_path()));
        assert_eq!(image.to_bytes(), data);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn save_writes_the_decoded_image() {
        let data = pattern_image();
        let image = DiskImage::from_bytes(&data, SectorOrder::Dos33).unwrap();
        let path = std::env::temp_dir().join("emu_apple2_save_test.do");
        image.save(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), data);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = DiskImage::open("/nonexistent/master.do").unwrap_err();
        assert!(matches!(err, DiskImageError::Io { .. }));
    }

    #[test]
    fn nibble_writes_survive_the_round_trip() {
        let data = pattern_image();
        let mut image = DiskImage::from_bytes(&data, SectorOrder::Dos33).unwrap();

        // Re-encode sector 0 of track 3 with different contents and patch
        // the nibbles in, as the controller's write path would.
        let mut sector = [0xA5u8; codec::BYTES_PER_SECTOR];
        sector[0] = 0x01;
        let nibbles = codec::six_and_two_encode(&sector);
        for (i, &nibble) in nibbles.iter().enumerate() {
            image.set_nibble(3, codec::FIRST_DATA_OFFSET + i, nibble);
        }

        let decoded = image.to_bytes();
        let offset = 3 * codec::BYTES_PER_TRACK; // physical sector 0 is logical 0
        assert_eq!(&decoded[offset..offset + codec::BYTES_PER_SECTOR], &sector);
    }
}
