//! GCR nibble codec for 5.25" disk images.
//!
//! A sector-ordered image is turned into the byte stream the drive head
//! actually sees: each 256-byte sector becomes a 343-nibble data field
//! (6-and-2 encoding) framed by an address field (4-and-4 encoding) and
//! runs of self-sync bytes. All transforms here are pure; buffer sizes are
//! fixed by the format, so a length mismatch is a caller bug and panics.

use std::sync::OnceLock;

pub const BYTES_PER_SECTOR: usize = 256;
pub const SECTORS_PER_TRACK: usize = 16;
pub const BYTES_PER_TRACK: usize = BYTES_PER_SECTOR * SECTORS_PER_TRACK;

/// 342 prenibblized bytes plus the trailing checksum nibble.
pub const NIBBLES_PER_SECTOR: usize = 343;
const PRENIBBLE_SIZE: usize = 342;
/// Start of the 86-byte auxiliary region inside the prenibble buffer.
const AUX_BASE: usize = 0x100;
const AUX_TOP: usize = 0x155;

/// Nibble count of one full encoded track.
pub const NIBBLES_PER_TRACK: usize = TRACK_LEAD_IN + SECTORS_PER_TRACK * SECTOR_FIELD_LEN;

/// Self-sync run lengths: lead-in at the index mark, the gap between an
/// address field and its data field, and the gap after each sector.
const TRACK_LEAD_IN: usize = 48;
const GAP_TWO: usize = 6;
const GAP_THREE: usize = 27;

/// Encoded size of one sector region: address field, gap, data field, gap.
pub const SECTOR_FIELD_LEN: usize = ADDRESS_FIELD_LEN + GAP_TWO + DATA_FIELD_LEN + GAP_THREE;
const ADDRESS_FIELD_LEN: usize = 3 + 8 + 3;
const DATA_FIELD_LEN: usize = 3 + NIBBLES_PER_SECTOR + 3;

/// Offset of the first data-field nibble inside an encoded track.
pub const FIRST_DATA_OFFSET: usize = TRACK_LEAD_IN + ADDRESS_FIELD_LEN + GAP_TWO + 3;

const SELF_SYNC: u8 = 0xFF;
const ADDRESS_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0x96];
const DATA_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0xAD];
const FIELD_EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xEB];

/// The 64 disk nibbles: high bit set, never more than two consecutive zero
/// bits and at most one such pair, which keeps the drive electronics
/// self-clocked.
const WRITE_TABLE: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6, //
    0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3, //
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC, //
    0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3, //
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE, //
    0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC, //
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, //
    0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

const INVALID_NIBBLE: u8 = 0xFF;

fn read_table() -> &'static [u8; 256] {
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [INVALID_NIBBLE; 256];
        for (value, &nibble) in WRITE_TABLE.iter().enumerate() {
            table[nibble as usize] = value as u8;
        }
        table
    })
}

/// Translate one on-disk nibble back to its 6-bit value.
fn nibble_value(nibble: u8) -> u8 {
    let value = read_table()[nibble as usize];
    assert_ne!(
        value, INVALID_NIBBLE,
        "byte {nibble:#04X} is not a disk nibble"
    );
    value
}

/// Low two bits of `byte`, swapped. The auxiliary region stores the low
/// bits of each sector byte in this order.
fn swapped_low_bits(byte: u8) -> u8 {
    ((byte & 0b01) << 1) | ((byte & 0b10) >> 1)
}

/// Position of the auxiliary byte holding sector byte `i`'s low bits.
fn aux_offset(i: usize) -> usize {
    AUX_BASE + (0x55 - (i % 0x56))
}

/// Split a 256-byte sector into 342 six-bit values: the top 6 bits of each
/// byte in order, then the swapped low 2 bits packed three to an auxiliary
/// byte with a rotating shift.
fn prenibblize(sector: &[u8; BYTES_PER_SECTOR]) -> [u8; PRENIBBLE_SIZE] {
    let mut buffer = [0u8; PRENIBBLE_SIZE];
    let mut shift = 0;
    for (i, &byte) in sector.iter().enumerate() {
        buffer[i] = byte >> 2;
        let aux = aux_offset(i);
        buffer[aux] |= swapped_low_bits(byte) << shift;
        if aux == AUX_BASE {
            shift += 2;
        }
    }
    buffer
}

/// 6-and-2 encode one sector into its 343-nibble data field: auxiliary
/// region first (descending), then the primary bytes, XOR-chained pairwise
/// and translated, with the final accumulator appended as the checksum.
pub fn six_and_two_encode(sector: &[u8; BYTES_PER_SECTOR]) -> [u8; NIBBLES_PER_SECTOR] {
    let buffer = prenibblize(sector);
    let mut nibbles = [0u8; NIBBLES_PER_SECTOR];

    nibbles[0] = WRITE_TABLE[buffer[AUX_TOP] as usize];
    for (i, index) in (AUX_BASE..AUX_TOP).enumerate() {
        nibbles[85 - i] = WRITE_TABLE[(buffer[index] ^ buffer[index + 1]) as usize];
    }
    nibbles[0x56] = WRITE_TABLE[(buffer[AUX_BASE] ^ buffer[0x000]) as usize];
    for index in 0x00..=0xFE {
        nibbles[0x57 + index] = WRITE_TABLE[(buffer[index] ^ buffer[index + 1]) as usize];
    }
    nibbles[342] = WRITE_TABLE[buffer[0xFF] as usize];

    nibbles
}

/// Inverse of [`six_and_two_encode`]: undo the translation, re-accumulate
/// the XOR chain from the first nibble forward, then reassemble each byte
/// from its 6 high bits plus 2 low bits pulled out of the auxiliary region.
pub fn six_and_two_decode(nibbles: &[u8; NIBBLES_PER_SECTOR]) -> [u8; BYTES_PER_SECTOR] {
    let mut buffer = [0u8; PRENIBBLE_SIZE];

    buffer[AUX_TOP] = nibble_value(nibbles[0]);
    for i in 1..=85 {
        buffer[AUX_TOP - i] = nibble_value(nibbles[i]) ^ buffer[AUX_TOP - i + 1];
    }
    buffer[0x000] = nibble_value(nibbles[86]) ^ buffer[AUX_BASE];
    for i in 87..=341 {
        buffer[i - 86] = nibble_value(nibbles[i]) ^ buffer[i - 87];
    }

    let mut sector = [0u8; BYTES_PER_SECTOR];
    let mut shift = 0;
    for (i, byte) in sector.iter_mut().enumerate() {
        let aux = aux_offset(i);
        *byte = (buffer[i] << 2) | swapped_low_bits(buffer[aux] >> shift);
        if aux == AUX_BASE {
            shift += 2;
        }
    }
    sector
}

/// 4-and-4 encode a byte for the address field: odd bits interleaved with
/// ones in the first byte, even bits in the second.
///
/// `(hi & 0xAA) == 0xAA` and `(lo & 0xAA) == 0xAA` for every input, so the
/// result is always a valid pair of disk bytes.
pub fn four_and_four_encode(byte: u8) -> [u8; 2] {
    [(byte >> 1) | 0xAA, byte | 0xAA]
}

/// Encode one whole track.
///
/// `track_data` is the 4096-byte sector-ordered slice of the image for this
/// track; `order` maps a physical sector number to its offset-determining
/// logical position in the image. The framing is fixed: lead-in sync, then
/// for each sector an address field, gap, data field and tail gap.
pub fn encode_track(
    track_data: &[u8],
    order: &[usize; SECTORS_PER_TRACK],
    track: u8,
    volume: u8,
) -> Vec<u8> {
    assert_eq!(track_data.len(), BYTES_PER_TRACK, "track must be 16 sectors");

    let mut encoded = Vec::with_capacity(NIBBLES_PER_TRACK);
    encoded.resize(TRACK_LEAD_IN, SELF_SYNC);

    for sector in 0..SECTORS_PER_TRACK {
        // Address field
        encoded.extend_from_slice(&ADDRESS_PROLOGUE);
        encoded.extend_from_slice(&four_and_four_encode(volume));
        encoded.extend_from_slice(&four_and_four_encode(track));
        encoded.extend_from_slice(&four_and_four_encode(sector as u8));
        encoded.extend_from_slice(&four_and_four_encode(volume ^ track ^ sector as u8));
        encoded.extend_from_slice(&FIELD_EPILOGUE);

        for _ in 0..GAP_TWO {
            encoded.push(SELF_SYNC);
        }

        // Data field
        let offset = order[sector] * BYTES_PER_SECTOR;
        let mut sector_bytes = [0u8; BYTES_PER_SECTOR];
        sector_bytes.copy_from_slice(&track_data[offset..offset + BYTES_PER_SECTOR]);
        encoded.extend_from_slice(&DATA_PROLOGUE);
        encoded.extend_from_slice(&six_and_two_encode(&sector_bytes));
        encoded.extend_from_slice(&FIELD_EPILOGUE);

        for _ in 0..GAP_THREE {
            encoded.push(SELF_SYNC);
        }
    }

    debug_assert_eq!(encoded.len(), NIBBLES_PER_TRACK);
    encoded
}

/// Decode one encoded track back into its 4096 sector-ordered bytes.
/// Inverse of [`encode_track`] for the same interleave table.
pub fn decode_track(nibbles: &[u8], order: &[usize; SECTORS_PER_TRACK]) -> Vec<u8> {
    assert_eq!(nibbles.len(), NIBBLES_PER_TRACK, "not an encoded track");

    let mut track_data = vec![0u8; BYTES_PER_TRACK];
    for sector in 0..SECTORS_PER_TRACK {
        let field = FIRST_DATA_OFFSET + SECTOR_FIELD_LEN * sector;
        let mut data = [0u8; NIBBLES_PER_SECTOR];
        data.copy_from_slice(&nibbles[field..field + NIBBLES_PER_SECTOR]);

        let offset = order[sector] * BYTES_PER_SECTOR;
        track_data[offset..offset + BYTES_PER_SECTOR].copy_from_slice(&six_and_two_decode(&data));
    }
    track_data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_sector(seed: u8) -> [u8; BYTES_PER_SECTOR] {
        let mut sector = [0u8; BYTES_PER_SECTOR];
        for (i, byte) in sector.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(31).wrapping_add(seed);
        }
        sector
    }

    #[test]
    fn six_and_two_round_trips_patterned_sectors() {
        for seed in [0x00, 0x01, 0x41, 0x7F, 0x80, 0xAA, 0xFF] {
            let sector = pattern_sector(seed);
            assert_eq!(six_and_two_decode(&six_and_two_encode(&sector)), sector);
        }
    }

    #[test]
    fn six_and_two_round_trips_every_uniform_sector() {
        for value in 0..=255u8 {
            let sector = [value; BYTES_PER_SECTOR];
            assert_eq!(six_and_two_decode(&six_and_two_encode(&sector)), sector);
        }
    }

    #[test]
    fn encoded_nibbles_all_come_from_the_translation_table() {
        let sector = pattern_sector(0x5A);
        for nibble in six_and_two_encode(&sector) {
            assert!(WRITE_TABLE.contains(&nibble), "{nibble:#04X} not a nibble");
        }
    }

    #[test]
    fn translation_table_is_self_clocking() {
        // High bit set, no run of three zero bits, at most one run of two.
        for nibble in WRITE_TABLE {
            assert!(nibble & 0x80 != 0, "{nibble:#04X} lacks the clock bit");
            let mut zero_pairs = 0;
            let mut run = 0;
            for bit in (0..8).rev() {
                if nibble & (1 << bit) == 0 {
                    run += 1;
                } else {
                    if run == 2 {
                        zero_pairs += 1;
                    }
                    run = 0;
                }
                assert!(run < 3, "{nibble:#04X} has three consecutive zero bits");
            }
            if run == 2 {
                zero_pairs += 1;
            }
            assert!(zero_pairs <= 1, "{nibble:#04X} has {zero_pairs} zero pairs");
        }
    }

    #[test]
    fn four_and_four_forces_alternating_ones() {
        for byte in 0..=255u8 {
            let [hi, lo] = four_and_four_encode(byte);
            assert_eq!(hi & 0xAA, 0xAA);
            assert_eq!(lo & 0xAA, 0xAA);
            // The data bits reassemble the original.
            assert_eq!(((hi & 0x55) << 1) | (lo & 0x55), byte);
        }
    }

    #[test]
    fn encoded_track_has_the_documented_geometry() {
        let track_data = vec![0u8; BYTES_PER_TRACK];
        let order: [usize; 16] = core::array::from_fn(|i| i);
        let encoded = encode_track(&track_data, &order, 0, 0xFE);

        assert_eq!(encoded.len(), NIBBLES_PER_TRACK);
        assert_eq!(NIBBLES_PER_TRACK, 6384);
        assert_eq!(FIRST_DATA_OFFSET, 0x47);
        assert_eq!(SECTOR_FIELD_LEN, 0x18C);

        // Lead-in is all sync bytes, then the first address prologue.
        assert!(encoded[..TRACK_LEAD_IN].iter().all(|&b| b == SELF_SYNC));
        assert_eq!(encoded[TRACK_LEAD_IN..TRACK_LEAD_IN + 3], ADDRESS_PROLOGUE);
        // First data field prologue sits right before FIRST_DATA_OFFSET.
        assert_eq!(
            encoded[FIRST_DATA_OFFSET - 3..FIRST_DATA_OFFSET],
            DATA_PROLOGUE
        );
    }

    #[test]
    fn address_field_encodes_volume_track_sector_checksum() {
        let track_data = vec![0u8; BYTES_PER_TRACK];
        let order: [usize; 16] = core::array::from_fn(|i| i);
        let encoded = encode_track(&track_data, &order, 17, 0xFE);

        // Second sector's address field.
        let field = TRACK_LEAD_IN + SECTOR_FIELD_LEN + 3;
        assert_eq!(encoded[field..field + 2], four_and_four_encode(0xFE));
        assert_eq!(encoded[field + 2..field + 4], four_and_four_encode(17));
        assert_eq!(encoded[field + 4..field + 6], four_and_four_encode(1));
        assert_eq!(
            encoded[field + 6..field + 8],
            four_and_four_encode(0xFE ^ 17 ^ 1)
        );
        assert_eq!(encoded[field + 8..field + 11], FIELD_EPILOGUE);
    }

    #[test]
    fn track_round_trips_through_an_interleave_table() {
        let order = [0, 7, 14, 6, 13, 5, 12, 4, 11, 3, 10, 2, 9, 1, 8, 15];
        let mut track_data = vec![0u8; BYTES_PER_TRACK];
        for (i, byte) in track_data.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        let encoded = encode_track(&track_data, &order, 5, 0xFE);
        assert_eq!(decode_track(&encoded, &order), track_data);
    }
}
