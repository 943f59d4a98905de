/// CRC-32 for Bluetooth HID reports.
///
/// DualSense and DualShock 4 Bluetooth reports carry a trailing CRC-32
/// computed over a one-byte seed (0xA1 for input reports, 0xA2 for output
/// reports) followed by the report bytes, little-endian at the last four
/// bytes of the report.

pub const SEED_INPUT: u8 = 0xA1;
pub const SEED_OUTPUT: u8 = 0xA2;

const TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32 over the seed byte followed by each slice in `parts`, in order.
/// Multi-slice so callers can hash header + payload without stitching them
/// into one buffer first.
pub fn checksum(seed: u8, parts: &[&[u8]]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    crc = (crc >> 8) ^ TABLE[((crc as u8) ^ seed) as usize];
    for part in parts {
        for &b in *part {
            crc = (crc >> 8) ^ TABLE[((crc as u8) ^ b) as usize];
        }
    }
    crc ^ 0xFFFF_FFFF
}

/// Check the trailing CRC of a full report. Reports shorter than the CRC
/// itself fail.
pub fn validate(seed: u8, report: &[u8]) -> bool {
    if report.len() < 4 {
        return false;
    }
    let (body, tail) = report.split_at(report.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    checksum(seed, &[body]) == stored
}

/// Compute and write the trailing CRC into the last four bytes of `report`.
pub fn stamp(seed: u8, report: &mut [u8]) {
    debug_assert!(report.len() >= 4);
    let split = report.len() - 4;
    let crc = checksum(seed, &[&report[..split]]);
    report[split..].copy_from_slice(&crc.to_le_bytes());
}
