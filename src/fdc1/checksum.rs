//! # FDC1 Checksum
//!
//! 7-bit additive checksum: the sum of all covered bytes, modulo 128.
//!
//! Keeping the result below 0x80 means the checksum byte can never be
//! mistaken for a start marker.

use super::protocol::FDC1_DATA_MASK;

/// Calculate the FDC1 checksum
///
/// # Arguments
///
/// * `data` - Bytes covered by the checksum (marker up to, excluding, the checksum byte)
///
/// # Returns
///
/// * `u8` - Checksum in the range `0x00..=0x7F`
///
/// # Examples
///
/// ```
/// use fdc1_driver::fdc1::checksum::checksum;
///
/// assert_eq!(checksum(&[0xAA, 0x00, 0x10]), 0x3A);
/// ```
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte));
    sum & FDC1_DATA_MASK
}

/// Calculate the checksum one byte at a time (slow, for verification)
#[allow(dead_code)]
fn checksum_slow(data: &[u8]) -> u8 {
    let mut total: u32 = 0;
    for &byte in data {
        total += byte as u32;
    }
    (total % 128) as u8
}
