//! Digital-microphone routing.
//!
//! Every chip has two PDM input groups, one per channel pair, enabled by
//! bits 6 and 7 of REG10. The device-wide configuration is a flat list of
//! pair flags in channel order: chip `i` owns flags `2*i` (low pair, bit 6)
//! and `2*i + 1` (high pair, bit 7). Chips never influence each other.
//!
//! A missing flag reads as "disabled".

use crate::registers::{DMIC_MASK, DMIC_PAIR_HIGH, DMIC_PAIR_LOW};

/// Bits of [`DMIC_MASK`] owned by the router.
pub const ROUTE_MASK: u8 = DMIC_MASK;

/// REG10 enable bits for chip `chip` from the flat pair-flag list.
pub fn chip_bits(pair_flags: &[bool], chip: usize) -> u8 {
    let flag = |offset: usize| {
        chip.checked_mul(2)
            .and_then(|base| base.checked_add(offset))
            .and_then(|i| pair_flags.get(i))
            .copied()
            .unwrap_or(false)
    };
    let mut bits = 0;
    if flag(0) {
        bits |= DMIC_PAIR_LOW;
    }
    if flag(1) {
        bits |= DMIC_PAIR_HIGH;
    }
    bits
}

/// `(chip index, REG10 bits)` for every chip of a `chip_count` set.
pub fn routes(pair_flags: &[bool], chip_count: usize) -> impl Iterator<Item = (usize, u8)> + '_ {
    (0..chip_count).map(move |chip| (chip, chip_bits(pair_flags, chip)))
}
