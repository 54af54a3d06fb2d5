//! MCLK:LRCK ratio resolution.
//!
//! The ES7210 derives its internal ADC clock from MCLK through the divider,
//! doubler and DLL settings in REG02, with REG06 selecting the matching clock
//! frequency range. Valid combinations are curated in two static tables:
//!
//! - [`MULTI_FRAME_TABLE`] for N-LRCK TDM modes, keyed by ratio **and** total
//!   channel count (the frame carries every chip's slots, so the effective
//!   per-chip ratio shrinks as chips are added);
//! - [`SINGLE_FRAME_TABLE`] for every other mode, keyed by ratio alone.
//!
//! Lookup is a linear scan and the first match wins. A miss is a
//! configuration error: no default entry is ever applied.

use crate::config::OperatingMode;
use crate::error::ConfigurationError;

/// One tabulated clock setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioTableEntry {
    /// MCLK:LRCK ratio.
    pub ratio: u32,
    /// Total channel count; only compared in the multi-frame table.
    pub channels: u8,
    /// Value for REG02 (main clock).
    pub reg02: u8,
    /// Value for REG06 (power-down / clock range).
    pub reg06: u8,
}

impl RatioTableEntry {
    const fn new(ratio: u32, channels: u8, reg02: u8, reg06: u8) -> Self {
        Self {
            ratio,
            channels,
            reg02,
            reg06,
        }
    }
}

/// Resolved register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RatioSetting {
    /// Value for REG02.
    pub reg02: u8,
    /// Value for REG06.
    pub reg06: u8,
}

/// Settings for one-LRCK-per-frame operation (normal and 1-LRCK TDM).
pub const SINGLE_FRAME_TABLE: [RatioTableEntry; 9] = [
    RatioTableEntry::new(64, 0, 0xC1, 0x04),
    RatioTableEntry::new(128, 0, 0x41, 0x04),
    RatioTableEntry::new(192, 0, 0x43, 0x04),
    RatioTableEntry::new(256, 0, 0x81, 0x00),
    RatioTableEntry::new(384, 0, 0x03, 0x00),
    RatioTableEntry::new(512, 0, 0x82, 0x00),
    RatioTableEntry::new(768, 0, 0x06, 0x00),
    RatioTableEntry::new(1024, 0, 0x84, 0x00),
    RatioTableEntry::new(1536, 0, 0x0C, 0x00),
];

/// Settings for N-LRCK TDM, keyed by ratio and total channel count.
///
/// Each entry carries the single-frame setting for `ratio / (channels / 4)`.
pub const MULTI_FRAME_TABLE: [RatioTableEntry; 21] = [
    // one chip: 4 channels
    RatioTableEntry::new(64, 4, 0xC1, 0x04),
    RatioTableEntry::new(128, 4, 0x41, 0x04),
    RatioTableEntry::new(256, 4, 0x81, 0x00),
    RatioTableEntry::new(384, 4, 0x03, 0x00),
    RatioTableEntry::new(512, 4, 0x82, 0x00),
    RatioTableEntry::new(768, 4, 0x06, 0x00),
    RatioTableEntry::new(1024, 4, 0x84, 0x00),
    // two chips: 8 channels
    RatioTableEntry::new(128, 8, 0xC1, 0x04),
    RatioTableEntry::new(256, 8, 0x41, 0x04),
    RatioTableEntry::new(384, 8, 0x43, 0x04),
    RatioTableEntry::new(512, 8, 0x81, 0x00),
    RatioTableEntry::new(768, 8, 0x03, 0x00),
    RatioTableEntry::new(1024, 8, 0x82, 0x00),
    // three chips: 12 channels
    RatioTableEntry::new(192, 12, 0xC1, 0x04),
    RatioTableEntry::new(384, 12, 0x41, 0x04),
    RatioTableEntry::new(768, 12, 0x81, 0x00),
    // four chips: 16 channels
    RatioTableEntry::new(256, 16, 0xC1, 0x04),
    RatioTableEntry::new(512, 16, 0x41, 0x04),
    RatioTableEntry::new(768, 16, 0x43, 0x04),
    RatioTableEntry::new(1024, 16, 0x81, 0x00),
    RatioTableEntry::new(1536, 16, 0x03, 0x00),
];

/// First entry of `table` matching `ratio`, and `channels` when given.
pub fn lookup(table: &[RatioTableEntry], ratio: u32, channels: Option<u8>) -> Option<RatioSetting> {
    table
        .iter()
        .find(|e| e.ratio == ratio && channels.map_or(true, |c| e.channels == c))
        .map(|e| RatioSetting {
            reg02: e.reg02,
            reg06: e.reg06,
        })
}

/// Resolve the REG02/REG06 pair for `mode` at `ratio` with `channels` total
/// channels.
///
/// # Errors
///
/// [`ConfigurationError::UnsupportedRatio`] when the relevant table has no
/// matching entry.
pub fn resolve(
    mode: OperatingMode,
    ratio: u32,
    channels: u8,
) -> Result<RatioSetting, ConfigurationError> {
    let found = if mode.is_multi_frame() {
        lookup(&MULTI_FRAME_TABLE, ratio, Some(channels))
    } else {
        lookup(&SINGLE_FRAME_TABLE, ratio, None)
    };
    found.ok_or(ConfigurationError::UnsupportedRatio {
        mode,
        ratio,
        channels,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_ignores_channel_count() {
        let a = resolve(OperatingMode::NormalI2s, 256, 4).unwrap();
        let b = resolve(OperatingMode::NormalI2s, 256, 16).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, RatioSetting { reg02: 0x81, reg06: 0x00 });
    }

    #[test]
    fn multi_frame_needs_exact_channel_count() {
        assert_eq!(
            resolve(OperatingMode::TdmNlrckI2s, 256, 8).unwrap(),
            RatioSetting { reg02: 0x41, reg06: 0x04 }
        );
        assert!(resolve(OperatingMode::TdmNlrckI2s, 256, 12).is_err());
    }

    #[test]
    fn one_lrck_tdm_uses_single_frame_table() {
        let setting = resolve(OperatingMode::Tdm1lrckDspA, 64, 16).unwrap();
        assert_eq!(setting, RatioSetting { reg02: 0xC1, reg06: 0x04 });
    }

    #[test]
    fn miss_reports_the_request() {
        let err = resolve(OperatingMode::TdmNlrckDspB, 300, 8).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnsupportedRatio {
                mode: OperatingMode::TdmNlrckDspB,
                ratio: 300,
                channels: 8,
            }
        );
    }

    #[test]
    fn first_match_wins_on_duplicate_keys() {
        let table = [
            RatioTableEntry::new(256, 4, 0x11, 0x22),
            RatioTableEntry::new(256, 4, 0x33, 0x44),
        ];
        assert_eq!(
            lookup(&table, 256, Some(4)),
            Some(RatioSetting { reg02: 0x11, reg06: 0x22 })
        );
    }

    #[test]
    fn tables_have_unique_keys() {
        for (i, a) in SINGLE_FRAME_TABLE.iter().enumerate() {
            for b in SINGLE_FRAME_TABLE.iter().skip(i + 1) {
                assert_ne!(a.ratio, b.ratio);
            }
        }
        for (i, a) in MULTI_FRAME_TABLE.iter().enumerate() {
            for b in MULTI_FRAME_TABLE.iter().skip(i + 1) {
                assert_ne!((a.ratio, a.channels), (b.ratio, b.channels));
            }
        }
    }

    #[test]
    fn multi_frame_entries_follow_per_chip_ratio() {
        for entry in MULTI_FRAME_TABLE {
            let chips = u32::from(entry.channels / 4);
            let per_chip = entry.ratio / chips;
            let single = lookup(&SINGLE_FRAME_TABLE, per_chip, None).unwrap();
            assert_eq!(
                (single.reg02, single.reg06),
                (entry.reg02, entry.reg06),
                "ratio {} / {} ch",
                entry.ratio,
                entry.channels
            );
        }
    }
}
