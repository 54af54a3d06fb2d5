//! Register debug command word.
//!
//! Bench tooling pokes registers with a single hex word `FFRRVV`:
//!
//! - `FF` nonzero: write `VV` to `FF` consecutive registers starting at `RR`
//! - `FF` zero: read `VV` consecutive registers starting at `RR` (at least one)
//!
//! For example `4903c` (`04 90 3C`) writes `0x3C` to registers 0x90-0x93 and
//! `1404` reads 0x14-0x17. Register addresses wrap at 0xFF.
//!
//! Commands are executed with
//! [`AdcArray::run_debug_command`](crate::AdcArray::run_debug_command), which
//! bypasses the power sequencer: a debug write can unmute a chip the
//! sequencer believes is muted.

use thiserror_no_std::Error as ThisError;

/// Rejected debug command text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebugParseError {
    /// Nothing but whitespace.
    #[error("empty debug command")]
    Empty,
    /// Not a hexadecimal number that fits in 32 bits.
    #[error("debug command is not a hex word")]
    NotHex,
}

/// Decoded debug command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebugCommand {
    /// Write `value` to `count` registers from `start`.
    Write {
        /// First register.
        start: u8,
        /// Number of registers (nonzero).
        count: u8,
        /// Value written to each.
        value: u8,
    },
    /// Read `count` registers from `start`.
    Read {
        /// First register.
        start: u8,
        /// Number of registers (nonzero).
        count: u8,
    },
}

impl DebugCommand {
    /// Decode a command word. Bits above 23 are ignored.
    pub fn from_word(word: u32) -> Self {
        let [_, flag, start, low] = word.to_be_bytes();
        if flag == 0 {
            Self::Read {
                start,
                count: low.max(1),
            }
        } else {
            Self::Write {
                start,
                count: flag,
                value: low,
            }
        }
    }

    /// Parse hex text such as `"4903c"`, `"0x1404"` or `"1404\n"`.
    pub fn parse(text: &str) -> Result<Self, DebugParseError> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.is_empty() {
            return Err(DebugParseError::Empty);
        }
        u32::from_str_radix(digits, 16)
            .map(Self::from_word)
            .map_err(|_| DebugParseError::NotHex)
    }

    /// First register touched.
    pub fn start(&self) -> u8 {
        match *self {
            Self::Write { start, .. } | Self::Read { start, .. } => start,
        }
    }

    /// Number of registers touched.
    pub fn count(&self) -> u8 {
        match *self {
            Self::Write { count, .. } | Self::Read { count, .. } => count,
        }
    }

    /// Registers touched, in order.
    pub fn registers(&self) -> impl Iterator<Item = u8> {
        let start = self.start();
        (0..self.count()).map(move |offset| start.wrapping_add(offset))
    }
}
