//! Sample format → serial interface word-length field.

use crate::registers::{SDP_WORD_LENGTH_MASK, SDP_WORD_LENGTH_SHIFT};

/// PCM sample representation negotiated for the capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// 16-bit little-endian.
    S16Le,
    /// 20-bit samples in a 24-bit container, little-endian.
    S20_3Le,
    /// 24-bit little-endian.
    S24Le,
    /// 32-bit little-endian.
    S32Le,
    /// Anything else the host may hand over (8-bit, float, ...).
    Other,
}

impl SampleFormat {
    /// Format for a sample width in bits (`20` means 20-in-24).
    pub fn from_width(bits: u8) -> Self {
        match bits {
            16 => Self::S16Le,
            20 => Self::S20_3Le,
            24 => Self::S24Le,
            32 => Self::S32Le,
            _ => Self::Other,
        }
    }

    /// Significant bits per sample, `None` for [`SampleFormat::Other`].
    pub fn width(self) -> Option<u8> {
        match self {
            Self::S16Le => Some(16),
            Self::S20_3Le => Some(20),
            Self::S24Le => Some(24),
            Self::S32Le => Some(32),
            Self::Other => None,
        }
    }

    /// Whether the chip has a dedicated word-length setting for this format.
    pub fn is_native(self) -> bool {
        self != Self::Other
    }

    /// 3-bit word-length field for REG11 bits \[7:5\].
    ///
    /// Formats without a native setting get the 16-bit field. Hosts that
    /// negotiate an unusual container still get a running stream, so this
    /// is kept lenient instead of failing `hw_params`.
    pub fn word_length_field(self) -> u8 {
        match self {
            Self::S16Le | Self::Other => 0b011,
            Self::S20_3Le => 0b001,
            Self::S24Le => 0b000,
            Self::S32Le => 0b100,
        }
    }

    /// [`word_length_field`](Self::word_length_field) shifted into place,
    /// ready for `update_bits(REG11, SDP_WORD_LENGTH_MASK, ..)`.
    pub fn register_bits(self) -> u8 {
        self.word_length_field()
            .wrapping_shl(u32::from(SDP_WORD_LENGTH_SHIFT))
            & SDP_WORD_LENGTH_MASK
    }
}
