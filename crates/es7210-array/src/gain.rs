//! Microphone PGA gain.
//!
//! Each analog input has a programmable gain amplifier controlled by the low
//! nibble of REG43–REG46 (one register per channel of a chip). Steps 0–11 are
//! 3 dB apart; steps 12–14 are 1.5 dB apart.
//!
//! | Step | Gain    |
//! |------|---------|
//! | 0    | 0 dB    |
//! | 1    | 3 dB    |
//! | …    | …       |
//! | 11   | 33 dB   |
//! | 12   | 34.5 dB |
//! | 13   | 36 dB   |
//! | 14   | 37.5 dB |

use crate::error::ConfigurationError;
use crate::registers::{GAIN_MASK, GAIN_PGA_ENABLE};

/// PGA gain step (`0..=14`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct MicGain(u8);

impl MicGain {
    /// Largest gain step (37.5 dB).
    pub const MAX_STEP: u8 = 14;

    /// 0 dB.
    pub const UNITY: Self = Self(0);

    /// Gain step, clamped to [`MAX_STEP`](Self::MAX_STEP).
    #[must_use]
    pub fn new(step: u8) -> Self {
        Self(step.min(Self::MAX_STEP))
    }

    /// Gain step, rejecting steps above [`MAX_STEP`](Self::MAX_STEP).
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::GainStep`] when `step > 14`.
    pub fn try_new(step: u8) -> Result<Self, ConfigurationError> {
        if step > Self::MAX_STEP {
            Err(ConfigurationError::GainStep(step))
        } else {
            Ok(Self(step))
        }
    }

    /// Step index.
    #[must_use]
    pub fn step(self) -> u8 {
        self.0
    }

    /// Gain in tenths of a dB.
    #[must_use]
    pub fn tenths_db(self) -> u16 {
        let step = u16::from(self.0);
        if step <= 11 {
            step.saturating_mul(30)
        } else {
            // 33 dB, then 1.5 dB per step
            step.saturating_sub(11).saturating_mul(15).saturating_add(330)
        }
    }

    /// Value for the gain register: PGA enabled, step in bits \[3:0\].
    #[must_use]
    pub fn register_value(self) -> u8 {
        GAIN_PGA_ENABLE | (self.0 & GAIN_MASK)
    }
}

impl Default for MicGain {
    fn default() -> Self {
        Self::UNITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_above_max() {
        assert_eq!(MicGain::new(200).step(), 14);
    }

    #[test]
    fn try_new_rejects_above_max() {
        assert_eq!(MicGain::try_new(15), Err(ConfigurationError::GainStep(15)));
        assert_eq!(MicGain::try_new(14), Ok(MicGain::new(14)));
    }

    #[test]
    fn gain_curve() {
        assert_eq!(MicGain::new(0).tenths_db(), 0);
        assert_eq!(MicGain::new(1).tenths_db(), 30);
        assert_eq!(MicGain::new(11).tenths_db(), 330);
        assert_eq!(MicGain::new(12).tenths_db(), 345);
        assert_eq!(MicGain::new(14).tenths_db(), 375);
    }

    #[test]
    fn register_value_enables_pga() {
        assert_eq!(MicGain::new(0).register_value(), 0x10);
        assert_eq!(MicGain::new(14).register_value(), 0x1E);
    }

    #[test]
    fn gain_is_monotonic() {
        for step in 0..MicGain::MAX_STEP {
            assert!(MicGain::new(step).tenths_db() < MicGain::new(step.saturating_add(1)).tenths_db());
        }
    }
}
