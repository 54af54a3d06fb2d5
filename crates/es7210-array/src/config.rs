//! Device configuration.
//!
//! A [`DeviceConfig`] is assembled once, validated when the
//! [`AdcArray`](crate::AdcArray) is created, and read-only afterwards.
//!
//! # Reference board
//!
//! | Parameter          | Default                                  |
//! |--------------------|------------------------------------------|
//! | Addresses          | `0x40, 0x43, 0x42, 0x41` (first N)       |
//! | Channels per chip  | 4                                        |
//! | Mode               | [`OperatingMode::NormalI2s`]             |
//! | MCLK:LRCK ratio    | 256                                      |
//! | SCLK               | not inverted                             |
//! | Digital mics       | all pairs analog                         |
//! | Mic PGA gain       | 0 dB on every channel                    |
//! | Settle delay       | 100 ms                                   |

use embassy_time::Duration;
use heapless::Vec;

use crate::chip_set::MAX_CHIPS;
use crate::error::ConfigurationError;
use crate::gain::MicGain;
use crate::registers::{
    CHANNELS_PER_CHIP, DEFAULT_ADDRESSES, SDP_FORMAT_DSP_A, SDP_FORMAT_DSP_B, SDP_FORMAT_I2S,
    SDP_FORMAT_LJ, TDM_1LRCK_DSP, TDM_1LRCK_I2S, TDM_NLRCK_FOLLOW, TDM_NLRCK_HEAD, TDM_OFF,
};

/// Most digital-mic pair flags a configuration can carry.
pub const MAX_DMIC_PAIRS: usize = MAX_CHIPS * 2;

/// Default pop-suppression window.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Default MCLK:LRCK ratio.
pub const DEFAULT_RATIO: u32 = 256;

/// Serial audio port layout shared by every chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// N-LRCK TDM, I²S slots. Chip 0 heads the frame.
    TdmNlrckI2s,
    /// N-LRCK TDM, left-justified slots.
    TdmNlrckLj,
    /// N-LRCK TDM, DSP-A slots.
    TdmNlrckDspA,
    /// N-LRCK TDM, DSP-B slots.
    TdmNlrckDspB,
    /// 1-LRCK TDM, I²S slots.
    Tdm1lrckI2s,
    /// 1-LRCK TDM, left-justified slots.
    Tdm1lrckLj,
    /// 1-LRCK TDM, DSP-A slots.
    Tdm1lrckDspA,
    /// 1-LRCK TDM, DSP-B slots.
    Tdm1lrckDspB,
    /// Plain two-channel I²S per chip.
    NormalI2s,
    /// Plain two-channel left-justified per chip.
    NormalLj,
    /// Plain DSP-A per chip.
    NormalDspA,
    /// Plain DSP-B per chip.
    NormalDspB,
}

impl OperatingMode {
    /// Whether one frame spans several LRCK periods, so the clock ratio
    /// depends on the total channel count.
    pub fn is_multi_frame(self) -> bool {
        matches!(
            self,
            Self::TdmNlrckI2s | Self::TdmNlrckLj | Self::TdmNlrckDspA | Self::TdmNlrckDspB
        )
    }

    /// REG11 serial-format bits.
    pub fn sdp_format(self) -> u8 {
        match self {
            Self::TdmNlrckI2s | Self::Tdm1lrckI2s | Self::NormalI2s => SDP_FORMAT_I2S,
            Self::TdmNlrckLj | Self::Tdm1lrckLj | Self::NormalLj => SDP_FORMAT_LJ,
            Self::TdmNlrckDspA | Self::Tdm1lrckDspA | Self::NormalDspA => SDP_FORMAT_DSP_A,
            Self::TdmNlrckDspB | Self::Tdm1lrckDspB | Self::NormalDspB => SDP_FORMAT_DSP_B,
        }
    }

    /// REG12 TDM control bits for chip `chip`.
    pub fn tdm_control(self, chip: usize) -> u8 {
        match self {
            Self::NormalI2s | Self::NormalLj | Self::NormalDspA | Self::NormalDspB => TDM_OFF,
            Self::Tdm1lrckDspA | Self::Tdm1lrckDspB => TDM_1LRCK_DSP,
            Self::Tdm1lrckI2s | Self::Tdm1lrckLj => TDM_1LRCK_I2S,
            Self::TdmNlrckI2s | Self::TdmNlrckLj | Self::TdmNlrckDspA | Self::TdmNlrckDspB => {
                if chip == 0 {
                    TDM_NLRCK_HEAD
                } else {
                    TDM_NLRCK_FOLLOW
                }
            }
        }
    }
}

/// Declarative description of the ganged ADCs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    addresses: Vec<u8, MAX_CHIPS>,
    requested_chips: usize,
    channels_per_chip: u8,
    mode: OperatingMode,
    ratio: u32,
    sclk_inverted: bool,
    dmic_pairs: Vec<bool, MAX_DMIC_PAIRS>,
    requested_dmic_pairs: usize,
    mic_gain: MicGain,
    settle_delay: Duration,
}

impl DeviceConfig {
    /// Configuration for chips at `addresses`, in channel-group order, with
    /// reference-board defaults for everything else.
    pub fn new(addresses: &[u8]) -> Self {
        let mut stored = Vec::new();
        for &address in addresses.iter().take(MAX_CHIPS) {
            // Bounded by take(MAX_CHIPS).
            let _ = stored.push(address);
        }
        Self {
            addresses: stored,
            requested_chips: addresses.len(),
            channels_per_chip: CHANNELS_PER_CHIP,
            mode: OperatingMode::NormalI2s,
            ratio: DEFAULT_RATIO,
            sclk_inverted: false,
            dmic_pairs: Vec::new(),
            requested_dmic_pairs: 0,
            mic_gain: MicGain::UNITY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Reference board populated with `chip_count` chips (at most four).
    pub fn reference(chip_count: usize) -> Self {
        let count = chip_count.min(DEFAULT_ADDRESSES.len());
        Self::new(DEFAULT_ADDRESSES.get(..count).unwrap_or(&[]))
    }

    /// Use `mode` for the serial audio port.
    #[must_use]
    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use MCLK:LRCK `ratio`.
    #[must_use]
    pub fn with_ratio(mut self, ratio: u32) -> Self {
        self.ratio = ratio;
        self
    }

    /// Sample on the inverted SCLK edge.
    #[must_use]
    pub fn with_sclk_inverted(mut self, inverted: bool) -> Self {
        self.sclk_inverted = inverted;
        self
    }

    /// Digital-mic enables, one flag per channel pair in channel order.
    ///
    /// An empty list leaves every pair on its analog input; otherwise the
    /// list must hold exactly two flags per chip.
    #[must_use]
    pub fn with_dmic_pairs(mut self, flags: &[bool]) -> Self {
        self.dmic_pairs.clear();
        for &flag in flags.iter().take(MAX_DMIC_PAIRS) {
            // Bounded by take(MAX_DMIC_PAIRS).
            let _ = self.dmic_pairs.push(flag);
        }
        self.requested_dmic_pairs = flags.len();
        self
    }

    /// Channels actually used on each chip (`1..=4`).
    #[must_use]
    pub fn with_channels_per_chip(mut self, channels: u8) -> Self {
        self.channels_per_chip = channels;
        self
    }

    /// PGA gain applied to every channel at bring-up.
    #[must_use]
    pub fn with_mic_gain(mut self, gain: MicGain) -> Self {
        self.mic_gain = gain;
        self
    }

    /// Pop-suppression window between stream start and the first unmute.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Check everything that can be checked without talking to the chips.
    ///
    /// The clock ratio is resolved at probe time, where a miss aborts
    /// bring-up before the first register write.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.requested_chips == 0 {
            return Err(ConfigurationError::NoChips);
        }
        if self.requested_chips > MAX_CHIPS {
            return Err(ConfigurationError::TooManyChips(self.requested_chips, MAX_CHIPS));
        }
        for (i, address) in self.addresses.iter().enumerate() {
            if self.addresses.iter().skip(i.saturating_add(1)).any(|a| a == address) {
                return Err(ConfigurationError::DuplicateAddress(*address));
            }
        }
        if !(1..=CHANNELS_PER_CHIP).contains(&self.channels_per_chip) {
            return Err(ConfigurationError::ChannelsPerChip(self.channels_per_chip));
        }
        let expected = self.chip_count().saturating_mul(2);
        if self.requested_dmic_pairs != 0 && self.requested_dmic_pairs != expected {
            return Err(ConfigurationError::DmicGroupCount {
                found: self.requested_dmic_pairs,
                expected,
            });
        }
        Ok(())
    }

    /// Chip addresses in channel-group order.
    pub fn addresses(&self) -> &[u8] {
        &self.addresses
    }

    /// Number of chips.
    pub fn chip_count(&self) -> usize {
        self.addresses.len()
    }

    /// Channels used on each chip.
    pub fn channels_per_chip(&self) -> u8 {
        self.channels_per_chip
    }

    /// Channels of the whole device.
    pub fn total_channels(&self) -> u8 {
        u8::try_from(self.chip_count())
            .unwrap_or(u8::MAX)
            .saturating_mul(self.channels_per_chip)
    }

    /// TDM slots in the serial frame: every chip drives four slots however
    /// many of its channels are used.
    pub fn frame_slots(&self) -> u8 {
        u8::try_from(self.chip_count())
            .unwrap_or(u8::MAX)
            .saturating_mul(CHANNELS_PER_CHIP)
    }

    /// Serial port mode.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// MCLK:LRCK ratio.
    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// SCLK polarity.
    pub fn sclk_inverted(&self) -> bool {
        self.sclk_inverted
    }

    /// Digital-mic pair flags (may be empty).
    pub fn dmic_pairs(&self) -> &[bool] {
        &self.dmic_pairs
    }

    /// Bring-up PGA gain.
    pub fn mic_gain(&self) -> MicGain {
        self.mic_gain
    }

    /// Pop-suppression window.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_slots_ignore_unused_channels() {
        let config = DeviceConfig::reference(4).with_channels_per_chip(2);
        assert_eq!(config.total_channels(), 8);
        assert_eq!(config.frame_slots(), 16);
    }

    #[test]
    fn reference_truncates_default_addresses() {
        let config = DeviceConfig::reference(2);
        assert_eq!(config.addresses(), [0x40, 0x43]);
        assert_eq!(config.total_channels(), 8);
        assert_eq!(config.frame_slots(), 8);
        assert_eq!(config.ratio(), 256);
        assert_eq!(config.mode(), OperatingMode::NormalI2s);
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reference_caps_at_four_chips() {
        assert_eq!(DeviceConfig::reference(9).chip_count(), 4);
    }

    #[test]
    fn empty_config_is_rejected() {
        assert_eq!(DeviceConfig::new(&[]).validate(), Err(ConfigurationError::NoChips));
    }

    #[test]
    fn too_many_chips_is_rejected() {
        let addresses = [0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48];
        assert_eq!(
            DeviceConfig::new(&addresses).validate(),
            Err(ConfigurationError::TooManyChips(9, MAX_CHIPS))
        );
    }

    #[test]
    fn duplicate_address_is_rejected() {
        assert_eq!(
            DeviceConfig::new(&[0x40, 0x41, 0x40]).validate(),
            Err(ConfigurationError::DuplicateAddress(0x40))
        );
    }

    #[test]
    fn channels_per_chip_must_be_1_to_4() {
        let base = DeviceConfig::reference(1);
        assert!(base.clone().with_channels_per_chip(1).validate().is_ok());
        assert_eq!(
            base.clone().with_channels_per_chip(0).validate(),
            Err(ConfigurationError::ChannelsPerChip(0))
        );
        assert_eq!(
            base.with_channels_per_chip(5).validate(),
            Err(ConfigurationError::ChannelsPerChip(5))
        );
    }

    #[test]
    fn dmic_flags_need_two_per_chip() {
        let config = DeviceConfig::reference(2).with_dmic_pairs(&[true, false, true]);
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::DmicGroupCount { found: 3, expected: 4 })
        );
        let config = DeviceConfig::reference(2).with_dmic_pairs(&[true, false, true, true]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nlrck_head_is_chip_zero() {
        let mode = OperatingMode::TdmNlrckDspA;
        assert_eq!(mode.tdm_control(0), TDM_NLRCK_HEAD);
        assert_eq!(mode.tdm_control(1), TDM_NLRCK_FOLLOW);
        assert_eq!(mode.tdm_control(3), TDM_NLRCK_FOLLOW);
    }

    #[test]
    fn one_lrck_modes_depend_on_slot_format() {
        assert_eq!(OperatingMode::Tdm1lrckDspB.tdm_control(2), TDM_1LRCK_DSP);
        assert_eq!(OperatingMode::Tdm1lrckLj.tdm_control(0), TDM_1LRCK_I2S);
        assert_eq!(OperatingMode::NormalDspA.tdm_control(0), TDM_OFF);
    }

    #[test]
    fn only_nlrck_modes_are_multi_frame() {
        assert!(OperatingMode::TdmNlrckLj.is_multi_frame());
        assert!(!OperatingMode::Tdm1lrckLj.is_multi_frame());
        assert!(!OperatingMode::NormalLj.is_multi_frame());
    }

    #[test]
    fn dsp_b_sets_bit_4() {
        assert_eq!(OperatingMode::NormalDspB.sdp_format(), 0x13);
        assert_eq!(OperatingMode::NormalDspA.sdp_format(), 0x03);
    }
}
