//! Capture endpoint descriptor.
//!
//! One descriptor covers any chip count: the channel range grows with the
//! configuration instead of having a variant per channel tier.

use crate::config::DeviceConfig;
use crate::error::ConfigurationError;
use crate::format::SampleFormat;

/// Sample rates accepted by the serial port, in Hz.
pub const SUPPORTED_RATES: [u32; 10] = [
    8_000, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 64_000, 88_200, 96_000,
];

/// Formats with a native word-length setting.
pub const SUPPORTED_FORMATS: [SampleFormat; 4] = [
    SampleFormat::S16Le,
    SampleFormat::S20_3Le,
    SampleFormat::S24Le,
    SampleFormat::S32Le,
];

/// What the device advertises to the audio framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEndpoint {
    /// Stream name.
    pub name: &'static str,
    /// Fewest channels a stream may open.
    pub channels_min: u8,
    /// Most channels a stream may open.
    pub channels_max: u8,
    /// Accepted sample rates.
    pub rates: &'static [u32],
    /// Accepted sample formats.
    pub formats: &'static [SampleFormat],
    /// Playback and capture must share one rate.
    pub symmetric_rates: bool,
}

impl CaptureEndpoint {
    /// Stream name used for every configuration.
    pub const NAME: &'static str = "ES7210 4CH ADC";

    /// Descriptor for the channels `config` provides.
    pub fn for_config(config: &DeviceConfig) -> Self {
        Self {
            name: Self::NAME,
            channels_min: 1,
            channels_max: config.total_channels(),
            rates: &SUPPORTED_RATES,
            formats: &SUPPORTED_FORMATS,
            symmetric_rates: true,
        }
    }

    /// Whether `format` is advertised.
    ///
    /// Formats outside the list are still accepted by `hw_params` and run
    /// with the 16-bit word length.
    pub fn supports_format(&self, format: SampleFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Check stream parameters against the descriptor.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::ChannelCountMismatch`] or
    /// [`ConfigurationError::UnsupportedRate`].
    pub fn validate(&self, channels: u8, rate: u32) -> Result<(), ConfigurationError> {
        if channels < self.channels_min || channels > self.channels_max {
            return Err(ConfigurationError::ChannelCountMismatch {
                requested: channels,
                capacity: self.channels_max,
            });
        }
        if !self.rates.contains(&rate) {
            return Err(ConfigurationError::UnsupportedRate(rate));
        }
        Ok(())
    }
}
