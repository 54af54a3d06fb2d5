//! Error types.
//!
//! Bus failures are reported per chip and aggregated in [`BroadcastError`];
//! configuration problems are [`ConfigurationError`]s and are always fatal
//! to the operation that found them.

use heapless::Vec;
use thiserror_no_std::Error as ThisError;

use crate::chip_set::MAX_CHIPS;
use crate::config::OperatingMode;
use crate::sequencer::{PowerEvent, PowerStateKind};

/// Transport failure reported by the register bus.
///
/// Mirrors [`embedded_hal::i2c::ErrorKind`] so the error types stay `Copy`
/// and independent of the concrete bus error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The chip did not acknowledge its address or data.
    #[error("no acknowledge")]
    NoAcknowledge,
    /// Another master took the bus.
    #[error("arbitration lost")]
    ArbitrationLoss,
    /// Misplaced START/STOP or other bus-level fault.
    #[error("bus error")]
    Bus,
    /// The controller could not keep up.
    #[error("overrun")]
    Overrun,
    /// Anything the transport could not classify.
    #[error("transport error")]
    Other,
}

impl From<embedded_hal::i2c::ErrorKind> for BusError {
    fn from(kind: embedded_hal::i2c::ErrorKind) -> Self {
        use embedded_hal::i2c::ErrorKind;
        match kind {
            ErrorKind::NoAcknowledge(_) => Self::NoAcknowledge,
            ErrorKind::ArbitrationLoss => Self::ArbitrationLoss,
            ErrorKind::Bus => Self::Bus,
            ErrorKind::Overrun => Self::Overrun,
            _ => Self::Other,
        }
    }
}

/// One chip that failed during a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipFailure {
    /// Position of the chip in the [`ChipSet`](crate::ChipSet).
    pub index: usize,
    /// 7-bit bus address of the chip.
    pub address: u8,
    /// Register the failed access targeted.
    pub register: u8,
    /// What the transport reported.
    pub error: BusError,
}

/// Aggregate result of a register operation that touched several chips.
///
/// The operation was attempted on every chip; only the chips listed here
/// failed. A chip appears at most once per operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, ThisError)]
#[error("register access failed on {} chip(s)", .failures.len())]
pub struct BroadcastError {
    failures: Vec<ChipFailure, MAX_CHIPS>,
}

impl BroadcastError {
    /// Empty failure list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed chip. Repeated failures of the same chip keep the first.
    pub fn record(&mut self, failure: ChipFailure) {
        if self.failures.iter().any(|f| f.index == failure.index) {
            return;
        }
        // Capacity equals MAX_CHIPS and indices are unique, so this never drops.
        let _ = self.failures.push(failure);
    }

    /// Fold another operation's failures into this one.
    pub fn merge(&mut self, other: BroadcastError) {
        for failure in other.failures {
            self.record(failure);
        }
    }

    /// `true` when no chip failed.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Every failed chip, in the order the failures happened.
    pub fn failures(&self) -> &[ChipFailure] {
        &self.failures
    }

    /// Indices of the failed chips.
    pub fn failed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.failures.iter().map(|f| f.index)
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), BroadcastError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Invalid or untabulated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// No ratio table entry matches the request.
    #[error("no clock ratio entry for {mode:?} at MCLK/LRCK {ratio} with {channels} channels")]
    UnsupportedRatio {
        /// Requested operating mode.
        mode: OperatingMode,
        /// Requested MCLK:LRCK ratio.
        ratio: u32,
        /// Total channel count used for the lookup.
        channels: u8,
    },
    /// More channels requested than the chips provide.
    #[error("{requested} channels requested, hardware provides {capacity}")]
    ChannelCountMismatch {
        /// Channels the stream asked for.
        requested: u8,
        /// Channels the configured chips provide.
        capacity: u8,
    },
    /// Sample rate outside the capture endpoint's range.
    #[error("sample rate {0} Hz is not supported")]
    UnsupportedRate(u32),
    /// The configuration lists no chip.
    #[error("no chips configured")]
    NoChips,
    /// More chips than [`MAX_CHIPS`]: `(configured, limit)`.
    #[error("{0} chips configured, at most {1} supported")]
    TooManyChips(usize, usize),
    /// Two chips share an address.
    #[error("address {0:#04x} used by more than one chip")]
    DuplicateAddress(u8),
    /// `channels_per_chip` outside `1..=4`.
    #[error("{0} channels per chip, expected 1..=4")]
    ChannelsPerChip(u8),
    /// Digital-mic flag list does not have two entries per chip.
    #[error("{found} digital-mic pair flags, expected {expected}")]
    DmicGroupCount {
        /// Flags supplied.
        found: usize,
        /// Flags needed (two per chip).
        expected: usize,
    },
    /// Channel index outside the device.
    #[error("channel {0} does not exist")]
    NoSuchChannel(u8),
    /// Chip index outside the set.
    #[error("chip {0} does not exist")]
    NoSuchChip(usize),
    /// PGA gain step above the largest supported step.
    #[error("gain step {0} out of range, expected 0..=14")]
    GainStep(u8),
}

/// Power event not allowed in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("{event:?} is not valid in state {state:?}")]
pub struct SequencerError {
    /// State the sequencer was in.
    pub state: PowerStateKind,
    /// Event that was rejected.
    pub event: PowerEvent,
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    /// Invalid configuration; nothing (further) was written.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Bring-up did not complete; the device stays uninitialized.
    #[error("bring-up failed: {0}")]
    BringUp(BroadcastError),
    /// Some chips did not accept a register operation.
    #[error("{0}")]
    Broadcast(#[from] BroadcastError),
    /// A single-chip access failed.
    #[error("chip {index}: {error}")]
    Bus {
        /// Chip index.
        index: usize,
        /// Transport error.
        error: BusError,
    },
    /// Power event rejected by the state machine.
    #[error("{0}")]
    Sequencer(#[from] SequencerError),
    /// The device has been torn down.
    #[error("device has been torn down")]
    Removed,
}

impl Error {
    /// Whether the caller must treat the device as unusable.
    ///
    /// Broadcast failures during runtime transitions are not fatal: the
    /// transition was committed and the remaining chips are configured.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Broadcast(_) | Self::Bus { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn failure(index: usize) -> ChipFailure {
        ChipFailure {
            index,
            address: 0x40,
            register: 0x14,
            error: BusError::NoAcknowledge,
        }
    }

    #[test]
    fn empty_broadcast_error_is_ok() {
        assert!(BroadcastError::new().into_result().is_ok());
    }

    #[test]
    fn record_keeps_one_entry_per_chip() {
        let mut err = BroadcastError::new();
        err.record(failure(1));
        err.record(ChipFailure { register: 0x15, ..failure(1) });
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures().first().unwrap().register, 0x14);
    }

    #[test]
    fn merge_combines_chips() {
        let mut a = BroadcastError::new();
        a.record(failure(0));
        let mut b = BroadcastError::new();
        b.record(failure(2));
        b.record(failure(0));
        a.merge(b);
        assert_eq!(a.failed_indices().collect::<std::vec::Vec<_>>(), [0, 2]);
    }

    #[test]
    fn bus_error_from_error_kind() {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        assert_eq!(
            BusError::from(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            BusError::NoAcknowledge
        );
        assert_eq!(BusError::from(ErrorKind::Other), BusError::Other);
    }

    #[test]
    fn broadcast_failures_are_not_fatal() {
        assert!(!Error::Broadcast(BroadcastError::new()).is_fatal());
        assert!(Error::Configuration(ConfigurationError::NoChips).is_fatal());
        assert!(Error::Removed.is_fatal());
        assert!(Error::BringUp(BroadcastError::new()).is_fatal());
    }

    #[test]
    fn unsupported_ratio_message_names_the_request() {
        let err = ConfigurationError::UnsupportedRatio {
            mode: OperatingMode::NormalI2s,
            ratio: 300,
            channels: 4,
        };
        let text = std::format!("{err}");
        assert!(text.contains("300"), "{text}");
        assert!(text.contains("NormalI2s"), "{text}");
    }
}
