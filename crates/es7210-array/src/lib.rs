//! Control layer for ganged ES7210 ADCs
//!
//! Several Everest ES7210 4-channel audio ADCs share one I²C bus and one
//! serial audio frame. This crate makes them behave as a single capture
//! device with `4 × N` channels: it derives register values from a
//! declarative [`DeviceConfig`], replicates them across every chip, and
//! sequences mute/unmute so that stream start does not produce a pop.
//!
//! # Architecture Layers
//!
//! ```text
//! Audio framework glue (probe, startup, hw_params, mute, suspend, resume)
//!         ↓
//! AdcArray (this crate: device lock, power sequencing, bring-up)
//!         ↓
//! ChipSet (broadcast / per-chip register access, register cache)
//!         ↓
//! RegisterBus (embedded-hal-async or embedded-hal I²C)
//! ```
//!
//! # Components
//!
//! - [`ratio`] - MCLK:LRCK ratio → main clock register values
//! - [`format`] - sample width → serial interface word-length field
//! - [`router`] - digital-mic pair enables → per-chip bitfields
//! - [`sequencer`] - pure mute/suspend state machine
//! - [`chip_set`] - broadcast register writes with per-chip error reporting
//! - [`device`] - [`AdcArray`], the device instance tying it all together
//!
//! # Features
//!
//! - `std`: implement `std::error::Error` on the error types
//! - `defmt`: firmware logging and `defmt::Format` derives
//! - `tracing`: host-side logging through `tracing`
//!
//! # Example
//!
//! ```no_run
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use es7210_array::{AdcArray, DeviceConfig, OperatingMode, SampleFormat};
//!
//! async fn bring_up<I: embedded_hal_async::i2c::I2c>(i2c: I) {
//!     let config = DeviceConfig::reference(2)
//!         .with_mode(OperatingMode::TdmNlrckI2s)
//!         .with_dmic_pairs(&[true, false, true, true]);
//!     let adc = AdcArray::<CriticalSectionRawMutex, _>::new(i2c, config).unwrap();
//!     adc.probe().await.unwrap();
//!     adc.hw_params(8, 48_000, SampleFormat::S24Le).await.unwrap();
//!     adc.startup().await.unwrap();
//!     // `adc.run_pop_suppression()` must be polled alongside (own task).
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this register-level driver crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: Send bounds not needed

#[macro_use]
mod log;

pub mod bus;
pub mod chip_set;
pub mod config;
pub mod debug;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod gain;
pub mod ratio;
pub mod registers;
pub mod router;
pub mod sequencer;

pub use bus::{Blocking, RegisterBus};
pub use chip_set::{ChipSet, RegisterPort, MAX_CHIPS};
pub use config::{DeviceConfig, OperatingMode};
pub use debug::{DebugCommand, DebugParseError};
pub use device::{AdcArray, DeviceStats};
pub use endpoint::CaptureEndpoint;
pub use error::{BroadcastError, BusError, ChipFailure, ConfigurationError, Error, SequencerError};
pub use format::SampleFormat;
pub use gain::MicGain;
pub use ratio::{RatioSetting, RatioTableEntry};
pub use sequencer::{PowerAction, PowerEvent, PowerSequencer, PowerState, PowerStateKind};
