//! The device instance.
//!
//! [`AdcArray`] owns the [`ChipSet`], the [`PowerSequencer`] and the
//! "initialized" latch behind one async mutex. Every power transition is
//! decided and carried out while that lock is held, so the deferred unmute
//! can never interleave with a mute, suspend or teardown request.
//!
//! # Tasks
//!
//! The deferred unmute runs in [`AdcArray::run_pop_suppression`], which the
//! application polls alongside its control path (its own Embassy task, or
//! `join` with the control future):
//!
//! ```text
//! startup() ── arm(deadline) ──▶ run_pop_suppression()
//!                                  │ Timer::at(deadline)
//!                                  ▼
//!                            lock → still pending? → clear mute bits
//! ```
//!
//! [`AdcArray::teardown`] marks the device removed under the lock and stops
//! the task; a timer that fires afterwards finds the device removed and does
//! nothing. [`AdcArray::release`] consumes the device, so the bus can only
//! be recovered once no task borrows it any more.
//!
//! # Failure policy
//!
//! Bring-up stops at the first step that fails on any chip and leaves the
//! device [`Uninitialized`](PowerState::Uninitialized). Runtime mute,
//! suspend and resume transitions always complete on the sequencer and on
//! every reachable chip; chips that failed are reported through a non-fatal
//! [`Error::Broadcast`].

use embassy_futures::select::{select, select3, Either, Either3};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};

use crate::bus::RegisterBus;
use crate::chip_set::ChipSet;
use crate::config::DeviceConfig;
use crate::debug::DebugCommand;
use crate::endpoint::CaptureEndpoint;
use crate::error::{BroadcastError, ConfigurationError, Error, SequencerError};
use crate::format::SampleFormat;
use crate::gain::MicGain;
use crate::ratio;
use crate::registers::{
    mic_gain_register, CLOCK_ALL_ON, CLOCK_OFF_MIC12, CLOCK_OFF_MIC34, CLOCK_ON_MIC12,
    CLOCK_ON_MIC34, COMMON_SETUP, GAIN_MASK, GAIN_PGA_ENABLE, MIC_POWER_DOWN,
    MIC_POWER_UP, MODE_SCLK_INVERT, MUTE_MASK, MUTE_OFF, MUTE_ON, MUTE_REGISTERS,
    REG00_RESET, REG01_CLOCK_OFF, REG02_MAIN_CLOCK, REG06_POWER_DOWN, REG08_MODE_CONFIG,
    REG10_DMIC_CONTROL, REG11_SDP_INTERFACE1, REG12_SDP_INTERFACE2, REG4B_MIC12_POWER_DOWN,
    REG4C_MIC34_POWER_DOWN, RESET_ASSERT, RESET_HOLD, RESET_RELEASE, RESET_RESTART,
    SDP_FORMAT_MASK, SDP_WORD_LENGTH_MASK, TDM_MASK,
};
use crate::router;
use crate::sequencer::{PowerAction, PowerEvent, PowerSequencer, PowerState};

/// Counters kept by the device, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceStats {
    /// Register cache resyncs requested (one per resume).
    pub cache_syncs: u32,
    /// Deferred unmutes that fired.
    pub deferred_unmutes: u32,
    /// Operations that reported at least one failed chip.
    pub broadcast_failures: u32,
}

struct Inner<B> {
    chips: ChipSet<B>,
    sequencer: PowerSequencer,
    removed: bool,
    stats: DeviceStats,
}

/// Ganged ES7210 chips operated as one capture device.
///
/// `M` selects the raw mutex guarding the device state
/// (`CriticalSectionRawMutex` when the deferred unmute runs on another
/// executor or interrupt priority, `NoopRawMutex` when everything shares one
/// executor).
pub struct AdcArray<M: RawMutex, B> {
    config: DeviceConfig,
    endpoint: CaptureEndpoint,
    inner: Mutex<M, Inner<B>>,
    arm: Signal<M, Instant>,
    shutdown: Signal<M, ()>,
}

impl<M: RawMutex, B: RegisterBus> AdcArray<M, B> {
    /// Validate `config` and take ownership of the bus.
    ///
    /// Nothing is written until [`probe`](Self::probe).
    pub fn new(bus: B, config: DeviceConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let chips = ChipSet::new(bus, config.addresses())?;
        let endpoint = CaptureEndpoint::for_config(&config);
        Ok(Self {
            config,
            endpoint,
            inner: Mutex::new(Inner {
                chips,
                sequencer: PowerSequencer::new(),
                removed: false,
                stats: DeviceStats::default(),
            }),
            arm: Signal::new(),
            shutdown: Signal::new(),
        })
    }

    /// Configuration the device was created with.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Capture endpoint advertised for this configuration.
    pub fn endpoint(&self) -> CaptureEndpoint {
        self.endpoint
    }

    /// Current power state.
    pub async fn power_state(&self) -> PowerState {
        self.inner.lock().await.sequencer.state()
    }

    /// Whether the first pop-suppression window has elapsed.
    pub async fn is_initialized(&self) -> bool {
        self.inner.lock().await.sequencer.is_initialized()
    }

    /// Diagnostic counters.
    pub async fn stats(&self) -> DeviceStats {
        self.inner.lock().await.stats
    }

    /// Run the bring-up sequence on every chip and enter
    /// [`Muted`](PowerState::Muted).
    ///
    /// The clock ratio is resolved first, keyed on the frame's slot count in
    /// N-LRCK modes; an untabulated ratio fails with
    /// [`ConfigurationError::UnsupportedRatio`] before any register write.
    /// A bus failure aborts with [`Error::BringUp`]. Either way the device
    /// stays uninitialized and `probe` may be retried.
    pub async fn probe(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        let from = inner.sequencer.state();
        if from != PowerState::Uninitialized {
            return Err(SequencerError {
                state: from.kind(),
                event: PowerEvent::BringUp,
            }
            .into());
        }

        let setting = ratio::resolve(
            self.config.mode(),
            self.config.ratio(),
            self.config.frame_slots(),
        )?;
        info!(
            "ES7210 bring-up: {} chips, ratio {} -> reg02 {:#x} reg06 {:#x}",
            inner.chips.len(),
            self.config.ratio(),
            setting.reg02,
            setting.reg06
        );

        let result = bring_up(&mut inner.chips, &self.config, setting).await;
        if let Err(failures) = result {
            inner.stats.broadcast_failures = inner.stats.broadcast_failures.saturating_add(1);
            error!("ES7210 bring-up failed on {} chip(s)", failures.failures().len());
            return Err(Error::BringUp(failures));
        }

        inner.sequencer.bring_up()?;
        info!("ES7210 bring-up complete, capture muted");
        Ok(())
    }

    /// A capture stream is starting.
    ///
    /// The first start after bring-up arms the pop-suppression window; the
    /// chips stay muted until [`run_pop_suppression`](Self::run_pop_suppression)
    /// sees the window elapse. Later starts do nothing.
    pub async fn startup(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        let action = inner
            .sequencer
            .stream_start(Instant::now(), self.config.settle_delay())?;
        if let PowerAction::ArmSettleTimer { deadline } = action {
            debug!("settle window armed for {} ms", self.config.settle_delay().as_millis());
            self.arm.signal(deadline);
        }
        Ok(())
    }

    /// Apply stream parameters.
    ///
    /// Channel count and rate are checked against the capture endpoint.
    /// The sample format sets the word length on every chip; formats without
    /// a native setting run with the 16-bit word length.
    pub async fn hw_params(
        &self,
        channels: u8,
        rate: u32,
        format: SampleFormat,
    ) -> Result<(), Error> {
        self.endpoint.validate(channels, rate)?;
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        if !format.is_native() {
            warn!("sample format {:?} has no word-length setting, using 16-bit", format);
        }
        let bits = format.register_bits();
        debug!("hw_params: {} ch @ {} Hz, REG11 word length {:#x}", channels, rate, bits);
        let result = inner
            .chips
            .update_bits(REG11_SDP_INTERFACE1, SDP_WORD_LENGTH_MASK, bits)
            .await;
        inner.report(result)
    }

    /// Digital mute control.
    ///
    /// Synchronous, no settle delay. Muting during the pop-suppression
    /// window cancels the pending unmute; unmuting during it leaves the
    /// window in charge.
    pub async fn set_mute(&self, mute: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        let action = if mute {
            inner.sequencer.mute()?
        } else {
            inner.sequencer.unmute()?
        };
        let result = inner.apply(action).await;
        inner.report(result)
    }

    /// System suspend: mute, then power down analog paths and clocks.
    pub async fn suspend(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        let action = inner.sequencer.suspend()?;
        let result = inner.apply(action).await;
        inner.report(result)
    }

    /// System resume: power up, resync the register cache, restart the chip
    /// state machines, restore the pre-suspend mute state.
    pub async fn resume(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        let action = inner.sequencer.resume()?;
        let result = inner.apply(action).await;
        inner.report(result)
    }

    /// Set the PGA gain of one device channel (0-based, channel order).
    pub async fn set_mic_gain(&self, channel: u8, gain: MicGain) -> Result<(), Error> {
        let per_chip = self.config.channels_per_chip();
        let chip = channel
            .checked_div(per_chip)
            .map(usize::from)
            .filter(|&chip| chip < self.config.chip_count())
            .ok_or(ConfigurationError::NoSuchChannel(channel))?;
        let register = channel
            .checked_rem(per_chip)
            .and_then(mic_gain_register)
            .ok_or(ConfigurationError::NoSuchChannel(channel))?;
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        debug!("channel {}: gain step {}", channel, gain.step());
        inner
            .chips
            .update_bits_one(chip, register, GAIN_PGA_ENABLE | GAIN_MASK, gain.register_value())
            .await
            .map_err(single_chip)
    }

    /// Read `buf.len()` consecutive registers of chip `chip` from `start`.
    ///
    /// Bypasses the register cache and the power sequencer.
    pub async fn raw_read(&self, chip: usize, start: u8, buf: &mut [u8]) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        if chip >= inner.chips.len() {
            return Err(ConfigurationError::NoSuchChip(chip).into());
        }
        for (register, slot) in registers_from(start).zip(buf.iter_mut()) {
            *slot = inner.chips.read_one(chip, register).await.map_err(single_chip)?;
            info!("chip {} REG[{:#x}] = {:#x}", chip, register, *slot);
        }
        Ok(())
    }

    /// Write `value` to `count` consecutive registers of chip `chip` from
    /// `start`.
    ///
    /// Bypasses the power sequencer: the sequencer's view of the mute state
    /// is not updated. Written values enter the register cache and are
    /// replayed after resume.
    pub async fn raw_write(&self, chip: usize, start: u8, count: u8, value: u8) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return Err(Error::Removed);
        }
        if chip >= inner.chips.len() {
            return Err(ConfigurationError::NoSuchChip(chip).into());
        }
        for register in registers_from(start).take(usize::from(count)) {
            info!("chip {}: write {:#x} to REG[{:#x}]", chip, value, register);
            inner
                .chips
                .write_one(chip, register, value)
                .await
                .map_err(single_chip)?;
        }
        Ok(())
    }

    /// Execute a [`DebugCommand`] on chip `chip`.
    ///
    /// Reads fill `out` (at most `out.len()` registers) and return how many
    /// were read. Writes return 0.
    pub async fn run_debug_command(
        &self,
        chip: usize,
        command: DebugCommand,
        out: &mut [u8],
    ) -> Result<usize, Error> {
        match command {
            DebugCommand::Write {
                start,
                count,
                value,
            } => {
                self.raw_write(chip, start, count, value).await?;
                Ok(0)
            }
            DebugCommand::Read { start, count } => {
                let n = usize::from(count).min(out.len());
                let dest = out.get_mut(..n).unwrap_or_default();
                self.raw_read(chip, start, dest).await?;
                Ok(n)
            }
        }
    }

    /// Mark the device removed and stop the pop-suppression task.
    ///
    /// Any pending unmute is cancelled; the chips stay in whatever state
    /// they are in. Every later call fails with [`Error::Removed`].
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.removed {
            inner.removed = true;
            if matches!(inner.sequencer.state(), PowerState::PendingUnmute { .. }) {
                debug!("teardown cancels pending unmute");
            }
            info!("ES7210 array removed");
        }
        self.shutdown.signal(());
    }

    /// Deferred-unmute task. Returns after [`teardown`](Self::teardown).
    ///
    /// Waits for a window armed by [`startup`](Self::startup), sleeps until
    /// its deadline and then clears the mute bits, provided the window is
    /// still the pending one. A re-armed window replaces the one being
    /// waited on.
    pub async fn run_pop_suppression(&self) {
        loop {
            let mut deadline = match select(self.arm.wait(), self.shutdown.wait()).await {
                Either::First(deadline) => deadline,
                Either::Second(()) => return,
            };
            loop {
                match select3(Timer::at(deadline), self.arm.wait(), self.shutdown.wait()).await {
                    Either3::First(()) => break,
                    Either3::Second(next) => deadline = next,
                    Either3::Third(()) => {
                        debug!("settle timer cancelled by teardown");
                        return;
                    }
                }
            }
            self.settle_elapsed(deadline).await;
        }
    }

    async fn settle_elapsed(&self, deadline: Instant) {
        let mut inner = self.inner.lock().await;
        if inner.removed {
            return;
        }
        let action = inner.sequencer.settle_elapsed(deadline);
        if action == PowerAction::None {
            debug!("settle window no longer pending");
            return;
        }
        inner.stats.deferred_unmutes = inner.stats.deferred_unmutes.saturating_add(1);
        info!("settle window elapsed, unmuting capture");
        let result = inner.apply(action).await;
        // Nobody to report to; the failure is logged per chip already.
        let _ = inner.report(result);
    }

    /// Give the bus back. Consumes the device.
    pub fn release(self) -> B {
        self.inner.into_inner().chips.release()
    }
}

impl<B: RegisterBus> Inner<B> {
    /// Carry out the register work for a committed transition.
    async fn apply(&mut self, action: PowerAction) -> Result<(), BroadcastError> {
        let mut failures = BroadcastError::new();
        match action {
            PowerAction::None | PowerAction::ArmSettleTimer { .. } => {}
            PowerAction::Mute => {
                debug!("power: mute");
                collect(&mut failures, set_mute_bits(&mut self.chips, true).await);
            }
            PowerAction::Unmute => {
                debug!("power: unmute");
                collect(&mut failures, set_mute_bits(&mut self.chips, false).await);
            }
            PowerAction::PowerDown => {
                info!("power: suspend");
                collect(&mut failures, set_mute_bits(&mut self.chips, true).await);
                let chips = &mut self.chips;
                collect(&mut failures, chips.write(REG4B_MIC12_POWER_DOWN, MIC_POWER_DOWN).await);
                collect(
                    &mut failures,
                    chips.update_bits(REG01_CLOCK_OFF, CLOCK_OFF_MIC12, CLOCK_OFF_MIC12).await,
                );
                collect(&mut failures, chips.write(REG4C_MIC34_POWER_DOWN, MIC_POWER_DOWN).await);
                collect(
                    &mut failures,
                    chips.update_bits(REG01_CLOCK_OFF, CLOCK_OFF_MIC34, CLOCK_OFF_MIC34).await,
                );
            }
            PowerAction::PowerUp { muted } => {
                info!("power: resume (muted: {})", muted);
                let chips = &mut self.chips;
                collect(&mut failures, chips.update_bits(REG01_CLOCK_OFF, CLOCK_ON_MIC12, 0).await);
                collect(&mut failures, chips.write(REG4B_MIC12_POWER_DOWN, MIC_POWER_UP).await);
                collect(&mut failures, chips.update_bits(REG01_CLOCK_OFF, CLOCK_ON_MIC34, 0).await);
                collect(&mut failures, chips.write(REG4C_MIC34_POWER_DOWN, MIC_POWER_UP).await);
                self.stats.cache_syncs = self.stats.cache_syncs.saturating_add(1);
                collect(&mut failures, self.chips.sync_cache().await.map(|_| ()));
                // A chip that lost power comes back held in reset.
                collect(&mut failures, self.chips.write(REG00_RESET, RESET_RESTART).await);
                collect(&mut failures, self.chips.write(REG00_RESET, RESET_RELEASE).await);
                collect(&mut failures, set_mute_bits(&mut self.chips, muted).await);
            }
        }
        failures.into_result()
    }

    /// Count and convert a runtime broadcast result.
    fn report(&mut self, result: Result<(), BroadcastError>) -> Result<(), Error> {
        result.map_err(|failures| {
            self.stats.broadcast_failures = self.stats.broadcast_failures.saturating_add(1);
            warn!(
                "{} chip(s) failed, transition to {:?} committed",
                failures.failures().len(),
                self.sequencer.state().kind()
            );
            Error::Broadcast(failures)
        })
    }
}

/// Register writes of the bring-up sequence, in order.
async fn bring_up<B: RegisterBus>(
    chips: &mut ChipSet<B>,
    config: &DeviceConfig,
    setting: ratio::RatioSetting,
) -> Result<(), BroadcastError> {
    chips.write(REG00_RESET, RESET_ASSERT).await?;
    chips.write(REG00_RESET, RESET_HOLD).await?;

    for (register, value) in COMMON_SETUP {
        chips.write(register, value).await?;
    }

    let mode = config.mode();
    let mut failures = BroadcastError::new();
    for index in 0..chips.len() {
        collect(
            &mut failures,
            chips
                .update_bits_one(index, REG11_SDP_INTERFACE1, SDP_FORMAT_MASK, mode.sdp_format())
                .await,
        );
        collect(
            &mut failures,
            chips
                .update_bits_one(index, REG12_SDP_INTERFACE2, TDM_MASK, mode.tdm_control(index))
                .await,
        );
    }
    failures.into_result()?;

    chips.write(REG02_MAIN_CLOCK, setting.reg02).await?;
    chips.write(REG06_POWER_DOWN, setting.reg06).await?;

    let mut failures = BroadcastError::new();
    for (index, bits) in router::routes(config.dmic_pairs(), chips.len()) {
        debug!("chip {}: dmic bits {:#x}", index, bits);
        collect(
            &mut failures,
            chips.update_bits_one(index, REG10_DMIC_CONTROL, router::ROUTE_MASK, bits).await,
        );
    }
    failures.into_result()?;

    let sclk = if config.sclk_inverted() {
        MODE_SCLK_INVERT
    } else {
        0
    };
    chips.update_bits(REG08_MODE_CONFIG, MODE_SCLK_INVERT, sclk).await?;

    let gain = config.mic_gain().register_value();
    for local in 0..config.channels_per_chip() {
        if let Some(register) = mic_gain_register(local) {
            chips.update_bits(register, GAIN_PGA_ENABLE | GAIN_MASK, gain).await?;
        }
    }

    set_mute_bits(chips, true).await?;

    chips.write(REG01_CLOCK_OFF, CLOCK_ALL_ON).await?;
    chips.write(REG00_RESET, RESET_RESTART).await?;
    chips.write(REG00_RESET, RESET_RELEASE).await
}

/// Set or clear both mute bits on both mute registers of every chip.
async fn set_mute_bits<B: RegisterBus>(
    chips: &mut ChipSet<B>,
    muted: bool,
) -> Result<(), BroadcastError> {
    let value = if muted { MUTE_ON } else { MUTE_OFF };
    let mut failures = BroadcastError::new();
    for register in MUTE_REGISTERS {
        collect(&mut failures, chips.update_bits(register, MUTE_MASK, value).await);
    }
    failures.into_result()
}

fn collect(failures: &mut BroadcastError, result: Result<(), BroadcastError>) {
    if let Err(more) = result {
        failures.merge(more);
    }
}

fn single_chip(failures: BroadcastError) -> Error {
    match failures.failures().first() {
        Some(failure) => Error::Bus {
            index: failure.index,
            error: failure.error,
        },
        None => Error::Broadcast(failures),
    }
}

fn registers_from(start: u8) -> impl Iterator<Item = u8> {
    core::iter::successors(Some(start), |r| Some(r.wrapping_add(1)))
}
