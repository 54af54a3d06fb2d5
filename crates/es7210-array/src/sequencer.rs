//! Mute and power state machine.
//!
//! `PowerSequencer` is a pure, allocation-free state machine. It performs no
//! I/O: every transition returns the [`PowerAction`] the caller must apply to
//! the chips. [`AdcArray`](crate::AdcArray) owns one, behind the device lock,
//! and carries out the actions through its [`ChipSet`](crate::ChipSet).
//!
//! ```text
//!                 bring_up
//! Uninitialized ──────────▶ Muted ◀──── mute ──── Active
//!                             │  ────── unmute ─────▶ ▲
//!             stream_start    │                       │
//!             (latch clear)   ▼                       │
//!                        PendingUnmute ─ settle ──────┘
//!                                        (sets latch)
//!
//! Muted | PendingUnmute | Active ── suspend ──▶ Suspended ── resume ──▶ previous
//! ```
//!
//! The latch is set once, the first time the settle window elapses. Later
//! stream starts never re-arm the window.
//!
//! A pending unmute counts as muted for suspend: the window is dropped and
//! re-armed by the next stream start after resume.

use embassy_time::{Duration, Instant};

use crate::error::SequencerError;

/// Power and mute state of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Not brought up yet, or bring-up failed.
    Uninitialized,
    /// Powered, mute bits set.
    Muted,
    /// Powered and muted, unmute scheduled for `deadline`.
    PendingUnmute {
        /// When the settle window closes.
        deadline: Instant,
    },
    /// Powered, mute bits clear.
    Active,
    /// Analog paths and clocks powered down.
    Suspended,
}

impl PowerState {
    /// State without its payload.
    pub fn kind(&self) -> PowerStateKind {
        match self {
            Self::Uninitialized => PowerStateKind::Uninitialized,
            Self::Muted => PowerStateKind::Muted,
            Self::PendingUnmute { .. } => PowerStateKind::PendingUnmute,
            Self::Active => PowerStateKind::Active,
            Self::Suspended => PowerStateKind::Suspended,
        }
    }

    /// Whether capture data is currently muted at the chips.
    pub fn is_muted(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// [`PowerState`] discriminant, for errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum PowerStateKind {
    Uninitialized,
    Muted,
    PendingUnmute,
    Active,
    Suspended,
}

/// Inputs of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerEvent {
    /// Bring-up sequence completed.
    BringUp,
    /// A capture stream is starting.
    StreamStart,
    /// The settle timer fired.
    SettleElapsed,
    /// Digital mute requested.
    Mute,
    /// Digital unmute requested.
    Unmute,
    /// System suspend.
    Suspend,
    /// System resume.
    Resume,
}

/// Register work the caller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerAction {
    /// Nothing to write.
    None,
    /// Set the mute bits on every chip.
    Mute,
    /// Clear the mute bits on every chip.
    Unmute,
    /// Start (or restart) the settle timer for `deadline`.
    ArmSettleTimer {
        /// Absolute expiry.
        deadline: Instant,
    },
    /// Set the mute bits, then power down analog paths and clocks.
    PowerDown,
    /// Power clocks and analog paths back up, resync the register cache
    /// once, restart the chips, then restore the mute bits.
    PowerUp {
        /// Whether the mute bits end up set.
        muted: bool,
    },
}

/// Pure power/mute state machine.
#[derive(Debug, Clone)]
pub struct PowerSequencer {
    state: PowerState,
    initialized: bool,
    resume_to: PowerState,
}

impl Default for PowerSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSequencer {
    /// Fresh sequencer in [`PowerState::Uninitialized`] with the latch clear.
    pub const fn new() -> Self {
        Self {
            state: PowerState::Uninitialized,
            initialized: false,
            resume_to: PowerState::Muted,
        }
    }

    /// Current state.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Whether the first settle window has elapsed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn reject(&self, event: PowerEvent) -> SequencerError {
        SequencerError {
            state: self.state.kind(),
            event,
        }
    }

    /// Bring-up finished with the mute bits forced.
    ///
    /// - `Uninitialized → Muted`
    pub fn bring_up(&mut self) -> Result<(), SequencerError> {
        match self.state {
            PowerState::Uninitialized => {
                self.state = PowerState::Muted;
                Ok(())
            }
            _ => Err(self.reject(PowerEvent::BringUp)),
        }
    }

    /// A capture stream starts at `now`.
    ///
    /// - `Muted → PendingUnmute` while the latch is clear, arming the timer
    /// - `Muted → Muted` once the latch is set
    /// - `PendingUnmute`, `Active` unchanged
    pub fn stream_start(
        &mut self,
        now: Instant,
        settle: Duration,
    ) -> Result<PowerAction, SequencerError> {
        match self.state {
            PowerState::Muted if !self.initialized => {
                let deadline = now.checked_add(settle).unwrap_or(Instant::MAX);
                self.state = PowerState::PendingUnmute { deadline };
                Ok(PowerAction::ArmSettleTimer { deadline })
            }
            PowerState::Muted | PowerState::PendingUnmute { .. } | PowerState::Active => {
                Ok(PowerAction::None)
            }
            PowerState::Uninitialized | PowerState::Suspended => {
                Err(self.reject(PowerEvent::StreamStart))
            }
        }
    }

    /// The timer armed for `deadline` fired.
    ///
    /// Only the window currently pending is honoured. A timer for a window
    /// that was cancelled or replaced yields [`PowerAction::None`].
    pub fn settle_elapsed(&mut self, deadline: Instant) -> PowerAction {
        match self.state {
            PowerState::PendingUnmute { deadline: pending } if pending == deadline => {
                self.state = PowerState::Active;
                self.initialized = true;
                PowerAction::Unmute
            }
            _ => PowerAction::None,
        }
    }

    /// Digital mute.
    ///
    /// - `Active`, `Muted` → `Muted`
    /// - `PendingUnmute → Muted`, cancelling the window
    /// - `Suspended` stays suspended and resumes muted
    pub fn mute(&mut self) -> Result<PowerAction, SequencerError> {
        match self.state {
            PowerState::Active | PowerState::Muted | PowerState::PendingUnmute { .. } => {
                self.state = PowerState::Muted;
                Ok(PowerAction::Mute)
            }
            PowerState::Suspended => {
                self.resume_to = PowerState::Muted;
                Ok(PowerAction::None)
            }
            PowerState::Uninitialized => Err(self.reject(PowerEvent::Mute)),
        }
    }

    /// Digital unmute.
    ///
    /// - `Muted`, `Active` → `Active`
    /// - `PendingUnmute` unchanged: the settle window still decides
    /// - `Suspended` stays suspended and resumes unmuted
    pub fn unmute(&mut self) -> Result<PowerAction, SequencerError> {
        match self.state {
            PowerState::Muted | PowerState::Active => {
                self.state = PowerState::Active;
                Ok(PowerAction::Unmute)
            }
            PowerState::PendingUnmute { .. } => Ok(PowerAction::None),
            PowerState::Suspended => {
                self.resume_to = PowerState::Active;
                Ok(PowerAction::None)
            }
            PowerState::Uninitialized => Err(self.reject(PowerEvent::Unmute)),
        }
    }

    /// System suspend.
    ///
    /// - `Active`, `Muted`, `PendingUnmute` → `Suspended`
    /// - `Suspended` unchanged
    pub fn suspend(&mut self) -> Result<PowerAction, SequencerError> {
        let resume_to = match self.state {
            PowerState::Active => PowerState::Active,
            PowerState::Muted | PowerState::PendingUnmute { .. } => PowerState::Muted,
            PowerState::Suspended => return Ok(PowerAction::None),
            PowerState::Uninitialized => return Err(self.reject(PowerEvent::Suspend)),
        };
        self.resume_to = resume_to;
        self.state = PowerState::Suspended;
        Ok(PowerAction::PowerDown)
    }

    /// System resume.
    ///
    /// - `Suspended →` the state before suspend (`Active` or `Muted`)
    pub fn resume(&mut self) -> Result<PowerAction, SequencerError> {
        match self.state {
            PowerState::Suspended => {
                self.state = self.resume_to;
                Ok(PowerAction::PowerUp {
                    muted: self.state.is_muted(),
                })
            }
            _ => Err(self.reject(PowerEvent::Resume)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    const SETTLE: Duration = Duration::from_millis(100);

    fn muted() -> PowerSequencer {
        let mut seq = PowerSequencer::new();
        seq.bring_up().unwrap();
        seq
    }

    fn active() -> PowerSequencer {
        let mut seq = muted();
        let PowerAction::ArmSettleTimer { deadline } =
            seq.stream_start(Instant::from_ticks(0), SETTLE).unwrap()
        else {
            panic!("stream start must arm the timer");
        };
        assert_eq!(seq.settle_elapsed(deadline), PowerAction::Unmute);
        seq
    }

    #[test]
    fn bring_up_mutes() {
        let seq = muted();
        assert_eq!(seq.state(), PowerState::Muted);
        assert!(!seq.is_initialized());
    }

    #[test]
    fn bring_up_twice_is_rejected() {
        let mut seq = muted();
        assert_eq!(
            seq.bring_up(),
            Err(SequencerError {
                state: PowerStateKind::Muted,
                event: PowerEvent::BringUp
            })
        );
    }

    #[test]
    fn first_stream_start_arms_settle_window() {
        let mut seq = muted();
        let now = Instant::from_millis(5);
        let action = seq.stream_start(now, SETTLE).unwrap();
        let deadline = Instant::from_millis(105);
        assert_eq!(action, PowerAction::ArmSettleTimer { deadline });
        assert_eq!(seq.state(), PowerState::PendingUnmute { deadline });
    }

    #[test]
    fn settle_sets_latch_and_unmutes() {
        let seq = active();
        assert_eq!(seq.state(), PowerState::Active);
        assert!(seq.is_initialized());
    }

    #[test]
    fn latch_prevents_rearm() {
        let mut seq = active();
        assert_eq!(
            seq.stream_start(Instant::from_millis(500), SETTLE).unwrap(),
            PowerAction::None
        );
        seq.mute().unwrap();
        assert_eq!(
            seq.stream_start(Instant::from_millis(600), SETTLE).unwrap(),
            PowerAction::None
        );
        assert_eq!(seq.state(), PowerState::Muted);
    }

    #[test]
    fn mute_cancels_pending_window() {
        let mut seq = muted();
        let PowerAction::ArmSettleTimer { deadline } =
            seq.stream_start(Instant::from_ticks(0), SETTLE).unwrap()
        else {
            panic!("expected timer");
        };
        assert_eq!(seq.mute().unwrap(), PowerAction::Mute);
        assert_eq!(seq.settle_elapsed(deadline), PowerAction::None);
        assert_eq!(seq.state(), PowerState::Muted);
        assert!(!seq.is_initialized());
    }

    #[test]
    fn stale_timer_does_not_fire_rearmed_window() {
        let mut seq = muted();
        let first = seq.stream_start(Instant::from_millis(0), SETTLE).unwrap();
        seq.mute().unwrap();
        let second = seq.stream_start(Instant::from_millis(50), SETTLE).unwrap();
        let (PowerAction::ArmSettleTimer { deadline: old }, PowerAction::ArmSettleTimer { deadline: new }) =
            (first, second)
        else {
            panic!("both starts must arm");
        };
        assert_eq!(seq.settle_elapsed(old), PowerAction::None);
        assert_eq!(seq.settle_elapsed(new), PowerAction::Unmute);
    }

    #[test]
    fn unmute_during_window_keeps_waiting() {
        let mut seq = muted();
        seq.stream_start(Instant::from_ticks(0), SETTLE).unwrap();
        assert_eq!(seq.unmute().unwrap(), PowerAction::None);
        assert_eq!(seq.state().kind(), PowerStateKind::PendingUnmute);
    }

    #[test]
    fn explicit_unmute_does_not_set_latch() {
        let mut seq = muted();
        assert_eq!(seq.unmute().unwrap(), PowerAction::Unmute);
        assert_eq!(seq.state(), PowerState::Active);
        assert!(!seq.is_initialized());
    }

    #[test]
    fn suspend_resume_restores_active() {
        let mut seq = active();
        assert_eq!(seq.suspend().unwrap(), PowerAction::PowerDown);
        assert_eq!(seq.state(), PowerState::Suspended);
        assert_eq!(seq.resume().unwrap(), PowerAction::PowerUp { muted: false });
        assert_eq!(seq.state(), PowerState::Active);
    }

    #[test]
    fn suspend_from_pending_resumes_muted() {
        let mut seq = muted();
        seq.stream_start(Instant::from_ticks(0), SETTLE).unwrap();
        seq.suspend().unwrap();
        assert_eq!(seq.resume().unwrap(), PowerAction::PowerUp { muted: true });
        assert_eq!(seq.state(), PowerState::Muted);
    }

    #[test]
    fn mute_while_suspended_applies_on_resume() {
        let mut seq = active();
        seq.suspend().unwrap();
        assert_eq!(seq.mute().unwrap(), PowerAction::None);
        assert_eq!(seq.resume().unwrap(), PowerAction::PowerUp { muted: true });
    }

    #[test]
    fn events_before_bring_up_are_rejected() {
        let mut seq = PowerSequencer::new();
        assert!(seq.stream_start(Instant::from_ticks(0), SETTLE).is_err());
        assert!(seq.mute().is_err());
        assert!(seq.unmute().is_err());
        assert!(seq.suspend().is_err());
        assert!(seq.resume().is_err());
        assert_eq!(seq.state(), PowerState::Uninitialized);
    }

    #[test]
    fn resume_without_suspend_is_rejected() {
        let mut seq = active();
        assert_eq!(
            seq.resume(),
            Err(SequencerError {
                state: PowerStateKind::Active,
                event: PowerEvent::Resume
            })
        );
    }

    #[test]
    fn stream_start_while_suspended_is_rejected() {
        let mut seq = active();
        seq.suspend().unwrap();
        assert!(seq.stream_start(Instant::from_ticks(0), SETTLE).is_err());
    }

    #[test]
    fn deadline_saturates() {
        let mut seq = muted();
        let action = seq.stream_start(Instant::MAX, SETTLE).unwrap();
        assert_eq!(action, PowerAction::ArmSettleTimer { deadline: Instant::MAX });
    }
}
