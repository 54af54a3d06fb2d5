//! ES7210 register map
//!
//! Source: Everest Semiconductor ES7210 datasheet and the vendor reference
//! driver. Every component of the crate refers to registers and bitfields
//! through the names in this module; no other module spells a raw register
//! address.
//!
//! # Key I²C Constraints
//!
//! ## Single-byte register access
//! Registers are 8 bits wide with 8-bit addresses. The driver always reads
//! and writes exactly one register per transaction.
//!
//! ## Mute registers
//! Register 0x14 (ADC3/4) and 0x15 (ADC1/2) carry the digital mute controls in
//! bits \[1:0\]. The orchestration layer always sets or clears both bits on
//! both registers together.
//!
//! ## Power-down registers
//! 0x4B / 0x4C power down the MIC1/2 and MIC3/4 analog paths when written
//! with 0xFF. Clock gating lives in register 0x01.

// ---------------------------------------------------------------------------
// Chip addresses
// ---------------------------------------------------------------------------

/// Default 7-bit addresses in channel-group order.
///
/// | Chip | AD1 | AD0 | Address | Channels |
/// |------|-----|-----|---------|----------|
/// | 0    | 0   | 0   | `0x40`  | 1–4      |
/// | 1    | 1   | 1   | `0x43`  | 5–8      |
/// | 2    | 1   | 0   | `0x42`  | 9–12     |
/// | 3    | 0   | 1   | `0x41`  | 13–16    |
pub const DEFAULT_ADDRESSES: [u8; 4] = [0x40, 0x43, 0x42, 0x41];

/// Number of capture channels provided by one chip.
pub const CHANNELS_PER_CHIP: u8 = 4;

// ---------------------------------------------------------------------------
// Register addresses
// ---------------------------------------------------------------------------

/// Reset control. 0xFF resets, 0x41 releases and starts the state machine.
pub const REG00_RESET: u8 = 0x00;
/// Clock gating for the digital blocks (see `CLOCK_OFF_*`).
pub const REG01_CLOCK_OFF: u8 = 0x01;
/// Main clock: ADC divider, clock doubler, DLL select.
pub const REG02_MAIN_CLOCK: u8 = 0x02;
/// Master clock source.
pub const REG03_MASTER_CLOCK: u8 = 0x03;
/// LRCK divider, high byte (master mode only).
pub const REG04_LRCK_DIV_H: u8 = 0x04;
/// LRCK divider, low byte (master mode only).
pub const REG05_LRCK_DIV_L: u8 = 0x05;
/// Power-down / clock-frequency control paired with REG02 by the ratio tables.
pub const REG06_POWER_DOWN: u8 = 0x06;
/// Oversampling ratio.
pub const REG07_OSR: u8 = 0x07;
/// Mode configuration: master/slave, SCLK polarity.
pub const REG08_MODE_CONFIG: u8 = 0x08;
/// Chip state-machine timing, part 0.
pub const REG09_TIME_CONTROL0: u8 = 0x09;
/// Chip state-machine timing, part 1.
pub const REG0A_TIME_CONTROL1: u8 = 0x0A;
/// Digital microphone (PDM) control.
pub const REG10_DMIC_CONTROL: u8 = 0x10;
/// Serial data port 1: word length \[7:5\], format \[1:0\], DSP-B select \[4\].
pub const REG11_SDP_INTERFACE1: u8 = 0x11;
/// Serial data port 2: TDM control \[2:0\].
pub const REG12_SDP_INTERFACE2: u8 = 0x12;
/// ADC automute.
pub const REG13_ADC_AUTOMUTE: u8 = 0x13;
/// ADC3/ADC4 mute control.
pub const REG14_ADC34_MUTE: u8 = 0x14;
/// ADC1/ADC2 mute control.
pub const REG15_ADC12_MUTE: u8 = 0x15;
/// ADC3/ADC4 high-pass filter, stage 2.
pub const REG20_ADC34_HPF2: u8 = 0x20;
/// ADC3/ADC4 high-pass filter, stage 1.
pub const REG21_ADC34_HPF1: u8 = 0x21;
/// ADC1/ADC2 high-pass filter, stage 1.
pub const REG22_ADC12_HPF1: u8 = 0x22;
/// ADC1/ADC2 high-pass filter, stage 2.
pub const REG23_ADC12_HPF2: u8 = 0x23;
/// Analog system control (VMID, reference).
pub const REG40_ANALOG: u8 = 0x40;
/// MIC1/MIC2 bias.
pub const REG41_MIC12_BIAS: u8 = 0x41;
/// MIC3/MIC4 bias.
pub const REG42_MIC34_BIAS: u8 = 0x42;
/// MIC1 PGA gain. MIC2–MIC4 follow at consecutive addresses.
pub const REG43_MIC1_GAIN: u8 = 0x43;
/// MIC2 PGA gain.
pub const REG44_MIC2_GAIN: u8 = 0x44;
/// MIC3 PGA gain.
pub const REG45_MIC3_GAIN: u8 = 0x45;
/// MIC4 PGA gain.
pub const REG46_MIC4_GAIN: u8 = 0x46;
/// MIC1 low-power control. MIC2–MIC4 follow at consecutive addresses.
pub const REG47_MIC1_POWER: u8 = 0x47;
/// MIC2 low-power control.
pub const REG48_MIC2_POWER: u8 = 0x48;
/// MIC3 low-power control.
pub const REG49_MIC3_POWER: u8 = 0x49;
/// MIC4 low-power control.
pub const REG4A_MIC4_POWER: u8 = 0x4A;
/// MIC1/MIC2 analog power-down.
pub const REG4B_MIC12_POWER_DOWN: u8 = 0x4B;
/// MIC3/MIC4 analog power-down.
pub const REG4C_MIC34_POWER_DOWN: u8 = 0x4C;

/// One past the highest register address.
pub const REGISTER_COUNT: usize = 0x4D;

// ---------------------------------------------------------------------------
// Register field values
// ---------------------------------------------------------------------------

/// REG00: assert soft reset.
pub const RESET_ASSERT: u8 = 0xFF;
/// REG00: hold the state machine while the chip is configured.
pub const RESET_HOLD: u8 = 0x32;
/// REG00: restart the state machine with the new configuration.
pub const RESET_RESTART: u8 = 0x71;
/// REG00: release reset and start the power-up state machine.
pub const RESET_RELEASE: u8 = 0x41;

/// REG01: every digital clock running.
pub const CLOCK_ALL_ON: u8 = 0x00;

/// REG01 bits gated together with REG4B on suspend.
pub const CLOCK_OFF_MIC12: u8 = 0x2A;
/// REG01 bits gated together with REG4C on suspend.
pub const CLOCK_OFF_MIC34: u8 = 0x34;
/// REG01 bits re-enabled with REG4B on resume.
pub const CLOCK_ON_MIC12: u8 = 0x0A;
/// REG01 bits re-enabled with REG4C on resume.
pub const CLOCK_ON_MIC34: u8 = 0x14;

/// REG08: SCLK inverted.
pub const MODE_SCLK_INVERT: u8 = 0x08;

/// REG10: enable PDM input for the first channel pair of the chip.
pub const DMIC_PAIR_LOW: u8 = 0x40;
/// REG10: enable PDM input for the second channel pair of the chip.
pub const DMIC_PAIR_HIGH: u8 = 0x80;
/// REG10: both PDM enable bits.
pub const DMIC_MASK: u8 = DMIC_PAIR_LOW | DMIC_PAIR_HIGH;

/// REG11: word-length field mask (bits \[7:5\]).
pub const SDP_WORD_LENGTH_MASK: u8 = 0xE0;
/// REG11: word-length field position.
pub const SDP_WORD_LENGTH_SHIFT: u8 = 5;
/// REG11: serial format field (bits \[1:0\]) plus DSP-B select (bit 4).
pub const SDP_FORMAT_MASK: u8 = 0x13;
/// REG11 format: I²S.
pub const SDP_FORMAT_I2S: u8 = 0x00;
/// REG11 format: left justified.
pub const SDP_FORMAT_LJ: u8 = 0x01;
/// REG11 format: DSP/PCM mode A.
pub const SDP_FORMAT_DSP_A: u8 = 0x03;
/// REG11 format: DSP/PCM mode B.
pub const SDP_FORMAT_DSP_B: u8 = 0x13;

/// REG12: TDM control mask (bits \[2:0\]).
pub const TDM_MASK: u8 = 0x07;
/// REG12: plain two-channel serial port.
pub const TDM_OFF: u8 = 0x00;
/// REG12: TDM with one LRCK pulse per frame, DSP formats.
pub const TDM_1LRCK_DSP: u8 = 0x01;
/// REG12: TDM with one LRCK pulse per frame, I²S / LJ formats.
pub const TDM_1LRCK_I2S: u8 = 0x02;
/// REG12: N-LRCK TDM, chip driving the start of the frame.
pub const TDM_NLRCK_HEAD: u8 = 0x07;
/// REG12: N-LRCK TDM, chip following in the daisy chain.
pub const TDM_NLRCK_FOLLOW: u8 = 0x03;

/// REG14 / REG15: both digital mute bits.
pub const MUTE_MASK: u8 = 0x03;
/// REG14 / REG15: muted.
pub const MUTE_ON: u8 = 0x03;
/// REG14 / REG15: unmuted.
pub const MUTE_OFF: u8 = 0x00;

/// REG43–REG46: PGA gain field (bits \[3:0\]).
pub const GAIN_MASK: u8 = 0x0F;
/// REG43–REG46: PGA enable bit.
pub const GAIN_PGA_ENABLE: u8 = 0x10;

/// REG4B / REG4C: analog path powered down.
pub const MIC_POWER_DOWN: u8 = 0xFF;
/// REG4B / REG4C: analog path powered up.
pub const MIC_POWER_UP: u8 = 0x00;

/// Both mute registers, in the order they are written.
pub const MUTE_REGISTERS: [u8; 2] = [REG14_ADC34_MUTE, REG15_ADC12_MUTE];

/// Mode-independent configuration written to every chip during bring-up,
/// `(register, value)`, in order.
///
/// Chip timing, high-pass filters, analog reference, mic bias and the
/// per-mic low-power controls. Clock ratio, serial format, routing, gain and
/// mute are derived from the configuration and written separately.
pub const COMMON_SETUP: [(u8, u8); 16] = [
    (REG09_TIME_CONTROL0, 0x30),
    (REG0A_TIME_CONTROL1, 0x30),
    (REG23_ADC12_HPF2, 0x2A),
    (REG22_ADC12_HPF1, 0x0A),
    (REG20_ADC34_HPF2, 0x0A),
    (REG21_ADC34_HPF1, 0x2A),
    (REG40_ANALOG, 0xC3),
    (REG41_MIC12_BIAS, 0x70),
    (REG42_MIC34_BIAS, 0x70),
    (REG07_OSR, 0x20),
    (REG47_MIC1_POWER, 0x08),
    (REG48_MIC2_POWER, 0x08),
    (REG49_MIC3_POWER, 0x08),
    (REG4A_MIC4_POWER, 0x08),
    (REG4B_MIC12_POWER_DOWN, MIC_POWER_UP),
    (REG4C_MIC34_POWER_DOWN, MIC_POWER_UP),
];

/// Power-on register values, `(register, value)`.
///
/// Registers not listed (0x24–0x3C) are reserved and are never cached.
pub const RESET_DEFAULTS: [(u8, u8); 52] = [
    (0x00, 0x32), (0x01, 0x40), (0x02, 0x02), (0x03, 0x04),
    (0x04, 0x01), (0x05, 0x00), (0x06, 0x00), (0x07, 0x20),
    (0x08, 0x10), (0x09, 0x40), (0x0A, 0x40), (0x0B, 0x00),
    (0x0C, 0x00), (0x0D, 0x09), (0x0E, 0x00), (0x0F, 0x00),
    (0x10, 0x00), (0x11, 0x00), (0x12, 0x00), (0x13, 0x00),
    (0x14, 0x00), (0x15, 0x00), (0x16, 0x00), (0x17, 0x00),
    (0x18, 0xF7), (0x19, 0xF7), (0x1A, 0x00), (0x1B, 0xBF),
    (0x1C, 0xBF), (0x1D, 0xBF), (0x1E, 0xBF), (0x1F, 0x00),
    (0x20, 0x26), (0x21, 0x26), (0x22, 0x06), (0x23, 0x26),
    (0x3D, 0x72), (0x3E, 0x10), (0x3F, 0x00), (0x40, 0x80),
    (0x41, 0x71), (0x42, 0x71), (0x43, 0x00), (0x44, 0x00),
    (0x45, 0x00), (0x46, 0x00), (0x47, 0x00), (0x48, 0x00),
    (0x49, 0x00), (0x4A, 0x00), (0x4B, 0xFF), (0x4C, 0xFF),
];

/// Power-on value of `register`, if it has one.
pub fn reset_default(register: u8) -> Option<u8> {
    RESET_DEFAULTS
        .iter()
        .find(|(reg, _)| *reg == register)
        .map(|(_, value)| *value)
}

/// Registers that must never be replayed from the cache.
///
/// Writing REG00 again would reset the chip mid-stream.
pub fn is_volatile(register: u8) -> bool {
    register == REG00_RESET
}

/// PGA gain register for channel `0..=3` of one chip.
pub fn mic_gain_register(local_channel: u8) -> Option<u8> {
    match local_channel {
        0 => Some(REG43_MIC1_GAIN),
        1 => Some(REG44_MIC2_GAIN),
        2 => Some(REG45_MIC3_GAIN),
        3 => Some(REG46_MIC4_GAIN),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn default_addresses_match_reference_board() {
        assert_eq!(DEFAULT_ADDRESSES, [0x40, 0x43, 0x42, 0x41]);
    }
    #[test]
    fn mute_registers_are_0x14_and_0x15() {
        assert_eq!(MUTE_REGISTERS, [0x14, 0x15]);
    }
    #[test]
    fn dmic_bits_are_6_and_7() {
        assert_eq!(DMIC_PAIR_LOW, 1 << 6);
        assert_eq!(DMIC_PAIR_HIGH, 1 << 7);
    }
    #[test]
    fn word_length_field_is_bits_7_to_5() {
        assert_eq!(SDP_WORD_LENGTH_MASK >> SDP_WORD_LENGTH_SHIFT, 0b111);
    }
    #[test]
    fn resume_clock_bits_are_subset_of_suspend_bits() {
        assert_eq!(CLOCK_ON_MIC12 & !CLOCK_OFF_MIC12, 0);
        assert_eq!(CLOCK_ON_MIC34 & !CLOCK_OFF_MIC34, 0);
    }
    #[test]
    fn reset_defaults_are_sorted_and_unique() {
        for pair in RESET_DEFAULTS.windows(2) {
            if let [(a, _), (b, _)] = pair {
                assert!(a < b, "0x{a:02X} must precede 0x{b:02X}");
            }
        }
    }
    #[test]
    fn reset_defaults_fit_register_count() {
        for (reg, _) in RESET_DEFAULTS {
            assert!(usize::from(reg) < REGISTER_COUNT);
        }
    }
    #[test]
    fn power_down_registers_default_to_powered_down() {
        assert_eq!(reset_default(REG4B_MIC12_POWER_DOWN), Some(MIC_POWER_DOWN));
        assert_eq!(reset_default(REG4C_MIC34_POWER_DOWN), Some(MIC_POWER_DOWN));
    }
    #[test]
    fn reserved_registers_have_no_default() {
        assert_eq!(reset_default(0x30), None);
    }
    #[test]
    fn only_reset_register_is_volatile() {
        assert!(is_volatile(REG00_RESET));
        assert!(!is_volatile(REG14_ADC34_MUTE));
    }
    #[test]
    fn common_setup_never_touches_reset_or_mute() {
        for (reg, _) in COMMON_SETUP {
            assert!(!is_volatile(reg));
            assert!(!MUTE_REGISTERS.contains(&reg));
        }
    }
    #[test]
    fn mic_gain_registers_are_consecutive() {
        assert_eq!(mic_gain_register(0), Some(0x43));
        assert_eq!(mic_gain_register(3), Some(0x46));
        assert_eq!(mic_gain_register(4), None);
    }
}
