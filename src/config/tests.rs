//! Unit tests for configuration validation, presets and filters.
use super::*;
use crate::driver::message::TwaiMessage;
use embedded_can::{ExtendedId, StandardId};

//==================================================================================WIRING
#[test]
/// The reference profile must pass validation as-is.
fn test_default_config_is_valid() {
    let config = BackendConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.wiring.tx_gpio, 39);
    assert_eq!(config.wiring.rx_gpio, 40);
    assert_eq!(config.wiring.clkout_gpio, IO_UNUSED);
    assert_eq!(config.params.intr_flags, InterruptFlags::LEVEL1);
    assert!(config.tf.filter.is_accept_all());
}

#[test]
fn test_tx_rx_must_differ() {
    let wiring = WiringConfig::new(5, 5);
    assert_eq!(wiring.validate(), Err(ConfigError::SameTxRxPin { pin: 5 }));
}

#[test]
fn test_pin_range() {
    assert_eq!(
        WiringConfig::new(5, 49).validate(),
        Err(ConfigError::PinOutOfRange { pin: 49 })
    );

    let mut wiring = WiringConfig::new(5, 4);
    wiring.bus_off_gpio = Some(60);
    assert_eq!(wiring.validate(), Err(ConfigError::PinOutOfRange { pin: 60 }));
}

#[test]
/// Optional pins may not reuse TX, RX or each other.
fn test_optional_pin_conflicts() {
    let mut wiring = WiringConfig::new(5, 4);
    wiring.clkout_gpio = Some(4);
    assert_eq!(wiring.validate(), Err(ConfigError::PinConflict { pin: 4 }));

    wiring.clkout_gpio = Some(6);
    wiring.bus_off_gpio = Some(6);
    assert_eq!(wiring.validate(), Err(ConfigError::PinConflict { pin: 6 }));

    wiring.bus_off_gpio = Some(7);
    assert!(wiring.validate().is_ok());
}

//==================================================================================PARAMS
#[test]
fn test_queue_lengths_must_be_positive() {
    let mut params = ControllerParams::default();
    params.rx_queue_len = 0;
    assert_eq!(params.validate(), Err(ConfigError::EmptyQueue { queue: "RX" }));

    params.rx_queue_len = 20;
    params.tx_queue_len = 0;
    assert_eq!(params.validate(), Err(ConfigError::EmptyQueue { queue: "TX" }));
}

#[test]
/// Divider accepts 0, 1 and even values up to 14.
fn test_clkout_divider_values() {
    let mut params = ControllerParams::default();
    for divider in [0, 1, 2, 8, 14] {
        params.clkout_divider = divider;
        assert!(params.validate().is_ok(), "divider {divider} must be accepted");
    }
    for divider in [3, 13, 16] {
        params.clkout_divider = divider;
        assert_eq!(
            params.validate(),
            Err(ConfigError::InvalidClockDivider { divider })
        );
    }
}

#[test]
fn test_clkout_divider_requires_pin() {
    let mut config = BackendConfig::default();
    config.params.clkout_divider = 2;
    assert_eq!(config.validate(), Err(ConfigError::ClockOutPinMissing));

    config.wiring.clkout_gpio = Some(10);
    assert!(config.validate().is_ok());
}

//==================================================================================TIMING
#[test]
/// Every preset produces its nominal bit rate from the 80 MHz source clock.
fn test_timing_presets() {
    let presets = [
        (TimingConfig::BITRATE_25K, 25_000),
        (TimingConfig::BITRATE_50K, 50_000),
        (TimingConfig::BITRATE_100K, 100_000),
        (TimingConfig::BITRATE_125K, 125_000),
        (TimingConfig::BITRATE_250K, 250_000),
        (TimingConfig::BITRATE_500K, 500_000),
        (TimingConfig::BITRATE_800K, 800_000),
        (TimingConfig::BITRATE_1M, 1_000_000),
    ];
    for (timing, expected) in presets {
        assert!(timing.validate().is_ok());
        assert_eq!(timing.bitrate(DEFAULT_SOURCE_CLOCK_HZ), expected);
    }
}

#[test]
fn test_invalid_timing_fields() {
    let mut timing = TimingConfig::BITRATE_500K;
    timing.brp = 0;
    assert_eq!(timing.bitrate(DEFAULT_SOURCE_CLOCK_HZ), 0);
    assert_eq!(
        timing.validate(),
        Err(ConfigError::InvalidTiming { field: "brp" })
    );

    let mut timing = TimingConfig::BITRATE_500K;
    timing.sjw = 4;
    timing.tseg_2 = 3;
    assert_eq!(
        timing.validate(),
        Err(ConfigError::InvalidTiming { field: "sjw" })
    );

    let mut config = BackendConfig::default();
    config.tf.timing.tseg_1 = 0;
    assert_eq!(
        config.validate(),
        Err(ConfigError::InvalidTiming { field: "tseg_1" })
    );
}

//==================================================================================FILTER
#[test]
fn test_accept_all_matches_everything() {
    let filter = FilterConfig::ACCEPT_ALL;
    let standard = TwaiMessage::new(StandardId::new(0x7FF).unwrap(), &[1, 2]).unwrap();
    let extended = TwaiMessage::new(ExtendedId::new(0x1234_5678).unwrap(), &[]).unwrap();
    assert!(filter.matches(&standard));
    assert!(filter.matches(&extended));
}

#[test]
/// A standard filter compares only the requested identifier bits.
fn test_single_standard_filter() {
    let filter = FilterConfig::single_standard(0x120, 0x7F0);
    assert!(!filter.is_accept_all());

    let hit = TwaiMessage::new(StandardId::new(0x12A).unwrap(), &[9, 9]).unwrap();
    let miss = TwaiMessage::new(StandardId::new(0x130).unwrap(), &[9, 9]).unwrap();
    assert!(filter.matches(&hit));
    assert!(!filter.matches(&miss));
}

#[test]
fn test_single_extended_filter() {
    let filter = FilterConfig::single_extended(0x18FF_0000, 0x1FFF_0000);
    let hit = TwaiMessage::new(ExtendedId::new(0x18FF_1234).unwrap(), &[]).unwrap();
    let miss = TwaiMessage::new(ExtendedId::new(0x18FE_1234).unwrap(), &[]).unwrap();
    assert!(filter.matches(&hit));
    assert!(!filter.matches(&miss));
}

#[test]
/// Dual mode accepts a standard frame matching either half-word filter.
fn test_dual_standard_filter() {
    let filter = FilterConfig {
        acceptance_code: (0x100 << 21) | (0x200 << 5),
        acceptance_mask: 0x001F_001F,
        single_filter: false,
    };
    let first = TwaiMessage::new(StandardId::new(0x100).unwrap(), &[]).unwrap();
    let second = TwaiMessage::new(StandardId::new(0x200).unwrap(), &[]).unwrap();
    let neither = TwaiMessage::new(StandardId::new(0x300).unwrap(), &[]).unwrap();
    assert!(filter.matches(&first));
    assert!(filter.matches(&second));
    assert!(!filter.matches(&neither));
}

//==================================================================================BACKEND
#[test]
/// The merged general configuration carries wiring and parameters unchanged.
fn test_general_config_merge() {
    let mut wiring = WiringConfig::new(5, 4);
    wiring.bus_off_gpio = Some(12);
    let config = BackendConfig::default()
        .with_wiring(wiring)
        .with_mode(TwaiMode::ListenOnly)
        .with_timing(TimingConfig::BITRATE_250K);

    let general = config.general_config();
    assert_eq!(general.tx_gpio, 5);
    assert_eq!(general.rx_gpio, 4);
    assert_eq!(general.clkout_gpio, None);
    assert_eq!(general.bus_off_gpio, Some(12));
    assert_eq!(general.mode, TwaiMode::ListenOnly);
    assert_eq!(general.tx_queue_len, 20);
    assert_eq!(config.tf.timing, TimingConfig::BITRATE_250K);
}

#[test]
fn test_default_timeouts() {
    let timeouts = TimeoutConfig::default();
    assert_eq!(timeouts.receive, Duration::from_millis(100));
    assert_eq!(timeouts.transmit, Duration::from_millis(100));
    assert_eq!(timeouts.bus_off, Duration::from_millis(1000));
    assert_eq!(timeouts.bus_not_running, Duration::from_millis(100));
}
