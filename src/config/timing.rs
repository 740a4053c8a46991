//! Bit timing presets and the hardware acceptance filter.
use embedded_can::{Frame, Id};

use crate::driver::message::TwaiMessage;
use crate::error::ConfigError;

/// Source clock assumed by the timing presets (APB, 80 MHz).
pub const DEFAULT_SOURCE_CLOCK_HZ: u32 = 80_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Bit timing parameters written to the controller.
pub struct TimingConfig {
    /// Baud rate prescaler (source clock ticks per time quantum).
    pub brp: u32,
    /// Time quanta before the sample point (propagation + phase 1).
    pub tseg_1: u8,
    /// Time quanta after the sample point.
    pub tseg_2: u8,
    /// Synchronization jump width.
    pub sjw: u8,
    /// Sample each bit three times.
    pub triple_sampling: bool,
}

impl TimingConfig {
    const fn preset(brp: u32, tseg_1: u8, tseg_2: u8) -> Self {
        Self {
            brp,
            tseg_1,
            tseg_2,
            sjw: 3,
            triple_sampling: false,
        }
    }

    pub const BITRATE_25K: Self = Self::preset(128, 16, 8);
    pub const BITRATE_50K: Self = Self::preset(80, 15, 4);
    pub const BITRATE_100K: Self = Self::preset(40, 15, 4);
    pub const BITRATE_125K: Self = Self::preset(32, 15, 4);
    pub const BITRATE_250K: Self = Self::preset(16, 15, 4);
    pub const BITRATE_500K: Self = Self::preset(8, 15, 4);
    pub const BITRATE_800K: Self = Self::preset(4, 16, 8);
    pub const BITRATE_1M: Self = Self::preset(4, 15, 4);

    /// Time quanta per bit (sync segment + tseg_1 + tseg_2).
    #[inline]
    pub fn quanta_per_bit(&self) -> u32 {
        1 + self.tseg_1 as u32 + self.tseg_2 as u32
    }

    /// Resulting bit rate for the given source clock, `0` if the prescaler is `0`.
    pub fn bitrate(&self, source_clock_hz: u32) -> u32 {
        if self.brp == 0 {
            return 0;
        }
        source_clock_hz / self.brp / self.quanta_per_bit()
    }

    /// Check every field against the controller limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brp < 2 {
            return Err(ConfigError::InvalidTiming { field: "brp" });
        }
        if !(1..=16).contains(&self.tseg_1) {
            return Err(ConfigError::InvalidTiming { field: "tseg_1" });
        }
        if !(1..=8).contains(&self.tseg_2) {
            return Err(ConfigError::InvalidTiming { field: "tseg_2" });
        }
        if !(1..=4).contains(&self.sjw) || self.sjw > self.tseg_2 {
            return Err(ConfigError::InvalidTiming { field: "sjw" });
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::BITRATE_1M
    }
}

//==================================================================================FILTER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Acceptance filter. A set bit in `acceptance_mask` means "don't care".
///
/// Single filter layout: standard frames put the identifier in bits 31..21 and
/// RTR in bit 20; extended frames put the identifier in bits 31..3 and RTR in
/// bit 2. In dual filter mode each half-word holds one filter and only the
/// identifier bits (11 for standard, the upper 16 for extended) take part.
pub struct FilterConfig {
    pub acceptance_code: u32,
    pub acceptance_mask: u32,
    pub single_filter: bool,
}

impl FilterConfig {
    /// Let every frame through.
    pub const ACCEPT_ALL: Self = Self {
        acceptance_code: 0,
        acceptance_mask: 0xFFFF_FFFF,
        single_filter: true,
    };

    /// Single filter on a standard identifier; only bits set in `must_match`
    /// are compared.
    pub const fn single_standard(id: u16, must_match: u16) -> Self {
        Self {
            acceptance_code: ((id as u32) & 0x7FF) << 21,
            acceptance_mask: !(((must_match as u32) & 0x7FF) << 21),
            single_filter: true,
        }
    }

    /// Single filter on an extended identifier; only bits set in `must_match`
    /// are compared.
    pub const fn single_extended(id: u32, must_match: u32) -> Self {
        Self {
            acceptance_code: (id & 0x1FFF_FFFF) << 3,
            acceptance_mask: !((must_match & 0x1FFF_FFFF) << 3),
            single_filter: true,
        }
    }

    /// `true` when no bit is compared.
    #[inline]
    pub fn is_accept_all(&self) -> bool {
        self.acceptance_mask == 0xFFFF_FFFF
    }

    /// Whether the controller would accept `message`.
    pub fn matches(&self, message: &TwaiMessage) -> bool {
        if self.is_accept_all() {
            return true;
        }
        let rtr = message.is_remote_frame() as u32;
        if self.single_filter {
            let (bits, compared) = match message.id() {
                Id::Standard(id) => {
                    let payload = message.payload();
                    let byte_0 = payload.first().copied().unwrap_or(0) as u32;
                    let byte_1 = payload.get(1).copied().unwrap_or(0) as u32;
                    (
                        ((id.as_raw() as u32) << 21) | (rtr << 20) | (byte_0 << 8) | byte_1,
                        0xFFF0_FFFF,
                    )
                }
                Id::Extended(id) => ((id.as_raw() << 3) | (rtr << 2), 0xFFFF_FFFC),
            };
            (bits ^ self.acceptance_code) & !self.acceptance_mask & compared == 0
        } else {
            let (half, compared) = match message.id() {
                Id::Standard(id) => ((id.as_raw() as u32) << 5, 0xFFE0),
                Id::Extended(id) => (id.as_raw() >> 13, 0xFFFF),
            };
            let first = (half ^ (self.acceptance_code >> 16)) & !(self.acceptance_mask >> 16);
            let second = (half ^ self.acceptance_code) & !self.acceptance_mask;
            first & compared == 0 || second & compared & 0xFFFF == 0
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::ACCEPT_ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Bit timing and acceptance filter, installed together.
pub struct TimingFilterConfig {
    pub timing: TimingConfig,
    pub filter: FilterConfig,
}
