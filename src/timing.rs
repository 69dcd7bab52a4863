//! Protocol timing and engine configuration
//!
//! One protocol bit is one timer period. The pin is driven high on the
//! timer update event, driven to the data bit at compare 1 and forced low
//! at compare 2. A `0` bit therefore stays high until compare 1 and a `1`
//! bit until compare 2.

use embassy_time::Duration;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Timer settings producing the 800 kHz waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Timer input clock before the prescaler
    pub core_clock_hz: u32,
    /// Timer tick rate after the prescaler
    pub timer_clock_hz: u32,
    /// Ticks per protocol bit (reload value + 1)
    pub period_ticks: u16,
    /// Compare 1: end of the high time of a `0` bit
    pub zero_high_ticks: u16,
    /// Compare 2: end of the high time of a `1` bit
    pub one_high_ticks: u16,
}

impl BitTiming {
    /// 72 MHz core, 24 MHz timer clock, 30 ticks per bit (1.25 µs)
    pub const DEFAULT: Self = Self {
        core_clock_hz: 72_000_000,
        timer_clock_hz: 24_000_000,
        period_ticks: 30,
        zero_high_ticks: 8,
        one_high_ticks: 17,
    };

    /// Timer prescaler register value
    #[allow(clippy::cast_possible_truncation)]
    pub const fn prescaler(&self) -> u16 {
        let divider = self.core_clock_hz / self.timer_clock_hz;
        if divider == 0 {
            0
        } else if divider > u16::MAX as u32 + 1 {
            u16::MAX
        } else {
            (divider - 1) as u16
        }
    }

    /// Timer auto-reload register value
    ///
    /// Preloading the counter with this value makes the very next tick
    /// raise an update event.
    pub const fn reload(&self) -> u16 {
        self.period_ticks.saturating_sub(1)
    }

    pub const fn bit_period_ns(&self) -> u64 {
        self.ticks_to_ns(self.period_ticks)
    }

    /// High time of a single encoded bit
    pub const fn high_time_ns(&self, bit: bool) -> u64 {
        if bit {
            self.ticks_to_ns(self.one_high_ticks)
        } else {
            self.ticks_to_ns(self.zero_high_ticks)
        }
    }

    /// Check that the timer clock is reachable and the compare events fall
    /// inside the bit period in order
    pub const fn is_valid(&self) -> bool {
        self.timer_clock_hz != 0
            && self.core_clock_hz >= self.timer_clock_hz
            && self.zero_high_ticks > 0
            && self.zero_high_ticks < self.one_high_ticks
            && self.one_high_ticks < self.period_ticks
    }

    const fn ticks_to_ns(&self, ticks: u16) -> u64 {
        if self.timer_clock_hz == 0 {
            return 0;
        }
        ticks as u64 * NANOS_PER_SECOND / self.timer_clock_hz as u64
    }
}

impl Default for BitTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration for the transmission engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    pub timing: BitTiming,
    /// Timer overflows counted after the last bit before the latch ends
    ///
    /// The latch lasts `dead_period + 1` bit periods: the overflow handler
    /// counts up to this value and finishes on the following overflow.
    pub dead_period: u8,
}

impl EngineConfig {
    pub const DEFAULT: Self = Self {
        timing: BitTiming::DEFAULT,
        dead_period: 19,
    };

    /// Low time appended after every frame
    pub const fn latch_time(&self) -> Duration {
        let periods = self.dead_period as u64 + 1;
        Duration::from_micros(periods * self.timing.bit_period_ns() / 1000)
    }

    /// Time on the wire for `len` expanded bytes, latch included
    pub const fn frame_time(&self, len: usize) -> Duration {
        let data_ns = len as u64 * self.timing.bit_period_ns();
        let periods = self.dead_period as u64 + 1;
        let latch_ns = periods * self.timing.bit_period_ns();
        Duration::from_micros((data_ns + latch_ns) / 1000)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
