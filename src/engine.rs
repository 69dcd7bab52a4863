//! Transmission engine
//!
//! Turns a bit-expanded frame into the WS2812 waveform without CPU work
//! per bit. Three DMA streams write to the output register on timer events:
//! "high" on update, the data byte on compare 1, "low" on compare 2.
//! A `1` byte keeps the pin high past compare 1, which makes the long pulse.
//!
//! The state machine moves through `Idle -> Transmitting -> DeadTime -> Idle`.
//! The second and third transitions are driven by interrupts, reported
//! to [`Engine::handle`] as [`EngineEvent`]s. Tests feed the same events
//! from a simulation.

use crate::hal::{Peripherals, Stream};
use crate::timing::EngineConfig;

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// Ready for the next frame
    #[default]
    Idle,
    /// DMA streams are replaying the frame
    Transmitting,
    /// Frame sent, holding the line low so the LEDs latch
    DeadTime,
}

/// Interrupts reported to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineEvent {
    /// Transfer complete on the reset stream: the last bit has ended
    TransferComplete,
    /// Timer update interrupt during the dead time
    TimerOverflow,
}

/// Error returned when a frame cannot be armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// A previous frame is still being sent or latched
    Busy,
    /// The frame does not fit in one DMA transfer
    TooLong,
    /// Compare points do not fit inside the bit period
    InvalidTiming,
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Busy => f.write_str("transmission in progress"),
            Self::TooLong => f.write_str("frame exceeds one DMA transfer"),
            Self::InvalidTiming => f.write_str("invalid bit timing"),
        }
    }
}

impl core::error::Error for SendError {}

/// Non-owning description of the frame being streamed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView {
    pub address: usize,
    pub len: u16,
}

/// Timer + DMA transmission state machine
pub struct Engine<P: Peripherals> {
    peripherals: P,
    config: EngineConfig,
    configured: bool,
    state: EngineState,
    overflows: u8,
    in_flight: Option<FrameView>,
}

impl<P: Peripherals> Engine<P> {
    pub const fn new(peripherals: P, config: EngineConfig) -> Self {
        Self {
            peripherals,
            config,
            configured: false,
            state: EngineState::Idle,
            overflows: 0,
            in_flight: None,
        }
    }

    /// Peripheral bring-up and initial data stream source
    ///
    /// Configuration happens once. The data stream is only re-pointed while
    /// idle: a frame in flight keeps its source, and [`Engine::send`] points
    /// the stream again for every frame anyway. Invalid timing leaves the
    /// peripherals untouched and is reported by the next `send`.
    pub fn init(&mut self, frame: &[u8]) {
        if self.configure_once().is_err() {
            return;
        }
        if self.state == EngineState::Idle {
            self.peripherals.set_data_source(frame);
        }
    }

    fn configure_once(&mut self) -> Result<(), SendError> {
        if self.configured {
            return Ok(());
        }
        if !self.config.timing.is_valid() {
            #[cfg(feature = "defmt")]
            defmt::error!("refusing timing {}", self.config.timing);
            return Err(SendError::InvalidTiming);
        }
        self.peripherals.configure(&self.config.timing);
        self.configured = true;
        Ok(())
    }

    pub const fn is_configured(&self) -> bool {
        self.configured
    }

    /// Arm the hardware for one frame and return immediately
    ///
    /// An empty frame is accepted and sends nothing. The frame must stay
    /// untouched until the engine is idle again.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), SendError> {
        if self.state != EngineState::Idle {
            #[cfg(feature = "defmt")]
            defmt::warn!("send rejected in state {}", self.state);
            return Err(SendError::Busy);
        }
        if frame.is_empty() {
            return Ok(());
        }
        let len = u16::try_from(frame.len()).map_err(|_| SendError::TooLong)?;

        self.configure_once()?;
        #[cfg(feature = "defmt")]
        defmt::debug!("arming {} bits", len);

        let hw = &mut self.peripherals;
        hw.set_data_source(frame);
        for stream in Stream::ARM_ORDER {
            hw.clear_stream_flags(stream);
        }
        for stream in Stream::ARM_ORDER {
            hw.set_transfer_count(stream, len);
        }
        hw.clear_timer_flags();

        // Streams first, then the requests that trigger them
        for stream in Stream::ARM_ORDER {
            hw.enable_stream(stream);
        }
        for stream in Stream::REQUEST_ORDER {
            hw.enable_request(stream);
        }

        // First update event fires on the next tick
        hw.set_counter(self.config.timing.reload());
        hw.start_timer();

        self.in_flight = Some(FrameView {
            address: frame.as_ptr() as usize,
            len,
        });
        self.overflows = 0;
        self.state = EngineState::Transmitting;
        Ok(())
    }

    /// Apply an interrupt to the state machine and return the new state
    ///
    /// Events that do not belong to the current state are acknowledged and
    /// otherwise ignored.
    pub fn handle(&mut self, event: EngineEvent) -> EngineState {
        match event {
            EngineEvent::TransferComplete => {
                self.peripherals.clear_stream_flags(Stream::Reset);
                if self.state == EngineState::Transmitting {
                    self.finish_transfer();
                }
            }
            EngineEvent::TimerOverflow => {
                self.peripherals.clear_update_flag();
                if self.state == EngineState::DeadTime {
                    self.count_overflow();
                }
            }
        }
        self.state
    }

    fn finish_transfer(&mut self) {
        let hw = &mut self.peripherals;
        for stream in Stream::ARM_ORDER {
            hw.disable_stream(stream);
        }
        // Requests must go too, or the next update re-arms a stream
        for stream in Stream::REQUEST_ORDER {
            hw.disable_request(stream);
        }
        hw.enable_update_interrupt();

        self.overflows = 0;
        self.state = EngineState::DeadTime;
        #[cfg(feature = "defmt")]
        defmt::trace!("frame sent, latching");
    }

    fn count_overflow(&mut self) {
        if self.overflows < self.config.dead_period {
            self.overflows += 1;
            return;
        }
        self.overflows = 0;
        self.peripherals.stop_timer();
        self.peripherals.disable_update_interrupt();
        self.in_flight = None;
        self.state = EngineState::Idle;
        #[cfg(feature = "defmt")]
        defmt::trace!("latch complete");
    }

    pub const fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == EngineState::Idle
    }

    /// Overflows counted so far in the current dead time
    pub const fn overflows(&self) -> u8 {
        self.overflows
    }

    /// Frame currently owned by the DMA streams, if any
    pub const fn in_flight(&self) -> Option<FrameView> {
        self.in_flight
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn peripherals(&self) -> &P {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut P {
        &mut self.peripherals
    }
}
