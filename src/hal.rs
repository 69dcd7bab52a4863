//! Peripheral abstraction layer
//!
//! The engine drives one timer with two compare channels and three DMA
//! streams writing to a GPIO output register. This trait exposes just the
//! register operations the engine sequences, so the same state machine can
//! run on real hardware (the `stm32f1` feature) or in simulation (the `sim`
//! feature).

use crate::timing::BitTiming;

/// DMA stream, named after the level it writes to the output register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stream {
    /// Triggered by the timer update event, writes the "all high" word
    Set,
    /// Triggered by compare 1, writes the next buffer byte
    Data,
    /// Triggered by compare 2, writes the "all low" word
    ///
    /// Its transfer-complete interrupt marks the end of the frame.
    Reset,
}

impl Stream {
    /// Order in which streams are armed
    ///
    /// The data stream must be enabled before the reset stream, otherwise
    /// the first bit is corrupted.
    pub const ARM_ORDER: [Self; 3] = [Self::Set, Self::Data, Self::Reset];

    /// Order in which timer DMA requests are switched on and off
    pub const REQUEST_ORDER: [Self; 3] = [Self::Data, Self::Reset, Self::Set];
}

/// Timer, DMA and GPIO operations needed by the transmission engine
///
/// Implement this trait to support different hardware platforms.
/// Register layout, channel numbers and interrupt vectors stay inside the
/// implementation.
pub trait Peripherals {
    /// One-time setup: output pin, timer base and compare channels,
    /// DMA stream wiring and interrupt priorities
    fn configure(&mut self, timing: &BitTiming);

    /// Point the data stream at the frame to transmit
    fn set_data_source(&mut self, frame: &[u8]);

    /// Clear the pending interrupt flags of a stream
    fn clear_stream_flags(&mut self, stream: Stream);

    /// Program the number of transfers of a stream
    fn set_transfer_count(&mut self, stream: Stream, count: u16);

    fn enable_stream(&mut self, stream: Stream);

    fn disable_stream(&mut self, stream: Stream);

    /// Let the timer event feeding `stream` raise DMA requests
    fn enable_request(&mut self, stream: Stream);

    fn disable_request(&mut self, stream: Stream);

    /// Clear every timer status flag
    fn clear_timer_flags(&mut self);

    /// Acknowledge a pending update interrupt
    fn clear_update_flag(&mut self);

    /// Load the live timer counter
    fn set_counter(&mut self, value: u16);

    fn start_timer(&mut self);

    fn stop_timer(&mut self);

    /// Enable the timer update (overflow) interrupt
    fn enable_update_interrupt(&mut self);

    fn disable_update_interrupt(&mut self);
}
