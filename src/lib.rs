#![no_std]

extern crate alloc;

pub mod color;
pub mod engine;
pub mod hal;
pub mod math8;
pub mod pixels;
pub mod shared;
#[cfg(feature = "sim")]
pub mod sim;
#[cfg(feature = "stm32f1")]
pub mod stm32f1;
pub mod strip;
pub mod timing;

pub use color::{ColorOrder, Rgb, StripType, color, unpack};
pub use engine::{Engine, EngineEvent, EngineState, SendError};
pub use hal::{Peripherals, Stream};
pub use pixels::PixelBuffer;
pub use shared::EngineCell;
pub use strip::Strip;
pub use timing::{BitTiming, EngineConfig};

/// Hardware boundary used by the strip
///
/// Implement this trait to drive the bit-expanded buffer out on a
/// different platform. [`EngineCell`] implements it with the timer + DMA
/// engine.
pub trait Transmitter {
    /// One-time peripheral setup, `frame` becomes the initial DMA source
    fn init(&mut self, frame: &[u8]);

    /// Start sending `frame` and return without waiting
    ///
    /// `frame` must not be modified until [`Transmitter::is_ready`] reports
    /// `true` again.
    fn send(&mut self, frame: &[u8]) -> Result<(), SendError>;

    /// Completion flag: the previous frame has been sent and latched
    fn is_ready(&self) -> bool;
}
