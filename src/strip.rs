//! Strip controller
//!
//! Owns the pixel buffer and hands it to a [`Transmitter`] on [`Strip::show`].

use smart_leds::SmartLedsWrite;

use crate::Transmitter;
use crate::color::{Rgb, StripType, rgb_from_u32, rgb_to_u32};
use crate::engine::SendError;
use crate::pixels::PixelBuffer;

/// WS2812 strip
///
/// # Usage
///
/// ```ignore
/// let mut strip = Strip::new(30, StripType::GRB | StripType::KHZ800, &*ENGINE);
/// strip.begin();
///
/// strip.set_pixel_color(0, 255, 0, 0);
/// strip.show()?;
/// strip.wait_ready();
/// ```
pub struct Strip<T: Transmitter> {
    pixels: PixelBuffer,
    transmitter: T,
    strip_type: StripType,
    begun: bool,
}

impl<T: Transmitter> Strip<T> {
    /// Create a strip of `count` black pixels
    ///
    /// If the buffer cannot be allocated the strip is empty.
    pub fn new(count: u16, strip_type: StripType, transmitter: T) -> Self {
        Self {
            pixels: PixelBuffer::with_len(count, strip_type.color_order()),
            transmitter,
            strip_type,
            begun: false,
        }
    }

    /// Create a strip whose length is not known yet
    ///
    /// Call [`Strip::update_length`] (and [`Strip::update_type`] if needed)
    /// before [`Strip::begin`].
    pub fn new_empty(transmitter: T) -> Self {
        Self::new(0, StripType::default(), transmitter)
    }

    /// Bring up the hardware; only the first call has an effect
    pub fn begin(&mut self) {
        if self.begun {
            return;
        }
        self.transmitter.init(self.pixels.as_bytes());
        self.begun = true;
    }

    pub const fn is_begun(&self) -> bool {
        self.begun
    }

    /// Start sending the buffer and return immediately
    ///
    /// Does nothing for an empty strip or before [`Strip::begin`]. Pixels
    /// must not be changed until [`Strip::is_ready`] is `true` again.
    pub fn show(&mut self) -> Result<(), SendError> {
        if self.pixels.is_empty() {
            return Ok(());
        }
        if !self.begun {
            #[cfg(feature = "defmt")]
            defmt::warn!("show() called before begin()");
            return Ok(());
        }
        self.transmitter.send(self.pixels.as_bytes())
    }

    /// Previous frame has been sent and latched
    pub fn is_ready(&self) -> bool {
        self.transmitter.is_ready()
    }

    /// Spin until the previous frame has been sent and latched
    pub fn wait_ready(&self) {
        while !self.transmitter.is_ready() {
            core::hint::spin_loop();
        }
    }

    pub fn set_pixel_color(&mut self, index: u16, r: u8, g: u8, b: u8) {
        self.pixels.set_pixel(index, r, g, b);
    }

    /// Set a pixel from a packed `0xRRGGBB` color
    pub fn set_pixel_packed(&mut self, index: u16, color: u32) {
        self.pixels.set_pixel_color(index, color);
    }

    pub fn set_pixel_rgb(&mut self, index: u16, color: Rgb) {
        self.pixels.set_pixel_color(index, rgb_to_u32(color));
    }

    /// Packed `0xRRGGBB` color of a pixel, black when out of range
    pub fn pixel_color(&self, index: u16) -> u32 {
        self.pixels.pixel(index)
    }

    pub fn pixel_rgb(&self, index: u16) -> Rgb {
        rgb_from_u32(self.pixels.pixel(index))
    }

    /// Set brightness, 0 = off, 255 = full
    ///
    /// Takes effect on the next [`Strip::show`]. Lossy: see
    /// [`PixelBuffer::set_brightness`].
    pub fn set_brightness(&mut self, level: u8) {
        self.pixels.set_brightness(level);
    }

    pub const fn brightness(&self) -> u8 {
        self.pixels.brightness()
    }

    pub fn clear(&mut self) {
        self.pixels.clear();
    }

    pub const fn num_pixels(&self) -> u16 {
        self.pixels.len()
    }

    /// Bit-expanded buffer in wire order (GRB), one byte per bit
    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_bytes()
    }

    pub const fn buffer(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Resize the strip, clearing every pixel
    ///
    /// Waits for a running transmission to finish first, since the old
    /// buffer is released.
    pub fn update_length(&mut self, count: u16) {
        self.wait_ready();
        self.pixels.resize(count);
    }

    /// Change the strip type flags
    pub fn update_type(&mut self, strip_type: StripType) {
        self.strip_type = strip_type;
        self.pixels.set_color_order(strip_type.color_order());
    }

    pub const fn strip_type(&self) -> StripType {
        self.strip_type
    }

    pub const fn transmitter(&self) -> &T {
        &self.transmitter
    }
}

impl<T: Transmitter> SmartLedsWrite for Strip<T> {
    type Error = SendError;
    type Color = Rgb;

    /// Write colors from the first pixel on and show the frame
    ///
    /// Waits for the previous frame first. Extra colors are ignored.
    fn write<I, C>(&mut self, iterator: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<Self::Color>,
    {
        self.wait_ready();
        for (index, color) in (0..self.num_pixels()).zip(iterator) {
            self.set_pixel_rgb(index, color.into());
        }
        self.show()
    }
}
