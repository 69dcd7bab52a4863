//! Bit-expanded pixel buffer
//!
//! Every protocol bit is stored as one byte (`0x00` or `0x01`), so the data
//! DMA stream can copy the buffer straight to the output register without
//! any shifting. A pixel takes 24 bytes: 8 green bits, then 8 red bits,
//! then 8 blue bits, MSB first. This layout does not depend on the
//! [`ColorOrder`].
//!
//! Next to the expanded bits the buffer keeps a compact 3-byte view per
//! pixel in wire channel order. Read-back and brightness changes work on
//! that view.

use alloc::vec::Vec;

use crate::color::{ColorOrder, color, unpack};
use crate::math8::{self, UNSCALED};

/// Bytes used by one pixel in the expanded buffer
pub const BITS_PER_PIXEL: usize = 24;

/// Bytes used by one pixel in the compact view
pub const BYTES_PER_PIXEL: usize = 3;

/// Largest pixel count whose expanded buffer fits in one DMA transfer
#[allow(clippy::cast_possible_truncation)]
pub const MAX_PIXELS: u16 = (u16::MAX as usize / BITS_PER_PIXEL) as u16;

const GREEN_BITS: usize = 0;
const RED_BITS: usize = 8;
const BLUE_BITS: usize = 16;

/// LED colors in hardware-ready form
#[derive(Debug, Default)]
pub struct PixelBuffer {
    expanded: Vec<u8>,
    channels: Vec<u8>,
    count: u16,
    order: ColorOrder,
    /// Stored brightness factor, see [`math8`]
    brightness: u8,
}

impl PixelBuffer {
    /// Create an empty buffer with GRB read-back order
    pub const fn new() -> Self {
        Self {
            expanded: Vec::new(),
            channels: Vec::new(),
            count: 0,
            order: ColorOrder::Grb,
            brightness: UNSCALED,
        }
    }

    /// Create a buffer holding `count` black pixels
    pub fn with_len(count: u16, order: ColorOrder) -> Self {
        let mut buffer = Self::new();
        buffer.order = order;
        buffer.resize(count);
        buffer
    }

    /// Reallocate for `count` pixels, clearing all pixel data
    ///
    /// On allocation failure the buffer becomes empty instead of keeping a
    /// partial allocation. Brightness and color order are preserved.
    pub fn resize(&mut self, count: u16) {
        self.expanded = Vec::new();
        self.channels = Vec::new();
        self.count = 0;

        if count > MAX_PIXELS {
            #[cfg(feature = "defmt")]
            defmt::warn!("pixel count {} exceeds one DMA transfer", count);
            return;
        }

        let pixels = usize::from(count);
        let (Some(expanded), Some(channels)) = (
            zeroed(pixels * BITS_PER_PIXEL),
            zeroed(pixels * BYTES_PER_PIXEL),
        ) else {
            #[cfg(feature = "defmt")]
            defmt::warn!("failed to allocate buffer for {} pixels", count);
            return;
        };

        self.expanded = expanded;
        self.channels = channels;
        self.count = count;
    }

    /// Number of addressable pixels
    pub const fn len(&self) -> u16 {
        self.count
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn color_order(&self) -> ColorOrder {
        self.order
    }

    /// Set the channel order used for read-back
    ///
    /// Existing data is not rewritten.
    pub fn set_color_order(&mut self, order: ColorOrder) {
        self.order = order;
    }

    /// Set a pixel from separate channels
    ///
    /// Out-of-range indices are ignored.
    pub fn set_pixel(&mut self, index: u16, r: u8, g: u8, b: u8) {
        if index >= self.count {
            return;
        }
        let r = math8::scale(r, self.brightness);
        let g = math8::scale(g, self.brightness);
        let b = math8::scale(b, self.brightness);

        self.store_channels(index, r, g, b);
        self.expand(index, r, g, b);
    }

    /// Set a pixel from a packed `0xRRGGBB` color
    pub fn set_pixel_color(&mut self, index: u16, packed: u32) {
        let (r, g, b) = unpack(packed);
        self.set_pixel(index, r, g, b);
    }

    /// Read a pixel back as a packed `0xRRGGBB` color
    ///
    /// With brightness applied the value is scaled back up, which is only
    /// approximate. Out-of-range indices read as black.
    pub fn pixel(&self, index: u16) -> u32 {
        let (r, g, b) = self.read_channels(index);
        color(
            math8::unscale(r, self.brightness),
            math8::unscale(g, self.brightness),
            math8::unscale(b, self.brightness),
        )
    }

    /// Read a pixel as it will be sent, with brightness applied
    pub fn stored_color(&self, index: u16) -> u32 {
        let (r, g, b) = self.read_channels(index);
        color(r, g, b)
    }

    /// Set every pixel to black
    pub fn clear(&mut self) {
        self.expanded.fill(0);
        self.channels.fill(0);
    }

    /// Caller-visible brightness level
    pub const fn brightness(&self) -> u8 {
        math8::level_from_factor(self.brightness)
    }

    /// Set brightness, 0 = off, 255 = full
    ///
    /// Rescales all stored pixels in place. This walks the whole buffer, so
    /// call it once per frame at most. Raising brightness cannot restore
    /// precision lost by an earlier dim.
    pub fn set_brightness(&mut self, level: u8) {
        let factor = math8::factor_from_level(level);
        if factor == self.brightness {
            return;
        }
        let ratio = math8::rescale_ratio(self.brightness, level);
        for byte in &mut self.channels {
            *byte = math8::apply_ratio(*byte, ratio);
        }
        self.brightness = factor;

        for index in 0..self.count {
            let (r, g, b) = self.read_channels(index);
            self.expand(index, r, g, b);
        }
    }

    /// Expanded bytes, one per protocol bit
    ///
    /// The transmission engine streams this slice. It must not be modified
    /// until the transmission has completed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.expanded
    }

    fn store_channels(&mut self, index: u16, r: u8, g: u8, b: u8) {
        let offsets = self.order.offsets();
        let start = usize::from(index) * BYTES_PER_PIXEL;
        if let Some(pixel) = self.channels.get_mut(start..start + BYTES_PER_PIXEL) {
            pixel[offsets.r] = r;
            pixel[offsets.g] = g;
            pixel[offsets.b] = b;
        }
    }

    fn read_channels(&self, index: u16) -> (u8, u8, u8) {
        if index >= self.count {
            return (0, 0, 0);
        }
        let offsets = self.order.offsets();
        let start = usize::from(index) * BYTES_PER_PIXEL;
        match self.channels.get(start..start + BYTES_PER_PIXEL) {
            Some(pixel) => (pixel[offsets.r], pixel[offsets.g], pixel[offsets.b]),
            None => (0, 0, 0),
        }
    }

    fn expand(&mut self, index: u16, r: u8, g: u8, b: u8) {
        let start = usize::from(index) * BITS_PER_PIXEL;
        let Some(slot) = self.expanded.get_mut(start..start + BITS_PER_PIXEL) else {
            return;
        };
        for bit in 0..8 {
            let shift = 7 - bit;
            slot[GREEN_BITS + bit] = (g >> shift) & 1;
            slot[RED_BITS + bit] = (r >> shift) & 1;
            slot[BLUE_BITS + bit] = (b >> shift) & 1;
        }
    }
}

/// Allocate a zeroed buffer, or `None` if the allocator refuses
fn zeroed(len: usize) -> Option<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).ok()?;
    buffer.resize(len, 0);
    Some(buffer)
}
