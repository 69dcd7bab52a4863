//! Packed colors and strip type flags
//!
//! Packed colors are always `0xRRGGBB`, regardless of how the strip is wired.

use smart_leds::RGB8;

pub type Rgb = RGB8;

/// Pack separate channels into a `0xRRGGBB` value
#[inline]
pub const fn color(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Split a `0xRRGGBB` value into `(r, g, b)`
///
/// Bits above 24 are ignored.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub const fn unpack(color: u32) -> (u8, u8, u8) {
    ((color >> 16) as u8, (color >> 8) as u8, color as u8)
}

/// Create an RGB color from a u32 value (0xRRGGBB format)
pub const fn rgb_from_u32(color: u32) -> Rgb {
    let (r, g, b) = unpack(color);
    Rgb { r, g, b }
}

/// Pack an RGB color into a u32 value (0xRRGGBB format)
pub const fn rgb_to_u32(rgb: Rgb) -> u32 {
    color(rgb.r, rgb.g, rgb.b)
}

/// Wiring order of the color channels inside a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorOrder {
    Rgb,
    #[default]
    Grb,
    Brg,
    Rbg,
}

/// Byte positions of the red, green and blue channels within a 3-byte pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOffsets {
    pub r: usize,
    pub g: usize,
    pub b: usize,
}

impl ColorOrder {
    /// Returns where each channel lives in the per-pixel byte view
    pub const fn offsets(self) -> ChannelOffsets {
        match self {
            Self::Rgb => ChannelOffsets { r: 0, g: 1, b: 2 },
            Self::Grb => ChannelOffsets { r: 1, g: 0, b: 2 },
            Self::Brg => ChannelOffsets { r: 1, g: 2, b: 0 },
            Self::Rbg => ChannelOffsets { r: 0, g: 2, b: 1 },
        }
    }
}

/// Strip type bitmask, matching the classic NeoPixel flag values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StripType(u8);

impl StripType {
    pub const RGB: Self = Self(0x00);
    pub const GRB: Self = Self(0x01);
    /// 800 kHz datastream, the only supported speed
    pub const KHZ800: Self = Self(0x02);
    pub const BRG: Self = Self(0x04);
    pub const RBG: Self = Self(0x08);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Combine two flag sets
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Decode the channel order
    ///
    /// When several order flags are set, GRB wins over BRG, which wins over RBG.
    pub const fn color_order(self) -> ColorOrder {
        if self.0 & Self::GRB.0 != 0 {
            ColorOrder::Grb
        } else if self.0 & Self::BRG.0 != 0 {
            ColorOrder::Brg
        } else if self.0 & Self::RBG.0 != 0 {
            ColorOrder::Rbg
        } else {
            ColorOrder::Rgb
        }
    }
}

impl Default for StripType {
    fn default() -> Self {
        Self::GRB.with(Self::KHZ800)
    }
}

impl core::ops::BitOr for StripType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl From<u8> for StripType {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}
