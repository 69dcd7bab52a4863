//! Integer brightness math
//!
//! Brightness is kept as a stored factor `level + 1` (wrapping), so that a
//! stored `0` means "no scaling" and a stored `1` means "off".

/// Stored factor meaning "values are used as-is"
pub const UNSCALED: u8 = 0;

/// Convert a caller-visible level (0 = off, 255 = full) to the stored factor
#[inline]
pub const fn factor_from_level(level: u8) -> u8 {
    level.wrapping_add(1)
}

/// Convert a stored factor back to the caller-visible level
#[inline]
pub const fn level_from_factor(factor: u8) -> u8 {
    factor.wrapping_sub(1)
}

/// Scale a channel by a stored factor: `(value * factor) >> 8`
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub const fn scale(value: u8, factor: u8) -> u8 {
    if factor == UNSCALED {
        return value;
    }
    ((value as u16 * factor as u16) >> 8) as u8
}

/// Approximate inverse of [`scale`]: `(value << 8) / factor`
///
/// Lossy: the low bits dropped by [`scale`] cannot be recovered.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub const fn unscale(value: u8, factor: u8) -> u8 {
    if factor == UNSCALED {
        return value;
    }
    let restored = ((value as u16) << 8) / factor as u16;
    if restored > u8::MAX as u16 {
        u8::MAX
    } else {
        restored as u8
    }
}

/// Fixed-point (8.8) ratio that moves data stored at `old_factor` to `new_level`
///
/// A zero ratio clears the data. That happens when the old level was 0,
/// because nothing is left to scale up.
#[inline]
pub const fn rescale_ratio(old_factor: u8, new_level: u8) -> u16 {
    let old_level = level_from_factor(old_factor);
    if old_level == 0 {
        0
    } else if new_level == u8::MAX {
        u16::MAX / old_level as u16
    } else {
        ((factor_from_level(new_level) as u16) << 8).saturating_sub(1) / old_level as u16
    }
}

/// Apply an 8.8 ratio from [`rescale_ratio`], saturating at 255
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub const fn apply_ratio(value: u8, ratio: u16) -> u8 {
    let scaled = (value as u32 * ratio as u32) >> 8;
    if scaled > u8::MAX as u32 {
        u8::MAX
    } else {
        scaled as u8
    }
}
