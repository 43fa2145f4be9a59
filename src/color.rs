//! Fixed-point HSV/RGB conversion and the flash record codec.
//!
//! All math is integer-only: values are lifted into a 0..=255 working domain through a
//! shift-multiply-divide-shift rescale, so the conversions run the same on a Cortex-M0 as on
//! the host. Truncation keeps a round trip within one quantization step per channel.

use crate::error::Error;
use rgb::RGB8;

/// Size of one serialized color record in flash.
pub const RECORD_SIZE: usize = 4;

pub(crate) const HUE_MAX: u16 = 360;
pub(crate) const SAT_MAX: u8 = 100;
pub(crate) const BRIGHT_MAX: u8 = 100;

/// Fixed-point scale factor. Must leave room for a 255 multiply in 32-bit arithmetic.
const SCALE_BITS: u32 = 10;

/// Width of one of the six hue regions in the 0..=255 hue domain.
const HUE_REGION: u32 = 43;

/// Rescales `value` from `0..=from` to `0..=to`, truncating.
const fn rescale(value: u32, from: u32, to: u32) -> u32 {
    ((value << SCALE_BITS) * to / from) >> SCALE_BITS
}

/// A validated hue/saturation/brightness triple.
///
/// The fields are private so a constructed value is always in range: hue 0..=360, saturation
/// and brightness 0..=100. Out-of-range input is rejected at the [`Hsv::new`] boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hsv {
    hue: u16,
    saturation: u8,
    brightness: u8,
}

impl Hsv {
    /// Boot fallback when no valid record exists in flash: full-brightness red.
    pub const DEFAULT: Hsv = Hsv {
        hue: 0,
        saturation: 100,
        brightness: 100,
    };

    pub const fn new(hue: u16, saturation: u8, brightness: u8) -> Result<Self, Error> {
        if hue > HUE_MAX {
            return Err(Error::HueOutOfRange);
        }
        if saturation > SAT_MAX {
            return Err(Error::SaturationOutOfRange);
        }
        if brightness > BRIGHT_MAX {
            return Err(Error::BrightnessOutOfRange);
        }
        Ok(Self {
            hue,
            saturation,
            brightness,
        })
    }

    pub const fn hue(&self) -> u16 {
        self.hue
    }

    pub const fn saturation(&self) -> u8 {
        self.saturation
    }

    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    pub(crate) fn set_hue(&mut self, hue: u16) {
        debug_assert!(hue <= HUE_MAX);
        self.hue = hue;
    }

    pub(crate) fn set_saturation(&mut self, saturation: u8) {
        debug_assert!(saturation <= SAT_MAX);
        self.saturation = saturation;
    }

    pub(crate) fn set_brightness(&mut self, brightness: u8) {
        debug_assert!(brightness <= BRIGHT_MAX);
        self.brightness = brightness;
    }

    /// Converts to 8-bit RGB duty cycles.
    ///
    /// Hue is folded into six 43-unit regions of the 0..=255 domain; the region index selects
    /// the channel assignment and the remainder blends the two moving channels.
    pub fn to_rgb(&self) -> RGB8 {
        let value = rescale(self.brightness as u32, BRIGHT_MAX as u32, 255);
        if self.saturation == 0 {
            // achromatic: gray level straight from brightness
            let level = value as u8;
            return RGB8::new(level, level, level);
        }

        let hue = rescale(self.hue as u32, HUE_MAX as u32, 255);
        let sat = rescale(self.saturation as u32, SAT_MAX as u32, 255);

        let region = hue / HUE_REGION;
        let remainder = (hue - region * HUE_REGION) * 6;

        let p = (value * (255 - sat)) >> 8;
        let q = (value * (255 - ((sat * remainder) >> 8))) >> 8;
        let t = (value * (255 - ((sat * (255 - remainder)) >> 8))) >> 8;

        let (red, green, blue) = match region {
            0 => (value, t, p),
            1 => (q, value, p),
            2 => (p, value, t),
            3 => (p, q, value),
            4 => (t, p, value),
            _ => (value, p, q),
        };

        RGB8::new(red as u8, green as u8, blue as u8)
    }

    /// Inverse conversion for control transports that hand over raw RGB triples.
    pub fn from_rgb(rgb: RGB8) -> Self {
        let max = rgb.r.max(rgb.g).max(rgb.b) as u32;
        let min = rgb.r.min(rgb.g).min(rgb.b) as u32;

        let brightness = rescale(max, 255, BRIGHT_MAX as u32) as u8;
        if max == 0 {
            return Self {
                hue: 0,
                saturation: 0,
                brightness,
            };
        }

        let delta = max - min;
        let sat = ((delta << SCALE_BITS) * 255 / max) >> SCALE_BITS;
        let saturation = rescale(sat, 255, SAT_MAX as u32) as u8;
        if sat == 0 {
            return Self {
                hue: 0,
                saturation,
                brightness,
            };
        }

        let (r, g, b) = (rgb.r as i32, rgb.g as i32, rgb.b as i32);
        let delta = delta as i32;
        let hue = if max == rgb.r as u32 {
            (HUE_REGION as i32) * (g - b) / delta
        } else if max == rgb.g as u32 {
            85 + (HUE_REGION as i32) * (b - r) / delta
        } else {
            171 + (HUE_REGION as i32) * (r - g) / delta
        };

        // the red-max case wraps through the top of the hue circle
        let hue = rescale(hue.rem_euclid(256) as u32, 255, HUE_MAX as u32) as u16;

        Self {
            hue,
            saturation,
            brightness,
        }
    }

    /// Serializes for flash storage: hue as little-endian u16, then saturation, brightness.
    pub fn to_record(&self) -> [u8; RECORD_SIZE] {
        let hue = self.hue.to_le_bytes();
        [hue[0], hue[1], self.saturation, self.brightness]
    }

    /// Decodes a record slot. Returns `None` unless all three fields are in range, which is
    /// the store's slot-validity check: an erased (all-ones) slot never decodes.
    pub fn from_record(raw: [u8; RECORD_SIZE]) -> Option<Self> {
        let hue = u16::from_le_bytes([raw[0], raw[1]]);
        Self::new(hue, raw[2], raw[3]).ok()
    }
}

impl Default for Hsv {
    fn default() -> Self {
        Self::DEFAULT
    }
}
