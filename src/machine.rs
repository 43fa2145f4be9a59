//! Triangle-wave color animation.
//!
//! One HSV channel animates at a time, bouncing between 0 and the channel maximum. The
//! oscillation direction of every channel is remembered independently, so switching modes and
//! back resumes the wave instead of restarting it.

use crate::color::{BRIGHT_MAX, HUE_MAX, Hsv, SAT_MAX};
use rgb::RGB8;

/// Which HSV channel the machine currently animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelMode {
    #[default]
    NoChange = 0,
    Hue = 1,
    Saturation = 2,
    Brightness = 3,
}

impl ChannelMode {
    /// The mode a single button cycles to: no-change, hue, saturation, brightness, repeat.
    pub fn next(self) -> Self {
        Self::from_repr((self as u8 + 1) % 4).unwrap_or(Self::NoChange)
    }
}

/// Advances an oscillating counter by one step, reflecting off 0 and `max`.
///
/// Returns the new value and the new counting-down flag. The value never leaves
/// `[0, max]` and touches both bounds exactly when the step divides them; at a bound it
/// reverses by stepping back inside instead of overshooting.
///
/// `step_size` must be non-zero and at most `max`; this is a programming contract, not a
/// runtime condition.
pub fn step(value: u16, step_size: u16, max: u16, counting_down: bool) -> (u16, bool) {
    debug_assert!(step_size > 0 && step_size <= max);

    if counting_down {
        if value < step_size {
            // reflect off the floor
            (value + step_size, false)
        } else {
            (value - step_size, true)
        }
    } else if value > max - step_size {
        // reflect off the ceiling
        (value - step_size, true)
    } else {
        (value + step_size, false)
    }
}

/// Current color, animation mode and per-channel oscillation direction.
///
/// This is the one mutable piece of application state; the tick driver, the control transport
/// and the save trigger all go through it by reference. Direction flags live only in memory,
/// they are not part of the persisted record.
#[derive(Debug, Clone)]
pub struct ColorMachine {
    hsv: Hsv,
    mode: ChannelMode,
    hue_down: bool,
    saturation_down: bool,
    brightness_down: bool,
}

impl ColorMachine {
    /// All channels start counting up.
    pub fn new(hsv: Hsv) -> Self {
        Self {
            hsv,
            mode: ChannelMode::NoChange,
            hue_down: false,
            saturation_down: false,
            brightness_down: false,
        }
    }

    pub fn hsv(&self) -> Hsv {
        self.hsv
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Overwrites the current color. The next tick emits it as-is.
    pub fn set_hsv(&mut self, hsv: Hsv) {
        self.hsv = hsv;
    }

    /// Overwrites the current color from an RGB triple.
    pub fn set_rgb(&mut self, rgb: RGB8) {
        self.hsv = Hsv::from_rgb(rgb);
    }

    /// Selecting a mode leaves every channel's stored direction untouched.
    pub fn set_mode(&mut self, mode: ChannelMode) {
        self.mode = mode;
    }

    pub fn cycle_mode(&mut self) -> ChannelMode {
        self.mode = self.mode.next();
        self.mode
    }

    /// One animation frame: returns the duty cycles for the current color, then advances the
    /// active channel by `step_size`.
    ///
    /// The conversion runs every tick regardless of mode, so a color set through the control
    /// interface reaches the sink on the very next frame.
    pub fn tick(&mut self, step_size: u16) -> RGB8 {
        let rgb = self.hsv.to_rgb();

        match self.mode {
            ChannelMode::NoChange => {}
            ChannelMode::Hue => {
                let (hue, down) = step(self.hsv.hue(), step_size, HUE_MAX, self.hue_down);
                self.hsv.set_hue(hue);
                self.hue_down = down;
            }
            ChannelMode::Saturation => {
                let (sat, down) = step(
                    self.hsv.saturation() as u16,
                    step_size,
                    SAT_MAX as u16,
                    self.saturation_down,
                );
                self.hsv.set_saturation(sat as u8);
                self.saturation_down = down;
            }
            ChannelMode::Brightness => {
                let (bright, down) = step(
                    self.hsv.brightness() as u16,
                    step_size,
                    BRIGHT_MAX as u16,
                    self.brightness_down,
                );
                self.hsv.set_brightness(bright as u8);
                self.brightness_down = down;
            }
        }

        rgb
    }
}
