//! Top-level wiring of the color machine and the record store.
//!
//! [`Lamp`] is the explicit application context: the tick driver, the save trigger and the
//! control transport all act on it through plain method calls, from whatever scheduling model
//! the firmware uses. There is no global state and nothing here assumes interrupt context.

use crate::cli::Command;
use crate::color::Hsv;
use crate::error::Error;
use crate::machine::{ChannelMode, ColorMachine};
use crate::platform::Platform;
use crate::store::{RecordStore, StoreStatistics};
use core::fmt;
use rgb::RGB8;

/// Response to a successfully applied control command, ready to be rendered back over the
/// control link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    ColorSetRgb(RGB8),
    ColorSetHsv(Hsv),
    Saved,
    Help,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::ColorSetRgb(rgb) => write!(
                f,
                "color changed to rgb: red {}, green {}, blue {}",
                rgb.r, rgb.g, rgb.b
            ),
            Reply::ColorSetHsv(hsv) => write!(
                f,
                "color changed to hsv: hue {}, sat {}, bright {}",
                hsv.hue(),
                hsv.saturation(),
                hsv.brightness()
            ),
            Reply::Saved => write!(f, "current state saved"),
            Reply::Help => write!(f, "usage: rgb <r> <g> <b> or hsv <h> <s> <v> or save"),
        }
    }
}

/// The lamp application core: current color and animation state plus the persistence region.
pub struct Lamp<T: Platform> {
    machine: ColorMachine,
    store: RecordStore<T>,
    step_size: u16,
}

impl<T: Platform> Lamp<T> {
    /// Mounts the store and seeds the color machine from the last persisted color (or the
    /// default when the region is empty). Call exactly once, before the first tick.
    ///
    /// `step_size` is the per-tick channel increment; it must be non-zero and no larger than
    /// the smallest channel maximum (100).
    pub fn boot(base_address: u32, pages: u32, step_size: u16, flash: T) -> Result<Self, Error> {
        let mut store = RecordStore::new(base_address, pages, flash)?;
        let hsv = store.find_last_record()?;
        Ok(Self {
            machine: ColorMachine::new(hsv),
            store,
            step_size,
        })
    }

    /// One animation frame: returns the duty cycles for the sink and advances the animation,
    /// then lends the idle time to the store's background reclaim.
    pub fn tick(&mut self) -> RGB8 {
        let rgb = self.machine.tick(self.step_size);
        // a reclaim fault is already logged and the page retired inside the store; the sink
        // path still has to get its duty cycles
        let _ = self.store.poll_reclaim();
        rgb
    }

    /// The save trigger: persists the current color. Fire-and-forget for the caller;
    /// completion is confirmed by subsequent ticks.
    pub fn save(&mut self) -> Result<(), Error> {
        self.store.write_record(self.machine.hsv())
    }

    /// Applies one parsed control command. Valid color input overwrites the current HSV
    /// state; the next tick emits it.
    pub fn apply(&mut self, command: Command) -> Result<Reply, Error> {
        match command {
            Command::SetRgb(rgb) => {
                self.machine.set_rgb(rgb);
                Ok(Reply::ColorSetRgb(rgb))
            }
            Command::SetHsv(hsv) => {
                self.machine.set_hsv(hsv);
                Ok(Reply::ColorSetHsv(hsv))
            }
            Command::Save => {
                self.save()?;
                Ok(Reply::Saved)
            }
            Command::Help => Ok(Reply::Help),
        }
    }

    pub fn hsv(&self) -> Hsv {
        self.machine.hsv()
    }

    pub fn mode(&self) -> ChannelMode {
        self.machine.mode()
    }

    pub fn set_mode(&mut self, mode: ChannelMode) {
        self.machine.set_mode(mode);
    }

    /// Advances to the next animation mode; wired to the mode button.
    pub fn cycle_mode(&mut self) -> ChannelMode {
        self.machine.cycle_mode()
    }

    /// True while a save is still being confirmed in the background.
    pub fn is_store_busy(&self) -> bool {
        self.store.is_busy()
    }

    pub fn store_statistics(&mut self) -> Result<StoreStatistics, Error> {
        self.store.statistics()
    }
}
