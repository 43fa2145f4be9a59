use thiserror::Error;

/// Errors that can occur during lamp-core operations. The list is likely to stay as is but
/// marked as non-exhaustive to allow for future additions without breaking the API. A control
/// transport would typically forward the `Display` text of rejections to the user verbatim.
#[derive(Error, Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The region offset has to be aligned to the flash erase-page size.
    #[error("invalid region offset")]
    InvalidRegionOffset,

    /// The region has to span 1..=32 pages inside the flash capacity, and every page must
    /// hold at least one record slot behind the preamble.
    #[error("invalid region size")]
    InvalidRegionSize,

    /// Preamble and record writes must be expressible in the driver's read/write granularity
    /// (a granularity dividing 4 bytes).
    #[error("unsupported flash geometry")]
    UnsupportedFlash,

    /// The internal error value is returned from the provided flash driver. The affected page
    /// is retired for the rest of the session.
    #[error("internal flash error")]
    Flash,

    /// A previous write or erase cycle has not been confirmed yet. Keep polling the store and
    /// retry the write.
    #[error("store is busy")]
    Busy,

    /// Hue is limited to 0..=360.
    #[error("hue out of range (0-360)")]
    HueOutOfRange,

    /// Saturation is limited to 0..=100.
    #[error("saturation out of range (0-100)")]
    SaturationOutOfRange,

    /// Brightness is limited to 0..=100.
    #[error("brightness out of range (0-100)")]
    BrightnessOutOfRange,

    /// RGB components are limited to 0..=255.
    #[error("rgb component out of range (0-255)")]
    RgbOutOfRange,

    /// The command name is none of `rgb`, `hsv`, `save`, `help`.
    #[error("incorrect cmd name")]
    UnknownCommand,

    /// `rgb` takes exactly three numeric arguments.
    #[error("args: <r> <g> <b>")]
    RgbUsage,

    /// `hsv` takes exactly three numeric arguments.
    #[error("args: <h> <s> <v>")]
    HsvUsage,
}
