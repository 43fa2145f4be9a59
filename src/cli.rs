//! Control-interface command parsing.
//!
//! The lamp accepts `rgb <r> <g> <b>`, `hsv <h> <s> <v>`, `save` and `help` over its control
//! link. The transport (USB CDC, GATT characteristic) is not this crate's business; this
//! module turns one received line into a [`Command`] and rejects malformed or out-of-range
//! input with a textual error.

use crate::color::Hsv;
use crate::error::Error;
use core::str::SplitWhitespace;
use rgb::RGB8;

/// One parsed control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetRgb(RGB8),
    SetHsv(Hsv),
    Save,
    Help,
}

/// Parses one command line. Tokens past the expected arguments are ignored; numbers that do
/// not fit a u16 read as malformed arguments.
pub fn parse_line(line: &str) -> Result<Command, Error> {
    let mut words = line.split_whitespace();

    match words.next() {
        Some("rgb") => {
            let (r, g, b) = numeric_args(&mut words, Error::RgbUsage)?;
            if r > 255 || g > 255 || b > 255 {
                return Err(Error::RgbOutOfRange);
            }
            Ok(Command::SetRgb(RGB8::new(r as u8, g as u8, b as u8)))
        }
        Some("hsv") => {
            let (h, s, v) = numeric_args(&mut words, Error::HsvUsage)?;
            let saturation = u8::try_from(s).map_err(|_| Error::SaturationOutOfRange)?;
            let brightness = u8::try_from(v).map_err(|_| Error::BrightnessOutOfRange)?;
            Ok(Command::SetHsv(Hsv::new(h, saturation, brightness)?))
        }
        Some("save") => Ok(Command::Save),
        Some("help") => Ok(Command::Help),
        _ => Err(Error::UnknownCommand),
    }
}

fn numeric_args(words: &mut SplitWhitespace<'_>, usage: Error) -> Result<(u16, u16, u16), Error> {
    let mut next = || -> Result<u16, Error> {
        words.next().ok_or(usage)?.parse().map_err(|_| usage)
    };
    Ok((next()?, next()?, next()?))
}
