#![doc = include_str!("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

mod cli;
mod color;
pub mod error;
mod lamp;
mod machine;
pub mod platform;
mod store;

pub use cli::{Command, parse_line};
pub use color::{Hsv, RECORD_SIZE};
pub use error::Error;
pub use lamp::{Lamp, Reply};
pub use machine::{ChannelMode, ColorMachine, step};
pub use store::{PAGE_PREAMBLE, PageState, RecordStore, StoreStatistics};

// Re-export the RGB type used throughout the public API.
pub use rgb::RGB8;
