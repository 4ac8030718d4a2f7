//! Client for the Texecom Connect protocol spoken by Texecom intruder-alarm
//! control panels over TCP: frame codec, sequence tracking, the command
//! layer, and the zone/event decoders built on top of them.

mod client;
mod commands;
mod counters;
mod crc;
mod engine;
mod error;
mod events;
mod frame;
mod transport;
mod zone;

pub use client::TexecomClient;
pub use commands::{EventFlags, PanelDateTime, SystemPower};
pub use error::{Result, TexecomError};
pub use events::{
    AreaEvent, AreaState, Event, LogEvent, LogTimestamp, OutputEvent, UserEvent, UserMethod, ZoneEvent, ZoneState,
};
pub use frame::{Frame, FrameType};
pub use zone::{PanelIdentity, ZoneAreaWidth, ZoneCache, ZoneDescriptor};
