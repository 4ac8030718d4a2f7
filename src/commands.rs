//! Typed wrappers around `ProtocolEngine::send_command` for each operation
//! in the command layer. Every function strips the echoed command-id byte
//! and decodes what remains.

use bitflags::bitflags;

use crate::engine::ProtocolEngine;
use crate::error::TexecomError;
use crate::events::Event;
use crate::zone::{parse_zone_details, PanelIdentity, ZoneCache, ZoneDescriptor};

pub const CMD_LOGIN: u8 = 0x01;
pub const CMD_GET_ZONE_DETAILS: u8 = 0x03;
pub const CMD_GET_LCD_DISPLAY: u8 = 0x0D;
pub const CMD_GET_LOG_POINTER: u8 = 0x0F;
pub const CMD_GET_PANEL_IDENTIFICATION: u8 = 0x16;
pub const CMD_GET_DATE_TIME: u8 = 0x17;
pub const CMD_GET_SYSTEM_POWER: u8 = 0x19;
pub const CMD_SET_EVENT_MESSAGES: u8 = 0x25;

const ACK: u8 = 0x06;
const NAK: u8 = 0x15;

bitflags! {
    /// The 16-bit event-class mask sent to SET_EVENT_MESSAGES.
    pub struct EventFlags: u16 {
        const DEBUG  = 1 << 0;
        const ZONE   = 1 << 1;
        const AREA   = 1 << 2;
        const OUTPUT = 1 << 3;
        const USER   = 1 << 4;
        const LOG    = 1 << 5;
    }
}

impl Default for EventFlags {
    /// DEBUG excluded; everything else on, matching the core's default.
    fn default() -> Self {
        EventFlags::ZONE | EventFlags::AREA | EventFlags::OUTPUT | EventFlags::USER | EventFlags::LOG
    }
}

fn strip_echo(body: Vec<u8>, cmd_id: u8) -> Result<Vec<u8>, TexecomError> {
    debug_assert_eq!(body.first().copied(), Some(cmd_id));
    Ok(body.into_iter().skip(1).collect())
}

fn ack_or_nak(payload: &[u8], command: &'static str) -> Result<bool, TexecomError> {
    match payload.first() {
        Some(&ACK) => Ok(true),
        Some(&NAK) => Ok(false),
        _ => Err(TexecomError::MalformedPayload {
            command,
            detail: format!("expected ACK/NAK, got {:?}", payload),
        }),
    }
}

/// Logs in with the installer/engineer/user UDL password (ASCII digits,
/// not NUL-terminated). A NAK reply is a login rejection, not a normal
/// outcome the caller should branch on — the engine surfaces it as
/// `Err(TexecomError::LoginRejected)` before this function ever sees the
/// payload, so success here always means ACK.
pub fn login(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
    udl: &[u8],
) -> Result<(), TexecomError> {
    let body = engine.send_command(CMD_LOGIN, udl, zones, on_event)?;
    let payload = strip_echo(body, CMD_LOGIN)?;
    match payload.first() {
        Some(&ACK) => Ok(()),
        other => Err(TexecomError::MalformedPayload {
            command: "LOGIN",
            detail: format!("expected ACK, got {:?}", other),
        }),
    }
}

/// Enables the given event classes; the core defaults to
/// `EventFlags::default()` (everything but DEBUG).
pub fn set_event_messages(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
    flags: EventFlags,
) -> Result<bool, TexecomError> {
    let bits = flags.bits();
    let args = [(bits & 0xff) as u8, (bits >> 8) as u8];
    let body = engine.send_command(CMD_SET_EVENT_MESSAGES, &args, zones, on_event)?;
    let payload = strip_echo(body, CMD_SET_EVENT_MESSAGES)?;
    ack_or_nak(&payload, "SET_EVENT_MESSAGES")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelDateTime {
    pub day: u8,
    pub month: u8,
    pub year: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl PanelDateTime {
    fn parse(payload: &[u8]) -> Result<PanelDateTime, TexecomError> {
        if payload.len() < 6 {
            return Err(TexecomError::MalformedPayload {
                command: "GET_DATE_TIME",
                detail: format!("response too short: {} bytes", payload.len()),
            });
        }
        Ok(PanelDateTime {
            day: payload[0],
            month: payload[1],
            year: 2000 + payload[2] as u16,
            hour: payload[3],
            minute: payload[4],
            second: payload[5],
        })
    }

    /// Seconds since the Unix epoch for this date/time, treated as UTC.
    /// Uses Howard Hinnant's `days_from_civil` so the crate doesn't need a
    /// calendar dependency just to compare two clocks.
    pub fn unix_timestamp(&self) -> i64 {
        let y = if self.month <= 2 {
            self.year as i64 - 1
        } else {
            self.year as i64
        };
        let era = if y >= 0 { y } else { y - 399 } / 400;
        let yoe = (y - era * 400) as i64;
        let m = self.month as i64;
        let d = self.day as i64;
        let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        let days = era * 146097 + doe - 719468;
        days * 86_400 + self.hour as i64 * 3600 + self.minute as i64 * 60 + self.second as i64
    }

    /// How far the panel's clock is from `now_unix` (positive: panel ahead).
    pub fn skew_seconds(&self, now_unix: i64) -> i64 {
        self.unix_timestamp() - now_unix
    }
}

pub fn get_date_time(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
) -> Result<PanelDateTime, TexecomError> {
    let body = engine.send_command(CMD_GET_DATE_TIME, &[], zones, on_event)?;
    let payload = strip_echo(body, CMD_GET_DATE_TIME)?;
    PanelDateTime::parse(&payload)
}

pub fn get_lcd_display(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
) -> Result<String, TexecomError> {
    let body = engine.send_command(CMD_GET_LCD_DISPLAY, &[], zones, on_event)?;
    let payload = strip_echo(body, CMD_GET_LCD_DISPLAY)?;
    if payload.len() != 32 {
        return Err(TexecomError::MalformedPayload {
            command: "GET_LCD_DISPLAY",
            detail: format!("expected 32 bytes, got {}", payload.len()),
        });
    }
    Ok(String::from_utf8_lossy(&payload).trim_end().to_string())
}

pub fn get_log_pointer(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
) -> Result<u16, TexecomError> {
    let body = engine.send_command(CMD_GET_LOG_POINTER, &[], zones, on_event)?;
    let payload = strip_echo(body, CMD_GET_LOG_POINTER)?;
    if payload.len() != 2 {
        return Err(TexecomError::MalformedPayload {
            command: "GET_LOG_POINTER",
            detail: format!("expected 2 bytes, got {}", payload.len()),
        });
    }
    Ok(u16::from_le_bytes([payload[0], payload[1]]))
}

pub fn get_panel_identification(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
) -> Result<PanelIdentity, TexecomError> {
    let body = engine.send_command(CMD_GET_PANEL_IDENTIFICATION, &[], zones, on_event)?;
    let payload = strip_echo(body, CMD_GET_PANEL_IDENTIFICATION)?;
    if payload.len() != 32 {
        return Err(TexecomError::MalformedPayload {
            command: "GET_PANEL_IDENTIFICATION",
            detail: format!("expected 32 bytes, got {}", payload.len()),
        });
    }
    let text = String::from_utf8_lossy(&payload);
    PanelIdentity::parse(&text)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemPower {
    pub system_voltage: f32,
    pub battery_voltage: f32,
    pub system_current_ma: f32,
    pub battery_current_ma: f32,
}

pub fn get_system_power(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
) -> Result<SystemPower, TexecomError> {
    let body = engine.send_command(CMD_GET_SYSTEM_POWER, &[], zones, on_event)?;
    let payload = strip_echo(body, CMD_GET_SYSTEM_POWER)?;
    if payload.len() != 5 {
        return Err(TexecomError::MalformedPayload {
            command: "GET_SYSTEM_POWER",
            detail: format!("expected 5 bytes, got {}", payload.len()),
        });
    }
    let reference = payload[0] as f32;
    let voltage = |raw: u8| 13.7 + (raw as f32 - reference) * 0.070;
    let current = |raw: u8| raw as f32 * 9.0;
    Ok(SystemPower {
        system_voltage: voltage(payload[1]),
        battery_voltage: voltage(payload[2]),
        system_current_ma: current(payload[3]),
        battery_current_ma: current(payload[4]),
    })
}

pub fn get_zone_details(
    engine: &mut ProtocolEngine,
    zones: &ZoneCache,
    on_event: &mut dyn FnMut(Event),
    zone_number: u16,
) -> Result<ZoneDescriptor, TexecomError> {
    if zone_number == 0 || zone_number > 255 {
        return Err(TexecomError::MalformedPayload {
            command: "GET_ZONE_DETAILS",
            detail: format!("zone number {} out of range 1..=255", zone_number),
        });
    }
    let body = engine.send_command(CMD_GET_ZONE_DETAILS, &[zone_number as u8], zones, on_event)?;
    let payload = strip_echo(body, CMD_GET_ZONE_DETAILS)?;
    parse_zone_details(zone_number, &payload)
}

/// Queries panel identification for `num_zones`, then fetches each zone's
/// details in order, inserting every zone into `cache` but returning only
/// the ones a user would want to see (`zone_type != 0`).
pub fn enumerate_zones(
    engine: &mut ProtocolEngine,
    cache: &mut ZoneCache,
    on_event: &mut dyn FnMut(Event),
) -> Result<Vec<ZoneDescriptor>, TexecomError> {
    let identity = get_panel_identification(engine, cache, on_event)?;
    let mut visible = Vec::new();
    for zone_number in 1..=identity.num_zones {
        let descriptor = get_zone_details(engine, cache, on_event, zone_number)?;
        cache.insert(descriptor.clone());
        if !descriptor.is_unused() {
            visible.push(descriptor);
        }
    }
    Ok(visible)
}
