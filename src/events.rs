//! Decodes Message-frame payloads into `Event`s.

use crate::error::TexecomError;
use crate::zone::ZoneCache;

const MSG_DEBUG: u8 = 0x00;
const MSG_ZONEEVENT: u8 = 0x01;
const MSG_AREAEVENT: u8 = 0x02;
const MSG_OUTPUTEVENT: u8 = 0x03;
const MSG_USEREVENT: u8 = 0x04;
const MSG_LOGEVENT: u8 = 0x05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Secure,
    Active,
    Tamper,
    Short,
}

impl ZoneState {
    fn from_bits(bits: u8) -> ZoneState {
        match bits & 0x3 {
            0 => ZoneState::Secure,
            1 => ZoneState::Active,
            2 => ZoneState::Tamper,
            _ => ZoneState::Short,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEvent {
    pub zone_number: u16,
    pub state: ZoneState,
    pub fault: bool,
    pub failed_test: bool,
    pub alarmed: bool,
    pub manual_bypass: bool,
    pub auto_bypass: bool,
    pub masked: bool,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaState {
    Disarmed,
    InExit,
    InEntry,
    Armed,
    PartArmed,
    InAlarm,
}

impl AreaState {
    fn from_byte(byte: u8) -> Result<AreaState, TexecomError> {
        Ok(match byte {
            0 => AreaState::Disarmed,
            1 => AreaState::InExit,
            2 => AreaState::InEntry,
            3 => AreaState::Armed,
            4 => AreaState::PartArmed,
            5 => AreaState::InAlarm,
            other => {
                return Err(TexecomError::MalformedPayload {
                    command: "AREA_EVENT",
                    detail: format!("unknown area state {}", other),
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaEvent {
    pub area_number: u8,
    pub state: AreaState,
}

const OUTPUT_LOCATION_NAMES: [&str; 10] = [
    "Panel outputs",
    "Digi outputs",
    "Digi Channel low 8",
    "Digi Channel high 8",
    "Redcare outputs",
    "Custom outputs 1",
    "Custom outputs 2",
    "Custom outputs 3",
    "Custom outputs 4",
    "X-10 outputs",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub location: u8,
    pub name: String,
    pub bitmap: u8,
}

fn output_name(location: u8) -> String {
    if (location as usize) < OUTPUT_LOCATION_NAMES.len() {
        OUTPUT_LOCATION_NAMES[location as usize].to_string()
    } else {
        let network = location >> 4;
        let device = location & 0xf;
        if device == 0 {
            format!("Network {} keypad outputs", network)
        } else {
            format!("Network {} expander {} outputs", network, device)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMethod {
    Code,
    Tag,
    CodeAndTag,
}

impl UserMethod {
    fn from_byte(byte: u8) -> Result<UserMethod, TexecomError> {
        Ok(match byte {
            0 => UserMethod::Code,
            1 => UserMethod::Tag,
            2 => UserMethod::CodeAndTag,
            other => {
                return Err(TexecomError::MalformedPayload {
                    command: "USER_EVENT",
                    detail: format!("unknown user method {}", other),
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEvent {
    pub user_number: u8,
    pub method: UserMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl LogTimestamp {
    fn decode(raw: u32) -> LogTimestamp {
        LogTimestamp {
            second: (raw & 0x3f) as u8,
            minute: ((raw >> 6) & 0x3f) as u8,
            month: ((raw >> 12) & 0xf) as u8,
            hour: ((raw >> 16) & 0x1f) as u8,
            day: ((raw >> 21) & 0x1f) as u8,
            year: 2000 + ((raw >> 26) & 0x3f) as u16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub event_type: u8,
    pub event_type_name: String,
    pub group_type: u8,
    pub group_type_name: String,
    pub parameter: u16,
    pub areas: u16,
    pub timestamp: LogTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Debug(Vec<u8>),
    Zone(ZoneEvent),
    Area(AreaEvent),
    Output(OutputEvent),
    User(UserEvent),
    Log(LogEvent),
}

/// Decodes a full Message-frame body (tag byte plus remainder) into an
/// `Event`, consulting `zones` for zone text.
pub fn decode_message(payload: &[u8], zones: &ZoneCache) -> Result<Event, TexecomError> {
    let (&tag, rest) = payload
        .split_first()
        .ok_or_else(|| malformed("MESSAGE", "empty message payload"))?;

    match tag {
        MSG_DEBUG => Ok(Event::Debug(rest.to_vec())),
        MSG_ZONEEVENT => decode_zone_event(rest, zones),
        MSG_AREAEVENT => decode_area_event(rest),
        MSG_OUTPUTEVENT => decode_output_event(rest),
        MSG_USEREVENT => decode_user_event(rest),
        MSG_LOGEVENT => decode_log_event(rest),
        other => Err(malformed("MESSAGE", &format!("unknown message type {}", other))),
    }
}

fn decode_zone_event(payload: &[u8], zones: &ZoneCache) -> Result<Event, TexecomError> {
    let (zone_number, bitmap) = match payload.len() {
        2 => (payload[0] as u16, payload[1]),
        3 => (u16::from_le_bytes([payload[0], payload[1]]), payload[2]),
        other => return Err(malformed("ZONE_EVENT", &format!("unexpected length {}", other))),
    };

    Ok(Event::Zone(ZoneEvent {
        zone_number,
        state: ZoneState::from_bits(bitmap),
        fault: bitmap & (1 << 2) != 0,
        failed_test: bitmap & (1 << 3) != 0,
        alarmed: bitmap & (1 << 4) != 0,
        manual_bypass: bitmap & (1 << 5) != 0,
        auto_bypass: bitmap & (1 << 6) != 0,
        masked: bitmap & (1 << 7) != 0,
        text: zones.text_for(zone_number).to_string(),
    }))
}

fn decode_area_event(payload: &[u8]) -> Result<Event, TexecomError> {
    if payload.len() != 2 {
        return Err(malformed("AREA_EVENT", &format!("unexpected length {}", payload.len())));
    }
    Ok(Event::Area(AreaEvent {
        area_number: payload[0],
        state: AreaState::from_byte(payload[1])?,
    }))
}

fn decode_output_event(payload: &[u8]) -> Result<Event, TexecomError> {
    if payload.len() != 2 {
        return Err(malformed("OUTPUT_EVENT", &format!("unexpected length {}", payload.len())));
    }
    let location = payload[0];
    Ok(Event::Output(OutputEvent {
        location,
        name: output_name(location),
        bitmap: payload[1],
    }))
}

fn decode_user_event(payload: &[u8]) -> Result<Event, TexecomError> {
    if payload.len() != 2 {
        return Err(malformed("USER_EVENT", &format!("unexpected length {}", payload.len())));
    }
    Ok(Event::User(UserEvent {
        user_number: payload[0],
        method: UserMethod::from_byte(payload[1])?,
    }))
}

fn decode_log_event(payload: &[u8]) -> Result<Event, TexecomError> {
    let (event_type, group_type, parameter, areas, timestamp_bytes) = match payload.len() {
        8 => (
            payload[0],
            payload[1],
            payload[2] as u16,
            payload[3] as u16,
            &payload[4..8],
        ),
        9 => (
            payload[0],
            payload[1],
            payload[2] as u16,
            payload[3] as u16 | ((payload[8] as u16) << 8),
            &payload[4..8],
        ),
        10 => (
            payload[0],
            payload[1],
            u16::from_le_bytes([payload[2], payload[3]]),
            u16::from_le_bytes([payload[4], payload[5]]),
            &payload[6..10],
        ),
        other => return Err(malformed("LOG_EVENT", &format!("unexpected length {}", other))),
    };

    let timestamp_raw = u32::from_le_bytes(timestamp_bytes.try_into().unwrap());
    let timestamp = LogTimestamp::decode(timestamp_raw);

    Ok(Event::Log(LogEvent {
        event_type,
        event_type_name: log_event_type_name(event_type).to_string(),
        group_type,
        group_type_name: log_group_type_name(group_type).to_string(),
        parameter,
        areas,
        timestamp,
    }))
}

fn malformed(command: &'static str, detail: &str) -> TexecomError {
    TexecomError::MalformedPayload {
        command,
        detail: detail.to_string(),
    }
}

/// Maps a log event-type code (1..=122) to its fixed description. Unknown
/// codes fall back to a numeric label.
pub fn log_event_type_name(code: u8) -> String {
    LOG_EVENT_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("Unknown log event type {}", code))
}

/// Maps a log group-type code (0..=35) to its fixed description.
pub fn log_group_type_name(code: u8) -> String {
    LOG_GROUP_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("Unknown log group type {}", code))
}

const LOG_EVENT_TYPES: &[(u8, &str)] = &[
    (1, "Entry/Exit 1"),
    (2, "Entry/Exit 2"),
    (3, "Interior"),
    (4, "Perimeter"),
    (5, "24hr Audible"),
    (6, "24hr Silent"),
    (7, "Audible PA"),
    (8, "Silent PA"),
    (9, "Fire Alarm"),
    (10, "Medical"),
    (11, "24Hr Gas Alarm"),
    (12, "Auxiliary Alarm"),
    (13, "24hr Tamper Alarm"),
    (14, "Exit Terminator"),
    (15, "Keyswitch - Momentary"),
    (16, "Keyswitch - Latching"),
    (17, "Security Key"),
    (18, "Omit Key"),
    (19, "Custom Alarm"),
    (20, "Confirmed PA Audible"),
    (21, "Confirmed PA Audible"),
    (22, "Keypad Medical"),
    (23, "Keypad Fire"),
    (24, "Keypad Audible PA"),
    (25, "Keypad Silent PA"),
    (26, "Duress Code Alarm"),
    (27, "Alarm Active"),
    (28, "Bell Active"),
    (29, "Re-arm"),
    (30, "Verified Cross Zone Alarm"),
    (31, "User Code"),
    (32, "Exit Started"),
    (33, "Exit Error (Arming Failed)"),
    (34, "Entry Started"),
    (35, "Part Arm Suite"),
    (36, "Armed with Line Fault"),
    (37, "Open/Close (Away Armed)"),
    (38, "Part Armed"),
    (39, "Auto Open/Close"),
    (40, "Auto Arm Deferred"),
    (41, "Open After Alarm (Alarm Abort)"),
    (42, "Remote Open/Close"),
    (43, "Quick Arm"),
    (44, "Recent Closing"),
    (45, "Reset After Alarm"),
    (46, "Power O/P Fault"),
    (47, "AC Fail"),
    (48, "Low Battery"),
    (49, "System Power Up"),
    (50, "Mains Over Voltage"),
    (51, "Telephone Line Fault"),
    (52, "Fail to Communicate"),
    (53, "Download Start"),
    (54, "Download End"),
    (55, "Log Capacity Alert (80%)"),
    (56, "Date Changed"),
    (57, "Time Changed"),
    (58, "Installer Programming Start"),
    (59, "Installer Programming End"),
    (60, "Panel Box Tamper"),
    (61, "Bell Tamper"),
    (62, "Auxiliary Tamper"),
    (63, "Expander Tamper"),
    (64, "Keypad Tamper"),
    (65, "Expander Trouble (Network error)"),
    (66, "Remote Keypad Trouble (Network error)"),
    (67, "Fire Zone Tamper"),
    (68, "Zone Tamper"),
    (69, "Keypad Lockout"),
    (70, "Code Tamper Alarm"),
    (71, "Soak Test Alarm"),
    (72, "Manual Test Transmission"),
    (73, "Automatic Test Transmission"),
    (74, "User Walk Test Start/End"),
    (75, "NVM Defaults Loaded"),
    (76, "First Knock"),
    (77, "Door Access"),
    (78, "Part Arm 1"),
    (79, "Part Arm 2"),
    (80, "Part Arm 3"),
    (81, "Auto Arming Started"),
    (82, "Confirmed Alarm"),
    (83, "Prox Tag"),
    (84, "Access Code Changed/Deleted"),
    (85, "Arm Failed"),
    (86, "Log Cleared"),
    (87, "iD Loop Shorted"),
    (88, "Communication Port"),
    (89, "TAG System Exit (Batt. OK)"),
    (90, "TAG System Exit (Batt. LOW)"),
    (91, "TAG System Entry (Batt. OK)"),
    (92, "TAG System Entry (Batt. LOW)"),
    (93, "Microphone Activated"),
    (94, "AV Cleared Down"),
    (95, "Monitored Alarm"),
    (96, "Expander Low Voltage"),
    (97, "Supervision Fault"),
    (98, "PA from Remote FOB"),
    (99, "RF Device Low Battery"),
    (100, "Site Data Changed"),
    (101, "Radio Jamming"),
    (102, "Test Call Passed"),
    (103, "Test Call Failed"),
    (104, "Zone Fault"),
    (105, "Zone Masked"),
    (106, "Faults Overridden"),
    (107, "PSU AC Fail"),
    (108, "PSU Battery Fail"),
    (109, "PSU Low Output Fail"),
    (110, "PSU Tamper"),
    (111, "Door Access"),
    (112, "CIE Reset"),
    (113, "Remote Command"),
    (114, "User Added"),
    (115, "User Deleted"),
    (116, "Confirmed PA"),
    (117, "User Acknowledged"),
    (118, "Power Unit Failure"),
    (119, "Battery Charger Fault"),
    (120, "Confirmed Intruder"),
    (121, "GSM Tamper"),
    (122, "Radio Config. Failure"),
];

const LOG_GROUP_TYPES: &[(u8, &str)] = &[
    (0, "Not Reported"),
    (1, "Priority Alarm"),
    (2, "Priority Alarm Restore"),
    (3, "Alarm"),
    (4, "Restore"),
    (5, "Open"),
    (6, "Close"),
    (7, "Bypassed"),
    (8, "Unbypassed"),
    (9, "Maintenance Alarm"),
    (10, "Maintenance Restore"),
    (11, "Tamper Alarm"),
    (12, "Tamper Restore"),
    (13, "Test Start"),
    (14, "Test End"),
    (15, "Disarmed"),
    (16, "Armed"),
    (17, "Tested"),
    (18, "Started"),
    (19, "Ended"),
    (20, "Fault"),
    (21, "Omitted"),
    (22, "Reinstated"),
    (23, "Stopped"),
    (24, "Start"),
    (25, "Deleted"),
    (26, "Active"),
    (27, "Not Used"),
    (28, "Changed"),
    (29, "Low Battery"),
    (30, "Radio"),
    (31, "Deactivated"),
    (32, "Added"),
    (33, "Bad Action"),
    (34, "PA Timer Reset"),
    (35, "PA Zone Lockout"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::{parse_zone_details, ZoneCache};

    #[test]
    fn debug_message_carries_opaque_bytes() {
        let zones = ZoneCache::new();
        let event = decode_message(&[MSG_DEBUG, 0xde, 0xad], &zones).unwrap();
        assert_eq!(event, Event::Debug(vec![0xde, 0xad]));
    }

    #[test]
    fn zone_event_two_byte_form_decodes_state_and_flags() {
        let mut zones = ZoneCache::new();
        let mut payload = vec![7u8, 0x00];
        payload.extend_from_slice(&[b'K'; 32]);
        zones.insert(parse_zone_details(1, &payload).unwrap());

        let bitmap = 0b1001_0001u8; // active, failed test, zone masked
        let event = decode_message(&[MSG_ZONEEVENT, 1, bitmap], &zones).unwrap();
        match event {
            Event::Zone(z) => {
                assert_eq!(z.zone_number, 1);
                assert_eq!(z.state, ZoneState::Active);
                assert!(z.failed_test);
                assert!(z.masked);
                assert!(!z.fault);
                assert_eq!(z.text, "K".repeat(32));
            }
            other => panic!("expected zone event, got {:?}", other),
        }
    }

    #[test]
    fn zone_event_three_byte_form_uses_16_bit_zone_number() {
        let zones = ZoneCache::new();
        let event = decode_message(&[MSG_ZONEEVENT, 0x00, 0x01, 0x02], &zones).unwrap();
        match event {
            Event::Zone(z) => assert_eq!(z.zone_number, 256),
            other => panic!("expected zone event, got {:?}", other),
        }
    }

    #[test]
    fn area_event_decodes_state() {
        let zones = ZoneCache::new();
        let event = decode_message(&[MSG_AREAEVENT, 1, 3], &zones).unwrap();
        assert_eq!(
            event,
            Event::Area(AreaEvent {
                area_number: 1,
                state: AreaState::Armed,
            })
        );
    }

    #[test]
    fn output_event_uses_fixed_name_for_low_locations() {
        let zones = ZoneCache::new();
        let event = decode_message(&[MSG_OUTPUTEVENT, 0, 0xff], &zones).unwrap();
        match event {
            Event::Output(o) => {
                assert_eq!(o.name, "Panel outputs");
                assert_eq!(o.bitmap, 0xff);
            }
            other => panic!("expected output event, got {:?}", other),
        }
    }

    #[test]
    fn output_event_derives_network_device_name_above_table() {
        let zones = ZoneCache::new();
        // location 0x21 -> network 2, device 1 (expander)
        let event = decode_message(&[MSG_OUTPUTEVENT, 0x21, 0x00], &zones).unwrap();
        match event {
            Event::Output(o) => assert_eq!(o.name, "Network 2 expander 1 outputs"),
            other => panic!("expected output event, got {:?}", other),
        }
    }

    #[test]
    fn user_event_decodes_method() {
        let zones = ZoneCache::new();
        let event = decode_message(&[MSG_USEREVENT, 5, 1], &zones).unwrap();
        assert_eq!(
            event,
            Event::User(UserEvent {
                user_number: 5,
                method: UserMethod::Tag,
            })
        );
    }

    #[test]
    fn log_event_8_byte_form_unpacks_timestamp_bit_fields() {
        let zones = ZoneCache::new();
        let timestamp: u32 = 0x2F4A_1234;
        let mut payload = vec![MSG_LOGEVENT, 49, 16, 7];
        payload.extend_from_slice(&timestamp.to_le_bytes());
        let event = decode_message(&payload, &zones).unwrap();
        match event {
            Event::Log(log) => {
                assert_eq!(log.event_type, 49);
                assert_eq!(log.event_type_name, "System Power Up");
                assert_eq!(log.group_type, 16);
                assert_eq!(log.group_type_name, "Armed");
                assert_eq!(log.parameter, 7);
                assert_eq!(
                    log.timestamp,
                    LogTimestamp {
                        second: 52,
                        minute: 8,
                        month: 1,
                        hour: 10,
                        day: 26,
                        year: 2011,
                    }
                );
            }
            other => panic!("expected log event, got {:?}", other),
        }
    }

    #[test]
    fn log_event_9_byte_form_takes_high_area_byte_from_the_tail() {
        let zones = ZoneCache::new();
        let mut payload = vec![MSG_LOGEVENT, 1, 1, 0x34, 0x00, 0x00, 0x00, 0x00, 0x01];
        payload[4..8].copy_from_slice(&0u32.to_le_bytes());
        let event = decode_message(&payload, &zones).unwrap();
        match event {
            Event::Log(log) => assert_eq!(log.areas, 0x0134),
            other => panic!("expected log event, got {:?}", other),
        }
    }

    #[test]
    fn log_event_10_byte_form_uses_16_bit_parameter_and_areas() {
        let zones = ZoneCache::new();
        let mut payload = vec![MSG_LOGEVENT, 1, 0x01, 0x02, 0x03, 0x04];
        payload.extend_from_slice(&0u32.to_le_bytes());
        let event = decode_message(&payload, &zones).unwrap();
        match event {
            Event::Log(log) => {
                assert_eq!(log.parameter, 0x0201);
                assert_eq!(log.areas, 0x0403);
            }
            other => panic!("expected log event, got {:?}", other),
        }
    }

    #[test]
    fn unknown_log_event_type_renders_numerically() {
        assert_eq!(log_event_type_name(200), "Unknown log event type 200");
        assert_eq!(log_group_type_name(200), "Unknown log group type 200");
    }
}
