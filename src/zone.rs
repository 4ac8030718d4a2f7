//! Zone descriptors, the zone cache, and panel identification parsing.

use std::collections::HashMap;

use crate::error::TexecomError;

/// Which area-bitmap width a zone-details response used, recorded alongside
/// the decoded descriptor so callers don't have to re-derive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAreaWidth {
    Bits8,
    Bits16,
    Bits64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDescriptor {
    pub zone_number: u16,
    pub zone_type: u8,
    pub area_bitmap: u64,
    pub area_width: ZoneAreaWidth,
    pub text: String,
}

impl ZoneDescriptor {
    pub const UNUSED: u8 = 0;

    pub fn is_unused(&self) -> bool {
        self.zone_type == Self::UNUSED
    }
}

/// Parses a GET_ZONE_DETAILS response payload (everything after the echoed
/// command-id byte) into a `ZoneDescriptor`. Length selects the variant:
/// 34 -> 8-bit area bitmap, 35 -> 16-bit, 41 -> 64-bit.
pub fn parse_zone_details(zone_number: u16, payload: &[u8]) -> Result<ZoneDescriptor, TexecomError> {
    let (zone_type, area_bitmap, area_width, text_bytes) = match payload.len() {
        34 => (
            payload[0],
            payload[1] as u64,
            ZoneAreaWidth::Bits8,
            &payload[2..34],
        ),
        35 => (
            payload[0],
            u16::from_le_bytes([payload[1], payload[2]]) as u64,
            ZoneAreaWidth::Bits16,
            &payload[3..35],
        ),
        41 => (
            payload[0],
            u64::from_le_bytes(payload[1..9].try_into().unwrap()),
            ZoneAreaWidth::Bits64,
            &payload[9..41],
        ),
        other => {
            return Err(TexecomError::MalformedPayload {
                command: "GET_ZONE_DETAILS",
                detail: format!("unexpected response length {}", other),
            })
        }
    };

    Ok(ZoneDescriptor {
        zone_number,
        zone_type,
        area_bitmap,
        area_width,
        text: clean_zone_text(text_bytes),
    })
}

/// Replaces NUL with space, collapses runs of non-word characters to a
/// single space, and trims the result.
fn clean_zone_text(raw: &[u8]) -> String {
    let replaced: String = raw
        .iter()
        .map(|&b| if b == 0 { ' ' } else { b as char })
        .collect();

    let mut cleaned = String::with_capacity(replaced.len());
    let mut last_was_space = false;
    for c in replaced.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            cleaned.push(c);
            last_was_space = false;
        } else if !last_was_space {
            cleaned.push(' ');
            last_was_space = true;
        }
    }
    cleaned.trim().to_string()
}

/// Mapping from zone number to descriptor, built once during session setup
/// and read-only thereafter.
#[derive(Debug, Default)]
pub struct ZoneCache {
    zones: HashMap<u16, ZoneDescriptor>,
}

impl ZoneCache {
    pub fn new() -> Self {
        ZoneCache::default()
    }

    pub fn insert(&mut self, descriptor: ZoneDescriptor) {
        self.zones.insert(descriptor.zone_number, descriptor);
    }

    pub fn get(&self, zone_number: u16) -> Option<&ZoneDescriptor> {
        self.zones.get(&zone_number)
    }

    pub fn text_for(&self, zone_number: u16) -> &str {
        self.zones
            .get(&zone_number)
            .map(|z| z.text.as_str())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// The four whitespace-separated tokens returned by GET_PANEL_IDENTIFICATION.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelIdentity {
    pub panel_type: String,
    pub num_zones: u16,
    pub unspecified: String,
    pub firmware_version: String,
}

impl PanelIdentity {
    pub fn parse(text: &str) -> Result<PanelIdentity, TexecomError> {
        let mut tokens = text.split_whitespace();
        let panel_type = tokens.next().ok_or_else(|| malformed("missing panel type"))?;
        let num_zones_tok = tokens.next().ok_or_else(|| malformed("missing zone count"))?;
        let unspecified = tokens.next().ok_or_else(|| malformed("missing third token"))?;
        let firmware_version = tokens.next().ok_or_else(|| malformed("missing firmware version"))?;

        let num_zones: u16 = num_zones_tok
            .parse()
            .map_err(|_| malformed(&format!("zone count '{}' is not an integer", num_zones_tok)))?;

        Ok(PanelIdentity {
            panel_type: panel_type.to_string(),
            num_zones,
            unspecified: unspecified.to_string(),
            firmware_version: firmware_version.to_string(),
        })
    }
}

fn malformed(detail: &str) -> TexecomError {
    TexecomError::MalformedPayload {
        command: "GET_PANEL_IDENTIFICATION",
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_34_selects_8_bit_area_bitmap() {
        let mut payload = vec![7u8, 0xab];
        payload.extend_from_slice(&[b'K'; 32]);
        let zone = parse_zone_details(1, &payload).unwrap();
        assert_eq!(zone.zone_type, 7);
        assert_eq!(zone.area_bitmap, 0xab);
        assert_eq!(zone.area_width, ZoneAreaWidth::Bits8);
    }

    #[test]
    fn variant_35_selects_16_bit_area_bitmap() {
        let mut payload = vec![7u8, 0x34, 0x12];
        payload.extend_from_slice(&[b'K'; 32]);
        let zone = parse_zone_details(1, &payload).unwrap();
        assert_eq!(zone.area_bitmap, 0x1234);
        assert_eq!(zone.area_width, ZoneAreaWidth::Bits16);
    }

    #[test]
    fn variant_41_selects_64_bit_area_bitmap_and_cleans_text() {
        let mut payload = vec![7u8, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let mut text = b"KITCHEN".to_vec();
        text.push(0);
        text.extend_from_slice(b"WINDOW");
        text.resize(32, 0);
        payload.extend_from_slice(&text);

        let zone = parse_zone_details(7, &payload).unwrap();
        assert_eq!(zone.zone_type, 7);
        assert_eq!(zone.area_bitmap, 0x0000_0001_0000_0000);
        assert_eq!(zone.area_width, ZoneAreaWidth::Bits64);
        assert_eq!(zone.text, "KITCHEN WINDOW");
    }

    #[test]
    fn other_lengths_are_rejected() {
        assert!(parse_zone_details(1, &[0u8; 10]).is_err());
    }

    #[test]
    fn panel_identity_parses_four_tokens() {
        let id = PanelIdentity::parse("Premier48 48 X 4.0\n").unwrap();
        assert_eq!(id.panel_type, "Premier48");
        assert_eq!(id.num_zones, 48);
        assert_eq!(id.unspecified, "X");
        assert_eq!(id.firmware_version, "4.0");
    }
}
