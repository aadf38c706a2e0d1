//! Sensor records (what discovery registers) and the values each family captures.

use std::fmt;

// ==============================================================================
// 1-wire addressing
// ==============================================================================

/// 64-bit 1-Wire ROM code: family byte, 6 serial bytes, crc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OneWireAddress(pub [u8; 8]);

impl OneWireAddress {
    /// Parses exactly eight hex components separated by `:` or `,`.
    /// Components may carry a `0x` prefix and surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        let mut bytes = [0u8; 8];
        let mut count = 0;

        for part in text.split([':', ',']) {
            if count == bytes.len() {
                return None;
            }
            let part = part.trim();
            let digits = part
                .strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .unwrap_or(part);
            if digits.is_empty() || digits.len() > 2 {
                return None;
            }
            bytes[count] = u8::from_str_radix(digits, 16).ok()?;
            count += 1;
        }

        (count == bytes.len()).then_some(Self(bytes))
    }

    /// Device directory name used by the linux w1 subsystem, e.g. `28-0316a2796bff`.
    /// The kernel prints the serial bytes most-significant first.
    pub fn w1_device_name(&self) -> String {
        let serial: Vec<u8> = self.0[1..7].iter().rev().copied().collect();
        format!("{:02x}-{}", self.0[0], hex::encode(serial))
    }
}

impl fmt::Display for OneWireAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{b:02X}")).collect();
        write!(f, "{}", parts.join(":"))
    }
}

// ==============================================================================
// records
// ==============================================================================

/// Surface and background probe of one culture tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempPair {
    pub surface: OneWireAddress,
    pub background: OneWireAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboSensor {
    pub pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhProbe {
    pub pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrpProbe {
    pub address: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSensor {
    pub pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSensor {
    pub pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightModel {
    Bh1750,
    Max44009,
}

impl LightModel {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "BH1750" => Some(Self::Bh1750),
            "MAX44009" => Some(Self::Max44009),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSensor {
    pub model: LightModel,
    pub address: u8,
    /// GPIO tied to the sensor's ADDR line, 0 when hard-wired.
    pub address_pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentModel {
    /// Hall-effect board; variant = range in amps (5, 20, 30).
    Acs712,
    /// Split-core transformer; variant = rated amps per volt.
    Sct013,
}

impl CurrentModel {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "ACS712" => Some(Self::Acs712),
            "SCT013" => Some(Self::Sct013),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentSensor {
    pub pin: u8,
    pub model: CurrentModel,
    pub variant: u16,
}

/// Light sensor behind an RGB LED, read once per colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpticalSensor {
    pub address: u8,
    pub led_red: u8,
    pub led_green: u8,
    pub led_blue: u8,
}

// ==============================================================================
// captured values
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairReading {
    pub surface: f32,
    pub background: f32,
}

impl PairReading {
    pub fn mean(&self) -> f32 {
        (self.surface + self.background) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboReading {
    pub temperature: f32,
    pub humidity: f32,
}

/// Light levels with LEDs off, then lit red, green, blue and all three.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpticalReading {
    pub pre_light: f32,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub white: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_and_comma_addresses() {
        let colon = OneWireAddress::parse("28:FF:4B:6B:79:A2:16:03").unwrap();
        let comma = OneWireAddress::parse("0x28, 0xFF, 0x4B, 0x6B, 0x79, 0xA2, 0x16, 0x03").unwrap();
        assert_eq!(colon, comma);
        assert_eq!(colon.0, [0x28, 0xFF, 0x4B, 0x6B, 0x79, 0xA2, 0x16, 0x03]);
    }

    #[test]
    fn rejects_wrong_component_counts_and_bad_digits() {
        assert!(OneWireAddress::parse("28:FF:4B:6B:79:A2:16:03:99").is_none());
        assert!(OneWireAddress::parse("28:FF:4B:6B:79:A2:16").is_none());
        assert!(OneWireAddress::parse("28:FF:4B:6B:79:A2:16:ZZ").is_none());
        assert!(OneWireAddress::parse("28:FF:4B:6B:79:A2:16:").is_none());
        assert!(OneWireAddress::parse("").is_none());
    }

    #[test]
    fn w1_name_reverses_serial() {
        let addr = OneWireAddress::parse("28:FF:6B:79:A2:16:03:5C").unwrap();
        assert_eq!(addr.w1_device_name(), "28-0316a2796bff");
        assert_eq!(addr.to_string(), "28:FF:6B:79:A2:16:03:5C");
    }

    #[test]
    fn model_tags_are_case_insensitive() {
        assert_eq!(LightModel::from_tag(" bh1750 "), Some(LightModel::Bh1750));
        assert_eq!(CurrentModel::from_tag("sct013"), Some(CurrentModel::Sct013));
        assert_eq!(CurrentModel::from_tag("INA219"), None);
    }
}
