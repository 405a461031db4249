//! Prayer-time zone codes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PrayerError, PrayerResult};

/// Every zone published by the e-Solat service.
pub const ALL_ZONES: &[&str] = &[
    "JHR01", "JHR02", "JHR03", "JHR04",
    "KDH01", "KDH02", "KDH03", "KDH04", "KDH05", "KDH06", "KDH07",
    "KTN01", "KTN02",
    "MLK01",
    "NGS01", "NGS02", "NGS03",
    "PHG01", "PHG02", "PHG03", "PHG04", "PHG05", "PHG06", "PHG07",
    "PLS01",
    "PNG01",
    "PRK01", "PRK02", "PRK03", "PRK04", "PRK05", "PRK06", "PRK07",
    "SBH01", "SBH02", "SBH03", "SBH04", "SBH05", "SBH06", "SBH07", "SBH08", "SBH09",
    "SGR01", "SGR02", "SGR03",
    "SWK01", "SWK02", "SWK03", "SWK04", "SWK05", "SWK06", "SWK07", "SWK08", "SWK09",
    "TRG01", "TRG02", "TRG03", "TRG04",
    "WLY01", "WLY02",
];

/// Identifier of a geographic prayer-time zone, e.g. `WLY01`.
///
/// Three uppercase ASCII letters (state prefix) followed by two digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneCode(String);

impl ZoneCode {
    /// Parse and validate a zone code.
    pub fn parse(code: &str) -> PrayerResult<Self> {
        let bytes = code.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[..3].iter().all(u8::is_ascii_uppercase)
            && bytes[3..].iter().all(u8::is_ascii_digit);

        if well_formed {
            Ok(Self(code.to_string()))
        } else {
            Err(PrayerError::InvalidZone(code.to_string()))
        }
    }

    /// The full zone set known at build time.
    pub fn all() -> Vec<ZoneCode> {
        ALL_ZONES.iter().map(|z| ZoneCode(z.to_string())).collect()
    }

    /// Whether the code is part of the published zone set.
    pub fn is_known(&self) -> bool {
        ALL_ZONES.contains(&self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ZoneCode {
    type Err = PrayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ZoneCode {
    type Error = PrayerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZoneCode> for String {
    fn from(zone: ZoneCode) -> Self {
        zone.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let zone = ZoneCode::parse("WLY01").unwrap();
        assert_eq!(zone.as_str(), "WLY01");
        assert!(zone.is_known());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "wly01", "WLY1", "WLY001", "W1Y01", "WLY0A"] {
            assert!(ZoneCode::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_well_formed_but_unknown() {
        let zone = ZoneCode::parse("XYZ99").unwrap();
        assert!(!zone.is_known());
    }

    #[test]
    fn test_all_zones_are_well_formed_and_unique() {
        let zones = ZoneCode::all();
        assert_eq!(zones.len(), ALL_ZONES.len());

        let unique: std::collections::BTreeSet<_> = zones.iter().collect();
        assert_eq!(unique.len(), zones.len());
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: ZoneCode = serde_json::from_str("\"SGR01\"").unwrap();
        assert_eq!(ok.to_string(), "SGR01");
        assert!(serde_json::from_str::<ZoneCode>("\"selangor\"").is_err());
    }
}
