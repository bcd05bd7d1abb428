//! Capture options handed to header views.

use serde::{Deserialize, Serialize};

use crate::abi::TpacketVersion;

/// Options fixed when the capture ring is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Negotiated ring ABI generation
    pub version: TpacketVersion,
    /// Reinsert out-of-band VLAN tags into payloads
    pub add_vlan_header: bool,
}

impl CaptureOptions {
    /// Options for `version` with VLAN synthesis disabled.
    #[must_use]
    pub const fn new(version: TpacketVersion) -> Self {
        Self {
            version,
            add_vlan_header: false,
        }
    }

    /// Enable or disable VLAN tag reinsertion.
    #[must_use]
    pub const fn with_vlan_header(mut self, enabled: bool) -> Self {
        self.add_vlan_header = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_options_default() {
        let opts = CaptureOptions::default();
        assert_eq!(opts.version, TpacketVersion::V3);
        assert!(!opts.add_vlan_header);
    }

    #[test]
    fn test_capture_options_builder() {
        let opts = CaptureOptions::new(TpacketVersion::V2).with_vlan_header(true);
        assert_eq!(opts.version, TpacketVersion::V2);
        assert!(opts.add_vlan_header);
    }

    #[test]
    fn test_capture_options_toml_partial() {
        let opts: CaptureOptions = toml::from_str("add_vlan_header = true").unwrap();
        assert_eq!(opts.version, TpacketVersion::V3);
        assert!(opts.add_vlan_header);

        let opts: CaptureOptions = toml::from_str("version = \"v1\"").unwrap();
        assert_eq!(opts.version, TpacketVersion::V1);
        assert!(!opts.add_vlan_header);
    }

    #[test]
    fn test_capture_options_json_roundtrip() {
        let opts = CaptureOptions::new(TpacketVersion::V2).with_vlan_header(true);
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(json, r#"{"version":"v2","add_vlan_header":true}"#);
        let back: CaptureOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }
}
