//! Link configuration, loaded from a YAML file.
//!
//! Key names match the deployed fleet's configuration files, so an
//! existing config drops in unchanged.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Remote supervisor host for status reports and clock probes.
    pub info_server: String,
    /// Remote supervisor UDP port.
    pub info_port: u16,
    /// Hex-encoded pre-shared key for inbound command packets.
    pub command_hmac: String,
    /// Hex-encoded pre-shared key for outbound status reports.
    pub info_hmac: String,
    /// Replay window in milliseconds for authenticated packets.
    pub replay_window_ms: u64,
    /// Serial device carrying the interface-board link.
    pub serial_device: String,
    /// Serial line speed in baud.
    pub serial_baud: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            info_server: String::new(),
            info_port: 0,
            command_hmac: String::new(),
            info_hmac: String::new(),
            replay_window_ms: crate::auth::DEFAULT_REPLAY_WINDOW_MS,
            serial_device: "/dev/rfcomm0".to_string(),
            serial_baud: 4_000_000,
        }
    }
}

impl LinkConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<LinkConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LinkError::config_error_with_source(format!("cannot read {}", path.display()), e)
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<LinkConfig> {
        let config: LinkConfig = serde_yaml_ng::from_str(text)
            .map_err(|e| LinkError::config_error_with_source("invalid config", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.replay_window_ms == 0 {
            return Err(LinkError::config_error("replay_window_ms must be nonzero"));
        }
        Ok(())
    }

    /// Decoded key for inbound command packets.
    pub fn command_key(&self) -> Result<Vec<u8>> {
        decode_key("command_hmac", &self.command_hmac)
    }

    /// Decoded key for outbound status reports.
    pub fn info_key(&self) -> Result<Vec<u8>> {
        decode_key("info_hmac", &self.info_hmac)
    }
}

fn decode_key(name: &str, hex_text: &str) -> Result<Vec<u8>> {
    if hex_text.is_empty() {
        return Err(LinkError::config_error(format!("{name} is not set")));
    }
    hex::decode(hex_text)
        .map_err(|e| LinkError::config_error_with_source(format!("{name} is not valid hex"), e))
}
