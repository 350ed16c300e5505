use super::AccessPoint;
use crate::config::PortalConfig;
use crate::portal::PortalError;
use log::info;

/// Access point managed outside this process (hostapd, NetworkManager).
#[derive(Debug, Default, Clone, Copy)]
pub struct HostAccessPoint;

impl HostAccessPoint {
    pub fn new() -> Self {
        Self
    }
}

impl AccessPoint for HostAccessPoint {
    fn start(&mut self, config: &PortalConfig) -> Result<(), PortalError> {
        info!(
            "Expecting setup network {:?} ({}) at {}/{}",
            config.ap_ssid,
            if config.is_open() { "open" } else { "WPA2" },
            config.ip,
            config.prefix_len()
        );
        Ok(())
    }
}
