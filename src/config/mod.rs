//! Portal configuration.
//!
//! # Components
//!
//! - [`wifi`] - SSID/passphrase limits and validation (host-testable)
//! - [`portal`] - Access point identity, captive domain and server tunables

mod portal;
mod wifi;

pub use portal::{
    PortalConfig, DEFAULT_AP_SSID, DEFAULT_RETRY_DELAY, DEFAULT_DOMAIN, DEFAULT_NETMASK,
    DEFAULT_PORTAL_IP, DEFAULT_REBOOT_DELAY, DEFAULT_REQUEST_TIMEOUT, DNS_PORT, ENV_AP_PASSPHRASE,
    ENV_AP_SSID, ENV_DNS_BIND, ENV_DOMAIN, ENV_HTTP_BIND, ENV_IP, ENV_WEB_DIR, HTTP_PORT,
};
pub use wifi::{
    validate_ap_passphrase, validate_passphrase, validate_ssid, ConfigError, MAX_PASSWORD_LEN,
    MAX_SSID_LEN, MIN_PASSWORD_LEN,
};
