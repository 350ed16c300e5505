//! Portal identity and tunables.
//!
//! Defaults reproduce the stock setup network: an open access point called
//! `IoTDeviceSetUp` at `192.168.4.1/24` whose captive domain is
//! `iotdevice.setup`. Every value can be overridden through a key/value lookup
//! (environment variables on the host, `option_env!` on ESP32).

use super::wifi::{validate_ap_passphrase, validate_ssid, ConfigError};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// SSID advertised when none is configured.
pub const DEFAULT_AP_SSID: &str = "IoTDeviceSetUp";

/// Captive domain name used for the `Host` check and redirects.
pub const DEFAULT_DOMAIN: &str = "iotdevice.setup";

/// Address of the portal on its own network. Doubles as gateway and DNS server.
pub const DEFAULT_PORTAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

/// Subnet mask of the setup network.
pub const DEFAULT_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Standard DNS port.
pub const DNS_PORT: u16 = 53;

/// Standard HTTP port.
pub const HTTP_PORT: u16 = 80;

/// Grace period between a successful submission and the restart, so the
/// success page reaches the client.
pub const DEFAULT_REBOOT_DELAY: Duration = Duration::from_secs(5);

/// Upper bound for a client to deliver request line, headers and body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed socket receive or accept before trying again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Environment keys understood by [`PortalConfig::from_lookup`].
pub const ENV_AP_SSID: &str = "PORTAL_AP_SSID";
pub const ENV_AP_PASSPHRASE: &str = "PORTAL_AP_PASSPHRASE";
pub const ENV_DOMAIN: &str = "PORTAL_DOMAIN";
pub const ENV_IP: &str = "PORTAL_IP";
pub const ENV_DNS_BIND: &str = "PORTAL_DNS_BIND";
pub const ENV_HTTP_BIND: &str = "PORTAL_HTTP_BIND";
pub const ENV_WEB_DIR: &str = "PORTAL_WEB_DIR";

/// Configuration of the setup portal.
#[derive(Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// SSID of the access point we advertise.
    pub ap_ssid: String,
    /// Passphrase of the access point. Empty means an open network.
    pub ap_passphrase: String,
    /// Captive domain clients are redirected to.
    pub domain: String,
    /// Portal address: AP interface IP, gateway, DNS server and A-record answer.
    pub ip: Ipv4Addr,
    /// Subnet mask of the AP interface.
    pub netmask: Ipv4Addr,
    /// UDP address the DNS responder binds to.
    pub dns_bind: SocketAddr,
    /// TCP address the HTTP responder binds to.
    pub http_bind: SocketAddr,
    /// Directory holding page overrides. `None` serves the embedded pages.
    pub web_dir: Option<PathBuf>,
    /// Delay between a successful submission and the provisioned event.
    pub reboot_delay: Duration,
    /// Read deadline for one HTTP request.
    pub request_timeout: Duration,
    /// Backoff after a failed DNS receive or HTTP accept.
    pub retry_delay: Duration,
}

impl PortalConfig {
    /// Build a configuration from a key/value lookup.
    ///
    /// Missing or empty values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(ssid) = get(ENV_AP_SSID) {
            config.ap_ssid = ssid;
        }
        if let Some(passphrase) = lookup(ENV_AP_PASSPHRASE) {
            config.ap_passphrase = passphrase;
        }
        if let Some(domain) = get(ENV_DOMAIN) {
            config.domain = domain.trim().to_ascii_lowercase();
        }
        if let Some(ip) = get(ENV_IP) {
            config.ip = parse_value(ENV_IP, &ip)?;
        }
        if let Some(addr) = get(ENV_DNS_BIND) {
            config.dns_bind = parse_value(ENV_DNS_BIND, &addr)?;
        }
        if let Some(addr) = get(ENV_HTTP_BIND) {
            config.http_bind = parse_value(ENV_HTTP_BIND, &addr)?;
        }
        if let Some(dir) = get(ENV_WEB_DIR) {
            config.web_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from variables captured at compile time.
    ///
    /// Used on targets without a process environment.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            let value = match key {
                ENV_AP_SSID => option_env!("PORTAL_AP_SSID"),
                ENV_AP_PASSPHRASE => option_env!("PORTAL_AP_PASSPHRASE"),
                ENV_DOMAIN => option_env!("PORTAL_DOMAIN"),
                ENV_IP => option_env!("PORTAL_IP"),
                ENV_DNS_BIND => option_env!("PORTAL_DNS_BIND"),
                ENV_HTTP_BIND => option_env!("PORTAL_HTTP_BIND"),
                ENV_WEB_DIR => option_env!("PORTAL_WEB_DIR"),
                _ => None,
            };
            value.map(str::to_string)
        })
    }

    /// Validate the access point identity and captive domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ssid(&self.ap_ssid)?;
        validate_ap_passphrase(&self.ap_passphrase)?;
        if self.domain.is_empty() {
            return Err(ConfigError::DomainEmpty);
        }
        Ok(())
    }

    /// Check if the advertised network is open (no passphrase).
    pub fn is_open(&self) -> bool {
        self.ap_passphrase.is_empty()
    }

    /// URL every unrecognized request is redirected to.
    pub fn portal_url(&self) -> String {
        format!("http://{}/", self.domain)
    }

    /// Netmask as a CIDR prefix length.
    pub fn prefix_len(&self) -> u8 {
        u32::from(self.netmask).count_ones() as u8
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            ap_ssid: DEFAULT_AP_SSID.to_string(),
            ap_passphrase: String::new(),
            domain: DEFAULT_DOMAIN.to_string(),
            ip: DEFAULT_PORTAL_IP,
            netmask: DEFAULT_NETMASK,
            dns_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DNS_PORT)),
            http_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, HTTP_PORT)),
            web_dir: None,
            reboot_delay: DEFAULT_REBOOT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

// Hand-written so the AP passphrase never ends up in logs.
impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("ap_ssid", &self.ap_ssid)
            .field("ap_passphrase", &if self.is_open() { "" } else { "****" })
            .field("domain", &self.domain)
            .field("ip", &self.ip)
            .field("netmask", &self.netmask)
            .field("dns_bind", &self.dns_bind)
            .field("http_bind", &self.http_bind)
            .field("web_dir", &self.web_dir)
            .field("reboot_delay", &self.reboot_delay)
            .field("request_timeout", &self.request_timeout)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PortalConfig::default();
        assert_eq!(config.ap_ssid, "IoTDeviceSetUp");
        assert_eq!(config.domain, "iotdevice.setup");
        assert_eq!(config.ip, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(config.dns_bind.port(), 53);
        assert_eq!(config.http_bind.port(), 80);
        assert_eq!(config.retry_delay, Duration::from_millis(100));
        assert!(config.is_open());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_portal_url() {
        assert_eq!(PortalConfig::default().portal_url(), "http://iotdevice.setup/");
    }

    #[test]
    fn test_prefix_len() {
        assert_eq!(PortalConfig::default().prefix_len(), 24);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = PortalConfig::from_lookup(lookup_from(&[
            (ENV_AP_SSID, "Thermostat"),
            (ENV_AP_PASSPHRASE, "setup-pass"),
            (ENV_DOMAIN, "Thermo.Setup"),
            (ENV_IP, "10.0.0.1"),
            (ENV_HTTP_BIND, "127.0.0.1:8080"),
        ]))
        .unwrap();

        assert_eq!(config.ap_ssid, "Thermostat");
        assert!(!config.is_open());
        assert_eq!(config.domain, "thermo.setup");
        assert_eq!(config.ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(config.http_bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.dns_bind.port(), 53);
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config =
            PortalConfig::from_lookup(lookup_from(&[(ENV_AP_SSID, ""), (ENV_DOMAIN, "  ")]))
                .unwrap();
        assert_eq!(config.ap_ssid, DEFAULT_AP_SSID);
        assert_eq!(config.domain, DEFAULT_DOMAIN);
    }

    #[test]
    fn test_invalid_ip_rejected() {
        let result = PortalConfig::from_lookup(lookup_from(&[(ENV_IP, "not-an-ip")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_short_ap_passphrase_rejected() {
        let result = PortalConfig::from_lookup(lookup_from(&[(ENV_AP_PASSPHRASE, "abc")]));
        assert!(matches!(result, Err(ConfigError::PasswordTooShort { .. })));
    }

    #[test]
    fn test_debug_masks_passphrase() {
        let config = PortalConfig {
            ap_passphrase: "topsecret".into(),
            ..PortalConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("****"));
    }
}
