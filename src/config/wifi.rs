//! WiFi identity limits and validation.
//!
//! Platform-independent checks shared by the access point identity and the
//! credentials submitted through the portal.
//!
//! # Example
//!
//! ```
//! use wifi_setup_portal::config::{validate_ap_passphrase, validate_ssid, ConfigError};
//!
//! assert!(validate_ssid("IoTDeviceSetUp").is_ok());
//! assert_eq!(validate_ssid(""), Err(ConfigError::SsidEmpty));
//! assert!(validate_ap_passphrase("").is_ok()); // open network
//! ```

use std::fmt;

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Validate an SSID (1-32 bytes).
pub fn validate_ssid(ssid: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() {
        return Err(ConfigError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    Ok(())
}

/// Validate a passphrase we store on behalf of a remote network.
///
/// Only the upper bound is enforced: the remote access point decides what it
/// accepts, and an empty passphrase means the network is open.
pub fn validate_passphrase(passphrase: &str) -> Result<(), ConfigError> {
    if passphrase.len() > MAX_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooLong {
            len: passphrase.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Validate the passphrase of the access point we advertise ourselves.
///
/// Empty selects an open network, anything else must satisfy WPA2.
pub fn validate_ap_passphrase(passphrase: &str) -> Result<(), ConfigError> {
    if !passphrase.is_empty() && passphrase.len() < MIN_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooShort {
            len: passphrase.len(),
            min: MIN_PASSWORD_LEN,
        });
    }
    validate_passphrase(passphrase)
}

/// Errors that can occur during configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for WPA2.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// Captive domain is empty.
    DomainEmpty,
    /// A configuration value could not be parsed.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::DomainEmpty => write!(f, "captive domain cannot be empty"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssid_bounds() {
        assert_eq!(validate_ssid(""), Err(ConfigError::SsidEmpty));
        assert!(validate_ssid(&"a".repeat(32)).is_ok());
        assert!(matches!(
            validate_ssid(&"a".repeat(33)),
            Err(ConfigError::SsidTooLong { len: 33, max: 32 })
        ));
    }

    #[test]
    fn test_stored_passphrase_has_no_lower_bound() {
        assert!(validate_passphrase("").is_ok());
        assert!(validate_passphrase("abc").is_ok());
        assert!(matches!(
            validate_passphrase(&"a".repeat(65)),
            Err(ConfigError::PasswordTooLong { .. })
        ));
    }

    #[test]
    fn test_ap_passphrase_requires_wpa2_length() {
        assert!(validate_ap_passphrase("").is_ok());
        assert!(validate_ap_passphrase("12345678").is_ok());
        assert!(matches!(
            validate_ap_passphrase("short"),
            Err(ConfigError::PasswordTooShort { len: 5, min: 8 })
        ));
        assert!(validate_ap_passphrase(&"a".repeat(64)).is_ok());
        assert!(validate_ap_passphrase(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::InvalidValue {
            key: "PORTAL_IP".into(),
            value: "nope".into(),
        };
        assert_eq!(err.to_string(), "invalid value for PORTAL_IP: \"nope\"");
    }
}
