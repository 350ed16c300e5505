//! Wi-Fi captive-portal provisioning for headless devices.
//!
//! A device without usable credentials advertises a setup network, answers
//! every DNS query with its own address and serves a form that stores the
//! home network's SSID and passphrase. Everything except the radio, NVS and
//! restart backends is platform-independent and tested on the host.

pub mod access_point;
pub mod config;
pub mod credentials;
pub mod device;
pub mod platform;
pub mod portal;
#[cfg(feature = "esp32")]
pub mod station;

// Re-export commonly used items
pub use access_point::{AccessPoint, HostAccessPoint};
pub use config::{ConfigError, PortalConfig};
pub use credentials::{CredentialError, CredentialStore, Credentials, FileCredentialStore};
pub use device::{select_mode, DeviceMode, RetryPolicy, StationAction, StationMonitor, StationStatus};
pub use portal::{Portal, PortalError, PortalOutcome, RunningPortal};
