//! Saved network credentials.
//!
//! At most one credential record exists at a time. A record that is missing,
//! unreadable or fails validation counts as "no credentials": the device then
//! falls back into setup mode instead of failing.
//!
//! # Components
//!
//! - [`FileCredentialStore`] - JSON file on the host filesystem
//! - [`MemoryCredentialStore`] - volatile store for tests and embedders
//! - `NvsCredentialStore` - ESP32 Non-Volatile Storage (ESP32 only)
//!
//! # Example
//!
//! ```
//! use wifi_setup_portal::credentials::{CredentialStore, Credentials, MemoryCredentialStore};
//!
//! let store = MemoryCredentialStore::new();
//! assert!(!store.exists());
//!
//! store.write(&Credentials::new("MyNet", "secret123").unwrap()).unwrap();
//! assert!(store.exists());
//! assert_eq!(store.read().unwrap().network_name(), "MyNet");
//! ```

mod file;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::{default_credentials_path, FileCredentialStore, ENV_CREDENTIALS_PATH};
#[cfg(feature = "esp32")]
pub use nvs::NvsCredentialStore;

use crate::config::{validate_passphrase, validate_ssid, ConfigError};
use log::{log, Level};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::sync::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Credentials of the network the device should join.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    network_name: String,
    passphrase: String,
}

impl Credentials {
    /// Create a credential pair.
    ///
    /// The network name must be 1-32 bytes. The passphrase may be empty for
    /// open networks and is capped at 64 bytes.
    pub fn new(
        network_name: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let credentials = Self {
            network_name: network_name.into(),
            passphrase: passphrase.into(),
        };
        validate_ssid(&credentials.network_name)?;
        validate_passphrase(&credentials.passphrase)?;
        Ok(credentials)
    }

    /// Network SSID.
    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    /// Network passphrase, empty for open networks.
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Check if this is an open network (no passphrase).
    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }

    /// Encode as the stored record: `{"ssid": ..., "key": ...}`.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
        let record = RecordRef {
            ssid: &self.network_name,
            key: &self.passphrase,
        };
        Ok(Zeroizing::new(serde_json::to_vec(&record)?))
    }

    /// Decode a stored record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        let record: Record = serde_json::from_slice(bytes)?;
        Self::new(record.ssid, record.key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("network_name", &self.network_name)
            .field("passphrase", &if self.is_open() { "" } else { "****" })
            .finish()
    }
}

#[derive(Serialize)]
struct RecordRef<'a> {
    ssid: &'a str,
    key: &'a str,
}

#[derive(Deserialize)]
struct Record {
    ssid: String,
    key: String,
}

/// Persistent home of the credential record.
///
/// All access replaces or reads the whole record, so implementations only
/// need whatever atomicity their medium provides.
pub trait CredentialStore: Send + Sync {
    /// Load the record.
    ///
    /// `Ok(None)` means nothing is stored. Errors cover unreadable or
    /// corrupt records.
    fn load(&self) -> Result<Option<Credentials>, CredentialError>;

    /// Replace the stored record.
    fn write(&self, credentials: &Credentials) -> Result<(), CredentialError>;

    /// Remove the record. Succeeds when nothing is stored.
    fn delete(&self) -> Result<(), CredentialError>;

    /// Read the stored record. Callers should check [`exists`](Self::exists) first.
    fn read(&self) -> Result<Credentials, CredentialError> {
        self.load()?.ok_or(CredentialError::NotFound)
    }

    /// True iff a record is present and parses. Never fails.
    ///
    /// Runs after every portal response, so a bad record is only logged
    /// at debug level here.
    fn exists(&self) -> bool {
        absent_on_error_at(self.load(), Level::Debug).is_some()
    }
}

/// Storage errors downgrade to "no credentials".
///
/// This is the only place a storage failure is swallowed.
pub fn absent_on_error(
    result: Result<Option<Credentials>, CredentialError>,
) -> Option<Credentials> {
    absent_on_error_at(result, Level::Warn)
}

/// [`absent_on_error`], logging the downgrade at `level`.
pub fn absent_on_error_at(
    result: Result<Option<Credentials>, CredentialError>,
    level: Level,
) -> Option<Credentials> {
    match result {
        Ok(credentials) => credentials,
        Err(e) => {
            log!(level, "Treating stored credentials as absent: {}", e);
            None
        }
    }
}

/// Volatile credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credentials>> {
        // A panic while holding the lock cannot leave a half-written record.
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        Ok(self.slot().clone())
    }

    fn write(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        *self.slot() = Some(credentials.clone());
        Ok(())
    }

    fn delete(&self) -> Result<(), CredentialError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Errors from credential storage.
#[derive(Debug)]
pub enum CredentialError {
    /// No record is stored.
    NotFound,
    /// Filesystem error.
    Io(io::Error),
    /// Record is not valid JSON or misses a field.
    Encoding(serde_json::Error),
    /// Record decoded but its values are not acceptable.
    Invalid(ConfigError),
    /// Stored record failed read-back verification.
    VerificationFailed,
    /// NVS error (ESP32).
    #[cfg(feature = "esp32")]
    Nvs(esp_idf_sys::EspError),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no credentials stored"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Encoding(e) => write!(f, "invalid credential record: {}", e),
            Self::Invalid(e) => write!(f, "invalid credentials: {}", e),
            Self::VerificationFailed => write!(f, "credential record verification failed"),
            #[cfg(feature = "esp32")]
            Self::Nvs(e) => write!(f, "NVS error: {:?}", e),
        }
    }
}

impl std::error::Error for CredentialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encoding(e) => Some(e),
            Self::Invalid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CredentialError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CredentialError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e)
    }
}

impl From<ConfigError> for CredentialError {
    fn from(e: ConfigError) -> Self {
        Self::Invalid(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for CredentialError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Nvs(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_ssid() {
        let result = Credentials::new("", "secret123");
        assert!(matches!(
            result,
            Err(CredentialError::Invalid(ConfigError::SsidEmpty))
        ));
    }

    #[test]
    fn test_open_network() {
        let credentials = Credentials::new("Cafe", "").unwrap();
        assert!(credentials.is_open());
    }

    #[test]
    fn test_record_format() {
        let credentials = Credentials::new("MyNet", "secret123").unwrap();
        let bytes = credentials.to_bytes().unwrap();
        assert_eq!(&bytes[..], br#"{"ssid":"MyNet","key":"secret123"}"#);
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let credentials =
            Credentials::from_bytes(br#"{"key":"pw","ssid":"Home","channel":6}"#).unwrap();
        assert_eq!(credentials.network_name(), "Home");
        assert_eq!(credentials.passphrase(), "pw");
    }

    #[test]
    fn test_decode_rejects_corrupt_records() {
        let records: [&[u8]; 6] = [
            b"",
            br#"{"ssid":"Home""#,
            br#"{"ssid":"Home"}"#,
            br#"{"ssid":42,"key":"pw"}"#,
            br#"{"ssid":"","key":"pw"}"#,
            b"\xff\xfe",
        ];
        for bytes in records {
            assert!(Credentials::from_bytes(bytes).is_err(), "{:?}", bytes);
        }
    }

    #[test]
    fn test_debug_masks_passphrase() {
        let credentials = Credentials::new("MyNet", "secret123").unwrap();
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("MyNet"));
        assert!(!debug.contains("secret123"));
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryCredentialStore::new();
        assert!(!store.exists());
        assert!(matches!(store.read(), Err(CredentialError::NotFound)));

        let credentials = Credentials::new("MyNet", "secret123").unwrap();
        store.write(&credentials).unwrap();
        assert!(store.exists());
        assert_eq!(store.read().unwrap(), credentials);

        store.delete().unwrap();
        assert!(!store.exists());
        store.delete().unwrap();
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryCredentialStore::new();
        store.write(&Credentials::new("First", "one").unwrap()).unwrap();
        store.write(&Credentials::new("Second", "two").unwrap()).unwrap();
        assert_eq!(store.read().unwrap().network_name(), "Second");
    }

    #[test]
    fn test_absent_on_error() {
        assert!(absent_on_error(Err(CredentialError::VerificationFailed)).is_none());
        assert!(absent_on_error(Ok(None)).is_none());
        let credentials = Credentials::new("MyNet", "").unwrap();
        assert_eq!(absent_on_error(Ok(Some(credentials.clone()))), Some(credentials));
    }

    /// Records log levels per thread so parallel tests do not see each other.
    struct LevelRecorder;

    thread_local! {
        static LEVELS: std::cell::RefCell<Vec<Level>> = const { std::cell::RefCell::new(Vec::new()) };
    }

    impl log::Log for LevelRecorder {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }
        fn log(&self, record: &log::Record<'_>) {
            LEVELS.with(|levels| levels.borrow_mut().push(record.level()));
        }
        fn flush(&self) {}
    }

    static RECORDER: LevelRecorder = LevelRecorder;

    fn recorded_levels(f: impl FnOnce()) -> Vec<Level> {
        static INSTALL: std::sync::Once = std::sync::Once::new();
        INSTALL.call_once(|| {
            let _ = log::set_logger(&RECORDER);
            log::set_max_level(log::LevelFilter::Trace);
        });
        LEVELS.with(|levels| levels.borrow_mut().clear());
        f();
        LEVELS.with(|levels| levels.borrow_mut().drain(..).collect())
    }

    struct CorruptStore;

    impl CredentialStore for CorruptStore {
        fn load(&self) -> Result<Option<Credentials>, CredentialError> {
            Err(CredentialError::VerificationFailed)
        }
        fn write(&self, _: &Credentials) -> Result<(), CredentialError> {
            Ok(())
        }
        fn delete(&self) -> Result<(), CredentialError> {
            Ok(())
        }
    }

    #[test]
    fn test_exists_logs_corrupt_record_at_debug() {
        let levels = recorded_levels(|| assert!(!CorruptStore.exists()));
        assert_eq!(levels, vec![Level::Debug]);
    }

    #[test]
    fn test_absent_on_error_logs_at_warn() {
        let levels = recorded_levels(|| {
            assert!(absent_on_error(CorruptStore.load()).is_none());
        });
        assert_eq!(levels, vec![Level::Warn]);
    }
}
