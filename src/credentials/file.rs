//! Credential persistence for host builds.
//!
//! Stores the record as `{"ssid": ..., "key": ...}` in a single JSON file.
//! Uses `~/.wifi-setup-portal/wifi_config.json` by default; set
//! `PORTAL_CREDENTIALS_PATH` to use another location.

use super::{CredentialError, CredentialStore, Credentials};
use log::{debug, info};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Environment variable overriding the credential file location.
pub const ENV_CREDENTIALS_PATH: &str = "PORTAL_CREDENTIALS_PATH";

/// Get the default credential file path.
///
/// Returns `$PORTAL_CREDENTIALS_PATH` if set, else
/// `~/.wifi-setup-portal/wifi_config.json`.
pub fn default_credentials_path() -> io::Result<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_CREDENTIALS_PATH).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".wifi-setup-portal")
        .join("wifi_config.json"))
}

/// Credential store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at [`default_credentials_path`].
    pub fn at_default_path() -> io::Result<Self> {
        Ok(Self::new(default_credentials_path()?))
    }

    /// Location of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => zeroize::Zeroizing::new(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No credential file found at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Credentials::from_bytes(&bytes).map(Some)
    }

    fn write(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = credentials.to_bytes()?;

        // Stage next to the target so the rename stays on one filesystem.
        let staging = self.staging_path();
        {
            let mut file = File::create(&staging)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;

        // Verify write by reading back
        let read_back = zeroize::Zeroizing::new(fs::read(&self.path)?);
        if read_back[..] != bytes[..] {
            return Err(CredentialError::VerificationFailed);
        }

        info!(
            "Credentials for {:?} saved to {:?}",
            credentials.network_name(),
            self.path
        );
        Ok(())
    }

    fn delete(&self) -> Result<(), CredentialError> {
        let _ = fs::remove_file(self.staging_path());
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Credentials removed from {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
