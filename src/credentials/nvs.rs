//! NVS persistence for WiFi credentials.
//!
//! Stores the same JSON record as the host file store in ESP32's
//! Non-Volatile Storage (NVS) so it survives the restart that ends setup mode.

use super::{CredentialError, CredentialStore, Credentials};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use log::{debug, info};
use std::sync::{Mutex, MutexGuard};

/// NVS namespace for WiFi configuration.
const NVS_NAMESPACE: &str = "wifi_config";

/// NVS key for stored credentials.
const NVS_KEY: &str = "credentials";

/// Maximum buffer size for the JSON record.
/// `{"ssid":"<32>","key":"<64>"}` with every character escaped as `\u00XX`
/// stays below this.
const MAX_RECORD_LEN: usize = 640;

/// Credential store backed by an NVS namespace.
pub struct NvsCredentialStore {
    nvs: Mutex<EspNvs<NvsDefault>>,
}

impl NvsCredentialStore {
    /// Open the credential namespace on the given partition.
    pub fn new(partition: EspNvsPartition<NvsDefault>) -> Result<Self, CredentialError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self {
            nvs: Mutex::new(nvs),
        })
    }

    /// Take the default NVS partition and open the credential namespace.
    ///
    /// `EspNvsPartition::take()` succeeds only once per boot.
    pub fn take() -> Result<Self, CredentialError> {
        Self::new(EspNvsPartition::<NvsDefault>::take()?)
    }

    fn nvs(&self) -> MutexGuard<'_, EspNvs<NvsDefault>> {
        self.nvs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for NvsCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        let mut buf = zeroize::Zeroizing::new([0u8; MAX_RECORD_LEN]);
        let nvs = self.nvs();
        match nvs.get_raw(NVS_KEY, &mut buf[..])? {
            Some(bytes) => Credentials::from_bytes(bytes).map(Some),
            None => {
                debug!("No credentials found in NVS");
                Ok(None)
            }
        }
    }

    fn write(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        let bytes = credentials.to_bytes()?;
        let mut nvs = self.nvs();
        nvs.set_raw(NVS_KEY, &bytes)?;

        // Read back and verify to catch silent flash write failures
        let mut verify_buf = zeroize::Zeroizing::new([0u8; MAX_RECORD_LEN]);
        match nvs.get_raw(NVS_KEY, &mut verify_buf[..])? {
            Some(read_back) if read_back == &bytes[..] => {}
            _ => return Err(CredentialError::VerificationFailed),
        }

        info!(
            "Credentials for {:?} saved and verified in NVS",
            credentials.network_name()
        );
        Ok(())
    }

    fn delete(&self) -> Result<(), CredentialError> {
        if self.nvs().remove(NVS_KEY)? {
            info!("Credentials cleared from NVS");
        }
        Ok(())
    }
}
