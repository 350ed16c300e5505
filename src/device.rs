//! Boot-time mode selection and station retry policy.
//!
//! On boot the device either has usable credentials and joins the network
//! as a station, or it runs the setup portal. While joining, each status
//! the driver reports is fed to a [`StationMonitor`], which decides whether
//! to keep waiting, give up for this boot, or forget the credentials.

use crate::credentials::{absent_on_error, CredentialStore, Credentials};
use log::{info, warn};

/// What the device does this boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMode {
    /// No usable credentials: run the setup portal.
    Setup,
    /// Join the stored network.
    Station(Credentials),
}

/// Pick the boot mode from the credential store.
///
/// Unreadable or corrupt records count as absent.
pub fn select_mode<S: CredentialStore + ?Sized>(store: &S) -> DeviceMode {
    match absent_on_error(store.load()) {
        Some(credentials) => {
            info!(
                "Stored credentials for {:?}, joining as station",
                credentials.network_name()
            );
            DeviceMode::Station(credentials)
        }
        None => {
            info!("No usable credentials, entering setup mode");
            DeviceMode::Setup
        }
    }
}

/// Station link status, as reported by the Wi-Fi driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    Connecting,
    NoApFound,
    ConnectFail,
    WrongPassword,
    GotIp,
}

/// What to do after a status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationAction {
    /// Keep waiting for the driver.
    Wait,
    /// Joined the network; start the workload.
    Connected,
    /// Restart and try again with the same credentials.
    GiveUp,
    /// Delete the credentials and restart into setup mode.
    ForgetAndRestart,
}

/// When to stop retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wrong-password reports tolerated before the credentials are forgotten.
    pub wrong_password_limit: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            wrong_password_limit: 1,
        }
    }
}

/// Tracks status reports for one join attempt.
#[derive(Debug, Default)]
pub struct StationMonitor {
    policy: RetryPolicy,
    wrong_passwords: u32,
}

impl StationMonitor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            wrong_passwords: 0,
        }
    }

    /// Feed one status report.
    pub fn observe(&mut self, status: StationStatus) -> StationAction {
        match status {
            StationStatus::Connecting => StationAction::Wait,
            StationStatus::GotIp => StationAction::Connected,
            StationStatus::NoApFound | StationStatus::ConnectFail => {
                warn!("Station join failed: {:?}", status);
                StationAction::GiveUp
            }
            StationStatus::WrongPassword => {
                self.wrong_passwords += 1;
                if self.wrong_passwords >= self.policy.wrong_password_limit {
                    warn!(
                        "Wrong password reported {} time(s), forgetting credentials",
                        self.wrong_passwords
                    );
                    StationAction::ForgetAndRestart
                } else {
                    StationAction::Wait
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialError, MemoryCredentialStore};

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
    fn test_select_mode() {
        let store = MemoryCredentialStore::new();
        assert_eq!(select_mode(&store), DeviceMode::Setup);

        let credentials = Credentials::new("Home", "hunter22").unwrap();
        store.write(&credentials).unwrap();
        assert_eq!(select_mode(&store), DeviceMode::Station(credentials));
    }

    #[test]
    fn test_select_mode_corrupt_store_is_setup() {
        assert_eq!(select_mode(&CorruptStore), DeviceMode::Setup);
    }

    #[test]
    fn test_monitor_default_policy() {
        let mut monitor = StationMonitor::default();
        assert_eq!(monitor.observe(StationStatus::Connecting), StationAction::Wait);
        assert_eq!(monitor.observe(StationStatus::GotIp), StationAction::Connected);
        assert_eq!(monitor.observe(StationStatus::NoApFound), StationAction::GiveUp);
        assert_eq!(monitor.observe(StationStatus::ConnectFail), StationAction::GiveUp);
        assert_eq!(
            monitor.observe(StationStatus::WrongPassword),
            StationAction::ForgetAndRestart
        );
    }

    #[test]
    fn test_monitor_tolerates_wrong_passwords_up_to_limit() {
        let mut monitor = StationMonitor::new(RetryPolicy {
            wrong_password_limit: 3,
        });
        assert_eq!(monitor.observe(StationStatus::WrongPassword), StationAction::Wait);
        assert_eq!(monitor.observe(StationStatus::Connecting), StationAction::Wait);
        assert_eq!(monitor.observe(StationStatus::WrongPassword), StationAction::Wait);
        assert_eq!(
            monitor.observe(StationStatus::WrongPassword),
            StationAction::ForgetAndRestart
        );
    }
}
