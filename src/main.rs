//! Device entry point.
//!
//! Boots into one of two modes:
//! - **Setup**: no usable credentials; run the captive portal until a
//!   network is submitted, then restart.
//! - **Station**: join the stored network and hand over to the workload.
//!
//! Runs on both ESP32 and host platforms:
//! - **Host**: `cargo run` (binding ports 53/80 needs privileges; see
//!   `PORTAL_DNS_BIND` / `PORTAL_HTTP_BIND`)
//! - **ESP32**: `cargo espflash flash --features esp32 --release`

use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use wifi_setup_portal::{platform, select_mode, DeviceMode, Portal, PortalConfig, PortalError, PortalOutcome};

// ESP32: Initialize ESP-IDF before anything else
#[cfg(feature = "esp32")]
fn platform_init() {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("ESP-IDF initialized");
}

// Host: Just initialize env_logger
#[cfg(not(feature = "esp32"))]
fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    platform_init();

    info!("=== Wi-Fi setup portal starting ===");

    if let Err(e) = run().await {
        error!("Fatal: {}", e);
        tokio::time::sleep(Duration::from_secs(1)).await;
        platform::restart();
    }
}

#[cfg(feature = "esp32")]
async fn run() -> Result<(), PortalError> {
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use log::warn;
    use wifi_setup_portal::access_point::SoftAccessPoint;
    use wifi_setup_portal::credentials::NvsCredentialStore;
    use wifi_setup_portal::station::Station;
    use wifi_setup_portal::{CredentialStore, RetryPolicy, StationAction, StationMonitor};

    /// How often the workload loop checks the station link.
    const LINK_CHECK_INTERVAL: Duration = Duration::from_secs(30);

    let store = Arc::new(NvsCredentialStore::take()?);
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    match select_mode(&*store) {
        DeviceMode::Setup => {
            let config = PortalConfig::from_build_env()?;
            let access_point = SoftAccessPoint::new(peripherals.modem, sysloop);
            let outcome = Portal::new(config, store, access_point).run().await?;
            if outcome == PortalOutcome::Provisioned {
                platform::restart();
            }
            Ok(())
        }
        DeviceMode::Station(credentials) => {
            let mut station = Station::new(peripherals.modem, sysloop)?;
            let mut monitor = StationMonitor::new(RetryPolicy::default());

            match monitor.observe(station.connect(&credentials)) {
                StationAction::Connected => {
                    info!("Network up, handing over to workload");
                    loop {
                        tokio::time::sleep(LINK_CHECK_INTERVAL).await;
                        if !station.is_connected() {
                            warn!("Station link lost");
                            platform::restart();
                        }
                    }
                }
                StationAction::ForgetAndRestart => {
                    store.delete()?;
                    platform::restart();
                }
                StationAction::GiveUp | StationAction::Wait => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    platform::restart();
                }
            }
        }
    }
}

#[cfg(not(feature = "esp32"))]
async fn run() -> Result<(), PortalError> {
    use wifi_setup_portal::{CredentialError, FileCredentialStore, HostAccessPoint};

    let store = FileCredentialStore::at_default_path().map_err(CredentialError::from)?;
    info!("Credential file: {:?}", store.path());
    let store = Arc::new(store);

    match select_mode(&*store) {
        DeviceMode::Setup => {
            let config = PortalConfig::from_env()?;
            info!("Portal config: {:?}", config);

            let portal = Portal::new(config, store, HostAccessPoint::new());
            let cancel = portal.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl+C received, stopping portal");
                    cancel.cancel();
                }
            });

            match portal.run().await? {
                PortalOutcome::Provisioned => platform::restart(),
                PortalOutcome::Shutdown => Ok(()),
            }
        }
        DeviceMode::Station(credentials) => {
            info!(
                "Network {:?} is configured; the host OS handles joining it",
                credentials.network_name()
            );
            Ok(())
        }
    }
}
