//! Station-mode Wi-Fi join on ESP32.
//!
//! Wraps the ESP-IDF driver and reports the outcome as a
//! [`StationStatus`] for the [`StationMonitor`](crate::device::StationMonitor).

use crate::credentials::Credentials;
use crate::device::StationStatus;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use esp_idf_sys::EspError;
use log::{info, warn};

/// Wi-Fi client connection.
pub struct Station {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl Station {
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, EspError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), None)?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self { wifi })
    }

    /// Join the network named by `credentials` and wait for DHCP.
    ///
    /// A failed association with a visible, secured network is reported as
    /// [`StationStatus::WrongPassword`]; the blocking driver does not
    /// surface the disconnect reason.
    pub fn connect(&mut self, credentials: &Credentials) -> StationStatus {
        match self.try_connect(credentials) {
            Ok(status) => status,
            Err(e) => {
                warn!("Wi-Fi driver error: {:?}", e);
                StationStatus::ConnectFail
            }
        }
    }

    fn try_connect(&mut self, credentials: &Credentials) -> Result<StationStatus, EspError> {
        info!("Connecting to WiFi: {}", credentials.network_name());

        let auth_method = if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        // Lengths are already bounded by Credentials::new
        let (Ok(ssid), Ok(password)) = (
            credentials.network_name().try_into(),
            credentials.passphrase().try_into(),
        ) else {
            return Ok(StationStatus::ConnectFail);
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid,
                password,
                auth_method,
                ..Default::default()
            }))?;
        self.wifi.start()?;

        let visible = self
            .wifi
            .scan()?
            .iter()
            .any(|ap| ap.ssid.as_str() == credentials.network_name());
        if !visible {
            return Ok(StationStatus::NoApFound);
        }

        if let Err(e) = self.wifi.connect() {
            warn!("Association failed: {:?}", e);
            return Ok(if credentials.is_open() {
                StationStatus::ConnectFail
            } else {
                StationStatus::WrongPassword
            });
        }

        if let Err(e) = self.wifi.wait_netif_up() {
            warn!("DHCP failed: {:?}", e);
            return Ok(StationStatus::ConnectFail);
        }

        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        info!("Connected to WiFi, IP: {}", ip_info.ip);
        Ok(StationStatus::GotIp)
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }
}
