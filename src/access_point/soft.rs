//! ESP32 SoftAP bring-up.

use super::AccessPoint;
use crate::config::PortalConfig;
use crate::portal::PortalError;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::ipv4::{self, Mask, RouterConfiguration, Subnet};
use esp_idf_svc::netif::{EspNetif, NetifConfiguration, NetifStack};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration, EspWifi, WifiDriver,
};
use log::info;

/// Clients the radio admits at once. Matches the HTTP connection limit.
const MAX_AP_CLIENTS: u16 = 4;

const AP_CHANNEL: u8 = 1;

/// SoftAP on the ESP32 radio.
///
/// The driver is kept alive for the lifetime of the value; dropping it takes
/// the setup network down.
pub struct SoftAccessPoint {
    modem: Option<Modem>,
    sysloop: EspSystemEventLoop,
    _wifi: Option<BlockingWifi<EspWifi<'static>>>,
}

impl SoftAccessPoint {
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Self {
        Self {
            modem: Some(modem),
            sysloop,
            _wifi: None,
        }
    }

    fn bring_up(
        &mut self,
        modem: Modem,
        config: &PortalConfig,
    ) -> Result<BlockingWifi<EspWifi<'static>>, PortalError> {
        let portal_ip = ipv4::Ipv4Addr::from(config.ip.octets());

        // Router netif: we are gateway and DNS server for the setup network
        let ap_netif = EspNetif::new_with_conf(&NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(RouterConfiguration {
                subnet: Subnet {
                    gateway: portal_ip,
                    mask: Mask(config.prefix_len()),
                },
                dhcp_enabled: true,
                dns: Some(portal_ip),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        })?;
        let sta_netif = EspNetif::new(NetifStack::Sta)?;

        let driver = WifiDriver::new(modem, self.sysloop.clone(), None)?;
        let mut wifi = BlockingWifi::wrap(
            EspWifi::wrap_all(driver, sta_netif, ap_netif)?,
            self.sysloop.clone(),
        )?;

        let ap = AccessPointConfiguration {
            ssid: config
                .ap_ssid
                .as_str()
                .try_into()
                .map_err(|_| PortalError::AccessPoint("AP SSID too long".into()))?,
            password: config
                .ap_passphrase
                .as_str()
                .try_into()
                .map_err(|_| PortalError::AccessPoint("AP passphrase too long".into()))?,
            auth_method: if config.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ssid_hidden: false,
            channel: AP_CHANNEL,
            max_connections: MAX_AP_CLIENTS,
            ..Default::default()
        };

        wifi.set_configuration(&Configuration::AccessPoint(ap))?;
        wifi.start()?;
        wifi.wait_netif_up()?;
        Ok(wifi)
    }
}

impl AccessPoint for SoftAccessPoint {
    fn start(&mut self, config: &PortalConfig) -> Result<(), PortalError> {
        let modem = self
            .modem
            .take()
            .ok_or_else(|| PortalError::AccessPoint("radio already started".into()))?;
        let wifi = self.bring_up(modem, config)?;

        info!(
            "SoftAP {:?} up at {}/{}",
            config.ap_ssid,
            config.ip,
            config.prefix_len()
        );
        self._wifi = Some(wifi);
        Ok(())
    }
}
