//! Access point bring-up.
//!
//! The portal needs the radio advertising the setup network before its
//! servers are useful. On ESP32 [`SoftAccessPoint`] drives the Wi-Fi driver;
//! on the host the network is provided by the OS and [`HostAccessPoint`]
//! only reports the identity it expects.

mod host;
#[cfg(feature = "esp32")]
mod soft;

pub use host::HostAccessPoint;
#[cfg(feature = "esp32")]
pub use soft::SoftAccessPoint;

use crate::config::PortalConfig;
use crate::portal::PortalError;

/// Radio seam used by the portal.
pub trait AccessPoint {
    /// Configure and activate the setup network described by `config`.
    ///
    /// Failure is fatal to the portal.
    fn start(&mut self, config: &PortalConfig) -> Result<(), PortalError>;
}

impl<A: AccessPoint + ?Sized> AccessPoint for Box<A> {
    fn start(&mut self, config: &PortalConfig) -> Result<(), PortalError> {
        (**self).start(config)
    }
}
