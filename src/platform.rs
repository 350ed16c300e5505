//! Platform hooks that differ between ESP32 and host builds.

use log::{debug, info};

/// Restart the device. On host builds the process exits instead.
#[cfg(feature = "esp32")]
pub fn restart() -> ! {
    info!("Restarting");
    log::logger().flush();
    // SAFETY: esp_restart has no preconditions and does not return.
    unsafe { esp_idf_sys::esp_restart() }
}

/// Restart the device. On host builds the process exits instead.
#[cfg(not(feature = "esp32"))]
pub fn restart() -> ! {
    info!("Restart requested, exiting");
    log::logger().flush();
    std::process::exit(0)
}

/// Free heap in bytes, where the platform reports it.
#[cfg(feature = "esp32")]
pub fn free_heap() -> Option<u32> {
    // SAFETY: read-only query of the allocator.
    Some(unsafe { esp_idf_sys::esp_get_free_heap_size() })
}

/// Free heap in bytes, where the platform reports it.
#[cfg(not(feature = "esp32"))]
pub fn free_heap() -> Option<u32> {
    None
}

/// Log free heap at debug level.
pub fn log_heap(context: &str) {
    if let Some(bytes) = free_heap() {
        debug!("Free heap {}: {}KB", context, bytes / 1024);
    }
}
