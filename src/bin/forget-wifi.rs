//! Delete the stored Wi-Fi credentials.
//!
//! The next boot enters setup mode and starts the captive portal.
//!
//! Usage:
//!   Host:  `cargo run --bin forget-wifi`
//!          (honours `PORTAL_CREDENTIALS_PATH`)
//!   ESP32: `cargo espflash flash --bin forget-wifi --features esp32 --release`

use wifi_setup_portal::credentials::{CredentialError, CredentialStore};

/// Print error message and halt. On ESP32, we pause briefly then return
/// so the process terminates cleanly (espflash monitor will show the output).
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Forget failed ===\n");
    // Brief pause to ensure serial output is flushed before process exits
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn open_store() -> Result<impl CredentialStore, CredentialError> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    wifi_setup_portal::credentials::NvsCredentialStore::take()
}

#[cfg(not(feature = "esp32"))]
fn open_store() -> Result<impl CredentialStore, CredentialError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let store = wifi_setup_portal::FileCredentialStore::at_default_path()?;
    println!("Credential file: {}", store.path().display());
    Ok(store)
}

fn main() {
    println!("\n=== Forget Wi-Fi ===\n");

    let store = match open_store() {
        Ok(store) => store,
        Err(e) => halt_with_error(&format!("Error opening credential store: {}", e)),
    };

    match store.load() {
        Ok(Some(credentials)) => println!("Forgetting network {:?}", credentials.network_name()),
        Ok(None) => println!("No credentials stored"),
        Err(e) => println!("Stored record unreadable ({}), removing it", e),
    }

    if let Err(e) = store.delete() {
        halt_with_error(&format!("Error deleting credentials: {}", e));
    }

    println!("\n=== Done - next boot enters setup mode ===\n");
}
