fn main() {
    // ESP-IDF link flags are only needed when cross-compiling for the Xtensa ESP32.
    // Host builds (tests, the host portal) skip embuild entirely.
    let xtensa = std::env::var("TARGET").is_ok_and(|target| target.contains("xtensa"));
    if xtensa {
        embuild::espidf::sysenv::output();
    }
}
