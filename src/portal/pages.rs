//! Static pages served by the portal.
//!
//! Pages are embedded at build time and can be overridden per file from a
//! web directory. Three placeholders are substituted once at load time:
//! `{{ap_ssid}}`, `{{domain}}` and `{{form_action}}`.

use crate::config::PortalConfig;
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Path the setup form posts to.
pub const FORM_ACTION: &str = "/wifi";

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLE_CSS: &str = include_str!("../../web/style.css");
const SUCCESS_HTML: &str = include_str!("../../web/success.html");
const ERROR_HTML: &str = include_str!("../../web/error.html");

/// Rendered page bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pages {
    pub index: String,
    pub style: String,
    pub success: String,
    pub error: String,
}

impl Pages {
    /// Load pages for `config`, preferring files from `config.web_dir`.
    pub fn load(config: &PortalConfig) -> Self {
        Self::build(config, config.web_dir.as_deref())
    }

    /// Embedded pages rendered for `config`, ignoring any web directory.
    pub fn embedded(config: &PortalConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: &PortalConfig, dir: Option<&Path>) -> Self {
        let page = |name: &str, embedded: &str| render(&source(dir, name, embedded), config);
        Self {
            index: page("index.html", INDEX_HTML),
            style: page("style.css", STYLE_CSS),
            success: page("success.html", SUCCESS_HTML),
            error: page("error.html", ERROR_HTML),
        }
    }
}

fn source(dir: Option<&Path>, name: &str, embedded: &str) -> String {
    let Some(dir) = dir else {
        return embedded.to_string();
    };
    let path = dir.join(name);
    match fs::read_to_string(&path) {
        Ok(contents) => {
            debug!("Loaded page override {:?}", path);
            contents
        }
        Err(e) => {
            warn!("Using embedded {} ({:?}: {})", name, path, e);
            embedded.to_string()
        }
    }
}

fn render(template: &str, config: &PortalConfig) -> String {
    template
        .replace("{{ap_ssid}}", &escape_html(&config.ap_ssid))
        .replace("{{domain}}", &escape_html(&config.domain))
        .replace("{{form_action}}", FORM_ACTION)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        env::temp_dir().join(format!("wifi-setup-portal-web-{}-{}", std::process::id(), id))
    }

    #[test]
    fn test_embedded_placeholders_substituted() {
        let pages = Pages::load(&PortalConfig::default());
        assert!(pages.index.contains("action=\"/wifi\""));
        assert!(pages.index.contains("name=\"ssid\""));
        assert!(pages.index.contains("name=\"key\""));
        assert!(pages.index.contains("iotdevice.setup"));
        assert!(pages.success.contains("IoTDeviceSetUp"));
        for page in [&pages.index, &pages.style, &pages.success, &pages.error] {
            assert!(!page.contains("{{"), "unrendered placeholder");
        }
    }

    #[test]
    fn test_values_are_escaped() {
        let config = PortalConfig {
            ap_ssid: "<b>&".into(),
            ..PortalConfig::default()
        };
        let pages = Pages::load(&config);
        assert!(pages.success.contains("&lt;b&gt;&amp;"));
        assert!(!pages.success.contains("<b>&"));
    }

    #[test]
    fn test_web_dir_overrides_and_falls_back() {
        let dir = unique_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.html"), "<p>custom {{domain}}</p>").unwrap();

        let config = PortalConfig {
            web_dir: Some(dir.clone()),
            ..PortalConfig::default()
        };
        let pages = Pages::load(&config);
        assert_eq!(pages.index, "<p>custom iotdevice.setup</p>");
        assert_eq!(pages.style, STYLE_CSS);
        assert_eq!(pages.success, Pages::embedded(&config).success);

        let _ = fs::remove_dir_all(&dir);
    }
}
