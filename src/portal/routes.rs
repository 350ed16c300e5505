//! Request dispatch for the setup portal.
//!
//! | Method | Path         | Response                                |
//! |--------|--------------|-----------------------------------------|
//! | GET    | `/`          | 200 setup page                          |
//! | GET    | `/style.css` | 200 stylesheet                          |
//! | POST   | `/wifi`      | store credentials, 200 success page     |
//! | *      | *            | 302 to `http://<domain>/`               |
//!
//! Every route requires `Host` to name the captive domain. Requests for any
//! other host (connectivity checks, bookmarks) get the redirect, which is
//! what makes client operating systems show the sign-in page.

use super::http::{HttpError, Request, Response, CONTENT_TYPE_CSS, CONTENT_TYPE_HTML};
use super::pages::{Pages, FORM_ACTION};
use crate::config::PortalConfig;
use crate::credentials::{CredentialStore, Credentials};
use log::info;

/// Where a request is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Stylesheet,
    SubmitCredentials,
    Redirect,
}

impl Route {
    /// Match a request against the portal routes.
    pub fn of(request: &Request, domain: &str) -> Self {
        let on_portal = request
            .headers
            .host()
            .is_some_and(|host| host.eq_ignore_ascii_case(domain));
        if !on_portal {
            return Self::Redirect;
        }
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/") => Self::Index,
            ("GET", "/style.css") => Self::Stylesheet,
            ("POST", FORM_ACTION) => Self::SubmitCredentials,
            _ => Self::Redirect,
        }
    }
}

/// Produce the response for a request, persisting submitted credentials.
pub fn dispatch<S>(
    request: &Request,
    config: &PortalConfig,
    pages: &Pages,
    store: &S,
) -> Result<Response, HttpError>
where
    S: CredentialStore + ?Sized,
{
    Ok(match Route::of(request, &config.domain) {
        Route::Index => Response::ok(CONTENT_TYPE_HTML, pages.index.as_str()),
        Route::Stylesheet => Response::ok(CONTENT_TYPE_CSS, pages.style.as_str()),
        Route::SubmitCredentials => {
            let credentials = parse_form(&request.body)?;
            store.write(&credentials)?;
            info!(
                "Received credentials for network {:?}",
                credentials.network_name()
            );
            Response::ok(CONTENT_TYPE_HTML, pages.success.as_str())
        }
        Route::Redirect => Response::redirect(config.portal_url()),
    })
}

/// Decode the `application/x-www-form-urlencoded` setup form.
///
/// Takes the first `ssid` and the first `key` field.
pub fn parse_form(body: &[u8]) -> Result<Credentials, HttpError> {
    let body = std::str::from_utf8(body).map_err(|_| HttpError::InvalidUtf8)?;

    let mut ssid = None;
    let mut key = None;
    for (name, value) in form_urlencoded::parse(body.as_bytes()) {
        match name.as_ref() {
            "ssid" if ssid.is_none() => ssid = Some(value.into_owned()),
            "key" if key.is_none() => key = Some(value.into_owned()),
            _ => {}
        }
    }

    let ssid = ssid.ok_or(HttpError::MissingFormField("ssid"))?;
    let key = key.ok_or(HttpError::MissingFormField("key"))?;
    Ok(Credentials::new(ssid, key)?)
}
