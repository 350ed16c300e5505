//! Captive setup portal.
//!
//! Brings up the access point, then runs the DNS responder and the HTTP
//! responder as two tasks on the current runtime until credentials are
//! stored (or the caller cancels).
//!
//! # Lifecycle
//!
//! ```text
//! Portal::bind ── AP start ── pages ── bind UDP/TCP ── spawn servers ──▶ RunningPortal
//! RunningPortal::wait ──▶ Provisioned   (credentials stored, reboot_delay elapsed)
//!                     └─▶ Shutdown      (cancel_token cancelled)
//! ```
//!
//! The caller turns `Provisioned` into a device restart.

pub mod dns;
pub mod http;
pub mod pages;
pub mod routes;

pub use dns::DnsServer;
pub use http::{HttpError, Request, Response, StatusCode};
pub use pages::Pages;

use crate::access_point::AccessPoint;
use crate::config::{ConfigError, PortalConfig};
use crate::credentials::{CredentialError, CredentialStore};
use crate::platform;
use log::{debug, info, warn};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Maximum HTTP connections handled at once.
pub const MAX_CONNECTIONS: usize = 4;

/// How the portal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalOutcome {
    /// Credentials are stored; the device should restart.
    Provisioned,
    /// The portal was cancelled from outside.
    Shutdown,
}

/// Setup portal, not yet started.
pub struct Portal<S: ?Sized, A> {
    config: PortalConfig,
    store: Arc<S>,
    access_point: A,
    shutdown: CancellationToken,
}

impl<S, A> Portal<S, A>
where
    S: CredentialStore + ?Sized + 'static,
    A: AccessPoint,
{
    pub fn new(config: PortalConfig, store: Arc<S>, access_point: A) -> Self {
        Self {
            config,
            store,
            access_point,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the portal with [`PortalOutcome::Shutdown`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start the access point, bind both servers and spawn them.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bind(mut self) -> Result<RunningPortal<A>, PortalError> {
        self.config.validate()?;
        self.access_point.start(&self.config)?;

        let pages = Pages::load(&self.config);

        let dns = DnsServer::bind(
            self.config.dns_bind,
            self.config.ip,
            self.config.retry_delay,
        )
        .await
        .map_err(|source| PortalError::Bind {
            server: "DNS",
            addr: self.config.dns_bind,
            source,
        })?;
        let listener =
            TcpListener::bind(self.config.http_bind)
                .await
                .map_err(|source| PortalError::Bind {
                    server: "HTTP",
                    addr: self.config.http_bind,
                    source,
                })?;

        let dns_addr = dns.local_addr().unwrap_or(self.config.dns_bind);
        let http_addr = listener.local_addr().unwrap_or(self.config.http_bind);

        let servers = self.shutdown.child_token();
        let provisioned = CancellationToken::new();
        let handler = Arc::new(ConnectionHandler {
            config: self.config,
            pages,
            store: self.store,
            provisioned: provisioned.clone(),
            restart_scheduled: AtomicBool::new(false),
        });

        let tasks = vec![
            tokio::spawn(dns.run(servers.clone())),
            tokio::spawn(serve_http(listener, handler, servers.clone())),
        ];

        Ok(RunningPortal {
            dns_addr,
            http_addr,
            shutdown: self.shutdown,
            provisioned,
            servers,
            tasks,
            _access_point: self.access_point,
        })
    }

    /// Run the portal until it is provisioned or cancelled.
    pub async fn run(self) -> Result<PortalOutcome, PortalError> {
        Ok(self.bind().await?.wait().await)
    }
}

/// Portal whose servers are running.
///
/// Holds the access point so the setup network stays up while this lives.
pub struct RunningPortal<A> {
    dns_addr: SocketAddr,
    http_addr: SocketAddr,
    shutdown: CancellationToken,
    provisioned: CancellationToken,
    servers: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    _access_point: A,
}

impl<A> RunningPortal<A> {
    /// Address the DNS responder is bound to.
    pub fn dns_addr(&self) -> SocketAddr {
        self.dns_addr
    }

    /// Address the HTTP responder is bound to.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Wait for the terminal event, then stop both servers.
    pub async fn wait(self) -> PortalOutcome {
        let outcome = tokio::select! {
            biased;
            _ = self.provisioned.cancelled() => PortalOutcome::Provisioned,
            _ = self.shutdown.cancelled() => PortalOutcome::Shutdown,
        };

        self.servers.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Portal server task failed: {}", e);
            }
        }
        info!("Portal stopped: {:?}", outcome);
        outcome
    }
}

struct ConnectionHandler<S: ?Sized> {
    config: PortalConfig,
    pages: Pages,
    store: Arc<S>,
    provisioned: CancellationToken,
    restart_scheduled: AtomicBool,
}

impl<S: CredentialStore + ?Sized> ConnectionHandler<S> {
    async fn handle(&self, mut stream: TcpStream, peer: SocketAddr) {
        platform::log_heap("before request");

        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);

        let request = match tokio::time::timeout(
            self.config.request_timeout,
            http::read_request(&mut reader),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout),
        };

        let response = request
            .and_then(|request| {
                debug!(
                    "{} {} host={:?} from {}",
                    request.method,
                    request.path,
                    request.headers.host(),
                    peer
                );
                routes::dispatch(&request, &self.config, &self.pages, &*self.store)
            })
            .unwrap_or_else(|e| {
                warn!("Answering 500 to {}: {}", peer, e);
                Response::error(self.pages.error.as_str())
            });

        if let Err(e) = response.write_to(&mut writer).await {
            debug!("Write to {} failed: {}", peer, e);
        }
        let _ = writer.shutdown().await;
        drop(stream);

        self.schedule_restart_if_provisioned().await;
    }

    async fn schedule_restart_if_provisioned(&self) {
        if !self.store.exists() || self.restart_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            "Credentials stored, leaving setup mode in {:?}",
            self.config.reboot_delay
        );
        tokio::time::sleep(self.config.reboot_delay).await;
        self.provisioned.cancel();
    }
}

async fn serve_http<S>(
    listener: TcpListener,
    handler: Arc<ConnectionHandler<S>>,
    shutdown: CancellationToken,
) where
    S: CredentialStore + ?Sized + 'static,
{
    match listener.local_addr() {
        Ok(addr) => info!("HTTP server listening on {}", addr),
        Err(_) => info!("HTTP server started"),
    }

    let permits = Arc::new(Semaphore::new(MAX_CONNECTIONS));
    loop {
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!("Accept failed: {}", e);
                tokio::time::sleep(handler.config.retry_delay).await;
                continue;
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            let _permit = permit;
            handler.handle(stream, peer).await;
        });
    }

    info!("HTTP server shutting down");
}

/// Errors that stop the portal from starting.
#[derive(Debug)]
pub enum PortalError {
    /// The radio could not be brought up.
    AccessPoint(String),
    /// A server socket could not be bound.
    Bind {
        server: &'static str,
        addr: SocketAddr,
        source: io::Error,
    },
    /// The portal configuration is invalid.
    Config(ConfigError),
    /// The credential store could not be opened.
    Credentials(CredentialError),
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessPoint(msg) => write!(f, "access point: {}", msg),
            Self::Bind {
                server,
                addr,
                source,
            } => write!(f, "{} server cannot bind {}: {}", server, addr, source),
            Self::Config(e) => write!(f, "config: {}", e),
            Self::Credentials(e) => write!(f, "credential store: {}", e),
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Config(e) => Some(e),
            Self::Credentials(e) => Some(e),
            Self::AccessPoint(_) => None,
        }
    }
}

impl From<ConfigError> for PortalError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CredentialError> for PortalError {
    fn from(e: CredentialError) -> Self {
        Self::Credentials(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for PortalError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::AccessPoint(e.to_string())
    }
}
