//! Capabilities the reader borrows from its host: a loading indicator, a
//! connectivity probe and a way to open links outside the reader.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::util::{validate_url_for_open, UrlValidationError};

/// Loading indicator shown while an entry is fetched or mobilized.
pub trait ProgressIndicator: Send {
    fn set_loading(&mut self, loading: bool);
}

/// Indicator for hosts that have none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressIndicator for NoProgress {
    fn set_loading(&mut self, _loading: bool) {}
}

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Online when a TCP connection to `addr` opens within the timeout.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Probe the host part of an http(s) url on its default port.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port_or_known_default()?;
        Some(Self::new(format!("{host}:{port}"), timeout))
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(addr = %self.addr, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, "Connectivity probe timed out");
                false
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Refusing to open link: {0}")]
    Rejected(#[from] UrlValidationError),
    #[error("Failed to launch handler: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens links and enclosures in an external application.
pub trait Launcher: Send + Sync {
    /// `mime_type` is a hint; launchers that cannot use it ignore it.
    fn open(&self, target: &str, mime_type: Option<&str>) -> Result<(), LaunchError>;
}

/// Hands validated urls to the desktop's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open(&self, target: &str, mime_type: Option<&str>) -> Result<(), LaunchError> {
        let url = validate_url_for_open(target)?;
        tracing::debug!(url = %url, mime_type, "Opening externally");
        open::that(url.as_str())?;
        Ok(())
    }
}
