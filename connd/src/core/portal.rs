//! Captive portal detection.
//!
//! After a service comes online a plain HTTP request is sent to a known
//! host. A genuine reply carries a session cookie in its first header lines;
//! anything else means a portal intercepted the request.

use futures::{FutureExt, select};
use futures_timer::Delay;
use log::{debug, info, warn};
use std::io;
use std::pin::pin;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::api::config::PortalConfig;
use crate::api::models::{NetworkType, ServiceId};
use crate::types::constants::portal;

/// Verdict of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalResult {
    /// The expected page came back.
    Online,
    /// A different page came back; a portal is likely in the way.
    Portal,
    /// No answer could be obtained.
    Unknown,
}

/// State of one probe, created per service.
#[derive(Debug, Clone)]
pub struct PortalContext {
    pub service: ServiceId,
    /// `host:port` the TCP connection goes to.
    pub target: String,
    pub query: String,
    pub timeout: Duration,
}

impl PortalContext {
    /// Connects through the configured proxy when there is one, directly to
    /// the probe address otherwise.
    pub fn new(service: ServiceId, config: &PortalConfig) -> Self {
        let target = match &config.proxy {
            Some(proxy) => format!("{}:{}", proxy.host, proxy.port),
            None => format!("{}:{}", config.address, config.port),
        };
        Self {
            service,
            target,
            query: build_query(&config.host, &config.page),
            timeout: config.timeout,
        }
    }
}

/// Only Wi-Fi and Ethernet services are probed.
pub fn should_probe(network_type: NetworkType) -> bool {
    matches!(network_type, NetworkType::Wifi | NetworkType::Ethernet)
}

/// Builds the HTTP/1.0 request for `page` on `host`.
pub fn build_query(host: &str, page: &str) -> String {
    format!(
        "GET /{} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\n\r\n",
        page.trim_start_matches('/'),
        host,
        portal::USER_AGENT
    )
}

/// Classifies a raw HTTP response.
pub fn classify_response(response: &str) -> PortalResult {
    let lines: Vec<&str> = response.splitn(portal::HEADER_LINES + 1, '\n').collect();

    let status_ok = lines.first().is_some_and(|line| line.contains("200 OK"));
    if status_ok {
        let has_cookie = lines
            .iter()
            .take(portal::HEADER_LINES)
            .any(|line| starts_with_cookie(line));
        if has_cookie {
            return PortalResult::Online;
        }
    }
    PortalResult::Portal
}

// The header name has to show up within the first 12 bytes of the line.
fn starts_with_cookie(line: &str) -> bool {
    let head = &line.as_bytes()[..line.len().min(12)];
    head.windows(b"Set-Cookie".len()).any(|w| w == b"Set-Cookie")
}

async fn fetch(target: &str, query: &str) -> io::Result<String> {
    let mut stream = TcpStream::connect(target).await?;
    stream.write_all(query.as_bytes()).await?;

    let mut buf = vec![0u8; portal::READ_BUFFER];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before any reply",
        ));
    }
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

/// Runs one probe.
///
/// The first chunk the server sends is classified without waiting for the
/// connection to close. Connection, send and read failures as well as the
/// timeout all yield [`PortalResult::Unknown`].
pub async fn detect(ctx: &PortalContext) -> PortalResult {
    debug!("probing {} for service {:?}", ctx.target, ctx.service);

    let mut timeout = pin!(Delay::new(ctx.timeout).fuse());
    let mut request = pin!(fetch(&ctx.target, &ctx.query).fuse());

    let result = select! {
        _ = timeout => {
            warn!("portal probe via {} timed out after {:?}", ctx.target, ctx.timeout);
            PortalResult::Unknown
        }
        page = request => match page {
            Ok(page) => classify_response(&page),
            Err(e) => {
                warn!("portal probe via {} failed: {}", ctx.target, e);
                PortalResult::Unknown
            }
        },
    };

    info!("service {:?} portal check: {:?}", ctx.service, result);
    result
}
