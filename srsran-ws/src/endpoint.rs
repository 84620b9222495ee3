//! WebSocket URL handling.

use url::{Host, Url};

use crate::error::{Result, WsError};

/// Where a WebSocket server lives, resolved from a `ws://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address, without IPv6 brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Request target sent in the upgrade request (path plus query).
    pub resource: String,
}

impl Endpoint {
    /// Parse a `ws://host[:port][/path][?query]` URL.
    ///
    /// `wss://` is rejected since TLS is not supported. A missing port
    /// defaults to 80 and a missing path to `/`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| WsError::InvalidUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;

        match url.scheme() {
            "ws" => {}
            "wss" => return Err(invalid("TLS (wss) is not supported")),
            other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => "127.0.0.1".to_string(),
        };

        let port = url.port_or_known_default().unwrap_or(80);

        let mut resource = match url.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };
        if let Some(query) = url.query() {
            resource.push('?');
            resource.push_str(query);
        }

        Ok(Self {
            host,
            port,
            resource,
        })
    }

    /// Value for the `Host` header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
