//! Endpoint URL helpers.
//!
//! Specs advertise `(protocol, host, port, basePath)` tuples and virtual hosts
//! advertise aliases, ports and TLS settings. Both are reduced to the same
//! normalized URL form so the cache can match one against the other.

use crate::types::VirtualHost;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// One served endpoint as extracted from a spec document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDefinition {
    /// `http` or `https`.
    pub protocol: String,
    /// Host name.
    pub host: String,
    /// Port, `0` when not specified.
    #[serde(default)]
    pub port: u16,
    /// Base path, possibly empty.
    #[serde(default)]
    pub base_path: String,
}

impl EndpointDefinition {
    /// Create an endpoint definition.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            base_path: base_path.into(),
        }
    }

    /// Decompose an absolute URL.
    ///
    /// Relative or host-less URLs are rejected with [`Error::InvalidUrl`].
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed = Url::parse(raw.trim())?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("{raw}: no host")))?;
        Ok(Self {
            protocol: parsed.scheme().to_string(),
            host: host.to_string(),
            port: parsed.port_or_known_default().unwrap_or(0),
            base_path: parsed.path().trim_end_matches('/').to_string(),
        })
    }

    /// Render as a URL, eliding the protocol's default port.
    pub fn to_url(&self) -> String {
        let protocol = self.protocol.to_lowercase();
        if self.port == 0 || is_default_port(&protocol, self.port) {
            format!("{protocol}://{}{}", self.host, self.base_path)
        } else {
            format!("{protocol}://{}:{}{}", self.host, self.port, self.base_path)
        }
    }
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

/// Normalize a URL for endpoint matching.
///
/// Scheme and host are lower-cased, default ports dropped and trailing
/// slashes removed. Unparseable input is trimmed and lower-cased only.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(parsed) = Url::parse(raw) else {
        return raw.trim_end_matches('/').to_lowercase();
    };
    let Some(host) = parsed.host_str() else {
        return raw.trim_end_matches('/').to_lowercase();
    };

    let mut out = format!("{}://{}", parsed.scheme(), host.to_lowercase());
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(parsed.path().trim_end_matches('/'));
    out
}

/// Externally reachable URLs of a virtual host, one per host alias.
///
/// The scheme follows TLS presence; default ports are elided and a base URL
/// other than `/` is appended.
pub fn urls_from_virtual_host(virtual_host: &VirtualHost) -> Vec<String> {
    let scheme = if virtual_host.tls { "https" } else { "http" };
    let port = virtual_host
        .port
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|port| !is_default_port(scheme, *port));
    let base_url = virtual_host.base_url.trim();
    let suffix = if base_url.is_empty() || base_url == "/" {
        ""
    } else {
        base_url
    };

    virtual_host
        .host_aliases
        .iter()
        .map(|host| match port {
            Some(port) => format!("{scheme}://{host}:{port}{suffix}"),
            None => format!("{scheme}://{host}{suffix}"),
        })
        .collect()
}

/// Split URLs back into endpoint definitions, skipping unparseable ones.
pub fn definitions_from_urls(urls: &[String]) -> Vec<EndpointDefinition> {
    urls.iter()
        .filter_map(|raw| match EndpointDefinition::parse(raw) {
            Ok(definition) => Some(definition),
            Err(e) => {
                debug!(url = %raw, error = %e, "skipping endpoint");
                None
            },
        })
        .collect()
}
