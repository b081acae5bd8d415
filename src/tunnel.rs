//! Reverse tunnels for locally hosted targets
//!
//! The remote executor cannot reach `localhost` or private-range
//! addresses, so targets classified as local are exposed through a
//! reverse tunnel and the submission carries the tunnel's public URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use crate::common::{Error, Result};

/// An open reverse tunnel
#[async_trait]
pub trait TunnelSession: Send + Sync {
    /// Externally reachable URL of the tunnel
    fn public_url(&self) -> &str;

    /// Tear the tunnel down
    async fn disconnect(&self) -> Result<()>;
}

/// Opens reverse tunnels to a tunnel server
#[async_trait]
pub trait TunnelConnector: Send + Sync {
    /// Expose `local_url` and return the open session
    async fn connect(&self, local_url: &str) -> Result<Box<dyn TunnelSession>>;
}

/// Returns true when `url` points at an address only reachable from this
/// machine or its private network
///
/// Unparseable URLs are treated as remote; submission will surface the
/// real error.
pub fn is_local_url(url: &str) -> bool {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    match parsed.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_local_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_local_ipv6(ip),
        None => false,
    }
}

/// Derive the tunnel target from a local URL
///
/// The tunnel forwards to plain HTTP on the original host and port; any
/// path or query on the draft URL stays on the submitted URL instead.
pub fn tunnel_target(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::Tunnel(format!("cannot derive tunnel target from '{url}': {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Tunnel(format!("URL '{url}' has no host")))?;
    match parsed.port() {
        Some(port) => Ok(format!("http://{host}:{port}")),
        None => Ok(format!("http://{host}")),
    }
}

fn is_local_ipv4(ip: Ipv4Addr) -> bool {
    if ip.is_unspecified() {
        return true;
    }
    let [a, b, c, _] = ip.octets();
    match a {
        10 | 127 => true,
        // 169.254.1.0 through 169.254.254.255 is link local
        169 if b == 254 => (1..=254).contains(&c),
        172 => (16..=31).contains(&b),
        192 => b == 168,
        _ => false,
    }
}

fn is_local_ipv6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_local_ipv4(mapped);
    }
    let head = ip.segments()[0];
    // fc00::/7 unique local, fe80::/10 link local
    (head & 0xfe00) == 0xfc00 || (head & 0xffc0) == 0xfe80
}

// === HTTP Control Channel ===

#[derive(Serialize)]
struct OpenRequest<'a> {
    target: &'a str,
}

#[derive(Deserialize)]
struct OpenResponse {
    url: String,
    token: String,
}

/// Connector that negotiates tunnels over the tunnel server's HTTP
/// control channel
pub struct HttpTunnelConnector {
    http: reqwest::Client,
    server_url: String,
}

impl HttpTunnelConnector {
    pub fn new(server_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TunnelConnector for HttpTunnelConnector {
    async fn connect(&self, local_url: &str) -> Result<Box<dyn TunnelSession>> {
        let response = self
            .http
            .post(format!("{}/tunnels", self.server_url))
            .json(&OpenRequest { target: local_url })
            .send()
            .await
            .map_err(|e| Error::Tunnel(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Tunnel(format!(
                "tunnel server returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let opened: OpenResponse = response
            .json()
            .await
            .map_err(|e| Error::Tunnel(e.to_string()))?;
        tracing::debug!("Tunnel open: {} -> {}", opened.url, local_url);

        Ok(Box::new(HttpTunnelSession {
            http: self.http.clone(),
            server_url: self.server_url.clone(),
            token: opened.token,
            public_url: opened.url,
        }))
    }
}

struct HttpTunnelSession {
    http: reqwest::Client,
    server_url: String,
    token: String,
    public_url: String,
}

#[async_trait]
impl TunnelSession for HttpTunnelSession {
    fn public_url(&self) -> &str {
        &self.public_url
    }

    async fn disconnect(&self) -> Result<()> {
        self.http
            .delete(format!("{}/tunnels/{}", self.server_url, self.token))
            .send()
            .await
            .map_err(|e| Error::Tunnel(e.to_string()))?;
        tracing::debug!("Tunnel closed: {}", self.public_url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_and_subdomains_are_local() {
        assert!(is_local_url("http://localhost:3000"));
        assert!(is_local_url("http://app.localhost/path"));
        assert!(is_local_url("https://LOCALHOST"));
    }

    #[test]
    fn loopback_and_private_ranges_are_local() {
        assert!(is_local_url("http://127.0.0.1:8080"));
        assert!(is_local_url("http://127.250.1.2"));
        assert!(is_local_url("http://10.1.2.3"));
        assert!(is_local_url("http://192.168.0.10:9000"));
        assert!(is_local_url("http://172.16.0.1"));
        assert!(is_local_url("http://172.31.255.255"));
        assert!(is_local_url("http://169.254.1.1"));
        assert!(is_local_url("http://0.0.0.0:4000"));
    }

    #[test]
    fn ipv6_loopback_link_local_and_unique_local_are_local() {
        assert!(is_local_url("http://[::1]:3000"));
        assert!(is_local_url("http://[::]"));
        assert!(is_local_url("http://[fe80::1]"));
        assert!(is_local_url("http://[fc00::2]"));
        assert!(is_local_url("http://[fd12:3456::1]"));
        assert!(is_local_url("http://[::ffff:192.168.0.1]"));
    }

    #[test]
    fn public_hosts_are_not_local() {
        assert!(!is_local_url("https://example.com"));
        assert!(!is_local_url("http://172.32.0.1"));
        assert!(!is_local_url("http://172.15.0.1"));
        assert!(!is_local_url("http://169.254.0.1"));
        assert!(!is_local_url("http://169.254.255.1"));
        assert!(!is_local_url("http://11.0.0.1"));
        assert!(!is_local_url("http://[2001:db8::1]"));
    }

    #[test]
    fn unparseable_urls_are_not_local() {
        assert!(!is_local_url("not a url"));
        assert!(!is_local_url(""));
    }

    #[test]
    fn tunnel_targets_keep_the_port_and_drop_the_path() {
        assert_eq!(
            tunnel_target("http://localhost:3000/admin?tab=2").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            tunnel_target("https://127.0.0.1/dashboard").unwrap(),
            "http://127.0.0.1"
        );
    }

    #[test]
    fn tunnel_targets_require_a_host() {
        assert!(tunnel_target("not a url").is_err());
    }
}
