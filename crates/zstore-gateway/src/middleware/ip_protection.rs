//! Client IP resolution.
//!
//! Resolves the requester identity used by the access gate and stores it as
//! a `ClientIp` request extension. `X-Forwarded-For` is only honoured when
//! the direct peer is a trusted proxy.

use crate::domain::config::SecurityConfig;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolved requester address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    /// Identity string used for ban lookups.
    pub fn identity(&self) -> String {
        self.0.to_string()
    }
}

/// Trusted proxy configuration
#[derive(Clone, Debug)]
pub struct TrustedProxyConfig {
    /// Explicitly trusted proxy addresses
    pub trusted_proxies: Vec<IpAddr>,
    /// Trust loopback peers
    pub trust_localhost: bool,
    /// Trust private range peers (10/8, 172.16/12, 192.168/16, fc00::/7)
    pub trust_private: bool,
    /// Number of trusted proxies appending to X-Forwarded-For
    pub proxy_count: usize,
}

impl Default for TrustedProxyConfig {
    fn default() -> Self {
        Self {
            trusted_proxies: Vec::new(),
            trust_localhost: true,
            trust_private: false,
            proxy_count: 1,
        }
    }
}

impl From<&SecurityConfig> for TrustedProxyConfig {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            trusted_proxies: config.trusted_proxies.iter().copied().map(canonical_ip).collect(),
            trust_localhost: true,
            trust_private: config.trust_private_ips,
            proxy_count: config.proxy_count,
        }
    }
}

/// Client IP layer
#[derive(Clone)]
pub struct IpProtectionLayer {
    config: Arc<TrustedProxyConfig>,
}

impl IpProtectionLayer {
    pub fn new(config: TrustedProxyConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Never trust forwarding headers.
    pub fn direct_only() -> Self {
        Self::new(TrustedProxyConfig {
            trusted_proxies: Vec::new(),
            trust_localhost: false,
            trust_private: false,
            proxy_count: 0,
        })
    }
}

impl<S> Layer<S> for IpProtectionLayer {
    type Service = IpProtectionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpProtectionService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Client IP service
#[derive(Clone)]
pub struct IpProtectionService<S> {
    inner: S,
    config: Arc<TrustedProxyConfig>,
}

impl<S> Service<Request<Body>> for IpProtectionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Missing only when the router is driven without a listener
            let direct_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| canonical_ip(ci.0.ip()))
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

            let client_ip = resolve_client_ip(req.headers(), direct_ip, &config);
            req.extensions_mut().insert(ClientIp(client_ip));

            inner.call(req).await
        })
    }
}

/// Determine the client IP from the peer address and forwarding headers.
pub fn resolve_client_ip(headers: &HeaderMap, direct_ip: IpAddr, config: &TrustedProxyConfig) -> IpAddr {
    let forwarded = headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok());

    if !is_trusted_proxy(direct_ip, config) {
        if let Some(forwarded) = forwarded {
            warn!(
                direct_ip = %direct_ip,
                forwarded,
                "Ignoring X-Forwarded-For from untrusted source"
            );
        }
        return direct_ip;
    }

    let Some(value) = forwarded else {
        return direct_ip;
    };

    // Each trusted proxy appends the peer it saw; hops left of those are client-written
    let hops: Vec<&str> = value.split(',').map(str::trim).collect();
    if config.proxy_count == 0 || hops.len() < config.proxy_count {
        warn!(
            direct_ip = %direct_ip,
            forwarded = value,
            proxy_count = config.proxy_count,
            "X-Forwarded-For has fewer hops than trusted proxies"
        );
        return direct_ip;
    }
    let index = hops.len() - config.proxy_count;
    match hops.get(index).and_then(|h| h.parse::<IpAddr>().ok()) {
        Some(ip) => {
            let ip = canonical_ip(ip);
            debug!(forwarded = value, client_ip = %ip, "Client IP from forwarding header");
            ip
        }
        None => direct_ip,
    }
}

/// Collapse IPv4-mapped IPv6 addresses to plain IPv4.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// Check if an IP is a trusted proxy
fn is_trusted_proxy(ip: IpAddr, config: &TrustedProxyConfig) -> bool {
    if config.trusted_proxies.contains(&ip) {
        return true;
    }

    if config.trust_localhost && ip.is_loopback() {
        return true;
    }

    config.trust_private && is_private_ip(ip)
}

/// Check if IP is in private range
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_link_local(),
        IpAddr::V6(ipv6) => {
            // Unique local addresses (fc00::/7)
            let octets = ipv6.octets();
            (octets[0] & 0xfe) == 0xfc
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::Ipv6Addr;

    fn headers(forwarded: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_str(forwarded).unwrap());
        headers
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_canonical_ip() {
        assert_eq!(canonical_ip(ip("::ffff:203.0.113.7")), ip("203.0.113.7"));
        assert_eq!(canonical_ip(ip("2001:db8::1")), ip("2001:db8::1"));
        assert_eq!(canonical_ip(ip("10.0.0.1")), ip("10.0.0.1"));
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip(ip("10.0.0.1")));
        assert!(is_private_ip(ip("172.16.0.1")));
        assert!(is_private_ip(ip("192.168.1.1")));
        assert!(is_private_ip(ip("fd00::1")));
        assert!(!is_private_ip(ip("8.8.8.8")));
        assert!(!is_private_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn test_untrusted_peer_header_ignored() {
        let config = TrustedProxyConfig::default();
        let resolved = resolve_client_ip(&headers("1.2.3.4"), ip("203.0.113.7"), &config);
        assert_eq!(resolved, ip("203.0.113.7"));
    }

    #[test]
    fn test_trusted_peer_header_used() {
        let config = TrustedProxyConfig::default();
        let resolved = resolve_client_ip(&headers("198.51.100.9"), ip("127.0.0.1"), &config);
        assert_eq!(resolved, ip("198.51.100.9"));

        // Only the hop appended by the trusted proxy counts
        let resolved = resolve_client_ip(
            &headers("6.6.6.6, 198.51.100.9, 10.0.0.2"),
            ip("127.0.0.1"),
            &config,
        );
        assert_eq!(resolved, ip("10.0.0.2"));
    }

    #[test]
    fn test_client_written_prefix_ignored() {
        let config = TrustedProxyConfig::default();
        let resolved = resolve_client_ip(
            &headers("1.2.3.4, 203.0.113.7"),
            ip("127.0.0.1"),
            &config,
        );
        assert_eq!(resolved, ip("203.0.113.7"));
    }

    #[test]
    fn test_two_proxies_take_second_from_right() {
        let config = TrustedProxyConfig {
            proxy_count: 2,
            ..Default::default()
        };
        let resolved = resolve_client_ip(
            &headers("6.6.6.6, 198.51.100.9, 10.0.0.2"),
            ip("127.0.0.1"),
            &config,
        );
        assert_eq!(resolved, ip("198.51.100.9"));

        // Fewer hops than proxies: header is not trusted
        let resolved = resolve_client_ip(&headers("198.51.100.9"), ip("127.0.0.1"), &config);
        assert_eq!(resolved, ip("127.0.0.1"));
    }

    #[test]
    fn test_trusted_peer_garbage_header() {
        let config = TrustedProxyConfig::default();
        let resolved = resolve_client_ip(&headers("not-an-ip"), ip("127.0.0.1"), &config);
        assert_eq!(resolved, ip("127.0.0.1"));
    }

    #[test]
    fn test_explicit_proxy_list() {
        let security = SecurityConfig {
            trusted_proxies: vec![ip("::ffff:10.0.0.100")],
            trust_private_ips: false,
            proxy_count: 1,
        };
        let config = TrustedProxyConfig::from(&security);
        assert!(is_trusted_proxy(ip("10.0.0.100"), &config));
        assert!(!is_trusted_proxy(ip("10.0.0.101"), &config));
        assert!(is_trusted_proxy(ip("127.0.0.1"), &config));
    }

    #[test]
    fn test_direct_only_trusts_nobody() {
        let layer = IpProtectionLayer::direct_only();
        assert!(!is_trusted_proxy(ip("127.0.0.1"), &layer.config));
        assert!(!is_trusted_proxy(ip("10.0.0.1"), &layer.config));
    }
}
