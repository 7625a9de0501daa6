//! Client address resolution.
//!
//! Forwarding headers are honoured only when the direct peer is a trusted
//! proxy; otherwise the socket address wins. The result is stored as a
//! [`ClientIp`] extension for the token gate's subnet check.

use crate::domain::config::SecurityConfig;
use crate::domain::ClientIp;
use axum::{body::Body, extract::ConnectInfo, http::Request, response::Response};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Client IP layer
#[derive(Clone)]
pub struct ClientIpLayer {
    config: Arc<SecurityConfig>,
}

impl ClientIpLayer {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Never trust forwarding headers
    pub fn direct_only() -> Self {
        Self::new(SecurityConfig {
            trusted_proxies: Vec::new(),
            trust_localhost: false,
            trust_private_ips: false,
            real_ip_header: String::new(),
            proxy_count: 0,
        })
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Client IP service
#[derive(Clone)]
pub struct ClientIpService<S> {
    inner: S,
    config: Arc<SecurityConfig>,
}

impl<S> Service<Request<Body>> for ClientIpService<S>
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
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip());

            match peer {
                Some(direct_ip) => {
                    let real_ip = determine_real_ip(&req, direct_ip, &config);
                    req.extensions_mut().insert(ClientIp(real_ip));
                }
                None => {
                    // No socket info: forwarding headers cannot be vouched for
                    debug!("No peer address on request, client IP unresolved");
                }
            }

            inner.call(req).await
        })
    }
}

/// Determine the real client IP based on trusted proxy configuration
fn determine_real_ip<B>(req: &Request<B>, direct_ip: IpAddr, config: &SecurityConfig) -> IpAddr {
    if !is_trusted_proxy(direct_ip, config) {
        if req.headers().contains_key(config.real_ip_header.as_str()) {
            warn!(
                direct_ip = %direct_ip,
                header = config.real_ip_header,
                "Ignoring forwarding header from untrusted peer"
            );
        }
        return direct_ip;
    }

    if config.real_ip_header.is_empty() {
        return direct_ip;
    }

    let Some(value) = req
        .headers()
        .get(config.real_ip_header.as_str())
        .and_then(|v| v.to_str().ok())
    else {
        return direct_ip;
    };

    let extracted = if config.real_ip_header.eq_ignore_ascii_case("x-forwarded-for") {
        // client, proxy1, proxy2: skip the trusted hops from the right
        let hops: Vec<&str> = value.split(',').map(str::trim).collect();
        let index = hops.len().saturating_sub(config.proxy_count + 1);
        hops.get(index).and_then(|s| s.parse::<IpAddr>().ok())
    } else {
        value.trim().parse::<IpAddr>().ok()
    };

    match extracted {
        Some(ip) => {
            debug!(header = config.real_ip_header, extracted_ip = %ip, "Client IP from header");
            ip
        }
        None => direct_ip,
    }
}

fn is_trusted_proxy(ip: IpAddr, config: &SecurityConfig) -> bool {
    config.trusted_proxies.contains(&ip)
        || (config.trust_localhost && ip.is_loopback())
        || (config.trust_private_ips && is_private_ip(ip))
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_link_local(),
        // unique local fc00::/7
        IpAddr::V6(ipv6) => (ipv6.octets()[0] & 0xfe) == 0xfc,
    }
}
