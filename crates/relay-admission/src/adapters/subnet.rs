//! CIDR subnet matching for token network restrictions.

use crate::ports::SubnetMatcher;
use async_trait::async_trait;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::warn;

/// One `address/prefix` block. A bare address is a host route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid subnet {0:?}")]
pub struct CidrParseError(String);

impl FromStr for Cidr {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || CidrParseError(s.to_string());

        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let network: IpAddr = addr.parse().map_err(|_| invalid())?;
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix = match prefix {
            Some(p) => p.parse::<u8>().map_err(|_| invalid())?,
            None => max,
        };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { network, prefix })
    }
}

impl Cidr {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, normalize(ip)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

/// IPv4-mapped IPv6 peers are compared as IPv4
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

fn mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

/// Matches against comma-separated CIDR lists. Malformed entries never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct CidrMatcher;

impl CidrMatcher {
    pub fn matches(ip: IpAddr, subnets: &str) -> bool {
        subnets
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .any(|entry| match entry.parse::<Cidr>() {
                Ok(cidr) => cidr.contains(ip),
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed subnet restriction entry");
                    false
                }
            })
    }
}

#[async_trait]
impl SubnetMatcher for CidrMatcher {
    async fn contains(&self, ip: IpAddr, subnets: &str) -> bool {
        Self::matches(ip, subnets)
    }
}
