use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::logging::{debug, trace};
use smb_core::SMBResult;

use crate::config::{NETBIOS_PORT, SMBClientConfig};
use crate::transport::{CancelToken, NameLookup, NameService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    ServiceDiscovery,
    NetBIOS,
    /// DNS, or a numeric address literal.
    Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub addresses: Vec<SocketAddr>,
    pub canonical_name: Option<String>,
    pub strategy: ResolutionStrategy,
    /// Sessions found later must have been opened under the same DNS name.
    pub match_dns_name: bool,
}

/// Turns a server name into candidate endpoints by trying each configured strategy in turn.
pub struct AddressResolver {
    config: Arc<SMBClientConfig>,
    service_discovery: Option<Arc<dyn NameService>>,
    netbios: Option<Arc<dyn NameService>>,
    dns: Option<Arc<dyn NameService>>,
}

impl AddressResolver {
    pub fn new(config: Arc<SMBClientConfig>, service_discovery: Option<Arc<dyn NameService>>, netbios: Option<Arc<dyn NameService>>, dns: Option<Arc<dyn NameService>>) -> Self {
        Self { config, service_discovery, netbios, dns }
    }

    /// Strategy order for the current configuration. NetBIOS appears once, either ahead of
    /// address resolution or, when its port is in play, after it.
    pub fn strategies(&self) -> Vec<ResolutionStrategy> {
        let mut strategies = vec![ResolutionStrategy::ServiceDiscovery];
        if self.config.netbios_before_dns {
            strategies.push(ResolutionStrategy::NetBIOS);
        }
        strategies.push(ResolutionStrategy::Address);
        if !self.config.netbios_before_dns && self.config.netbios_allowed() {
            strategies.push(ResolutionStrategy::NetBIOS);
        }
        strategies
    }

    pub fn resolve(&self, server: &str, allow_loopback: bool, cancel: &CancelToken) -> SMBResult<Resolution> {
        let host = strip_ipv6_literal(server);
        if let Ok(ip) = host.parse::<IpAddr>() {
            let lookup = NameLookup { addresses: vec![SocketAddr::new(ip, self.config.port)], canonical_name: None };
            return accept(server, lookup, ResolutionStrategy::Address, false, allow_loopback);
        }

        for strategy in self.strategies() {
            cancel.check()?;
            let (service, port) = match strategy {
                ResolutionStrategy::ServiceDiscovery => (&self.service_discovery, self.config.port),
                ResolutionStrategy::NetBIOS => (&self.netbios, NETBIOS_PORT),
                ResolutionStrategy::Address => (&self.dns, self.config.port),
            };
            let Some(service) = service else {
                trace!(server, ?strategy, "no name service configured");
                continue;
            };
            match service.lookup(host, port, cancel) {
                Ok(lookup) if !lookup.addresses.is_empty() => {
                    debug!(server, ?strategy, addresses = lookup.addresses.len(), "name resolved");
                    return accept(server, lookup, strategy, strategy == ResolutionStrategy::Address, allow_loopback);
                }
                Ok(_) => debug!(server, ?strategy, "name service returned no addresses"),
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => debug!(server, ?strategy, error = %e, "name resolution failed"),
            }
        }
        Err(SMBError::host_unreachable(server))
    }
}

fn accept(server: &str, lookup: NameLookup, strategy: ResolutionStrategy, match_dns_name: bool, allow_loopback: bool) -> SMBResult<Resolution> {
    let addresses = lookup.addresses.into_iter()
        .filter(|address| allow_loopback || !address.ip().is_loopback())
        .collect::<Vec<SocketAddr>>();
    if addresses.is_empty() {
        return Err(SMBError::loopback_not_allowed(server));
    }
    Ok(Resolution { addresses, canonical_name: lookup.canonical_name, strategy, match_dns_name })
}

/// `[fe80::1%en0]` becomes `fe80::1`; anything else is returned untouched.
pub fn strip_ipv6_literal(name: &str) -> &str {
    match name.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')) {
        Some(inner) => inner.split('%').next().unwrap_or(inner),
        None => name,
    }
}
