//! Host entry resolution.
//!
//! An entry is kept as-is when it is a literal IP or a CIDR block; anything
//! else is looked up through DNS and replaced by every address it resolves
//! to. One unresolvable entry fails the whole call and nothing is returned.

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use tracing::debug;

use faultline_core::AttackError;

#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addresses = tokio::net::lookup_host((host, 0)).await?;
        Ok(addresses.map(|socket| socket.ip()).collect())
    }
}

/// Literal IP or CIDR prefix, normalised to its textual form.
fn literal(entry: &str) -> Option<String> {
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Some(ip.to_string());
    }
    if entry.contains('/') {
        return entry.parse::<IpNetwork>().ok().map(|net| net.to_string());
    }
    None
}

pub async fn resolve_hosts(
    resolver: &dyn HostResolver,
    hosts: &[String],
) -> Result<Vec<String>, AttackError> {
    let mut addresses = Vec::new();
    for host in hosts {
        let host = host.trim();
        if let Some(address) = literal(host) {
            addresses.push(address);
            continue;
        }

        let resolved = match resolver.lookup(host).await {
            Ok(ips) if !ips.is_empty() => ips,
            Ok(_) | Err(_) => {
                return Err(AttackError::resolution(format!(
                    "the following entry is not a resolvable domain: {}",
                    host
                )))
            }
        };
        debug!(count = resolved.len(), "Resolved {}", host);
        addresses.extend(resolved.iter().map(IpAddr::to_string));
    }
    Ok(addresses)
}
