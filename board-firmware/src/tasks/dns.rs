// Namensauflösung für Broker und Update-Server
use embassy_net::{IpAddress, Ipv4Address, Stack, dns::DnsQueryType};
use embassy_time::{Duration, with_timeout};

use crate::config::DNS_TIMEOUT_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum ResolveError {
    NotFound,
    Timeout,
}

/// Löst `host` zu einer IPv4-Adresse auf; IP-Literale werden direkt übernommen
pub async fn resolve_host(stack: Stack<'static>, host: &str) -> Result<Ipv4Address, ResolveError> {
    if let Ok(address) = host.parse::<Ipv4Address>() {
        return Ok(address);
    }

    let result = with_timeout(
        Duration::from_secs(DNS_TIMEOUT_SECS),
        stack.dns_query(host, DnsQueryType::A),
    )
    .await;

    match result {
        Ok(Ok(addrs)) => addrs
            .iter()
            .find_map(|addr| match addr {
                IpAddress::Ipv4(ipv4) => Some(*ipv4),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .ok_or(ResolveError::NotFound),
        Ok(Err(_)) => Err(ResolveError::NotFound),
        Err(_) => Err(ResolveError::Timeout),
    }
}
