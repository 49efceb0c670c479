use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Routability class of a hop address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressClass {
    /// RFC 1918, unique local, loopback or link-local.
    Private,
    Public,
}

/// Parse an address candidate and classify it.
///
/// Returns `None` when the candidate is not an IP address at all, for
/// instance an unresolved hostname in the address slot.
pub fn classify(candidate: &str) -> Option<(IpAddr, AddressClass)> {
    let ip: IpAddr = candidate.parse().ok()?;
    let class = if is_private(&ip) {
        AddressClass::Private
    } else {
        AddressClass::Public
    };
    Some((ip, class))
}

#[inline]
pub fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(&v4),
            None => is_private_v6(v6),
        },
    }
}

#[inline]
fn is_private_v4(ip: &Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local()
}

#[inline]
fn is_private_v6(ip: &Ipv6Addr) -> bool {
    ip.is_loopback() || ip.is_unique_local() || ip.is_unicast_link_local()
}
