use crate::config::UnionDdsConfiguration;
use crate::structure::DomainId;
use if_addrs::get_if_addrs;
use log::warn;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

const PB: u16 = 7400;
const DG: u16 = 250;
const D2: u16 = 1;

pub fn usertraffic_multicast_port(domain_id: DomainId) -> u16 {
    PB + DG * domain_id + D2
}

/// IPv4 interfaces the transport sends on and joins the multicast group with.
///
/// Falls back to the loopback interface on hosts without any other.
pub fn get_local_interfaces(configuration: &UnionDdsConfiguration) -> io::Result<Vec<Ipv4Addr>> {
    if let Some(addrs) = configuration.interface_addresses() {
        return Ok(addrs.to_vec());
    }
    let local_addrs: Vec<Ipv4Addr> = get_if_addrs()?
        .iter()
        .filter(|i| !i.is_loopback())
        .filter_map(|i| match i.ip() {
            IpAddr::V4(a) => Some(a),
            IpAddr::V6(_) => None,
        })
        .collect();
    if local_addrs.is_empty() {
        warn!("no non loopback IPv4 interface found, using {}", Ipv4Addr::LOCALHOST);
        return Ok(vec![Ipv4Addr::LOCALHOST]);
    }
    Ok(local_addrs)
}
